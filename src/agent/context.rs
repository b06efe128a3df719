//! Model context from persisted agent turns
//!
//! Agent turns are stored one row per unit: customer and bot text, one row
//! per function call, and one row per batch of function responses. Replay
//! turns them back into role-tagged contents, merging neighbours that share
//! a role so the backend sees strictly alternating turns.

use serde_json::Value;

use crate::error::{GatewayError, Result};
use crate::providers::{Content, Part, Role};
use crate::store::{AgentTurn, Sender, TurnType};

/// Encode a function call for an `AgentTurn(function_call)` row.
///
/// # Example
/// ```
/// use serde_json::json;
/// use wagate::agent::encode_function_call;
///
/// let data = encode_function_call("get_product_info", &json!({"product_id": "42"})).unwrap();
/// assert_eq!(data, r#"{"functionCall":{"name":"get_product_info","args":{"product_id":"42"}}}"#);
/// ```
pub fn encode_function_call(name: &str, args: &Value) -> Result<String> {
    Ok(serde_json::to_string(&Part::function_call(name, args.clone()))?)
}

/// Encode a batch of function responses for an `AgentTurn(function_response)` row.
pub fn encode_function_responses(parts: &[Part]) -> Result<String> {
    Ok(serde_json::to_string(parts)?)
}

fn role_of(sender: Sender) -> Role {
    match sender {
        Sender::Customer => Role::User,
        Sender::Bot => Role::Model,
    }
}

fn corrupt(turn: &AgentTurn, err: impl std::fmt::Display) -> GatewayError {
    GatewayError::StoreWriteFailure(format!(
        "agent turn {} ({}) is not decodable: {}",
        turn.id,
        turn.turn_type.as_str(),
        err
    ))
}

fn decode(turn: &AgentTurn) -> Result<Vec<Part>> {
    match turn.turn_type {
        TurnType::Text => Ok(vec![Part::text(turn.data.clone())]),
        TurnType::FunctionCall => {
            let part: Part = serde_json::from_str(&turn.data).map_err(|e| corrupt(turn, e))?;
            match part {
                Part::FunctionCall { .. } => Ok(vec![part]),
                _ => Err(corrupt(turn, "expected a functionCall part")),
            }
        }
        TurnType::FunctionResponse => {
            let parts: Vec<Part> =
                serde_json::from_str(&turn.data).map_err(|e| corrupt(turn, e))?;
            if parts
                .iter()
                .all(|p| matches!(p, Part::FunctionResponse { .. }))
            {
                Ok(parts)
            } else {
                Err(corrupt(turn, "expected functionResponse parts"))
            }
        }
    }
}

/// Append parts under a role, merging into the last content when the role matches.
pub fn push_parts(contents: &mut Vec<Content>, role: Role, parts: Vec<Part>) {
    if parts.is_empty() {
        return;
    }
    match contents.last_mut() {
        Some(last) if last.role == role => last.parts.extend(parts),
        _ => contents.push(Content { role, parts }),
    }
}

/// Rebuild model contents from a conversation's agent turns.
///
/// # Errors
///
/// A function-call or function-response row whose data does not decode.
pub fn replay(turns: &[AgentTurn]) -> Result<Vec<Content>> {
    let mut contents = Vec::new();
    for turn in turns {
        push_parts(&mut contents, role_of(turn.sender), decode(turn)?);
    }
    Ok(contents)
}
