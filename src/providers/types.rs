//! Model driver trait and the content types exchanged with it.
//!
//! Contents follow the `generateContent` shape: a list of role-tagged
//! contents, each holding parts that are text, a function call or a function
//! response. The same part encoding is what the engine persists for
//! function-call and function-response turns.

use async_trait::async_trait;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::error::Result;

/// Tool declaration handed to the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// The name of the tool (must be unique)
    pub name: String,
    /// Human-readable description of what the tool does
    pub description: String,
    /// JSON Schema describing the tool's parameters
    pub parameters: Value,
}

impl ToolDefinition {
    /// Create a new tool definition.
    ///
    /// # Example
    /// ```
    /// use wagate::providers::ToolDefinition;
    /// use serde_json::json;
    ///
    /// let tool = ToolDefinition::new(
    ///     "get_product_info",
    ///     "Look up a product by id",
    ///     json!({
    ///         "type": "object",
    ///         "properties": {
    ///             "product_id": { "type": "string" }
    ///         },
    ///         "required": ["product_id"]
    ///     }),
    /// );
    /// assert_eq!(tool.name, "get_product_info");
    /// ```
    pub fn new(name: &str, description: &str, parameters: Value) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            parameters,
        }
    }
}

/// Who authored a content block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Model,
}

/// Arguments of a call that carried none.
pub(crate) fn empty_args() -> Value {
    Value::Object(Map::new())
}

/// Function-call arguments, with `null` read as an empty object.
pub(crate) fn call_args<'de, D>(deserializer: D) -> std::result::Result<Value, D::Error>
where
    D: Deserializer<'de>,
{
    let args = Value::deserialize(deserializer)?;
    Ok(if args.is_null() { empty_args() } else { args })
}

/// One part of a content block.
///
/// Serializes externally tagged in camelCase, e.g.
/// `{"functionCall":{"name":"f","args":{}}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Part {
    Text(String),
    FunctionCall {
        name: String,
        #[serde(default = "empty_args", deserialize_with = "call_args")]
        args: Value,
    },
    FunctionResponse {
        name: String,
        response: Value,
    },
}

impl Part {
    pub fn text(text: impl Into<String>) -> Self {
        Part::Text(text.into())
    }

    pub fn function_call(name: &str, args: Value) -> Self {
        Part::FunctionCall {
            name: name.to_string(),
            args,
        }
    }

    pub fn function_response(name: &str, response: Value) -> Self {
        Part::FunctionResponse {
            name: name.to_string(),
            response,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Part::Text(text) => Some(text),
            _ => None,
        }
    }
}

/// A role-tagged list of parts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Content {
    pub role: Role,
    pub parts: Vec<Part>,
}

impl Content {
    pub fn user(parts: Vec<Part>) -> Self {
        Self {
            role: Role::User,
            parts,
        }
    }

    pub fn model(parts: Vec<Part>) -> Self {
        Self {
            role: Role::Model,
            parts,
        }
    }

    pub fn user_text(text: &str) -> Self {
        Self::user(vec![Part::text(text)])
    }
}

/// Token accounting reported by the backend.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

impl Usage {
    pub fn new(prompt_tokens: u32, completion_tokens: u32) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens + completion_tokens,
        }
    }
}

/// A single model turn.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModelResponse {
    pub parts: Vec<Part>,
    pub usage: Option<Usage>,
}

impl ModelResponse {
    /// Text-only response.
    pub fn text(text: &str) -> Self {
        Self {
            parts: vec![Part::text(text)],
            usage: None,
        }
    }

    pub fn with_parts(parts: Vec<Part>) -> Self {
        Self { parts, usage: None }
    }

    /// Whether the model asked for at least one function call.
    pub fn has_function_calls(&self) -> bool {
        self.parts
            .iter()
            .any(|p| matches!(p, Part::FunctionCall { .. }))
    }

    /// All text parts concatenated in order.
    pub fn joined_text(&self) -> String {
        self.parts.iter().filter_map(Part::as_text).collect()
    }
}

/// Options for a `generate` call.
///
/// Use the builder pattern to construct options.
#[derive(Debug, Clone, Default)]
pub struct ChatOptions {
    /// Maximum number of tokens to generate
    pub max_tokens: Option<u32>,
    /// Temperature for sampling (0.0 = deterministic, 1.0 = creative)
    pub temperature: Option<f32>,
}

impl ChatOptions {
    /// Create new default chat options.
    ///
    /// # Example
    /// ```
    /// use wagate::providers::ChatOptions;
    ///
    /// let options = ChatOptions::new().with_max_tokens(512).with_temperature(0.2);
    /// assert_eq!(options.max_tokens, Some(512));
    /// assert_eq!(options.temperature, Some(0.2));
    /// ```
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }
}

/// A language-model backend.
///
/// Implementations translate contents and tool declarations into the
/// backend's wire format and back. They do not retry and do not persist.
#[async_trait]
pub trait ModelDriver: Send + Sync {
    /// Produce the next model turn for the given history.
    async fn generate(
        &self,
        system: Option<&str>,
        contents: &[Content],
        tools: &[ToolDefinition],
        options: &ChatOptions,
    ) -> Result<ModelResponse>;

    /// The model identifier requests are sent to
    fn default_model(&self) -> &str;

    /// The backend name (e.g. "gemini")
    fn name(&self) -> &str;
}
