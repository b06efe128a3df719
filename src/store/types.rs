//! Persisted record types

use serde::Serialize;

/// A bounded exchange with one customer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Conversation {
    pub id: i64,
    pub customer_id: String,
    /// Unix seconds
    pub start_time: i64,
    /// `None` while the conversation is open
    pub end_time: Option<i64>,
    /// Label recorded when the conversation closed
    pub intent: Option<String>,
}

impl Conversation {
    pub fn is_open(&self) -> bool {
        self.end_time.is_none()
    }
}

/// Who produced a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    Customer,
    Bot,
}

impl Sender {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Customer => "customer",
            Self::Bot => "bot",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "customer" => Some(Self::Customer),
            "bot" => Some(Self::Bot),
            _ => None,
        }
    }
}

/// Agent turn payload kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnType {
    Text,
    FunctionCall,
    FunctionResponse,
}

impl TurnType {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::FunctionCall => "function_call",
            Self::FunctionResponse => "function_response",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "text" => Some(Self::Text),
            "function_call" => Some(Self::FunctionCall),
            "function_response" => Some(Self::FunctionResponse),
            _ => None,
        }
    }
}

/// A line of the customer-visible transcript.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatTurn {
    pub id: i64,
    pub conversation_id: i64,
    pub sender: Sender,
    pub timestamp: i64,
    pub message: String,
}

/// A unit of model context: text, a function call, or a batch of results.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AgentTurn {
    pub id: i64,
    pub conversation_id: i64,
    pub turn_type: TurnType,
    pub sender: Sender,
    pub data: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sender_roundtrip() {
        for s in [Sender::Customer, Sender::Bot] {
            assert_eq!(Sender::parse(s.as_str()), Some(s));
        }
        assert_eq!(Sender::parse("assistant"), None);
    }

    #[test]
    fn test_turn_type_roundtrip() {
        for t in [TurnType::Text, TurnType::FunctionCall, TurnType::FunctionResponse] {
            assert_eq!(TurnType::parse(t.as_str()), Some(t));
        }
        assert_eq!(TurnType::parse("image"), None);
    }

    #[test]
    fn test_conversation_is_open() {
        let mut conv = Conversation {
            id: 1,
            customer_id: "601".into(),
            start_time: 10,
            end_time: None,
            intent: None,
        };
        assert!(conv.is_open());
        conv.end_time = Some(20);
        assert!(!conv.is_open());
    }
}
