//! Tool types for wagate
//!
//! This module defines the `Tool` trait that every model-callable function
//! implements, and the `ToolContext` handed to it on each invocation.

use async_trait::async_trait;
use serde_json::Value;

use crate::error::Result;

/// Trait that all tools must implement.
///
/// Tools are local functions the model can call by name during the
/// tool-calling loop. The returned value is wrapped as `{"result": value}`
/// before it goes back to the model.
///
/// # Example
///
/// ```rust
/// use async_trait::async_trait;
/// use serde_json::{json, Value};
/// use wagate::tools::{Tool, ToolContext};
/// use wagate::error::Result;
///
/// struct OpeningHours;
///
/// #[async_trait]
/// impl Tool for OpeningHours {
///     fn name(&self) -> &str { "opening_hours" }
///     fn description(&self) -> &str { "Store opening hours" }
///     fn parameters(&self) -> Value {
///         json!({"type": "object", "properties": {}})
///     }
///     async fn execute(&self, _args: Value, _ctx: &ToolContext) -> Result<Value> {
///         Ok(json!("09:00-18:00"))
///     }
/// }
/// ```
#[async_trait]
pub trait Tool: Send + Sync {
    /// Get the tool name.
    ///
    /// This name is used to identify the tool when the model requests it.
    /// It should be unique within a registry.
    fn name(&self) -> &str;

    /// Get the tool description sent to the model.
    fn description(&self) -> &str;

    /// Get the JSON schema for the tool's parameters.
    fn parameters(&self) -> Value;

    /// Execute the tool with the given arguments.
    async fn execute(&self, args: Value, ctx: &ToolContext) -> Result<Value>;
}

/// Context provided to tools during execution.
#[derive(Debug, Clone, Default)]
pub struct ToolContext {
    /// The correspondent the conversation belongs to
    pub customer_id: Option<String>,
    /// The open conversation the call is made from
    pub conversation_id: Option<i64>,
}

impl ToolContext {
    /// Create a new empty tool context.
    ///
    /// # Example
    /// ```
    /// use wagate::tools::ToolContext;
    ///
    /// let ctx = ToolContext::new().with_conversation("15550001111", 7);
    /// assert_eq!(ctx.customer_id.as_deref(), Some("15550001111"));
    /// assert_eq!(ctx.conversation_id, Some(7));
    /// ```
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_conversation(mut self, customer_id: &str, conversation_id: i64) -> Self {
        self.customer_id = Some(customer_id.to_string());
        self.conversation_id = Some(conversation_id);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tool_context_default() {
        let ctx = ToolContext::default();
        assert!(ctx.customer_id.is_none());
        assert!(ctx.conversation_id.is_none());
    }

    #[test]
    fn test_tool_context_clone() {
        let ctx1 = ToolContext::new().with_conversation("123", 1);
        let ctx2 = ctx1.clone();
        assert_eq!(ctx1.customer_id, ctx2.customer_id);
        assert_eq!(ctx1.conversation_id, ctx2.conversation_id);
    }
}
