//! Tool registry for wagate
//!
//! This module provides the `ToolRegistry` struct for managing and executing tools.
//! Tools are registered once at startup, either as `Tool` implementations or as
//! typed closures via [`ToolRegistry::register_fn`], and are looked up by name.

use std::collections::HashMap;
use std::future::Future;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use futures::future::BoxFuture;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use tracing::{error, info, warn};

use crate::error::{GatewayError, Result};
use crate::providers::ToolDefinition;

use super::{Tool, ToolContext};

type Handler = Box<dyn Fn(Value) -> BoxFuture<'static, Result<Value>> + Send + Sync>;

/// A tool built from a closure whose arguments are deserialized into a typed struct.
struct FnTool {
    name: String,
    description: String,
    parameters: Value,
    handler: Handler,
}

#[async_trait]
impl Tool for FnTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn parameters(&self) -> Value {
        self.parameters.clone()
    }

    async fn execute(&self, args: Value, _ctx: &ToolContext) -> Result<Value> {
        (self.handler)(args).await
    }
}

/// A registry that holds and manages tools.
///
/// # Example
///
/// ```rust
/// use serde::Deserialize;
/// use serde_json::json;
/// use wagate::tools::{ToolContext, ToolRegistry};
///
/// #[derive(Deserialize)]
/// struct Args { a: i64, b: i64 }
///
/// # tokio_test::block_on(async {
/// let mut registry = ToolRegistry::new();
/// registry.register_fn::<Args, _, _>(
///     "add",
///     "Add two integers",
///     json!({
///         "type": "object",
///         "properties": {"a": {"type": "integer"}, "b": {"type": "integer"}},
///         "required": ["a", "b"]
///     }),
///     |args| async move { Ok(json!(args.a + args.b)) },
/// );
///
/// let result = registry.execute("add", json!({"a": 2, "b": 3}), &ToolContext::new()).await;
/// assert_eq!(result.unwrap(), json!(5));
/// # });
/// ```
pub struct ToolRegistry {
    tools: HashMap<String, Box<dyn Tool>>,
}

impl ToolRegistry {
    /// Create a new empty tool registry.
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
        }
    }

    /// Register a new tool in the registry.
    ///
    /// If a tool with the same name already exists, it will be replaced.
    pub fn register(&mut self, tool: Box<dyn Tool>) {
        let name = tool.name().to_string();
        info!(tool = %name, "Registering tool");
        self.tools.insert(name, tool);
    }

    /// Register a closure as a tool.
    ///
    /// Arguments from the model are deserialized into `A` before the handler
    /// runs; a mismatch is reported as a tool error, not a panic.
    pub fn register_fn<A, F, Fut>(
        &mut self,
        name: &str,
        description: &str,
        parameters: Value,
        handler: F,
    ) where
        A: DeserializeOwned + Send + 'static,
        F: Fn(A) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value>> + Send + 'static,
    {
        let tool_name = name.to_string();
        let erased: Handler = Box::new(move |args: Value| -> BoxFuture<'static, Result<Value>> {
            // A call without arguments reads as an empty object
            let args = if args.is_null() { json!({}) } else { args };
            match serde_json::from_value::<A>(args) {
                Ok(parsed) => Box::pin(handler(parsed)),
                Err(e) => {
                    let msg = format!("invalid arguments for {}: {}", tool_name, e);
                    Box::pin(async move { Err(GatewayError::ToolExecution(msg)) })
                }
            }
        });
        self.register(Box::new(FnTool {
            name: name.to_string(),
            description: description.to_string(),
            parameters,
            handler: erased,
        }));
    }

    /// Get a tool by name.
    pub fn get(&self, name: &str) -> Option<&dyn Tool> {
        self.tools.get(name).map(|t| t.as_ref())
    }

    /// Execute a tool by name.
    ///
    /// Unknown names return [`GatewayError::ToolNotFound`].
    pub async fn execute(&self, name: &str, args: Value, ctx: &ToolContext) -> Result<Value> {
        let tool = self
            .tools
            .get(name)
            .ok_or_else(|| GatewayError::ToolNotFound(name.to_string()))?;

        let start = Instant::now();

        match tool.execute(args, ctx).await {
            Ok(output) => {
                info!(
                    tool = name,
                    duration_ms = start.elapsed().as_millis() as u64,
                    "Tool executed successfully"
                );
                Ok(output)
            }
            Err(e) => {
                error!(
                    tool = name,
                    error = %e,
                    duration_ms = start.elapsed().as_millis() as u64,
                    "Tool execution failed"
                );
                Err(e)
            }
        }
    }

    /// Execute a tool and wrap the outcome as a function-response payload.
    ///
    /// Never fails: errors, timeouts and unknown names become
    /// `{"result": "Error: ..."}` so the model always receives a result.
    pub async fn invoke(
        &self,
        name: &str,
        args: Value,
        ctx: &ToolContext,
        timeout: Duration,
    ) -> Value {
        match tokio::time::timeout(timeout, self.execute(name, args, ctx)).await {
            Ok(Ok(value)) => json!({ "result": value }),
            Ok(Err(e)) => json!({ "result": format!("Error: {}", e) }),
            Err(_) => {
                warn!(tool = name, timeout_ms = timeout.as_millis() as u64, "Tool timed out");
                json!({ "result": format!("Error: tool '{}' timed out after {:?}", name, timeout) })
            }
        }
    }

    /// Get all tool definitions, sorted by name so prompts are stable.
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        let mut defs: Vec<ToolDefinition> = self
            .tools
            .values()
            .map(|t| ToolDefinition {
                name: t.name().to_string(),
                description: t.description().to_string(),
                parameters: t.parameters(),
            })
            .collect();
        defs.sort_by(|a, b| a.name.cmp(&b.name));
        defs
    }

    /// Get the names of all registered tools, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.tools.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }

    /// Check if a tool exists in the registry.
    pub fn has(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// Get the number of registered tools.
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Check if the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    struct EchoTool;

    #[async_trait]
    impl Tool for EchoTool {
        fn name(&self) -> &str {
            "echo"
        }
        fn description(&self) -> &str {
            "Echoes back the provided message"
        }
        fn parameters(&self) -> Value {
            json!({"type": "object", "properties": {"message": {"type": "string"}}})
        }
        async fn execute(&self, args: Value, _ctx: &ToolContext) -> Result<Value> {
            Ok(args.get("message").cloned().unwrap_or(Value::Null))
        }
    }

    #[derive(Deserialize)]
    struct DivideArgs {
        a: f64,
        b: f64,
    }

    fn registry_with_divide() -> ToolRegistry {
        let mut registry = ToolRegistry::new();
        registry.register_fn::<DivideArgs, _, _>(
            "divide",
            "Divide a by b",
            json!({"type": "object", "properties": {"a": {"type": "number"}, "b": {"type": "number"}}}),
            |args| async move {
                if args.b == 0.0 {
                    return Err(GatewayError::ToolExecution("division by zero".into()));
                }
                Ok(json!(args.a / args.b))
            },
        );
        registry
    }

    #[test]
    fn test_registry_new() {
        let registry = ToolRegistry::default();
        assert!(registry.is_empty());
        assert_eq!(registry.len(), 0);
    }

    #[test]
    fn test_registry_register_and_replace() {
        let mut registry = ToolRegistry::new();
        registry.register(Box::new(EchoTool));
        registry.register(Box::new(EchoTool));
        assert_eq!(registry.len(), 1);
        assert!(registry.has("echo"));
        assert_eq!(registry.get("echo").unwrap().name(), "echo");
        assert!(registry.get("nonexistent").is_none());
    }

    #[tokio::test]
    async fn test_execute_trait_tool() {
        let mut registry = ToolRegistry::new();
        registry.register(Box::new(EchoTool));
        let result = registry
            .execute("echo", json!({"message": "hello"}), &ToolContext::new())
            .await
            .unwrap();
        assert_eq!(result, json!("hello"));
    }

    #[tokio::test]
    async fn test_execute_unknown_tool() {
        let registry = ToolRegistry::new();
        let err = registry
            .execute("nonexistent", json!({}), &ToolContext::new())
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::ToolNotFound(name) if name == "nonexistent"));
    }

    #[tokio::test]
    async fn test_register_fn_bad_arguments() {
        let registry = registry_with_divide();
        let err = registry
            .execute("divide", json!({"a": "ten"}), &ToolContext::new())
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::ToolExecution(_)));
    }

    #[tokio::test]
    async fn test_invoke_wraps_results() {
        let registry = registry_with_divide();
        let ctx = ToolContext::new();
        let timeout = Duration::from_secs(1);

        let ok = registry
            .invoke("divide", json!({"a": 9, "b": 3}), &ctx, timeout)
            .await;
        assert_eq!(ok, json!({"result": 3.0}));

        let failed = registry
            .invoke("divide", json!({"a": 1, "b": 0}), &ctx, timeout)
            .await;
        assert!(failed["result"]
            .as_str()
            .unwrap()
            .starts_with("Error: Tool error: division by zero"));

        let missing = registry.invoke("nope", json!({}), &ctx, timeout).await;
        assert_eq!(missing["result"], "Error: Tool not found: nope");
    }

    #[tokio::test]
    async fn test_register_fn_null_arguments_read_as_empty() {
        #[derive(Deserialize)]
        struct Query {
            #[serde(default)]
            query: String,
        }

        let mut registry = ToolRegistry::new();
        registry.register_fn::<Query, _, _>("search", "Search", json!({}), |args| async move {
            Ok(json!(args.query.len()))
        });
        let out = registry
            .invoke("search", Value::Null, &ToolContext::new(), Duration::from_secs(1))
            .await;
        assert_eq!(out, json!({"result": 0}));
    }

    #[tokio::test]
    async fn test_invoke_timeout() {
        let mut registry = ToolRegistry::new();
        registry.register_fn::<Value, _, _>("slow", "Never returns in time", json!({}), |_| async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(json!("late"))
        });
        let out = registry
            .invoke("slow", json!({}), &ToolContext::new(), Duration::from_millis(20))
            .await;
        assert!(out["result"].as_str().unwrap().contains("timed out"));
    }

    #[test]
    fn test_definitions_sorted() {
        let mut registry = registry_with_divide();
        registry.register(Box::new(EchoTool));
        let defs = registry.definitions();
        let names: Vec<&str> = defs.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec!["divide", "echo"]);
        assert_eq!(registry.names(), vec!["divide", "echo"]);
        assert!(defs[1].parameters.is_object());
    }
}
