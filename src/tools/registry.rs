//! Tool registry: holds a route's tools and executes LLM tool calls.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use serde_json::Value;
use tracing::{error, info};

use crate::error::{Result, SwitchboardError};
use crate::llm::{Message, ToolCall, ToolDefinition};

use super::Tool;

/// A registry that holds the tools available to one agent.
///
/// Registration order is preserved so the definitions handed to the LLM are
/// stable across requests.
#[derive(Default)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
    order: Vec<String>,
}

impl ToolRegistry {
    /// Create a new empty tool registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry from a list of tools.
    pub fn from_tools(tools: Vec<Arc<dyn Tool>>) -> Self {
        let mut registry = Self::new();
        for tool in tools {
            registry.register(tool);
        }
        registry
    }

    /// Register a tool; a tool with the same name is replaced.
    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        let name = tool.name().to_string();
        if !self.tools.contains_key(&name) {
            self.order.push(name.clone());
        }
        self.tools.insert(name, tool);
    }

    /// Get a tool by name.
    pub fn get(&self, name: &str) -> Option<&Arc<dyn Tool>> {
        self.tools.get(name)
    }

    /// Execute a tool call and wrap the result as a tool-role message
    /// carrying the originating tool-call id.
    pub async fn call(&self, tool_call: &ToolCall) -> Result<Message> {
        let tool = self
            .tools
            .get(&tool_call.name)
            .ok_or_else(|| SwitchboardError::ToolNotFound(tool_call.name.clone()))?;

        let start = Instant::now();
        match tool.call(&tool_call.arguments).await {
            Ok(result) => {
                info!(
                    tool = %tool_call.name,
                    id = %tool_call.id,
                    latency_ms = start.elapsed().as_millis() as u64,
                    "Tool executed successfully"
                );
                Ok(Message::tool_result(&tool_call.id, &render_result(&result)))
            }
            Err(e) => {
                error!(
                    tool = %tool_call.name,
                    id = %tool_call.id,
                    latency_ms = start.elapsed().as_millis() as u64,
                    error = %e,
                    "Tool execution failed"
                );
                Err(e)
            }
        }
    }

    /// Tool definitions for the LLM, in registration order.
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.order
            .iter()
            .filter_map(|name| self.tools.get(name))
            .map(|tool| tool.definition())
            .collect()
    }

    /// Names of all registered tools, in registration order.
    pub fn names(&self) -> Vec<&str> {
        self.order.iter().map(|s| s.as_str()).collect()
    }

    /// Whether a tool with this name exists.
    pub fn has(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// Number of registered tools.
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Whether the registry holds no tools.
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

/// Render a tool result for the conversation log: bare strings stay bare,
/// everything else is serialized as JSON.
fn render_result(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::json;

    struct StaticTool {
        name: String,
        result: Value,
    }

    #[async_trait]
    impl Tool for StaticTool {
        fn name(&self) -> &str {
            &self.name
        }

        fn description(&self) -> &str {
            "Returns a fixed value"
        }

        fn parameters(&self) -> Value {
            json!({"type": "object", "properties": {}})
        }

        async fn call(&self, _arguments: &str) -> Result<Value> {
            Ok(self.result.clone())
        }
    }

    struct FailingTool;

    #[async_trait]
    impl Tool for FailingTool {
        fn name(&self) -> &str {
            "broken"
        }

        fn description(&self) -> &str {
            "Always fails"
        }

        fn parameters(&self) -> Value {
            json!({"type": "object", "properties": {}})
        }

        async fn call(&self, _arguments: &str) -> Result<Value> {
            Err(SwitchboardError::ToolExecution {
                name: "broken".into(),
                reason: "boom".into(),
            })
        }
    }

    fn registry() -> ToolRegistry {
        ToolRegistry::from_tools(vec![
            Arc::new(StaticTool {
                name: "echo".into(),
                result: json!({"ok": true}),
            }),
            Arc::new(StaticTool {
                name: "text".into(),
                result: json!("plain text"),
            }),
        ])
    }

    #[test]
    fn test_registration_and_lookup() {
        let registry = registry();
        assert_eq!(registry.len(), 2);
        assert!(registry.has("echo"));
        assert!(!registry.has("missing"));
        assert_eq!(registry.names(), vec!["echo", "text"]);
    }

    #[test]
    fn test_definitions_in_registration_order() {
        let defs = registry().definitions();
        assert_eq!(defs.len(), 2);
        assert_eq!(defs[0].name, "echo");
        assert_eq!(defs[1].name, "text");
    }

    #[test]
    fn test_replacing_tool_keeps_single_entry() {
        let mut registry = registry();
        registry.register(Arc::new(StaticTool {
            name: "echo".into(),
            result: json!(2),
        }));
        assert_eq!(registry.len(), 2);
    }

    #[tokio::test]
    async fn test_call_wraps_result_as_tool_message() {
        let registry = registry();
        let call = ToolCall::new("call_1", "echo", "{}");
        let msg = registry.call(&call).await.unwrap();
        assert_eq!(msg.role, crate::llm::Role::Tool);
        assert_eq!(msg.tool_call_id.as_deref(), Some("call_1"));
        assert_eq!(msg.content, r#"{"ok":true}"#);
    }

    #[tokio::test]
    async fn test_call_string_result_stays_bare() {
        let registry = registry();
        let call = ToolCall::new("call_2", "text", "{}");
        let msg = registry.call(&call).await.unwrap();
        assert_eq!(msg.content, "plain text");
    }

    #[tokio::test]
    async fn test_call_unknown_tool() {
        let registry = registry();
        let call = ToolCall::new("call_3", "missing", "{}");
        let err = registry.call(&call).await.unwrap_err();
        assert!(matches!(err, SwitchboardError::ToolNotFound(_)));
    }

    #[tokio::test]
    async fn test_call_propagates_tool_error() {
        let mut registry = registry();
        registry.register(Arc::new(FailingTool));
        let call = ToolCall::new("call_4", "broken", "{}");
        let err = registry.call(&call).await.unwrap_err();
        assert!(matches!(err, SwitchboardError::ToolExecution { .. }));
    }
}
