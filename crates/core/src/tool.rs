//! Tool trait: the functions a model may call while looking at a plate.
//!
//! Tools are registered in a [`ToolRegistry`], advertised to the model as
//! [`ToolDefinition`]s and executed when the model asks for them.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use crate::error::ToolError;
use crate::provider::ToolDefinition;

/// A request to execute a tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Unique call ID (matches the LLM's tool_call.id)
    pub id: String,

    /// Name of the tool to execute
    pub name: String,

    /// Arguments as a JSON value
    pub arguments: serde_json::Value,
}

/// The result of a tool execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResult {
    /// The call ID this result is for
    pub call_id: String,

    /// Whether the tool executed successfully
    pub success: bool,

    /// The output content
    pub output: String,

    /// Optional structured data
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl ToolResult {
    /// A successful result carrying structured data; `output` is its JSON text.
    pub fn json(data: serde_json::Value) -> Self {
        Self {
            call_id: String::new(),
            success: true,
            output: data.to_string(),
            data: Some(data),
        }
    }

    /// A failed result with a JSON error body.
    pub fn error(call_id: impl Into<String>, data: serde_json::Value) -> Self {
        Self {
            call_id: call_id.into(),
            success: false,
            output: data.to_string(),
            data: Some(data),
        }
    }
}

/// The core Tool trait.
#[async_trait]
pub trait Tool: Send + Sync {
    /// The unique name of this tool (e.g., "compute_shannon_index").
    fn name(&self) -> &str;

    /// A description of what this tool does (sent to the LLM).
    fn description(&self) -> &str;

    /// JSON Schema describing this tool's parameters.
    fn parameters_schema(&self) -> serde_json::Value;

    /// Execute the tool with the given arguments.
    async fn execute(&self, arguments: serde_json::Value) -> std::result::Result<ToolResult, ToolError>;

    /// Convert this tool into a ToolDefinition for sending to the LLM.
    fn to_definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.parameters_schema(),
        }
    }
}

/// A registry of available tools, ordered by name.
pub struct ToolRegistry {
    tools: BTreeMap<String, Box<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: BTreeMap::new(),
        }
    }

    /// Register a tool. Replaces any existing tool with the same name.
    pub fn register(&mut self, tool: Box<dyn Tool>) {
        let name = tool.name().to_string();
        self.tools.insert(name, tool);
    }

    /// Get a tool by name.
    pub fn get(&self, name: &str) -> Option<&dyn Tool> {
        self.tools.get(name).map(|t| t.as_ref())
    }

    /// Get all tool definitions (for sending to the LLM).
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools.values().map(|t| t.to_definition()).collect()
    }

    /// Execute a tool call.
    pub async fn execute(&self, call: &ToolCall) -> std::result::Result<ToolResult, ToolError> {
        let tool = self.tools.get(&call.name).ok_or_else(|| ToolError::NotFound(call.name.clone()))?;
        let mut result = tool.execute(call.arguments.clone()).await?;
        result.call_id = call.id.clone();
        Ok(result)
    }

    /// Execute a batch of calls, one result per call.
    ///
    /// A failing or unknown tool yields an error result instead of aborting
    /// the batch, so the model still sees an answer for every call it made.
    pub async fn execute_all(&self, calls: &[ToolCall]) -> Vec<ToolResult> {
        let mut results = Vec::with_capacity(calls.len());
        for call in calls {
            let result = match self.execute(call).await {
                Ok(result) => result,
                Err(ToolError::NotFound(name)) => {
                    tracing::warn!(tool = %name, "Model requested an unknown tool");
                    ToolResult::error(
                        &call.id,
                        serde_json::json!({ "error": "Unknown function", "function_name": name }),
                    )
                }
                Err(e) => {
                    tracing::warn!(tool = %call.name, error = %e, "Tool execution failed");
                    ToolResult::error(
                        &call.id,
                        serde_json::json!({ "error": e.to_string(), "function_name": call.name }),
                    )
                }
            };
            results.push(result);
        }
        results
    }

    /// List all registered tool names.
    pub fn names(&self) -> Vec<&str> {
        self.tools.keys().map(|s| s.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

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

    /// A simple test tool for unit tests.
    struct EchoTool;

    #[async_trait]
    impl Tool for EchoTool {
        fn name(&self) -> &str { "echo" }
        fn description(&self) -> &str { "Echoes back the input" }
        fn parameters_schema(&self) -> serde_json::Value {
            serde_json::json!({
                "type": "object",
                "properties": {
                    "text": { "type": "string" }
                },
                "required": ["text"]
            })
        }
        async fn execute(&self, arguments: serde_json::Value) -> std::result::Result<ToolResult, ToolError> {
            let text = arguments["text"]
                .as_str()
                .ok_or_else(|| ToolError::InvalidArguments("Missing 'text' argument".into()))?;
            Ok(ToolResult::json(serde_json::json!({ "text": text })))
        }
    }

    #[test]
    fn registry_register_and_lookup() {
        let mut registry = ToolRegistry::new();
        registry.register(Box::new(EchoTool));
        assert!(registry.get("echo").is_some());
        assert!(registry.get("nonexistent").is_none());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn registry_definitions() {
        let mut registry = ToolRegistry::new();
        registry.register(Box::new(EchoTool));
        let defs = registry.definitions();
        assert_eq!(defs.len(), 1);
        assert_eq!(defs[0].name, "echo");
    }

    #[tokio::test]
    async fn registry_execute_sets_call_id() {
        let mut registry = ToolRegistry::new();
        registry.register(Box::new(EchoTool));

        let call = ToolCall {
            id: "call_1".into(),
            name: "echo".into(),
            arguments: serde_json::json!({"text": "hello world"}),
        };
        let result = registry.execute(&call).await.unwrap();
        assert!(result.success);
        assert_eq!(result.call_id, "call_1");
        assert_eq!(result.data.unwrap()["text"], "hello world");
    }

    #[tokio::test]
    async fn registry_execute_missing_tool() {
        let registry = ToolRegistry::new();
        let call = ToolCall {
            id: "call_1".into(),
            name: "nonexistent".into(),
            arguments: serde_json::json!({}),
        };
        let err = registry.execute(&call).await.unwrap_err();
        assert!(matches!(err, ToolError::NotFound(_)));
    }

    #[tokio::test]
    async fn execute_all_keeps_going_after_failures() {
        let mut registry = ToolRegistry::new();
        registry.register(Box::new(EchoTool));

        let calls = vec![
            ToolCall { id: "a".into(), name: "mystery".into(), arguments: serde_json::json!({}) },
            ToolCall { id: "b".into(), name: "echo".into(), arguments: serde_json::json!({}) },
            ToolCall { id: "c".into(), name: "echo".into(), arguments: serde_json::json!({"text": "ok"}) },
        ];
        let results = registry.execute_all(&calls).await;
        assert_eq!(results.len(), 3);

        assert!(!results[0].success);
        assert_eq!(results[0].call_id, "a");
        assert_eq!(results[0].data.as_ref().unwrap()["error"], "Unknown function");
        assert_eq!(results[0].data.as_ref().unwrap()["function_name"], "mystery");

        assert!(!results[1].success);
        assert!(results[1].output.contains("Missing 'text'"));

        assert!(results[2].success);
        assert_eq!(results[2].call_id, "c");
    }
}
