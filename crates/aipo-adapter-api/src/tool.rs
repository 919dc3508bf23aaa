use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A structured tool invocation the target emitted (spec.md §3 `ModelResponse.tool_calls`).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolCall {
    pub name: String,
    pub arguments: Value,
}

/// A tool a tool-capable target advertises via `enumerate_tools`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolSpec {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub input_schema: Value,
}
