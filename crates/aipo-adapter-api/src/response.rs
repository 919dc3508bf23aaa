use crate::tool::ToolCall;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Produced by [`crate::Adapter::invoke`] (spec.md §3 `ModelResponse`).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ModelResponse {
    pub text: String,
    pub finish_reason: FinishReason,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub latency_ms: u64,
    /// Opaque provider-specific metadata (headers, request ids, raw usage
    /// blocks). Never includes credentials.
    #[serde(default)]
    pub raw_meta: Value,
    /// Structured tool calls, if the target invoked any. Preserved alongside
    /// `text` even when the provider returns both (spec.md §4.1 tie-break).
    #[serde(default)]
    pub tool_calls: Vec<ToolCall>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    Stop,
    Length,
    ToolCalls,
    ContentFilter,
    Other,
}

impl ModelResponse {
    pub fn empty(finish_reason: FinishReason) -> Self {
        Self {
            text: String::new(),
            finish_reason,
            input_tokens: 0,
            output_tokens: 0,
            latency_ms: 0,
            raw_meta: Value::Null,
            tool_calls: Vec::new(),
        }
    }
}
