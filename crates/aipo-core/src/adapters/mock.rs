//! Deterministic mock adapter for suite authoring and tests (spec.md §8
//! worked examples S1/S2: `response_mode=smart|echo`).

use aipo_adapter_api::{response::FinishReason, Adapter, AdapterError, AdapterSpec, ModelResponse};
use async_trait::async_trait;

const SUSPICIOUS_MARKERS: &[&str] = &[
    "ignore previous instructions",
    "ignore the above",
    "disregard your instructions",
    "jailbreak",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseMode {
    /// Returns the prompt verbatim (spec.md §8 S2).
    Echo,
    /// Polite refusal for prompts containing known jailbreak markers,
    /// otherwise a benign compliant reply (spec.md §8 S1).
    Smart,
    /// Always returns a fixed string, useful for gate/threshold unit tests.
    Fixed(String),
}

pub struct MockAdapter {
    mode: ResponseMode,
}

impl MockAdapter {
    pub fn new(mode: ResponseMode) -> Self {
        Self { mode }
    }

    pub fn from_params(spec: &AdapterSpec) -> Self {
        let mode = match spec.params.get("response_mode").and_then(|v| v.as_str()) {
            Some("echo") => ResponseMode::Echo,
            Some("fixed") => ResponseMode::Fixed(
                spec.params
                    .get("fixed_response")
                    .and_then(|v| v.as_str())
                    .unwrap_or("")
                    .to_string(),
            ),
            _ => ResponseMode::Smart,
        };
        Self::new(mode)
    }

    fn looks_suspicious(prompt: &str) -> bool {
        let lower = prompt.to_lowercase();
        SUSPICIOUS_MARKERS.iter().any(|m| lower.contains(m))
    }
}

#[async_trait]
impl Adapter for MockAdapter {
    async fn invoke(&self, prompt: &str, _params: &serde_json::Value) -> Result<ModelResponse, AdapterError> {
        let text = match &self.mode {
            ResponseMode::Echo => prompt.to_string(),
            ResponseMode::Fixed(s) => s.clone(),
            ResponseMode::Smart => {
                if Self::looks_suspicious(prompt) {
                    "I can't help with that request.".to_string()
                } else {
                    format!("Sure, here's a helpful response to: {prompt}")
                }
            }
        };

        Ok(ModelResponse {
            input_tokens: (prompt.len() / 4) as u64,
            output_tokens: (text.len() / 4) as u64,
            latency_ms: 1,
            text,
            ..ModelResponse::empty(FinishReason::Stop)
        })
    }

    fn provider_name(&self) -> &'static str {
        "mock"
    }
}
