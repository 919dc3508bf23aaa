//! HTTP-family adapter covering `openai-compatible`, `anthropic`,
//! `generic-http` and `local-http` provider kinds (spec.md §4.1). Request/
//! response shaping is the one thing that varies per kind; transport,
//! retry, and auth handling are shared, grounded in the teacher's
//! `providers/llm/openai.rs` request-building style.

use super::retry::with_retries;
use aipo_adapter_api::{response::FinishReason, Adapter, AdapterError, AdapterSpec, ModelResponse, ProviderKind};
use async_trait::async_trait;
use std::time::Instant;

pub struct HttpAdapter {
    spec: AdapterSpec,
    client: reqwest::Client,
}

impl HttpAdapter {
    pub fn new(spec: AdapterSpec) -> Result<Self, String> {
        spec.validate()?;
        Ok(Self { spec, client: reqwest::Client::new() })
    }

    fn endpoint(&self) -> &str {
        self.spec
            .coordinates
            .endpoint
            .as_deref()
            .expect("validated at construction")
    }

    fn model_id(&self) -> String {
        self.spec
            .params
            .get("model")
            .and_then(|v| v.as_str())
            .unwrap_or("default")
            .to_string()
    }

    fn build_request_body(&self, prompt: &str, params: &serde_json::Value) -> serde_json::Value {
        match self.spec.kind {
            ProviderKind::Anthropic => serde_json::json!({
                "model": self.model_id(),
                "max_tokens": params.get("max_tokens").cloned().unwrap_or(serde_json::json!(1024)),
                "messages": [{"role": "user", "content": prompt}],
            }),
            _ => serde_json::json!({
                "model": self.model_id(),
                "messages": [{"role": "user", "content": prompt}],
                "temperature": params.get("temperature").cloned().unwrap_or(serde_json::json!(0.0)),
            }),
        }
    }

    fn extract_text(&self, body: &serde_json::Value) -> Result<String, AdapterError> {
        let text = match self.spec.kind {
            ProviderKind::Anthropic => body
                .pointer("/content/0/text")
                .and_then(|v| v.as_str()),
            _ => body.pointer("/choices/0/message/content").and_then(|v| v.as_str()),
        };
        text.map(str::to_string)
            .ok_or_else(|| AdapterError::Protocol(format!("response missing expected text field: {body}")))
    }

    async fn call_once(&self, prompt: &str, params: &serde_json::Value) -> Result<ModelResponse, AdapterError> {
        let start = Instant::now();
        let body = self.build_request_body(prompt, params);
        let mut request = self.client.post(self.endpoint()).json(&body);

        if let Some(auth) = &self.spec.auth {
            let token = auth.resolve().map_err(AdapterError::Auth)?;
            request = match self.spec.kind {
                ProviderKind::Anthropic => request.header("x-api-key", token),
                _ => request.header("Authorization", format!("Bearer {token}")),
            };
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                AdapterError::Timeout(start.elapsed())
            } else {
                AdapterError::Transient(e.to_string())
            }
        })?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            return Err(AdapterError::Auth(format!("http {status}")));
        }
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse::<u64>().ok())
                .map(std::time::Duration::from_secs);
            return Err(AdapterError::RateLimit("http 429".into(), retry_after));
        }
        if status.is_server_error() {
            return Err(AdapterError::Transient(format!("http {status}")));
        }
        if !status.is_success() {
            return Err(AdapterError::Protocol(format!("http {status}")));
        }

        let json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| AdapterError::Protocol(e.to_string()))?;
        let text = self.extract_text(&json)?;

        Ok(ModelResponse {
            text,
            finish_reason: FinishReason::Stop,
            input_tokens: json.pointer("/usage/prompt_tokens").and_then(|v| v.as_u64()).unwrap_or(0),
            output_tokens: json.pointer("/usage/completion_tokens").and_then(|v| v.as_u64()).unwrap_or(0),
            latency_ms: start.elapsed().as_millis() as u64,
            raw_meta: json,
            tool_calls: Vec::new(),
        })
    }
}

#[async_trait]
impl Adapter for HttpAdapter {
    async fn invoke(&self, prompt: &str, params: &serde_json::Value) -> Result<ModelResponse, AdapterError> {
        with_retries(&self.spec, || self.call_once(prompt, params)).await
    }

    fn provider_name(&self) -> &'static str {
        match self.spec.kind {
            ProviderKind::Anthropic => "anthropic",
            ProviderKind::Bedrock => "bedrock",
            ProviderKind::LocalHttp => "local-http",
            _ => "openai-compatible",
        }
    }

    fn fingerprint(&self) -> Option<String> {
        Some(aipo_common::sha256_hex_prefix(
            format!("{:?}:{}:{}", self.spec.kind, self.endpoint(), self.model_id()).as_bytes(),
            16,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aipo_adapter_api::spec::{Coordinates, RateLimitParams, RetryPolicy};
    use std::collections::HashMap;

    fn openai_spec(endpoint: &str) -> AdapterSpec {
        AdapterSpec {
            name: "t".into(),
            kind: ProviderKind::OpenaiCompatible,
            coordinates: Coordinates { endpoint: Some(endpoint.into()), command: None },
            auth: None,
            params: HashMap::new(),
            rate_limit: RateLimitParams::default(),
            retry: RetryPolicy { max_attempts: 1, base_backoff_ms: 1, max_backoff_ms: 1 },
        }
    }

    #[test]
    fn extract_text_reads_openai_shape() {
        let adapter = HttpAdapter::new(openai_spec("http://localhost")).unwrap();
        let body = serde_json::json!({"choices": [{"message": {"content": "hi"}}]});
        assert_eq!(adapter.extract_text(&body).unwrap(), "hi");
    }

    #[test]
    fn extract_text_missing_field_is_protocol_error() {
        let adapter = HttpAdapter::new(openai_spec("http://localhost")).unwrap();
        let err = adapter.extract_text(&serde_json::json!({})).unwrap_err();
        assert!(matches!(err, AdapterError::Protocol(_)));
    }

    #[test]
    fn fingerprint_is_stable_for_same_spec() {
        let adapter = HttpAdapter::new(openai_spec("http://localhost")).unwrap();
        assert_eq!(adapter.fingerprint(), adapter.fingerprint());
    }
}
