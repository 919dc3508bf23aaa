//! Child-process stdio adapter: line-delimited JSON-RPC over a subprocess's
//! stdin/stdout (spec.md §4.1: "adapter owns process lifecycle; termination
//! on scope exit is mandatory").

use aipo_adapter_api::{response::FinishReason, Adapter, AdapterError, AdapterSpec, ModelResponse};
use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::Mutex;

pub struct StdioAdapter {
    child: Mutex<Child>,
    next_id: AtomicU64,
}

impl StdioAdapter {
    pub fn spawn(spec: &AdapterSpec) -> Result<Self, String> {
        spec.validate()?;
        let command = spec
            .coordinates
            .command
            .as_ref()
            .expect("validated: stdio adapters require a command");
        let (program, args) = command.split_first().ok_or("empty command")?;

        let child = Command::new(program)
            .args(args)
            .stdin(std::process::Stdio::piped())
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| format!("failed to spawn stdio adapter process: {e}"))?;

        Ok(Self { child: Mutex::new(child), next_id: AtomicU64::new(1) })
    }
}

#[async_trait]
impl Adapter for StdioAdapter {
    async fn invoke(&self, prompt: &str, params: &serde_json::Value) -> Result<ModelResponse, AdapterError> {
        let start = Instant::now();
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let request = serde_json::json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": "invoke",
            "params": {"prompt": prompt, "params": params},
        });
        let mut line = serde_json::to_string(&request).map_err(|e| AdapterError::Protocol(e.to_string()))?;
        line.push('\n');

        let mut child = self.child.lock().await;
        let stdin = child
            .stdin
            .as_mut()
            .ok_or_else(|| AdapterError::Protocol("stdio adapter process has no stdin".into()))?;
        stdin
            .write_all(line.as_bytes())
            .await
            .map_err(|e| AdapterError::Transient(e.to_string()))?;
        stdin.flush().await.map_err(|e| AdapterError::Transient(e.to_string()))?;

        let stdout = child
            .stdout
            .as_mut()
            .ok_or_else(|| AdapterError::Protocol("stdio adapter process has no stdout".into()))?;
        let mut reader = BufReader::new(stdout);
        let mut response_line = String::new();
        reader
            .read_line(&mut response_line)
            .await
            .map_err(|e| AdapterError::Transient(e.to_string()))?;
        if response_line.is_empty() {
            return Err(AdapterError::Transient("stdio adapter process closed its stdout".into()));
        }

        let reply: serde_json::Value =
            serde_json::from_str(response_line.trim_end()).map_err(|e| AdapterError::Protocol(e.to_string()))?;

        if let Some(err) = reply.get("error") {
            return Err(AdapterError::Protocol(format!("stdio adapter error response: {err}")));
        }
        let text = reply
            .pointer("/result/text")
            .and_then(|v| v.as_str())
            .ok_or_else(|| AdapterError::Protocol("response missing result.text".into()))?
            .to_string();

        Ok(ModelResponse {
            text,
            finish_reason: FinishReason::Stop,
            input_tokens: 0,
            output_tokens: 0,
            latency_ms: start.elapsed().as_millis() as u64,
            raw_meta: reply,
            tool_calls: Vec::new(),
        })
    }

    fn provider_name(&self) -> &'static str {
        "stdio"
    }
}

impl Drop for StdioAdapter {
    fn drop(&mut self) {
        // `kill_on_drop(true)` on the Command handles process teardown; this
        // is here only as a belt-and-braces signal for callers reading the
        // type and to note the invariant explicitly: stdio adapters never
        // outlive their scope (spec.md §4.1).
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aipo_adapter_api::spec::{Coordinates, ProviderKind, RateLimitParams, RetryPolicy};
    use std::collections::HashMap;

    fn echo_script_spec() -> AdapterSpec {
        // A tiny shell pipeline that echoes back a canned JSON-RPC reply for
        // any input line, enough to exercise the framing without a real
        // model-context-protocol server.
        AdapterSpec {
            name: "t".into(),
            kind: ProviderKind::Stdio,
            coordinates: Coordinates {
                endpoint: None,
                command: Some(vec![
                    "sh".into(),
                    "-c".into(),
                    "while read -r _; do echo '{\"jsonrpc\":\"2.0\",\"id\":1,\"result\":{\"text\":\"ok\"}}'; done".into(),
                ]),
            },
            auth: None,
            params: HashMap::new(),
            rate_limit: RateLimitParams::default(),
            retry: RetryPolicy::default(),
        }
    }

    #[tokio::test]
    async fn round_trips_one_request_through_the_subprocess() {
        let adapter = StdioAdapter::spawn(&echo_script_spec()).unwrap();
        let resp = adapter.invoke("hello", &serde_json::json!({})).await.unwrap();
        assert_eq!(resp.text, "ok");
    }
}
