//! Uniform contract over many provider transports (spec.md §4.1).
//!
//! Every concrete target — an OpenAI-compatible HTTP endpoint, Anthropic,
//! Bedrock, a local HTTP server, a stdio subprocess, or a mock — implements
//! [`Adapter`]. The engine never speaks a provider's wire format directly; it
//! only ever calls through this trait.

pub mod error;
pub mod response;
pub mod spec;
pub mod tool;

pub use error::{AdapterError, RetryAdvice};
pub use response::ModelResponse;
pub use spec::{AdapterSpec, AuthRef, ProviderKind, RateLimitParams, RetryPolicy};
pub use tool::{ToolCall, ToolSpec};

use async_trait::async_trait;
use serde_json::Value;

/// Parameters passed through to a single `invoke` call (temperature, max
/// tokens, etc). Kept as an opaque JSON bag so adapter implementations can
/// accept provider-specific knobs without widening this trait.
pub type InvokeParams = Value;

/// The contract every target implementation satisfies (spec.md §4.1).
#[async_trait]
pub trait Adapter: Send + Sync {
    /// Send `prompt` to the target and return its response.
    ///
    /// Implementations must map transport failures to the appropriate
    /// [`AdapterError`] variant rather than a generic error, so the engine's
    /// `ErrorClassifier` can make a correct infrastructure-vs-finding call.
    async fn invoke(
        &self,
        prompt: &str,
        params: &InvokeParams,
    ) -> Result<ModelResponse, AdapterError>;

    /// List tools the target exposes, for tool-capable targets (e.g.
    /// model-context-protocol servers). Adapters that don't support tool use
    /// return an empty list.
    async fn enumerate_tools(&self) -> Result<Vec<ToolSpec>, AdapterError> {
        Ok(Vec::new())
    }

    /// Invoke a single tool by name with JSON-encoded arguments. Only
    /// meaningful for tool-capable targets.
    async fn call_tool(
        &self,
        _name: &str,
        _args_json: &Value,
    ) -> Result<Value, AdapterError> {
        Err(AdapterError::Protocol(
            "target does not support tool calls".into(),
        ))
    }

    /// Stable identifier for the provider kind driving this adapter
    /// (`openai-compatible`, `anthropic`, `mock`, ...). Used in cache keys and
    /// evidence provenance.
    fn provider_name(&self) -> &'static str;

    /// Adapter-specific fingerprint folded into cache keys (e.g. endpoint +
    /// model id) so responses from different targets never collide.
    fn fingerprint(&self) -> Option<String> {
        None
    }
}
