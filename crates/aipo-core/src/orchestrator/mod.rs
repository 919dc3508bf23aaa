//! Test execution strategies (spec.md §4.7). Single-turn and multi-turn
//! orchestrators share one contract: `execute(test, adapter) -> TestResult`.

pub mod multi_turn;
pub mod single_turn;

pub use multi_turn::{MultiTurnOrchestrator, ScoringMode, TurnStrategy};
pub use single_turn::SingleTurnOrchestrator;

use crate::cache::{cache_key, ttl_for_method, ResponseCache, SingleFlightRole};
use crate::cost::CostTable;
use crate::detector::Detector;
use crate::errors::{AsrDenominatorMode, ErrorClassifier, RunError};
use crate::judge::Judge;
use crate::memory::ConversationMemory;
use crate::model::{Finding, TestCase, TestResult};
use crate::rate_limiter::GlobalRateLimiter;
use aipo_adapter_api::{Adapter, AdapterError, ModelResponse};
use aipo_common::Cancellation;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Instant;

/// Handles shared by every orchestrator invocation: cache, rate limiter,
/// memory, classification pipeline. Cheap to clone (everything inside is
/// reference-counted).
#[derive(Clone)]
pub struct ExecutionContext {
    pub cache: ResponseCache,
    pub cache_enabled: bool,
    pub rate_limiter: Arc<GlobalRateLimiter>,
    pub memory: Arc<ConversationMemory>,
    pub detectors: Arc<Vec<Box<dyn Detector>>>,
    pub judge: Arc<dyn Judge>,
    pub jailbreak_threshold: f64,
    pub asr_mode: AsrDenominatorMode,
    pub model_id: String,
    pub cost_table: Arc<CostTable>,
}

impl ExecutionContext {
    /// Dollar estimate for one adapter call, looked up by `model_id` with
    /// the cost table's configured fallback price for unknown models
    /// (spec.md §4: per-model cost estimation).
    pub fn estimate_cost(&self, response: &ModelResponse) -> f64 {
        self.cost_table.estimate(&self.model_id, response.input_tokens, response.output_tokens)
    }
}

impl ExecutionContext {
    /// Calls the adapter through the rate limiter, consulting and populating
    /// the response cache first (spec.md §4.1 data flow, §4.3 single-flight).
    async fn invoke_cached(
        &self,
        prompt: &str,
        params: &serde_json::Value,
        adapter: &dyn Adapter,
        cancel: &mut Cancellation,
    ) -> Result<(ModelResponse, bool), RunError> {
        if !self.cache_enabled {
            let resp = self.call_adapter(prompt, params, adapter, cancel).await?;
            return Ok((resp, false));
        }

        let key = cache_key("invoke", &self.model_id, prompt, params);
        loop {
            if let Some(entry) = self.cache.get(&key).map_err(|e| RunError::other(e.to_string()))? {
                return Ok((entry.value, true));
            }

            match self.cache.single_flight_gate(&key).await {
                SingleFlightRole::Follower => continue,
                SingleFlightRole::Leader(_guard) => {
                    let resp = self.call_adapter(prompt, params, adapter, cancel).await?;
                    // A failed insertion must not poison the key: `Put` only
                    // runs once the call above already succeeded.
                    self.cache
                        .put(&key, &resp, ttl_for_method("invoke"))
                        .map_err(|e| RunError::other(e.to_string()))?;
                    return Ok((resp, false));
                }
            }
        }
    }

    async fn call_adapter(
        &self,
        prompt: &str,
        params: &serde_json::Value,
        adapter: &dyn Adapter,
        cancel: &mut Cancellation,
    ) -> Result<ModelResponse, RunError> {
        self.rate_limiter
            .acquire(1, cancel)
            .await
            .map_err(|_| RunError::from_adapter_error(&AdapterError::Cancelled))?;

        tokio::select! {
            result = adapter.invoke(prompt, params) => {
                result.map_err(|e| RunError::from_adapter_error(&e).with_provider(adapter.provider_name()))
            }
            _ = cancel.cancelled() => {
                Err(RunError::from_adapter_error(&AdapterError::Cancelled))
            }
        }
    }

    fn run_detectors(&self, test_id: &str, response: &ModelResponse) -> Vec<Finding> {
        self.detectors.iter().flat_map(|d| d.detect(test_id, response)).collect()
    }
}

#[async_trait]
pub trait Orchestrator: Send + Sync {
    async fn execute(
        &self,
        test: &TestCase,
        adapter: &dyn Adapter,
        ctx: &ExecutionContext,
        cancel: &mut Cancellation,
    ) -> TestResult;
}

/// Shared helper: turn a raised [`RunError`] into the infrastructure/policy
/// error `TestResult` the [`ErrorClassifier`] says it should be (spec.md
/// §4.10, invariant: error-infrastructure never carries findings).
fn error_result(test_id: &str, err: &RunError, elapsed: Instant) -> TestResult {
    use crate::model::TestStatus;
    let latency_ms = elapsed.elapsed().as_millis() as u64;
    match ErrorClassifier::classify(err) {
        TestStatus::ErrorPolicy => TestResult::policy_error(test_id, latency_ms),
        _ => TestResult::infrastructure_error(test_id, latency_ms),
    }
}
