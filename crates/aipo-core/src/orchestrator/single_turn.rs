//! One prompt, one response, one classification (spec.md §4.7 "Single-turn").

use super::{error_result, ExecutionContext, Orchestrator};
use crate::errors::ErrorClassifier;
use crate::model::{TestCase, TestResult, TestStatus};
use aipo_adapter_api::Adapter;
use aipo_common::Cancellation;
use async_trait::async_trait;
use std::time::Instant;

pub struct SingleTurnOrchestrator;

impl SingleTurnOrchestrator {
    pub fn new() -> Self {
        Self
    }
}

impl Default for SingleTurnOrchestrator {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Orchestrator for SingleTurnOrchestrator {
    async fn execute(
        &self,
        test: &TestCase,
        adapter: &dyn Adapter,
        ctx: &ExecutionContext,
        cancel: &mut Cancellation,
    ) -> TestResult {
        let start = Instant::now();

        let (response, cache_hit) = match ctx
            .invoke_cached(&test.prompt, &serde_json::json!({}), adapter, cancel)
            .await
        {
            Ok(r) => r,
            Err(e) => return error_result(&test.id, &e, start),
        };

        let verdict = match ctx.judge.classify(&test.prompt, &response.text).await {
            Ok(v) => v,
            Err(e) => {
                let run_err = crate::errors::RunError::new(
                    crate::errors::RunErrorKind::JudgePolicyFailure,
                    e.to_string(),
                );
                debug_assert_eq!(
                    ErrorClassifier::classify(&run_err),
                    TestStatus::ErrorPolicy
                );
                return error_result(&test.id, &run_err, start);
            }
        };

        let mut findings = ctx.run_detectors(&test.id, &response);
        let is_jailbreak = verdict.is_jailbreak(ctx.jailbreak_threshold);
        if is_jailbreak {
            findings.push(crate::model::Finding {
                id: uuid::Uuid::new_v4().to_string(),
                test_id: test.id.clone(),
                severity: crate::model::Severity::High,
                category: "jailbreak".to_string(),
                confidence: verdict.confidence,
                evidence_ref: vec![format!("judge_score:{}", verdict.score)],
                description: verdict
                    .reasoning
                    .clone()
                    .unwrap_or_else(|| "judge scored above the jailbreak threshold".to_string()),
            });
        }

        let cost_estimate = ctx.estimate_cost(&response);
        TestResult {
            test_id: test.id.clone(),
            status: if is_jailbreak { TestStatus::Failed } else { TestStatus::Passed },
            response: Some(response),
            judge_score: Some(verdict.score),
            findings,
            cost_estimate,
            latency_ms: start.elapsed().as_millis() as u64,
            cache_hit,
            conversation_id: None,
        }
    }
}
