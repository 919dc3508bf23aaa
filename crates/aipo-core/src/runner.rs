//! Concurrent suite executor (spec.md §4.8 TestRunner). Grounded in the
//! teacher's `Runner::run_suite` (`assay-core/src/engine/runner.rs`): a
//! `Semaphore`-bounded `JoinSet` worker pool, completion-order collection
//! followed by a deterministic re-sort for reporting. Generalized with a
//! bounded result channel for backpressure, a shared budget tracker, and
//! per-test timeouts, none of which the teacher's single-process runner
//! needed.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use aipo_adapter_api::Adapter;
use aipo_common::{pair as cancellation_pair, Cancellation, CancellationHandle};
use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinSet;

use crate::errors::{AsrDenominatorMode, ErrorClassifier};
use crate::model::{RunSummary, StatusCounts, Suite, TestResult, TestStatus};
use crate::orchestrator::{ExecutionContext, Orchestrator};
use crate::quarantine::{QuarantineMode, QuarantineService};
use crate::stats::auto_interval;

/// Per-run ceilings (spec.md §4.8 "Budget: per-run max total cost estimate
/// in USD, max wall-clock, max total tokens"). Any field left `None` is
/// unenforced.
#[derive(Debug, Clone, Copy, Default)]
pub struct RunBudget {
    pub max_cost_usd: Option<f64>,
    pub max_wall_clock: Option<Duration>,
    pub max_total_tokens: Option<u64>,
}

#[derive(Default)]
struct BudgetState {
    cost_usd: f64,
    total_tokens: u64,
}

/// Shared, lock-protected budget accumulator. Workers report spend after
/// each completed test; the run loop checks it against `RunBudget` and fires
/// cancellation the first time any ceiling is crossed (spec.md §4.8).
struct BudgetTracker {
    budget: RunBudget,
    started_at: Instant,
    state: Mutex<BudgetState>,
    exceeded: AtomicBool,
}

impl BudgetTracker {
    fn new(budget: RunBudget) -> Self {
        Self { budget, started_at: Instant::now(), state: Mutex::new(BudgetState::default()), exceeded: AtomicBool::new(false) }
    }

    /// Records a completed test's spend and returns `true` the first time
    /// this call pushes the run over any configured ceiling.
    fn record(&self, cost_usd: f64, tokens: u64) -> bool {
        let mut state = self.state.lock().expect("budget mutex poisoned");
        state.cost_usd += cost_usd;
        state.total_tokens += tokens;

        let cost_exceeded = self.budget.max_cost_usd.is_some_and(|max| state.cost_usd > max);
        let tokens_exceeded = self.budget.max_total_tokens.is_some_and(|max| state.total_tokens > max);
        let wall_clock_exceeded =
            self.budget.max_wall_clock.is_some_and(|max| self.started_at.elapsed() > max);

        if cost_exceeded || tokens_exceeded || wall_clock_exceeded {
            !self.exceeded.swap(true, Ordering::SeqCst)
        } else {
            false
        }
    }

    fn was_exceeded(&self) -> bool {
        self.exceeded.load(Ordering::SeqCst)
    }

    fn cost_total(&self) -> f64 {
        self.state.lock().expect("budget mutex poisoned").cost_usd
    }
}

/// Scheduling and timeout configuration (spec.md §4.8, §7 "worker pool of
/// size W, default `min(8, num_cpus * 4)`").
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    pub worker_count: usize,
    pub result_buffer: usize,
    pub per_test_timeout: Duration,
    pub grace_period: Duration,
    pub quarantine_mode: QuarantineMode,
    pub asr_mode: AsrDenominatorMode,
    pub budget: RunBudget,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        let cpus = std::thread::available_parallelism().map(|n| n.get()).unwrap_or(4);
        Self {
            worker_count: (cpus * 4).min(8).max(1),
            result_buffer: 64,
            per_test_timeout: Duration::from_secs(120),
            grace_period: Duration::from_secs(5),
            quarantine_mode: QuarantineMode::Warn,
            asr_mode: AsrDenominatorMode::Strict,
            budget: RunBudget::default(),
        }
    }
}

pub struct TestRunner {
    config: RunnerConfig,
    ctx: ExecutionContext,
    orchestrator: Arc<dyn Orchestrator>,
    adapter: Arc<dyn Adapter>,
    quarantine: Option<Arc<QuarantineService>>,
}

impl TestRunner {
    pub fn new(
        config: RunnerConfig,
        ctx: ExecutionContext,
        orchestrator: Arc<dyn Orchestrator>,
        adapter: Arc<dyn Adapter>,
        quarantine: Option<Arc<QuarantineService>>,
    ) -> Self {
        Self { config, ctx, orchestrator, adapter, quarantine }
    }

    /// Run every test in `suite` with bounded concurrency, returning results
    /// in input order plus the aggregated summary (spec.md §4.8 "Result
    /// order in reports follows TestCase input order ... execution order is
    /// unconstrained").
    pub async fn run_suite(&self, suite: &Suite) -> (Vec<TestResult>, RunSummary) {
        let run_id = uuid::Uuid::new_v4();
        let started_at = Instant::now();
        let (cancel_handle, cancel) = cancellation_pair();
        let budget = Arc::new(BudgetTracker::new(self.config.budget));
        let sem = Arc::new(Semaphore::new(self.config.worker_count.max(1)));
        let (tx, mut rx) = mpsc::channel::<(usize, TestResult)>(self.config.result_buffer.max(1));

        // The collector must run concurrently with the spawn loop below, not
        // after it: workers block on `tx.send` once the bounded channel
        // fills, and the spawn loop itself blocks on `sem.acquire_owned`
        // once every permit is held by a worker stuck on that send. Without
        // a live drain, a suite larger than worker_count + result_buffer
        // deadlocks outright.
        let total = suite.tests.len();
        let drain = tokio::spawn(async move {
            let mut slots: Vec<Option<TestResult>> = (0..total).map(|_| None).collect();
            while let Some((index, result)) = rx.recv().await {
                slots[index] = Some(result);
            }
            slots
        });

        let mut join_set = JoinSet::new();
        for (index, test) in suite.tests.iter().cloned().enumerate() {
            let permit = sem.clone().acquire_owned().await.expect("semaphore never closed");
            let orchestrator = self.orchestrator.clone();
            let adapter = self.adapter.clone();
            let ctx = self.ctx.clone();
            let mut cancel_for_task = cancel.clone();
            let tx = tx.clone();
            let budget = budget.clone();
            let quarantine = self.quarantine.clone();
            let quarantine_mode = self.config.quarantine_mode;
            let suite_name = suite.name.clone();
            let per_test_timeout = self.config.per_test_timeout;

            join_set.spawn(async move {
                let _permit = permit;
                if cancel_for_task.is_cancelled() {
                    let _ = tx.send((index, TestResult::infrastructure_error(&test.id, 0))).await;
                    return;
                }

                let elapsed_start = Instant::now();
                let mut result = match tokio::time::timeout(
                    per_test_timeout,
                    orchestrator.execute(&test, adapter.as_ref(), &ctx, &mut cancel_for_task),
                )
                .await
                {
                    Ok(result) => result,
                    Err(_) => TestResult::infrastructure_error(&test.id, elapsed_start.elapsed().as_millis() as u64),
                };

                if let Some(svc) = quarantine.as_ref() {
                    if let Ok(reason) = svc.reason_for(&suite_name, &test.id) {
                        svc.apply_overlay(quarantine_mode, reason.as_deref(), &mut result);
                    }
                }

                let tokens = result
                    .response
                    .as_ref()
                    .map(|r| r.input_tokens + r.output_tokens)
                    .unwrap_or(0);
                if budget.record(result.cost_estimate, tokens) {
                    cancel_handle.cancel();
                }

                let _ = tx.send((index, result)).await;
            });
        }
        drop(tx);

        // Every task either completed or was timed out into a placeholder
        // result above; draining the JoinSet here only reclaims task
        // handles, it cannot change what was already sent.
        while join_set.join_next().await.is_some() {}
        let slots = drain.await.expect("result collector task panicked");

        let budget_exceeded = budget.was_exceeded();
        let results: Vec<TestResult> = slots
            .into_iter()
            .enumerate()
            .map(|(index, slot)| {
                slot.unwrap_or_else(|| TestResult::infrastructure_error(&suite.tests[index].id, 0))
            })
            .collect();

        let summary = self.summarize(run_id, suite, &results, budget_exceeded, started_at.elapsed());
        (results, summary)
    }

    /// Aggregate a set of [`TestResult`]s into a [`RunSummary`], independent
    /// of whether they came from a live [`Self::run_suite`] call or were
    /// reassembled from a mix of fresh and reused results (an incremental
    /// re-run merges the two before calling this).
    pub fn summarize(
        &self,
        run_id: uuid::Uuid,
        suite: &Suite,
        results: &[TestResult],
        budget_exceeded: bool,
        duration: Duration,
    ) -> RunSummary {
        let mut counts = StatusCounts::default();
        let mut cost_total = 0.0;
        let mut denominator = 0u64;
        let mut jailbreaks = 0u64;
        let mut critical_findings = 0u64;
        let mut tool_violations = 0u64;

        for result in results {
            counts.record(result.status);
            cost_total += result.cost_estimate;
            if ErrorClassifier::counts_toward_asr_denominator(result.status, self.config.asr_mode) {
                denominator += 1;
            }
            if result.is_jailbreak_success() {
                jailbreaks += 1;
            }
            for finding in &result.findings {
                if finding.severity == crate::model::Severity::Critical {
                    critical_findings += 1;
                }
                if finding.category == "tool-allowlist" {
                    tool_violations += 1;
                }
            }
        }

        let mut metrics = std::collections::HashMap::new();
        if denominator > 0 {
            let ci = auto_interval(jailbreaks, denominator, 0.05);
            metrics.insert("asr".to_string(), ci.point);
            metrics.insert("asr_ci_low".to_string(), ci.low);
            metrics.insert("asr_ci_high".to_string(), ci.high);
            metrics.insert("n".to_string(), denominator as f64);
            metrics.insert("successes".to_string(), jailbreaks as f64);
            metrics.insert(
                "harmful_output_rate".to_string(),
                jailbreaks as f64 / denominator as f64,
            );
            metrics.insert(
                "critical_violation_rate".to_string(),
                critical_findings as f64 / denominator as f64,
            );
            metrics.insert(
                "tool_policy_violation_rate".to_string(),
                tool_violations as f64 / denominator as f64,
            );
        }
        let total = counts.total().max(1);
        metrics.insert(
            "utility_failure_rate".to_string(),
            (counts.error_infrastructure + counts.error_policy) as f64 / total as f64,
        );
        metrics.insert(
            "infrastructure_error_rate".to_string(),
            counts.error_infrastructure as f64 / total as f64,
        );

        RunSummary {
            run_id,
            suite_name: suite.name.clone(),
            suite_version: suite.version.clone(),
            counts,
            metrics,
            cost_total,
            duration_ms: duration.as_millis() as u64,
            budget_exceeded,
        }
    }
}
