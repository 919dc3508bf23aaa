//! `aipo run`: execute a suite against a target adapter and, when a policy
//! is given, evaluate the release gate against the resulting summary
//! (spec.md §6 `run` surface). Grounded in the teacher's
//! `cli::commands::run::run` shape: build inputs, drive the pipeline, write
//! reports, return the normative exit code.

use std::sync::Arc;
use std::time::Instant;

use aipo_core::config::{self, ConfigOverlay};
use aipo_core::orchestrator::{MultiTurnOrchestrator, ScoringMode, SingleTurnOrchestrator, TurnStrategy};
use aipo_core::{Orchestrator, Policy, QuarantineService, RunBudget, RunnerConfig, Suite, TestResult, TestRunner};
use aipo_evidence::{
    har::TrafficCapture, EvidencePack, GateEngine, ReasonCode, RunOutcome, EXIT_CONFIG_ERROR, EXIT_SUCCESS,
    EXIT_TEST_FAILURE,
};
use anyhow::Context;

use crate::cli::args::{OrchestratorKind, RunArgs, ScoringKind};
use crate::loaders;

use super::incremental::{self, IncrementalStore};
use super::runtime::build_runtime;

pub async fn run(args: RunArgs) -> anyhow::Result<i32> {
    let suite = loaders::load_suite(&args.suite).with_context(|| format!("loading suite {}", args.suite.display()))?;
    let adapter_spec = loaders::load_adapter_spec(&args.adapter).context("resolving --adapter")?;
    let policy = match &args.policy {
        Some(path) => loaders::load_policy(path).with_context(|| format!("loading policy {}", path.display()))?,
        None => Policy::default(),
    };

    let config = config::resolve(
        ConfigOverlay { output_dir: args.storage.output_dir.clone(), seed: args.seed, sample_rate: Some(args.sample_rate), ..Default::default() },
        args.storage.config.as_deref(),
    )?;

    let handles = build_runtime(
        &adapter_spec,
        &args.model,
        args.judge,
        &policy,
        config.jailbreak_threshold,
        config.asr_denominator_mode(),
        config.cache_enabled,
        args.max_rate.as_deref(),
        args.stealth,
        args.random_delay.as_deref(),
        config.output_dir.as_deref(),
    )?;

    let mut suite = suite;
    if config.sample_rate < 1.0 {
        let seed = config.seed.unwrap_or(0);
        suite = Suite {
            tests: aipo_core::stratified_sample(&suite.tests, |t| t.category.clone(), config.sample_rate, seed),
            ..suite
        };
    }

    let orchestrator: Arc<dyn Orchestrator> = match args.orchestrator {
        OrchestratorKind::Single => Arc::new(SingleTurnOrchestrator::new()),
        OrchestratorKind::Multi => {
            let scoring = match args.scoring {
                ScoringKind::Any => ScoringMode::Any,
                ScoringKind::Majority => ScoringMode::Majority,
                ScoringKind::Final => ScoringMode::Final,
            };
            Arc::new(
                MultiTurnOrchestrator::new(args.max_turns, scoring, TurnStrategy::Escalate)
                    .map_err(anyhow::Error::msg)?,
            )
        }
    };

    let quarantine = Arc::new(
        QuarantineService::open(&handles.paths.state_dir.join("quarantine.sqlite"))
            .context("opening quarantine store")?,
    );

    let mut runner_config = RunnerConfig { quarantine_mode: config.quarantine_mode(), asr_mode: config.asr_denominator_mode(), ..RunnerConfig::default() };
    runner_config.budget = RunBudget { max_cost_usd: args.budget_usd, ..RunBudget::default() };

    let runner = TestRunner::new(runner_config, handles.ctx, orchestrator, handles.adapter.clone(), Some(quarantine));

    let (results, summary) = if args.incremental {
        let mut store = IncrementalStore::load(&handles.paths.state_dir).context("loading incremental store")?;
        let (to_run, reused) = incremental::partition(&suite, &args.model, &policy, &store);
        let fresh_count = to_run.len();
        let skipped_count = reused.len();

        let started = Instant::now();
        let subset = Suite { tests: to_run, ..suite.clone() };
        let (fresh_results, fresh_summary) = runner.run_suite(&subset).await;

        let mut merged: Vec<Option<TestResult>> = (0..suite.tests.len()).map(|_| None).collect();
        for (index, result) in reused {
            merged[index] = Some(result);
        }
        let mut fresh_iter = fresh_results.into_iter();
        for slot in &mut merged {
            if slot.is_none() {
                *slot = fresh_iter.next();
            }
        }
        let results: Vec<TestResult> = merged.into_iter().map(|r| r.expect("every slot filled by reused or fresh")).collect();

        println!("incremental: {fresh_count} test(s) run, {skipped_count} reused from a prior passing run");

        let summary = runner.summarize(uuid::Uuid::new_v4(), &suite, &results, fresh_summary.budget_exceeded, started.elapsed());
        incremental::update(&mut store, &suite, &args.model, &policy, &results);
        store.save(&handles.paths.state_dir).context("saving incremental store")?;

        (results, summary)
    } else {
        runner.run_suite(&suite).await
    };

    let run_id = summary.run_id.to_string();
    let reports_dir = handles.paths.reports_dir(&run_id);
    let transcripts_dir = handles.paths.transcripts_dir(&run_id);
    std::fs::create_dir_all(&reports_dir).context("creating reports directory")?;
    std::fs::create_dir_all(&transcripts_dir).context("creating transcripts directory")?;

    let summary_json = serde_json::to_vec_pretty(&summary)?;
    aipo_core::atomic_write(&reports_dir.join("summary.json"), &summary_json)?;
    for result in &results {
        let line = serde_json::to_vec(result)?;
        std::fs::write(transcripts_dir.join(format!("{}.jsonl", result.test_id)), line)?;
    }

    println!(
        "run {run_id}: {} passed, {} failed, {} infra-error, {} policy-error, {} skipped (cost ${:.4})",
        summary.counts.passed,
        summary.counts.failed,
        summary.counts.error_infrastructure,
        summary.counts.error_policy,
        summary.counts.skipped,
        summary.cost_total,
    );

    let gate_result = if args.policy.is_some() {
        let result = GateEngine::new().evaluate(&summary, &policy);
        println!("gate: {}", result.reason);
        Some(result)
    } else {
        None
    };

    if args.sarif {
        let findings: Vec<aipo_core::Finding> = results.iter().flat_map(|r| r.findings.iter()).cloned().collect();
        let outcome = aipo_evidence::write_sarif("aipo", &findings, &reports_dir.join("findings.sarif"))?;
        if outcome.omitted_count > 0 {
            println!("sarif: {} finding(s) omitted past the result limit", outcome.omitted_count);
        }
    }

    let infra_only_failure = summary.counts.error_infrastructure > 0 && summary.counts.passed == 0 && summary.counts.failed == 0;
    let run_outcome = if infra_only_failure {
        RunOutcome::from_reason(ReasonCode::TestsFailed, Some("every test errored before producing a verdict".into()), Some(run_id.as_str()))
    } else if let Some(g) = &gate_result {
        if g.passed {
            RunOutcome::success()
        } else {
            RunOutcome::from_reason(ReasonCode::GateThresholdViolation, Some(g.reason.clone()), Some(run_id.as_str()))
        }
    } else {
        RunOutcome::success()
    };
    aipo_core::atomic_write(&reports_dir.join("outcome.json"), &serde_json::to_vec_pretty(&run_outcome)?)?;

    if args.generate_evidence || args.capture_traffic {
        write_evidence_pack(&handles.paths, &run_id, &reports_dir, &transcripts_dir, &results, gate_result.as_ref(), args.capture_traffic)?;
    }

    if infra_only_failure {
        return Ok(EXIT_CONFIG_ERROR);
    }
    match &gate_result {
        Some(g) if !g.passed => Ok(EXIT_TEST_FAILURE),
        _ => Ok(EXIT_SUCCESS),
    }
}

/// Stages `summary.json`, one transcript per test, and (when
/// `--capture-traffic` was requested) a coarse `traffic.har` derived from
/// each test's recorded response, then seals everything into
/// `reports/evidence.zip` (spec.md §4.11, §4.13).
///
/// The HAR entries here are synthesized from `TestResult`/`ModelResponse`
/// rather than the adapter's raw wire bytes: at the CLI layer we only see
/// the already-decoded response, so request/response headers are empty and
/// the URL is the model id. A full byte-for-byte capture would require an
/// event sink threaded through the adapter's transport.
fn write_evidence_pack(
    paths: &aipo_core::Paths,
    run_id: &str,
    reports_dir: &std::path::Path,
    transcripts_dir: &std::path::Path,
    results: &[aipo_core::TestResult],
    gate_result: Option<&aipo_evidence::GateResult>,
    capture_traffic: bool,
) -> anyhow::Result<()> {
    let staging = paths.runs_dir().join(run_id).join("evidence-staging");
    let pack = EvidencePack::new(&staging, run_id, env!("CARGO_PKG_VERSION"))?;

    for entry in std::fs::read_dir(reports_dir)? {
        let entry = entry?;
        let bytes = std::fs::read(entry.path())?;
        pack.write_artifact(&format!("reports/{}", entry.file_name().to_string_lossy()), &bytes)?;
    }
    for entry in std::fs::read_dir(transcripts_dir)? {
        let entry = entry?;
        let bytes = std::fs::read(entry.path())?;
        pack.write_artifact(&format!("transcripts/{}", entry.file_name().to_string_lossy()), &bytes)?;
    }

    if capture_traffic {
        let capture = TrafficCapture::new(results.len().max(1));
        for result in results {
            let Some(response) = &result.response else { continue };
            let entry = aipo_evidence::har::HarEntry::new(
                chrono::Utc::now(),
                result.latency_ms,
                "POST",
                &result.test_id,
                vec![],
                200,
                vec![],
                response.text.as_bytes(),
                "text/plain",
            );
            capture.record(entry);
        }
        pack.write_artifact("traffic.har", &capture.finish())?;
    }

    let gate_json = gate_result.map(|g| serde_json::to_value(g)).transpose()?;
    pack.finalize(&reports_dir.join("evidence.zip"), gate_json)?;
    Ok(())
}
