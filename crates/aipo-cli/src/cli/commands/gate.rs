//! `aipo gate`: evaluate an already-produced `summary.json` against a
//! policy without re-running anything (spec.md §6 `gate` surface).

use aipo_core::{Policy, RunSummary};
use aipo_evidence::{EvidencePack, GateEngine, ReasonCode, RunOutcome, EXIT_SUCCESS, EXIT_TEST_FAILURE};
use anyhow::Context;

use crate::cli::args::GateArgs;
use crate::loaders;

pub async fn run(args: GateArgs) -> anyhow::Result<i32> {
    let summary_bytes = std::fs::read(&args.summary)
        .with_context(|| format!("reading summary {}", args.summary.display()))?;
    let summary: RunSummary = serde_json::from_slice(&summary_bytes)
        .with_context(|| format!("parsing summary {}", args.summary.display()))?;
    let policy: Policy = loaders::load_policy(&args.policy)
        .with_context(|| format!("loading policy {}", args.policy.display()))?;

    let result = GateEngine::new().evaluate(&summary, &policy);
    println!("gate: {}", result.reason);
    for check in &result.metrics {
        let mark = if check.passed { "ok" } else { "FAIL" };
        println!("  [{mark}] {} = {:.4} ({:?} {:?} {})", check.metric, check.observed, check.op, check.direction, check.value);
    }

    if args.generate_evidence {
        let staging = std::env::temp_dir().join(format!("aipo-gate-evidence-{}", summary.run_id));
        let pack = EvidencePack::new(&staging, summary.run_id.to_string(), env!("CARGO_PKG_VERSION"))?;
        pack.write_artifact("reports/summary.json", &summary_bytes)?;
        let dest = args.summary.with_file_name("evidence.zip");
        pack.finalize(&dest, Some(serde_json::to_value(&result)?))?;
        println!("evidence pack written to {}", dest.display());
    }

    let run_id = summary.run_id.to_string();
    let outcome = if result.passed {
        RunOutcome::success()
    } else {
        RunOutcome::from_reason(ReasonCode::GateThresholdViolation, Some(result.reason.clone()), Some(run_id.as_str()))
    };
    let outcome_path = args.summary.with_file_name("outcome.json");
    aipo_core::atomic_write(&outcome_path, &serde_json::to_vec_pretty(&outcome)?)?;

    Ok(if result.passed { EXIT_SUCCESS } else { EXIT_TEST_FAILURE })
}
