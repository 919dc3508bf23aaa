//! `aipo verify-suite`: measure attack success rate with a confidence
//! interval for a suite against one adapter, independent of the release
//! gate (spec.md §6 `verify-suite` surface).

use std::sync::Arc;

use aipo_core::config::{self, ConfigOverlay};
use aipo_core::{Orchestrator, Policy, RunnerConfig, SingleTurnOrchestrator, TestRunner};
use aipo_evidence::EXIT_SUCCESS;
use anyhow::Context;

use crate::cli::args::{ReportFormat, VerifySuiteArgs};
use crate::loaders;

use super::runtime::build_runtime;

pub async fn run(args: VerifySuiteArgs) -> anyhow::Result<i32> {
    let suite = loaders::load_suite(&args.suite).with_context(|| format!("loading suite {}", args.suite.display()))?;
    let adapter_spec = loaders::load_adapter_spec(&args.adapter).context("resolving --adapter")?;
    let policy = Policy::default();

    let config = config::resolve(
        ConfigOverlay { seed: args.seed, sample_rate: Some(args.sample_rate), jailbreak_threshold: Some(args.threshold), ..Default::default() },
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
        None,
        false,
        None,
        config.output_dir.as_deref(),
    )?;

    let orchestrator: Arc<dyn Orchestrator> = Arc::new(SingleTurnOrchestrator::new());
    let runner = TestRunner::new(RunnerConfig::default(), handles.ctx, orchestrator, handles.adapter, None);
    let (_results, summary) = runner.run_suite(&suite).await;

    render_report(&summary, args.report_format)?;
    Ok(EXIT_SUCCESS)
}

fn render_report(summary: &aipo_core::RunSummary, format: ReportFormat) -> anyhow::Result<()> {
    match format {
        ReportFormat::Json => println!("{}", serde_json::to_string_pretty(summary)?),
        ReportFormat::Yaml => println!("{}", serde_yaml::to_string(summary)?),
        ReportFormat::Md => print!("{}", render_markdown(summary)),
        ReportFormat::Html => print!("{}", render_html(summary)),
    }
    Ok(())
}

fn render_markdown(summary: &aipo_core::RunSummary) -> String {
    let mut out = format!(
        "# {} v{}\n\n| metric | value |\n|---|---|\n",
        summary.suite_name, summary.suite_version
    );
    let mut keys: Vec<&String> = summary.metrics.keys().collect();
    keys.sort();
    for key in keys {
        out.push_str(&format!("| {key} | {:.4} |\n", summary.metrics[key]));
    }
    out.push_str(&format!("\ntotal cost: ${:.4}\n", summary.cost_total));
    out
}

fn render_html(summary: &aipo_core::RunSummary) -> String {
    let mut rows = String::new();
    let mut keys: Vec<&String> = summary.metrics.keys().collect();
    keys.sort();
    for key in keys {
        rows.push_str(&format!("<tr><td>{key}</td><td>{:.4}</td></tr>", summary.metrics[key]));
    }
    format!(
        "<html><body><h1>{} v{}</h1><table>{rows}</table><p>total cost: ${:.4}</p></body></html>",
        summary.suite_name, summary.suite_version, summary.cost_total
    )
}
