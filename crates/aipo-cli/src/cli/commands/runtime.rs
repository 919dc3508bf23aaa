//! Shared plumbing for building an [`ExecutionContext`] from CLI flags plus
//! a loaded [`AdapterSpec`]/[`Policy`] pair. Every command that drives a
//! suite (`run`, `verify-suite`) goes through here so the wiring rules
//! (judge selection, detector construction, rate limiting) live in one
//! place.

use std::sync::Arc;

use aipo_adapter_api::{Adapter, AdapterSpec};
use aipo_core::detector::{ContentRuleDetector, PiiDetector, ToolAllowlistDetector};
use aipo_core::judge::ensemble::WeightedMember;
use aipo_core::judge::{ClassifierJudge, EnsembleJudge, KeywordJudge, LlmJudge};
use aipo_core::rate_limiter::GlobalRateLimiter;
use aipo_core::{
    AdapterRegistry, AsrDenominatorMode, CostTable, Detector, ExecutionContext, Judge, Paths,
    Policy, RateLimiter, ResponseCache,
};
use anyhow::Context;

use crate::cli::args::JudgeKind;

pub fn build_adapter(spec: &AdapterSpec) -> anyhow::Result<Arc<dyn Adapter>> {
    AdapterRegistry::build(spec).with_context(|| format!("constructing adapter `{}`", spec.name))
}

pub fn build_judge(kind: JudgeKind, adapter: Arc<dyn Adapter>) -> Arc<dyn Judge> {
    match kind {
        JudgeKind::Keyword => Arc::new(KeywordJudge::new()),
        JudgeKind::Llm => Arc::new(LlmJudge::new(adapter)),
        JudgeKind::Classifier => Arc::new(ClassifierJudge::new(adapter)),
        JudgeKind::Ensemble => {
            let keyword = WeightedMember { judge: Box::new(KeywordJudge::new()) as Box<dyn Judge>, weight: 0.5 };
            let llm = WeightedMember { judge: Box::new(LlmJudge::new(adapter)) as Box<dyn Judge>, weight: 0.5 };
            Arc::new(EnsembleJudge::new(vec![keyword, llm]))
        }
    }
}

/// Builds the detector set from a policy's content rules and tool
/// allowlist (spec.md §4.5). A PII detector always runs: it costs nothing
/// on responses that don't contain any of its patterns.
pub fn build_detectors(policy: &Policy) -> anyhow::Result<Arc<Vec<Box<dyn Detector>>>> {
    let mut detectors: Vec<Box<dyn Detector>> = vec![Box::new(PiiDetector::new())];
    if !policy.content_rules.is_empty() {
        detectors.push(Box::new(
            ContentRuleDetector::new(policy.content_rules.clone())
                .context("compiling content-rule patterns")?,
        ));
    }
    if !policy.tool_allowlist.is_empty() {
        detectors.push(Box::new(ToolAllowlistDetector::new(policy.tool_allowlist.clone())));
    }
    Ok(Arc::new(detectors))
}

/// Parses a `"N/sec"` or `"N/min"` rate string into requests-per-second.
/// Falls back to the adapter spec's own `rate_limit.rps` when absent or
/// unparseable.
pub fn parse_max_rate(raw: Option<&str>, fallback_rps: f64) -> f64 {
    let Some(raw) = raw else { return fallback_rps };
    let Some((count, unit)) = raw.split_once('/') else { return fallback_rps };
    let Ok(count) = count.trim().parse::<f64>() else { return fallback_rps };
    match unit.trim() {
        "sec" | "s" => count,
        "min" | "m" => count / 60.0,
        _ => fallback_rps,
    }
}

/// Parses a `"LOW-HIGH"` millisecond delay window (e.g. `--random-delay
/// 200-800`) into its upper bound, which becomes the rate limiter's jitter
/// ceiling. Unparseable or absent input yields `None`.
pub fn parse_random_delay_ms(raw: Option<&str>) -> Option<u64> {
    let raw = raw?;
    let (_low, high) = raw.split_once('-')?;
    high.trim().parse::<u64>().ok()
}

pub fn build_rate_limiter(
    spec: &AdapterSpec,
    max_rate: Option<&str>,
    stealth: bool,
    random_delay: Option<&str>,
) -> Arc<GlobalRateLimiter> {
    let rps = parse_max_rate(max_rate, spec.rate_limit.rps);
    let mut jitter_ms = spec.rate_limit.jitter_ms;
    if stealth {
        jitter_ms = jitter_ms.max(250);
    }
    if let Some(delay) = parse_random_delay_ms(random_delay) {
        jitter_ms = jitter_ms.max(delay);
    }
    let limiter = Arc::new(RateLimiter::new(spec.rate_limit.burst as f64, rps, jitter_ms));
    Arc::new(GlobalRateLimiter::new(vec![limiter]))
}

pub struct RuntimeHandles {
    pub ctx: ExecutionContext,
    pub adapter: Arc<dyn Adapter>,
    pub paths: Paths,
}

/// Assembles an [`ExecutionContext`] plus its adapter from CLI inputs
/// (spec.md §9 "RunContext struct that holds TestRunner, Cache,
/// RateLimiter, Memory handles; construction and teardown explicit and
/// deterministic").
#[allow(clippy::too_many_arguments)]
pub fn build_runtime(
    adapter_spec: &AdapterSpec,
    model_id: &str,
    judge_kind: JudgeKind,
    policy: &Policy,
    jailbreak_threshold: f64,
    asr_mode: AsrDenominatorMode,
    cache_enabled: bool,
    max_rate: Option<&str>,
    stealth: bool,
    random_delay: Option<&str>,
    output_dir: Option<&std::path::Path>,
) -> anyhow::Result<RuntimeHandles> {
    let paths = match output_dir {
        Some(root) => Paths::under(root),
        None => Paths::resolve(),
    };
    paths.ensure_all().context("creating aipo data/cache/state directories")?;

    let adapter = build_adapter(adapter_spec)?;
    let judge = build_judge(judge_kind, adapter.clone());
    let detectors = build_detectors(policy)?;
    let rate_limiter = build_rate_limiter(adapter_spec, max_rate, stealth, random_delay);
    let cache = ResponseCache::open(&paths.cache_db_path()).context("opening response cache")?;
    let memory = Arc::new(
        aipo_core::ConversationMemory::open(&paths.memory_db_path()).context("opening conversation memory")?,
    );

    let ctx = ExecutionContext {
        cache,
        cache_enabled,
        rate_limiter,
        memory,
        detectors,
        judge,
        jailbreak_threshold,
        asr_mode,
        model_id: model_id.to_string(),
        cost_table: Arc::new(CostTable::with_common_defaults()),
    };
    Ok(RuntimeHandles { ctx, adapter, paths })
}
