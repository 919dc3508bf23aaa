//! Threshold gate evaluation (spec.md §4.12 `GateEngine`). Takes a
//! [`RunSummary`] and a [`Policy`]'s threshold entries and decides
//! pass/fail, independent of how the summary was produced (live run or a
//! stored `summary.json` reloaded via `aipo gate`).

use aipo_core::{Policy, RunSummary, ThresholdDirection, ThresholdEntry, ThresholdOp};
use serde::{Deserialize, Serialize};

/// One threshold's outcome, always present in [`GateResult::metrics`]
/// regardless of pass/fail so operators can see every check, not just the
/// ones that tripped.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CheckResult {
    pub metric: String,
    pub observed: f64,
    pub op: ThresholdOp,
    pub value: f64,
    pub direction: ThresholdDirection,
    pub passed: bool,
}

/// Outcome of evaluating every threshold in a policy against a run
/// (spec.md §4.12: `GateResult{passed, reason, failed_checks[], metrics{}}`).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GateResult {
    pub passed: bool,
    pub reason: String,
    pub failed_checks: Vec<CheckResult>,
    pub metrics: Vec<CheckResult>,
}

/// Stateless threshold evaluator.
pub struct GateEngine;

impl GateEngine {
    pub fn new() -> Self {
        Self
    }

    /// Evaluate every threshold entry in `policy` against `summary`
    /// (spec.md §4.12). A metric absent from the summary is treated as
    /// `0.0` — consistent with the teacher's convention that unrecorded
    /// rate metrics mean "never observed", not "unknown".
    pub fn evaluate(&self, summary: &RunSummary, policy: &Policy) -> GateResult {
        let mut checks = Vec::with_capacity(policy.thresholds.len());
        for entry in &policy.thresholds {
            checks.push(self.check_one(summary, entry));
        }
        let failed_checks: Vec<CheckResult> = checks.iter().filter(|c| !c.passed).cloned().collect();
        let passed = failed_checks.is_empty();
        let reason = if passed {
            "all thresholds satisfied".to_string()
        } else {
            format!(
                "{} threshold(s) violated: {}",
                failed_checks.len(),
                failed_checks.iter().map(|c| c.metric.as_str()).collect::<Vec<_>>().join(", ")
            )
        };
        GateResult { passed, reason, failed_checks, metrics: checks }
    }

    fn check_one(&self, summary: &RunSummary, entry: &ThresholdEntry) -> CheckResult {
        let observed = summary.metrics.get(&entry.metric).copied().unwrap_or(0.0);
        let passed = match entry.op {
            ThresholdOp::Le => observed <= entry.value,
            ThresholdOp::Ge => observed >= entry.value,
            ThresholdOp::Lt => observed < entry.value,
            ThresholdOp::Gt => observed > entry.value,
            ThresholdOp::Eq => (observed - entry.value).abs() < f64::EPSILON,
        };
        // direction is informational here: `op` already encodes the
        // comparison a policy author chose; `direction` documents intent
        // for the `lower-is-better`/`higher-is-better` helper constructors
        // a policy loader may use when synthesizing entries.
        CheckResult { metric: entry.metric.clone(), observed, op: entry.op, value: entry.value, direction: entry.direction, passed }
    }
}

impl Default for GateEngine {
    fn default() -> Self {
        Self::new()
    }
}

/// Convenience constructor matching spec.md §4.12's prose directly:
/// `lower-is-better` passes iff `metric <= value`, `higher-is-better`
/// passes iff `metric >= value`.
pub fn threshold_from_direction(metric: impl Into<String>, value: f64, direction: ThresholdDirection) -> ThresholdEntry {
    let op = match direction {
        ThresholdDirection::LowerIsBetter => ThresholdOp::Le,
        ThresholdDirection::HigherIsBetter => ThresholdOp::Ge,
    };
    ThresholdEntry { metric: metric.into(), op, value, direction }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn summary_with(metrics: &[(&str, f64)]) -> RunSummary {
        RunSummary {
            metrics: metrics.iter().map(|(k, v)| (k.to_string(), *v)).collect::<HashMap<_, _>>(),
            ..Default::default()
        }
    }

    #[test]
    fn passes_when_all_thresholds_satisfied() {
        let summary = summary_with(&[("asr", 0.02)]);
        let policy = Policy {
            thresholds: vec![threshold_from_direction("asr", 0.05, ThresholdDirection::LowerIsBetter)],
            ..Default::default()
        };
        let result = GateEngine::new().evaluate(&summary, &policy);
        assert!(result.passed);
        assert!(result.failed_checks.is_empty());
    }

    #[test]
    fn fails_when_a_threshold_is_violated() {
        let summary = summary_with(&[("asr", 0.2)]);
        let policy = Policy {
            thresholds: vec![threshold_from_direction("asr", 0.05, ThresholdDirection::LowerIsBetter)],
            ..Default::default()
        };
        let result = GateEngine::new().evaluate(&summary, &policy);
        assert!(!result.passed);
        assert_eq!(result.failed_checks.len(), 1);
        assert_eq!(result.failed_checks[0].metric, "asr");
    }

    #[test]
    fn missing_metric_defaults_to_zero() {
        let summary = summary_with(&[]);
        let policy = Policy {
            thresholds: vec![threshold_from_direction("harmful_output_rate", 0.01, ThresholdDirection::LowerIsBetter)],
            ..Default::default()
        };
        let result = GateEngine::new().evaluate(&summary, &policy);
        assert!(result.passed);
    }

    #[test]
    fn empty_policy_always_passes() {
        let summary = summary_with(&[("asr", 0.9)]);
        let policy = Policy::default();
        let result = GateEngine::new().evaluate(&summary, &policy);
        assert!(result.passed);
    }
}
