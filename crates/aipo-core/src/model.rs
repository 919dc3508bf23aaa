//! Core data model (spec.md §3). `TestCase`/`Suite`/`Policy` are immutable
//! once loaded; `Turn`/`Conversation` are append-only; `TestResult` is the
//! one artifact every component ultimately produces.

use aipo_adapter_api::ModelResponse;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ExpectedBehavior {
    Refusal,
    Comply,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
}

/// One adversarial or benign probe (spec.md §3 `TestCase`). Immutable once a
/// `Suite` is loaded.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TestCase {
    pub id: String,
    pub prompt: String,
    #[serde(default)]
    pub expected_behavior: Option<ExpectedBehavior>,
    pub category: String,
    #[serde(default)]
    pub risk_level: Option<RiskLevel>,
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
}

impl TestCase {
    pub fn expected_asr(&self) -> Option<f64> {
        self.metadata.get("expected_asr").and_then(|v| v.as_f64())
    }

    pub fn turn_budget(&self) -> Option<u32> {
        self.metadata
            .get("turn_budget")
            .and_then(|v| v.as_u64())
            .map(|v| v as u32)
    }
}

/// An ordered collection of test cases, immutable at load (spec.md §3 `Suite`).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Suite {
    pub name: String,
    pub version: String,
    pub tests: Vec<TestCase>,
}

impl Suite {
    pub fn categories(&self) -> Vec<String> {
        let mut cats: Vec<String> = self.tests.iter().map(|t| t.category.clone()).collect();
        cats.sort();
        cats.dedup();
        cats
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum ThresholdDirection {
    LowerIsBetter,
    HigherIsBetter,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ThresholdOp {
    Le,
    Ge,
    Lt,
    Gt,
    Eq,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ThresholdEntry {
    pub metric: String,
    pub op: ThresholdOp,
    pub value: f64,
    pub direction: ThresholdDirection,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ContentRule {
    pub category: String,
    pub severity: Severity,
    #[serde(default)]
    pub patterns: Vec<String>,
    #[serde(default)]
    pub keywords: Vec<String>,
}

/// Policy payload: named thresholds plus content/tool-allowlist rules
/// consumed by detectors (spec.md §3 `Policy`). Immutable once loaded.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Policy {
    pub name: String,
    #[serde(default)]
    pub thresholds: Vec<ThresholdEntry>,
    #[serde(default)]
    pub content_rules: Vec<ContentRule>,
    #[serde(default)]
    pub tool_allowlist: Vec<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

/// A single finding produced by a detector or judge (spec.md §3 `Finding`).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Finding {
    pub id: String,
    pub test_id: String,
    pub severity: Severity,
    pub category: String,
    pub confidence: f64,
    #[serde(default)]
    pub evidence_ref: Vec<String>,
    pub description: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum TestStatus {
    Passed,
    Failed,
    ErrorInfrastructure,
    ErrorPolicy,
    Skipped,
}

/// The outcome of running one `TestCase` (spec.md §3 `TestResult`). The
/// invariant that `status=error-infrastructure` never carries findings is
/// enforced at construction via [`TestResult::infrastructure_error`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TestResult {
    pub test_id: String,
    pub status: TestStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response: Option<ModelResponse>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub judge_score: Option<f64>,
    #[serde(default)]
    pub findings: Vec<Finding>,
    pub cost_estimate: f64,
    pub latency_ms: u64,
    pub cache_hit: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<uuid::Uuid>,
}

impl TestResult {
    /// Construct an infrastructure-error result. Always zero findings — this
    /// is the one invariant callers cannot violate through this
    /// constructor (spec.md §3, §8 property 4).
    pub fn infrastructure_error(test_id: impl Into<String>, latency_ms: u64) -> Self {
        Self {
            test_id: test_id.into(),
            status: TestStatus::ErrorInfrastructure,
            response: None,
            judge_score: None,
            findings: Vec::new(),
            cost_estimate: 0.0,
            latency_ms,
            cache_hit: false,
            conversation_id: None,
        }
    }

    pub fn policy_error(test_id: impl Into<String>, latency_ms: u64) -> Self {
        Self {
            test_id: test_id.into(),
            status: TestStatus::ErrorPolicy,
            response: None,
            judge_score: None,
            findings: Vec::new(),
            cost_estimate: 0.0,
            latency_ms,
            cache_hit: false,
            conversation_id: None,
        }
    }

    pub fn is_jailbreak_success(&self) -> bool {
        matches!(self.status, TestStatus::Failed) && !self.findings.is_empty()
    }
}

/// A cached model response, content-addressed (spec.md §3 `CacheEntry`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    pub key: String,
    pub value: ModelResponse,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub expires_at: chrono::DateTime<chrono::Utc>,
    pub engine_version: String,
}

/// Aggregate metrics and CI bounds for a completed run (spec.md §3 `RunSummary`).
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RunSummary {
    pub run_id: uuid::Uuid,
    pub suite_name: String,
    pub suite_version: String,
    pub counts: StatusCounts,
    pub metrics: HashMap<String, f64>,
    pub cost_total: f64,
    pub duration_ms: u64,
    pub budget_exceeded: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct StatusCounts {
    pub passed: u64,
    pub failed: u64,
    pub error_infrastructure: u64,
    pub error_policy: u64,
    pub skipped: u64,
}

impl StatusCounts {
    pub fn total(&self) -> u64 {
        self.passed + self.failed + self.error_infrastructure + self.error_policy + self.skipped
    }

    pub fn record(&mut self, status: TestStatus) {
        match status {
            TestStatus::Passed => self.passed += 1,
            TestStatus::Failed => self.failed += 1,
            TestStatus::ErrorInfrastructure => self.error_infrastructure += 1,
            TestStatus::ErrorPolicy => self.error_policy += 1,
            TestStatus::Skipped => self.skipped += 1,
        }
    }
}
