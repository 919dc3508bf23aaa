//! Policy-rule detectors (spec.md §4.5). Each detector is stateless and
//! independent; `TestResult.findings` is the concatenation of every
//! configured detector's output plus the judge's own jailbreak finding.

pub mod content_rule;
pub mod pii;
pub mod tool_allowlist;

pub use content_rule::ContentRuleDetector;
pub use pii::PiiDetector;
pub use tool_allowlist::ToolAllowlistDetector;

use crate::model::Finding;
use aipo_adapter_api::ModelResponse;

/// A detector inspects a single response (and the tool calls inside it) and
/// emits zero or more findings. Detectors never see the prompt: policy rules
/// apply to what came back, not what was asked (spec.md §4.5).
pub trait Detector: Send + Sync {
    fn detect(&self, test_id: &str, response: &ModelResponse) -> Vec<Finding>;

    fn name(&self) -> &'static str;
}
