//! Coarse/fine-grained exit and reason codes (spec.md §6 "Gate exit codes:
//! 0 pass, 1 fail, 2 usage error. This is normative."). Grounded in the
//! teacher's `assay-cli::exit_codes` contract, narrowed to the three codes
//! spec.md actually names: our richer classifications live only in
//! `reason_code`/`next_step`, never in the process exit status (DESIGN.md
//! Open Question decision #5).

use serde::{Deserialize, Serialize};

pub const EXIT_SUCCESS: i32 = 0;
pub const EXIT_TEST_FAILURE: i32 = 1;
pub const EXIT_CONFIG_ERROR: i32 = 2;

/// Fine-grained, machine-readable reason for a non-trivial outcome. Every
/// variant maps to exactly one of the three normative exit codes via
/// [`ReasonCode::exit_code`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReasonCode {
    Success,

    // Usage / configuration errors -> exit 2
    ConfigParse,
    PolicyParse,
    SuiteNotFound,
    InvalidArgs,
    MissingCredential,

    // Test / gate failures -> exit 1
    GateThresholdViolation,
    TestsFailed,
}

impl ReasonCode {
    pub fn exit_code(&self) -> i32 {
        match self {
            ReasonCode::Success => EXIT_SUCCESS,
            ReasonCode::ConfigParse
            | ReasonCode::PolicyParse
            | ReasonCode::SuiteNotFound
            | ReasonCode::InvalidArgs
            | ReasonCode::MissingCredential => EXIT_CONFIG_ERROR,
            ReasonCode::GateThresholdViolation | ReasonCode::TestsFailed => EXIT_TEST_FAILURE,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ReasonCode::Success => "",
            ReasonCode::ConfigParse => "E_CONFIG_PARSE",
            ReasonCode::PolicyParse => "E_POLICY_PARSE",
            ReasonCode::SuiteNotFound => "E_SUITE_NOT_FOUND",
            ReasonCode::InvalidArgs => "E_INVALID_ARGS",
            ReasonCode::MissingCredential => "E_MISSING_CREDENTIAL",
            ReasonCode::GateThresholdViolation => "E_GATE_THRESHOLD_VIOLATION",
            ReasonCode::TestsFailed => "E_TESTS_FAILED",
        }
    }

    pub fn next_step(&self, context: Option<&str>) -> String {
        match self {
            ReasonCode::Success => String::new(),
            ReasonCode::ConfigParse => format!("Run: aipo doctor check --config {}", context.unwrap_or("<aipo.yaml>")),
            ReasonCode::PolicyParse => format!("Validate the policy file: {}", context.unwrap_or("<policy.yaml>")),
            ReasonCode::SuiteNotFound => format!("Check the suite path: {}", context.unwrap_or("<suite.yaml>")),
            ReasonCode::InvalidArgs => "Run: aipo --help for usage".to_string(),
            ReasonCode::MissingCredential => format!("Set the required environment variable: {}", context.unwrap_or("<VAR>")),
            ReasonCode::GateThresholdViolation => "Run: aipo gate --summary <path> for the failed checks".to_string(),
            ReasonCode::TestsFailed => "Inspect reports/summary.json for per-test status".to_string(),
        }
    }
}

impl std::fmt::Display for ReasonCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Structured outcome suitable for embedding in `summary.json` alongside
/// the raw exit code.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunOutcome {
    pub exit_code: i32,
    pub reason_code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_step: Option<String>,
}

impl RunOutcome {
    pub fn success() -> Self {
        Self { exit_code: EXIT_SUCCESS, reason_code: String::new(), message: None, next_step: None }
    }

    pub fn from_reason(reason: ReasonCode, message: Option<String>, context: Option<&str>) -> Self {
        let next_step = (reason != ReasonCode::Success).then(|| reason.next_step(context));
        Self { exit_code: reason.exit_code(), reason_code: reason.as_str().to_string(), message, next_step }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes_match_the_three_normative_buckets() {
        assert_eq!(ReasonCode::Success.exit_code(), 0);
        assert_eq!(ReasonCode::GateThresholdViolation.exit_code(), 1);
        assert_eq!(ReasonCode::ConfigParse.exit_code(), 2);
    }
}
