//! Error taxonomy and the `ErrorClassifier` (spec.md §4.10, §7). Grounded in
//! the teacher's `RunError`/`RunErrorKind` split: a typed kind for programmatic
//! dispatch plus a free-form message and optional structured context.

use crate::model::TestStatus;
use aipo_adapter_api::AdapterError;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunErrorKind {
    AuthError,
    ConfigError,
    ProtocolMismatch,
    Network,
    Timeout,
    RateLimitExhausted,
    JudgePolicyFailure,
    Cancelled,
    Other,
}

#[derive(Debug, Clone)]
pub struct RunError {
    pub kind: RunErrorKind,
    pub message: String,
    pub provider: Option<String>,
    /// Present only for `Other`: a stable hash of the error so operators can
    /// correlate recurring unexpected failures without leaking full
    /// tracebacks into the evidence pack.
    pub traceback_hash: Option<String>,
}

impl fmt::Display for RunError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}: {}", self.kind, self.message)
    }
}

impl std::error::Error for RunError {}

impl RunError {
    pub fn new(kind: RunErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            provider: None,
            traceback_hash: None,
        }
    }

    pub fn with_provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = Some(provider.into());
        self
    }

    /// Map an [`AdapterError`] to a `RunError`, after its retry budget (if
    /// any) has been exhausted by the caller. This function does not retry;
    /// retrying is the `TestRunner`'s job (spec.md §4.8).
    pub fn from_adapter_error(e: &AdapterError) -> Self {
        match e {
            AdapterError::Auth(msg) => RunError::new(RunErrorKind::AuthError, msg.clone()),
            AdapterError::RateLimit(msg, _) => {
                RunError::new(RunErrorKind::RateLimitExhausted, msg.clone())
            }
            AdapterError::Transient(msg) => RunError::new(RunErrorKind::Network, msg.clone()),
            AdapterError::Protocol(msg) => {
                RunError::new(RunErrorKind::ProtocolMismatch, msg.clone())
            }
            AdapterError::Cancelled => RunError::new(RunErrorKind::Cancelled, "cancelled"),
            AdapterError::Timeout(d) => {
                RunError::new(RunErrorKind::Timeout, format!("timed out after {:?}", d))
            }
        }
    }

    pub fn other(message: impl Into<String>) -> Self {
        let message = message.into();
        let hash = aipo_common::sha256_hex(message.as_bytes());
        Self {
            kind: RunErrorKind::Other,
            message,
            provider: None,
            traceback_hash: Some(hash.chars().take(16).collect()),
        }
    }
}

/// Denominator policy for how infrastructure/policy errors count toward ASR
/// (spec.md §4.10): `strict` counts them in the ASR denominator, `lenient`
/// excludes them entirely.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AsrDenominatorMode {
    #[default]
    Strict,
    Lenient,
}

/// Maps a `RunError` to the `TestResult.status` it produces (spec.md §4.10).
/// `AuthError`, `ConfigError`, `ProtocolMismatch`, network/DNS/TLS failures
/// and timeouts all become `error-infrastructure` with zero findings.
/// Judge-parsing failures become the separate `error-policy` bucket. Anything
/// else unexpected still becomes `error-infrastructure`, tagged with a
/// traceback hash rather than panicking the worker.
pub struct ErrorClassifier;

impl ErrorClassifier {
    pub fn classify(err: &RunError) -> TestStatus {
        match err.kind {
            RunErrorKind::AuthError
            | RunErrorKind::ConfigError
            | RunErrorKind::ProtocolMismatch
            | RunErrorKind::Network
            | RunErrorKind::Timeout
            | RunErrorKind::RateLimitExhausted
            | RunErrorKind::Cancelled
            | RunErrorKind::Other => TestStatus::ErrorInfrastructure,
            RunErrorKind::JudgePolicyFailure => TestStatus::ErrorPolicy,
        }
    }

    /// Whether a result with this status contributes to the ASR denominator,
    /// per the run's configured mode (spec.md §4.10, Open Question in §9).
    pub fn counts_toward_asr_denominator(status: TestStatus, mode: AsrDenominatorMode) -> bool {
        match status {
            TestStatus::Passed | TestStatus::Failed => true,
            TestStatus::ErrorInfrastructure | TestStatus::ErrorPolicy => {
                mode == AsrDenominatorMode::Strict
            }
            TestStatus::Skipped => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_error_is_infrastructure_with_no_findings() {
        let e = RunError::from_adapter_error(&AdapterError::Auth("bad key".into()));
        assert_eq!(ErrorClassifier::classify(&e), TestStatus::ErrorInfrastructure);
    }

    #[test]
    fn timeout_is_infrastructure() {
        let e = RunError::from_adapter_error(&AdapterError::Timeout(std::time::Duration::from_secs(5)));
        assert_eq!(ErrorClassifier::classify(&e), TestStatus::ErrorInfrastructure);
    }

    #[test]
    fn judge_policy_failure_is_separate_bucket() {
        let e = RunError::new(RunErrorKind::JudgePolicyFailure, "bad json from judge");
        assert_eq!(ErrorClassifier::classify(&e), TestStatus::ErrorPolicy);
    }

    #[test]
    fn strict_mode_counts_infra_errors_lenient_does_not() {
        assert!(ErrorClassifier::counts_toward_asr_denominator(
            TestStatus::ErrorInfrastructure,
            AsrDenominatorMode::Strict
        ));
        assert!(!ErrorClassifier::counts_toward_asr_denominator(
            TestStatus::ErrorInfrastructure,
            AsrDenominatorMode::Lenient
        ));
    }
}
