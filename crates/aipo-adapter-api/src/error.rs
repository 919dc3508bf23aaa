use std::time::Duration;

/// Failure taxonomy for [`crate::Adapter::invoke`] (spec.md §4.1).
///
/// This is the seam the `ErrorClassifier` (aipo-core) reads to decide whether
/// a failure becomes `status=error-infrastructure` (never a finding) or is
/// allowed to propagate as a genuine test outcome.
#[derive(Debug, thiserror::Error, Clone)]
pub enum AdapterError {
    /// Credentials invalid or rejected. Fatal: never retried.
    #[error("authentication failed: {0}")]
    Auth(String),

    /// Provider signalled a rate limit (HTTP 429 or provider-specific
    /// equivalent). Retried per `Retry-After` up to the adapter's configured
    /// attempt budget, then escalated.
    #[error("rate limited{}: {0}", retry_after_suffix(.1))]
    RateLimit(String, Option<Duration>),

    /// 5xx / network-level failure. Retried with exponential backoff and
    /// jitter, bounded by the adapter's retry policy.
    #[error("transient transport failure: {0}")]
    Transient(String),

    /// Malformed or schema-violating response body. Fatal: never retried.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// The run's cancellation signal fired before acquisition/transport
    /// completed. Propagated without ever reaching the transport.
    #[error("cancelled")]
    Cancelled,

    /// Per-call timeout elapsed.
    #[error("timed out after {0:?}")]
    Timeout(Duration),
}

fn retry_after_suffix(d: &Option<Duration>) -> String {
    match d {
        Some(d) => format!(" (retry after {:?})", d),
        None => String::new(),
    }
}

/// What the caller should do in response to an [`AdapterError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryAdvice {
    /// Never retry; the error is fatal for this test.
    Fatal,
    /// Retry is allowed, honoring the given backoff hint if present.
    Retryable,
}

impl AdapterError {
    pub fn retry_advice(&self) -> RetryAdvice {
        match self {
            AdapterError::RateLimit(_, _) | AdapterError::Transient(_) => RetryAdvice::Retryable,
            AdapterError::Auth(_)
            | AdapterError::Protocol(_)
            | AdapterError::Cancelled
            | AdapterError::Timeout(_) => RetryAdvice::Fatal,
        }
    }

    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            AdapterError::RateLimit(_, d) => *d,
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_limit_and_transient_are_retryable() {
        assert_eq!(
            AdapterError::RateLimit("x".into(), None).retry_advice(),
            RetryAdvice::Retryable
        );
        assert_eq!(
            AdapterError::Transient("x".into()).retry_advice(),
            RetryAdvice::Retryable
        );
    }

    #[test]
    fn auth_and_protocol_are_fatal() {
        assert_eq!(
            AdapterError::Auth("x".into()).retry_advice(),
            RetryAdvice::Fatal
        );
        assert_eq!(
            AdapterError::Protocol("x".into()).retry_advice(),
            RetryAdvice::Fatal
        );
    }
}
