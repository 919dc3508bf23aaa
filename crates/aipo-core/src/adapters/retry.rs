//! Shared retry/backoff loop for transport adapters (spec.md §4.1:
//! `RateLimitError` retried per provider `Retry-After` up to N attempts,
//! `TransientError` retried with exponential backoff and jitter; `AuthError`
//! and `ProtocolError` are fatal, never retried).

use aipo_adapter_api::{AdapterError, AdapterSpec, RetryAdvice};
use rand::Rng;
use std::time::Duration;

/// Runs `attempt` up to `spec.retry.max_attempts` times, honoring
/// `AdapterError::retry_after` when present and otherwise backing off
/// exponentially from `base_backoff_ms`, capped at `max_backoff_ms`, with
/// up to 20% jitter.
pub async fn with_retries<F, Fut, T>(spec: &AdapterSpec, mut attempt: F) -> Result<T, AdapterError>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, AdapterError>>,
{
    let mut last_err = None;
    for attempt_index in 0..spec.retry.max_attempts {
        match attempt().await {
            Ok(v) => return Ok(v),
            Err(e) if e.retry_advice() == RetryAdvice::Fatal => {
                return Err(e);
            }
            Err(e) => {
                let delay = e.retry_after().unwrap_or_else(|| {
                    exponential_backoff(attempt_index, spec.retry.base_backoff_ms, spec.retry.max_backoff_ms)
                });
                last_err = Some(e);
                tokio::time::sleep(delay).await;
            }
        }
    }
    Err(last_err.unwrap_or(AdapterError::Transient("retries exhausted".into())))
}

fn exponential_backoff(attempt_index: u32, base_ms: u64, max_ms: u64) -> Duration {
    let exp = base_ms.saturating_mul(1u64 << attempt_index.min(16));
    let capped = exp.min(max_ms);
    let jitter = rand::thread_rng().gen_range(0..=(capped / 5).max(1));
    Duration::from_millis(capped.saturating_add(jitter))
}

#[cfg(test)]
mod tests {
    use super::*;
    use aipo_adapter_api::spec::{Coordinates, ProviderKind, RateLimitParams, RetryPolicy};
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn spec_with_retries(max_attempts: u32) -> AdapterSpec {
        AdapterSpec {
            name: "t".into(),
            kind: ProviderKind::Mock,
            coordinates: Coordinates::default(),
            auth: None,
            params: HashMap::new(),
            rate_limit: RateLimitParams::default(),
            retry: RetryPolicy {
                max_attempts,
                base_backoff_ms: 1,
                max_backoff_ms: 5,
            },
        }
    }

    #[tokio::test]
    async fn fatal_error_is_not_retried() {
        let spec = spec_with_retries(5);
        let calls = AtomicU32::new(0);
        let result: Result<(), AdapterError> = with_retries(&spec, || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(AdapterError::Auth("bad key".into())) }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn transient_error_retries_until_success() {
        let spec = spec_with_retries(5);
        let calls = AtomicU32::new(0);
        let result = with_retries(&spec, || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(AdapterError::Transient("boom".into()))
                } else {
                    Ok::<_, AdapterError>(42)
                }
            }
        })
        .await
        .unwrap();
        assert_eq!(result, 42);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn retries_exhausted_returns_last_error() {
        let spec = spec_with_retries(2);
        let result: Result<(), AdapterError> =
            with_retries(&spec, || async { Err(AdapterError::Transient("boom".into())) }).await;
        assert!(result.is_err());
    }
}
