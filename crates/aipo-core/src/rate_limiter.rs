//! Token-bucket rate limiter with jitter (spec.md §4.2).

use aipo_common::Cancellation;
use rand::Rng;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::time::{Duration, Instant};

#[derive(Debug, thiserror::Error)]
pub enum AcquireError {
    #[error("cancelled while waiting for rate limiter")]
    Cancelled,
}

struct BucketState {
    tokens: f64,
    last_refill: Instant,
}

/// A single token bucket: `capacity` tokens, refilled at `refill_rate`
/// tokens/second, with an optional per-acquisition jitter delay.
pub struct RateLimiter {
    capacity: f64,
    refill_rate: f64,
    jitter_ms: u64,
    state: Mutex<BucketState>,
}

impl RateLimiter {
    pub fn new(capacity: f64, refill_rate: f64, jitter_ms: u64) -> Self {
        Self {
            capacity,
            refill_rate,
            jitter_ms,
            state: Mutex::new(BucketState {
                tokens: capacity,
                last_refill: Instant::now(),
            }),
        }
    }

    /// Block until `weight` tokens are available, or the cancellation signal
    /// fires. No `invoke()` call completes acquisition of fewer than 1 token
    /// (spec.md §4.2 invariant) — callers always pass `weight >= 1`.
    pub async fn acquire(&self, weight: u32, cancel: &mut Cancellation) -> Result<(), AcquireError> {
        let weight = weight.max(1) as f64;
        loop {
            if cancel.is_cancelled() {
                return Err(AcquireError::Cancelled);
            }
            let wait = {
                let mut s = self.state.lock().await;
                self.refill_locked(&mut s);
                if s.tokens >= weight {
                    s.tokens -= weight;
                    None
                } else {
                    let deficit = weight - s.tokens;
                    Some(Duration::from_secs_f64((deficit / self.refill_rate).max(0.0)))
                }
            };

            match wait {
                None => {
                    if self.jitter_ms > 0 {
                        let extra = rand::thread_rng().gen_range(0..=self.jitter_ms);
                        tokio::select! {
                            _ = tokio::time::sleep(Duration::from_millis(extra)) => {}
                            _ = cancel.cancelled() => return Err(AcquireError::Cancelled),
                        }
                    }
                    return Ok(());
                }
                Some(d) => {
                    tokio::select! {
                        _ = tokio::time::sleep(d) => {}
                        _ = cancel.cancelled() => return Err(AcquireError::Cancelled),
                    }
                }
            }
        }
    }

    fn refill_locked(&self, s: &mut BucketState) {
        let now = Instant::now();
        let elapsed = now.duration_since(s.last_refill).as_secs_f64();
        s.tokens = (s.tokens + elapsed * self.refill_rate).min(self.capacity);
        s.last_refill = now;
    }
}

/// Composes several sub-limiters so cross-adapter budgets are respected
/// together (spec.md §4.2 `GlobalRateLimiter`). An acquisition only succeeds
/// once every composed limiter has granted tokens.
pub struct GlobalRateLimiter {
    limiters: Vec<Arc<RateLimiter>>,
}

impl GlobalRateLimiter {
    pub fn new(limiters: Vec<Arc<RateLimiter>>) -> Self {
        Self { limiters }
    }

    pub async fn acquire(&self, weight: u32, cancel: &mut Cancellation) -> Result<(), AcquireError> {
        for l in &self.limiters {
            l.acquire(weight, cancel).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn acquire_drains_bucket_and_blocks_until_refill() {
        let limiter = RateLimiter::new(2.0, 100.0, 0);
        let (_handle, mut cancel) = aipo_common::cancellation::pair();
        limiter.acquire(1, &mut cancel).await.unwrap();
        limiter.acquire(1, &mut cancel).await.unwrap();
        // Bucket now empty; a third acquisition must wait for refill rather
        // than erroring, and should still succeed quickly given the high
        // refill rate used here.
        let start = Instant::now();
        limiter.acquire(1, &mut cancel).await.unwrap();
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test]
    async fn cancellation_aborts_acquire_without_panicking() {
        let limiter = RateLimiter::new(1.0, 0.001, 0);
        let (handle, mut cancel) = aipo_common::cancellation::pair();
        limiter.acquire(1, &mut cancel).await.unwrap();
        handle.cancel();
        let err = limiter.acquire(1, &mut cancel).await.unwrap_err();
        assert!(matches!(err, AcquireError::Cancelled));
    }

    #[tokio::test]
    async fn global_limiter_acquires_from_every_sub_limiter() {
        let a = Arc::new(RateLimiter::new(5.0, 50.0, 0));
        let b = Arc::new(RateLimiter::new(5.0, 50.0, 0));
        let global = GlobalRateLimiter::new(vec![a.clone(), b.clone()]);
        let (_handle, mut cancel) = aipo_common::cancellation::pair();
        global.acquire(1, &mut cancel).await.unwrap();
    }
}
