use tokio::sync::watch;

/// A run-scoped cancellation signal. Cloned cheaply and fanned out to every
/// worker, the rate limiter, the cache, and conversation memory. Every
/// blocking call in the engine accepts one of these and honors it instead of
/// blocking unbounded (spec.md §5).
#[derive(Clone)]
pub struct Cancellation {
    rx: watch::Receiver<bool>,
}

/// The write half, held by whoever owns the run (the `TestRunner`). Dropping
/// it does not cancel; call `cancel()` explicitly.
pub struct CancellationHandle {
    tx: watch::Sender<bool>,
}

pub fn pair() -> (CancellationHandle, Cancellation) {
    let (tx, rx) = watch::channel(false);
    (CancellationHandle { tx }, Cancellation { rx })
}

impl CancellationHandle {
    pub fn cancel(&self) {
        let _ = self.tx.send(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.tx.borrow()
    }
}

impl Cancellation {
    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once cancellation fires. Intended for use in `tokio::select!`
    /// alongside the actual blocking work so neither side can block
    /// unbounded.
    pub async fn cancelled(&mut self) {
        if self.is_cancelled() {
            return;
        }
        // `changed()` only errors if the sender is dropped; treat that the
        // same as "never cancelled" rather than panicking workers.
        let _ = self.rx.changed().await;
    }
}
