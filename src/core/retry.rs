//! Generic retrying executor with exponential backoff.
//!
//! [`RetryingClient`] is a pure mechanism: it knows nothing about dry-run
//! semantics or credentials. Only transient errors are retried; permanent
//! errors propagate immediately without consuming the remaining attempts.
//! Backoff sleeps race against a caller-supplied [`CancelToken`].

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::watch;
use tracing::warn;

/// Error classification for retryable operations.
#[derive(Debug, Error)]
pub enum RetryError {
    /// Plausibly succeeds on retry: timeouts, connection failures, 5xx
    #[error("{0}")]
    Transient(anyhow::Error),

    /// Retry is futile: malformed request, 4xx, local validation
    #[error("{0}")]
    Permanent(anyhow::Error),

    /// The caller cancelled the operation during a backoff sleep
    #[error("operation cancelled")]
    Cancelled,
}

impl RetryError {
    pub fn transient(err: impl Into<anyhow::Error>) -> Self {
        Self::Transient(err.into())
    }

    pub fn permanent(err: impl Into<anyhow::Error>) -> Self {
        Self::Permanent(err.into())
    }
}

/// Backoff schedule for a retryable operation.
///
/// Each caller supplies its own policy; there is no shared global policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Maximum number of attempts (including the first try)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Initial delay between attempts in milliseconds
    #[serde(default = "default_base_delay")]
    pub base_delay_ms: u64,

    /// Cap on the delay between attempts in milliseconds
    #[serde(default = "default_max_delay")]
    pub max_delay_ms: u64,
}

fn default_max_attempts() -> u32 {
    3
}
fn default_base_delay() -> u64 {
    1000
}
fn default_max_delay() -> u64 {
    16000
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay(),
            max_delay_ms: default_max_delay(),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay_ms: u64, max_delay_ms: u64) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay_ms,
            max_delay_ms,
        }
    }

    /// Delay to sleep after the given failed attempt (1-indexed):
    /// `min(max_delay, base_delay * 2^(attempt-1))`. No jitter.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let shift = attempt.saturating_sub(1).min(32);
        let delay = self
            .base_delay_ms
            .saturating_mul(1u64 << shift)
            .min(self.max_delay_ms);
        Duration::from_millis(delay)
    }
}

/// Fires a [`CancelToken`], interrupting any in-flight backoff sleep.
pub struct CancelHandle {
    tx: watch::Sender<bool>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        let _ = self.tx.send(true);
    }
}

/// Caller-supplied cancellation signal.
///
/// Cheap to clone; all clones observe the same signal.
#[derive(Debug, Clone)]
pub struct CancelToken {
    rx: watch::Receiver<bool>,
    // Keeps the sender alive for tokens that can never fire
    _guard: Option<Arc<watch::Sender<bool>>>,
}

/// Create a linked cancel handle and token.
pub fn cancel_pair() -> (CancelHandle, CancelToken) {
    let (tx, rx) = watch::channel(false);
    (CancelHandle { tx }, CancelToken { rx, _guard: None })
}

impl CancelToken {
    /// A token that never fires, for callers without a cancellation source.
    pub fn disabled() -> Self {
        let (tx, rx) = watch::channel(false);
        Self {
            rx,
            _guard: Some(Arc::new(tx)),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolve once the token fires. Never resolves for tokens whose
    /// handle was dropped without firing.
    pub async fn cancelled(&self) {
        let mut rx = self.rx.clone();
        loop {
            if *rx.borrow() {
                return;
            }
            if rx.changed().await.is_err() {
                // Handle dropped without firing: this token can never fire
                std::future::pending::<()>().await;
            }
        }
    }

    /// Sleep for `duration`, returning early with [`RetryError::Cancelled`]
    /// if the token fires first.
    pub async fn sleep(&self, duration: Duration) -> Result<(), RetryError> {
        if self.is_cancelled() {
            return Err(RetryError::Cancelled);
        }

        tokio::select! {
            _ = tokio::time::sleep(duration) => Ok(()),
            () = self.cancelled() => Err(RetryError::Cancelled),
        }
    }
}

/// Executes an operation under a [`RetryPolicy`].
#[derive(Debug, Default, Clone, Copy)]
pub struct RetryingClient;

impl RetryingClient {
    /// Call `op` up to `policy.max_attempts` times.
    ///
    /// `op` receives the 1-indexed attempt number. Transient failures sleep
    /// and retry; permanent failures and cancellation propagate at once.
    /// The token is raced against both the in-flight attempt and the
    /// backoff sleep, so a hung attempt cannot outlive a cancel. When
    /// attempts are exhausted the last transient error propagates;
    /// exhaustion is never converted into a success.
    pub async fn execute<T, F, Fut>(
        &self,
        policy: &RetryPolicy,
        cancel: &CancelToken,
        mut op: F,
    ) -> Result<T, RetryError>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, RetryError>>,
    {
        let mut attempt = 0u32;

        loop {
            attempt += 1;

            let result = tokio::select! {
                result = op(attempt) => result,
                () = cancel.cancelled() => return Err(RetryError::Cancelled),
            };

            match result {
                Ok(value) => return Ok(value),
                Err(RetryError::Transient(err)) if attempt < policy.max_attempts => {
                    let delay = policy.delay_for_attempt(attempt);
                    warn!(
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "Transient failure, retrying"
                    );
                    cancel.sleep(delay).await?;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn test_backoff_schedule() {
        let policy = RetryPolicy::new(5, 1000, 16000);

        assert_eq!(policy.delay_for_attempt(1), Duration::from_millis(1000));
        assert_eq!(policy.delay_for_attempt(2), Duration::from_millis(2000));
        assert_eq!(policy.delay_for_attempt(3), Duration::from_millis(4000));
        assert_eq!(policy.delay_for_attempt(5), Duration::from_millis(16000));
        assert_eq!(policy.delay_for_attempt(10), Duration::from_millis(16000)); // Capped
    }

    #[test]
    fn test_policy_defaults() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts, 3);
        assert_eq!(policy.base_delay_ms, 1000);
        assert_eq!(policy.max_delay_ms, 16000);
    }

    #[tokio::test]
    async fn test_permanent_error_not_retried() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::new(5, 1, 10);

        let result: Result<(), _> = RetryingClient
            .execute(&policy, &CancelToken::disabled(), |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(RetryError::permanent(anyhow::anyhow!("bad request"))) }
            })
            .await;

        assert!(matches!(result, Err(RetryError::Permanent(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_cancelled_during_backoff() {
        let (handle, token) = cancel_pair();
        handle.cancel();

        let policy = RetryPolicy::new(3, 60_000, 60_000);
        let result: Result<(), _> = RetryingClient
            .execute(&policy, &token, |_| async {
                Err(RetryError::transient(anyhow::anyhow!("flaky")))
            })
            .await;

        assert!(matches!(result, Err(RetryError::Cancelled)));
    }
}
