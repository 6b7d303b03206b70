//! Uniform dry-run/live gating for external-effecting operations.
//!
//! Every adapter routes its live operation through [`SafetyGate::run`], so
//! there is exactly one place where dry runs are short-circuited and live
//! errors are converted into structured results.

use std::future::Future;

use anyhow::Result;
use tracing::info;

use crate::domain::ActionResult;

/// Enforces the dry-run contract around a live operation.
pub struct SafetyGate;

impl SafetyGate {
    /// Gate a live operation behind the `dry_run` flag.
    ///
    /// On a dry run the live closure is never invoked and no credentials
    /// are touched; a synthetic success is returned. On a live run any
    /// error from the closure becomes a failed [`ActionResult`]; a result
    /// returned by the closure passes through with `dry_run` forced false.
    ///
    /// Emits exactly one log line per invocation naming the category.
    /// Retries are not this layer's concern; they happen inside `live`.
    pub async fn run<F, Fut>(category: &str, description: &str, dry_run: bool, live: F) -> ActionResult
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<ActionResult>>,
    {
        if dry_run {
            info!(category, "Dry-run: would {}", description);
            return ActionResult::dry();
        }

        info!(category, "Live: {}", description);

        match live().await {
            Ok(mut result) => {
                result.dry_run = false;
                result
            }
            Err(err) => ActionResult::failed(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};

    #[tokio::test]
    async fn test_dry_run_short_circuits() {
        let invoked = AtomicBool::new(false);

        let result = SafetyGate::run("call", "place call to +15550000000", true, || {
            invoked.store(true, Ordering::SeqCst);
            async { Ok(ActionResult::ok(Some("CA1".to_string()))) }
        })
        .await;

        assert!(!invoked.load(Ordering::SeqCst));
        assert!(result.success);
        assert!(result.dry_run);
        assert!(result.sid.is_none());
        assert!(result.error.is_none());
    }

    #[tokio::test]
    async fn test_live_error_becomes_failed_result() {
        let result = SafetyGate::run("sms", "send message", false, || async {
            anyhow::bail!("provider exploded")
        })
        .await;

        assert!(!result.success);
        assert!(!result.dry_run);
        assert_eq!(result.error.as_deref(), Some("provider exploded"));
    }

    #[tokio::test]
    async fn test_live_result_passes_through() {
        let result = SafetyGate::run("call", "place call", false, || async {
            // A buggy live op claiming dry_run must still come out live
            let mut res = ActionResult::ok(Some("CA2".to_string()));
            res.dry_run = true;
            Ok(res)
        })
        .await;

        assert!(result.success);
        assert!(!result.dry_run);
        assert_eq!(result.sid.as_deref(), Some("CA2"));
    }
}
