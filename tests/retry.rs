//! Retry Mechanism Integration Tests
//!
//! Verifies exact attempt counts, transient-only retrying and exhaustion
//! behavior of the RetryingClient.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use outreach::core::{cancel_pair, CancelToken, RetryError, RetryPolicy, RetryingClient};

fn fast_policy(max_attempts: u32) -> RetryPolicy {
    RetryPolicy::new(max_attempts, 1, 4)
}

#[tokio::test]
async fn transient_failures_then_success_consumes_exact_attempts() {
    for max_attempts in 1..=5u32 {
        let calls = Arc::new(AtomicU32::new(0));
        let calls_in_op = Arc::clone(&calls);

        let result = RetryingClient
            .execute(&fast_policy(max_attempts), &CancelToken::disabled(), |attempt| {
                let calls = Arc::clone(&calls_in_op);
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    if attempt < max_attempts {
                        Err(RetryError::transient(anyhow::anyhow!("flaky")))
                    } else {
                        Ok("done")
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), "done");
        assert_eq!(calls.load(Ordering::SeqCst), max_attempts);
    }
}

#[tokio::test]
async fn exhaustion_propagates_last_transient_error() {
    let calls = Arc::new(AtomicU32::new(0));
    let calls_in_op = Arc::clone(&calls);

    let result: Result<(), _> = RetryingClient
        .execute(&fast_policy(3), &CancelToken::disabled(), |attempt| {
            let calls = Arc::clone(&calls_in_op);
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(RetryError::transient(anyhow::anyhow!(
                    "failure on attempt {}",
                    attempt
                )))
            }
        })
        .await;

    // Exhaustion never becomes a success; the last error surfaces
    match result {
        Err(RetryError::Transient(err)) => {
            assert_eq!(err.to_string(), "failure on attempt 3");
        }
        other => panic!("Expected transient error, got {:?}", other.map(|_| ())),
    }
    assert_eq!(calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn permanent_error_propagates_without_retry() {
    let calls = Arc::new(AtomicU32::new(0));
    let calls_in_op = Arc::clone(&calls);

    let result: Result<(), _> = RetryingClient
        .execute(&fast_policy(5), &CancelToken::disabled(), |_| {
            let calls = Arc::clone(&calls_in_op);
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(RetryError::permanent(anyhow::anyhow!("bad payload")))
            }
        })
        .await;

    assert!(matches!(result, Err(RetryError::Permanent(_))));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn cancellation_interrupts_backoff_sleep() {
    let (handle, token) = cancel_pair();

    // Long backoff that would stall the test if the token did not fire
    let policy = RetryPolicy::new(3, 60_000, 60_000);

    let task = tokio::spawn(async move {
        RetryingClient
            .execute(&policy, &token, |_| async {
                Err::<(), _>(RetryError::transient(anyhow::anyhow!("flaky")))
            })
            .await
    });

    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    handle.cancel();

    let result = tokio::time::timeout(std::time::Duration::from_secs(5), task)
        .await
        .expect("cancellation must interrupt the backoff sleep")
        .unwrap();

    assert!(matches!(result, Err(RetryError::Cancelled)));
}

#[tokio::test]
async fn cancellation_interrupts_inflight_attempt() {
    let (handle, token) = cancel_pair();
    let policy = RetryPolicy::new(3, 1, 1);

    // The operation hangs forever; only the token can unblock it
    let task = tokio::spawn(async move {
        RetryingClient
            .execute(&policy, &token, |_| async {
                std::future::pending::<Result<(), RetryError>>().await
            })
            .await
    });

    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    handle.cancel();

    let result = tokio::time::timeout(std::time::Duration::from_secs(5), task)
        .await
        .expect("cancellation must interrupt the hung attempt")
        .unwrap();

    assert!(matches!(result, Err(RetryError::Cancelled)));
}

#[tokio::test]
async fn disabled_token_lets_sleep_finish() {
    let token = CancelToken::disabled();
    token
        .sleep(std::time::Duration::from_millis(5))
        .await
        .unwrap();
    assert!(!token.is_cancelled());

    // And its cancelled() future never resolves
    let pending = tokio::time::timeout(
        std::time::Duration::from_millis(10),
        token.cancelled(),
    )
    .await;
    assert!(pending.is_err());
}
