//! Shared HTTP error classification for provider calls.
//!
//! Maps wire-level failures onto the retry taxonomy: timeouts, connection
//! failures and 5xx responses are transient; 4xx responses are permanent.

use std::time::Duration;

use anyhow::anyhow;
use reqwest::{Response, StatusCode};

use crate::core::retry::RetryError;

/// Per-request deadline when configuration does not supply one.
pub(crate) const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// HTTP client with a per-request deadline. A provider that accepts the
/// connection and never responds surfaces as a transient timeout instead
/// of hanging the stage.
pub(crate) fn client(timeout: Duration) -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        // Builder failure means the TLS backend is unusable; the stock
        // client is the only remaining option
        .unwrap_or_default()
}

/// Classify a reqwest transport error.
pub(crate) fn classify_transport(err: reqwest::Error) -> RetryError {
    if err.is_timeout() || err.is_connect() {
        RetryError::transient(err)
    } else if err.is_builder() || err.is_request() {
        RetryError::permanent(err)
    } else {
        // Body/decode errors mid-stream are worth another attempt
        RetryError::transient(err)
    }
}

/// Check a response status, consuming the body into the error message on
/// failure. Non-2xx responses are errors: 5xx transient, everything else
/// permanent.
pub(crate) async fn check_status(response: Response) -> Result<Response, RetryError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let err = anyhow!("provider returned {}: {}", status, truncate(&body, 256));

    if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
        Err(RetryError::Transient(err))
    } else {
        Err(RetryError::Permanent(err))
    }
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_short_string() {
        assert_eq!(truncate("abc", 10), "abc");
        assert_eq!(truncate("abcdef", 3), "abc");
    }
}
