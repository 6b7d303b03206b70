//! Safety-gated summarization requests.
//!
//! Asks the summarization service for a digest of the run. The service is
//! an authenticated HTTP endpoint; the adapter normalizes its response
//! like every other effect.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::core::gate::SafetyGate;
use crate::core::retry::{CancelToken, RetryPolicy, RetryingClient};
use crate::domain::{ActionResult, SummarizeResult};

use super::http::{self, check_status, classify_transport};

#[derive(Debug, Serialize)]
struct SummarizeRequest<'a> {
    agent: &'a str,
    prompt: &'a str,
}

#[derive(Debug, Deserialize)]
struct SummarizeResponse {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    response: Option<String>,
}

/// Requests a summary of pipeline results from the summarization service.
pub struct SummarizeAdapter {
    endpoint: String,
    agent: String,
    retry: RetryPolicy,
    client: reqwest::Client,
}

impl SummarizeAdapter {
    pub fn new(endpoint: impl Into<String>, agent: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            agent: agent.into(),
            retry: RetryPolicy::default(),
            client: http::client(http::DEFAULT_TIMEOUT),
        }
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.client = http::client(timeout);
        self
    }

    /// Request a summary, gated by `dry_run`.
    pub async fn perform(&self, prompt: &str, dry_run: bool, cancel: &CancelToken) -> SummarizeResult {
        let description = format!("request summary from {} agent={}", self.endpoint, self.agent);

        let mut response_text: Option<String> = None;
        let response_slot = &mut response_text;

        let action = SafetyGate::run("summarize", &description, dry_run, move || async move {
            let payload = SummarizeRequest {
                agent: &self.agent,
                prompt,
            };

            let reply = RetryingClient
                .execute(&self.retry, cancel, |_| {
                    let payload = &payload;
                    async move {
                        debug!(endpoint = %self.endpoint, "Requesting summary");
                        let response = self
                            .client
                            .post(&self.endpoint)
                            .json(payload)
                            .send()
                            .await
                            .map_err(classify_transport)?;
                        let response = check_status(response).await?;
                        response
                            .json::<SummarizeResponse>()
                            .await
                            .map_err(classify_transport)
                    }
                })
                .await
                .map_err(anyhow::Error::from)?;

            *response_slot = reply.response;
            Ok(ActionResult::ok(reply.id))
        })
        .await;

        if action.dry_run {
            response_text = Some("would request summary".to_string());
        }

        SummarizeResult {
            action,
            response: response_text,
        }
    }
}
