//! Safety-gated SMS sending.

use std::sync::Arc;

use tracing::warn;

use crate::core::gate::SafetyGate;
use crate::core::retry::{CancelToken, RetryPolicy, RetryingClient};
use crate::core::secrets::SecretCache;
use crate::domain::ActionResult;

use super::telephony::{TelephonyCreds, TelephonyProvider};

/// Sends outbound text messages through the configured providers.
pub struct SmsAdapter {
    providers: Vec<Arc<dyn TelephonyProvider>>,
    secrets: Arc<SecretCache>,
    retry: RetryPolicy,
}

impl SmsAdapter {
    pub fn new(providers: Vec<Arc<dyn TelephonyProvider>>, secrets: Arc<SecretCache>) -> Self {
        Self {
            providers,
            secrets,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Send `body` to `to_number`, gated by `dry_run`.
    pub async fn perform(
        &self,
        to_number: &str,
        body: &str,
        from_number: Option<&str>,
        dry_run: bool,
        cancel: &CancelToken,
    ) -> ActionResult {
        let description = format!("send SMS to {} body={:?}", to_number, body);

        SafetyGate::run("sms", &description, dry_run, || async move {
            let bundle = self.secrets.credentials().await?;
            let Some(creds) = TelephonyCreds::from_bundle(&bundle, from_number) else {
                return Ok(ActionResult::failed("missing credentials"));
            };

            let client = RetryingClient;
            let mut last_error = None;

            for provider in &self.providers {
                match client
                    .execute(&self.retry, cancel, |_| {
                        provider.send_message(&creds, to_number, body)
                    })
                    .await
                {
                    Ok(sid) => return Ok(ActionResult::ok(sid)),
                    Err(err) => {
                        warn!(
                            provider = provider.name(),
                            error = %err,
                            "SMS via provider failed, trying next"
                        );
                        last_error = Some(err);
                    }
                }
            }

            let message = last_error
                .map(|e| e.to_string())
                .unwrap_or_else(|| "no telephony provider configured".to_string());
            Ok(ActionResult::failed(message))
        })
        .await
    }
}
