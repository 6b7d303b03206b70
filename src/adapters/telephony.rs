//! Telephony provider capability and its REST-backed implementation.
//!
//! Adapters talk to a [`TelephonyProvider`] rather than a concrete client
//! library. Providers are tried in order of preference; each variant must
//! produce the same normalized outputs so the fallback is invisible to
//! callers.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use crate::core::retry::RetryError;
use crate::core::secrets::{keys, CredentialBundle};

use super::http::{self, check_status, classify_transport};

/// Validated telephony credentials for one provider request.
#[derive(Debug, Clone)]
pub struct TelephonyCreds {
    pub account_sid: String,
    pub auth_token: String,
    pub from_number: String,
}

impl TelephonyCreds {
    /// Extract the required fields, preferring an explicit caller-supplied
    /// sender number over the bundle default. Returns `None` when any
    /// required field is absent.
    pub fn from_bundle(bundle: &CredentialBundle, from_override: Option<&str>) -> Option<Self> {
        let account_sid = bundle.get(keys::ACCOUNT_SID)?.to_string();
        let auth_token = bundle.get(keys::AUTH_TOKEN)?.to_string();
        let from_number = from_override
            .map(str::to_string)
            .or_else(|| bundle.get(keys::FROM_NUMBER).map(str::to_string))?;

        Some(Self {
            account_sid,
            auth_token,
            from_number,
        })
    }
}

/// One attempt against a telephony provider; retry scheduling is the
/// caller's responsibility.
#[async_trait]
pub trait TelephonyProvider: Send + Sync {
    /// Human-readable provider name
    fn name(&self) -> &str;

    /// Place a call; returns the provider-assigned SID when available.
    async fn place_call(
        &self,
        creds: &TelephonyCreds,
        to_number: &str,
    ) -> Result<Option<String>, RetryError>;

    /// Send a text message; returns the provider-assigned SID when available.
    async fn send_message(
        &self,
        creds: &TelephonyCreds,
        to_number: &str,
        body: &str,
    ) -> Result<Option<String>, RetryError>;
}

/// Response envelope from the provider's REST API.
#[derive(Debug, Deserialize)]
struct ProviderResource {
    sid: Option<String>,
}

/// Raw protocol-level provider over authenticated HTTPS.
pub struct RestTelephonyProvider {
    api_base: String,
    voice_url: String,
    client: reqwest::Client,
}

impl RestTelephonyProvider {
    pub fn new(api_base: impl Into<String>, voice_url: impl Into<String>) -> Self {
        Self {
            api_base: api_base.into(),
            voice_url: voice_url.into(),
            client: http::client(http::DEFAULT_TIMEOUT),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.client = http::client(timeout);
        self
    }

    fn resource_url(&self, account_sid: &str, resource: &str) -> String {
        format!(
            "{}/Accounts/{}/{}.json",
            self.api_base.trim_end_matches('/'),
            account_sid,
            resource
        )
    }

    async fn post_form(
        &self,
        creds: &TelephonyCreds,
        resource: &str,
        form: &[(&str, &str)],
    ) -> Result<Option<String>, RetryError> {
        let url = self.resource_url(&creds.account_sid, resource);
        debug!(%url, "Posting to telephony provider");

        let response = self
            .client
            .post(&url)
            .basic_auth(&creds.account_sid, Some(&creds.auth_token))
            .form(form)
            .send()
            .await
            .map_err(classify_transport)?;

        let response = check_status(response).await?;

        // An unparsable 2xx body still counts as success, just without a SID
        match response.json::<ProviderResource>().await {
            Ok(resource) => Ok(resource.sid),
            Err(_) => Ok(None),
        }
    }
}

#[async_trait]
impl TelephonyProvider for RestTelephonyProvider {
    fn name(&self) -> &str {
        "rest"
    }

    async fn place_call(
        &self,
        creds: &TelephonyCreds,
        to_number: &str,
    ) -> Result<Option<String>, RetryError> {
        self.post_form(
            creds,
            "Calls",
            &[
                ("To", to_number),
                ("From", creds.from_number.as_str()),
                ("Url", self.voice_url.as_str()),
            ],
        )
        .await
    }

    async fn send_message(
        &self,
        creds: &TelephonyCreds,
        to_number: &str,
        body: &str,
    ) -> Result<Option<String>, RetryError> {
        self.post_form(
            creds,
            "Messages",
            &[
                ("To", to_number),
                ("From", creds.from_number.as_str()),
                ("Body", body),
            ],
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn bundle(entries: &[(&str, &str)]) -> CredentialBundle {
        CredentialBundle::from_entries(
            entries
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect::<HashMap<_, _>>(),
        )
    }

    #[test]
    fn test_creds_require_all_fields() {
        let partial = bundle(&[(keys::ACCOUNT_SID, "AC1")]);
        assert!(TelephonyCreds::from_bundle(&partial, None).is_none());

        let full = bundle(&[
            (keys::ACCOUNT_SID, "AC1"),
            (keys::AUTH_TOKEN, "tok"),
            (keys::FROM_NUMBER, "+15550001111"),
        ]);
        let creds = TelephonyCreds::from_bundle(&full, None).unwrap();
        assert_eq!(creds.from_number, "+15550001111");
    }

    #[test]
    fn test_from_override_beats_bundle_default() {
        let full = bundle(&[
            (keys::ACCOUNT_SID, "AC1"),
            (keys::AUTH_TOKEN, "tok"),
            (keys::FROM_NUMBER, "+15550001111"),
        ]);
        let creds = TelephonyCreds::from_bundle(&full, Some("+15550002222")).unwrap();
        assert_eq!(creds.from_number, "+15550002222");
    }

    #[test]
    fn test_override_satisfies_missing_bundle_sender() {
        let no_sender = bundle(&[(keys::ACCOUNT_SID, "AC1"), (keys::AUTH_TOKEN, "tok")]);
        assert!(TelephonyCreds::from_bundle(&no_sender, None).is_none());
        assert!(TelephonyCreds::from_bundle(&no_sender, Some("+15550002222")).is_some());
    }

    #[test]
    fn test_resource_url() {
        let provider = RestTelephonyProvider::new(
            "https://api.telephony.example/2010-04-01",
            "https://example.com/voice",
        );
        assert_eq!(
            provider.resource_url("AC1", "Calls"),
            "https://api.telephony.example/2010-04-01/Accounts/AC1/Calls.json"
        );
    }
}
