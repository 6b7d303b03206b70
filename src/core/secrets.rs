//! Process-wide credential cache with single-flight population.
//!
//! Credentials are fetched once from a [`SecretProvider`] and shared
//! read-only for the process lifetime. Failures are never cached: the next
//! caller retries the fetch from scratch. The underlying transport (CLI
//! subprocess, SDK, HTTP) is an implementation detail behind the trait.

use std::collections::HashMap;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info};

/// Errors from credential acquisition.
#[derive(Debug, Error)]
pub enum SecretError {
    /// The provider fetch itself failed
    #[error("secret unavailable: {0}")]
    Unavailable(String),

    /// The provider returned a payload that does not parse
    #[error("malformed credential payload: {0}")]
    Malformed(String),
}

/// Opaque secret provider boundary: returns the raw secret bytes or fails.
#[async_trait]
pub trait SecretProvider: Send + Sync {
    async fn fetch(&self, name: &str) -> Result<Vec<u8>, SecretError>;
}

/// Well-known credential keys.
pub mod keys {
    pub const ACCOUNT_SID: &str = "telephony_account_sid";
    pub const AUTH_TOKEN: &str = "telephony_auth_token";
    pub const FROM_NUMBER: &str = "telephony_from_number";
    pub const AUDIT_KEY: &str = "audit_encryption_key";
    pub const STORAGE_TOKEN: &str = "storage_access_token";
}

/// Immutable bundle of named secrets.
///
/// Shared read-only by all adapters and the audit store; invalidated only
/// by process restart.
#[derive(Debug, Clone, Default)]
pub struct CredentialBundle {
    entries: HashMap<String, String>,
}

impl CredentialBundle {
    /// Parse a JSON object of string values into a bundle.
    pub fn from_json(raw: &[u8]) -> Result<Self, SecretError> {
        let entries: HashMap<String, String> =
            serde_json::from_slice(raw).map_err(|e| SecretError::Malformed(e.to_string()))?;
        Ok(Self { entries })
    }

    #[cfg(test)]
    pub fn from_entries(entries: HashMap<String, String>) -> Self {
        Self { entries }
    }

    /// Look up a secret, also accepting the upper-cased alias.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .get(key)
            .or_else(|| self.entries.get(&key.to_uppercase()))
            .map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Lazily-populated, process-wide credential cache.
///
/// The async mutex is held across the provider fetch, so concurrent first
/// callers trigger at most one in-flight fetch and all observe the same
/// resulting bundle.
pub struct SecretCache {
    provider: Arc<dyn SecretProvider>,
    secret_name: String,
    cached: Mutex<Option<Arc<CredentialBundle>>>,
}

impl SecretCache {
    pub fn new(provider: Arc<dyn SecretProvider>, secret_name: impl Into<String>) -> Self {
        Self {
            provider,
            secret_name: secret_name.into(),
            cached: Mutex::new(None),
        }
    }

    /// Get the credential bundle, fetching it on first access.
    pub async fn credentials(&self) -> Result<Arc<CredentialBundle>, SecretError> {
        let mut slot = self.cached.lock().await;

        if let Some(bundle) = slot.as_ref() {
            return Ok(Arc::clone(bundle));
        }

        debug!(secret = %self.secret_name, "Fetching credential bundle");
        let raw = self.provider.fetch(&self.secret_name).await?;
        let bundle = Arc::new(CredentialBundle::from_json(&raw)?);

        info!(secret = %self.secret_name, "Credential bundle cached");
        *slot = Some(Arc::clone(&bundle));
        Ok(bundle)
    }
}

/// Secret provider that shells out to a cloud CLI.
///
/// Runs `gcloud secrets versions access latest --secret=<name>` and
/// base64-decodes the payload. The binary is configurable for testing.
pub struct CommandSecretProvider {
    binary_path: String,
    project: String,
    timeout: Duration,
}

impl CommandSecretProvider {
    pub fn new(project: impl Into<String>) -> Self {
        Self {
            binary_path: "gcloud".to_string(),
            project: project.into(),
            timeout: Duration::from_secs(30),
        }
    }

    pub fn with_binary_path(mut self, binary_path: impl Into<String>) -> Self {
        self.binary_path = binary_path.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[async_trait]
impl SecretProvider for CommandSecretProvider {
    async fn fetch(&self, name: &str) -> Result<Vec<u8>, SecretError> {
        let command = tokio::process::Command::new(&self.binary_path)
            .args([
                "secrets",
                "versions",
                "access",
                "latest",
                &format!("--secret={}", name),
                &format!("--project={}", self.project),
                "--format=get(payload.data)",
            ])
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output();

        // Bounded like every other external call; timing out also reaps
        // the child instead of leaving it running
        let output = tokio::time::timeout(self.timeout, command)
            .await
            .map_err(|_| {
                SecretError::Unavailable(format!(
                    "{} timed out after {}s",
                    self.binary_path,
                    self.timeout.as_secs()
                ))
            })?
            .map_err(|e| SecretError::Unavailable(format!("failed to run {}: {}", self.binary_path, e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(SecretError::Unavailable(format!(
                "secret access failed: {}",
                stderr.trim()
            )));
        }

        let payload_b64 = String::from_utf8_lossy(&output.stdout).trim().to_string();
        STANDARD
            .decode(payload_b64)
            .map_err(|e| SecretError::Malformed(format!("payload is not base64: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bundle_parsing_and_aliases() {
        let raw = br#"{"telephony_account_sid": "AC1", "TELEPHONY_AUTH_TOKEN": "tok"}"#;
        let bundle = CredentialBundle::from_json(raw).unwrap();

        assert_eq!(bundle.get(keys::ACCOUNT_SID), Some("AC1"));
        // Upper-case alias is honored
        assert_eq!(bundle.get(keys::AUTH_TOKEN), Some("tok"));
        assert_eq!(bundle.get(keys::FROM_NUMBER), None);
    }

    #[test]
    fn test_malformed_payload() {
        let result = CredentialBundle::from_json(b"not json");
        assert!(matches!(result, Err(SecretError::Malformed(_))));
    }

    #[test]
    fn test_empty_bundle() {
        let bundle = CredentialBundle::from_json(b"{}").unwrap();
        assert!(bundle.is_empty());
    }
}
