//! Authenticated-encryption audit store for live run metadata.
//!
//! Records are encrypted with AES-256-GCM under a key resolved from the
//! credential bundle, falling back to a locally persisted key file. Each
//! record is written once to `runtime_sids/<ts>_<base64url(nonce)>.json.enc`
//! as `nonce || ciphertext` and never read back by this subsystem.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use anyhow::{Context, Result};
use base64::engine::general_purpose::{STANDARD, URL_SAFE};
use base64::Engine as _;
use rand::rngs::OsRng;
use rand::RngCore;
use tracing::{info, warn};

use crate::core::secrets::{keys, SecretCache};
use crate::domain::AuditOutcome;

/// AES-256-GCM key length in bytes.
const KEY_LEN: usize = 32;

/// GCM nonce length in bytes (96 bits).
const NONCE_LEN: usize = 12;

/// Encrypts and persists audit metadata for live runs.
pub struct EncryptedAuditStore {
    secrets: Option<Arc<SecretCache>>,
    record_dir: PathBuf,
    key_path: PathBuf,
}

impl EncryptedAuditStore {
    /// Store writing under the given root: records in `<root>/runtime_sids`,
    /// fallback key in `<root>/local_secrets/sids_key`.
    pub fn new(root: &Path, secrets: Option<Arc<SecretCache>>) -> Self {
        Self {
            secrets,
            record_dir: root.join("runtime_sids"),
            key_path: root.join("local_secrets").join("sids_key"),
        }
    }

    /// Encrypt `metadata` and write it to durable storage.
    ///
    /// Any cryptographic or I/O failure is caught and reported in the
    /// outcome, never raised to the caller.
    pub async fn persist(&self, metadata: &serde_json::Value) -> AuditOutcome {
        match self.persist_inner(metadata).await {
            Ok(path) => {
                info!(path = %path, "Audit record persisted");
                AuditOutcome::ok(path)
            }
            Err(err) => {
                warn!(error = %err, "Failed to persist audit record");
                AuditOutcome::failed(err.to_string())
            }
        }
    }

    async fn persist_inner(&self, metadata: &serde_json::Value) -> Result<String> {
        let key = self.resolve_key().await?;
        let cipher = Aes256Gcm::new_from_slice(&key)
            .map_err(|_| anyhow::anyhow!("audit key has invalid length"))?;

        // Fresh random nonce per record; reuse under the same key would
        // break GCM, so the nonce always comes from the CSPRNG.
        let mut nonce_bytes = [0u8; NONCE_LEN];
        OsRng.fill_bytes(&mut nonce_bytes);

        let plaintext = serde_json::to_vec(metadata).context("Failed to serialize audit metadata")?;
        let ciphertext = cipher
            .encrypt(Nonce::from_slice(&nonce_bytes), plaintext.as_slice())
            .map_err(|e| anyhow::anyhow!("encryption failed: {}", e))?;

        tokio::fs::create_dir_all(&self.record_dir)
            .await
            .with_context(|| format!("Failed to create {}", self.record_dir.display()))?;

        let ts = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .context("System clock is before the epoch")?
            .as_secs();
        let filename = format!("{}_{}.json.enc", ts, URL_SAFE.encode(nonce_bytes));
        let path = self.record_dir.join(filename);

        let mut contents = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        contents.extend_from_slice(&nonce_bytes);
        contents.extend_from_slice(&ciphertext);

        tokio::fs::write(&path, contents)
            .await
            .with_context(|| format!("Failed to write {}", path.display()))?;

        Ok(path.display().to_string())
    }

    /// Resolve the encryption key: credential bundle first, then the local
    /// key file (generated on first use).
    async fn resolve_key(&self) -> Result<Vec<u8>> {
        if let Some(cache) = &self.secrets {
            match cache.credentials().await {
                Ok(bundle) => {
                    if let Some(encoded) = bundle.get(keys::AUDIT_KEY) {
                        match STANDARD.decode(encoded) {
                            Ok(key) if key.len() == KEY_LEN => return Ok(key),
                            Ok(key) => warn!(
                                len = key.len(),
                                "Bundle audit key has wrong length, using local key"
                            ),
                            Err(err) => warn!(
                                error = %err,
                                "Bundle audit key is not valid base64, using local key"
                            ),
                        }
                    }
                }
                Err(err) => {
                    warn!(error = %err, "Credential fetch failed, using local key");
                }
            }
        }

        self.ensure_local_key().await
    }

    /// Read the local key file, generating it with restricted permissions
    /// if it does not exist yet.
    async fn ensure_local_key(&self) -> Result<Vec<u8>> {
        if self.key_path.exists() {
            let key = tokio::fs::read(&self.key_path)
                .await
                .with_context(|| format!("Failed to read {}", self.key_path.display()))?;
            anyhow::ensure!(
                key.len() == KEY_LEN,
                "local key file {} has invalid length {}",
                self.key_path.display(),
                key.len()
            );
            return Ok(key);
        }

        if let Some(parent) = self.key_path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }

        let mut key = vec![0u8; KEY_LEN];
        OsRng.fill_bytes(&mut key);

        tokio::fs::write(&self.key_path, &key)
            .await
            .with_context(|| format!("Failed to write {}", self.key_path.display()))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let perms = std::fs::Permissions::from_mode(0o600);
            tokio::fs::set_permissions(&self.key_path, perms)
                .await
                .with_context(|| format!("Failed to restrict {}", self.key_path.display()))?;
        }

        info!(path = %self.key_path.display(), "Generated local audit key");
        Ok(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_persist_reports_io_failure() {
        // Root is a file, so directory creation must fail
        let temp = TempDir::new().unwrap();
        let blocker = temp.path().join("blocker");
        std::fs::write(&blocker, b"x").unwrap();

        let store = EncryptedAuditStore::new(&blocker, None);
        let outcome = store.persist(&serde_json::json!({"a": 1})).await;

        assert!(!outcome.success);
        assert!(outcome.path.is_none());
        assert!(outcome.error.is_some());
    }

    #[tokio::test]
    async fn test_local_key_reused_across_stores() {
        let temp = TempDir::new().unwrap();

        let first = EncryptedAuditStore::new(temp.path(), None);
        let key_a = first.ensure_local_key().await.unwrap();

        let second = EncryptedAuditStore::new(temp.path(), None);
        let key_b = second.ensure_local_key().await.unwrap();

        assert_eq!(key_a, key_b);
        assert_eq!(key_a.len(), KEY_LEN);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_local_key_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let temp = TempDir::new().unwrap();
        let store = EncryptedAuditStore::new(temp.path(), None);
        store.ensure_local_key().await.unwrap();

        let mode = std::fs::metadata(temp.path().join("local_secrets").join("sids_key"))
            .unwrap()
            .permissions()
            .mode();
        assert_eq!(mode & 0o777, 0o600);
    }
}
