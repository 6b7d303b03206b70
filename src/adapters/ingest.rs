//! Safety-gated ingestion-record writes with local fallback.
//!
//! Records go to the primary object-store sink with retries; when every
//! attempt fails the adapter degrades to a local filesystem write and
//! still reports success with a `file://` URI. An optional secondary row
//! insertion into an analytics table can be enabled by configuration.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{info, warn};

use crate::core::gate::SafetyGate;
use crate::core::retry::{CancelToken, RetryError, RetryPolicy, RetryingClient};
use crate::core::secrets::{keys, SecretCache};
use crate::domain::{ActionResult, IngestResult, SecondaryInsert};

use super::http::{self, check_status, classify_transport};

/// Destination for ingestion records; one attempt per call.
#[async_trait]
pub trait IngestSink: Send + Sync {
    fn name(&self) -> &str;

    /// Write `data` to `<bucket>/<object>`; returns the stored URI.
    async fn write(
        &self,
        bucket: &str,
        object: &str,
        data: &[u8],
        token: Option<&str>,
    ) -> Result<String, RetryError>;
}

/// Object-store sink over the storage provider's upload REST API.
pub struct ObjectStoreSink {
    endpoint: String,
    client: reqwest::Client,
}

impl ObjectStoreSink {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            client: http::client(http::DEFAULT_TIMEOUT),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.client = http::client(timeout);
        self
    }
}

#[async_trait]
impl IngestSink for ObjectStoreSink {
    fn name(&self) -> &str {
        "object-store"
    }

    async fn write(
        &self,
        bucket: &str,
        object: &str,
        data: &[u8],
        token: Option<&str>,
    ) -> Result<String, RetryError> {
        let url = format!(
            "{}/b/{}/o?uploadType=media&name={}",
            self.endpoint.trim_end_matches('/'),
            bucket,
            object
        );

        let mut request = self
            .client
            .post(&url)
            .header("Content-Type", "application/json")
            .body(data.to_vec());
        if let Some(token) = token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await.map_err(classify_transport)?;
        check_status(response).await?;

        Ok(format!("gs://{}/{}", bucket, object))
    }
}

/// Secondary destination for per-record rows; one attempt per call.
#[async_trait]
pub trait RowSink: Send + Sync {
    fn name(&self) -> &str;

    /// Insert `rows`. Row-level rejections must be reported as permanent.
    async fn insert(&self, rows: &[Value], token: Option<&str>) -> Result<(), RetryError>;
}

/// Row sink streaming into an analytics table over its insertAll REST API.
pub struct RowInserter {
    endpoint: String,
    project: String,
    dataset: String,
    table: String,
    client: reqwest::Client,
}

impl RowInserter {
    pub fn new(
        endpoint: impl Into<String>,
        project: impl Into<String>,
        dataset: impl Into<String>,
        table: impl Into<String>,
    ) -> Self {
        Self {
            endpoint: endpoint.into(),
            project: project.into(),
            dataset: dataset.into(),
            table: table.into(),
            client: http::client(http::DEFAULT_TIMEOUT),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.client = http::client(timeout);
        self
    }
}

#[async_trait]
impl RowSink for RowInserter {
    fn name(&self) -> &str {
        "analytics"
    }

    async fn insert(&self, rows: &[Value], token: Option<&str>) -> Result<(), RetryError> {
        let url = format!(
            "{}/projects/{}/datasets/{}/tables/{}/insertAll",
            self.endpoint.trim_end_matches('/'),
            self.project,
            self.dataset,
            self.table
        );
        let payload = serde_json::json!({
            "rows": rows.iter().map(|r| serde_json::json!({"json": r})).collect::<Vec<_>>(),
        });

        let mut request = self.client.post(&url).json(&payload);
        if let Some(token) = token {
            request = request.bearer_auth(token);
        }
        let response = request.send().await.map_err(classify_transport)?;
        let response = check_status(response).await?;

        let body: Value = response.json().await.map_err(classify_transport)?;
        if body.get("insertErrors").map_or(false, |e| !e.is_null()) {
            // Row-level rejection; retrying the same rows is futile
            return Err(RetryError::permanent(anyhow::anyhow!(
                "row insert rejected: {}",
                body["insertErrors"]
            )));
        }
        Ok(())
    }
}

/// Writes ingestion records, degrading to the local filesystem.
pub struct IngestAdapter {
    sinks: Vec<Arc<dyn IngestSink>>,
    secrets: Arc<SecretCache>,
    fallback_dir: PathBuf,
    inserter: Option<Arc<dyn RowSink>>,
    retry: RetryPolicy,
    insert_retry: RetryPolicy,
}

impl IngestAdapter {
    pub fn new(
        sinks: Vec<Arc<dyn IngestSink>>,
        secrets: Arc<SecretCache>,
        fallback_dir: PathBuf,
    ) -> Self {
        Self {
            sinks,
            secrets,
            fallback_dir,
            inserter: None,
            retry: RetryPolicy::default(),
            // Insertion target tolerates more attempts than telephony
            insert_retry: RetryPolicy::new(5, 1000, 16000),
        }
    }

    pub fn with_row_sink(mut self, sink: Arc<dyn RowSink>) -> Self {
        self.inserter = Some(sink);
        self
    }

    pub fn with_insert_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.insert_retry = retry;
        self
    }

    /// Ingestion destinations tolerate 3 to 5 attempts depending on
    /// configuration; values outside that range are clamped.
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.retry.max_attempts = max_attempts.clamp(3, 5);
        self
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Write `records` as JSON to `<bucket>/<object>`, gated by `dry_run`.
    pub async fn perform(
        &self,
        records: &[Value],
        bucket: &str,
        object: &str,
        dry_run: bool,
        cancel: &CancelToken,
    ) -> IngestResult {
        let description = format!(
            "write {} records to gs://{}/{}",
            records.len(),
            bucket,
            object
        );

        let action = SafetyGate::run("ingest", &description, dry_run, || async move {
            let data = serde_json::to_vec(records)?;

            // Storage token is optional; the sink may rely on ambient auth
            let token = match self.secrets.credentials().await {
                Ok(bundle) => bundle.get(keys::STORAGE_TOKEN).map(str::to_string),
                Err(err) => {
                    warn!(error = %err, "Credential fetch failed, writing unauthenticated");
                    None
                }
            };

            let client = RetryingClient;
            let mut last_error: Option<RetryError> = None;

            for sink in &self.sinks {
                match client
                    .execute(&self.retry, cancel, |_| {
                        sink.write(bucket, object, &data, token.as_deref())
                    })
                    .await
                {
                    Ok(uri) => {
                        info!(sink = sink.name(), %uri, "Records ingested");
                        return Ok(ActionResult::ok(Some(uri)));
                    }
                    Err(err) => {
                        warn!(
                            sink = sink.name(),
                            error = %err,
                            "Sink failed after retries, trying next"
                        );
                        last_error = Some(err);
                    }
                }
            }

            // Silent degradation: local write still counts as success, but
            // a failed fallback reports the sink's last error
            match self.write_local(bucket, object, &data).await {
                Ok(path) => Ok(ActionResult::ok(Some(format!("file://{}", path)))),
                Err(fallback_err) => {
                    warn!(error = %fallback_err, "Local fallback write failed");
                    let message = last_error
                        .map(|e| e.to_string())
                        .unwrap_or_else(|| fallback_err.to_string());
                    Ok(ActionResult::failed(message))
                }
            }
        })
        .await;

        let mut result = IngestResult::new(action);

        // The secondary insert is attempted only after a successful live
        // write; dry runs and failed primaries skip it entirely
        if !dry_run && result.action.success {
            if let Some(sink) = &self.inserter {
                let token = match self.secrets.credentials().await {
                    Ok(bundle) => bundle.get(keys::STORAGE_TOKEN).map(str::to_string),
                    Err(_) => None,
                };

                let insert = RetryingClient
                    .execute(&self.insert_retry, cancel, |_| {
                        sink.insert(records, token.as_deref())
                    })
                    .await;

                result.secondary = Some(match insert {
                    Ok(()) => SecondaryInsert {
                        success: true,
                        error: None,
                    },
                    Err(err) => {
                        warn!(sink = sink.name(), error = %err, "Secondary row insert failed");
                        SecondaryInsert {
                            success: false,
                            error: Some(err.to_string()),
                        }
                    }
                });
            }
        }

        result
    }

    async fn write_local(&self, bucket: &str, object: &str, data: &[u8]) -> anyhow::Result<String> {
        let dir = self.fallback_dir.join(bucket);
        tokio::fs::create_dir_all(&dir).await?;

        let path = dir.join(object.replace('/', "_"));
        tokio::fs::write(&path, data).await?;

        Ok(path.display().to_string())
    }
}
