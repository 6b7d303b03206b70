//! Configuration for the outreach pipeline.
//!
//! Configuration sources (highest priority first):
//! 1. Environment variables (OUTREACH_HOME, OUTREACH_PROJECT, ...)
//! 2. Config file (.outreach/config.yaml)
//! 3. Defaults (~/.outreach)
//!
//! Config file discovery searches the current directory and its parents
//! for `.outreach/config.yaml`.

use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

/// Global cached configuration (stores Result to handle init errors)
static CONFIG: OnceLock<Result<ResolvedConfig, String>> = OnceLock::new();

/// Raw config file schema (matches YAML structure)
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConfigFile {
    #[serde(default)]
    pub home: Option<String>,
    #[serde(default)]
    pub telephony: Option<TelephonyConfig>,
    #[serde(default)]
    pub ingest: Option<IngestConfig>,
    #[serde(default)]
    pub secrets: Option<SecretsConfig>,
    #[serde(default)]
    pub summarizer: Option<SummarizerConfig>,
    #[serde(default)]
    pub analytics: Option<AnalyticsConfig>,
    #[serde(default)]
    pub otlp_endpoint: Option<String>,
    /// Deadline for a single outbound request or subprocess, in seconds
    #[serde(default)]
    pub request_timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TelephonyConfig {
    pub api_base: Option<String>,
    pub voice_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IngestConfig {
    pub endpoint: Option<String>,
    pub bucket: Option<String>,
    pub object: Option<String>,
    /// Attempts against the primary sink, clamped to 3..=5
    pub max_attempts: Option<u32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SecretsConfig {
    pub secret_name: Option<String>,
    pub project: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SummarizerConfig {
    pub endpoint: Option<String>,
    pub agent: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AnalyticsConfig {
    pub insert: Option<bool>,
    pub endpoint: Option<String>,
    pub project: Option<String>,
    pub dataset: Option<String>,
    pub table: Option<String>,
}

/// Resolved configuration with defaults applied.
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    /// Storage root for runtime_sids/, local_secrets/ and local_ingest/
    pub home: PathBuf,
    pub telephony_api_base: String,
    pub telephony_voice_url: String,
    pub ingest_endpoint: String,
    pub ingest_bucket: String,
    pub ingest_object: String,
    pub ingest_max_attempts: u32,
    pub secret_name: String,
    pub secret_project: String,
    pub summarizer_endpoint: String,
    pub summarizer_agent: String,
    pub analytics_insert: bool,
    pub analytics_endpoint: String,
    pub analytics_project: Option<String>,
    pub analytics_dataset: Option<String>,
    pub analytics_table: Option<String>,
    pub otlp_endpoint: Option<String>,
    /// Deadline for every outbound request and subprocess
    pub request_timeout: Duration,
    /// Path to config file (if found)
    pub config_file: Option<PathBuf>,
}

impl ResolvedConfig {
    pub fn local_ingest_dir(&self) -> PathBuf {
        self.home.join("local_ingest")
    }
}

/// Find config file by searching current directory and parents
fn find_config_file() -> Option<PathBuf> {
    let mut current = std::env::current_dir().ok()?;

    loop {
        let config_path = current.join(".outreach").join("config.yaml");
        if config_path.exists() {
            return Some(config_path);
        }

        if !current.pop() {
            break;
        }
    }

    None
}

/// Load and parse config file
fn load_config_file(path: &Path) -> Result<ConfigFile> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    serde_yaml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

fn env_flag(name: &str) -> Option<bool> {
    env_var(name).map(|v| matches!(v.to_lowercase().as_str(), "1" | "true" | "yes"))
}

/// Load configuration from all sources
fn load_config() -> Result<ResolvedConfig> {
    let default_home = dirs::home_dir()
        .context("Failed to determine home directory")?
        .join(".outreach");

    let config_file = find_config_file();
    let file = match &config_file {
        Some(path) => load_config_file(path)?,
        None => ConfigFile::default(),
    };

    let home = env_var("OUTREACH_HOME")
        .map(PathBuf::from)
        .or_else(|| file.home.as_ref().map(PathBuf::from))
        .unwrap_or(default_home);

    let telephony = file.telephony.as_ref();
    let ingest = file.ingest.as_ref();
    let secrets = file.secrets.as_ref();
    let summarizer = file.summarizer.as_ref();
    let analytics = file.analytics.as_ref();

    Ok(ResolvedConfig {
        home,
        telephony_api_base: telephony
            .and_then(|t| t.api_base.clone())
            .unwrap_or_else(|| "https://api.twilio.com/2010-04-01".to_string()),
        telephony_voice_url: telephony
            .and_then(|t| t.voice_url.clone())
            .unwrap_or_else(|| "https://demo.twilio.com/welcome/voice/".to_string()),
        ingest_endpoint: ingest
            .and_then(|i| i.endpoint.clone())
            .unwrap_or_else(|| "https://storage.googleapis.com/upload/storage/v1".to_string()),
        ingest_bucket: ingest
            .and_then(|i| i.bucket.clone())
            .unwrap_or_else(|| "outreach-telemetry".to_string()),
        ingest_object: ingest
            .and_then(|i| i.object.clone())
            .unwrap_or_else(|| "ingest/sample.json".to_string()),
        ingest_max_attempts: ingest
            .and_then(|i| i.max_attempts)
            .unwrap_or(3)
            .clamp(3, 5),
        secret_name: secrets
            .and_then(|s| s.secret_name.clone())
            .unwrap_or_else(|| "outreach-credentials".to_string()),
        secret_project: env_var("OUTREACH_PROJECT")
            .or_else(|| secrets.and_then(|s| s.project.clone()))
            .unwrap_or_else(|| "outreach-systems".to_string()),
        summarizer_endpoint: summarizer
            .and_then(|s| s.endpoint.clone())
            .unwrap_or_else(|| "http://localhost:8080/commands".to_string()),
        summarizer_agent: summarizer
            .and_then(|s| s.agent.clone())
            .unwrap_or_else(|| "outreach-agent".to_string()),
        analytics_insert: env_flag("OUTREACH_AUDIT_BIGQUERY_INSERT")
            .or_else(|| analytics.and_then(|a| a.insert))
            .unwrap_or(false),
        analytics_endpoint: analytics
            .and_then(|a| a.endpoint.clone())
            .unwrap_or_else(|| "https://bigquery.googleapis.com/bigquery/v2".to_string()),
        analytics_project: env_var("OUTREACH_PROJECT")
            .or_else(|| analytics.and_then(|a| a.project.clone())),
        analytics_dataset: env_var("OUTREACH_DATASET")
            .or_else(|| analytics.and_then(|a| a.dataset.clone())),
        analytics_table: env_var("OUTREACH_TABLE")
            .or_else(|| analytics.and_then(|a| a.table.clone())),
        otlp_endpoint: env_var("OUTREACH_OTLP_ENDPOINT")
            .or_else(|| env_var("OTEL_EXPORTER_OTLP_ENDPOINT"))
            .or(file.otlp_endpoint),
        request_timeout: Duration::from_secs(
            env_var("OUTREACH_REQUEST_TIMEOUT_SECS")
                .and_then(|v| v.parse().ok())
                .or(file.request_timeout_secs)
                .unwrap_or(30)
                .max(1),
        ),
        config_file,
    })
}

/// Get the global configuration (loads once, then cached)
pub fn config() -> Result<&'static ResolvedConfig> {
    let result = CONFIG.get_or_init(|| load_config().map_err(|e| e.to_string()));

    match result {
        Ok(config) => Ok(config),
        Err(e) => anyhow::bail!("{}", e),
    }
}

/// Force reload configuration (useful for testing)
pub fn reload_config() -> Result<ResolvedConfig> {
    load_config()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    #[test]
    fn test_config_file_parsing() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join(".outreach");
        std::fs::create_dir_all(&dir).unwrap();

        let config_path = dir.join("config.yaml");
        let mut file = std::fs::File::create(&config_path).unwrap();
        writeln!(
            file,
            r#"
home: /var/lib/outreach
telephony:
  api_base: https://api.telephony.example/v1
ingest:
  bucket: my-bucket
  max_attempts: 9
analytics:
  insert: true
  project: proj
  dataset: ds
  table: tbl
"#
        )
        .unwrap();

        let parsed = load_config_file(&config_path).unwrap();
        assert_eq!(parsed.home.as_deref(), Some("/var/lib/outreach"));
        assert_eq!(
            parsed.telephony.unwrap().api_base.as_deref(),
            Some("https://api.telephony.example/v1")
        );
        let ingest = parsed.ingest.unwrap();
        assert_eq!(ingest.bucket.as_deref(), Some("my-bucket"));
        assert_eq!(ingest.max_attempts, Some(9));
        assert_eq!(parsed.analytics.unwrap().insert, Some(true));
    }

    #[test]
    fn test_ingest_attempts_clamped() {
        // 9 from a config file must land inside the allowed 3..=5 window
        assert_eq!(9u32.clamp(3, 5), 5);
        assert_eq!(1u32.clamp(3, 5), 3);
    }
}
