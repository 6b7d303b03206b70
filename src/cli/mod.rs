//! Command-line interface for outreach.
//!
//! Dry-run is the default everywhere; live side effects require an
//! explicit `--live` flag.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde_json::Value;
use tracing::warn;

use crate::adapters::{
    CallAdapter, IngestAdapter, ObjectStoreSink, RestTelephonyProvider, RowInserter, SmsAdapter,
    SummarizeAdapter, TelephonyProvider,
};
use crate::config::{config, ResolvedConfig};
use crate::core::retry::cancel_pair;
use crate::core::{CommandSecretProvider, EncryptedAuditStore, PipelineRunner, RunRequest, SecretCache};
use crate::scoring::HeuristicScorer;

/// outreach - safety-gated outbound action pipeline
#[derive(Parser, Debug)]
#[command(name = "outreach")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run one pipeline pass (dry-run unless --live is given)
    Run {
        /// Number to call and text
        #[arg(long)]
        to: String,

        /// Sender number (defaults to the credential bundle's sender)
        #[arg(long)]
        from: Option<String>,

        /// JSON file with lead records (uses a built-in sample if omitted)
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// Authorize real side effects
        #[arg(long)]
        live: bool,
    },

    /// Show resolved configuration (debug)
    Config,
}

impl Cli {
    pub async fn execute(self) -> Result<()> {
        match self.command {
            Commands::Run {
                to,
                from,
                input,
                live,
            } => run_pipeline(to, from, input, live).await,
            Commands::Config => show_config(),
        }
    }
}

fn load_records(input: Option<&PathBuf>) -> Result<Vec<Value>> {
    match input {
        Some(path) => {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read records file: {}", path.display()))?;
            serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse records file: {}", path.display()))
        }
        None => Ok(vec![serde_json::json!({
            "id": 1,
            "address": "123 Main St",
            "description": "vacant foreclosure auction"
        })]),
    }
}

/// Wire the runner from resolved configuration.
fn build_runner(cfg: &ResolvedConfig) -> PipelineRunner {
    let timeout = cfg.request_timeout;

    let secrets = Arc::new(SecretCache::new(
        Arc::new(CommandSecretProvider::new(cfg.secret_project.clone()).with_timeout(timeout)),
        cfg.secret_name.clone(),
    ));

    let providers: Vec<Arc<dyn TelephonyProvider>> = vec![Arc::new(
        RestTelephonyProvider::new(
            cfg.telephony_api_base.clone(),
            cfg.telephony_voice_url.clone(),
        )
        .with_timeout(timeout),
    )];

    let mut ingest = IngestAdapter::new(
        vec![Arc::new(
            ObjectStoreSink::new(cfg.ingest_endpoint.clone()).with_timeout(timeout),
        )],
        Arc::clone(&secrets),
        cfg.local_ingest_dir(),
    )
    .with_max_attempts(cfg.ingest_max_attempts);

    if cfg.analytics_insert {
        match (
            &cfg.analytics_project,
            &cfg.analytics_dataset,
            &cfg.analytics_table,
        ) {
            (Some(project), Some(dataset), Some(table)) => {
                ingest = ingest.with_row_sink(Arc::new(
                    RowInserter::new(
                        cfg.analytics_endpoint.clone(),
                        project.clone(),
                        dataset.clone(),
                        table.clone(),
                    )
                    .with_timeout(timeout),
                ));
            }
            _ => warn!("Analytics insert enabled but project/dataset/table incomplete, skipping"),
        }
    }

    PipelineRunner::new(
        ingest,
        Box::new(HeuristicScorer),
        CallAdapter::new(providers.clone(), Arc::clone(&secrets)),
        SmsAdapter::new(providers, Arc::clone(&secrets)),
        SummarizeAdapter::new(cfg.summarizer_endpoint.clone(), cfg.summarizer_agent.clone())
            .with_timeout(timeout),
        EncryptedAuditStore::new(&cfg.home, Some(secrets)),
    )
}

async fn run_pipeline(
    to: String,
    from: Option<String>,
    input: Option<PathBuf>,
    live: bool,
) -> Result<()> {
    let cfg = config()?;
    let records = load_records(input.as_ref())?;

    let mut request = RunRequest::new(
        records,
        to,
        cfg.ingest_bucket.clone(),
        cfg.ingest_object.clone(),
    );
    if let Some(from) = from {
        request = request.with_from_number(from);
    }
    if live {
        request = request.live();
    }

    let runner = build_runner(cfg);

    // Ctrl-C interrupts backoff sleeps instead of killing mid-write
    let (handle, token) = cancel_pair();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, cancelling in-flight retries");
            handle.cancel();
        }
    });

    let outcome = runner.run(&request, &token).await;

    println!("{}", serde_json::to_string_pretty(&outcome)?);
    Ok(())
}

fn show_config() -> Result<()> {
    let cfg = config()?;

    println!("home:                {}", cfg.home.display());
    println!("telephony api base:  {}", cfg.telephony_api_base);
    println!("ingest endpoint:     {}", cfg.ingest_endpoint);
    println!("ingest bucket:       {}", cfg.ingest_bucket);
    println!("ingest max attempts: {}", cfg.ingest_max_attempts);
    println!("request timeout:     {}s", cfg.request_timeout.as_secs());
    println!("secret name:         {}", cfg.secret_name);
    println!("secret project:      {}", cfg.secret_project);
    println!("summarizer endpoint: {}", cfg.summarizer_endpoint);
    println!("analytics insert:    {}", cfg.analytics_insert);
    println!(
        "otlp endpoint:       {}",
        cfg.otlp_endpoint.as_deref().unwrap_or("<none>")
    );
    match &cfg.config_file {
        Some(path) => println!("config file:         {}", path.display()),
        None => println!("config file:         <none>"),
    }

    Ok(())
}
