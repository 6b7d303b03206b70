//! outreach CLI entrypoint

use anyhow::Result;
use clap::Parser;

use outreach::cli::Cli;
use outreach::config;
use outreach::telemetry;

#[tokio::main]
async fn main() -> Result<()> {
    let otlp_endpoint = config::config()
        .ok()
        .and_then(|c| c.otlp_endpoint.clone());
    telemetry::init("outreach-pipeline", otlp_endpoint.as_deref());

    // Parse and execute CLI
    let cli = Cli::parse();
    cli.execute().await
}
