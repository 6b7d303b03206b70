//! Tracing initialization.
//!
//! Installs an `EnvFilter`-driven fmt subscriber. An OTLP exporter target
//! may be configured; when absent, span export is disabled and tracing is
//! local-only.

use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize tracing for the process.
///
/// `otlp_endpoint` is recorded for operators; exporter wiring lives behind
/// the observability boundary and its absence is a no-op.
pub fn init(service_name: &str, otlp_endpoint: Option<&str>) {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    match otlp_endpoint {
        Some(endpoint) => info!(service = service_name, %endpoint, "Tracing initialized"),
        None => info!(
            service = service_name,
            "No OTLP endpoint configured; span export disabled"
        ),
    }
}
