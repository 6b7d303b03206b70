//! outreach - safety-gated outbound action pipeline
//!
//! Automates real-world-effect actions (calls, SMS, ingestion writes,
//! summarization requests) on behalf of an autonomous pipeline, with two
//! guarantees:
//! - No real side effect occurs unless explicitly authorized (`--live`)
//! - Every authorized run leaves an encrypted, tamper-resistant audit record
//!
//! # Architecture
//!
//! - `core::gate`: every effectful call goes through one dry-run/live gate
//! - `core::retry`: exponential backoff with cancellation, transient-only
//! - `core::secrets`: single-flight process-wide credential cache
//! - `core::audit`: AES-256-GCM encrypted run records
//! - `adapters`: call, SMS, ingestion and summarization effects
//! - `core::runner`: stage orchestration with per-stage failure boundaries
//!
//! # Usage
//!
//! ```bash
//! # Dry run (default): reports what would happen, touches nothing
//! outreach run --to +15550000000
//!
//! # Live run: places the call, sends the SMS, writes the audit record
//! outreach run --to +15550000000 --live
//! ```

pub mod adapters;
pub mod cli;
pub mod config;
pub mod core;
pub mod domain;
pub mod scoring;
pub mod telemetry;

// Re-export main types at crate root for convenience
pub use crate::core::{PipelineRunner, RunRequest, SafetyGate};
pub use crate::domain::{ActionResult, PipelineOutcome};
