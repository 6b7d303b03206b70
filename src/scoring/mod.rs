//! Lead record scoring.
//!
//! Scoring is a pluggable boundary; the shipped implementation is a
//! deterministic, explainable heuristic used when no model-backed scorer
//! is available.

mod heuristic;

pub use heuristic::HeuristicScorer;

use anyhow::Result;
use serde::Serialize;
use serde_json::Value;

/// Scores a batch of lead records.
pub trait Scorer: Send + Sync {
    fn score_records(&self, records: &[Value]) -> Result<Vec<ScoredRecord>>;
}

/// Score for one record, with an explanation of how it was derived.
#[derive(Debug, Clone, Serialize)]
pub struct ScoredRecord {
    /// Normalized score in 0..=1
    pub score: f64,
    pub explanation: String,
}
