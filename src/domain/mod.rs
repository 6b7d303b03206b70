//! Domain types for the outreach pipeline.
//!
//! This module contains the result shapes shared across the system:
//! - ActionResult: normalized outcome of every gated adapter call
//! - Stage results and the aggregated PipelineOutcome

pub mod action;
pub mod outcome;

// Re-export commonly used types
pub use action::ActionResult;
pub use outcome::{
    AuditOutcome, IngestResult, PipelineOutcome, ScoreOutcome, SecondaryInsert, SummarizeResult,
};
