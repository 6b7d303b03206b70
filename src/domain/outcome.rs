//! Per-stage result shapes and the aggregated pipeline outcome.
//!
//! Every invoked stage has an entry in [`PipelineOutcome`], even when the
//! stage failed. The `audit` entry is present only for live runs.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use super::action::ActionResult;

/// Outcome of the ingestion stage: the gated write plus the optional
/// secondary row insertion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestResult {
    #[serde(flatten)]
    pub action: ActionResult,

    /// Result of the secondary row insert, when enabled and attempted
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secondary: Option<SecondaryInsert>,
}

impl IngestResult {
    pub fn new(action: ActionResult) -> Self {
        Self {
            action,
            secondary: None,
        }
    }
}

/// Result of an optional secondary row insertion (analytics table).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecondaryInsert {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Outcome of the scoring stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoreOutcome {
    pub success: bool,
    pub scored_count: usize,
    pub dry_run: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Per-record scores with explanations (empty on dry run)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub scores: Vec<Value>,
}

impl ScoreOutcome {
    /// Stub outcome for dry runs: reports what would be scored.
    pub fn dry(count: usize) -> Self {
        Self {
            success: true,
            scored_count: count,
            dry_run: true,
            error: None,
            scores: Vec::new(),
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            scored_count: 0,
            dry_run: false,
            error: Some(error.into()),
            scores: Vec::new(),
        }
    }
}

/// Outcome of the summarization stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SummarizeResult {
    #[serde(flatten)]
    pub action: ActionResult,

    /// Summary text returned by the service (placeholder on dry run)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response: Option<String>,
}

/// Outcome of persisting the encrypted audit record.
///
/// Failures are reported here, never raised to the caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditOutcome {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl AuditOutcome {
    pub fn ok(path: String) -> Self {
        Self {
            success: true,
            path: Some(path),
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            path: None,
            error: Some(error.into()),
        }
    }
}

/// Aggregated results of one pipeline pass.
///
/// Callers always receive a complete outcome; a stage that failed is
/// recorded as a failed entry rather than aborting the run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineOutcome {
    pub run_id: Uuid,
    pub dry_run: bool,
    pub ingest: IngestResult,
    pub scoring: ScoreOutcome,
    pub call: ActionResult,
    pub sms: ActionResult,
    pub summarize: SummarizeResult,
    /// Present only for live runs; dry runs persist nothing
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audit: Option<AuditOutcome>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_audit_absent_when_none() {
        let outcome = PipelineOutcome {
            run_id: Uuid::new_v4(),
            dry_run: true,
            ingest: IngestResult::new(ActionResult::dry()),
            scoring: ScoreOutcome::dry(2),
            call: ActionResult::dry(),
            sms: ActionResult::dry(),
            summarize: SummarizeResult {
                action: ActionResult::dry(),
                response: None,
            },
            audit: None,
        };

        let json = serde_json::to_value(&outcome).unwrap();
        assert!(json.get("audit").is_none());
        assert_eq!(json["call"]["dry_run"], true);
    }

    #[test]
    fn test_ingest_result_flattens_action() {
        let res = IngestResult::new(ActionResult::ok(Some("gs://b/o".to_string())));
        let json = serde_json::to_value(&res).unwrap();
        assert_eq!(json["success"], true);
        assert_eq!(json["sid"], "gs://b/o");
    }
}
