//! One pipeline pass: ingest → score → notify (call, sms) → summarize → audit.
//!
//! Every stage runs inside its own failure boundary and execution always
//! proceeds to the next stage. The audit stage runs only for live passes;
//! a dry run has nothing sensitive to persist.

use serde_json::Value;
use tracing::{info, info_span, instrument, Instrument};
use uuid::Uuid;

use crate::adapters::{CallAdapter, IngestAdapter, SmsAdapter, SummarizeAdapter};
use crate::core::audit::EncryptedAuditStore;
use crate::core::retry::CancelToken;
use crate::domain::{PipelineOutcome, ScoreOutcome, SummarizeResult};
use crate::scoring::Scorer;

/// Default message body for the notification SMS.
const NOTIFY_BODY: &str = "We found a property of interest. We will follow up by email.";

/// Default prompt for the summarization stage.
const SUMMARY_PROMPT: &str = "Summarize leads and next actions";

/// Parameters for one pipeline pass.
#[derive(Debug, Clone)]
pub struct RunRequest {
    /// Lead records to ingest and score
    pub records: Vec<Value>,
    /// Number to call and text
    pub to_number: String,
    /// Sender override; the credential bundle default applies when absent
    pub from_number: Option<String>,
    /// Whether this pass is allowed to touch live systems
    pub dry_run: bool,
    /// Ingestion destination
    pub bucket: String,
    pub object: String,
}

impl RunRequest {
    /// The ingestion destination is required; defaults belong to the
    /// configuration layer, not to request construction.
    pub fn new(
        records: Vec<Value>,
        to_number: impl Into<String>,
        bucket: impl Into<String>,
        object: impl Into<String>,
    ) -> Self {
        Self {
            records,
            to_number: to_number.into(),
            from_number: None,
            dry_run: true,
            bucket: bucket.into(),
            object: object.into(),
        }
    }

    pub fn live(mut self) -> Self {
        self.dry_run = false;
        self
    }

    pub fn with_from_number(mut self, from_number: impl Into<String>) -> Self {
        self.from_number = Some(from_number.into());
        self
    }
}

/// Orchestrates the stages of one pass and aggregates their results.
pub struct PipelineRunner {
    ingest: IngestAdapter,
    scorer: Box<dyn Scorer>,
    call: CallAdapter,
    sms: SmsAdapter,
    summarize: SummarizeAdapter,
    audit: EncryptedAuditStore,
}

impl PipelineRunner {
    pub fn new(
        ingest: IngestAdapter,
        scorer: Box<dyn Scorer>,
        call: CallAdapter,
        sms: SmsAdapter,
        summarize: SummarizeAdapter,
        audit: EncryptedAuditStore,
    ) -> Self {
        Self {
            ingest,
            scorer,
            call,
            sms,
            summarize,
            audit,
        }
    }

    /// Execute one pass. Always returns a complete outcome: stage failures
    /// are recorded, never propagated.
    #[instrument(skip(self, request, cancel), fields(dry_run = request.dry_run))]
    pub async fn run(&self, request: &RunRequest, cancel: &CancelToken) -> PipelineOutcome {
        let run_id = Uuid::new_v4();
        info!(%run_id, dry_run = request.dry_run, "Starting pipeline pass");

        let ingest = self
            .ingest
            .perform(
                &request.records,
                &request.bucket,
                &request.object,
                request.dry_run,
                cancel,
            )
            .instrument(info_span!("ingest"))
            .await;

        let scoring = self.run_scoring(request);

        let from = request.from_number.as_deref();
        let call = self
            .call
            .perform(&request.to_number, from, request.dry_run, cancel)
            .instrument(info_span!("call"))
            .await;
        let sms = self
            .sms
            .perform(&request.to_number, NOTIFY_BODY, from, request.dry_run, cancel)
            .instrument(info_span!("sms"))
            .await;

        let summarize: SummarizeResult = self
            .summarize
            .perform(SUMMARY_PROMPT, request.dry_run, cancel)
            .instrument(info_span!("summarize"))
            .await;

        let mut outcome = PipelineOutcome {
            run_id,
            dry_run: request.dry_run,
            ingest,
            scoring,
            call,
            sms,
            summarize,
            audit: None,
        };

        if !request.dry_run {
            let metadata = serde_json::json!({
                "run_id": outcome.run_id,
                "timestamp": chrono::Utc::now().to_rfc3339(),
                "call": outcome.call,
                "sms": outcome.sms,
                "ingest": outcome.ingest,
                "scoring": outcome.scoring,
                "summarize": outcome.summarize,
            });
            outcome.audit = Some(
                self.audit
                    .persist(&metadata)
                    .instrument(info_span!("audit"))
                    .await,
            );
        }

        info!(%run_id, "Pipeline pass finished");
        outcome
    }

    /// Scoring is local and side-effect free, but dry runs still report a
    /// stub instead of invoking the scorer, and scorer errors become a
    /// failed stage entry.
    fn run_scoring(&self, request: &RunRequest) -> ScoreOutcome {
        if request.dry_run {
            return ScoreOutcome::dry(request.records.len());
        }

        match self.scorer.score_records(&request.records) {
            Ok(scored) => ScoreOutcome {
                success: true,
                scored_count: scored.len(),
                dry_run: false,
                error: None,
                scores: scored
                    .into_iter()
                    .map(|s| serde_json::to_value(s).unwrap_or(Value::Null))
                    .collect(),
            },
            Err(err) => ScoreOutcome::failed(err.to_string()),
        }
    }
}
