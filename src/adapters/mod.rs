//! Safety-gated adapters for external-effecting operations.
//!
//! Each adapter follows the same pattern: delegate to the SafetyGate,
//! obtain credentials from the SecretCache inside the live branch, invoke
//! the provider through the RetryingClient, and normalize the outcome into
//! an ActionResult.

pub mod call;
mod http;
pub mod ingest;
pub mod sms;
pub mod summarize;
pub mod telephony;

// Re-export the adapter types
pub use call::CallAdapter;
pub use ingest::{IngestAdapter, IngestSink, ObjectStoreSink, RowInserter, RowSink};
pub use sms::SmsAdapter;
pub use summarize::SummarizeAdapter;
pub use telephony::{RestTelephonyProvider, TelephonyCreds, TelephonyProvider};
