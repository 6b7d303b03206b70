//! Core gating, retry, credential, audit and orchestration logic.
//!
//! This module contains:
//! - SafetyGate: uniform dry-run/live gating
//! - RetryingClient: exponential backoff with cancellation
//! - SecretCache: single-flight credential cache
//! - EncryptedAuditStore: AEAD-encrypted run records
//! - PipelineRunner: stage orchestration

pub mod audit;
pub mod gate;
pub mod retry;
pub mod runner;
pub mod secrets;

// Re-export commonly used types
pub use audit::EncryptedAuditStore;
pub use gate::SafetyGate;
pub use retry::{cancel_pair, CancelHandle, CancelToken, RetryError, RetryPolicy, RetryingClient};
pub use runner::{PipelineRunner, RunRequest};
pub use secrets::{
    CommandSecretProvider, CredentialBundle, SecretCache, SecretError, SecretProvider,
};
