//! Normalized result of a gated adapter call.

use serde::{Deserialize, Serialize};

/// Outcome of a single external-effecting operation.
///
/// Invariants:
/// - `dry_run == true` implies `success == true` and `error == None`
///   (a dry run never fails)
/// - `success == false` implies `error` is set
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionResult {
    /// Whether the operation (or simulated operation) succeeded
    pub success: bool,

    /// Provider-assigned identifier (call/message SID, storage URI)
    pub sid: Option<String>,

    /// Error message when `success` is false
    pub error: Option<String>,

    /// Whether this was a dry run (no live effect occurred)
    pub dry_run: bool,
}

impl ActionResult {
    /// Synthetic result for a dry run: always succeeds, touches nothing.
    pub fn dry() -> Self {
        Self {
            success: true,
            sid: None,
            error: None,
            dry_run: true,
        }
    }

    /// Successful live result with an optional provider identifier.
    pub fn ok(sid: Option<String>) -> Self {
        Self {
            success: true,
            sid,
            error: None,
            dry_run: false,
        }
    }

    /// Failed live result carrying an error message.
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            sid: None,
            error: Some(error.into()),
            dry_run: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dry_run_invariant() {
        let res = ActionResult::dry();
        assert!(res.success);
        assert!(res.error.is_none());
        assert!(res.dry_run);
    }

    #[test]
    fn test_failed_has_error() {
        let res = ActionResult::failed("boom");
        assert!(!res.success);
        assert_eq!(res.error.as_deref(), Some("boom"));
        assert!(!res.dry_run);
    }

    #[test]
    fn test_serialization_shape() {
        let res = ActionResult::ok(Some("CA123".to_string()));
        let json = serde_json::to_value(&res).unwrap();
        assert_eq!(json["success"], true);
        assert_eq!(json["sid"], "CA123");
        assert_eq!(json["dry_run"], false);
    }
}
