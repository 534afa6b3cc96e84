//! Error taxonomy for the ledgerwire session layer
//!
//! Two shapes of error live here:
//!
//! - **Error**: the closed set of error kinds any caller of the session layer
//!   can observe (uses thiserror).
//! - **RippledErrorData**: the wire-level error payload the node itself
//!   returns when it answers a request with `"status": "error"`.
//!
//! # Propagation policy
//!
//! Transport- and protocol-level failures surface to the caller of the
//! operation that triggered them; nothing is silently retried per request.
//! Only the connection as a whole is retried (by the reconnect loop), and a
//! request in flight when the transport drops fails fast with
//! [`Error::Disconnected`] so the caller can decide whether to resubmit; that
//! matters for non-idempotent commands like transaction submission.
//!
//! The ledger-history kinds (`LedgerVersion`, `MissingLedgerHistory`,
//! `PendingLedgerVersion`, `NotFound`) are raised by per-command callers that
//! interpret [`crate::RangeSet`] state, not by the connection itself; they are
//! defined here because those callers are direct consumers of this crate.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type used throughout the ledgerwire crates.
pub type Result<T> = std::result::Result<T, Error>;

/// Every error kind the session layer can surface.
#[derive(Debug, Clone, Error)]
pub enum Error {
    /// The connection cannot be attempted at all (unusable endpoint URL,
    /// bad TLS material, proxy refused the tunnel).
    #[error("connection error: {0}")]
    Connection(String),

    /// An operation was attempted with no session present.
    #[error("not connected: {0}")]
    NotConnected(String),

    /// A send or wait failed because the session closed mid-flight.
    #[error("disconnected: {0}")]
    Disconnected(String),

    /// A request's deadline elapsed with no correlated response.
    #[error("request timed out")]
    Timeout,

    /// An inbound frame is structurally invalid: bad or missing id,
    /// unrecognized status, or not a recognizable frame at all.
    #[error("response format error: {message}")]
    ResponseFormat {
        /// What was wrong with the frame.
        message: String,
        /// The offending payload, when it parsed as JSON.
        raw: Option<serde_json::Value>,
    },

    /// The node explicitly answered a request with `"status": "error"`.
    #[error("rippled error: {0}")]
    Rippled(#[from] RippledErrorData),

    /// The transport handshake succeeded but the node reports no validated
    /// ledger, so the session is unusable.
    #[error("rippled not initialized: {0}")]
    NodeNotInitialized(String),

    /// A caller asked for a ledger version outside the node's usable window.
    #[error("ledger version error: {0}")]
    LedgerVersion(String),

    /// The node's validated-ledger ranges have a gap covering the query.
    #[error("missing ledger history: {0}")]
    MissingLedgerHistory(String),

    /// The queried ledger version has not been validated yet.
    #[error("pending ledger version: {0}")]
    PendingLedgerVersion(String),

    /// The node has no record of the requested object.
    #[error("not found: {0}")]
    NotFound(String),

    /// Converting between Rust values and JSON failed.
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl Error {
    /// Short tag used for event reporting and metrics labels.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Connection(_) => "connection",
            Error::NotConnected(_) => "notConnected",
            Error::Disconnected(_) => "disconnected",
            Error::Timeout => "timeout",
            Error::ResponseFormat { .. } => "badMessage",
            Error::Rippled(_) => "rippled",
            Error::NodeNotInitialized(_) => "notInitialized",
            Error::LedgerVersion(_) => "ledgerVersion",
            Error::MissingLedgerHistory(_) => "missingLedgerHistory",
            Error::PendingLedgerVersion(_) => "pendingLedgerVersion",
            Error::NotFound(_) => "notFound",
            Error::Serialization(_) => "serialization",
        }
    }

    /// Build a response-format error without an attached payload.
    pub fn response_format(message: impl Into<String>) -> Self {
        Error::ResponseFormat {
            message: message.into(),
            raw: None,
        }
    }
}

/// Error payload reported by the node in a correlated response.
///
/// rippled reports errors as a short code token (`error`, e.g. `"actNotFound"`)
/// plus an optional human-readable `error_message`. The entire raw response is
/// kept so callers can inspect node-specific fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RippledErrorData {
    /// The node's error code token.
    pub error: String,
    /// Human-readable message, when the node supplies one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    /// The full response frame as received.
    pub raw: serde_json::Value,
}

impl RippledErrorData {
    pub fn new(
        error: impl Into<String>,
        error_message: Option<String>,
        raw: serde_json::Value,
    ) -> Self {
        Self {
            error: error.into(),
            error_message,
            raw,
        }
    }

    /// The most descriptive message available: `error_message` when present,
    /// the code token otherwise.
    pub fn message(&self) -> &str {
        self.error_message.as_deref().unwrap_or(&self.error)
    }
}

impl std::fmt::Display for RippledErrorData {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.error_message {
            Some(msg) => write!(f, "[{}] {}", self.error, msg),
            None => write!(f, "[{}]", self.error),
        }
    }
}

impl std::error::Error for RippledErrorData {}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_rippled_error_display() {
        let data = RippledErrorData::new(
            "actNotFound",
            Some("Account not found.".to_string()),
            json!({"id": 4, "status": "error"}),
        );
        let display = format!("{}", data);
        assert!(display.contains("actNotFound"));
        assert!(display.contains("Account not found."));
    }

    #[test]
    fn test_rippled_error_message_fallback() {
        let data = RippledErrorData::new("slowDown", None, json!({}));
        assert_eq!(data.message(), "slowDown");
    }

    #[test]
    fn test_error_kinds_are_distinct() {
        let errors = [
            Error::Connection("x".into()),
            Error::NotConnected("x".into()),
            Error::Disconnected("x".into()),
            Error::Timeout,
            Error::response_format("x"),
            Error::NodeNotInitialized("x".into()),
            Error::LedgerVersion("x".into()),
            Error::MissingLedgerHistory("x".into()),
            Error::PendingLedgerVersion("x".into()),
            Error::NotFound("x".into()),
            Error::Serialization("x".into()),
        ];
        let mut kinds: Vec<&str> = errors.iter().map(|e| e.kind()).collect();
        kinds.sort_unstable();
        kinds.dedup();
        assert_eq!(kinds.len(), errors.len());
    }

    #[test]
    fn test_error_from_rippled_data() {
        let data = RippledErrorData::new("noNetwork", None, json!({}));
        let error: Error = data.into();
        assert_eq!(error.kind(), "rippled");
        assert!(format!("{}", error).contains("noNetwork"));
    }

    #[test]
    fn test_response_format_carries_payload() {
        let error = Error::ResponseFormat {
            message: "unrecognized status: partial".into(),
            raw: Some(json!({"id": 1, "status": "partial"})),
        };
        match error {
            Error::ResponseFormat { raw: Some(raw), .. } => {
                assert_eq!(raw["status"], "partial");
            }
            _ => panic!("expected ResponseFormat with payload"),
        }
    }
}
