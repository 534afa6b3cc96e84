//! Wire-frame classification for the rippled WebSocket protocol
//!
//! Every inbound frame is JSON. Which kind of frame it is can only be
//! determined by inspecting its fields, so this module does that exactly once,
//! at the transport boundary, and hands the rest of the client a closed
//! [`InboundFrame`] sum type:
//!
//! - `type == "response"` with an integer `id` is a correlated response;
//!   its `status` field decides between [`InboundFrame::Success`],
//!   [`InboundFrame::Failure`] and [`InboundFrame::Malformed`].
//! - `type == "ledgerClosed"` is the ledger-close push that drives the
//!   client's validated-ledger and fee state.
//! - any other `type` is an opaque push notification, passed through as-is.
//! - no `type` but an `error` field is a low-level warning from the node
//!   (e.g. `slowDown` backpressure), re-emitted as an error event rather than
//!   correlated with a request.
//!
//! Outbound requests are the caller's payload object with an injected `id`
//! field; [`encode_request`] performs the injection.

use crate::error::{Error, Result, RippledErrorData};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// A classified inbound frame.
#[derive(Debug, Clone)]
pub enum InboundFrame {
    /// Correlated response with `"status": "success"`; `result` is the opaque
    /// payload returned to the requester.
    Success { id: u64, result: Value },
    /// Correlated response with `"status": "error"`.
    Failure { id: u64, error: RippledErrorData },
    /// Correlated response whose status is neither `"success"` nor `"error"`;
    /// the matching request is rejected with a response-format error.
    Malformed { id: u64, status: String, raw: Value },
    /// Ledger-close push carrying the fields that update session state.
    LedgerClosed(LedgerCloseInfo),
    /// Any other typed push notification, passed through untouched.
    Push { event_type: String, payload: Value },
    /// Untyped frame with an `error` field, e.g. a `slowDown` signal.
    Warning {
        kind: String,
        message: String,
        raw: Value,
    },
}

/// Fields of a `ledgerClosed` push (or of the subscribe handshake response,
/// which carries the same shape).
///
/// rippled is inconsistent about numeric encoding across versions, so the
/// numeric fields tolerate both JSON numbers and numeric strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerCloseInfo {
    /// Index of the newly validated ledger.
    #[serde(deserialize_with = "index_or_string")]
    pub ledger_index: u32,
    /// Range string of all validated ledgers (e.g. `"32570-6595042"`), when
    /// the node supplies one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validated_ledgers: Option<String>,
    /// Base fee in drops.
    #[serde(default, deserialize_with = "opt_u64_or_string")]
    pub fee_base: Option<u64>,
    /// Fee reference units.
    #[serde(default, deserialize_with = "opt_u64_or_string")]
    pub fee_ref: Option<u64>,
}

impl LedgerCloseInfo {
    /// Try to read ledger-close fields out of an arbitrary result payload.
    /// Returns `None` when the payload has no usable `ledger_index`.
    pub fn from_value(value: &Value) -> Option<Self> {
        serde_json::from_value(value.clone()).ok()
    }
}

fn index_or_string<'de, D>(deserializer: D) -> std::result::Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error as DeError;
    match NumberOrString::deserialize(deserializer)? {
        NumberOrString::Number(n) => u32::try_from(n).map_err(DeError::custom),
        NumberOrString::String(s) => s.parse().map_err(DeError::custom),
    }
}

fn opt_u64_or_string<'de, D>(deserializer: D) -> std::result::Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error as DeError;
    match Option::<NumberOrString>::deserialize(deserializer)? {
        None => Ok(None),
        Some(NumberOrString::Number(n)) => Ok(Some(n)),
        Some(NumberOrString::String(s)) => s.parse().map(Some).map_err(DeError::custom),
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum NumberOrString {
    Number(u64),
    String(String),
}

/// Classify a raw inbound frame.
///
/// Frames that cannot be classified at all (invalid JSON, a response without a
/// usable id, a frame with neither `type` nor `error`) are errors; the caller
/// reports them as `badMessage` events and drops them without touching any
/// session state.
pub fn classify(text: &str) -> Result<InboundFrame> {
    let data: Value = serde_json::from_str(text)
        .map_err(|e| Error::response_format(format!("invalid JSON: {e}")))?;

    match data.get("type").and_then(Value::as_str) {
        Some("response") => classify_response(data),
        Some("ledgerClosed") => {
            let info: LedgerCloseInfo = serde_json::from_value(data.clone()).map_err(|e| {
                Error::ResponseFormat {
                    message: format!("malformed ledgerClosed frame: {e}"),
                    raw: Some(data),
                }
            })?;
            Ok(InboundFrame::LedgerClosed(info))
        }
        Some(event_type) => Ok(InboundFrame::Push {
            event_type: event_type.to_string(),
            payload: data,
        }),
        None => {
            if let Some(kind) = data.get("error").and_then(Value::as_str) {
                let message = data
                    .get("error_message")
                    .and_then(Value::as_str)
                    .unwrap_or(kind)
                    .to_string();
                Ok(InboundFrame::Warning {
                    kind: kind.to_string(),
                    message,
                    raw: data,
                })
            } else {
                Err(Error::ResponseFormat {
                    message: "frame has neither type nor error".into(),
                    raw: Some(data),
                })
            }
        }
    }
}

fn classify_response(data: Value) -> Result<InboundFrame> {
    let id = match data.get("id").and_then(Value::as_u64) {
        Some(id) => id,
        None => {
            return Err(Error::ResponseFormat {
                message: "valid id not found in response".into(),
                raw: Some(data),
            })
        }
    };

    match data.get("status").and_then(Value::as_str) {
        Some("success") => {
            let result = data.get("result").cloned().unwrap_or(Value::Null);
            Ok(InboundFrame::Success { id, result })
        }
        Some("error") => {
            let error = data
                .get("error")
                .and_then(Value::as_str)
                .unwrap_or("unknown")
                .to_string();
            let error_message = data
                .get("error_message")
                .and_then(Value::as_str)
                .map(str::to_string);
            Ok(InboundFrame::Failure {
                id,
                error: RippledErrorData::new(error, error_message, data),
            })
        }
        other => {
            let status = other.unwrap_or("<missing>").to_string();
            Ok(InboundFrame::Malformed {
                id,
                status,
                raw: data,
            })
        }
    }
}

/// Serialize an outbound request, injecting the allocated id.
///
/// The payload must be a JSON object (a flat map of command fields); any `id`
/// the caller put there is replaced by the session-allocated one.
pub fn encode_request(payload: &Value, id: u64) -> Result<String> {
    let Value::Object(fields) = payload else {
        return Err(Error::Serialization(
            "request payload must be a JSON object".into(),
        ));
    };
    let mut fields = fields.clone();
    fields.insert("id".into(), Value::from(id));
    serde_json::to_string(&Value::Object(fields)).map_err(|e| Error::Serialization(e.to_string()))
}
