//! Protocol layer for the ledgerwire client
//!
//! This crate provides the transport-agnostic pieces of the session layer used
//! to talk to a rippled-style ledger node over a message-oriented socket:
//!
//! - **Frame classification**: every inbound JSON frame is decoded into a
//!   closed [`InboundFrame`] sum type at the transport boundary, so the rest of
//!   the client never branches on ad hoc field presence.
//! - **Error taxonomy**: the full set of error kinds a caller can observe, from
//!   transport failures to node-reported errors ([`error`]).
//! - **Range bookkeeping**: [`RangeSet`], a merged-interval set over ledger
//!   indices used to track which ledger history is known complete.
//! - **Observability**: OpenTelemetry/`tracing` initialization shared by
//!   binaries embedding the client.
//!
//! The `ledgerwire-client` crate builds the connection/session machinery on top
//! of this foundation.
//!
//! # Example
//!
//! ```rust
//! use ledgerwire_core::frame::{self, InboundFrame};
//!
//! let frame = frame::classify(r#"{"type":"response","id":3,"status":"success","result":{}}"#)
//!     .unwrap();
//! assert!(matches!(frame, InboundFrame::Success { id: 3, .. }));
//! ```

pub mod error;
pub mod frame;
pub mod observability;
pub mod rangeset;

pub use error::{Error, Result, RippledErrorData};
pub use frame::{InboundFrame, LedgerCloseInfo};
pub use observability::{init_observability, shutdown_observability, ObservabilityConfig};
pub use rangeset::RangeSet;
