//! ledgerwire - client session layer for rippled-style ledger nodes
//!
//! This is the main convenience crate that re-exports the ledgerwire
//! sub-crates. Use it if you want a single dependency providing the full
//! client stack.
//!
//! # Architecture
//!
//! ledgerwire is organized into modular crates:
//!
//! - **ledgerwire-core**: Error taxonomy, wire-frame classification,
//!   ledger-range bookkeeping, observability
//! - **ledgerwire-client**: The reconnecting WebSocket connection,
//!   request correlation, ledger tracking
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use ledgerwire::ConnectionBuilder;
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> ledgerwire::core::Result<()> {
//!     let connection = ConnectionBuilder::new("wss://s1.ripple.com").build();
//!     connection.connect().await?;
//!
//!     let info = connection.request(json!({ "command": "server_info" }), None).await?;
//!     println!("server_info: {info}");
//!
//!     connection.disconnect().await;
//!     Ok(())
//! }
//! ```

// Re-export all public APIs from sub-crates
// This allows users to access everything through `ledgerwire::` prefix
pub use ledgerwire_client as client;
pub use ledgerwire_core as core;

// Convenience re-exports of the most commonly used types
pub use ledgerwire_client::{Connection, ConnectionBuilder, ConnectionEvent, SessionState};
pub use ledgerwire_core::{Error, Result};
