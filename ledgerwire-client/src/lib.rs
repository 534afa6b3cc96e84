//! Reconnecting WebSocket session layer for rippled-style ledger nodes
//!
//! This crate provides [`Connection`], a long-lived client session to a
//! ledger node speaking JSON over WebSocket. It subscribes to the ledger
//! stream on connect, correlates requests with responses, tracks which
//! validated ledgers the node holds, and transparently reconnects when the
//! socket drops.
//!
//! # Core Features
//!
//! - **Request-Response**: Send commands and await their results, with
//!   per-request timeouts
//! - **Ledger Tracking**: Latest validated ledger, fee info, and the full
//!   set of ledger versions the node can serve
//! - **Auto-Reconnection**: Configurable retry policies with a
//!   plateau-backoff default that rides out node restarts
//! - **Heartbeat**: Periodic pings detect sessions that died silently
//! - **Events**: A broadcast stream of ledger closes, pushes, and
//!   lifecycle transitions
//! - **Observability**: OpenTelemetry metrics via `ledgerwire-core`
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use ledgerwire_client::ConnectionBuilder;
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> ledgerwire_core::Result<()> {
//!     let connection = ConnectionBuilder::new("wss://s1.ripple.com").build();
//!     connection.connect().await?;
//!
//!     let info = connection.request(json!({ "command": "server_info" }), None).await?;
//!     println!("server_info: {info}");
//!
//!     let version = connection.ledger_version().await?;
//!     println!("latest validated ledger: {version}");
//!
//!     connection.disconnect().await;
//!     Ok(())
//! }
//! ```
//!
//! # Watching the Ledger Stream
//!
//! ```rust,no_run
//! use ledgerwire_client::{ConnectionBuilder, ConnectionEvent};
//!
//! # async fn example() -> ledgerwire_core::Result<()> {
//! let connection = ConnectionBuilder::new("wss://s1.ripple.com").build();
//! let mut events = connection.events();
//! connection.connect().await?;
//!
//! while let Ok(event) = events.recv().await {
//!     match event {
//!         ConnectionEvent::LedgerClosed(info) => {
//!             println!("ledger {} closed", info.ledger_index);
//!         }
//!         ConnectionEvent::Disconnected { code } => {
//!             println!("connection lost ({code}), reconnecting in background");
//!         }
//!         _ => {}
//!     }
//! }
//! # Ok(())
//! # }
//! ```

mod builder;
mod config;
mod connection;
mod events;
mod ledger;
mod metrics;
mod request;
mod retry;
mod transport;

pub use builder::ConnectionBuilder;
pub use config::{ConnectionConfig, ProxyConfig, TlsConfig};
pub use connection::{Connection, SessionState};
pub use events::ConnectionEvent;
pub use metrics::ConnectionMetrics;
pub use retry::{FixedDelay, NoRetry, RetryPolicy, SteppedBackoff};
