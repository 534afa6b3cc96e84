//! Connection event stream
//!
//! Everything a connection observes that is not the direct answer to a
//! request flows through a single broadcast channel: lifecycle transitions,
//! ledger closes, stream pushes, and out-of-band errors. Call
//! [`Connection::events`](crate::Connection::events) to obtain a receiver;
//! every receiver sees every event from the point it subscribed.

use ledgerwire_core::LedgerCloseInfo;
use serde_json::Value;
use tokio::sync::broadcast;

/// Capacity of the broadcast channel backing [`Connection::events`]
///
/// Slow consumers that fall more than this many events behind observe a
/// `RecvError::Lagged` and resume from the oldest retained event.
///
/// [`Connection::events`]: crate::Connection::events
pub(crate) const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Events emitted by a [`Connection`](crate::Connection)
#[derive(Debug, Clone)]
pub enum ConnectionEvent {
    /// The session reached the ready state (initial connect or reconnect)
    Connected,
    /// The session ended, with the WebSocket close code (1000 for a clean
    /// user-requested close, 1006 when the transport dropped without a
    /// close frame)
    Disconnected { code: u16 },
    /// A reconnection attempt is about to be made
    Reconnecting { attempt: u32 },
    /// An out-of-band error: a node warning frame, an unparseable inbound
    /// message, or an internal failure that had no request to fail
    Error {
        kind: String,
        message: String,
        raw: Value,
    },
    /// A validated ledger closed on the node
    LedgerClosed(LedgerCloseInfo),
    /// A stream message other than `ledgerClosed`, e.g. `transaction`
    /// or `path_find`
    Push { event_type: String, payload: Value },
}

pub(crate) fn channel() -> broadcast::Sender<ConnectionEvent> {
    broadcast::channel(EVENT_CHANNEL_CAPACITY).0
}
