//! Request correlation table
//!
//! The node answers requests asynchronously and possibly out of order; the
//! only link between a request and its response is the numeric `id` the
//! client stamped on the outbound frame. This table owns the id counter and
//! the map from outstanding ids to the oneshot channels their callers are
//! awaiting.

use ledgerwire_core::{Error, Result};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{oneshot, Mutex};

/// Outcome delivered to the caller awaiting a request
pub(crate) type RequestOutcome = Result<Value>;

struct TableInner {
    next_id: u64,
    pending: HashMap<u64, oneshot::Sender<RequestOutcome>>,
}

/// Shared table of in-flight requests
///
/// Ids are unique for the lifetime of the connection, not per session:
/// the counter survives reconnects, so a late response from a previous
/// session can never be confused with a request issued after it.
#[derive(Clone)]
pub(crate) struct RequestTable {
    inner: Arc<Mutex<TableInner>>,
}

impl RequestTable {
    pub(crate) fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(TableInner {
                next_id: 1,
                pending: HashMap::new(),
            })),
        }
    }

    /// Allocate an id and register a channel for its response
    pub(crate) async fn register(&self) -> (u64, oneshot::Receiver<RequestOutcome>) {
        let mut inner = self.inner.lock().await;
        let id = inner.next_id;
        inner.next_id += 1;
        let (tx, rx) = oneshot::channel();
        inner.pending.insert(id, tx);
        (id, rx)
    }

    /// Deliver an outcome to the caller awaiting `id`
    ///
    /// Returns `false` if nothing was waiting: the id is unknown, already
    /// resolved, or abandoned (timeout). The caller then drops the frame.
    pub(crate) async fn resolve(&self, id: u64, outcome: RequestOutcome) -> bool {
        let mut inner = self.inner.lock().await;
        match inner.pending.remove(&id) {
            Some(tx) => tx.send(outcome).is_ok(),
            None => false,
        }
    }

    /// Remove a registration without delivering anything
    ///
    /// Used when the caller abandons the request (timeout, send failure)
    /// so that a late response is dropped rather than delivered.
    pub(crate) async fn forget(&self, id: u64) -> bool {
        self.inner.lock().await.pending.remove(&id).is_some()
    }

    /// Fail every in-flight request with a clone of `err`, emptying the table
    ///
    /// Called when the session ends: responses for these requests can no
    /// longer arrive.
    pub(crate) async fn fail_all(&self, err: &Error) {
        let mut inner = self.inner.lock().await;
        for (_, tx) in inner.pending.drain() {
            let _ = tx.send(Err(err.clone()));
        }
    }

    #[cfg(test)]
    pub(crate) async fn pending_count(&self) -> usize {
        self.inner.lock().await.pending.len()
    }
}
