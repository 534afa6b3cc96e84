//! Connection orchestration
//!
//! `Connection` is the long-lived handle applications hold. It ties the
//! single-use WebSocket transport to the request table, the ledger state and
//! the retry policy, and runs the session state machine:
//!
//! ```text
//! Disconnected -> Opening -> Subscribing -> Ready
//!       ^             |           |           |
//!       |             v           v           v
//!       +--------- Retrying <-----------  (close)
//!                                             |
//!                   Closing  <--- disconnect()+
//! ```
//!
//! A session becomes `Ready` only after the subscribe handshake confirms the
//! node has a validated ledger; requests issued before that point wait for
//! readiness rather than racing the handshake. An unexpected close fails all
//! in-flight requests and hands control to the retry policy.
//!
//! # Cloning
//!
//! `Connection` is cheaply cloneable using `Arc` internally. All clones share
//! the same session and state and can be used from multiple tasks.

use crate::config::ConnectionConfig;
use crate::events::{self, ConnectionEvent};
use crate::ledger::LedgerState;
use crate::metrics::ConnectionMetrics;
use crate::request::RequestTable;
use crate::retry::RetryPolicy;
use crate::transport::TransportSession;
use ledgerwire_core::frame::{self, InboundFrame};
use ledgerwire_core::{Error, LedgerCloseInfo, Result};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{broadcast, watch, Mutex};
use tokio::task::JoinHandle;

/// States of the session state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No session and none wanted
    Disconnected,
    /// Transport handshake in progress
    Opening,
    /// Transport open, subscribe handshake in flight
    Subscribing,
    /// Handshake confirmed, requests flow
    Ready,
    /// User-requested close in progress
    Closing,
    /// Session lost, reconnection pending
    Retrying { attempt: u32 },
}

fn state_code(state: SessionState) -> i64 {
    match state {
        SessionState::Disconnected => 0,
        SessionState::Opening => 1,
        SessionState::Subscribing => 2,
        SessionState::Ready => 3,
        SessionState::Closing => 4,
        SessionState::Retrying { .. } => 5,
    }
}

const CLOSED_MSG: &str = "websocket was closed";

struct Inner {
    config: ConnectionConfig,
    state: watch::Sender<SessionState>,
    session: Mutex<Option<TransportSession>>,
    requests: RequestTable,
    ledger: Mutex<LedgerState>,
    events: broadcast::Sender<ConnectionEvent>,
    /// Attempt counter for the current outage; cleared on success
    retry_count: AtomicU32,
    policy: Mutex<Box<dyn RetryPolicy>>,
    /// Serializes connect/disconnect/reconnect against each other and
    /// against the retry loop
    connect_gate: Mutex<()>,
    /// Session generation; a reader belonging to a superseded session
    /// must not tear down its successor
    serial: AtomicU64,
    retry_task: Mutex<Option<JoinHandle<()>>>,
    heartbeat_task: Mutex<Option<JoinHandle<()>>>,
    metrics: Option<Arc<ConnectionMetrics>>,
}

/// Client session to a rippled-style node
#[derive(Clone)]
pub struct Connection {
    inner: Arc<Inner>,
}

impl Connection {
    pub(crate) fn new(
        config: ConnectionConfig,
        policy: Box<dyn RetryPolicy>,
        metrics: Option<Arc<ConnectionMetrics>>,
    ) -> Self {
        let (state, _) = watch::channel(SessionState::Disconnected);
        Self {
            inner: Arc::new(Inner {
                config,
                state,
                session: Mutex::new(None),
                requests: RequestTable::new(),
                ledger: Mutex::new(LedgerState::new()),
                events: events::channel(),
                retry_count: AtomicU32::new(0),
                policy: Mutex::new(policy),
                connect_gate: Mutex::new(()),
                serial: AtomicU64::new(0),
                retry_task: Mutex::new(None),
                heartbeat_task: Mutex::new(None),
                metrics,
            }),
        }
    }

    /// The configured WebSocket endpoint
    pub fn endpoint(&self) -> &str {
        &self.inner.config.endpoint
    }

    /// Current state of the session state machine
    pub fn state(&self) -> SessionState {
        *self.inner.state.borrow()
    }

    /// Whether the session is currently ready for requests
    pub fn is_connected(&self) -> bool {
        self.state() == SessionState::Ready
    }

    /// Subscribe to connection events
    ///
    /// Each receiver sees every event emitted after this call.
    pub fn events(&self) -> broadcast::Receiver<ConnectionEvent> {
        self.inner.events.subscribe()
    }

    /// Open the session and complete the subscribe handshake
    ///
    /// Resolves once the session is `Ready`. Calling while already ready is
    /// a no-op; concurrent calls are serialized and the laggards observe the
    /// winner's session.
    #[tracing::instrument(skip(self), fields(endpoint = %self.inner.config.endpoint))]
    pub async fn connect(&self) -> Result<()> {
        let _gate = self.inner.connect_gate.lock().await;
        if *self.inner.state.borrow() == SessionState::Ready {
            return Ok(());
        }
        self.inner.open_session(SessionState::Disconnected).await
    }

    /// Close the session
    ///
    /// Cancels any pending reconnection, fails in-flight requests with a
    /// disconnection error and emits `Disconnected` with the close code.
    /// Calling while already disconnected does nothing.
    pub async fn disconnect(&self) {
        self.inner.shutdown().await;
    }

    /// Force a fresh session: close the current one, then connect again
    pub async fn reconnect(&self) -> Result<()> {
        self.inner.shutdown().await;
        let _gate = self.inner.connect_gate.lock().await;
        self.inner.open_session(SessionState::Disconnected).await
    }

    /// Send a request to the node and await its `result`
    ///
    /// The `command` field of `payload` names the operation; an `id` is
    /// stamped on automatically. While the session is coming up (connecting
    /// or between retries) the call waits for readiness; when disconnected
    /// it fails immediately.
    pub async fn request(&self, payload: Value, timeout: Option<Duration>) -> Result<Value> {
        let command = payload
            .get("command")
            .and_then(Value::as_str)
            .unwrap_or("unknown")
            .to_string();
        let started = Instant::now();

        let result = self.request_when_ready(payload, timeout).await;

        if let Some(metrics) = &self.inner.metrics {
            let status = match &result {
                Ok(_) => "success",
                Err(e) => e.kind(),
            };
            metrics.record_request(&command, status, started.elapsed().as_secs_f64());
        }
        result
    }

    async fn request_when_ready(&self, payload: Value, timeout: Option<Duration>) -> Result<Value> {
        let state = *self.inner.state.borrow();
        match state {
            SessionState::Ready => {}
            SessionState::Opening
            | SessionState::Subscribing
            | SessionState::Retrying { .. } => self.inner.wait_for_ready().await?,
            SessionState::Disconnected | SessionState::Closing => {
                return Err(Error::NotConnected(
                    "not connected; call connect() first".into(),
                ))
            }
        }
        self.inner.send_request(payload, timeout).await
    }

    /// Index of the most recently closed validated ledger
    ///
    /// Waits for the session to become ready if it is on its way up.
    pub async fn ledger_version(&self) -> Result<u32> {
        self.inner.wait_for_ready().await?;
        self.inner.ledger.lock().await.latest().ok_or_else(|| {
            Error::PendingLedgerVersion("no validated ledger received yet".into())
        })
    }

    /// Base transaction fee in drops, from the ledger stream
    pub async fn fee_base(&self) -> Result<u64> {
        self.inner.wait_for_ready().await?;
        self.inner.ledger.lock().await.fee_base().ok_or_else(|| {
            Error::PendingLedgerVersion("no fee information received yet".into())
        })
    }

    /// Reference fee units, from the ledger stream
    pub async fn fee_ref(&self) -> Result<u64> {
        self.inner.wait_for_ready().await?;
        self.inner.ledger.lock().await.fee_ref().ok_or_else(|| {
            Error::PendingLedgerVersion("no fee information received yet".into())
        })
    }

    /// Whether the node holds the given validated ledger
    pub async fn has_ledger_version(&self, version: u32) -> Result<bool> {
        self.inner.wait_for_ready().await?;
        Ok(self.inner.ledger.lock().await.has_version(version))
    }

    /// Whether the node holds every validated ledger in `low..=high`
    ///
    /// With `high` absent the range runs up to the latest validated ledger.
    pub async fn has_ledger_versions(&self, low: u32, high: Option<u32>) -> Result<bool> {
        self.inner.wait_for_ready().await?;
        let ledger = self.inner.ledger.lock().await;
        let high = match high.or_else(|| ledger.latest()) {
            Some(high) => high,
            None => return Ok(false),
        };
        Ok(ledger.has_versions(low, high))
    }
}

impl Inner {
    fn set_state(&self, state: SessionState) {
        if let Some(metrics) = &self.metrics {
            metrics.update_session_state(state_code(state));
        }
        self.state.send_replace(state);
    }

    fn emit(&self, event: ConnectionEvent) {
        // No receivers is fine
        let _ = self.events.send(event);
    }

    /// Open a transport, run the subscribe handshake, reach `Ready`
    ///
    /// On failure the state falls back to `fallback` so the caller's context
    /// (explicit connect vs. retry loop) stays visible to observers.
    /// Caller must hold the connect gate.
    fn open_session<'a>(
        self: &'a Arc<Self>,
        fallback: SessionState,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<()>> + Send + 'a>> {
        Box::pin(async move {
        self.set_state(SessionState::Opening);

        let (session, reader) =
            match TransportSession::open(&self.config.endpoint, &self.config).await {
                Ok(pair) => pair,
                Err(e) => {
                    self.set_state(fallback);
                    return Err(e);
                }
            };

        let serial = self.serial.fetch_add(1, Ordering::SeqCst) + 1;
        *self.session.lock().await = Some(session);

        let inner = Arc::clone(self);
        tokio::spawn(async move {
            let frame_inner = Arc::clone(&inner);
            let code = reader
                .run(move |text| {
                    let inner = Arc::clone(&frame_inner);
                    async move { inner.handle_frame(&text).await }
                })
                .await;
            inner.handle_close(serial, code).await;
        });

        self.set_state(SessionState::Subscribing);
        let handshake = json!({ "command": "subscribe", "streams": ["ledger"] });
        let result = match self.send_request(handshake, None).await {
            Ok(result) => result,
            Err(e) => {
                self.abandon_session().await;
                self.set_state(fallback);
                return Err(e);
            }
        };

        // A node that is still syncing answers the subscribe with an empty
        // result; it cannot serve ledger data yet
        let info = LedgerCloseInfo::from_value(&result).filter(|i| i.ledger_index != 0);
        let info = match info {
            Some(info) => info,
            None => {
                self.abandon_session().await;
                self.set_state(fallback);
                return Err(Error::NodeNotInitialized(
                    "node has no validated ledger yet".into(),
                ));
            }
        };
        if let Err(e) = self.ledger.lock().await.update(&info) {
            self.abandon_session().await;
            self.set_state(fallback);
            return Err(e);
        }

        self.retry_count.store(0, Ordering::SeqCst);
        self.policy.lock().await.reset();
        self.set_state(SessionState::Ready);
        self.emit(ConnectionEvent::Connected);
        if let (Some(metrics), SessionState::Retrying { .. }) = (&self.metrics, fallback) {
            metrics.record_reconnect_success();
        }
        self.start_heartbeat().await;

        tracing::info!(
            endpoint = %self.config.endpoint,
            ledger_index = info.ledger_index,
            "session ready"
        );
        Ok(())
        })
    }

    /// Stamp an id on `payload`, send it, await the correlated response
    ///
    /// Deliberately does not consult the state machine: the subscribe
    /// handshake itself runs through here before the session is `Ready`.
    async fn send_request(&self, payload: Value, timeout: Option<Duration>) -> Result<Value> {
        let (id, rx) = self.requests.register().await;

        let text = match frame::encode_request(&payload, id) {
            Ok(text) => text,
            Err(e) => {
                self.requests.forget(id).await;
                return Err(e);
            }
        };

        {
            let mut session = self.session.lock().await;
            let Some(session) = session.as_mut() else {
                self.requests.forget(id).await;
                return Err(Error::NotConnected("no open websocket session".into()));
            };
            if self.config.trace {
                tracing::debug!(frame = %text, "send");
            }
            if let Err(e) = session.send(text).await {
                self.requests.forget(id).await;
                return Err(e);
            }
        }

        let timeout = timeout.unwrap_or(self.config.request_timeout);
        match tokio::time::timeout(timeout, rx).await {
            Err(_elapsed) => {
                // A response arriving after this point is dropped
                self.requests.forget(id).await;
                Err(Error::Timeout)
            }
            Ok(Err(_recv)) => Err(Error::Disconnected(CLOSED_MSG.into())),
            Ok(Ok(outcome)) => outcome,
        }
    }

    /// Block until the state machine reaches `Ready`
    ///
    /// `Retrying` counts as "on its way up": the reconnect loop owns the
    /// outage, so callers keep waiting through it. Only a settled
    /// `Disconnected` fails the wait.
    async fn wait_for_ready(&self) -> Result<()> {
        let mut rx = self.state.subscribe();
        loop {
            match *rx.borrow_and_update() {
                SessionState::Ready => return Ok(()),
                SessionState::Disconnected => {
                    return Err(Error::NotConnected(
                        "not connected; call connect() first".into(),
                    ))
                }
                _ => {}
            }
            if rx.changed().await.is_err() {
                return Err(Error::NotConnected("connection handle dropped".into()));
            }
        }
    }

    /// Dispatch one inbound text frame
    async fn handle_frame(&self, text: &str) {
        if self.config.trace {
            tracing::debug!(frame = %text, "recv");
        }

        let frame = match frame::classify(text) {
            Ok(frame) => frame,
            Err(e) => {
                if let Some(metrics) = &self.metrics {
                    metrics.record_error(e.kind());
                }
                self.emit(ConnectionEvent::Error {
                    kind: e.kind().to_string(),
                    message: e.to_string(),
                    raw: Value::String(text.to_string()),
                });
                return;
            }
        };

        match frame {
            InboundFrame::Success { id, result } => {
                if !self.requests.resolve(id, Ok(result)).await {
                    tracing::debug!(id, "dropped response with no pending request");
                }
            }
            InboundFrame::Failure { id, error } => {
                if !self.requests.resolve(id, Err(Error::Rippled(error))).await {
                    tracing::debug!(id, "dropped error response with no pending request");
                }
            }
            InboundFrame::Malformed { id, status, raw } => {
                let err = Error::ResponseFormat {
                    message: format!("unrecognized response status: {status}"),
                    raw: Some(raw),
                };
                if !self.requests.resolve(id, Err(err)).await {
                    tracing::debug!(id, "dropped malformed response with no pending request");
                }
            }
            InboundFrame::LedgerClosed(info) => {
                if let Err(e) = self.ledger.lock().await.update(&info) {
                    if let Some(metrics) = &self.metrics {
                        metrics.record_error(e.kind());
                    }
                    self.emit(ConnectionEvent::Error {
                        kind: e.kind().to_string(),
                        message: e.to_string(),
                        raw: Value::Null,
                    });
                }
                if let Some(metrics) = &self.metrics {
                    metrics.record_ledger_close(info.ledger_index);
                }
                self.emit(ConnectionEvent::LedgerClosed(info));
            }
            InboundFrame::Push {
                event_type,
                payload,
            } => {
                if let Some(metrics) = &self.metrics {
                    metrics.record_push(&event_type);
                }
                self.emit(ConnectionEvent::Push {
                    event_type,
                    payload,
                });
            }
            InboundFrame::Warning { kind, message, raw } => {
                if let Some(metrics) = &self.metrics {
                    metrics.record_error(&kind);
                }
                self.emit(ConnectionEvent::Error { kind, message, raw });
            }
        }
    }

    /// React to the reader ending, which means the socket is gone
    ///
    /// A stale reader (superseded serial) was already dealt with by whoever
    /// replaced the session; it must not touch anything.
    async fn handle_close(self: &Arc<Self>, serial: u64, code: u16) {
        if self.serial.load(Ordering::SeqCst) != serial {
            return;
        }
        let prior = *self.state.borrow();
        drop(self.session.lock().await.take());

        match prior {
            SessionState::Ready => {
                tracing::warn!(code, "websocket closed unexpectedly");
                self.stop_heartbeat().await;
                self.set_state(SessionState::Retrying { attempt: 0 });
                self.requests
                    .fail_all(&Error::Disconnected(CLOSED_MSG.into()))
                    .await;
                self.emit(ConnectionEvent::Disconnected { code });
                self.spawn_retry().await;
            }
            SessionState::Closing => {
                // disconnect() drives the rest
            }
            _ => {
                // Handshake still in flight; failing its request makes
                // open_session surface the error
                self.requests
                    .fail_all(&Error::Disconnected(CLOSED_MSG.into()))
                    .await;
            }
        }
    }

    /// Drop a half-established session without emitting lifecycle events
    ///
    /// Used when the handshake fails: the caller reports the error itself.
    async fn abandon_session(&self) {
        self.serial.fetch_add(1, Ordering::SeqCst);
        let session = self.session.lock().await.take();
        if let Some(session) = session {
            session.close().await;
        }
        self.requests
            .fail_all(&Error::Disconnected(CLOSED_MSG.into()))
            .await;
    }

    /// User-driven teardown shared by `disconnect()` and `reconnect()`
    async fn shutdown(self: &Arc<Self>) {
        if let Some(handle) = self.retry_task.lock().await.take() {
            handle.abort();
        }
        self.retry_count.store(0, Ordering::SeqCst);
        self.policy.lock().await.reset();

        let _gate = self.connect_gate.lock().await;
        self.stop_heartbeat().await;

        let session = self.session.lock().await.take();
        let Some(session) = session else {
            // A close handler racing us may store a retry task after the
            // abort above; invalidate its reader and take the slot again.
            // The task itself bails once it sees the state leave Retrying.
            self.serial.fetch_add(1, Ordering::SeqCst);
            if let Some(handle) = self.retry_task.lock().await.take() {
                handle.abort();
            }
            self.set_state(SessionState::Disconnected);
            return;
        };

        self.set_state(SessionState::Closing);
        self.serial.fetch_add(1, Ordering::SeqCst);
        let code = session.close().await;
        self.set_state(SessionState::Disconnected);
        self.requests
            .fail_all(&Error::Disconnected(CLOSED_MSG.into()))
            .await;
        self.ledger.lock().await.reset();
        self.emit(ConnectionEvent::Disconnected { code });
    }

    /// Run the retry policy until the session is restored or it gives up
    async fn spawn_retry(self: &Arc<Self>) {
        let inner = Arc::clone(self);
        let handle = tokio::spawn(async move {
            loop {
                let attempt = inner.retry_count.fetch_add(1, Ordering::SeqCst) + 1;
                let delay = inner.policy.lock().await.next_delay(attempt);
                let Some(delay) = delay else {
                    tracing::warn!(attempt, "retry policy gave up, staying disconnected");
                    let _gate = inner.connect_gate.lock().await;
                    if matches!(*inner.state.borrow(), SessionState::Retrying { .. }) {
                        inner.set_state(SessionState::Disconnected);
                    }
                    return;
                };
                tokio::time::sleep(delay).await;

                // Only a state still in Retrying is ours to act on. Anything
                // else means a manual connect() restored the session or a
                // disconnect() tore it down while we slept.
                let gate = inner.connect_gate.lock().await;
                if !matches!(*inner.state.borrow(), SessionState::Retrying { .. }) {
                    return;
                }
                inner.set_state(SessionState::Retrying { attempt });
                inner.emit(ConnectionEvent::Reconnecting { attempt });
                if let Some(metrics) = &inner.metrics {
                    metrics.record_reconnect_attempt();
                }
                let result = inner
                    .open_session(SessionState::Retrying { attempt })
                    .await;
                drop(gate);

                match result {
                    Ok(()) => return,
                    Err(e) => {
                        tracing::warn!(attempt, error = %e, "reconnect attempt failed")
                    }
                }
            }
        });

        let mut slot = self.retry_task.lock().await;
        if let Some(old) = slot.replace(handle) {
            old.abort();
        }
    }

    /// Ping the node periodically; a failed ping forces a fresh session
    async fn start_heartbeat(self: &Arc<Self>) {
        let Some(interval) = self.config.heartbeat_interval else {
            return;
        };

        let inner = Arc::clone(self);
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // The first tick completes immediately
            ticker.tick().await;
            loop {
                ticker.tick().await;
                if *inner.state.borrow() != SessionState::Ready {
                    continue;
                }
                if let Err(e) = inner.send_request(json!({ "command": "ping" }), None).await {
                    tracing::warn!(error = %e, "heartbeat failed, restarting session");
                    // Restart from a separate task: the restart path stops
                    // the heartbeat, which is this task
                    let restart = Arc::clone(&inner);
                    tokio::spawn(async move { restart.restart_stale_session().await });
                    return;
                }
            }
        });

        let mut slot = self.heartbeat_task.lock().await;
        if let Some(old) = slot.replace(handle) {
            old.abort();
        }
    }

    async fn stop_heartbeat(&self) {
        if let Some(handle) = self.heartbeat_task.lock().await.take() {
            handle.abort();
        }
    }

    /// The socket looks open but the node stopped answering; treat it like
    /// an unexpected close and let the retry loop take over
    async fn restart_stale_session(self: &Arc<Self>) {
        let _gate = self.connect_gate.lock().await;
        if *self.state.borrow() != SessionState::Ready {
            return;
        }
        self.abandon_session().await;
        self.set_state(SessionState::Retrying { attempt: 0 });
        self.emit(ConnectionEvent::Disconnected { code: 1006 });
        self.spawn_retry().await;
    }
}
