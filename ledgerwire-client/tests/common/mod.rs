//! Common test utilities for ledgerwire-client integration tests
//!
//! Provides a mock rippled-style WebSocket node so client behavior can be
//! tested without a real ledger node.

#![allow(dead_code)]

use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc};
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;

/// Server-side actions a test can inject into the live connection
#[derive(Debug, Clone)]
enum ServerAction {
    /// Send an unsolicited text frame
    Push(String),
    /// Close the WebSocket with the given code
    Close(u16),
}

/// Mock rippled node
///
/// Accepts WebSocket connections (repeatedly, so reconnection can be tested),
/// parses each inbound text frame as JSON and answers it through the
/// configured handler; `None` means no answer at all. Custom handlers
/// usually delegate to [`default_response`] for the frames they don't care
/// about. Everything received is also forwarded to the test through a
/// capture channel.
pub struct MockRippled {
    addr: SocketAddr,
    shutdown_tx: mpsc::Sender<()>,
    message_rx: mpsc::Receiver<String>,
    action_tx: broadcast::Sender<ServerAction>,
    accepted: Arc<AtomicUsize>,
}

impl MockRippled {
    /// Start a mock node with default behavior only
    pub async fn start() -> Self {
        Self::with_handler(|req| async move { default_response(&req) }).await
    }

    /// Start a mock node with a custom request handler
    ///
    /// The handler receives the parsed request and may return a raw frame to
    /// send back, or `None` to stay silent.
    pub async fn with_handler<F, Fut>(handler: F) -> Self
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = Option<String>> + Send,
    {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);
        let (msg_tx, msg_rx) = mpsc::channel::<String>(100);
        let (action_tx, _) = broadcast::channel::<ServerAction>(16);
        let accepted = Arc::new(AtomicUsize::new(0));

        let handler = Arc::new(handler);
        let action_tx_server = action_tx.clone();
        let accepted_server = Arc::clone(&accepted);

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = shutdown_rx.recv() => break,
                    accept_result = listener.accept() => {
                        let Ok((stream, _)) = accept_result else { break };
                        accepted_server.fetch_add(1, Ordering::SeqCst);
                        let handler = Arc::clone(&handler);
                        let msg_tx = msg_tx.clone();
                        let mut action_rx = action_tx_server.subscribe();

                        tokio::spawn(async move {
                            let Ok(ws_stream) = accept_async(stream).await else {
                                return;
                            };
                            let (mut write, mut read) = ws_stream.split();

                            loop {
                                tokio::select! {
                                    action = action_rx.recv() => match action {
                                        Ok(ServerAction::Push(text)) => {
                                            let _ = write.send(Message::Text(text)).await;
                                        }
                                        Ok(ServerAction::Close(code)) => {
                                            let _ = write
                                                .send(Message::Close(Some(CloseFrame {
                                                    code: code.into(),
                                                    reason: "".into(),
                                                })))
                                                .await;
                                            break;
                                        }
                                        Err(_) => break,
                                    },
                                    msg = read.next() => match msg {
                                        Some(Ok(Message::Text(text))) => {
                                            let _ = msg_tx.send(text.clone()).await;
                                            let Ok(request) = serde_json::from_str::<Value>(&text) else {
                                                continue;
                                            };
                                            if let Some(response) = handler(request).await {
                                                let _ = write.send(Message::Text(response)).await;
                                            }
                                        }
                                        Some(Ok(Message::Close(_))) => {
                                            // Flush tungstenite's queued close reply
                                            // so the client observes the handshake
                                            // code instead of a dead socket
                                            let _ = write.flush().await;
                                            break;
                                        }
                                        None => break,
                                        Some(Ok(_)) => {}
                                        Some(Err(_)) => break,
                                    }
                                }
                            }
                        });
                    }
                }
            }
        });

        Self {
            addr,
            shutdown_tx,
            message_rx: msg_rx,
            action_tx,
            accepted,
        }
    }

    /// WebSocket URL for connecting to this node
    pub fn url(&self) -> String {
        format!("ws://{}", self.addr)
    }

    /// Number of WebSocket connections accepted so far
    pub fn connections(&self) -> usize {
        self.accepted.load(Ordering::SeqCst)
    }

    /// Next frame the node received, or `None` after 5 s
    pub async fn wait_for_message(&mut self) -> Option<String> {
        tokio::time::timeout(std::time::Duration::from_secs(5), self.message_rx.recv())
            .await
            .ok()
            .flatten()
    }

    /// Send an unsolicited frame to every live connection
    pub fn push(&self, text: String) {
        let _ = self.action_tx.send(ServerAction::Push(text));
    }

    /// Close every live connection with the given code
    pub fn force_close(&self, code: u16) {
        let _ = self.action_tx.send(ServerAction::Close(code));
    }

    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(()).await;
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    }
}

/// Built-in answers for the frames every session exchanges: `subscribe`
/// gets the canonical handshake, `ping` an empty success
pub fn default_response(request: &Value) -> Option<String> {
    let id = request.get("id")?.as_u64()?;
    match request.get("command")?.as_str()? {
        "subscribe" => Some(success_response(id, handshake_result())),
        "ping" => Some(success_response(id, json!({}))),
        _ => None,
    }
}

/// Canonical subscribe-handshake result of a healthy node
pub fn handshake_result() -> Value {
    json!({
        "ledger_index": 8_820_051,
        "validated_ledgers": "32570-8820051",
        "fee_base": 10,
        "fee_ref": 10,
        "ledger_hash": "EC02890710AAA2B71221B0D560CFB22D64317C07B7406B02959AD84BAD33E602",
        "reserve_base": 20_000_000,
        "reserve_inc": 5_000_000
    })
}

pub fn success_response(id: u64, result: Value) -> String {
    json!({
        "type": "response",
        "id": id,
        "status": "success",
        "result": result
    })
    .to_string()
}

pub fn error_response(id: u64, error: &str, message: &str) -> String {
    json!({
        "type": "response",
        "id": id,
        "status": "error",
        "error": error,
        "error_message": message
    })
    .to_string()
}

pub fn ledger_closed(ledger_index: u32, validated_ledgers: Option<&str>) -> String {
    let mut frame = json!({
        "type": "ledgerClosed",
        "ledger_index": ledger_index,
        "fee_base": 10,
        "fee_ref": 10
    });
    if let Some(ranges) = validated_ledgers {
        frame["validated_ledgers"] = json!(ranges);
    }
    frame.to_string()
}

/// Receive the next event within 5 s or panic
pub async fn next_event(
    events: &mut tokio::sync::broadcast::Receiver<ledgerwire_client::ConnectionEvent>,
) -> ledgerwire_client::ConnectionEvent {
    tokio::time::timeout(std::time::Duration::from_secs(5), events.recv())
        .await
        .expect("timed out waiting for connection event")
        .expect("event channel closed")
}
