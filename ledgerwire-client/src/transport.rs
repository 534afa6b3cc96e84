//! WebSocket transport for a single session
//!
//! One [`TransportSession`]/[`TransportReader`] pair corresponds to exactly
//! one WebSocket connection. When the socket closes, for any reason, the pair
//! is dead; reconnection means opening a fresh pair. Keeping the transport
//! single-use pushes all retry logic up into the connection, where the
//! session state machine lives.
//!
//! The session owns the write half, the reader the read half. The reader
//! reports the observed close code back through a watch channel so a clean
//! shutdown can surface the peer's close frame.

use crate::config::{ConnectionConfig, ProxyConfig, TlsConfig};
use base64::Engine;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use ledgerwire_core::{Error, Result};
use std::borrow::Cow;
use std::future::Future;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::watch;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::handshake::client::Request;
use tokio_tungstenite::tungstenite::http::{header, HeaderValue, Uri};
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{client_async_tls_with_config, Connector, MaybeTlsStream, WebSocketStream};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Close code reported when the stream ended without a close frame
const ABNORMAL_CLOSURE: u16 = 1006;

/// How long a clean close waits for the peer's close frame
const CLOSE_TIMEOUT: Duration = Duration::from_secs(5);

/// Write half of an open WebSocket session
#[derive(Debug)]
pub(crate) struct TransportSession {
    sink: SplitSink<WsStream, Message>,
    closed: watch::Receiver<Option<u16>>,
}

/// Read half of an open WebSocket session
#[derive(Debug)]
pub(crate) struct TransportReader {
    stream: SplitStream<WsStream>,
    closed: watch::Sender<Option<u16>>,
}

impl TransportSession {
    /// Open a WebSocket connection to `url`, honoring the proxy and TLS
    /// settings in `config`
    pub(crate) async fn open(
        url: &str,
        config: &ConnectionConfig,
    ) -> Result<(TransportSession, TransportReader)> {
        let uri: Uri = url
            .parse()
            .map_err(|e| Error::Connection(format!("invalid endpoint {url}: {e}")))?;
        let host = uri
            .host()
            .ok_or_else(|| Error::Connection(format!("endpoint {url} has no host")))?;
        let port = uri.port_u16().unwrap_or(match uri.scheme_str() {
            Some("wss") => 443,
            _ => 80,
        });

        let tcp = match &config.proxy {
            Some(proxy) => proxy_connect(proxy, host, port).await?,
            None => TcpStream::connect((host, port))
                .await
                .map_err(|e| Error::NotConnected(format!("tcp connect failed: {e}")))?,
        };

        let connector = match &config.tls {
            Some(tls) => Some(Connector::NativeTls(build_tls_connector(tls)?)),
            None => None,
        };

        let request = build_client_request(url, config)?;
        let (ws_stream, _) = client_async_tls_with_config(request, tcp, None, connector)
            .await
            .map_err(|e| Error::NotConnected(e.to_string()))?;

        let (sink, stream) = ws_stream.split();
        let (closed_tx, closed_rx) = watch::channel(None);

        Ok((
            TransportSession {
                sink,
                closed: closed_rx,
            },
            TransportReader {
                stream,
                closed: closed_tx,
            },
        ))
    }

    /// Send one text frame
    pub(crate) async fn send(&mut self, text: String) -> Result<()> {
        self.sink
            .send(Message::Text(text))
            .await
            .map_err(|e| Error::Disconnected(e.to_string()))
    }

    /// Close the session cleanly, returning the close code
    ///
    /// Sends a normal close frame, then waits briefly for the reader to
    /// observe the peer's close. Falls back to 1000 if the peer never
    /// answers or the socket was already gone.
    pub(crate) async fn close(mut self) -> u16 {
        let _ = self
            .sink
            .send(Message::Close(Some(CloseFrame {
                code: CloseCode::Normal,
                reason: Cow::Borrowed(""),
            })))
            .await;

        let mut closed = self.closed;
        let wait = tokio::time::timeout(CLOSE_TIMEOUT, async {
            loop {
                if let Some(code) = *closed.borrow_and_update() {
                    return code;
                }
                if closed.changed().await.is_err() {
                    return 1000;
                }
            }
        });
        wait.await.unwrap_or(1000)
    }
}

impl TransportReader {
    /// Drain the stream, invoking `on_frame` for each text frame
    ///
    /// Runs until the socket closes and returns the close code: the peer's
    /// code when a close frame was seen, 1006 otherwise.
    pub(crate) async fn run<F, Fut>(mut self, mut on_frame: F) -> u16
    where
        F: FnMut(String) -> Fut,
        Fut: Future<Output = ()>,
    {
        let mut code = ABNORMAL_CLOSURE;
        while let Some(next) = self.stream.next().await {
            match next {
                Ok(Message::Text(text)) => on_frame(text).await,
                Ok(Message::Close(frame)) => {
                    code = frame.map(|f| u16::from(f.code)).unwrap_or(ABNORMAL_CLOSURE);
                    break;
                }
                // Pongs answer our heartbeat at the protocol level; pings
                // are answered automatically by tungstenite
                Ok(_) => {}
                Err(e) => {
                    tracing::debug!(error = %e, "websocket read failed");
                    break;
                }
            }
        }
        let _ = self.closed.send(Some(code));
        code
    }
}

/// Build the HTTP upgrade request, attaching basic-auth credentials when
/// configured
fn build_client_request(url: &str, config: &ConnectionConfig) -> Result<Request> {
    let mut request = url
        .into_client_request()
        .map_err(|e| Error::Connection(format!("invalid endpoint {url}: {e}")))?;

    if let Some(credentials) = &config.authorization {
        let encoded = base64::engine::general_purpose::STANDARD.encode(credentials);
        let value = HeaderValue::from_str(&format!("Basic {encoded}"))
            .map_err(|e| Error::Connection(format!("invalid authorization credentials: {e}")))?;
        request.headers_mut().insert(header::AUTHORIZATION, value);
    }

    Ok(request)
}

/// Establish a TCP tunnel to `host:port` through an HTTP CONNECT proxy
async fn proxy_connect(proxy: &ProxyConfig, host: &str, port: u16) -> Result<TcpStream> {
    let mut stream = TcpStream::connect(&proxy.address)
        .await
        .map_err(|e| Error::NotConnected(format!("proxy connect failed: {e}")))?;

    let mut request = format!("CONNECT {host}:{port} HTTP/1.1\r\nHost: {host}:{port}\r\n");
    if let Some(credentials) = &proxy.authorization {
        let encoded = base64::engine::general_purpose::STANDARD.encode(credentials);
        request.push_str(&format!("Proxy-Authorization: Basic {encoded}\r\n"));
    }
    request.push_str("\r\n");

    stream
        .write_all(request.as_bytes())
        .await
        .map_err(|e| Error::NotConnected(format!("proxy handshake failed: {e}")))?;

    // Read the proxy's response headers; the tunnel starts after the blank line
    let mut response = Vec::new();
    let mut byte = [0u8; 1];
    while !response.ends_with(b"\r\n\r\n") {
        if response.len() > 8192 {
            return Err(Error::NotConnected("proxy response too large".into()));
        }
        let n = stream
            .read(&mut byte)
            .await
            .map_err(|e| Error::NotConnected(format!("proxy handshake failed: {e}")))?;
        if n == 0 {
            return Err(Error::NotConnected(
                "proxy closed the connection during handshake".into(),
            ));
        }
        response.push(byte[0]);
    }

    let status_line = String::from_utf8_lossy(&response);
    let status_line = status_line.lines().next().unwrap_or("");
    if !status_line.contains(" 200 ") && !status_line.ends_with(" 200") {
        return Err(Error::NotConnected(format!(
            "proxy refused tunnel: {status_line}"
        )));
    }

    Ok(stream)
}

/// Build a native-tls connector from the configured certificate material
fn build_tls_connector(tls: &TlsConfig) -> Result<native_tls::TlsConnector> {
    let mut builder = native_tls::TlsConnector::builder();

    for pem in &tls.trusted_certificates {
        let cert = native_tls::Certificate::from_pem(pem.as_bytes())
            .map_err(|e| Error::Connection(format!("invalid trusted certificate: {e}")))?;
        builder.add_root_certificate(cert);
    }

    if let Some(pkcs12) = &tls.identity_pkcs12 {
        let passphrase = tls.passphrase.as_deref().unwrap_or("");
        let identity = native_tls::Identity::from_pkcs12(pkcs12, passphrase)
            .map_err(|e| Error::Connection(format!("invalid pkcs12 identity: {e}")))?;
        builder.identity(identity);
    } else if let (Some(cert), Some(key)) = (&tls.certificate, &tls.key) {
        let identity = native_tls::Identity::from_pkcs8(cert.as_bytes(), key.as_bytes())
            .map_err(|e| Error::Connection(format!("invalid client identity: {e}")))?;
        builder.identity(identity);
    }

    builder
        .build()
        .map_err(|e| Error::Connection(format!("tls setup failed: {e}")))
}
