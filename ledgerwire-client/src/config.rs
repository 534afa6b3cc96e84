//! Connection configuration
//!
//! Plain data describing how to reach the node and how the session should
//! behave. Built through [`ConnectionBuilder`](crate::ConnectionBuilder)
//! rather than constructed directly.

use std::time::Duration;

/// Configuration for a [`Connection`](crate::Connection)
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// WebSocket endpoint of the node, e.g. `wss://s1.ripple.com`
    pub endpoint: String,
    /// Default timeout applied to each request unless overridden per call
    pub request_timeout: Duration,
    /// Interval between heartbeat pings; `None` disables the heartbeat
    pub heartbeat_interval: Option<Duration>,
    /// Log every inbound and outbound frame at debug level
    pub trace: bool,
    /// Credentials as `user:password`, sent Basic-encoded in the
    /// `Authorization` header of the upgrade request
    pub authorization: Option<String>,
    /// Route the TCP connection through an HTTP CONNECT proxy
    pub proxy: Option<ProxyConfig>,
    /// TLS material for `wss://` endpoints requiring client certificates
    /// or private trust roots
    pub tls: Option<TlsConfig>,
}

impl ConnectionConfig {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            request_timeout: Duration::from_secs(20),
            heartbeat_interval: Some(Duration::from_secs(60)),
            trace: false,
            authorization: None,
            proxy: None,
            tls: None,
        }
    }
}

/// HTTP CONNECT proxy settings
#[derive(Debug, Clone)]
pub struct ProxyConfig {
    /// Proxy address as `host:port`
    pub address: String,
    /// Credentials as `user:password`, sent Basic-encoded in
    /// `Proxy-Authorization`
    pub authorization: Option<String>,
}

/// TLS client material, all PEM-encoded unless noted
#[derive(Debug, Clone, Default)]
pub struct TlsConfig {
    /// Client certificate chain
    pub certificate: Option<String>,
    /// Private key matching `certificate`
    pub key: Option<String>,
    /// Passphrase for the PKCS#12 archive
    pub passphrase: Option<String>,
    /// DER-encoded PKCS#12 archive; takes precedence over
    /// `certificate`/`key` when set
    pub identity_pkcs12: Option<Vec<u8>>,
    /// Additional trusted root certificates
    pub trusted_certificates: Vec<String>,
}
