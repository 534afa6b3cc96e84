//! Connection builder
//!
//! Fluent configuration of a [`Connection`] before it is used. The endpoint
//! is the one mandatory piece and is taken by the constructor; everything
//! else has a working default (20 s request timeout, 60 s heartbeat, plateau
//! backoff, no proxy, no TLS material, no metrics).
//!
//! Building a connection does not open a socket. Call
//! [`Connection::connect`] when you are ready to go online.
//!
//! # Examples
//!
//! ```rust,no_run
//! use ledgerwire_client::{ConnectionBuilder, FixedDelay};
//! use std::time::Duration;
//!
//! # async fn example() -> ledgerwire_core::Result<()> {
//! let connection = ConnectionBuilder::new("wss://s1.ripple.com")
//!     .request_timeout(Duration::from_secs(5))
//!     .retry_policy(Box::new(FixedDelay::new(Duration::from_secs(1))))
//!     .build();
//! connection.connect().await?;
//! # Ok(())
//! # }
//! ```

use crate::config::{ConnectionConfig, ProxyConfig, TlsConfig};
use crate::metrics::ConnectionMetrics;
use crate::retry::{RetryPolicy, SteppedBackoff};
use crate::Connection;
use std::sync::Arc;
use std::time::Duration;

/// Builder for configuring and creating a [`Connection`]
pub struct ConnectionBuilder {
    config: ConnectionConfig,
    retry_policy: Box<dyn RetryPolicy>,
    metrics: Option<Arc<ConnectionMetrics>>,
}

impl ConnectionBuilder {
    /// Create a builder for the given WebSocket endpoint
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            config: ConnectionConfig::new(endpoint),
            retry_policy: Box::new(SteppedBackoff::default()),
            metrics: None,
        }
    }

    /// Set the default per-request timeout
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.config.request_timeout = timeout;
        self
    }

    /// Set the heartbeat ping interval
    pub fn heartbeat_interval(mut self, interval: Duration) -> Self {
        self.config.heartbeat_interval = Some(interval);
        self
    }

    /// Disable the heartbeat entirely
    pub fn without_heartbeat(mut self) -> Self {
        self.config.heartbeat_interval = None;
        self
    }

    /// Log every frame sent and received at debug level
    pub fn trace(mut self, trace: bool) -> Self {
        self.config.trace = trace;
        self
    }

    /// Send endpoint credentials as `user:password`, Basic-encoded in the
    /// `Authorization` header of the upgrade request
    pub fn authorization(mut self, credentials: impl Into<String>) -> Self {
        self.config.authorization = Some(credentials.into());
        self
    }

    /// Route the connection through an HTTP CONNECT proxy
    pub fn proxy(mut self, address: impl Into<String>) -> Self {
        self.config.proxy = Some(ProxyConfig {
            address: address.into(),
            authorization: self.config.proxy.and_then(|p| p.authorization),
        });
        self
    }

    /// Set proxy credentials as `user:password`
    pub fn proxy_authorization(mut self, credentials: impl Into<String>) -> Self {
        if let Some(proxy) = &mut self.config.proxy {
            proxy.authorization = Some(credentials.into());
        }
        self
    }

    /// Provide TLS client material for `wss://` endpoints
    pub fn tls(mut self, tls: TlsConfig) -> Self {
        self.config.tls = Some(tls);
        self
    }

    /// Replace the default plateau-backoff retry policy
    pub fn retry_policy(mut self, policy: Box<dyn RetryPolicy>) -> Self {
        self.retry_policy = policy;
        self
    }

    /// Record OpenTelemetry metrics under the given service name
    ///
    /// Instruments register against the global meter provider; install one
    /// via `ledgerwire_core::init_observability` for data to flow.
    pub fn with_metrics(mut self, service_name: impl Into<String>) -> Self {
        self.metrics = Some(Arc::new(ConnectionMetrics::new(service_name)));
        self
    }

    /// Build the connection (offline; call `connect()` to open it)
    pub fn build(self) -> Connection {
        Connection::new(self.config, self.retry_policy, self.metrics)
    }
}
