//! Connection metrics definitions
//!
//! OpenTelemetry instruments for monitoring connection health. Instruments
//! are registered against the global meter provider, so telemetry flows only
//! when `init_observability` installed one.
//!
//! # Metrics Collected
//!
//! - **session_state**: Current session state (gauge)
//! - **requests_total**: Requests sent, by command and outcome (counter)
//! - **request_duration**: Request latency distribution (histogram)
//! - **errors_total**: Out-of-band errors, by kind (counter)
//! - **reconnect_attempts** / **reconnect_success**: Reconnection counters
//! - **pushes_total**: Stream messages received, by type (counter)
//! - **validated_ledger**: Index of the latest closed ledger (gauge)
//!
//! Recorded automatically when the connection is built with
//! `ConnectionBuilder::with_metrics()`.

use opentelemetry::{
    global,
    metrics::{Counter, Gauge, Histogram, Meter},
    KeyValue,
};

/// Connection metrics for monitoring
pub struct ConnectionMetrics {
    /// Session state (0=disconnected, 1=opening, 2=subscribing, 3=ready,
    /// 4=closing, 5=retrying)
    pub session_state: Gauge<i64>,
    /// Total number of requests sent
    pub requests_total: Counter<u64>,
    /// Request duration in seconds
    pub request_duration: Histogram<f64>,
    /// Total number of out-of-band errors
    pub errors_total: Counter<u64>,
    /// Total number of reconnection attempts
    pub reconnect_attempts: Counter<u64>,
    /// Total number of successful reconnections
    pub reconnect_success: Counter<u64>,
    /// Total number of stream pushes received
    pub pushes_total: Counter<u64>,
    /// Latest validated ledger index reported by the node
    pub validated_ledger: Gauge<u64>,
}

impl ConnectionMetrics {
    pub fn new(service_name: impl Into<String>) -> Self {
        let name: &'static str = Box::leak(service_name.into().into_boxed_str());
        let meter = global::meter(name);
        Self::new_with_meter(&meter)
    }

    pub fn new_with_meter(meter: &Meter) -> Self {
        Self {
            session_state: meter
                .i64_gauge("ledgerwire.session.state")
                .with_description("Session state (0=disconnected, 1=opening, 2=subscribing, 3=ready, 4=closing, 5=retrying)")
                .build(),
            requests_total: meter
                .u64_counter("ledgerwire.requests.total")
                .with_description("Total number of requests sent")
                .build(),
            request_duration: meter
                .f64_histogram("ledgerwire.request.duration")
                .with_description("Request duration in seconds")
                .build(),
            errors_total: meter
                .u64_counter("ledgerwire.errors.total")
                .with_description("Total number of out-of-band errors")
                .build(),
            reconnect_attempts: meter
                .u64_counter("ledgerwire.reconnect.attempts")
                .with_description("Total number of reconnection attempts")
                .build(),
            reconnect_success: meter
                .u64_counter("ledgerwire.reconnect.success")
                .with_description("Total number of successful reconnections")
                .build(),
            pushes_total: meter
                .u64_counter("ledgerwire.pushes.total")
                .with_description("Total number of stream messages received")
                .build(),
            validated_ledger: meter
                .u64_gauge("ledgerwire.ledger.validated")
                .with_description("Latest validated ledger index reported by the node")
                .build(),
        }
    }

    pub fn update_session_state(&self, state: i64) {
        self.session_state.record(state, &[]);
    }

    pub fn record_request(&self, command: &str, status: &str, duration_secs: f64) {
        let attributes = &[
            KeyValue::new("command", command.to_string()),
            KeyValue::new("status", status.to_string()),
        ];
        self.requests_total.add(1, attributes);
        self.request_duration.record(duration_secs, attributes);
    }

    pub fn record_error(&self, kind: &str) {
        let attributes = &[KeyValue::new("kind", kind.to_string())];
        self.errors_total.add(1, attributes);
    }

    pub fn record_reconnect_attempt(&self) {
        self.reconnect_attempts.add(1, &[]);
    }

    pub fn record_reconnect_success(&self) {
        self.reconnect_success.add(1, &[]);
    }

    pub fn record_push(&self, event_type: &str) {
        let attributes = &[KeyValue::new("event_type", event_type.to_string())];
        self.pushes_total.add(1, attributes);
    }

    pub fn record_ledger_close(&self, ledger_index: u32) {
        self.validated_ledger.record(ledger_index as u64, &[]);
    }
}
