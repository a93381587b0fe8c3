//! Prometheus Metrics Module
//!
//! Exposes engine metrics in Prometheus format.
//!
//! # Metrics Categories
//!
//! - **Ticks**: Ticks received and parse failures per market
//! - **Connections**: Streaming connection state and reconnects by reason
//! - **Dispatch**: Handler failures and dispatch latency per market
//! - **Store**: Durable tier write failures
//! - **Orders**: Orders placed by outcome
//!
//! # Integration
//!
//! Metrics are served at `/metrics` on the configured port. When no port is
//! configured no recorder is installed and every helper is a no-op.

use std::net::SocketAddr;
use std::sync::OnceLock;
use std::time::Duration;

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

// =============================================================================
// Recorder Installation
// =============================================================================

static INSTALLED: OnceLock<SocketAddr> = OnceLock::new();

/// Metrics initialization error.
#[derive(Debug, thiserror::Error)]
pub enum MetricsError {
    /// The Prometheus exporter could not be installed.
    #[error("failed to install Prometheus exporter: {0}")]
    Install(#[from] BuildError),
}

/// Install the Prometheus recorder with an HTTP listener on `port`.
///
/// Returns the listen address, or `None` when `port` is 0. Calling this
/// again after a successful install returns the first address.
///
/// # Errors
///
/// Returns an error if the exporter cannot be installed.
pub fn init_metrics(port: u16) -> Result<Option<SocketAddr>, MetricsError> {
    if let Some(addr) = INSTALLED.get() {
        return Ok(Some(*addr));
    }
    if port == 0 {
        return Ok(None);
    }

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    register_metrics();

    Ok(Some(*INSTALLED.get_or_init(|| addr)))
}

// =============================================================================
// Metric Registration
// =============================================================================

fn register_metrics() {
    describe_counter!(
        "tick_engine_ticks_received_total",
        "Total ticks parsed from venue streams"
    );
    describe_counter!(
        "tick_engine_parse_errors_total",
        "Total inbound messages dropped because they could not be parsed"
    );

    describe_gauge!(
        "tick_engine_connection_state",
        "Streaming connection state (0 disconnected, 1 connecting, 2 connected, 3 reconnecting, 4 closed)"
    );
    describe_counter!(
        "tick_engine_reconnects_total",
        "Total streaming reconnects by reason"
    );
    describe_counter!(
        "tick_engine_reconnect_failures_total",
        "Total reconnect attempts that failed"
    );

    describe_counter!(
        "tick_engine_durable_write_failures_total",
        "Total ticks the durable tier failed to persist"
    );

    describe_counter!(
        "tick_engine_handler_errors_total",
        "Total handler invocations that returned an error"
    );
    describe_histogram!(
        "tick_engine_dispatch_seconds",
        "Time to compute signals and run handlers for one tick"
    );

    describe_counter!(
        "tick_engine_orders_total",
        "Total orders submitted by outcome"
    );
}

// =============================================================================
// Metric Recording Functions
// =============================================================================

/// Why a streaming connection was replaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconnectReason {
    /// Reading from the transport failed or the peer closed it.
    ReadFailure,
    /// No pong arrived within the pong timeout.
    PongTimeout,
    /// Sending a keepalive ping failed.
    PingFailure,
    /// The connection reached its maximum age.
    LifetimeExpired,
}

impl ReconnectReason {
    /// Label value.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ReadFailure => "read_failure",
            Self::PongTimeout => "pong_timeout",
            Self::PingFailure => "ping_failure",
            Self::LifetimeExpired => "lifetime_expired",
        }
    }
}

/// Outcome of an order submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderOutcome {
    /// The venue accepted the order.
    Accepted,
    /// The venue or transport rejected the order.
    Failed,
}

impl OrderOutcome {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Accepted => "accepted",
            Self::Failed => "failed",
        }
    }
}

/// Record a tick parsed from a venue stream.
pub fn record_tick_received(market: &str) {
    counter!(
        "tick_engine_ticks_received_total",
        "market" => market.to_string()
    )
    .increment(1);
}

/// Record an inbound message dropped by the parser.
pub fn record_parse_error(market: &str, kind: &'static str) {
    counter!(
        "tick_engine_parse_errors_total",
        "market" => market.to_string(),
        "kind" => kind
    )
    .increment(1);
}

/// Update the connection state gauge for a stream.
pub fn set_connection_state(stream: &str, state: f64) {
    gauge!(
        "tick_engine_connection_state",
        "stream" => stream.to_string()
    )
    .set(state);
}

/// Record a reconnect attempt.
pub fn record_reconnect(stream: &str, reason: ReconnectReason) {
    counter!(
        "tick_engine_reconnects_total",
        "stream" => stream.to_string(),
        "reason" => reason.as_str()
    )
    .increment(1);
}

/// Record a failed reconnect attempt.
pub fn record_reconnect_failure(stream: &str) {
    counter!(
        "tick_engine_reconnect_failures_total",
        "stream" => stream.to_string()
    )
    .increment(1);
}

/// Record a durable tier write failure.
pub fn record_durable_write_failure(market: &str) {
    counter!(
        "tick_engine_durable_write_failures_total",
        "market" => market.to_string()
    )
    .increment(1);
}

/// Record a handler error.
pub fn record_handler_error(market: &str, handler: &str) {
    counter!(
        "tick_engine_handler_errors_total",
        "market" => market.to_string(),
        "handler" => handler.to_string()
    )
    .increment(1);
}

/// Record how long one tick took to dispatch.
pub fn record_dispatch_duration(market: &str, duration: Duration) {
    histogram!(
        "tick_engine_dispatch_seconds",
        "market" => market.to_string()
    )
    .record(duration.as_secs_f64());
}

/// Record an order submission.
pub fn record_order(market: &str, outcome: OrderOutcome) {
    counter!(
        "tick_engine_orders_total",
        "market" => market.to_string(),
        "outcome" => outcome.as_str()
    )
    .increment(1);
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reconnect_reason_as_str() {
        assert_eq!(ReconnectReason::ReadFailure.as_str(), "read_failure");
        assert_eq!(ReconnectReason::PongTimeout.as_str(), "pong_timeout");
        assert_eq!(ReconnectReason::PingFailure.as_str(), "ping_failure");
        assert_eq!(ReconnectReason::LifetimeExpired.as_str(), "lifetime_expired");
    }

    #[test]
    fn order_outcome_as_str() {
        assert_eq!(OrderOutcome::Accepted.as_str(), "accepted");
        assert_eq!(OrderOutcome::Failed.as_str(), "failed");
    }

    #[test]
    fn disabled_port_installs_nothing() {
        assert_eq!(init_metrics(0).unwrap(), None);
    }

    #[test]
    fn helpers_are_noops_without_recorder() {
        record_tick_received("X");
        record_reconnect("X", ReconnectReason::LifetimeExpired);
        record_dispatch_duration("X", Duration::from_millis(1));
    }
}
