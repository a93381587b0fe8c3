//! Streaming connection plumbing.
//!
//! - `client`: reconnecting connection state machine
//! - `transport`: frame-level dialer abstraction and the WebSocket dialer
//! - `heartbeat`: ping/pong liveness tracking
//! - `backoff`: delay between failed reconnects
//! - `rate_limit`: inbound delivery gate

pub mod backoff;
pub mod client;
pub mod heartbeat;
pub mod rate_limit;
pub mod transport;

pub use backoff::BackoffConfig;
pub use client::{ConnectionState, MessageHandler, StreamClientError, StreamConfig, StreamingClient};
pub use heartbeat::HeartbeatConfig;
pub use transport::{Dialer, Frame, TransportError, WebSocketDialer};
