//! Connector Port (Driven Port)
//!
//! Interface for venue adapters that turn a streaming connection into
//! normalized ticks and expose order placement back to handlers.

use std::sync::Arc;

use async_trait::async_trait;

use crate::domain::market::Tick;
use crate::domain::order::OrderRequest;

use super::order_port::OrderError;

/// Connector error.
#[derive(Debug, thiserror::Error)]
pub enum ConnectorError {
    /// Initial connection could not be established.
    #[error("connection failed: {0}")]
    Connection(String),

    /// Streaming could not be started.
    #[error("stream error: {0}")]
    Stream(String),
}

/// Receiver of normalized ticks.
///
/// Called once per tick, in the order the connector received them. The
/// connector awaits each call before reading the next message.
#[async_trait]
pub trait TickSink: Send + Sync {
    /// Handle one tick.
    async fn on_tick(&self, tick: Tick);
}

/// Port for a venue connector.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Market (venue) name stamped on every tick.
    fn market(&self) -> &str;

    /// Open the streaming connection.
    async fn connect(&self) -> Result<(), ConnectorError>;

    /// Start delivering ticks to `sink`.
    async fn stream_market_data(&self, sink: Arc<dyn TickSink>) -> Result<(), ConnectorError>;

    /// Place an order on this venue.
    async fn place_order(&self, order: OrderRequest) -> Result<(), OrderError>;

    /// Stop streaming and close the connection.
    async fn stop(&self) -> Result<(), ConnectorError>;
}
