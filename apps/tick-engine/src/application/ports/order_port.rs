//! Order Port (Driven Port)
//!
//! Interface handlers use to place orders on the venue a tick came from.

use async_trait::async_trait;

use crate::domain::order::OrderRequest;

/// Order placement error.
#[derive(Debug, Clone, thiserror::Error)]
pub enum OrderError {
    /// The order could not be shaped into a venue request.
    #[error("failed to format order: {0}")]
    Format(String),

    /// The request could not be signed.
    #[error("failed to sign order: {0}")]
    Signing(String),

    /// The request never reached the venue.
    #[error("order transport error: {0}")]
    Transport(String),

    /// The venue answered with a non-success status.
    #[error("order rejected with status {status}: {body}")]
    Rejected {
        /// HTTP status code.
        status: u16,
        /// Response body.
        body: String,
    },

    /// Order placement is switched off for this connector.
    #[error("order placement disabled")]
    Disabled,
}

/// Port for placing orders.
#[async_trait]
pub trait OrderPlacer: Send + Sync {
    /// Place an order.
    async fn place_order(&self, order: OrderRequest) -> Result<(), OrderError>;
}
