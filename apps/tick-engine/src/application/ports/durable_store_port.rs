//! Durable Store Port (Driven Port)
//!
//! Interface for the persistent tier that holds full tick history.

use async_trait::async_trait;

use crate::domain::market::{MarketKey, Tick};

/// Store error.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The durable tier failed to persist or read.
    #[error("durable store error: {0}")]
    Durable(String),

    /// Store configuration is invalid.
    #[error("invalid store configuration: {0}")]
    InvalidConfig(String),

    /// I/O error from a file-backed tier.
    #[error("store I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Record (de)serialization failed.
    #[error("store serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Port for the durable (unbounded) history tier.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DurableStore: Send + Sync {
    /// Persist a tick.
    async fn record_tick(&self, key: &MarketKey, tick: &Tick) -> Result<(), StoreError>;

    /// Return up to `period` most recent prices for a key, oldest first.
    async fn query_price_history(
        &self,
        key: &MarketKey,
        period: usize,
    ) -> Result<Vec<f64>, StoreError>;
}
