//! Market Data Types
//!
//! The normalized tick produced by every connector and the composite key
//! used to address per-market state across the store, the dispatch
//! registry and the durable tier.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// =============================================================================
// Market Key
// =============================================================================

/// Composite `market:trading_pair` key.
///
/// Every component keys its per-market state by this type so that the key
/// is composed in exactly one place.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MarketKey {
    market: String,
    trading_pair: String,
}

impl MarketKey {
    /// Create a key for a market (venue) and trading pair.
    #[must_use]
    pub fn new(market: impl Into<String>, trading_pair: impl Into<String>) -> Self {
        Self {
            market: market.into(),
            trading_pair: trading_pair.into(),
        }
    }

    /// Market (venue) name.
    #[must_use]
    pub fn market(&self) -> &str {
        &self.market
    }

    /// Trading pair symbol.
    #[must_use]
    pub fn trading_pair(&self) -> &str {
        &self.trading_pair
    }
}

impl fmt::Display for MarketKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.market, self.trading_pair)
    }
}

// =============================================================================
// Tick
// =============================================================================

/// One normalized price/volume observation for a trading pair.
///
/// Built by a connector from raw venue bytes and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tick {
    market: String,
    trading_pair: String,
    price: f64,
    volume: f64,
    received_at: DateTime<Utc>,
}

impl Tick {
    /// Create a tick stamped with the current time.
    #[must_use]
    pub fn new(
        market: impl Into<String>,
        trading_pair: impl Into<String>,
        price: f64,
        volume: f64,
    ) -> Self {
        Self::with_timestamp(market, trading_pair, price, volume, Utc::now())
    }

    /// Create a tick with an explicit receive timestamp.
    #[must_use]
    pub fn with_timestamp(
        market: impl Into<String>,
        trading_pair: impl Into<String>,
        price: f64,
        volume: f64,
        received_at: DateTime<Utc>,
    ) -> Self {
        Self {
            market: market.into(),
            trading_pair: trading_pair.into(),
            price,
            volume,
            received_at,
        }
    }

    /// Market (venue) that produced the tick.
    #[must_use]
    pub fn market(&self) -> &str {
        &self.market
    }

    /// Trading pair symbol.
    #[must_use]
    pub fn trading_pair(&self) -> &str {
        &self.trading_pair
    }

    /// Last traded price.
    #[must_use]
    pub const fn price(&self) -> f64 {
        self.price
    }

    /// Traded volume.
    #[must_use]
    pub const fn volume(&self) -> f64 {
        self.volume
    }

    /// When the connector received the tick.
    #[must_use]
    pub const fn received_at(&self) -> DateTime<Utc> {
        self.received_at
    }

    /// Composite key for this tick.
    #[must_use]
    pub fn key(&self) -> MarketKey {
        MarketKey::new(self.market.clone(), self.trading_pair.clone())
    }
}
