//! In-memory durable tier.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;

use super::tail;
use crate::application::ports::{DurableStore, StoreError};
use crate::domain::market::{MarketKey, Tick};

/// Unbounded in-memory price history.
///
/// Lives as long as the process. Suitable for tests and dry runs.
#[derive(Debug, Default)]
pub struct InMemoryDurableStore {
    prices: RwLock<HashMap<MarketKey, Vec<f64>>>,
}

impl InMemoryDurableStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of prices recorded for a key.
    #[must_use]
    pub fn len(&self, key: &MarketKey) -> usize {
        self.prices.read().get(key).map_or(0, Vec::len)
    }

    /// Whether nothing has been recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.prices.read().is_empty()
    }
}

#[async_trait]
impl DurableStore for InMemoryDurableStore {
    async fn record_tick(&self, key: &MarketKey, tick: &Tick) -> Result<(), StoreError> {
        self.prices
            .write()
            .entry(key.clone())
            .or_default()
            .push(tick.price());
        Ok(())
    }

    async fn query_price_history(
        &self,
        key: &MarketKey,
        period: usize,
    ) -> Result<Vec<f64>, StoreError> {
        Ok(self
            .prices
            .read()
            .get(key)
            .map_or_else(Vec::new, |prices| tail(prices, period)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn returns_most_recent_period_in_order() {
        let store = InMemoryDurableStore::new();
        let key = MarketKey::new("X", "BTC/USDT");
        for price in [1.0, 2.0, 3.0, 4.0, 5.0] {
            store
                .record_tick(&key, &Tick::new("X", "BTC/USDT", price, 1.0))
                .await
                .unwrap();
        }

        assert_eq!(
            store.query_price_history(&key, 3).await.unwrap(),
            vec![3.0, 4.0, 5.0]
        );
        assert_eq!(store.query_price_history(&key, 50).await.unwrap().len(), 5);
        assert_eq!(store.len(&key), 5);
    }

    #[tokio::test]
    async fn unknown_key_is_empty() {
        let store = InMemoryDurableStore::new();
        assert!(store.is_empty());
        assert!(
            store
                .query_price_history(&MarketKey::new("X", "P"), 10)
                .await
                .unwrap()
                .is_empty()
        );
    }
}
