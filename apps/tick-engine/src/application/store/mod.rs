//! Tiered Store
//!
//! Per-key ring buffers form the fast tier; a [`DurableStore`] holds full
//! history. Writes go to both tiers. Reads are routed by period: at or below
//! the threshold only the fast tier is read, above it only the durable tier.
//!
//! # Concurrency
//!
//! The key map lock is held only to look up or create a key's buffer. Each
//! buffer has its own mutex, so ticks for unrelated keys never contend, and
//! no lock is held across an `.await`.

use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

use crate::application::ports::{DurableStore, StoreError};
use crate::domain::market::{MarketKey, Tick};
use crate::domain::ring_buffer::RingBuffer;

type PriceBuffer = Arc<Mutex<RingBuffer<f64>>>;

/// Dual-tier price history store.
pub struct TieredStore {
    fast: RwLock<HashMap<MarketKey, PriceBuffer>>,
    durable: Arc<dyn DurableStore>,
    buffer_size: NonZeroUsize,
    threshold: usize,
}

impl TieredStore {
    /// Create a store.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidConfig`] if `buffer_size` is zero or
    /// `threshold` exceeds `buffer_size`.
    pub fn new(
        durable: Arc<dyn DurableStore>,
        buffer_size: usize,
        threshold: usize,
    ) -> Result<Self, StoreError> {
        let buffer_size = NonZeroUsize::new(buffer_size)
            .ok_or_else(|| StoreError::InvalidConfig("buffer size must be non-zero".into()))?;
        if threshold > buffer_size.get() {
            return Err(StoreError::InvalidConfig(format!(
                "threshold {threshold} exceeds buffer size {buffer_size}"
            )));
        }

        Ok(Self {
            fast: RwLock::new(HashMap::new()),
            durable,
            buffer_size,
            threshold,
        })
    }

    /// Fast tier capacity per key.
    #[must_use]
    pub const fn buffer_size(&self) -> usize {
        self.buffer_size.get()
    }

    /// Largest period served from the fast tier.
    #[must_use]
    pub const fn threshold(&self) -> usize {
        self.threshold
    }

    /// Record a tick in both tiers.
    ///
    /// The fast tier is written first and is not rolled back if the durable
    /// write fails.
    ///
    /// # Errors
    ///
    /// Returns the durable tier's error.
    pub async fn record_tick(&self, key: &MarketKey, tick: &Tick) -> Result<(), StoreError> {
        self.buffer_for(key).lock().insert(tick.price());
        self.durable.record_tick(key, tick).await
    }

    /// Return up to `period` most recent prices for `key`, oldest first.
    ///
    /// # Errors
    ///
    /// Returns the durable tier's error when `period` exceeds the threshold.
    pub async fn query_price_history(
        &self,
        key: &MarketKey,
        period: usize,
    ) -> Result<Vec<f64>, StoreError> {
        if period <= self.threshold {
            return Ok(self.read_fast(key, period));
        }
        self.durable.query_price_history(key, period).await
    }

    /// Number of keys with a fast tier buffer.
    #[must_use]
    pub fn key_count(&self) -> usize {
        self.fast.read().len()
    }

    fn read_fast(&self, key: &MarketKey, period: usize) -> Vec<f64> {
        let buffer = self.fast.read().get(key).cloned();
        buffer.map_or_else(Vec::new, |buffer| buffer.lock().read_last(period))
    }

    fn buffer_for(&self, key: &MarketKey) -> PriceBuffer {
        if let Some(buffer) = self.fast.read().get(key) {
            return Arc::clone(buffer);
        }
        let mut fast = self.fast.write();
        Arc::clone(
            fast.entry(key.clone())
                .or_insert_with(|| Arc::new(Mutex::new(RingBuffer::new(self.buffer_size)))),
        )
    }
}

impl std::fmt::Debug for TieredStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TieredStore")
            .field("buffer_size", &self.buffer_size)
            .field("threshold", &self.threshold)
            .field("keys", &self.key_count())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::ports::MockDurableStore;

    fn key() -> MarketKey {
        MarketKey::new("X", "BTC/USDT")
    }

    fn tick(price: f64) -> Tick {
        Tick::new("X", "BTC/USDT", price, 1.0)
    }

    fn accepting_durable() -> MockDurableStore {
        let mut durable = MockDurableStore::new();
        durable.expect_record_tick().returning(|_, _| Ok(()));
        durable
    }

    #[test]
    fn rejects_zero_buffer() {
        let result = TieredStore::new(Arc::new(MockDurableStore::new()), 0, 0);
        assert!(matches!(result, Err(StoreError::InvalidConfig(_))));
    }

    #[test]
    fn rejects_threshold_above_buffer() {
        let result = TieredStore::new(Arc::new(MockDurableStore::new()), 10, 11);
        assert!(matches!(result, Err(StoreError::InvalidConfig(_))));
    }

    #[tokio::test]
    async fn reads_at_threshold_use_fast_tier_only() {
        let mut durable = accepting_durable();
        durable.expect_query_price_history().times(0);
        let store = TieredStore::new(Arc::new(durable), 5, 3).unwrap();

        for price in [1.0, 2.0, 3.0, 4.0] {
            store.record_tick(&key(), &tick(price)).await.unwrap();
        }

        let history = store.query_price_history(&key(), 3).await.unwrap();
        assert_eq!(history, vec![2.0, 3.0, 4.0]);
    }

    #[tokio::test]
    async fn reads_above_threshold_use_durable_tier_only() {
        let mut durable = MockDurableStore::new();
        durable
            .expect_query_price_history()
            .withf(|k, period| k == &key() && *period == 4)
            .times(1)
            .returning(|_, _| Ok(vec![7.0, 8.0, 9.0, 10.0]));
        let store = TieredStore::new(Arc::new(durable), 5, 3).unwrap();

        let history = store.query_price_history(&key(), 4).await.unwrap();
        assert_eq!(history, vec![7.0, 8.0, 9.0, 10.0]);
        assert_eq!(store.key_count(), 0);
    }

    #[tokio::test]
    async fn unknown_key_reads_empty_from_fast_tier() {
        let store = TieredStore::new(Arc::new(MockDurableStore::new()), 5, 3).unwrap();
        assert!(store.query_price_history(&key(), 2).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn durable_failure_keeps_fast_write() {
        let mut durable = MockDurableStore::new();
        durable
            .expect_record_tick()
            .times(1)
            .returning(|_, _| Err(StoreError::Durable("disk full".into())));
        let store = TieredStore::new(Arc::new(durable), 5, 5).unwrap();

        let result = store.record_tick(&key(), &tick(42.0)).await;
        assert!(matches!(result, Err(StoreError::Durable(_))));
        assert_eq!(store.query_price_history(&key(), 1).await.unwrap(), vec![42.0]);
    }

    #[tokio::test]
    async fn keys_are_isolated() {
        let store = TieredStore::new(Arc::new(accepting_durable()), 5, 5).unwrap();
        let other = MarketKey::new("Y", "BTC/USDT");

        store.record_tick(&key(), &tick(1.0)).await.unwrap();
        store
            .record_tick(&other, &Tick::new("Y", "BTC/USDT", 2.0, 1.0))
            .await
            .unwrap();

        assert_eq!(store.query_price_history(&key(), 5).await.unwrap(), vec![1.0]);
        assert_eq!(store.query_price_history(&other, 5).await.unwrap(), vec![2.0]);
        assert_eq!(store.key_count(), 2);
    }
}
