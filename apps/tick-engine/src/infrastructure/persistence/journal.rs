//! Journal Durable Tier
//!
//! Every tick is appended to a JSON-lines file as `{"key": .., "tick": ..}`.
//! Opening the journal replays the file to rebuild a per-key price index,
//! which serves history queries without touching disk.
//!
//! A torn final line (crash mid-write) is skipped on replay.
//!
//! The index keeps every recorded price in memory for the life of the
//! process, so resident size grows with journal length. Rotate or truncate
//! the file between runs when that matters.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tokio::fs::{self, File, OpenOptions};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::Mutex;

use super::tail;
use crate::application::ports::{DurableStore, StoreError};
use crate::domain::market::{MarketKey, Tick};

#[derive(Serialize)]
struct EntryRef<'a> {
    key: &'a MarketKey,
    tick: &'a Tick,
}

#[derive(Deserialize)]
struct Entry {
    key: MarketKey,
    tick: Tick,
}

/// Append-only file journal.
#[derive(Debug)]
pub struct JournalDurableStore {
    path: PathBuf,
    file: Mutex<File>,
    index: RwLock<HashMap<MarketKey, Vec<f64>>>,
}

impl JournalDurableStore {
    /// Open (or create) the journal at `path` and rebuild its index.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Io`] if the file cannot be read or opened.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).await?;
        }

        let index = Self::replay(&path).await?;
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await?;

        tracing::info!(
            path = %path.display(),
            keys = index.len(),
            ticks = index.values().map(Vec::len).sum::<usize>(),
            "Journal opened"
        );

        Ok(Self {
            path,
            file: Mutex::new(file),
            index: RwLock::new(index),
        })
    }

    async fn replay(path: &Path) -> Result<HashMap<MarketKey, Vec<f64>>, StoreError> {
        let mut index: HashMap<MarketKey, Vec<f64>> = HashMap::new();
        let file = match File::open(path).await {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(index),
            Err(e) => return Err(e.into()),
        };

        let mut lines = BufReader::new(file).lines();
        let mut line_number = 0_usize;
        while let Some(line) = lines.next_line().await? {
            line_number += 1;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<Entry>(&line) {
                Ok(entry) => index.entry(entry.key).or_default().push(entry.tick.price()),
                Err(e) => {
                    tracing::warn!(
                        path = %path.display(),
                        line = line_number,
                        error = %e,
                        "Skipping unreadable journal line"
                    );
                }
            }
        }

        Ok(index)
    }

    /// Journal file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of prices indexed for a key.
    #[must_use]
    pub fn len(&self, key: &MarketKey) -> usize {
        self.index.read().get(key).map_or(0, Vec::len)
    }

    /// Whether the journal holds no ticks.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.index.read().is_empty()
    }
}

#[async_trait]
impl DurableStore for JournalDurableStore {
    async fn record_tick(&self, key: &MarketKey, tick: &Tick) -> Result<(), StoreError> {
        let mut line = serde_json::to_vec(&EntryRef { key, tick })?;
        line.push(b'\n');

        // Index under the file lock so in-memory order matches file order.
        let mut file = self.file.lock().await;
        file.write_all(&line).await?;
        file.flush().await?;
        self.index
            .write()
            .entry(key.clone())
            .or_default()
            .push(tick.price());
        drop(file);
        Ok(())
    }

    async fn query_price_history(
        &self,
        key: &MarketKey,
        period: usize,
    ) -> Result<Vec<f64>, StoreError> {
        Ok(self
            .index
            .read()
            .get(key)
            .map_or_else(Vec::new, |prices| tail(prices, period)))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    fn key() -> MarketKey {
        MarketKey::new("Binance", "BTCUSDT")
    }

    async fn record(store: &JournalDurableStore, price: f64) {
        tokio_test::assert_ok!(
            store
                .record_tick(&key(), &Tick::new("Binance", "BTCUSDT", price, 1.0))
                .await
        );
    }

    #[tokio::test]
    async fn history_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ticks.jsonl");

        {
            let store = JournalDurableStore::open(&path).await.unwrap();
            for price in [10.0, 11.0, 12.0] {
                record(&store, price).await;
            }
        }

        let reopened = JournalDurableStore::open(&path).await.unwrap();
        assert_eq!(reopened.len(&key()), 3);
        assert_eq!(
            reopened.query_price_history(&key(), 2).await.unwrap(),
            vec![11.0, 12.0]
        );

        record(&reopened, 13.0).await;
        assert_eq!(
            reopened.query_price_history(&key(), 10).await.unwrap(),
            vec![10.0, 11.0, 12.0, 13.0]
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_writers_keep_index_in_file_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ticks.jsonl");
        let store = Arc::new(JournalDurableStore::open(&path).await.unwrap());

        let writers: Vec<_> = (1..=64_u32)
            .map(|i| {
                let store = Arc::clone(&store);
                tokio::spawn(async move { record(&store, f64::from(i)).await })
            })
            .collect();
        for writer in writers {
            writer.await.unwrap();
        }

        let live = store.query_price_history(&key(), 100).await.unwrap();
        let replayed = JournalDurableStore::open(&path)
            .await
            .unwrap()
            .query_price_history(&key(), 100)
            .await
            .unwrap();
        assert_eq!(live.len(), 64);
        assert_eq!(live, replayed);
    }

    #[tokio::test]
    async fn creates_missing_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/deeper/ticks.jsonl");

        let store = JournalDurableStore::open(&path).await.unwrap();
        record(&store, 1.0).await;

        assert!(store.path().exists());
        assert!(!store.is_empty());
    }

    #[tokio::test]
    async fn torn_line_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ticks.jsonl");

        {
            let store = JournalDurableStore::open(&path).await.unwrap();
            record(&store, 5.0).await;
        }
        let mut file = OpenOptions::new().append(true).open(&path).await.unwrap();
        file.write_all(br#"{"key":{"market":"Binance","#).await.unwrap();
        file.flush().await.unwrap();
        drop(file);

        let store = JournalDurableStore::open(&path).await.unwrap();
        assert_eq!(store.query_price_history(&key(), 5).await.unwrap(), vec![5.0]);
    }

    #[tokio::test]
    async fn keys_are_separate() {
        let dir = tempfile::tempdir().unwrap();
        let store = JournalDurableStore::open(dir.path().join("ticks.jsonl"))
            .await
            .unwrap();
        let other = MarketKey::new("Local", "BTCUSDT");

        record(&store, 1.0).await;
        store
            .record_tick(&other, &Tick::new("Local", "BTCUSDT", 2.0, 1.0))
            .await
            .unwrap();

        assert_eq!(store.query_price_history(&key(), 5).await.unwrap(), vec![1.0]);
        assert_eq!(store.query_price_history(&other, 5).await.unwrap(), vec![2.0]);
    }
}
