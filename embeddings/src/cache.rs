//! Bounded LRU caches for embeddings and formatted query results.

use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};

use lru::LruCache;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::debug;

use crate::Embedding;

/// Cache of embeddings keyed by [`crate::cache_key`].
pub type EmbeddingCache = BoundedCache<Embedding>;

/// A capped, least-recently-used cache with string keys.
///
/// Reads and writes both move the entry to the most-recently-used position.
/// Once `max_entries` is exceeded the least-recently-used entry is dropped.
/// The lock is only held for the map operation itself, never across I/O.
pub struct BoundedCache<V> {
    entries: Mutex<LruCache<String, V>>,
    max_entries: usize,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl<V: Clone> BoundedCache<V> {
    /// Create a new cache. A capacity of zero is treated as one.
    pub fn new(max_entries: usize) -> Self {
        let capacity = NonZeroUsize::new(max_entries).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
            max_entries: capacity.get(),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Look up `key`, refreshing its recency on a hit.
    pub async fn get(&self, key: &str) -> Option<V> {
        let value = self.entries.lock().await.get(key).cloned();
        self.record(value.is_some());
        value
    }

    /// Look up several keys under a single lock, preserving order.
    pub async fn get_many(&self, keys: &[String]) -> Vec<Option<V>> {
        let mut entries = self.entries.lock().await;
        keys.iter()
            .map(|key| {
                let value = entries.get(key.as_str()).cloned();
                self.record(value.is_some());
                value
            })
            .collect()
    }

    /// Insert or refresh `key`, evicting the least-recently-used entry when full.
    pub async fn put(&self, key: String, value: V) {
        let mut entries = self.entries.lock().await;
        insert(&mut entries, key, value);
    }

    /// Insert several entries in order.
    pub async fn put_many(&self, items: impl IntoIterator<Item = (String, V)>) {
        let mut entries = self.entries.lock().await;
        for (key, value) in items {
            insert(&mut entries, key, value);
        }
    }

    /// Check for `key` without touching its recency.
    pub async fn contains(&self, key: &str) -> bool {
        self.entries.lock().await.contains(key)
    }

    /// Number of cached entries.
    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    /// Whether the cache holds no entries.
    pub async fn is_empty(&self) -> bool {
        self.entries.lock().await.is_empty()
    }

    /// Drop every entry.
    pub async fn clear(&self) {
        self.entries.lock().await.clear();
    }

    /// Get cache statistics.
    pub async fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.len().await,
            max_entries: self.max_entries,
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }

    fn record(&self, hit: bool) {
        let counter = if hit { &self.hits } else { &self.misses };
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

fn insert<V>(entries: &mut LruCache<String, V>, key: String, value: V) {
    // `push` also hands back the previous value when the key already existed.
    if let Some((evicted, _)) = entries.push(key.clone(), value) {
        if evicted != key {
            debug!("Evicted least recently used cache entry {evicted}");
        }
    }
}

/// Statistics about a cache.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStats {
    /// Number of entries in cache.
    pub entries: usize,

    /// Maximum cache size.
    pub max_entries: usize,

    /// Lookups that found an entry.
    pub hits: u64,

    /// Lookups that did not.
    pub misses: u64,
}
