//! Size- and TTL-bounded in-memory cache.
//!
//! Entry sizes are estimated from the JSON serialization of the value.
//! Expiry is checked lazily: on `get` for the entry being read and on every
//! `set` for the whole table. There is no background sweeper.

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::Error;

/// Cache sizing and lifetime settings.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Budget for the summed size of all entries, in bytes.
    pub max_size_bytes: usize,
    /// TTL used when `set` is given none.
    pub default_ttl: Duration,
    /// A disabled cache stores nothing and always misses.
    pub enabled: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self { max_size_bytes: 50 * 1024 * 1024, default_ttl: Duration::from_secs(300), enabled: true }
    }
}

/// Hit/miss accounting and current occupancy.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    /// Summed size of resident entries in bytes.
    pub size: usize,
    pub entries: usize,
    /// When expired entries were last purged.
    pub last_cleanup: Option<DateTime<Utc>>,
}

struct Entry<V> {
    data: V,
    created_at: Instant,
    /// Insertion sequence; breaks ties between entries created at the same instant.
    seq: u64,
    size_bytes: usize,
    expires_at: Instant,
}

impl<V> Entry<V> {
    fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

struct Table<V> {
    entries: HashMap<String, Entry<V>>,
    total_size: usize,
    next_seq: u64,
    hits: u64,
    misses: u64,
    last_cleanup: Option<DateTime<Utc>>,
}

impl<V> Table<V> {
    fn remove(&mut self, key: &str) -> Option<Entry<V>> {
        let entry = self.entries.remove(key)?;
        self.total_size -= entry.size_bytes;
        Some(entry)
    }

    fn purge_expired(&mut self, now: Instant) -> usize {
        let expired: Vec<String> =
            self.entries.iter().filter(|(_, e)| e.is_expired(now)).map(|(k, _)| k.clone()).collect();
        for key in &expired {
            self.remove(key);
        }
        self.last_cleanup = Some(Utc::now());
        expired.len()
    }

    fn evict_oldest(&mut self) -> Option<String> {
        let oldest = self
            .entries
            .iter()
            .min_by_key(|(_, e)| (e.created_at, e.seq))
            .map(|(k, _)| k.clone())?;
        self.remove(&oldest);
        Some(oldest)
    }
}

/// A bounded key/value cache safe to share between concurrent queries.
///
/// The purge → evict → insert sequence of `set` runs under a single lock, so
/// concurrent writers cannot double-evict or overshoot the budget.
///
/// Values larger than the whole budget are rejected: `set` returns `false`
/// and leaves existing entries in place.
pub struct BoundedCache<V> {
    table: Mutex<Table<V>>,
    config: CacheConfig,
}

impl<V: Clone + Serialize> BoundedCache<V> {
    pub fn new(config: CacheConfig) -> Self {
        Self {
            table: Mutex::new(Table {
                entries: HashMap::new(),
                total_size: 0,
                next_seq: 0,
                hits: 0,
                misses: 0,
                last_cleanup: None,
            }),
            config,
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Get a live entry, counting a hit or a miss.
    pub async fn get(&self, key: &str) -> Option<V> {
        if !self.config.enabled {
            return None;
        }

        let mut guard = self.table.lock().await;
        let table = &mut *guard;
        let now = Instant::now();

        let expired = match table.entries.get(key) {
            Some(entry) if !entry.is_expired(now) => {
                let data = entry.data.clone();
                table.hits += 1;
                tracing::debug!(key, "cache hit");
                return Some(data);
            }
            Some(_) => true,
            None => false,
        };

        if expired {
            table.remove(key);
            tracing::debug!(key, "cache entry expired");
        }
        table.misses += 1;
        tracing::debug!(key, "cache miss");
        None
    }

    /// Insert or replace an entry.
    ///
    /// Returns `Ok(false)` when the cache is disabled or the value alone
    /// exceeds the size budget.
    ///
    /// # Errors
    ///
    /// Returns `Error::Cache` if the value cannot be serialized for sizing.
    pub async fn set(&self, key: &str, value: V, ttl: Option<Duration>) -> Result<bool, Error> {
        if !self.config.enabled {
            return Ok(false);
        }

        let size_bytes = serde_json::to_vec(&value)
            .map_err(|e| Error::Cache(format!("failed to size entry '{key}': {e}")))?
            .len();
        if size_bytes > self.config.max_size_bytes {
            tracing::warn!(key, size_bytes, max = self.config.max_size_bytes, "cache entry exceeds budget; rejected");
            return Ok(false);
        }
        let ttl = ttl.unwrap_or(self.config.default_ttl);

        let mut table = self.table.lock().await;
        let now = Instant::now();

        table.purge_expired(now);
        table.remove(key);

        while table.total_size + size_bytes > self.config.max_size_bytes {
            match table.evict_oldest() {
                Some(evicted) => tracing::debug!(key = %evicted, "evicted oldest cache entry"),
                None => break,
            }
        }

        let seq = table.next_seq;
        table.next_seq += 1;
        table.total_size += size_bytes;
        table
            .entries
            .insert(key.to_string(), Entry { data: value, created_at: now, seq, size_bytes, expires_at: now + ttl });

        Ok(true)
    }

    /// Remove an entry; returns whether it existed.
    pub async fn delete(&self, key: &str) -> bool {
        self.table.lock().await.remove(key).is_some()
    }

    /// Remove every entry whose key satisfies `pred`; returns how many.
    pub async fn delete_matching(&self, pred: impl Fn(&str) -> bool) -> usize {
        let mut table = self.table.lock().await;
        let keys: Vec<String> = table.entries.keys().filter(|k| pred(k)).cloned().collect();
        for key in &keys {
            table.remove(key);
        }
        keys.len()
    }

    /// Drop expired entries now; returns how many were removed.
    pub async fn purge_expired(&self) -> usize {
        self.table.lock().await.purge_expired(Instant::now())
    }

    /// Remove all entries. Hit/miss counters are kept.
    pub async fn clear(&self) {
        let mut table = self.table.lock().await;
        table.entries.clear();
        table.total_size = 0;
    }

    pub async fn len(&self) -> usize {
        self.table.lock().await.entries.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    pub async fn stats(&self) -> CacheStats {
        let table = self.table.lock().await;
        CacheStats {
            hits: table.hits,
            misses: table.misses,
            size: table.total_size,
            entries: table.entries.len(),
            last_cleanup: table.last_cleanup,
        }
    }
}
