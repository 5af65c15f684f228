//! Cache storage.
//!
//! [`CacheStore`] is the only shared mutable resource of the response cache.
//! It is a plain key/value store with per-key TTL and no cross-key
//! transactions. [`MemoryStore`] is the in-process implementation.

use std::num::NonZeroUsize;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use lru::LruCache;
use metrics::counter;
use thiserror::Error;
use time::OffsetDateTime;

use super::clock::Clock;
use super::keys::namespace_scope;
use super::lock::{rw_read, rw_write};

const SOURCE: &str = "cache::store";
const METRIC_CACHE_EVICT_TOTAL: &str = "showroom_cache_evict_total";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("cache store unavailable: {0}")]
    Unavailable(String),
    #[error("cache store does not support `{0}`")]
    Unsupported(&'static str),
}

impl StoreError {
    pub fn unavailable(err: impl std::fmt::Display) -> Self {
        Self::Unavailable(err.to_string())
    }

    pub fn is_unsupported(&self) -> bool {
        matches!(self, Self::Unsupported(_))
    }
}

/// Key/value store with per-key TTL.
///
/// Every primitive is atomic with respect to a single key. `put_if_absent`
/// must be an atomic set-if-absent since it backs the refresh mutex.
/// `forget_prefix` may return [`StoreError::Unsupported`] for stores that
/// cannot enumerate their keys.
#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Bytes>, StoreError>;

    async fn put(&self, key: &str, value: Bytes, ttl: Duration) -> Result<(), StoreError>;

    /// Stores `value` only when no live value exists. Returns whether it was
    /// stored.
    async fn put_if_absent(
        &self,
        key: &str,
        value: Bytes,
        ttl: Duration,
    ) -> Result<bool, StoreError>;

    async fn has(&self, key: &str) -> Result<bool, StoreError>;

    /// Removes `key`. Returns whether a value was removed.
    async fn forget(&self, key: &str) -> Result<bool, StoreError>;

    /// Removes every key starting with `prefix`. Returns the number removed.
    async fn forget_prefix(&self, prefix: &str) -> Result<usize, StoreError>;

    async fn flush_all(&self) -> Result<(), StoreError>;

    /// Removes the bare `namespace` key and every `"{namespace}:…"` key.
    async fn flush_namespace(&self, namespace: &str) -> Result<usize, StoreError> {
        let bare = usize::from(self.forget(namespace).await?);
        let scoped = self.forget_prefix(&namespace_scope(namespace)).await?;
        Ok(bare + scoped)
    }
}

#[derive(Debug, Clone)]
struct StoredValue {
    value: Bytes,
    expires_at: OffsetDateTime,
}

impl StoredValue {
    fn is_live(&self, now: OffsetDateTime) -> bool {
        now < self.expires_at
    }
}

/// Bounded in-memory store.
///
/// Entries live in an LRU keyed by the cache key string. Expiry is checked
/// lazily against the injected clock; an expired entry is dropped the next
/// time it is touched. All multi-key operations run under one write lock.
pub struct MemoryStore {
    entries: RwLock<LruCache<String, StoredValue>>,
    clock: Arc<dyn Clock>,
}

impl MemoryStore {
    pub fn new(capacity: NonZeroUsize, clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: RwLock::new(LruCache::new(capacity)),
            clock,
        }
    }

    /// Number of stored values, including ones that expired but were not
    /// touched since.
    pub fn len(&self) -> usize {
        rw_read(&self.entries, SOURCE, "len").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn insert(entries: &mut LruCache<String, StoredValue>, key: &str, stored: StoredValue) {
        if let Some((evicted, _)) = entries.push(key.to_string(), stored)
            && evicted != key
        {
            counter!(METRIC_CACHE_EVICT_TOTAL).increment(1);
        }
    }

    fn expiry(&self, ttl: Duration) -> OffsetDateTime {
        self.clock.now() + ttl
    }
}

#[async_trait]
impl CacheStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<Bytes>, StoreError> {
        let now = self.clock.now();
        let mut entries = rw_write(&self.entries, SOURCE, "get");
        match entries.get(key) {
            Some(stored) if stored.is_live(now) => Ok(Some(stored.value.clone())),
            Some(_) => {
                entries.pop(key);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn put(&self, key: &str, value: Bytes, ttl: Duration) -> Result<(), StoreError> {
        let stored = StoredValue {
            value,
            expires_at: self.expiry(ttl),
        };
        Self::insert(&mut rw_write(&self.entries, SOURCE, "put"), key, stored);
        Ok(())
    }

    async fn put_if_absent(
        &self,
        key: &str,
        value: Bytes,
        ttl: Duration,
    ) -> Result<bool, StoreError> {
        let now = self.clock.now();
        let mut entries = rw_write(&self.entries, SOURCE, "put_if_absent");
        if entries.peek(key).is_some_and(|stored| stored.is_live(now)) {
            return Ok(false);
        }
        let stored = StoredValue {
            value,
            expires_at: now + ttl,
        };
        Self::insert(&mut entries, key, stored);
        Ok(true)
    }

    async fn has(&self, key: &str) -> Result<bool, StoreError> {
        let now = self.clock.now();
        Ok(rw_read(&self.entries, SOURCE, "has")
            .peek(key)
            .is_some_and(|stored| stored.is_live(now)))
    }

    async fn forget(&self, key: &str) -> Result<bool, StoreError> {
        Ok(rw_write(&self.entries, SOURCE, "forget").pop(key).is_some())
    }

    async fn forget_prefix(&self, prefix: &str) -> Result<usize, StoreError> {
        let mut entries = rw_write(&self.entries, SOURCE, "forget_prefix");
        let doomed: Vec<String> = entries
            .iter()
            .filter(|(key, _)| key.starts_with(prefix))
            .map(|(key, _)| key.clone())
            .collect();
        for key in &doomed {
            entries.pop(key);
        }
        Ok(doomed.len())
    }

    async fn flush_all(&self) -> Result<(), StoreError> {
        rw_write(&self.entries, SOURCE, "flush_all").clear();
        Ok(())
    }
}
