//! In-memory LRU result cache.

use super::{CacheEntry, CacheKey, CacheStats, ResultCache};
use crate::error::Result;
use crate::result::VerificationResult;
use lru::LruCache;
use parking_lot::Mutex;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Default cache capacity.
const DEFAULT_CACHE_CAPACITY: usize = 10_000;

/// LRU cache of verification results.
///
/// Bounded by entry count; the least recently used entry is dropped when
/// full. Expired entries are dropped when read.
#[derive(Clone)]
pub struct MemoryCache {
    inner: Arc<Mutex<LruCache<CacheKey, CacheEntry>>>,
    stats: Arc<Mutex<CacheStats>>,
}

impl MemoryCache {
    /// Create a new cache with default capacity.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CACHE_CAPACITY)
    }

    /// Create a new cache with the specified capacity.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let cap = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            inner: Arc::new(Mutex::new(LruCache::new(cap))),
            stats: Arc::new(Mutex::new(CacheStats::default())),
        }
    }

    /// Get the current number of entries in the cache.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    /// Check if the cache is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }

    /// Insert a prepared entry as-is.
    pub fn insert_entry(&self, key: CacheKey, entry: CacheEntry) {
        self.inner.lock().put(key, entry);
        self.stats.lock().insertions += 1;
    }
}

impl Default for MemoryCache {
    fn default() -> Self {
        Self::new()
    }
}

impl ResultCache for MemoryCache {
    fn get(&self, key: &CacheKey) -> Option<CacheEntry> {
        let mut cache = self.inner.lock();
        let found = cache.get(key).cloned();

        let mut stats = self.stats.lock();
        match found {
            Some(entry) if self.is_expired(&entry) => {
                cache.pop(key);
                stats.expired += 1;
                stats.misses += 1;
                debug!("Cache entry for {} {:?} expired", key.state, key.license_number);
                None
            }
            Some(entry) => {
                stats.hits += 1;
                Some(entry)
            }
            None => {
                stats.misses += 1;
                None
            }
        }
    }

    fn put(&self, key: &CacheKey, result: &VerificationResult, ttl: Duration) -> Result<()> {
        self.insert_entry(key.clone(), CacheEntry::new(result.clone(), ttl));
        Ok(())
    }

    fn clear(&self) -> Result<usize> {
        let mut cache = self.inner.lock();
        let removed = cache.len();
        cache.clear();
        Ok(removed)
    }

    fn stats(&self) -> CacheStats {
        let mut stats = self.stats.lock().clone();
        stats.entries = self.len();
        stats
    }
}
