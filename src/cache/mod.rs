//! TTL cache for verification results.
//!
//! Results are keyed by `(state, license number, business name)` and expire
//! after a fixed time-to-live (24 hours by default). Two backends are
//! provided:
//!
//! - [`MemoryCache`]: bounded LRU held in process memory
//! - [`FileCache`]: one JSON document per entry, survives restarts
//!
//! Both never hand out an expired entry; expired entries found on read are
//! evicted.

mod file;
mod memory;

pub use file::FileCache;
pub use memory::MemoryCache;

use crate::config::{CacheBackend, CacheConfig};
use crate::error::Result;
use crate::result::VerificationResult;
use crate::states::StateCode;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use std::time::Duration;

/// Cache key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CacheKey {
    /// State.
    pub state: StateCode,
    /// Normalized license number.
    pub license_number: Option<String>,
    /// Business name, trimmed and lowercased.
    pub business_name: Option<String>,
}

impl CacheKey {
    /// Build a key, normalizing the business name.
    #[must_use]
    pub fn new(
        state: StateCode,
        license_number: Option<&str>,
        business_name: Option<&str>,
    ) -> Self {
        Self {
            state,
            license_number: license_number.map(str::to_string),
            business_name: business_name
                .map(|n| n.trim().to_lowercase())
                .filter(|n| !n.is_empty()),
        }
    }

    /// Stable hex digest of the key, used for file names.
    #[must_use]
    pub fn digest(&self) -> String {
        let canonical = format!(
            "{}|{}|{}",
            self.state,
            self.license_number.as_deref().unwrap_or(""),
            self.business_name.as_deref().unwrap_or("")
        );
        hex::encode(Sha256::digest(canonical.as_bytes()))
    }
}

/// A cached result and when it was stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    /// The cached result.
    pub result: VerificationResult,
    /// Store time.
    pub stored_at: DateTime<Utc>,
    /// Time-to-live in seconds.
    pub ttl_secs: u64,
}

impl CacheEntry {
    /// Create an entry stored now.
    #[must_use]
    pub fn new(result: VerificationResult, ttl: Duration) -> Self {
        Self {
            result,
            stored_at: Utc::now(),
            ttl_secs: ttl.as_secs(),
        }
    }

    /// Whether the entry is expired at `now`. An entry expires once its age
    /// reaches the TTL, so a zero TTL never serves.
    #[must_use]
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        let age = now.signed_duration_since(self.stored_at).num_seconds();
        let ttl = i64::try_from(self.ttl_secs).unwrap_or(i64::MAX);
        age >= ttl
    }
}

/// Cache statistics for monitoring.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStats {
    /// Number of cache hits.
    pub hits: u64,
    /// Number of cache misses.
    pub misses: u64,
    /// Number of entries stored.
    pub insertions: u64,
    /// Entries evicted because they had expired.
    pub expired: u64,
    /// Entries currently held.
    pub entries: usize,
    /// Bytes on disk (file backend only).
    pub size_bytes: u64,
}

impl CacheStats {
    /// Calculate hit rate as a percentage.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            (self.hits as f64 / total as f64) * 100.0
        }
    }
}

/// A result cache with per-entry time-to-live.
pub trait ResultCache: Send + Sync {
    /// Fetch an unexpired entry.
    fn get(&self, key: &CacheKey) -> Option<CacheEntry>;

    /// Store `result` under `key` for `ttl`.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot persist the entry.
    fn put(&self, key: &CacheKey, result: &VerificationResult, ttl: Duration) -> Result<()>;

    /// Whether `entry` has expired.
    fn is_expired(&self, entry: &CacheEntry) -> bool {
        entry.is_expired_at(Utc::now())
    }

    /// Remove every entry, returning how many were removed.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be cleared.
    fn clear(&self) -> Result<usize>;

    /// Current statistics.
    fn stats(&self) -> CacheStats;
}

/// Build the configured cache backend, or `None` when caching is disabled.
///
/// # Errors
///
/// Returns an error if the file backend's directory cannot be created.
pub fn build_cache(config: &CacheConfig) -> Result<Option<Arc<dyn ResultCache>>> {
    let cache: Option<Arc<dyn ResultCache>> = match config.backend {
        CacheBackend::Memory => Some(Arc::new(MemoryCache::with_capacity(config.capacity))),
        CacheBackend::File => Some(Arc::new(FileCache::new(config.dir.clone())?)),
        CacheBackend::Disabled => None,
    };
    Ok(cache)
}
