//! File-backed result cache.
//!
//! Each entry is a pretty-printed JSON document named after the hex SHA-256
//! of its key. Unreadable or expired files are deleted when encountered.

use super::{CacheEntry, CacheKey, CacheStats, ResultCache};
use crate::error::{Error, Result};
use crate::result::VerificationResult;
use parking_lot::Mutex;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

const EXTENSION: &str = "json";

/// Directory of JSON cache entries.
pub struct FileCache {
    dir: PathBuf,
    stats: Mutex<CacheStats>,
}

impl FileCache {
    /// Open (creating if needed) a cache directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created.
    pub fn new(dir: PathBuf) -> Result<Self> {
        fs::create_dir_all(&dir)?;
        info!("File cache at {}", dir.display());
        Ok(Self {
            dir,
            stats: Mutex::new(CacheStats::default()),
        })
    }

    fn path_for(&self, key: &CacheKey) -> PathBuf {
        self.dir.join(format!("{}.{EXTENSION}", key.digest()))
    }

    fn entry_files(&self) -> Result<Vec<PathBuf>> {
        if !self.dir.exists() {
            return Ok(Vec::new());
        }
        let mut files = Vec::new();
        for dirent in fs::read_dir(&self.dir)? {
            let path = dirent?.path();
            if path.extension().is_some_and(|ext| ext == EXTENSION) {
                files.push(path);
            }
        }
        Ok(files)
    }

    fn remove_quietly(path: &Path) {
        if let Err(e) = fs::remove_file(path) {
            warn!("Failed to remove cache file {}: {}", path.display(), e);
        }
    }
}

impl ResultCache for FileCache {
    fn get(&self, key: &CacheKey) -> Option<CacheEntry> {
        let path = self.path_for(key);
        let Ok(content) = fs::read_to_string(&path) else {
            self.stats.lock().misses += 1;
            return None;
        };

        let entry = match serde_json::from_str::<CacheEntry>(&content) {
            Ok(entry) => entry,
            Err(e) => {
                warn!("Discarding corrupt cache file {}: {}", path.display(), e);
                Self::remove_quietly(&path);
                self.stats.lock().misses += 1;
                return None;
            }
        };

        let mut stats = self.stats.lock();
        if self.is_expired(&entry) {
            debug!("Cache entry {} expired", path.display());
            Self::remove_quietly(&path);
            stats.expired += 1;
            stats.misses += 1;
            return None;
        }

        stats.hits += 1;
        Some(entry)
    }

    fn put(&self, key: &CacheKey, result: &VerificationResult, ttl: Duration) -> Result<()> {
        fs::create_dir_all(&self.dir)?;
        let entry = CacheEntry::new(result.clone(), ttl);
        let content = serde_json::to_string_pretty(&entry)?;

        // Write-then-rename so readers never see a partial document.
        let path = self.path_for(key);
        let tmp = path.with_extension("tmp");
        fs::write(&tmp, content)?;
        fs::rename(&tmp, &path)
            .map_err(|e| Error::Cache(format!("failed to commit {}: {e}", path.display())))?;

        self.stats.lock().insertions += 1;
        Ok(())
    }

    fn clear(&self) -> Result<usize> {
        let files = self.entry_files()?;
        let removed = files.len();
        for path in files {
            fs::remove_file(&path)?;
        }
        info!("Cleared {} cached results", removed);
        Ok(removed)
    }

    fn stats(&self) -> CacheStats {
        let mut stats = self.stats.lock().clone();
        match self.entry_files() {
            Ok(files) => {
                stats.entries = files.len();
                stats.size_bytes = files
                    .iter()
                    .filter_map(|p| fs::metadata(p).ok())
                    .map(|m| m.len())
                    .sum();
            }
            Err(e) => warn!("Failed to scan cache directory: {}", e),
        }
        stats
    }
}
