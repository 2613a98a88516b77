//! Configuration for license-verifier.

use crate::states::StateCode;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

/// Where verification results are cached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheBackend {
    /// In-process LRU cache.
    #[default]
    Memory,
    /// One JSON file per entry, survives restarts.
    File,
    /// No caching.
    Disabled,
}

/// Verifier configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifierConfig {
    /// Optional TOML file replacing the built-in state registry.
    #[serde(default)]
    pub states_file: Option<PathBuf>,

    /// Result cache configuration.
    #[serde(default)]
    pub cache: CacheConfig,

    /// Rate limiting configuration.
    #[serde(default)]
    pub rate_limit: RateLimitConfig,

    /// Outbound HTTP configuration.
    #[serde(default)]
    pub http: HttpConfig,

    /// Evidence capture configuration.
    #[serde(default)]
    pub evidence: EvidenceConfig,

    /// Headless browser configuration.
    #[serde(default)]
    pub browser: BrowserConfig,

    /// Batch verification limits.
    #[serde(default)]
    pub batch: BatchConfig,

    /// Log level.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

/// Result cache configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Cache backend.
    #[serde(default)]
    pub backend: CacheBackend,

    /// Directory for the file backend.
    #[serde(default = "default_cache_dir")]
    pub dir: PathBuf,

    /// Time-to-live in hours.
    #[serde(default = "default_ttl_hours")]
    pub ttl_hours: u64,

    /// Maximum entries held by the memory backend.
    #[serde(default = "default_cache_capacity")]
    pub capacity: usize,
}

/// Rate limiting configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Minimum delay between requests to the same state, in milliseconds.
    #[serde(default = "default_min_interval_ms")]
    pub min_interval_ms: u64,

    /// Per-state overrides of `min_interval_ms`.
    #[serde(default)]
    pub per_state: BTreeMap<StateCode, u64>,
}

/// Outbound HTTP configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    /// Request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// User-Agent header sent to licensing boards.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Retries after a transient failure.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Base backoff between retries in milliseconds (doubles per attempt).
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,
}

/// Evidence capture configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvidenceConfig {
    /// Capture evidence for every live lookup.
    #[serde(default)]
    pub enabled: bool,

    /// Directory evidence snapshots are written to.
    #[serde(default = "default_evidence_dir")]
    pub dir: PathBuf,
}

/// Headless browser configuration.
///
/// Browser lookups need the `browser` cargo feature. They reach the states
/// whose lookup pages only work with JavaScript and add screenshots to
/// captured evidence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrowserConfig {
    /// Fetch pages with headless Chromium instead of plain HTTP.
    #[serde(default)]
    pub enabled: bool,

    /// Chromium or Chrome binary. Searched for on the system when unset.
    #[serde(default)]
    pub executable: Option<PathBuf>,

    /// Launch without the Chromium sandbox (needed in most containers).
    #[serde(default)]
    pub no_sandbox: bool,

    /// Wait after navigation for scripts to render results, in milliseconds.
    #[serde(default = "default_settle_ms")]
    pub settle_ms: u64,

    /// Take a full-page PNG screenshot of every page.
    #[serde(default = "default_screenshots")]
    pub screenshots: bool,
}

/// Batch verification limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchConfig {
    /// Maximum requests per batch.
    #[serde(default = "default_batch_max_size")]
    pub max_size: usize,

    /// Requests in flight at once.
    #[serde(default = "default_batch_concurrency")]
    pub concurrency: usize,
}

impl Default for VerifierConfig {
    fn default() -> Self {
        Self {
            states_file: None,
            cache: CacheConfig::default(),
            rate_limit: RateLimitConfig::default(),
            http: HttpConfig::default(),
            evidence: EvidenceConfig::default(),
            browser: BrowserConfig::default(),
            batch: BatchConfig::default(),
            log_level: default_log_level(),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            backend: CacheBackend::default(),
            dir: default_cache_dir(),
            ttl_hours: default_ttl_hours(),
            capacity: default_cache_capacity(),
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            min_interval_ms: default_min_interval_ms(),
            per_state: BTreeMap::new(),
        }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            user_agent: default_user_agent(),
            max_retries: default_max_retries(),
            retry_backoff_ms: default_retry_backoff_ms(),
        }
    }
}

impl Default for EvidenceConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            dir: default_evidence_dir(),
        }
    }
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            executable: None,
            no_sandbox: false,
            settle_ms: default_settle_ms(),
            screenshots: default_screenshots(),
        }
    }
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            max_size: default_batch_max_size(),
            concurrency: default_batch_concurrency(),
        }
    }
}

fn data_dir() -> PathBuf {
    directories::ProjectDirs::from("", "", "license-verifier")
        .map(|dirs| dirs.data_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from(".license-verifier"))
}

fn default_cache_dir() -> PathBuf {
    data_dir().join("cache")
}

fn default_evidence_dir() -> PathBuf {
    data_dir().join("evidence")
}

fn default_log_level() -> String {
    "info".to_string()
}

const fn default_ttl_hours() -> u64 {
    24
}

const fn default_cache_capacity() -> usize {
    10_000
}

const fn default_min_interval_ms() -> u64 {
    2_000
}

const fn default_timeout_secs() -> u64 {
    30
}

fn default_user_agent() -> String {
    format!("license-verifier/{}", env!("CARGO_PKG_VERSION"))
}

const fn default_max_retries() -> u32 {
    2
}

const fn default_retry_backoff_ms() -> u64 {
    500
}

const fn default_settle_ms() -> u64 {
    1_000
}

const fn default_screenshots() -> bool {
    true
}

const fn default_batch_max_size() -> usize {
    50
}

const fn default_batch_concurrency() -> usize {
    10
}

impl CacheConfig {
    /// Entry time-to-live.
    #[must_use]
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_hours.saturating_mul(3600))
    }
}

impl RateLimitConfig {
    /// Minimum interval between requests to `state`.
    #[must_use]
    pub fn interval_for(&self, state: StateCode) -> Duration {
        let ms = self
            .per_state
            .get(&state)
            .copied()
            .unwrap_or(self.min_interval_ms);
        Duration::from_millis(ms)
    }
}

impl HttpConfig {
    /// Request timeout.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Backoff before retry number `attempt` (1-based).
    #[must_use]
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 1u64 << attempt.saturating_sub(1).min(16);
        Duration::from_millis(self.retry_backoff_ms.saturating_mul(factor))
    }
}

impl BrowserConfig {
    /// Delay after navigation before the page is read.
    #[must_use]
    pub fn settle(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }
}

impl VerifierConfig {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &std::path::Path) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| crate::Error::Config(e.to_string()))
    }

    /// Save configuration to a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn to_file(&self, path: &std::path::Path) -> crate::Result<()> {
        let content =
            toml::to_string_pretty(self).map_err(|e| crate::Error::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }
}
