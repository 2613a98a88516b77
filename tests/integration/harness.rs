//! Test harness: a scripted fetcher and a verifier wired to it.

use async_trait::async_trait;
use license_verifier::adapter::{FetchedPage, PageFetcher, PageRequest};
use license_verifier::{Error, LicenseVerifier, Result, VerifierConfig};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tempfile::TempDir;

/// Result page for an active license.
pub const ACTIVE_PAGE: &str = r#"
<html><body>
<table>
  <tr><th>Business Name</th><td>ACME BUILDERS INC</td></tr>
  <tr><th>License Status</th><td>This license is current and active.</td></tr>
  <tr><th>Expiration Date</th><td>12/31/2099</td></tr>
  <tr><th>License Type</th><td>B - General Building Contractor</td></tr>
</table>
</body></html>
"#;

/// Result page when the board has no matching record.
pub const NOT_FOUND_PAGE: &str = "<html><body><p>No records found.</p></body></html>";

/// Fetcher returning a configurable page, optionally failing first.
pub struct ScriptedFetcher {
    body: Mutex<String>,
    failures: AtomicUsize,
    failure_status: u16,
    javascript: bool,
    calls: Mutex<Vec<(Instant, PageRequest)>>,
}

/// Stand-in PNG returned by browser-like fetchers.
pub const SCREENSHOT: &[u8] = &[0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a];

impl ScriptedFetcher {
    /// Always answer with `body`.
    pub fn new(body: &str) -> Arc<Self> {
        Self::failing(body, 0, 503)
    }

    /// Fail the first `failures` calls with HTTP `status`, then answer with `body`.
    pub fn failing(body: &str, failures: usize, status: u16) -> Arc<Self> {
        Arc::new(Self {
            body: Mutex::new(body.to_string()),
            failures: AtomicUsize::new(failures),
            failure_status: status,
            javascript: false,
            calls: Mutex::new(Vec::new()),
        })
    }

    /// Behave like a browser: render JavaScript pages and return a screenshot.
    pub fn browser(body: &str) -> Arc<Self> {
        Arc::new(Self {
            body: Mutex::new(body.to_string()),
            failures: AtomicUsize::new(0),
            failure_status: 503,
            javascript: true,
            calls: Mutex::new(Vec::new()),
        })
    }

    /// Change the page returned from now on.
    pub fn set_body(&self, body: &str) {
        *self.body.lock() = body.to_string();
    }

    /// Number of fetches so far.
    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    /// Requests received, in order.
    pub fn requests(&self) -> Vec<PageRequest> {
        self.calls.lock().iter().map(|(_, r)| r.clone()).collect()
    }

    /// Time between the first and last fetch.
    pub fn span(&self) -> Duration {
        let calls = self.calls.lock();
        match (calls.first(), calls.last()) {
            (Some((first, _)), Some((last, _))) => last.duration_since(*first),
            _ => Duration::ZERO,
        }
    }
}

#[async_trait]
impl PageFetcher for ScriptedFetcher {
    async fn fetch(&self, request: &PageRequest) -> Result<FetchedPage> {
        self.calls.lock().push((Instant::now(), request.clone()));

        let failing = self
            .failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(Error::HttpStatus {
                status: self.failure_status,
                url: request.url.clone(),
            });
        }

        Ok(FetchedPage {
            url: request.url.clone(),
            status: 200,
            body: self.body.lock().clone(),
            screenshot: self.javascript.then(|| SCREENSHOT.to_vec()),
        })
    }

    fn supports_javascript(&self) -> bool {
        self.javascript
    }
}

/// A verifier with scratch directories and a scripted fetcher.
pub struct TestHarness {
    /// Verifier under test.
    pub verifier: LicenseVerifier,
    /// Fetcher the verifier uses.
    pub fetcher: Arc<ScriptedFetcher>,
    /// Scratch directory holding cache and evidence.
    pub dir: TempDir,
}

impl TestHarness {
    /// Configuration with no rate limiting, fast retries and scratch paths.
    pub fn config(dir: &TempDir) -> VerifierConfig {
        let mut config = VerifierConfig::default();
        config.rate_limit.min_interval_ms = 0;
        config.http.retry_backoff_ms = 10;
        config.cache.dir = dir.path().join("cache");
        config.evidence.dir = dir.path().join("evidence");
        config
    }

    /// Harness answering every lookup with an active license.
    pub fn setup() -> Self {
        Self::setup_with(ScriptedFetcher::new(ACTIVE_PAGE), |_| {})
    }

    /// Harness with a custom fetcher and configuration tweaks.
    pub fn setup_with(
        fetcher: Arc<ScriptedFetcher>,
        configure: impl FnOnce(&mut VerifierConfig),
    ) -> Self {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut config = Self::config(&dir);
        configure(&mut config);

        let verifier = LicenseVerifier::builder(config)
            .fetcher(fetcher.clone())
            .build()
            .expect("verifier");

        Self {
            verifier,
            fetcher,
            dir,
        }
    }
}
