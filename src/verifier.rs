//! Verification orchestrator.
//!
//! Combines format validation, the result cache, per-state rate limiting and
//! the state adapters into a single entry point.

use crate::adapter::{
    FetchedPage, HttpFetcher, LookupQuery, PageFetcher, ScrapingAdapter, StateAdapter,
    StatusReport,
};
use crate::cache::{build_cache, CacheKey, CacheStats, ResultCache};
use crate::config::VerifierConfig;
use crate::error::{Error, Result};
use crate::evidence::{Evidence, EvidenceStore};
use crate::format::{normalize_license_number, FormatCheck};
use crate::rate_limit::StateRateLimiter;
use crate::result::{
    BatchOutcome, BatchReport, BatchSummary, LicenseRequest, LicenseStatus, ResultSource,
    VerificationResult,
};
use crate::states::{StateCode, StateEntry, StateInfo, StateRegistry};
use chrono::Utc;
use futures::stream::{self, StreamExt};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Cache selection made on the builder.
enum CacheChoice {
    Configured,
    Custom(Arc<dyn ResultCache>),
    Disabled,
}

/// Builder for [`LicenseVerifier`].
///
/// Everything not set explicitly is derived from the [`VerifierConfig`].
pub struct VerifierBuilder {
    config: VerifierConfig,
    registry: Option<StateRegistry>,
    fetcher: Option<Arc<dyn PageFetcher>>,
    cache: CacheChoice,
    adapters: Vec<Arc<dyn StateAdapter>>,
}

impl VerifierBuilder {
    /// Create a new builder with the given configuration.
    #[must_use]
    pub fn new(config: VerifierConfig) -> Self {
        Self {
            config,
            registry: None,
            fetcher: None,
            cache: CacheChoice::Configured,
            adapters: Vec::new(),
        }
    }

    /// Use a specific state registry instead of the configured one.
    #[must_use]
    pub fn registry(mut self, registry: StateRegistry) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Fetch pages through `fetcher` instead of the configured one.
    #[must_use]
    pub fn fetcher(mut self, fetcher: Arc<dyn PageFetcher>) -> Self {
        self.fetcher = Some(fetcher);
        self
    }

    /// Use `cache` instead of the configured backend.
    #[must_use]
    pub fn cache(mut self, cache: Arc<dyn ResultCache>) -> Self {
        self.cache = CacheChoice::Custom(cache);
        self
    }

    /// Disable result caching.
    #[must_use]
    pub fn without_cache(mut self) -> Self {
        self.cache = CacheChoice::Disabled;
        self
    }

    /// Handle one state with a custom adapter.
    #[must_use]
    pub fn adapter(mut self, adapter: Arc<dyn StateAdapter>) -> Self {
        self.adapters.push(adapter);
        self
    }

    /// Build the verifier.
    ///
    /// # Errors
    ///
    /// Returns an error if the state registry, HTTP client or cache cannot
    /// be set up, or if a custom adapter names an unsupported state.
    pub fn build(self) -> Result<LicenseVerifier> {
        let registry = match self.registry {
            Some(registry) => registry,
            None => match &self.config.states_file {
                Some(path) => StateRegistry::from_file(path)?,
                None => StateRegistry::builtin()?,
            },
        };

        let fetcher: Arc<dyn PageFetcher> = match self.fetcher {
            Some(fetcher) => fetcher,
            None if self.config.browser.enabled => browser_fetcher(&self.config)?,
            None => Arc::new(HttpFetcher::new(&self.config.http)?),
        };

        let cache = match self.cache {
            CacheChoice::Configured => build_cache(&self.config.cache)?,
            CacheChoice::Custom(cache) => Some(cache),
            CacheChoice::Disabled => None,
        };

        let mut adapters: HashMap<StateCode, Arc<dyn StateAdapter>> = registry
            .iter()
            .map(|entry| {
                let adapter: Arc<dyn StateAdapter> =
                    Arc::new(ScrapingAdapter::new(Arc::clone(entry), Arc::clone(&fetcher)));
                (entry.code(), adapter)
            })
            .collect();
        for adapter in self.adapters {
            let state = adapter.state();
            if registry.get(state).is_none() {
                return Err(Error::Config(format!(
                    "custom adapter for unsupported state {state}"
                )));
            }
            debug!("Custom adapter installed for {}", state);
            adapters.insert(state, adapter);
        }

        let rate_limiter = StateRateLimiter::new(self.config.rate_limit.clone());
        let evidence = EvidenceStore::new(self.config.evidence.dir.clone());

        info!(
            "License verifier initialized (states={}, cache={}, min_interval={}ms, javascript={})",
            registry.len(),
            if cache.is_some() { "enabled" } else { "disabled" },
            self.config.rate_limit.min_interval_ms,
            fetcher.supports_javascript()
        );

        Ok(LicenseVerifier {
            registry,
            adapters,
            cache,
            rate_limiter,
            evidence,
            config: self.config,
        })
    }
}

#[cfg(feature = "browser")]
fn browser_fetcher(config: &VerifierConfig) -> Result<Arc<dyn PageFetcher>> {
    Ok(Arc::new(crate::adapter::BrowserFetcher::new(
        &config.browser,
        &config.http,
    )))
}

#[cfg(not(feature = "browser"))]
fn browser_fetcher(_config: &VerifierConfig) -> Result<Arc<dyn PageFetcher>> {
    Err(Error::Config(
        "browser lookups require building with the `browser` feature".to_string(),
    ))
}

/// Verifies contractor licenses against state licensing boards.
///
/// Pipeline per request:
/// 1. Resolve the state and validate the license number format
/// 2. Serve from the cache when a fresh result exists
/// 3. Wait for the state's rate limit, then query the board (with retries)
/// 4. Optionally capture the page as evidence, cache live results
pub struct LicenseVerifier {
    registry: StateRegistry,
    adapters: HashMap<StateCode, Arc<dyn StateAdapter>>,
    cache: Option<Arc<dyn ResultCache>>,
    rate_limiter: StateRateLimiter,
    evidence: EvidenceStore,
    config: VerifierConfig,
}

impl LicenseVerifier {
    /// Create a verifier from configuration with the default HTTP fetcher.
    ///
    /// # Errors
    ///
    /// Returns an error if any component fails to initialize.
    pub fn new(config: VerifierConfig) -> Result<Self> {
        VerifierBuilder::new(config).build()
    }

    /// Start building a verifier.
    #[must_use]
    pub fn builder(config: VerifierConfig) -> VerifierBuilder {
        VerifierBuilder::new(config)
    }

    fn adapter_for(&self, state: StateCode) -> Result<&Arc<dyn StateAdapter>> {
        self.adapters
            .get(&state)
            .ok_or_else(|| Error::UnsupportedState(state.to_string()))
    }

    /// Verify one license.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnsupportedState`] for unknown states,
    /// [`Error::InvalidRequest`] when neither a license number nor a business
    /// name is given, and lookup errors that persist after retries.
    pub async fn verify(&self, request: &LicenseRequest) -> Result<VerificationResult> {
        let entry = Arc::clone(self.registry.resolve(&request.state)?);
        let state = entry.code();

        let license_number = request
            .license_number
            .as_deref()
            .map(normalize_license_number)
            .filter(|l| !l.is_empty());
        let business_name = request
            .business_name
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .map(str::to_string);
        if license_number.is_none() && business_name.is_none() {
            return Err(Error::InvalidRequest(
                "a license number or business name is required".to_string(),
            ));
        }

        let adapter = Arc::clone(self.adapter_for(state)?);

        let format_check = license_number
            .as_deref()
            .map(|license| adapter.check_format(license));
        if let Some(check) = format_check.as_ref().filter(|c| !c.is_acceptable()) {
            debug!("{} {} rejected by format check", state, check.license_number);
            return Ok(invalid_format_result(&entry, check.clone(), business_name));
        }

        let key = CacheKey::new(state, license_number.as_deref(), business_name.as_deref());
        if let Some(cached) = self.cache.as_ref().and_then(|cache| cache.get(&key)) {
            debug!("Cache hit for {} {:?}", state, key.license_number);
            let mut result = cached.result;
            result.source = ResultSource::Cache;
            return Ok(result);
        }

        let query = LookupQuery {
            license_number: license_number.clone(),
            business_name: business_name.clone(),
        };
        let report = self.lookup(adapter.as_ref(), &query).await?;

        let capture = request.capture_evidence || self.config.evidence.enabled;
        let evidence = match (&report.page, capture) {
            (Some(page), true) => self.capture_evidence(state, query.subject(), page).await,
            _ => None,
        };

        let is_live = report.source == ResultSource::Live;
        let result = VerificationResult {
            state,
            license_number,
            business_name,
            status: report.status,
            verified: is_live && report.status.is_definitive(),
            licensee_name: report.licensee_name,
            expiration_date: report.expiration_date,
            license_type: report.license_type,
            raw_status: report.raw_status,
            format_check,
            verification_url: report.source_url,
            checked_at: Utc::now(),
            source: report.source,
            evidence,
            message: report.message,
        };

        if is_live {
            if let Some(cache) = &self.cache {
                if let Err(e) = cache.put(&key, &result, self.config.cache.ttl()) {
                    warn!("Failed to cache result for {}: {}", state, e);
                }
            }
        }

        info!(
            "Verified {} {}: {:?} ({:?})",
            state,
            query.subject(),
            result.status,
            result.source
        );
        Ok(result)
    }

    /// Query the adapter, rate limiting and retrying automated lookups.
    async fn lookup(
        &self,
        adapter: &dyn StateAdapter,
        query: &LookupQuery,
    ) -> Result<StatusReport> {
        let state = adapter.state();
        if !adapter.is_automated(query) {
            return adapter.fetch_status(query).await;
        }

        let max_retries = self.config.http.max_retries;
        let mut attempt = 0u32;
        loop {
            self.rate_limiter.acquire(state).await;
            match adapter.fetch_status(query).await {
                Ok(report) => return Ok(report),
                Err(e) if e.is_transient() && attempt < max_retries => {
                    attempt += 1;
                    let delay = self.config.http.backoff(attempt);
                    warn!(
                        "Lookup for {} failed ({}), retry {}/{} in {}ms",
                        state,
                        e,
                        attempt,
                        max_retries,
                        delay.as_millis()
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn capture_evidence(
        &self,
        state: StateCode,
        subject: &str,
        page: &FetchedPage,
    ) -> Option<Evidence> {
        match self.evidence.capture(state, subject, page).await {
            Ok(evidence) => Some(evidence),
            Err(e) => {
                warn!("Evidence capture failed for {} {}: {}", state, subject, e);
                None
            }
        }
    }

    /// Verify several licenses concurrently.
    ///
    /// Results come back in request order. A failing request becomes a
    /// [`BatchOutcome::Failed`] entry instead of failing the batch.
    ///
    /// # Errors
    ///
    /// Returns [`Error::BatchTooLarge`] if the batch exceeds the configured
    /// maximum size.
    pub async fn verify_batch(&self, requests: Vec<LicenseRequest>) -> Result<BatchReport> {
        let max = self.config.batch.max_size;
        if requests.len() > max {
            return Err(Error::BatchTooLarge {
                size: requests.len(),
                max,
            });
        }

        let concurrency = self.config.batch.concurrency.max(1);
        let results: Vec<BatchOutcome> = stream::iter(requests)
            .map(|request| async move {
                match self.verify(&request).await {
                    Ok(result) => BatchOutcome::Verified {
                        result: Box::new(result),
                    },
                    Err(e) => BatchOutcome::Failed {
                        request,
                        error: e.to_string(),
                    },
                }
            })
            .buffered(concurrency)
            .collect()
            .await;

        let summary = BatchSummary::from_outcomes(&results);
        info!(
            "Batch complete: {} requests, {} active, {} errors",
            summary.total, summary.active, summary.errors
        );
        Ok(BatchReport { results, summary })
    }

    /// Check a license number's format without looking it up.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnsupportedState`] for unknown states.
    pub fn validate_format(&self, state: &str, license_number: &str) -> Result<FormatCheck> {
        let entry = self.registry.resolve(state)?;
        Ok(self.adapter_for(entry.code())?.check_format(license_number))
    }

    /// All supported states, in code order.
    #[must_use]
    pub fn supported_states(&self) -> Vec<StateInfo> {
        self.registry
            .iter()
            .map(|entry| StateInfo::from(&entry.config))
            .collect()
    }

    /// Details for one state.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnsupportedState`] for unknown states.
    pub fn state_info(&self, state: &str) -> Result<StateInfo> {
        Ok(StateInfo::from(&self.registry.resolve(state)?.config))
    }

    /// Example license number for every state that has one.
    #[must_use]
    pub fn examples(&self) -> BTreeMap<StateCode, String> {
        self.registry
            .iter()
            .filter_map(|entry| Some((entry.code(), entry.config.example.clone()?)))
            .collect()
    }

    /// Cache statistics, or `None` when caching is disabled.
    #[must_use]
    pub fn cache_stats(&self) -> Option<CacheStats> {
        self.cache.as_ref().map(|cache| cache.stats())
    }

    /// Remove every cached result, returning how many were removed.
    ///
    /// # Errors
    ///
    /// Returns an error if the cache backend cannot be cleared.
    pub fn clear_cache(&self) -> Result<usize> {
        match &self.cache {
            Some(cache) => cache.clear(),
            None => Ok(0),
        }
    }
}

fn invalid_format_result(
    entry: &StateEntry,
    check: FormatCheck,
    business_name: Option<String>,
) -> VerificationResult {
    let example = check
        .example
        .as_deref()
        .map(|e| format!(" (e.g. {e})"))
        .unwrap_or_default();
    let message = format!(
        "License number '{}' does not match the {} format: {}{example}",
        check.license_number, check.state, check.format
    );

    VerificationResult {
        state: check.state,
        license_number: Some(check.license_number.clone()),
        business_name,
        status: LicenseStatus::InvalidFormat,
        verified: false,
        licensee_name: None,
        expiration_date: None,
        license_type: None,
        raw_status: None,
        format_check: Some(check),
        verification_url: entry.config.verification_url.clone(),
        checked_at: Utc::now(),
        source: ResultSource::FormatOnly,
        evidence: None,
        message: Some(message),
    }
}
