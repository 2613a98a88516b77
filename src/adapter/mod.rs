//! State lookup adapters.
//!
//! A [`StateAdapter`] knows how to ask one licensing board about a license.
//! The built-in adapter, [`ScrapingAdapter`], is driven entirely by the
//! state's [`StateConfig`](crate::states::StateConfig): it fills in the
//! lookup endpoint, fetches the page through a [`PageFetcher`] and reads the
//! result with the state's field patterns.
//!
//! ```text
//! LookupQuery ──> PageRequest ──> PageFetcher ──> FetchedPage
//!                                                     │
//!                             page_text ──> extract ──> classify ──> StatusReport
//! ```
//!
//! Two fetchers ship with the crate: [`HttpFetcher`] for plain HTTP and,
//! with the `browser` feature, `BrowserFetcher`, which renders pages in
//! headless Chromium and can also screenshot them.

#[cfg(feature = "browser")]
mod browser;
pub mod extract;
mod http;

#[cfg(feature = "browser")]
pub use browser::BrowserFetcher;
pub use http::HttpFetcher;

use crate::error::{Error, Result};
use crate::format::{check_format, FormatCheck};
use crate::result::{LicenseStatus, ResultSource};
use crate::states::{HttpMethod, LookupConfig, StateCode, StateEntry};
use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use std::sync::Arc;
use tracing::debug;

/// An outbound page request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    /// Request method.
    pub method: HttpMethod,
    /// Fully substituted URL.
    pub url: String,
    /// Form fields (POST only).
    pub form: Vec<(String, String)>,
    /// Search to run on the page before reading it. Browser fetchers only.
    pub search: Option<SearchStep>,
}

/// Typing a value into a page's search form and submitting it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchStep {
    /// CSS selector of the input.
    pub input: String,
    /// Text to type.
    pub value: String,
    /// CSS selector of the submit button; Enter is pressed when `None`.
    pub submit: Option<String>,
}

/// A fetched page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedPage {
    /// Final URL after redirects.
    pub url: String,
    /// HTTP status code.
    pub status: u16,
    /// Response body, or the rendered DOM for browser fetches.
    pub body: String,
    /// PNG screenshot of the rendered page, when the fetcher takes one.
    pub screenshot: Option<Vec<u8>>,
}

/// Fetches lookup pages.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// Fetch a page.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Network`] on transport failures and
    /// [`Error::HttpStatus`] for non-success responses.
    async fn fetch(&self, request: &PageRequest) -> Result<FetchedPage>;

    /// Whether pages are rendered with JavaScript before being returned.
    fn supports_javascript(&self) -> bool {
        false
    }
}

/// What to look up.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LookupQuery {
    /// Normalized license number.
    pub license_number: Option<String>,
    /// Business name.
    pub business_name: Option<String>,
}

impl LookupQuery {
    /// Short description of the query, used in logs and evidence file names.
    #[must_use]
    pub fn subject(&self) -> &str {
        self.license_number
            .as_deref()
            .or(self.business_name.as_deref())
            .unwrap_or("")
    }
}

/// A board's answer about one license.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusReport {
    /// Classified status.
    pub status: LicenseStatus,
    /// Licensee name.
    pub licensee_name: Option<String>,
    /// Expiration date.
    pub expiration_date: Option<NaiveDate>,
    /// License type.
    pub license_type: Option<String>,
    /// Status text as shown.
    pub raw_status: Option<String>,
    /// `Live` when a page was read, `Manual` when no lookup was possible.
    pub source: ResultSource,
    /// Page the answer came from, or the manual verification page.
    pub source_url: String,
    /// The fetched page, kept for evidence capture.
    pub page: Option<FetchedPage>,
    /// Explanation for manual or inconclusive reports.
    pub message: Option<String>,
}

impl StatusReport {
    /// A report asking the caller to check the board's site by hand.
    #[must_use]
    pub fn manual(verification_url: &str, message: impl Into<String>) -> Self {
        Self {
            status: LicenseStatus::Unknown,
            licensee_name: None,
            expiration_date: None,
            license_type: None,
            raw_status: None,
            source: ResultSource::Manual,
            source_url: verification_url.to_string(),
            page: None,
            message: Some(message.into()),
        }
    }
}

/// Per-state verification capability.
#[async_trait]
pub trait StateAdapter: Send + Sync {
    /// State served by this adapter.
    fn state(&self) -> StateCode;

    /// Check a license number against the state's format.
    fn check_format(&self, license_number: &str) -> FormatCheck;

    /// Whether a license number may be looked up. States without a known
    /// pattern accept anything.
    fn validate_format(&self, license_number: &str) -> bool {
        self.check_format(license_number).is_acceptable()
    }

    /// Whether `query` results in a request to the board. Only automated
    /// lookups are rate limited and retried.
    fn is_automated(&self, _query: &LookupQuery) -> bool {
        true
    }

    /// Ask the board about a license.
    ///
    /// # Errors
    ///
    /// Returns an error if the lookup cannot be built or the page cannot be
    /// fetched.
    async fn fetch_status(&self, query: &LookupQuery) -> Result<StatusReport>;
}

/// Generic adapter reading a board's public lookup page.
pub struct ScrapingAdapter {
    entry: Arc<StateEntry>,
    fetcher: Arc<dyn PageFetcher>,
}

impl ScrapingAdapter {
    /// Create an adapter for `entry` fetching through `fetcher`.
    #[must_use]
    pub fn new(entry: Arc<StateEntry>, fetcher: Arc<dyn PageFetcher>) -> Self {
        Self { entry, fetcher }
    }

    /// Pick the endpoint for a query: license lookup first, then name lookup.
    fn endpoint(&self, query: &LookupQuery) -> Option<&LookupConfig> {
        let config = &self.entry.config;
        let by_license = query
            .license_number
            .as_ref()
            .and(config.lookup.as_ref());
        let by_name = query
            .business_name
            .as_ref()
            .and(config.name_lookup.as_ref());
        by_license.or(by_name)
    }

    /// Search form step for JavaScript-only states, when the fetcher can
    /// drive a browser. Name searches need a configured name input.
    fn search_step(&self, query: &LookupQuery) -> Option<SearchStep> {
        let config = &self.entry.config;
        if !config.requires_javascript || !self.fetcher.supports_javascript() {
            return None;
        }
        let form = &config.search_form;
        let (input, value) = match (&query.license_number, &query.business_name) {
            (Some(license), _) => (form.license_input.clone(), license.clone()),
            (None, Some(name)) => (form.name_input.clone()?, name.trim().to_string()),
            (None, None) => return None,
        };
        Some(SearchStep {
            input,
            value,
            submit: form.submit.clone(),
        })
    }

    /// Build the page request for a query, or `None` if the state cannot be
    /// looked up automatically.
    ///
    /// A configured endpoint is used when there is one. Otherwise a
    /// JavaScript-only state is searched through its verification page.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the substituted URL is not valid.
    pub fn build_request(&self, query: &LookupQuery) -> Result<Option<PageRequest>> {
        let Some(endpoint) = self.endpoint(query) else {
            return Ok(self.search_step(query).map(|search| PageRequest {
                method: HttpMethod::Get,
                url: self.entry.config.verification_url.clone(),
                form: Vec::new(),
                search: Some(search),
            }));
        };

        let license = query.license_number.as_deref().unwrap_or("");
        let name = query.business_name.as_deref().map_or("", str::trim);

        let url = fill_template(&endpoint.url, license, name, true);
        url::Url::parse(&url).map_err(|e| {
            Error::Config(format!("{} lookup URL '{url}' is invalid: {e}", self.state()))
        })?;

        let form = match endpoint.method {
            HttpMethod::Get => Vec::new(),
            HttpMethod::Post => endpoint
                .form
                .iter()
                .map(|(k, v)| (k.clone(), fill_template(v, license, name, false)))
                .collect(),
        };

        Ok(Some(PageRequest {
            method: endpoint.method,
            url,
            form,
            search: None,
        }))
    }

    fn read_page(&self, page: FetchedPage) -> StatusReport {
        let text = extract::page_text(&page.body);
        let record = extract::extract(&text, &self.entry.fields);
        let status = extract::classify(&record, Utc::now().date_naive());
        debug!(
            "{} page read: status={:?} raw={:?}",
            self.state(),
            status,
            record.status_text
        );

        let listed_active = record
            .status_text
            .as_deref()
            .is_some_and(|s| extract::classify_status_text(s) == LicenseStatus::Active);
        let message = match status {
            LicenseStatus::Unknown => {
                Some("Status could not be read from the board's page".to_string())
            }
            LicenseStatus::Expired if listed_active => {
                Some("Listed as active but the expiration date has passed".to_string())
            }
            _ => None,
        };

        StatusReport {
            status,
            licensee_name: record.licensee_name,
            expiration_date: record.expiration_date,
            license_type: record.license_type,
            raw_status: record.status_text,
            source: ResultSource::Live,
            source_url: page.url.clone(),
            page: Some(page),
            message,
        }
    }
}

#[async_trait]
impl StateAdapter for ScrapingAdapter {
    fn state(&self) -> StateCode {
        self.entry.code()
    }

    fn check_format(&self, license_number: &str) -> FormatCheck {
        check_format(&self.entry, license_number)
    }

    fn is_automated(&self, query: &LookupQuery) -> bool {
        let js_ok = !self.entry.config.requires_javascript || self.fetcher.supports_javascript();
        js_ok && (self.endpoint(query).is_some() || self.search_step(query).is_some())
    }

    async fn fetch_status(&self, query: &LookupQuery) -> Result<StatusReport> {
        let config = &self.entry.config;

        if config.requires_javascript && !self.fetcher.supports_javascript() {
            return Ok(StatusReport::manual(
                &config.verification_url,
                format!(
                    "{} ({}) requires a JavaScript-capable browser; verify manually",
                    config.agency, config.code
                ),
            ));
        }

        let Some(request) = self.build_request(query)? else {
            return Ok(StatusReport::manual(
                &config.verification_url,
                format!(
                    "{} has no automated lookup for this query; verify manually",
                    config.code
                ),
            ));
        };

        debug!(
            "Fetching {} {:?} {} (search={})",
            config.code,
            request.method,
            request.url,
            request.search.is_some()
        );
        let page = self.fetcher.fetch(&request).await?;
        Ok(self.read_page(page))
    }
}

/// Substitute `{license}` and `{name}` in a template.
fn fill_template(template: &str, license: &str, name: &str, encode: bool) -> String {
    let encoded = |value: &str| {
        if encode {
            url::form_urlencoded::byte_serialize(value.as_bytes()).collect::<String>()
        } else {
            value.to_string()
        }
    };
    template
        .replace("{license}", &encoded(license))
        .replace("{name}", &encoded(name))
}
