//! Single-request verification through the full pipeline.

use super::{ScriptedFetcher, TestHarness, ACTIVE_PAGE, NOT_FOUND_PAGE, SCREENSHOT};
use async_trait::async_trait;
use license_verifier::adapter::{LookupQuery, StateAdapter, StatusReport};
use license_verifier::config::CacheBackend;
use license_verifier::format::{check_format, FormatCheck};
use license_verifier::{
    Error, LicenseRequest, LicenseStatus, LicenseVerifier, ResultSource, StateCode,
    StateRegistry,
};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use std::time::{Duration, Instant};

#[tokio::test]
async fn test_live_lookup_reads_page() {
    let harness = TestHarness::setup();
    let result = harness
        .verifier
        .verify(&LicenseRequest::new("CA", "927123"))
        .await
        .unwrap();

    assert_eq!(result.status, LicenseStatus::Active);
    assert_eq!(result.source, ResultSource::Live);
    assert!(result.verified);
    assert_eq!(result.licensee_name.as_deref(), Some("ACME BUILDERS INC"));
    assert_eq!(
        result.license_type.as_deref(),
        Some("B - General Building Contractor")
    );
    assert_eq!(
        result.expiration_date,
        chrono::NaiveDate::from_ymd_opt(2099, 12, 31)
    );
    assert!(result.verification_url.contains("LicNum=927123"));

    let requests = harness.fetcher.requests();
    assert_eq!(requests.len(), 1);
    assert!(requests[0].url.starts_with("https://www.cslb.ca.gov/"));
}

#[tokio::test]
async fn test_cache_hit_avoids_second_lookup() {
    let harness = TestHarness::setup();
    let request = LicenseRequest::new("FL", "CGC1524312");

    let first = harness.verifier.verify(&request).await.unwrap();
    let second = harness.verifier.verify(&request).await.unwrap();

    assert_eq!(first.source, ResultSource::Live);
    assert_eq!(second.source, ResultSource::Cache);
    assert_eq!(second.licensee_name, first.licensee_name);
    assert_eq!(harness.fetcher.call_count(), 1);

    let stats = harness.verifier.cache_stats().unwrap();
    assert_eq!(stats.hits, 1);
    assert_eq!(stats.entries, 1);
}

#[tokio::test]
async fn test_invalid_format_is_not_looked_up_or_cached() {
    let harness = TestHarness::setup();

    for _ in 0..2 {
        let result = harness
            .verifier
            .verify(&LicenseRequest::new("FL", "123456"))
            .await
            .unwrap();
        assert_eq!(result.status, LicenseStatus::InvalidFormat);
        assert_eq!(result.source, ResultSource::FormatOnly);
        let check = result.format_check.unwrap();
        assert_eq!(check.example.as_deref(), Some("CGC1524312"));
    }

    assert_eq!(harness.fetcher.call_count(), 0);
    assert_eq!(harness.verifier.cache_stats().unwrap().entries, 0);
}

#[tokio::test]
async fn test_not_found_page() {
    let harness = TestHarness::setup_with(ScriptedFetcher::new(NOT_FOUND_PAGE), |_| {});
    let result = harness
        .verifier
        .verify(&LicenseRequest::new("OR", "123456"))
        .await
        .unwrap();

    assert_eq!(result.status, LicenseStatus::NotFound);
    assert!(result.verified);
}

#[tokio::test]
async fn test_active_license_past_expiration_is_expired() {
    let page = "<p>Status: Active</p><p>Expiration Date: 01/15/2020</p>";
    let harness = TestHarness::setup_with(ScriptedFetcher::new(page), |_| {});
    let result = harness
        .verifier
        .verify(&LicenseRequest::new("TX", "12345"))
        .await
        .unwrap();

    assert_eq!(result.status, LicenseStatus::Expired);
    assert_eq!(result.raw_status.as_deref(), Some("Active"));
    assert!(result.message.is_some());
}

#[tokio::test]
async fn test_business_name_search() {
    let harness = TestHarness::setup();
    let result = harness
        .verifier
        .verify(&LicenseRequest::by_business_name("FL", "  Sunshine Roofing "))
        .await
        .unwrap();

    assert_eq!(result.business_name.as_deref(), Some("Sunshine Roofing"));
    assert!(result.license_number.is_none());
    assert!(result.format_check.is_none());
    assert_eq!(result.status, LicenseStatus::Active);

    let requests = harness.fetcher.requests();
    assert!(requests[0].url.contains("Sunshine+Roofing"));

    // Business names are cached case-insensitively.
    let again = harness
        .verifier
        .verify(&LicenseRequest::by_business_name("fl", "SUNSHINE ROOFING"))
        .await
        .unwrap();
    assert_eq!(again.source, ResultSource::Cache);
    assert_eq!(harness.fetcher.call_count(), 1);
}

#[tokio::test]
async fn test_business_name_search_reads_result_list() {
    let page = "<table>\
        <tr><th>License #</th><th>Name</th><th>Status</th><th>Expiration Date</th></tr>\
        <tr><td>CGC1524312</td><td>SUNSHINE ROOFING LLC</td><td>Inactive</td><td>01/01/2020</td></tr>\
        </table>";
    let harness = TestHarness::setup_with(ScriptedFetcher::new(page), |_| {});
    let result = harness
        .verifier
        .verify(&LicenseRequest::by_business_name("FL", "Sunshine Roofing"))
        .await
        .unwrap();

    assert_eq!(result.status, LicenseStatus::Inactive);
    assert_eq!(result.licensee_name.as_deref(), Some("SUNSHINE ROOFING LLC"));
    assert_eq!(result.raw_status.as_deref(), Some("Inactive"));
}

#[tokio::test]
async fn test_negated_status_is_not_active() {
    let page = "<p>Name: ACME BUILDERS INC</p><p>License Status: Not Active</p>";
    let harness = TestHarness::setup_with(ScriptedFetcher::new(page), |_| {});
    let result = harness
        .verifier
        .verify(&LicenseRequest::new("TX", "12345"))
        .await
        .unwrap();

    assert_eq!(result.status, LicenseStatus::Inactive);
    assert_eq!(result.raw_status.as_deref(), Some("Not Active"));
}

#[tokio::test]
async fn test_javascript_state_returns_manual_result() {
    let harness = TestHarness::setup();
    let registry = StateRegistry::builtin().unwrap();
    let entry = registry
        .iter()
        .find(|e| e.config.requires_javascript)
        .expect("a JavaScript-only state");
    let license = entry.config.example.clone().unwrap();
    let request = LicenseRequest::new(entry.code().as_str(), license);

    let result = harness.verifier.verify(&request).await.unwrap();
    assert_eq!(result.source, ResultSource::Manual);
    assert_eq!(result.status, LicenseStatus::Unknown);
    assert!(!result.verified);
    assert_eq!(result.verification_url, entry.config.verification_url);

    // Manual results are never cached.
    let again = harness.verifier.verify(&request).await.unwrap();
    assert_eq!(again.source, ResultSource::Manual);
    assert_eq!(harness.fetcher.call_count(), 0);
}

#[tokio::test]
async fn test_unsupported_state_and_empty_request() {
    let harness = TestHarness::setup();

    let err = harness
        .verifier
        .verify(&LicenseRequest::new("PR", "123456"))
        .await
        .expect_err("unsupported");
    assert!(matches!(err, Error::UnsupportedState(_)));

    let err = harness
        .verifier
        .verify(&LicenseRequest::by_business_name("CA", "   "))
        .await
        .expect_err("empty");
    assert!(matches!(err, Error::InvalidRequest(_)));
}

#[tokio::test]
async fn test_rate_limit_spaces_requests_to_same_state() {
    let harness = TestHarness::setup_with(ScriptedFetcher::new(ACTIVE_PAGE), |config| {
        config.rate_limit.min_interval_ms = 300;
    });

    harness
        .verifier
        .verify(&LicenseRequest::new("CA", "111111"))
        .await
        .unwrap();
    harness
        .verifier
        .verify(&LicenseRequest::new("CA", "222222"))
        .await
        .unwrap();

    assert_eq!(harness.fetcher.call_count(), 2);
    assert!(
        harness.fetcher.span() >= Duration::from_millis(250),
        "requests only {:?} apart",
        harness.fetcher.span()
    );
}

#[tokio::test]
async fn test_rate_limit_is_per_state() {
    let harness = TestHarness::setup_with(ScriptedFetcher::new(ACTIVE_PAGE), |config| {
        config.rate_limit.min_interval_ms = 5_000;
    });

    let started = Instant::now();
    for (state, license) in [("CA", "927123"), ("OR", "123456"), ("TX", "12345")] {
        harness
            .verifier
            .verify(&LicenseRequest::new(state, license))
            .await
            .unwrap();
    }
    assert!(started.elapsed() < Duration::from_secs(2));
}

#[tokio::test]
async fn test_transient_failures_are_retried() {
    let fetcher = ScriptedFetcher::failing(ACTIVE_PAGE, 2, 503);
    let harness = TestHarness::setup_with(fetcher, |config| config.http.max_retries = 2);

    let result = harness
        .verifier
        .verify(&LicenseRequest::new("CA", "927123"))
        .await
        .unwrap();
    assert_eq!(result.status, LicenseStatus::Active);
    assert_eq!(harness.fetcher.call_count(), 3);
}

#[tokio::test]
async fn test_retries_exhausted() {
    let fetcher = ScriptedFetcher::failing(ACTIVE_PAGE, 5, 429);
    let harness = TestHarness::setup_with(fetcher, |config| config.http.max_retries = 1);

    let err = harness
        .verifier
        .verify(&LicenseRequest::new("CA", "927123"))
        .await
        .expect_err("still failing");
    assert!(matches!(err, Error::HttpStatus { status: 429, .. }));
    assert_eq!(harness.fetcher.call_count(), 2);
    assert_eq!(harness.verifier.cache_stats().unwrap().entries, 0);
}

#[tokio::test]
async fn test_javascript_state_verified_with_browser() {
    let harness = TestHarness::setup_with(ScriptedFetcher::browser(ACTIVE_PAGE), |_| {});
    let registry = StateRegistry::builtin().unwrap();
    let entry = registry
        .iter()
        .find(|e| e.config.requires_javascript)
        .expect("a JavaScript-only state");
    let license = entry.config.example.clone().unwrap();
    let request = LicenseRequest::new(entry.code().as_str(), license.as_str()).with_evidence();

    let result = harness.verifier.verify(&request).await.unwrap();
    assert_eq!(result.source, ResultSource::Live);
    assert_eq!(result.status, LicenseStatus::Active);
    assert!(result.verified);

    let requests = harness.fetcher.requests();
    assert_eq!(requests[0].url, entry.config.verification_url);
    assert_eq!(
        requests[0].search.as_ref().map(|s| s.value.as_str()),
        result.license_number.as_deref()
    );

    let evidence = result.evidence.expect("evidence captured");
    let shot = evidence.screenshot.expect("screenshot saved");
    assert_eq!(std::fs::read(shot).unwrap(), SCREENSHOT);

    let again = harness.verifier.verify(&request).await.unwrap();
    assert_eq!(again.source, ResultSource::Cache);
    assert_eq!(harness.fetcher.call_count(), 1);
}

#[tokio::test]
async fn test_permanent_failure_is_not_retried() {
    let fetcher = ScriptedFetcher::failing(ACTIVE_PAGE, 1, 404);
    let harness = TestHarness::setup_with(fetcher, |config| config.http.max_retries = 3);

    let err = harness
        .verifier
        .verify(&LicenseRequest::new("CA", "927123"))
        .await
        .expect_err("404");
    assert!(!err.is_transient());
    assert_eq!(harness.fetcher.call_count(), 1);
}

#[tokio::test]
async fn test_evidence_capture_on_request() {
    let harness = TestHarness::setup();
    let result = harness
        .verifier
        .verify(&LicenseRequest::new("CA", "927123").with_evidence())
        .await
        .unwrap();

    let evidence = result.evidence.expect("evidence captured");
    assert!(evidence.path.starts_with(harness.dir.path().join("evidence")));
    let saved = std::fs::read_to_string(&evidence.path).unwrap();
    assert_eq!(saved, ACTIVE_PAGE);
    assert_eq!(evidence.sha256, hex::encode(Sha256::digest(saved.as_bytes())));

    let plain = harness
        .verifier
        .verify(&LicenseRequest::new("CA", "111111"))
        .await
        .unwrap();
    assert!(plain.evidence.is_none());
}

#[tokio::test]
async fn test_evidence_enabled_globally() {
    let harness = TestHarness::setup_with(ScriptedFetcher::new(ACTIVE_PAGE), |config| {
        config.evidence.enabled = true;
    });
    let result = harness
        .verifier
        .verify(&LicenseRequest::new("OR", "123456"))
        .await
        .unwrap();
    assert!(result.evidence.is_some());
}

#[tokio::test]
async fn test_file_cache_survives_new_verifier() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = TestHarness::config(&dir);
    config.cache.backend = CacheBackend::File;

    let first_fetcher = ScriptedFetcher::new(ACTIVE_PAGE);
    let first = LicenseVerifier::builder(config.clone())
        .fetcher(first_fetcher.clone())
        .build()
        .unwrap();
    first
        .verify(&LicenseRequest::new("WA", first_example("WA")))
        .await
        .unwrap();
    drop(first);

    let second_fetcher = ScriptedFetcher::new(NOT_FOUND_PAGE);
    let second = LicenseVerifier::builder(config)
        .fetcher(second_fetcher.clone())
        .build()
        .unwrap();
    let result = second
        .verify(&LicenseRequest::new("WA", first_example("WA")))
        .await
        .unwrap();

    assert_eq!(result.source, ResultSource::Cache);
    assert_eq!(result.status, LicenseStatus::Active);
    assert_eq!(first_fetcher.call_count(), 1);
    assert_eq!(second_fetcher.call_count(), 0);

    assert_eq!(second.clear_cache().unwrap(), 1);
    assert_eq!(second.cache_stats().unwrap().entries, 0);
}

fn first_example(state: &str) -> String {
    let registry = StateRegistry::builtin().unwrap();
    registry
        .resolve(state)
        .unwrap()
        .config
        .example
        .clone()
        .unwrap()
}

/// Adapter answering every lookup as revoked.
struct RevokedAdapter {
    state: StateCode,
}

#[async_trait]
impl StateAdapter for RevokedAdapter {
    fn state(&self) -> StateCode {
        self.state
    }

    fn check_format(&self, license_number: &str) -> FormatCheck {
        let registry = StateRegistry::builtin().unwrap();
        check_format(registry.get(self.state).unwrap(), license_number)
    }

    async fn fetch_status(&self, _query: &LookupQuery) -> license_verifier::Result<StatusReport> {
        Ok(StatusReport {
            status: LicenseStatus::Revoked,
            licensee_name: Some("FLY BY NIGHT LLC".to_string()),
            expiration_date: None,
            license_type: None,
            raw_status: Some("Revoked".to_string()),
            source: ResultSource::Live,
            source_url: "https://board.example.gov/detail".to_string(),
            page: None,
            message: None,
        })
    }
}

#[tokio::test]
async fn test_custom_adapter_overrides_state() {
    let dir = tempfile::tempdir().unwrap();
    let fetcher = ScriptedFetcher::new(ACTIVE_PAGE);
    let nv: StateCode = "NV".parse().unwrap();
    let verifier = LicenseVerifier::builder(TestHarness::config(&dir))
        .fetcher(fetcher.clone())
        .adapter(Arc::new(RevokedAdapter { state: nv }))
        .build()
        .unwrap();

    let result = verifier
        .verify(&LicenseRequest::new("NV", first_example("NV")))
        .await
        .unwrap();
    assert_eq!(result.status, LicenseStatus::Revoked);
    assert!(result.verified);
    assert_eq!(fetcher.call_count(), 0);

    // Other states still use the page adapter.
    verifier
        .verify(&LicenseRequest::new("CA", "927123"))
        .await
        .unwrap();
    assert_eq!(fetcher.call_count(), 1);
}

#[tokio::test]
async fn test_custom_adapter_for_unknown_state_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let registry = StateRegistry::from_toml_str(
        r#"
        [[state]]
        code = "CA"
        name = "California"
        agency = "Contractors State License Board"
        license_type = "Contractor License"
        format = "6-8 digits"
        license_pattern = '\d{6,8}'
        verification_url = "https://www.cslb.ca.gov"
        "#,
    )
    .unwrap();

    let result = LicenseVerifier::builder(TestHarness::config(&dir))
        .registry(registry)
        .fetcher(ScriptedFetcher::new(ACTIVE_PAGE))
        .adapter(Arc::new(RevokedAdapter {
            state: "NV".parse().unwrap(),
        }))
        .build();
    assert!(matches!(result, Err(Error::Config(_))));
}

#[tokio::test]
async fn test_states_file_replaces_registry() {
    let dir = tempfile::tempdir().unwrap();
    let states_file = dir.path().join("states.toml");
    std::fs::write(
        &states_file,
        r#"
        [[state]]
        code = "ZZ"
        name = "Testland"
        agency = "Testland Contractor Board"
        license_type = "Contractor"
        format = "ZZ followed by 4 digits"
        license_pattern = 'ZZ\d{4}'
        example = "ZZ1234"
        verification_url = "https://board.testland.gov/search"

        [state.lookup]
        url = "https://board.testland.gov/search?license={license}"
        "#,
    )
    .unwrap();

    let mut config = TestHarness::config(&dir);
    config.states_file = Some(states_file);
    let fetcher = ScriptedFetcher::new(ACTIVE_PAGE);
    let verifier = LicenseVerifier::builder(config)
        .fetcher(fetcher.clone())
        .build()
        .unwrap();

    assert_eq!(verifier.supported_states().len(), 1);
    let result = verifier
        .verify(&LicenseRequest::new("zz", "zz1234"))
        .await
        .unwrap();
    assert_eq!(result.status, LicenseStatus::Active);
    assert_eq!(
        fetcher.requests()[0].url,
        "https://board.testland.gov/search?license=ZZ1234"
    );
    assert!(verifier
        .verify(&LicenseRequest::new("CA", "927123"))
        .await
        .is_err());
}
