//! Batch verification.

use super::{ScriptedFetcher, TestHarness, ACTIVE_PAGE, NOT_FOUND_PAGE};
use license_verifier::{BatchOutcome, BatchSummary, Error, LicenseRequest, LicenseStatus};

#[tokio::test]
async fn test_batch_preserves_order_and_summarizes() {
    let harness = TestHarness::setup();
    let requests = vec![
        LicenseRequest::new("CA", "927123"),
        LicenseRequest::new("FL", "123456"),
        LicenseRequest::new("XX", "1"),
        LicenseRequest::new("OR", "123456"),
        LicenseRequest::new("TX", "12345"),
    ];

    let report = harness.verifier.verify_batch(requests).await.unwrap();
    assert_eq!(report.results.len(), 5);

    let states: Vec<Option<&str>> = report
        .results
        .iter()
        .map(|o| o.result().map(|r| r.state.as_str()))
        .collect();
    assert_eq!(
        states,
        vec![Some("CA"), Some("FL"), None, Some("OR"), Some("TX")]
    );

    match &report.results[2] {
        BatchOutcome::Failed { request, error } => {
            assert_eq!(request.state, "XX");
            assert!(error.contains("XX"));
        }
        BatchOutcome::Verified { .. } => panic!("XX should fail"),
    }

    assert_eq!(
        report.summary,
        BatchSummary {
            total: 5,
            verified: 3,
            active: 3,
            expired: 0,
            invalid: 1,
            errors: 1,
        }
    );
    assert_eq!(harness.fetcher.call_count(), 3);
}

#[tokio::test]
async fn test_batch_counts_not_found_as_invalid() {
    let harness = TestHarness::setup_with(ScriptedFetcher::new(ACTIVE_PAGE), |_| {});
    harness
        .verifier
        .verify(&LicenseRequest::new("CA", "927123"))
        .await
        .unwrap();
    harness.fetcher.set_body(NOT_FOUND_PAGE);

    let report = harness
        .verifier
        .verify_batch(vec![
            LicenseRequest::new("CA", "927123"),
            LicenseRequest::new("CA", "555555"),
        ])
        .await
        .unwrap();

    let statuses: Vec<LicenseStatus> = report
        .results
        .iter()
        .filter_map(|o| o.result().map(|r| r.status))
        .collect();
    assert_eq!(statuses, vec![LicenseStatus::Active, LicenseStatus::NotFound]);
    assert_eq!(report.summary.active, 1);
    assert_eq!(report.summary.invalid, 1);
}

#[tokio::test]
async fn test_batch_too_large() {
    let harness = TestHarness::setup_with(ScriptedFetcher::new(ACTIVE_PAGE), |config| {
        config.batch.max_size = 3;
    });
    let requests = vec![LicenseRequest::new("CA", "927123"); 4];

    let err = harness
        .verifier
        .verify_batch(requests)
        .await
        .expect_err("too large");
    assert!(matches!(err, Error::BatchTooLarge { size: 4, max: 3 }));
    assert_eq!(harness.fetcher.call_count(), 0);
}

#[tokio::test]
async fn test_default_batch_limit_is_fifty() {
    let harness = TestHarness::setup();
    let requests = vec![LicenseRequest::new("CA", "ABC"); 51];
    let err = harness.verifier.verify_batch(requests).await.expect_err("51");
    assert_eq!(
        err.to_string(),
        "Batch of 51 requests exceeds the limit of 50"
    );

    let requests = vec![LicenseRequest::new("CA", "ABC"); 50];
    let report = harness.verifier.verify_batch(requests).await.unwrap();
    assert_eq!(report.summary.total, 50);
    assert_eq!(report.summary.invalid, 50);
}

#[tokio::test]
async fn test_empty_batch() {
    let harness = TestHarness::setup();
    let report = harness.verifier.verify_batch(Vec::new()).await.unwrap();
    assert!(report.results.is_empty());
    assert_eq!(report.summary, BatchSummary::default());
}
