//! Verification requests and results.

use crate::evidence::Evidence;
use crate::format::FormatCheck;
use crate::states::StateCode;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// License standing reported by a licensing board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LicenseStatus {
    /// Current and in good standing.
    Active,
    /// Past its expiration date or lapsed.
    Expired,
    /// Temporarily suspended.
    Suspended,
    /// Revoked by the board.
    Revoked,
    /// Inactive, cancelled, retired or otherwise not in force.
    Inactive,
    /// The board has no record of the license.
    NotFound,
    /// Number does not match the state's format; not looked up.
    InvalidFormat,
    /// Could not be determined.
    Unknown,
}

impl LicenseStatus {
    /// Whether this status is a definitive answer from the board.
    #[must_use]
    pub fn is_definitive(&self) -> bool {
        !matches!(self, Self::Unknown | Self::InvalidFormat)
    }
}

/// Where a result came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultSource {
    /// Fetched from the licensing board just now.
    Live,
    /// Served from the result cache.
    Cache,
    /// Rejected by format validation without a lookup.
    FormatOnly,
    /// No automated lookup available; check the verification URL by hand.
    Manual,
}

/// A verification request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LicenseRequest {
    /// Two-letter state code.
    pub state: String,
    /// License number to verify.
    #[serde(default)]
    pub license_number: Option<String>,
    /// Business name to search when no number is known.
    #[serde(default)]
    pub business_name: Option<String>,
    /// Capture the fetched page as evidence.
    #[serde(default)]
    pub capture_evidence: bool,
}

impl LicenseRequest {
    /// Request to verify a license number.
    #[must_use]
    pub fn new(state: impl Into<String>, license_number: impl Into<String>) -> Self {
        Self {
            state: state.into(),
            license_number: Some(license_number.into()),
            ..Self::default()
        }
    }

    /// Request to search by business name.
    #[must_use]
    pub fn by_business_name(state: impl Into<String>, business_name: impl Into<String>) -> Self {
        Self {
            state: state.into(),
            business_name: Some(business_name.into()),
            ..Self::default()
        }
    }

    /// Ask for evidence capture.
    #[must_use]
    pub fn with_evidence(mut self) -> Self {
        self.capture_evidence = true;
        self
    }
}

/// Structured verification result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerificationResult {
    /// State verified against.
    pub state: StateCode,
    /// Normalized license number, if one was given.
    pub license_number: Option<String>,
    /// Business name searched, if any.
    pub business_name: Option<String>,
    /// License standing.
    pub status: LicenseStatus,
    /// Whether the board gave a definitive answer.
    pub verified: bool,
    /// Licensee or business name as shown by the board.
    pub licensee_name: Option<String>,
    /// Expiration date as shown by the board.
    pub expiration_date: Option<NaiveDate>,
    /// License type or classification as shown by the board.
    pub license_type: Option<String>,
    /// Status text exactly as shown by the board.
    pub raw_status: Option<String>,
    /// Format validation performed before the lookup.
    pub format_check: Option<FormatCheck>,
    /// Page to verify manually.
    pub verification_url: String,
    /// When the lookup happened.
    pub checked_at: DateTime<Utc>,
    /// Where the result came from.
    pub source: ResultSource,
    /// Captured page evidence.
    pub evidence: Option<Evidence>,
    /// Additional explanation.
    pub message: Option<String>,
}

/// Outcome of one request in a batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum BatchOutcome {
    /// Verification completed.
    Verified {
        /// The result.
        result: Box<VerificationResult>,
    },
    /// Verification failed.
    Failed {
        /// The request as submitted.
        request: LicenseRequest,
        /// Error description.
        error: String,
    },
}

impl BatchOutcome {
    /// Result, if verification completed.
    #[must_use]
    pub fn result(&self) -> Option<&VerificationResult> {
        match self {
            Self::Verified { result } => Some(&**result),
            Self::Failed { .. } => None,
        }
    }
}

/// Counts over a batch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchSummary {
    /// Requests in the batch.
    pub total: usize,
    /// Results with a definitive board answer.
    pub verified: usize,
    /// Active licenses.
    pub active: usize,
    /// Expired licenses.
    pub expired: usize,
    /// Malformed or unknown license numbers.
    pub invalid: usize,
    /// Requests that failed.
    pub errors: usize,
}

impl BatchSummary {
    /// Tally a set of outcomes.
    #[must_use]
    pub fn from_outcomes(outcomes: &[BatchOutcome]) -> Self {
        let mut summary = Self {
            total: outcomes.len(),
            ..Self::default()
        };
        for outcome in outcomes {
            let Some(result) = outcome.result() else {
                summary.errors += 1;
                continue;
            };
            if result.verified {
                summary.verified += 1;
            }
            match result.status {
                LicenseStatus::Active => summary.active += 1,
                LicenseStatus::Expired => summary.expired += 1,
                LicenseStatus::InvalidFormat | LicenseStatus::NotFound => summary.invalid += 1,
                _ => {}
            }
        }
        summary
    }
}

/// Results of a batch, in request order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchReport {
    /// Per-request outcomes.
    pub results: Vec<BatchOutcome>,
    /// Counts.
    pub summary: BatchSummary,
}
