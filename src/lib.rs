//! # license-verifier
//!
//! Contractor license verification against U.S. state licensing boards.
//!
//! A request names a state and a license number (or a business name). The
//! verifier checks the number's format against the state's known pattern,
//! looks for a fresh cached answer, and otherwise asks the state board's
//! public lookup page, pacing requests per state.
//!
//! Most boards answer plain HTTP requests. Boards whose lookup only works in
//! a browser are searched with headless Chromium when the crate is built
//! with the `browser` feature and `browser.enabled` is set; otherwise they
//! come back as manual results pointing at the board's page.
//!
//! ## Verification flow
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                  verify(LicenseRequest)                     │
//! ├─────────────────────────────────────────────────────────────┤
//! │                                                             │
//! │  1. Resolve state ──> unknown ──> Error::UnsupportedState   │
//! │         │                                                   │
//! │  2. Format check ──> mismatch ──> InvalidFormat (no lookup) │
//! │         │                                                   │
//! │  3. Result cache ──> fresh hit ──> return (source=cache)    │
//! │         │                                                   │
//! │  4. Rate limiter (per state)                                │
//! │         │                                                   │
//! │  5. State adapter ──> fetch page ──> extract ──> classify   │
//! │         │                                                   │
//! │  6. Evidence (optional) ──> cache live result ──> return    │
//! │                                                             │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Example
//!
//! ```no_run
//! use license_verifier::{LicenseRequest, LicenseVerifier, VerifierConfig};
//!
//! # async fn run() -> license_verifier::Result<()> {
//! let verifier = LicenseVerifier::new(VerifierConfig::default())?;
//! let result = verifier
//!     .verify(&LicenseRequest::new("CA", "927123"))
//!     .await?;
//! println!("{:?}: {:?}", result.status, result.licensee_name);
//! # Ok(())
//! # }
//! ```

pub mod adapter;
pub mod cache;
pub mod config;
pub mod error;
pub mod evidence;
pub mod format;
pub mod rate_limit;
pub mod result;
pub mod states;
pub mod verifier;

#[cfg(feature = "browser")]
pub use adapter::BrowserFetcher;
pub use adapter::{HttpFetcher, PageFetcher, ScrapingAdapter, StateAdapter};
pub use cache::{CacheStats, FileCache, MemoryCache, ResultCache};
pub use config::VerifierConfig;
pub use error::{Error, Result};
pub use format::{check_format, normalize_license_number, FormatCheck, FormatOutcome};
pub use rate_limit::StateRateLimiter;
pub use result::{
    BatchOutcome, BatchReport, BatchSummary, LicenseRequest, LicenseStatus, ResultSource,
    VerificationResult,
};
pub use states::{StateCode, StateInfo, StateRegistry};
pub use verifier::{LicenseVerifier, VerifierBuilder};
