//! Integration tests for license-verifier.
//!
//! Every test drives a real [`LicenseVerifier`] through a scripted page
//! fetcher, so no licensing board is contacted.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

mod batch_tests;
mod harness;
mod verification_tests;

pub use harness::{ScriptedFetcher, TestHarness, ACTIVE_PAGE, NOT_FOUND_PAGE, SCREENSHOT};
