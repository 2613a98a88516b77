//! Page evidence capture.
//!
//! Stores the licensing board's page exactly as fetched, alongside its
//! SHA-256 digest, so a verification can be audited later. Browser fetches
//! also leave a PNG screenshot next to the HTML.

use crate::adapter::FetchedPage;
use crate::error::Result;
use crate::states::StateCode;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::PathBuf;
use tracing::debug;

/// Longest subject fragment kept in a file name.
const MAX_SUBJECT_LEN: usize = 48;

/// A captured page snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Evidence {
    /// Snapshot file.
    pub path: PathBuf,
    /// Hex SHA-256 of the snapshot contents.
    pub sha256: String,
    /// PNG screenshot of the rendered page.
    #[serde(default)]
    pub screenshot: Option<PathBuf>,
    /// URL the page was fetched from.
    pub url: String,
    /// When the snapshot was written.
    pub captured_at: DateTime<Utc>,
}

/// Writes page snapshots into a directory.
#[derive(Debug, Clone)]
pub struct EvidenceStore {
    dir: PathBuf,
}

impl EvidenceStore {
    /// Create a store rooted at `dir`. The directory is created on first capture.
    #[must_use]
    pub fn new(dir: PathBuf) -> Self {
        debug!("Evidence store at {}", dir.display());
        Self { dir }
    }

    /// Write `page` to disk and return its evidence record.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory or file cannot be written.
    pub async fn capture(
        &self,
        state: StateCode,
        subject: &str,
        page: &FetchedPage,
    ) -> Result<Evidence> {
        tokio::fs::create_dir_all(&self.dir).await?;

        let captured_at = Utc::now();
        let stem = format!(
            "{state}_{}_{}",
            sanitize_subject(subject),
            captured_at.format("%Y%m%dT%H%M%S%.3fZ")
        );
        let path = self.dir.join(format!("{stem}.html"));

        tokio::fs::write(&path, page.body.as_bytes()).await?;
        let sha256 = hex::encode(Sha256::digest(page.body.as_bytes()));
        debug!("Captured evidence {} ({})", path.display(), sha256);

        let screenshot = match &page.screenshot {
            Some(png) => {
                let png_path = self.dir.join(format!("{stem}.png"));
                tokio::fs::write(&png_path, png).await?;
                debug!("Captured screenshot {} ({} bytes)", png_path.display(), png.len());
                Some(png_path)
            }
            None => None,
        };

        Ok(Evidence {
            path,
            sha256,
            screenshot,
            url: page.url.clone(),
            captured_at,
        })
    }
}

fn sanitize_subject(subject: &str) -> String {
    let cleaned: String = subject
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '-' })
        .take(MAX_SUBJECT_LEN)
        .collect();
    if cleaned.is_empty() {
        "lookup".to_string()
    } else {
        cleaned
    }
}
