//! License number format validation.
//!
//! Pure functions over the compiled state table: no I/O, no network.

use crate::states::{StateCode, StateEntry};
use serde::{Deserialize, Serialize};

/// Outcome of a format check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FormatOutcome {
    /// Number matches the state's pattern.
    Valid,
    /// Number does not match the state's pattern.
    Invalid,
    /// State has no known pattern; the number cannot be rejected.
    NoPattern,
}

/// Result of checking a license number against its state's format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormatCheck {
    /// State checked against.
    pub state: StateCode,
    /// Normalized license number.
    pub license_number: String,
    /// Outcome.
    pub outcome: FormatOutcome,
    /// Pattern used, as configured.
    pub pattern: Option<String>,
    /// Human-readable format description.
    pub format: String,
    /// Example of a well-formed number.
    pub example: Option<String>,
}

impl FormatCheck {
    /// True only when the number positively matched.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.outcome == FormatOutcome::Valid
    }

    /// True unless the number was positively rejected.
    #[must_use]
    pub fn is_acceptable(&self) -> bool {
        self.outcome != FormatOutcome::Invalid
    }
}

/// Normalize a license number: drop all whitespace and uppercase.
#[must_use]
pub fn normalize_license_number(raw: &str) -> String {
    raw.chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_uppercase)
        .collect()
}

/// Check `license_number` against the state's pattern.
///
/// The number is normalized first; the pattern must match all of it.
#[must_use]
pub fn check_format(entry: &StateEntry, license_number: &str) -> FormatCheck {
    let normalized = normalize_license_number(license_number);
    let outcome = match &entry.pattern {
        None => FormatOutcome::NoPattern,
        Some(_) if normalized.is_empty() => FormatOutcome::Invalid,
        Some(re) if re.is_match(&normalized) => FormatOutcome::Valid,
        Some(_) => FormatOutcome::Invalid,
    };

    FormatCheck {
        state: entry.code(),
        license_number: normalized,
        outcome,
        pattern: entry.config.license_pattern.clone(),
        format: entry.config.format.clone(),
        example: entry.config.example.clone(),
    }
}
