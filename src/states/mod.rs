//! State codes and per-state lookup configuration.
//!
//! Every supported jurisdiction is described by a [`StateConfig`]: where its
//! public lookup lives, what its license numbers look like and how to read
//! the result page. The built-in table ships inside the crate as TOML and
//! can be replaced with a user file (see [`StateRegistry::from_file`]).

mod registry;

pub use registry::{StateEntry, StateRegistry};

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Two-letter uppercase state code (e.g. `CA`, `DC`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StateCode([u8; 2]);

impl StateCode {
    /// The code as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        // Constructed only from ASCII letters.
        std::str::from_utf8(&self.0).unwrap_or("??")
    }
}

impl FromStr for StateCode {
    type Err = crate::Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        let trimmed = s.trim();
        let bytes = trimmed.as_bytes();
        if bytes.len() != 2 || !bytes.iter().all(u8::is_ascii_alphabetic) {
            return Err(crate::Error::UnsupportedState(format!(
                "'{trimmed}' is not a 2-letter state code"
            )));
        }
        Ok(Self([
            bytes[0].to_ascii_uppercase(),
            bytes[1].to_ascii_uppercase(),
        ]))
    }
}

impl fmt::Display for StateCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for StateCode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for StateCode {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// HTTP method used by a lookup endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HttpMethod {
    /// Query-string lookup.
    #[default]
    Get,
    /// Form-encoded POST lookup.
    Post,
}

/// A lookup endpoint.
///
/// `url` and the `form` values are templates: `{license}` and `{name}` are
/// replaced with the normalized license number and the business name.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LookupConfig {
    /// Request method.
    #[serde(default)]
    pub method: HttpMethod,
    /// URL template.
    pub url: String,
    /// Form fields for POST lookups.
    #[serde(default)]
    pub form: BTreeMap<String, String>,
}

/// Search form on a state's verification page.
///
/// Used when the lookup only works in a browser and no direct endpoint is
/// known: the page is opened, the input filled in and the form submitted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchForm {
    /// CSS selector of the license number input.
    #[serde(default = "default_license_input")]
    pub license_input: String,
    /// CSS selector of the business name input, if the page has one.
    #[serde(default)]
    pub name_input: Option<String>,
    /// CSS selector of the submit button. Enter is pressed when unset.
    #[serde(default)]
    pub submit: Option<String>,
}

impl Default for SearchForm {
    fn default() -> Self {
        Self {
            license_input: default_license_input(),
            name_input: None,
            submit: None,
        }
    }
}

fn default_license_input() -> String {
    "input[type=text], input[type=search], input:not([type])".to_string()
}

/// Regex overrides for reading a state's result page.
///
/// Each pattern must contain one capture group holding the field value.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FieldOverrides {
    /// License status.
    #[serde(default)]
    pub status: Option<String>,
    /// Licensee or business name.
    #[serde(default)]
    pub licensee: Option<String>,
    /// Expiration date.
    #[serde(default)]
    pub expiration: Option<String>,
    /// License type or classification.
    #[serde(default)]
    pub license_type: Option<String>,
}

/// Configuration for one state's licensing board.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateConfig {
    /// State code.
    pub code: StateCode,
    /// Full state name.
    pub name: String,
    /// Licensing agency.
    pub agency: String,
    /// Kind of license checked.
    pub license_type: String,
    /// Human-readable license number format.
    pub format: String,
    /// License number pattern, matched against the whole normalized number.
    #[serde(default)]
    pub license_pattern: Option<String>,
    /// Example license number.
    #[serde(default)]
    pub example: Option<String>,
    /// Public verification page for manual checks.
    pub verification_url: String,
    /// Whether the lookup only works in a JavaScript-capable browser.
    #[serde(default)]
    pub requires_javascript: bool,
    /// Free-form notes.
    #[serde(default)]
    pub notes: Option<String>,
    /// License-number lookup endpoint.
    #[serde(default)]
    pub lookup: Option<LookupConfig>,
    /// Business-name lookup endpoint.
    #[serde(default)]
    pub name_lookup: Option<LookupConfig>,
    /// Browser search form, for JavaScript-only states.
    #[serde(default)]
    pub search_form: SearchForm,
    /// Result page field overrides.
    #[serde(default)]
    pub fields: FieldOverrides,
    /// Extra phrases meaning "no such license" on this state's pages.
    #[serde(default)]
    pub not_found_markers: Vec<String>,
}

/// Public summary of a supported state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateInfo {
    /// State code.
    pub code: StateCode,
    /// Full state name.
    pub name: String,
    /// Licensing agency.
    pub agency: String,
    /// Kind of license checked.
    pub license_type: String,
    /// License number format.
    pub format: String,
    /// Example license number.
    pub example: Option<String>,
    /// Public verification page.
    pub verification_url: String,
    /// Lookups need a JavaScript-capable browser.
    pub requires_javascript: bool,
    /// License numbers can be looked up over plain HTTP.
    pub automated_lookup: bool,
    /// Business names can be searched over plain HTTP.
    pub name_search: bool,
    /// Notes.
    pub notes: Option<String>,
}

impl From<&StateConfig> for StateInfo {
    fn from(config: &StateConfig) -> Self {
        let http = !config.requires_javascript;
        Self {
            code: config.code,
            name: config.name.clone(),
            agency: config.agency.clone(),
            license_type: config.license_type.clone(),
            format: config.format.clone(),
            example: config.example.clone(),
            verification_url: config.verification_url.clone(),
            requires_javascript: config.requires_javascript,
            automated_lookup: http && config.lookup.is_some(),
            name_search: http && config.name_lookup.is_some(),
            notes: config.notes.clone(),
        }
    }
}
