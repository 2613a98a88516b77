//! Registry of supported states.

use super::{StateCode, StateConfig};
use crate::adapter::extract::FieldPatterns;
use crate::error::{Error, Result};
use regex::Regex;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

/// Built-in table covering the 50 states and DC.
const BUILTIN_STATES: &str = include_str!("states.toml");

#[derive(Deserialize)]
struct StatesFile {
    #[serde(rename = "state", default)]
    states: Vec<StateConfig>,
}

/// A state's configuration with its patterns compiled.
#[derive(Debug)]
pub struct StateEntry {
    /// Raw configuration.
    pub config: StateConfig,
    /// Anchored license number pattern.
    pub pattern: Option<Regex>,
    /// Result page field patterns.
    pub fields: FieldPatterns,
}

impl StateEntry {
    /// Compile a state's configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the license pattern or a field override is not a
    /// valid regex.
    pub fn compile(config: StateConfig) -> Result<Self> {
        let state = config.code.to_string();
        let pattern = config
            .license_pattern
            .as_deref()
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(|p| {
                Regex::new(&format!("^(?:{p})$")).map_err(|source| Error::Pattern {
                    state: state.clone(),
                    source,
                })
            })
            .transpose()?;
        let fields =
            FieldPatterns::with_overrides(&config.fields, &config.not_found_markers, &state)?;

        Ok(Self {
            config,
            pattern,
            fields,
        })
    }

    /// State code.
    #[must_use]
    pub fn code(&self) -> StateCode {
        self.config.code
    }
}

/// Lookup table of compiled state configurations.
#[derive(Debug, Clone)]
pub struct StateRegistry {
    entries: BTreeMap<StateCode, Arc<StateEntry>>,
}

impl StateRegistry {
    /// Load the built-in registry.
    ///
    /// # Errors
    ///
    /// Returns an error if the embedded table is malformed.
    pub fn builtin() -> Result<Self> {
        Self::from_toml_str(BUILTIN_STATES)
    }

    /// Load a registry from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is malformed.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let registry = Self::from_toml_str(&content)?;
        info!(
            "Loaded {} states from {}",
            registry.len(),
            path.display()
        );
        Ok(registry)
    }

    /// Parse a registry from TOML text containing `[[state]]` tables.
    ///
    /// # Errors
    ///
    /// Returns an error on TOML errors, invalid patterns or duplicate codes.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let file: StatesFile =
            toml::from_str(content).map_err(|e| Error::Config(e.to_string()))?;

        let mut entries = BTreeMap::new();
        for config in file.states {
            let code = config.code;
            let entry = StateEntry::compile(config)?;
            if entries.insert(code, Arc::new(entry)).is_some() {
                return Err(Error::Config(format!("duplicate state entry: {code}")));
            }
        }

        debug!("State registry compiled ({} entries)", entries.len());
        Ok(Self { entries })
    }

    /// Look up a state.
    #[must_use]
    pub fn get(&self, code: StateCode) -> Option<&Arc<StateEntry>> {
        self.entries.get(&code)
    }

    /// Look up a state by its textual code.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnsupportedState`] if the code is malformed or unknown.
    pub fn resolve(&self, code: &str) -> Result<&Arc<StateEntry>> {
        let parsed: StateCode = code.parse()?;
        self.get(parsed)
            .ok_or_else(|| Error::UnsupportedState(parsed.to_string()))
    }

    /// Supported codes in alphabetical order.
    #[must_use]
    pub fn codes(&self) -> Vec<StateCode> {
        self.entries.keys().copied().collect()
    }

    /// Iterate entries in code order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<StateEntry>> {
        self.entries.values()
    }

    /// Number of supported states.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the registry is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
