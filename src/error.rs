//! Error types for license-verifier.

use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors produced by the verifier.
#[derive(Debug, Error)]
pub enum Error {
    /// Filesystem error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid or unreadable configuration.
    #[error("Configuration error: {0}")]
    Config(String),

    /// State code not present in the registry.
    #[error("Unsupported state: {0}")]
    UnsupportedState(String),

    /// Request is missing required fields or is otherwise malformed.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// A state's license or field pattern failed to compile.
    #[error("Invalid pattern for {state}: {source}")]
    Pattern {
        /// State the pattern belongs to.
        state: String,
        /// Underlying regex error.
        #[source]
        source: regex::Error,
    },

    /// Transport-level failure talking to a licensing board.
    #[error("Network error: {0}")]
    Network(String),

    /// Licensing board answered with a non-success status.
    #[error("HTTP {status} from {url}")]
    HttpStatus {
        /// Status code returned.
        status: u16,
        /// Requested URL.
        url: String,
    },

    /// Cache backend failure.
    #[error("Cache error: {0}")]
    Cache(String),

    /// JSON encoding or decoding failure.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Batch exceeds the configured size limit.
    #[error("Batch of {size} requests exceeds the limit of {max}")]
    BatchTooLarge {
        /// Requested batch size.
        size: usize,
        /// Configured maximum.
        max: usize,
    },
}

impl Error {
    /// Whether retrying the same request may succeed.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Network(_) => true,
            Self::HttpStatus { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization(e.to_string())
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Self::Network(e.to_string())
    }
}
