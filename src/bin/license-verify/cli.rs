//! Command-line interface definition.

use clap::{Args, Parser, Subcommand, ValueEnum};
use license_verifier::config::{CacheBackend, VerifierConfig};
use std::path::PathBuf;

/// Verify contractor licenses against U.S. state licensing boards.
#[derive(Parser, Debug)]
#[command(name = "license-verify")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Options shared by every command.
    #[command(flatten)]
    pub global: GlobalArgs,

    /// Command to run.
    #[command(subcommand)]
    pub command: Command,
}

/// Options shared by every command.
#[derive(Args, Debug)]
pub struct GlobalArgs {
    /// Path to configuration file.
    #[arg(long, short, global = true, env = "LICENSE_VERIFY_CONFIG")]
    pub config: Option<PathBuf>,

    /// Log level.
    #[arg(long, global = true, default_value = "info", env = "RUST_LOG")]
    pub log_level: String,

    /// Log output format.
    #[arg(long, global = true, value_enum, default_value = "text", env = "LICENSE_VERIFY_LOG_FORMAT")]
    pub log_format: CliLogFormat,

    /// Result cache backend.
    #[arg(long, global = true, value_enum, env = "LICENSE_VERIFY_CACHE")]
    pub cache: Option<CliCacheBackend>,

    /// Directory for cached results (implies the file backend).
    #[arg(long, global = true, env = "LICENSE_VERIFY_CACHE_DIR")]
    pub cache_dir: Option<PathBuf>,

    /// Disable the result cache.
    #[arg(long, global = true)]
    pub no_cache: bool,

    /// TOML file replacing the built-in state table.
    #[arg(long, global = true, env = "LICENSE_VERIFY_STATES_FILE")]
    pub states_file: Option<PathBuf>,

    /// Minimum delay between requests to the same state, in milliseconds.
    #[arg(long, global = true, env = "LICENSE_VERIFY_MIN_INTERVAL_MS")]
    pub min_interval_ms: Option<u64>,

    /// Directory for captured evidence pages.
    #[arg(long, global = true, env = "LICENSE_VERIFY_EVIDENCE_DIR")]
    pub evidence_dir: Option<PathBuf>,

    /// Fetch pages with headless Chromium (needs the `browser` feature).
    #[arg(long, global = true)]
    pub browser: bool,

    /// Chromium or Chrome binary for --browser (implies --browser).
    #[arg(long, global = true, env = "LICENSE_VERIFY_CHROMIUM")]
    pub chromium: Option<PathBuf>,

    /// Run Chromium without its sandbox.
    #[arg(long, global = true)]
    pub no_sandbox: bool,
}

/// Available commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Verify one license.
    Verify {
        /// Two-letter state code.
        #[arg(long, short)]
        state: String,

        /// License number.
        #[arg(long, short, required_unless_present = "business_name")]
        license: Option<String>,

        /// Business name (searched when no license number is given).
        #[arg(long, short = 'n')]
        business_name: Option<String>,

        /// Save the board's page as evidence.
        #[arg(long)]
        evidence: bool,
    },

    /// Verify a JSON array of requests.
    Batch {
        /// File containing `[{"state": "CA", "license_number": "927123"}, ...]`.
        file: PathBuf,
    },

    /// Check a license number's format without looking it up.
    Validate {
        /// Two-letter state code.
        #[arg(long, short)]
        state: String,

        /// License number.
        #[arg(long, short)]
        license: String,
    },

    /// List supported states.
    States,

    /// Show details for one state.
    State {
        /// Two-letter state code.
        code: String,
    },

    /// Show an example license number for every state.
    Examples,

    /// Inspect or clear the result cache.
    Cache {
        /// Cache action.
        #[command(subcommand)]
        action: CacheCommand,
    },

    /// Print the effective configuration, or write it to a file.
    Config {
        /// File to write the configuration to.
        #[arg(long, short)]
        output: Option<PathBuf>,
    },
}

/// Cache actions.
#[derive(Subcommand, Debug, Clone, Copy)]
pub enum CacheCommand {
    /// Show cache statistics.
    Stats,
    /// Remove every cached result.
    Clear,
}

/// Log format CLI enum.
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum CliLogFormat {
    /// Human-readable lines.
    Text,
    /// One JSON object per line.
    Json,
}

/// Cache backend CLI enum.
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum CliCacheBackend {
    /// In-process LRU (lives only as long as the command).
    Memory,
    /// JSON files on disk.
    File,
    /// No caching.
    Disabled,
}

impl GlobalArgs {
    /// Convert CLI arguments into a VerifierConfig.
    ///
    /// # Errors
    ///
    /// Returns an error if a config file is specified but cannot be loaded.
    pub fn into_config(self) -> color_eyre::Result<VerifierConfig> {
        // Start with default config or load from file
        let mut config = if let Some(ref path) = self.config {
            VerifierConfig::from_file(path)?
        } else {
            VerifierConfig::default()
        };

        // Override with CLI arguments
        config.log_level = self.log_level;

        if let Some(backend) = self.cache {
            config.cache.backend = backend.into();
        }
        if let Some(dir) = self.cache_dir {
            config.cache.dir = dir;
            if self.cache.is_none() {
                config.cache.backend = CacheBackend::File;
            }
        }
        if self.no_cache {
            config.cache.backend = CacheBackend::Disabled;
        }

        if self.states_file.is_some() {
            config.states_file = self.states_file;
        }
        if let Some(ms) = self.min_interval_ms {
            config.rate_limit.min_interval_ms = ms;
        }
        if let Some(dir) = self.evidence_dir {
            config.evidence.dir = dir;
        }

        if self.browser || self.chromium.is_some() {
            config.browser.enabled = true;
        }
        if self.chromium.is_some() {
            config.browser.executable = self.chromium;
        }
        if self.no_sandbox {
            config.browser.no_sandbox = true;
        }

        Ok(config)
    }
}

impl From<CliCacheBackend> for CacheBackend {
    fn from(b: CliCacheBackend) -> Self {
        match b {
            CliCacheBackend::Memory => CacheBackend::Memory,
            CliCacheBackend::File => CacheBackend::File,
            CliCacheBackend::Disabled => CacheBackend::Disabled,
        }
    }
}
