//! license-verify CLI entry point.

mod cli;

use clap::Parser;
use cli::{CacheCommand, Cli, CliLogFormat, Command};
use color_eyre::eyre::WrapErr;
use license_verifier::{LicenseRequest, LicenseVerifier};
use serde::Serialize;
use tracing::debug;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
    // Initialize error handling
    color_eyre::install()?;

    // Parse CLI arguments
    let Cli { global, command } = Cli::parse();

    // Initialize tracing. Logs go to stderr; stdout carries the JSON output.
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&global.log_level));
    let registry = tracing_subscriber::registry().with(filter);
    match global.log_format {
        CliLogFormat::Text => registry
            .with(fmt::layer().with_writer(std::io::stderr))
            .init(),
        CliLogFormat::Json => registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init(),
    }

    debug!("license-verify v{}", env!("CARGO_PKG_VERSION"));

    // Build configuration
    let config = global.into_config()?;

    if let Command::Config { output } = &command {
        return match output {
            Some(path) => config
                .to_file(path)
                .wrap_err_with(|| format!("failed to write {}", path.display())),
            None => {
                println!("{}", toml::to_string_pretty(&config)?);
                Ok(())
            }
        };
    }

    let verifier = LicenseVerifier::new(config)?;
    run(&verifier, command).await
}

async fn run(verifier: &LicenseVerifier, command: Command) -> color_eyre::Result<()> {
    match command {
        Command::Verify {
            state,
            license,
            business_name,
            evidence,
        } => {
            let request = LicenseRequest {
                state,
                license_number: license,
                business_name,
                capture_evidence: evidence,
            };
            print_json(&verifier.verify(&request).await?)
        }
        Command::Batch { file } => {
            let content = std::fs::read_to_string(&file)
                .wrap_err_with(|| format!("failed to read {}", file.display()))?;
            let requests: Vec<LicenseRequest> = serde_json::from_str(&content)
                .wrap_err_with(|| format!("{} is not a JSON array of requests", file.display()))?;
            print_json(&verifier.verify_batch(requests).await?)
        }
        Command::Validate { state, license } => {
            print_json(&verifier.validate_format(&state, &license)?)
        }
        Command::States => print_json(&verifier.supported_states()),
        Command::State { code } => print_json(&verifier.state_info(&code)?),
        Command::Examples => print_json(&verifier.examples()),
        Command::Cache { action } => match action {
            CacheCommand::Stats => print_json(&verifier.cache_stats().map(|stats| {
                serde_json::json!({
                    "hits": stats.hits,
                    "misses": stats.misses,
                    "insertions": stats.insertions,
                    "expired": stats.expired,
                    "entries": stats.entries,
                    "size_bytes": stats.size_bytes,
                    "hit_rate": stats.hit_rate(),
                })
            })),
            CacheCommand::Clear => {
                let removed = verifier.clear_cache()?;
                print_json(&serde_json::json!({ "removed": removed }))
            }
        },
        Command::Config { .. } => Ok(()),
    }
}

fn print_json<T: Serialize>(value: &T) -> color_eyre::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
