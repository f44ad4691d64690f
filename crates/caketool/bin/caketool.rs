//! caketool binary entry point.
//!
//! This is a thin wrapper around the caketool library that:
//! 1. Parses command-line arguments
//! 2. Initializes logging
//! 3. Validates configuration
//! 4. Runs the subcommand

use anyhow::Result;
use caketool::{CliConfig, ConfigError, commands};
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    // Parse configuration from CLI args and environment
    let config = CliConfig::from_args();

    // Initialize tracing subscriber for logging
    let filter = match &config.log_level {
        Some(level) => EnvFilter::try_new(level).map_err(|e| ConfigError::InvalidLogLevel {
            level: level.clone(),
            reason: e.to_string(),
        })?,
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    // Validate configuration
    config.validate()?;

    commands::run(&config)
}
