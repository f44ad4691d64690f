//! Error types for the command-line tool.

use std::path::PathBuf;
use thiserror::Error;

/// Configuration-related errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Input file does not exist
    #[error("File '{0}' does not exist")]
    MissingInput(PathBuf),

    /// Pack source is not a directory
    #[error("Source '{0}' is not a directory")]
    NotADirectory(PathBuf),

    /// Sectors per chunk outside the encodable range
    #[error("Invalid sectors per chunk {0}: must be between 1 and 16383")]
    InvalidSectorsPerChunk(u16),

    /// Log filter directive could not be parsed
    #[error("Invalid log level '{level}': {reason}")]
    InvalidLogLevel {
        /// The rejected directive
        level: String,
        /// Parser message
        reason: String,
    },
}
