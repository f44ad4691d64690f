//! Command-line tool for cake (.cak) game archives.
//!
//! The tool is a thin layer over `cake-formats`:
//! - `unpack-cak`: extract every file of a cake
//! - `unpack-file`: extract one file by archive path
//! - `pack`: bake a directory tree into a cake
//! - `dump-toc`: print the header, sections and entry tables (text or JSON)
//! - `derive-key`: print the XOR key a file name yields per version
//!
//! # Example
//!
//! ```no_run
//! use caketool::{CliConfig, commands};
//!
//! fn main() -> anyhow::Result<()> {
//!     let config = CliConfig::from_args();
//!     config.validate()?;
//!     commands::run(&config)
//! }
//! ```

#![warn(missing_docs)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod commands;
pub mod config;
pub mod dump;
pub mod error;

pub use config::{CliConfig, Command, PackArgs};
pub use dump::TocDump;
pub use error::ConfigError;
