//! Command-line configuration.
//!
//! Settings come from CLI arguments with environment fallbacks:
//! - `CAKETOOL_LOG`: log filter, overrides `RUST_LOG`
//! - `CAKETOOL_CODEC`: block codec for compressed chunks (`lz4` or `zlib`)
//! - `CAKETOOL_FORCE_NO_ENCRYPTION`: ignore encryption flags when opening
//!
//! # Example
//!
//! ```no_run
//! use caketool::CliConfig;
//!
//! let config = CliConfig::from_args();
//! config.validate().expect("Invalid configuration");
//! ```

use crate::error::ConfigError;
use cake_formats::chunk::{DEFAULT_SECTORS_PER_CHUNK, MIN_COMPRESS_SIZE};
use cake_formats::{BuilderOptions, CakeVersion, Codec, OpenOptions, RegistryType};
use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};

const MAX_SECTORS_PER_CHUNK: u16 = 0x3FFF;

/// Tool configuration loaded from CLI args and environment variables.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "caketool",
    about = "Unpack, pack and inspect cake (.cak) game archives",
    version
)]
pub struct CliConfig {
    /// Log filter (e.g. `debug`, `cake_formats=trace`); defaults to `RUST_LOG` or `info`
    #[arg(long, global = true, env = "CAKETOOL_LOG")]
    pub log_level: Option<String>,

    /// Block codec for compressed chunks
    #[arg(long, global = true, env = "CAKETOOL_CODEC", default_value = "lz4")]
    pub codec: Codec,

    /// Ignore the encryption flags of the cake header
    #[arg(long, global = true, env = "CAKETOOL_FORCE_NO_ENCRYPTION")]
    pub force_no_encryption: bool,

    /// Operation to run
    #[command(subcommand)]
    pub command: Command,
}

/// Subcommands.
#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Unpacks all files from a cake (.cak) archive
    UnpackCak {
        /// Input .cak file
        #[arg(short, long)]
        input: PathBuf,

        /// Output directory, defaults to `<name>.extracted` next to the cake
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Unpacks a specific file from a cake (.cak) archive
    UnpackFile {
        /// Input .cak file
        #[arg(short, long)]
        input: PathBuf,

        /// Archive path of the file to unpack
        #[arg(short, long)]
        file: String,

        /// Output directory, defaults to `<name>.extracted` next to the cake
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Bakes a directory into a cake (.cak) archive
    Pack(PackArgs),

    /// Prints the header, sections and entry tables of a cake
    DumpToc {
        /// Input .cak file
        #[arg(short, long)]
        input: PathBuf,

        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// Prints the XOR key derived from a cake file name
    DeriveKey {
        /// Bare cake file name, e.g. `data.cak`
        name: String,

        /// Only this version; all versions when omitted
        #[arg(long = "cake-version")]
        version: Option<CakeVersion>,
    },
}

/// Arguments of the `pack` subcommand.
#[derive(Debug, Clone, Args)]
pub struct PackArgs {
    /// Source directory
    #[arg(short, long)]
    pub input: PathBuf,

    /// Output .cak file; its name seeds the key schedule
    #[arg(short, long)]
    pub output: PathBuf,

    /// Format version to write
    #[arg(long = "cake-version", default_value = "9.2")]
    pub version: CakeVersion,

    /// Encrypt the header table and sections (9.1 and 9.2 only)
    #[arg(long)]
    pub encrypt_header: bool,

    /// Encrypt file payloads; not supported by any version yet
    #[arg(long)]
    pub encrypt_files: bool,

    /// Sectors of 256 bytes per compression chunk
    #[arg(long, default_value_t = DEFAULT_SECTORS_PER_CHUNK)]
    pub sectors_per_chunk: u16,

    /// Smallest file size that is compressed
    #[arg(long, default_value_t = MIN_COMPRESS_SIZE)]
    pub min_compress_size: u64,

    /// Write an external registry (TOC only, no payloads)
    #[arg(long)]
    pub external: bool,

    /// Origin name recorded in 9.x cakes, defaults to the source directory name
    #[arg(long)]
    pub origin: Option<String>,
}

impl CliConfig {
    /// Parse configuration from command-line arguments.
    #[must_use]
    pub fn from_args() -> Self {
        Self::parse()
    }

    /// Options for opening cakes.
    pub fn open_options(&self) -> OpenOptions {
        OpenOptions::default()
            .with_force_no_encryption(self.force_no_encryption)
            .with_codec(self.codec)
    }

    /// Validate configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - An input cake doesn't exist
    /// - The pack source is not a directory
    /// - Sectors per chunk is 0 or does not fit the 14-bit flag field
    pub fn validate(&self) -> Result<(), ConfigError> {
        match &self.command {
            Command::UnpackCak { input, .. }
            | Command::UnpackFile { input, .. }
            | Command::DumpToc { input, .. } => {
                if !input.is_file() {
                    return Err(ConfigError::MissingInput(input.clone()));
                }
            }
            Command::Pack(args) => {
                if !args.input.is_dir() {
                    return Err(ConfigError::NotADirectory(args.input.clone()));
                }
                if args.sectors_per_chunk == 0 || args.sectors_per_chunk > MAX_SECTORS_PER_CHUNK {
                    return Err(ConfigError::InvalidSectorsPerChunk(args.sectors_per_chunk));
                }
            }
            Command::DeriveKey { .. } => {}
        }
        Ok(())
    }
}

impl PackArgs {
    /// Builder options for these arguments.
    pub fn builder_options(&self, codec: Codec) -> BuilderOptions {
        let registry_type = if self.external {
            RegistryType::External
        } else {
            RegistryType::Regular
        };
        let options = BuilderOptions::new(self.version)
            .with_registry_type(registry_type)
            .with_header_encryption(self.encrypt_header)
            .with_file_encryption(self.encrypt_files)
            .with_sectors_per_chunk(self.sectors_per_chunk)
            .with_compression_min_size(self.min_compress_size)
            .with_codec(codec);
        match &self.origin {
            Some(origin) => options.with_origin(origin.clone()),
            None => options,
        }
    }
}

/// `<dir>/<stem>.extracted` for an input cake.
pub fn default_output_dir(input: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "cake".to_string());
    input
        .parent()
        .unwrap_or_else(|| Path::new(""))
        .join(format!("{stem}.extracted"))
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_unpack_cak() {
        let config =
            CliConfig::try_parse_from(["caketool", "unpack-cak", "-i", "data.cak"]).unwrap();
        assert_eq!(config.codec, Codec::Lz4);
        assert!(!config.force_no_encryption);
        match config.command {
            Command::UnpackCak { input, output } => {
                assert_eq!(input, PathBuf::from("data.cak"));
                assert_eq!(output, None);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_parse_pack_defaults() {
        let config =
            CliConfig::try_parse_from(["caketool", "pack", "-i", "src", "-o", "out.cak"]).unwrap();
        let Command::Pack(args) = config.command else {
            panic!("expected pack");
        };
        assert_eq!(args.version, CakeVersion::V9_2);
        assert_eq!(args.sectors_per_chunk, DEFAULT_SECTORS_PER_CHUNK);
        assert_eq!(args.min_compress_size, MIN_COMPRESS_SIZE);

        let options = args.builder_options(Codec::Zlib);
        assert_eq!(options.version, CakeVersion::V9_2);
        assert_eq!(options.registry_type, RegistryType::Regular);
        assert_eq!(options.codec.name(), "zlib");
        assert!(!options.header_encryption);
    }

    #[test]
    fn test_parse_global_flags_after_subcommand() {
        let config = CliConfig::try_parse_from([
            "caketool",
            "dump-toc",
            "-i",
            "data.cak",
            "--json",
            "--codec",
            "zlib",
            "--force-no-encryption",
        ])
        .unwrap();
        assert_eq!(config.codec, Codec::Zlib);
        assert!(config.force_no_encryption);
        assert!(config.open_options().force_no_encryption);
    }

    #[test]
    fn test_rejects_unknown_version() {
        assert!(
            CliConfig::try_parse_from(["caketool", "derive-key", "a.cak", "--cake-version", "7.1"])
                .is_err()
        );
    }

    #[test]
    fn test_validate() {
        let temp = tempfile::tempdir().unwrap();
        let missing = CliConfig::try_parse_from([
            "caketool",
            "unpack-cak",
            "-i",
            temp.path().join("nope.cak").to_str().unwrap(),
        ])
        .unwrap();
        assert!(matches!(missing.validate(), Err(ConfigError::MissingInput(_))));

        let bad_sectors = CliConfig::try_parse_from([
            "caketool",
            "pack",
            "-i",
            temp.path().to_str().unwrap(),
            "-o",
            "out.cak",
            "--sectors-per-chunk",
            "0",
        ])
        .unwrap();
        assert!(matches!(
            bad_sectors.validate(),
            Err(ConfigError::InvalidSectorsPerChunk(0))
        ));
    }

    #[test]
    fn test_default_output_dir() {
        assert_eq!(
            default_output_dir(Path::new("/games/data.cak")),
            PathBuf::from("/games/data.extracted")
        );
        assert_eq!(
            default_output_dir(Path::new("data.cak")),
            PathBuf::from("data.extracted")
        );
    }
}
