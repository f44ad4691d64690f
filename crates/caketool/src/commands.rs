//! Subcommand implementations.
//!
//! Each command is a thin wrapper over the `cake-formats` reader or builder.

use crate::config::{CliConfig, Command, PackArgs, default_output_dir};
use crate::dump::TocDump;
use anyhow::{Context, Result, anyhow};
use cake_formats::archive::path;
use cake_formats::util::format_size;
use cake_formats::{CakeArchive, CakeBuilder, CakeVersion, derive_xor_key};
use std::fs::{self, File};
use std::path::Path;
use tracing::{info, warn};

/// Run the configured subcommand.
///
/// # Errors
///
/// Returns an error if the cake cannot be opened, built or written.
pub fn run(config: &CliConfig) -> Result<()> {
    match &config.command {
        Command::UnpackCak { input, output } => unpack_cak(config, input, output.as_deref()),
        Command::UnpackFile {
            input,
            file,
            output,
        } => unpack_file(config, input, file, output.as_deref()),
        Command::Pack(args) => pack(config, args),
        Command::DumpToc { input, json } => dump_toc(config, input, *json),
        Command::DeriveKey { name, version } => {
            derive_key(name, *version);
            Ok(())
        }
    }
}

fn open(config: &CliConfig, input: &Path) -> Result<CakeArchive<File>> {
    CakeArchive::open_with_options(input, config.open_options())
        .with_context(|| format!("Failed to open cake '{}'", input.display()))
}

fn unpack_cak(config: &CliConfig, input: &Path, output: Option<&Path>) -> Result<()> {
    let output = output.map_or_else(|| default_output_dir(input), Path::to_path_buf);
    let mut archive = open(config, input)?;
    if archive.is_external() {
        warn!(
            "Cake is marked as external, there are no files to unpack. Its files are stored outside the cake archive."
        );
        return Ok(());
    }

    info!("Starting unpack process into '{}'.", output.display());
    let summary = archive
        .extract_all(&output)
        .context("Failed to unpack")?;
    for (file_path, reason) in &summary.skipped {
        warn!("Skipped {file_path}: {reason}");
    }
    info!(
        "Done. {} files, {} ({} skipped).",
        summary.extracted,
        format_size(summary.bytes),
        summary.skipped.len()
    );
    Ok(())
}

fn unpack_file(config: &CliConfig, input: &Path, file: &str, output: Option<&Path>) -> Result<()> {
    let output = output.map_or_else(|| default_output_dir(input), Path::to_path_buf);
    let mut archive = open(config, input)?;
    if archive.is_external() {
        warn!(
            "Cake is marked as external, there are no files to unpack. Its files are stored outside the cake archive."
        );
        return Ok(());
    }

    info!("Starting unpack process.");
    let index = archive
        .file_index(file)
        .ok_or_else(|| anyhow!("File '{file}' was not found in cake archive"))?;
    let archive_path = archive.file_path(index)?;
    let target = path::safe_join(&output, &archive_path)
        .ok_or_else(|| anyhow!("'{archive_path}' escapes the output directory"))?;
    let data = archive
        .extract_entry(index)
        .with_context(|| format!("Failed to unpack '{archive_path}'"))?;

    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(&target, &data).with_context(|| format!("Failed to write '{}'", target.display()))?;
    info!(
        "File extracted successfully to '{}' ({}).",
        target.display(),
        format_size(data.len() as u64)
    );
    Ok(())
}

fn pack(config: &CliConfig, args: &PackArgs) -> Result<()> {
    let mut builder = CakeBuilder::new(args.builder_options(config.codec));
    builder
        .register_directory(&args.input)
        .with_context(|| format!("Failed to index '{}'", args.input.display()))?;
    let summary = builder
        .bake(&args.output)
        .with_context(|| format!("Failed to bake '{}'", args.output.display()))?;
    info!(
        "Baked {} files in {} directories ({} compressed), {}.",
        summary.files,
        summary.dirs,
        summary.compressed,
        format_size(summary.size)
    );
    Ok(())
}

fn dump_toc(config: &CliConfig, input: &Path, json: bool) -> Result<()> {
    let archive = open(config, input)?;
    let dump = TocDump::from_archive(&archive)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&dump)?);
    } else {
        print!("{}", dump.render());
    }
    Ok(())
}

fn derive_key(name: &str, version: Option<CakeVersion>) {
    let versions = version.map_or_else(|| CakeVersion::ALL.to_vec(), |v| vec![v]);
    for version in versions {
        println!("{version}\t{}", key_column(name, version));
    }
}

fn key_column(name: &str, version: CakeVersion) -> String {
    match derive_xor_key(name, version) {
        Ok(key) => format!("{key:#010x}"),
        Err(_) => "no key schedule".to_string(),
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use clap::Parser;
    use pretty_assertions::assert_eq;

    fn config(args: &[&str]) -> CliConfig {
        let mut full = vec!["caketool"];
        full.extend_from_slice(args);
        CliConfig::try_parse_from(full).unwrap()
    }

    #[test]
    fn test_pack_then_unpack() {
        let temp = tempfile::tempdir().unwrap();
        let source = temp.path().join("game");
        fs::create_dir_all(source.join("levels")).unwrap();
        fs::write(source.join("levels/one.txt"), "level one\n".repeat(100)).unwrap();
        fs::write(source.join("readme.txt"), b"hi").unwrap();

        let cake = temp.path().join("game.cak");
        let pack_config = config(&[
            "pack",
            "-i",
            source.to_str().unwrap(),
            "-o",
            cake.to_str().unwrap(),
            "--cake-version",
            "9.2",
            "--encrypt-header",
        ]);
        pack_config.validate().unwrap();
        run(&pack_config).unwrap();
        assert!(cake.is_file());

        let unpack_config = config(&["unpack-cak", "-i", cake.to_str().unwrap()]);
        unpack_config.validate().unwrap();
        run(&unpack_config).unwrap();
        let out = temp.path().join("game.extracted");
        assert_eq!(
            fs::read_to_string(out.join("levels/one.txt")).unwrap(),
            "level one\n".repeat(100)
        );
        assert_eq!(fs::read(out.join("readme.txt")).unwrap(), b"hi");

        let single = temp.path().join("single");
        let file_config = config(&[
            "unpack-file",
            "-i",
            cake.to_str().unwrap(),
            "-f",
            "LEVELS/ONE.TXT",
            "-o",
            single.to_str().unwrap(),
        ]);
        run(&file_config).unwrap();
        assert!(single.join("levels/one.txt").is_file());
    }

    #[test]
    fn test_unpack_missing_file_fails() {
        let temp = tempfile::tempdir().unwrap();
        let source = temp.path().join("src");
        fs::create_dir_all(&source).unwrap();
        fs::write(source.join("a.txt"), b"a").unwrap();
        let cake = temp.path().join("a.cak");
        run(&config(&[
            "pack",
            "-i",
            source.to_str().unwrap(),
            "-o",
            cake.to_str().unwrap(),
        ]))
        .unwrap();

        let result = run(&config(&[
            "unpack-file",
            "-i",
            cake.to_str().unwrap(),
            "-f",
            "b.txt",
        ]));
        assert!(result.is_err());
    }

    #[test]
    fn test_key_column() {
        assert_eq!(key_column("data.cak", CakeVersion::V9_1), "0xa259f07a");
        assert_eq!(key_column("data.cak", CakeVersion::V8_7), "no key schedule");
    }

    #[test]
    fn test_pack_with_file_encryption_fails_cleanly() {
        let temp = tempfile::tempdir().unwrap();
        let source = temp.path().join("src");
        fs::create_dir_all(&source).unwrap();
        fs::write(source.join("a.txt"), b"a").unwrap();
        let cake = temp.path().join("a.cak");

        let result = run(&config(&[
            "pack",
            "-i",
            source.to_str().unwrap(),
            "-o",
            cake.to_str().unwrap(),
            "--encrypt-files",
        ]));
        assert!(result.is_err());
        assert!(!cake.exists());
    }
}
