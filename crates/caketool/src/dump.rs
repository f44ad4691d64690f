//! Table of contents dumps for `dump-toc`.

use cake_formats::toc::Section;
use cake_formats::{CakeArchive, CakeResult};
use serde::Serialize;
use std::fmt::Write as _;
use std::io::{Read, Seek};

/// Everything the TOC of one cake says.
#[derive(Debug, Clone, Serialize)]
pub struct TocDump {
    /// Format version
    pub version: String,
    /// Raw flags word
    pub flags: String,
    /// Registry type
    pub registry_type: String,
    /// Header and sections enciphered
    pub header_encrypted: bool,
    /// Payloads enciphered
    pub file_encrypted: bool,
    /// Key derived from the file name, when the TOC needed one
    pub xor_key: Option<String>,
    /// Header plus sections
    pub total_toc_size: u32,
    /// Chunk end offsets over all entries (9.x)
    pub chunk_count: u32,
    /// Packed source directory name (9.x)
    pub origin: Option<String>,
    /// Section descriptors
    pub sections: Vec<SectionDump>,
    /// Directory entries
    pub directories: Vec<DirDump>,
    /// File entries
    pub files: Vec<FileDump>,
}

/// One section descriptor.
#[derive(Debug, Clone, Serialize)]
pub struct SectionDump {
    /// Section name
    pub name: String,
    /// Absolute offset
    pub offset: u32,
    /// Size in bytes
    pub size: u32,
    /// Stored checksum
    pub checksum: String,
}

/// One directory entry.
#[derive(Debug, Clone, Serialize)]
pub struct DirDump {
    /// Entry index
    pub index: u32,
    /// Full relative path
    pub path: String,
    /// Lookup hash
    pub hash: String,
    /// Number of subdirectories
    pub subdirs: usize,
    /// Number of files
    pub files: usize,
}

/// One file entry.
#[derive(Debug, Clone, Serialize)]
pub struct FileDump {
    /// Entry index
    pub index: u32,
    /// Full relative path
    pub path: String,
    /// Resource tag
    pub resource_type: String,
    /// Payload offset
    pub data_offset: u64,
    /// Stored size
    pub compressed_size: u32,
    /// Decoded size
    pub expanded_size: u32,
    /// Goes through the block codec
    pub compressed: bool,
    /// Payload is enciphered
    pub encrypted: bool,
    /// Number of chunk end offsets
    pub chunks: usize,
    /// Stored payload checksum (6.x/8.x)
    pub checksum: String,
}

impl TocDump {
    /// Collect the TOC of an open cake.
    ///
    /// # Errors
    ///
    /// Fails when a path cannot be resolved from the string table.
    pub fn from_archive<R: Read + Seek>(archive: &CakeArchive<R>) -> CakeResult<Self> {
        let header = archive.header();
        let version = archive.version();

        let sections = Section::ALL
            .into_iter()
            .map(|section| {
                let descriptor = header.section(section);
                SectionDump {
                    name: section.to_string(),
                    offset: descriptor.offset,
                    size: descriptor.size,
                    checksum: format!("{:#010x}", descriptor.checksum),
                }
            })
            .collect();

        let directories = archive
            .directories()
            .iter()
            .enumerate()
            .map(|(index, dir)| {
                Ok(DirDump {
                    index: index as u32,
                    path: archive.directory_path(index as u32)?,
                    hash: format!("{:016x}", dir.hash),
                    subdirs: dir.subdirs.len(),
                    files: dir.files.len(),
                })
            })
            .collect::<CakeResult<Vec<_>>>()?;

        let files = archive
            .files()
            .map(|(index, entry)| {
                Ok(FileDump {
                    index,
                    path: archive.file_path(index)?,
                    resource_type: entry.resource_type.to_string(),
                    data_offset: entry.data_offset,
                    compressed_size: entry.compressed_size,
                    expanded_size: entry.expanded_size,
                    compressed: entry.is_compressed(version),
                    encrypted: entry.is_encrypted(version, header.file_encrypted()),
                    chunks: entry.chunk_ends.len(),
                    checksum: format!("{:#010x}", entry.checksum),
                })
            })
            .collect::<CakeResult<Vec<_>>>()?;

        Ok(Self {
            version: version.to_string(),
            flags: format!("{:#06x}", header.flags.raw()),
            registry_type: format!("{:?}", header.registry_type()),
            header_encrypted: header.header_encrypted(),
            file_encrypted: header.file_encrypted(),
            xor_key: archive.xor_key().map(|key| format!("{key:#010x}")),
            total_toc_size: header.total_toc_size,
            chunk_count: header.chunk_count,
            origin: archive.origin(),
            sections,
            directories,
            files,
        })
    }

    /// Plain-text rendering.
    pub fn render(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "Version:          {}", self.version);
        let _ = writeln!(out, "Flags:            {}", self.flags);
        let _ = writeln!(out, "Registry type:    {}", self.registry_type);
        let _ = writeln!(out, "Header encrypted: {}", self.header_encrypted);
        let _ = writeln!(out, "Files encrypted:  {}", self.file_encrypted);
        let _ = writeln!(
            out,
            "XOR key:          {}",
            self.xor_key.as_deref().unwrap_or("none")
        );
        let _ = writeln!(out, "TOC size:         {:#x}", self.total_toc_size);
        let _ = writeln!(out, "Chunk count:      {}", self.chunk_count);
        if let Some(origin) = &self.origin {
            let _ = writeln!(out, "Origin:           {origin}");
        }

        let _ = writeln!(out, "\nSections:");
        for s in &self.sections {
            let _ = writeln!(
                out,
                "  {:<18} offset {:#08x}  size {:#08x}  checksum {}",
                s.name, s.offset, s.size, s.checksum
            );
        }

        let _ = writeln!(out, "\nDirectories ({}):", self.directories.len());
        for d in &self.directories {
            let path = if d.path.is_empty() { "/" } else { &d.path };
            let _ = writeln!(
                out,
                "  [{:>4}] {}  {} dirs, {} files  ({})",
                d.index, path, d.subdirs, d.files, d.hash
            );
        }

        let _ = writeln!(out, "\nFiles ({}):", self.files.len());
        for f in &self.files {
            let mut attrs = Vec::new();
            if f.compressed {
                attrs.push(format!("compressed, {} chunks", f.chunks));
            }
            if f.encrypted {
                attrs.push("encrypted".to_string());
            }
            let _ = writeln!(
                out,
                "  [{:>4}] {} {}  @{:#x} {} -> {} bytes{}",
                f.index,
                f.resource_type,
                f.path,
                f.data_offset,
                f.compressed_size,
                f.expanded_size,
                if attrs.is_empty() {
                    String::new()
                } else {
                    format!("  ({})", attrs.join(", "))
                }
            );
        }
        out
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use cake_formats::{BuilderOptions, CakeBuilder, CakeVersion, OpenOptions};
    use pretty_assertions::assert_eq;
    use std::io::Cursor;

    fn sample() -> CakeArchive<Cursor<Vec<u8>>> {
        let options = BuilderOptions::new(CakeVersion::V9_2)
            .with_header_encryption(true)
            .with_origin("pack");
        let mut builder = CakeBuilder::new(options);
        builder
            .add_bytes("ui/layout.txt", "x".repeat(1024).into_bytes())
            .unwrap();
        builder.add_bytes("empty.bin", Vec::new()).unwrap();
        let mut cursor = Cursor::new(Vec::new());
        builder.bake_to_writer(&mut cursor, "data.cak").unwrap();
        CakeArchive::from_reader(cursor, "data.cak", OpenOptions::default()).unwrap()
    }

    #[test]
    fn test_dump_collects_entries() {
        let dump = TocDump::from_archive(&sample()).unwrap();
        assert_eq!(dump.version, "9.2");
        assert!(dump.header_encrypted);
        assert_eq!(dump.xor_key.as_deref(), Some("0x7d445dfb"));
        assert_eq!(dump.origin.as_deref(), Some("pack"));
        assert_eq!(dump.sections.len(), 5);
        assert_eq!(dump.directories.len(), 2);
        assert_eq!(dump.files.len(), 2);
        assert_eq!(dump.files[0].path, "ui/layout.txt");
        assert!(dump.files[0].compressed);
        assert_eq!(dump.files[1].expanded_size, 0);
    }

    #[test]
    fn test_dump_renders_and_serializes() {
        let dump = TocDump::from_archive(&sample()).unwrap();
        let text = dump.render();
        assert!(text.contains("Version:          9.2"));
        assert!(text.contains("ui/layout.txt"));

        let json = serde_json::to_value(&dump).unwrap();
        assert_eq!(json["files"][0]["path"], "ui/layout.txt");
        assert_eq!(json["sections"].as_array().unwrap().len(), 5);
    }
}
