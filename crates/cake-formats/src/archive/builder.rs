//! Cake builder
//!
//! Files are registered first, which fixes every directory and file index in
//! traversal order. Baking then happens in two passes over the output:
//!
//! ```text
//! 1. size the TOC from the per-version layouts and seek past it
//!    (chunk tables are sized here too, so an oversized one fails early)
//! 2. write payloads at align4(toc size), each padded to 4 bytes
//! 3. serialize the sections, check them against the estimate,
//!    checksum and encipher them, write them after the header
//! 4. write the header last
//! ```
//!
//! [`CakeBuilder::bake`] writes into a temporary file next to the output and
//! only renames it into place once every pass succeeded.

use std::borrow::Cow;
use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use binrw::io::Cursor;
use binrw::{BinResult, BinWrite};
use cake_crypto::crc32c;
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use super::options::BuilderOptions;
use super::path;
use crate::chunk::{self, chunk_size, should_compress};
use crate::crypt::{derive_xor_key, toc_cipher};
use crate::error::{CakeError, CakeResult};
use crate::resource::ResourceType;
use crate::toc::{
    CakeHeader, DirEntry, EntryFlags, FileEntry, HeaderFlags, LOOKUP_ENTRY_SIZE, LookupEntry,
    PREFIX_SIZE, RegistryType, Section, SectionDescriptor, StringTableWriter, align4,
    dir_entry_size, file_entry_size, header_size,
};
use crate::util::format_size;
use crate::version::Era;

const MAX_SECTORS_PER_CHUNK: u16 = 0x3FFF;

#[derive(Debug)]
enum Source {
    Disk(PathBuf),
    Memory(Vec<u8>),
}

impl Source {
    fn load(&self) -> CakeResult<Cow<'_, [u8]>> {
        match self {
            Self::Disk(local) => Ok(Cow::Owned(fs::read(local)?)),
            Self::Memory(data) => Ok(Cow::Borrowed(data)),
        }
    }
}

#[derive(Debug)]
struct PendingFile {
    path: String,
    name: String,
    parent: u32,
    source: Source,
    size: u32,
    resource_type: ResourceType,
    compress: bool,
}

#[derive(Debug, Default)]
struct PendingDir {
    path: String,
    hash: u64,
    subdirs: Vec<u32>,
    files: Vec<u32>,
}

/// What a bake produced
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuildSummary {
    /// File entries written
    pub files: usize,
    /// Directory entries written, root included
    pub dirs: usize,
    /// Files that went through the block codec
    pub compressed: usize,
    /// Header plus sections, up to the end of the string table
    pub toc_size: u32,
    /// Total archive size
    pub size: u64,
}

/// Collects a directory tree and bakes it into a cake
#[derive(Debug)]
pub struct CakeBuilder {
    options: BuilderOptions,
    dirs: Vec<PendingDir>,
    files: Vec<PendingFile>,
    dir_index: HashMap<u64, u32>,
    file_hashes: HashMap<u64, u32>,
    origin: Option<String>,
}

fn index_u32(len: usize, what: &'static str) -> CakeResult<u32> {
    u32::try_from(len).map_err(|_| CakeError::FieldOverflow {
        what,
        value: len as u64,
    })
}

fn read_head(local: &Path) -> CakeResult<Vec<u8>> {
    let mut head = Vec::with_capacity(4);
    File::open(local)?.take(4).read_to_end(&mut head)?;
    Ok(head)
}

fn write_records<T>(
    section: Section,
    items: &[T],
    mut write: impl FnMut(&T, &mut Cursor<Vec<u8>>) -> BinResult<()>,
) -> CakeResult<Vec<u8>> {
    let mut cursor = Cursor::new(Vec::new());
    for item in items {
        write(item, &mut cursor).map_err(|e| CakeError::malformed(section, &e))?;
    }
    Ok(cursor.into_inner())
}

fn pad_to_4<W: Write>(writer: &mut W, len: u64) -> CakeResult<u64> {
    let padding = align4(len) - len;
    writer.write_all(&[0u8; 3][..padding as usize])?;
    Ok(padding)
}

impl CakeBuilder {
    /// Start an empty cake holding only the root directory
    pub fn new(options: BuilderOptions) -> Self {
        let origin = options.origin.clone();
        let mut dir_index = HashMap::new();
        dir_index.insert(0, 0);
        Self {
            options,
            dirs: vec![PendingDir::default()],
            files: Vec::new(),
            dir_index,
            file_hashes: HashMap::new(),
            origin,
        }
    }

    /// Builder settings
    pub fn options(&self) -> &BuilderOptions {
        &self.options
    }

    /// Number of registered files
    pub fn file_count(&self) -> usize {
        self.files.len()
    }

    /// Number of registered directories, root included
    pub fn dir_count(&self) -> usize {
        self.dirs.len()
    }

    /// Register every file under `root`
    ///
    /// Entries are visited depth-first in file name order; each directory is
    /// registered before its contents.
    pub fn register_directory(&mut self, root: impl AsRef<Path>) -> CakeResult<()> {
        let root = root.as_ref();
        info!("Indexing '{}' for a new cake...", root.display());
        if self.origin.is_none() {
            self.origin = root
                .file_name()
                .and_then(|name| name.to_str())
                .map(str::to_string);
        }

        let walk_error = |reason: String| CakeError::SourceTree {
            path: root.to_path_buf(),
            reason,
        };

        for entry in WalkDir::new(root).min_depth(1).sort_by_file_name() {
            let entry = entry.map_err(|e| walk_error(e.to_string()))?;
            let relative = entry
                .path()
                .strip_prefix(root)
                .map_err(|e| walk_error(e.to_string()))?;
            let relative = relative
                .to_str()
                .ok_or_else(|| CakeError::InvalidPath(relative.display().to_string()))?;

            if entry.file_type().is_dir() {
                let normalized = path::validate(relative)?;
                self.ensure_dir(&normalized)?;
            } else if entry.file_type().is_file() {
                let size = entry.metadata().map_err(|e| walk_error(e.to_string()))?.len();
                let head = read_head(entry.path())?;
                self.push_file(relative, Source::Disk(entry.path().to_path_buf()), size, &head)?;
            } else {
                debug!(path = relative, "skipping non-regular file");
            }
        }
        Ok(())
    }

    /// Add one file from disk under `relative`, creating its directories
    pub fn add_file(&mut self, local: impl AsRef<Path>, relative: &str) -> CakeResult<u32> {
        let local = local.as_ref();
        let metadata = fs::metadata(local)?;
        if !metadata.is_file() {
            return Err(CakeError::SourceTree {
                path: local.to_path_buf(),
                reason: "not a regular file".to_string(),
            });
        }
        let head = read_head(local)?;
        self.push_file(relative, Source::Disk(local.to_path_buf()), metadata.len(), &head)
    }

    /// Add in-memory content under `relative`, creating its directories
    pub fn add_bytes(&mut self, relative: &str, data: impl Into<Vec<u8>>) -> CakeResult<u32> {
        let data = data.into();
        let size = data.len() as u64;
        let head = data[..data.len().min(4)].to_vec();
        self.push_file(relative, Source::Memory(data), size, &head)
    }

    /// Ensure a directory path exists and return its index
    pub fn add_directory(&mut self, relative: &str) -> CakeResult<u32> {
        let normalized = path::validate(relative)?;
        self.ensure_dir(&normalized)
    }

    fn ensure_dir(&mut self, dir_path: &str) -> CakeResult<u32> {
        if dir_path.is_empty() {
            return Ok(0);
        }
        let hash = path::hash(dir_path);
        if let Some(&index) = self.dir_index.get(&hash) {
            return Ok(index);
        }

        let (parent_path, _) = path::split_parent(dir_path);
        let parent = self.ensure_dir(parent_path)?;
        let index = index_u32(self.dirs.len(), "directory count")?;
        self.dirs.push(PendingDir {
            path: dir_path.to_string(),
            hash,
            ..PendingDir::default()
        });
        self.dirs[parent as usize].subdirs.push(index);
        self.dir_index.insert(hash, index);
        Ok(index)
    }

    fn push_file(&mut self, relative: &str, source: Source, size: u64, head: &[u8]) -> CakeResult<u32> {
        let file_path = path::validate(relative)?;
        let hash = path::hash(&file_path);
        if self.file_hashes.contains_key(&hash) {
            return Err(CakeError::DuplicatePath(file_path));
        }
        let size = u32::try_from(size).map_err(|_| CakeError::FieldOverflow {
            what: "file size",
            value: size,
        })?;

        let (parent_path, name) = path::split_parent(&file_path);
        let name = name.to_string();
        let parent_path = parent_path.to_string();
        let parent = self.ensure_dir(&parent_path)?;
        let index = index_u32(self.files.len(), "file count")?;

        let compress = self.options.registry_type != RegistryType::External
            && should_compress(
                self.options.version,
                &file_path,
                u64::from(size),
                self.options.compression_min_size,
            );
        let resource_type = ResourceType::detect(&file_path, head);

        info!("Registered {} ({})", file_path, format_size(u64::from(size)));
        self.files.push(PendingFile {
            path: file_path,
            name,
            parent,
            source,
            size,
            resource_type,
            compress,
        });
        self.dirs[parent as usize].files.push(index);
        self.file_hashes.insert(hash, index);
        Ok(index)
    }

    /// Bake to a file; the file name seeds the key schedule
    pub fn bake(&self, output: impl AsRef<Path>) -> CakeResult<BuildSummary> {
        let output = output.as_ref();
        let file_name = output
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(|| CakeError::InvalidPath(output.display().to_string()))?
            .to_string();
        let dir = match output.parent().filter(|p| !p.as_os_str().is_empty()) {
            Some(parent) => {
                fs::create_dir_all(parent)?;
                parent
            }
            None => Path::new("."),
        };

        // Dropping the temp file on any error removes it
        let mut writer = BufWriter::new(NamedTempFile::new_in(dir)?);
        let summary = self.bake_to_writer(&mut writer, &file_name)?;
        let temp = writer.into_inner().map_err(|e| CakeError::Io(e.into_error()))?;
        temp.persist(output).map_err(|e| CakeError::Io(e.error))?;
        debug!(path = %output.display(), "cake moved into place");
        Ok(summary)
    }

    /// Bake to any seekable writer as if it were named `file_name`
    pub fn bake_to_writer<W: Write + Seek>(
        &self,
        writer: &mut W,
        file_name: &str,
    ) -> CakeResult<BuildSummary> {
        let options = &self.options;
        let version = options.version;
        let era = version.era();
        let header_encryption = options.header_encryption;
        let file_encryption = options.file_encryption;
        let external = options.registry_type == RegistryType::External;
        let sectors = options.sectors_per_chunk;
        if sectors == 0 || sectors > MAX_SECTORS_PER_CHUNK {
            return Err(CakeError::FieldOverflow {
                what: "sectors per chunk",
                value: u64::from(sectors),
            });
        }
        let chunk_len = chunk_size(sectors);
        if file_encryption {
            return Err(CakeError::PayloadCipherUnavailable(version));
        }
        let xor_key = if header_encryption {
            Some(derive_xor_key(file_name, version)?)
        } else {
            None
        };

        info!(
            %version,
            registry = ?options.registry_type,
            files = self.files.len(),
            dirs = self.dirs.len(),
            codec = options.codec.name(),
            "baking cake"
        );

        // String table: origin (9.x), directory paths, then file names
        let mut strings = StringTableWriter::new(version, header_encryption);
        if era == Era::V9 {
            strings.push(self.origin.as_deref().unwrap_or_default())?;
        }
        let dir_offsets = self
            .dirs
            .iter()
            .map(|dir| strings.push(&dir.path))
            .collect::<CakeResult<Vec<_>>>()?;
        let name_offsets = self
            .files
            .iter()
            .map(|file| strings.push(&file.name))
            .collect::<CakeResult<Vec<_>>>()?;
        let string_bytes = strings.into_bytes();

        let mut entries: Vec<FileEntry> = self
            .files
            .iter()
            .zip(name_offsets)
            .map(|(file, name_offset)| {
                let (flags, chunk_ends) = match era {
                    Era::V9 if file.compress => (
                        EntryFlags::new(EntryFlags::CHUNKED, u8::from(file_encryption), sectors),
                        vec![0; (file.size as usize).div_ceil(chunk_len)],
                    ),
                    Era::V9 => (
                        EntryFlags::new(0, u8::from(file_encryption), 0),
                        vec![file.size],
                    ),
                    Era::V6 | Era::V8 => (EntryFlags::default(), Vec::new()),
                };
                FileEntry {
                    name_offset,
                    parent_dir: file.parent,
                    checksum: 0,
                    compressed_size: file.size,
                    resource_type: file.resource_type,
                    data_offset: 0,
                    expanded_size: file.size,
                    flags,
                    chunk_ends,
                }
            })
            .collect();

        let dir_entries: Vec<DirEntry> = self
            .dirs
            .iter()
            .zip(dir_offsets)
            .map(|(dir, path_offset)| DirEntry {
                hash: dir.hash,
                path_offset,
                reserved: [0; 2],
                subdirs: dir.subdirs.clone(),
                files: dir.files.clone(),
            })
            .collect();

        let mut dir_lookup: Vec<LookupEntry> = self
            .dirs
            .iter()
            .enumerate()
            .map(|(index, dir)| LookupEntry::new(dir.hash, index as u32, false))
            .collect();
        dir_lookup.sort_by_key(|entry| entry.hash);
        let mut file_lookup: Vec<LookupEntry> = self
            .files
            .iter()
            .enumerate()
            .map(|(index, file)| LookupEntry::new(path::hash(&file.path), index as u32, file.size == 0))
            .collect();
        file_lookup.sort_by_key(|entry| entry.hash);

        // Pass 1: size the TOC
        if let Some((file, entry)) = self
            .files
            .iter()
            .zip(&entries)
            .find(|(_, entry)| entry.chunk_ends.len() > usize::from(u16::MAX))
        {
            warn!(path = %file.path, chunks = entry.chunk_ends.len(), "too many chunks");
            return Err(CakeError::FieldOverflow {
                what: "chunk count",
                value: entry.chunk_ends.len() as u64,
            });
        }
        let estimates: [u64; 5] = [
            (dir_lookup.len() * LOOKUP_ENTRY_SIZE) as u64,
            (file_lookup.len() * LOOKUP_ENTRY_SIZE) as u64,
            entries
                .iter()
                .map(|entry| file_entry_size(version, entry.chunk_ends.len()) as u64)
                .sum(),
            dir_entries
                .iter()
                .map(|dir| dir_entry_size(version, dir.subdirs.len(), dir.files.len()) as u64)
                .sum(),
            string_bytes.len() as u64,
        ];
        let mut offsets = [0u64; 5];
        let mut cursor = header_size(version) as u64;
        for (i, estimate) in estimates.iter().enumerate() {
            offsets[i] = cursor;
            cursor += estimate;
            if i + 1 < estimates.len() {
                cursor = align4(cursor);
            }
        }
        let toc_size = u32::try_from(cursor).map_err(|_| CakeError::FieldOverflow {
            what: "TOC size",
            value: cursor,
        })?;
        let payload_start = align4(cursor);
        debug!(toc_size, payload_start, "sized table of contents");

        // Pass 2: payloads
        writer.seek(SeekFrom::Start(payload_start))?;
        let mut position = payload_start;
        let mut compressed = 0usize;
        let total = self.files.len();

        if external {
            warn!("Cake is built as external, payloads are not stored");
        } else {
            for (index, (file, entry)) in self.files.iter().zip(entries.iter_mut()).enumerate() {
                let data = file.source.load()?;
                if data.len() != file.size as usize {
                    return Err(CakeError::SourceTree {
                        path: PathBuf::from(&file.path),
                        reason: format!(
                            "size changed from {} to {} bytes during the build",
                            file.size,
                            data.len()
                        ),
                    });
                }

                entry.data_offset = position;
                entry.checksum = match era {
                    Era::V6 => crc32fast::hash(&data),
                    Era::V8 => crc32c(&data),
                    Era::V9 => 0,
                };

                let stored = if file.compress {
                    info!("[{}/{}] Compressing {}...", index + 1, total, file.path);
                    match era {
                        Era::V9 => {
                            let packed = chunk::compress(options.codec.as_ref(), &data, chunk_len)?;
                            entry.chunk_ends = packed.chunk_ends;
                            compressed += 1;
                            packed.data
                        }
                        Era::V8 => {
                            let packed =
                                chunk::compress(options.codec.as_ref(), &data, data.len())?;
                            if packed.saves_space(data.len()) {
                                compressed += 1;
                                packed.data
                            } else {
                                data.into_owned()
                            }
                        }
                        Era::V6 => data.into_owned(),
                    }
                } else {
                    info!("[{}/{}] Writing {}...", index + 1, total, file.path);
                    data.into_owned()
                };

                entry.compressed_size = index_u32(stored.len(), "stored file size")?;

                writer.write_all(&stored)?;
                position += stored.len() as u64;
                position += pad_to_4(writer, position)?;
            }
        }

        // Pass 3: sections
        let plain: [Vec<u8>; 5] = [
            write_records(Section::DirLookup, &dir_lookup, |e, c| e.write(c))?,
            write_records(Section::FileLookup, &file_lookup, |e, c| e.write(c))?,
            write_records(Section::FileInfo, &entries, |e, c| e.write_le_args(c, (version,)))?,
            write_records(Section::DirInfo, &dir_entries, |d, c| d.write_le_args(c, (version,)))?,
            string_bytes,
        ];

        let mut descriptors = [SectionDescriptor::default(); 5];
        for (i, (section, mut bytes)) in Section::ALL.into_iter().zip(plain).enumerate() {
            if bytes.len() as u64 != estimates[i] {
                return Err(CakeError::LayoutMismatch {
                    section,
                    estimated: estimates[i],
                    written: bytes.len() as u64,
                });
            }

            let checksum = match xor_key {
                Some(key) => toc_cipher::encrypt(version, key, &mut bytes)?,
                None => crc32c(&bytes),
            };
            descriptors[i] = SectionDescriptor {
                size: bytes.len() as u32,
                checksum,
                offset: offsets[i] as u32,
            };

            writer.seek(SeekFrom::Start(offsets[i]))?;
            writer.write_all(&bytes)?;
            pad_to_4(writer, offsets[i] + bytes.len() as u64)?;
        }

        // Pass 4: header
        let header = CakeHeader {
            version,
            flags: HeaderFlags::new(
                version,
                options.registry_type,
                header_encryption,
                file_encryption,
            ),
            file_count: index_u32(entries.len(), "file count")?,
            dir_count: index_u32(dir_entries.len(), "directory count")?,
            chunk_count: match era {
                Era::V9 => index_u32(
                    entries.iter().map(|entry| entry.chunk_ends.len()).sum(),
                    "chunk count",
                )?,
                Era::V6 | Era::V8 => 0,
            },
            sections: descriptors,
            reserved: [0; 2],
            total_toc_size: toc_size,
        };
        let mut header_bytes = header.to_bytes()?;
        if let Some(key) = xor_key {
            toc_cipher::encrypt(version, key, &mut header_bytes[PREFIX_SIZE..])?;
        }
        writer.seek(SeekFrom::Start(0))?;
        writer.write_all(&header_bytes)?;

        let size = writer.seek(SeekFrom::End(0))?;
        info!("Finished. Cake size: {}", format_size(size));

        Ok(BuildSummary {
            files: entries.len(),
            dirs: dir_entries.len(),
            compressed,
            toc_size,
            size,
        })
    }
}
