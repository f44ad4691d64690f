//! Cake reader
//!
//! Opening walks `HeaderRead -> KeyDerived -> SectionsValidated -> Ready` and
//! fails fast on anything structural. Every size read from the file is checked
//! against the stream length or the declared TOC size before it is used to
//! allocate. Once open, payloads are read on demand from the underlying
//! stream.
//!
//! Section checksums are verified when the TOC is encrypted, and for plain
//! TOCs whenever the descriptor carries a real CRC32C. Plain archives from
//! the game's own packer store `0` or `1` there instead.

use std::fmt;
use std::fs::{self, File};
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;

use binrw::BinRead;
use binrw::io::Cursor;
use cake_crypto::crc32c;
use tracing::{debug, info, warn};

use super::options::OpenOptions;
use super::path;
use crate::chunk::{self, chunk_size};
use crate::crypt::{derive_xor_key, toc_cipher};
use crate::error::{CakeError, CakeResult};
use crate::toc::{
    CakeHeader, DirEntry, FileEntry, LOOKUP_ENTRY_SIZE, LookupEntry, PREFIX_SIZE, RegistryType,
    Section, StringTable, find_lookup, header_size, lookup_is_sorted, min_dir_entry_size,
    min_file_entry_size,
};
use crate::util::format_size;
use crate::version::{CakeVersion, Era};

#[derive(Debug, Clone, Copy)]
enum OpenStage {
    HeaderRead,
    KeyDerived,
    SectionsValidated,
    Ready,
}

impl fmt::Display for OpenStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::HeaderRead => "header-read",
            Self::KeyDerived => "key-derived",
            Self::SectionsValidated => "sections-validated",
            Self::Ready => "ready",
        };
        f.write_str(name)
    }
}

/// Outcome of [`CakeArchive::extract_all`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractSummary {
    /// Files written
    pub extracted: usize,
    /// Decoded bytes written
    pub bytes: u64,
    /// Files that failed an integrity or codec check, with the reason
    pub skipped: Vec<(String, String)>,
}

/// An open cake archive
pub struct CakeArchive<R: Read + Seek> {
    reader: R,
    len: u64,
    options: OpenOptions,
    header: CakeHeader,
    xor_key: Option<u32>,
    encrypted: bool,
    dir_lookup: Vec<LookupEntry>,
    file_lookup: Vec<LookupEntry>,
    files: Vec<FileEntry>,
    dirs: Vec<DirEntry>,
    strings: StringTable,
}

impl<R: Read + Seek> fmt::Debug for CakeArchive<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CakeArchive")
            .field("version", &self.header.version)
            .field("files", &self.files.len())
            .field("dirs", &self.dirs.len())
            .field("len", &self.len)
            .finish_non_exhaustive()
    }
}

impl CakeArchive<File> {
    /// Open a cake file with default options
    pub fn open(path: impl AsRef<Path>) -> CakeResult<Self> {
        Self::open_with_options(path, OpenOptions::default())
    }

    /// Open a cake file
    ///
    /// The key schedule is seeded with the file name, so renaming a cake makes
    /// an encrypted one unreadable.
    pub fn open_with_options(path: impl AsRef<Path>, options: OpenOptions) -> CakeResult<Self> {
        let path = path.as_ref();
        let file_name = path
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(|| CakeError::InvalidPath(path.display().to_string()))?
            .to_string();
        let file = File::open(path)?;
        Self::from_reader(file, &file_name, options)
    }
}

fn header_error(err: &binrw::Error) -> CakeError {
    CakeError::Io(std::io::Error::new(
        std::io::ErrorKind::InvalidData,
        err.to_string(),
    ))
}

fn read_records<T>(
    section: Section,
    bytes: &[u8],
    count: u32,
    mut read: impl FnMut(&mut Cursor<&[u8]>) -> binrw::BinResult<T>,
) -> CakeResult<Vec<T>> {
    let mut cursor = Cursor::new(bytes);
    let mut records = Vec::with_capacity(count as usize);
    for _ in 0..count {
        records.push(read(&mut cursor).map_err(|e| CakeError::malformed(section, &e))?);
    }
    Ok(records)
}

impl<R: Read + Seek> CakeArchive<R> {
    /// Open a cake from any seekable stream
    ///
    /// `file_name` is the archive's bare file name, which seeds the key
    /// schedule.
    pub fn from_reader(mut reader: R, file_name: &str, options: OpenOptions) -> CakeResult<Self> {
        let len = reader.seek(SeekFrom::End(0))?;
        if len < PREFIX_SIZE as u64 {
            return Err(CakeError::TooShort {
                len,
                needed: PREFIX_SIZE as u64,
            });
        }

        reader.seek(SeekFrom::Start(0))?;
        let mut prefix = [0u8; PREFIX_SIZE];
        reader.read_exact(&mut prefix)?;
        let (version, flags) = CakeHeader::parse_prefix(&prefix)?;

        let size = header_size(version);
        if len < size as u64 {
            return Err(CakeError::TooShort {
                len,
                needed: size as u64,
            });
        }
        let mut table = vec![0u8; size];
        reader.seek(SeekFrom::Start(0))?;
        reader.read_exact(&mut table)?;
        debug!(stage = %OpenStage::HeaderRead, %version, flags = format_args!("{:#06x}", flags.raw()), "read cake header");

        let flagged = flags.header_encrypted(version) || flags.file_encrypted(version);
        if options.force_no_encryption && flagged {
            warn!(file_name, "encryption flags are set but ignored by request");
        }
        let encrypted = flags.header_encrypted(version) && !options.force_no_encryption;
        let xor_key = if encrypted {
            let key = derive_xor_key(file_name, version)?;
            debug!(stage = %OpenStage::KeyDerived, key = format_args!("{key:#010x}"), "derived key");
            toc_cipher::decrypt(version, key, &mut table[PREFIX_SIZE..])?;
            Some(key)
        } else {
            debug!(stage = %OpenStage::KeyDerived, "toc is not encrypted, no key needed");
            None
        };

        let header = CakeHeader::read_le(&mut Cursor::new(&table)).map_err(|e| header_error(&e))?;
        if u64::from(header.total_toc_size) > len {
            return Err(CakeError::TocTruncated {
                declared: u64::from(header.total_toc_size),
                actual: len,
            });
        }

        let mut section_bytes: Vec<Vec<u8>> = Vec::with_capacity(Section::ALL.len());
        for section in Section::ALL {
            let descriptor = *header.section(section);
            if u64::from(descriptor.offset) < size as u64
                || descriptor.end() > u64::from(header.total_toc_size)
            {
                return Err(CakeError::SectionOutOfBounds {
                    section,
                    offset: descriptor.offset,
                    size: descriptor.size,
                    toc_size: header.total_toc_size,
                });
            }

            let mut bytes = vec![0u8; descriptor.size as usize];
            reader.seek(SeekFrom::Start(u64::from(descriptor.offset)))?;
            reader.read_exact(&mut bytes)?;

            let actual = match xor_key {
                Some(key) => Some(toc_cipher::decrypt(version, key, &mut bytes)?),
                None if options.force_no_encryption
                    || is_placeholder_checksum(descriptor.checksum) =>
                {
                    None
                }
                None => Some(crc32c(&bytes)),
            };
            if let Some(actual) = actual.filter(|&crc| crc != descriptor.checksum) {
                return Err(CakeError::SectionChecksum {
                    section,
                    expected: descriptor.checksum,
                    actual,
                });
            }
            section_bytes.push(bytes);
        }

        let [dir_lookup_bytes, file_lookup_bytes, file_bytes, dir_bytes, string_bytes]: [Vec<u8>; 5] =
            section_bytes
                .try_into()
                .map_err(|_| CakeError::MalformedSection {
                    section: Section::Strings,
                    reason: "missing sections".to_string(),
                })?;

        check_lookup_size(Section::DirLookup, &dir_lookup_bytes, header.dir_count)?;
        check_lookup_size(Section::FileLookup, &file_lookup_bytes, header.file_count)?;
        check_min_size(
            Section::FileInfo,
            &file_bytes,
            header.file_count,
            min_file_entry_size(version),
        )?;
        check_min_size(
            Section::DirInfo,
            &dir_bytes,
            header.dir_count,
            min_dir_entry_size(version),
        )?;

        let dir_lookup = read_records(Section::DirLookup, &dir_lookup_bytes, header.dir_count, |c| {
            LookupEntry::read(c)
        })?;
        let file_lookup =
            read_records(Section::FileLookup, &file_lookup_bytes, header.file_count, |c| {
                LookupEntry::read(c)
            })?;
        let files = read_records(Section::FileInfo, &file_bytes, header.file_count, |c| {
            FileEntry::read_le_args(c, (version,))
        })?;
        let dirs = read_records(Section::DirInfo, &dir_bytes, header.dir_count, |c| {
            DirEntry::read_le_args(c, (version,))
        })?;
        let strings = StringTable::new(string_bytes, version, encrypted);

        let archive = Self {
            reader,
            len,
            options,
            header,
            xor_key,
            encrypted,
            dir_lookup,
            file_lookup,
            files,
            dirs,
            strings,
        };
        archive.validate_tree()?;
        debug!(stage = %OpenStage::SectionsValidated, "sections validated");

        info!(
            stage = %OpenStage::Ready,
            %version,
            files = archive.files.len(),
            dirs = archive.dirs.len(),
            size = %format_size(len),
            "opened cake"
        );
        Ok(archive)
    }

    fn validate_tree(&self) -> CakeResult<()> {
        let file_count = self.files.len() as u32;
        let dir_count = self.dirs.len() as u32;
        let in_range = |section: Section, index: u32, count: u32| {
            if index < count {
                Ok(())
            } else {
                Err(CakeError::IndexOutOfRange {
                    section,
                    index,
                    count,
                })
            }
        };
        let string_in_range = |offset: u32| {
            if (offset as usize) < self.strings.len() {
                Ok(())
            } else {
                Err(CakeError::MalformedSection {
                    section: Section::Strings,
                    reason: format!(
                        "offset {offset:#x} past end of {:#x}-byte table",
                        self.strings.len()
                    ),
                })
            }
        };

        for (section, table, count) in [
            (Section::DirLookup, &self.dir_lookup, dir_count),
            (Section::FileLookup, &self.file_lookup, file_count),
        ] {
            if !lookup_is_sorted(table) {
                return Err(CakeError::UnsortedLookup(section));
            }
            for entry in table {
                in_range(section, entry.index(), count)?;
            }
        }

        for file in &self.files {
            in_range(Section::FileInfo, file.parent_dir, dir_count)?;
            string_in_range(file.name_offset)?;
        }

        let mut parent: Vec<Option<u32>> = vec![None; self.dirs.len()];
        for (index, dir) in self.dirs.iter().enumerate() {
            string_in_range(dir.path_offset)?;
            for &file in &dir.files {
                in_range(Section::DirInfo, file, file_count)?;
            }
            for &sub in &dir.subdirs {
                in_range(Section::DirInfo, sub, dir_count)?;
                let slot = &mut parent[sub as usize];
                if sub == 0 || slot.is_some() {
                    return Err(CakeError::DirectoryCycle(sub));
                }
                *slot = Some(index as u32);
            }
        }

        // With one parent per directory, anything parented but unreachable
        // from the root sits on a cycle
        let mut reached = vec![false; self.dirs.len()];
        let mut stack = if self.dirs.is_empty() { vec![] } else { vec![0u32] };
        while let Some(index) = stack.pop() {
            reached[index as usize] = true;
            stack.extend(self.dirs[index as usize].subdirs.iter().copied());
        }
        if let Some(index) = (0..self.dirs.len()).find(|&i| parent[i].is_some() && !reached[i]) {
            return Err(CakeError::DirectoryCycle(index as u32));
        }

        Ok(())
    }

    /// Parsed plaintext header
    pub fn header(&self) -> &CakeHeader {
        &self.header
    }

    /// Format revision
    pub fn version(&self) -> CakeVersion {
        self.header.version
    }

    /// XOR key derived from the file name, if the TOC needed one
    pub fn xor_key(&self) -> Option<u32> {
        self.xor_key
    }

    /// Whether TOC decryption was applied
    pub fn is_toc_encrypted(&self) -> bool {
        self.encrypted
    }

    /// Whether payloads live outside the archive
    pub fn is_external(&self) -> bool {
        self.header.registry_type() == RegistryType::External
    }

    /// Stream length
    pub fn len(&self) -> u64 {
        self.len
    }

    /// Whether the archive holds no files
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Packed source directory name (9.x)
    pub fn origin(&self) -> Option<String> {
        self.strings.origin()
    }

    /// Directory lookup table
    pub fn dir_lookup(&self) -> &[LookupEntry] {
        &self.dir_lookup
    }

    /// File lookup table
    pub fn file_lookup(&self) -> &[LookupEntry] {
        &self.file_lookup
    }

    /// Directory entries in index order
    pub fn directories(&self) -> &[DirEntry] {
        &self.dirs
    }

    /// File entries with their indices
    pub fn files(&self) -> impl Iterator<Item = (u32, &FileEntry)> + '_ {
        self.files
            .iter()
            .enumerate()
            .map(|(index, entry)| (index as u32, entry))
    }

    /// File entry by index
    pub fn file(&self, index: u32) -> CakeResult<&FileEntry> {
        self.files
            .get(index as usize)
            .ok_or(CakeError::FileIndexOutOfRange {
                index,
                count: self.files.len() as u32,
            })
    }

    /// Full relative path of a directory
    pub fn directory_path(&self, index: u32) -> CakeResult<String> {
        let dir = self
            .dirs
            .get(index as usize)
            .ok_or(CakeError::IndexOutOfRange {
                section: Section::DirInfo,
                index,
                count: self.dirs.len() as u32,
            })?;
        self.strings.get(dir.path_offset)
    }

    /// Full relative path of a file
    pub fn file_path(&self, index: u32) -> CakeResult<String> {
        let file = self.file(index)?;
        let name = self.strings.get(file.name_offset)?;
        let dir = self.directory_path(file.parent_dir)?;
        if dir.is_empty() {
            Ok(name)
        } else {
            Ok(format!("{dir}/{name}"))
        }
    }

    /// Find a directory by path
    pub fn lookup_directory(&self, dir_path: &str) -> Option<&DirEntry> {
        find_lookup(&self.dir_lookup, path::hash(dir_path))
            .and_then(|entry| self.dirs.get(entry.index() as usize))
    }

    /// Find a file by path; the flag is the lookup's empty-file bit
    pub fn lookup_file(&self, file_path: &str) -> Option<(&FileEntry, bool)> {
        let entry = find_lookup(&self.file_lookup, path::hash(file_path))?;
        self.files
            .get(entry.index() as usize)
            .map(|file| (file, entry.is_empty_file()))
    }

    /// Index of a file by path
    pub fn file_index(&self, file_path: &str) -> Option<u32> {
        find_lookup(&self.file_lookup, path::hash(file_path)).map(LookupEntry::index)
    }

    /// Decode a file by path
    pub fn extract_file(&mut self, file_path: &str) -> CakeResult<Vec<u8>> {
        let index = self
            .file_index(file_path)
            .ok_or_else(|| CakeError::FileNotFound(file_path.to_string()))?;
        self.extract_entry(index)
    }

    /// Decode a file by index
    pub fn extract_entry(&mut self, index: u32) -> CakeResult<Vec<u8>> {
        if self.is_external() {
            return Err(CakeError::ExternalRegistry);
        }
        let entry = self.file(index)?.clone();
        let version = self.header.version;

        if entry.compressed_size == 0 {
            if entry.expanded_size == 0 {
                return Ok(Vec::new());
            }
            return Err(CakeError::InvalidChunkTable(format!(
                "no stored bytes for {} expanded bytes",
                entry.expanded_size
            )));
        }

        let end = entry.data_offset.saturating_add(u64::from(entry.compressed_size));
        if end > self.len {
            return Err(CakeError::PayloadOutOfBounds {
                path: self.file_path(index)?,
                offset: entry.data_offset,
                size: entry.compressed_size,
                len: self.len,
            });
        }

        let mut stored = vec![0u8; entry.compressed_size as usize];
        self.reader.seek(SeekFrom::Start(entry.data_offset))?;
        self.reader.read_exact(&mut stored)?;

        if !self.options.force_no_encryption
            && entry.is_encrypted(version, self.header.file_encrypted())
        {
            return Err(CakeError::PayloadCipherUnavailable(version));
        }

        let expanded = u64::from(entry.expanded_size);
        let data = if entry.is_compressed(version) {
            let codec = self.options.codec.as_ref();
            match version.era() {
                Era::V9 => chunk::decompress(
                    codec,
                    &stored,
                    &entry.chunk_ends,
                    expanded,
                    chunk_size(entry.flags.sectors_per_chunk()),
                )?,
                // One block; decompress bounds the size before allocating
                Era::V8 | Era::V6 => chunk::decompress(
                    codec,
                    &stored,
                    &[entry.compressed_size],
                    expanded,
                    (entry.expanded_size as usize).max(1),
                )?,
            }
        } else if stored.len() as u64 == expanded {
            stored
        } else {
            return Err(CakeError::ChunkSizeMismatch {
                chunk: 0,
                expected: entry.expanded_size as usize,
                actual: stored.len(),
            });
        };

        self.verify_payload(index, &entry, &data)?;
        Ok(data)
    }

    fn verify_payload(&self, index: u32, entry: &FileEntry, data: &[u8]) -> CakeResult<()> {
        if !self.options.verify_payload_checksums || entry.checksum == 0 {
            return Ok(());
        }
        let actual = match self.header.version.era() {
            Era::V6 => crc32fast::hash(data),
            Era::V8 => crc32c(data),
            Era::V9 => return Ok(()),
        };
        if actual != entry.checksum {
            return Err(CakeError::PayloadChecksum {
                path: self.file_path(index)?,
                expected: entry.checksum,
                actual,
            });
        }
        Ok(())
    }

    /// Extract every file under `out_dir`
    ///
    /// Files failing an integrity or codec check are logged, recorded in the
    /// summary and skipped. Any other error aborts.
    pub fn extract_all(&mut self, out_dir: impl AsRef<Path>) -> CakeResult<ExtractSummary> {
        if self.is_external() {
            return Err(CakeError::ExternalRegistry);
        }
        let out_dir = out_dir.as_ref();
        let total = self.files.len();
        let mut summary = ExtractSummary::default();

        for index in 0..total as u32 {
            let file_path = self.file_path(index)?;
            let Some(target) = path::safe_join(out_dir, &file_path) else {
                warn!(path = %file_path, "path escapes the output directory, skipping");
                summary
                    .skipped
                    .push((file_path, "path escapes the output directory".to_string()));
                continue;
            };

            match self.extract_entry(index) {
                Ok(data) => {
                    if let Some(parent) = target.parent() {
                        fs::create_dir_all(parent)?;
                    }
                    fs::write(&target, &data)?;
                    info!(
                        "[{}/{}] {} ({})",
                        index + 1,
                        total,
                        file_path,
                        format_size(data.len() as u64)
                    );
                    summary.extracted += 1;
                    summary.bytes += data.len() as u64;
                }
                Err(err) if err.is_skippable() => {
                    warn!(path = %file_path, error = %err, "skipping file");
                    summary.skipped.push((file_path, err.to_string()));
                }
                Err(err) => return Err(err),
            }
        }

        info!(
            extracted = summary.extracted,
            skipped = summary.skipped.len(),
            size = %format_size(summary.bytes),
            "extraction finished"
        );
        Ok(summary)
    }
}

/// Checksum values a plain TOC carries when nothing was computed
fn is_placeholder_checksum(checksum: u32) -> bool {
    checksum <= 1
}

fn check_lookup_size(section: Section, bytes: &[u8], count: u32) -> CakeResult<()> {
    let needed = u64::from(count) * LOOKUP_ENTRY_SIZE as u64;
    let size = bytes.len() as u64;
    if size < needed {
        return Err(CakeError::SectionTooSmall {
            section,
            size: bytes.len() as u32,
            count,
            needed,
        });
    }
    if size != needed {
        return Err(CakeError::MalformedSection {
            section,
            reason: format!("{size} bytes is not {count} entries of {LOOKUP_ENTRY_SIZE} bytes"),
        });
    }
    Ok(())
}

fn check_min_size(section: Section, bytes: &[u8], count: u32, entry_size: usize) -> CakeResult<()> {
    let needed = u64::from(count) * entry_size as u64;
    if (bytes.len() as u64) < needed {
        return Err(CakeError::SectionTooSmall {
            section,
            size: bytes.len() as u32,
            count,
            needed,
        });
    }
    Ok(())
}
