//! File entries

use binrw::io::{Read, Seek, Write};
use binrw::{BinRead, BinResult, BinWrite};

use super::layout::{FileField, file_layout};
use crate::resource::ResourceType;
use crate::version::{CakeVersion, Era};

/// Packed per-entry bits of 9.x file entries
///
/// ```text
/// bits  0-7   compression (1 = chunked)
/// bits  8-15  encryption (non-zero = payload is enciphered)
/// bits 16-29  sectors per chunk
/// bits 30-31  reserved, kept verbatim
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EntryFlags(u32);

impl EntryFlags {
    /// Compression value for chunked payloads
    pub const CHUNKED: u8 = 1;

    const SECTORS_SHIFT: u32 = 16;
    const SECTORS_MASK: u32 = 0x3FFF;

    /// Wrap a raw flags word
    pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    /// Raw flags word
    pub const fn raw(self) -> u32 {
        self.0
    }

    /// Compose flags; `sectors_per_chunk` is truncated to 14 bits
    pub fn new(compression: u8, encryption: u8, sectors_per_chunk: u16) -> Self {
        Self(
            u32::from(compression)
                | (u32::from(encryption) << 8)
                | ((u32::from(sectors_per_chunk) & Self::SECTORS_MASK) << Self::SECTORS_SHIFT),
        )
    }

    /// Compression byte
    pub fn compression(self) -> u8 {
        self.0 as u8
    }

    /// Encryption byte
    pub fn encryption(self) -> u8 {
        (self.0 >> 8) as u8
    }

    /// Sectors per compression chunk
    pub fn sectors_per_chunk(self) -> u16 {
        ((self.0 >> Self::SECTORS_SHIFT) & Self::SECTORS_MASK) as u16
    }

    /// The two reserved top bits
    pub fn reserved(self) -> u8 {
        (self.0 >> 30) as u8
    }
}

/// One file entry, in the union of all versions' fields
///
/// Fields absent from a version's layout are zero after reading, except the
/// expanded size of 6.x entries which equals the stored size.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FileEntry {
    /// String table offset of the bare file name
    pub name_offset: u32,
    /// Owning directory index
    pub parent_dir: u32,
    /// Payload checksum: CRC32 (6.x) or CRC32C (8.x) of the decoded bytes, 0 if absent
    pub checksum: u32,
    /// Stored payload size
    pub compressed_size: u32,
    /// Resource type tag
    pub resource_type: ResourceType,
    /// Absolute payload offset
    pub data_offset: u64,
    /// Decoded payload size
    pub expanded_size: u32,
    /// Packed per-entry bits (9.x)
    pub flags: EntryFlags,
    /// Cumulative compressed chunk end offsets relative to `data_offset` (9.x)
    pub chunk_ends: Vec<u32>,
}

impl FileEntry {
    /// Whether the stored payload goes through the block codec
    pub fn is_compressed(&self, version: CakeVersion) -> bool {
        match version.era() {
            Era::V6 => false,
            Era::V8 => self.compressed_size != self.expanded_size,
            Era::V9 => self.flags.compression() != 0,
        }
    }

    /// Whether the stored payload is enciphered
    pub fn is_encrypted(&self, version: CakeVersion, header_file_encryption: bool) -> bool {
        match version.era() {
            Era::V6 | Era::V8 => header_file_encryption,
            Era::V9 => self.flags.encryption() != 0,
        }
    }

    /// Whether this entry carries no payload bytes
    pub fn is_empty(&self) -> bool {
        self.expanded_size == 0
    }
}

impl BinRead for FileEntry {
    type Args<'a> = (CakeVersion,);

    fn read_options<R: Read + Seek>(
        reader: &mut R,
        _endian: binrw::Endian,
        args: Self::Args<'_>,
    ) -> BinResult<Self> {
        let (version,) = args;
        let mut entry = Self::default();
        let mut chunk_count = 0u16;
        let mut has_expanded = false;

        for field in file_layout(version) {
            match field {
                FileField::NameOffset => entry.name_offset = u32::read_le(reader)?,
                FileField::ParentDir => entry.parent_dir = u32::read_le(reader)?,
                FileField::Checksum => entry.checksum = u32::read_le(reader)?,
                FileField::CompressedSize => entry.compressed_size = u32::read_le(reader)?,
                FileField::ResourceType => {
                    entry.resource_type = ResourceType::from_raw(u32::read_le(reader)?);
                }
                FileField::DataOffset => entry.data_offset = u64::read_le(reader)?,
                FileField::ExpandedSize => {
                    entry.expanded_size = u32::read_le(reader)?;
                    has_expanded = true;
                }
                FileField::ChunkCount => chunk_count = u16::read_le(reader)?,
                FileField::BitFlags => entry.flags = EntryFlags::from_raw(u32::read_le(reader)?),
                FileField::ChunkEnds => {
                    entry.chunk_ends = Vec::with_capacity(usize::from(chunk_count));
                    for _ in 0..chunk_count {
                        entry.chunk_ends.push(u32::read_le(reader)?);
                    }
                }
            }
        }

        if !has_expanded {
            entry.expanded_size = entry.compressed_size;
        }

        Ok(entry)
    }
}

impl BinWrite for FileEntry {
    type Args<'a> = (CakeVersion,);

    fn write_options<W: Write + Seek>(
        &self,
        writer: &mut W,
        _endian: binrw::Endian,
        args: Self::Args<'_>,
    ) -> BinResult<()> {
        let (version,) = args;

        for field in file_layout(version) {
            match field {
                FileField::NameOffset => self.name_offset.write_le(writer)?,
                FileField::ParentDir => self.parent_dir.write_le(writer)?,
                FileField::Checksum => self.checksum.write_le(writer)?,
                FileField::CompressedSize => self.compressed_size.write_le(writer)?,
                FileField::ResourceType => self.resource_type.raw().write_le(writer)?,
                FileField::DataOffset => self.data_offset.write_le(writer)?,
                FileField::ExpandedSize => self.expanded_size.write_le(writer)?,
                FileField::ChunkCount => {
                    let pos = writer.stream_position()?;
                    let count =
                        u16::try_from(self.chunk_ends.len()).map_err(|_| binrw::Error::AssertFail {
                            pos,
                            message: format!("{} chunks exceed a u16 count", self.chunk_ends.len()),
                        })?;
                    count.write_le(writer)?;
                }
                FileField::BitFlags => self.flags.raw().write_le(writer)?,
                FileField::ChunkEnds => {
                    for end in &self.chunk_ends {
                        end.write_le(writer)?;
                    }
                }
            }
        }

        Ok(())
    }
}
