//! Cake header and section descriptors
//!
//! The first eight bytes (magic, version, flags) are never encrypted. When
//! header encryption is on, the rest of the header table is enciphered with
//! the era's TOC transform; the types here always describe the plaintext.

use binrw::io::{Read, Seek, Write};
use binrw::{BinRead, BinResult, BinWrite};

use super::{Section, align4};
use crate::error::{CakeError, CakeResult};
use crate::version::CakeVersion;

/// Cake magic bytes
pub const CAKE_MAGIC: [u8; 4] = *b"FDIR";

/// Size of the unencrypted magic/version/flags prefix
pub const PREFIX_SIZE: usize = 8;

/// Total header size for a version, section descriptors included
pub fn header_size(version: CakeVersion) -> usize {
    match version {
        CakeVersion::V6_7
        | CakeVersion::V6_8
        | CakeVersion::V8_1
        | CakeVersion::V8_2
        | CakeVersion::V8_3
        | CakeVersion::V8_7 => 0x58,
        CakeVersion::V9_1 | CakeVersion::V9_2 | CakeVersion::V9_3 => 0x5C,
    }
}

fn has_chunk_count(version: CakeVersion) -> bool {
    header_size(version) == 0x5C
}

/// What kind of registry the cake is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RegistryType {
    /// Payloads are stored inside the cake
    #[default]
    Regular,
    /// Only the TOC is stored; files live next to the game
    External,
    /// A value with no known meaning, kept as-is
    Other(u8),
}

impl RegistryType {
    /// Parse from byte value
    pub fn from_byte(byte: u8) -> Self {
        match byte {
            0 => Self::Regular,
            1 => Self::External,
            other => Self::Other(other),
        }
    }

    /// Byte value
    pub fn as_byte(self) -> u8 {
        match self {
            Self::Regular => 0,
            Self::External => 1,
            Self::Other(b) => b,
        }
    }
}

/// Raw header flags word
///
/// The bit split depends on the version. Before 8.7 the registry type sits in
/// bits 0-7 with header encryption at bit 8 and file encryption at bit 9;
/// from 8.7 the registry type moved to bits 8-15 with the encryption bits at
/// 0 and 1. Only the registry type position is confirmed; the encryption bit
/// positions are a best-effort reading. Unknown bits are kept verbatim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HeaderFlags(u16);

struct FlagBits {
    type_shift: u16,
    header_encryption: u16,
    file_encryption: u16,
}

impl HeaderFlags {
    /// Wrap a raw flags word
    pub const fn from_raw(raw: u16) -> Self {
        Self(raw)
    }

    /// Raw flags word
    pub const fn raw(self) -> u16 {
        self.0
    }

    /// Compose flags for a version
    pub fn new(
        version: CakeVersion,
        registry: RegistryType,
        header_encrypted: bool,
        file_encrypted: bool,
    ) -> Self {
        let bits = Self::bits(version);
        let mut raw = u16::from(registry.as_byte()) << bits.type_shift;
        if header_encrypted {
            raw |= bits.header_encryption;
        }
        if file_encrypted {
            raw |= bits.file_encryption;
        }
        Self(raw)
    }

    fn bits(version: CakeVersion) -> FlagBits {
        if version.has_high_registry_flags() {
            FlagBits {
                type_shift: 8,
                header_encryption: 1 << 0,
                file_encryption: 1 << 1,
            }
        } else {
            FlagBits {
                type_shift: 0,
                header_encryption: 1 << 8,
                file_encryption: 1 << 9,
            }
        }
    }

    /// Registry type
    pub fn registry_type(self, version: CakeVersion) -> RegistryType {
        let bits = Self::bits(version);
        RegistryType::from_byte((self.0 >> bits.type_shift) as u8)
    }

    /// Whether the header table and sections are enciphered
    pub fn header_encrypted(self, version: CakeVersion) -> bool {
        self.0 & Self::bits(version).header_encryption != 0
    }

    /// Whether file payloads are enciphered
    pub fn file_encrypted(self, version: CakeVersion) -> bool {
        self.0 & Self::bits(version).file_encryption != 0
    }
}

/// Size, checksum and absolute offset of one section
#[derive(BinRead, BinWrite, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[brw(little)]
pub struct SectionDescriptor {
    /// Section size in bytes, excluding alignment padding
    pub size: u32,
    /// CRC32C of the plaintext section bytes
    pub checksum: u32,
    /// Absolute offset of the section
    pub offset: u32,
}

impl SectionDescriptor {
    /// First byte past the section
    pub fn end(&self) -> u64 {
        u64::from(self.offset) + u64::from(self.size)
    }
}

/// Parsed cake header (plaintext)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CakeHeader {
    /// Format revision
    pub version: CakeVersion,
    /// Raw flags word
    pub flags: HeaderFlags,
    /// Number of file entries
    pub file_count: u32,
    /// Number of directory entries
    pub dir_count: u32,
    /// Total number of chunk end offsets over all file entries (9.x only)
    pub chunk_count: u32,
    /// Section descriptors in on-disk order
    pub sections: [SectionDescriptor; 5],
    /// Two reserved words before the TOC size, kept verbatim
    pub reserved: [u32; 2],
    /// Size of header plus sections, up to the end of the string table
    pub total_toc_size: u32,
}

impl CakeHeader {
    /// Validate the unencrypted prefix and return the version and flags
    pub fn parse_prefix(prefix: &[u8]) -> CakeResult<(CakeVersion, HeaderFlags)> {
        if prefix.len() < PREFIX_SIZE {
            return Err(CakeError::TooShort {
                len: prefix.len() as u64,
                needed: PREFIX_SIZE as u64,
            });
        }

        let magic = [prefix[0], prefix[1], prefix[2], prefix[3]];
        if magic != CAKE_MAGIC {
            return Err(CakeError::InvalidMagic(magic));
        }

        let version = CakeVersion::from_word(u16::from_le_bytes([prefix[4], prefix[5]]))?;
        let flags = HeaderFlags::from_raw(u16::from_le_bytes([prefix[6], prefix[7]]));
        Ok((version, flags))
    }

    /// Header size for this header's version
    pub fn size(&self) -> usize {
        header_size(self.version)
    }

    /// Descriptor of one section
    pub fn section(&self, section: Section) -> &SectionDescriptor {
        &self.sections[section.index()]
    }

    /// Registry type
    pub fn registry_type(&self) -> RegistryType {
        self.flags.registry_type(self.version)
    }

    /// Whether the header table and sections are enciphered
    pub fn header_encrypted(&self) -> bool {
        self.flags.header_encrypted(self.version)
    }

    /// Whether file payloads are enciphered
    pub fn file_encrypted(&self) -> bool {
        self.flags.file_encrypted(self.version)
    }

    /// Offset of the first payload byte
    pub fn payload_start(&self) -> u64 {
        align4(u64::from(self.total_toc_size))
    }

    /// Serialize to plaintext bytes
    pub fn to_bytes(&self) -> CakeResult<Vec<u8>> {
        let mut cursor = binrw::io::Cursor::new(Vec::with_capacity(self.size()));
        self.write_le(&mut cursor)
            .map_err(|e| CakeError::Io(std::io::Error::other(e.to_string())))?;
        Ok(cursor.into_inner())
    }
}

impl BinRead for CakeHeader {
    type Args<'a> = ();

    fn read_options<R: Read + Seek>(
        reader: &mut R,
        _endian: binrw::Endian,
        _args: Self::Args<'_>,
    ) -> BinResult<Self> {
        let pos = reader.stream_position()?;
        let mut prefix = [0u8; PREFIX_SIZE];
        reader.read_exact(&mut prefix)?;
        let (version, flags) = Self::parse_prefix(&prefix).map_err(|e| binrw::Error::Custom {
            pos,
            err: Box::new(e),
        })?;

        let file_count = u32::read_le(reader)?;
        let dir_count = u32::read_le(reader)?;
        let chunk_count = if has_chunk_count(version) {
            u32::read_le(reader)?
        } else {
            0
        };

        let mut sections = [SectionDescriptor::default(); 5];
        for section in &mut sections {
            *section = SectionDescriptor::read_le(reader)?;
        }

        let reserved = [u32::read_le(reader)?, u32::read_le(reader)?];
        let total_toc_size = u32::read_le(reader)?;

        Ok(Self {
            version,
            flags,
            file_count,
            dir_count,
            chunk_count,
            sections,
            reserved,
            total_toc_size,
        })
    }
}

impl BinWrite for CakeHeader {
    type Args<'a> = ();

    fn write_options<W: Write + Seek>(
        &self,
        writer: &mut W,
        _endian: binrw::Endian,
        _args: Self::Args<'_>,
    ) -> BinResult<()> {
        writer.write_all(&CAKE_MAGIC)?;
        self.version.to_word().write_le(writer)?;
        self.flags.raw().write_le(writer)?;

        self.file_count.write_le(writer)?;
        self.dir_count.write_le(writer)?;
        if has_chunk_count(self.version) {
            self.chunk_count.write_le(writer)?;
        }

        for section in &self.sections {
            section.write_le(writer)?;
        }

        self.reserved[0].write_le(writer)?;
        self.reserved[1].write_le(writer)?;
        self.total_toc_size.write_le(writer)?;
        Ok(())
    }
}
