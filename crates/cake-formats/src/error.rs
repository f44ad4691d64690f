//! Error types for cake archive operations

use std::path::PathBuf;

use thiserror::Error;

use crate::toc::Section;
use crate::version::CakeVersion;

/// Result type for cake operations
pub type CakeResult<T> = Result<T, CakeError>;

/// Coarse classification of a [`CakeError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The bytes are not a well-formed container
    Format,
    /// The `(major, minor)` pair has no codec branch
    UnsupportedVersion,
    /// A section or payload checksum did not match
    Integrity,
    /// A chunk did not compress or expand to the expected size
    Codec,
    /// A path or index does not exist in the archive
    NotFound,
    /// The builder was asked for something it cannot write
    Build,
    /// Underlying I/O failure
    Io,
}

/// Comprehensive error type for reading and writing cakes
#[derive(Debug, Error)]
pub enum CakeError {
    /// Stream ends before the fixed header does
    #[error("stream too short for a cake header: {len} bytes, need {needed}")]
    TooShort {
        /// Bytes available
        len: u64,
        /// Bytes required
        needed: u64,
    },

    /// Signature is not `FDIR`
    #[error("not a cake archive: magic {0:02X?}")]
    InvalidMagic([u8; 4]),

    /// Version pair outside the supported set
    #[error("unsupported cake version {major}.{minor}")]
    UnsupportedVersion {
        /// Major version byte
        major: u8,
        /// Minor version byte
        minor: u8,
    },

    /// No key schedule has been recovered for this version
    #[error("no key schedule is known for cake {0}, its encrypted archives cannot be read or written")]
    KeyScheduleUnavailable(CakeVersion),

    /// No payload cipher has been recovered for this version
    #[error("encrypted payloads are not supported for cake {0}")]
    PayloadCipherUnavailable(CakeVersion),

    /// Declared TOC size runs past the end of the stream
    #[error("truncated or corrupt cake: TOC declares {declared} bytes, stream has {actual}")]
    TocTruncated {
        /// Declared TOC size
        declared: u64,
        /// Actual stream length
        actual: u64,
    },

    /// A section descriptor points outside the TOC
    #[error("{section} section out of bounds: offset {offset:#x}, size {size:#x}, TOC size {toc_size:#x}")]
    SectionOutOfBounds {
        /// Offending section
        section: Section,
        /// Declared offset
        offset: u32,
        /// Declared size
        size: u32,
        /// Declared TOC size
        toc_size: u32,
    },

    /// A section is too small for the number of records the header declares
    #[error("{section} section holds {size} bytes, {count} records need at least {needed}")]
    SectionTooSmall {
        /// Offending section
        section: Section,
        /// Section size
        size: u32,
        /// Declared record count
        count: u32,
        /// Minimum size required
        needed: u64,
    },

    /// Records inside a section could not be decoded
    #[error("malformed {section} section: {reason}")]
    MalformedSection {
        /// Offending section
        section: Section,
        /// Decoder message
        reason: String,
    },

    /// Section checksum mismatch after decryption
    #[error("{section} section checksum mismatch: expected {expected:#010x}, got {actual:#010x}")]
    SectionChecksum {
        /// Offending section
        section: Section,
        /// Stored checksum
        expected: u32,
        /// Computed checksum
        actual: u32,
    },

    /// An entry references an index past the end of its table
    #[error("{section} references index {index}, table holds {count}")]
    IndexOutOfRange {
        /// Section holding the reference
        section: Section,
        /// Referenced index
        index: u32,
        /// Table length
        count: u32,
    },

    /// The directory table does not form a tree
    #[error("directory {0} is reachable through a cycle or from two parents")]
    DirectoryCycle(u32),

    /// A lookup table is not sorted by hash
    #[error("{0} section is not sorted by hash")]
    UnsortedLookup(Section),

    /// Decoded payload checksum mismatch
    #[error("payload checksum mismatch for '{path}': expected {expected:#010x}, got {actual:#010x}")]
    PayloadChecksum {
        /// Archive path of the file
        path: String,
        /// Stored checksum
        expected: u32,
        /// Computed checksum
        actual: u32,
    },

    /// Payload range lies outside the archive
    #[error("payload of '{path}' at {offset:#x}+{size:#x} exceeds archive length {len:#x}")]
    PayloadOutOfBounds {
        /// Archive path of the file
        path: String,
        /// Data offset
        offset: u64,
        /// Stored size
        size: u32,
        /// Archive length
        len: u64,
    },

    /// Chunk table disagrees with the stored payload
    #[error("invalid chunk table: {0}")]
    InvalidChunkTable(String),

    /// A chunk expanded to the wrong number of bytes
    #[error("chunk {chunk} expanded to {actual} bytes, expected {expected}")]
    ChunkSizeMismatch {
        /// Chunk index
        chunk: usize,
        /// Expected expanded size
        expected: usize,
        /// Bytes produced
        actual: usize,
    },

    /// A chunk claims more expanded bytes than its stored size allows
    #[error("chunk {chunk} claims {expected} expanded bytes from {stored} stored, more than the codec can produce")]
    ExpansionTooLarge {
        /// Chunk index
        chunk: usize,
        /// Stored bytes of the chunk
        stored: usize,
        /// Expanded bytes the entry claims
        expected: usize,
    },

    /// Block compressor failure
    #[error("compression failed: {0}")]
    Compression(String),

    /// Block decompressor failure
    #[error("decompression failed: {0}")]
    Decompression(String),

    /// External registries keep their files outside the archive
    #[error("cake is an external registry, payloads live outside the archive")]
    ExternalRegistry,

    /// No file with this path
    #[error("file not found: {0}")]
    FileNotFound(String),

    /// No file entry with this index
    #[error("file index {index} out of range ({count} files)")]
    FileIndexOutOfRange {
        /// Requested index
        index: u32,
        /// Number of files
        count: u32,
    },

    /// Two builder inputs hash to the same lookup key
    #[error("duplicate archive path '{0}'")]
    DuplicatePath(String),

    /// Builder input path cannot be stored
    #[error("invalid archive path '{0}'")]
    InvalidPath(String),

    /// Builder source directory is unusable
    #[error("cannot read source tree {path}: {reason}")]
    SourceTree {
        /// Directory being walked
        path: PathBuf,
        /// Walk error
        reason: String,
    },

    /// A value does not fit the field the version gives it
    #[error("{what} ({value}) does not fit the on-disk field")]
    FieldOverflow {
        /// Field description
        what: &'static str,
        /// Value that overflowed
        value: u64,
    },

    /// Serialized section size disagrees with the size estimate
    #[error("{section} section wrote {written} bytes, layout estimated {estimated}")]
    LayoutMismatch {
        /// Offending section
        section: Section,
        /// Estimated size
        estimated: u64,
        /// Bytes written
        written: u64,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl CakeError {
    /// Wrap a record decoding failure with the section it happened in
    pub fn malformed(section: Section, err: &binrw::Error) -> Self {
        Self::MalformedSection {
            section,
            reason: err.to_string(),
        }
    }

    /// Classify this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::TooShort { .. }
            | Self::InvalidMagic(_)
            | Self::TocTruncated { .. }
            | Self::SectionOutOfBounds { .. }
            | Self::SectionTooSmall { .. }
            | Self::MalformedSection { .. }
            | Self::IndexOutOfRange { .. }
            | Self::DirectoryCycle(_)
            | Self::UnsortedLookup(_)
            | Self::PayloadOutOfBounds { .. }
            | Self::InvalidChunkTable(_)
            | Self::ExternalRegistry => ErrorKind::Format,
            Self::UnsupportedVersion { .. }
            | Self::KeyScheduleUnavailable(_)
            | Self::PayloadCipherUnavailable(_) => ErrorKind::UnsupportedVersion,
            Self::SectionChecksum { .. } | Self::PayloadChecksum { .. } => ErrorKind::Integrity,
            Self::ChunkSizeMismatch { .. }
            | Self::ExpansionTooLarge { .. }
            | Self::Compression(_)
            | Self::Decompression(_) => ErrorKind::Codec,
            Self::FileNotFound(_) | Self::FileIndexOutOfRange { .. } => ErrorKind::NotFound,
            Self::DuplicatePath(_)
            | Self::InvalidPath(_)
            | Self::SourceTree { .. }
            | Self::FieldOverflow { .. }
            | Self::LayoutMismatch { .. } => ErrorKind::Build,
            Self::Io(_) => ErrorKind::Io,
        }
    }

    /// Whether `extract_all` should log this error and move on to the next file
    pub fn is_skippable(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::Integrity | ErrorKind::Codec
        ) || matches!(
            self,
            Self::PayloadOutOfBounds { .. } | Self::InvalidChunkTable(_)
        )
    }

    /// Check if this is an integrity (checksum) failure
    pub fn is_integrity_error(&self) -> bool {
        self.kind() == ErrorKind::Integrity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification() {
        let err = CakeError::SectionChecksum {
            section: Section::FileInfo,
            expected: 1,
            actual: 2,
        };
        assert_eq!(err.kind(), ErrorKind::Integrity);
        assert!(err.is_skippable());
        assert!(err.is_integrity_error());

        let err = CakeError::ChunkSizeMismatch {
            chunk: 0,
            expected: 10,
            actual: 9,
        };
        assert_eq!(err.kind(), ErrorKind::Codec);
        assert!(err.is_skippable());

        let err = CakeError::UnsupportedVersion { major: 7, minor: 0 };
        assert_eq!(err.kind(), ErrorKind::UnsupportedVersion);
        assert!(!err.is_skippable());

        for err in [
            CakeError::KeyScheduleUnavailable(CakeVersion::V8_7),
            CakeError::PayloadCipherUnavailable(CakeVersion::V9_2),
        ] {
            assert_eq!(err.kind(), ErrorKind::UnsupportedVersion);
            assert!(!err.is_skippable(), "{err}");
        }

        let err = CakeError::ExpansionTooLarge {
            chunk: 3,
            stored: 8,
            expected: usize::MAX,
        };
        assert_eq!(err.kind(), ErrorKind::Codec);
        assert!(err.is_skippable());

        assert_eq!(CakeError::InvalidMagic(*b"ABCD").kind(), ErrorKind::Format);
        assert_eq!(
            CakeError::FileNotFound("a".into()).kind(),
            ErrorKind::NotFound
        );
    }

    #[test]
    fn test_messages_name_the_section() {
        let err = CakeError::malformed(
            Section::Strings,
            &binrw::Error::AssertFail {
                pos: 4,
                message: "bad length".into(),
            },
        );
        let message = err.to_string();
        assert!(message.contains("string table"));
        assert!(message.contains("bad length"));
    }
}
