//! Per-version record layouts
//!
//! File and directory entries are described once per version as an ordered
//! field list. Reading, writing and size estimation all walk the same list,
//! so the builder's reserved TOC size always matches what gets written.

use crate::version::CakeVersion;

/// A field of a file entry, in on-disk order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileField {
    /// u32 string table offset of the bare file name
    NameOffset,
    /// u32 owning directory index
    ParentDir,
    /// u32 payload checksum (CRC32 or CRC32C by era)
    Checksum,
    /// u32 stored payload size
    CompressedSize,
    /// u32 resource type tag
    ResourceType,
    /// u64 absolute payload offset
    DataOffset,
    /// u32 decoded payload size
    ExpandedSize,
    /// u16 number of chunk end offsets
    ChunkCount,
    /// u32 packed compression/encryption/sector bits
    BitFlags,
    /// u32 per chunk, cumulative compressed end offsets
    ChunkEnds,
}

impl FileField {
    /// Fixed width in bytes (`ChunkEnds` is sized per chunk)
    pub fn width(self) -> usize {
        match self {
            Self::NameOffset
            | Self::ParentDir
            | Self::Checksum
            | Self::CompressedSize
            | Self::ResourceType
            | Self::ExpandedSize
            | Self::BitFlags => 4,
            Self::DataOffset => 8,
            Self::ChunkCount => 2,
            Self::ChunkEnds => 0,
        }
    }
}

/// A field of a directory entry, in on-disk order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirField {
    /// u64 path hash
    Hash,
    /// u32 string table offset of the full path
    PathOffset,
    /// u32 subdirectory count
    SubdirCount32,
    /// u32 file count
    FileCount32,
    /// u16 subdirectory count
    SubdirCount16,
    /// u16 file count
    FileCount16,
    /// u16 reserved word following a 16-bit count
    Reserved16(usize),
    /// u32 per subdirectory
    SubdirIndices,
    /// u32 per file
    FileIndices,
}

impl DirField {
    /// Fixed width in bytes (index lists are sized per child)
    pub fn width(self) -> usize {
        match self {
            Self::Hash => 8,
            Self::PathOffset | Self::SubdirCount32 | Self::FileCount32 => 4,
            Self::SubdirCount16 | Self::FileCount16 | Self::Reserved16(_) => 2,
            Self::SubdirIndices | Self::FileIndices => 0,
        }
    }
}

const FILE_V6: &[FileField] = &[
    FileField::NameOffset,
    FileField::ParentDir,
    FileField::Checksum,
    FileField::CompressedSize,
    FileField::DataOffset,
    FileField::ResourceType,
];

const FILE_V8: &[FileField] = &[
    FileField::NameOffset,
    FileField::ParentDir,
    FileField::Checksum,
    FileField::CompressedSize,
    FileField::DataOffset,
    FileField::ResourceType,
    FileField::ExpandedSize,
];

const FILE_V9: &[FileField] = &[
    FileField::NameOffset,
    FileField::ParentDir,
    FileField::CompressedSize,
    FileField::ResourceType,
    FileField::DataOffset,
    FileField::ExpandedSize,
    FileField::ChunkCount,
    FileField::BitFlags,
    FileField::ChunkEnds,
];

const DIR_V6: &[DirField] = &[
    DirField::Hash,
    DirField::PathOffset,
    DirField::SubdirCount32,
    DirField::FileCount32,
    DirField::SubdirIndices,
    DirField::FileIndices,
];

const DIR_V8: &[DirField] = &[
    DirField::Hash,
    DirField::PathOffset,
    DirField::SubdirCount16,
    DirField::Reserved16(0),
    DirField::FileCount16,
    DirField::Reserved16(1),
    DirField::SubdirIndices,
    DirField::FileIndices,
];

/// File entry field list for a version
pub fn file_layout(version: CakeVersion) -> &'static [FileField] {
    match version {
        CakeVersion::V6_7 | CakeVersion::V6_8 => FILE_V6,
        CakeVersion::V8_1 | CakeVersion::V8_2 | CakeVersion::V8_3 | CakeVersion::V8_7 => FILE_V8,
        CakeVersion::V9_1 | CakeVersion::V9_2 | CakeVersion::V9_3 => FILE_V9,
    }
}

/// Directory entry field list for a version
pub fn dir_layout(version: CakeVersion) -> &'static [DirField] {
    match version {
        CakeVersion::V6_7 | CakeVersion::V6_8 => DIR_V6,
        CakeVersion::V8_1
        | CakeVersion::V8_2
        | CakeVersion::V8_3
        | CakeVersion::V8_7
        | CakeVersion::V9_1
        | CakeVersion::V9_2
        | CakeVersion::V9_3 => DIR_V8,
    }
}

/// Serialized size of a file entry with `chunk_count` chunk end offsets
pub fn file_entry_size(version: CakeVersion, chunk_count: usize) -> usize {
    file_layout(version)
        .iter()
        .map(|field| match field {
            FileField::ChunkEnds => 4 * chunk_count,
            other => other.width(),
        })
        .sum()
}

/// Serialized size of a directory entry
pub fn dir_entry_size(version: CakeVersion, subdirs: usize, files: usize) -> usize {
    dir_layout(version)
        .iter()
        .map(|field| match field {
            DirField::SubdirIndices => 4 * subdirs,
            DirField::FileIndices => 4 * files,
            other => other.width(),
        })
        .sum()
}

/// Smallest possible file entry, used to bound counts before allocating
pub fn min_file_entry_size(version: CakeVersion) -> usize {
    file_entry_size(version, 0)
}

/// Smallest possible directory entry
pub fn min_dir_entry_size(version: CakeVersion) -> usize {
    dir_entry_size(version, 0, 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_sizes() {
        assert_eq!(min_file_entry_size(CakeVersion::V6_7), 0x1C);
        assert_eq!(min_file_entry_size(CakeVersion::V8_2), 0x20);
        assert_eq!(min_file_entry_size(CakeVersion::V9_1), 0x22);
        assert_eq!(file_entry_size(CakeVersion::V9_3, 3), 0x22 + 12);
        assert_eq!(file_entry_size(CakeVersion::V8_7, 3), 0x20);
    }

    #[test]
    fn test_dir_sizes() {
        assert_eq!(min_dir_entry_size(CakeVersion::V6_8), 0x14);
        assert_eq!(min_dir_entry_size(CakeVersion::V9_2), 0x14);
        assert_eq!(dir_entry_size(CakeVersion::V9_2, 2, 3), 0x14 + 20);
    }

    #[test]
    fn test_every_version_has_a_layout() {
        for version in CakeVersion::ALL {
            assert!(!file_layout(version).is_empty());
            assert_eq!(dir_layout(version)[0], DirField::Hash);
        }
    }
}
