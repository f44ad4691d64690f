//! Table of contents: header, section descriptors and section records
//!
//! A cake starts with a fixed header followed by five sections, always in
//! this order:
//!
//! ```text
//! [header]            magic, version, flags, counts, 5 x {size, checksum, offset}
//! [directory lookup]  hash-sorted {hash, index}
//! [file lookup]       hash-sorted {hash, index | empty bit}
//! [file info]         version-shaped file entries
//! [directory info]    directory entries with child index lists
//! [string table]      paths and names
//! ```
//!
//! Every section starts 4-byte aligned. The header's `total_toc_size` covers
//! everything up to the end of the string table; payloads follow at the next
//! 4-byte boundary.

mod dir_entry;
mod file_entry;
mod header;
mod layout;
mod lookup;
mod strings;

use std::fmt;

pub use dir_entry::DirEntry;
pub use file_entry::{EntryFlags, FileEntry};
pub use header::{
    CAKE_MAGIC, CakeHeader, HeaderFlags, PREFIX_SIZE, RegistryType, SectionDescriptor,
    header_size,
};
pub use layout::{
    DirField, FileField, dir_entry_size, dir_layout, file_entry_size, file_layout,
    min_dir_entry_size, min_file_entry_size,
};
pub use lookup::{LOOKUP_ENTRY_SIZE, LookupEntry, find as find_lookup, is_sorted as lookup_is_sorted};
pub use strings::{StringTable, StringTableWriter};

/// One of the five TOC sections
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Section {
    /// Hash-sorted directory lookup
    DirLookup,
    /// Hash-sorted file lookup
    FileLookup,
    /// File entries
    FileInfo,
    /// Directory entries
    DirInfo,
    /// String table
    Strings,
}

impl Section {
    /// All sections in on-disk order
    pub const ALL: [Self; 5] = [
        Self::DirLookup,
        Self::FileLookup,
        Self::FileInfo,
        Self::DirInfo,
        Self::Strings,
    ];

    /// Position in the section descriptor table
    pub fn index(self) -> usize {
        match self {
            Self::DirLookup => 0,
            Self::FileLookup => 1,
            Self::FileInfo => 2,
            Self::DirInfo => 3,
            Self::Strings => 4,
        }
    }
}

impl fmt::Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::DirLookup => "directory lookup",
            Self::FileLookup => "file lookup",
            Self::FileInfo => "file info",
            Self::DirInfo => "directory info",
            Self::Strings => "string table",
        };
        f.write_str(name)
    }
}

/// Round up to the next multiple of 4
pub const fn align4(value: u64) -> u64 {
    (value + 3) & !3
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_section_order() {
        for (i, section) in Section::ALL.iter().enumerate() {
            assert_eq!(section.index(), i);
        }
    }

    #[test]
    fn test_align4() {
        assert_eq!(align4(0), 0);
        assert_eq!(align4(1), 4);
        assert_eq!(align4(4), 4);
        assert_eq!(align4(0x5D), 0x60);
    }
}
