//! Hash lookup entries

use binrw::{BinRead, BinWrite};

/// Serialized size of a lookup entry
pub const LOOKUP_ENTRY_SIZE: usize = 12;

const EMPTY_BIT: u32 = 1 << 31;

/// `{hash, index}` pair of the directory and file lookup tables
///
/// Bit 31 of the index word marks a file that has no payload bytes.
#[derive(BinRead, BinWrite, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[brw(little)]
pub struct LookupEntry {
    /// Path hash
    pub hash: u64,
    /// Entry index and empty-file bit
    pub bits: u32,
}

impl LookupEntry {
    /// Create a lookup entry
    pub fn new(hash: u64, index: u32, empty: bool) -> Self {
        let mut bits = index & !EMPTY_BIT;
        if empty {
            bits |= EMPTY_BIT;
        }
        Self { hash, bits }
    }

    /// Index into the file or directory table
    pub fn index(&self) -> u32 {
        self.bits & !EMPTY_BIT
    }

    /// Whether the entry points at an empty file
    pub fn is_empty_file(&self) -> bool {
        self.bits & EMPTY_BIT != 0
    }
}

/// Binary search a hash-sorted lookup table
pub fn find(table: &[LookupEntry], hash: u64) -> Option<&LookupEntry> {
    table
        .binary_search_by_key(&hash, |entry| entry.hash)
        .ok()
        .map(|i| &table[i])
}

/// Whether a table is sorted by hash
pub fn is_sorted(table: &[LookupEntry]) -> bool {
    table.windows(2).all(|pair| pair[0].hash <= pair[1].hash)
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use binrw::io::Cursor;

    #[test]
    fn test_bits() {
        let entry = LookupEntry::new(5, 7, true);
        assert_eq!(entry.bits, 0x8000_0007);
        assert_eq!(entry.index(), 7);
        assert!(entry.is_empty_file());
        assert!(!LookupEntry::new(5, 7, false).is_empty_file());
    }

    #[test]
    fn test_serialized_size() {
        let mut cursor = Cursor::new(Vec::new());
        LookupEntry::new(1, 2, false).write(&mut cursor).unwrap();
        assert_eq!(cursor.into_inner().len(), LOOKUP_ENTRY_SIZE);
    }

    #[test]
    fn test_find() {
        let table = [
            LookupEntry::new(0, 0, false),
            LookupEntry::new(10, 1, false),
            LookupEntry::new(20, 2, true),
        ];
        assert!(is_sorted(&table));
        assert_eq!(find(&table, 20).map(LookupEntry::index), Some(2));
        assert!(find(&table, 15).is_none());

        let unsorted = [table[2], table[0]];
        assert!(!is_sorted(&unsorted));
    }
}
