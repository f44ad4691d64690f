//! Directory entries

use binrw::io::{Read, Seek, Write};
use binrw::{BinRead, BinResult, BinWrite};

use super::layout::{DirField, dir_layout};
use crate::version::CakeVersion;

/// One directory entry
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DirEntry {
    /// Case-insensitive FNV-1a 64 of the full path, 0 for the root
    pub hash: u64,
    /// String table offset of the full relative path
    pub path_offset: u32,
    /// Reserved words after the 16-bit counts (8.x and 9.x)
    pub reserved: [u16; 2],
    /// Indices of child directories
    pub subdirs: Vec<u32>,
    /// Indices of child files
    pub files: Vec<u32>,
}

fn count_overflow(pos: u64, what: &str, len: usize, max: u64) -> binrw::Error {
    binrw::Error::AssertFail {
        pos,
        message: format!("{len} {what} exceed the maximum of {max}"),
    }
}

fn read_indices<R: Read + Seek>(reader: &mut R, count: u32) -> BinResult<Vec<u32>> {
    // Counts come from disk; let the reader hit EOF instead of trusting them for capacity
    let mut indices = Vec::with_capacity(count.min(1024) as usize);
    for _ in 0..count {
        indices.push(u32::read_le(reader)?);
    }
    Ok(indices)
}

impl BinRead for DirEntry {
    type Args<'a> = (CakeVersion,);

    fn read_options<R: Read + Seek>(
        reader: &mut R,
        _endian: binrw::Endian,
        args: Self::Args<'_>,
    ) -> BinResult<Self> {
        let (version,) = args;
        let mut entry = Self::default();
        let mut subdir_count = 0u32;
        let mut file_count = 0u32;

        for field in dir_layout(version) {
            match field {
                DirField::Hash => entry.hash = u64::read_le(reader)?,
                DirField::PathOffset => entry.path_offset = u32::read_le(reader)?,
                DirField::SubdirCount32 => subdir_count = u32::read_le(reader)?,
                DirField::FileCount32 => file_count = u32::read_le(reader)?,
                DirField::SubdirCount16 => subdir_count = u32::from(u16::read_le(reader)?),
                DirField::FileCount16 => file_count = u32::from(u16::read_le(reader)?),
                DirField::Reserved16(slot) => entry.reserved[*slot] = u16::read_le(reader)?,
                DirField::SubdirIndices => entry.subdirs = read_indices(reader, subdir_count)?,
                DirField::FileIndices => entry.files = read_indices(reader, file_count)?,
            }
        }

        Ok(entry)
    }
}

impl BinWrite for DirEntry {
    type Args<'a> = (CakeVersion,);

    fn write_options<W: Write + Seek>(
        &self,
        writer: &mut W,
        _endian: binrw::Endian,
        args: Self::Args<'_>,
    ) -> BinResult<()> {
        let (version,) = args;

        for field in dir_layout(version) {
            let pos = writer.stream_position()?;
            match field {
                DirField::Hash => self.hash.write_le(writer)?,
                DirField::PathOffset => self.path_offset.write_le(writer)?,
                DirField::SubdirCount32 => u32::try_from(self.subdirs.len())
                    .map_err(|_| count_overflow(pos, "subdirectories", self.subdirs.len(), u64::from(u32::MAX)))?
                    .write_le(writer)?,
                DirField::FileCount32 => u32::try_from(self.files.len())
                    .map_err(|_| count_overflow(pos, "files", self.files.len(), u64::from(u32::MAX)))?
                    .write_le(writer)?,
                DirField::SubdirCount16 => u16::try_from(self.subdirs.len())
                    .map_err(|_| count_overflow(pos, "subdirectories", self.subdirs.len(), u64::from(u16::MAX)))?
                    .write_le(writer)?,
                DirField::FileCount16 => u16::try_from(self.files.len())
                    .map_err(|_| count_overflow(pos, "files", self.files.len(), u64::from(u16::MAX)))?
                    .write_le(writer)?,
                DirField::Reserved16(slot) => self.reserved[*slot].write_le(writer)?,
                DirField::SubdirIndices => {
                    for index in &self.subdirs {
                        index.write_le(writer)?;
                    }
                }
                DirField::FileIndices => {
                    for index in &self.files {
                        index.write_le(writer)?;
                    }
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::toc::layout::dir_entry_size;
    use binrw::io::Cursor;
    use pretty_assertions::assert_eq;

    fn sample() -> DirEntry {
        DirEntry {
            hash: 0x0123_4567_89AB_CDEF,
            path_offset: 9,
            reserved: [0, 0],
            subdirs: vec![1, 2],
            files: vec![0, 3, 4],
        }
    }

    #[test]
    fn test_round_trip_every_version() {
        for version in CakeVersion::ALL {
            let entry = sample();
            let mut cursor = Cursor::new(Vec::new());
            entry.write_le_args(&mut cursor, (version,)).unwrap();
            let bytes = cursor.into_inner();
            assert_eq!(bytes.len(), dir_entry_size(version, 2, 3));

            let parsed = DirEntry::read_le_args(&mut Cursor::new(&bytes), (version,)).unwrap();
            assert_eq!(parsed, entry);
        }
    }

    #[test]
    fn test_reserved_words_are_retained() {
        let entry = DirEntry {
            reserved: [0xAAAA, 0x5555],
            ..sample()
        };
        let mut cursor = Cursor::new(Vec::new());
        entry.write_le_args(&mut cursor, (CakeVersion::V9_1,)).unwrap();
        let bytes = cursor.into_inner();
        assert_eq!(&bytes[14..16], &[0xAA, 0xAA]);
        assert_eq!(&bytes[18..20], &[0x55, 0x55]);

        let parsed = DirEntry::read_le_args(&mut Cursor::new(&bytes), (CakeVersion::V9_1,)).unwrap();
        assert_eq!(parsed.reserved, [0xAAAA, 0x5555]);
    }

    #[test]
    fn test_count_past_end_fails() {
        // subdir count of 0xFFFF with no index data behind it
        let mut bytes = vec![0u8; 0x14];
        bytes[12] = 0xFF;
        bytes[13] = 0xFF;
        assert!(DirEntry::read_le_args(&mut Cursor::new(&bytes), (CakeVersion::V8_2,)).is_err());
    }

    #[test]
    fn test_oversized_child_list_cannot_be_written() {
        let entry = DirEntry {
            files: vec![0; usize::from(u16::MAX) + 1],
            ..sample()
        };
        let mut cursor = Cursor::new(Vec::new());
        assert!(entry.write_le_args(&mut cursor, (CakeVersion::V9_3,)).is_err());
        let mut cursor = Cursor::new(Vec::new());
        assert!(entry.write_le_args(&mut cursor, (CakeVersion::V6_7,)).is_ok());
    }
}
