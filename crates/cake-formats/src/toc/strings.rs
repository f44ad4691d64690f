//! String table
//!
//! Entries point into the table by byte offset, so the table is kept as raw
//! bytes and strings are decoded where they are referenced.
//!
//! - 6.x: zero-terminated strings, never scrambled.
//! - 8.x and 9.x: a length byte, the string bytes, then a NUL. With header
//!   encryption on, string byte `i` is XORed with
//!   `i + (offset >> (8 * (i % 4)))`, `offset` being the position of the
//!   length byte.
//! - 9.x tables start with the name of the directory the cake was packed
//!   from.

use crate::error::{CakeError, CakeResult};
use crate::toc::Section;
use crate::version::{CakeVersion, Era};

fn scramble_mask(offset: u32, i: usize) -> u8 {
    (i as u32).wrapping_add(offset >> (8 * (i % 4))) as u8
}

/// Parsed string table section
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StringTable {
    bytes: Vec<u8>,
    era: Era,
    scrambled: bool,
}

impl StringTable {
    /// Wrap decrypted section bytes
    pub fn new(bytes: Vec<u8>, version: CakeVersion, scrambled: bool) -> Self {
        Self {
            bytes,
            era: version.era(),
            scrambled,
        }
    }

    /// Section size in bytes
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Whether the table holds no bytes
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Decode the string starting at `offset`
    pub fn get(&self, offset: u32) -> CakeResult<String> {
        let malformed = |reason: String| CakeError::MalformedSection {
            section: Section::Strings,
            reason,
        };
        let start = offset as usize;
        if start >= self.bytes.len() {
            return Err(malformed(format!(
                "offset {offset:#x} past end of {:#x}-byte table",
                self.bytes.len()
            )));
        }

        match self.era {
            Era::V6 => {
                let rest = &self.bytes[start..];
                let end = rest
                    .iter()
                    .position(|&b| b == 0)
                    .ok_or_else(|| malformed(format!("string at {offset:#x} is not terminated")))?;
                Ok(String::from_utf8_lossy(&rest[..end]).into_owned())
            }
            Era::V8 | Era::V9 => {
                let len = usize::from(self.bytes[start]);
                let body = self
                    .bytes
                    .get(start + 1..start + 1 + len)
                    .ok_or_else(|| malformed(format!("string at {offset:#x} runs past the table")))?;
                let mut decoded = body.to_vec();
                if self.scrambled {
                    for (i, b) in decoded.iter_mut().enumerate() {
                        *b ^= scramble_mask(offset, i);
                    }
                }
                Ok(String::from_utf8_lossy(&decoded).into_owned())
            }
        }
    }

    /// Name of the packed source directory (9.x only)
    pub fn origin(&self) -> Option<String> {
        match self.era {
            Era::V9 if !self.bytes.is_empty() => self.get(0).ok(),
            Era::V6 | Era::V8 | Era::V9 => None,
        }
    }
}

/// Incremental string table serializer
#[derive(Debug, Clone)]
pub struct StringTableWriter {
    bytes: Vec<u8>,
    era: Era,
    scrambled: bool,
}

impl StringTableWriter {
    /// Start an empty table
    pub fn new(version: CakeVersion, scrambled: bool) -> Self {
        Self {
            bytes: Vec::new(),
            era: version.era(),
            scrambled,
        }
    }

    /// Append a string and return its offset
    pub fn push(&mut self, value: &str) -> CakeResult<u32> {
        let offset = u32::try_from(self.bytes.len()).map_err(|_| CakeError::FieldOverflow {
            what: "string table size",
            value: self.bytes.len() as u64,
        })?;
        let raw = value.as_bytes();

        match self.era {
            Era::V6 => {
                if raw.contains(&0) {
                    return Err(CakeError::InvalidPath(value.to_string()));
                }
                self.bytes.extend_from_slice(raw);
            }
            Era::V8 | Era::V9 => {
                let len = u8::try_from(raw.len()).map_err(|_| CakeError::FieldOverflow {
                    what: "string length",
                    value: raw.len() as u64,
                })?;
                self.bytes.push(len);
                if self.scrambled {
                    self.bytes.extend(
                        raw.iter()
                            .enumerate()
                            .map(|(i, b)| b ^ scramble_mask(offset, i)),
                    );
                } else {
                    self.bytes.extend_from_slice(raw);
                }
            }
        }
        self.bytes.push(0);

        Ok(offset)
    }

    /// Bytes written so far
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Whether nothing has been written
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Finish the table
    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_v6_zero_terminated() {
        let mut writer = StringTableWriter::new(CakeVersion::V6_7, true);
        let a = writer.push("").unwrap();
        let b = writer.push("data/file.bin").unwrap();
        let bytes = writer.into_bytes();
        assert_eq!(bytes[0], 0);
        assert_eq!(&bytes[1..14], b"data/file.bin");

        let table = StringTable::new(bytes, CakeVersion::V6_7, true);
        assert_eq!(table.get(a).unwrap(), "");
        assert_eq!(table.get(b).unwrap(), "data/file.bin");
        assert_eq!(table.origin(), None);
    }

    #[test]
    fn test_length_prefixed_plain() {
        let mut writer = StringTableWriter::new(CakeVersion::V8_7, false);
        writer.push("abc").unwrap();
        let second = writer.push("xyz").unwrap();
        let bytes = writer.into_bytes();
        assert_eq!(&bytes[..5], b"\x03abc\0");
        assert_eq!(second, 5);

        let table = StringTable::new(bytes, CakeVersion::V8_7, false);
        assert_eq!(table.get(second).unwrap(), "xyz");
    }

    #[test]
    fn test_scrambled_mask() {
        let mut writer = StringTableWriter::new(CakeVersion::V9_1, true);
        writer.push("origin").unwrap();
        let offset = writer.push("AAAAA").unwrap();
        assert_eq!(offset, 8);
        let bytes = writer.into_bytes();

        // offset 8: masks are 8+0, 0+1, 0+2, 0+3, 8+4
        let body = &bytes[9..14];
        assert_eq!(body, &[b'A' ^ 8, b'A' ^ 1, b'A' ^ 2, b'A' ^ 3, b'A' ^ 12]);
        assert_eq!(bytes[14], 0);

        let table = StringTable::new(bytes, CakeVersion::V9_1, true);
        assert_eq!(table.get(offset).unwrap(), "AAAAA");
        assert_eq!(table.origin().as_deref(), Some("origin"));
    }

    #[test]
    fn test_bad_offsets() {
        let table = StringTable::new(b"\x05ab".to_vec(), CakeVersion::V9_2, false);
        assert!(matches!(
            table.get(0),
            Err(CakeError::MalformedSection {
                section: Section::Strings,
                ..
            })
        ));
        assert!(table.get(10).is_err());

        let table = StringTable::new(b"abc".to_vec(), CakeVersion::V6_8, false);
        assert!(table.get(0).is_err());
    }

    #[test]
    fn test_long_strings_are_rejected() {
        let mut writer = StringTableWriter::new(CakeVersion::V8_1, false);
        let long = "x".repeat(256);
        assert!(matches!(
            writer.push(&long),
            Err(CakeError::FieldOverflow { .. })
        ));
    }
}
