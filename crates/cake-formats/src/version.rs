//! Supported cake format revisions
//!
//! The version space is a closed set. Each revision is its own variant and
//! every version-dependent concern matches on it exhaustively; two revisions
//! that currently share a layout are still listed separately at each match.

use std::fmt;
use std::str::FromStr;

use crate::error::{CakeError, CakeResult};

/// Major format era
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Era {
    /// 6.x: zero-terminated strings, CRC32 payload checksums
    V6,
    /// 8.x: length-prefixed strings, CRC32C payload checksums
    V8,
    /// 9.x: chunk tables in file entries, origin string
    V9,
}

/// A supported `(major, minor)` pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CakeVersion {
    /// 6.7
    V6_7,
    /// 6.8
    V6_8,
    /// 8.1
    V8_1,
    /// 8.2
    V8_2,
    /// 8.3
    V8_3,
    /// 8.7, first revision with the high-byte registry type
    V8_7,
    /// 9.1
    V9_1,
    /// 9.2
    V9_2,
    /// 9.3
    V9_3,
}

impl CakeVersion {
    /// Every supported version, oldest first
    pub const ALL: [Self; 9] = [
        Self::V6_7,
        Self::V6_8,
        Self::V8_1,
        Self::V8_2,
        Self::V8_3,
        Self::V8_7,
        Self::V9_1,
        Self::V9_2,
        Self::V9_3,
    ];

    /// Look up a version pair
    pub fn from_pair(major: u8, minor: u8) -> CakeResult<Self> {
        match (major, minor) {
            (6, 7) => Ok(Self::V6_7),
            (6, 8) => Ok(Self::V6_8),
            (8, 1) => Ok(Self::V8_1),
            (8, 2) => Ok(Self::V8_2),
            (8, 3) => Ok(Self::V8_3),
            (8, 7) => Ok(Self::V8_7),
            (9, 1) => Ok(Self::V9_1),
            (9, 2) => Ok(Self::V9_2),
            (9, 3) => Ok(Self::V9_3),
            _ => Err(CakeError::UnsupportedVersion { major, minor }),
        }
    }

    /// Decode the on-disk version word (low byte major, high byte minor)
    pub fn from_word(word: u16) -> CakeResult<Self> {
        let [major, minor] = word.to_le_bytes();
        Self::from_pair(major, minor)
    }

    /// Encode as the on-disk version word
    pub fn to_word(self) -> u16 {
        u16::from_le_bytes([self.major(), self.minor()])
    }

    /// Major version byte
    pub fn major(self) -> u8 {
        match self {
            Self::V6_7 | Self::V6_8 => 6,
            Self::V8_1 | Self::V8_2 | Self::V8_3 | Self::V8_7 => 8,
            Self::V9_1 | Self::V9_2 | Self::V9_3 => 9,
        }
    }

    /// Minor version byte
    pub fn minor(self) -> u8 {
        match self {
            Self::V6_7 => 7,
            Self::V6_8 => 8,
            Self::V8_1 => 1,
            Self::V8_2 => 2,
            Self::V8_3 => 3,
            Self::V8_7 => 7,
            Self::V9_1 => 1,
            Self::V9_2 => 2,
            Self::V9_3 => 3,
        }
    }

    /// Format era
    pub fn era(self) -> Era {
        match self {
            Self::V6_7 | Self::V6_8 => Era::V6,
            Self::V8_1 | Self::V8_2 | Self::V8_3 | Self::V8_7 => Era::V8,
            Self::V9_1 | Self::V9_2 | Self::V9_3 => Era::V9,
        }
    }

    /// Whether the XOR key schedule of this version is known
    ///
    /// Versions without one can only be read and written unencrypted.
    pub fn has_key_schedule(self) -> bool {
        match self {
            Self::V9_1 | Self::V9_2 => true,
            Self::V6_7
            | Self::V6_8
            | Self::V8_1
            | Self::V8_2
            | Self::V8_3
            | Self::V8_7
            | Self::V9_3 => false,
        }
    }

    /// Whether the flags word keeps the registry type in its high byte
    pub fn has_high_registry_flags(self) -> bool {
        match self {
            Self::V6_7 | Self::V6_8 | Self::V8_1 | Self::V8_2 | Self::V8_3 => false,
            Self::V8_7 | Self::V9_1 | Self::V9_2 | Self::V9_3 => true,
        }
    }
}

impl fmt::Display for CakeVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major(), self.minor())
    }
}

impl FromStr for CakeVersion {
    type Err = CakeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || CakeError::UnsupportedVersion { major: 0, minor: 0 };
        let (major, minor) = s.trim().split_once('.').ok_or_else(invalid)?;
        let major = major.parse::<u8>().map_err(|_| invalid())?;
        let minor = minor.parse::<u8>().map_err(|_| invalid())?;
        Self::from_pair(major, minor)
    }
}
