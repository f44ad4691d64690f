//! CRC32C (Castagnoli) checksum
//!
//! Two flavours are exposed:
//!
//! - [`crc32c`] / [`Crc32c`]: the conventional checksum (initial value and
//!   final XOR of `0xFFFFFFFF`), used for section and payload checksums.
//! - [`crc32c_u8`], [`crc32c_u16`], [`crc32c_u32`], [`crc32c_u64`]: raw step
//!   functions with the semantics of the SSE4.2 `crc32` instruction (no
//!   pre/post inversion, little-endian operand order). Key derivation folds
//!   hash lanes through these.

/// Reflected Castagnoli polynomial
const POLY: u32 = 0x82F6_3B78;

const TABLE: [u32; 256] = {
    let mut table = [0u32; 256];
    let mut i = 0;
    while i < 256 {
        let mut crc = i as u32;
        let mut j = 0;
        while j < 8 {
            if crc & 1 != 0 {
                crc = (crc >> 1) ^ POLY;
            } else {
                crc >>= 1;
            }
            j += 1;
        }
        table[i] = crc;
        i += 1;
    }
    table
};

/// Fold one byte into `crc`
#[inline]
pub fn crc32c_u8(crc: u32, value: u8) -> u32 {
    (crc >> 8) ^ TABLE[((crc ^ u32::from(value)) & 0xFF) as usize]
}

/// Fold a 16-bit value (little-endian byte order) into `crc`
#[inline]
pub fn crc32c_u16(crc: u32, value: u16) -> u32 {
    value.to_le_bytes().iter().fold(crc, |c, &b| crc32c_u8(c, b))
}

/// Fold a 32-bit value (little-endian byte order) into `crc`
#[inline]
pub fn crc32c_u32(crc: u32, value: u32) -> u32 {
    value.to_le_bytes().iter().fold(crc, |c, &b| crc32c_u8(c, b))
}

/// Fold a 64-bit value (little-endian byte order) into `crc`
#[inline]
pub fn crc32c_u64(crc: u32, value: u64) -> u32 {
    value.to_le_bytes().iter().fold(crc, |c, &b| crc32c_u8(c, b))
}

/// Compute the CRC32C checksum of `data`
pub fn crc32c(data: &[u8]) -> u32 {
    let mut hasher = Crc32c::new();
    hasher.update(data);
    hasher.finalize()
}

/// Incremental CRC32C hasher
#[derive(Debug, Clone, Copy)]
pub struct Crc32c {
    state: u32,
}

impl Crc32c {
    /// Start a new checksum
    pub const fn new() -> Self {
        Self { state: !0 }
    }

    /// Feed more bytes
    pub fn update(&mut self, data: &[u8]) {
        self.state = data.iter().fold(self.state, |c, &b| crc32c_u8(c, b));
    }

    /// Feed a single byte
    pub fn update_byte(&mut self, byte: u8) {
        self.state = crc32c_u8(self.state, byte);
    }

    /// Finish and return the complemented checksum
    pub const fn finalize(&self) -> u32 {
        !self.state
    }
}

impl Default for Crc32c {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crc32c_check_value() {
        assert_eq!(crc32c(b"123456789"), 0xE306_9283);
        assert_eq!(crc32c(b""), 0);
    }

    #[test]
    fn test_incremental_matches_one_shot() {
        let data = b"The quick brown fox jumps over the lazy dog";
        let mut hasher = Crc32c::new();
        hasher.update(&data[..10]);
        hasher.update(&data[10..]);
        assert_eq!(hasher.finalize(), crc32c(data));
    }

    #[test]
    fn test_wide_steps_match_byte_steps() {
        let value = 0x0102_0304_0506_0708_u64;
        let by_bytes = value
            .to_le_bytes()
            .iter()
            .fold(0x1234_5678, |c, &b| crc32c_u8(c, b));
        assert_eq!(crc32c_u64(0x1234_5678, value), by_bytes);

        let low = crc32c_u32(0x1234_5678, 0x0506_0708);
        assert_eq!(crc32c_u32(low, 0x0102_0304), by_bytes);
        assert_eq!(
            crc32c_u16(crc32c_u16(!0, 0x0708), 0x0506),
            crc32c_u32(!0, 0x0506_0708)
        );
    }
}
