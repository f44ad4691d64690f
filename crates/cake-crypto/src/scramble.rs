//! ELF-style byte fold used to seed generators from key tables

/// Fold `bytes` into a 28-bit seed
///
/// Same recurrence as the System V ELF symbol hash: shift in each byte four
/// bits at a time and feed the top nibble back into bits 4-7.
pub fn scramble_seed(bytes: &[u8]) -> u32 {
    bytes.iter().fold(0u32, |val, &b| {
        let val = (val << 4).wrapping_add(u32::from(b));
        (val ^ ((val & 0xF000_0000) >> 24)) & 0x0FFF_FFFF
    })
}
