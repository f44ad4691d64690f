//! Per-version XOR key derivation
//!
//! Every encrypted cake seeds its TOC cipher with a 32-bit key derived from
//! the archive's file name. Only the 9.1 and 9.2 schedules are known; other
//! versions report [`CakeError::KeyScheduleUnavailable`] so unencrypted
//! archives of those versions still work.

use tracing::trace;

use super::key_v9;
use crate::error::{CakeError, CakeResult};
use crate::version::CakeVersion;

/// Derive the XOR key for an archive
///
/// `file_name` is the bare file name (`data.cak`), not a path.
pub fn derive_xor_key(file_name: &str, version: CakeVersion) -> CakeResult<u32> {
    let key = match version {
        CakeVersion::V9_1 => key_v9::derive_v9_1(file_name),
        CakeVersion::V9_2 => key_v9::derive_v9_2(file_name),
        CakeVersion::V6_7
        | CakeVersion::V6_8
        | CakeVersion::V8_1
        | CakeVersion::V8_2
        | CakeVersion::V8_3
        | CakeVersion::V8_7
        | CakeVersion::V9_3 => return Err(CakeError::KeyScheduleUnavailable(version)),
    };
    trace!(file_name, %version, key = format_args!("{key:#010x}"), "derived xor key");
    Ok(key)
}

/// Little-endian u64 words of a table; trailing bytes are ignored
pub(super) fn u64_words(table: &[u8]) -> impl Iterator<Item = u64> + '_ {
    table.chunks_exact(8).map(|chunk| {
        let mut word = [0u8; 8];
        word.copy_from_slice(chunk);
        u64::from_le_bytes(word)
    })
}

/// Chain-XOR the u32 words of a table, each word absorbing the previous result
pub(super) fn xor_u32_words(table: &mut [u8], start: u32) {
    let mut last = start;
    for chunk in table.chunks_exact_mut(4) {
        let word = u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]) ^ last;
        chunk.copy_from_slice(&word.to_le_bytes());
        last = word;
    }
}
