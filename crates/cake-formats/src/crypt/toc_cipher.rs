//! Self-keyed TOC transform
//!
//! The header table and every section are enciphered with a rolling XOR
//! seeded by the archive's XOR key. Data is taken as little-endian u32 words;
//! each word is XORed with the previous *ciphertext* word (the key for the
//! first one). Trailing bytes continue the chain one byte at a time using the
//! low byte of the previous ciphertext unit.
//!
//! Both directions return the CRC32C of the plaintext, which is what the
//! section descriptors store. Only versions with a recovered key schedule have
//! a transform; everything else is [`CakeError::KeyScheduleUnavailable`].

use cake_crypto::Crc32c;

use crate::error::{CakeError, CakeResult};
use crate::version::CakeVersion;

/// Decrypt `data` in place and return the CRC32C of the plaintext
pub fn decrypt(version: CakeVersion, key: u32, data: &mut [u8]) -> CakeResult<u32> {
    match version {
        CakeVersion::V9_1 | CakeVersion::V9_2 => Ok(chained_decrypt(key, data)),
        CakeVersion::V6_7
        | CakeVersion::V6_8
        | CakeVersion::V8_1
        | CakeVersion::V8_2
        | CakeVersion::V8_3
        | CakeVersion::V8_7
        | CakeVersion::V9_3 => Err(CakeError::KeyScheduleUnavailable(version)),
    }
}

/// Encrypt `data` in place and return the CRC32C of the plaintext
pub fn encrypt(version: CakeVersion, key: u32, data: &mut [u8]) -> CakeResult<u32> {
    match version {
        CakeVersion::V9_1 | CakeVersion::V9_2 => Ok(chained_encrypt(key, data)),
        CakeVersion::V6_7
        | CakeVersion::V6_8
        | CakeVersion::V8_1
        | CakeVersion::V8_2
        | CakeVersion::V8_3
        | CakeVersion::V8_7
        | CakeVersion::V9_3 => Err(CakeError::KeyScheduleUnavailable(version)),
    }
}

fn chained_decrypt(key: u32, data: &mut [u8]) -> u32 {
    let mut crc = Crc32c::new();
    let mut last = key;

    let mut words = data.chunks_exact_mut(4);
    for word in &mut words {
        let cipher = u32::from_le_bytes([word[0], word[1], word[2], word[3]]);
        let plain = cipher ^ last;
        word.copy_from_slice(&plain.to_le_bytes());
        crc.update(&plain.to_le_bytes());
        last = cipher;
    }

    for byte in words.into_remainder() {
        let cipher = *byte;
        *byte = cipher ^ last as u8;
        crc.update_byte(*byte);
        last = u32::from(cipher);
    }

    crc.finalize()
}

fn chained_encrypt(key: u32, data: &mut [u8]) -> u32 {
    let mut crc = Crc32c::new();
    let mut last = key;

    let mut words = data.chunks_exact_mut(4);
    for word in &mut words {
        let plain = u32::from_le_bytes([word[0], word[1], word[2], word[3]]);
        crc.update(&plain.to_le_bytes());
        let cipher = plain ^ last;
        word.copy_from_slice(&cipher.to_le_bytes());
        last = cipher;
    }

    for byte in words.into_remainder() {
        crc.update_byte(*byte);
        let cipher = *byte ^ last as u8;
        *byte = cipher;
        last = u32::from(cipher);
    }

    crc.finalize()
}
