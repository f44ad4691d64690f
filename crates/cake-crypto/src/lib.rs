//! Primitive crypto for the cake archive format
//!
//! Everything here is a pure function (or, for the PRNG, a plain value type)
//! over byte buffers. The cake key schedules combine these primitives in
//! version-specific ways; see the `cake-formats` crate for those.
//!
//! # Components
//!
//! - **Checksums**: CRC32C with both conventional and raw SSE4.2 step forms
//! - **Hashes**: FNV-1a path hash, MetroHash128-CRC, the ELF-style seed fold
//! - **Ciphers**: ChaCha20 with a caller-supplied sigma
//! - **PRNG**: SFMT-19937
//!
//! # Examples
//!
//! ```
//! use cake_crypto::{crc32c, fnv1a64_path, Sfmt};
//!
//! assert_eq!(crc32c(b"123456789"), 0xE306_9283);
//! assert_eq!(fnv1a64_path("Foo/Bar"), fnv1a64_path("foo/bar"));
//!
//! let mut rng = Sfmt::new(1234);
//! assert_eq!(rng.next_u32(), 3_440_181_298);
//! ```

pub mod chacha20;
pub mod crc32c;
pub mod fnv;
pub mod metrohash;
pub mod scramble;
pub mod sfmt;

pub use chacha20::{ChaChaParams, STANDARD_SIGMA, chacha20_xor};
pub use crc32c::{Crc32c, crc32c, crc32c_u8, crc32c_u16, crc32c_u32, crc32c_u64};
pub use fnv::fnv1a64_path;
pub use metrohash::{
    METRO_128CRC_2, MetroConstants, fold_to_u32, lanes_to_bytes, metrohash128crc_2,
    metrohash128crc_stripes,
};
pub use scramble::scramble_seed;
pub use sfmt::Sfmt;

#[cfg(test)]
mod proptest_tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn chacha_is_an_involution(data in proptest::collection::vec(any::<u8>(), 0..300), counter in 0u32..4) {
            let params = ChaChaParams::from_ascii("proptest key", "nonce", 4, "0123456789abcdef");
            let mut buf = data.clone();
            chacha20_xor(&params, counter, &mut buf);
            chacha20_xor(&params, counter, &mut buf);
            prop_assert_eq!(buf, data);
        }

        #[test]
        fn crc32c_split_point_does_not_matter(data in proptest::collection::vec(any::<u8>(), 0..200), split in 0usize..200) {
            let split = split.min(data.len());
            let mut hasher = Crc32c::new();
            hasher.update(&data[..split]);
            hasher.update(&data[split..]);
            prop_assert_eq!(hasher.finalize(), crc32c(&data));
        }

        #[test]
        fn path_hash_ignores_ascii_case(path in "[a-zA-Z0-9_/.]{0,40}") {
            prop_assert_eq!(fnv1a64_path(&path), fnv1a64_path(&path.to_ascii_uppercase()));
        }
    }
}
