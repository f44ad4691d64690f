//! FNV-1a path hash
//!
//! Paths inside a cake are addressed by a case-insensitive 64-bit FNV-1a hash
//! over UTF-16 code units. Each unit is lowercased on its own and always maps
//! to exactly one unit, so surrogate pairs pass through unchanged.

const FNV64_OFFSET: u64 = 0xCBF2_9CE4_8422_2325;
const FNV64_PRIME: u64 = 0x0000_0100_0000_01B3;

/// Lowercase a single UTF-16 unit; never expands
fn lower_unit(c: char) -> char {
    if c.len_utf16() != 1 {
        return c;
    }
    match c.to_lowercase().next() {
        Some(lower) if lower.len_utf16() == 1 => lower,
        _ => c,
    }
}

/// Case-insensitive 64-bit FNV-1a over a path
///
/// ASCII paths hash byte-for-byte like the game does.
///
/// ```
/// use cake_crypto::fnv::fnv1a64_path;
///
/// assert_eq!(fnv1a64_path("Data/Foo.TXT"), fnv1a64_path("data/foo.txt"));
/// ```
pub fn fnv1a64_path(path: &str) -> u64 {
    let mut units = [0u16; 2];
    path.chars().fold(FNV64_OFFSET, |hash, c| {
        lower_unit(c)
            .encode_utf16(&mut units)
            .iter()
            .fold(hash, |hash, &unit| {
                (hash ^ u64::from(unit)).wrapping_mul(FNV64_PRIME)
            })
    })
}
