//! 9.x key schedules

use cake_crypto::{
    ChaChaParams, MetroConstants, Sfmt, chacha20_xor, crc32c_u8, crc32c_u64, fold_to_u32,
    metrohash128crc_2, metrohash128crc_stripes, scramble_seed,
};

use super::keys::{u64_words, xor_u32_words};

const TABLE_LEN: usize = 0x80;

/// Tweak shared by the 9.1 and 9.2 schedules
fn tweak_v9() -> ChaChaParams {
    ChaChaParams::from_ascii(
        "V9w0ooTmKK'{z!mg6b$E%1,s2)nj2o_",
        "XC;JQm8",
        4,
        "Ym<q}it&('oU^}t_",
    )
}

const METRO_V9_1: MetroConstants = MetroConstants {
    k0: 0x6351_6654,
    k1: 0x6857_6D5A,
    k2: 0x482B_4D62,
    k3: 0x5165_5468,
};

/// Walk the seed back and forth, bouncing off both ends
fn bounce_table(seed: &[u8], len: usize, mut byte: impl FnMut(u8, usize) -> u8) -> Vec<u8> {
    let last = seed.len().saturating_sub(1);
    let mut table = Vec::with_capacity(len);
    let mut index = 0usize;
    let mut forward = true;
    for i in 0..len {
        table.push(byte(seed.get(index).copied().unwrap_or(0), i));
        if last == 0 {
            continue;
        }
        if forward {
            index += 1;
        } else {
            index -= 1;
        }
        if index == last || index == 0 {
            forward = !forward;
        }
    }
    table
}

fn v9_1_byte(c: u8, i: usize) -> u8 {
    (!i32::from(c) ^ (i as i32 + 0x1C)) as u8
}

pub(super) fn derive_v9_1(file_name: &str) -> u32 {
    let seed = format!("{}{:03}{:03}", file_name.to_lowercase(), 9, 1);
    let mut table = bounce_table(seed.as_bytes(), TABLE_LEN, v9_1_byte);

    let params = tweak_v9();
    chacha20_xor(&params, 0, &mut table);

    let table_seed = u32::from_le_bytes([table[0], table[1], table[2], table[3]]);
    let digest = metrohash128crc_stripes(&table, u64::from(table_seed), &METRO_V9_1);

    let final_seed = !u64_words(&table).fold(!0u32, crc32c_u64);

    let mut copy = table;
    xor_u32_words(&mut copy, fold_to_u32(digest));
    chacha20_xor(&params, 0, &mut copy[..0x40]);

    fold_to_u32(metrohash128crc_stripes(
        &copy,
        u64::from(final_seed),
        &METRO_V9_1,
    ))
}

/// Walk the seed forward, then back without repeating either end
fn mirror_table(seed: &[u8], len: usize, byte: impl Fn(u8, usize) -> u8) -> Vec<u8> {
    let mut table = Vec::with_capacity(len + seed.len() * 2);
    if seed.is_empty() {
        table.resize(len, 0);
        return table;
    }
    while table.len() < len {
        for &c in seed {
            table.push(byte(c, table.len()));
        }
        for &c in seed.iter().skip(1).rev().skip(1) {
            table.push(byte(c, table.len()));
        }
    }
    table.truncate(len);
    table
}

fn v9_2_byte(c: u8, i: usize) -> u8 {
    c ^ c.wrapping_add((i ^ 0x1C) as u8)
}

pub(super) fn derive_v9_2(file_name: &str) -> u32 {
    let seed = format!("{file_name}-9-2").to_uppercase();
    let mut table = mirror_table(seed.as_bytes(), TABLE_LEN, v9_2_byte);

    let low = scramble_seed(&table);
    chacha20_xor(&tweak_v9(), 0, &mut table);
    let high = scramble_seed(&table);

    let words: Vec<u64> = u64_words(&table).collect();
    let mut rng = Sfmt::new(high);
    let mut base = (u64::from(high) << 32) | u64::from(low);
    for _ in 0..8 {
        let pick = words[rng.next_u32() as usize % words.len()];
        base = u64::from(crc32c_u64(base as u32, pick));
    }

    // The digests only advance the generator; the key comes from the table CRC
    let first = metrohash128crc_2(&table, base ^ u64::from(rng.next_u32()));
    let chained = crc32c_u64(crc32c_u64(base as u32, first[0]), !first[1]);
    let _ = metrohash128crc_2(&table, u64::from(chained) ^ u64::from(rng.next_u32()));

    let crc = table.iter().fold(0u32, |crc, &b| crc32c_u8(crc, b));
    crc ^ rng.next_u32()
}

#[cfg(test)]
mod tests {
    use super::*;
    use cake_crypto::lanes_to_bytes;

    #[test]
    fn test_bounce_table_walk() {
        let table = bounce_table(b"abc", 7, |c, _| c);
        assert_eq!(table, b"abcbabc");
    }

    #[test]
    fn test_mirror_table_walk() {
        let table = mirror_table(b"abcd", 10, |c, _| c);
        assert_eq!(table, b"abcdcbabcd");
    }

    #[test]
    fn test_mirror_table_short_seed() {
        assert_eq!(mirror_table(b"z", 3, |c, _| c), b"zzz");
        assert_eq!(mirror_table(b"", 2, |c, _| c), [0, 0]);
    }

    #[test]
    fn test_v9_2_seed_is_uppercased() {
        assert_eq!(derive_v9_2("data.cak"), derive_v9_2("DATA.CAK"));
    }

    #[test]
    fn test_v9_1_seed_is_lowercased() {
        assert_eq!(derive_v9_1("Data.Cak"), derive_v9_1("data.cak"));
    }

    // Intermediates below were computed by hand from the game's schedule,
    // independently of this module.

    #[test]
    fn test_v9_1_steps_for_data_cak() {
        let mut table = bounce_table(b"data.cak009001", TABLE_LEN, v9_1_byte);
        assert_eq!(table[..8], [0x87, 0x83, 0x95, 0x81, 0xF1, 0xBD, 0xBC, 0xB7]);

        chacha20_xor(&tweak_v9(), 0, &mut table);
        assert_eq!(table[..8], [0x48, 0x13, 0xDF, 0xC7, 0x92, 0xFF, 0x2E, 0xB0]);

        let table_seed = u32::from_le_bytes([table[0], table[1], table[2], table[3]]);
        let digest = metrohash128crc_stripes(&table, u64::from(table_seed), &METRO_V9_1);
        assert_eq!(
            lanes_to_bytes(digest),
            [
                0xEA, 0xDC, 0x02, 0x0C, 0x2E, 0xCC, 0x7B, 0xAA, 0x14, 0x7E, 0x58, 0xE5, 0xC5,
                0x29, 0x3B, 0xFE
            ]
        );

        let final_seed = !u64_words(&table).fold(!0u32, crc32c_u64);
        assert_eq!(final_seed, 0x5A5A_397B);
    }

    #[test]
    fn test_v9_2_steps_for_data_cak() {
        let mut table = mirror_table(b"DATA.CAK-9-2", TABLE_LEN, v9_2_byte);
        assert_eq!(table[..8], [0x24, 0x1F, 0x26, 0x21, 0x68, 0x1F, 0x1A, 0x2D]);
        assert_eq!(scramble_seed(&table), 0x030F_AAD5);

        chacha20_xor(&tweak_v9(), 0, &mut table);
        assert_eq!(scramble_seed(&table), 0x078C_8E44);
        assert_eq!(table.iter().fold(0u32, |crc, &b| crc32c_u8(crc, b)), 0xFD71_0D7D);
    }

    #[test]
    fn test_final_keys() {
        assert_eq!(derive_v9_1("data.cak"), 0xA259_F07A);
        assert_eq!(derive_v9_1("patch_01.cak"), 0x9C93_DABE);
        assert_eq!(derive_v9_2("data.cak"), 0x7D44_5DFB);
        assert_eq!(derive_v9_2("patch_01.cak"), 0x3E44_D5C5);
    }
}
