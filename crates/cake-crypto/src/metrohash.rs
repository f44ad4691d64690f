//! MetroHash128 with CRC32C lane mixing
//!
//! Port of J. Andrew Rogers' `metrohash128crc_2`, plus the bulk-only variant
//! with replaceable constants that some key schedules use. Both return the
//! two 64-bit output lanes; [`lanes_to_bytes`] gives the little-endian
//! 16-byte digest when a schedule needs it as bytes.

use crate::crc32c::crc32c_u64;

/// Multiplier set for the MetroHash mixing steps
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetroConstants {
    pub k0: u64,
    pub k1: u64,
    pub k2: u64,
    pub k3: u64,
}

/// Constants of the published `metrohash128crc_2`
pub const METRO_128CRC_2: MetroConstants = MetroConstants {
    k0: 0xEE78_3E2F,
    k1: 0xAD07_C493,
    k2: 0x797A_90BB,
    k3: 0x2E4B_2E1B,
};

/// `_mm_crc32_u64` semantics: low 32 bits of the accumulator, zero-extended result
#[inline]
fn crc_lane(acc: u64, value: u64) -> u64 {
    u64::from(crc32c_u64(acc as u32, value))
}

#[inline]
fn read_u64(data: &[u8], at: usize) -> u64 {
    let mut buf = [0u8; 8];
    buf.copy_from_slice(&data[at..at + 8]);
    u64::from_le_bytes(buf)
}

#[inline]
fn read_u32(data: &[u8], at: usize) -> u64 {
    u64::from(u32::from_le_bytes([
        data[at],
        data[at + 1],
        data[at + 2],
        data[at + 3],
    ]))
}

#[inline]
fn read_u16(data: &[u8], at: usize) -> u64 {
    u64::from(u16::from_le_bytes([data[at], data[at + 1]]))
}

/// Fold 32-byte stripes into four lanes and merge them back into `v[0..2]`
fn bulk(v: &mut [u64; 4], data: &[u8], k: &MetroConstants) -> usize {
    let mut ptr = 0;
    while data.len() - ptr >= 32 {
        v[0] ^= crc_lane(v[0], read_u64(data, ptr));
        v[1] ^= crc_lane(v[1], read_u64(data, ptr + 8));
        v[2] ^= crc_lane(v[2], read_u64(data, ptr + 16));
        v[3] ^= crc_lane(v[3], read_u64(data, ptr + 24));
        ptr += 32;
    }

    v[2] ^= v[0]
        .wrapping_add(v[3])
        .wrapping_mul(k.k0)
        .wrapping_add(v[1])
        .rotate_right(34)
        .wrapping_mul(k.k1);
    v[3] ^= v[1]
        .wrapping_add(v[2])
        .wrapping_mul(k.k1)
        .wrapping_add(v[0])
        .rotate_right(37)
        .wrapping_mul(k.k0);
    v[0] ^= v[0]
        .wrapping_add(v[2])
        .wrapping_mul(k.k0)
        .wrapping_add(v[3])
        .rotate_right(34)
        .wrapping_mul(k.k1);
    v[1] ^= v[1]
        .wrapping_add(v[3])
        .wrapping_mul(k.k1)
        .wrapping_add(v[2])
        .rotate_right(37)
        .wrapping_mul(k.k0);

    ptr
}

fn finalize(v: &mut [u64; 4], k: &MetroConstants) -> [u64; 2] {
    for _ in 0..2 {
        v[0] = v[0].wrapping_add(v[0].wrapping_mul(k.k0).wrapping_add(v[1]).rotate_right(11));
        v[1] = v[1].wrapping_add(v[1].wrapping_mul(k.k1).wrapping_add(v[0]).rotate_right(26));
    }
    [v[0], v[1]]
}

fn initial_lanes(seed: u64, len: u64, k: &MetroConstants) -> [u64; 4] {
    [
        seed.wrapping_sub(k.k0).wrapping_mul(k.k3).wrapping_add(len),
        seed.wrapping_add(k.k1).wrapping_mul(k.k2).wrapping_add(len),
        seed.wrapping_add(k.k0).wrapping_mul(k.k2).wrapping_add(len),
        seed.wrapping_sub(k.k1).wrapping_mul(k.k3).wrapping_add(len),
    ]
}

/// `metrohash128crc_2` over `data`
pub fn metrohash128crc_2(data: &[u8], seed: u64) -> [u64; 2] {
    let k = &METRO_128CRC_2;
    let len = data.len() as u64;
    let mut v = initial_lanes(seed, len, k);

    let mut ptr = 0;
    if data.len() >= 32 {
        ptr = bulk(&mut v, data, k);
    }

    let remaining = |ptr: usize| data.len() - ptr;

    if remaining(ptr) >= 16 {
        v[0] = v[0].wrapping_add(read_u64(data, ptr).wrapping_mul(k.k2));
        v[0] = v[0].rotate_right(34).wrapping_mul(k.k3);
        v[1] = v[1].wrapping_add(read_u64(data, ptr + 8).wrapping_mul(k.k2));
        v[1] = v[1].rotate_right(34).wrapping_mul(k.k3);
        v[0] ^= v[0].wrapping_mul(k.k2).wrapping_add(v[1]).rotate_right(30).wrapping_mul(k.k1);
        v[1] ^= v[1].wrapping_mul(k.k3).wrapping_add(v[0]).rotate_right(30).wrapping_mul(k.k0);
        ptr += 16;
    }

    if remaining(ptr) >= 8 {
        v[0] = v[0].wrapping_add(read_u64(data, ptr).wrapping_mul(k.k2));
        v[0] = v[0].rotate_right(36).wrapping_mul(k.k3);
        v[0] ^= v[0].wrapping_mul(k.k2).wrapping_add(v[1]).rotate_right(23).wrapping_mul(k.k1);
        ptr += 8;
    }

    if remaining(ptr) >= 4 {
        v[1] ^= crc_lane(v[0], read_u32(data, ptr));
        v[1] ^= v[1].wrapping_mul(k.k3).wrapping_add(v[0]).rotate_right(19).wrapping_mul(k.k0);
        ptr += 4;
    }

    if remaining(ptr) >= 2 {
        v[0] ^= crc_lane(v[1], read_u16(data, ptr));
        v[0] ^= v[0].wrapping_mul(k.k2).wrapping_add(v[1]).rotate_right(13).wrapping_mul(k.k1);
        ptr += 2;
    }

    if remaining(ptr) >= 1 {
        v[1] ^= crc_lane(v[0], u64::from(data[ptr]));
        v[1] ^= v[1].wrapping_mul(k.k3).wrapping_add(v[0]).rotate_right(17).wrapping_mul(k.k0);
    }

    finalize(&mut v, k)
}

/// Stripe-only MetroHash128-CRC with caller constants
///
/// Only whole 32-byte stripes are consumed; trailing bytes are ignored. The
/// key tables fed to it are always a multiple of 32 bytes long.
pub fn metrohash128crc_stripes(data: &[u8], seed: u64, k: &MetroConstants) -> [u64; 2] {
    let mut v = initial_lanes(seed, data.len() as u64, k);
    bulk(&mut v, data, k);
    finalize(&mut v, k)
}

/// Little-endian byte form of a 128-bit digest
pub fn lanes_to_bytes(lanes: [u64; 2]) -> [u8; 16] {
    let mut out = [0u8; 16];
    out[..8].copy_from_slice(&lanes[0].to_le_bytes());
    out[8..].copy_from_slice(&lanes[1].to_le_bytes());
    out
}

/// XOR of the four 32-bit words of a digest
pub fn fold_to_u32(lanes: [u64; 2]) -> u32 {
    let [a, b] = lanes;
    (a as u32) ^ ((a >> 32) as u32) ^ (b as u32) ^ ((b >> 32) as u32)
}
