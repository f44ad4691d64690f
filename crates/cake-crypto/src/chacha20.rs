//! ChaCha20 stream cipher with a caller-supplied sigma
//!
//! Cake key schedules run their key tables through ChaCha20 keyed with
//! hard-coded material, and some of them also replace the
//! `"expand 32-byte k"` constant. The cipher is exposed as a pure function:
//! every call starts from the given block counter, there is no context to
//! reset or reuse between derivations.
//!
//! State layout follows RFC 7539: four sigma words, eight key words, a 32-bit
//! block counter and a 96-bit nonce.

/// Standard ChaCha20 constant
pub const STANDARD_SIGMA: [u8; 16] = *b"expand 32-byte k";

/// Key, nonce and constant material for one ChaCha20 invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChaChaParams {
    /// 256-bit key
    pub key: [u8; 32],
    /// 96-bit nonce
    pub nonce: [u8; 12],
    /// The four constant words, as bytes
    pub sigma: [u8; 16],
}

impl ChaChaParams {
    /// Build parameters from ASCII material, zero-padding short inputs
    ///
    /// `nonce_offset` is where the nonce text starts inside the 12-byte nonce;
    /// the game writes its IV strings at offset 4, leaving the first word zero.
    /// Inputs longer than their destination are truncated.
    pub fn from_ascii(key: &str, nonce: &str, nonce_offset: usize, sigma: &str) -> Self {
        let mut k = [0u8; 32];
        copy_truncated(&mut k, key.as_bytes());

        let mut n = [0u8; 12];
        if nonce_offset < n.len() {
            copy_truncated(&mut n[nonce_offset..], nonce.as_bytes());
        }

        let mut s = [0u8; 16];
        copy_truncated(&mut s, sigma.as_bytes());

        Self {
            key: k,
            nonce: n,
            sigma: s,
        }
    }
}

fn copy_truncated(dst: &mut [u8], src: &[u8]) {
    let len = dst.len().min(src.len());
    dst[..len].copy_from_slice(&src[..len]);
}

#[inline]
fn quarter_round(state: &mut [u32; 16], a: usize, b: usize, c: usize, d: usize) {
    state[a] = state[a].wrapping_add(state[b]);
    state[d] = (state[d] ^ state[a]).rotate_left(16);
    state[c] = state[c].wrapping_add(state[d]);
    state[b] = (state[b] ^ state[c]).rotate_left(12);
    state[a] = state[a].wrapping_add(state[b]);
    state[d] = (state[d] ^ state[a]).rotate_left(8);
    state[c] = state[c].wrapping_add(state[d]);
    state[b] = (state[b] ^ state[c]).rotate_left(7);
}

fn word(bytes: &[u8], index: usize) -> u32 {
    let i = index * 4;
    u32::from_le_bytes([bytes[i], bytes[i + 1], bytes[i + 2], bytes[i + 3]])
}

/// Produce one 64-byte keystream block
fn block(params: &ChaChaParams, counter: u32) -> [u8; 64] {
    let mut state = [0u32; 16];
    for i in 0..4 {
        state[i] = word(&params.sigma, i);
    }
    for i in 0..8 {
        state[4 + i] = word(&params.key, i);
    }
    state[12] = counter;
    for i in 0..3 {
        state[13 + i] = word(&params.nonce, i);
    }

    let mut working = state;
    for _ in 0..10 {
        // Column round
        quarter_round(&mut working, 0, 4, 8, 12);
        quarter_round(&mut working, 1, 5, 9, 13);
        quarter_round(&mut working, 2, 6, 10, 14);
        quarter_round(&mut working, 3, 7, 11, 15);

        // Diagonal round
        quarter_round(&mut working, 0, 5, 10, 15);
        quarter_round(&mut working, 1, 6, 11, 12);
        quarter_round(&mut working, 2, 7, 8, 13);
        quarter_round(&mut working, 3, 4, 9, 14);
    }

    let mut out = [0u8; 64];
    for (i, (w, s)) in working.iter().zip(state.iter()).enumerate() {
        out[i * 4..(i + 1) * 4].copy_from_slice(&w.wrapping_add(*s).to_le_bytes());
    }
    out
}

/// XOR `data` in place with the keystream starting at block `counter`
///
/// Encryption and decryption are the same operation.
pub fn chacha20_xor(params: &ChaChaParams, counter: u32, data: &mut [u8]) {
    let mut counter = counter;
    for chunk in data.chunks_mut(64) {
        let keystream = block(params, counter);
        for (byte, k) in chunk.iter_mut().zip(keystream.iter()) {
            *byte ^= k;
        }
        counter = counter.wrapping_add(1);
    }
}
