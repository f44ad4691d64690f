//! SFMT-19937 pseudo-random generator
//!
//! SIMD-oriented Fast Mersenne Twister (Saito & Matsumoto) with the MEXP 19937
//! parameter set, producing 32-bit outputs. The 128-bit lanes are handled as
//! four `u32` words so the generator behaves the same on every target.

const MEXP: usize = 19937;
/// Number of 128-bit state words
const N: usize = MEXP / 128 + 1;
/// Number of 32-bit state words
const N32: usize = N * 4;

const POS1: usize = 122;
const SL1: u32 = 18;
const SL2: u32 = 1;
const SR1: u32 = 11;
const SR2: u32 = 1;

const MASK: [u32; 4] = [0xDFFF_FFEF, 0xDDFE_CB7F, 0xBFFA_FFFF, 0xBFFF_FFF6];
const PARITY: [u32; 4] = [0x0000_0001, 0x0000_0000, 0x0000_0000, 0x13C9_E684];

type W128 = [u32; 4];

#[inline]
const fn join(hi: u32, lo: u32) -> u64 {
    ((hi as u64) << 32) | lo as u64
}

/// Shift a 128-bit word right by `bytes` whole bytes
#[inline]
fn rshift128(input: W128, bytes: u32) -> W128 {
    let th = join(input[3], input[2]);
    let tl = join(input[1], input[0]);
    let shift = bytes * 8;

    let oh = th >> shift;
    let ol = (tl >> shift) | (th << (64 - shift));
    [ol as u32, (ol >> 32) as u32, oh as u32, (oh >> 32) as u32]
}

/// Shift a 128-bit word left by `bytes` whole bytes
#[inline]
fn lshift128(input: W128, bytes: u32) -> W128 {
    let th = join(input[3], input[2]);
    let tl = join(input[1], input[0]);
    let shift = bytes * 8;

    let oh = (th << shift) | (tl >> (64 - shift));
    let ol = tl << shift;
    [ol as u32, (ol >> 32) as u32, oh as u32, (oh >> 32) as u32]
}

#[inline]
fn recursion(a: W128, b: W128, c: W128, d: W128) -> W128 {
    let x = lshift128(a, SL2);
    let y = rshift128(c, SR2);
    let mut r = [0u32; 4];
    for i in 0..4 {
        r[i] = a[i] ^ x[i] ^ ((b[i] >> SR1) & MASK[i]) ^ y[i] ^ (d[i] << SL1);
    }
    r
}

/// SFMT-19937 generator state
#[derive(Clone)]
pub struct Sfmt {
    state: Box<[W128; N]>,
    index: usize,
}

impl std::fmt::Debug for Sfmt {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Sfmt").field("index", &self.index).finish_non_exhaustive()
    }
}

impl Sfmt {
    /// Seed the generator (`init_gen_rand`)
    pub fn new(seed: u32) -> Self {
        let mut words = [0u32; N32];
        words[0] = seed;
        for i in 1..N32 {
            let prev = words[i - 1];
            words[i] = 1_812_433_253_u32
                .wrapping_mul(prev ^ (prev >> 30))
                .wrapping_add(i as u32);
        }

        let mut state = Box::new([[0u32; 4]; N]);
        for (i, w) in words.iter().enumerate() {
            state[i / 4][i % 4] = *w;
        }

        let mut sfmt = Self {
            state,
            index: N32,
        };
        sfmt.certify_period();
        sfmt
    }

    fn certify_period(&mut self) {
        let mut inner = 0u32;
        for (i, parity) in PARITY.iter().enumerate() {
            inner ^= self.state[0][i] & parity;
        }
        let mut shift = 16;
        while shift > 0 {
            inner ^= inner >> shift;
            shift >>= 1;
        }
        if inner & 1 == 1 {
            return;
        }

        for (i, parity) in PARITY.iter().enumerate() {
            let mut work = 1u32;
            for _ in 0..32 {
                if work & parity != 0 {
                    self.state[0][i] ^= work;
                    return;
                }
                work <<= 1;
            }
        }
    }

    fn generate_all(&mut self) {
        let mut r1 = self.state[N - 2];
        let mut r2 = self.state[N - 1];
        for i in 0..N {
            let b = self.state[(i + POS1) % N];
            let next = recursion(self.state[i], b, r1, r2);
            self.state[i] = next;
            r1 = r2;
            r2 = next;
        }
    }

    /// Next 32-bit output
    pub fn next_u32(&mut self) -> u32 {
        if self.index >= N32 {
            self.generate_all();
            self.index = 0;
        }
        let value = self.state[self.index / 4][self.index % 4];
        self.index += 1;
        value
    }
}
