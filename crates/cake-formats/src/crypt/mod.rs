//! Key derivation and the TOC cipher

mod key_v9;
mod keys;
pub mod toc_cipher;

pub use keys::derive_xor_key;
