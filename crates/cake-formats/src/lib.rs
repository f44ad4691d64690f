//! Cake game archive reader and builder
//!
#![allow(clippy::cast_possible_truncation)] // Intentional for binary format parsing
#![allow(clippy::cast_possible_wrap)] // Intentional for key schedule arithmetic
#![allow(clippy::cast_lossless)] // Sometimes clearer than From
#![allow(clippy::uninlined_format_args)] // Backwards compatibility
#![allow(clippy::doc_markdown)] // Format terms don't need backticks
#![allow(clippy::module_name_repetitions)] // Clear naming is preferred
#![allow(clippy::similar_names)] // Domain-specific naming patterns
#![allow(clippy::cast_precision_loss)] // Size formatting
#![allow(clippy::return_self_not_must_use)] // Builder patterns
#![allow(clippy::use_self)] // Type clarity
//! A cake is a single-file container holding a directory tree. It is
//! versioned, and the version decides the record layouts, the payload
//! framing, and for 9.1 and 9.2 the key schedule that turns the archive's
//! file name into a 32-bit XOR key for the table of contents.
//!
//! # Supported Versions
//!
//! | Version  | Encrypted TOC      | Payload framing               |
//! |----------|--------------------|-------------------------------|
//! | 6.7, 6.8 | no known schedule  | stored raw, CRC32 checksum    |
//! | 8.1-8.7  | no known schedule  | single block, CRC32C checksum |
//! | 9.1, 9.2 | 32-bit rolling xor | chunked, per-chunk codec      |
//! | 9.3      | no known schedule  | chunked, per-chunk codec      |
//!
//! Unencrypted cakes of every version can be read and baked. Encrypted
//! payloads are not supported for any version.
//!
//! # Layout
//!
//! - [`toc`]: header, section descriptors and the five TOC sections
//! - [`crypt`]: key derivation and the TOC cipher
//! - [`chunk`]: chunk framing and block codecs
//! - [`archive`]: [`CakeArchive`] reader and [`CakeBuilder`]

#![warn(missing_docs)]

pub mod archive;
/// Chunked payload framing and block codecs
pub mod chunk;
/// Key derivation and the TOC cipher
pub mod crypt;
pub mod error;
/// Resource type tags
pub mod resource;
pub mod toc;
/// Byte size formatting
pub mod util;
/// Format revisions
pub mod version;

pub use archive::{
    BuildSummary, BuilderOptions, CakeArchive, CakeBuilder, ExtractSummary, OpenOptions,
};
pub use chunk::{BlockCodec, Codec};
pub use crypt::derive_xor_key;
pub use error::{CakeError, CakeResult, ErrorKind};
pub use resource::ResourceType;
pub use toc::{CakeHeader, DirEntry, FileEntry, LookupEntry, RegistryType};
pub use version::{CakeVersion, Era};
