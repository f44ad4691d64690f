//! Reading and baking whole cakes
//!
//! [`CakeArchive`] opens a cake, validates its table of contents and decodes
//! payloads on demand. [`CakeBuilder`] walks a directory tree and writes a
//! cake for any supported version.
//!
//! # Usage Examples
//!
//! ## Bake and read back
//!
//! ```rust
//! use cake_formats::archive::{BuilderOptions, CakeArchive, CakeBuilder, OpenOptions};
//! use cake_formats::CakeVersion;
//! use std::io::Cursor;
//!
//! let mut builder = CakeBuilder::new(BuilderOptions::new(CakeVersion::V9_3));
//! builder.add_bytes("scripts/init.lua", b"print('hi')".to_vec())?;
//!
//! let mut cake = Cursor::new(Vec::new());
//! builder.bake_to_writer(&mut cake, "data.cak")?;
//!
//! let mut archive = CakeArchive::from_reader(cake, "data.cak", OpenOptions::default())?;
//! assert_eq!(archive.extract_file("scripts/init.lua")?, b"print('hi')");
//! # Ok::<(), cake_formats::CakeError>(())
//! ```
//!
//! The archive's file name seeds the key schedule, so an encrypted cake must
//! be opened under the name it was baked with. Only 9.1 and 9.2 cakes can be
//! encrypted.

mod builder;
mod options;
pub mod path;
mod reader;

pub use builder::{BuildSummary, CakeBuilder};
pub use options::{BuilderOptions, OpenOptions};
pub use reader::{CakeArchive, ExtractSummary};
