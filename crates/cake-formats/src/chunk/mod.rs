//! Chunked payload framing
//!
//! A compressed payload is the expanded bytes cut into chunks of
//! `sectors_per_chunk * SECTOR_SIZE`, each compressed on its own and stored
//! back to back. The entry keeps the cumulative stored end of every chunk,
//! relative to its data offset:
//!
//! ```text
//! expanded: [ chunk 0 (256 KiB) ][ chunk 1 (256 KiB) ][ chunk 2 (tail) ]
//! stored:   [ c0 ][ c1       ][ raw tail ]
//! ends:          e0          e1          e2 == stored length
//! ```
//!
//! A chunk that does not shrink is stored raw. Readers recognise it because
//! its stored size equals its expected expanded size.

mod codec;

use std::path::Path;

use tracing::trace;

pub use codec::{BlockCodec, Codec, Lz4Codec, ZlibCodec};

use crate::error::{CakeError, CakeResult};
use crate::version::{CakeVersion, Era};

/// Compression sector size in bytes
pub const SECTOR_SIZE: u32 = 0x100;

/// Sectors per chunk used by the builder unless configured otherwise
pub const DEFAULT_SECTORS_PER_CHUNK: u16 = 1024;

/// Files smaller than this are stored uncompressed
pub const MIN_COMPRESS_SIZE: u64 = 0x100;

/// Extensions whose content is already compressed or read in place
pub const COMPRESSION_DENYLIST: &[&str] = &[
    "tdb",
    "bk2",
    "adefs",
    "hkt",
    "bdy",
    "idx",
    "bin",
    "audioquery",
    "adb2",
    "iff",
    "pck",
    "bgnt",
    "ini",
    "dds",
    "db",
];

/// Expanded size of a full chunk
pub fn chunk_size(sectors_per_chunk: u16) -> usize {
    usize::from(sectors_per_chunk) * SECTOR_SIZE as usize
}

/// Whether the builder should compress a file
pub fn should_compress(version: CakeVersion, path: &str, size: u64, min_size: u64) -> bool {
    if version.era() == Era::V6 || size < min_size.max(1) {
        return false;
    }
    let denied = Path::new(path)
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| {
            COMPRESSION_DENYLIST
                .iter()
                .any(|denied| ext.eq_ignore_ascii_case(denied))
        });
    !denied
}

/// Stored bytes and chunk table of a compressed payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompressedPayload {
    /// Chunks back to back
    pub data: Vec<u8>,
    /// Cumulative stored end of each chunk
    pub chunk_ends: Vec<u32>,
}

impl CompressedPayload {
    /// Whether at least one chunk shrank
    pub fn saves_space(&self, expanded_size: usize) -> bool {
        self.data.len() < expanded_size
    }
}

/// Split `input` into chunks of `chunk_len` bytes and compress each one
pub fn compress(
    codec: &dyn BlockCodec,
    input: &[u8],
    chunk_len: usize,
) -> CakeResult<CompressedPayload> {
    if chunk_len == 0 {
        return Err(CakeError::InvalidChunkTable(
            "chunk size must be non-zero".to_string(),
        ));
    }

    let mut data = Vec::with_capacity(input.len());
    let mut chunk_ends = Vec::with_capacity(input.len().div_ceil(chunk_len));
    let mut scratch = Vec::with_capacity(chunk_len);

    for (index, chunk) in input.chunks(chunk_len).enumerate() {
        scratch.clear();
        codec.compress(chunk, &mut scratch)?;
        if scratch.len() < chunk.len() {
            data.extend_from_slice(&scratch);
        } else {
            trace!(chunk = index, len = chunk.len(), "chunk stored raw");
            data.extend_from_slice(chunk);
        }
        let end = u32::try_from(data.len()).map_err(|_| CakeError::FieldOverflow {
            what: "chunk end offset",
            value: data.len() as u64,
        })?;
        chunk_ends.push(end);
    }

    Ok(CompressedPayload { data, chunk_ends })
}

/// Rebuild expanded bytes from stored chunks
///
/// Chunk boundaries come only from `chunk_ends`. Every chunk must expand to
/// exactly `min(remaining, chunk_len)` bytes.
pub fn decompress(
    codec: &dyn BlockCodec,
    stored: &[u8],
    chunk_ends: &[u32],
    expanded_size: u64,
    chunk_len: usize,
) -> CakeResult<Vec<u8>> {
    if chunk_len == 0 {
        return Err(CakeError::InvalidChunkTable(
            "chunk size must be non-zero".to_string(),
        ));
    }
    let expanded = usize::try_from(expanded_size).map_err(|_| {
        CakeError::InvalidChunkTable(format!("expanded size {expanded_size} is too large"))
    })?;

    let needed = expanded.div_ceil(chunk_len);
    if chunk_ends.len() != needed {
        return Err(CakeError::InvalidChunkTable(format!(
            "{} chunk ends for {expanded} bytes in {chunk_len}-byte chunks, expected {needed}",
            chunk_ends.len()
        )));
    }
    let last = chunk_ends.last().map_or(0, |&end| end as usize);
    if last != stored.len() {
        return Err(CakeError::InvalidChunkTable(format!(
            "chunk table ends at {last}, payload holds {} bytes",
            stored.len()
        )));
    }

    let mut output = Vec::with_capacity(expanded.min(stored.len().saturating_mul(4)));
    let mut scratch = Vec::new();
    let mut start = 0usize;

    for (index, &end) in chunk_ends.iter().enumerate() {
        let end = end as usize;
        if end < start {
            return Err(CakeError::InvalidChunkTable(format!(
                "chunk {index} ends at {end}, before its start {start}"
            )));
        }
        if end > stored.len() {
            return Err(CakeError::InvalidChunkTable(format!(
                "chunk {index} ends at {end}, payload holds {} bytes",
                stored.len()
            )));
        }
        let input = &stored[start..end];
        let expected = (expanded - output.len()).min(chunk_len);

        if input.len() == expected {
            output.extend_from_slice(input);
        } else {
            if expected > codec.expansion_bound(input.len()) {
                return Err(CakeError::ExpansionTooLarge {
                    chunk: index,
                    stored: input.len(),
                    expected,
                });
            }
            scratch.clear();
            scratch.resize(expected, 0);
            let produced = codec.decompress(input, &mut scratch)?;
            if produced != expected {
                return Err(CakeError::ChunkSizeMismatch {
                    chunk: index,
                    expected,
                    actual: produced,
                });
            }
            output.extend_from_slice(&scratch);
        }
        start = end;
    }

    Ok(output)
}


#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod proptest_tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn chunk_round_trip(data in prop::collection::vec(any::<u8>(), 0..4096), sectors in 1u16..8) {
            let chunk = chunk_size(sectors);
            let packed = compress(&Lz4Codec, &data, chunk).unwrap();
            let out = decompress(&Lz4Codec, &packed.data, &packed.chunk_ends, data.len() as u64, chunk).unwrap();
            prop_assert_eq!(out, data);
        }

        #[test]
        fn zlib_chunk_round_trip(data in prop::collection::vec(0u8..4, 0..3000)) {
            let packed = compress(&ZlibCodec::default(), &data, 512).unwrap();
            let out = decompress(&ZlibCodec::default(), &packed.data, &packed.chunk_ends, data.len() as u64, 512).unwrap();
            prop_assert_eq!(out, data);
        }
    }
}
