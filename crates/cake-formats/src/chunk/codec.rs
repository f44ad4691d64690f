//! Block compressors
//!
//! The chunk framing treats the compressor as a black box that turns one
//! buffer into an opaque blob and back, given the exact expanded size.

use std::fmt;
use std::io::Read;
use std::str::FromStr;

use flate2::Compression;
use flate2::read::{ZlibDecoder, ZlibEncoder};

use crate::error::{CakeError, CakeResult};

/// A block compressor invoked once per chunk
pub trait BlockCodec: fmt::Debug + Send + Sync {
    /// Short name for logs
    fn name(&self) -> &'static str;

    /// Compress `input`, appending the blob to `output`
    fn compress(&self, input: &[u8], output: &mut Vec<u8>) -> CakeResult<()>;

    /// Expand `input` into `output` and return the number of bytes produced
    ///
    /// `output` is sized to the expected expanded length; a blob that expands
    /// to more than that is an error.
    fn decompress(&self, input: &[u8], output: &mut [u8]) -> CakeResult<usize>;

    /// Worst-case expanded bytes per stored byte
    fn max_ratio(&self) -> usize;

    /// Largest expansion a blob of `stored` bytes can legitimately produce
    fn expansion_bound(&self, stored: usize) -> usize {
        stored.saturating_mul(self.max_ratio()).saturating_add(EXPANSION_SLACK)
    }
}

/// Headroom for framing bytes on tiny blobs
const EXPANSION_SLACK: usize = 64;

/// Raw LZ4 blocks, no size prefix or frame
#[derive(Debug, Clone, Copy, Default)]
pub struct Lz4Codec;

impl BlockCodec for Lz4Codec {
    fn name(&self) -> &'static str {
        "lz4"
    }

    fn compress(&self, input: &[u8], output: &mut Vec<u8>) -> CakeResult<()> {
        let start = output.len();
        output.resize(start + lz4_flex::block::get_maximum_output_size(input.len()), 0);
        let written = lz4_flex::block::compress_into(input, &mut output[start..])
            .map_err(|e| CakeError::Compression(format!("LZ4 compression failed: {e}")))?;
        output.truncate(start + written);
        Ok(())
    }

    fn decompress(&self, input: &[u8], output: &mut [u8]) -> CakeResult<usize> {
        lz4_flex::block::decompress_into(input, output)
            .map_err(|e| CakeError::Decompression(format!("LZ4 decompression failed: {e}")))
    }

    fn max_ratio(&self) -> usize {
        // every 0xFF length byte adds 255 bytes of match
        255
    }
}

/// zlib streams
#[derive(Debug, Clone, Copy)]
pub struct ZlibCodec {
    level: Compression,
}

impl ZlibCodec {
    /// zlib with an explicit compression level (0-9)
    pub fn with_level(level: u32) -> Self {
        Self {
            level: Compression::new(level.min(9)),
        }
    }
}

impl Default for ZlibCodec {
    fn default() -> Self {
        Self {
            level: Compression::default(),
        }
    }
}

impl BlockCodec for ZlibCodec {
    fn name(&self) -> &'static str {
        "zlib"
    }

    fn compress(&self, input: &[u8], output: &mut Vec<u8>) -> CakeResult<()> {
        let mut encoder = ZlibEncoder::new(input, self.level);
        encoder
            .read_to_end(output)
            .map_err(|e| CakeError::Compression(format!("ZLib compression failed: {e}")))?;
        Ok(())
    }

    fn decompress(&self, input: &[u8], output: &mut [u8]) -> CakeResult<usize> {
        let mut decoder = ZlibDecoder::new(input);
        let mut filled = 0;
        while filled < output.len() {
            let read = decoder.read(&mut output[filled..]).map_err(|e| {
                CakeError::Decompression(format!("ZLib decompression failed: {e}"))
            })?;
            if read == 0 {
                return Ok(filled);
            }
            filled += read;
        }

        let mut probe = [0u8; 1];
        let extra = decoder
            .read(&mut probe)
            .map_err(|e| CakeError::Decompression(format!("ZLib decompression failed: {e}")))?;
        if extra != 0 {
            return Err(CakeError::Decompression(format!(
                "ZLib stream expands past {} bytes",
                output.len()
            )));
        }
        Ok(filled)
    }

    fn max_ratio(&self) -> usize {
        1032
    }
}

/// Selectable bundled codec
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Codec {
    /// [`Lz4Codec`]
    #[default]
    Lz4,
    /// [`ZlibCodec`] at the default level
    Zlib,
}

impl BlockCodec for Codec {
    fn name(&self) -> &'static str {
        match self {
            Self::Lz4 => Lz4Codec.name(),
            Self::Zlib => ZlibCodec::default().name(),
        }
    }

    fn compress(&self, input: &[u8], output: &mut Vec<u8>) -> CakeResult<()> {
        match self {
            Self::Lz4 => Lz4Codec.compress(input, output),
            Self::Zlib => ZlibCodec::default().compress(input, output),
        }
    }

    fn decompress(&self, input: &[u8], output: &mut [u8]) -> CakeResult<usize> {
        match self {
            Self::Lz4 => Lz4Codec.decompress(input, output),
            Self::Zlib => ZlibCodec::default().decompress(input, output),
        }
    }

    fn max_ratio(&self) -> usize {
        match self {
            Self::Lz4 => Lz4Codec.max_ratio(),
            Self::Zlib => ZlibCodec::default().max_ratio(),
        }
    }
}

impl fmt::Display for Codec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Codec {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "lz4" => Ok(Self::Lz4),
            "zlib" | "deflate" => Ok(Self::Zlib),
            other => Err(format!("unknown codec '{other}' (expected lz4 or zlib)")),
        }
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;

    fn compressible() -> Vec<u8> {
        b"cake cake cake cake ".repeat(64)
    }

    #[test]
    fn test_lz4_round_trip() {
        let data = compressible();
        let mut blob = Vec::new();
        Lz4Codec.compress(&data, &mut blob).unwrap();
        assert!(blob.len() < data.len());

        let mut out = vec![0u8; data.len()];
        assert_eq!(Lz4Codec.decompress(&blob, &mut out).unwrap(), data.len());
        assert_eq!(out, data);
    }

    #[test]
    fn test_lz4_appends() {
        let mut blob = vec![0xAA];
        Lz4Codec.compress(&compressible(), &mut blob).unwrap();
        assert_eq!(blob[0], 0xAA);
    }

    #[test]
    fn test_zlib_round_trip() {
        let data = compressible();
        let mut blob = Vec::new();
        ZlibCodec::default().compress(&data, &mut blob).unwrap();

        let mut out = vec![0u8; data.len()];
        assert_eq!(
            ZlibCodec::default().decompress(&blob, &mut out).unwrap(),
            data.len()
        );
        assert_eq!(out, data);
    }

    #[test]
    fn test_zlib_short_and_long_outputs() {
        let data = compressible();
        let mut blob = Vec::new();
        ZlibCodec::with_level(9).compress(&data, &mut blob).unwrap();

        let mut bigger = vec![0u8; data.len() + 10];
        assert_eq!(
            ZlibCodec::default().decompress(&blob, &mut bigger).unwrap(),
            data.len()
        );

        let mut smaller = vec![0u8; data.len() - 1];
        assert!(ZlibCodec::default().decompress(&blob, &mut smaller).is_err());
    }

    #[test]
    fn test_lz4_garbage_is_an_error() {
        let mut out = vec![0u8; 64];
        let err = Lz4Codec.decompress(&[0xFF; 8], &mut out).unwrap_err();
        assert!(matches!(err, CakeError::Decompression(_)));
    }

    #[test]
    fn test_expansion_bound() {
        assert_eq!(Lz4Codec.expansion_bound(8), 8 * 255 + 64);
        assert_eq!(Codec::Zlib.expansion_bound(1), 1032 + 64);
        assert_eq!(Lz4Codec.expansion_bound(usize::MAX), usize::MAX);

        let data = vec![0u8; 1 << 20];
        for codec in [Codec::Lz4, Codec::Zlib] {
            let mut blob = Vec::new();
            codec.compress(&data, &mut blob).unwrap();
            assert!(codec.expansion_bound(blob.len()) >= data.len(), "{codec}");
        }
    }

    #[test]
    fn test_codec_parse() {
        assert_eq!("LZ4".parse::<Codec>().unwrap(), Codec::Lz4);
        assert_eq!("zlib".parse::<Codec>().unwrap(), Codec::Zlib);
        assert!("oodle".parse::<Codec>().is_err());
        assert_eq!(Codec::default().to_string(), "lz4");
    }
}
