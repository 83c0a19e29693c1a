use crate::codec::{Codec, CodecId};
use crate::error::CodecError;

/// Zstandard codec.
///
/// Each stream is an independent zstd frame. The 0..=9 level maps onto
/// zstd levels as `2 * level - 1`, with 9 mapped to the library maximum.
pub struct ZstdCodec;

impl ZstdCodec {
    pub fn zstd_level(level: u8) -> i32 {
        if level >= 9 {
            *zstd::compression_level_range().end()
        } else {
            2 * level as i32 - 1
        }
    }
}

impl Codec for ZstdCodec {
    fn id(&self) -> CodecId {
        CodecId::Zstd
    }

    fn compress_block(&self, level: u8, raw: &[u8], out: &mut [u8]) -> Result<usize, CodecError> {
        // zstd reports "destination too small" as an io::Error like any other.
        zstd::bulk::compress_to_buffer(raw, out, Self::zstd_level(level)).map_err(|_| CodecError::Incompressible)
    }

    fn decompress_block(&self, compressed: &[u8], out: &mut [u8]) -> Result<usize, CodecError> {
        zstd::bulk::decompress_to_buffer(compressed, out).map_err(|e| CodecError::corrupt("zstd", e))
    }
}
