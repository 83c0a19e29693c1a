use lz4::block::{compress_bound, compress_to_buffer, decompress_to_buffer, CompressionMode};

use crate::codec::{Codec, CodecId};
use crate::error::CodecError;
use crate::scratch::compress_bounded;

/// LZ4 high-compression codec backed by the reference C library.
///
/// Emits standard LZ4 blocks, so buffers written with it share the LZ4
/// format code and decode with either LZ4 backend.
pub struct Lz4hcCodec;

impl Codec for Lz4hcCodec {
    fn id(&self) -> CodecId {
        CodecId::Lz4hc
    }

    fn compress_block(&self, level: u8, raw: &[u8], out: &mut [u8]) -> Result<usize, CodecError> {
        let bound = compress_bound(raw.len()).map_err(|e| CodecError::Internal {
            codec: "lz4hc",
            msg: e.to_string(),
        })?;
        compress_bounded(bound, out, |dst| {
            let mode = CompressionMode::HIGHCOMPRESSION(level as i32);
            compress_to_buffer(raw, Some(mode), false, dst).map_err(|e| CodecError::Internal {
                codec: "lz4hc",
                msg: e.to_string(),
            })
        })
    }

    fn decompress_block(&self, compressed: &[u8], out: &mut [u8]) -> Result<usize, CodecError> {
        let expected = i32::try_from(out.len()).map_err(|_| CodecError::corrupt("lz4hc", "output too large"))?;
        decompress_to_buffer(compressed, Some(expected), out).map_err(|e| CodecError::corrupt("lz4hc", e))
    }
}
