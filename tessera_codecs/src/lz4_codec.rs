use lz4_flex::block::{compress_into, decompress_into, get_maximum_output_size};

use crate::codec::{Codec, CodecId};
use crate::error::CodecError;
use crate::scratch::compress_bounded;

/// LZ4 block codec backed by `lz4_flex`.
///
/// Fastest decompression of all bundled codecs. The level is ignored:
/// `lz4_flex` has a single speed/ratio point. Streams are raw LZ4 blocks
/// with no size prefix; the frame records sizes.
pub struct Lz4Codec;

impl Codec for Lz4Codec {
    fn id(&self) -> CodecId {
        CodecId::Lz4
    }

    fn compress_block(&self, _level: u8, raw: &[u8], out: &mut [u8]) -> Result<usize, CodecError> {
        // lz4_flex rejects any output slice smaller than the worst case.
        compress_bounded(get_maximum_output_size(raw.len()), out, |dst| {
            compress_into(raw, dst).map_err(|e| CodecError::Internal {
                codec: "lz4",
                msg: e.to_string(),
            })
        })
    }

    fn decompress_block(&self, compressed: &[u8], out: &mut [u8]) -> Result<usize, CodecError> {
        decompress_into(compressed, out).map_err(|e| CodecError::corrupt("lz4", e))
    }
}
