use flate2::{Compress, Compression, Decompress, FlushCompress, FlushDecompress, Status};

use crate::codec::{Codec, CodecId};
use crate::error::CodecError;

/// zlib (deflate with zlib header) codec backed by `flate2`.
///
/// The level maps one-to-one onto zlib levels 1..=9.
pub struct ZlibCodec;

impl Codec for ZlibCodec {
    fn id(&self) -> CodecId {
        CodecId::Zlib
    }

    fn compress_block(&self, level: u8, raw: &[u8], out: &mut [u8]) -> Result<usize, CodecError> {
        deflate_into(raw, out, level, true)
    }

    fn decompress_block(&self, compressed: &[u8], out: &mut [u8]) -> Result<usize, CodecError> {
        inflate_into(compressed, out, true)
    }
}

/// One-shot deflate into a fixed slice. `zlib_header` selects zlib vs raw deflate.
pub(crate) fn deflate_into(raw: &[u8], out: &mut [u8], level: u8, zlib_header: bool) -> Result<usize, CodecError> {
    let mut stream = Compress::new(Compression::new(level as u32), zlib_header);
    match stream.compress(raw, out, FlushCompress::Finish) {
        Ok(Status::StreamEnd) => Ok(stream.total_out() as usize),
        // Ran out of output before the stream could be finished.
        Ok(_) => Err(CodecError::Incompressible),
        Err(e) => Err(CodecError::Internal {
            codec: "zlib",
            msg: e.to_string(),
        }),
    }
}

pub(crate) fn inflate_into(compressed: &[u8], out: &mut [u8], zlib_header: bool) -> Result<usize, CodecError> {
    let mut stream = Decompress::new(zlib_header);
    match stream.decompress(compressed, out, FlushDecompress::Finish) {
        Ok(Status::StreamEnd) => Ok(stream.total_out() as usize),
        Ok(_) => Err(CodecError::corrupt("zlib", "stream truncated or output too small")),
        Err(e) => Err(CodecError::corrupt("zlib", e)),
    }
}
