//! Codec adapter for tessera.
//!
//! A uniform compress/decompress surface over a fixed set of backends,
//! each identified by name and numeric code, with build-time capability
//! negotiation (`CodecId::is_compiled_in`). The block engine in
//! `tessera_core` only ever talks to codecs through [`compress`] and
//! [`decompress`].

mod blosclz;
mod codec;
mod error;
#[cfg(feature = "lz4")]
mod lz4_codec;
#[cfg(feature = "lz4hc")]
mod lz4hc_codec;
mod passthrough;
pub mod raw;
mod registry;
mod scratch;
#[cfg(feature = "zlib")]
mod zlib_codec;
#[cfg(feature = "zstd")]
mod zstd_codec;

pub use blosclz::BloscLzCodec;
pub use codec::{library_for_format, Codec, CodecId};
pub use error::CodecError;
#[cfg(feature = "lz4")]
pub use lz4_codec::Lz4Codec;
#[cfg(feature = "lz4hc")]
pub use lz4hc_codec::Lz4hcCodec;
pub use registry::{
    codec_by_format, codec_by_id, codec_by_name, compcode_to_compname, compname_to_compcode, complib_info,
    descriptors, list_compressors, CodecDescriptor,
};
#[cfg(feature = "zlib")]
pub use zlib_codec::ZlibCodec;
#[cfg(feature = "zstd")]
pub use zstd_codec::ZstdCodec;

/// Highest accepted compression level.
pub const MAX_LEVEL: u8 = 9;

/// Compress `raw` into `out` with `codec` at `level` (0..=9).
///
/// Level 0 stores the input verbatim and succeeds whenever
/// `out.len() >= raw.len()`. Returns [`CodecError::Incompressible`] when the
/// result does not fit.
pub fn compress(codec: &dyn Codec, level: u8, raw: &[u8], out: &mut [u8]) -> Result<usize, CodecError> {
    match level {
        0 => passthrough::store(raw, out),
        1..=MAX_LEVEL => codec.compress_block(level, raw, out),
        _ => Err(CodecError::InvalidLevel(level)),
    }
}

/// Decompress `compressed` into `out`, returning the decompressed length.
pub fn decompress(codec: &dyn Codec, compressed: &[u8], out: &mut [u8]) -> Result<usize, CodecError> {
    codec.decompress_block(compressed, out)
}
