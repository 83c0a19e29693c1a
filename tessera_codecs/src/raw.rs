//! One-shot codec calls into caller buffers, outside the block frame.
//!
//! These take the backend's native level and write a bare codec stream,
//! which is useful for interop with systems that speak plain LZ4, zstd,
//! zlib, deflate or gzip.

#[cfg(feature = "zlib")]
use std::io::{Read, Write};

use crate::error::CodecError;

#[cfg(feature = "lz4")]
pub fn compress_lz4(raw: &[u8], out: &mut [u8]) -> Result<usize, CodecError> {
    use crate::codec::Codec;
    crate::lz4_codec::Lz4Codec.compress_block(1, raw, out)
}

#[cfg(feature = "lz4")]
pub fn decompress_lz4(compressed: &[u8], out: &mut [u8]) -> Result<usize, CodecError> {
    use crate::codec::Codec;
    crate::lz4_codec::Lz4Codec.decompress_block(compressed, out)
}

/// `level` is a native zstd level.
#[cfg(feature = "zstd")]
pub fn compress_zstd(raw: &[u8], out: &mut [u8], level: i32) -> Result<usize, CodecError> {
    zstd::bulk::compress_to_buffer(raw, out, level).map_err(|_| CodecError::Incompressible)
}

#[cfg(feature = "zstd")]
pub fn decompress_zstd(compressed: &[u8], out: &mut [u8]) -> Result<usize, CodecError> {
    zstd::bulk::decompress_to_buffer(compressed, out).map_err(|e| CodecError::corrupt("zstd", e))
}

#[cfg(feature = "zlib")]
pub fn compress_zlib(raw: &[u8], out: &mut [u8], level: u8) -> Result<usize, CodecError> {
    crate::zlib_codec::deflate_into(raw, out, level, true)
}

#[cfg(feature = "zlib")]
pub fn decompress_zlib(compressed: &[u8], out: &mut [u8]) -> Result<usize, CodecError> {
    crate::zlib_codec::inflate_into(compressed, out, true)
}

/// Raw deflate, no zlib header or trailer.
#[cfg(feature = "zlib")]
pub fn compress_deflate(raw: &[u8], out: &mut [u8], level: u8) -> Result<usize, CodecError> {
    crate::zlib_codec::deflate_into(raw, out, level, false)
}

#[cfg(feature = "zlib")]
pub fn decompress_deflate(compressed: &[u8], out: &mut [u8]) -> Result<usize, CodecError> {
    crate::zlib_codec::inflate_into(compressed, out, false)
}

#[cfg(feature = "zlib")]
pub fn compress_gzip(raw: &[u8], out: &mut [u8], level: u8) -> Result<usize, CodecError> {
    use flate2::write::GzEncoder;
    use flate2::Compression;

    let capacity = out.len();
    let mut encoder = GzEncoder::new(out, Compression::new(level as u32));
    // A full slice surfaces as a WriteZero error.
    encoder.write_all(raw).map_err(|_| CodecError::Incompressible)?;
    let rest = encoder.finish().map_err(|_| CodecError::Incompressible)?;
    Ok(capacity - rest.len())
}

#[cfg(feature = "zlib")]
pub fn decompress_gzip(compressed: &[u8], out: &mut [u8]) -> Result<usize, CodecError> {
    use flate2::read::GzDecoder;

    let mut decoder = GzDecoder::new(compressed);
    let mut total = 0;
    while total < out.len() {
        match decoder.read(&mut out[total..]) {
            Ok(0) => return Ok(total),
            Ok(n) => total += n,
            Err(e) => return Err(CodecError::corrupt("gzip", e)),
        }
    }
    // Output is full; anything left in the stream means it did not fit.
    let mut probe = [0u8; 1];
    match decoder.read(&mut probe) {
        Ok(0) => Ok(total),
        Ok(_) => Err(CodecError::Incompressible),
        Err(e) => Err(CodecError::corrupt("gzip", e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Vec<u8> {
        b"0123456789abcdef".repeat(512)
    }

    #[cfg(feature = "zlib")]
    #[test]
    fn gzip_and_deflate_roundtrip() {
        let data = sample();
        let mut packed = vec![0u8; data.len()];
        let mut restored = vec![0u8; data.len()];

        let n = compress_gzip(&data, &mut packed, 6).unwrap();
        assert_eq!(decompress_gzip(&packed[..n], &mut restored).unwrap(), data.len());
        assert_eq!(restored, data);

        let n = compress_deflate(&data, &mut packed, 6).unwrap();
        assert_eq!(decompress_deflate(&packed[..n], &mut restored).unwrap(), data.len());
        assert_eq!(restored, data);
    }

    #[cfg(feature = "zlib")]
    #[test]
    fn gzip_short_output_is_reported() {
        let data = sample();
        let mut packed = vec![0u8; data.len()];
        let n = compress_gzip(&data, &mut packed, 6).unwrap();
        let mut small = vec![0u8; data.len() - 1];
        assert_eq!(decompress_gzip(&packed[..n], &mut small), Err(CodecError::Incompressible));
    }

    #[cfg(feature = "zstd")]
    #[test]
    fn zstd_roundtrip() {
        let data = sample();
        let mut packed = vec![0u8; data.len()];
        let n = compress_zstd(&data, &mut packed, 3).unwrap();
        let mut restored = vec![0u8; data.len()];
        assert_eq!(decompress_zstd(&packed[..n], &mut restored).unwrap(), data.len());
        assert_eq!(restored, data);
    }

    #[cfg(feature = "lz4")]
    #[test]
    fn lz4_roundtrip() {
        let data = sample();
        let mut packed = vec![0u8; data.len()];
        let n = compress_lz4(&data, &mut packed).unwrap();
        let mut restored = vec![0u8; data.len()];
        assert_eq!(decompress_lz4(&packed[..n], &mut restored).unwrap(), data.len());
        assert_eq!(restored, data);
    }
}
