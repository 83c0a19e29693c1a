use std::fmt;
use std::str::FromStr;

use num_enum::{IntoPrimitive, TryFromPrimitive};
use serde::{Deserialize, Serialize};

use crate::error::CodecError;

/// Stable numeric identity of every codec the registry knows about.
///
/// The discriminant is the public compressor code (`compname_to_compcode`).
/// It is distinct from the header *format* code returned by [`CodecId::format`],
/// which several codecs may share (lz4 and lz4hc emit the same block format).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TryFromPrimitive, IntoPrimitive,
)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum CodecId {
    BloscLz = 0,
    Lz4 = 1,
    Lz4hc = 2,
    Snappy = 3,
    Zlib = 4,
    Zstd = 5,
}

impl CodecId {
    /// Every codec in registry order.
    pub const ALL: [CodecId; 6] = [
        CodecId::BloscLz,
        CodecId::Lz4,
        CodecId::Lz4hc,
        CodecId::Snappy,
        CodecId::Zlib,
        CodecId::Zstd,
    ];

    pub fn name(self) -> &'static str {
        match self {
            CodecId::BloscLz => "blosclz",
            CodecId::Lz4 => "lz4",
            CodecId::Lz4hc => "lz4hc",
            CodecId::Snappy => "snappy",
            CodecId::Zlib => "zlib",
            CodecId::Zstd => "zstd",
        }
    }

    /// Format code stored in bits 5-7 of the frame header flags.
    pub fn format(self) -> u8 {
        match self {
            CodecId::BloscLz => 0,
            CodecId::Lz4 | CodecId::Lz4hc => 1,
            CodecId::Snappy => 2,
            CodecId::Zlib => 3,
            CodecId::Zstd => 4,
        }
    }

    /// Name of the library that implements the stored format.
    pub fn library(self) -> &'static str {
        library_for_format(self.format()).unwrap_or("")
    }

    /// Whether this build carries a backend for the codec.
    pub fn is_compiled_in(self) -> bool {
        match self {
            CodecId::BloscLz => true,
            CodecId::Lz4 => cfg!(feature = "lz4"),
            CodecId::Lz4hc => cfg!(feature = "lz4hc"),
            CodecId::Snappy => false,
            CodecId::Zlib => cfg!(feature = "zlib"),
            CodecId::Zstd => cfg!(feature = "zstd"),
        }
    }

    /// High-compression-ratio codecs get larger automatic block sizes.
    pub fn is_high_ratio(self) -> bool {
        matches!(self, CodecId::Lz4hc | CodecId::Zlib | CodecId::Zstd)
    }
}

impl Default for CodecId {
    /// The always-available baseline codec.
    fn default() -> Self {
        CodecId::BloscLz
    }
}

impl fmt::Display for CodecId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for CodecId {
    type Err = CodecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CodecId::ALL
            .into_iter()
            .find(|id| id.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| CodecError::Unsupported(s.to_string()))
    }
}

/// Library name for a header format code, if the code is known.
pub fn library_for_format(format: u8) -> Option<&'static str> {
    match format {
        0 => Some("BloscLZ"),
        1 => Some("LZ4"),
        2 => Some("Snappy"),
        3 => Some("Zlib"),
        4 => Some("Zstd"),
        _ => None,
    }
}

/// Core compression abstraction.
///
/// Each `Codec` implementation:
/// - Is identified by a stable [`CodecId`] whose format code is stored in
///   the frame header.
/// - Must compress/decompress individual streams independently; no state
///   survives between calls. This is what lets blocks be processed in any
///   order and on any worker.
/// - Writes only into the caller's output slice and never allocates
///   caller-visible memory.
pub trait Codec: Send + Sync {
    fn id(&self) -> CodecId;

    /// Human-readable codec name for CLI display.
    fn name(&self) -> &'static str {
        self.id().name()
    }

    /// Version of the codec's internal stream format, stored in the header.
    fn format_version(&self) -> u8 {
        1
    }

    /// Compress `raw` into `out` at `level` (1..=9).
    ///
    /// Returns the number of bytes written, or [`CodecError::Incompressible`]
    /// when the result does not fit in `out`. Level 0 is handled by
    /// [`crate::compress`] and never reaches an implementation.
    fn compress_block(&self, level: u8, raw: &[u8], out: &mut [u8]) -> Result<usize, CodecError>;

    /// Decompress `compressed` into `out`, returning the decompressed length.
    fn decompress_block(&self, compressed: &[u8], out: &mut [u8]) -> Result<usize, CodecError>;
}
