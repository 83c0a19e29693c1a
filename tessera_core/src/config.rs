use std::fmt;
use std::str::FromStr;

use num_enum::{IntoPrimitive, TryFromPrimitive};
use serde::{Deserialize, Serialize};
use tessera_codecs::CodecId;

use crate::error::Error;
use crate::format::{MAX_SPLITS, MAX_THREADS};

/// Filter applied to each block before it reaches the codec.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TryFromPrimitive, IntoPrimitive)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum ShuffleKind {
    None = 0,
    /// Regroup bytes by their position inside each element.
    Byte = 1,
    /// Regroup bits by their position inside each element.
    Bit = 2,
}

impl Default for ShuffleKind {
    fn default() -> Self {
        ShuffleKind::None
    }
}

impl fmt::Display for ShuffleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ShuffleKind::None => "noshuffle",
            ShuffleKind::Byte => "shuffle",
            ShuffleKind::Bit => "bitshuffle",
        })
    }
}

impl FromStr for ShuffleKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "0" | "none" | "noshuffle" => Ok(ShuffleKind::None),
            "1" | "byte" | "shuffle" => Ok(ShuffleKind::Byte),
            "2" | "bit" | "bitshuffle" => Ok(ShuffleKind::Bit),
            other => Err(Error::InvalidParameter(format!("unknown shuffle mode '{other}'"))),
        }
    }
}

/// Policy for storing a block as one stream per byte plane.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TryFromPrimitive, IntoPrimitive)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum SplitMode {
    Always = 1,
    Never = 2,
    /// Split only for codecs that gain from it.
    Auto = 3,
    /// Split for the codecs that older readers expect split.
    ForwardCompat = 4,
}

impl Default for SplitMode {
    fn default() -> Self {
        SplitMode::ForwardCompat
    }
}

impl SplitMode {
    /// Whether blocks of `blocksize` bytes are stored split.
    pub fn should_split(self, codec: CodecId, typesize: usize, blocksize: usize) -> bool {
        let fits = typesize <= MAX_SPLITS && blocksize >= typesize;
        match self {
            SplitMode::Always => fits,
            SplitMode::Never => false,
            SplitMode::Auto => {
                matches!(codec, CodecId::BloscLz | CodecId::Snappy) && fits && blocksize / typesize >= 128
            }
            SplitMode::ForwardCompat => {
                matches!(codec, CodecId::BloscLz | CodecId::Lz4 | CodecId::Lz4hc | CodecId::Snappy)
                    && fits
                    && blocksize / typesize >= 128
            }
        }
    }
}

impl fmt::Display for SplitMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SplitMode::Always => "always",
            SplitMode::Never => "never",
            SplitMode::Auto => "auto",
            SplitMode::ForwardCompat => "forward_compat",
        })
    }
}

impl FromStr for SplitMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "always" | "always_split" => Ok(SplitMode::Always),
            "never" | "never_split" => Ok(SplitMode::Never),
            "auto" | "auto_split" => Ok(SplitMode::Auto),
            "forward_compat" | "forward_compat_split" => Ok(SplitMode::ForwardCompat),
            other => Err(Error::InvalidParameter(format!("unknown split mode '{other}'"))),
        }
    }
}

/// Settings shared by every call made through an [`crate::Engine`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    pub compressor: CodecId,
    pub nthreads: usize,
    /// Forced block size; 0 selects it automatically.
    pub blocksize: usize,
    pub splitmode: SplitMode,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            compressor: CodecId::default(),
            nthreads: 1,
            blocksize: 0,
            splitmode: SplitMode::default(),
        }
    }
}

pub(crate) fn validate_nthreads(nthreads: usize) -> crate::Result<usize> {
    if (1..=MAX_THREADS).contains(&nthreads) {
        Ok(nthreads)
    } else {
        Err(Error::InvalidParameter(format!(
            "thread count {nthreads} out of range 1..={MAX_THREADS}"
        )))
    }
}
