use std::ops::Range;

use serde::Serialize;
use tessera_codecs::library_for_format;

use crate::error::{Error, Result};

/// Frame format version written by this library.
pub const VERSION_FORMAT: u8 = 2;

/// Release of this library, e.g. `"0.1.0"`.
pub fn version_string() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

/// Fixed size of the frame header in bytes.
///   version:u8 + versionlz:u8 + flags:u8 + typesize:u8
///   + nbytes:u32 + blocksize:u32 + cbytes:u32
///   = 1 + 1 + 1 + 1 + 4 + 4 + 4 = 16
///
/// These 16 bytes are enough for every introspection query.
pub const MIN_HEADER_LENGTH: usize = 16;

/// Worst-case growth of a compressed buffer over its source.
///
/// `dest.len() >= src.len() + MAX_OVERHEAD` guarantees compression succeeds.
pub const MAX_OVERHEAD: usize = MIN_HEADER_LENGTH;

/// Largest source buffer accepted by the engine.
pub const MAX_BUFFERSIZE: usize = i32::MAX as usize - MAX_OVERHEAD;

/// Largest element size that the shuffle filters honor.
pub const MAX_TYPESIZE: usize = 255;

pub const MAX_THREADS: usize = 256;

/// Sources smaller than this are always stored verbatim.
pub const MIN_BUFFERSIZE: usize = 128;

/// Most streams a block may be split into.
pub const MAX_SPLITS: usize = 16;

/// Largest forced block size.
pub const MAX_BLOCKSIZE: usize = (i32::MAX as usize - MAX_TYPESIZE * 4) / 3;

/// L1 data cache size assumed by the block-size heuristic.
pub const L1: usize = 32 * 1024;

// ── Flags ──────────────────────────────────────────────────────────────────

/// Byte shuffle was applied to every block.
pub const FLAG_SHUFFLE: u8 = 1 << 0;

/// The payload is the raw source; there is no block table.
pub const FLAG_MEMCPYED: u8 = 1 << 1;

/// Bit shuffle was applied to every block.
pub const FLAG_BITSHUFFLE: u8 = 1 << 2;

/// Blocks are stored as a single stream instead of one per byte plane.
pub const FLAG_DONT_SPLIT: u8 = 1 << 4;

const FORMAT_SHIFT: u8 = 5;

// ── Header ─────────────────────────────────────────────────────────────────

/// Decoded representation of the 16-byte frame header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Header {
    pub version: u8,
    /// Version of the codec's internal stream format.
    pub versionlz: u8,
    pub flags: u8,
    pub typesize: u8,
    /// Uncompressed length of the whole buffer.
    pub nbytes: u32,
    /// Nominal raw bytes per block (the last block may be smaller).
    pub blocksize: u32,
    /// Compressed length of the whole buffer, header included.
    pub cbytes: u32,
}

impl Header {
    /// Serialize to exactly `MIN_HEADER_LENGTH` bytes.
    pub fn to_bytes(&self) -> [u8; MIN_HEADER_LENGTH] {
        let mut buf = [0u8; MIN_HEADER_LENGTH];
        buf[0] = self.version;
        buf[1] = self.versionlz;
        buf[2] = self.flags;
        buf[3] = self.typesize;
        buf[4..8].copy_from_slice(&self.nbytes.to_le_bytes());
        buf[8..12].copy_from_slice(&self.blocksize.to_le_bytes());
        buf[12..16].copy_from_slice(&self.cbytes.to_le_bytes());
        buf
    }

    /// Decode and validate the header at the start of `buf`.
    ///
    /// Only the first `MIN_HEADER_LENGTH` bytes are read.
    pub fn parse(buf: &[u8]) -> Result<Self> {
        let raw = buf
            .get(..MIN_HEADER_LENGTH)
            .ok_or_else(|| Error::corrupt(format!("buffer shorter than the {MIN_HEADER_LENGTH}-byte header")))?;
        let header = Self {
            version: raw[0],
            versionlz: raw[1],
            flags: raw[2],
            typesize: raw[3],
            nbytes: u32::from_le_bytes([raw[4], raw[5], raw[6], raw[7]]),
            blocksize: u32::from_le_bytes([raw[8], raw[9], raw[10], raw[11]]),
            cbytes: u32::from_le_bytes([raw[12], raw[13], raw[14], raw[15]]),
        };

        if header.version == 0 || header.version > VERSION_FORMAT {
            return Err(Error::corrupt(format!(
                "unsupported format version {} (this build reads 1..={VERSION_FORMAT})",
                header.version
            )));
        }
        if header.typesize == 0 {
            return Err(Error::corrupt("element size is zero"));
        }
        if header.nbytes as usize > MAX_BUFFERSIZE {
            return Err(Error::corrupt(format!("uncompressed length {} exceeds the maximum", header.nbytes)));
        }
        if (header.cbytes as usize) < MIN_HEADER_LENGTH {
            return Err(Error::corrupt(format!("compressed length {} shorter than the header", header.cbytes)));
        }
        if library_for_format(header.compformat()).is_none() {
            return Err(Error::corrupt(format!("unknown codec format {}", header.compformat())));
        }
        if header.is_memcpyed() {
            if header.cbytes as usize != header.nbytes as usize + MAX_OVERHEAD {
                return Err(Error::corrupt("stored buffer length disagrees with its header"));
            }
        } else if header.nbytes > 0 && header.blocksize == 0 {
            return Err(Error::corrupt("block size is zero"));
        }
        Ok(header)
    }

    pub fn has_flag(&self, flag: u8) -> bool {
        self.flags & flag != 0
    }

    pub fn is_memcpyed(&self) -> bool {
        self.has_flag(FLAG_MEMCPYED)
    }

    /// Codec format code from flag bits 5-7.
    pub fn compformat(&self) -> u8 {
        self.flags >> FORMAT_SHIFT
    }

    pub(crate) fn set_compformat(&mut self, format: u8) {
        self.flags = (self.flags & !(0b111 << FORMAT_SHIFT)) | (format << FORMAT_SHIFT);
    }
}

// ── Block layout ───────────────────────────────────────────────────────────

/// Geometry of a buffer cut into fixed-size blocks plus a leftover.
#[derive(Debug, Clone, Copy)]
pub(crate) struct BlockLayout {
    pub nbytes: usize,
    pub blocksize: usize,
    /// Number of full-size blocks.
    pub full: usize,
    /// Bytes in the trailing partial block, 0 if none.
    pub leftover: usize,
}

impl BlockLayout {
    pub fn new(nbytes: usize, blocksize: usize) -> Self {
        let blocksize = blocksize.max(1);
        Self {
            nbytes,
            blocksize,
            full: nbytes / blocksize,
            leftover: nbytes % blocksize,
        }
    }

    /// Total number of blocks, the partial one included.
    pub fn count(&self) -> usize {
        self.full + usize::from(self.leftover > 0)
    }

    pub fn range(&self, block: usize) -> Range<usize> {
        let start = block * self.blocksize;
        start..(start + self.blocksize).min(self.nbytes)
    }

    pub fn is_leftover(&self, block: usize) -> bool {
        self.leftover > 0 && block == self.full
    }

    /// End of the block start table, where block data begins.
    pub fn data_start(&self) -> usize {
        MIN_HEADER_LENGTH + 4 * self.count()
    }
}

/// Number of streams a block of `bsize` bytes is stored as.
///
/// Shared by the compressor and decompressor so that both derive the
/// same layout from the header alone.
pub(crate) fn stream_count(split: bool, leftover: bool, typesize: usize, bsize: usize) -> usize {
    if split && !leftover && typesize > 1 && bsize % typesize == 0 {
        typesize
    } else {
        1
    }
}

/// Read and validate the block start table of a non-memcpy buffer.
pub(crate) fn read_bstarts(src: &[u8], layout: &BlockLayout) -> Result<Vec<usize>> {
    let data_start = layout.data_start();
    let table = src
        .get(MIN_HEADER_LENGTH..data_start)
        .ok_or_else(|| Error::corrupt("block table runs past the end of the buffer"))?;
    table
        .chunks_exact(4)
        .map(|entry| {
            let start = u32::from_le_bytes([entry[0], entry[1], entry[2], entry[3]]) as usize;
            if start < data_start || start >= src.len() {
                Err(Error::corrupt(format!("block start {start} outside the data area")))
            } else {
                Ok(start)
            }
        })
        .collect()
}

// ── Introspection ──────────────────────────────────────────────────────────

/// Everything the header says about a compressed buffer.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct BufferInfo {
    pub version: u8,
    pub versionlz: u8,
    pub flags: u8,
    pub typesize: usize,
    pub nbytes: usize,
    pub cbytes: usize,
    pub blocksize: usize,
    pub nblocks: usize,
    pub shuffle: bool,
    pub bitshuffle: bool,
    pub memcpyed: bool,
    pub split: bool,
    pub complib: &'static str,
}

impl BufferInfo {
    pub fn read(src: &[u8]) -> Result<Self> {
        let h = Header::parse(src)?;
        let nblocks = if h.is_memcpyed() {
            0
        } else {
            BlockLayout::new(h.nbytes as usize, h.blocksize as usize).count()
        };
        Ok(Self {
            version: h.version,
            versionlz: h.versionlz,
            flags: h.flags,
            typesize: h.typesize as usize,
            nbytes: h.nbytes as usize,
            cbytes: h.cbytes as usize,
            blocksize: h.blocksize as usize,
            nblocks,
            shuffle: h.has_flag(FLAG_SHUFFLE),
            bitshuffle: h.has_flag(FLAG_BITSHUFFLE),
            memcpyed: h.is_memcpyed(),
            split: !h.has_flag(FLAG_DONT_SPLIT),
            complib: library_for_format(h.compformat()).unwrap_or(""),
        })
    }
}

/// `(nbytes, cbytes, blocksize)` of a compressed buffer; zeros if the
/// header is not recognized.
pub fn cbuffer_sizes(src: &[u8]) -> (usize, usize, usize) {
    Header::parse(src)
        .map(|h| (h.nbytes as usize, h.cbytes as usize, h.blocksize as usize))
        .unwrap_or_default()
}

/// `(typesize, flags)` of a compressed buffer; zeros if unrecognized.
pub fn cbuffer_metainfo(src: &[u8]) -> (usize, u8) {
    Header::parse(src)
        .map(|h| (h.typesize as usize, h.flags))
        .unwrap_or_default()
}

/// `(version, versionlz)` of a compressed buffer; zeros if unrecognized.
pub fn cbuffer_versions(src: &[u8]) -> (u8, u8) {
    Header::parse(src)
        .map(|h| (h.version, h.versionlz))
        .unwrap_or_default()
}

/// Library name of the codec that wrote the buffer; empty if unrecognized.
pub fn cbuffer_complib(src: &[u8]) -> &'static str {
    Header::parse(src)
        .ok()
        .and_then(|h| library_for_format(h.compformat()))
        .unwrap_or("")
}
