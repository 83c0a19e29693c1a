use std::sync::atomic::{AtomicUsize, Ordering};

use log::{debug, trace};
use tessera_codecs::{codec_by_id, Codec, CodecError, CodecId};

use crate::config::{ShuffleKind, SplitMode};
use crate::error::{Error, Result};
use crate::format::{
    stream_count, BlockLayout, Header, FLAG_BITSHUFFLE, FLAG_DONT_SPLIT, FLAG_MEMCPYED, FLAG_SHUFFLE, L1,
    MAX_BLOCKSIZE, MAX_BUFFERSIZE, MAX_OVERHEAD, MAX_TYPESIZE, MIN_BUFFERSIZE, MIN_HEADER_LENGTH, VERSION_FORMAT,
};
use crate::pool::WorkerPool;
use crate::scratch::{sized, with_scratch, Scratch};
use crate::shuffle::implementation;

/// Settings of one compression call after the engine resolved them.
#[derive(Debug, Clone, Copy)]
pub(crate) struct CompressParams {
    pub clevel: u8,
    pub shuffle: ShuffleKind,
    pub typesize: usize,
    pub codec: CodecId,
    /// Forced block size, 0 for automatic.
    pub blocksize: usize,
    pub splitmode: SplitMode,
}

/// Compressed buffer layout:
///
/// ```text
/// [HEADER: 16 bytes]
/// [BLOCK STARTS: u32 LE x nblocks]     <- absolute offsets into the buffer
/// [BLOCK 0] [BLOCK 1] ... [BLOCK N-1]
///
/// block  = stream+   (1 stream, or `typesize` streams when split)
/// stream = [csize: u32 LE][csize bytes]
///          csize == stream length means the bytes are stored raw
/// ```
///
/// A stored buffer is the header with `FLAG_MEMCPYED` set followed by the
/// source bytes, `nbytes + MAX_OVERHEAD` bytes in total.
pub(crate) fn compress(pool: &mut WorkerPool, params: &CompressParams, src: &[u8], dest: &mut [u8]) -> Result<usize> {
    if params.clevel > tessera_codecs::MAX_LEVEL {
        return Err(Error::InvalidParameter(format!(
            "compression level {} out of range 0..={}",
            params.clevel,
            tessera_codecs::MAX_LEVEL
        )));
    }
    if src.len() > MAX_BUFFERSIZE {
        return Err(Error::InvalidParameter(format!(
            "source of {} bytes exceeds the {MAX_BUFFERSIZE}-byte maximum",
            src.len()
        )));
    }
    if dest.len() < MAX_OVERHEAD {
        return Err(Error::CapacityExceeded {
            needed: MAX_OVERHEAD,
            available: dest.len(),
        });
    }

    let codec = codec_by_id(params.codec)?;
    let typesize = if (1..=MAX_TYPESIZE).contains(&params.typesize) {
        params.typesize
    } else {
        1
    };
    let nbytes = src.len();

    let mut header = Header {
        version: VERSION_FORMAT,
        versionlz: codec.format_version(),
        flags: 0,
        typesize: typesize as u8,
        nbytes: nbytes as u32,
        blocksize: 0,
        cbytes: 0,
    };
    header.set_compformat(params.codec.format());

    if params.clevel == 0 || nbytes < MIN_BUFFERSIZE {
        header.blocksize = nbytes as u32;
        return store_memcpy(header, src, dest);
    }

    let blocksize = compute_blocksize(
        params.clevel,
        typesize,
        nbytes,
        params.blocksize,
        params.codec,
        params.splitmode,
    );
    let split = params.splitmode.should_split(params.codec, typesize, blocksize);
    header.blocksize = blocksize as u32;
    header.flags |= match params.shuffle {
        ShuffleKind::None => 0,
        ShuffleKind::Byte => FLAG_SHUFFLE,
        ShuffleKind::Bit => FLAG_BITSHUFFLE,
    };
    if !split {
        header.flags |= FLAG_DONT_SPLIT;
    }

    let layout = BlockLayout::new(nbytes, blocksize);
    debug!(
        "compress: {nbytes} bytes, codec {}, level {}, typesize {typesize}, {} blocks of {blocksize}, split={split}, {} threads",
        params.codec,
        params.clevel,
        layout.count(),
        pool.nthreads()
    );

    // A frame no smaller than the stored form is not worth keeping.
    let limit = dest.len().min(nbytes + MAX_OVERHEAD - 1);
    match encode_blocks(pool, codec, params.clevel, &header, &layout, src, limit) {
        Ok(blocks) => Ok(assemble(header, &layout, &blocks, dest)),
        Err(Error::Incompressible) => {
            debug!("compress: frame exceeds {limit} bytes, storing verbatim");
            store_memcpy(header, src, dest)
        }
        Err(e) => Err(e),
    }
}

/// Automatic block size, or the forced one clamped to the legal range.
pub(crate) fn compute_blocksize(
    clevel: u8,
    typesize: usize,
    nbytes: usize,
    forced: usize,
    codec: CodecId,
    splitmode: SplitMode,
) -> usize {
    if nbytes < typesize {
        return 1;
    }

    let mut blocksize = nbytes;
    if forced > 0 {
        blocksize = forced.clamp(MIN_BUFFERSIZE, MAX_BLOCKSIZE);
    } else if nbytes >= L1 {
        blocksize = L1;
        if codec.is_high_ratio() {
            blocksize *= 2;
        }
        match clevel {
            0 => blocksize /= 4,
            1 => blocksize /= 2,
            2 => {}
            3 => blocksize *= 2,
            4 | 5 => blocksize *= 4,
            6..=8 => blocksize *= 8,
            _ => {
                blocksize *= 8;
                if codec.is_high_ratio() {
                    blocksize *= 2;
                }
            }
        }

        // Each split stream should still see a decent amount of data.
        if splitmode.should_split(codec, typesize, blocksize) {
            blocksize = blocksize.min(256 * 1024) * typesize;
            blocksize = blocksize.clamp(64 * 1024, 1024 * 1024);
        }
    }

    blocksize = blocksize.min(nbytes);
    if blocksize > typesize {
        blocksize = blocksize / typesize * typesize;
    }
    blocksize
}

fn encode_blocks(
    pool: &mut WorkerPool,
    codec: &dyn Codec,
    clevel: u8,
    header: &Header,
    layout: &BlockLayout,
    src: &[u8],
    limit: usize,
) -> Result<Vec<Vec<u8>>> {
    let data_start = layout.data_start();
    if data_start > limit {
        return Err(Error::Incompressible);
    }

    let total = AtomicUsize::new(data_start);
    let mut blocks = vec![Vec::new(); layout.count()];
    pool.for_each_block(&mut blocks, |j, out| {
        let raw = &src[layout.range(j)];
        let n = with_scratch(|scratch| encode_block(codec, clevel, header, layout.is_leftover(j), raw, out, scratch))?;
        if total.fetch_add(n, Ordering::Relaxed) + n > limit {
            return Err(Error::Incompressible);
        }
        Ok(())
    })?;
    Ok(blocks)
}

/// Filter and compress one block into `out`, returning its framed length.
fn encode_block(
    codec: &dyn Codec,
    clevel: u8,
    header: &Header,
    leftover: bool,
    raw: &[u8],
    out: &mut Vec<u8>,
    scratch: &mut Scratch,
) -> Result<usize> {
    let typesize = header.typesize as usize;
    let filtered: &[u8] = if header.has_flag(FLAG_SHUFFLE) && typesize > 1 {
        let buf = sized(&mut scratch.shuffle.shuffled, raw.len());
        (implementation().shuffle)(typesize, raw, buf);
        buf
    } else if header.has_flag(FLAG_BITSHUFFLE) {
        let buf = sized(&mut scratch.shuffle.shuffled, raw.len());
        (implementation().bitshuffle)(typesize, raw, buf, &mut scratch.shuffle.bits);
        buf
    } else {
        raw
    };

    let split = !header.has_flag(FLAG_DONT_SPLIT);
    let nstreams = stream_count(split, leftover, typesize, raw.len());
    let neblock = raw.len() / nstreams;

    out.clear();
    for stream in filtered.chunks_exact(neblock) {
        let at = out.len();
        // Room for the size prefix and a result strictly shorter than raw.
        out.resize(at + 4 + neblock - 1, 0);
        let csize = match tessera_codecs::compress(codec, clevel, stream, &mut out[at + 4..]) {
            Ok(n) => {
                out.truncate(at + 4 + n);
                n
            }
            Err(CodecError::Incompressible) => {
                out.truncate(at + 4);
                out.extend_from_slice(stream);
                neblock
            }
            Err(e) => return Err(e.into()),
        };
        out[at..at + 4].copy_from_slice(&(csize as u32).to_le_bytes());
    }
    Ok(out.len())
}

fn assemble(mut header: Header, layout: &BlockLayout, blocks: &[Vec<u8>], dest: &mut [u8]) -> usize {
    let mut pos = layout.data_start();
    for (j, block) in blocks.iter().enumerate() {
        let at = MIN_HEADER_LENGTH + 4 * j;
        dest[at..at + 4].copy_from_slice(&(pos as u32).to_le_bytes());
        dest[pos..pos + block.len()].copy_from_slice(block);
        pos += block.len();
    }
    header.cbytes = pos as u32;
    dest[..MIN_HEADER_LENGTH].copy_from_slice(&header.to_bytes());
    trace!("compress: {} -> {pos} bytes", layout.nbytes);
    pos
}

/// Write `src` verbatim behind a header marked as stored.
fn store_memcpy(mut header: Header, src: &[u8], dest: &mut [u8]) -> Result<usize> {
    let cbytes = src.len() + MAX_OVERHEAD;
    if dest.len() < cbytes {
        return Err(Error::Incompressible);
    }
    header.flags = (header.flags & !(FLAG_SHUFFLE | FLAG_BITSHUFFLE)) | FLAG_MEMCPYED | FLAG_DONT_SPLIT;
    header.cbytes = cbytes as u32;
    dest[..MIN_HEADER_LENGTH].copy_from_slice(&header.to_bytes());
    dest[MIN_HEADER_LENGTH..cbytes].copy_from_slice(src);
    Ok(cbytes)
}
