use log::{debug, trace};
use tessera_codecs::{codec_by_format, Codec, CodecError};

use crate::error::{Error, Result};
use crate::format::{
    read_bstarts, stream_count, BlockLayout, Header, FLAG_BITSHUFFLE, FLAG_DONT_SPLIT, FLAG_SHUFFLE, MIN_HEADER_LENGTH,
};
use crate::pool::WorkerPool;
use crate::scratch::{sized, with_scratch, Scratch};
use crate::shuffle::implementation;

/// A validated compressed buffer, ready for block-level access.
///
/// # Access pattern
/// [`Frame::decode_block`] reads one entry of the block start table and
/// decodes only that block; no other blocks are touched. This is what
/// lets [`getitem`] answer a range query from the 1-2 blocks it overlaps.
struct Frame<'a> {
    /// Source truncated to `cbytes`.
    src: &'a [u8],
    header: Header,
    layout: BlockLayout,
    bstarts: Vec<usize>,
    codec: &'static dyn Codec,
}

impl<'a> Frame<'a> {
    /// Parse a non-stored buffer. Callers handle `FLAG_MEMCPYED` first.
    fn open(src: &'a [u8], header: Header) -> Result<Self> {
        let src = &src[..header.cbytes as usize];
        let codec = codec_by_format(header.compformat())?;
        let layout = BlockLayout::new(header.nbytes as usize, header.blocksize as usize);
        let bstarts = read_bstarts(src, &layout)?;
        Ok(Self {
            src,
            header,
            layout,
            bstarts,
            codec,
        })
    }

    /// Decode block `j` into `out`, which must be exactly the block's size.
    fn decode_block(&self, j: usize, out: &mut [u8], scratch: &mut Scratch) -> Result<()> {
        let typesize = self.header.typesize as usize;
        let byte_shuffled = self.header.has_flag(FLAG_SHUFFLE) && typesize > 1;
        let bit_shuffled = !byte_shuffled && self.header.has_flag(FLAG_BITSHUFFLE);

        if !(byte_shuffled || bit_shuffled) {
            return self.decode_streams(j, out);
        }

        let staged = sized(&mut scratch.block, out.len());
        self.decode_streams(j, staged)?;
        if byte_shuffled {
            (implementation().unshuffle)(typesize, staged, out);
        } else {
            (implementation().bitunshuffle)(typesize, staged, out, &mut scratch.shuffle.bits);
        }
        Ok(())
    }

    fn decode_streams(&self, j: usize, out: &mut [u8]) -> Result<()> {
        let split = !self.header.has_flag(FLAG_DONT_SPLIT);
        let nstreams = stream_count(
            split,
            self.layout.is_leftover(j),
            self.header.typesize as usize,
            out.len(),
        );
        let neblock = out.len() / nstreams;

        let mut pos = self.bstarts[j];
        for (k, stream_out) in out.chunks_exact_mut(neblock).enumerate() {
            let prefix = self
                .src
                .get(pos..pos + 4)
                .ok_or_else(|| Error::corrupt(format!("block {j} stream {k}: size runs past the buffer")))?;
            let csize = u32::from_le_bytes([prefix[0], prefix[1], prefix[2], prefix[3]]) as usize;
            pos += 4;
            if csize > neblock {
                return Err(Error::corrupt(format!(
                    "block {j} stream {k}: {csize} compressed bytes for a {neblock}-byte stream"
                )));
            }
            let body = self
                .src
                .get(pos..pos + csize)
                .ok_or_else(|| Error::corrupt(format!("block {j} stream {k}: data runs past the buffer")))?;
            pos += csize;

            if csize == neblock {
                stream_out.copy_from_slice(body);
                continue;
            }
            let n = tessera_codecs::decompress(self.codec, body, stream_out).map_err(|e| match e {
                CodecError::Incompressible => Error::corrupt(format!("block {j} stream {k}: decoded data overflows")),
                other => other.into(),
            })?;
            if n != neblock {
                return Err(Error::corrupt(format!(
                    "block {j} stream {k}: decoded {n} bytes, expected {neblock}"
                )));
            }
        }
        Ok(())
    }
}

/// Parse the header and check it against the source length.
fn open_header(src: &[u8]) -> Result<Header> {
    let header = Header::parse(src)?;
    if header.cbytes as usize > src.len() {
        return Err(Error::corrupt(format!(
            "header claims {} compressed bytes, buffer holds {}",
            header.cbytes,
            src.len()
        )));
    }
    Ok(header)
}

pub(crate) fn decompress(pool: &mut WorkerPool, src: &[u8], dest: &mut [u8]) -> Result<usize> {
    let header = open_header(src)?;
    let nbytes = header.nbytes as usize;
    if dest.len() < nbytes {
        return Err(Error::CapacityExceeded {
            needed: nbytes,
            available: dest.len(),
        });
    }
    if nbytes == 0 {
        return Ok(0);
    }

    if header.is_memcpyed() {
        trace!("decompress: stored buffer of {nbytes} bytes");
        dest[..nbytes].copy_from_slice(&src[MIN_HEADER_LENGTH..MIN_HEADER_LENGTH + nbytes]);
        return Ok(nbytes);
    }

    let frame = Frame::open(src, header)?;
    debug!(
        "decompress: {} -> {nbytes} bytes, {} blocks, {} threads",
        header.cbytes,
        frame.layout.count(),
        pool.nthreads()
    );

    let mut blocks: Vec<&mut [u8]> = dest[..nbytes].chunks_mut(frame.layout.blocksize).collect();
    pool.for_each_block(&mut blocks, |j, out| {
        with_scratch(|scratch| frame.decode_block(j, &mut **out, scratch))
    })?;
    Ok(nbytes)
}

/// Decode `nitems` elements starting at element `start`, touching only
/// the blocks that overlap the range.
pub(crate) fn getitem(src: &[u8], start: usize, nitems: usize, dest: &mut [u8]) -> Result<usize> {
    let header = open_header(src)?;
    let typesize = header.typesize as usize;
    let nbytes = header.nbytes as usize;

    let range = start
        .checked_mul(typesize)
        .zip(start.checked_add(nitems).and_then(|stop| stop.checked_mul(typesize)))
        .filter(|&(_, stop)| stop <= nbytes)
        .ok_or_else(|| {
            Error::InvalidParameter(format!(
                "{nitems} items of {typesize} bytes at item {start} fall outside a {nbytes}-byte buffer"
            ))
        })?;
    let (first, stop) = range;
    let len = stop - first;
    if dest.len() < len {
        return Err(Error::CapacityExceeded {
            needed: len,
            available: dest.len(),
        });
    }
    if len == 0 {
        return Ok(0);
    }

    if header.is_memcpyed() {
        dest[..len].copy_from_slice(&src[MIN_HEADER_LENGTH + first..MIN_HEADER_LENGTH + stop]);
        return Ok(len);
    }

    let frame = Frame::open(src, header)?;
    let blocksize = frame.layout.blocksize;
    let mut block = vec![0u8; blocksize.min(nbytes)];
    with_scratch(|scratch| {
        for j in first / blocksize..=(stop - 1) / blocksize {
            let span = frame.layout.range(j);
            let decoded = &mut block[..span.len()];
            frame.decode_block(j, decoded, scratch)?;

            let lo = first.max(span.start);
            let hi = stop.min(span.end);
            dest[lo - first..hi - first].copy_from_slice(&decoded[lo - span.start..hi - span.start]);
        }
        trace!("getitem: {len} bytes from blocks {}..={}", first / blocksize, (stop - 1) / blocksize);
        Ok(len)
    })
}
