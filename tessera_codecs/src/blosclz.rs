use crate::codec::{Codec, CodecId};
use crate::error::CodecError;
use crate::scratch;

/// Shortest match worth encoding.
const MIN_MATCH: usize = 4;
/// Largest back-reference the two-byte distance field can express.
const MAX_DISTANCE: usize = u16::MAX as usize;
/// Longest literal run a single control byte can announce.
const MAX_LITERAL_RUN: usize = 0x80;
/// Match length code that announces extension bytes.
const LEN_EXTENDED: u8 = 0x7f;

/// Built-in byte-oriented LZ77 codec, the always-available baseline.
///
/// Stream layout is a sequence of tokens:
///
/// ```text
/// 0x00..=0x7f  literal run: (ctrl + 1) raw bytes follow
/// 0x80..=0xff  match: length (ctrl & 0x7f) + 4, then u16 LE distance,
///              then, when the length code is 0x7f, extension bytes
///              that each add their value and continue while == 255
/// ```
///
/// Works best on shuffled typed data, where long runs of equal bytes are
/// common. The level scales the match-finder hash table.
pub struct BloscLzCodec;

impl Codec for BloscLzCodec {
    fn id(&self) -> CodecId {
        CodecId::BloscLz
    }

    fn compress_block(&self, level: u8, raw: &[u8], out: &mut [u8]) -> Result<usize, CodecError> {
        compress(level, raw, out)
    }

    fn decompress_block(&self, compressed: &[u8], out: &mut [u8]) -> Result<usize, CodecError> {
        decompress(compressed, out)
    }
}

struct Sink<'a> {
    buf: &'a mut [u8],
    pos: usize,
}

impl Sink<'_> {
    #[inline]
    fn push(&mut self, byte: u8) -> Result<(), CodecError> {
        let slot = self.buf.get_mut(self.pos).ok_or(CodecError::Incompressible)?;
        *slot = byte;
        self.pos += 1;
        Ok(())
    }

    fn extend(&mut self, bytes: &[u8]) -> Result<(), CodecError> {
        let end = self.pos + bytes.len();
        if end > self.buf.len() {
            return Err(CodecError::Incompressible);
        }
        self.buf[self.pos..end].copy_from_slice(bytes);
        self.pos = end;
        Ok(())
    }

    fn literals(&mut self, mut run: &[u8]) -> Result<(), CodecError> {
        while !run.is_empty() {
            let take = run.len().min(MAX_LITERAL_RUN);
            self.push((take - 1) as u8)?;
            self.extend(&run[..take])?;
            run = &run[take..];
        }
        Ok(())
    }

    fn matched(&mut self, distance: usize, len: usize) -> Result<(), CodecError> {
        let code = (len - MIN_MATCH).min(LEN_EXTENDED as usize) as u8;
        self.push(0x80 | code)?;
        self.extend(&(distance as u16).to_le_bytes())?;
        if code == LEN_EXTENDED {
            let mut rest = len - MIN_MATCH - LEN_EXTENDED as usize;
            while rest >= 255 {
                self.push(255)?;
                rest -= 255;
            }
            self.push(rest as u8)?;
        }
        Ok(())
    }
}

#[inline]
fn hash(seq: u32, bits: u32) -> usize {
    (seq.wrapping_mul(2_654_435_761) >> (32 - bits)) as usize
}

fn compress(level: u8, src: &[u8], dst: &mut [u8]) -> Result<usize, CodecError> {
    // No point in more slots than there are positions to remember.
    let size_bits = (usize::BITS - src.len().leading_zeros()).max(8);
    let bits = (9 + level as u32).min(16).min(size_bits);
    scratch::with_hash_table(bits, |table| compress_with(table, bits, src, dst))
}

fn compress_with(table: &mut [u32], bits: u32, src: &[u8], dst: &mut [u8]) -> Result<usize, CodecError> {
    // Slots hold position + 1 so that zero means empty.
    let mut sink = Sink { buf: dst, pos: 0 };

    let mut anchor = 0;
    let mut ip = 0;
    while ip + MIN_MATCH <= src.len() {
        let seq = u32::from_le_bytes([src[ip], src[ip + 1], src[ip + 2], src[ip + 3]]);
        let h = hash(seq, bits);
        let candidate = table[h] as usize;
        table[h] = (ip + 1) as u32;

        if candidate != 0 {
            let c = candidate - 1;
            if ip - c <= MAX_DISTANCE && src[c..c + MIN_MATCH] == src[ip..ip + MIN_MATCH] {
                let mut len = MIN_MATCH;
                while ip + len < src.len() && src[c + len] == src[ip + len] {
                    len += 1;
                }
                sink.literals(&src[anchor..ip])?;
                sink.matched(ip - c, len)?;
                ip += len;
                anchor = ip;
                continue;
            }
        }
        ip += 1;
    }
    sink.literals(&src[anchor..])?;
    Ok(sink.pos)
}

fn decompress(src: &[u8], dst: &mut [u8]) -> Result<usize, CodecError> {
    const NAME: &str = "blosclz";
    let mut ip = 0;
    let mut op = 0;

    while ip < src.len() {
        let ctrl = src[ip];
        ip += 1;

        if ctrl < 0x80 {
            let run = ctrl as usize + 1;
            if ip + run > src.len() {
                return Err(CodecError::corrupt(NAME, "literal run past end of input"));
            }
            if op + run > dst.len() {
                return Err(CodecError::corrupt(NAME, "literal run past end of output"));
            }
            dst[op..op + run].copy_from_slice(&src[ip..ip + run]);
            ip += run;
            op += run;
            continue;
        }

        if ip + 2 > src.len() {
            return Err(CodecError::corrupt(NAME, "truncated match distance"));
        }
        let distance = u16::from_le_bytes([src[ip], src[ip + 1]]) as usize;
        ip += 2;

        let code = ctrl & 0x7f;
        let mut len = code as usize + MIN_MATCH;
        if code == LEN_EXTENDED {
            loop {
                let b = *src
                    .get(ip)
                    .ok_or_else(|| CodecError::corrupt(NAME, "truncated match length"))?;
                ip += 1;
                len += b as usize;
                if b != 255 {
                    break;
                }
            }
        }

        if distance == 0 || distance > op {
            return Err(CodecError::corrupt(NAME, format!("match distance {distance} out of range")));
        }
        if op + len > dst.len() {
            return Err(CodecError::corrupt(NAME, "match past end of output"));
        }

        let start = op - distance;
        if distance >= len {
            dst.copy_within(start..start + len, op);
        } else {
            // Overlapping copy repeats the last `distance` bytes.
            for k in 0..len {
                dst[op + k] = dst[start + k];
            }
        }
        op += len;
    }

    Ok(op)
}
