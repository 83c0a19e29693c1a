//! Portable shuffle kernels.
//!
//! The vector variants fall back to these for odd element sizes and for
//! the elements left over after their last full vector.

/// Transpose an 8x8 bit matrix held one row per byte, little-endian.
///
/// Byte `k` of the result holds bit `k` of every input byte, with input
/// byte `e` landing in bit `e`. Applying it twice is the identity.
#[inline(always)]
pub(crate) fn transpose8(mut x: u64) -> u64 {
    let t = (x ^ (x >> 7)) & 0x00AA_00AA_00AA_00AA;
    x ^= t ^ (t << 7);
    let t = (x ^ (x >> 14)) & 0x0000_CCCC_0000_CCCC;
    x ^= t ^ (t << 14);
    let t = (x ^ (x >> 28)) & 0x0000_0000_F0F0_F0F0;
    x ^= t ^ (t << 28);
    x
}

#[inline(always)]
fn shuffle_fixed<const N: usize>(src: &[u8], dest: &mut [u8]) {
    let n = src.len() / N;
    for (j, plane) in dest[..n * N].chunks_exact_mut(n.max(1)).enumerate() {
        for (i, out) in plane.iter_mut().enumerate() {
            *out = src[i * N + j];
        }
    }
}

#[inline(always)]
fn unshuffle_fixed<const N: usize>(src: &[u8], dest: &mut [u8]) {
    let n = src.len() / N;
    for (i, elem) in dest[..n * N].chunks_exact_mut(N).enumerate() {
        for (j, out) in elem.iter_mut().enumerate() {
            *out = src[j * n + i];
        }
    }
}

#[inline(always)]
fn shuffle_any(typesize: usize, src: &[u8], dest: &mut [u8]) {
    let n = src.len() / typesize;
    for j in 0..typesize {
        let plane = &mut dest[j * n..(j + 1) * n];
        for (i, out) in plane.iter_mut().enumerate() {
            *out = src[i * typesize + j];
        }
    }
}

#[inline(always)]
fn unshuffle_any(typesize: usize, src: &[u8], dest: &mut [u8]) {
    let n = src.len() / typesize;
    for (i, elem) in dest[..n * typesize].chunks_exact_mut(typesize).enumerate() {
        for (j, out) in elem.iter_mut().enumerate() {
            *out = src[j * n + i];
        }
    }
}

/// Scalar shuffle of elements `from..n`, for the vector kernels' leftovers.
#[inline(always)]
pub(crate) fn shuffle_tail(typesize: usize, src: &[u8], dest: &mut [u8], from: usize) {
    let n = src.len() / typesize;
    for j in 0..typesize {
        for i in from..n {
            dest[j * n + i] = src[i * typesize + j];
        }
    }
}

#[inline(always)]
pub(crate) fn unshuffle_tail(typesize: usize, src: &[u8], dest: &mut [u8], from: usize) {
    let n = src.len() / typesize;
    for i in from..n {
        for j in 0..typesize {
            dest[i * typesize + j] = src[j * n + i];
        }
    }
}

/// Byte shuffle: `dest[j*n + i] = src[i*typesize + j]` for `n` whole
/// elements, trailing bytes copied as-is.
#[inline(always)]
pub(crate) fn shuffle(typesize: usize, src: &[u8], dest: &mut [u8]) {
    let whole = src.len() - src.len() % typesize;
    match typesize {
        1 => dest[..whole].copy_from_slice(&src[..whole]),
        2 => shuffle_fixed::<2>(&src[..whole], dest),
        4 => shuffle_fixed::<4>(&src[..whole], dest),
        8 => shuffle_fixed::<8>(&src[..whole], dest),
        16 => shuffle_fixed::<16>(&src[..whole], dest),
        _ => shuffle_any(typesize, &src[..whole], dest),
    }
    dest[whole..src.len()].copy_from_slice(&src[whole..]);
}

#[inline(always)]
pub(crate) fn unshuffle(typesize: usize, src: &[u8], dest: &mut [u8]) {
    let whole = src.len() - src.len() % typesize;
    match typesize {
        1 => dest[..whole].copy_from_slice(&src[..whole]),
        2 => unshuffle_fixed::<2>(&src[..whole], dest),
        4 => unshuffle_fixed::<4>(&src[..whole], dest),
        8 => unshuffle_fixed::<8>(&src[..whole], dest),
        16 => unshuffle_fixed::<16>(&src[..whole], dest),
        _ => unshuffle_any(typesize, &src[..whole], dest),
    }
    dest[whole..src.len()].copy_from_slice(&src[whole..]);
}

/// Number of leading bytes covered by the bit transpose: whole groups of
/// eight elements.
#[inline(always)]
pub(crate) fn bit_extent(typesize: usize, len: usize) -> usize {
    let n = len / typesize;
    (n - n % 8) * typesize
}

/// Spread group `g` of a byte plane over the eight bit rows.
#[inline(always)]
pub(crate) fn group_to_rows(plane: &[u8], rows: &mut [u8], groups: usize, g: usize) {
    let mut word = [0u8; 8];
    word.copy_from_slice(&plane[8 * g..8 * g + 8]);
    let t = transpose8(u64::from_le_bytes(word)).to_le_bytes();
    for (k, byte) in t.into_iter().enumerate() {
        rows[k * groups + g] = byte;
    }
}

#[inline(always)]
pub(crate) fn rows_to_group(rows: &[u8], plane: &mut [u8], groups: usize, g: usize) {
    let mut word = [0u8; 8];
    for (k, byte) in word.iter_mut().enumerate() {
        *byte = rows[k * groups + g];
    }
    plane[8 * g..8 * g + 8].copy_from_slice(&transpose8(u64::from_le_bytes(word)).to_le_bytes());
}

/// Turn byte planes of `n8` bytes each into bit rows.
fn to_bit_rows(planes: &[u8], n8: usize, dest: &mut [u8]) {
    let groups = n8 / 8;
    for (plane, rows) in planes.chunks_exact(n8).zip(dest.chunks_exact_mut(n8)) {
        for g in 0..groups {
            group_to_rows(plane, rows, groups, g);
        }
    }
}

fn from_bit_rows(src: &[u8], n8: usize, planes: &mut [u8]) {
    let groups = n8 / 8;
    for (rows, plane) in src.chunks_exact(n8).zip(planes.chunks_exact_mut(n8)) {
        for g in 0..groups {
            rows_to_group(rows, plane, groups, g);
        }
    }
}

/// Bit shuffle over the largest multiple of eight elements; the remaining
/// bytes are copied as-is.
///
/// Output is `8 * typesize` bit rows of `n8 / 8` bytes each. Row
/// `8*j + k` holds bit `k` of byte `j` of every element.
pub(crate) fn bitshuffle(typesize: usize, src: &[u8], dest: &mut [u8], scratch: &mut Vec<u8>) {
    let bytes = bit_extent(typesize, src.len());
    if bytes > 0 {
        scratch.clear();
        scratch.resize(bytes, 0);
        shuffle(typesize, &src[..bytes], &mut scratch[..]);
        to_bit_rows(&scratch[..], bytes / typesize, &mut dest[..bytes]);
    }
    dest[bytes..src.len()].copy_from_slice(&src[bytes..]);
}

pub(crate) fn bitunshuffle(typesize: usize, src: &[u8], dest: &mut [u8], scratch: &mut Vec<u8>) {
    let bytes = bit_extent(typesize, src.len());
    if bytes > 0 {
        scratch.clear();
        scratch.resize(bytes, 0);
        from_bit_rows(&src[..bytes], bytes / typesize, &mut scratch[..]);
        unshuffle(typesize, &scratch[..bytes], &mut dest[..bytes]);
    }
    dest[bytes..src.len()].copy_from_slice(&src[bytes..]);
}
