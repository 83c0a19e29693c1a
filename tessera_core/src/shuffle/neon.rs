//! NEON kernels.
//!
//! `vzip1q_u8`/`vzip2q_u8` interleave the low and high halves of two
//! vectors exactly like `unpacklo/hi_epi8`, so the byte transpose is the
//! SSE2 network. NEON has no `movemask`; the bit transpose isolates the
//! top bit of each byte, shifts it into place and sums across the vector.

use std::arch::aarch64::*;

use super::generic;
use super::Implementation;

const LANE_SHIFTS: [i8; 8] = [0, 1, 2, 3, 4, 5, 6, 7];

#[target_feature(enable = "neon")]
unsafe fn interleave<const M: usize>(v: &mut [uint8x16_t; M]) {
    let input = *v;
    let half = M / 2;
    for k in 0..half {
        v[2 * k] = vzip1q_u8(input[k], input[k + half]);
        v[2 * k + 1] = vzip2q_u8(input[k], input[k + half]);
    }
}

#[target_feature(enable = "neon")]
unsafe fn shuffle_fixed<const N: usize>(src: &[u8], dest: &mut [u8]) {
    let n = src.len() / N;
    let vectored = n - n % 16;
    let src = &src[..n * N];
    let out = &mut dest[..n * N];

    for i in (0..vectored).step_by(16) {
        let mut v = [vdupq_n_u8(0); N];
        for (r, lane) in v.iter_mut().enumerate() {
            *lane = vld1q_u8(src.as_ptr().add(i * N + r * 16));
        }
        for _ in 0..4 {
            interleave(&mut v);
        }
        for (j, lane) in v.iter().enumerate() {
            vst1q_u8(out.as_mut_ptr().add(j * n + i), *lane);
        }
    }
    generic::shuffle_tail(N, src, out, vectored);
}

#[target_feature(enable = "neon")]
unsafe fn unshuffle_fixed<const N: usize>(src: &[u8], dest: &mut [u8]) {
    let n = src.len() / N;
    let vectored = n - n % 16;
    let src = &src[..n * N];
    let out = &mut dest[..n * N];

    for i in (0..vectored).step_by(16) {
        let mut v = [vdupq_n_u8(0); N];
        for (j, lane) in v.iter_mut().enumerate() {
            *lane = vld1q_u8(src.as_ptr().add(j * n + i));
        }
        for _ in 0..N.trailing_zeros() {
            interleave(&mut v);
        }
        for (r, lane) in v.iter().enumerate() {
            vst1q_u8(out.as_mut_ptr().add(i * N + r * 16), *lane);
        }
    }
    generic::unshuffle_tail(N, src, out, vectored);
}

#[target_feature(enable = "neon")]
unsafe fn shuffle(typesize: usize, src: &[u8], dest: &mut [u8]) {
    let whole = src.len() - src.len() % typesize;
    match typesize {
        2 => shuffle_fixed::<2>(&src[..whole], dest),
        4 => shuffle_fixed::<4>(&src[..whole], dest),
        8 => shuffle_fixed::<8>(&src[..whole], dest),
        16 => shuffle_fixed::<16>(&src[..whole], dest),
        _ => return generic::shuffle(typesize, src, dest),
    }
    dest[whole..src.len()].copy_from_slice(&src[whole..]);
}

#[target_feature(enable = "neon")]
unsafe fn unshuffle(typesize: usize, src: &[u8], dest: &mut [u8]) {
    let whole = src.len() - src.len() % typesize;
    match typesize {
        2 => unshuffle_fixed::<2>(&src[..whole], dest),
        4 => unshuffle_fixed::<4>(&src[..whole], dest),
        8 => unshuffle_fixed::<8>(&src[..whole], dest),
        16 => unshuffle_fixed::<16>(&src[..whole], dest),
        _ => return generic::unshuffle(typesize, src, dest),
    }
    dest[whole..src.len()].copy_from_slice(&src[whole..]);
}

/// Top bit of byte `e` of `x` placed in bit `e` of the result.
#[target_feature(enable = "neon")]
unsafe fn top_bits(x: uint8x8_t, shifts: int8x8_t) -> u8 {
    vaddv_u8(vshl_u8(vshr_n_u8::<7>(x), shifts))
}

#[target_feature(enable = "neon")]
unsafe fn to_bit_rows(planes: &[u8], n8: usize, dest: &mut [u8]) {
    let groups = n8 / 8;
    let shifts = vld1_s8(LANE_SHIFTS.as_ptr());
    for (plane, rows) in planes.chunks_exact(n8).zip(dest.chunks_exact_mut(n8)) {
        for g in 0..groups {
            let mut x = vld1_u8(plane.as_ptr().add(8 * g));
            for k in (0..8).rev() {
                rows[k * groups + g] = top_bits(x, shifts);
                x = vadd_u8(x, x);
            }
        }
    }
}

#[target_feature(enable = "neon")]
unsafe fn from_bit_rows(src: &[u8], n8: usize, planes: &mut [u8]) {
    let groups = n8 / 8;
    let shifts = vld1_s8(LANE_SHIFTS.as_ptr());
    for (rows, plane) in src.chunks_exact(n8).zip(planes.chunks_exact_mut(n8)) {
        for g in 0..groups {
            let mut gathered = [0u8; 8];
            for (k, byte) in gathered.iter_mut().enumerate() {
                *byte = rows[k * groups + g];
            }
            let mut y = vld1_u8(gathered.as_ptr());
            for s in (0..8).rev() {
                plane[8 * g + s] = top_bits(y, shifts);
                y = vadd_u8(y, y);
            }
        }
    }
}

#[target_feature(enable = "neon")]
unsafe fn bitshuffle(typesize: usize, src: &[u8], dest: &mut [u8], scratch: &mut Vec<u8>) {
    let bytes = generic::bit_extent(typesize, src.len());
    if bytes > 0 {
        scratch.clear();
        scratch.resize(bytes, 0);
        shuffle(typesize, &src[..bytes], &mut scratch[..]);
        to_bit_rows(&scratch[..], bytes / typesize, &mut dest[..bytes]);
    }
    dest[bytes..src.len()].copy_from_slice(&src[bytes..]);
}

#[target_feature(enable = "neon")]
unsafe fn bitunshuffle(typesize: usize, src: &[u8], dest: &mut [u8], scratch: &mut Vec<u8>) {
    let bytes = generic::bit_extent(typesize, src.len());
    if bytes > 0 {
        scratch.clear();
        scratch.resize(bytes, 0);
        from_bit_rows(&src[..bytes], bytes / typesize, &mut scratch[..]);
        unshuffle(typesize, &scratch[..bytes], &mut dest[..bytes]);
    }
    dest[bytes..src.len()].copy_from_slice(&src[bytes..]);
}

// SAFETY: selected only after `neon` was detected at runtime.
pub(super) const IMPLEMENTATION: Implementation = Implementation {
    name: "neon",
    shuffle: |t, s, d| unsafe { shuffle(t, s, d) },
    unshuffle: |t, s, d| unsafe { unshuffle(t, s, d) },
    bitshuffle: |t, s, d, b| unsafe { bitshuffle(t, s, d, b) },
    bitunshuffle: |t, s, d, b| unsafe { bitunshuffle(t, s, d, b) },
};
