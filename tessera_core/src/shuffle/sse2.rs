//! SSE2 kernels.
//!
//! Byte shuffle for element sizes 2, 4, 8 and 16 is a 16-element transpose
//! done with rounds of `unpacklo/hi_epi8`. One round interleaves vector `k`
//! with vector `k + M/2`, which rotates the bit index `vector:byte` of
//! every byte left by one. Four rounds move the element index into the
//! byte position (shuffle); `log2(N)` rounds move it back (unshuffle).
//!
//! The bit transpose uses `movemask_epi8`, which gathers the top bit of
//! sixteen bytes at once.

use std::arch::x86_64::*;

use super::generic;
use super::Implementation;

#[target_feature(enable = "sse2")]
unsafe fn interleave<const M: usize>(v: &mut [__m128i; M]) {
    let input = *v;
    let half = M / 2;
    for k in 0..half {
        v[2 * k] = _mm_unpacklo_epi8(input[k], input[k + half]);
        v[2 * k + 1] = _mm_unpackhi_epi8(input[k], input[k + half]);
    }
}

#[target_feature(enable = "sse2")]
unsafe fn shuffle_fixed<const N: usize>(src: &[u8], dest: &mut [u8]) {
    let n = src.len() / N;
    let vectored = n - n % 16;
    let src = &src[..n * N];
    let out = &mut dest[..n * N];

    for i in (0..vectored).step_by(16) {
        let mut v = [_mm_setzero_si128(); N];
        for (r, lane) in v.iter_mut().enumerate() {
            *lane = _mm_loadu_si128(src.as_ptr().add(i * N + r * 16) as *const __m128i);
        }
        for _ in 0..4 {
            interleave(&mut v);
        }
        for (j, lane) in v.iter().enumerate() {
            _mm_storeu_si128(out.as_mut_ptr().add(j * n + i) as *mut __m128i, *lane);
        }
    }
    generic::shuffle_tail(N, src, out, vectored);
}

#[target_feature(enable = "sse2")]
unsafe fn unshuffle_fixed<const N: usize>(src: &[u8], dest: &mut [u8]) {
    let n = src.len() / N;
    let vectored = n - n % 16;
    let src = &src[..n * N];
    let out = &mut dest[..n * N];

    for i in (0..vectored).step_by(16) {
        let mut v = [_mm_setzero_si128(); N];
        for (j, lane) in v.iter_mut().enumerate() {
            *lane = _mm_loadu_si128(src.as_ptr().add(j * n + i) as *const __m128i);
        }
        for _ in 0..N.trailing_zeros() {
            interleave(&mut v);
        }
        for (r, lane) in v.iter().enumerate() {
            _mm_storeu_si128(out.as_mut_ptr().add(i * N + r * 16) as *mut __m128i, *lane);
        }
    }
    generic::unshuffle_tail(N, src, out, vectored);
}

#[target_feature(enable = "sse2")]
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

#[target_feature(enable = "sse2")]
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

/// Byte planes of `n8` bytes into bit rows, two groups of eight per step.
#[target_feature(enable = "sse2")]
unsafe fn to_bit_rows(planes: &[u8], n8: usize, dest: &mut [u8]) {
    let groups = n8 / 8;
    let paired = groups - groups % 2;
    for (plane, rows) in planes.chunks_exact(n8).zip(dest.chunks_exact_mut(n8)) {
        for g in (0..paired).step_by(2) {
            let mut x = _mm_loadu_si128(plane.as_ptr().add(8 * g) as *const __m128i);
            for k in (0..8).rev() {
                let mask = _mm_movemask_epi8(x) as u32;
                rows[k * groups + g] = mask as u8;
                rows[k * groups + g + 1] = (mask >> 8) as u8;
                // Per-byte shift left by one: bit k-1 moves to the top.
                x = _mm_add_epi8(x, x);
            }
        }
        for g in paired..groups {
            generic::group_to_rows(plane, rows, groups, g);
        }
    }
}

#[target_feature(enable = "sse2")]
pub(super) unsafe fn from_bit_rows(src: &[u8], n8: usize, planes: &mut [u8]) {
    let groups = n8 / 8;
    let paired = groups - groups % 2;
    for (rows, plane) in src.chunks_exact(n8).zip(planes.chunks_exact_mut(n8)) {
        for g in (0..paired).step_by(2) {
            let mut gathered = [0u8; 16];
            for k in 0..8 {
                gathered[k] = rows[k * groups + g];
                gathered[8 + k] = rows[k * groups + g + 1];
            }
            let mut y = _mm_loadu_si128(gathered.as_ptr() as *const __m128i);
            for s in (0..8).rev() {
                let mask = _mm_movemask_epi8(y) as u32;
                plane[8 * g + s] = mask as u8;
                plane[8 * (g + 1) + s] = (mask >> 8) as u8;
                y = _mm_add_epi8(y, y);
            }
        }
        for g in paired..groups {
            generic::rows_to_group(rows, plane, groups, g);
        }
    }
}

#[target_feature(enable = "sse2")]
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

#[target_feature(enable = "sse2")]
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

// SAFETY: SSE2 is part of the x86_64 baseline.
pub(super) const IMPLEMENTATION: Implementation = Implementation {
    name: "sse2",
    shuffle: |t, s, d| unsafe { shuffle(t, s, d) },
    unshuffle: |t, s, d| unsafe { unshuffle(t, s, d) },
    bitshuffle: |t, s, d, b| unsafe { bitshuffle(t, s, d, b) },
    bitunshuffle: |t, s, d, b| unsafe { bitunshuffle(t, s, d, b) },
};
