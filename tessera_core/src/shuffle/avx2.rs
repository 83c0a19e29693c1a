//! AVX2 kernels.
//!
//! The same interleave network as the SSE2 kernels, run on 32 elements at
//! a time: `unpack*_epi8` works per 128-bit lane, so each lane carries its
//! own group of sixteen elements through the transpose.

use std::arch::x86_64::*;

use super::generic;
use super::sse2;
use super::Implementation;

#[target_feature(enable = "avx2")]
unsafe fn interleave<const M: usize>(v: &mut [__m256i; M]) {
    let input = *v;
    let half = M / 2;
    for k in 0..half {
        v[2 * k] = _mm256_unpacklo_epi8(input[k], input[k + half]);
        v[2 * k + 1] = _mm256_unpackhi_epi8(input[k], input[k + half]);
    }
}

#[target_feature(enable = "avx2")]
unsafe fn shuffle_fixed<const N: usize>(src: &[u8], dest: &mut [u8]) {
    let n = src.len() / N;
    let vectored = n - n % 32;
    let src = &src[..n * N];
    let out = &mut dest[..n * N];

    for i in (0..vectored).step_by(32) {
        let mut v = [_mm256_setzero_si256(); N];
        for (r, lane) in v.iter_mut().enumerate() {
            let lo = _mm_loadu_si128(src.as_ptr().add(i * N + r * 16) as *const __m128i);
            let hi = _mm_loadu_si128(src.as_ptr().add((i + 16) * N + r * 16) as *const __m128i);
            *lane = _mm256_inserti128_si256::<1>(_mm256_castsi128_si256(lo), hi);
        }
        for _ in 0..4 {
            interleave(&mut v);
        }
        for (j, lane) in v.iter().enumerate() {
            _mm256_storeu_si256(out.as_mut_ptr().add(j * n + i) as *mut __m256i, *lane);
        }
    }
    generic::shuffle_tail(N, src, out, vectored);
}

#[target_feature(enable = "avx2")]
unsafe fn unshuffle_fixed<const N: usize>(src: &[u8], dest: &mut [u8]) {
    let n = src.len() / N;
    let vectored = n - n % 32;
    let src = &src[..n * N];
    let out = &mut dest[..n * N];

    for i in (0..vectored).step_by(32) {
        let mut v = [_mm256_setzero_si256(); N];
        for (j, lane) in v.iter_mut().enumerate() {
            *lane = _mm256_loadu_si256(src.as_ptr().add(j * n + i) as *const __m256i);
        }
        for _ in 0..N.trailing_zeros() {
            interleave(&mut v);
        }
        for (r, lane) in v.iter().enumerate() {
            let lo = _mm256_castsi256_si128(*lane);
            let hi = _mm256_extracti128_si256::<1>(*lane);
            _mm_storeu_si128(out.as_mut_ptr().add(i * N + r * 16) as *mut __m128i, lo);
            _mm_storeu_si128(out.as_mut_ptr().add((i + 16) * N + r * 16) as *mut __m128i, hi);
        }
    }
    generic::unshuffle_tail(N, src, out, vectored);
}

#[target_feature(enable = "avx2")]
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

#[target_feature(enable = "avx2")]
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

/// Bit rows from byte planes, four groups of eight per step.
#[target_feature(enable = "avx2")]
unsafe fn to_bit_rows(planes: &[u8], n8: usize, dest: &mut [u8]) {
    let groups = n8 / 8;
    let quads = groups - groups % 4;
    for (plane, rows) in planes.chunks_exact(n8).zip(dest.chunks_exact_mut(n8)) {
        for g in (0..quads).step_by(4) {
            let mut x = _mm256_loadu_si256(plane.as_ptr().add(8 * g) as *const __m256i);
            for k in (0..8).rev() {
                let mask = _mm256_movemask_epi8(x) as u32;
                for q in 0..4 {
                    rows[k * groups + g + q] = (mask >> (8 * q)) as u8;
                }
                x = _mm256_add_epi8(x, x);
            }
        }
        for g in quads..groups {
            generic::group_to_rows(plane, rows, groups, g);
        }
    }
}

#[target_feature(enable = "avx2")]
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

#[target_feature(enable = "avx2")]
unsafe fn bitunshuffle(typesize: usize, src: &[u8], dest: &mut [u8], scratch: &mut Vec<u8>) {
    let bytes = generic::bit_extent(typesize, src.len());
    if bytes > 0 {
        scratch.clear();
        scratch.resize(bytes, 0);
        sse2::from_bit_rows(&src[..bytes], bytes / typesize, &mut scratch[..]);
        unshuffle(typesize, &scratch[..bytes], &mut dest[..bytes]);
    }
    dest[bytes..src.len()].copy_from_slice(&src[bytes..]);
}

// SAFETY: selected only after `avx2` was detected at runtime.
pub(super) const IMPLEMENTATION: Implementation = Implementation {
    name: "avx2",
    shuffle: |t, s, d| unsafe { shuffle(t, s, d) },
    unshuffle: |t, s, d| unsafe { unshuffle(t, s, d) },
    bitshuffle: |t, s, d, b| unsafe { bitshuffle(t, s, d, b) },
    bitunshuffle: |t, s, d, b| unsafe { bitunshuffle(t, s, d, b) },
};
