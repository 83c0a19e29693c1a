//! Byte and bit shuffle filters.
//!
//! The variant is chosen once per process from the CPU's capabilities.
//! All variants are interchangeable: a buffer shuffled by one unshuffles
//! correctly with any other.

mod arch;
#[cfg(target_arch = "x86_64")]
mod avx2;
mod generic;
#[cfg(target_arch = "aarch64")]
mod neon;
#[cfg(target_arch = "x86_64")]
mod sse2;

use std::sync::OnceLock;

use log::debug;

use crate::error::{Error, Result};
use crate::format::MAX_TYPESIZE;

type ShuffleFn = fn(usize, &[u8], &mut [u8]);
type BitShuffleFn = fn(usize, &[u8], &mut [u8], &mut Vec<u8>);

/// One complete set of shuffle kernels.
#[derive(Clone, Copy)]
pub(crate) struct Implementation {
    pub name: &'static str,
    pub shuffle: ShuffleFn,
    pub unshuffle: ShuffleFn,
    pub bitshuffle: BitShuffleFn,
    pub bitunshuffle: BitShuffleFn,
}

const GENERIC: Implementation = Implementation {
    name: "generic",
    shuffle: generic::shuffle,
    unshuffle: generic::unshuffle,
    bitshuffle: generic::bitshuffle,
    bitunshuffle: generic::bitunshuffle,
};

static SELECTED: OnceLock<Implementation> = OnceLock::new();

pub(crate) fn implementation() -> &'static Implementation {
    SELECTED.get_or_init(|| {
        let chosen = arch::detect().unwrap_or(GENERIC);
        debug!("shuffle: using {} kernels", chosen.name);
        chosen
    })
}

/// Name of the kernel set in use on this CPU.
pub fn implementation_name() -> &'static str {
    implementation().name
}

/// Reusable buffers for the bit shuffle.
#[derive(Debug, Default)]
pub(crate) struct ShuffleScratch {
    /// Output of the filter on the compress side, input on the decompress side.
    pub shuffled: Vec<u8>,
    pub bits: Vec<u8>,
}

fn effective_typesize(typesize: usize) -> usize {
    if (1..=MAX_TYPESIZE).contains(&typesize) {
        typesize
    } else {
        1
    }
}

fn check_dest(src: &[u8], dest: &[u8]) -> Result<()> {
    if dest.len() < src.len() {
        return Err(Error::InvalidParameter(format!(
            "shuffle destination holds {} bytes, source has {}",
            dest.len(),
            src.len()
        )));
    }
    Ok(())
}

/// Byte-shuffle `src` into `dest` as elements of `typesize` bytes.
///
/// Element sizes outside `1..=255` are treated as 1.
pub fn shuffle(typesize: usize, src: &[u8], dest: &mut [u8]) -> Result<()> {
    check_dest(src, dest)?;
    (implementation().shuffle)(effective_typesize(typesize), src, dest);
    Ok(())
}

pub fn unshuffle(typesize: usize, src: &[u8], dest: &mut [u8]) -> Result<()> {
    check_dest(src, dest)?;
    (implementation().unshuffle)(effective_typesize(typesize), src, dest);
    Ok(())
}

/// Bit-shuffle `src` into `dest`. Only whole groups of eight elements are
/// transposed; trailing bytes are copied.
pub fn bitshuffle(typesize: usize, src: &[u8], dest: &mut [u8]) -> Result<()> {
    check_dest(src, dest)?;
    let mut scratch = Vec::new();
    (implementation().bitshuffle)(effective_typesize(typesize), src, dest, &mut scratch);
    Ok(())
}

pub fn bitunshuffle(typesize: usize, src: &[u8], dest: &mut [u8]) -> Result<()> {
    check_dest(src, dest)?;
    let mut scratch = Vec::new();
    (implementation().bitunshuffle)(effective_typesize(typesize), src, dest, &mut scratch);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(len: usize) -> Vec<u8> {
        let mut state = 0x2545_f491_u32;
        (0..len)
            .map(|_| {
                state = state.wrapping_mul(1_103_515_245).wrapping_add(12_345);
                (state >> 16) as u8
            })
            .collect()
    }

    #[test]
    fn every_variant_matches_the_portable_kernels() {
        // Lengths that hit whole vectors only, vectors plus a scalar tail,
        // and too few elements for a single vector.
        for len in [4_099, 16 * 32 * 3 + 40, 16 * 16, 45] {
            let src = sample(len);
            for imp in arch::available() {
                for typesize in [1, 2, 3, 4, 8, 12, 16, 33] {
                    let mut want = vec![0u8; len];
                    let mut got = vec![0u8; len];
                    (GENERIC.shuffle)(typesize, &src, &mut want);
                    (imp.shuffle)(typesize, &src, &mut got);
                    assert_eq!(got, want, "{} shuffle, typesize {typesize}, len {len}", imp.name);

                    (GENERIC.unshuffle)(typesize, &src, &mut want);
                    (imp.unshuffle)(typesize, &src, &mut got);
                    assert_eq!(got, want, "{} unshuffle, typesize {typesize}, len {len}", imp.name);

                    let mut scratch = Vec::new();
                    (GENERIC.bitshuffle)(typesize, &src, &mut want, &mut scratch);
                    (imp.bitshuffle)(typesize, &src, &mut got, &mut scratch);
                    assert_eq!(got, want, "{} bitshuffle, typesize {typesize}, len {len}", imp.name);

                    let mut back = vec![0u8; len];
                    (imp.bitunshuffle)(typesize, &got, &mut back, &mut scratch);
                    assert_eq!(back, src, "{} bitunshuffle, typesize {typesize}, len {len}", imp.name);
                }
            }
        }
    }

    #[test]
    fn vector_kernels_transpose_a_known_block() {
        // 32 four-byte elements: element i is [i, 64+i, 128+i, 192+i].
        let src: Vec<u8> = (0..32u8).flat_map(|i| [i, 64 + i, 128 + i, 192 + i]).collect();
        let want: Vec<u8> = (0..4u8).flat_map(|j| (0..32u8).map(move |i| 64 * j + i)).collect();
        for imp in arch::available() {
            let mut got = vec![0u8; src.len()];
            (imp.shuffle)(4, &src, &mut got);
            assert_eq!(got, want, "{}", imp.name);
            let mut back = vec![0u8; src.len()];
            (imp.unshuffle)(4, &got, &mut back);
            assert_eq!(back, src, "{}", imp.name);
        }
    }

    #[test]
    fn out_of_range_typesize_is_a_copy() {
        let src = sample(100);
        let mut dest = vec![0u8; 100];
        shuffle(0, &src, &mut dest).unwrap();
        assert_eq!(dest, src);
        shuffle(300, &src, &mut dest).unwrap();
        assert_eq!(dest, src);
    }

    #[test]
    fn short_destination_is_rejected() {
        let src = sample(64);
        let mut dest = vec![0u8; 63];
        assert!(matches!(shuffle(4, &src, &mut dest), Err(Error::InvalidParameter(_))));
        assert!(matches!(bitunshuffle(4, &src, &mut dest), Err(Error::InvalidParameter(_))));
    }

    #[test]
    fn public_filters_invert_each_other() {
        let src = sample(1_000);
        let mut mid = vec![0u8; 1_000];
        let mut back = vec![0u8; 1_000];
        shuffle(8, &src, &mut mid).unwrap();
        unshuffle(8, &mid, &mut back).unwrap();
        assert_eq!(back, src);
        bitshuffle(8, &src, &mut mid).unwrap();
        bitunshuffle(8, &mid, &mut back).unwrap();
        assert_eq!(back, src);
        assert!(!implementation_name().is_empty());
    }
}
