//! Property-based tests for the filters and the block engine.

use proptest::prelude::*;
use tessera_core::{
    bitshuffle, bitunshuffle, cbuffer_sizes, shuffle, unshuffle, CodecId, Engine, EngineConfig, ShuffleKind,
    SplitMode, MAX_OVERHEAD,
};

fn arb_shuffle() -> impl Strategy<Value = ShuffleKind> {
    prop_oneof![
        Just(ShuffleKind::None),
        Just(ShuffleKind::Byte),
        Just(ShuffleKind::Bit),
    ]
}

fn arb_codec() -> impl Strategy<Value = CodecId> {
    let compiled: Vec<CodecId> = CodecId::ALL.into_iter().filter(|id| id.is_compiled_in()).collect();
    prop::sample::select(compiled)
}

fn arb_splitmode() -> impl Strategy<Value = SplitMode> {
    prop_oneof![
        Just(SplitMode::Always),
        Just(SplitMode::Never),
        Just(SplitMode::Auto),
        Just(SplitMode::ForwardCompat),
    ]
}

/// Mostly-repetitive bytes so that codecs actually get to compress.
fn arb_payload() -> impl Strategy<Value = Vec<u8>> {
    prop_oneof![
        prop::collection::vec(any::<u8>(), 0..20_000),
        (prop::collection::vec(any::<u8>(), 1..64), 0usize..3_000)
            .prop_map(|(unit, reps)| unit.repeat(reps)),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn shuffle_roundtrips(data in prop::collection::vec(any::<u8>(), 0..4_096), typesize in 0usize..300) {
        let mut mid = vec![0u8; data.len()];
        let mut back = vec![0u8; data.len()];
        shuffle(typesize, &data, &mut mid).unwrap();
        unshuffle(typesize, &mid, &mut back).unwrap();
        prop_assert_eq!(&back, &data);

        bitshuffle(typesize, &data, &mut mid).unwrap();
        bitunshuffle(typesize, &mid, &mut back).unwrap();
        prop_assert_eq!(&back, &data);
    }

    #[test]
    fn engine_roundtrips_within_overhead(
        data in arb_payload(),
        codec in arb_codec(),
        shuffle_kind in arb_shuffle(),
        splitmode in arb_splitmode(),
        clevel in 0u8..=9,
        typesize in 1usize..=16,
        blocksize in prop_oneof![Just(0usize), 128usize..8_192],
        nthreads in 1usize..=3,
    ) {
        let mut engine = Engine::new(EngineConfig { compressor: codec, nthreads, blocksize, splitmode }).unwrap();
        let mut packed = vec![0u8; data.len() + MAX_OVERHEAD];
        let n = engine.compress(clevel, shuffle_kind, typesize, &data, &mut packed).unwrap();
        prop_assert!(n <= data.len() + MAX_OVERHEAD);
        let (nbytes, cbytes, _) = cbuffer_sizes(&packed[..n]);
        prop_assert_eq!((nbytes, cbytes), (data.len(), n));

        let mut out = vec![0u8; data.len()];
        prop_assert_eq!(engine.decompress(&packed[..n], &mut out).unwrap(), data.len());
        prop_assert_eq!(&out, &data);
    }

    #[test]
    fn getitem_is_a_slice_of_decompress(
        data in arb_payload(),
        typesize in 1usize..=8,
        shuffle_kind in arb_shuffle(),
        splitmode in arb_splitmode(),
        start_frac in 0.0f64..1.0,
        len_frac in 0.0f64..1.0,
    ) {
        let mut engine = Engine::new(EngineConfig { blocksize: 1_024, splitmode, ..EngineConfig::default() }).unwrap();
        let mut packed = vec![0u8; data.len() + MAX_OVERHEAD];
        let n = engine.compress(5, shuffle_kind, typesize, &data, &mut packed).unwrap();

        let mut full = vec![0u8; data.len()];
        engine.decompress(&packed[..n], &mut full).unwrap();

        let items = data.len() / typesize;
        let start = (items as f64 * start_frac) as usize;
        let nitems = ((items - start) as f64 * len_frac) as usize;
        let mut out = vec![0u8; nitems * typesize];
        prop_assert_eq!(engine.getitem(&packed[..n], start, nitems, &mut out).unwrap(), nitems * typesize);
        prop_assert_eq!(&out[..], &full[start * typesize..(start + nitems) * typesize]);
    }
}
