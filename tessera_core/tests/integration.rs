/// Integration tests: compress/decompress through the public engine surface
/// and check the frame against the guarantees callers rely on.
///
///  1. Every compiled codec x every filter round-trips byte-exact
///  2. `src.len() + MAX_OVERHEAD` bytes of destination always suffice
///  3. Output does not depend on the thread count
///  4. `getitem` decodes exactly the requested slice
///  5. Damaged headers are rejected without touching memory outside `dest`
use std::sync::Mutex;

use tessera_core::{
    cbuffer_complib, cbuffer_metainfo, cbuffer_sizes, cbuffer_versions, compress_ctx, decompress_ctx, result_code,
    version_string, BufferInfo, CodecId, Engine, EngineConfig, Error, ShuffleKind, SplitMode, MAX_OVERHEAD,
    VERSION_FORMAT,
};

/// Generate `len` deterministic bytes using a simple LCG.
fn pseudo_random_bytes(len: usize, seed: u64) -> Vec<u8> {
    let mut rng = seed;
    (0..len)
        .map(|_| {
            rng = rng
                .wrapping_mul(6364136223846793005)
                .wrapping_add(1442695040888963407);
            (rng >> 56) as u8
        })
        .collect()
}

/// Generate `len` highly compressible bytes (repeating pattern).
fn compressible_bytes(len: usize) -> Vec<u8> {
    let pattern = b"the quick brown fox jumps over the lazy dog. ";
    (0..len).map(|i| pattern[i % pattern.len()]).collect()
}

/// Little-endian `u32` counter, the typical shuffle-friendly payload.
fn ramp_u32(count: usize) -> Vec<u8> {
    (0..count as u32).flat_map(|v| (v * 3).to_le_bytes()).collect()
}

// ── helpers ───────────────────────────────────────────────────────────────

fn compiled_codecs() -> Vec<CodecId> {
    CodecId::ALL.into_iter().filter(|id| id.is_compiled_in()).collect()
}

fn engine(compressor: CodecId, nthreads: usize, blocksize: usize) -> Engine {
    Engine::new(EngineConfig {
        compressor,
        nthreads,
        blocksize,
        splitmode: SplitMode::default(),
    })
    .unwrap()
}

fn pack(engine: &mut Engine, clevel: u8, shuffle: ShuffleKind, typesize: usize, data: &[u8]) -> Vec<u8> {
    let mut packed = vec![0u8; data.len() + MAX_OVERHEAD];
    let n = engine.compress(clevel, shuffle, typesize, data, &mut packed).unwrap();
    packed.truncate(n);
    packed
}

fn unpack(engine: &mut Engine, packed: &[u8]) -> Vec<u8> {
    let (nbytes, _, _) = cbuffer_sizes(packed);
    let mut out = vec![0u8; nbytes];
    assert_eq!(engine.decompress(packed, &mut out).unwrap(), nbytes);
    out
}

// ── tests ──────────────────────────────────────────────────────────────────

#[test]
fn test_roundtrip_every_codec_and_filter() {
    let data = ramp_u32(60_000);
    for codec in compiled_codecs() {
        let mut e = engine(codec, 1, 0);
        for shuffle in [ShuffleKind::None, ShuffleKind::Byte, ShuffleKind::Bit] {
            for typesize in [1, 2, 4, 8, 7] {
                let packed = pack(&mut e, 5, shuffle, typesize, &data);
                assert_eq!(
                    unpack(&mut e, &packed),
                    data,
                    "{codec} {shuffle} typesize {typesize} should round-trip"
                );
            }
        }
    }
}

#[test]
fn test_million_zeros_shrink() {
    let data = vec![0u8; 1_000_000];
    let mut e = Engine::default();
    assert_eq!(e.compressor(), "blosclz");

    let packed = pack(&mut e, 5, ShuffleKind::Byte, 4, &data);
    assert!(packed.len() < 20_000, "1M zeros packed to {} bytes", packed.len());

    let restored = unpack(&mut e, &packed);
    assert_eq!(restored.len(), 1_000_000);
    assert!(restored.iter().all(|&b| b == 0));
}

#[test]
fn test_no_headroom_reports_did_not_fit() {
    let data = pseudo_random_bytes(10, 7);
    let mut dest = vec![0u8; 10];
    let result = Engine::default().compress(5, ShuffleKind::Byte, 1, &data, &mut dest);
    assert!(matches!(result, Err(Error::Incompressible | Error::CapacityExceeded { .. })));
    assert_eq!(result_code(&result), 0);
}

#[test]
fn test_random_data_within_overhead_bound() {
    for codec in compiled_codecs() {
        let mut e = engine(codec, 2, 0);
        for len in [0, 1, 127, 128, 1_000, 70_001, 300_000] {
            let data = pseudo_random_bytes(len, len as u64 + 1);
            let mut dest = vec![0u8; len + MAX_OVERHEAD];
            let n = e
                .compress(9, ShuffleKind::Bit, 4, &data, &mut dest)
                .unwrap_or_else(|err| panic!("{codec}, {len} bytes: {err}"));
            assert!(n <= len + MAX_OVERHEAD);
            assert_eq!(unpack(&mut e, &dest[..n]), data);
        }
    }
}

#[test]
fn test_short_destination_is_incompressible() {
    let data = pseudo_random_bytes(50_000, 3);
    let mut dest = vec![0u8; 40_000];
    let result = Engine::default().compress(5, ShuffleKind::None, 1, &data, &mut dest);
    assert_eq!(result, Err(Error::Incompressible));
}

#[test]
fn test_level_zero_stores_verbatim() {
    let data = compressible_bytes(10_000);
    let mut e = Engine::default();
    let packed = pack(&mut e, 0, ShuffleKind::Byte, 4, &data);
    assert_eq!(packed.len(), data.len() + MAX_OVERHEAD);
    assert_eq!(&packed[MAX_OVERHEAD..], &data[..]);

    let info = BufferInfo::read(&packed).unwrap();
    assert!(info.memcpyed);
    assert!(!info.shuffle);
    assert_eq!(unpack(&mut e, &packed), data);
}

#[test]
fn test_thread_count_does_not_change_output() {
    // Forced 16 KiB blocks: 8 full blocks plus a leftover.
    let data = compressible_bytes(8 * 16_384 + 500);

    let mut parallel = engine(CodecId::BloscLz, 4, 16_384);
    let packed4 = pack(&mut parallel, 5, ShuffleKind::Byte, 4, &data);
    assert_eq!(BufferInfo::read(&packed4).unwrap().nblocks, 9);

    let mut serial = engine(CodecId::BloscLz, 1, 16_384);
    let packed1 = pack(&mut serial, 5, ShuffleKind::Byte, 4, &data);
    assert_eq!(packed4, packed1, "compressed bytes must not depend on thread count");

    let restored4 = unpack(&mut parallel, &packed4);
    assert_eq!(parallel.set_nthreads(1).unwrap(), 4);
    let restored1 = unpack(&mut parallel, &packed4);
    assert_eq!(restored4, restored1);
    assert_eq!(restored1, data);
}

#[test]
fn test_setting_the_same_thread_count_is_idempotent() {
    let mut e = Engine::default();
    assert_eq!(e.set_nthreads(3).unwrap(), 1);
    assert_eq!(e.set_nthreads(3).unwrap(), 3);
    assert_eq!(e.nthreads(), 3);
    assert!(matches!(e.set_nthreads(0), Err(Error::InvalidParameter(_))));
    assert!(matches!(e.set_nthreads(257), Err(Error::InvalidParameter(_))));
    assert_eq!(e.nthreads(), 3);
}

#[test]
fn test_getitem_matches_full_decompression() {
    let data = ramp_u32(40_000);
    let mut e = engine(CodecId::BloscLz, 1, 4_096);
    let packed = pack(&mut e, 5, ShuffleKind::Byte, 4, &data);
    let full = unpack(&mut e, &packed);

    for (start, nitems) in [(0, 1), (0, 1_024), (1_000, 50), (1_020, 10), (5_000, 20_000), (39_990, 10)] {
        let mut out = vec![0u8; nitems * 4];
        let n = e.getitem(&packed, start, nitems, &mut out).unwrap();
        assert_eq!(n, nitems * 4);
        assert_eq!(out, full[start * 4..(start + nitems) * 4], "items {start}+{nitems}");
    }

    let mut out = vec![0u8; 8];
    assert!(matches!(e.getitem(&packed, 39_999, 2, &mut out), Err(Error::InvalidParameter(_))));
    assert_eq!(e.getitem(&packed, 10, 0, &mut out), Ok(0));
    assert!(matches!(
        e.getitem(&packed, 0, 3, &mut out),
        Err(Error::CapacityExceeded { needed: 12, available: 8 })
    ));
}

#[test]
fn test_getitem_across_filters_and_split_modes() {
    // 40_004 bytes: nine full 4 KiB blocks plus a leftover. Runs of equal
    // elements keep every filter well clear of the stored fallback.
    let data: Vec<u8> = (0..10_001u32).flat_map(|v| (v / 16).to_le_bytes()).collect();
    for shuffle in [ShuffleKind::None, ShuffleKind::Byte, ShuffleKind::Bit] {
        for splitmode in [SplitMode::Always, SplitMode::Never] {
            let mut e = Engine::new(EngineConfig {
                blocksize: 4_096,
                splitmode,
                ..EngineConfig::default()
            })
            .unwrap();
            let packed = pack(&mut e, 5, shuffle, 4, &data);
            let info = BufferInfo::read(&packed).unwrap();
            assert!(!info.memcpyed);
            assert_eq!(info.split, splitmode == SplitMode::Always);
            let full = unpack(&mut e, &packed);
            assert_eq!(full, data);

            for (start, nitems) in [(0, 3), (1_023, 2), (3_000, 4_000), (9_990, 11)] {
                let mut out = vec![0u8; nitems * 4];
                assert_eq!(e.getitem(&packed, start, nitems, &mut out), Ok(nitems * 4));
                assert_eq!(
                    out,
                    data[start * 4..(start + nitems) * 4],
                    "{shuffle} {splitmode}: items {start}+{nitems}"
                );
            }
        }
    }
}

#[test]
fn test_getitem_on_stored_buffer() {
    let data = ramp_u32(20);
    let mut e = Engine::default();
    let packed = pack(&mut e, 5, ShuffleKind::Byte, 4, &data);
    assert!(BufferInfo::read(&packed).unwrap().memcpyed, "80 bytes is below the minimum to compress");

    let mut out = vec![0u8; 12];
    assert_eq!(e.getitem(&packed, 5, 3, &mut out).unwrap(), 12);
    assert_eq!(out, data[20..32]);
}

#[test]
fn test_header_introspection() {
    let data = ramp_u32(100_000);
    let mut e = engine(CodecId::default(), 1, 0);
    let packed = pack(&mut e, 5, ShuffleKind::Byte, 4, &data);

    let (nbytes, cbytes, blocksize) = cbuffer_sizes(&packed);
    assert_eq!(nbytes, data.len());
    assert_eq!(cbytes, packed.len());
    assert!(blocksize > 0 && blocksize % 4 == 0);

    // Every query works from the header alone.
    let header = &packed[..16];
    assert_eq!(cbuffer_sizes(header), (nbytes, cbytes, blocksize));
    assert_eq!(cbuffer_metainfo(header).0, 4);
    assert_eq!(cbuffer_versions(header), (VERSION_FORMAT, 1));
    assert_eq!(cbuffer_complib(header), "BloscLZ");

    let info = BufferInfo::read(header).unwrap();
    assert!(info.shuffle && !info.bitshuffle && !info.memcpyed);
    assert!(info.split);
}

#[test]
fn test_version_string_is_the_crate_release() {
    assert_eq!(version_string(), env!("CARGO_PKG_VERSION"));
    assert_eq!(version_string().split('.').count(), 3);
}

#[test]
fn test_corrupt_version_is_rejected() {
    let data = compressible_bytes(100_000);
    let mut e = Engine::default();
    let mut packed = pack(&mut e, 5, ShuffleKind::None, 1, &data);
    packed[0] = 0x7f;

    for cap in [0, 10, data.len()] {
        let mut out = vec![0u8; cap];
        let result = e.decompress(&packed, &mut out);
        assert!(matches!(result, Err(Error::Corrupt(_))));
        assert!(result_code(&result) <= 0);
    }
    assert_eq!(cbuffer_sizes(&packed), (0, 0, 0));
}

#[test]
fn test_damaged_blocks_are_rejected() {
    let data = compressible_bytes(100_000);
    let mut e = engine(CodecId::BloscLz, 1, 8_192);
    let packed = pack(&mut e, 5, ShuffleKind::None, 1, &data);
    let mut out = vec![0u8; data.len()];

    let truncated = &packed[..packed.len() - 10];
    assert!(matches!(e.decompress(truncated, &mut out), Err(Error::Corrupt(_))));

    // Point the first block start at the header.
    let mut bad_table = packed.clone();
    bad_table[16..20].copy_from_slice(&0u32.to_le_bytes());
    assert!(matches!(e.decompress(&bad_table, &mut out), Err(Error::Corrupt(_))));

    let mut short = vec![0u8; data.len() - 1];
    assert!(matches!(
        e.decompress(&packed, &mut short),
        Err(Error::CapacityExceeded { .. })
    ));
}

#[test]
fn test_invalid_level_and_codec() {
    let data = compressible_bytes(1_000);
    let mut dest = vec![0u8; 2_000];
    let result = Engine::default().compress(10, ShuffleKind::None, 1, &data, &mut dest);
    assert!(matches!(result, Err(Error::InvalidParameter(_))));
    assert_eq!(result_code(&result), -2);

    let mut e = Engine::default();
    let unsupported = e.set_compressor("snappy");
    assert!(matches!(unsupported, Err(Error::Unsupported(_))));
    assert_eq!(unsupported.unwrap_err().code(), -1);
    assert!(matches!(e.set_compressor("brotli"), Err(Error::Unsupported(_))));
    assert_eq!(e.compressor(), "blosclz");
}

#[test]
fn test_context_calls() {
    let data = ramp_u32(50_000);
    let mut packed = vec![0u8; data.len() + MAX_OVERHEAD];
    let n = compress_ctx(5, ShuffleKind::Bit, 4, &data, &mut packed, "lz4", 0, 2).unwrap();
    assert_eq!(cbuffer_complib(&packed[..n]), "LZ4");

    let mut out = vec![0u8; data.len()];
    assert_eq!(decompress_ctx(&packed[..n], &mut out, 3).unwrap(), data.len());
    assert_eq!(out, data);

    assert!(matches!(
        compress_ctx(5, ShuffleKind::None, 1, &data, &mut packed, "snappy", 0, 1),
        Err(Error::Unsupported(_))
    ));
    assert!(matches!(
        compress_ctx(5, ShuffleKind::None, 1, &data, &mut packed, "lz4", 0, 0),
        Err(Error::InvalidParameter(_))
    ));
}

// ── process-wide engine ────────────────────────────────────────────────────

static GLOBAL_LOCK: Mutex<()> = Mutex::new(());

#[test]
fn test_global_engine_settings() {
    let _guard = GLOBAL_LOCK.lock().unwrap_or_else(|e| e.into_inner());
    tessera_core::init();

    assert_eq!(tessera_core::get_nthreads(), 1);
    assert_eq!(tessera_core::set_nthreads(4).unwrap(), 1);
    assert_eq!(tessera_core::set_nthreads(4).unwrap(), 4);
    assert_eq!(tessera_core::get_compressor(), "blosclz");
    assert_eq!(tessera_core::set_compressor("zstd").unwrap(), 5);
    assert_eq!(tessera_core::get_compressor(), "zstd");
    tessera_core::set_blocksize(32_768);
    assert_eq!(tessera_core::get_blocksize(), 32_768);
    tessera_core::set_splitmode(SplitMode::Never);
    assert_eq!(tessera_core::get_splitmode(), SplitMode::Never);

    tessera_core::destroy().unwrap();
    assert_eq!(tessera_core::get_nthreads(), 1);
    assert_eq!(tessera_core::get_compressor(), "blosclz");
    assert_eq!(tessera_core::get_blocksize(), 0);
}

#[test]
fn test_global_engine_roundtrip() {
    let _guard = GLOBAL_LOCK.lock().unwrap_or_else(|e| e.into_inner());
    tessera_core::init();
    tessera_core::set_nthreads(2).unwrap();
    tessera_core::set_compressor("zlib").unwrap();

    let data = ramp_u32(80_000);
    let mut packed = vec![0u8; data.len() + MAX_OVERHEAD];
    let n = tessera_core::compress(6, ShuffleKind::Byte, 4, &data, &mut packed).unwrap();
    assert!(n < data.len() / 2);
    assert_eq!(cbuffer_complib(&packed), "Zlib");

    let mut out = vec![0u8; data.len()];
    assert_eq!(tessera_core::decompress(&packed[..n], &mut out).unwrap(), data.len());
    assert_eq!(out, data);

    let mut item = [0u8; 4];
    tessera_core::getitem(&packed[..n], 12_345, 1, &mut item).unwrap();
    assert_eq!(u32::from_le_bytes(item), 12_345 * 3);

    tessera_core::free_resources().unwrap();
    tessera_core::destroy().unwrap();
}
