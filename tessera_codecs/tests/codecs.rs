/// Registry lookups and per-codec round trips through the adapter surface.
use tessera_codecs::{
    codec_by_format, codec_by_id, codec_by_name, compcode_to_compname, compname_to_compcode, complib_info, compress,
    decompress, descriptors, list_compressors, CodecError, CodecId,
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

fn compiled() -> Vec<CodecId> {
    CodecId::ALL.into_iter().filter(|id| id.is_compiled_in()).collect()
}

#[test]
fn test_every_compiled_codec_roundtrips() {
    let data = compressible_bytes(64 * 1024 + 13);
    for id in compiled() {
        let codec = codec_by_id(id).unwrap();
        for level in 1..=9 {
            let mut packed = vec![0u8; data.len()];
            let n = compress(codec, level, &data, &mut packed).unwrap();
            assert!(n < data.len() / 4, "{id} level {level}: {n} bytes");

            let mut restored = vec![0u8; data.len()];
            let m = decompress(codec, &packed[..n], &mut restored).unwrap();
            assert_eq!(m, data.len());
            assert_eq!(restored, data, "{id} level {level} should be byte-exact");
        }
    }
}

#[test]
fn test_random_data_does_not_fit_its_own_size() {
    let data = pseudo_random_bytes(8 * 1024, 11);
    for id in compiled() {
        let codec = codec_by_id(id).unwrap();
        let mut packed = vec![0u8; data.len() - 1];
        assert_eq!(
            compress(codec, 5, &data, &mut packed),
            Err(CodecError::Incompressible),
            "{id} should report that random data does not fit"
        );
    }
}

#[test]
fn test_level_zero_stores_and_level_ten_is_rejected() {
    let data = pseudo_random_bytes(1_000, 5);
    let codec = codec_by_id(CodecId::BloscLz).unwrap();

    let mut out = vec![0u8; 1_000];
    assert_eq!(compress(codec, 0, &data, &mut out), Ok(1_000));
    assert_eq!(out, data);

    let mut short = vec![0u8; 999];
    assert_eq!(compress(codec, 0, &data, &mut short), Err(CodecError::Incompressible));
    assert_eq!(compress(codec, 10, &data, &mut out), Err(CodecError::InvalidLevel(10)));
}

#[test]
fn test_garbage_is_corrupt_not_a_panic() {
    let garbage = pseudo_random_bytes(300, 99);
    for id in compiled() {
        let codec = codec_by_id(id).unwrap();
        let mut out = vec![0u8; 4_096];
        if let Err(e) = decompress(codec, &garbage, &mut out) {
            assert!(e.code() < 0 || e == CodecError::Incompressible, "{id}: {e}");
        }
    }
}

#[test]
fn test_name_and_code_lookups() {
    assert_eq!(compname_to_compcode("blosclz"), Ok(0));
    assert_eq!(compname_to_compcode("LZ4"), Ok(1));
    assert_eq!(compcode_to_compname(5), Ok("zstd"));
    assert_eq!(codec_by_name("zlib").unwrap().id(), CodecId::Zlib);

    let unknown = compname_to_compcode("brotli").unwrap_err();
    assert_eq!(unknown.code(), -1);
    assert!(matches!(compname_to_compcode("snappy"), Err(CodecError::Unsupported(_))));
    assert!(matches!(compcode_to_compname(3), Err(CodecError::Unsupported(_))));
    assert!(matches!(compcode_to_compname(42), Err(CodecError::Unsupported(_))));
}

#[test]
fn test_compiled_list_excludes_snappy() {
    let list = list_compressors();
    assert!(list.starts_with("blosclz"));
    assert!(!list.contains("snappy"));
    assert_eq!(list.split(',').count(), compiled().len());

    let all = descriptors();
    assert_eq!(all.len(), CodecId::ALL.len());
    let snappy = all.iter().find(|d| d.name == "snappy").unwrap();
    assert!(!snappy.compiled_in);
    assert_eq!(snappy.library, "Snappy");
}

#[test]
fn test_library_info_and_format_codes() {
    let info = complib_info("lz4hc").unwrap();
    assert_eq!(info.library, "LZ4");
    assert_eq!(info.format, 1);
    assert_eq!(info.code, 2);

    // lz4 and lz4hc share a stream format and decode with the same codec.
    assert_eq!(codec_by_format(1).unwrap().id().format(), 1);
    assert_eq!(codec_by_format(4).unwrap().id(), CodecId::Zstd);
    assert!(matches!(codec_by_format(2), Err(CodecError::Unsupported(_))));
    assert!(matches!(codec_by_format(7), Err(CodecError::Unsupported(_))));
}

#[test]
fn test_lz4hc_output_decodes_with_the_shared_format_decoder() {
    let data = compressible_bytes(20_000);
    let hc = codec_by_id(CodecId::Lz4hc).unwrap();
    let mut packed = vec![0u8; data.len()];
    let n = compress(hc, 9, &data, &mut packed).unwrap();

    let mut restored = vec![0u8; data.len()];
    let decoder = codec_by_format(CodecId::Lz4hc.format()).unwrap();
    assert_eq!(decompress(decoder, &packed[..n], &mut restored), Ok(data.len()));
    assert_eq!(restored, data);
}

#[test]
fn test_library_versions_are_reported_where_known() {
    let blosclz = complib_info("blosclz").unwrap();
    assert_eq!(blosclz.version, Some(env!("CARGO_PKG_VERSION")));

    // liblz4 and libzstd report dotted major.minor.release versions.
    for name in ["lz4hc", "zstd"] {
        let version = complib_info(name).unwrap().version.unwrap();
        let parts: Vec<&str> = version.split('.').collect();
        assert_eq!(parts.len(), 3, "{name} version {version}");
        assert!(parts.iter().all(|p| p.parse::<u32>().is_ok()), "{name} version {version}");
        assert_eq!(parts[0], "1", "{name} version {version}");
    }

    let snappy = descriptors().into_iter().find(|d| d.name == "snappy").unwrap();
    assert_eq!(snappy.version, None);
}
