#[cfg(feature = "lz4hc")]
use std::sync::OnceLock;

use serde::Serialize;

use crate::codec::{library_for_format, Codec, CodecId};
use crate::error::CodecError;

/// Immutable description of one registry entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CodecDescriptor {
    pub id: CodecId,
    pub name: &'static str,
    /// Public compressor code.
    pub code: u8,
    /// Header format code.
    pub format: u8,
    pub library: &'static str,
    /// Version of the backing library, when the backend reports one.
    pub version: Option<&'static str>,
    pub compiled_in: bool,
}

impl CodecDescriptor {
    fn of(id: CodecId) -> Self {
        Self {
            id,
            name: id.name(),
            code: id.into(),
            format: id.format(),
            library: id.library(),
            version: library_version(id),
            compiled_in: id.is_compiled_in(),
        }
    }
}

fn library_version(id: CodecId) -> Option<&'static str> {
    match id {
        CodecId::BloscLz => Some(env!("CARGO_PKG_VERSION")),
        #[cfg(feature = "lz4hc")]
        CodecId::Lz4hc => Some(liblz4_version()),
        #[cfg(feature = "zstd")]
        CodecId::Zstd => Some(zstd::zstd_safe::version_string()),
        // lz4_flex and flate2 expose no runtime version.
        _ => None,
    }
}

/// liblz4 reports `major * 10000 + minor * 100 + release`.
#[cfg(feature = "lz4hc")]
fn liblz4_version() -> &'static str {
    static VERSION: OnceLock<String> = OnceLock::new();
    VERSION.get_or_init(|| {
        let n = lz4::version();
        format!("{}.{}.{}", n / 10_000, n / 100 % 100, n % 100)
    })
}

/// All known codecs, compiled in or not, in code order.
pub fn descriptors() -> Vec<CodecDescriptor> {
    CodecId::ALL.into_iter().map(CodecDescriptor::of).collect()
}

/// Comma-joined names of the codecs compiled into this build.
pub fn list_compressors() -> String {
    CodecId::ALL
        .into_iter()
        .filter(|id| id.is_compiled_in())
        .map(CodecId::name)
        .collect::<Vec<_>>()
        .join(",")
}

fn compiled(id: CodecId) -> Result<CodecId, CodecError> {
    if id.is_compiled_in() {
        Ok(id)
    } else {
        Err(CodecError::Unsupported(id.name().to_string()))
    }
}

/// Compressor code for `name`, if it is compiled in.
pub fn compname_to_compcode(name: &str) -> Result<u8, CodecError> {
    let id = compiled(name.parse()?)?;
    Ok(id.into())
}

/// Compressor name for `code`, if it is compiled in.
pub fn compcode_to_compname(code: u8) -> Result<&'static str, CodecError> {
    let id = CodecId::try_from(code).map_err(|_| CodecError::Unsupported(format!("code {code}")))?;
    Ok(compiled(id)?.name())
}

/// Library descriptor for a compiled-in codec name.
pub fn complib_info(name: &str) -> Result<CodecDescriptor, CodecError> {
    let id = compiled(name.parse()?)?;
    Ok(CodecDescriptor::of(id))
}

/// Resolve a codec implementation from its id.
///
/// Called by the engine when compressing with a configured codec.
pub fn codec_by_id(id: CodecId) -> Result<&'static dyn Codec, CodecError> {
    match id {
        CodecId::BloscLz => Ok(&crate::blosclz::BloscLzCodec),
        #[cfg(feature = "lz4")]
        CodecId::Lz4 => Ok(&crate::lz4_codec::Lz4Codec),
        #[cfg(feature = "lz4hc")]
        CodecId::Lz4hc => Ok(&crate::lz4hc_codec::Lz4hcCodec),
        #[cfg(feature = "zlib")]
        CodecId::Zlib => Ok(&crate::zlib_codec::ZlibCodec),
        #[cfg(feature = "zstd")]
        CodecId::Zstd => Ok(&crate::zstd_codec::ZstdCodec),
        #[allow(unreachable_patterns)]
        other => Err(CodecError::Unsupported(other.name().to_string())),
    }
}

pub fn codec_by_name(name: &str) -> Result<&'static dyn Codec, CodecError> {
    codec_by_id(name.parse()?)
}

/// Resolve the decoder for a header format code.
///
/// LZ4 blocks decode with `lz4` when it is compiled in and fall back to
/// the `lz4hc` backend otherwise.
pub fn codec_by_format(format: u8) -> Result<&'static dyn Codec, CodecError> {
    let candidates: &[CodecId] = match format {
        0 => &[CodecId::BloscLz],
        1 => &[CodecId::Lz4, CodecId::Lz4hc],
        2 => &[CodecId::Snappy],
        3 => &[CodecId::Zlib],
        4 => &[CodecId::Zstd],
        _ => &[],
    };
    candidates
        .iter()
        .find_map(|&id| codec_by_id(id).ok())
        .ok_or_else(|| {
            let name = library_for_format(format).map_or_else(|| format!("format {format}"), str::to_string);
            CodecError::Unsupported(name)
        })
}
