use crate::error::CodecError;

/// Level-0 path: store `raw` verbatim.
///
/// Succeeds whenever `out` can hold the input; used for data that is
/// already compressed or when the caller asks for no compression at all.
pub fn store(raw: &[u8], out: &mut [u8]) -> Result<usize, CodecError> {
    let dst = out.get_mut(..raw.len()).ok_or(CodecError::Incompressible)?;
    dst.copy_from_slice(raw);
    Ok(raw.len())
}
