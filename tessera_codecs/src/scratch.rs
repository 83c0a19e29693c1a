use std::cell::RefCell;

use log::trace;

use crate::error::CodecError;

thread_local! {
    static BOUNDED: RefCell<Vec<u8>> = const { RefCell::new(Vec::new()) };
    static HASH_TABLE: RefCell<Vec<u32>> = const { RefCell::new(Vec::new()) };
}

/// Lend `f` a zeroed match table of `1 << bits` slots.
///
/// The allocation is per thread and reused, so compressing many small
/// streams only pays for clearing the table.
pub(crate) fn with_hash_table<R>(bits: u32, f: impl FnOnce(&mut [u32]) -> R) -> R {
    HASH_TABLE.with(|cell| {
        let mut table = cell.borrow_mut();
        let slots = 1usize << bits;
        if table.len() < slots {
            trace!("codecs: hash table grows to {slots} slots");
        }
        table.clear();
        table.resize(slots, 0);
        f(&mut table[..])
    })
}

/// Run a backend that insists on a worst-case sized output buffer, then
/// copy the result into `out` if it fits.
///
/// When `out` is already large enough the backend writes into it directly.
/// The staging buffer is per thread and reused across calls.
pub(crate) fn compress_bounded<F>(bound: usize, out: &mut [u8], mut compress: F) -> Result<usize, CodecError>
where
    F: FnMut(&mut [u8]) -> Result<usize, CodecError>,
{
    if out.len() >= bound {
        return compress(out);
    }
    BOUNDED.with(|cell| {
        let mut staging = cell.borrow_mut();
        if staging.len() < bound {
            trace!("codecs: staging buffer grows to {bound} bytes");
            staging.resize(bound, 0);
        }
        let n = compress(&mut staging[..bound])?;
        let dst = out.get_mut(..n).ok_or(CodecError::Incompressible)?;
        dst.copy_from_slice(&staging[..n]);
        Ok(n)
    })
}
