use std::cell::RefCell;

use crate::shuffle::ShuffleScratch;

/// Per-worker buffers reused across blocks and calls.
#[derive(Debug, Default)]
pub(crate) struct Scratch {
    /// Decoded streams of one block before the filter is reversed.
    pub block: Vec<u8>,
    pub shuffle: ShuffleScratch,
}

thread_local! {
    static SCRATCH: RefCell<Scratch> = RefCell::new(Scratch::default());
}

/// Run `f` with this thread's scratch buffers.
pub(crate) fn with_scratch<R>(f: impl FnOnce(&mut Scratch) -> R) -> R {
    SCRATCH.with(|cell| f(&mut cell.borrow_mut()))
}

/// Drop the calling thread's buffers.
pub(crate) fn release() {
    SCRATCH.with(|cell| *cell.borrow_mut() = Scratch::default());
}

/// Grow `buf` to at least `len` bytes and return that prefix.
pub(crate) fn sized(buf: &mut Vec<u8>, len: usize) -> &mut [u8] {
    if buf.len() < len {
        buf.resize(len, 0);
    }
    &mut buf[..len]
}
