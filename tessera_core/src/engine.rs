use std::sync::{Mutex, MutexGuard, OnceLock, PoisonError};

use log::debug;
use tessera_codecs::{compname_to_compcode, CodecId};

use crate::config::{validate_nthreads, EngineConfig, ShuffleKind, SplitMode};
use crate::error::{Error, Result};
use crate::pool::WorkerPool;
use crate::writer::CompressParams;
use crate::{reader, scratch, writer};

/// Engine configuration plus the worker threads that serve it.
///
/// Every call made through one `Engine` sees the configuration as it was
/// when the call started. Engines are independent of each other; the
/// process-wide default is just one of them behind a mutex.
#[derive(Debug)]
pub struct Engine {
    config: EngineConfig,
    pool: WorkerPool,
}

impl Default for Engine {
    fn default() -> Self {
        let config = EngineConfig::default();
        Self {
            pool: WorkerPool::new(config.nthreads),
            config,
        }
    }
}

impl Engine {
    pub fn new(config: EngineConfig) -> Result<Self> {
        validate_nthreads(config.nthreads)?;
        if !config.compressor.is_compiled_in() {
            return Err(Error::Unsupported(config.compressor.name().to_string()));
        }
        Ok(Self {
            pool: WorkerPool::new(config.nthreads),
            config,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Set the worker count (1..=256), returning the previous one.
    ///
    /// Threads are spawned by the first call that has more than one block.
    pub fn set_nthreads(&mut self, nthreads: usize) -> Result<usize> {
        validate_nthreads(nthreads)?;
        let previous = self.pool.resize(nthreads);
        self.config.nthreads = nthreads;
        Ok(previous)
    }

    pub fn nthreads(&self) -> usize {
        self.config.nthreads
    }

    /// Select the codec for later compress calls, returning its code.
    pub fn set_compressor(&mut self, name: &str) -> Result<u8> {
        let code = compname_to_compcode(name)?;
        let id = CodecId::try_from(code).map_err(|_| Error::Internal(format!("registry returned unknown code {code}")))?;
        self.config.compressor = id;
        Ok(code)
    }

    pub fn compressor(&self) -> &'static str {
        self.config.compressor.name()
    }

    /// Force a block size; 0 restores the automatic choice.
    pub fn set_blocksize(&mut self, blocksize: usize) {
        self.config.blocksize = blocksize;
    }

    pub fn blocksize(&self) -> usize {
        self.config.blocksize
    }

    pub fn set_splitmode(&mut self, splitmode: SplitMode) {
        self.config.splitmode = splitmode;
    }

    pub fn splitmode(&self) -> SplitMode {
        self.config.splitmode
    }

    /// Compress `src` into `dest` and return the compressed length.
    ///
    /// `dest.len() >= src.len() + MAX_OVERHEAD` guarantees success. With a
    /// smaller `dest`, [`Error::Incompressible`] means the data did not fit
    /// and the contents of `dest` are meaningless.
    pub fn compress(
        &mut self,
        clevel: u8,
        shuffle: ShuffleKind,
        typesize: usize,
        src: &[u8],
        dest: &mut [u8],
    ) -> Result<usize> {
        let params = CompressParams {
            clevel,
            shuffle,
            typesize,
            codec: self.config.compressor,
            blocksize: self.config.blocksize,
            splitmode: self.config.splitmode,
        };
        writer::compress(&mut self.pool, &params, src, dest)
    }

    /// Decompress a buffer produced by [`Engine::compress`] (or any
    /// compatible writer) and return the decompressed length.
    pub fn decompress(&mut self, src: &[u8], dest: &mut [u8]) -> Result<usize> {
        reader::decompress(&mut self.pool, src, dest)
    }

    /// Decompress `nitems` elements starting at element `start` into
    /// `dest`, returning the number of bytes written.
    pub fn getitem(&self, src: &[u8], start: usize, nitems: usize, dest: &mut [u8]) -> Result<usize> {
        reader::getitem(src, start, nitems, dest)
    }

    /// Stop the worker threads and drop the calling thread's scratch
    /// buffers. The next parallel call starts fresh threads.
    ///
    /// The workers are detached, not joined: they exit once idle, after
    /// this returns. Teardown therefore has no failure to report and the
    /// result is always `Ok`.
    pub fn free_resources(&mut self) -> Result<()> {
        self.pool.release();
        scratch::release();
        Ok(())
    }
}

// ── Process-wide default ───────────────────────────────────────────────────
//
// Each free function locks the cell for the whole call. Setters racing a
// call on another thread are serialized, but a sequence of setters is not
// atomic as a group; use `compress_ctx`/`decompress_ctx` for per-call
// settings.

static GLOBAL: OnceLock<Mutex<Engine>> = OnceLock::new();

fn global() -> MutexGuard<'static, Engine> {
    GLOBAL
        .get_or_init(|| Mutex::new(Engine::default()))
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
}

/// Reset the process-wide engine to its defaults.
pub fn init() {
    let mut engine = global();
    *engine = Engine::default();
    debug!("engine: defaults restored");
}

/// Release the process-wide engine's threads and restore its defaults.
pub fn destroy() -> Result<()> {
    let mut engine = global();
    engine.free_resources()?;
    *engine = Engine::default();
    Ok(())
}

pub fn set_nthreads(nthreads: usize) -> Result<usize> {
    global().set_nthreads(nthreads)
}

pub fn get_nthreads() -> usize {
    global().nthreads()
}

pub fn set_compressor(name: &str) -> Result<u8> {
    global().set_compressor(name)
}

pub fn get_compressor() -> &'static str {
    global().compressor()
}

pub fn set_blocksize(blocksize: usize) {
    global().set_blocksize(blocksize)
}

pub fn get_blocksize() -> usize {
    global().blocksize()
}

pub fn set_splitmode(splitmode: SplitMode) {
    global().set_splitmode(splitmode)
}

pub fn get_splitmode() -> SplitMode {
    global().splitmode()
}

/// Compress with the process-wide settings. See [`Engine::compress`].
pub fn compress(clevel: u8, shuffle: ShuffleKind, typesize: usize, src: &[u8], dest: &mut [u8]) -> Result<usize> {
    global().compress(clevel, shuffle, typesize, src, dest)
}

pub fn decompress(src: &[u8], dest: &mut [u8]) -> Result<usize> {
    global().decompress(src, dest)
}

pub fn getitem(src: &[u8], start: usize, nitems: usize, dest: &mut [u8]) -> Result<usize> {
    reader::getitem(src, start, nitems, dest)
}

pub fn free_resources() -> Result<()> {
    global().free_resources()
}

// ── Context calls ──────────────────────────────────────────────────────────

/// Compress with every setting given explicitly; the process-wide engine
/// is neither read nor locked.
#[allow(clippy::too_many_arguments)]
pub fn compress_ctx(
    clevel: u8,
    shuffle: ShuffleKind,
    typesize: usize,
    src: &[u8],
    dest: &mut [u8],
    compressor: &str,
    blocksize: usize,
    nthreads: usize,
) -> Result<usize> {
    let compressor: CodecId = compressor.parse()?;
    let mut engine = Engine::new(EngineConfig {
        compressor,
        nthreads,
        blocksize,
        splitmode: SplitMode::default(),
    })?;
    engine.compress(clevel, shuffle, typesize, src, dest)
}

pub fn decompress_ctx(src: &[u8], dest: &mut [u8], nthreads: usize) -> Result<usize> {
    let mut engine = Engine::new(EngineConfig {
        nthreads,
        ..EngineConfig::default()
    })?;
    engine.decompress(src, dest)
}
