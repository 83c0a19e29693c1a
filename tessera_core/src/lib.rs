//! Blocked, shuffling, multi-threaded compression.
//!
//! A source buffer is cut into blocks; each block is optionally byte- or
//! bit-shuffled, handed to a codec from `tessera_codecs`, and framed behind
//! a 16-byte self-describing header. Blocks are independent, so they are
//! compressed and decompressed in parallel and can be read back one at a
//! time with [`getitem`].

pub mod config;
pub mod engine;
pub mod error;
pub mod format;
mod pool;
mod reader;
mod scratch;
pub mod shuffle;
mod writer;

pub use config::{EngineConfig, ShuffleKind, SplitMode};
pub use engine::{
    compress, compress_ctx, decompress, decompress_ctx, destroy, free_resources, get_blocksize, get_compressor,
    get_nthreads, get_splitmode, getitem, init, set_blocksize, set_compressor, set_nthreads, set_splitmode, Engine,
};
pub use error::{result_code, Error, Result};
pub use format::{
    cbuffer_complib, cbuffer_metainfo, cbuffer_sizes, cbuffer_versions, version_string, BufferInfo, Header,
    MAX_BUFFERSIZE, MAX_OVERHEAD, MAX_THREADS, MAX_TYPESIZE, MIN_HEADER_LENGTH, VERSION_FORMAT,
};
pub use shuffle::{bitshuffle, bitunshuffle, implementation_name, shuffle, unshuffle};
pub use tessera_codecs::{compcode_to_compname, compname_to_compcode, list_compressors, CodecId};
