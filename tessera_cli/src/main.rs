use std::fs::File;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use log::{info, warn};
use xxhash_rust::xxh3::xxh3_64;

use tessera_codecs::descriptors;
use tessera_core::{
    cbuffer_sizes, compress_ctx, decompress_ctx, implementation_name, version_string, BufferInfo, ShuffleKind,
    SplitMode, MAX_OVERHEAD,
};

// ── CLI definition ─────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(
    name = "tessera",
    about = "Blocked, shuffling, multi-threaded compressor for typed binary data",
    version
)]
struct Cli {
    #[command(flatten)]
    engine: EngineArgs,
    #[command(subcommand)]
    command: Commands,
}

/// Engine settings. Each one can also come from a `TESSERA_*` variable.
#[derive(Args)]
struct EngineArgs {
    /// Compression level, 0 (store) to 9
    #[arg(short = 'l', long, global = true, env = "TESSERA_CLEVEL", default_value_t = 5,
          value_parser = clap::value_parser!(u8).range(0..=9))]
    clevel: u8,
    /// Filter: noshuffle | shuffle | bitshuffle
    #[arg(short, long, global = true, env = "TESSERA_SHUFFLE", default_value = "shuffle")]
    shuffle: ShuffleKind,
    /// Element size in bytes used by the filters
    #[arg(short, long, global = true, env = "TESSERA_TYPESIZE", default_value_t = 8)]
    typesize: usize,
    /// Codec: blosclz | lz4 | lz4hc | zlib | zstd
    #[arg(short, long, global = true, env = "TESSERA_COMPRESSOR", default_value = "blosclz")]
    compressor: String,
    /// Worker threads (1-256)
    #[arg(short = 'n', long, global = true, env = "TESSERA_NTHREADS", default_value_t = 1)]
    nthreads: usize,
    /// Forced block size in bytes; 0 picks one automatically
    #[arg(short, long, global = true, env = "TESSERA_BLOCKSIZE", default_value_t = 0)]
    blocksize: usize,
    /// Split policy: always | never | auto | forward_compat
    #[arg(long, global = true, env = "TESSERA_SPLITMODE", default_value = "forward_compat")]
    splitmode: SplitMode,
    /// Pass every setting per call instead of configuring the shared engine
    #[arg(long, global = true, env = "TESSERA_NOLOCK")]
    nolock: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Compress a file into a tessera buffer
    Compress {
        /// Source file ("-" reads stdin)
        input: PathBuf,
        /// Destination file ("-" writes to stdout)
        output: PathBuf,
    },
    /// Decompress a tessera buffer back to raw bytes
    Decompress {
        /// Source tessera buffer ("-" reads stdin)
        input: PathBuf,
        /// Destination file ("-" writes to stdout)
        output: PathBuf,
    },
    /// Print what the header says about a buffer
    Inspect {
        /// Tessera buffer to inspect
        file: PathBuf,
        /// Emit JSON instead of a table
        #[arg(long)]
        json: bool,
    },
    /// Decompress a range of elements
    ///
    /// Only the blocks overlapping the range are decoded.
    Getitem {
        /// Tessera buffer
        file: PathBuf,
        /// First element to read
        #[arg(long, default_value_t = 0)]
        start: usize,
        /// Number of elements to read
        #[arg(long)]
        nitems: usize,
        /// Write raw bytes to a file instead of printing a hex dump
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Time compression and decompression and verify the round trip
    Bench {
        /// Input file; synthetic typed samples are used when absent
        input: Option<PathBuf>,
        /// Size of the synthetic input in bytes
        #[arg(long, default_value_t = 8 << 20)]
        size: usize,
        /// Timed repetitions of each direction
        #[arg(long, default_value_t = 5)]
        iterations: u32,
    },
    /// List the codecs this build knows about
    Codecs {
        /// Emit JSON instead of a table
        #[arg(long)]
        json: bool,
    },
}

// ── Engine plumbing ────────────────────────────────────────────────────────

impl EngineArgs {
    /// Push the settings into the shared engine unless running lock-free.
    fn configure(&self) -> anyhow::Result<()> {
        if self.nolock {
            if self.splitmode != SplitMode::default() {
                warn!("--splitmode {} has no effect with --nolock", self.splitmode);
            }
            return Ok(());
        }
        tessera_core::set_compressor(&self.compressor)
            .with_context(|| format!("selecting compressor '{}'", self.compressor))?;
        tessera_core::set_nthreads(self.nthreads).context("setting thread count")?;
        tessera_core::set_blocksize(self.blocksize);
        tessera_core::set_splitmode(self.splitmode);
        Ok(())
    }

    fn compress(&self, src: &[u8], dest: &mut [u8]) -> tessera_core::Result<usize> {
        if self.nolock {
            compress_ctx(
                self.clevel,
                self.shuffle,
                self.typesize,
                src,
                dest,
                &self.compressor,
                self.blocksize,
                self.nthreads,
            )
        } else {
            tessera_core::compress(self.clevel, self.shuffle, self.typesize, src, dest)
        }
    }

    fn decompress(&self, src: &[u8], dest: &mut [u8]) -> tessera_core::Result<usize> {
        if self.nolock {
            decompress_ctx(src, dest, self.nthreads)
        } else {
            tessera_core::decompress(src, dest)
        }
    }

    /// Compress into a buffer sized so that compression cannot fail.
    fn pack(&self, src: &[u8]) -> anyhow::Result<Vec<u8>> {
        let mut packed = vec![0u8; src.len() + MAX_OVERHEAD];
        let n = self.compress(src, &mut packed).context("compressing")?;
        packed.truncate(n);
        Ok(packed)
    }

    fn unpack(&self, packed: &[u8]) -> anyhow::Result<Vec<u8>> {
        let info = BufferInfo::read(packed).context("reading header")?;
        let mut raw = vec![0u8; info.nbytes];
        let n = self.decompress(packed, &mut raw).context("decompressing")?;
        raw.truncate(n);
        Ok(raw)
    }
}

// ── Helpers ────────────────────────────────────────────────────────────────

fn human_bytes(n: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    let mut v = n as f64;
    let mut unit = 0;
    while v >= 1024.0 && unit < UNITS.len() - 1 {
        v /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} B", n)
    } else {
        format!("{:.2} {}", v, UNITS[unit])
    }
}

fn throughput(bytes: usize, secs: f64) -> String {
    format!("{}/s", human_bytes((bytes as f64 / secs.max(1e-9)) as u64))
}

fn read_input(path: &Path) -> anyhow::Result<Vec<u8>> {
    if path.to_str() == Some("-") {
        let mut buf = Vec::new();
        io::stdin().lock().read_to_end(&mut buf).context("reading stdin")?;
        Ok(buf)
    } else {
        std::fs::read(path).with_context(|| format!("reading {:?}", path))
    }
}

fn write_output(path: &Path, data: &[u8]) -> anyhow::Result<()> {
    if path.to_str() == Some("-") {
        let mut out = io::stdout().lock();
        out.write_all(data)?;
        out.flush()?;
    } else {
        let mut file = File::create(path).with_context(|| format!("creating output file {:?}", path))?;
        file.write_all(data)?;
    }
    Ok(())
}

/// Slowly varying little-endian `f64` samples, the data shuffling is for.
fn synthetic_samples(len: usize) -> Vec<u8> {
    let mut data: Vec<u8> = (0..len.div_ceil(8))
        .flat_map(|i| (20.0 + 5.0 * (i as f64 * 0.0005).sin()).to_le_bytes())
        .collect();
    data.truncate(len);
    data
}

fn print_hex_dump(raw: &[u8]) {
    let preview = &raw[..raw.len().min(256)];
    for (i, chunk) in preview.chunks(16).enumerate() {
        print!("  {:04x}  ", i * 16);
        for b in chunk {
            print!("{:02x} ", b);
        }
        // padding
        for _ in chunk.len()..16 {
            print!("   ");
        }
        print!("  |");
        for b in chunk {
            if b.is_ascii_graphic() || *b == b' ' {
                print!("{}", *b as char);
            } else {
                print!(".");
            }
        }
        println!("|");
    }
    if raw.len() > 256 {
        println!("  ... ({} bytes remaining not shown)", raw.len() - 256);
    }
}

// ── Subcommand implementations ─────────────────────────────────────────────

fn run_compress(engine: &EngineArgs, input: PathBuf, output: PathBuf) -> anyhow::Result<()> {
    let src = read_input(&input)?;

    let t0 = Instant::now();
    let packed = engine.pack(&src)?;
    let elapsed = t0.elapsed();

    write_output(&output, &packed)?;

    let info = BufferInfo::read(&packed)?;
    eprintln!("  codec       : {} ({})", engine.compressor, info.complib);
    eprintln!("  level       : {}", engine.clevel);
    eprintln!("  filter      : {} (typesize {})", engine.shuffle, info.typesize);
    eprintln!("  block size  : {}", human_bytes(info.blocksize as u64));
    eprintln!("  blocks      : {}", info.nblocks);
    eprintln!("  raw size    : {}", human_bytes(src.len() as u64));
    eprintln!("  compressed  : {}", human_bytes(packed.len() as u64));
    eprintln!("  ratio       : {:.2}x", src.len() as f64 / packed.len() as f64);
    if info.memcpyed {
        eprintln!("  stored      : verbatim (did not compress)");
    }
    eprintln!("  throughput  : {}", throughput(src.len(), elapsed.as_secs_f64()));
    eprintln!("  elapsed     : {:.3}s", elapsed.as_secs_f64());
    Ok(())
}

fn run_decompress(engine: &EngineArgs, input: PathBuf, output: PathBuf) -> anyhow::Result<()> {
    let packed = read_input(&input)?;

    let t0 = Instant::now();
    let raw = engine.unpack(&packed)?;
    let elapsed = t0.elapsed();

    write_output(&output, &raw)?;

    eprintln!("  compressed  : {}", human_bytes(packed.len() as u64));
    eprintln!("  raw size    : {}", human_bytes(raw.len() as u64));
    eprintln!("  throughput  : {}", throughput(raw.len(), elapsed.as_secs_f64()));
    eprintln!("  elapsed     : {:.3}s", elapsed.as_secs_f64());
    Ok(())
}

fn run_inspect(file: PathBuf, json: bool) -> anyhow::Result<()> {
    // The header alone answers every query.
    let mut header = [0u8; tessera_core::MIN_HEADER_LENGTH];
    File::open(&file)
        .and_then(|mut f| f.read_exact(&mut header))
        .with_context(|| format!("reading header of {:?}", file))?;
    let info = BufferInfo::read(&header).with_context(|| format!("{:?} is not a tessera buffer", file))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&info)?);
        return Ok(());
    }

    println!("=== tessera buffer: {:?} ===", file);
    println!();
    println!("  format version : {} (codec format {})", info.version, info.versionlz);
    println!("  codec library  : {}", info.complib);
    println!("  typesize       : {}", info.typesize);
    println!("  raw size       : {}", human_bytes(info.nbytes as u64));
    println!("  compressed     : {}", human_bytes(info.cbytes as u64));
    if info.cbytes > 0 {
        println!("  ratio          : {:.2}x", info.nbytes as f64 / info.cbytes as f64);
    }
    println!("  block size     : {}", human_bytes(info.blocksize as u64));
    println!("  block count    : {}", info.nblocks);
    println!("  flags          : 0x{:02x}", info.flags);
    let filter = if info.bitshuffle {
        "bitshuffle"
    } else if info.shuffle {
        "shuffle"
    } else {
        "none"
    };
    println!("  filter         : {}", filter);
    println!("  split streams  : {}", info.split);
    println!("  stored verbatim: {}", info.memcpyed);
    Ok(())
}

fn run_getitem(file: PathBuf, start: usize, nitems: usize, output: Option<PathBuf>) -> anyhow::Result<()> {
    let packed = read_input(&file)?;
    let info = BufferInfo::read(&packed).with_context(|| format!("{:?} is not a tessera buffer", file))?;

    let mut raw = vec![0u8; nitems * info.typesize];
    let t0 = Instant::now();
    let n = tessera_core::getitem(&packed, start, nitems, &mut raw)
        .with_context(|| format!("reading items {}..{}", start, start + nitems))?;
    let elapsed = t0.elapsed();
    raw.truncate(n);

    eprintln!(
        "  decoded {} items ({}) in {:.3}ms",
        nitems,
        human_bytes(n as u64),
        elapsed.as_secs_f64() * 1000.0
    );

    match output {
        Some(path) => {
            std::fs::write(&path, &raw)?;
            eprintln!("  written to {:?}", path);
        }
        None => {
            println!("--- items {}..{} ({} bytes) ---", start, start + nitems, raw.len());
            print_hex_dump(&raw);
        }
    }
    Ok(())
}

fn run_bench(engine: &EngineArgs, input: Option<PathBuf>, size: usize, iterations: u32) -> anyhow::Result<()> {
    let src = match input {
        Some(path) => read_input(&path)?,
        None => synthetic_samples(size),
    };
    let iterations = iterations.max(1);
    let digest = xxh3_64(&src);

    eprintln!(
        "benchmarking {} x {} with {} at level {}, {} threads...",
        iterations,
        human_bytes(src.len() as u64),
        engine.compressor,
        engine.clevel,
        engine.nthreads
    );

    let mut packed = Vec::new();
    let t0 = Instant::now();
    for _ in 0..iterations {
        packed = engine.pack(&src)?;
    }
    let compress_secs = t0.elapsed().as_secs_f64() / iterations as f64;

    let mut raw = Vec::new();
    let t0 = Instant::now();
    for _ in 0..iterations {
        raw = engine.unpack(&packed)?;
    }
    let decompress_secs = t0.elapsed().as_secs_f64() / iterations as f64;

    let verified = xxh3_64(&raw) == digest;
    if !verified {
        anyhow::bail!("round trip mismatch: xxh3 {:016x} != {:016x}", xxh3_64(&raw), digest);
    }
    info!("bench: verified {} bytes, xxh3 {:016x}", raw.len(), digest);

    let (nbytes, cbytes, blocksize) = cbuffer_sizes(&packed);
    println!();
    println!("=== Round-trip Benchmark ===");
    println!("  shuffle impl : {}", implementation_name());
    println!("  raw size     : {}", human_bytes(nbytes as u64));
    println!("  compressed   : {}", human_bytes(cbytes as u64));
    println!("  ratio        : {:.2}x", nbytes as f64 / cbytes.max(1) as f64);
    println!("  block size   : {}", human_bytes(blocksize as u64));
    println!("  compress     : {}", throughput(nbytes, compress_secs));
    println!("  decompress   : {}", throughput(nbytes, decompress_secs));
    println!("  xxh3         : {:016x} (verified)", digest);
    Ok(())
}

fn run_codecs(json: bool) -> anyhow::Result<()> {
    let all = descriptors();
    if json {
        println!("{}", serde_json::to_string_pretty(&all)?);
        return Ok(());
    }
    println!(
        "  {:>4}  {:<8}  {:<8}  {:<8}  {:>6}  {}",
        "code", "name", "library", "version", "format", "compiled"
    );
    println!("  {}", "-".repeat(52));
    for d in &all {
        println!(
            "  {:>4}  {:<8}  {:<8}  {:<8}  {:>6}  {}",
            d.code,
            d.name,
            d.library,
            d.version.unwrap_or("-"),
            d.format,
            if d.compiled_in { "yes" } else { "no" }
        );
    }
    println!();
    println!("  tessera      : {}", version_string());
    println!("  shuffle impl : {}", implementation_name());
    Ok(())
}

// ── Entry point ────────────────────────────────────────────────────────────

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();
    let engine = cli.engine;
    match cli.command {
        Commands::Compress { input, output } => {
            engine.configure()?;
            run_compress(&engine, input, output)
        }
        Commands::Decompress { input, output } => {
            engine.configure()?;
            run_decompress(&engine, input, output)
        }
        Commands::Inspect { file, json } => run_inspect(file, json),
        Commands::Getitem {
            file,
            start,
            nitems,
            output,
        } => run_getitem(file, start, nitems, output),
        Commands::Bench {
            input,
            size,
            iterations,
        } => {
            engine.configure()?;
            run_bench(&engine, input, size, iterations)
        }
        Commands::Codecs { json } => run_codecs(json),
    }
}
