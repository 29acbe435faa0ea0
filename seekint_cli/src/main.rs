use std::fmt::Display;
use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use log::{debug, info, warn};
use serde::Serialize;

use seekint_codecs::{codec_by_name, open_reader};
use seekint_core::format::DEFAULT_BLOCK_SIZE;
use seekint_core::{
    BlockDescriptor, ByteOrder, ContainerHeader, IntBlock, IntReader, IntWidth, PackedInt,
    ReaderStats, Writer, WriterOptions,
};

// ── CLI definition ─────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(
    name = "seekint",
    about = "Compress fixed-width integer arrays into SEEKINT1 containers \
             and read them back at random offsets",
    version
)]
struct Cli {
    /// Raise log verbosity (-v debug, -vv trace). RUST_LOG overrides.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum OrderArg {
    Big,
    Little,
}

impl From<OrderArg> for ByteOrder {
    fn from(o: OrderArg) -> Self {
        match o {
            OrderArg::Big => ByteOrder::Big,
            OrderArg::Little => ByteOrder::Little,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Pack a raw integer file into a SEEKINT1 container
    Compress {
        /// Raw integers, already in the byte order given by --byte-order ("-" reads stdin)
        input: PathBuf,
        /// Destination container
        output: PathBuf,
        /// Codec to use: passthrough | zstd | lz4 | deflate | xz
        #[arg(short, long, default_value = "deflate")]
        codec: String,
        /// Compression level for zstd (1-22), deflate (0-9) or xz (0-9)
        #[arg(short, long)]
        level: Option<i32>,
        /// Raw bytes per block
        #[arg(short, long, default_value_t = DEFAULT_BLOCK_SIZE)]
        block_size: u32,
        /// Integer width in bits: 16 | 32 | 64
        #[arg(short, long, default_value_t = 32)]
        width: u32,
        /// Byte order of the integers in the input
        #[arg(long, value_enum, default_value = "big")]
        byte_order: OrderArg,
    },
    /// Expand a container back to its raw integer bytes
    Decompress {
        /// Source container
        input: PathBuf,
        /// Destination file ("-" writes to stdout)
        output: PathBuf,
    },
    /// Print header metadata and block index statistics
    Inspect {
        /// Container to inspect
        file: PathBuf,
        /// Print per-block details
        #[arg(long)]
        blocks: bool,
        /// Emit a JSON report instead of text
        #[arg(long)]
        json: bool,
    },
    /// Print `count` integers starting at integer `offset`
    ///
    /// Only the blocks covering the range are read from disk.
    ReadInts {
        file: PathBuf,
        /// Zero-based integer offset
        #[arg(short, long)]
        offset: u64,
        /// Number of integers to print
        #[arg(short = 'n', long, default_value_t = 16)]
        count: usize,
    },
    /// Benchmark random range reads
    Bench {
        file: PathBuf,
        /// Number of random reads
        #[arg(short, long, default_value_t = 1000)]
        count: u64,
        /// Integers per read
        #[arg(short, long, default_value_t = 64)]
        span: usize,
        /// Fixed random seed for reproducibility
        #[arg(long, default_value_t = 42)]
        seed: u64,
    },
}

// ── Helpers ────────────────────────────────────────────────────────────────

fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default)).init();
}

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

fn per_second(bytes: u64, secs: f64) -> String {
    if secs > 0.0 {
        format!("{}/s", human_bytes((bytes as f64 / secs) as u64))
    } else {
        "n/a".to_string()
    }
}

/// Append the raw bytes of `block` in the container's byte order.
fn encode_block(block: &IntBlock, order: ByteOrder, out: &mut Vec<u8>) {
    match block {
        IntBlock::I16(v) => v.iter().for_each(|&x| x.encode_into(order, out)),
        IntBlock::I32(v) => v.iter().for_each(|&x| x.encode_into(order, out)),
        IntBlock::I64(v) => v.iter().for_each(|&x| x.encode_into(order, out)),
    }
}

fn print_range<T: PackedInt + Display>(
    reader: &mut IntReader,
    offset: u64,
    count: usize,
) -> anyhow::Result<()> {
    let values: Vec<T> = reader.read_vec(offset, count)?;
    let stdout = io::stdout();
    let mut out = stdout.lock();
    for (i, v) in values.iter().enumerate() {
        writeln!(out, "{}\t{}", offset + i as u64, v)?;
    }
    Ok(())
}

fn read_span(reader: &mut IntReader, offset: u64, span: usize) -> anyhow::Result<()> {
    match reader.header().int_width {
        IntWidth::W16 => drop(reader.read_vec::<i16>(offset, span)?),
        IntWidth::W32 => drop(reader.read_vec::<i32>(offset, span)?),
        IntWidth::W64 => drop(reader.read_vec::<i64>(offset, span)?),
    }
    Ok(())
}

#[derive(Serialize)]
struct InspectReport<'a> {
    file: &'a Path,
    header: &'a ContainerHeader,
    codec: &'static str,
    block_count: u64,
    int_count: u64,
    raw_bytes: u64,
    compressed_bytes: u64,
    file_bytes: u64,
    ratio: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    blocks: Option<&'a [BlockDescriptor]>,
}

#[derive(Serialize)]
struct BenchReport {
    reads: u64,
    span: usize,
    elapsed_secs: f64,
    latency_us: [u64; 5],
    stats: ReaderStats,
}

// ── Subcommand implementations ─────────────────────────────────────────────

/// Stream `src` into `writer` and seal it. Returns raw bytes read and blocks written.
fn pump(mut src: impl Read, mut writer: Writer, chunk: usize) -> anyhow::Result<(u64, u64)> {
    let mut buf = vec![0u8; chunk];
    let mut bytes_read = 0u64;
    loop {
        let n = src.read(&mut buf)?;
        if n == 0 {
            break;
        }
        writer.write_bytes(&buf[..n])?;
        bytes_read += n as u64;
    }
    let block_count = writer.finish()?;
    Ok((bytes_read, block_count))
}

fn run_compress(
    input: PathBuf,
    output: PathBuf,
    codec_name: &str,
    level: Option<i32>,
    options: WriterOptions,
) -> anyhow::Result<()> {
    let codec = codec_by_name(codec_name, level)?;
    let codec_display = codec.name();
    let block_size = options.block_size;
    options.validate()?;

    // input is opened before the output file exists
    let src: Box<dyn Read> = if input.to_str() == Some("-") {
        Box::new(io::stdin().lock())
    } else {
        let file = File::open(&input)
            .with_context(|| format!("opening input file {:?}", input))?;
        Box::new(BufReader::new(file))
    };

    let writer = Writer::create(&output, codec, options)
        .with_context(|| format!("creating output file {:?}", output))?;

    let t0 = Instant::now();
    let (bytes_read, block_count) = match pump(src, writer, block_size as usize) {
        Ok(counts) => counts,
        Err(e) => {
            if let Err(rm) = std::fs::remove_file(&output) {
                warn!("could not remove unfinished {:?}: {}", output, rm);
            }
            return Err(e.context(format!("writing {:?}", output)));
        }
    };
    let elapsed = t0.elapsed();

    let compressed_size = std::fs::metadata(&output)?.len();
    let ratio = bytes_read as f64 / compressed_size.max(1) as f64;

    eprintln!("  codec       : {}", codec_display);
    eprintln!("  block size  : {}", human_bytes(block_size as u64));
    eprintln!("  blocks      : {}", block_count);
    eprintln!("  raw size    : {}", human_bytes(bytes_read));
    eprintln!("  compressed  : {}", human_bytes(compressed_size));
    eprintln!("  ratio       : {:.2}x", ratio);
    eprintln!("  throughput  : {}", per_second(bytes_read, elapsed.as_secs_f64()));
    eprintln!("  elapsed     : {:.3}s", elapsed.as_secs_f64());
    Ok(())
}

fn run_decompress(input: PathBuf, output: PathBuf) -> anyhow::Result<()> {
    let mut reader = open_reader(&input)?;
    let order = reader.header().byte_order;

    let mut dst: Box<dyn Write> = if output.to_str() == Some("-") {
        Box::new(BufWriter::new(io::stdout().lock()))
    } else {
        let file = File::create(&output)
            .with_context(|| format!("creating output file {:?}", output))?;
        Box::new(BufWriter::new(file))
    };

    let t0 = Instant::now();
    let block_count = reader.block_count();
    let mut raw = Vec::with_capacity(reader.header().block_size as usize);
    let mut total_raw = 0u64;

    for seq in 0..block_count {
        raw.clear();
        encode_block(reader.block(seq)?, order, &mut raw);
        total_raw += raw.len() as u64;
        dst.write_all(&raw)?;
    }
    dst.flush()?;
    reader.close()?;

    let elapsed = t0.elapsed();
    eprintln!("  blocks      : {}", block_count);
    eprintln!("  integers    : {}", reader.len());
    eprintln!("  raw size    : {}", human_bytes(total_raw));
    eprintln!("  throughput  : {}", per_second(total_raw, elapsed.as_secs_f64()));
    eprintln!("  elapsed     : {:.3}s", elapsed.as_secs_f64());
    Ok(())
}

fn run_inspect(file: PathBuf, show_blocks: bool, json: bool) -> anyhow::Result<()> {
    let reader = open_reader(&file)?;
    let header = reader.header();
    let file_size = std::fs::metadata(&file)?.len();

    if json {
        let report = InspectReport {
            file: &file,
            header,
            codec: reader.codec_name()?,
            block_count: reader.block_count(),
            int_count: reader.len(),
            raw_bytes: reader.byte_len(),
            compressed_bytes: reader.compressed_size(),
            file_bytes: file_size,
            ratio: reader.ratio(),
            blocks: show_blocks.then(|| reader.entries()),
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("=== SEEKINT1 File: {:?} ===", file);
    println!();
    println!("  format version : {}", header.version);
    println!("  codec          : {} (id={})", reader.codec_name()?, header.codec_id);
    println!(
        "  integers       : {} x {}-bit, {:?} endian",
        reader.len(),
        header.int_width.bits(),
        header.byte_order
    );
    println!("  block size     : {}", human_bytes(header.block_size as u64));
    println!("  block count    : {}", reader.block_count());
    println!("  raw size       : {}", human_bytes(reader.byte_len()));
    println!("  compressed     : {}", human_bytes(reader.compressed_size()));
    println!("  file on disk   : {}", human_bytes(file_size));
    println!("  ratio          : {:.2}x", reader.ratio());
    println!("  flags          : 0x{:08x}", header.flags);

    if show_blocks {
        let width = header.int_width.bytes() as u64;
        println!();
        println!(
            "  {:>8}  {:>14}  {:>12}  {:>12}  {:>14}  {:>16}",
            "block", "file offset", "compressed", "raw", "first int", "checksum"
        );
        println!("  {}", "-".repeat(84));
        for e in reader.entries() {
            println!(
                "  {:>8}  {:>14}  {:>12}  {:>12}  {:>14}  {:016x}",
                e.seq,
                e.compressed_offset,
                human_bytes(e.compressed_len as u64),
                human_bytes(e.raw_len as u64),
                e.raw_offset / width,
                e.checksum
            );
        }
    }

    Ok(())
}

fn run_read_ints(file: PathBuf, offset: u64, count: usize) -> anyhow::Result<()> {
    let mut reader = open_reader(&file)?;
    debug!("reading {} integers at {} from {:?}", count, offset, file);

    let t0 = Instant::now();
    match reader.header().int_width {
        IntWidth::W16 => print_range::<i16>(&mut reader, offset, count)?,
        IntWidth::W32 => print_range::<i32>(&mut reader, offset, count)?,
        IntWidth::W64 => print_range::<i64>(&mut reader, offset, count)?,
    }
    let elapsed = t0.elapsed();

    let stats = reader.stats();
    eprintln!(
        "  decoded {} of {} blocks in {:.3}ms",
        stats.decodes,
        reader.block_count(),
        elapsed.as_secs_f64() * 1000.0
    );
    reader.close()?;
    Ok(())
}

fn run_bench(file: PathBuf, count: u64, span: usize, seed: u64) -> anyhow::Result<()> {
    let mut reader = open_reader(&file)?;
    let total = reader.len();

    if count == 0 {
        anyhow::bail!("--count must be at least 1");
    }
    if total < span as u64 || span == 0 {
        anyhow::bail!("container holds {} integers; cannot read spans of {}", total, span);
    }

    // Simple LCG for reproducible offsets
    let last_start = total - span as u64 + 1;
    let offsets: Vec<u64> = {
        let mut rng = seed;
        (0..count)
            .map(|_| {
                rng = rng.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
                (rng >> 33) % last_start
            })
            .collect()
    };

    info!(
        "benchmarking {} reads of {} integers across {} blocks",
        count,
        span,
        reader.block_count()
    );

    let t0 = Instant::now();
    let mut latencies_us: Vec<u64> = Vec::with_capacity(count as usize);
    for &offset in &offsets {
        let t = Instant::now();
        read_span(&mut reader, offset, span)?;
        latencies_us.push(t.elapsed().as_micros() as u64);
    }
    let elapsed = t0.elapsed();
    latencies_us.sort_unstable();

    let pick = |q: f64| latencies_us[((latencies_us.len() - 1) as f64 * q) as usize];
    let report = BenchReport {
        reads: count,
        span,
        elapsed_secs: elapsed.as_secs_f64(),
        latency_us: [pick(0.0), pick(0.5), pick(0.95), pick(0.99), pick(1.0)],
        stats: reader.stats(),
    };
    let bytes = count * span as u64 * reader.header().int_width.bytes() as u64;

    println!();
    println!("=== Random Range Read Benchmark ===");
    println!("  reads       : {} x {} integers", report.reads, report.span);
    println!("  elapsed     : {:.3}s", report.elapsed_secs);
    println!("  throughput  : {}", per_second(bytes, report.elapsed_secs));
    println!("  decodes     : {}", report.stats.decodes);
    println!("  cache hits  : {}", report.stats.cache_hits);
    println!("  latency:");
    for (label, us) in ["min", "p50", "p95", "p99", "max"].iter().zip(report.latency_us) {
        println!("    {:<4} : {} µs", label, us);
    }
    debug!("{}", serde_json::to_string(&report)?);

    Ok(())
}

// ── Entry point ────────────────────────────────────────────────────────────

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Compress {
            input,
            output,
            codec,
            level,
            block_size,
            width,
            byte_order,
        } => {
            let int_width = IntWidth::from_bits(width)
                .with_context(|| format!("unsupported width {}; use 16, 32 or 64", width))?;
            let options = WriterOptions {
                block_size,
                int_width,
                byte_order: byte_order.into(),
            };
            run_compress(input, output, &codec, level, options)
        }
        Commands::Decompress { input, output } => run_decompress(input, output),
        Commands::Inspect { file, blocks, json } => run_inspect(file, blocks, json),
        Commands::ReadInts {
            file,
            offset,
            count,
        } => run_read_ints(file, offset, count),
        Commands::Bench {
            file,
            count,
            span,
            seed,
        } => run_bench(file, count, span, seed),
    }
}
