//! CLI tool for reading files through the direct-read VFS module.
//!
//! This tool opens a file through the `rdirect` module, performs one read
//! with direct I/O and writes the received bytes to stdout or a file.

use blkpath::ResolveDevice;
use clap::Parser;
use rdirect::{align_slice, Mode, OpenPolicy, Options, RDirect, Registry, MODULE_NAME};
use std::fs::File;
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Read a file bypassing the page cache.
///
/// The read is issued into the block-aligned part of the buffer and the
/// received bytes are moved back to its start.
#[derive(Parser, Debug)]
#[command(name = "rdirect")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the file to read
    path: PathBuf,

    /// Byte offset to start reading from
    #[arg(short, long, default_value = "0")]
    offset: u64,

    /// Buffer length in bytes (default: file size from offset)
    #[arg(short, long)]
    length: Option<usize>,

    /// Operating mode: passthrough or standalone
    #[arg(short, long, default_value = "passthrough")]
    mode: Mode,

    /// Device block size (power of two)
    #[arg(short, long, default_value = "512")]
    block_size: usize,

    /// Reopen without O_DIRECT in standalone mode
    #[arg(long)]
    no_direct: bool,

    /// Terminate the data with a NUL byte (standalone mode)
    #[arg(long)]
    nul_terminate: bool,

    /// Open without forcing O_DIRECT (passthrough reads stay in the page cache)
    #[arg(long)]
    buffered_open: bool,

    /// Fail when rounding leaves less than one block to read
    #[arg(long)]
    strict: bool,

    /// Use the submit/receive interface instead of the synchronous read
    #[arg(long = "async")]
    use_async: bool,

    /// Enable verbose output (block device, aligned view, byte count)
    #[arg(short, long)]
    verbose: bool,

    /// Output file path (default: stdout)
    #[arg(short = 'O', long)]
    output: Option<PathBuf>,
}

fn main() {
    let args = Args::parse();

    let default_level = if args.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(io::stderr)
        .init();

    if let Err(e) = run(&args) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run(args: &Args) -> io::Result<()> {
    let options = Options::new()
        .with_mode(args.mode)
        .with_block_size(args.block_size)
        .with_direct_io(!args.no_direct)
        .with_nul_terminate(args.nul_terminate)
        .with_strict_alignment(args.strict);

    let policy = if args.buffered_open {
        OpenPolicy::disabled()
    } else {
        OpenPolicy::new()
    };
    let rdirect = Arc::new(RDirect::new(options)?.with_policy(policy));

    let mut registry = Registry::new();
    registry.register(MODULE_NAME, rdirect.clone())?;
    let module = registry
        .get(MODULE_NAME)
        .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "module not registered"))?;

    // Determine the length to read
    let file_size = File::open(&args.path)?.metadata()?.len();
    let length = match args.length {
        Some(len) => len,
        None => file_size.saturating_sub(args.offset) as usize,
    };

    if args.verbose {
        print_verbose_info(args, length);
    }

    let file = module.openat(&args.path, libc::O_RDONLY, 0)?;

    // Prepare buffer
    let mut buf = vec![0u8; length];

    if args.verbose {
        let usable = length.saturating_sub(usize::from(args.nul_terminate && args.mode == Mode::Standalone));
        let options = rdirect.options();
        let view = align_slice(&buf[..usable], options.block_size, options.mode.length_policy());
        eprintln!(
            "Aligned view: rounding {} bytes, transfer {} bytes",
            view.rounding, view.length
        );
    }

    // Perform the read
    let bytes_read = if args.use_async {
        let req = module.pread_send(&file, &mut buf, args.offset);
        req.wait()?
    } else {
        module.pread(&file, &mut buf, args.offset)?
    };

    if args.verbose {
        eprintln!();
        eprintln!("Read {} bytes", bytes_read);
    }

    // Truncate buffer to actual bytes read
    buf.truncate(bytes_read);

    // Write output
    if let Some(output_path) = &args.output {
        let mut output_file = File::create(output_path)?;
        output_file.write_all(&buf)?;
        if args.verbose {
            eprintln!("Output written to: {}", output_path.display());
        }
    } else {
        let stdout = io::stdout();
        let mut handle = stdout.lock();
        handle.write_all(&buf)?;
    }

    Ok(())
}

fn print_verbose_info(args: &Args, length: usize) {
    eprintln!("File: {}", args.path.display());
    eprintln!("Offset: {} (0x{:x})", args.offset, args.offset);
    eprintln!("Length: {} (0x{:x})", length, length);
    eprintln!("Mode: {}", args.mode);
    eprintln!("Block size: {}", args.block_size);

    match args.path.resolve_device() {
        Ok(device) => {
            eprintln!("Block device: {}", device.display());
        }
        Err(e) => {
            eprintln!("Block device: (unable to resolve: {})", e);
        }
    }
}
