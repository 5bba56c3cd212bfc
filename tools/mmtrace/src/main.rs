use clap::Parser;
use std::fs;
use std::io::{self, Read, Write};
use std::path::PathBuf;

use mmtrace::{logger, parse_trace, simulate, write_records, write_stats};
use mmtrace::{Overrides, TraceConfig, TraceError};
use softmmu::Policy;

#[derive(Parser)]
#[command(name = "mmtrace")]
#[command(about = "Replay a page access trace through the softmmu fault engine", long_about = None)]
struct Cli {
    /// Trace file, `-` for stdin
    trace: PathBuf,

    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Replacement policy (fifo, third-chance)
    #[arg(short, long)]
    policy: Option<Policy>,

    /// Resident frames
    #[arg(short, long)]
    frames: Option<usize>,

    /// Page size in bytes
    #[arg(long)]
    page_size: Option<usize>,

    /// Virtual pages in the range
    #[arg(long)]
    pages: Option<usize>,

    /// Drive the engine from real protection faults
    #[arg(long)]
    live: bool,

    /// Print fault statistics after the records
    #[arg(long)]
    stats: bool,

    /// Verbose output (repeat for more)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn read_trace(path: &PathBuf) -> Result<String, TraceError> {
    if path.as_os_str() == "-" {
        let mut src = String::new();
        io::stdin().read_to_string(&mut src)?;
        return Ok(src);
    }
    fs::read_to_string(path).map_err(|source| TraceError::Read {
        path: path.clone(),
        source,
    })
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    logger::init(logger::level_for(cli.verbose))?;

    let base = match &cli.config {
        Some(path) => TraceConfig::load(path)?,
        None => TraceConfig::default(),
    };
    let config = base.with_overrides(&Overrides {
        policy: cli.policy,
        frames: cli.frames,
        page_size: cli.page_size,
        pages: cli.pages,
    });
    log::info!(
        "{} frames, {} pages of {} bytes, policy {}",
        config.frames,
        config.pages,
        config.page_size,
        config.policy
    );

    let ops = parse_trace(&read_trace(&cli.trace)?)?;
    log::info!("{} accesses", ops.len());

    let stdout = io::stdout();
    let stats = if cli.live {
        live(&config, &ops)?
    } else {
        let report = simulate(&config, &ops)?;
        write_records(&mut stdout.lock(), &report.records)?;
        report.stats
    };

    if cli.stats {
        let mut out = stdout.lock();
        write_stats(&mut out, &stats)?;
        out.flush()?;
    }
    Ok(())
}

#[cfg(unix)]
fn live(config: &TraceConfig, ops: &[mmtrace::TraceOp]) -> Result<softmmu::FaultStats, TraceError> {
    mmtrace::live::replay(config, ops)
}

#[cfg(not(unix))]
fn live(_config: &TraceConfig, _ops: &[mmtrace::TraceOp]) -> Result<softmmu::FaultStats, TraceError> {
    Err(io::Error::new(io::ErrorKind::Unsupported, "--live needs a unix host").into())
}
