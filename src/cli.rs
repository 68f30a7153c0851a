use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

use crate::config::{KeyMode, ScanConfig, TrailingLine, DEFAULT_LOOKBACK};
use crate::generator::MAX_DISTINCT;

#[derive(Parser, Debug)]
#[command(
    name = "cardinality-scan",
    version,
    about = "Approximate count of distinct lines in very large files"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Write logs to this file instead of stderr
    #[arg(long, global = true)]
    pub log_file: Option<PathBuf>,

    /// Log filter, e.g. "info" or "cardinality_scan=debug" (overrides RUST_LOG)
    #[arg(long, global = true)]
    pub log_level: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Estimate the number of distinct lines of a file
    Count(CountArgs),

    /// Write a file of random IPv4 addresses, one per line
    Generate {
        /// Output file
        path: PathBuf,
        /// Target size, e.g. "512MiB" or "100G"
        #[arg(long, value_parser = parse_size)]
        size: u64,
        /// Draw from this many distinct addresses only (at most 2^24)
        #[arg(long, value_parser = clap::value_parser!(u32).range(..=i64::from(MAX_DISTINCT)))]
        distinct: Option<u32>,
        /// Seed for reproducible output
        #[arg(long)]
        seed: Option<u64>,
    },
}

#[derive(clap::Args, Debug)]
pub struct CountArgs {
    /// Input file, one key per line
    pub path: PathBuf,

    /// Raw bytes read per chunk, e.g. "64MiB"
    #[arg(long, value_parser = parse_size)]
    pub chunk_size: Option<u64>,

    /// Worker threads (default: logical CPUs)
    #[arg(long)]
    pub workers: Option<usize>,

    /// Chunks buffered between the reader and the workers (default: workers)
    #[arg(long)]
    pub queue_capacity: Option<usize>,

    /// Trailing bytes of each read searched for a line terminator
    #[arg(long, default_value_t = DEFAULT_LOOKBACK)]
    pub lookback: usize,

    /// What to do with a final line lacking a terminator
    #[arg(long, value_enum, default_value_t = TrailingLine::Emit)]
    pub trailing_line: TrailingLine,

    /// How lines are turned into keys
    #[arg(long, value_enum, default_value_t = KeyMode::Raw)]
    pub key_mode: KeyMode,

    #[arg(long, value_enum, default_value_t = Format::Text)]
    pub format: Format,

    /// Cancel the scan after this many seconds
    #[arg(long)]
    pub timeout: Option<f64>,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Text,
    Json,
}

impl CountArgs {
    pub fn scan_config(&self) -> Result<ScanConfig, String> {
        let mut config = ScanConfig::default()
            .with_lookback(self.lookback)
            .with_trailing_line(self.trailing_line)
            .with_key_mode(self.key_mode);
        if let Some(size) = self.chunk_size {
            let size = usize::try_from(size)
                .map_err(|_| format!("chunk size {size} does not fit in memory"))?;
            config = config.with_chunk_size(size);
        }
        if let Some(workers) = self.workers {
            config = config.with_workers(workers);
        }
        if let Some(capacity) = self.queue_capacity {
            config = config.with_queue_capacity(capacity);
        }
        Ok(config)
    }
}

/// Parse a byte size with an optional binary suffix: `B`, `K`/`KB`/`KiB`,
/// `M`/`MB`/`MiB`, `G`/`GB`/`GiB` (case-insensitive).
pub fn parse_size(s: &str) -> Result<u64, String> {
    let s = s.trim();
    let split = s
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(s.len());
    let (digits, suffix) = s.split_at(split);
    if digits.is_empty() {
        return Err(format!("invalid size {s:?}: expected a number"));
    }
    let value: u64 = digits
        .parse()
        .map_err(|err| format!("invalid size {s:?}: {err}"))?;
    let shift = match suffix.trim().to_ascii_lowercase().as_str() {
        "" | "b" => 0,
        "k" | "kb" | "kib" => 10,
        "m" | "mb" | "mib" => 20,
        "g" | "gb" | "gib" => 30,
        other => return Err(format!("invalid size {s:?}: unknown unit {other:?}")),
    };
    value
        .checked_mul(1 << shift)
        .ok_or_else(|| format!("invalid size {s:?}: too large"))
}
