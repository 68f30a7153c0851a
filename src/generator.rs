//! Random IPv4 input files for benchmarks and manual runs.

use std::collections::HashSet;
use std::fmt::Write as _;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::net::Ipv4Addr;
use std::path::Path;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::info;

/// Largest distinct pool; the pool and its dedup set live in memory.
pub const MAX_DISTINCT: u32 = 1 << 24;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GenerateOptions {
    /// Stop once at least this many bytes were written
    pub size: u64,
    /// Draw addresses from a pool of this many distinct ones instead of the
    /// whole IPv4 space. The pool is written in full first, so a large enough
    /// file holds exactly `distinct` distinct lines.
    pub distinct: Option<u32>,
    pub seed: Option<u64>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GenerateStats {
    pub lines: u64,
    pub bytes: u64,
}

/// Write a random IPv4 file at `path`.
pub fn generate(path: &Path, options: &GenerateOptions) -> io::Result<GenerateStats> {
    let mut out = BufWriter::new(File::create(path)?);
    let stats = generate_to(&mut out, options)?;
    out.flush()?;
    info!(
        path = %path.display(),
        lines = stats.lines,
        bytes = stats.bytes,
        "generated input"
    );
    Ok(stats)
}

/// Write newline-terminated random IPv4 addresses to `out` until `options.size` is reached.
pub fn generate_to<W: Write>(out: &mut W, options: &GenerateOptions) -> io::Result<GenerateStats> {
    if let Some(n) = options.distinct.filter(|&n| n > MAX_DISTINCT) {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("distinct pool of {n} addresses exceeds the maximum of {MAX_DISTINCT}"),
        ));
    }
    let mut rng = match options.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    let pool = options.distinct.map(|n| address_pool(&mut rng, n));

    let mut stats = GenerateStats::default();
    let mut line = String::with_capacity(16);
    while stats.bytes < options.size {
        let addr = match &pool {
            Some(pool) if pool.is_empty() => break,
            Some(pool) => match usize::try_from(stats.lines) {
                Ok(i) if i < pool.len() => pool[i],
                _ => pool[rng.gen_range(0..pool.len())],
            },
            None => Ipv4Addr::from(rng.gen::<u32>()),
        };

        line.clear();
        // writing to a String cannot fail
        let _ = writeln!(line, "{addr}");
        out.write_all(line.as_bytes())?;
        stats.lines += 1;
        stats.bytes += line.len() as u64;
    }
    Ok(stats)
}

fn address_pool(rng: &mut StdRng, n: u32) -> Vec<Ipv4Addr> {
    let mut seen = HashSet::with_capacity(n as usize);
    let mut pool = Vec::with_capacity(n as usize);
    while pool.len() < n as usize {
        let addr = rng.gen::<u32>();
        if seen.insert(addr) {
            pool.push(Ipv4Addr::from(addr));
        }
    }
    pool
}
