//! Workers: turn chunks into per-chunk sketches.
//!
//! A chunk arrives owning the pooled buffer the reader filled; dropping the
//! chunk hands that buffer back to the pool.

use tracing::{debug, warn};

use crate::barrier::Party;
use crate::cancel::CancellationToken;
use crate::config::KeyMode;
use crate::error::{Error, Stage};
use crate::queue::{Consumer, Get};
use crate::reader::Chunk;
use crate::sketch::Sketch;

/// Lines scanned between two cancellation checks.
pub const CANCEL_POLL_LINES: u64 = 4096;

/// Outcome of one unit of work, consumed exactly once by the aggregator.
#[derive(Debug)]
pub struct ScanResult<S> {
    /// Sequence number of the scanned chunk; `None` for failures outside a chunk
    pub chunk: Option<u64>,
    /// Keys inserted into `sketch`
    pub lines: u64,
    pub sketch: Option<S>,
    pub error: Option<Error>,
}

impl<S> ScanResult<S> {
    pub fn ok(chunk: u64, lines: u64, sketch: S) -> Self {
        Self {
            chunk: Some(chunk),
            lines,
            sketch: Some(sketch),
            error: None,
        }
    }

    /// A failure carrying no sketch, e.g. the reader's own fatal error.
    pub fn failed(chunk: Option<u64>, error: Error) -> Self {
        Self {
            chunk,
            lines: 0,
            sketch: None,
            error: Some(error),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

/// Per-worker totals, logged when the worker exits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkerStats {
    pub chunks: u64,
    pub lines: u64,
    pub failed: u64,
}

/// Scan every line of `chunk` into a fresh sketch.
pub fn process_chunk<S: Sketch>(
    chunk: &Chunk,
    key_mode: KeyMode,
    cancel: &CancellationToken,
) -> ScanResult<S> {
    let mut sketch = S::default();
    let mut inserted = 0u64;

    for (idx, line) in lines(chunk.bytes()).enumerate() {
        let line_no = idx as u64 + 1;
        if line_no % CANCEL_POLL_LINES == 0 && cancel.is_cancelled() {
            return ScanResult {
                chunk: Some(chunk.seq),
                lines: inserted,
                sketch: Some(sketch),
                error: Some(Error::Cancelled {
                    stage: Stage::Worker,
                }),
            };
        }
        if line.is_empty() {
            continue;
        }

        match key_mode {
            KeyMode::Raw => sketch.insert(line),
            KeyMode::Ipv4 => match compact_ipv4(line) {
                Some(octets) => sketch.insert(&octets),
                None => {
                    let error = Error::Processing {
                        chunk: chunk.seq,
                        line: line_no,
                        detail: format!(
                            "not an IPv4 address: {:?}",
                            String::from_utf8_lossy(line)
                        ),
                    };
                    return ScanResult::failed(Some(chunk.seq), error);
                }
            },
        }
        inserted += 1;
    }

    ScanResult::ok(chunk.seq, inserted, sketch)
}

/// Pull chunks until the queue closes or the scan is cancelled, sending one
/// result per chunk through `results`.
pub fn run_worker<S: Sketch>(
    id: usize,
    chunks: &Consumer<Chunk>,
    results: Party<'_, ScanResult<S>>,
    key_mode: KeyMode,
    cancel: &CancellationToken,
) -> WorkerStats {
    let mut stats = WorkerStats::default();

    loop {
        let chunk = match chunks.get(cancel) {
            Get::Item(chunk) => chunk,
            Get::Closed => break,
            Get::Cancelled => {
                debug!(worker = id, "cancelled while waiting for a chunk");
                let _ = results.send(ScanResult::failed(
                    None,
                    Error::Cancelled {
                        stage: Stage::Worker,
                    },
                ));
                break;
            }
        };

        let result = process_chunk::<S>(&chunk, key_mode, cancel);
        // the buffer goes back to the pool before the result is queued
        drop(chunk);

        stats.chunks += 1;
        stats.lines += result.lines;
        let cancelled = result.error.as_ref().is_some_and(Error::is_cancelled);
        if let Some(err) = &result.error {
            stats.failed += 1;
            warn!(worker = id, chunk = ?result.chunk, %err, "chunk failed");
        }
        if results.send(result).is_err() || cancelled {
            break;
        }
    }

    debug!(
        worker = id,
        chunks = stats.chunks,
        lines = stats.lines,
        failed = stats.failed,
        "worker finished"
    );
    stats
}

/// Lines of `data` split on `\n`, each without its terminator and a trailing
/// `\r`. A terminator at the very end does not start another line.
fn lines(data: &[u8]) -> impl Iterator<Item = &[u8]> {
    let body = data.strip_suffix(b"\n").unwrap_or(data);
    let mut split = body.split(|&b| b == b'\n');
    if data.is_empty() {
        split.next();
    }
    split.map(|line| line.strip_suffix(b"\r").unwrap_or(line))
}

/// Compact a dotted-quad IPv4 address into its 4 octets.
fn compact_ipv4(line: &[u8]) -> Option<[u8; 4]> {
    let mut octets = [0u8; 4];
    let mut parts = line.split(|&b| b == b'.');
    for octet in &mut octets {
        let part = parts.next()?;
        if part.is_empty() || part.len() > 3 || !part.iter().all(u8::is_ascii_digit) {
            return None;
        }
        let value = part
            .iter()
            .fold(0u16, |acc, &d| acc * 10 + u16::from(d - b'0'));
        *octet = u8::try_from(value).ok()?;
    }
    if parts.next().is_some() {
        return None;
    }
    Some(octets)
}
