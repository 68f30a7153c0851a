//! Chunk reader: splits a byte stream into line-aligned chunks.
//!
//! Each iteration reads up to `chunk_size` raw bytes into a pooled buffer
//! that already holds the previous iteration's leftover, then cuts the
//! buffer after the last `\n`. The terminator is searched only within the
//! last `lookback` bytes of the raw read; a full read with no terminator in
//! that window is an error rather than a silently split line. The bytes after
//! the cut become the next leftover, so concatenating all chunks reproduces
//! the input exactly.

use std::fs::File;
use std::io::{ErrorKind, Read};
use std::path::Path;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::buffer_pool::{BufferPool, PooledBuffer};
use crate::cancel::CancellationToken;
use crate::config::{ScanConfig, TrailingLine};
use crate::error::{Error, Result, Stage};
use crate::queue::Producer;

/// Line-aligned bytes handed to exactly one worker.
#[derive(Debug)]
pub struct Chunk {
    /// Position in emission order, starting at 0
    pub seq: u64,
    /// Offset of the first byte within the input
    pub offset: u64,
    data: PooledBuffer,
}

impl Chunk {
    pub fn bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Totals of a completed read.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReadStats {
    pub chunks: u64,
    /// Bytes emitted in chunks
    pub bytes: u64,
}

pub struct ChunkReader {
    chunk_size: usize,
    lookback: usize,
    trailing_line: TrailingLine,
    pool: Arc<BufferPool>,
}

impl ChunkReader {
    /// Reader drawing chunk buffers from `pool`, whose buffers must hold
    /// `chunk_size + lookback` bytes to avoid reallocation.
    pub fn new(config: &ScanConfig, pool: Arc<BufferPool>) -> Self {
        Self {
            chunk_size: config.chunk_size,
            lookback: config.lookback,
            trailing_line: config.trailing_line,
            pool,
        }
    }

    /// Open `path` and emit its chunks onto `chunks`.
    pub fn read_chunks(
        &self,
        path: &Path,
        chunks: &Producer<Chunk>,
        cancel: &CancellationToken,
    ) -> Result<ReadStats> {
        let file = File::open(path).map_err(|source| Error::Open {
            path: path.to_path_buf(),
            source,
        })?;
        self.read_from(file, chunks, cancel)
    }

    /// Emit the chunks of `source` onto `chunks` until end of stream, error or cancellation.
    pub fn read_from<R: Read>(
        &self,
        mut source: R,
        chunks: &Producer<Chunk>,
        cancel: &CancellationToken,
    ) -> Result<ReadStats> {
        let mut stats = ReadStats::default();
        let mut leftover: Vec<u8> = Vec::with_capacity(self.lookback);
        // bytes consumed from `source` so far
        let mut consumed = 0u64;

        loop {
            if cancel.is_cancelled() {
                warn!(
                    offset = consumed,
                    leftover = leftover.len(),
                    "reader cancelled"
                );
                return Err(Error::Cancelled {
                    stage: Stage::Reader,
                });
            }

            let mut buf = self.pool.acquire();
            buf.extend_from_slice(&leftover);
            let start = buf.len();
            let chunk_offset = consumed - start as u64;
            leftover.clear();

            let n = fill(&mut source, &mut buf, self.chunk_size)
                .map_err(|source| Error::Read {
                    offset: consumed,
                    source,
                })?;
            consumed += n as u64;

            // a short read means the source is exhausted
            if n == self.chunk_size {
                match last_terminator(&buf[start..], self.lookback) {
                    Some(idx) => {
                        let cut = start + idx + 1;
                        leftover.extend_from_slice(&buf[cut..]);
                        buf.truncate(cut);
                        self.emit(buf, chunk_offset, &mut stats, chunks, cancel)?;
                        continue;
                    }
                    None if !is_exhausted(&mut source, consumed)? => {
                        return Err(Error::LineTooLong {
                            offset: consumed,
                            lookback: self.lookback,
                        });
                    }
                    // the unterminated tail ends exactly at the read boundary
                    None => {}
                }
            }

            self.finish(buf, chunk_offset, &mut stats, chunks, cancel)?;
            info!(chunks = stats.chunks, bytes = stats.bytes, "reader finished");
            return Ok(stats);
        }
    }

    /// Emit what remains once the source is exhausted, applying the trailing line policy.
    fn finish(
        &self,
        mut buf: PooledBuffer,
        offset: u64,
        stats: &mut ReadStats,
        chunks: &Producer<Chunk>,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let complete = buf.iter().rposition(|&b| b == b'\n').map_or(0, |idx| idx + 1);
        if complete < buf.len() && self.trailing_line == TrailingLine::Drop {
            warn!(
                offset = offset + complete as u64,
                len = buf.len() - complete,
                "dropping unterminated trailing line"
            );
            buf.truncate(complete);
        }
        if buf.is_empty() {
            return Ok(());
        }
        self.emit(buf, offset, stats, chunks, cancel)
    }

    fn emit(
        &self,
        data: PooledBuffer,
        offset: u64,
        stats: &mut ReadStats,
        chunks: &Producer<Chunk>,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let chunk = Chunk {
            seq: stats.chunks,
            offset,
            data,
        };
        let len = chunk.len() as u64;
        debug!(seq = chunk.seq, offset, len, "emitting chunk");
        if chunks.put(chunk, cancel).is_err() {
            // cancelled, or every worker is gone
            return Err(Error::Cancelled {
                stage: Stage::Reader,
            });
        }
        stats.chunks += 1;
        stats.bytes += len;
        Ok(())
    }
}

/// Append up to `limit` bytes of `source` to `buf`, retrying short reads.
/// Returns fewer than `limit` bytes only at end of stream.
fn fill<R: Read>(source: &mut R, buf: &mut Vec<u8>, limit: usize) -> std::io::Result<usize> {
    source.take(limit as u64).read_to_end(buf)
}

/// Index of the last `\n` within the trailing `lookback` bytes of `raw`.
#[inline]
fn last_terminator(raw: &[u8], lookback: usize) -> Option<usize> {
    let window = raw.len().saturating_sub(lookback);
    raw[window..]
        .iter()
        .rposition(|&b| b == b'\n')
        .map(|idx| window + idx)
}

/// Whether `source` has no byte left. Only used right before failing, so the
/// probed byte is not kept.
fn is_exhausted<R: Read>(source: &mut R, offset: u64) -> Result<bool> {
    let mut probe = [0u8; 1];
    loop {
        match source.read(&mut probe) {
            Ok(n) => return Ok(n == 0),
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(source) => return Err(Error::Read { offset, source }),
        }
    }
}
