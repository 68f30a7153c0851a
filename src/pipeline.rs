//! Wiring of the reader, the worker pool and the aggregator.
//!
//! ```text
//! reader --[chunk queue]--> workers --[result queue]--> aggregator
//! ```
//!
//! All tasks run inside one [`std::thread::scope`]: the reader and the
//! workers on their own threads, the aggregator on the caller's. The reader
//! and every worker are parties of a [`CompletionBarrier`] that owns the
//! result queue's master producer, so the aggregator sees the queue close only
//! once nobody can produce a result anymore.

use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::thread;
use std::time::Instant;

use serde::Serialize;
use tracing::info;

use crate::aggregator::Aggregator;
use crate::barrier::CompletionBarrier;
use crate::buffer_pool::BufferPool;
use crate::cancel::CancellationToken;
use crate::config::ScanConfig;
use crate::error::{Error, Result, Stage};
use crate::queue;
use crate::reader::ChunkReader;
use crate::sketch::{IpSketch, Sketch};
use crate::worker::{run_worker, ScanResult};

/// Summary of a completed scan.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScanReport {
    /// Approximate number of distinct keys
    pub estimate: u64,
    pub chunks: u64,
    /// Keys inserted, duplicates included
    pub lines: u64,
    pub bytes: u64,
    pub workers: usize,
    pub elapsed_secs: f64,
}

/// Count the distinct lines of the file at `path` with the default sketch.
pub fn count_distinct(
    path: &Path,
    config: &ScanConfig,
    cancel: &CancellationToken,
) -> Result<ScanReport> {
    run::<IpSketch>(path, config, cancel)
}

/// Scan the file at `path`.
pub fn run<S: Sketch>(
    path: &Path,
    config: &ScanConfig,
    cancel: &CancellationToken,
) -> Result<ScanReport> {
    let file = File::open(path).map_err(|source| Error::Open {
        path: path.to_path_buf(),
        source,
    })?;
    info!(path = %path.display(), "scanning");
    run_source::<S, _>(file, config, cancel)
}

/// Scan any byte source.
pub fn run_source<S, R>(
    source: R,
    config: &ScanConfig,
    cancel: &CancellationToken,
) -> Result<ScanReport>
where
    S: Sketch,
    R: Read + Send,
{
    config.validate()?;
    let start = Instant::now();
    info!(
        chunk_size = config.chunk_size,
        workers = config.workers,
        queue_capacity = config.queue_capacity,
        lookback = config.lookback,
        "starting scan"
    );

    // every chunk in flight or queued holds a buffer
    let pool = BufferPool::new(
        config.chunk_size + config.lookback,
        config.queue_capacity + config.workers + 1,
    );
    let reader = ChunkReader::new(config, pool);

    let (chunk_tx, chunk_rx) = queue::bounded(config.queue_capacity);
    let (result_tx, result_rx) = queue::bounded::<ScanResult<S>>(config.workers);
    let barrier = CompletionBarrier::new(config.workers + 1, result_tx);

    let (read, aggregate) = thread::scope(|s| {
        let reader_party = barrier.join();
        let reader = &reader;
        let read = s.spawn(move || {
            let read = reader.read_from(source, &chunk_tx, cancel);
            // no more chunks: workers drain what is queued and exit
            drop(chunk_tx);
            match read {
                Ok(stats) => Some(stats),
                Err(err) => {
                    // the aggregator owns the verdict on reader failures too
                    let _ = reader_party.send(ScanResult::failed(None, err));
                    None
                }
            }
        });

        for id in 0..config.workers {
            let party = barrier.join();
            let chunk_rx = chunk_rx.clone();
            s.spawn(move || run_worker::<S>(id, &chunk_rx, party, config.key_mode, cancel));
        }
        drop(chunk_rx);

        let aggregate = Aggregator::<S>::new().drain(&result_rx, cancel);
        (read.join(), aggregate)
    });

    let aggregate = aggregate?;
    let stats = match read {
        Ok(stats) => stats.ok_or(Error::Cancelled {
            stage: Stage::Reader,
        })?,
        Err(panic) => std::panic::resume_unwind(panic),
    };

    let report = ScanReport {
        estimate: aggregate.estimate,
        chunks: aggregate.chunks,
        lines: aggregate.lines,
        bytes: stats.bytes,
        workers: config.workers,
        elapsed_secs: start.elapsed().as_secs_f64(),
    };
    info!(
        estimate = report.estimate,
        chunks = report.chunks,
        lines = report.lines,
        bytes = report.bytes,
        elapsed_secs = report.elapsed_secs,
        "scan finished"
    );
    Ok(report)
}
