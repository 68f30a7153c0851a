use std::collections::HashSet;
use std::io::{self, Cursor, Read, Write};
use std::path::Path;
use std::sync::Mutex;
use std::thread;
use std::time::Duration;

use cardinality_scan::generator::{generate, GenerateOptions};
use cardinality_scan::{
    count_distinct, run, run_source, CancellationToken, Error, IpSketch, KeyMode, MergeError,
    ScanConfig, Sketch, Stage, TrailingLine,
};
use tempfile::NamedTempFile;
use test_case::test_case;

const THREE_IPS: &[u8] = b"192.168.1.1\n192.168.1.2\n192.168.1.3\n";

fn file_with(content: &[u8]) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(content).unwrap();
    file.flush().unwrap();
    file
}

fn config(chunk_size: usize, workers: usize) -> ScanConfig {
    ScanConfig::default()
        .with_chunk_size(chunk_size)
        .with_workers(workers)
}

#[test_case(1)]
#[test_case(2)]
#[test_case(3)]
#[test_case(4)]
fn test_three_addresses(workers: usize) {
    let file = file_with(THREE_IPS);
    let report = count_distinct(file.path(), &config(19, workers), &CancellationToken::new()).unwrap();
    assert_eq!(report.estimate, 3);
    assert_eq!(report.chunks, 2);
    assert_eq!(report.lines, 3);
    assert_eq!(report.bytes, THREE_IPS.len() as u64);
    assert_eq!(report.workers, workers);
}

#[test_case(b"a\na\nb\n", 4 => 2)]
#[test_case(b"a\na\nb\n", 1024 => 2)]
#[test_case(b"", 16 => 0)]
#[test_case(b"\n\n\n", 2 => 0)]
#[test_case(b"x\r\nx\ny", 3 => 2)]
fn test_distinct_lines(input: &[u8], chunk_size: usize) -> u64 {
    run_source::<IpSketch, _>(Cursor::new(input.to_vec()), &config(chunk_size, 2), &CancellationToken::new())
        .unwrap()
        .estimate
}

#[test]
fn test_cancelled_before_start() {
    let cancel = CancellationToken::new();
    cancel.cancel();
    let file = file_with(THREE_IPS);
    let err = count_distinct(file.path(), &config(19, 2), &cancel).unwrap_err();
    assert!(err.is_cancelled(), "{err}");
    // reader and workers race to report the cancellation
    assert!(matches!(err.stage(), Stage::Reader | Stage::Worker), "{err}");
}

static CANCEL_ON_FIRST_INSERT: Mutex<Option<CancellationToken>> = Mutex::new(None);

/// Cancels the armed token on its first insert, once the reader has long
/// queued every chunk.
#[derive(Default)]
struct SlowCanceller {
    keys: u64,
}

impl Sketch for SlowCanceller {
    fn insert(&mut self, _key: &[u8]) {
        if let Some(cancel) = CANCEL_ON_FIRST_INSERT.lock().unwrap().take() {
            thread::sleep(Duration::from_millis(300));
            cancel.cancel();
        }
        self.keys += 1;
    }

    fn merge(&mut self, other: &Self) -> Result<(), MergeError> {
        self.keys += other.keys;
        Ok(())
    }

    fn estimate(&self) -> u64 {
        self.keys
    }
}

#[test]
fn test_cancelled_after_reader_finished() {
    let input: Vec<u8> = (0..10).flat_map(|i| format!("{i}\n").into_bytes()).collect();
    let cancel = CancellationToken::new();
    *CANCEL_ON_FIRST_INSERT.lock().unwrap() = Some(cancel.clone());

    let config = config(2, 1).with_queue_capacity(64);
    let result = run_source::<SlowCanceller, _>(Cursor::new(input), &config, &cancel);

    assert!(cancel.is_cancelled());
    let err = result.unwrap_err();
    assert!(err.is_cancelled(), "{err}");
}

#[test]
fn test_terminator_beyond_lookback() {
    let mut input = b"10.0.0.1\n".to_vec();
    input.extend_from_slice(&[b'7'; 64]);
    input.extend_from_slice(b"\n10.0.0.2\n");
    let err = run_source::<IpSketch, _>(
        Cursor::new(input),
        &config(32, 2),
        &CancellationToken::new(),
    )
    .unwrap_err();
    assert!(matches!(err, Error::LineTooLong { lookback: 16, .. }), "{err}");
    assert_eq!(err.stage(), Stage::Reader);
}

#[test]
fn test_missing_file() {
    let err = count_distinct(
        Path::new("/nonexistent/ip_addresses"),
        &config(19, 1),
        &CancellationToken::new(),
    )
    .unwrap_err();
    assert!(matches!(err, Error::Open { .. }));
}

#[test]
fn test_invalid_config() {
    let file = file_with(THREE_IPS);
    let err = count_distinct(file.path(), &config(0, 1), &CancellationToken::new()).unwrap_err();
    assert!(matches!(err, Error::Config(_)));
    assert_eq!(err.stage(), Stage::Setup);
}

#[test_case(TrailingLine::Emit => 3)]
#[test_case(TrailingLine::Drop => 2)]
fn test_trailing_line(policy: TrailingLine) -> u64 {
    let file = file_with(b"1.1.1.1\n2.2.2.2\n3.3.3.3");
    let config = config(8, 2).with_trailing_line(policy);
    count_distinct(file.path(), &config, &CancellationToken::new())
        .unwrap()
        .estimate
}

#[test]
fn test_ipv4_key_mode() {
    let file = file_with(b"10.0.0.1\n10.0.0.2\r\n10.0.0.1\n\n10.0.0.3\n");
    let config = config(24, 2).with_key_mode(KeyMode::Ipv4);
    let report = count_distinct(file.path(), &config, &CancellationToken::new()).unwrap();
    assert_eq!(report.estimate, 3);
    assert_eq!(report.lines, 4);
}

#[test]
fn test_processing_error_is_fatal() {
    let mut input = Vec::new();
    for i in 0..200 {
        input.extend_from_slice(format!("10.0.{}.{}\n", i / 256, i % 256).as_bytes());
    }
    input.extend_from_slice(b"10.0.0.256\n");
    let config = config(64, 3).with_key_mode(KeyMode::Ipv4);

    let err = run_source::<IpSketch, _>(Cursor::new(input), &config, &CancellationToken::new())
        .unwrap_err();
    assert!(matches!(err, Error::Processing { .. }), "{err}");
    assert_eq!(err.stage(), Stage::Worker);
}

/// Fails after handing out `ok` bytes.
struct FailingSource {
    data: Cursor<Vec<u8>>,
    ok: u64,
}

impl Read for FailingSource {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.data.position() >= self.ok {
            return Err(io::Error::new(io::ErrorKind::Other, "device unplugged"));
        }
        self.data.read(buf)
    }
}

#[test]
fn test_read_error_is_fatal() {
    let source = FailingSource {
        data: Cursor::new(THREE_IPS.repeat(100)),
        ok: 512,
    };
    let err = run_source::<IpSketch, _>(source, &config(64, 2), &CancellationToken::new())
        .unwrap_err();
    assert!(matches!(err, Error::Read { .. }), "{err}");
}

/// Merges fail once any chunk has seen more than one key.
#[derive(Default)]
struct OneKeyPerChunk {
    keys: u64,
}

impl Sketch for OneKeyPerChunk {
    fn insert(&mut self, _key: &[u8]) {
        self.keys += 1;
    }

    fn merge(&mut self, other: &Self) -> Result<(), MergeError> {
        if other.keys > 1 {
            return Err(MergeError(format!("{} keys in one chunk", other.keys)));
        }
        self.keys += other.keys;
        Ok(())
    }

    fn estimate(&self) -> u64 {
        self.keys
    }
}

#[test]
fn test_merge_error_is_fatal() {
    let file = file_with(THREE_IPS);
    let err = run::<OneKeyPerChunk>(file.path(), &config(19, 2), &CancellationToken::new())
        .unwrap_err();
    assert!(matches!(err, Error::Merge { chunk: 1, .. }), "{err}");
    assert_eq!(err.stage(), Stage::Aggregator);

    // one key per chunk merges cleanly
    let report = run::<OneKeyPerChunk>(file.path(), &config(12, 2), &CancellationToken::new()).unwrap();
    assert_eq!(report.estimate, 3);
}

#[test_case(1, 64 * 1024)]
#[test_case(4, 64 * 1024)]
#[test_case(8, 4096)]
fn test_accuracy_on_generated_file(workers: usize, chunk_size: usize) {
    let file = NamedTempFile::new().unwrap();
    let options = GenerateOptions {
        size: 1 << 20,
        distinct: Some(20_000),
        seed: Some(2024),
    };
    let stats = generate(file.path(), &options).unwrap();

    let content = std::fs::read(file.path()).unwrap();
    let exact = content
        .split(|&b| b == b'\n')
        .filter(|line| !line.is_empty())
        .collect::<HashSet<_>>()
        .len();
    assert_eq!(exact, 20_000);

    let report = count_distinct(file.path(), &config(chunk_size, workers), &CancellationToken::new()).unwrap();
    assert_eq!(report.lines, stats.lines);
    assert_eq!(report.bytes, stats.bytes);

    let err = (report.estimate as f64 - exact as f64).abs() / exact as f64;
    // 2^14 registers: 0.81% standard error
    assert!(err < 0.03, "estimate {} vs {exact}: {err}", report.estimate);
}

#[test]
fn test_estimate_independent_of_workers_and_chunking() {
    let mut out = Vec::new();
    cardinality_scan::generator::generate_to(
        &mut out,
        &GenerateOptions {
            size: 256 * 1024,
            distinct: None,
            seed: Some(5),
        },
    )
    .unwrap();

    let estimates: HashSet<u64> = [(1, 1 << 20), (2, 4096), (4, 1000), (3, 77)]
        .into_iter()
        .map(|(workers, chunk_size)| {
            run_source::<IpSketch, _>(Cursor::new(out.clone()), &config(chunk_size, workers), &CancellationToken::new())
                .unwrap()
                .estimate
        })
        .collect();
    // the union of all per-chunk registers is the same however the input is cut,
    // up to rounding of the harmonic sum
    let min = *estimates.iter().min().unwrap();
    let max = *estimates.iter().max().unwrap();
    assert!((max - min) as f64 / (min as f64) < 1e-3, "{estimates:?}");
}
