#![no_main]

use std::io::Cursor;

use cardinality_scan::buffer_pool::BufferPool;
use cardinality_scan::queue::bounded;
use cardinality_scan::reader::ChunkReader;
use cardinality_scan::{CancellationToken, Error, ScanConfig};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|input: (u8, u8, &[u8])| {
    let (chunk_size, lookback, data) = input;
    let config = ScanConfig::default()
        .with_chunk_size(usize::from(chunk_size).max(1))
        .with_lookback(usize::from(lookback % 32).max(1));
    let reader = ChunkReader::new(
        &config,
        BufferPool::new(config.chunk_size + config.lookback, 4),
    );
    let (producer, consumer) = bounded(data.len() + 1);

    let result = reader.read_from(Cursor::new(data), &producer, &CancellationToken::new());
    drop(producer);
    let chunks: Vec<Vec<u8>> = consumer.iter().map(|c| c.bytes().to_vec()).collect();

    match result {
        Ok(stats) => {
            assert_eq!(chunks.concat(), data);
            assert_eq!(stats.bytes, data.len() as u64);
            for chunk in &chunks[..chunks.len().saturating_sub(1)] {
                assert_eq!(chunk.last(), Some(&b'\n'));
            }
        }
        Err(Error::LineTooLong { .. }) => {
            // whatever was emitted before the failure is a line-aligned prefix
            let emitted = chunks.concat();
            assert!(data.starts_with(&emitted));
            assert!(emitted.is_empty() || emitted.ends_with(b"\n"));
        }
        Err(err) => panic!("unexpected error: {err}"),
    }
});
