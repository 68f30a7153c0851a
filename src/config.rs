use clap::ValueEnum;
use serde::Serialize;

use crate::error::{Error, Result};

/// Default number of raw bytes read per chunk.
pub const DEFAULT_CHUNK_SIZE: usize = 64 * 1024 * 1024;
/// Default number of trailing bytes searched for the last line terminator of a read.
pub const DEFAULT_LOOKBACK: usize = 16;

/// What to do with a final line that has no terminator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum TrailingLine {
    /// Emit it as part of the last chunk and count it as a key.
    #[default]
    Emit,
    /// Discard it.
    Drop,
}

/// How a line is turned into the key inserted into the sketch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum KeyMode {
    /// The line bytes, without a trailing `\r`.
    #[default]
    Raw,
    /// A dotted-quad IPv4 address compacted into its 4 octets.
    Ipv4,
}

/// Tuning knobs of a scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScanConfig {
    /// Raw bytes read per chunk (a chunk also carries the previous read's leftover).
    pub chunk_size: usize,
    /// Number of worker threads.
    pub workers: usize,
    /// Capacity of the chunk queue between the reader and the workers.
    pub queue_capacity: usize,
    /// Trailing bytes of each read searched for the last line terminator.
    pub lookback: usize,
    pub trailing_line: TrailingLine,
    pub key_mode: KeyMode,
}

impl Default for ScanConfig {
    fn default() -> Self {
        let workers = num_cpus::get().max(1);
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            workers,
            queue_capacity: workers,
            lookback: DEFAULT_LOOKBACK,
            trailing_line: TrailingLine::default(),
            key_mode: KeyMode::default(),
        }
    }
}

impl ScanConfig {
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    /// Set the worker count; the queue capacity follows it.
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self.queue_capacity = workers;
        self
    }

    pub fn with_queue_capacity(mut self, queue_capacity: usize) -> Self {
        self.queue_capacity = queue_capacity;
        self
    }

    pub fn with_lookback(mut self, lookback: usize) -> Self {
        self.lookback = lookback;
        self
    }

    pub fn with_trailing_line(mut self, trailing_line: TrailingLine) -> Self {
        self.trailing_line = trailing_line;
        self
    }

    pub fn with_key_mode(mut self, key_mode: KeyMode) -> Self {
        self.key_mode = key_mode;
        self
    }

    /// Reject configurations the pipeline cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(Error::Config("chunk size must be at least 1 byte".into()));
        }
        if self.workers == 0 {
            return Err(Error::Config("at least one worker is required".into()));
        }
        if self.queue_capacity == 0 {
            return Err(Error::Config("queue capacity must be at least 1".into()));
        }
        if self.lookback == 0 {
            return Err(Error::Config("lookback must be at least 1 byte".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test]
    fn test_defaults_are_valid() {
        let config = ScanConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.chunk_size, DEFAULT_CHUNK_SIZE);
        assert_eq!(config.lookback, 16);
        assert_eq!(config.queue_capacity, config.workers);
        assert_eq!(config.trailing_line, TrailingLine::Emit);
        assert_eq!(config.key_mode, KeyMode::Raw);
    }

    #[test_case(ScanConfig::default().with_chunk_size(0); "zero chunk size")]
    #[test_case(ScanConfig::default().with_workers(0); "zero workers")]
    #[test_case(ScanConfig::default().with_queue_capacity(0); "zero queue capacity")]
    #[test_case(ScanConfig::default().with_lookback(0); "zero lookback")]
    fn test_invalid(config: ScanConfig) {
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_workers_drive_queue_capacity() {
        let config = ScanConfig::default().with_workers(3);
        assert_eq!(config.queue_capacity, 3);
        let config = config.with_queue_capacity(8);
        assert_eq!((config.workers, config.queue_capacity), (3, 8));
    }
}
