use std::fmt;
use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Pipeline stage an error originated from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Setup,
    Reader,
    Worker,
    Aggregator,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Stage::Setup => "setup",
            Stage::Reader => "reader",
            Stage::Worker => "worker",
            Stage::Aggregator => "aggregator",
        })
    }
}

/// Failure of `Sketch::merge`, e.g. sketches built with incompatible parameters.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("incompatible sketches: {0}")]
pub struct MergeError(pub String);

#[derive(Error, Debug)]
pub enum Error {
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("failed to open {}: {source}", path.display())]
    Open { path: PathBuf, source: io::Error },

    #[error("failed to read input at byte {offset}: {source}")]
    Read { offset: u64, source: io::Error },

    #[error("no line terminator in the last {lookback} bytes of the read ending at byte {offset}")]
    LineTooLong { offset: u64, lookback: usize },

    #[error("chunk {chunk}, line {line}: {detail}")]
    Processing { chunk: u64, line: u64, detail: String },

    #[error("failed to merge sketch of chunk {chunk}: {source}")]
    Merge { chunk: u64, source: MergeError },

    #[error("{stage} cancelled")]
    Cancelled { stage: Stage },
}

impl Error {
    /// Stage that raised the error
    pub fn stage(&self) -> Stage {
        match self {
            Error::Config(_) => Stage::Setup,
            Error::Open { .. } | Error::Read { .. } | Error::LineTooLong { .. } => Stage::Reader,
            Error::Processing { .. } => Stage::Worker,
            Error::Merge { .. } => Stage::Aggregator,
            Error::Cancelled { stage } => *stage,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Error::Cancelled { .. })
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case(Error::Config("workers must be at least 1".into()) => Stage::Setup)]
    #[test_case(Error::LineTooLong { offset: 64, lookback: 16 } => Stage::Reader)]
    #[test_case(Error::Processing { chunk: 3, line: 7, detail: "bad key".into() } => Stage::Worker)]
    #[test_case(Error::Merge { chunk: 1, source: MergeError("precision 12 vs 14".into()) } => Stage::Aggregator)]
    #[test_case(Error::Cancelled { stage: Stage::Worker } => Stage::Worker)]
    fn test_stage(err: Error) -> Stage {
        err.stage()
    }

    #[test]
    fn test_messages_name_the_failure() {
        let err = Error::LineTooLong {
            offset: 128,
            lookback: 16,
        };
        assert_eq!(
            err.to_string(),
            "no line terminator in the last 16 bytes of the read ending at byte 128"
        );
        assert_eq!(
            Error::Cancelled {
                stage: Stage::Reader
            }
            .to_string(),
            "reader cancelled"
        );
    }
}
