//! `cardinality-scan` estimates the number of distinct lines in files far larger than memory.
//!
//! A single reader cuts the input into line-aligned chunks, a pool of workers builds one
//! HyperLogLog++ sketch per chunk, and an aggregator merges the sketches into the final
//! estimate. Queues between the stages are bounded, buffers are recycled through a pool, and
//! the whole scan can be cancelled cooperatively.
//!
//! ```no_run
//! use std::path::Path;
//! use cardinality_scan::{count_distinct, CancellationToken, ScanConfig};
//!
//! let report = count_distinct(
//!     Path::new("ip_addresses"),
//!     &ScanConfig::default(),
//!     &CancellationToken::new(),
//! )?;
//! println!("Total unique keys: {}", report.estimate);
//! # Ok::<(), cardinality_scan::Error>(())
//! ```
pub mod aggregator;
mod array;
pub mod barrier;
mod beta;
pub mod buffer_pool;
pub mod cancel;
pub mod cli;
pub mod config;
pub mod error;
pub mod estimator;
pub mod generator;
mod hyperloglog;
pub mod pipeline;
pub mod queue;
pub mod reader;
mod representation;
pub mod sketch;
mod small;
pub mod worker;

pub use cancel::CancellationToken;
pub use config::{KeyMode, ScanConfig, TrailingLine};
pub use error::{Error, MergeError, Result, Stage};
pub use estimator::CardinalityEstimator;
pub use pipeline::{count_distinct, run, run_source, ScanReport};
pub use sketch::{IpSketch, Sketch};
