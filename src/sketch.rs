//! The approximate-distinct-count capability the scan pipeline is built on.
//!
//! The pipeline never looks inside a sketch: it creates one per chunk with
//! [`Default`], inserts keys, merges the per-chunk sketches into a global one
//! and reads the estimate. Merge must be commutative and associative since
//! chunks complete out of order.

use wyhash::WyHash;

use crate::error::MergeError;
use crate::estimator::CardinalityEstimator;

pub trait Sketch: Default + Send {
    /// Insert a key given as raw bytes
    fn insert(&mut self, key: &[u8]);

    /// Union `other` into `self`
    fn merge(&mut self, other: &Self) -> Result<(), MergeError>;

    /// Approximate number of distinct keys inserted so far
    fn estimate(&self) -> u64;
}

/// Sketch used by the command line tool: 2^14 registers, 0.81% expected error.
pub type IpSketch = CardinalityEstimator<[u8], WyHash, 14, 6>;
