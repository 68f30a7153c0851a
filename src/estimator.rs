//! Cardinality estimator allows to estimate number of distinct elements
//! in the stream or dataset and is defined with const `P` and `W` parameters:
//! - `P`: precision parameter in [4..18] range, which defines
//!   number of bits to use for HyperLogLog register indices.
//! - `W`: width parameter in [4..6] range, which defines
//!   number of bits to use for HyperLogLog register width.
//!
//! # Data-structure design rationale
//!
//! ## Low memory footprint
//!
//! Every chunk of the scanned file gets its own estimator, so most estimators
//! live short lives and many of them hold few keys. The estimator therefore
//! starts tiny and only grows into a full HyperLogLog when it has to:
//! - Cardinality in [0..2] range - small representation, two hashes packed into a `u64`
//! - Cardinality in [3..128] range - array representation of encoded hashes
//! - Cardinality in [129..] range - HyperLogLog representation with `2^P` registers of `W` bits
//!
//! ## High accuracy
//! - For small cardinality range (<= 128) cardinality is counted exactly
//!   (within hash collisions chance).
//! - For large cardinality range HyperLogLog++ is used with LogLog-Beta bias correction.
//!   - Expected error:
//!     P = 10, W = 5: 1.04 / sqrt(2^10) = 3.25%
//!     P = 12, W = 6: 1.04 / sqrt(2^12) = 1.62%
//!     P = 14, W = 6: 1.04 / sqrt(2^14) = 0.81%
//!     P = 18, W = 6: 1.04 / sqrt(2^18) = 0.02%

use std::fmt::{Debug, Formatter};
use std::hash::{BuildHasher, BuildHasherDefault, Hash, Hasher};
use std::marker::PhantomData;
use std::mem::size_of;

use wyhash::WyHash;

use crate::error::MergeError;
use crate::representation::{Representation, RepresentationTrait};
use crate::sketch::Sketch;

pub struct CardinalityEstimator<T, H = WyHash, const P: usize = 12, const W: usize = 6>
where
    T: Hash + ?Sized,
    H: Hasher + Default,
{
    /// Current representation, upgraded in place as cardinality grows
    pub(crate) repr: Representation<P, W>,
    /// Zero-sized build hasher
    build_hasher: BuildHasherDefault<H>,
    /// Zero-sized item type marker
    _item: PhantomData<fn(&T)>,
}

impl<T, H, const P: usize, const W: usize> CardinalityEstimator<T, H, P, W>
where
    T: Hash + ?Sized,
    H: Hasher + Default,
{
    /// Ensure that `P` and `W` are in correct range at compile time
    const VALID_PARAMS: () = assert!(P >= 4 && P <= 18 && W >= 4 && W <= 6);

    /// Creates new instance of `CardinalityEstimator`
    #[inline]
    pub fn new() -> Self {
        // compile time check of params
        _ = Self::VALID_PARAMS;

        Self {
            // Start with empty small representation
            repr: Representation::default(),
            build_hasher: BuildHasherDefault::default(),
            _item: PhantomData,
        }
    }

    /// Insert a hashable item into `CardinalityEstimator`
    #[inline]
    pub fn insert(&mut self, item: &T) {
        let mut hasher = self.build_hasher.build_hasher();
        item.hash(&mut hasher);
        self.insert_hash(hasher.finish());
    }

    /// Insert hash into `CardinalityEstimator`
    #[inline]
    pub fn insert_hash(&mut self, hash: u64) {
        self.repr.insert(Self::encode_hash(hash));
    }

    /// Return cardinality estimate
    #[inline]
    pub fn estimate(&self) -> usize {
        self.repr.estimate()
    }

    /// Merge cardinality estimators
    #[inline]
    pub fn merge(&mut self, rhs: &Self) {
        self.repr.merge(&rhs.repr);
    }

    /// Return memory size of `CardinalityEstimator`
    pub fn size_of(&self) -> usize {
        size_of::<Self>() - size_of::<Representation<P, W>>() + self.repr.size_of()
    }

    /// Return the name of the representation currently in use
    pub fn representation(&self) -> &'static str {
        self.repr.name()
    }

    /// Compute the sparse encoding of the given hash
    #[inline]
    fn encode_hash(hash: u64) -> u32 {
        let idx = (hash as u32) & ((1 << (32 - W - 1)) - 1);
        let rank = ((!hash >> P).trailing_zeros() + 1).min((1 << W) - 1);
        (idx << W) | rank
    }
}

impl<T, H, const P: usize, const W: usize> Default for CardinalityEstimator<T, H, P, W>
where
    T: Hash + ?Sized,
    H: Hasher + Default,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T, H, const P: usize, const W: usize> Clone for CardinalityEstimator<T, H, P, W>
where
    T: Hash + ?Sized,
    H: Hasher + Default,
{
    fn clone(&self) -> Self {
        Self {
            repr: self.repr.clone(),
            build_hasher: BuildHasherDefault::default(),
            _item: PhantomData,
        }
    }
}

impl<T, H, const P: usize, const W: usize> PartialEq for CardinalityEstimator<T, H, P, W>
where
    T: Hash + ?Sized,
    H: Hasher + Default,
{
    /// Compare cardinality estimators
    fn eq(&self, rhs: &Self) -> bool {
        self.repr == rhs.repr
    }
}

impl<T, H, const P: usize, const W: usize> Debug for CardinalityEstimator<T, H, P, W>
where
    T: Hash + ?Sized,
    H: Hasher + Default,
{
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self.repr)
    }
}

impl<H, const P: usize, const W: usize> Sketch for CardinalityEstimator<[u8], H, P, W>
where
    H: Hasher + Default,
{
    #[inline]
    fn insert(&mut self, key: &[u8]) {
        CardinalityEstimator::insert(self, key);
    }

    #[inline]
    fn merge(&mut self, other: &Self) -> Result<(), MergeError> {
        CardinalityEstimator::merge(self, other);
        Ok(())
    }

    #[inline]
    fn estimate(&self) -> u64 {
        CardinalityEstimator::estimate(self) as u64
    }
}
