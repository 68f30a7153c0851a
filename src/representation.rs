use std::fmt::{Debug, Formatter};

use enum_dispatch::enum_dispatch;

use crate::array::Array;
use crate::hyperloglog::HyperLogLog;
use crate::small::Small;

/// Representation types supported by `CardinalityEstimator`
#[derive(Clone, PartialEq)]
#[enum_dispatch]
pub(crate) enum Representation<const P: usize, const W: usize> {
    Small(Small),
    Array(Array),
    Hll(HyperLogLog<P, W>),
}

/// Representation trait which must be implemented by all representations.
#[enum_dispatch(Representation<P, W>)]
pub(crate) trait RepresentationTrait {
    /// Returns false when the representation is full and must be upgraded.
    fn insert_encoded_hash(&mut self, h: u32) -> bool;
    fn estimate(&self) -> usize;
    fn size_of(&self) -> usize;
    fn to_string(&self) -> String {
        format!("estimate: {}, size: {}", self.estimate(), self.size_of())
    }
}

impl<const P: usize, const W: usize> Representation<P, W> {
    /// Name of the representation, used in debug output
    pub(crate) fn name(&self) -> &'static str {
        match self {
            Representation::Small(_) => "Small",
            Representation::Array(_) => "Array",
            Representation::Hll(_) => "HyperLogLog",
        }
    }

    /// Insert encoded hash, upgrading `Small` -> `Array` -> `Hll` when the current
    /// representation runs out of room.
    #[inline]
    pub(crate) fn insert(&mut self, h: u32) {
        // Skip inserting zero hash (useful to simplify merges)
        if h == 0 || self.insert_encoded_hash(h) {
            return;
        }

        let upgraded = match self {
            Representation::Small(small) => {
                let [h1, h2] = small.items();
                Representation::Array(Array::new(&[h1, h2, h]))
            }
            Representation::Array(array) => {
                let mut hll = HyperLogLog::<P, W>::new(array.items());
                hll.insert_encoded_hash(h);
                Representation::Hll(hll)
            }
            Representation::Hll(_) => return,
        };
        *self = upgraded;
    }

    /// Merge `rhs` into `self`
    pub(crate) fn merge(&mut self, rhs: &Self) {
        match rhs {
            Representation::Small(small) => small.items().iter().for_each(|&h| self.insert(h)),
            Representation::Array(array) => array.items().iter().for_each(|&h| self.insert(h)),
            Representation::Hll(rhs_hll) => {
                if let Representation::Hll(lhs_hll) = self {
                    lhs_hll.merge(rhs_hll);
                    return;
                }
                // when `self` is not dense yet - save its hashes,
                // take a copy of `rhs` and then insert saved hashes
                let saved = self.encoded_items();
                *self = Representation::Hll(rhs_hll.clone());
                saved.into_iter().for_each(|h| self.insert(h));
            }
        }
    }

    /// Encoded hashes held by sparse representations
    fn encoded_items(&self) -> Vec<u32> {
        match self {
            Representation::Small(small) => small.items().to_vec(),
            Representation::Array(array) => array.items().to_vec(),
            Representation::Hll(_) => Vec::new(),
        }
    }
}

impl<const P: usize, const W: usize> Default for Representation<P, W> {
    fn default() -> Self {
        Representation::Small(Small::default())
    }
}

impl<const P: usize, const W: usize> Debug for Representation<P, W> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{{ representation: {}, {} }}",
            self.name(),
            RepresentationTrait::to_string(self)
        )
    }
}
