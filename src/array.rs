//! ## Array representation
//! Allows to estimate medium cardinality in [3..MAX_CAPACITY] range.
//!
//! Storage layout:
//! - arr[0..N]    - store `N` encoded hashes
//! - arr[N..]     - store zeros used for future hashes
//!
//! Capacity starts at 4 and doubles up to `MAX_CAPACITY`, always staying a power of two
//! so that lookups can run over fixed-size batches.

use std::mem::{size_of, size_of_val};

use crate::representation::RepresentationTrait;

/// Maximum number of elements stored in array representation
pub(crate) const MAX_CAPACITY: usize = 128;
/// Initial capacity used when upgrading from small representation
const MIN_CAPACITY: usize = 4;

/// Array representation container
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct Array {
    /// Number of items stored in the array
    len: usize,
    /// Zero-padded items, `arr.len()` is the capacity
    arr: Vec<u32>,
}

impl Array {
    /// Create new instance of `Array` representation holding distinct `items`
    pub(crate) fn new(items: &[u32]) -> Self {
        let cap = items.len().next_power_of_two().max(MIN_CAPACITY);
        let mut arr = vec![0; cap];
        arr[..items.len()].copy_from_slice(items);
        Self {
            len: items.len(),
            arr,
        }
    }

    /// Return items stored within `Array` representation
    #[inline]
    pub(crate) fn items(&self) -> &[u32] {
        &self.arr[..self.len]
    }

    #[inline]
    fn contains(&self, h: u32) -> bool {
        match self.arr.len() {
            4 => contains_fixed_vectorized::<4>(&self.arr, h),
            8 => contains_fixed_vectorized::<8>(&self.arr, h),
            cap => {
                // calculate rounded up slice length for efficient look up in batches
                let rlen = (16 * self.len.div_ceil(16)).min(cap);
                contains_vectorized::<16>(&self.arr[..rlen], h)
            }
        }
    }
}

impl RepresentationTrait for Array {
    /// Insert encoded hash into `Array` representation.
    /// Returns true on success, false when `MAX_CAPACITY` is reached.
    #[inline]
    fn insert_encoded_hash(&mut self, h: u32) -> bool {
        if self.contains(h) {
            return true;
        }

        if self.len < self.arr.len() {
            // if there are available slots in current array - append to it
            self.arr[self.len] = h;
            self.len += 1;
            return true;
        }

        if self.arr.len() < MAX_CAPACITY {
            // double array capacity up to `MAX_CAPACITY`
            self.arr.resize(self.arr.len() * 2, 0);
            self.arr[self.len] = h;
            self.len += 1;
            return true;
        }

        false
    }

    /// Return cardinality estimate of `Array` representation
    #[inline]
    fn estimate(&self) -> usize {
        self.len
    }

    /// Return memory size of `Array` representation
    #[inline]
    fn size_of(&self) -> usize {
        size_of::<Self>() + size_of_val(self.arr.as_slice())
    }
}

/// Vectorized linear array search benefiting from SIMD instructions (e.g. AVX2).
///
/// Input slice length assumed to be divisible by `N` to perform efficient
/// batch comparisons of slice elements to provided value `v`.
///
/// Assembly output: https://godbolt.org/z/eb8Kob9fa
/// Background reading: https://tinyurl.com/2e4srh2d
#[inline]
fn contains_vectorized<const N: usize>(a: &[u32], v: u32) -> bool {
    a.chunks_exact(N)
        .any(|chunk| contains_fixed_vectorized::<N>(chunk, v))
}

/// Vectorized linear fixed array search
#[inline]
fn contains_fixed_vectorized<const N: usize>(a: &[u32], v: u32) -> bool {
    let mut res = false;
    for &x in &a[..N] {
        res |= x == v
    }
    res
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_array_grows_up_to_max_capacity() {
        let mut array = Array::new(&[1, 2, 3]);
        assert_eq!(array.arr.len(), 4);

        for h in 4..=MAX_CAPACITY as u32 {
            assert!(array.insert_encoded_hash(h));
        }
        assert_eq!(array.estimate(), MAX_CAPACITY);
        assert_eq!(array.arr.len(), MAX_CAPACITY);

        // duplicates are still accepted once full
        assert!(array.insert_encoded_hash(17));
        assert!(array.insert_encoded_hash(MAX_CAPACITY as u32));
        assert!(!array.insert_encoded_hash(MAX_CAPACITY as u32 + 1));
        assert_eq!(array.items().len(), MAX_CAPACITY);
    }

    #[test]
    fn test_array_finds_items_past_first_batch() {
        let items: Vec<u32> = (1..=40).collect();
        let mut array = Array::new(&items);
        assert_eq!(array.arr.len(), 64);
        assert!(array.contains(40));
        assert!(array.contains(33));
        assert!(!array.contains(41));
        assert!(array.insert_encoded_hash(40));
        assert_eq!(array.estimate(), 40);
    }
}
