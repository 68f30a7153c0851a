//! ## Small representation
//! Allows to estimate cardinality in [0..2] range and uses only 8 bytes of memory.
//!
//! The packed `u64` format of small representation:
//! - 0..30 bits    - store 31-bit encoded hash
//! - 31..61 bits   - store 31-bit encoded hash
//!
//! Encoded hashes are never zero, so a zero slot is an empty slot.

use std::mem::size_of;

use crate::representation::RepresentationTrait;

/// Mask used for extracting hashes stored in small representation (31 bits)
const SMALL_MASK: u64 = 0x0000_0000_7fff_ffff;
/// Bit offset of the second hash
const H2_OFFSET: u32 = 31;

/// Small representation container
#[derive(Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct Small(u64);

impl Small {
    /// Return 1-st encoded hash
    #[inline]
    fn h1(&self) -> u32 {
        (self.0 & SMALL_MASK) as u32
    }

    /// Return 2-nd encoded hash
    #[inline]
    fn h2(&self) -> u32 {
        ((self.0 >> H2_OFFSET) & SMALL_MASK) as u32
    }

    /// Return items stored within `Small` representation
    #[inline]
    pub(crate) fn items(&self) -> [u32; 2] {
        [self.h1(), self.h2()]
    }
}

impl RepresentationTrait for Small {
    /// Insert encoded hash into `Small` representation.
    /// Returns true on success, false when both slots hold other hashes.
    #[inline]
    fn insert_encoded_hash(&mut self, h: u32) -> bool {
        let h1 = self.h1();
        if h1 == 0 {
            self.0 |= u64::from(h) & SMALL_MASK;
            return true;
        } else if h1 == h {
            return true;
        }

        let h2 = self.h2();
        if h2 == 0 {
            self.0 |= (u64::from(h) & SMALL_MASK) << H2_OFFSET;
            return true;
        } else if h2 == h {
            return true;
        }

        false
    }

    /// Return cardinality estimate of `Small` representation
    #[inline]
    fn estimate(&self) -> usize {
        match (self.h1(), self.h2()) {
            (0, 0) => 0,
            (_, 0) => 1,
            (_, _) => 2,
        }
    }

    /// Return memory size of `Small` representation
    fn size_of(&self) -> usize {
        size_of::<Self>()
    }
}
