use ieee80211::macro_bits::{bit, check_bit};

use super::{MAX_STATION_WCID, WCID_TABLE_SIZE};

const BITS_PER_WORD: usize = u32::BITS as usize;
const WCID_MASK_WORDS: usize = WCID_TABLE_SIZE / BITS_PER_WORD;

/// A bitmap of the allocated WCIDs.
///
/// Allocation always returns the lowest free index, so the sequence of handed out WCIDs is fully
/// deterministic.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct WcidMask {
    words: [u32; WCID_MASK_WORDS],
}
impl WcidMask {
    /// Create a new mask, with all WCIDs free.
    pub const fn new() -> Self {
        Self {
            words: [0; WCID_MASK_WORDS],
        }
    }
    /// Find the lowest clear bit.
    fn first_clear(&self) -> Option<usize> {
        self.words
            .iter()
            .enumerate()
            .find(|(_, word)| **word != u32::MAX)
            .map(|(i, word)| i * BITS_PER_WORD + (!word).trailing_zeros() as usize)
    }
    /// Allocate the lowest free WCID.
    ///
    /// Returns `None` if all WCIDs up to [MAX_STATION_WCID] are in use. The mask is left untouched
    /// in that case.
    pub fn allocate(&mut self) -> Option<u8> {
        let idx = self.first_clear()?;
        if idx > MAX_STATION_WCID as usize {
            return None;
        }
        self.words[idx / BITS_PER_WORD] |= bit!(idx % BITS_PER_WORD);
        Some(idx as u8)
    }
    /// Mark `idx` as permanently in use.
    ///
    /// This is used for indices, which are derived instead of allocated, but fall into the range
    /// of the allocator.
    pub fn reserve(&mut self, idx: u8) {
        self.words[idx as usize / BITS_PER_WORD] |= bit!(idx as usize % BITS_PER_WORD);
    }
    /// Release `idx`.
    ///
    /// Releasing an index, which isn't allocated, has no effect. Releasing the same allocation
    /// twice is a bug in the caller, since the index may have been handed out again in between.
    pub fn release(&mut self, idx: u8) {
        self.words[idx as usize / BITS_PER_WORD] &= !bit!(idx as usize % BITS_PER_WORD);
    }
    /// Check if `idx` is currently allocated.
    pub fn is_allocated(&self, idx: u8) -> bool {
        check_bit!(
            self.words[idx as usize / BITS_PER_WORD],
            bit!(idx as usize % BITS_PER_WORD)
        )
    }
    /// Returns an iterator over all allocated WCIDs in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = u8> + '_ {
        (0..WCID_TABLE_SIZE)
            .map(|idx| idx as u8)
            .filter(|idx| self.is_allocated(*idx))
    }
    /// The amount of allocated WCIDs.
    pub fn count(&self) -> usize {
        self.words.iter().map(|word| word.count_ones() as usize).sum()
    }
}

#[cfg(test)]
mod tests {
    extern crate std;

    use std::{collections::BTreeSet, vec::Vec};

    use super::*;

    #[test]
    fn test_lowest_index_first() {
        let mut mask = WcidMask::new();
        assert_eq!(mask.allocate(), Some(0));
        assert_eq!(mask.allocate(), Some(1));
        assert_eq!(mask.allocate(), Some(2));
        mask.release(1);
        assert_eq!(mask.allocate(), Some(1));
        assert_eq!(mask.allocate(), Some(3));
    }

    #[test]
    fn test_crosses_word_boundaries() {
        let mut mask = WcidMask::new();
        for expected in 0..40 {
            assert_eq!(mask.allocate(), Some(expected));
        }
        mask.release(33);
        mask.release(5);
        assert_eq!(mask.allocate(), Some(5));
        assert_eq!(mask.allocate(), Some(33));
        assert_eq!(mask.allocate(), Some(40));
    }

    #[test]
    fn test_exhaustion_and_recovery() {
        let mut mask = WcidMask::new();
        for expected in 0..=MAX_STATION_WCID {
            assert_eq!(mask.allocate(), Some(expected));
        }
        assert_eq!(mask.count(), 248);
        let before = mask;
        assert_eq!(mask.allocate(), None);
        // A failed allocation doesn't leave bits behind.
        assert_eq!(mask, before);
        assert!(!mask.is_allocated(248));

        mask.release(117);
        assert_eq!(mask.allocate(), Some(117));
        assert_eq!(mask.allocate(), None);
    }

    #[test]
    fn test_reserved_indices_are_skipped() {
        let mut mask = WcidMask::new();
        mask.reserve(0);
        mask.reserve(2);
        assert_eq!(mask.allocate(), Some(1));
        assert_eq!(mask.allocate(), Some(3));
    }

    #[test]
    fn test_bits_match_outstanding_allocations() {
        // Drive the mask with a fixed pseudo random sequence of operations and compare it against
        // a model after every step.
        let mut mask = WcidMask::new();
        let mut model = BTreeSet::new();
        let mut state = 0x2545_f491u32;
        for _ in 0..4000 {
            state ^= state << 13;
            state ^= state >> 17;
            state ^= state << 5;
            if state % 3 != 0 {
                let expected = (0..=MAX_STATION_WCID).find(|idx| !model.contains(idx));
                assert_eq!(mask.allocate(), expected);
                if let Some(idx) = expected {
                    model.insert(idx);
                }
            } else if let Some(idx) = model.iter().nth(state as usize % model.len().max(1)).copied()
            {
                model.remove(&idx);
                mask.release(idx);
            }
            assert_eq!(mask.iter().collect::<Vec<_>>(), model.iter().copied().collect::<Vec<_>>());
            assert!(mask.iter().all(|idx| idx <= MAX_STATION_WCID));
        }
    }
}
