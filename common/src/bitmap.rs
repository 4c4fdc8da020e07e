//! PRB occupancy bitmap

use crate::interval::PrbInterval;
use tracing::trace;

const WORD_BITS: usize = 64;

/// Fixed-size bitmap over the PRBs of a carrier
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrbBitmap {
    words: Vec<u64>,
    nof_bits: usize,
}

impl PrbBitmap {
    /// Create an empty bitmap of `nof_bits` PRBs
    pub fn new(nof_bits: usize) -> Self {
        Self {
            words: vec![0; (nof_bits + WORD_BITS - 1) / WORD_BITS],
            nof_bits,
        }
    }

    /// Number of PRBs covered
    pub fn size(&self) -> usize {
        self.nof_bits
    }

    /// Clear all bits
    pub fn reset(&mut self) {
        self.words.iter_mut().for_each(|w| *w = 0);
    }

    /// Check a single PRB
    pub fn test(&self, pos: usize) -> bool {
        debug_assert!(pos < self.nof_bits);
        self.words[pos / WORD_BITS] & (1 << (pos % WORD_BITS)) != 0
    }

    /// Mark PRBs `[start, stop)` as used
    pub fn fill(&mut self, start: usize, stop: usize) {
        assert!(start <= stop && stop <= self.nof_bits, "PRB range [{}, {}) out of bounds", start, stop);
        for pos in start..stop {
            self.words[pos / WORD_BITS] |= 1 << (pos % WORD_BITS);
        }
    }

    /// Whether any PRB in `[start, stop)` is used
    pub fn any(&self, start: usize, stop: usize) -> bool {
        let stop = stop.min(self.nof_bits);
        (start..stop).any(|pos| self.test(pos))
    }

    /// Number of used PRBs
    pub fn count(&self) -> usize {
        self.words.iter().map(|w| w.count_ones() as usize).sum()
    }

    /// First-fit search for `len` free contiguous PRBs starting at `start_search`.
    ///
    /// If no free run is long enough, the longest free run found is returned,
    /// which may be empty.
    pub fn find_empty_interval_of_length(&self, len: usize, start_search: usize) -> PrbInterval {
        let mut best = PrbInterval::new(0, 0);
        let mut pos = start_search;
        while pos < self.nof_bits {
            if self.test(pos) {
                pos += 1;
                continue;
            }
            let begin = pos;
            while pos < self.nof_bits && !self.test(pos) && pos - begin < len {
                pos += 1;
            }
            let found = PrbInterval::new(begin as u16, pos as u16);
            if pos - begin >= len {
                return found;
            }
            if found.length() > best.length() {
                best = found;
            }
        }
        trace!("No free run of {} PRBs, longest is {}", len, best);
        best
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fill_and_any() {
        let mut bm = PrbBitmap::new(106);
        bm.fill(10, 20);
        assert!(bm.any(0, 11));
        assert!(!bm.any(0, 10));
        assert!(!bm.any(20, 106));
        assert_eq!(bm.count(), 10);
        bm.reset();
        assert_eq!(bm.count(), 0);
    }

    #[test]
    fn test_find_empty_interval_first_fit() {
        let mut bm = PrbBitmap::new(100);
        bm.fill(0, 5);
        bm.fill(8, 10);
        // [5, 8) is too short, next run starts at 10
        assert_eq!(bm.find_empty_interval_of_length(6, 0), PrbInterval::new(10, 16));
        assert_eq!(bm.find_empty_interval_of_length(3, 0), PrbInterval::new(5, 8));
    }

    #[test]
    fn test_find_empty_interval_returns_longest_when_short() {
        let mut bm = PrbBitmap::new(20);
        bm.fill(0, 20);
        assert!(bm.find_empty_interval_of_length(4, 0).is_empty());

        let mut bm = PrbBitmap::new(20);
        bm.fill(3, 10);
        bm.fill(15, 20);
        // free runs: [0,3) and [10,15)
        assert_eq!(bm.find_empty_interval_of_length(8, 0), PrbInterval::new(10, 15));
    }

    #[test]
    fn test_bitmap_spanning_words() {
        let mut bm = PrbBitmap::new(273);
        bm.fill(60, 70);
        assert!(bm.test(63));
        assert!(bm.test(64));
        assert!(!bm.test(70));
        assert_eq!(bm.find_empty_interval_of_length(200, 0), PrbInterval::new(70, 270));
    }
}
