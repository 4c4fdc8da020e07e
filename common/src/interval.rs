//! Half-open integer intervals for PRB and OFDM symbol ranges

use num_traits::{PrimInt, Unsigned};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Half-open interval `[start, stop)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Interval<T> {
    start: T,
    stop: T,
}

/// Interval of physical resource blocks
pub type PrbInterval = Interval<u16>;

/// Interval of OFDM symbols within a slot
pub type OfdmSymbolRange = Interval<u8>;

impl<T: PrimInt + Unsigned> Interval<T> {
    /// Create a new interval
    pub fn new(start: T, stop: T) -> Self {
        debug_assert!(start <= stop, "Invalid interval");
        Self { start, stop }
    }

    /// First element
    pub fn start(&self) -> T {
        self.start
    }

    /// One past the last element
    pub fn stop(&self) -> T {
        self.stop
    }

    /// Number of elements
    pub fn length(&self) -> T {
        self.stop - self.start
    }

    /// Whether the interval has no elements
    pub fn is_empty(&self) -> bool {
        self.start == self.stop
    }

    /// Whether `value` lies inside the interval
    pub fn contains_value(&self, value: T) -> bool {
        self.start <= value && value < self.stop
    }

    /// Whether `other` is fully inside this interval
    pub fn contains(&self, other: &Self) -> bool {
        self.start <= other.start && other.stop <= self.stop
    }

    /// Whether both intervals share at least one element
    pub fn overlaps(&self, other: &Self) -> bool {
        self.start < other.stop && other.start < self.stop
    }

    /// Keep the start and set the length to `len`
    pub fn resize_by(&mut self, len: T) {
        self.stop = self.start + len;
    }

    /// Shift the interval towards zero by `offset`
    pub fn shifted_down(&self, offset: T) -> Self {
        Self::new(self.start - offset, self.stop - offset)
    }
}

impl<T: fmt::Display> fmt::Display for Interval<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.start, self.stop)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overlap() {
        let a = PrbInterval::new(0, 10);
        assert!(a.overlaps(&PrbInterval::new(9, 12)));
        assert!(!a.overlaps(&PrbInterval::new(10, 12)));
        assert!(a.contains(&PrbInterval::new(2, 5)));
        assert!(!a.contains(&PrbInterval::new(8, 11)));
    }

    #[test]
    fn test_resize_and_shift() {
        let mut a = PrbInterval::new(4, 20);
        a.resize_by(6);
        assert_eq!(a, PrbInterval::new(4, 10));
        assert_eq!(a.shifted_down(4), PrbInterval::new(0, 6));
        assert_eq!(a.length(), 6);
        assert!(OfdmSymbolRange::new(3, 3).is_empty());
    }
}
