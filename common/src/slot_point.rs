//! Slot Point
//!
//! Numerology-aware slot counter used as the time axis of the scheduler.
//! A slot point wraps around after 1024 system frames.

use crate::types::SubcarrierSpacing;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::ops::{Add, AddAssign, Sub};

/// Number of system frame numbers before wrap-around
pub const NOF_SFNS: u32 = 1024;

/// A slot in time, tagged with its numerology
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SlotPoint {
    numerology: u8,
    count: u32,
}

impl SlotPoint {
    /// Create a slot point from its absolute count within the SFN cycle
    pub fn new(scs: SubcarrierSpacing, count: u32) -> Self {
        let numerology = scs.numerology();
        Self {
            numerology,
            count: count % (NOF_SFNS * scs.slots_per_frame()),
        }
    }

    /// Create a slot point from system frame number and slot index within the frame
    pub fn from_sfn(scs: SubcarrierSpacing, sfn: u32, slot_index: u32) -> Self {
        Self::new(scs, (sfn % NOF_SFNS) * scs.slots_per_frame() + slot_index % scs.slots_per_frame())
    }

    /// Numerology index
    pub fn numerology(&self) -> u8 {
        self.numerology
    }

    /// Subcarrier spacing of this slot
    pub fn scs(&self) -> SubcarrierSpacing {
        SubcarrierSpacing::from_numerology(self.numerology).unwrap_or(SubcarrierSpacing::Scs15)
    }

    /// Number of slots in a 10 ms frame for this numerology
    pub fn nof_slots_per_frame(&self) -> u32 {
        10 << self.numerology
    }

    /// Number of slots in the full SFN cycle
    pub fn nof_slots_per_system_frame(&self) -> u32 {
        NOF_SFNS * self.nof_slots_per_frame()
    }

    /// System frame number
    pub fn sfn(&self) -> u32 {
        self.count / self.nof_slots_per_frame()
    }

    /// Slot index within the frame
    pub fn slot_index(&self) -> u32 {
        self.count % self.nof_slots_per_frame()
    }

    /// Absolute count within the SFN cycle
    pub fn to_uint(&self) -> u32 {
        self.count
    }
}

impl Add<u32> for SlotPoint {
    type Output = SlotPoint;

    fn add(self, rhs: u32) -> SlotPoint {
        let modulus = self.nof_slots_per_system_frame() as u64;
        SlotPoint {
            numerology: self.numerology,
            count: ((self.count as u64 + rhs as u64) % modulus) as u32,
        }
    }
}

impl AddAssign<u32> for SlotPoint {
    fn add_assign(&mut self, rhs: u32) {
        *self = *self + rhs;
    }
}

impl Sub<u32> for SlotPoint {
    type Output = SlotPoint;

    fn sub(self, rhs: u32) -> SlotPoint {
        let modulus = self.nof_slots_per_system_frame();
        SlotPoint {
            numerology: self.numerology,
            count: (self.count + modulus - rhs % modulus) % modulus,
        }
    }
}

/// Signed distance in slots, resolved to the nearest representative of the wrap-around
impl Sub<SlotPoint> for SlotPoint {
    type Output = i32;

    fn sub(self, rhs: SlotPoint) -> i32 {
        debug_assert_eq!(self.numerology, rhs.numerology, "Comparing slots of different numerologies");
        let modulus = self.nof_slots_per_system_frame() as i32;
        let mut diff = (self.count as i32 - rhs.count as i32).rem_euclid(modulus);
        if diff >= modulus / 2 {
            diff -= modulus;
        }
        diff
    }
}

impl PartialOrd for SlotPoint {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        if self.numerology != other.numerology {
            return None;
        }
        Some((*self - *other).cmp(&0))
    }
}

impl fmt::Display for SlotPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.sfn(), self.slot_index())
    }
}

/// Half-open interval of slots `[start, stop)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotInterval {
    start: SlotPoint,
    stop: SlotPoint,
}

impl SlotInterval {
    /// Create a new slot interval
    pub fn new(start: SlotPoint, stop: SlotPoint) -> Self {
        debug_assert!(start <= stop, "Invalid slot interval [{}, {})", start, stop);
        Self { start, stop }
    }

    /// First slot of the interval
    pub fn start(&self) -> SlotPoint {
        self.start
    }

    /// First slot past the interval
    pub fn stop(&self) -> SlotPoint {
        self.stop
    }

    /// Number of slots in the interval
    pub fn length(&self) -> u32 {
        (self.stop - self.start).max(0) as u32
    }

    /// Whether `slot` lies inside the interval
    pub fn contains(&self, slot: SlotPoint) -> bool {
        self.start <= slot && slot < self.stop
    }
}

impl fmt::Display for SlotInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.start, self.stop)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sfn_and_slot_index() {
        let sl = SlotPoint::from_sfn(SubcarrierSpacing::Scs30, 5, 7);
        assert_eq!(sl.sfn(), 5);
        assert_eq!(sl.slot_index(), 7);
        assert_eq!(sl.to_uint(), 5 * 20 + 7);
        assert_eq!(format!("{}", sl), "5.7");
    }

    #[test]
    fn test_wrap_around() {
        let last = SlotPoint::from_sfn(SubcarrierSpacing::Scs15, 1023, 9);
        let next = last + 1;
        assert_eq!(next.sfn(), 0);
        assert_eq!(next.slot_index(), 0);
        assert_eq!(next - last, 1);
        assert!(next > last);
        assert_eq!(next - 1, last);
    }

    #[test]
    fn test_ordering_and_distance() {
        let a = SlotPoint::new(SubcarrierSpacing::Scs15, 100);
        let b = a + 25;
        assert!(a < b);
        assert_eq!(b - a, 25);
        assert_eq!(a - b, -25);
        assert!(SlotPoint::new(SubcarrierSpacing::Scs30, 0)
            .partial_cmp(&SlotPoint::new(SubcarrierSpacing::Scs15, 0))
            .is_none());
    }

    #[test]
    fn test_slot_interval() {
        let start = SlotPoint::new(SubcarrierSpacing::Scs15, 10240 - 2);
        let win = SlotInterval::new(start, start + 10);
        assert_eq!(win.length(), 10);
        assert!(win.contains(start));
        assert!(win.contains(start + 5));
        assert!(!win.contains(start + 10));
        assert!(!win.contains(start - 1));
    }
}
