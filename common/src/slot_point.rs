//! Slot clock for 5G NR scheduling
//!
//! A `SlotPoint` is a (SFN, slot) pair for a given numerology, stored as a
//! slot count that wraps every system frame period (1024 frames).

use std::cmp::Ordering;
use std::fmt;
use std::ops::{Add, AddAssign, Sub};

/// Number of radio frames in a system frame period
pub const NOF_SFNS: u32 = 1024;

/// Point in time with slot granularity
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct SlotPoint {
    numerology: u8,
    count: u32,
}

impl SlotPoint {
    /// Create a slot point from SFN and slot index within the frame
    pub fn new(numerology: u8, sfn: u32, slot_index: u32) -> Self {
        let slots_per_frame = Self::slots_per_frame_for(numerology);
        assert!(sfn < NOF_SFNS, "Invalid SFN={}", sfn);
        assert!(slot_index < slots_per_frame, "Invalid slot index={}", slot_index);
        Self { numerology, count: sfn * slots_per_frame + slot_index }
    }

    /// Create a slot point from an absolute slot count, wrapped to the system frame period
    pub fn from_count(numerology: u8, count: u32) -> Self {
        let period = Self::slots_per_frame_for(numerology) * NOF_SFNS;
        Self { numerology, count: count % period }
    }

    fn slots_per_frame_for(numerology: u8) -> u32 {
        assert!(numerology <= 4, "Invalid numerology={}", numerology);
        10 << numerology
    }

    pub fn numerology(&self) -> u8 {
        self.numerology
    }

    /// Slot count inside the system frame period
    pub fn count(&self) -> u32 {
        self.count
    }

    pub fn nof_slots_per_frame(&self) -> u32 {
        Self::slots_per_frame_for(self.numerology)
    }

    /// Number of slots in a full system frame period (1024 frames)
    pub fn nof_slots_per_system_frame(&self) -> u32 {
        self.nof_slots_per_frame() * NOF_SFNS
    }

    pub fn sfn(&self) -> u32 {
        self.count / self.nof_slots_per_frame()
    }

    pub fn slot_index(&self) -> u32 {
        self.count % self.nof_slots_per_frame()
    }

    /// Signed distance `self - other` in slots, resolved to the nearest wrap
    pub fn diff(&self, other: &SlotPoint) -> i32 {
        assert_eq!(self.numerology, other.numerology, "Comparing slots of different numerologies");
        let period = self.nof_slots_per_system_frame() as i64;
        let mut d = self.count as i64 - other.count as i64;
        if d >= period / 2 {
            d -= period;
        } else if d < -period / 2 {
            d += period;
        }
        d as i32
    }

    fn offset(&self, nof_slots: i64) -> Self {
        let period = self.nof_slots_per_system_frame() as i64;
        let count = (self.count as i64 + nof_slots).rem_euclid(period);
        Self { numerology: self.numerology, count: count as u32 }
    }
}

impl Add<u32> for SlotPoint {
    type Output = SlotPoint;

    fn add(self, rhs: u32) -> SlotPoint {
        self.offset(rhs as i64)
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
        self.offset(-(rhs as i64))
    }
}

impl Sub<SlotPoint> for SlotPoint {
    type Output = i32;

    fn sub(self, rhs: SlotPoint) -> i32 {
        self.diff(&rhs)
    }
}

/// Ordering is only meaningful for points less than half a system frame
/// period apart, which is always the case within a scheduling window.
impl Ord for SlotPoint {
    fn cmp(&self, other: &Self) -> Ordering {
        self.diff(other).cmp(&0)
    }
}

impl PartialOrd for SlotPoint {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for SlotPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.sfn(), self.slot_index())
    }
}

impl fmt::Debug for SlotPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.sfn(), self.slot_index())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slot_fields() {
        let slot = SlotPoint::new(1, 5, 13);
        assert_eq!(slot.sfn(), 5);
        assert_eq!(slot.slot_index(), 13);
        assert_eq!(slot.count(), 113);
        assert_eq!(slot.nof_slots_per_system_frame(), 20480);
        assert_eq!(format!("{}", slot), "5.13");
    }

    #[test]
    fn test_add_wraps_system_frame() {
        let last = SlotPoint::new(0, 1023, 9);
        let next = last + 1;
        assert_eq!(next.sfn(), 0);
        assert_eq!(next.slot_index(), 0);
        assert_eq!(next - last, 1);
        assert_eq!(last - next, -1);
        assert!(next > last);
        assert_eq!(next - 1, last);
    }

    #[test]
    fn test_diff_across_many_wraps() {
        let mut slot = SlotPoint::from_count(0, 0);
        for _ in 0..5000 {
            let later = slot + 37;
            assert_eq!(later.diff(&slot), 37);
            assert_eq!(slot.diff(&later), -37);
            slot = later;
        }
    }
}
