//! Common Types for the 5G NR MAC scheduler
//!
//! Defines the identifiers and resource intervals shared by the HARQ engine
//! and the grant allocator

use std::fmt;

use num_derive::{FromPrimitive, ToPrimitive};
use serde::{Deserialize, Serialize};

/// Radio Network Temporary Identifier (RNTI)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rnti(pub u16);

impl Rnti {
    /// Create a new RNTI
    pub fn new(value: u16) -> Self {
        Self(value)
    }

    /// Get the RNTI value
    pub fn value(&self) -> u16 {
        self.0
    }
}

impl fmt::Display for Rnti {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#06x}", self.0)
    }
}

/// UE index inside the DU
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DuUeIndex(pub u16);

/// Cell index inside the DU
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DuCellIndex(pub u8);

impl DuCellIndex {
    /// Index usable for table lookups
    pub fn as_usize(&self) -> usize {
        self.0 as usize
    }
}

/// HARQ process identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct HarqId(pub u8);

impl HarqId {
    /// Maximum number of HARQ processes per direction addressable by the
    /// 4-bit HARQ process number of DCI formats 0_x and 1_x (TS 38.212 7.3.1)
    pub const MAX_NOF_HARQS: usize = 16;

    /// Index into a HARQ process pool
    pub fn as_usize(&self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for HarqId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// SearchSpace identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SearchSpaceId(pub u8);

/// Subcarrier spacing values in kHz
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromPrimitive, ToPrimitive, Serialize, Deserialize)]
pub enum SubcarrierSpacing {
    /// 15 kHz
    Scs15 = 15,
    /// 30 kHz
    Scs30 = 30,
    /// 60 kHz
    Scs60 = 60,
    /// 120 kHz
    Scs120 = 120,
    /// 240 kHz
    Scs240 = 240,
}

impl SubcarrierSpacing {
    /// Numerology index (mu) of this subcarrier spacing
    pub fn numerology(&self) -> u8 {
        match self {
            SubcarrierSpacing::Scs15 => 0,
            SubcarrierSpacing::Scs30 => 1,
            SubcarrierSpacing::Scs60 => 2,
            SubcarrierSpacing::Scs120 => 3,
            SubcarrierSpacing::Scs240 => 4,
        }
    }

    /// Number of slots per 10 ms frame
    pub fn slots_per_frame(&self) -> u32 {
        10 << self.numerology()
    }
}

/// Duplex mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DuplexMode {
    /// Frequency Division Duplex
    Fdd,
    /// Time Division Duplex
    Tdd,
}

/// PDCCH aggregation level (number of CCEs per candidate)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AggregationLevel {
    N1,
    N2,
    N4,
    N8,
    N16,
}

impl AggregationLevel {
    /// Number of aggregation levels defined in TS 38.213
    pub const COUNT: usize = 5;

    /// Number of CCEs occupied by a candidate of this level
    pub fn nof_cces(&self) -> u32 {
        1 << self.index()
    }

    /// Position of this level in per-level tables
    pub fn index(&self) -> usize {
        match self {
            AggregationLevel::N1 => 0,
            AggregationLevel::N2 => 1,
            AggregationLevel::N4 => 2,
            AggregationLevel::N8 => 3,
            AggregationLevel::N16 => 4,
        }
    }
}

/// Contiguous interval of resource blocks `[start, stop)`
///
/// Used both for common resource blocks (relative to point A) and for
/// physical resource blocks (relative to the BWP start).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RbInterval {
    pub start: u16,
    pub stop: u16,
}

/// Interval of common resource blocks
pub type CrbInterval = RbInterval;
/// Interval of physical resource blocks
pub type PrbInterval = RbInterval;

impl RbInterval {
    pub fn new(start: u16, stop: u16) -> Self {
        assert!(start <= stop, "Invalid RB interval [{}, {})", start, stop);
        Self { start, stop }
    }

    pub fn length(&self) -> u16 {
        self.stop - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.stop
    }

    /// Whether `other` lies entirely inside this interval
    pub fn contains(&self, other: &RbInterval) -> bool {
        other.start >= self.start && other.stop <= self.stop
    }

    pub fn overlaps(&self, other: &RbInterval) -> bool {
        self.start < other.stop && other.start < self.stop
    }
}

impl fmt::Display for RbInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.start, self.stop)
    }
}

/// Range of OFDM symbols `[start, stop)` inside a slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OfdmSymbolRange {
    pub start: u8,
    pub stop: u8,
}

impl OfdmSymbolRange {
    /// Number of OFDM symbols in a slot with normal cyclic prefix
    pub const NOF_SYMBOLS_PER_SLOT: u8 = 14;

    pub fn new(start: u8, stop: u8) -> Self {
        assert!(
            start <= stop && stop <= Self::NOF_SYMBOLS_PER_SLOT,
            "Invalid OFDM symbol range [{}, {})",
            start,
            stop
        );
        Self { start, stop }
    }

    pub fn length(&self) -> u8 {
        self.stop - self.start
    }
}

impl Default for OfdmSymbolRange {
    fn default() -> Self {
        Self { start: 0, stop: Self::NOF_SYMBOLS_PER_SLOT }
    }
}
