//! Cell Resource Bookkeeping
//!
//! CRB usage per OFDM symbol and the per-slot scheduling results, kept in a
//! ring of upcoming slots so grants can be placed at k0/k1/k2 offsets.

use common::types::{CrbInterval, OfdmSymbolRange};
use common::SlotPoint;
use tracing::trace;

use super::result::SchedResult;

/// Number of consecutive slots the cell allocator tracks. Divides every system frame period.
pub const RING_ALLOCATOR_SIZE: usize = 32;

/// CRB occupancy of one direction in one slot
#[derive(Debug, Clone)]
pub struct SlotResourceGrid {
    /// Number of CRBs of the carrier
    nof_crbs: u16,
    /// Used CRBs, per OFDM symbol
    symbols: Vec<Vec<bool>>,
}

impl SlotResourceGrid {
    pub fn new(nof_crbs: u16) -> Self {
        Self {
            nof_crbs,
            symbols: vec![vec![false; nof_crbs as usize]; OfdmSymbolRange::NOF_SYMBOLS_PER_SLOT as usize],
        }
    }

    pub fn nof_crbs(&self) -> u16 {
        self.nof_crbs
    }

    /// Mark the CRBs as used over the symbols
    pub fn fill(&mut self, symbols: OfdmSymbolRange, crbs: CrbInterval) {
        assert!(crbs.stop <= self.nof_crbs, "CRBs {} outside the carrier", crbs);
        for symbol in symbols.start..symbols.stop {
            self.symbols[symbol as usize][crbs.start as usize..crbs.stop as usize].fill(true);
        }
    }

    /// Whether any of the CRBs is already used in any of the symbols
    pub fn collides(&self, symbols: OfdmSymbolRange, crbs: CrbInterval) -> bool {
        if crbs.stop > self.nof_crbs {
            return true;
        }
        (symbols.start..symbols.stop).any(|symbol| {
            self.symbols[symbol as usize][crbs.start as usize..crbs.stop as usize]
                .iter()
                .any(|used| *used)
        })
    }

    /// Number of used CRBs in a symbol
    pub fn nof_used_crbs(&self, symbol: u8) -> usize {
        self.symbols[symbol as usize].iter().filter(|used| **used).count()
    }

    pub fn clear(&mut self) {
        for symbol in self.symbols.iter_mut() {
            symbol.fill(false);
        }
    }
}

/// Grids and results of one slot
#[derive(Debug, Clone)]
pub struct CellSlotResourceAllocator {
    pub slot: SlotPoint,
    pub dl_res_grid: SlotResourceGrid,
    pub ul_res_grid: SlotResourceGrid,
    pub result: SchedResult,
}

impl CellSlotResourceAllocator {
    fn new(slot: SlotPoint, nof_crbs: u16) -> Self {
        Self {
            slot,
            dl_res_grid: SlotResourceGrid::new(nof_crbs),
            ul_res_grid: SlotResourceGrid::new(nof_crbs),
            result: SchedResult::new(slot),
        }
    }

    fn reset(&mut self, slot: SlotPoint) {
        self.slot = slot;
        self.dl_res_grid.clear();
        self.ul_res_grid.clear();
        self.result = SchedResult::new(slot);
    }
}

/// Ring of slot allocators starting at the current scheduling slot
#[derive(Debug, Clone)]
pub struct CellResourceAllocator {
    slots: Vec<CellSlotResourceAllocator>,
    last_slot: Option<SlotPoint>,
}

impl CellResourceAllocator {
    /// `nof_crbs` covers the whole carrier, CRB 0 being point A
    pub fn new(numerology: u8, nof_crbs: u16) -> Self {
        let slots = (0..RING_ALLOCATOR_SIZE)
            .map(|i| CellSlotResourceAllocator::new(SlotPoint::from_count(numerology, i as u32), nof_crbs))
            .collect();
        Self { slots, last_slot: None }
    }

    fn ring_index(slot: SlotPoint) -> usize {
        slot.count() as usize % RING_ALLOCATOR_SIZE
    }

    /// Move the window to start at `slot`. Slots that left the window are recycled.
    pub fn slot_indication(&mut self, slot: SlotPoint) {
        match self.last_slot {
            Some(last) if slot - last == 1 => {
                let idx = Self::ring_index(last);
                self.slots[idx].reset(last + RING_ALLOCATOR_SIZE as u32);
            }
            _ => {
                trace!("Resetting cell resource allocator at slot={}", slot);
                for i in 0..RING_ALLOCATOR_SIZE as u32 {
                    let s = slot + i;
                    self.slots[Self::ring_index(s)].reset(s);
                }
            }
        }
        self.last_slot = Some(slot);
    }

    /// Current scheduling slot
    pub fn slot_tx(&self) -> Option<SlotPoint> {
        self.last_slot
    }

    /// Slot allocator `offset` slots ahead of the current slot
    pub fn slot_alloc(&self, offset: u32) -> &CellSlotResourceAllocator {
        &self.slots[self.offset_index(offset)]
    }

    pub fn slot_alloc_mut(&mut self, offset: u32) -> &mut CellSlotResourceAllocator {
        let idx = self.offset_index(offset);
        &mut self.slots[idx]
    }

    fn offset_index(&self, offset: u32) -> usize {
        assert!(
            (offset as usize) < RING_ALLOCATOR_SIZE,
            "Slot offset {} beyond the allocator window",
            offset
        );
        let current = self
            .last_slot
            .unwrap_or_else(|| self.slots[0].slot);
        Self::ring_index(current + offset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grid_fill_and_collision() {
        let mut grid = SlotResourceGrid::new(52);
        let symbols = OfdmSymbolRange::new(2, 14);
        assert!(!grid.collides(symbols, CrbInterval::new(0, 52)));

        grid.fill(symbols, CrbInterval::new(10, 20));
        assert!(grid.collides(symbols, CrbInterval::new(19, 25)));
        assert!(!grid.collides(symbols, CrbInterval::new(20, 25)));
        assert!(!grid.collides(OfdmSymbolRange::new(0, 2), CrbInterval::new(10, 20)));
        assert!(grid.collides(symbols, CrbInterval::new(50, 53)));
        assert_eq!(grid.nof_used_crbs(5), 10);
        assert_eq!(grid.nof_used_crbs(0), 0);

        grid.clear();
        assert!(!grid.collides(symbols, CrbInterval::new(10, 20)));
    }

    #[test]
    fn test_ring_tracks_slots() {
        let mut res_alloc = CellResourceAllocator::new(0, 52);
        let start = SlotPoint::from_count(0, 100);
        res_alloc.slot_indication(start);
        assert_eq!(res_alloc.slot_tx(), Some(start));
        for offset in 0..RING_ALLOCATOR_SIZE as u32 {
            assert_eq!(res_alloc.slot_alloc(offset).slot, start + offset);
            assert_eq!(res_alloc.slot_alloc(offset).result.slot, start + offset);
        }

        res_alloc
            .slot_alloc_mut(4)
            .dl_res_grid
            .fill(OfdmSymbolRange::default(), CrbInterval::new(0, 10));
        for i in 1..=4 {
            res_alloc.slot_indication(start + i);
        }
        let sl = res_alloc.slot_alloc(0);
        assert_eq!(sl.slot, start + 4);
        assert!(sl.dl_res_grid.collides(OfdmSymbolRange::default(), CrbInterval::new(0, 1)));
        assert_eq!(res_alloc.slot_alloc(RING_ALLOCATOR_SIZE as u32 - 1).slot, start + 4 + 31);
    }

    #[test]
    fn test_recycled_slot_is_clean() {
        let mut res_alloc = CellResourceAllocator::new(1, 51);
        let start = SlotPoint::from_count(1, 0);
        res_alloc.slot_indication(start);
        res_alloc
            .slot_alloc_mut(0)
            .ul_res_grid
            .fill(OfdmSymbolRange::default(), CrbInterval::new(0, 51));
        for i in 1..=RING_ALLOCATOR_SIZE as u32 {
            res_alloc.slot_indication(start + i);
        }
        let sl = res_alloc.slot_alloc(0);
        assert_eq!(sl.slot, start + RING_ALLOCATOR_SIZE as u32);
        assert_eq!(sl.ul_res_grid.nof_used_crbs(0), 0);
    }

    #[test]
    #[should_panic]
    fn test_offset_beyond_window_panics() {
        let res_alloc = CellResourceAllocator::new(0, 52);
        res_alloc.slot_alloc(RING_ALLOCATOR_SIZE as u32);
    }
}
