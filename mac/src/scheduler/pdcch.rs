//! PDCCH Resource Allocation
//!
//! Reserves PDCCH candidates in the CORESET CCE space according to the
//! search space hashing function of TS 38.213 10.1.

use common::types::{AggregationLevel, Rnti};
use common::SlotPoint;
use tracing::{debug, trace};

use super::resource_grid::CellSlotResourceAllocator;
use super::result::{PdcchContext, PdcchDlInformation, PdcchUlInformation};
use crate::config::{SearchSpaceConfig, SearchSpaceType};

/// PDCCH candidate reservation for UE grants
pub trait PdcchResourceAllocator: Send {
    /// Reserve a candidate for a DL assignment. Returns its position in the slot DL PDCCH list.
    fn alloc_dl_pdcch_ue(
        &mut self,
        slot_alloc: &mut CellSlotResourceAllocator,
        rnti: Rnti,
        ss: &SearchSpaceConfig,
        aggr_lvl: AggregationLevel,
    ) -> Option<usize>;

    /// Reserve a candidate for a UL grant. Returns its position in the slot UL PDCCH list.
    fn alloc_ul_pdcch_ue(
        &mut self,
        slot_alloc: &mut CellSlotResourceAllocator,
        rnti: Rnti,
        ss: &SearchSpaceConfig,
        aggr_lvl: AggregationLevel,
    ) -> Option<usize>;

    /// Release the last candidate reserved in the slot. Returns false if there is none.
    fn cancel_last_pdcch(&mut self, slot_alloc: &mut CellSlotResourceAllocator) -> bool;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PdcchDirection {
    Dl,
    Ul,
}

/// CCE based allocator over a single CORESET
#[derive(Debug, Clone)]
pub struct CcePdcchAllocator {
    /// CORESET size in CCEs
    nof_cces: u32,
    /// Max PDCCHs (DL + UL) per slot
    max_pdcchs_per_slot: usize,
    /// Reservations of the slot being scheduled, in order
    records: Vec<(SlotPoint, PdcchDirection)>,
}

/// TS 38.213 10.1, A_p for p mod 3 == 0
const HASH_A: u64 = 39827;
const HASH_D: u64 = 65537;

impl CcePdcchAllocator {
    pub fn new(nof_cces: u32, max_pdcchs_per_slot: usize) -> Self {
        Self { nof_cces, max_pdcchs_per_slot, records: Vec::new() }
    }

    fn used_cces(&self, slot_alloc: &CellSlotResourceAllocator) -> Vec<bool> {
        let mut used = vec![false; self.nof_cces as usize];
        let contexts = slot_alloc
            .result
            .dl
            .dl_pdcchs
            .iter()
            .map(|p| &p.ctx)
            .chain(slot_alloc.result.dl.ul_pdcchs.iter().map(|p| &p.ctx));
        for ctx in contexts {
            let start = ctx.ncce as usize;
            let stop = (start + ctx.aggr_lvl.nof_cces() as usize).min(used.len());
            used[start..stop].fill(true);
        }
        used
    }

    /// Y_p,n of the hashing function. Zero for common search spaces.
    fn hash_offset(ss: &SearchSpaceConfig, rnti: Rnti, slot: SlotPoint) -> u64 {
        if ss.ss_type == SearchSpaceType::Common {
            return 0;
        }
        let mut y = rnti.value() as u64;
        for _ in 0..=slot.slot_index() {
            y = (HASH_A * y) % HASH_D;
        }
        y
    }

    /// First CCE of every candidate of the search space at the aggregation level
    fn candidates(&self, ss: &SearchSpaceConfig, rnti: Rnti, slot: SlotPoint, aggr_lvl: AggregationLevel) -> Vec<u32> {
        let l = aggr_lvl.nof_cces() as u64;
        let nof_positions = self.nof_cces as u64 / l;
        let nof_candidates = ss.nof_candidates(aggr_lvl) as u64;
        if nof_positions == 0 || nof_candidates == 0 {
            return Vec::new();
        }
        let y = Self::hash_offset(ss, rnti, slot);
        (0..nof_candidates)
            .map(|m| {
                let pos = (y + (m * self.nof_cces as u64) / (l * nof_candidates)) % nof_positions;
                (l * pos) as u32
            })
            .collect()
    }

    fn alloc_pdcch(
        &mut self,
        slot_alloc: &mut CellSlotResourceAllocator,
        rnti: Rnti,
        ss: &SearchSpaceConfig,
        aggr_lvl: AggregationLevel,
        dir: PdcchDirection,
    ) -> Option<usize> {
        let nof_pdcchs = slot_alloc.result.dl.dl_pdcchs.len() + slot_alloc.result.dl.ul_pdcchs.len();
        if nof_pdcchs >= self.max_pdcchs_per_slot {
            debug!(rnti = %rnti, "PDCCH allocation failed. Max PDCCHs per slot reached");
            return None;
        }

        let used = self.used_cces(slot_alloc);
        let nof_cces = aggr_lvl.nof_cces() as usize;
        let ncce = self
            .candidates(ss, rnti, slot_alloc.slot, aggr_lvl)
            .into_iter()
            .find(|&ncce| {
                let start = ncce as usize;
                start + nof_cces <= used.len() && !used[start..start + nof_cces].iter().any(|u| *u)
            });
        let Some(ncce) = ncce else {
            debug!(
                rnti = %rnti, "PDCCH allocation failed. No free candidate in ss={} at AL={}",
                ss.id.0, aggr_lvl.nof_cces()
            );
            return None;
        };

        let ctx = PdcchContext { rnti, ss_id: ss.id, aggr_lvl, ncce };
        trace!(rnti = %rnti, "PDCCH allocated at slot={} ncce={}", slot_alloc.slot, ncce);

        self.records.retain(|(slot, _)| *slot == slot_alloc.slot);
        self.records.push((slot_alloc.slot, dir));
        let pos = match dir {
            PdcchDirection::Dl => {
                slot_alloc.result.dl.dl_pdcchs.push(PdcchDlInformation { ctx, dci: None });
                slot_alloc.result.dl.dl_pdcchs.len() - 1
            }
            PdcchDirection::Ul => {
                slot_alloc.result.dl.ul_pdcchs.push(PdcchUlInformation { ctx, dci: None });
                slot_alloc.result.dl.ul_pdcchs.len() - 1
            }
        };
        Some(pos)
    }
}

impl PdcchResourceAllocator for CcePdcchAllocator {
    fn alloc_dl_pdcch_ue(
        &mut self,
        slot_alloc: &mut CellSlotResourceAllocator,
        rnti: Rnti,
        ss: &SearchSpaceConfig,
        aggr_lvl: AggregationLevel,
    ) -> Option<usize> {
        self.alloc_pdcch(slot_alloc, rnti, ss, aggr_lvl, PdcchDirection::Dl)
    }

    fn alloc_ul_pdcch_ue(
        &mut self,
        slot_alloc: &mut CellSlotResourceAllocator,
        rnti: Rnti,
        ss: &SearchSpaceConfig,
        aggr_lvl: AggregationLevel,
    ) -> Option<usize> {
        self.alloc_pdcch(slot_alloc, rnti, ss, aggr_lvl, PdcchDirection::Ul)
    }

    fn cancel_last_pdcch(&mut self, slot_alloc: &mut CellSlotResourceAllocator) -> bool {
        let Some((slot, dir)) = self.records.last().copied() else {
            return false;
        };
        if slot != slot_alloc.slot {
            return false;
        }
        self.records.pop();
        match dir {
            PdcchDirection::Dl => slot_alloc.result.dl.dl_pdcchs.pop().is_some(),
            PdcchDirection::Ul => slot_alloc.result.dl.ul_pdcchs.pop().is_some(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CellConfig;
    use crate::scheduler::resource_grid::CellResourceAllocator;
    use common::types::{DuCellIndex, SubcarrierSpacing};

    fn setup() -> (CellConfig, CellResourceAllocator) {
        let cfg = CellConfig::new_fdd(DuCellIndex(0), SubcarrierSpacing::Scs15, 52);
        let mut res_alloc = CellResourceAllocator::new(0, 52);
        res_alloc.slot_indication(SlotPoint::from_count(0, 3));
        (cfg, res_alloc)
    }

    #[test]
    fn test_common_ss_candidates_do_not_overlap() {
        let (cfg, mut res_alloc) = setup();
        let ss = cfg.find_search_space(cfg.ra_search_space_id).unwrap().clone();
        let mut pdcch = CcePdcchAllocator::new(cfg.coreset_nof_cces, 16);
        let slot_alloc = res_alloc.slot_alloc_mut(0);

        // Two AL4 candidates configured in the common SearchSpace
        assert_eq!(pdcch.alloc_dl_pdcch_ue(slot_alloc, Rnti(0x4601), &ss, AggregationLevel::N4), Some(0));
        assert_eq!(pdcch.alloc_ul_pdcch_ue(slot_alloc, Rnti(0x4602), &ss, AggregationLevel::N4), Some(0));
        assert_eq!(pdcch.alloc_dl_pdcch_ue(slot_alloc, Rnti(0x4603), &ss, AggregationLevel::N4), None);

        let a = slot_alloc.result.dl.dl_pdcchs[0].ctx.ncce;
        let b = slot_alloc.result.dl.ul_pdcchs[0].ctx.ncce;
        assert_ne!(a, b);
        assert_eq!(a % 4, 0);
        assert_eq!(b % 4, 0);
    }

    #[test]
    fn test_ue_specific_candidates_within_coreset() {
        let (cfg, mut res_alloc) = setup();
        let ss = cfg.find_search_space(common::SearchSpaceId(2)).unwrap().clone();
        let mut pdcch = CcePdcchAllocator::new(cfg.coreset_nof_cces, 16);
        let slot_alloc = res_alloc.slot_alloc_mut(0);
        for rnti in 0x4601..0x4605 {
            if let Some(pos) = pdcch.alloc_dl_pdcch_ue(slot_alloc, Rnti(rnti), &ss, AggregationLevel::N2) {
                let ctx = slot_alloc.result.dl.dl_pdcchs[pos].ctx;
                assert!(ctx.ncce + 2 <= cfg.coreset_nof_cces);
                assert_eq!(ctx.rnti, Rnti(rnti));
            }
        }
        assert!(!slot_alloc.result.dl.dl_pdcchs.is_empty());
    }

    #[test]
    fn test_no_candidates_at_aggregation_level() {
        let (cfg, mut res_alloc) = setup();
        let ss = cfg.find_search_space(cfg.ra_search_space_id).unwrap().clone();
        let mut pdcch = CcePdcchAllocator::new(cfg.coreset_nof_cces, 16);
        let slot_alloc = res_alloc.slot_alloc_mut(0);
        assert_eq!(pdcch.alloc_dl_pdcch_ue(slot_alloc, Rnti(0x4601), &ss, AggregationLevel::N1), None);
        assert!(slot_alloc.result.dl.dl_pdcchs.is_empty());
    }

    #[test]
    fn test_max_pdcchs_per_slot() {
        let (cfg, mut res_alloc) = setup();
        let ss = cfg.find_search_space(cfg.ra_search_space_id).unwrap().clone();
        let mut pdcch = CcePdcchAllocator::new(cfg.coreset_nof_cces, 1);
        let slot_alloc = res_alloc.slot_alloc_mut(0);
        assert!(pdcch.alloc_dl_pdcch_ue(slot_alloc, Rnti(0x4601), &ss, AggregationLevel::N4).is_some());
        assert!(pdcch.alloc_ul_pdcch_ue(slot_alloc, Rnti(0x4601), &ss, AggregationLevel::N8).is_none());
    }

    #[test]
    fn test_cancel_last_pdcch() {
        let (cfg, mut res_alloc) = setup();
        let ss = cfg.find_search_space(cfg.ra_search_space_id).unwrap().clone();
        let mut pdcch = CcePdcchAllocator::new(cfg.coreset_nof_cces, 16);
        let slot_alloc = res_alloc.slot_alloc_mut(0);
        assert!(!pdcch.cancel_last_pdcch(slot_alloc));

        pdcch.alloc_dl_pdcch_ue(slot_alloc, Rnti(0x4601), &ss, AggregationLevel::N4);
        pdcch.alloc_ul_pdcch_ue(slot_alloc, Rnti(0x4601), &ss, AggregationLevel::N4);
        assert!(pdcch.cancel_last_pdcch(slot_alloc));
        assert_eq!(slot_alloc.result.dl.dl_pdcchs.len(), 1);
        assert!(slot_alloc.result.dl.ul_pdcchs.is_empty());

        // The released CCEs can be reused
        assert!(pdcch.alloc_ul_pdcch_ue(slot_alloc, Rnti(0x4602), &ss, AggregationLevel::N4).is_some());
    }
}
