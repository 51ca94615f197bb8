//! UCI Allocation
//!
//! Places HARQ-ACK bits of DL grants on PUCCH, or on the UE PUSCH when one
//! is already scheduled in the UCI slot.

use common::types::Rnti;
use tracing::debug;

use super::resource_grid::CellSlotResourceAllocator;
use super::result::{PucchFormat, PucchInfo, UciOnPusch};

/// Where the HARQ-ACK bit of a DL grant will be reported
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UciAllocation {
    /// PUCCH resource indicator signalled in the DCI
    pub pucch_res_indicator: u8,
    /// Position of the HARQ-ACK bit in the UCI payload
    pub harq_bit_idx: u8,
    /// The bit is multiplexed on a PUSCH
    pub on_pusch: bool,
}

/// UCI resource reservation for UE grants
pub trait UciAllocator: Send {
    /// Reserve one HARQ-ACK bit for the UE in the slot, using at most `max_format`
    fn alloc_uci_harq_ue(
        &mut self,
        slot_alloc: &mut CellSlotResourceAllocator,
        rnti: Rnti,
        max_format: PucchFormat,
    ) -> Option<UciAllocation>;

    /// Move the UCI the PUSCH owner has on PUCCH in the slot onto the PUSCH
    fn multiplex_uci_on_pusch(&mut self, slot_alloc: &mut CellSlotResourceAllocator, pusch_idx: usize);
}

/// PUCCH format 1 / format 2 allocator over a common set of resources
#[derive(Debug, Clone)]
pub struct PucchUciAllocator {
    nof_pucch_resources: u8,
    max_pucchs_per_slot: usize,
    max_harq_bits_f1: u8,
    max_harq_bits_f2: u8,
}

impl PucchUciAllocator {
    pub fn new(nof_pucch_resources: u8, max_pucchs_per_slot: usize, max_harq_bits_f1: u8, max_harq_bits_f2: u8) -> Self {
        Self { nof_pucch_resources, max_pucchs_per_slot, max_harq_bits_f1, max_harq_bits_f2 }
    }
}

impl UciAllocator for PucchUciAllocator {
    fn alloc_uci_harq_ue(
        &mut self,
        slot_alloc: &mut CellSlotResourceAllocator,
        rnti: Rnti,
        max_format: PucchFormat,
    ) -> Option<UciAllocation> {
        let slot = slot_alloc.slot;
        let ul = &mut slot_alloc.result.ul;

        if let Some(pusch) = ul.puschs.iter_mut().find(|p| p.pusch_cfg.rnti == rnti) {
            let uci = pusch.uci.get_or_insert_with(UciOnPusch::default);
            if uci.harq_ack_nof_bits >= self.max_harq_bits_f2 {
                debug!(rnti = %rnti, "No space left for HARQ-ACK on PUSCH at slot={}", slot);
                return None;
            }
            let harq_bit_idx = uci.harq_ack_nof_bits;
            uci.harq_ack_nof_bits += 1;
            return Some(UciAllocation { pucch_res_indicator: 0, harq_bit_idx, on_pusch: true });
        }

        if let Some(pucch) = ul.pucchs.iter_mut().find(|p| p.rnti == rnti) {
            let nof_bits = pucch.harq_ack_nof_bits + 1;
            let format = match pucch.format {
                PucchFormat::F1 if nof_bits <= self.max_harq_bits_f1 => PucchFormat::F1,
                _ if max_format == PucchFormat::F2 || pucch.format == PucchFormat::F2 => {
                    if nof_bits > self.max_harq_bits_f2 {
                        debug!(rnti = %rnti, "PUCCH F2 capacity exceeded at slot={}", slot);
                        return None;
                    }
                    PucchFormat::F2
                }
                _ => return None,
            };
            let harq_bit_idx = pucch.harq_ack_nof_bits;
            pucch.format = format;
            pucch.harq_ack_nof_bits = nof_bits;
            return Some(UciAllocation {
                pucch_res_indicator: pucch.resource_indicator,
                harq_bit_idx,
                on_pusch: false,
            });
        }

        if ul.pucchs.len() >= self.max_pucchs_per_slot {
            debug!(rnti = %rnti, "PUCCH allocation failed. Max PUCCHs per slot reached at slot={}", slot);
            return None;
        }
        // Indicators stay unique in the slot across formats. A format 2 upgrade keeps the indicator
        // already signalled to the UE, which then selects from the larger payload resource set.
        let free_res = (0..self.nof_pucch_resources.min(8))
            .find(|res| !ul.pucchs.iter().any(|p| p.resource_indicator == *res));
        let Some(resource_indicator) = free_res else {
            debug!(rnti = %rnti, "PUCCH allocation failed. No free PUCCH resource at slot={}", slot);
            return None;
        };
        ul.pucchs.push(PucchInfo { rnti, format: PucchFormat::F1, resource_indicator, harq_ack_nof_bits: 1 });
        Some(UciAllocation { pucch_res_indicator: resource_indicator, harq_bit_idx: 0, on_pusch: false })
    }

    fn multiplex_uci_on_pusch(&mut self, slot_alloc: &mut CellSlotResourceAllocator, pusch_idx: usize) {
        let ul = &mut slot_alloc.result.ul;
        let Some(pusch) = ul.puschs.get_mut(pusch_idx) else {
            return;
        };
        let rnti = pusch.pusch_cfg.rnti;
        let Some(pos) = ul.pucchs.iter().position(|p| p.rnti == rnti) else {
            return;
        };
        let pucch = ul.pucchs.remove(pos);
        let uci = pusch.uci.get_or_insert_with(UciOnPusch::default);
        uci.harq_ack_nof_bits += pucch.harq_ack_nof_bits;
        debug!(
            rnti = %rnti, "{} HARQ-ACK bit(s) moved from PUCCH to PUSCH at slot={}",
            pucch.harq_ack_nof_bits, slot_alloc.slot
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::resource_grid::CellResourceAllocator;
    use crate::scheduler::result::{PuschInformation, UlSchedContext, UlSchedInfo};
    use common::types::{DuUeIndex, HarqId, OfdmSymbolRange, PrbInterval, SearchSpaceId};
    use common::SlotPoint;

    fn setup() -> CellResourceAllocator {
        let mut res_alloc = CellResourceAllocator::new(0, 52);
        res_alloc.slot_indication(SlotPoint::from_count(0, 0));
        res_alloc
    }

    fn test_pusch(rnti: Rnti) -> UlSchedInfo {
        UlSchedInfo {
            pusch_cfg: PuschInformation {
                rnti,
                prbs: PrbInterval::new(0, 10),
                symbols: OfdmSymbolRange::default(),
                mcs: 10,
                tbs_bytes: 500,
                rv: 0,
                new_data: true,
                harq_id: HarqId(0),
            },
            uci: None,
            context: UlSchedContext { ue_index: DuUeIndex(0), ss_id: SearchSpaceId(2), nof_retxs: 0 },
        }
    }

    #[test]
    fn test_harq_bits_grow_on_same_pucch() {
        let mut res_alloc = setup();
        let mut uci = PucchUciAllocator::new(8, 32, 2, 11);
        let slot_alloc = res_alloc.slot_alloc_mut(4);
        let rnti = Rnti(0x4601);

        let a = uci.alloc_uci_harq_ue(slot_alloc, rnti, PucchFormat::F1).unwrap();
        let b = uci.alloc_uci_harq_ue(slot_alloc, rnti, PucchFormat::F1).unwrap();
        assert_eq!((a.harq_bit_idx, b.harq_bit_idx), (0, 1));
        assert_eq!(a.pucch_res_indicator, b.pucch_res_indicator);
        assert_eq!(slot_alloc.result.ul.pucchs.len(), 1);

        // Format 1 is full
        assert!(uci.alloc_uci_harq_ue(slot_alloc, rnti, PucchFormat::F1).is_none());
        let c = uci.alloc_uci_harq_ue(slot_alloc, rnti, PucchFormat::F2).unwrap();
        assert_eq!(c.harq_bit_idx, 2);
        assert_eq!(slot_alloc.result.ul.pucchs[0].format, PucchFormat::F2);
        assert_eq!(slot_alloc.result.ul.pucchs[0].harq_ack_nof_bits, 3);
    }

    #[test]
    fn test_pucch_resources_exhausted() {
        let mut res_alloc = setup();
        let mut uci = PucchUciAllocator::new(2, 32, 2, 11);
        let slot_alloc = res_alloc.slot_alloc_mut(4);
        let a = uci.alloc_uci_harq_ue(slot_alloc, Rnti(0x4601), PucchFormat::F1).unwrap();
        let b = uci.alloc_uci_harq_ue(slot_alloc, Rnti(0x4602), PucchFormat::F1).unwrap();
        assert_ne!(a.pucch_res_indicator, b.pucch_res_indicator);
        assert!(uci.alloc_uci_harq_ue(slot_alloc, Rnti(0x4603), PucchFormat::F2).is_none());
    }

    #[test]
    fn test_max_pucchs_per_slot() {
        let mut res_alloc = setup();
        let mut uci = PucchUciAllocator::new(8, 1, 2, 11);
        let slot_alloc = res_alloc.slot_alloc_mut(4);
        assert!(uci.alloc_uci_harq_ue(slot_alloc, Rnti(0x4601), PucchFormat::F1).is_some());
        assert!(uci.alloc_uci_harq_ue(slot_alloc, Rnti(0x4602), PucchFormat::F1).is_none());
    }

    #[test]
    fn test_harq_bit_on_existing_pusch() {
        let mut res_alloc = setup();
        let mut uci = PucchUciAllocator::new(8, 32, 2, 11);
        let slot_alloc = res_alloc.slot_alloc_mut(4);
        slot_alloc.result.ul.puschs.push(test_pusch(Rnti(0x4601)));
        let a = uci.alloc_uci_harq_ue(slot_alloc, Rnti(0x4601), PucchFormat::F1).unwrap();
        assert!(a.on_pusch);
        assert_eq!(a.harq_bit_idx, 0);
        assert!(slot_alloc.result.ul.pucchs.is_empty());
        assert_eq!(slot_alloc.result.ul.puschs[0].uci, Some(UciOnPusch { harq_ack_nof_bits: 1 }));
    }

    #[test]
    fn test_multiplex_moves_pucch_to_pusch() {
        let mut res_alloc = setup();
        let mut uci = PucchUciAllocator::new(8, 32, 2, 11);
        let slot_alloc = res_alloc.slot_alloc_mut(4);
        uci.alloc_uci_harq_ue(slot_alloc, Rnti(0x4601), PucchFormat::F1);
        uci.alloc_uci_harq_ue(slot_alloc, Rnti(0x4601), PucchFormat::F1);
        uci.alloc_uci_harq_ue(slot_alloc, Rnti(0x4602), PucchFormat::F1);
        slot_alloc.result.ul.puschs.push(test_pusch(Rnti(0x4601)));

        uci.multiplex_uci_on_pusch(slot_alloc, 0);
        assert_eq!(slot_alloc.result.ul.pucchs.len(), 1);
        assert_eq!(slot_alloc.result.ul.pucchs[0].rnti, Rnti(0x4602));
        assert_eq!(slot_alloc.result.ul.puschs[0].uci, Some(UciOnPusch { harq_ack_nof_bits: 2 }));
    }

    #[test]
    fn test_f2_upgrade_keeps_indicator_unique() {
        let mut res_alloc = setup();
        let mut uci = PucchUciAllocator::new(8, 32, 2, 11);
        let slot_alloc = res_alloc.slot_alloc_mut(4);
        let ue_a = Rnti(0x4601);
        let first = uci.alloc_uci_harq_ue(slot_alloc, ue_a, PucchFormat::F1).unwrap();
        uci.alloc_uci_harq_ue(slot_alloc, ue_a, PucchFormat::F1).unwrap();
        let upgraded = uci.alloc_uci_harq_ue(slot_alloc, ue_a, PucchFormat::F2).unwrap();
        assert_eq!(upgraded.pucch_res_indicator, first.pucch_res_indicator);

        let other = uci.alloc_uci_harq_ue(slot_alloc, Rnti(0x4602), PucchFormat::F1).unwrap();
        assert_ne!(other.pucch_res_indicator, upgraded.pucch_res_indicator);
        let pucchs = &slot_alloc.result.ul.pucchs;
        assert_eq!(pucchs.len(), 2);
        assert_ne!(pucchs[0].resource_indicator, pucchs[1].resource_indicator);
    }
}
