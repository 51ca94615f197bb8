//! Downlink HARQ process
//!
//! Up to two transport blocks per process. HARQ-ACK feedback for a TB may be
//! reported in more than one PUCCH; the best report wins.

use common::{HarqId, PrbInterval, Rnti, SlotPoint};
use tracing::{debug, warn};

use super::process::{HarqProcess, HarqProcessBase};
use super::transport_block::{HarqState, TransportBlock};
use crate::scheduler::result::DciDlRntiConfigType;

/// Maximum number of transport blocks per DL HARQ process
pub const MAX_NOF_DL_TBS: usize = 2;

/// ACK timeout, counted from the ACK slot, applied once a first report arrived
/// and further reports for the same TB are still expected
pub const SHORT_ACK_TIMEOUT_DTX: u32 = 8;

/// HARQ-ACK value decoded from a UCI report
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DlAckStatus {
    Ack,
    Nack,
    Dtx,
}

impl DlAckStatus {
    fn rank(&self) -> u8 {
        match self {
            DlAckStatus::Ack => 2,
            DlAckStatus::Nack => 1,
            DlAckStatus::Dtx => 0,
        }
    }
}

/// Effect of a HARQ-ACK report on the DL HARQ process
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DlAckUpdate {
    /// Final report was positive. TB emptied.
    Acked,
    /// Final report was negative. TB pending retransmission or discarded.
    Nacked,
    /// More reports are expected before the TB state changes
    NoUpdate,
    /// Feedback for an empty TB
    Error,
}

/// Whether a TB is (re)transmitted as part of a two-TB transmission
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TbTxRequest {
    NewTx,
    Retx,
    Disabled,
}

/// Best report seen so far among the PUCCHs carrying feedback for one TB
#[derive(Debug, Clone, Copy, Default)]
struct AckArbitration {
    pucch_ack_to_receive: u32,
    chosen: Option<(DlAckStatus, Option<f32>)>,
}

impl AckArbitration {
    fn consider(&mut self, status: DlAckStatus, snr: Option<f32>) {
        let better = match self.chosen {
            None => true,
            Some((best, best_snr)) => {
                status.rank() > best.rank()
                    || (status.rank() == best.rank()
                        && snr.unwrap_or(f32::NEG_INFINITY) > best_snr.unwrap_or(f32::NEG_INFINITY))
            }
        };
        if better {
            self.chosen = Some((status, snr));
        }
    }

    fn chosen_is_ack(&self) -> bool {
        matches!(self.chosen, Some((DlAckStatus::Ack, _)))
    }

    fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Allocation parameters of one DL transport block
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DlTbAllocParams {
    pub mcs: u8,
    pub tbs_bytes: u32,
}

/// Parameters of the last DL transmission, reused by retransmissions
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DlHarqAllocParams {
    pub dci_cfg_type: DciDlRntiConfigType,
    pub prbs: PrbInterval,
    pub nof_symbols: u8,
    pub tb: [Option<DlTbAllocParams>; MAX_NOF_DL_TBS],
    pub cqi: u8,
    pub nof_layers: u8,
}

/// Downlink HARQ process
#[derive(Debug, Clone)]
pub struct DlHarqProcess {
    base: HarqProcessBase<MAX_NOF_DL_TBS>,
    prev_tx_params: DlHarqAllocParams,
    ack_arbitration: [AckArbitration; MAX_NOF_DL_TBS],
}

impl DlHarqProcess {
    pub fn new(id: HarqId, rnti: Rnti, max_ack_wait_in_slots: u32, max_pending_retx_slots: u32) -> Self {
        Self {
            base: HarqProcessBase::new(id, rnti, true, max_ack_wait_in_slots, max_pending_retx_slots),
            prev_tx_params: DlHarqAllocParams::default(),
            ack_arbitration: [AckArbitration::default(); MAX_NOF_DL_TBS],
        }
    }

    pub fn tb(&self, tb_idx: usize) -> &TransportBlock {
        self.base.tb(tb_idx)
    }

    pub fn empty_tb(&self, tb_idx: usize) -> bool {
        self.base.empty_tb(tb_idx)
    }

    pub fn has_pending_retx_tb(&self, tb_idx: usize) -> bool {
        self.base.has_pending_retx_tb(tb_idx)
    }

    pub fn is_waiting_ack_tb(&self, tb_idx: usize) -> bool {
        self.base.is_waiting_ack_tb(tb_idx)
    }

    pub fn slot_ack_timeout(&self) -> Option<SlotPoint> {
        self.base.slot_ack_timeout()
    }

    /// Number of HARQ-ACK reports still expected for the TB
    pub fn pucch_ack_to_receive(&self, tb_idx: usize) -> u32 {
        self.ack_arbitration[tb_idx].pucch_ack_to_receive
    }

    pub fn last_alloc_params(&self) -> &DlHarqAllocParams {
        &self.prev_tx_params
    }

    /// New transmission of TB 0
    pub fn new_tx(&mut self, pdsch_slot: SlotPoint, k1: u32, max_harq_nof_retxs: u32, harq_bit_idx: u8) {
        self.base.tx_common(pdsch_slot, pdsch_slot + k1);
        self.base.new_tx_tb(0, max_harq_nof_retxs, harq_bit_idx);
        self.ack_arbitration[0].reset();
    }

    /// Retransmission of TB 0
    pub fn new_retx(&mut self, pdsch_slot: SlotPoint, k1: u32, harq_bit_idx: u8) {
        self.base.tx_common(pdsch_slot, pdsch_slot + k1);
        self.base.new_retx_tb(0, harq_bit_idx);
        self.ack_arbitration[0].reset();
    }

    /// Transmission over both TBs. TB `i` reports its HARQ-ACK on bit `harq_bit_idx + i`.
    pub fn tx_2_tb(
        &mut self,
        pdsch_slot: SlotPoint,
        k1: u32,
        tb_tx_req: [TbTxRequest; MAX_NOF_DL_TBS],
        max_harq_nof_retxs: u32,
        harq_bit_idx: u8,
    ) {
        assert!(
            tb_tx_req.iter().any(|r| *r != TbTxRequest::Disabled),
            "DL HARQ rnti={} h_id={}: two-TB transmission with both TBs disabled",
            self.base.rnti(),
            self.base.id()
        );
        self.base.tx_common(pdsch_slot, pdsch_slot + k1);
        for (tb_idx, req) in tb_tx_req.iter().enumerate() {
            let bit_idx = harq_bit_idx + tb_idx as u8;
            match req {
                TbTxRequest::NewTx => self.base.new_tx_tb(tb_idx, max_harq_nof_retxs, bit_idx),
                TbTxRequest::Retx => self.base.new_retx_tb(tb_idx, bit_idx),
                TbTxRequest::Disabled => continue,
            }
            self.ack_arbitration[tb_idx].reset();
        }
    }

    /// One more PUCCH will carry HARQ-ACK feedback for the current transmission
    pub fn increment_pucch_counter(&mut self) {
        for tb_idx in 0..MAX_NOF_DL_TBS {
            if self.base.is_waiting_ack_tb(tb_idx) {
                self.ack_arbitration[tb_idx].pucch_ack_to_receive += 1;
            }
        }
    }

    /// Process one HARQ-ACK report for a TB
    pub fn ack_info(&mut self, tb_idx: usize, ack: DlAckStatus, pucch_snr: Option<f32>) -> DlAckUpdate {
        if self.base.empty_tb(tb_idx) {
            warn!(
                rnti = %self.base.rnti(), h_id = %self.base.id(), tb = tb_idx,
                "DL HARQ-ACK {:?} for an empty HARQ process", ack
            );
            return DlAckUpdate::Error;
        }

        let arbitration = &mut self.ack_arbitration[tb_idx];
        arbitration.consider(ack, pucch_snr);

        if arbitration.pucch_ack_to_receive > 1 {
            // Not the last report. Remember whether a positive one was seen and
            // avoid blocking the HARQ for the full timeout if the others get lost.
            arbitration.pucch_ack_to_receive -= 1;
            let ack_seen = arbitration.chosen_is_ack();
            self.base.tb_mut(tb_idx).set_ack_on_timeout(ack_seen);
            self.base.shorten_ack_timeout(SHORT_ACK_TIMEOUT_DTX);
            debug!(
                rnti = %self.base.rnti(), h_id = %self.base.id(), tb = tb_idx,
                "DL HARQ-ACK {:?} received, {} more report(s) expected", ack,
                self.ack_arbitration[tb_idx].pucch_ack_to_receive
            );
            return DlAckUpdate::NoUpdate;
        }

        let final_ack = arbitration.chosen_is_ack();
        arbitration.reset();
        let state = self.base.ack_info_tb(tb_idx, final_ack);
        debug!(
            rnti = %self.base.rnti(), h_id = %self.base.id(), tb = tb_idx,
            "DL HARQ-ACK {} -> {:?}", if final_ack { "ACK" } else { "NACK" }, state
        );
        if final_ack {
            DlAckUpdate::Acked
        } else {
            DlAckUpdate::Nacked
        }
    }

    /// Store the parameters of the transmission just scheduled.
    ///
    /// Retransmissions must keep the TBS and DCI type of the original transmission.
    pub fn save_alloc_params(&mut self, params: DlHarqAllocParams) {
        for tb_idx in 0..MAX_NOF_DL_TBS {
            let tb = self.base.tb(tb_idx);
            if tb.state() != HarqState::WaitingAck || tb.nof_retxs() == 0 {
                continue;
            }
            assert_eq!(
                params.dci_cfg_type, self.prev_tx_params.dci_cfg_type,
                "DL HARQ rnti={} h_id={}: DCI format changed across retransmissions",
                self.base.rnti(), self.base.id()
            );
            let prev_tbs = self.prev_tx_params.tb[tb_idx].map(|p| p.tbs_bytes);
            let new_tbs = params.tb[tb_idx].map(|p| p.tbs_bytes);
            assert_eq!(
                new_tbs, prev_tbs,
                "DL HARQ rnti={} h_id={} tb={}: TBS changed across retransmissions",
                self.base.rnti(), self.base.id(), tb_idx
            );
        }
        self.prev_tx_params = params;
    }

    /// Stop retransmitting the TB once its current transmission is resolved
    pub fn cancel_harq_retxs(&mut self, tb_idx: usize) {
        self.base.cancel_harq_retxs(tb_idx);
    }

    /// Drop everything in flight
    pub fn reset(&mut self) {
        self.base.reset();
        for arbitration in self.ack_arbitration.iter_mut() {
            arbitration.reset();
        }
    }
}

impl HarqProcess for DlHarqProcess {
    fn id(&self) -> HarqId {
        self.base.id()
    }

    fn slot_indication(&mut self, slot_tx: SlotPoint) -> bool {
        self.base.slot_indication(slot_tx)
    }

    fn empty(&self) -> bool {
        self.base.empty()
    }

    fn has_pending_retx(&self) -> bool {
        self.base.has_pending_retx()
    }

    fn is_waiting_ack(&self) -> bool {
        self.base.is_waiting_ack()
    }

    fn slot_tx(&self) -> Option<SlotPoint> {
        self.base.slot_tx()
    }

    fn slot_ack(&self) -> Option<SlotPoint> {
        self.base.slot_ack()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MAX_ACK_WAIT: u32 = 16;

    fn slot(count: u32) -> SlotPoint {
        SlotPoint::from_count(0, count)
    }

    fn test_harq() -> DlHarqProcess {
        DlHarqProcess::new(HarqId(0), Rnti(0x4601), MAX_ACK_WAIT, 2560)
    }

    #[test]
    fn test_new_harq_is_empty() {
        let h = test_harq();
        assert!(h.empty());
        assert!(h.empty_tb(0) && h.empty_tb(1));
        assert!(!h.has_pending_retx());
        assert!(!h.is_waiting_ack());
        assert_eq!(h.slot_ack(), None);
    }

    #[test]
    fn test_new_tx_sets_timing() {
        let mut h = test_harq();
        h.new_tx(slot(2), 4, 4, 0);
        assert!(h.is_waiting_ack());
        assert_eq!(h.slot_tx(), Some(slot(2)));
        assert_eq!(h.slot_ack(), Some(slot(6)));
        assert_eq!(h.slot_ack_timeout(), Some(slot(6 + MAX_ACK_WAIT)));
    }

    #[test]
    fn test_ndi_flip_law() {
        let mut h = test_harq();
        for i in 0..5 {
            let ndi_before = h.tb(0).ndi();
            h.new_tx(slot(i * 10), 4, 1, 0);
            assert_ne!(h.tb(0).ndi(), ndi_before);
            assert_eq!(h.ack_info(0, DlAckStatus::Nack, None), DlAckUpdate::Nacked);
            let ndi_before_retx = h.tb(0).ndi();
            h.new_retx(slot(i * 10 + 5), 4, 0);
            assert_eq!(h.tb(0).ndi(), ndi_before_retx);
            assert_eq!(h.ack_info(0, DlAckStatus::Ack, None), DlAckUpdate::Acked);
        }
    }

    #[test]
    fn test_nack_then_max_retx_discard() {
        let mut h = test_harq();
        h.new_tx(slot(0), 4, 1, 0);
        assert_eq!(h.ack_info(0, DlAckStatus::Nack, None), DlAckUpdate::Nacked);
        assert!(h.has_pending_retx());
        h.new_retx(slot(5), 4, 0);
        assert_eq!(h.tb(0).nof_retxs(), 1);
        assert_eq!(h.ack_info(0, DlAckStatus::Nack, None), DlAckUpdate::Nacked);
        assert!(h.empty());
    }

    #[test]
    fn test_ack_info_on_empty_is_error() {
        let mut h = test_harq();
        assert_eq!(h.ack_info(0, DlAckStatus::Ack, Some(10.0)), DlAckUpdate::Error);
        assert!(h.empty());
    }

    #[test]
    fn test_timeout_moves_to_pending_retx() {
        let mut h = test_harq();
        h.new_tx(slot(0), 4, 4, 0);
        for s in 0..(4 + MAX_ACK_WAIT) {
            assert!(!h.slot_indication(slot(s)));
            assert!(h.is_waiting_ack());
        }
        assert!(!h.slot_indication(slot(4 + MAX_ACK_WAIT)));
        assert!(h.has_pending_retx());
    }

    #[test]
    fn test_timeout_without_retxs_left_reports_drop_once() {
        let mut h = test_harq();
        h.new_tx(slot(0), 4, 0, 0);
        let mut drops = 0;
        for s in 0..100 {
            if h.slot_indication(slot(s)) {
                drops += 1;
            }
        }
        assert_eq!(drops, 1);
        assert!(h.empty());
    }

    #[test]
    fn test_two_reports_ack_ack_in_order() {
        let mut h = test_harq();
        h.new_tx(slot(0), 4, 4, 0);
        h.increment_pucch_counter();
        h.increment_pucch_counter();
        assert_eq!(h.pucch_ack_to_receive(0), 2);
        assert_eq!(h.ack_info(0, DlAckStatus::Ack, Some(5.0)), DlAckUpdate::NoUpdate);
        assert!(h.is_waiting_ack());
        assert!(h.tb(0).ack_on_timeout());
        assert_eq!(h.ack_info(0, DlAckStatus::Ack, Some(3.0)), DlAckUpdate::Acked);
        assert!(h.empty());
    }

    #[test]
    fn test_arbitration_order_independent() {
        let reports = [
            (DlAckStatus::Ack, Some(1.0)),
            (DlAckStatus::Nack, Some(20.0)),
            (DlAckStatus::Dtx, Some(10.0)),
        ];
        let pairs: Vec<(usize, usize)> = (0..3)
            .flat_map(|a| (0..3).filter(move |b| *b != a).map(move |b| (a, b)))
            .collect();
        for (a, b) in pairs {
            let mut h = test_harq();
            h.new_tx(slot(0), 4, 4, 0);
            h.increment_pucch_counter();
            h.increment_pucch_counter();
            assert_eq!(h.ack_info(0, reports[a].0, reports[a].1), DlAckUpdate::NoUpdate);
            let any_ack = reports[a].0 == DlAckStatus::Ack || reports[b].0 == DlAckStatus::Ack;
            let expected = if any_ack { DlAckUpdate::Acked } else { DlAckUpdate::Nacked };
            assert_eq!(h.ack_info(0, reports[b].0, reports[b].1), expected, "order ({}, {})", a, b);
        }
    }

    #[test]
    fn test_lost_second_report_after_ack_is_ack_on_short_timeout() {
        let mut h = test_harq();
        h.new_tx(slot(0), 4, 4, 0);
        h.increment_pucch_counter();
        h.increment_pucch_counter();
        h.slot_indication(slot(4));
        assert_eq!(h.ack_info(0, DlAckStatus::Ack, None), DlAckUpdate::NoUpdate);
        assert_eq!(h.slot_ack_timeout(), Some(slot(4 + SHORT_ACK_TIMEOUT_DTX)));
        for s in 5..(4 + SHORT_ACK_TIMEOUT_DTX) {
            h.slot_indication(slot(s));
            assert!(h.is_waiting_ack());
        }
        assert!(!h.slot_indication(slot(4 + SHORT_ACK_TIMEOUT_DTX)));
        assert!(h.empty());
    }

    #[test]
    fn test_lost_second_report_after_nack_retransmits() {
        let mut h = test_harq();
        h.new_tx(slot(0), 4, 4, 0);
        h.increment_pucch_counter();
        h.increment_pucch_counter();
        assert_eq!(h.ack_info(0, DlAckStatus::Nack, None), DlAckUpdate::NoUpdate);
        for s in 0..=(4 + SHORT_ACK_TIMEOUT_DTX) {
            h.slot_indication(slot(s));
        }
        assert!(h.has_pending_retx());
    }

    #[test]
    fn test_two_tb_transmission() {
        let mut h = test_harq();
        h.tx_2_tb(slot(0), 4, [TbTxRequest::NewTx, TbTxRequest::NewTx], 4, 2);
        assert_eq!(h.tb(0).harq_bit_idx(), 2);
        assert_eq!(h.tb(1).harq_bit_idx(), 3);
        assert_eq!(h.ack_info(0, DlAckStatus::Ack, None), DlAckUpdate::Acked);
        assert_eq!(h.ack_info(1, DlAckStatus::Nack, None), DlAckUpdate::Nacked);
        assert!(h.empty_tb(0));
        assert!(h.has_pending_retx_tb(1));
        assert!(!h.empty());

        h.tx_2_tb(slot(8), 4, [TbTxRequest::NewTx, TbTxRequest::Retx], 4, 0);
        assert_eq!(h.tb(1).nof_retxs(), 1);
        assert_eq!(h.tb(0).nof_retxs(), 0);
    }

    #[test]
    #[should_panic]
    fn test_new_tx_on_busy_harq_panics() {
        let mut h = test_harq();
        h.new_tx(slot(0), 4, 4, 0);
        h.new_tx(slot(1), 4, 4, 0);
    }

    #[test]
    #[should_panic]
    fn test_retx_on_empty_harq_panics() {
        let mut h = test_harq();
        h.new_retx(slot(0), 4, 0);
    }

    #[test]
    #[should_panic]
    fn test_tbs_change_across_retx_panics() {
        let mut h = test_harq();
        let mut params = DlHarqAllocParams {
            dci_cfg_type: DciDlRntiConfigType::CRntiF1_0,
            prbs: PrbInterval::new(0, 10),
            nof_symbols: 12,
            tb: [Some(DlTbAllocParams { mcs: 10, tbs_bytes: 500 }), None],
            cqi: 10,
            nof_layers: 1,
        };
        h.new_tx(slot(0), 4, 4, 0);
        h.save_alloc_params(params.clone());
        h.ack_info(0, DlAckStatus::Nack, None);
        h.new_retx(slot(5), 4, 0);
        params.tb[0] = Some(DlTbAllocParams { mcs: 10, tbs_bytes: 600 });
        h.save_alloc_params(params);
    }

    #[test]
    #[should_panic]
    fn test_dci_type_change_across_retx_panics() {
        let mut h = test_harq();
        let mut params = DlHarqAllocParams {
            dci_cfg_type: DciDlRntiConfigType::CRntiF1_0,
            prbs: PrbInterval::new(0, 10),
            nof_symbols: 12,
            tb: [Some(DlTbAllocParams { mcs: 10, tbs_bytes: 500 }), None],
            cqi: 10,
            nof_layers: 1,
        };
        h.new_tx(slot(0), 4, 4, 0);
        h.save_alloc_params(params.clone());
        h.ack_info(0, DlAckStatus::Nack, None);
        h.new_retx(slot(5), 4, 0);
        params.dci_cfg_type = DciDlRntiConfigType::CRntiF1_1;
        h.save_alloc_params(params);
    }

    #[test]
    fn test_cancel_harq_retxs() {
        let mut h = test_harq();
        h.new_tx(slot(0), 4, 4, 0);
        h.cancel_harq_retxs(0);
        assert!(h.is_waiting_ack());
        assert_eq!(h.ack_info(0, DlAckStatus::Nack, None), DlAckUpdate::Nacked);
        assert!(h.empty());
    }

    #[test]
    fn test_stuck_pending_retx_is_cleared() {
        let mut h = DlHarqProcess::new(HarqId(3), Rnti(0x4601), MAX_ACK_WAIT, 40);
        h.new_tx(slot(0), 4, 4, 0);
        h.ack_info(0, DlAckStatus::Nack, None);
        for s in 0..=44 {
            h.slot_indication(slot(s));
            assert!(h.has_pending_retx());
        }
        assert!(!h.slot_indication(slot(45)));
        assert!(h.empty());
    }

    #[test]
    fn test_large_pending_retx_timeout_keeps_retx() {
        let mut h = DlHarqProcess::new(HarqId(3), Rnti(0x4601), MAX_ACK_WAIT, u32::MAX);
        h.new_tx(slot(0), 4, 4, 0);
        h.ack_info(0, DlAckStatus::Nack, None);
        for s in 0..=100 {
            assert!(!h.slot_indication(slot(s)));
            assert!(h.has_pending_retx());
        }
    }
}
