//! Uplink HARQ process
//!
//! One transport block per process. Feedback is the PUSCH CRC, available in
//! the PUSCH slot itself.

use common::{HarqId, PrbInterval, Rnti, SlotPoint};
use tracing::{debug, warn};

use super::process::{HarqProcess, HarqProcessBase};
use super::transport_block::{HarqState, TransportBlock};
use crate::scheduler::result::DciUlRntiConfigType;

/// Parameters of the last UL transmission, reused by retransmissions
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UlHarqAllocParams {
    pub dci_cfg_type: DciUlRntiConfigType,
    pub prbs: PrbInterval,
    pub nof_symbols: u8,
    pub mcs: u8,
    pub tbs_bytes: u32,
}

/// Uplink HARQ process
#[derive(Debug, Clone)]
pub struct UlHarqProcess {
    base: HarqProcessBase<1>,
    prev_tx_params: UlHarqAllocParams,
}

impl UlHarqProcess {
    pub fn new(id: HarqId, rnti: Rnti, max_ack_wait_in_slots: u32, max_pending_retx_slots: u32) -> Self {
        Self {
            base: HarqProcessBase::new(id, rnti, false, max_ack_wait_in_slots, max_pending_retx_slots),
            prev_tx_params: UlHarqAllocParams::default(),
        }
    }

    pub fn tb(&self) -> &TransportBlock {
        self.base.tb(0)
    }

    pub fn last_alloc_params(&self) -> &UlHarqAllocParams {
        &self.prev_tx_params
    }

    pub fn new_tx(&mut self, pusch_slot: SlotPoint, max_harq_nof_retxs: u32) {
        self.base.tx_common(pusch_slot, pusch_slot);
        self.base.new_tx_tb(0, max_harq_nof_retxs, 0);
    }

    pub fn new_retx(&mut self, pusch_slot: SlotPoint) {
        self.base.tx_common(pusch_slot, pusch_slot);
        self.base.new_retx_tb(0, 0);
    }

    /// Apply the PUSCH CRC.
    ///
    /// Returns the TBS in bytes on success, 0 on failure and `None` if the
    /// process had no transmission in flight.
    pub fn crc_info(&mut self, ack: bool) -> Option<u32> {
        if self.base.empty() {
            warn!(
                rnti = %self.base.rnti(), h_id = %self.base.id(),
                "UL CRC={} for an empty HARQ process", ack
            );
            return None;
        }
        let state = self.base.ack_info_tb(0, ack);
        debug!(
            rnti = %self.base.rnti(), h_id = %self.base.id(),
            "UL CRC={} -> {:?}", ack, state
        );
        Some(if ack { self.prev_tx_params.tbs_bytes } else { 0 })
    }

    /// Store the parameters of the transmission just scheduled.
    ///
    /// Retransmissions must keep the TBS and DCI type of the original transmission.
    pub fn save_alloc_params(&mut self, params: UlHarqAllocParams) {
        let tb = self.base.tb(0);
        if tb.state() == HarqState::WaitingAck && tb.nof_retxs() > 0 {
            assert_eq!(
                params.dci_cfg_type, self.prev_tx_params.dci_cfg_type,
                "UL HARQ rnti={} h_id={}: DCI format changed across retransmissions",
                self.base.rnti(), self.base.id()
            );
            assert_eq!(
                params.tbs_bytes, self.prev_tx_params.tbs_bytes,
                "UL HARQ rnti={} h_id={}: TBS changed across retransmissions",
                self.base.rnti(), self.base.id()
            );
        }
        self.prev_tx_params = params;
    }

    /// Stop retransmitting once the current transmission is resolved
    pub fn cancel_harq_retxs(&mut self) {
        self.base.cancel_harq_retxs(0);
    }

    /// Drop everything in flight
    pub fn reset(&mut self) {
        self.base.reset();
    }
}

impl HarqProcess for UlHarqProcess {
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
