//! Direction-agnostic HARQ process core
//!
//! `HarqProcessBase` owns the transport blocks and the timing shared by the
//! DL and UL HARQ processes, which compose it.

use common::{HarqId, Rnti, SlotPoint};
use tracing::{debug, info, warn};

use super::transport_block::{HarqState, TbTimeoutOutcome, TransportBlock};

/// Capabilities shared by DL and UL HARQ processes
pub trait HarqProcess {
    /// Process identifier inside the HARQ entity
    fn id(&self) -> HarqId;

    /// Advance the process clock. Must be called once per slot, in increasing slot order.
    /// Returns true when a transport block was dropped after exhausting its retransmissions.
    fn slot_indication(&mut self, slot_tx: SlotPoint) -> bool;

    /// No transport block in flight
    fn empty(&self) -> bool;

    /// At least one transport block is pending retransmission
    fn has_pending_retx(&self) -> bool;

    /// At least one transport block is waiting for feedback
    fn is_waiting_ack(&self) -> bool;

    /// Slot of the last (re)transmission
    fn slot_tx(&self) -> Option<SlotPoint>;

    /// Slot where feedback for the last (re)transmission is expected
    fn slot_ack(&self) -> Option<SlotPoint>;
}

/// Transport blocks and timing of a HARQ process with `N` transport blocks
#[derive(Debug, Clone)]
pub struct HarqProcessBase<const N: usize> {
    id: HarqId,
    rnti: Rnti,
    is_dl: bool,
    max_ack_wait_in_slots: u32,
    max_pending_retx_slots: u32,
    last_slot_tx: Option<SlotPoint>,
    last_slot_ack: Option<SlotPoint>,
    slot_ack_timeout: Option<SlotPoint>,
    tbs: [TransportBlock; N],
}

impl<const N: usize> HarqProcessBase<N> {
    pub(crate) fn new(
        id: HarqId,
        rnti: Rnti,
        is_dl: bool,
        max_ack_wait_in_slots: u32,
        max_pending_retx_slots: u32,
    ) -> Self {
        Self {
            id,
            rnti,
            is_dl,
            max_ack_wait_in_slots,
            max_pending_retx_slots,
            last_slot_tx: None,
            last_slot_ack: None,
            slot_ack_timeout: None,
            tbs: std::array::from_fn(|_| TransportBlock::default()),
        }
    }

    fn dir(&self) -> &'static str {
        if self.is_dl {
            "DL"
        } else {
            "UL"
        }
    }

    pub fn id(&self) -> HarqId {
        self.id
    }

    pub fn rnti(&self) -> Rnti {
        self.rnti
    }

    pub fn tb(&self, tb_idx: usize) -> &TransportBlock {
        &self.tbs[tb_idx]
    }

    pub(crate) fn tb_mut(&mut self, tb_idx: usize) -> &mut TransportBlock {
        &mut self.tbs[tb_idx]
    }

    pub fn slot_tx(&self) -> Option<SlotPoint> {
        self.last_slot_tx
    }

    pub fn slot_ack(&self) -> Option<SlotPoint> {
        self.last_slot_ack
    }

    pub fn slot_ack_timeout(&self) -> Option<SlotPoint> {
        self.slot_ack_timeout
    }

    pub fn empty(&self) -> bool {
        self.tbs.iter().all(|tb| tb.is_empty())
    }

    pub fn empty_tb(&self, tb_idx: usize) -> bool {
        self.tbs[tb_idx].is_empty()
    }

    pub fn has_pending_retx(&self) -> bool {
        self.tbs.iter().any(|tb| tb.state() == HarqState::PendingRetx)
    }

    pub fn has_pending_retx_tb(&self, tb_idx: usize) -> bool {
        self.tbs[tb_idx].state() == HarqState::PendingRetx
    }

    pub fn is_waiting_ack(&self) -> bool {
        self.tbs.iter().any(|tb| tb.state() == HarqState::WaitingAck)
    }

    pub fn is_waiting_ack_tb(&self, tb_idx: usize) -> bool {
        self.tbs[tb_idx].state() == HarqState::WaitingAck
    }

    pub(crate) fn slot_indication(&mut self, slot_tx: SlotPoint) -> bool {
        let mut dropped = false;
        for tb_idx in 0..N {
            match self.tbs[tb_idx].state() {
                HarqState::Empty => {}
                HarqState::PendingRetx => {
                    let stuck = self
                        .last_slot_ack
                        .map(|slot_ack| i64::from(slot_tx - slot_ack) > i64::from(self.max_pending_retx_slots))
                        .unwrap_or(false);
                    if stuck {
                        warn!(
                            rnti = %self.rnti, h_id = %self.id, tb = tb_idx,
                            "{} HARQ pending retransmission for more than {} slots. Discarding it",
                            self.dir(), self.max_pending_retx_slots
                        );
                        self.tbs[tb_idx].reset();
                    }
                }
                HarqState::WaitingAck => {
                    let timed_out = self.slot_ack_timeout.map(|t| t <= slot_tx).unwrap_or(false);
                    if !timed_out {
                        continue;
                    }
                    match self.tbs[tb_idx].ack_timeout() {
                        TbTimeoutOutcome::AckedOnTimeout => {
                            debug!(
                                rnti = %self.rnti, h_id = %self.id, tb = tb_idx,
                                "{} HARQ feedback timeout after a positive report. Assuming ACK",
                                self.dir()
                            );
                        }
                        TbTimeoutOutcome::PendingRetx => {
                            debug!(
                                rnti = %self.rnti, h_id = %self.id, tb = tb_idx,
                                "{} HARQ feedback timeout. Scheduling retransmission",
                                self.dir()
                            );
                        }
                        TbTimeoutOutcome::Discarded => {
                            info!(
                                rnti = %self.rnti, h_id = %self.id, tb = tb_idx,
                                nof_retxs = self.tbs[tb_idx].nof_retxs(),
                                "{} HARQ feedback timeout with no retransmissions left. Discarding TB",
                                self.dir()
                            );
                            dropped = true;
                        }
                    }
                }
            }
        }
        dropped
    }

    /// Record the timing of a (re)transmission
    pub(crate) fn tx_common(&mut self, slot_tx: SlotPoint, slot_ack: SlotPoint) {
        self.last_slot_tx = Some(slot_tx);
        self.last_slot_ack = Some(slot_ack);
        self.slot_ack_timeout = Some(slot_ack + self.max_ack_wait_in_slots);
    }

    pub(crate) fn new_tx_tb(&mut self, tb_idx: usize, max_nof_harq_retxs: u32, harq_bit_idx: u8) {
        assert!(
            self.tbs[tb_idx].is_empty(),
            "{} HARQ rnti={} h_id={} tb={}: new transmission on a non-empty transport block",
            self.dir(),
            self.rnti,
            self.id,
            tb_idx
        );
        self.tbs[tb_idx].new_tx(max_nof_harq_retxs, harq_bit_idx);
    }

    pub(crate) fn new_retx_tb(&mut self, tb_idx: usize, harq_bit_idx: u8) {
        assert!(
            self.has_pending_retx_tb(tb_idx),
            "{} HARQ rnti={} h_id={} tb={}: retransmission of a transport block that is not pending retransmission",
            self.dir(),
            self.rnti,
            self.id,
            tb_idx
        );
        self.tbs[tb_idx].new_retx(harq_bit_idx);
    }

    /// Apply final feedback to a non-empty TB. Returns the new TB state.
    pub(crate) fn ack_info_tb(&mut self, tb_idx: usize, ack: bool) -> HarqState {
        let state = self.tbs[tb_idx].ack_info(ack);
        if !ack && state == HarqState::Empty {
            info!(
                rnti = %self.rnti, h_id = %self.id, tb = tb_idx,
                nof_retxs = self.tbs[tb_idx].nof_retxs(),
                "{} HARQ NACK with no retransmissions left. Discarding TB",
                self.dir()
            );
        }
        state
    }

    /// Bring the ACK timeout closer when the remaining feedback is expected shortly
    pub(crate) fn shorten_ack_timeout(&mut self, nof_slots: u32) {
        if let Some(slot_ack) = self.last_slot_ack {
            let short = slot_ack + nof_slots;
            self.slot_ack_timeout = Some(match self.slot_ack_timeout {
                Some(current) if current < short => current,
                _ => short,
            });
        }
    }

    pub(crate) fn cancel_harq_retxs(&mut self, tb_idx: usize) {
        match self.tbs[tb_idx].state() {
            HarqState::Empty => {}
            // Nothing in flight, the retransmission would be the next use of the TB
            HarqState::PendingRetx => self.tbs[tb_idx].reset(),
            HarqState::WaitingAck => self.tbs[tb_idx].cancel_retxs(),
        }
    }

    pub(crate) fn reset(&mut self) {
        for tb in self.tbs.iter_mut() {
            tb.reset();
        }
    }
}
