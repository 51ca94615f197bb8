//! HARQ entity
//!
//! Fixed pools of DL and UL HARQ processes of one UE in one cell. Routes
//! HARQ-ACK and CRC feedback to the right process and looks up processes for
//! the scheduler policy.

use common::{DuUeIndex, HarqId, Rnti, SlotPoint};
use tracing::{debug, trace, warn, Span};

use super::dl_process::{DlAckStatus, DlAckUpdate, DlHarqProcess, MAX_NOF_DL_TBS};
use super::process::HarqProcess;
use super::ul_process::UlHarqProcess;
use crate::config::HarqConfig;

/// DTX reports fed to a process whose UCI occasion was cancelled before it is force-reset
const MAX_CANCEL_ATTEMPTS: usize = 4;

/// Receives notifications of transport blocks dropped after an ACK timeout
pub trait HarqTimeoutHandler: Send {
    fn handle_harq_timeout(&mut self, ue_index: DuUeIndex, is_dl: bool);
}

impl<F> HarqTimeoutHandler for F
where
    F: FnMut(DuUeIndex, bool) + Send,
{
    fn handle_harq_timeout(&mut self, ue_index: DuUeIndex, is_dl: bool) {
        self(ue_index, is_dl)
    }
}

/// HARQ process and TB addressed by a HARQ-ACK report
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DlAckInfoResult {
    pub h_id: HarqId,
    pub tb_idx: usize,
    pub update: DlAckUpdate,
}

/// HARQ processes of a UE in a cell
pub struct HarqEntity {
    ue_index: DuUeIndex,
    rnti: Rnti,
    dl_harqs: Vec<DlHarqProcess>,
    ul_harqs: Vec<UlHarqProcess>,
    timeout_handler: Option<Box<dyn HarqTimeoutHandler>>,
    span: Span,
    last_slot: Option<SlotPoint>,
}

impl std::fmt::Debug for HarqEntity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HarqEntity")
            .field("ue_index", &self.ue_index)
            .field("rnti", &self.rnti)
            .field("nof_dl_harqs", &self.dl_harqs.len())
            .field("nof_ul_harqs", &self.ul_harqs.len())
            .field("timeout_handler", &self.timeout_handler.is_some())
            .finish()
    }
}

impl HarqEntity {
    /// Create the HARQ pools. `numerology` sets the default stuck-retransmission timeout.
    pub fn new(ue_index: DuUeIndex, rnti: Rnti, cfg: &HarqConfig, numerology: u8) -> Self {
        let pending_retx_timeout = cfg.pending_retx_timeout(numerology);
        let dl_harqs = (0..cfg.nof_dl_harqs)
            .map(|id| {
                DlHarqProcess::new(HarqId(id), rnti, cfg.dl_max_ack_wait_in_slots, pending_retx_timeout)
            })
            .collect();
        let ul_harqs = (0..cfg.nof_ul_harqs)
            .map(|id| {
                UlHarqProcess::new(HarqId(id), rnti, cfg.ul_max_ack_wait_in_slots, pending_retx_timeout)
            })
            .collect();
        Self {
            ue_index,
            rnti,
            dl_harqs,
            ul_harqs,
            timeout_handler: None,
            span: tracing::debug_span!("harq", ue = ue_index.0, rnti = %rnti),
            last_slot: None,
        }
    }

    /// Attach the sink notified when a TB is dropped after an ACK timeout
    pub fn with_timeout_handler(mut self, handler: impl HarqTimeoutHandler + 'static) -> Self {
        self.timeout_handler = Some(Box::new(handler));
        self
    }

    pub fn set_timeout_handler(&mut self, handler: Option<Box<dyn HarqTimeoutHandler>>) {
        self.timeout_handler = handler;
    }

    pub fn ue_index(&self) -> DuUeIndex {
        self.ue_index
    }

    pub fn rnti(&self) -> Rnti {
        self.rnti
    }

    pub fn nof_dl_harqs(&self) -> usize {
        self.dl_harqs.len()
    }

    pub fn nof_ul_harqs(&self) -> usize {
        self.ul_harqs.len()
    }

    pub fn dl_harq(&self, h_id: HarqId) -> Option<&DlHarqProcess> {
        self.dl_harqs.get(h_id.as_usize())
    }

    pub fn dl_harq_mut(&mut self, h_id: HarqId) -> Option<&mut DlHarqProcess> {
        self.dl_harqs.get_mut(h_id.as_usize())
    }

    pub fn ul_harq(&self, h_id: HarqId) -> Option<&UlHarqProcess> {
        self.ul_harqs.get(h_id.as_usize())
    }

    pub fn ul_harq_mut(&mut self, h_id: HarqId) -> Option<&mut UlHarqProcess> {
        self.ul_harqs.get_mut(h_id.as_usize())
    }

    /// Advance the clock of every process, DL first, in process id order
    pub fn slot_indication(&mut self, slot_tx: SlotPoint) {
        let span = self.span.clone();
        let _enter = span.enter();

        if let Some(last) = self.last_slot {
            if slot_tx <= last {
                warn!("Non-increasing slot indication {} after {}", slot_tx, last);
            }
        }
        self.last_slot = Some(slot_tx);
        trace!("HARQ slot indication {}", slot_tx);

        let mut dl_timeouts = 0;
        for h in self.dl_harqs.iter_mut() {
            if h.slot_indication(slot_tx) {
                dl_timeouts += 1;
            }
        }
        let mut ul_timeouts = 0;
        for h in self.ul_harqs.iter_mut() {
            if h.slot_indication(slot_tx) {
                ul_timeouts += 1;
            }
        }

        if let Some(handler) = self.timeout_handler.as_mut() {
            for _ in 0..dl_timeouts {
                handler.handle_harq_timeout(self.ue_index, true);
            }
            for _ in 0..ul_timeouts {
                handler.handle_harq_timeout(self.ue_index, false);
            }
        }
    }

    /// Route a HARQ-ACK bit reported in `uci_slot` to the DL process expecting it
    pub fn dl_ack_info(
        &mut self,
        uci_slot: SlotPoint,
        ack: DlAckStatus,
        harq_bit_idx: u8,
        pucch_snr: Option<f32>,
    ) -> Option<DlAckInfoResult> {
        let span = self.span.clone();
        let _enter = span.enter();

        for h in self.dl_harqs.iter_mut() {
            if h.slot_ack() != Some(uci_slot) {
                continue;
            }
            for tb_idx in 0..MAX_NOF_DL_TBS {
                if h.is_waiting_ack_tb(tb_idx) && h.tb(tb_idx).harq_bit_idx() == harq_bit_idx {
                    let update = h.ack_info(tb_idx, ack, pucch_snr);
                    return Some(DlAckInfoResult { h_id: h.id(), tb_idx, update });
                }
            }
        }

        warn!(
            "DL HARQ-ACK {:?} for slot={} bit={} does not match any HARQ process waiting for feedback",
            ack, uci_slot, harq_bit_idx
        );
        None
    }

    /// Apply the CRC of the PUSCH received in `pusch_slot` for HARQ `h_id`.
    ///
    /// Returns the TBS in bytes on success, 0 on failure, `None` when the CRC is stale.
    pub fn ul_crc_info(&mut self, h_id: HarqId, ack: bool, pusch_slot: SlotPoint) -> Option<u32> {
        let span = self.span.clone();
        let _enter = span.enter();

        let Some(h) = self.ul_harqs.get_mut(h_id.as_usize()) else {
            warn!("UL CRC for invalid h_id={}", h_id);
            return None;
        };
        if h.empty() || h.slot_ack() != Some(pusch_slot) {
            warn!(
                "Discarding UL CRC={} for h_id={} and slot={}. HARQ is not waiting for this CRC",
                ack, h_id, pusch_slot
            );
            return None;
        }
        h.crc_info(ack)
    }

    /// Treat every HARQ-ACK expected in `uci_slot` as lost
    pub fn dl_ack_info_cancelled(&mut self, uci_slot: SlotPoint) {
        let span = self.span.clone();
        let _enter = span.enter();

        for h in self.dl_harqs.iter_mut() {
            if !h.is_waiting_ack() || h.slot_ack() != Some(uci_slot) {
                continue;
            }
            for tb_idx in 0..MAX_NOF_DL_TBS {
                let mut attempts = 0;
                while h.is_waiting_ack_tb(tb_idx) && attempts < MAX_CANCEL_ATTEMPTS {
                    h.ack_info(tb_idx, DlAckStatus::Dtx, None);
                    attempts += 1;
                }
            }
            if h.is_waiting_ack() {
                warn!(
                    "DL HARQ h_id={} still waiting for feedback after cancelling slot={}. Resetting it",
                    h.id(),
                    uci_slot
                );
                h.reset();
            } else {
                debug!("DL HARQ h_id={} feedback for slot={} cancelled", h.id(), uci_slot);
            }
        }
    }

    /// Lowest-id empty DL process
    pub fn find_empty_dl_harq(&self) -> Option<&DlHarqProcess> {
        find_empty(&self.dl_harqs)
    }

    /// Lowest-id empty UL process
    pub fn find_empty_ul_harq(&self) -> Option<&UlHarqProcess> {
        find_empty(&self.ul_harqs)
    }

    /// DL process pending retransmission whose feedback was due the earliest
    pub fn find_pending_dl_retx(&self) -> Option<&DlHarqProcess> {
        find_oldest_pending_retx(&self.dl_harqs)
    }

    /// UL process pending retransmission whose feedback was due the earliest
    pub fn find_pending_ul_retx(&self) -> Option<&UlHarqProcess> {
        find_oldest_pending_retx(&self.ul_harqs)
    }

    /// Any DL process waiting for feedback
    pub fn find_dl_harq_waiting_ack(&self) -> Option<&DlHarqProcess> {
        self.dl_harqs.iter().find(|h| h.is_waiting_ack())
    }

    /// Any UL process waiting for a CRC
    pub fn find_ul_harq_waiting_ack(&self) -> Option<&UlHarqProcess> {
        self.ul_harqs.iter().find(|h| h.is_waiting_ack())
    }

    /// DL process expecting the HARQ-ACK bit `harq_bit_idx` in `uci_slot`
    pub fn find_dl_harq_waiting_ack_slot(&self, uci_slot: SlotPoint, harq_bit_idx: u8) -> Option<&DlHarqProcess> {
        self.dl_harqs.iter().find(|h| {
            h.slot_ack() == Some(uci_slot)
                && (0..MAX_NOF_DL_TBS)
                    .any(|tb| h.is_waiting_ack_tb(tb) && h.tb(tb).harq_bit_idx() == harq_bit_idx)
        })
    }
}

fn find_empty<H: HarqProcess>(harqs: &[H]) -> Option<&H> {
    harqs.iter().find(|h| h.empty())
}

fn find_oldest_pending_retx<H: HarqProcess>(harqs: &[H]) -> Option<&H> {
    harqs
        .iter()
        .filter(|h| h.has_pending_retx())
        .min_by(|a, b| a.slot_ack().cmp(&b.slot_ack()))
}
