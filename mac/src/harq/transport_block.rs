//! Transport block HARQ state

/// Redundancy version sequence applied on successive (re)transmissions (TS 38.212 7.3.1.1)
const RV_SEQUENCE: [u8; 4] = [0, 2, 3, 1];

/// HARQ state of a transport block
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HarqState {
    /// No transmission in flight
    Empty,
    /// Transmitted, feedback not yet received
    WaitingAck,
    /// NACKed or timed out, waiting to be retransmitted
    PendingRetx,
}

/// Result of an ACK timeout on a transport block
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TbTimeoutOutcome {
    /// A positive HARQ-ACK was already seen for this transmission
    AckedOnTimeout,
    /// Retransmissions remain
    PendingRetx,
    /// Maximum number of retransmissions exhausted
    Discarded,
}

/// HARQ tracking of a single transport block
#[derive(Debug, Clone)]
pub struct TransportBlock {
    state: HarqState,
    ndi: bool,
    nof_retxs: u32,
    max_nof_harq_retxs: u32,
    harq_bit_idx: u8,
    ack_on_timeout: bool,
}

impl Default for TransportBlock {
    fn default() -> Self {
        Self {
            state: HarqState::Empty,
            ndi: false,
            nof_retxs: 0,
            max_nof_harq_retxs: 0,
            harq_bit_idx: 0,
            ack_on_timeout: false,
        }
    }
}

impl TransportBlock {
    pub fn state(&self) -> HarqState {
        self.state
    }

    pub fn is_empty(&self) -> bool {
        self.state == HarqState::Empty
    }

    pub fn ndi(&self) -> bool {
        self.ndi
    }

    pub fn nof_retxs(&self) -> u32 {
        self.nof_retxs
    }

    pub fn max_nof_harq_retxs(&self) -> u32 {
        self.max_nof_harq_retxs
    }

    pub fn harq_bit_idx(&self) -> u8 {
        self.harq_bit_idx
    }

    pub fn ack_on_timeout(&self) -> bool {
        self.ack_on_timeout
    }

    /// Redundancy version of the current (re)transmission
    pub fn rv(&self) -> u8 {
        RV_SEQUENCE[(self.nof_retxs % 4) as usize]
    }

    /// Start a new transmission. The caller guarantees the TB is empty.
    pub(crate) fn new_tx(&mut self, max_nof_harq_retxs: u32, harq_bit_idx: u8) {
        debug_assert!(self.is_empty());
        self.state = HarqState::WaitingAck;
        self.ndi = !self.ndi;
        self.nof_retxs = 0;
        self.max_nof_harq_retxs = max_nof_harq_retxs;
        self.harq_bit_idx = harq_bit_idx;
        self.ack_on_timeout = false;
    }

    /// Retransmit. The caller guarantees the TB is pending retransmission.
    pub(crate) fn new_retx(&mut self, harq_bit_idx: u8) {
        debug_assert_eq!(self.state, HarqState::PendingRetx);
        self.state = HarqState::WaitingAck;
        self.nof_retxs += 1;
        self.harq_bit_idx = harq_bit_idx;
        self.ack_on_timeout = false;
    }

    /// Apply a final HARQ-ACK. Returns the new state.
    pub(crate) fn ack_info(&mut self, ack: bool) -> HarqState {
        debug_assert!(!self.is_empty());
        self.state = if ack || self.nof_retxs >= self.max_nof_harq_retxs {
            HarqState::Empty
        } else {
            HarqState::PendingRetx
        };
        self.state
    }

    pub(crate) fn set_ack_on_timeout(&mut self, ack_on_timeout: bool) {
        self.ack_on_timeout = ack_on_timeout;
    }

    /// No feedback arrived in time
    pub(crate) fn ack_timeout(&mut self) -> TbTimeoutOutcome {
        debug_assert_eq!(self.state, HarqState::WaitingAck);
        if self.ack_on_timeout {
            self.state = HarqState::Empty;
            TbTimeoutOutcome::AckedOnTimeout
        } else if self.nof_retxs < self.max_nof_harq_retxs {
            self.state = HarqState::PendingRetx;
            TbTimeoutOutcome::PendingRetx
        } else {
            self.state = HarqState::Empty;
            TbTimeoutOutcome::Discarded
        }
    }

    /// Forbid further retransmissions without touching the transmission in flight
    pub(crate) fn cancel_retxs(&mut self) {
        self.max_nof_harq_retxs = self.nof_retxs;
    }

    /// Drop any transmission in flight. NDI is kept so the next new_tx still toggles it.
    pub(crate) fn reset(&mut self) {
        self.state = HarqState::Empty;
        self.nof_retxs = 0;
        self.ack_on_timeout = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_tx_flips_ndi_and_resets_counters() {
        let mut tb = TransportBlock::default();
        let ndi = tb.ndi();
        tb.new_tx(4, 1);
        assert_eq!(tb.state(), HarqState::WaitingAck);
        assert_ne!(tb.ndi(), ndi);
        assert_eq!(tb.nof_retxs(), 0);
        assert_eq!(tb.max_nof_harq_retxs(), 4);
        assert_eq!(tb.harq_bit_idx(), 1);
        assert_eq!(tb.rv(), 0);
    }

    #[test]
    fn test_retx_keeps_ndi_and_cycles_rv() {
        let mut tb = TransportBlock::default();
        tb.new_tx(8, 0);
        let ndi = tb.ndi();
        let mut rvs = vec![tb.rv()];
        for _ in 0..4 {
            assert_eq!(tb.ack_info(false), HarqState::PendingRetx);
            tb.new_retx(0);
            assert_eq!(tb.ndi(), ndi);
            rvs.push(tb.rv());
        }
        assert_eq!(rvs, vec![0, 2, 3, 1, 0]);
        assert_eq!(tb.nof_retxs(), 4);
    }

    #[test]
    fn test_nack_after_max_retxs_empties() {
        let mut tb = TransportBlock::default();
        tb.new_tx(1, 0);
        assert_eq!(tb.ack_info(false), HarqState::PendingRetx);
        tb.new_retx(0);
        assert_eq!(tb.ack_info(false), HarqState::Empty);
    }

    #[test]
    fn test_timeout_outcomes() {
        let mut tb = TransportBlock::default();
        tb.new_tx(1, 0);
        assert_eq!(tb.ack_timeout(), TbTimeoutOutcome::PendingRetx);
        tb.new_retx(0);
        assert_eq!(tb.ack_timeout(), TbTimeoutOutcome::Discarded);
        assert!(tb.is_empty());

        tb.new_tx(1, 0);
        tb.set_ack_on_timeout(true);
        assert_eq!(tb.ack_timeout(), TbTimeoutOutcome::AckedOnTimeout);
        assert!(tb.is_empty());
    }

    #[test]
    fn test_cancel_retxs_caps_counter() {
        let mut tb = TransportBlock::default();
        tb.new_tx(4, 0);
        tb.cancel_retxs();
        assert_eq!(tb.state(), HarqState::WaitingAck);
        assert_eq!(tb.ack_info(false), HarqState::Empty);
    }
}
