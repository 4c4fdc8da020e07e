//! HARQ Process Implementation
//!
//! A HARQ process is either empty, waiting for feedback on a transmission, or
//! holding a NACKed transport block until it is retransmitted. Missing feedback
//! past the ack timeout counts as a NACK.

use common::{PrbInterval, SlotPoint};

/// State of a HARQ process
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HarqState {
    /// No transport block in flight
    Empty,
    /// Transmitted, waiting for ACK/NACK or CRC
    WaitingAck {
        /// Slot after which missing feedback counts as NACK
        slot_ack_timeout: SlotPoint,
    },
    /// NACKed, waiting for a retransmission opportunity
    PendingRetx,
}

/// Result of feedback applied to a HARQ process
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HarqOutcome {
    /// Transport block delivered, process released
    Acked,
    /// Transport block must be retransmitted
    RetxPending,
    /// Retransmissions exhausted, process released
    MaxRetxReached,
}

/// DL or UL HARQ process
#[derive(Debug, Clone)]
pub struct HarqProcess {
    /// HARQ process id
    id: u8,
    /// Current state
    state: HarqState,
    /// Slot of the last transmission
    slot_tx: Option<SlotPoint>,
    /// PRBs of the last transmission
    prbs: PrbInterval,
    /// MCS of the transport block
    mcs: u8,
    /// Transport block size in bytes
    tbs_bytes: u32,
    /// Retransmissions so far
    nof_retxs: u8,
    /// Retransmission limit
    max_nof_retxs: u8,
    /// Slots to wait for feedback
    ack_timeout: u32,
}

impl HarqProcess {
    /// Create an empty process
    pub fn new(id: u8, max_nof_retxs: u8, ack_timeout: u32) -> Self {
        Self {
            id,
            state: HarqState::Empty,
            slot_tx: None,
            prbs: PrbInterval::default(),
            mcs: 0,
            tbs_bytes: 0,
            nof_retxs: 0,
            max_nof_retxs,
            ack_timeout,
        }
    }

    pub fn id(&self) -> u8 {
        self.id
    }

    pub fn state(&self) -> HarqState {
        self.state
    }

    pub fn is_empty(&self) -> bool {
        self.state == HarqState::Empty
    }

    pub fn has_pending_retx(&self) -> bool {
        self.state == HarqState::PendingRetx
    }

    pub fn prbs(&self) -> PrbInterval {
        self.prbs
    }

    pub fn mcs(&self) -> u8 {
        self.mcs
    }

    pub fn tbs_bytes(&self) -> u32 {
        self.tbs_bytes
    }

    pub fn nof_retxs(&self) -> u8 {
        self.nof_retxs
    }

    pub fn slot_tx(&self) -> Option<SlotPoint> {
        self.slot_tx
    }

    /// Start a new transmission. Returns false if the process is busy.
    pub fn new_tx(&mut self, slot_tx: SlotPoint, prbs: PrbInterval, mcs: u8, tbs_bytes: u32) -> bool {
        if !self.is_empty() {
            return false;
        }
        self.slot_tx = Some(slot_tx);
        self.prbs = prbs;
        self.mcs = mcs;
        self.tbs_bytes = tbs_bytes;
        self.nof_retxs = 0;
        self.state = HarqState::WaitingAck {
            slot_ack_timeout: slot_tx + self.ack_timeout,
        };
        true
    }

    /// Retransmit the pending transport block on `prbs`
    pub fn new_retx(&mut self, slot_tx: SlotPoint, prbs: PrbInterval) -> bool {
        if !self.has_pending_retx() {
            return false;
        }
        self.slot_tx = Some(slot_tx);
        self.prbs = prbs;
        self.nof_retxs += 1;
        self.state = HarqState::WaitingAck {
            slot_ack_timeout: slot_tx + self.ack_timeout,
        };
        true
    }

    /// Apply ACK/NACK or CRC feedback. Returns `None` if no feedback was expected.
    pub fn ack_info(&mut self, ack: bool) -> Option<HarqOutcome> {
        if !matches!(self.state, HarqState::WaitingAck { .. }) {
            return None;
        }
        Some(self.apply_feedback(ack))
    }

    /// Advance time; a process whose feedback deadline passed is treated as NACKed
    pub fn slot_indication(&mut self, sl_tx: SlotPoint) -> Option<HarqOutcome> {
        match self.state {
            HarqState::WaitingAck { slot_ack_timeout } if sl_tx >= slot_ack_timeout => {
                Some(self.apply_feedback(false))
            }
            _ => None,
        }
    }

    /// Release the process
    pub fn reset(&mut self) {
        self.state = HarqState::Empty;
        self.slot_tx = None;
        self.nof_retxs = 0;
    }

    fn apply_feedback(&mut self, ack: bool) -> HarqOutcome {
        if ack {
            self.reset();
            HarqOutcome::Acked
        } else if self.nof_retxs >= self.max_nof_retxs {
            self.reset();
            HarqOutcome::MaxRetxReached
        } else {
            self.state = HarqState::PendingRetx;
            HarqOutcome::RetxPending
        }
    }
}
