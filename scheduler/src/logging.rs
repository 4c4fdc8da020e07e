//! Scheduler logging
//!
//! `SchedulerEventLogger` records the indications received by a cell between
//! two slots and emits them as one debug line per slot. `SchedResultLogger`
//! summarises each committed result together with the time spent producing it.

use common::types::{DuCellIndex, Rnti, UeIndex};
use common::SlotPoint;
use interfaces::sched_result::SchedResult;
use std::fmt;
use std::fmt::Write as _;
use std::time::Instant;
use tracing::{debug, enabled, info, warn, Level};

/// Events buffered per slot before older ones are counted as dropped
const MAX_EVENTS_PER_SLOT: usize = 64;

/// Indication or configuration event seen by the scheduler
#[derive(Debug, Clone, PartialEq)]
pub enum SchedEvent {
    CellConfig { cell_index: DuCellIndex },
    UeCreation { ue_index: UeIndex, rnti: Rnti },
    UeReconfig { ue_index: UeIndex },
    UeRemoval { ue_index: UeIndex },
    Rach { slot_rx: SlotPoint, preamble_id: u8, tc_rnti: Rnti },
    Crc { rnti: Rnti, harq_id: u8, ok: bool },
    HarqAck { ue_index: UeIndex, harq_id: u8, ack: bool },
    Sr { ue_index: UeIndex },
    Bsr { ue_index: UeIndex, bytes: u32 },
    DlBufferState { ue_index: UeIndex, lcid: u8, bytes: u32 },
    DlMacCe { ue_index: UeIndex, ce_lcid: u8 },
    Paging { paging_identity: u64 },
}

impl fmt::Display for SchedEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SchedEvent::CellConfig { cell_index } => write!(f, "cell_cfg(cell={})", cell_index),
            SchedEvent::UeCreation { ue_index, rnti } => write!(f, "ue_create(ue={}, rnti={})", ue_index, rnti),
            SchedEvent::UeReconfig { ue_index } => write!(f, "ue_reconf(ue={})", ue_index),
            SchedEvent::UeRemoval { ue_index } => write!(f, "ue_rem(ue={})", ue_index),
            SchedEvent::Rach { slot_rx, preamble_id, tc_rnti } => {
                write!(f, "rach(slot_rx={}, preamble={}, tc-rnti={})", slot_rx, preamble_id, tc_rnti)
            }
            SchedEvent::Crc { rnti, harq_id, ok } => write!(f, "crc(rnti={}, h_id={}, ok={})", rnti, harq_id, ok),
            SchedEvent::HarqAck { ue_index, harq_id, ack } => {
                write!(f, "harq_ack(ue={}, h_id={}, ack={})", ue_index, harq_id, ack)
            }
            SchedEvent::Sr { ue_index } => write!(f, "sr(ue={})", ue_index),
            SchedEvent::Bsr { ue_index, bytes } => write!(f, "bsr(ue={}, bytes={})", ue_index, bytes),
            SchedEvent::DlBufferState { ue_index, lcid, bytes } => {
                write!(f, "dl_bs(ue={}, lcid={}, bytes={})", ue_index, lcid, bytes)
            }
            SchedEvent::DlMacCe { ue_index, ce_lcid } => write!(f, "dl_mac_ce(ue={}, lcid={})", ue_index, ce_lcid),
            SchedEvent::Paging { paging_identity } => write!(f, "paging(id={:#x})", paging_identity),
        }
    }
}

/// Per-cell buffer of scheduler events, flushed once per slot
pub struct SchedulerEventLogger {
    cell_index: DuCellIndex,
    events: Vec<SchedEvent>,
    nof_dropped: usize,
}

impl SchedulerEventLogger {
    pub fn new(cell_index: DuCellIndex) -> Self {
        Self {
            cell_index,
            events: Vec::with_capacity(MAX_EVENTS_PER_SLOT),
            nof_dropped: 0,
        }
    }

    /// Record an event; a no-op unless debug logging is enabled
    pub fn enqueue(&mut self, event: SchedEvent) {
        if !enabled!(Level::DEBUG) {
            return;
        }
        if self.events.len() >= MAX_EVENTS_PER_SLOT {
            self.nof_dropped += 1;
            return;
        }
        self.events.push(event);
    }

    pub fn nof_pending(&self) -> usize {
        self.events.len()
    }

    /// Emit the events recorded since the previous call
    pub fn log(&mut self, sl_tx: SlotPoint) {
        if self.events.is_empty() && self.nof_dropped == 0 {
            return;
        }
        let mut line = String::new();
        for (i, ev) in self.events.iter().enumerate() {
            let sep = if i == 0 { "" } else { ", " };
            let _ = write!(line, "{}{}", sep, ev);
        }
        debug!("cell={}: slot={} events: {}", self.cell_index, sl_tx, line);
        if self.nof_dropped > 0 {
            warn!("cell={}: {} scheduler events not logged", self.cell_index, self.nof_dropped);
        }
        self.events.clear();
        self.nof_dropped = 0;
    }
}

/// Per-cell summary of scheduling results
pub struct SchedResultLogger {
    cell_index: DuCellIndex,
    log_broadcast: bool,
    slot_start: Option<Instant>,
}

impl SchedResultLogger {
    pub fn new(cell_index: DuCellIndex, log_broadcast: bool) -> Self {
        Self {
            cell_index,
            log_broadcast,
            slot_start: None,
        }
    }

    pub fn on_slot_start(&mut self) {
        self.slot_start = Some(Instant::now());
    }

    pub fn on_scheduler_result(&mut self, sl_tx: SlotPoint, result: &SchedResult) {
        let elapsed_us = self.slot_start.take().map_or(0, |t| t.elapsed().as_micros());
        let dl = &result.dl;
        let has_ue_content =
            !dl.rars.is_empty() || !dl.paging.is_empty() || !dl.ue_grants.is_empty() || !result.ul.puschs.is_empty();
        let has_bc_content = !dl.ssbs.is_empty() || !dl.sibs.is_empty();
        if !has_ue_content && !(self.log_broadcast && has_bc_content) {
            return;
        }

        let mut line = String::new();
        for rar in dl.rars.iter() {
            let _ = write!(line, " RAR(ra-rnti={}, prbs={}, grants={})", rar.ra_rnti, rar.prbs, rar.grants.len());
        }
        for pg in dl.paging.iter() {
            let _ = write!(line, " PG(prbs={}, records={})", pg.prbs, pg.paging_identities.len());
        }
        for g in dl.ue_grants.iter() {
            let _ = write!(line, " DL(ue={}, h_id={}, prbs={}, retx={})", g.ue_index, g.harq_id, g.prbs, g.is_retx);
        }
        for p in result.ul.puschs.iter() {
            let kind = if p.is_msg3 { "Msg3" } else { "UL" };
            let _ = write!(line, " {}(rnti={}, h_id={}, prbs={}, retx={})", kind, p.crnti, p.harq_id, p.prbs, p.is_retx);
        }
        if self.log_broadcast {
            for ssb in dl.ssbs.iter() {
                let _ = write!(line, " SSB(idx={}, prbs={})", ssb.ssb_index, ssb.prbs);
            }
            for sib in dl.sibs.iter() {
                let _ = write!(line, " SIB1(prbs={}, size={})", sib.prbs, sib.payload_size);
            }
            info!("cell={}: slot={} ({}us):{}", self.cell_index, sl_tx, elapsed_us, line);
        } else {
            debug!("cell={}: slot={} ({}us):{}", self.cell_index, sl_tx, elapsed_us, line);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::slot;

    #[test]
    fn test_event_display() {
        let ev = SchedEvent::Rach {
            slot_rx: slot(3),
            preamble_id: 7,
            tc_rnti: Rnti(0x4601),
        };
        assert!(ev.to_string().starts_with("rach("));
        assert!(ev.to_string().contains("preamble=7"));
        assert_eq!(SchedEvent::UeRemoval { ue_index: UeIndex(2) }.to_string(), "ue_rem(ue=2)");
    }

    #[test]
    fn test_event_logger_flush_without_subscriber() {
        // No subscriber installed: debug is disabled and nothing is buffered
        let mut logger = SchedulerEventLogger::new(DuCellIndex(0));
        logger.enqueue(SchedEvent::Sr { ue_index: UeIndex(0) });
        logger.log(slot(1));
        assert_eq!(logger.nof_pending(), 0);
    }

    #[test]
    fn test_result_logger_tolerates_empty_result() {
        let mut logger = SchedResultLogger::new(DuCellIndex(0), true);
        logger.on_slot_start();
        logger.on_scheduler_result(slot(0), &SchedResult::new());
        assert!(logger.slot_start.is_none());
    }
}
