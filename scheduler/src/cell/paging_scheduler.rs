//! Paging Scheduler
//!
//! Queues paging requests and serves them in the paging occasion of the UE's
//! paging frame (TS 38.304 7.1 with N = T and PF offset 0). One P-RNTI PDCCH
//! and one PDSCH carry all records due in an occasion.

use super::cell_resource_allocator::CellResourceAllocator;
use super::resource_grid::{GrantChannel, GrantInfo};
use crate::config::CellConfiguration;
use crate::sanity_check;
use common::types::Rnti;
use interfaces::message_types::SchedPagingInformation;
use interfaces::sched_result::{DciFormat, PagingInformation, PdcchRntiType, MAX_PAGING_RECORDS_PER_MESSAGE};
use interfaces::BoundedList;
use std::sync::Arc;
use tracing::{debug, warn};

/// Maximum number of paging records waiting for their occasion
pub const MAX_PENDING_PAGINGS: usize = 64;
/// Smallest paging PDSCH
const MIN_PAGING_PRBS: u16 = 4;
/// Encoded size of one paging record
const PAGING_RECORD_BYTES: u32 = 8;
/// Paging bytes carried per PRB
const PAGING_BYTES_PER_PRB: u32 = 10;

#[derive(Debug, Clone, Copy)]
struct PendingPaging {
    paging_identity: u64,
    ue_identity_index: u32,
    drx_cycle: u32,
}

impl PendingPaging {
    fn is_paging_frame(&self, sfn: u32) -> bool {
        sfn % self.drx_cycle == self.ue_identity_index % self.drx_cycle
    }
}

/// Paging scheduler of one cell
pub struct PagingScheduler {
    cfg: Arc<CellConfiguration>,
    pending: Vec<PendingPaging>,
}

impl PagingScheduler {
    pub fn new(cfg: Arc<CellConfiguration>) -> Self {
        Self {
            cfg,
            pending: Vec::with_capacity(MAX_PENDING_PAGINGS),
        }
    }

    pub fn nof_pending(&self) -> usize {
        self.pending.len()
    }

    /// Queue a paging request for this cell
    pub fn handle_paging_information(&mut self, pi: &SchedPagingInformation) {
        if pi.paging_drx_cycle == 0 {
            warn!("cell={}: paging for identity={} dropped, invalid DRX cycle", self.cfg.cell_index, pi.paging_identity);
            return;
        }
        let record = PendingPaging {
            paging_identity: pi.paging_identity,
            ue_identity_index: pi.ue_identity_index,
            drx_cycle: pi.paging_drx_cycle,
        };
        if let Some(existing) = self.pending.iter_mut().find(|p| p.paging_identity == pi.paging_identity) {
            *existing = record;
            return;
        }
        if self.pending.len() >= MAX_PENDING_PAGINGS {
            warn!("cell={}: paging for identity={} dropped, queue full", self.cfg.cell_index, pi.paging_identity);
            return;
        }
        self.pending.push(record);
    }

    /// Serve the records due in the current slot
    pub fn run_slot(&mut self, res_alloc: &mut CellResourceAllocator) {
        let slot_alloc = &mut res_alloc[0];
        let sl_tx = slot_alloc.slot;
        if self.pending.is_empty() || !slot_alloc.is_dl_active() || sl_tx.slot_index() != self.cfg.paging_slot {
            return;
        }

        let sfn = sl_tx.sfn();
        let nof_due = self
            .pending
            .iter()
            .filter(|p| p.is_paging_frame(sfn))
            .take(MAX_PAGING_RECORDS_PER_MESSAGE)
            .count();
        if nof_due == 0 {
            return;
        }

        if slot_alloc.result.dl.paging.is_full() {
            debug!("cell={}: paging postponed, no space in sched result", self.cfg.cell_index);
            return;
        }
        let nof_prbs = MIN_PAGING_PRBS
            .max((nof_due as u32 * PAGING_RECORD_BYTES).div_ceil(PAGING_BYTES_PER_PRB) as u16);
        let crbs = slot_alloc.find_dl_crbs(nof_prbs);
        if crbs.length() < nof_prbs {
            debug!("cell={}: paging postponed, not enough PRBs", self.cfg.cell_index);
            return;
        }
        if slot_alloc.alloc_pdcch(Rnti::P_RNTI, PdcchRntiType::P, DciFormat::F1_0).is_none() {
            debug!("cell={}: paging postponed, no PDCCH space", self.cfg.cell_index);
            return;
        }

        let symbols = self.cfg.pdsch_symbols();
        slot_alloc
            .dl_res_grid
            .fill(&GrantInfo::new(self.cfg.common_scs, GrantChannel::Sch, symbols, crbs));

        let mut paging = PagingInformation {
            prbs: crbs,
            symbols,
            paging_identities: BoundedList::new(),
        };
        let mut served = 0;
        self.pending.retain(|p| {
            if served < nof_due && p.is_paging_frame(sfn) {
                sanity_check!(
                    paging.paging_identities.push(p.paging_identity).is_ok(),
                    "paging record list overflow"
                );
                served += 1;
                return false;
            }
            true
        });
        debug!(
            "cell={}: paging slot={} prbs={} records={}",
            self.cfg.cell_index, sl_tx, crbs, paging.paging_identities.len()
        );
        sanity_check!(slot_alloc.result.dl.paging.push(paging).is_ok(), "paging list full after check");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SchedulerExpertConfig;
    use crate::test_utils::{make_cell_cfg, make_cell_request, slot};
    use common::types::DuCellIndex;

    fn paging(identity: u64, ue_id: u32) -> SchedPagingInformation {
        SchedPagingInformation {
            paging_identity: identity,
            ue_identity_index: ue_id,
            paging_drx_cycle: 32,
            paging_cells: vec![DuCellIndex(0)],
        }
    }

    #[test]
    fn test_paging_in_paging_frame_only() {
        let cfg = make_cell_cfg(&make_cell_request(0, 0), &SchedulerExpertConfig::default());
        let mut pg = PagingScheduler::new(cfg.clone());
        let mut grid = CellResourceAllocator::new(cfg);

        // UE_ID 3 -> PF when SFN % 32 == 3, PO at slot 4
        pg.handle_paging_information(&paging(0xABCD, 3));
        pg.handle_paging_information(&paging(0xABCD, 3));
        assert_eq!(pg.nof_pending(), 1);

        let mut served_at = None;
        for count in 0..40 {
            grid.slot_indication(slot(count));
            pg.run_slot(&mut grid);
            if !grid[0].result.dl.paging.is_empty() {
                served_at = Some(grid[0].slot);
                let msg = &grid[0].result.dl.paging[0];
                assert_eq!(&msg.paging_identities[..], &[0xABCD]);
                assert_eq!(msg.prbs.length(), MIN_PAGING_PRBS);
                assert_eq!(grid[0].result.dl.dl_pdcchs[0].rnti, Rnti::P_RNTI);
            }
        }
        assert_eq!(served_at, Some(slot(34)));
        assert_eq!(pg.nof_pending(), 0);
    }

    #[test]
    fn test_records_grouped_in_one_message() {
        let cfg = make_cell_cfg(&make_cell_request(0, 0), &SchedulerExpertConfig::default());
        let mut pg = PagingScheduler::new(cfg.clone());
        let mut grid = CellResourceAllocator::new(cfg);
        pg.handle_paging_information(&paging(1, 0));
        pg.handle_paging_information(&paging(2, 32));
        pg.handle_paging_information(&paging(3, 1));

        grid.slot_indication(slot(4));
        pg.run_slot(&mut grid);
        let msgs = &grid[0].result.dl.paging;
        assert_eq!(msgs.len(), 1);
        assert_eq!(&msgs[0].paging_identities[..], &[1, 2]);
        assert_eq!(pg.nof_pending(), 1);
    }

    #[test]
    fn test_full_paging_message_keeps_overflow_pending() {
        let cfg = make_cell_cfg(&make_cell_request(0, 0), &SchedulerExpertConfig::default());
        let mut pg = PagingScheduler::new(cfg.clone());
        let mut grid = CellResourceAllocator::new(cfg);
        let nof_records = MAX_PAGING_RECORDS_PER_MESSAGE + 8;
        for i in 0..nof_records {
            pg.handle_paging_information(&paging(i as u64, 32 * i as u32));
        }

        grid.slot_indication(slot(4));
        pg.run_slot(&mut grid);
        let msgs = &grid[0].result.dl.paging;
        assert_eq!(msgs.len(), 1);
        assert_eq!(msgs[0].paging_identities.len(), MAX_PAGING_RECORDS_PER_MESSAGE);
        assert_eq!(msgs[0].paging_identities[0], 0);
        assert_eq!(pg.nof_pending(), 8);
    }
}
