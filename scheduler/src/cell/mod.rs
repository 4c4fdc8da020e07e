//! Cell Scheduling
//!
//! Per-cell resource bookkeeping and the common-channel schedulers.

pub mod broadcast_scheduler;
pub mod cell_resource_allocator;
pub mod paging_scheduler;
pub mod pdcch;
pub mod ra_scheduler;
pub mod resource_grid;

use crate::config::{CellConfiguration, SchedulerExpertConfig};
use crate::ue::UeScheduler;
use broadcast_scheduler::BroadcastScheduler;
use cell_resource_allocator::CellResourceAllocator;
use common::SlotPoint;
use interfaces::sched_result::SchedResult;
use paging_scheduler::PagingScheduler;
use ra_scheduler::RaScheduler;
use std::sync::Arc;

/// Scheduling state of one cell
pub struct SchedulerCell {
    /// Cell configuration
    pub cell_cfg: Arc<CellConfiguration>,
    /// Sliding window of slot resource grids
    pub res_grid: CellResourceAllocator,
    /// Random access scheduler
    pub ra_sch: RaScheduler,
    /// SSB and SIB1 scheduler
    pub bc_sch: BroadcastScheduler,
    /// Paging scheduler
    pub pg_sch: PagingScheduler,
}

impl SchedulerCell {
    pub fn new(cell_cfg: Arc<CellConfiguration>, expert: &SchedulerExpertConfig) -> Self {
        Self {
            res_grid: CellResourceAllocator::new(cell_cfg.clone()),
            ra_sch: RaScheduler::new(cell_cfg.clone(), expert.ra.clone()),
            bc_sch: BroadcastScheduler::new(cell_cfg.clone(), expert.log_broadcast_messages),
            pg_sch: PagingScheduler::new(cell_cfg.clone()),
            cell_cfg,
        }
    }

    /// Advance the grid to `sl_tx` and run every scheduler of the cell.
    ///
    /// Broadcast goes first so SSB and SIB1 get their fixed resources, then
    /// random access, paging, and finally UE data.
    pub fn run_slot(&mut self, sl_tx: SlotPoint, ue_sched: &mut UeScheduler) -> &SchedResult {
        self.res_grid.slot_indication(sl_tx);
        self.bc_sch.run_slot(&mut self.res_grid);
        self.ra_sch.run_slot(&mut self.res_grid);
        self.pg_sch.run_slot(&mut self.res_grid);
        ue_sched.run_slot(self.cell_cfg.cell_index, &mut self.res_grid);
        &self.res_grid[0].result
    }

    /// Result of the last scheduled slot
    pub fn last_result(&self) -> &SchedResult {
        &self.res_grid[0].result
    }
}
