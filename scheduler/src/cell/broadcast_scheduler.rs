//! Broadcast Scheduler
//!
//! Schedules SSB and SIB1 transmissions of a cell

use super::cell_resource_allocator::CellResourceAllocator;
use super::resource_grid::{GrantChannel, GrantInfo};
use crate::config::CellConfiguration;
use crate::sanity_check;
use common::types::Rnti;
use common::{OfdmSymbolRange, PrbInterval, SlotPoint};
use interfaces::sched_result::{DciFormat, PdcchRntiType, Sib1Information, SsbInformation};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// PRBs spanned by an SS/PBCH block
pub const NOF_SSB_PRBS: u16 = 20;
/// First OFDM symbol of the SSB in the slot
pub const SSB_FIRST_SYMBOL: u8 = 2;
/// OFDM symbols of an SS/PBCH block
pub const NOF_SSB_OFDM_SYMBOLS: u8 = 4;
/// SIB1 is sent this many slots after the SSB slot
pub const SIB1_SLOT_OFFSET: u32 = 2;
/// SIB1 bytes carried per PRB
pub const SIB1_BYTES_PER_PRB: u32 = 10;

/// SSB and SIB1 scheduler of one cell
pub struct BroadcastScheduler {
    /// Cell configuration
    cfg: Arc<CellConfiguration>,
    /// Log each broadcast allocation at info level
    log_broadcast: bool,
}

impl BroadcastScheduler {
    /// Create a new broadcast scheduler
    pub fn new(cfg: Arc<CellConfiguration>, log_broadcast: bool) -> Self {
        Self { cfg, log_broadcast }
    }

    /// Allocate SSB and SIB1 in the current slot
    pub fn run_slot(&mut self, res_alloc: &mut CellResourceAllocator) {
        let slot_alloc = &mut res_alloc[0];
        if !slot_alloc.is_dl_active() {
            return;
        }
        let sl_tx = slot_alloc.slot;
        let scs = self.cfg.common_scs;
        let carrier_start = self.cfg.common_carrier().offset_to_carrier;

        if self.is_ssb_slot(sl_tx) {
            let grant = GrantInfo::new(
                scs,
                GrantChannel::Ssb,
                OfdmSymbolRange::new(SSB_FIRST_SYMBOL, SSB_FIRST_SYMBOL + NOF_SSB_OFDM_SYMBOLS),
                PrbInterval::new(carrier_start, carrier_start + NOF_SSB_PRBS),
            );
            if slot_alloc.dl_res_grid.collides(&grant) || slot_alloc.result.dl.ssbs.is_full() {
                warn!("cell={}: SSB could not be allocated in slot={}", self.cfg.cell_index, sl_tx);
            } else {
                slot_alloc.dl_res_grid.fill(&grant);
                let ssb = SsbInformation {
                    // Single SSB beam
                    ssb_index: 0,
                    symbols: grant.symbols,
                    prbs: grant.crbs,
                };
                sanity_check!(slot_alloc.result.dl.ssbs.push(ssb).is_ok(), "SSB list full after check");
                self.log_allocation(format_args!("Scheduled SSB in slot={}, prbs={}", sl_tx, grant.crbs));
            }
        }

        if self.is_sib1_slot(sl_tx) {
            let nof_prbs = self.cfg.sib1_payload_size.div_ceil(SIB1_BYTES_PER_PRB) as u16;
            let crbs = slot_alloc.find_dl_crbs(nof_prbs);
            if crbs.length() < nof_prbs || slot_alloc.result.dl.sibs.is_full() {
                warn!("cell={}: no PDSCH space for SIB1 in slot={}", self.cfg.cell_index, sl_tx);
                return;
            }
            if slot_alloc.alloc_pdcch(Rnti::SI_RNTI, PdcchRntiType::Si, DciFormat::F1_0).is_none() {
                warn!("cell={}: no PDCCH space for SIB1 in slot={}", self.cfg.cell_index, sl_tx);
                return;
            }
            let symbols = self.cfg.pdsch_symbols();
            slot_alloc.dl_res_grid.fill(&GrantInfo::new(scs, GrantChannel::Sch, symbols, crbs));
            let sib1 = Sib1Information {
                prbs: crbs,
                symbols,
                payload_size: self.cfg.sib1_payload_size,
            };
            sanity_check!(slot_alloc.result.dl.sibs.push(sib1).is_ok(), "SIB list full after check");
            self.log_allocation(format_args!("Scheduled SIB1 in slot={}, prbs={}", sl_tx, crbs));
        }
    }

    /// SSB in slot 0 of every SSB period
    fn is_ssb_slot(&self, sl: SlotPoint) -> bool {
        let period_slots = self.cfg.ssb_period_ms * sl.scs().slots_per_subframe();
        period_slots > 0 && sl.to_uint() % period_slots == 0
    }

    /// SIB1 a fixed number of slots after the SSB of every SIB1 period
    fn is_sib1_slot(&self, sl: SlotPoint) -> bool {
        let period_slots = self.cfg.sib1_period_ms * sl.scs().slots_per_subframe();
        period_slots > 0 && sl.to_uint() % period_slots == SIB1_SLOT_OFFSET
    }

    fn log_allocation(&self, args: std::fmt::Arguments<'_>) {
        if self.log_broadcast {
            info!("cell={}: {}", self.cfg.cell_index, args);
        } else {
            debug!("cell={}: {}", self.cfg.cell_index, args);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SchedulerExpertConfig;
    use crate::test_utils::{make_cell_cfg, make_cell_request, slot};

    fn setup() -> (BroadcastScheduler, CellResourceAllocator) {
        let cfg = make_cell_cfg(&make_cell_request(0, 0), &SchedulerExpertConfig::default());
        (BroadcastScheduler::new(cfg.clone(), false), CellResourceAllocator::new(cfg))
    }

    #[test]
    fn test_scheduler_ssb_timing() {
        let (mut bc, mut grid) = setup();
        let mut ssb_slots = Vec::new();
        for count in 0..41 {
            grid.slot_indication(slot(count));
            bc.run_slot(&mut grid);
            if !grid[0].result.dl.ssbs.is_empty() {
                ssb_slots.push(count);
            }
        }
        // SSB every 20 ms, slot 0
        assert_eq!(ssb_slots, vec![0, 20, 40]);
    }

    #[test]
    fn test_ssb_blocks_pdsch_prbs() {
        let (mut bc, mut grid) = setup();
        grid.slot_indication(slot(0));
        bc.run_slot(&mut grid);
        let ssb = grid[0].result.dl.ssbs[0];
        assert_eq!(ssb.prbs, PrbInterval::new(0, 20));
        assert_eq!(grid[0].find_dl_crbs(4), PrbInterval::new(20, 24));
    }

    #[test]
    fn test_sib1_scheduled_after_ssb() {
        let (mut bc, mut grid) = setup();
        for count in 0..3 {
            grid.slot_indication(slot(count));
            bc.run_slot(&mut grid);
        }
        let dl = &grid[0].result.dl;
        assert_eq!(dl.sibs.len(), 1);
        // 100 bytes at 10 bytes per PRB
        assert_eq!(dl.sibs[0].prbs.length(), 10);
        assert_eq!(dl.dl_pdcchs[0].rnti, Rnti::SI_RNTI);

        // Not repeated before the next 160 ms period
        grid.slot_indication(slot(3));
        bc.run_slot(&mut grid);
        assert!(grid[0].result.dl.sibs.is_empty());
    }
}
