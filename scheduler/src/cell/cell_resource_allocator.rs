//! Cell Resource Allocator
//!
//! Ring of per-slot resource grids covering the scheduling lookahead of a cell.
//! Entry `offset` describes slot `current + offset`. Each slot indication
//! retags exactly one entry, the one that just fell into the past.

use super::resource_grid::CellSlotResourceAllocator;
use crate::config::CellConfiguration;
use crate::{report_fatal_error, sanity_check};
use common::SlotPoint;
use interfaces::message_types::ScsSpecificCarrier;
use std::ops::{Index, IndexMut};
use std::sync::Arc;
use tracing::debug;

/// Number of subframes covered by the ring
pub const RESOURCE_GRID_NOF_SUBFRAMES: u32 = 20;

/// Sliding window of slot grids for one cell
#[derive(Debug)]
pub struct CellResourceAllocator {
    cfg: Arc<CellConfiguration>,
    slots: Vec<CellSlotResourceAllocator>,
    last_slot_ind: Option<SlotPoint>,
}

impl CellResourceAllocator {
    pub fn new(cfg: Arc<CellConfiguration>) -> Self {
        let max_scs = cfg.max_scs();
        let ring_size = (RESOURCE_GRID_NOF_SUBFRAMES * max_scs.slots_per_subframe()) as usize;

        // A coarser numerology only has a slot boundary every `ratio` fine slots
        let slots = (0..ring_size)
            .map(|i| {
                let carriers: Vec<ScsSpecificCarrier> = cfg
                    .scs_carriers
                    .iter()
                    .filter(|c| {
                        let ratio = (max_scs.slots_per_subframe() / c.scs.slots_per_subframe()) as usize;
                        i % ratio == 0
                    })
                    .copied()
                    .collect();
                CellSlotResourceAllocator::new(cfg.clone(), &carriers)
            })
            .collect();

        debug!("cell={}: resource allocator with {} slots of scs={}", cfg.cell_index, ring_size, max_scs);
        Self { cfg, slots, last_slot_ind: None }
    }

    /// Number of slots covered by the ring
    pub fn max_nof_slots(&self) -> usize {
        self.slots.len()
    }

    /// Current slot, if any slot was indicated yet
    pub fn slot_tx(&self) -> Option<SlotPoint> {
        self.last_slot_ind
    }

    pub fn cfg(&self) -> &CellConfiguration {
        &self.cfg
    }

    /// Advance the window to `sl_tx`
    pub fn slot_indication(&mut self, sl_tx: SlotPoint) {
        sanity_check!(
            sl_tx.numerology() == self.cfg.max_scs().numerology(),
            "cell={}: slot {} has numerology {}, expected {}",
            self.cfg.cell_index, sl_tx, sl_tx.numerology(), self.cfg.max_scs().numerology()
        );
        let size = self.slots.len();
        match self.last_slot_ind {
            None => {
                for i in 0..size {
                    let sl = sl_tx + i as u32;
                    let idx = sl.to_uint() as usize % size;
                    self.slots[idx].slot_indication(sl);
                }
            }
            Some(last) => {
                sanity_check!(
                    sl_tx == last + 1,
                    "cell={}: Slot indication was skipped: expected {}, got {}",
                    self.cfg.cell_index, last + 1, sl_tx
                );
                let prev = sl_tx - 1;
                let idx = prev.to_uint() as usize % size;
                self.slots[idx].slot_indication(prev + size as u32);
            }
        }
        self.last_slot_ind = Some(sl_tx);
    }

    /// Grid of `slot`, if it lies within the window
    pub fn at(&self, slot: SlotPoint) -> Option<&CellSlotResourceAllocator> {
        let last = self.last_slot_ind?;
        let offset = slot - last;
        if offset < 0 || offset as usize >= self.slots.len() {
            return None;
        }
        Some(&self[offset as usize])
    }

    /// Two distinct entries borrowed mutably at once
    pub fn get_pair_mut(
        &mut self,
        first: usize,
        second: usize,
    ) -> (&mut CellSlotResourceAllocator, &mut CellSlotResourceAllocator) {
        sanity_check!(first != second, "Same ring entry {} borrowed twice", first);
        let a = self.ring_index(first);
        let b = self.ring_index(second);
        if a < b {
            let (head, tail) = self.slots.split_at_mut(b);
            (&mut head[a], &mut tail[0])
        } else {
            let (head, tail) = self.slots.split_at_mut(a);
            (&mut tail[0], &mut head[b])
        }
    }

    fn ring_index(&self, offset: usize) -> usize {
        sanity_check!(
            offset < self.slots.len(),
            "Slot offset {} exceeds ring size {}", offset, self.slots.len()
        );
        match self.last_slot_ind {
            Some(last) => (last + offset as u32).to_uint() as usize % self.slots.len(),
            None => report_fatal_error!("cell={}: resource grid accessed before the first slot indication", self.cfg.cell_index),
        }
    }
}

impl Index<usize> for CellResourceAllocator {
    type Output = CellSlotResourceAllocator;

    fn index(&self, offset: usize) -> &CellSlotResourceAllocator {
        &self.slots[self.ring_index(offset)]
    }
}

impl IndexMut<usize> for CellResourceAllocator {
    fn index_mut(&mut self, offset: usize) -> &mut CellSlotResourceAllocator {
        let idx = self.ring_index(offset);
        &mut self.slots[idx]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cell::resource_grid::{GrantChannel, GrantInfo};
    use crate::config::SchedulerExpertConfig;
    use crate::test_utils::make_cell_request;
    use common::types::SubcarrierSpacing;
    use common::{OfdmSymbolRange, PrbInterval};

    fn make_allocator() -> CellResourceAllocator {
        let req = make_cell_request(0, 0);
        let cfg = CellConfiguration::new(&req, &SchedulerExpertConfig::default()).unwrap();
        CellResourceAllocator::new(Arc::new(cfg))
    }

    fn slot(count: u32) -> SlotPoint {
        SlotPoint::new(SubcarrierSpacing::Scs15, count)
    }

    #[test]
    fn test_first_indication_tags_all_entries() {
        let mut alloc = make_allocator();
        assert_eq!(alloc.max_nof_slots(), 20);
        alloc.slot_indication(slot(100));
        for offset in 0..alloc.max_nof_slots() {
            assert_eq!(alloc[offset].slot, slot(100) + offset as u32);
        }
    }

    #[test]
    fn test_retag_clears_past_entry() {
        let mut alloc = make_allocator();
        alloc.slot_indication(slot(0));
        let grant = GrantInfo::new(
            SubcarrierSpacing::Scs15,
            GrantChannel::Sch,
            OfdmSymbolRange::new(0, 14),
            PrbInterval::new(0, 10),
        );
        alloc[0].dl_res_grid.fill(&grant);
        alloc[3].ul_res_grid.fill(&grant);

        alloc.slot_indication(slot(1));
        // Old slot 0 became slot 20, the last entry
        let last = alloc.max_nof_slots() - 1;
        assert_eq!(alloc[last].slot, slot(20));
        assert!(!alloc[last].dl_res_grid.collides(&grant));
        // Slot 3 is now at offset 2 and kept its allocation
        assert_eq!(alloc[2].slot, slot(3));
        assert!(alloc[2].ul_res_grid.collides(&grant));
    }

    #[test]
    fn test_wraps_around_sfn_cycle() {
        let mut alloc = make_allocator();
        let start = slot(10239);
        alloc.slot_indication(start);
        alloc.slot_indication(start + 1);
        assert_eq!(alloc.slot_tx(), Some(slot(0)));
        assert_eq!(alloc[5].slot, slot(5));
        assert_eq!(alloc.at(slot(5)).map(|s| s.slot), Some(slot(5)));
        assert!(alloc.at(slot(10239)).is_none());
    }

    #[test]
    #[should_panic(expected = "Slot indication was skipped")]
    fn test_skipped_slot_is_fatal() {
        let mut alloc = make_allocator();
        alloc.slot_indication(slot(0));
        alloc.slot_indication(slot(2));
    }

    #[test]
    fn test_pair_borrow() {
        let mut alloc = make_allocator();
        alloc.slot_indication(slot(7));
        let (a, b) = alloc.get_pair_mut(0, 6);
        assert_eq!(a.slot, slot(7));
        assert_eq!(b.slot, slot(13));
        let (b, a) = alloc.get_pair_mut(6, 0);
        assert_eq!(a.slot, slot(7));
        assert_eq!(b.slot, slot(13));
    }

    #[test]
    fn test_mixed_numerology_alignment() {
        let mut req = make_cell_request(0, 0);
        req.scs_carriers.insert(0, interfaces::message_types::ScsSpecificCarrier {
            scs: SubcarrierSpacing::Scs15,
            offset_to_carrier: 0,
            carrier_bandwidth: 52,
        });
        req.scs_carriers[1].scs = SubcarrierSpacing::Scs30;
        req.scs_carriers[1].carrier_bandwidth = 51;
        req.common_scs = SubcarrierSpacing::Scs30;
        let cfg = CellConfiguration::new(&req, &SchedulerExpertConfig::default()).unwrap();
        let mut alloc = CellResourceAllocator::new(Arc::new(cfg));
        assert_eq!(alloc.max_nof_slots(), 40);

        alloc.slot_indication(SlotPoint::new(SubcarrierSpacing::Scs30, 0));
        assert!(alloc[0].dl_res_grid.has_carrier(SubcarrierSpacing::Scs15));
        assert!(!alloc[1].dl_res_grid.has_carrier(SubcarrierSpacing::Scs15));
        assert!(alloc[1].dl_res_grid.has_carrier(SubcarrierSpacing::Scs30));
    }
}
