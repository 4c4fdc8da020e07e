//! Scheduler Resource Grid
//!
//! Per-slot occupancy of the time-frequency resources of a cell. Each
//! configured numerology has its own carrier grid of
//! `symbols-per-slot × carrier-bandwidth` bits, plus a PRB-only mask tracking
//! shared channel occupancy. Allocations are expressed in CRBs.

use crate::config::{CellConfiguration, NOF_OFDM_SYM_PER_SLOT};
use crate::{report_fatal_error, sanity_check};
use common::types::SubcarrierSpacing;
use common::{OfdmSymbolRange, PrbBitmap, PrbInterval, SlotPoint};
use interfaces::message_types::ScsSpecificCarrier;
use interfaces::sched_result::SchedResult;
use ndarray::{s, Array2};
use std::sync::Arc;
use tracing::trace;

/// Physical channel a grant belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GrantChannel {
    /// Control channel (PDCCH/PUCCH)
    Cch,
    /// Shared channel (PDSCH/PUSCH)
    Sch,
    /// Synchronization signal block
    Ssb,
}

/// Time-frequency region committed into a grid
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GrantInfo {
    /// Numerology of the grant
    pub scs: SubcarrierSpacing,
    /// Channel kind
    pub ch: GrantChannel,
    /// OFDM symbols
    pub symbols: OfdmSymbolRange,
    /// CRBs
    pub crbs: PrbInterval,
}

impl GrantInfo {
    pub fn new(scs: SubcarrierSpacing, ch: GrantChannel, symbols: OfdmSymbolRange, crbs: PrbInterval) -> Self {
        Self { scs, ch, symbols, crbs }
    }
}

/// Symbol × PRB occupancy of one carrier
#[derive(Debug, Clone)]
pub struct CarrierSubslotResourceGrid {
    carrier: ScsSpecificCarrier,
    /// [symbols, carrier PRBs]
    slots: Array2<bool>,
}

impl CarrierSubslotResourceGrid {
    pub fn new(carrier: ScsSpecificCarrier) -> Self {
        Self {
            carrier,
            slots: Array2::from_elem(
                (NOF_OFDM_SYM_PER_SLOT as usize, carrier.carrier_bandwidth as usize),
                false,
            ),
        }
    }

    pub fn scs(&self) -> SubcarrierSpacing {
        self.carrier.scs
    }

    /// CRB of the first PRB
    pub fn offset(&self) -> u16 {
        self.carrier.offset_to_carrier
    }

    pub fn nof_rbs(&self) -> u16 {
        self.carrier.carrier_bandwidth
    }

    /// CRBs spanned by the carrier
    pub fn crbs(&self) -> PrbInterval {
        PrbInterval::new(self.offset(), self.offset() + self.nof_rbs())
    }

    /// Mark a region as used
    pub fn fill(&mut self, symbols: OfdmSymbolRange, crbs: PrbInterval) {
        sanity_check!(
            symbols.stop() <= NOF_OFDM_SYM_PER_SLOT,
            "OFDM symbols {} out of slot bounds", symbols
        );
        sanity_check!(
            self.crbs().contains(&crbs),
            "CRBs {} fall outside carrier {} of scs={}", crbs, self.crbs(), self.scs()
        );
        let prbs = crbs.shifted_down(self.offset());
        self.slots
            .slice_mut(s![
                symbols.start() as usize..symbols.stop() as usize,
                prbs.start() as usize..prbs.stop() as usize
            ])
            .fill(true);
    }

    /// Whether any bit of the region is used; regions outside the carrier always collide
    pub fn collides(&self, symbols: OfdmSymbolRange, crbs: PrbInterval) -> bool {
        if symbols.stop() > NOF_OFDM_SYM_PER_SLOT || !self.crbs().contains(&crbs) {
            return true;
        }
        let prbs = crbs.shifted_down(self.offset());
        self.slots
            .slice(s![
                symbols.start() as usize..symbols.stop() as usize,
                prbs.start() as usize..prbs.stop() as usize
            ])
            .iter()
            .any(|used| *used)
    }

    pub fn clear(&mut self) {
        self.slots.fill(false);
    }
}

/// Occupancy of one numerology carrier in one slot
#[derive(Debug, Clone)]
pub struct CarrierResourceGrid {
    subslot_prbs: CarrierSubslotResourceGrid,
    /// Shared channel PRBs, carrier-relative
    sch_prbs: PrbBitmap,
}

impl CarrierResourceGrid {
    pub fn new(carrier: ScsSpecificCarrier) -> Self {
        Self {
            subslot_prbs: CarrierSubslotResourceGrid::new(carrier),
            sch_prbs: PrbBitmap::new(carrier.carrier_bandwidth as usize),
        }
    }

    pub fn subslot(&self) -> &CarrierSubslotResourceGrid {
        &self.subslot_prbs
    }

    /// Shared channel occupancy in carrier-relative PRBs
    pub fn sch_prbs(&self) -> &PrbBitmap {
        &self.sch_prbs
    }

    pub fn fill(&mut self, grant: &GrantInfo) {
        self.subslot_prbs.fill(grant.symbols, grant.crbs);
        if grant.ch != GrantChannel::Cch {
            let prbs = grant.crbs.shifted_down(self.subslot_prbs.offset());
            self.sch_prbs.fill(prbs.start() as usize, prbs.stop() as usize);
        }
    }

    pub fn collides(&self, grant: &GrantInfo) -> bool {
        self.subslot_prbs.collides(grant.symbols, grant.crbs)
    }

    pub fn clear(&mut self) {
        self.subslot_prbs.clear();
        self.sch_prbs.reset();
    }
}

/// Carrier grids of one cell for one slot, one per numerology present in the slot
#[derive(Debug, Clone)]
pub struct CellSlotResourceGrid {
    carrier_grids: Vec<CarrierResourceGrid>,
    numerology_to_grid_idx: [Option<usize>; SubcarrierSpacing::NOF_NUMEROLOGIES],
}

impl CellSlotResourceGrid {
    pub fn new(carriers: &[ScsSpecificCarrier]) -> Self {
        let mut numerology_to_grid_idx = [None; SubcarrierSpacing::NOF_NUMEROLOGIES];
        let mut carrier_grids = Vec::with_capacity(carriers.len());
        for carrier in carriers {
            numerology_to_grid_idx[carrier.scs.numerology() as usize] = Some(carrier_grids.len());
            carrier_grids.push(CarrierResourceGrid::new(*carrier));
        }
        Self { carrier_grids, numerology_to_grid_idx }
    }

    /// Whether this slot holds a grid for `scs`
    pub fn has_carrier(&self, scs: SubcarrierSpacing) -> bool {
        self.numerology_to_grid_idx[scs.numerology() as usize].is_some()
    }

    pub fn carrier(&self, scs: SubcarrierSpacing) -> &CarrierResourceGrid {
        &self.carrier_grids[self.grid_index(scs)]
    }

    fn grid_index(&self, scs: SubcarrierSpacing) -> usize {
        match self.numerology_to_grid_idx[scs.numerology() as usize] {
            Some(idx) => idx,
            None => report_fatal_error!("Invalid numerology scs={}: no carrier configured", scs),
        }
    }

    pub fn fill(&mut self, grant: &GrantInfo) {
        let idx = self.grid_index(grant.scs);
        self.carrier_grids[idx].fill(grant);
    }

    pub fn collides(&self, grant: &GrantInfo) -> bool {
        self.carrier(grant.scs).collides(grant)
    }

    /// Shared channel occupancy of the `scs` carrier
    pub fn sch_prbs(&self, scs: SubcarrierSpacing) -> &PrbBitmap {
        self.carrier(scs).sch_prbs()
    }

    /// CRB offset of the `scs` carrier
    pub fn carrier_offset(&self, scs: SubcarrierSpacing) -> u16 {
        self.carrier(scs).subslot().offset()
    }

    pub fn clear(&mut self) {
        for grid in &mut self.carrier_grids {
            grid.clear();
        }
    }
}

/// Grids and scheduling result of one cell for one slot
#[derive(Debug, Clone)]
pub struct CellSlotResourceAllocator {
    /// Slot this entry currently describes
    pub slot: SlotPoint,
    /// Grant lists committed for the slot
    pub result: SchedResult,
    /// DL occupancy
    pub dl_res_grid: CellSlotResourceGrid,
    /// UL occupancy
    pub ul_res_grid: CellSlotResourceGrid,
    cfg: Arc<CellConfiguration>,
}

impl CellSlotResourceAllocator {
    pub fn new(cfg: Arc<CellConfiguration>, carriers: &[ScsSpecificCarrier]) -> Self {
        Self {
            slot: SlotPoint::new(cfg.max_scs(), 0),
            result: SchedResult::new(),
            dl_res_grid: CellSlotResourceGrid::new(carriers),
            ul_res_grid: CellSlotResourceGrid::new(carriers),
            cfg,
        }
    }

    /// Retag the entry with a new slot and drop its previous content
    pub fn slot_indication(&mut self, sl: SlotPoint) {
        trace!("cell={}: resource grid entry retagged {} -> {}", self.cfg.cell_index, self.slot, sl);
        self.slot = sl;
        self.clear();
    }

    pub fn clear(&mut self) {
        self.result.clear();
        self.dl_res_grid.clear();
        self.ul_res_grid.clear();
    }

    pub fn cfg(&self) -> &CellConfiguration {
        &self.cfg
    }

    /// Whether DL transmissions are possible in this slot
    pub fn is_dl_active(&self) -> bool {
        self.cfg.is_dl_enabled(self.slot)
    }

    /// Whether UL transmissions are possible in this slot
    pub fn is_ul_active(&self) -> bool {
        self.cfg.is_ul_enabled(self.slot)
    }

    /// First-fit search of `len` free PDSCH PRBs on the common carrier, in CRBs
    pub fn find_dl_crbs(&self, len: u16) -> PrbInterval {
        let scs = self.cfg.common_scs;
        Self::find_crbs(&self.dl_res_grid, scs, len)
    }

    /// First-fit search of `len` free PUSCH PRBs on the common carrier, in CRBs
    pub fn find_ul_crbs(&self, len: u16) -> PrbInterval {
        let scs = self.cfg.common_scs;
        Self::find_crbs(&self.ul_res_grid, scs, len)
    }

    fn find_crbs(grid: &CellSlotResourceGrid, scs: SubcarrierSpacing, len: u16) -> PrbInterval {
        let prbs = grid.sch_prbs(scs).find_empty_interval_of_length(len as usize, 0);
        let offset = grid.carrier_offset(scs);
        PrbInterval::new(prbs.start() + offset, prbs.stop() + offset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::Rng;

    fn carrier(scs: SubcarrierSpacing, offset: u16, bw: u16) -> ScsSpecificCarrier {
        ScsSpecificCarrier { scs, offset_to_carrier: offset, carrier_bandwidth: bw }
    }

    #[test]
    fn test_fill_then_collides() {
        let mut grid = CellSlotResourceGrid::new(&[carrier(SubcarrierSpacing::Scs15, 0, 52)]);
        let grant = GrantInfo::new(
            SubcarrierSpacing::Scs15,
            GrantChannel::Sch,
            OfdmSymbolRange::new(2, 14),
            PrbInterval::new(10, 20),
        );
        assert!(!grid.collides(&grant));
        grid.fill(&grant);
        assert!(grid.collides(&grant));

        // Same PRBs, disjoint symbols
        let other = GrantInfo { symbols: OfdmSymbolRange::new(0, 2), ..grant };
        assert!(!grid.collides(&other));

        // Overlapping one PRB
        let other = GrantInfo { crbs: PrbInterval::new(19, 25), ..grant };
        assert!(grid.collides(&other));

        assert_eq!(grid.sch_prbs(SubcarrierSpacing::Scs15).count(), 10);
        grid.clear();
        assert!(!grid.collides(&grant));
        assert_eq!(grid.sch_prbs(SubcarrierSpacing::Scs15).count(), 0);
    }

    #[test]
    fn test_cch_not_in_sch_mask() {
        let mut grid = CellSlotResourceGrid::new(&[carrier(SubcarrierSpacing::Scs15, 0, 52)]);
        grid.fill(&GrantInfo::new(
            SubcarrierSpacing::Scs15,
            GrantChannel::Cch,
            OfdmSymbolRange::new(0, 2),
            PrbInterval::new(0, 24),
        ));
        assert_eq!(grid.sch_prbs(SubcarrierSpacing::Scs15).count(), 0);
    }

    #[test]
    fn test_numerologies_are_independent() {
        let mut grid = CellSlotResourceGrid::new(&[
            carrier(SubcarrierSpacing::Scs15, 0, 52),
            carrier(SubcarrierSpacing::Scs30, 0, 24),
        ]);
        let g15 = GrantInfo::new(
            SubcarrierSpacing::Scs15,
            GrantChannel::Sch,
            OfdmSymbolRange::new(0, 14),
            PrbInterval::new(0, 10),
        );
        grid.fill(&g15);
        assert!(!grid.collides(&GrantInfo { scs: SubcarrierSpacing::Scs30, ..g15 }));
        assert!(grid.has_carrier(SubcarrierSpacing::Scs30));
        assert!(!grid.has_carrier(SubcarrierSpacing::Scs60));
    }

    #[test]
    fn test_carrier_offset_in_crbs() {
        let mut grid = CellSlotResourceGrid::new(&[carrier(SubcarrierSpacing::Scs15, 10, 20)]);
        let outside = GrantInfo::new(
            SubcarrierSpacing::Scs15,
            GrantChannel::Sch,
            OfdmSymbolRange::new(0, 14),
            PrbInterval::new(5, 12),
        );
        assert!(grid.collides(&outside));
        let inside = GrantInfo { crbs: PrbInterval::new(10, 12), ..outside };
        grid.fill(&inside);
        assert!(grid.sch_prbs(SubcarrierSpacing::Scs15).test(0));
        assert!(grid.sch_prbs(SubcarrierSpacing::Scs15).test(1));
        assert!(!grid.sch_prbs(SubcarrierSpacing::Scs15).test(2));
    }

    #[test]
    #[should_panic(expected = "Invalid numerology")]
    fn test_unconfigured_numerology_is_fatal() {
        let grid = CellSlotResourceGrid::new(&[carrier(SubcarrierSpacing::Scs15, 0, 52)]);
        grid.sch_prbs(SubcarrierSpacing::Scs60);
    }

    #[test]
    fn test_random_fills_match_reference() {
        let mut rng = rand::thread_rng();
        let mut grid = CarrierSubslotResourceGrid::new(carrier(SubcarrierSpacing::Scs15, 0, 50));
        let mut filled: Vec<(OfdmSymbolRange, PrbInterval)> = Vec::new();

        for _ in 0..20 {
            let s0 = rng.gen_range(0..14u8);
            let s1 = rng.gen_range(s0 + 1..=14u8);
            let p0 = rng.gen_range(0..50u16);
            let p1 = rng.gen_range(p0 + 1..=50u16);
            let region = (OfdmSymbolRange::new(s0, s1), PrbInterval::new(p0, p1));
            if rng.gen_bool(0.5) {
                grid.fill(region.0, region.1);
                filled.push(region);
            } else {
                let expected = filled
                    .iter()
                    .any(|(sym, prb)| sym.overlaps(&region.0) && prb.overlaps(&region.1));
                assert_eq!(grid.collides(region.0, region.1), expected);
            }
        }
    }
}
