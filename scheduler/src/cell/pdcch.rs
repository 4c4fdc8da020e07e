//! PDCCH candidate allocation on CORESET#0

use super::resource_grid::{CellSlotResourceAllocator, GrantChannel, GrantInfo};
use common::types::Rnti;
use common::PrbInterval;
use interfaces::sched_result::{DciFormat, PdcchInformation, PdcchRntiType};
use tracing::debug;

/// REGs per CCE
const NOF_REGS_PER_CCE: u16 = 6;

impl CellSlotResourceAllocator {
    /// CRBs of PDCCH candidate `candidate` at aggregation level `al`
    fn pdcch_candidate_crbs(&self, candidate: u16, al: u16) -> PrbInterval {
        let coreset = self.cfg().coreset0;
        let rbs_per_cce = NOF_REGS_PER_CCE / coreset.num_symbols as u16;
        let start = self.cfg().coreset0_crbs().start() + candidate * al * rbs_per_cce;
        PrbInterval::new(start, start + al * rbs_per_cce)
    }

    /// First free candidate of the configured aggregation level
    pub fn find_pdcch_candidate(&self) -> Option<(u16, GrantInfo)> {
        let al = self.cfg().aggregation_level as u16;
        if al == 0 {
            return None;
        }
        let nof_candidates = self.cfg().coreset0.nof_cces() / al;
        (0..nof_candidates).find_map(|candidate| {
            let grant = GrantInfo::new(
                self.cfg().common_scs,
                GrantChannel::Cch,
                self.cfg().coreset0_symbols(),
                self.pdcch_candidate_crbs(candidate, al),
            );
            (!self.dl_res_grid.collides(&grant)).then_some((candidate, grant))
        })
    }

    /// Whether a DCI of `dci_format` can still be added to this slot
    pub fn has_pdcch_room(&self, dci_format: DciFormat) -> bool {
        let list_full = match dci_format {
            DciFormat::F1_0 => self.result.dl.dl_pdcchs.is_full(),
            DciFormat::F0_0 => self.result.dl.ul_pdcchs.is_full(),
        };
        !list_full && self.find_pdcch_candidate().is_some()
    }

    /// Allocate a PDCCH and append it to the DL or UL DCI list
    pub fn alloc_pdcch(
        &mut self,
        rnti: Rnti,
        rnti_type: PdcchRntiType,
        dci_format: DciFormat,
    ) -> Option<PdcchInformation> {
        if !self.has_pdcch_room(dci_format) {
            debug!("slot={}: no PDCCH space for rnti={}", self.slot, rnti);
            return None;
        }
        let (candidate, grant) = self.find_pdcch_candidate()?;
        let al = self.cfg().aggregation_level;
        let pdcch = PdcchInformation {
            rnti,
            rnti_type,
            dci_format,
            cce_index: (candidate * al as u16) as u8,
            aggregation_level: al,
            prbs: grant.crbs,
            symbols: grant.symbols,
        };
        let pushed = match dci_format {
            DciFormat::F1_0 => self.result.dl.dl_pdcchs.push(pdcch).is_ok(),
            DciFormat::F0_0 => self.result.dl.ul_pdcchs.push(pdcch).is_ok(),
        };
        if !pushed {
            return None;
        }
        self.dl_res_grid.fill(&grant);
        Some(pdcch)
    }
}
