//! UE Scheduling Context
//!
//! One instance per cell group. Holds the UE repository, applies buffer state
//! and HARQ feedback, and allocates DL and UL UE grants in every slot of each
//! cell of the group. Retransmissions are served before new transmissions.

pub mod policy;
pub mod ue_context;

use crate::cell::cell_resource_allocator::CellResourceAllocator;
use crate::cell::resource_grid::{CellSlotResourceAllocator, GrantChannel, GrantInfo};
use crate::config::{CellConfiguration, SchedConfigurationNotifier, UeExpertConfig};
use crate::harq::HarqOutcome;
use crate::{report_fatal_error, sanity_check};
use common::types::{DuCellIndex, Rnti, UeIndex};
use interfaces::message_types::{
    DlBufferStateIndicationMessage, DlMacCeIndication, SchedUeCreationRequestMessage, SchedUeReconfigurationMessage,
    UciIndication, UlBsrIndicationMessage, UlCrcPduIndication,
};
use interfaces::sched_result::{DciFormat, DlMsgAlloc, PdcchRntiType, UlSchedInfo};
use policy::{Direction, GrantPolicy};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::{debug, info, warn};
pub use ue_context::{Ue, UeCell};

/// Cell resources registered with a UE scheduler
#[derive(Debug, Clone)]
pub struct UeSchedulerCellParams {
    /// Cell index
    pub cell_index: DuCellIndex,
    /// Cell configuration
    pub cfg: Arc<CellConfiguration>,
}

/// UE scheduler of one cell group
pub struct UeScheduler {
    expert: UeExpertConfig,
    config_notifier: Arc<dyn SchedConfigurationNotifier>,
    cells: HashMap<DuCellIndex, UeSchedulerCellParams>,
    ues: BTreeMap<UeIndex, Ue>,
    rnti_to_ue: HashMap<Rnti, UeIndex>,
    policy: GrantPolicy,
    /// Serving order of the current slot
    candidates: Vec<UeIndex>,
}

impl UeScheduler {
    pub fn new(expert: UeExpertConfig, config_notifier: Arc<dyn SchedConfigurationNotifier>) -> Self {
        let policy = GrantPolicy::new(expert.grant_policy);
        Self {
            expert,
            config_notifier,
            cells: HashMap::new(),
            ues: BTreeMap::new(),
            rnti_to_ue: HashMap::new(),
            policy,
            candidates: Vec::with_capacity(UeIndex::MAX_NOF_DU_UES as usize),
        }
    }

    /// Register a cell of the group
    pub fn add_cell(&mut self, params: UeSchedulerCellParams) {
        debug!("cell={}: added to UE scheduler", params.cell_index);
        self.cells.insert(params.cell_index, params);
    }

    pub fn has_cell(&self, cell_index: DuCellIndex) -> bool {
        self.cells.contains_key(&cell_index)
    }

    pub fn nof_ues(&self) -> usize {
        self.ues.len()
    }

    pub fn ue(&self, ue_index: UeIndex) -> Option<&Ue> {
        self.ues.get(&ue_index)
    }

    pub fn ue_index_of(&self, crnti: Rnti) -> Option<UeIndex> {
        self.rnti_to_ue.get(&crnti).copied()
    }

    pub fn handle_ue_creation_request(&mut self, msg: &SchedUeCreationRequestMessage) {
        let ue = Ue::new(msg.ue_index, msg.crnti, &msg.cells, &msg.logical_channels, &self.expert);
        if let Some(old) = self.ues.insert(msg.ue_index, ue) {
            warn!("ue={}: replaced existing context with rnti={}", msg.ue_index, old.crnti);
            self.rnti_to_ue.remove(&old.crnti);
        }
        self.rnti_to_ue.insert(msg.crnti, msg.ue_index);
        info!("ue={}: created with rnti={}", msg.ue_index, msg.crnti);
        self.config_notifier.on_ue_config_complete(msg.ue_index);
    }

    pub fn handle_ue_reconfiguration_request(&mut self, msg: &SchedUeReconfigurationMessage) {
        let Some(ue) = self.ues.get_mut(&msg.ue_index) else {
            report_fatal_error!("ue={}: reconfiguration of a UE that does not exist", msg.ue_index);
        };
        ue.reconfigure(&msg.cells, &msg.logical_channels, &self.expert);
        info!("ue={}: reconfigured", msg.ue_index);
        self.config_notifier.on_ue_config_complete(msg.ue_index);
    }

    pub fn handle_ue_removal_request(&mut self, ue_index: UeIndex) {
        let Some(ue) = self.ues.remove(&ue_index) else {
            report_fatal_error!("ue={}: removal of a UE that does not exist", ue_index);
        };
        self.rnti_to_ue.remove(&ue.crnti);
        info!("ue={}: removed", ue_index);
        self.config_notifier.on_ue_delete_response(ue_index);
    }

    pub fn handle_ul_bsr_indication(&mut self, bsr: &UlBsrIndicationMessage) {
        match self.ues.get_mut(&bsr.ue_index) {
            Some(ue) => ue.handle_bsr(bsr.reported_bytes),
            None => warn!("ue={}: BSR discarded, UE not found", bsr.ue_index),
        }
    }

    pub fn handle_dl_buffer_state_indication(&mut self, bs: &DlBufferStateIndicationMessage) {
        match self.ues.get_mut(&bs.ue_index) {
            Some(ue) => {
                if !ue.handle_dl_buffer_state(bs.lcid, bs.bs_bytes) {
                    warn!("ue={}: buffer state for unconfigured lcid={} discarded", bs.ue_index, bs.lcid);
                }
            }
            None => warn!("ue={}: buffer state discarded, UE not found", bs.ue_index),
        }
    }

    pub fn handle_dl_mac_ce_indication(&mut self, ce: &DlMacCeIndication) {
        match self.ues.get_mut(&ce.ue_index) {
            Some(ue) => ue.handle_dl_mac_ce(),
            None => warn!("ue={}: MAC CE discarded, UE not found", ce.ue_index),
        }
    }

    /// PUSCH CRCs of identified UEs
    pub fn handle_crc_indication(&mut self, cell_index: DuCellIndex, crcs: &[UlCrcPduIndication]) {
        for crc in crcs {
            let ue_index = crc.ue_index.or_else(|| self.ue_index_of(crc.rnti));
            let Some(ue) = ue_index.and_then(|idx| self.ues.get_mut(&idx)) else {
                warn!("rnti={}: CRC discarded, UE not found", crc.rnti);
                continue;
            };
            let ue_index = ue.ue_index;
            let Some(harq) = ue.cell_mut(cell_index).and_then(|c| c.ul_harq_mut(crc.harq_id)) else {
                warn!("ue={}: CRC for unknown cell={} or h_id={}", ue_index, cell_index, crc.harq_id);
                continue;
            };
            match harq.ack_info(crc.tb_crc_success) {
                Some(HarqOutcome::MaxRetxReached) => {
                    warn!("ue={}: UL h_id={} discarded after max retransmissions", ue_index, crc.harq_id);
                }
                Some(outcome) => debug!("ue={}: UL h_id={} {:?}", ue_index, crc.harq_id, outcome),
                None => warn!("ue={}: unexpected CRC for UL h_id={}", ue_index, crc.harq_id),
            }
        }
    }

    /// HARQ-ACK, CQI and SR reports
    pub fn handle_uci_indication(&mut self, uci: &UciIndication) {
        for pdu in &uci.ucis {
            let Some(ue) = self.ues.get_mut(&pdu.ue_index) else {
                warn!("ue={}: UCI discarded, UE not found", pdu.ue_index);
                continue;
            };
            if let Some(cqi) = pdu.cqi {
                ue.set_cqi(cqi);
            }
            if pdu.sr_detected {
                ue.handle_sr();
            }
            let ue_index = ue.ue_index;
            let Some(ue_cell) = ue.cell_mut(uci.cell_index) else {
                warn!("ue={}: UCI for non-serving cell={}", ue_index, uci.cell_index);
                continue;
            };
            for report in &pdu.harq_acks {
                match ue_cell.dl_harq_mut(report.harq_id).and_then(|h| h.ack_info(report.ack)) {
                    Some(HarqOutcome::MaxRetxReached) => {
                        warn!("ue={}: DL h_id={} discarded after max retransmissions", ue_index, report.harq_id);
                    }
                    Some(_) => {}
                    None => warn!("ue={}: unexpected HARQ-ACK for DL h_id={}", ue_index, report.harq_id),
                }
            }
        }
    }

    /// Allocate UE grants of `cell_index` for the current slot
    pub fn run_slot(&mut self, cell_index: DuCellIndex, res_alloc: &mut CellResourceAllocator) {
        let Some(cell) = self.cells.get(&cell_index) else {
            report_fatal_error!("cell={}: not registered in the UE scheduler", cell_index);
        };
        let cfg = cell.cfg.clone();
        let sl_tx = res_alloc[0].slot;

        for ue in self.ues.values_mut() {
            let ue_index = ue.ue_index;
            if let Some(ue_cell) = ue.cell_mut(cell_index) {
                for h in ue_cell.dl_harqs_mut() {
                    if let Some(HarqOutcome::MaxRetxReached) = h.slot_indication(sl_tx) {
                        warn!("ue={}: DL h_id={} discarded after feedback timeout", ue_index, h.id());
                    }
                }
                for h in ue_cell.ul_harqs_mut() {
                    if let Some(HarqOutcome::MaxRetxReached) = h.slot_indication(sl_tx) {
                        warn!("ue={}: UL h_id={} discarded after feedback timeout", ue_index, h.id());
                    }
                }
            }
        }

        if self.ues.is_empty() || !res_alloc[0].is_dl_active() {
            return;
        }

        self.schedule_dl(&cfg, &mut res_alloc[0]);

        let k2 = self.expert.k2 as usize;
        let (pdcch_alloc, pusch_alloc) = res_alloc.get_pair_mut(0, k2);
        if pusch_alloc.is_ul_active() {
            self.schedule_ul(&cfg, pdcch_alloc, pusch_alloc);
        }
    }

    fn schedule_dl(&mut self, cfg: &CellConfiguration, slot_alloc: &mut CellSlotResourceAllocator) {
        let cell_index = cfg.cell_index;
        let bytes_per_prb = self.expert.bytes_per_prb.max(1);
        self.policy.order_candidates(&self.ues, Direction::Dl, &mut self.candidates);

        let mut nof_grants = 0;
        for ue_index in self.candidates.iter() {
            if nof_grants >= self.expert.max_grants_per_slot || slot_alloc.result.dl.ue_grants.is_full() {
                break;
            }
            let Some(ue) = self.ues.get_mut(ue_index) else { continue };
            let crnti = ue.crnti;
            let pending_bytes = ue.pending_dl_bytes();
            let Some(ue_cell) = ue.cell_mut(cell_index) else { continue };

            let is_retx = ue_cell.has_pending_dl_retx();
            let nof_prbs = if is_retx {
                ue_cell.find_pending_dl_retx().map_or(0, |h| h.prbs().length())
            } else if pending_bytes > 0 && ue_cell.find_empty_dl_harq().is_some() {
                pending_bytes.div_ceil(bytes_per_prb).min(self.expert.max_prbs_per_grant as u32) as u16
            } else {
                continue;
            };

            let crbs = slot_alloc.find_dl_crbs(nof_prbs);
            if crbs.is_empty() || (is_retx && crbs.length() < nof_prbs) {
                continue;
            }
            if slot_alloc.alloc_pdcch(crnti, PdcchRntiType::C, DciFormat::F1_0).is_none() {
                break;
            }
            let symbols = cfg.pdsch_symbols();
            slot_alloc
                .dl_res_grid
                .fill(&GrantInfo::new(cfg.common_scs, GrantChannel::Sch, symbols, crbs));

            let (harq_id, tbs_bytes) = if is_retx {
                let Some(h) = ue_cell.find_pending_dl_retx() else { continue };
                h.new_retx(slot_alloc.slot, crbs);
                (h.id(), h.tbs_bytes())
            } else {
                let Some(h) = ue_cell.find_empty_dl_harq() else { continue };
                let tbs_bytes = crbs.length() as u32 * bytes_per_prb;
                h.new_tx(slot_alloc.slot, crbs, self.expert.mcs, tbs_bytes);
                (h.id(), tbs_bytes)
            };
            if !is_retx {
                ue.consume_dl_bytes(tbs_bytes);
            }

            let grant = DlMsgAlloc {
                ue_index: *ue_index,
                crnti,
                harq_id,
                prbs: crbs,
                symbols,
                tbs_bytes,
                is_retx,
            };
            sanity_check!(
                slot_alloc.result.dl.ue_grants.push(grant).is_ok(),
                "ue={}: DL grant list full after check", ue_index
            );
            nof_grants += 1;
            debug!("ue={}: DL h_id={} prbs={} tbs={} retx={}", ue_index, harq_id, crbs, tbs_bytes, is_retx);
        }
    }

    fn schedule_ul(
        &mut self,
        cfg: &CellConfiguration,
        pdcch_alloc: &mut CellSlotResourceAllocator,
        pusch_alloc: &mut CellSlotResourceAllocator,
    ) {
        let cell_index = cfg.cell_index;
        let bytes_per_prb = self.expert.bytes_per_prb.max(1);
        self.policy.order_candidates(&self.ues, Direction::Ul, &mut self.candidates);

        let mut nof_grants = 0;
        for ue_index in self.candidates.iter() {
            if nof_grants >= self.expert.max_grants_per_slot || pusch_alloc.result.ul.puschs.is_full() {
                break;
            }
            let Some(ue) = self.ues.get_mut(ue_index) else { continue };
            let crnti = ue.crnti;
            let pending_bytes = ue.pending_ul_bytes();
            let Some(ue_cell) = ue.cell_mut(cell_index) else { continue };

            let is_retx = ue_cell.has_pending_ul_retx();
            let nof_prbs = if is_retx {
                ue_cell.find_pending_ul_retx().map_or(0, |h| h.prbs().length())
            } else if pending_bytes > 0 && ue_cell.find_empty_ul_harq().is_some() {
                pending_bytes.div_ceil(bytes_per_prb).min(self.expert.max_prbs_per_grant as u32) as u16
            } else {
                continue;
            };

            let crbs = pusch_alloc.find_ul_crbs(nof_prbs);
            if crbs.is_empty() || (is_retx && crbs.length() < nof_prbs) {
                continue;
            }
            if pdcch_alloc.alloc_pdcch(crnti, PdcchRntiType::C, DciFormat::F0_0).is_none() {
                break;
            }
            let symbols = cfg.pusch_symbols();
            pusch_alloc
                .ul_res_grid
                .fill(&GrantInfo::new(cfg.common_scs, GrantChannel::Sch, symbols, crbs));

            let (harq_id, mcs) = if is_retx {
                let Some(h) = ue_cell.find_pending_ul_retx() else { continue };
                h.new_retx(pusch_alloc.slot, crbs);
                (h.id(), h.mcs())
            } else {
                let Some(h) = ue_cell.find_empty_ul_harq() else { continue };
                let tbs_bytes = crbs.length() as u32 * bytes_per_prb;
                h.new_tx(pusch_alloc.slot, crbs, self.expert.mcs, tbs_bytes);
                (h.id(), self.expert.mcs)
            };
            if !is_retx {
                ue.consume_ul_bytes(crbs.length() as u32 * bytes_per_prb);
            }

            let pusch = UlSchedInfo {
                crnti,
                ue_index: Some(*ue_index),
                harq_id,
                prbs: crbs,
                symbols,
                mcs,
                is_msg3: false,
                is_retx,
            };
            sanity_check!(
                pusch_alloc.result.ul.puschs.push(pusch).is_ok(),
                "ue={}: PUSCH list full after check", ue_index
            );
            nof_grants += 1;
            debug!("ue={}: UL h_id={} prbs={} slot={} retx={}", ue_index, harq_id, crbs, pusch_alloc.slot, is_retx);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SchedulerExpertConfig;
    use crate::test_utils::{make_cell_cfg, make_cell_request, make_ue_request, slot, RecordingConfigNotifier};
    use interfaces::message_types::{HarqAckReport, UciPduIndication};

    struct TestBench {
        ue_sched: UeScheduler,
        res_grid: CellResourceAllocator,
        notifier: Arc<RecordingConfigNotifier>,
        next_slot: u32,
    }

    impl TestBench {
        fn new() -> Self {
            let expert = SchedulerExpertConfig::default();
            let cfg = make_cell_cfg(&make_cell_request(0, 0), &expert);
            let notifier = Arc::new(RecordingConfigNotifier::default());
            let mut ue_sched = UeScheduler::new(expert.ue, notifier.clone());
            ue_sched.add_cell(UeSchedulerCellParams { cell_index: DuCellIndex(0), cfg: cfg.clone() });
            Self {
                ue_sched,
                res_grid: CellResourceAllocator::new(cfg),
                notifier,
                next_slot: 1,
            }
        }

        fn run(&mut self) {
            self.res_grid.slot_indication(slot(self.next_slot));
            self.ue_sched.run_slot(DuCellIndex(0), &mut self.res_grid);
            self.next_slot += 1;
        }
    }

    #[test]
    fn test_ue_lifecycle_notifies() {
        let mut bench = TestBench::new();
        bench.ue_sched.handle_ue_creation_request(&make_ue_request(3, 0x4601, 0));
        assert_eq!(bench.ue_sched.nof_ues(), 1);
        assert_eq!(bench.ue_sched.ue_index_of(Rnti(0x4601)), Some(UeIndex(3)));
        bench.ue_sched.handle_ue_removal_request(UeIndex(3));
        assert_eq!(bench.ue_sched.nof_ues(), 0);
        assert_eq!(*bench.notifier.completed.lock().unwrap(), vec![UeIndex(3)]);
        assert_eq!(*bench.notifier.deleted.lock().unwrap(), vec![UeIndex(3)]);
    }

    #[test]
    #[should_panic(expected = "does not exist")]
    fn test_removal_of_unknown_ue_is_fatal() {
        let mut bench = TestBench::new();
        bench.ue_sched.handle_ue_removal_request(UeIndex(9));
    }

    #[test]
    fn test_dl_grant_from_buffer_state() {
        let mut bench = TestBench::new();
        bench.ue_sched.handle_ue_creation_request(&make_ue_request(0, 0x4601, 0));
        bench.ue_sched.handle_dl_buffer_state_indication(&DlBufferStateIndicationMessage {
            ue_index: UeIndex(0),
            lcid: 4,
            bs_bytes: 200,
        });
        bench.run();

        let grants = &bench.res_grid[0].result.dl.ue_grants;
        assert_eq!(grants.len(), 1);
        // 200 bytes at 40 bytes per PRB
        assert_eq!(grants[0].prbs.length(), 5);
        assert_eq!(grants[0].tbs_bytes, 200);
        assert!(!grants[0].is_retx);
        assert_eq!(bench.ue_sched.ue(UeIndex(0)).unwrap().pending_dl_bytes(), 0);

        // Nothing left to send
        bench.run();
        assert!(bench.res_grid[0].result.dl.ue_grants.is_empty());
    }

    #[test]
    fn test_dl_nack_leads_to_retx() {
        let mut bench = TestBench::new();
        bench.ue_sched.handle_ue_creation_request(&make_ue_request(0, 0x4601, 0));
        bench.ue_sched.handle_dl_buffer_state_indication(&DlBufferStateIndicationMessage {
            ue_index: UeIndex(0),
            lcid: 4,
            bs_bytes: 80,
        });
        bench.run();
        let h_id = bench.res_grid[0].result.dl.ue_grants[0].harq_id;

        bench.ue_sched.handle_uci_indication(&UciIndication {
            cell_index: DuCellIndex(0),
            slot_rx: slot(5),
            ucis: vec![UciPduIndication {
                ue_index: UeIndex(0),
                crnti: Rnti(0x4601),
                harq_acks: vec![HarqAckReport { harq_id: h_id, ack: false }],
                cqi: Some(12),
                sr_detected: false,
            }],
        });
        bench.run();
        let grant = bench.res_grid[0].result.dl.ue_grants[0];
        assert!(grant.is_retx);
        assert_eq!(grant.harq_id, h_id);
        assert_eq!(grant.tbs_bytes, 80);
        assert_eq!(bench.ue_sched.ue(UeIndex(0)).unwrap().cqi(), Some(12));
    }

    #[test]
    fn test_ul_grant_at_k2() {
        let mut bench = TestBench::new();
        bench.ue_sched.handle_ue_creation_request(&make_ue_request(0, 0x4601, 0));
        bench.ue_sched.handle_ul_bsr_indication(&UlBsrIndicationMessage {
            cell_index: DuCellIndex(0),
            ue_index: UeIndex(0),
            crnti: Rnti(0x4601),
            reported_bytes: 4000,
        });
        bench.run();

        assert_eq!(bench.res_grid[0].result.dl.ul_pdcchs.len(), 1);
        let k2 = SchedulerExpertConfig::default().ue.k2 as usize;
        let pusch = bench.res_grid[k2].result.ul.puschs[0];
        assert_eq!(pusch.ue_index, Some(UeIndex(0)));
        assert_eq!(pusch.prbs.length(), 32);
        assert!(!pusch.is_msg3);
    }

    #[test]
    fn test_ul_crc_nack_retransmits_same_size() {
        let mut bench = TestBench::new();
        bench.ue_sched.handle_ue_creation_request(&make_ue_request(0, 0x4601, 0));
        bench.ue_sched.handle_ul_bsr_indication(&UlBsrIndicationMessage {
            cell_index: DuCellIndex(0),
            ue_index: UeIndex(0),
            crnti: Rnti(0x4601),
            reported_bytes: 120,
        });
        bench.run();
        let k2 = SchedulerExpertConfig::default().ue.k2 as usize;
        let first = bench.res_grid[k2].result.ul.puschs[0];

        bench.ue_sched.handle_crc_indication(
            DuCellIndex(0),
            &[UlCrcPduIndication {
                ue_index: Some(UeIndex(0)),
                rnti: Rnti(0x4601),
                harq_id: first.harq_id,
                tb_crc_success: false,
            }],
        );
        bench.run();
        let retx = bench.res_grid[k2].result.ul.puschs[0];
        assert!(retx.is_retx);
        assert_eq!(retx.prbs.length(), first.prbs.length());
    }

    #[test]
    fn test_unknown_ue_feedback_dropped() {
        let mut bench = TestBench::new();
        bench.ue_sched.handle_ul_bsr_indication(&UlBsrIndicationMessage {
            cell_index: DuCellIndex(0),
            ue_index: UeIndex(5),
            crnti: Rnti(0x4601),
            reported_bytes: 100,
        });
        bench.run();
        assert!(bench.res_grid[0].result.is_empty());
    }
}
