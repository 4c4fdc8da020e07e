//! MAC Scheduler
//!
//! Top-level dispatcher. Owns every configured cell and the UE scheduling
//! context of every cell group, routes indications to them, and runs the
//! per-slot scheduling pass of one cell at a time.
//!
//! All methods take `&mut self`: configuration requests and slot indications
//! of one scheduler instance are serialised by its owner.

use crate::cell::SchedulerCell;
use crate::config::{CellConfiguration, SchedConfigurationNotifier, SchedulerConfig, SchedulerExpertConfig};
use crate::config_validator::{validate_sched_cell_configuration_request, validate_sched_ue_creation_request};
use crate::logging::{SchedEvent, SchedResultLogger, SchedulerEventLogger};
use crate::metrics::SchedulerMetricsHandler;
use crate::ue::{UeScheduler, UeSchedulerCellParams};
use crate::{report_fatal_error, SchedError};
use common::types::{CellGroupIndex, DuCellIndex, UeIndex};
use common::SlotPoint;
use interfaces::message_types::{
    DlBufferStateIndicationMessage, DlMacCeIndication, RachIndicationMessage, SchedCellConfigurationRequest,
    SchedPagingInformation, SchedUeCreationRequestMessage, SchedUeReconfigurationMessage, UciIndication,
    UlBsrIndicationMessage, UlCrcIndication, UlCrcPduIndication,
};
use interfaces::sched_result::{SchedResult, MAX_PUSCH_PDUS_PER_SLOT};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::{debug_span, info, warn};

/// A configured cell with its loggers
struct CellContext {
    cell: SchedulerCell,
    ev_logger: SchedulerEventLogger,
    res_logger: SchedResultLogger,
}

/// MAC scheduler of a DU
pub struct MacScheduler {
    expert: SchedulerExpertConfig,
    config_notifier: Arc<dyn SchedConfigurationNotifier>,
    cells: BTreeMap<DuCellIndex, CellContext>,
    /// UE scheduling context per cell group, created with the group's first cell
    groups: HashMap<CellGroupIndex, UeScheduler>,
    /// Cell group of every created UE, keyed by the UE's PCell at creation
    ue_to_cell_group: HashMap<UeIndex, CellGroupIndex>,
    metrics: SchedulerMetricsHandler,
    /// Scratch list of identified-UE CRCs of the current indication
    ue_crcs: Vec<UlCrcPduIndication>,
}

impl MacScheduler {
    pub fn new(cfg: SchedulerConfig) -> Self {
        let metrics = SchedulerMetricsHandler::new(cfg.expert_params.metrics_report_period, cfg.metrics_notifier);
        Self {
            expert: cfg.expert_params,
            config_notifier: cfg.config_notifier,
            cells: BTreeMap::new(),
            groups: HashMap::new(),
            ue_to_cell_group: HashMap::new(),
            metrics,
            ue_crcs: Vec::with_capacity(MAX_PUSCH_PDUS_PER_SLOT),
        }
    }

    pub fn nof_cells(&self) -> usize {
        self.cells.len()
    }

    pub fn nof_cell_groups(&self) -> usize {
        self.groups.len()
    }

    pub fn cell(&self, cell_index: DuCellIndex) -> Option<&SchedulerCell> {
        self.cells.get(&cell_index).map(|c| &c.cell)
    }

    pub fn cell_group_of(&self, ue_index: UeIndex) -> Option<CellGroupIndex> {
        self.ue_to_cell_group.get(&ue_index).copied()
    }

    pub fn ue_scheduler(&self, group: CellGroupIndex) -> Option<&UeScheduler> {
        self.groups.get(&group)
    }

    /// Add a cell. The request is validated before any state is created.
    pub fn handle_cell_configuration_request(&mut self, msg: &SchedCellConfigurationRequest) -> Result<(), SchedError> {
        validate_sched_cell_configuration_request(msg, &self.expert)?;
        if self.cells.contains_key(&msg.cell_index) {
            return Err(SchedError::ConfigurationError(format!("cell={} already exists", msg.cell_index)));
        }
        let cell_cfg = Arc::new(CellConfiguration::new(msg, &self.expert)?);

        let ue_sched = self
            .groups
            .entry(msg.cell_group_index)
            .or_insert_with(|| UeScheduler::new(self.expert.ue.clone(), self.config_notifier.clone()));
        ue_sched.add_cell(UeSchedulerCellParams {
            cell_index: msg.cell_index,
            cfg: cell_cfg.clone(),
        });

        let mut ev_logger = SchedulerEventLogger::new(msg.cell_index);
        ev_logger.enqueue(SchedEvent::CellConfig { cell_index: msg.cell_index });
        self.cells.insert(
            msg.cell_index,
            CellContext {
                cell: SchedulerCell::new(cell_cfg, &self.expert),
                ev_logger,
                res_logger: SchedResultLogger::new(msg.cell_index, self.expert.log_broadcast_messages),
            },
        );
        self.metrics.add_cell(msg.cell_index);

        info!("cell={}: configured in group={}", msg.cell_index, msg.cell_group_index);
        Ok(())
    }

    /// Create a UE in the cell group of its PCell
    pub fn handle_ue_creation_request(&mut self, msg: &SchedUeCreationRequestMessage) -> Result<(), SchedError> {
        validate_sched_ue_creation_request(msg)?;
        let pcell_index = msg.cells[0].cell_index;
        let Some(pcell) = self.cells.get_mut(&pcell_index) else {
            return Err(SchedError::UnknownEntity(format!("ue={}: PCell={} not configured", msg.ue_index, pcell_index)));
        };
        let group = pcell.cell.cell_cfg.cell_group_index;
        if let Some(cell) = msg.cells.iter().find(|c| !self.groups.get(&group).is_some_and(|g| g.has_cell(c.cell_index))) {
            return Err(SchedError::UnknownEntity(format!(
                "ue={}: serving cell={} not part of group={}",
                msg.ue_index, cell.cell_index, group
            )));
        }
        pcell.ev_logger.enqueue(SchedEvent::UeCreation {
            ue_index: msg.ue_index,
            rnti: msg.crnti,
        });

        self.ue_to_cell_group.insert(msg.ue_index, group);
        self.group_mut(group).handle_ue_creation_request(msg);
        Ok(())
    }

    pub fn handle_ue_reconfiguration_request(&mut self, msg: &SchedUeReconfigurationMessage) {
        let group = self.ue_group_or_fatal(msg.ue_index);
        self.log_ue_event(msg.ue_index, SchedEvent::UeReconfig { ue_index: msg.ue_index });
        self.group_mut(group).handle_ue_reconfiguration_request(msg);
    }

    pub fn handle_ue_removal_request(&mut self, ue_index: UeIndex) {
        let group = self.ue_group_or_fatal(ue_index);
        self.log_ue_event(ue_index, SchedEvent::UeRemoval { ue_index });
        self.group_mut(group).handle_ue_removal_request(ue_index);
        self.ue_to_cell_group.remove(&ue_index);
    }

    /// PRACH detection. Rejected detections are logged and dropped.
    pub fn handle_rach_indication(&mut self, msg: &RachIndicationMessage) -> Result<(), SchedError> {
        let ctx = self.cell_mut(msg.cell_index);
        ctx.ev_logger.enqueue(SchedEvent::Rach {
            slot_rx: msg.slot_rx,
            preamble_id: msg.preamble_id,
            tc_rnti: msg.tc_rnti,
        });
        ctx.cell.ra_sch.handle_rach_indication(msg)
    }

    /// CRC batch, split between Msg3 and identified-UE transmissions in one pass
    pub fn handle_crc_indication(&mut self, crc_ind: &UlCrcIndication) {
        let Some(ctx) = self.cells.get_mut(&crc_ind.cell_index) else {
            report_fatal_error!("cell={} does not exist", crc_ind.cell_index);
        };
        self.ue_crcs.clear();
        for crc in &crc_ind.crcs {
            ctx.ev_logger.enqueue(SchedEvent::Crc {
                rnti: crc.rnti,
                harq_id: crc.harq_id,
                ok: crc.tb_crc_success,
            });
            match crc.ue_index {
                None => ctx.cell.ra_sch.handle_crc_indication(crc),
                Some(_) => self.ue_crcs.push(*crc),
            }
        }
        if self.ue_crcs.is_empty() {
            return;
        }
        let group = ctx.cell.cell_cfg.cell_group_index;
        match self.groups.get_mut(&group) {
            Some(ue_sched) => ue_sched.handle_crc_indication(crc_ind.cell_index, &self.ue_crcs),
            None => report_fatal_error!("cell={}: group={} does not exist", crc_ind.cell_index, group),
        }
    }

    pub fn handle_uci_indication(&mut self, uci: &UciIndication) {
        let ctx = self.cell_mut(uci.cell_index);
        for pdu in &uci.ucis {
            for ack in &pdu.harq_acks {
                ctx.ev_logger.enqueue(SchedEvent::HarqAck {
                    ue_index: pdu.ue_index,
                    harq_id: ack.harq_id,
                    ack: ack.ack,
                });
            }
            if pdu.sr_detected {
                ctx.ev_logger.enqueue(SchedEvent::Sr { ue_index: pdu.ue_index });
            }
        }
        let group = ctx.cell.cell_cfg.cell_group_index;
        self.group_mut(group).handle_uci_indication(uci);
    }

    pub fn handle_ul_bsr_indication(&mut self, bsr: &UlBsrIndicationMessage) {
        let Some(group) = self.cell_group_of(bsr.ue_index) else {
            warn!("ue={}: Discarding UL BSR, UE not recognized", bsr.ue_index);
            return;
        };
        if let Some(ctx) = self.cells.get_mut(&bsr.cell_index) {
            ctx.ev_logger.enqueue(SchedEvent::Bsr {
                ue_index: bsr.ue_index,
                bytes: bsr.reported_bytes,
            });
        }
        self.group_mut(group).handle_ul_bsr_indication(bsr);
    }

    pub fn handle_dl_buffer_state_indication(&mut self, bs: &DlBufferStateIndicationMessage) {
        let Some(group) = self.cell_group_of(bs.ue_index) else {
            warn!("ue={}: Discarding DL buffer state update, UE not recognized", bs.ue_index);
            return;
        };
        self.log_ue_event(
            bs.ue_index,
            SchedEvent::DlBufferState {
                ue_index: bs.ue_index,
                lcid: bs.lcid,
                bytes: bs.bs_bytes,
            },
        );
        self.group_mut(group).handle_dl_buffer_state_indication(bs);
    }

    pub fn handle_dl_mac_ce_indication(&mut self, ce: &DlMacCeIndication) {
        let Some(group) = self.cell_group_of(ce.ue_index) else {
            warn!("ue={}: Discarding MAC CE update, UE not recognized", ce.ue_index);
            return;
        };
        self.log_ue_event(
            ce.ue_index,
            SchedEvent::DlMacCe {
                ue_index: ce.ue_index,
                ce_lcid: ce.ce_lcid,
            },
        );
        self.group_mut(group).handle_dl_mac_ce_indication(ce);
    }

    /// Forward a paging request to every listed cell
    pub fn handle_paging_information(&mut self, pi: &SchedPagingInformation) {
        for cell_index in &pi.paging_cells {
            match self.cells.get_mut(cell_index) {
                Some(ctx) => {
                    ctx.ev_logger.enqueue(SchedEvent::Paging {
                        paging_identity: pi.paging_identity,
                    });
                    ctx.cell.pg_sch.handle_paging_information(pi);
                }
                None => warn!("cell={}: paging for identity={} dropped, cell not configured", cell_index, pi.paging_identity),
            }
        }
    }

    /// Run the scheduling pass of `cell_index` for `sl_tx` and return its result.
    ///
    /// Slot indications of a cell must be consecutive.
    pub fn slot_indication(&mut self, sl_tx: SlotPoint, cell_index: DuCellIndex) -> &SchedResult {
        let _span = debug_span!("slot", cell = %cell_index, slot = %sl_tx).entered();
        let Some(ctx) = self.cells.get_mut(&cell_index) else {
            report_fatal_error!("cell={} does not exist", cell_index);
        };
        let group = ctx.cell.cell_cfg.cell_group_index;
        let Some(ue_sched) = self.groups.get_mut(&group) else {
            report_fatal_error!("cell={}: group={} does not exist", cell_index, group);
        };

        ctx.res_logger.on_slot_start();
        let result = ctx.cell.run_slot(sl_tx, ue_sched);
        ctx.ev_logger.log(sl_tx);
        ctx.res_logger.on_scheduler_result(sl_tx, result);
        self.metrics.push_result(cell_index, sl_tx, result);
        result
    }

    fn cell_mut(&mut self, cell_index: DuCellIndex) -> &mut CellContext {
        match self.cells.get_mut(&cell_index) {
            Some(ctx) => ctx,
            None => report_fatal_error!("cell={} does not exist", cell_index),
        }
    }

    fn group_mut(&mut self, group: CellGroupIndex) -> &mut UeScheduler {
        match self.groups.get_mut(&group) {
            Some(ue_sched) => ue_sched,
            None => report_fatal_error!("group={} does not exist", group),
        }
    }

    fn ue_group_or_fatal(&self, ue_index: UeIndex) -> CellGroupIndex {
        match self.cell_group_of(ue_index) {
            Some(group) => group,
            None => report_fatal_error!("ue={} not yet created", ue_index),
        }
    }

    /// Record an event in the log of the UE's PCell
    fn log_ue_event(&mut self, ue_index: UeIndex, event: SchedEvent) {
        let pcell = self
            .cell_group_of(ue_index)
            .and_then(|g| self.groups.get(&g))
            .and_then(|g| g.ue(ue_index))
            .and_then(|ue| ue.pcell_index());
        if let Some(ctx) = pcell.and_then(|c| self.cells.get_mut(&c)) {
            ctx.ev_logger.enqueue(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{make_cell_request, make_rach, make_sched_config, make_ue_request, slot};
    use common::types::Rnti;
    use interfaces::message_types::{HarqAckReport, UciPduIndication};

    fn make_scheduler() -> MacScheduler {
        let (cfg, _, _) = make_sched_config(SchedulerExpertConfig::default());
        MacScheduler::new(cfg)
    }

    #[test]
    fn test_cell_groups_created_lazily() {
        let mut sched = make_scheduler();
        sched.handle_cell_configuration_request(&make_cell_request(0, 0)).unwrap();
        sched.handle_cell_configuration_request(&make_cell_request(1, 0)).unwrap();
        sched.handle_cell_configuration_request(&make_cell_request(2, 1)).unwrap();
        assert_eq!(sched.nof_cells(), 3);
        assert_eq!(sched.nof_cell_groups(), 2);
        assert!(sched.ue_scheduler(CellGroupIndex(0)).unwrap().has_cell(DuCellIndex(1)));
    }

    #[test]
    fn test_invalid_cell_rejected_without_state() {
        let mut sched = make_scheduler();
        let mut req = make_cell_request(0, 0);
        req.rach.ra_resp_window = 7;
        let err = sched.handle_cell_configuration_request(&req).unwrap_err();
        assert!(matches!(err, SchedError::ConfigurationError(_)));
        assert_eq!(sched.nof_cells(), 0);
        assert_eq!(sched.nof_cell_groups(), 0);

        sched.handle_cell_configuration_request(&make_cell_request(0, 0)).unwrap();
        assert!(sched.handle_cell_configuration_request(&make_cell_request(0, 0)).is_err());
    }

    #[test]
    fn test_expert_values_that_break_slot_processing_rejected() {
        let mut expert = SchedulerExpertConfig::default();
        expert.ue.k2 = 0;
        let (cfg, _, _) = make_sched_config(expert);
        let mut sched = MacScheduler::new(cfg);
        assert!(sched.handle_cell_configuration_request(&make_cell_request(0, 0)).is_err());
        assert_eq!(sched.nof_cells(), 0);

        let mut expert = SchedulerExpertConfig::default();
        expert.ra.nof_prbs_per_rar = 0;
        let (cfg, _, _) = make_sched_config(expert);
        let mut sched = MacScheduler::new(cfg);
        assert!(sched.handle_cell_configuration_request(&make_cell_request(0, 0)).is_err());
        assert_eq!(sched.nof_cell_groups(), 0);
    }

    #[test]
    fn test_ue_mapped_to_pcell_group() {
        let (cfg, cfg_notifier, _) = make_sched_config(SchedulerExpertConfig::default());
        let mut sched = MacScheduler::new(cfg);
        sched.handle_cell_configuration_request(&make_cell_request(0, 0)).unwrap();
        sched.handle_cell_configuration_request(&make_cell_request(1, 3)).unwrap();

        sched.handle_ue_creation_request(&make_ue_request(7, 0x4601, 1)).unwrap();
        assert_eq!(sched.cell_group_of(UeIndex(7)), Some(CellGroupIndex(3)));
        assert_eq!(sched.ue_scheduler(CellGroupIndex(3)).unwrap().nof_ues(), 1);
        assert_eq!(sched.ue_scheduler(CellGroupIndex(0)).unwrap().nof_ues(), 0);

        sched.handle_ue_removal_request(UeIndex(7));
        assert_eq!(sched.cell_group_of(UeIndex(7)), None);
        assert_eq!(*cfg_notifier.completed.lock().unwrap(), vec![UeIndex(7)]);
        assert_eq!(*cfg_notifier.deleted.lock().unwrap(), vec![UeIndex(7)]);
    }

    #[test]
    fn test_ue_on_unknown_pcell_rejected() {
        let mut sched = make_scheduler();
        sched.handle_cell_configuration_request(&make_cell_request(0, 0)).unwrap();
        let err = sched.handle_ue_creation_request(&make_ue_request(0, 0x4601, 5)).unwrap_err();
        assert!(matches!(err, SchedError::UnknownEntity(_)));
        assert_eq!(sched.cell_group_of(UeIndex(0)), None);
    }

    #[test]
    #[should_panic(expected = "not yet created")]
    fn test_removal_of_unknown_ue_is_fatal() {
        let mut sched = make_scheduler();
        sched.handle_cell_configuration_request(&make_cell_request(0, 0)).unwrap();
        sched.handle_ue_removal_request(UeIndex(4));
    }

    #[test]
    fn test_feedback_for_unknown_ue_dropped() {
        let mut sched = make_scheduler();
        sched.handle_cell_configuration_request(&make_cell_request(0, 0)).unwrap();
        sched.handle_ul_bsr_indication(&UlBsrIndicationMessage {
            cell_index: DuCellIndex(0),
            ue_index: UeIndex(3),
            crnti: Rnti(0x4601),
            reported_bytes: 1000,
        });
        sched.handle_dl_buffer_state_indication(&DlBufferStateIndicationMessage {
            ue_index: UeIndex(3),
            lcid: 4,
            bs_bytes: 1000,
        });
        let result = sched.slot_indication(slot(1), DuCellIndex(0));
        assert!(result.dl.ue_grants.is_empty());
        assert!(result.ul.puschs.is_empty());
    }

    #[test]
    fn test_rach_to_rar_and_msg3() {
        let mut sched = make_scheduler();
        sched.handle_cell_configuration_request(&make_cell_request(0, 0)).unwrap();
        sched.slot_indication(slot(0), DuCellIndex(0));
        sched.handle_rach_indication(&make_rach(0, slot(0), 0, 0, 5, 0x4601)).unwrap();

        let result = sched.slot_indication(slot(1), DuCellIndex(0));
        assert_eq!(result.dl.rars.len(), 1);
        assert_eq!(result.dl.rars[0].ra_rnti, Rnti(1));
        assert_eq!(result.dl.rars[0].grants[0].tc_rnti, Rnti(0x4601));

        let msg3_delay = SchedulerExpertConfig::default().ra.msg3_delay;
        for count in 2..(1 + msg3_delay) {
            sched.slot_indication(slot(count), DuCellIndex(0));
        }
        let result = sched.slot_indication(slot(1 + msg3_delay), DuCellIndex(0));
        let msg3 = result.ul.puschs[0];
        assert!(msg3.is_msg3);
        assert_eq!(msg3.crnti, Rnti(0x4601));

        // Msg3 decoded, the TC-RNTI is free again
        sched.handle_crc_indication(&UlCrcIndication {
            cell_index: DuCellIndex(0),
            sl_rx: slot(1 + msg3_delay),
            crcs: vec![UlCrcPduIndication {
                ue_index: None,
                rnti: Rnti(0x4601),
                harq_id: 0,
                tb_crc_success: true,
            }],
        });
        assert!(!sched.cell(DuCellIndex(0)).unwrap().ra_sch.has_pending_msg3(Rnti(0x4601)));
    }

    #[test]
    fn test_duplicate_tc_rnti_rejected() {
        let mut sched = make_scheduler();
        sched.handle_cell_configuration_request(&make_cell_request(0, 0)).unwrap();
        sched.slot_indication(slot(0), DuCellIndex(0));
        sched.handle_rach_indication(&make_rach(0, slot(0), 0, 0, 5, 0x4601)).unwrap();
        let err = sched.handle_rach_indication(&make_rach(0, slot(0), 0, 0, 6, 0x4601)).unwrap_err();
        assert_eq!(err, SchedError::RntiInUse(Rnti(0x4601)));
    }

    #[test]
    fn test_crc_batch_partitioned() {
        let mut sched = make_scheduler();
        sched.handle_cell_configuration_request(&make_cell_request(0, 0)).unwrap();
        sched.handle_ue_creation_request(&make_ue_request(0, 0x4701, 0)).unwrap();
        sched.handle_ul_bsr_indication(&UlBsrIndicationMessage {
            cell_index: DuCellIndex(0),
            ue_index: UeIndex(0),
            crnti: Rnti(0x4701),
            reported_bytes: 80,
        });
        sched.slot_indication(slot(0), DuCellIndex(0));
        sched.handle_rach_indication(&make_rach(0, slot(0), 0, 0, 5, 0x4601)).unwrap();
        for count in 1..8 {
            sched.slot_indication(slot(count), DuCellIndex(0));
        }

        // UE PUSCH of slot 4 and Msg3 of slot 7 both wait for their CRC
        let ue_h_id = {
            let ue = sched.ue_scheduler(CellGroupIndex(0)).unwrap().ue(UeIndex(0)).unwrap();
            ue.cell(DuCellIndex(0)).unwrap().ul_harqs().iter().find(|h| !h.is_empty()).unwrap().id()
        };
        assert!(sched.cell(DuCellIndex(0)).unwrap().ra_sch.has_pending_msg3(Rnti(0x4601)));

        sched.handle_crc_indication(&UlCrcIndication {
            cell_index: DuCellIndex(0),
            sl_rx: slot(7),
            crcs: vec![
                UlCrcPduIndication {
                    ue_index: Some(UeIndex(0)),
                    rnti: Rnti(0x4701),
                    harq_id: ue_h_id,
                    tb_crc_success: true,
                },
                UlCrcPduIndication {
                    ue_index: None,
                    rnti: Rnti(0x4601),
                    harq_id: 0,
                    tb_crc_success: true,
                },
            ],
        });

        let ue = sched.ue_scheduler(CellGroupIndex(0)).unwrap().ue(UeIndex(0)).unwrap();
        assert!(ue.cell(DuCellIndex(0)).unwrap().ul_harqs().iter().all(|h| h.is_empty()));
        assert!(!sched.cell(DuCellIndex(0)).unwrap().ra_sch.has_pending_msg3(Rnti(0x4601)));
    }

    #[test]
    fn test_uci_routed_to_group() {
        let mut sched = make_scheduler();
        sched.handle_cell_configuration_request(&make_cell_request(0, 0)).unwrap();
        sched.handle_ue_creation_request(&make_ue_request(0, 0x4701, 0)).unwrap();
        sched.handle_uci_indication(&UciIndication {
            cell_index: DuCellIndex(0),
            slot_rx: slot(0),
            ucis: vec![UciPduIndication {
                ue_index: UeIndex(0),
                crnti: Rnti(0x4701),
                harq_acks: vec![HarqAckReport { harq_id: 0, ack: true }],
                cqi: Some(9),
                sr_detected: true,
            }],
        });
        let ue = sched.ue_scheduler(CellGroupIndex(0)).unwrap().ue(UeIndex(0)).unwrap();
        assert_eq!(ue.cqi(), Some(9));
        assert!(ue.pending_ul_bytes() > 0);
    }

    #[test]
    fn test_paging_forwarded_to_listed_cells() {
        let mut sched = make_scheduler();
        sched.handle_cell_configuration_request(&make_cell_request(0, 0)).unwrap();
        sched.handle_cell_configuration_request(&make_cell_request(1, 0)).unwrap();
        sched.handle_paging_information(&SchedPagingInformation {
            paging_identity: 0x1234,
            ue_identity_index: 0,
            paging_drx_cycle: 32,
            paging_cells: vec![DuCellIndex(1), DuCellIndex(9)],
        });
        assert_eq!(sched.cell(DuCellIndex(0)).unwrap().pg_sch.nof_pending(), 0);
        assert_eq!(sched.cell(DuCellIndex(1)).unwrap().pg_sch.nof_pending(), 1);
    }

    #[test]
    fn test_metrics_reported_per_period() {
        let mut expert = SchedulerExpertConfig::default();
        expert.metrics_report_period = 10;
        let (cfg, _, metrics_notifier) = make_sched_config(expert);
        let mut sched = MacScheduler::new(cfg);
        sched.handle_cell_configuration_request(&make_cell_request(0, 0)).unwrap();
        for count in 0..20 {
            sched.slot_indication(slot(count), DuCellIndex(0));
        }
        let reports = metrics_notifier.reports.lock().unwrap();
        assert_eq!(reports.len(), 2);
        // SSB at slot 0 of every 20 ms period
        assert_eq!(reports[0].nof_ssb, 1);
        assert_eq!(reports[1].nof_ssb, 0);
    }

    #[test]
    #[should_panic(expected = "Slot indication was skipped")]
    fn test_skipped_slot_indication_is_fatal() {
        let mut sched = make_scheduler();
        sched.handle_cell_configuration_request(&make_cell_request(0, 0)).unwrap();
        sched.slot_indication(slot(0), DuCellIndex(0));
        sched.slot_indication(slot(2), DuCellIndex(0));
    }
}
