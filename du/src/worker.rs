//! Scheduler worker
//!
//! One task owns the [`MacScheduler`]. Configuration requests, PHY and upper
//! layer indications and slot ticks all reach it over a single channel, so
//! calls into the scheduler never overlap. In test mode the worker also acts
//! as a loopback PHY: it injects PRACH detections and acknowledges the
//! transmissions it scheduled.

use crate::config::TestModeConfig;
use bytes::Bytes;
use common::types::{DuCellIndex, Rnti, UeIndex};
use common::{bytes_to_hex, SlotPoint};
use interfaces::codec::encode_sched_result;
use interfaces::message_types::{
    DlBufferStateIndicationMessage, HarqAckReport, RachIndicationMessage, SchedCellConfigurationRequest,
    SchedPagingInformation, SchedUeCreationRequestMessage, ServingCellConfig, UciIndication, UciPduIndication, UlBsrIndicationMessage,
    UlCrcIndication, UlCrcPduIndication,
};
use scheduler::{MacScheduler, SchedError};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, enabled, info, trace, warn, Level};

/// Last TC-RNTI handed out by the synthetic PRACH before wrapping
const LAST_TEST_TC_RNTI: u16 = 0x4fff;

/// Logical channel carrying the test DL traffic
const TEST_TRAFFIC_LCID: u8 = 4;

/// Requests served by the scheduler worker
#[derive(Debug)]
pub enum DuCommand {
    ConfigureCell {
        req: Box<SchedCellConfigurationRequest>,
        reply: oneshot::Sender<Result<(), SchedError>>,
    },
    CreateUe {
        req: Box<SchedUeCreationRequestMessage>,
        reply: oneshot::Sender<Result<(), SchedError>>,
    },
    RemoveUe(UeIndex),
    Rach(RachIndicationMessage),
    Crc(UlCrcIndication),
    Uci(UciIndication),
    UlBsr(UlBsrIndicationMessage),
    DlBufferState(DlBufferStateIndicationMessage),
    Paging(SchedPagingInformation),
    /// Advance every configured cell by one slot
    SlotTick,
    Shutdown,
}

/// Counters reported when the worker stops
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct WorkerStats {
    pub nof_slots: u64,
    pub nof_rars: u64,
    pub nof_msg3: u64,
    pub nof_dl_grants: u64,
    pub nof_ul_grants: u64,
    pub nof_rach_rejected: u64,
    pub nof_encoded_bytes: u64,
    pub nof_results_dropped: u64,
}

#[derive(Debug, Clone, Copy)]
struct ActiveUe {
    ue_index: UeIndex,
    crnti: Rnti,
    pcell: DuCellIndex,
}

pub struct SchedulerWorker {
    sched: MacScheduler,
    test_mode: TestModeConfig,
    /// Next slot to schedule, per configured cell
    cells: Vec<(DuCellIndex, SlotPoint)>,
    ues: Vec<ActiveUe>,
    next_tc_rnti: u16,
    /// Encoded results for the PHY adapter
    result_tx: Option<mpsc::Sender<Bytes>>,
    stats: WorkerStats,
}

impl SchedulerWorker {
    pub fn new(sched: MacScheduler, test_mode: TestModeConfig, result_tx: Option<mpsc::Sender<Bytes>>) -> Self {
        Self {
            sched,
            test_mode,
            cells: Vec::new(),
            ues: Vec::new(),
            next_tc_rnti: Rnti::MIN_CRNTI,
            result_tx,
            stats: WorkerStats::default(),
        }
    }

    /// Serve commands until shutdown or until every sender is gone
    pub async fn run(mut self, mut rx: mpsc::Receiver<DuCommand>) -> WorkerStats {
        info!("Scheduler worker started");
        while let Some(cmd) = rx.recv().await {
            if !self.handle_command(cmd) {
                break;
            }
        }
        info!(
            "Scheduler worker stopped after {} slots: {} RARs, {} Msg3, {} DL / {} UL grants",
            self.stats.nof_slots,
            self.stats.nof_rars,
            self.stats.nof_msg3,
            self.stats.nof_dl_grants,
            self.stats.nof_ul_grants
        );
        self.stats
    }

    /// Returns false once the worker has to stop
    fn handle_command(&mut self, cmd: DuCommand) -> bool {
        match cmd {
            DuCommand::ConfigureCell { req, reply } => {
                let res = self.configure_cell(&req);
                let _ = reply.send(res);
            }
            DuCommand::CreateUe { req, reply } => {
                let res = self.create_ue(&req);
                let _ = reply.send(res);
            }
            DuCommand::RemoveUe(ue_index) => {
                self.sched.handle_ue_removal_request(ue_index);
                self.ues.retain(|ue| ue.ue_index != ue_index);
            }
            DuCommand::Rach(msg) => {
                if let Err(e) = self.sched.handle_rach_indication(&msg) {
                    self.stats.nof_rach_rejected += 1;
                    warn!("cell={}: PRACH detection dropped: {}", msg.cell_index, e);
                }
            }
            DuCommand::Crc(msg) => self.sched.handle_crc_indication(&msg),
            DuCommand::Uci(msg) => self.sched.handle_uci_indication(&msg),
            DuCommand::UlBsr(msg) => self.sched.handle_ul_bsr_indication(&msg),
            DuCommand::DlBufferState(msg) => self.sched.handle_dl_buffer_state_indication(&msg),
            DuCommand::Paging(msg) => self.sched.handle_paging_information(&msg),
            DuCommand::SlotTick => self.run_slot(),
            DuCommand::Shutdown => return false,
        }
        true
    }

    fn configure_cell(&mut self, req: &SchedCellConfigurationRequest) -> Result<(), SchedError> {
        self.sched.handle_cell_configuration_request(req)?;
        self.cells.push((req.cell_index, SlotPoint::new(req.common_scs, 0)));
        info!("cell={}: configured, pci={} scs={}", req.cell_index, req.pci.0, req.common_scs);
        Ok(())
    }

    fn create_ue(&mut self, req: &SchedUeCreationRequestMessage) -> Result<(), SchedError> {
        self.sched.handle_ue_creation_request(req)?;
        if let Some(pcell) = req.cells.first() {
            self.ues.push(ActiveUe {
                ue_index: req.ue_index,
                crnti: req.crnti,
                pcell: pcell.cell_index,
            });
        }
        Ok(())
    }

    fn run_slot(&mut self) {
        for i in 0..self.cells.len() {
            let (cell_index, sl_tx) = self.cells[i];
            self.cells[i].1 += 1;
            self.refresh_traffic(cell_index, sl_tx);
            self.schedule_cell(cell_index, sl_tx);
            if self.test_mode.prach_period > 0 && sl_tx.to_uint() % self.test_mode.prach_period == 0 {
                self.inject_prach(cell_index, sl_tx);
            }
        }
        self.stats.nof_slots += 1;
    }

    fn schedule_cell(&mut self, cell_index: DuCellIndex, sl_tx: SlotPoint) {
        let mut crcs = Vec::new();
        let mut ucis = Vec::new();

        let result = self.sched.slot_indication(sl_tx, cell_index);
        self.stats.nof_rars += result.dl.rars.len() as u64;
        self.stats.nof_dl_grants += result.dl.ue_grants.len() as u64;
        for pusch in result.ul.puschs.iter() {
            if pusch.is_msg3 {
                self.stats.nof_msg3 += 1;
            } else {
                self.stats.nof_ul_grants += 1;
            }
            crcs.push(UlCrcPduIndication {
                ue_index: pusch.ue_index,
                rnti: pusch.crnti,
                harq_id: pusch.harq_id,
                tb_crc_success: !pusch.is_msg3 || self.test_mode.msg3_crc_ok,
            });
        }
        for grant in result.dl.ue_grants.iter() {
            ucis.push(UciPduIndication {
                ue_index: grant.ue_index,
                crnti: grant.crnti,
                harq_acks: vec![HarqAckReport { harq_id: grant.harq_id, ack: true }],
                cqi: None,
                sr_detected: false,
            });
        }

        match encode_sched_result(cell_index, sl_tx, result) {
            Ok(frame) => {
                self.stats.nof_encoded_bytes += frame.len() as u64;
                if enabled!(Level::TRACE) {
                    trace!("cell={} slot={}: {}", cell_index, sl_tx, bytes_to_hex(&frame));
                }
                if let Some(tx) = &self.result_tx {
                    if tx.try_send(frame).is_err() {
                        self.stats.nof_results_dropped += 1;
                        debug!("cell={} slot={}: result sink full, frame dropped", cell_index, sl_tx);
                    }
                }
            }
            Err(e) => warn!("cell={} slot={}: failed to encode result: {}", cell_index, sl_tx, e),
        }

        if !crcs.is_empty() {
            self.sched.handle_crc_indication(&UlCrcIndication {
                cell_index,
                sl_rx: sl_tx,
                crcs,
            });
        }
        if !ucis.is_empty() {
            self.sched.handle_uci_indication(&UciIndication {
                cell_index,
                slot_rx: sl_tx,
                ucis,
            });
        }
    }

    /// Queue test traffic for the UEs served by `cell_index`
    fn refresh_traffic(&mut self, cell_index: DuCellIndex, sl_tx: SlotPoint) {
        let period = self.test_mode.traffic_period;
        if period == 0 || sl_tx.to_uint() % period != 0 {
            return;
        }
        for ue in self.ues.iter().filter(|ue| ue.pcell == cell_index) {
            if self.test_mode.dl_buffer_bytes > 0 {
                self.sched.handle_dl_buffer_state_indication(&DlBufferStateIndicationMessage {
                    ue_index: ue.ue_index,
                    lcid: TEST_TRAFFIC_LCID,
                    bs_bytes: self.test_mode.dl_buffer_bytes,
                });
            }
            if self.test_mode.ul_buffer_bytes > 0 {
                self.sched.handle_ul_bsr_indication(&UlBsrIndicationMessage {
                    cell_index,
                    ue_index: ue.ue_index,
                    crnti: ue.crnti,
                    reported_bytes: self.test_mode.ul_buffer_bytes,
                });
            }
        }
    }

    fn inject_prach(&mut self, cell_index: DuCellIndex, sl_tx: SlotPoint) {
        let tc_rnti = Rnti(self.next_tc_rnti);
        self.next_tc_rnti = if self.next_tc_rnti >= LAST_TEST_TC_RNTI {
            Rnti::MIN_CRNTI
        } else {
            self.next_tc_rnti + 1
        };
        let msg = RachIndicationMessage {
            cell_index,
            slot_rx: sl_tx,
            symbol_index: 0,
            frequency_index: 0,
            preamble_id: (tc_rnti.0 % 64) as u8,
            tc_rnti,
            timing_advance: 0,
        };
        debug!("cell={}: injecting PRACH at slot={} tc-rnti={}", cell_index, sl_tx, tc_rnti);
        if let Err(e) = self.sched.handle_rach_indication(&msg) {
            self.stats.nof_rach_rejected += 1;
            warn!("cell={}: PRACH detection dropped: {}", cell_index, e);
        }
    }
}

/// Build the test UE creation requests, C-RNTIs above the synthetic TC-RNTI range
pub fn make_test_ue_requests(nof_ues: u16, pcell: DuCellIndex) -> Vec<SchedUeCreationRequestMessage> {
    (0..nof_ues)
        .map(|i| SchedUeCreationRequestMessage {
            ue_index: UeIndex(i),
            crnti: Rnti(LAST_TEST_TC_RNTI + 1 + i),
            cells: vec![ServingCellConfig { cell_index: pcell }],
            logical_channels: vec![1, TEST_TRAFFIC_LCID],
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DuConfig;
    use crate::notifiers::{LoggingConfigNotifier, LoggingMetricsNotifier};
    use interfaces::codec::decode_sched_result;
    use scheduler::SchedulerConfig;
    use std::sync::Arc;

    fn load_config() -> DuConfig {
        DuConfig::from_yaml_str(include_str!("../configs/du_sched.yml")).unwrap()
    }

    fn spawn_worker(
        cfg: &DuConfig,
        result_tx: Option<mpsc::Sender<Bytes>>,
    ) -> (mpsc::Sender<DuCommand>, tokio::task::JoinHandle<WorkerStats>) {
        let sched = MacScheduler::new(SchedulerConfig {
            expert_params: cfg.expert.clone(),
            config_notifier: Arc::new(LoggingConfigNotifier),
            metrics_notifier: Arc::new(LoggingMetricsNotifier),
        });
        let (tx, rx) = mpsc::channel(64);
        let worker = SchedulerWorker::new(sched, cfg.test_mode.clone(), result_tx);
        (tx, tokio::spawn(worker.run(rx)))
    }

    async fn configure(tx: &mpsc::Sender<DuCommand>, cfg: &DuConfig) {
        for (i, cell) in cfg.cells.iter().enumerate() {
            let (reply, rx) = oneshot::channel();
            let req = Box::new(cell.to_request(i as u8).unwrap());
            tx.send(DuCommand::ConfigureCell { req, reply }).await.unwrap();
            rx.await.unwrap().unwrap();
        }
    }

    #[tokio::test]
    async fn test_synthetic_prach_produces_rar_and_msg3() {
        let mut cfg = load_config();
        cfg.test_mode.prach_period = 10;
        cfg.test_mode.nof_ues = 0;
        let (tx, handle) = spawn_worker(&cfg, None);
        configure(&tx, &cfg).await;

        for _ in 0..30 {
            tx.send(DuCommand::SlotTick).await.unwrap();
        }
        tx.send(DuCommand::Shutdown).await.unwrap();
        let stats = handle.await.unwrap();

        assert_eq!(stats.nof_slots, 30);
        // PRACHs at slots 0, 10 and 20
        assert!(stats.nof_rars >= 2);
        assert!(stats.nof_msg3 >= 2);
        assert_eq!(stats.nof_rach_rejected, 0);
        assert!(stats.nof_encoded_bytes > 0);
    }

    #[tokio::test]
    async fn test_test_ues_receive_grants() {
        let mut cfg = load_config();
        cfg.test_mode.prach_period = 0;
        cfg.test_mode.traffic_period = 10;
        let (tx, handle) = spawn_worker(&cfg, None);
        configure(&tx, &cfg).await;
        for req in make_test_ue_requests(2, DuCellIndex(0)) {
            let (reply, rx) = oneshot::channel();
            tx.send(DuCommand::CreateUe { req: Box::new(req), reply }).await.unwrap();
            rx.await.unwrap().unwrap();
        }

        for _ in 0..20 {
            tx.send(DuCommand::SlotTick).await.unwrap();
        }
        tx.send(DuCommand::Shutdown).await.unwrap();
        let stats = handle.await.unwrap();

        assert!(stats.nof_dl_grants >= 2);
        assert!(stats.nof_ul_grants >= 2);
        assert_eq!(stats.nof_rars, 0);
    }

    #[tokio::test]
    async fn test_results_forwarded_to_sink() {
        let cfg = load_config();
        let (result_tx, mut result_rx) = mpsc::channel(16);
        let (tx, handle) = spawn_worker(&cfg, Some(result_tx));
        configure(&tx, &cfg).await;

        tx.send(DuCommand::SlotTick).await.unwrap();
        tx.send(DuCommand::SlotTick).await.unwrap();
        tx.send(DuCommand::Shutdown).await.unwrap();
        handle.await.unwrap();

        let first = decode_sched_result(&result_rx.recv().await.unwrap()).unwrap();
        assert_eq!(first.cell_index, DuCellIndex(0));
        assert_eq!(first.slot.to_uint(), 0);
        let second = decode_sched_result(&result_rx.recv().await.unwrap()).unwrap();
        assert_eq!(second.slot.to_uint(), 1);
    }

    #[tokio::test]
    async fn test_invalid_cell_rejected() {
        let cfg = load_config();
        let (tx, handle) = spawn_worker(&cfg, None);
        let mut req = Box::new(cfg.cells[0].to_request(0).unwrap());
        req.rach.ra_resp_window = 3;
        let (reply, rx) = oneshot::channel();
        tx.send(DuCommand::ConfigureCell { req, reply }).await.unwrap();
        assert!(matches!(rx.await.unwrap(), Err(SchedError::ConfigurationError(_))));

        // Ticks without cells are harmless
        tx.send(DuCommand::SlotTick).await.unwrap();
        drop(tx);
        assert_eq!(handle.await.unwrap().nof_slots, 1);
    }
}
