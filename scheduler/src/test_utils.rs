//! Shared fixtures for scheduler tests

use crate::config::{CellConfiguration, SchedConfigurationNotifier, SchedulerConfig, SchedulerExpertConfig};
use crate::metrics::{SchedulerCellMetrics, SchedulerMetricsNotifier};
use common::types::{Bandwidth, CellGroupIndex, DuCellIndex, DuplexMode, Pci, Rnti, SubcarrierSpacing, TddPattern, UeIndex};
use common::SlotPoint;
use interfaces::message_types::{
    RachConfigCommon, RachIndicationMessage, SchedCellConfigurationRequest, SchedUeCreationRequestMessage,
    ScsSpecificCarrier, ServingCellConfig,
};
use std::sync::{Arc, Mutex};

/// FDD cell, 20 MHz at 15 kHz, CORESET#0 index 8 (CRBs [12, 60), symbols [0, 2))
pub fn make_cell_request(cell_index: u8, group: u8) -> SchedCellConfigurationRequest {
    SchedCellConfigurationRequest {
        cell_index: DuCellIndex(cell_index),
        cell_group_index: CellGroupIndex(group),
        pci: Pci(1),
        bandwidth: Bandwidth::Bw20,
        common_scs: SubcarrierSpacing::Scs15,
        scs_carriers: vec![ScsSpecificCarrier {
            scs: SubcarrierSpacing::Scs15,
            offset_to_carrier: 0,
            carrier_bandwidth: 106,
        }],
        duplex: DuplexMode::Fdd,
        coreset0_index: 8,
        ss0_index: 0,
        ra_search_space_present: true,
        rach: RachConfigCommon {
            prach_config_index: 16,
            ra_resp_window: 10,
            prach_frequency_start: 0,
            total_nof_ra_preambles: 64,
        },
        ssb_period_ms: 20,
        sib1_period_ms: 160,
        sib1_payload_size: 100,
        paging_slot: 4,
    }
}

/// TDD cell with a 10-slot DDDDDDDSUU pattern
pub fn make_tdd_cell_request(cell_index: u8, group: u8) -> SchedCellConfigurationRequest {
    let mut req = make_cell_request(cell_index, group);
    req.duplex = DuplexMode::Tdd(TddPattern {
        period_slots: 10,
        nof_dl_slots: 7,
        nof_dl_symbols: 6,
        nof_ul_slots: 2,
        nof_ul_symbols: 0,
    });
    req
}

pub fn make_cell_cfg(req: &SchedCellConfigurationRequest, expert: &SchedulerExpertConfig) -> Arc<CellConfiguration> {
    Arc::new(CellConfiguration::new(req, expert).unwrap())
}

pub fn slot(count: u32) -> SlotPoint {
    SlotPoint::new(SubcarrierSpacing::Scs15, count)
}

pub fn make_rach(cell_index: u8, slot_rx: SlotPoint, symbol: u8, freq: u8, preamble: u8, tc_rnti: u16) -> RachIndicationMessage {
    RachIndicationMessage {
        cell_index: DuCellIndex(cell_index),
        slot_rx,
        symbol_index: symbol,
        frequency_index: freq,
        preamble_id: preamble,
        tc_rnti: Rnti(tc_rnti),
        timing_advance: 0,
    }
}

pub fn make_ue_request(ue_index: u16, crnti: u16, cell_index: u8) -> SchedUeCreationRequestMessage {
    SchedUeCreationRequestMessage {
        ue_index: UeIndex(ue_index),
        crnti: Rnti(crnti),
        cells: vec![ServingCellConfig { cell_index: DuCellIndex(cell_index) }],
        logical_channels: vec![1, 4],
    }
}

/// Records configuration events
#[derive(Default)]
pub struct RecordingConfigNotifier {
    pub completed: Mutex<Vec<UeIndex>>,
    pub deleted: Mutex<Vec<UeIndex>>,
}

impl SchedConfigurationNotifier for RecordingConfigNotifier {
    fn on_ue_config_complete(&self, ue_index: UeIndex) {
        self.completed.lock().unwrap().push(ue_index);
    }

    fn on_ue_delete_response(&self, ue_index: UeIndex) {
        self.deleted.lock().unwrap().push(ue_index);
    }
}

/// Records metrics reports
#[derive(Default)]
pub struct RecordingMetricsNotifier {
    pub reports: Mutex<Vec<SchedulerCellMetrics>>,
}

impl SchedulerMetricsNotifier for RecordingMetricsNotifier {
    fn report_metrics(&self, metrics: &SchedulerCellMetrics) {
        self.reports.lock().unwrap().push(metrics.clone());
    }
}

pub fn make_sched_config(
    expert: SchedulerExpertConfig,
) -> (SchedulerConfig, Arc<RecordingConfigNotifier>, Arc<RecordingMetricsNotifier>) {
    let cfg_notifier = Arc::new(RecordingConfigNotifier::default());
    let metrics_notifier = Arc::new(RecordingMetricsNotifier::default());
    let cfg = SchedulerConfig {
        expert_params: expert,
        config_notifier: cfg_notifier.clone(),
        metrics_notifier: metrics_notifier.clone(),
    };
    (cfg, cfg_notifier, metrics_notifier)
}
