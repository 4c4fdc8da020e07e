//! Scheduler metrics
//!
//! Per-cell counters accumulated from every committed slot result and handed
//! to a notifier once per report period.

use common::types::DuCellIndex;
use common::SlotPoint;
use interfaces::sched_result::SchedResult;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// Metrics of one cell over one report period
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SchedulerCellMetrics {
    /// Cell index
    pub cell_index: DuCellIndex,
    /// Slots covered by the report
    pub nof_slots: u32,
    /// RAR PDSCHs
    pub nof_rars: u32,
    /// Msg3 PUSCHs, new transmissions and retransmissions
    pub nof_msg3_grants: u32,
    /// UE PDSCHs
    pub nof_dl_ue_grants: u32,
    /// UE PUSCHs
    pub nof_ul_ue_grants: u32,
    /// UE grants that were retransmissions
    pub nof_retx_grants: u32,
    /// Paging PDSCHs
    pub nof_paging: u32,
    /// SSB transmissions
    pub nof_ssb: u32,
    /// Average PDSCH PRBs per slot
    pub avg_dl_prbs: f64,
    /// Average PUSCH PRBs per slot
    pub avg_ul_prbs: f64,
}

impl SchedulerCellMetrics {
    /// Empty counters for `cell_index`
    pub fn new(cell_index: DuCellIndex) -> Self {
        Self {
            cell_index,
            nof_slots: 0,
            nof_rars: 0,
            nof_msg3_grants: 0,
            nof_dl_ue_grants: 0,
            nof_ul_ue_grants: 0,
            nof_retx_grants: 0,
            nof_paging: 0,
            nof_ssb: 0,
            avg_dl_prbs: 0.0,
            avg_ul_prbs: 0.0,
        }
    }
}

/// Receiver of periodic metrics reports
pub trait SchedulerMetricsNotifier: Send + Sync {
    fn report_metrics(&self, metrics: &SchedulerCellMetrics);
}

/// Notifier that drops every report
#[derive(Debug, Default)]
pub struct NullMetricsNotifier;

impl SchedulerMetricsNotifier for NullMetricsNotifier {
    fn report_metrics(&self, _metrics: &SchedulerCellMetrics) {}
}

#[derive(Debug)]
struct CellMetricsContext {
    data: SchedulerCellMetrics,
    dl_prbs: u64,
    ul_prbs: u64,
}

impl CellMetricsContext {
    fn new(cell_index: DuCellIndex) -> Self {
        Self {
            data: SchedulerCellMetrics::new(cell_index),
            dl_prbs: 0,
            ul_prbs: 0,
        }
    }

    fn push(&mut self, result: &SchedResult) {
        let data = &mut self.data;
        data.nof_slots += 1;
        data.nof_rars += result.dl.rars.len() as u32;
        data.nof_paging += result.dl.paging.len() as u32;
        data.nof_ssb += result.dl.ssbs.len() as u32;
        data.nof_dl_ue_grants += result.dl.ue_grants.len() as u32;
        for pusch in result.ul.puschs.iter() {
            if pusch.is_msg3 {
                data.nof_msg3_grants += 1;
            } else {
                data.nof_ul_ue_grants += 1;
                data.nof_retx_grants += pusch.is_retx as u32;
            }
        }
        data.nof_retx_grants += result.dl.ue_grants.iter().filter(|g| g.is_retx).count() as u32;
        self.dl_prbs += u64::from(result.nof_dl_prbs());
        self.ul_prbs += u64::from(result.nof_ul_prbs());
    }

    /// Finalise averages and start a new period
    fn take_report(&mut self) -> SchedulerCellMetrics {
        let cell_index = self.data.cell_index;
        let mut report = std::mem::replace(&mut self.data, SchedulerCellMetrics::new(cell_index));
        if report.nof_slots > 0 {
            report.avg_dl_prbs = self.dl_prbs as f64 / f64::from(report.nof_slots);
            report.avg_ul_prbs = self.ul_prbs as f64 / f64::from(report.nof_slots);
        }
        self.dl_prbs = 0;
        self.ul_prbs = 0;
        report
    }
}

/// Aggregates per-cell metrics and reports them every `report_period` slots
pub struct SchedulerMetricsHandler {
    notifier: Arc<dyn SchedulerMetricsNotifier>,
    /// Report period in slots, 0 disables reporting
    report_period: u32,
    cells: HashMap<DuCellIndex, CellMetricsContext>,
}

impl SchedulerMetricsHandler {
    pub fn new(report_period: u32, notifier: Arc<dyn SchedulerMetricsNotifier>) -> Self {
        Self {
            notifier,
            report_period,
            cells: HashMap::new(),
        }
    }

    pub fn add_cell(&mut self, cell_index: DuCellIndex) {
        self.cells.insert(cell_index, CellMetricsContext::new(cell_index));
    }

    /// Account a committed result of `cell_index`
    pub fn push_result(&mut self, cell_index: DuCellIndex, sl_tx: SlotPoint, result: &SchedResult) {
        if self.report_period == 0 {
            return;
        }
        let Some(ctx) = self.cells.get_mut(&cell_index) else {
            warn!("cell={}: metrics for unknown cell discarded", cell_index);
            return;
        };
        ctx.push(result);
        if ctx.data.nof_slots >= self.report_period {
            let report = ctx.take_report();
            debug!("cell={}: metrics report at slot={}", cell_index, sl_tx);
            self.notifier.report_metrics(&report);
        }
    }
}
