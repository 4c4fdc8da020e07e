//! Scheduler notifiers of the DU application

use common::types::UeIndex;
use scheduler::{SchedConfigurationNotifier, SchedulerCellMetrics, SchedulerMetricsNotifier};
use tracing::{info, warn};

/// Logs UE configuration events
#[derive(Debug, Default)]
pub struct LoggingConfigNotifier;

impl SchedConfigurationNotifier for LoggingConfigNotifier {
    fn on_ue_config_complete(&self, ue_index: UeIndex) {
        info!("ue={}: configuration complete", ue_index);
    }

    fn on_ue_delete_response(&self, ue_index: UeIndex) {
        info!("ue={}: removed", ue_index);
    }
}

/// Logs metrics reports as JSON lines
#[derive(Debug, Default)]
pub struct LoggingMetricsNotifier;

impl SchedulerMetricsNotifier for LoggingMetricsNotifier {
    fn report_metrics(&self, metrics: &SchedulerCellMetrics) {
        match serde_json::to_string(metrics) {
            Ok(json) => info!(target: "metrics", "{}", json),
            Err(e) => warn!("cell={}: failed to serialize metrics: {}", metrics.cell_index, e),
        }
    }
}
