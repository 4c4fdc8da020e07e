//! Albor Space DU MAC Scheduler Application
//!
//! Loads the cell configuration, brings up the MAC scheduler on a dedicated
//! worker task and drives it with slot ticks, either in real time or as fast
//! as the scheduler keeps up.

mod config;
mod notifiers;
mod worker;

use anyhow::{anyhow, Result};
use clap::Parser;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::time::MissedTickBehavior;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, EnvFilter};

use common::types::DuCellIndex;
use scheduler::{MacScheduler, SchedulerConfig};

use config::DuConfig;
use notifiers::{LoggingConfigNotifier, LoggingMetricsNotifier};
use worker::{make_test_ue_requests, DuCommand, SchedulerWorker};

/// Depth of the worker command queue
const COMMAND_QUEUE_SIZE: usize = 1024;

/// Albor Space DU MAC scheduler
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "configs/du_sched.yml")]
    config: String,

    /// Log level (trace, debug, info, warn, error), overrides the configuration file
    #[arg(short, long)]
    log_level: Option<String>,

    /// Number of slots to run, 0 runs until interrupted
    #[arg(long, default_value = "0")]
    nof_slots: u64,

    /// Synthetic PRACH period in slots, overrides the configuration file
    #[arg(long)]
    prach_period: Option<u32>,

    /// Pace slot ticks at the slot duration of the first cell
    #[arg(long)]
    realtime: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut du_cfg = DuConfig::from_yaml_file(&args.config)?;
    if let Some(period) = args.prach_period {
        du_cfg.test_mode.prach_period = period;
    }

    // Initialize logging
    let log_level = args.log_level.clone().unwrap_or_else(|| du_cfg.log.level.clone());
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&log_level));

    fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .with_thread_ids(true)
        .with_line_number(true)
        .init();

    info!("Starting Albor Space DU MAC scheduler");
    info!("Configuration file: {}", args.config);

    let requests = du_cfg
        .cells
        .iter()
        .enumerate()
        .map(|(i, cell)| cell.to_request(i as u8))
        .collect::<Result<Vec<_>>>()?;
    for req in &requests {
        info!("Cell {} configuration:", req.cell_index);
        info!("  PCI: {}", req.pci.0);
        info!("  Cell group: {}", req.cell_group_index);
        info!("  Bandwidth: {:?} ({} PRBs)", req.bandwidth, req.scs_carriers[0].carrier_bandwidth);
        info!("  Subcarrier spacing: {}", req.common_scs);
        info!("  Duplex: {:?}", req.duplex);
    }
    let slot_duration = Duration::from_micros(u64::from(requests[0].common_scs.slot_duration_us()));

    let sched = MacScheduler::new(SchedulerConfig {
        expert_params: du_cfg.expert.clone(),
        config_notifier: Arc::new(LoggingConfigNotifier),
        metrics_notifier: Arc::new(LoggingMetricsNotifier),
    });

    let (tx, rx) = mpsc::channel(COMMAND_QUEUE_SIZE);
    let mut worker_handle = tokio::spawn(SchedulerWorker::new(sched, du_cfg.test_mode.clone(), None).run(rx));

    for req in requests {
        let cell_index = req.cell_index;
        let (reply, reply_rx) = oneshot::channel();
        tx.send(DuCommand::ConfigureCell { req: Box::new(req), reply }).await?;
        reply_rx
            .await?
            .map_err(|e| anyhow!("Cell {} configuration rejected: {}", cell_index, e))?;
    }

    for req in make_test_ue_requests(du_cfg.test_mode.nof_ues, DuCellIndex(0)) {
        let ue_index = req.ue_index;
        let (reply, reply_rx) = oneshot::channel();
        tx.send(DuCommand::CreateUe { req: Box::new(req), reply }).await?;
        reply_rx
            .await?
            .map_err(|e| anyhow!("Test UE {} creation rejected: {}", ue_index, e))?;
    }

    info!("DU scheduler initialized successfully");

    let mut ticker_handle = {
        let tx = tx.clone();
        let pace = args.realtime.then_some(slot_duration);
        tokio::spawn(run_slot_ticker(tx, args.nof_slots, pace))
    };

    // Wait for shutdown signal
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Received shutdown signal");
        }
        _ = &mut ticker_handle => {
            info!("Slot ticker finished");
        }
        res = &mut worker_handle => {
            return match res {
                Ok(_) => Err(anyhow!("Scheduler worker stopped unexpectedly")),
                Err(e) => Err(anyhow!("Scheduler worker failed: {}", e)),
            };
        }
    }

    // Shutdown
    info!("Shutting down DU scheduler");
    ticker_handle.abort();
    if tx.send(DuCommand::Shutdown).await.is_err() {
        warn!("Scheduler worker already stopped");
    }

    match tokio::time::timeout(Duration::from_secs(5), worker_handle).await {
        Ok(Ok(stats)) => info!("Final statistics: {:?}", stats),
        Ok(Err(e)) => error!("Scheduler worker failed: {}", e),
        Err(_) => warn!("Scheduler worker did not stop in time"),
    }

    info!("DU scheduler shutdown complete");
    Ok(())
}

/// Send `nof_slots` slot ticks (forever when 0), one per `pace` if given
async fn run_slot_ticker(tx: mpsc::Sender<DuCommand>, nof_slots: u64, pace: Option<Duration>) {
    let mut interval = pace.map(|period| {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        interval
    });

    let mut count = 0u64;
    while nof_slots == 0 || count < nof_slots {
        match interval.as_mut() {
            Some(interval) => {
                interval.tick().await;
            }
            None => tokio::task::yield_now().await,
        }
        if tx.send(DuCommand::SlotTick).await.is_err() {
            break;
        }
        count += 1;
    }
}
