//! YAML configuration of the DU scheduler application
//!
//! Cell sections use the usual gNB `cell_cfg` field names. Expert scheduler
//! parameters are passed through unchanged and default when omitted.

use anyhow::{anyhow, Result};
use common::types::{Bandwidth, CellGroupIndex, DuCellIndex, DuplexMode, Pci, SubcarrierSpacing, TddPattern};
use interfaces::message_types::{RachConfigCommon, SchedCellConfigurationRequest, ScsSpecificCarrier};
use scheduler::SchedulerExpertConfig;
use serde::{Deserialize, Serialize};

/// Top-level configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DuConfig {
    /// Cells served by the DU; the position in the list is the cell index
    pub cells: Vec<CellConfig>,
    /// Scheduler expert parameters
    #[serde(default)]
    pub expert: SchedulerExpertConfig,
    /// Test traffic
    #[serde(default)]
    pub test_mode: TestModeConfig,
    /// Logging configuration
    #[serde(default)]
    pub log: LogConfig,
}

/// Cell configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CellConfig {
    /// Physical Cell ID
    pub pci: u16,
    /// Cell group of the cell
    #[serde(default)]
    pub cell_group: u8,
    /// Channel bandwidth in MHz
    #[serde(rename = "channel_bandwidth_MHz")]
    pub channel_bandwidth_mhz: u32,
    /// Common subcarrier spacing in kHz
    pub common_scs: u32,
    /// TDD pattern, FDD when absent
    #[serde(default)]
    pub tdd_ul_dl_cfg: Option<TddConfig>,
    /// PDCCH configuration
    pub pdcch: PdcchConfig,
    /// PRACH configuration
    pub prach: PrachConfig,
    /// SSB periodicity in ms
    #[serde(default = "default_ssb_period")]
    pub ssb_period: u32,
    /// SIB1 periodicity in ms
    #[serde(default = "default_sib1_period")]
    pub sib1_period: u32,
    /// SIB1 payload size in bytes
    #[serde(default = "default_sib1_size")]
    pub sib1_payload_size: u32,
    /// Paging occasion slot within the paging frame
    #[serde(default = "default_paging_slot")]
    pub paging_slot: u32,
}

fn default_ssb_period() -> u32 {
    20
}

fn default_sib1_period() -> u32 {
    160
}

fn default_sib1_size() -> u32 {
    100
}

fn default_paging_slot() -> u32 {
    4
}

/// Single-period TDD pattern
#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
pub struct TddConfig {
    /// Period in slots
    pub dl_ul_tx_period: u32,
    /// Full DL slots
    pub nof_dl_slots: u32,
    /// DL symbols of the special slot
    #[serde(default)]
    pub nof_dl_symbols: u32,
    /// Full UL slots
    pub nof_ul_slots: u32,
    /// UL symbols of the special slot
    #[serde(default)]
    pub nof_ul_symbols: u32,
}

/// Common PDCCH configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PdcchConfig {
    /// Search space 0 index
    pub ss0_index: u8,
    /// CORESET#0 index
    pub coreset0_index: u8,
}

/// PRACH configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PrachConfig {
    /// PRACH configuration index
    pub prach_config_index: u8,
    /// PRACH frequency start
    pub prach_frequency_start: u16,
    /// RA response window in slots
    #[serde(default = "default_ra_resp_window")]
    pub ra_resp_window: u32,
    /// Total number of RA preambles
    #[serde(default = "default_total_nof_ra_preambles")]
    pub total_nof_ra_preambles: u8,
}

fn default_ra_resp_window() -> u32 {
    10
}

fn default_total_nof_ra_preambles() -> u8 {
    64 // Standard value for PRACH
}

/// Synthetic traffic injected by the application
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TestModeConfig {
    /// Inject a PRACH detection every this many slots, 0 disables
    #[serde(default)]
    pub prach_period: u32,
    /// Report every Msg3 as decoded
    #[serde(default = "default_true")]
    pub msg3_crc_ok: bool,
    /// Connected UEs created in the first cell at startup
    #[serde(default)]
    pub nof_ues: u16,
    /// Buffer refresh period of the test UEs in slots, 0 disables traffic
    #[serde(default)]
    pub traffic_period: u32,
    /// DL bytes queued per test UE and refresh
    #[serde(default)]
    pub dl_buffer_bytes: u32,
    /// UL bytes reported per test UE and refresh
    #[serde(default)]
    pub ul_buffer_bytes: u32,
}

impl Default for TestModeConfig {
    fn default() -> Self {
        Self {
            prach_period: 0,
            msg3_crc_ok: true,
            nof_ues: 0,
            traffic_period: 0,
            dl_buffer_bytes: 0,
            ul_buffer_bytes: 0,
        }
    }
}

fn default_true() -> bool {
    true
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LogConfig {
    /// Log level used when RUST_LOG is not set
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self { level: default_log_level() }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

impl DuConfig {
    /// Load configuration from YAML file
    pub fn from_yaml_file(path: &str) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&contents)
    }

    pub fn from_yaml_str(contents: &str) -> Result<Self> {
        let config: DuConfig = serde_yaml::from_str(contents)?;
        if config.cells.is_empty() {
            return Err(anyhow!("No cells configured"));
        }
        if config.cells.len() > usize::from(DuCellIndex::MAX_NOF_DU_CELLS) {
            return Err(anyhow!(
                "{} cells configured, at most {} supported",
                config.cells.len(),
                DuCellIndex::MAX_NOF_DU_CELLS
            ));
        }
        Ok(config)
    }
}

impl CellConfig {
    /// Build the scheduler cell configuration request of cell `cell_index`
    pub fn to_request(&self, cell_index: u8) -> Result<SchedCellConfigurationRequest> {
        let pci = Pci::new(self.pci).ok_or_else(|| anyhow!("Invalid PCI: {}", self.pci))?;
        let bandwidth = Bandwidth::from_mhz(self.channel_bandwidth_mhz)
            .ok_or_else(|| anyhow!("Invalid bandwidth: {} MHz", self.channel_bandwidth_mhz))?;
        let scs = SubcarrierSpacing::from_khz(self.common_scs)
            .ok_or_else(|| anyhow!("Invalid subcarrier spacing: {} kHz", self.common_scs))?;
        let nof_prbs = bandwidth.nof_prbs(scs).ok_or_else(|| {
            anyhow!("Bandwidth {} MHz not supported with {}", self.channel_bandwidth_mhz, scs)
        })?;

        let duplex = match self.tdd_ul_dl_cfg {
            Some(tdd) => DuplexMode::Tdd(TddPattern {
                period_slots: tdd.dl_ul_tx_period,
                nof_dl_slots: tdd.nof_dl_slots,
                nof_dl_symbols: tdd.nof_dl_symbols,
                nof_ul_slots: tdd.nof_ul_slots,
                nof_ul_symbols: tdd.nof_ul_symbols,
            }),
            None => DuplexMode::Fdd,
        };

        Ok(SchedCellConfigurationRequest {
            cell_index: DuCellIndex(cell_index),
            cell_group_index: CellGroupIndex(self.cell_group),
            pci,
            bandwidth,
            common_scs: scs,
            scs_carriers: vec![ScsSpecificCarrier {
                scs,
                offset_to_carrier: 0,
                carrier_bandwidth: nof_prbs,
            }],
            duplex,
            coreset0_index: self.pdcch.coreset0_index,
            ss0_index: self.pdcch.ss0_index,
            ra_search_space_present: true,
            rach: RachConfigCommon {
                prach_config_index: self.prach.prach_config_index,
                ra_resp_window: self.prach.ra_resp_window,
                prach_frequency_start: self.prach.prach_frequency_start,
                total_nof_ra_preambles: self.prach.total_nof_ra_preambles,
            },
            ssb_period_ms: self.ssb_period,
            sib1_period_ms: self.sib1_period,
            sib1_payload_size: self.sib1_payload_size,
            paging_slot: self.paging_slot,
        })
    }
}
