//! Scheduler configuration
//!
//! Expert parameters are loaded once and passed by value into every component
//! at construction. Cell parameters are derived from a validated cell
//! configuration request and shared between the components of one cell.

use crate::metrics::SchedulerMetricsNotifier;
use crate::SchedError;
use common::slot_point::SlotPoint;
use common::types::{CellGroupIndex, DuCellIndex, DuplexMode, Pci, SubcarrierSpacing, UeIndex};
use common::{OfdmSymbolRange, PrbInterval};
use interfaces::message_types::{RachConfigCommon, SchedCellConfigurationRequest, ScsSpecificCarrier};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Number of OFDM symbols per slot with normal cyclic prefix
pub const NOF_OFDM_SYM_PER_SLOT: u8 = 14;

/// Random access parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RaExpertConfig {
    /// Slots between the RAR and the Msg3 PUSCH
    pub msg3_delay: u32,
    /// Maximum number of Msg3 retransmissions
    pub max_msg3_retxs: u8,
    /// RAR PDSCH PRBs per Msg3 grant
    pub nof_prbs_per_rar: u16,
    /// PUSCH PRBs per Msg3 grant
    pub nof_prbs_per_msg3: u16,
    /// Msg3 MCS
    pub msg3_mcs: u8,
    /// PRACH processing delay in slots before the RAR window opens
    pub prach_duration: u32,
    /// Slots after a Msg3 transmission without CRC before it counts as lost
    pub msg3_ack_timeout: u32,
}

impl Default for RaExpertConfig {
    fn default() -> Self {
        Self {
            msg3_delay: 6,
            max_msg3_retxs: 4,
            nof_prbs_per_rar: 4,
            nof_prbs_per_msg3: 3,
            msg3_mcs: 0,
            prach_duration: 1,
            msg3_ack_timeout: 20,
        }
    }
}

/// UE grant selection policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GrantPolicyKind {
    /// Rotate the starting UE every slot
    RoundRobin,
    /// Serve the UEs with the most pending bytes first
    MaxPendingBytes,
}

/// UE scheduling parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UeExpertConfig {
    /// Grant selection policy
    pub grant_policy: GrantPolicyKind,
    /// Slots between the UL DCI and the PUSCH
    pub k2: u32,
    /// Maximum PRBs per grant
    pub max_prbs_per_grant: u16,
    /// Bytes carried per PRB
    pub bytes_per_prb: u32,
    /// HARQ processes per direction and cell
    pub nof_harqs: u8,
    /// Maximum retransmissions per HARQ process
    pub max_retxs: u8,
    /// Slots without feedback before a transmission counts as lost
    pub harq_ack_timeout: u32,
    /// Maximum UE grants per slot and direction
    pub max_grants_per_slot: usize,
    /// MCS used for UE grants
    pub mcs: u8,
}

impl Default for UeExpertConfig {
    fn default() -> Self {
        Self {
            grant_policy: GrantPolicyKind::RoundRobin,
            k2: 4,
            max_prbs_per_grant: 32,
            bytes_per_prb: 40,
            nof_harqs: 8,
            max_retxs: 4,
            harq_ack_timeout: 20,
            max_grants_per_slot: 8,
            mcs: 10,
        }
    }
}

/// Scheduler expert parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerExpertConfig {
    /// Random access parameters
    pub ra: RaExpertConfig,
    /// UE scheduling parameters
    pub ue: UeExpertConfig,
    /// Metrics report period in slots, 0 disables reporting
    pub metrics_report_period: u32,
    /// Whether SSB/SIB1 allocations are logged
    pub log_broadcast_messages: bool,
    /// PDCCH aggregation level for common and UE DCIs
    pub pdcch_aggregation_level: u8,
}

impl Default for SchedulerExpertConfig {
    fn default() -> Self {
        Self {
            ra: RaExpertConfig::default(),
            ue: UeExpertConfig::default(),
            metrics_report_period: 1000,
            log_broadcast_messages: false,
            pdcch_aggregation_level: 2,
        }
    }
}

/// Notified when UE configuration procedures complete
pub trait SchedConfigurationNotifier: Send + Sync {
    /// UE creation or reconfiguration has been applied
    fn on_ue_config_complete(&self, ue_index: UeIndex);

    /// UE has been removed from the scheduler
    fn on_ue_delete_response(&self, ue_index: UeIndex);
}

/// Top-level scheduler configuration
#[derive(Clone)]
pub struct SchedulerConfig {
    /// Expert parameters
    pub expert_params: SchedulerExpertConfig,
    /// Sink for UE configuration events
    pub config_notifier: Arc<dyn SchedConfigurationNotifier>,
    /// Sink for metrics reports
    pub metrics_notifier: Arc<dyn SchedulerMetricsNotifier>,
}

/// CORESET#0 configuration based on 3GPP TS 38.213
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Coreset0Config {
    /// Number of resource blocks
    pub num_rbs: u16,
    /// Number of symbols
    pub num_symbols: u8,
    /// RB offset from the carrier start
    pub rb_offset: u16,
}

impl Coreset0Config {
    /// Get CORESET#0 configuration from table index
    /// Based on 3GPP TS 38.213 Table 13-1 for {15, 15} kHz SCS
    pub fn from_index(index: u8) -> Result<Self, SchedError> {
        let config = match index {
            0 => Self { num_rbs: 24, num_symbols: 2, rb_offset: 0 },
            1 => Self { num_rbs: 24, num_symbols: 2, rb_offset: 2 },
            2 => Self { num_rbs: 24, num_symbols: 2, rb_offset: 4 },
            3 => Self { num_rbs: 24, num_symbols: 3, rb_offset: 0 },
            4 => Self { num_rbs: 24, num_symbols: 3, rb_offset: 2 },
            5 => Self { num_rbs: 24, num_symbols: 3, rb_offset: 4 },
            6 => Self { num_rbs: 48, num_symbols: 1, rb_offset: 12 },
            7 => Self { num_rbs: 48, num_symbols: 1, rb_offset: 16 },
            8 => Self { num_rbs: 48, num_symbols: 2, rb_offset: 12 },
            9 => Self { num_rbs: 48, num_symbols: 2, rb_offset: 16 },
            10 => Self { num_rbs: 48, num_symbols: 3, rb_offset: 12 },
            11 => Self { num_rbs: 48, num_symbols: 3, rb_offset: 16 },
            12 => Self { num_rbs: 96, num_symbols: 1, rb_offset: 38 },
            13 => Self { num_rbs: 96, num_symbols: 2, rb_offset: 38 },
            14 => Self { num_rbs: 96, num_symbols: 3, rb_offset: 38 },
            _ => return Err(SchedError::ConfigurationError(
                format!("Invalid CORESET#0 index: {}", index)
            )),
        };
        Ok(config)
    }

    /// Number of CCEs (6 REGs each)
    pub fn nof_cces(&self) -> u16 {
        self.num_rbs * self.num_symbols as u16 / 6
    }
}

/// Cell parameters shared by the components of one cell
#[derive(Debug, Clone)]
pub struct CellConfiguration {
    /// Cell index within the DU
    pub cell_index: DuCellIndex,
    /// Cell group of the cell
    pub cell_group_index: CellGroupIndex,
    /// Physical cell identity
    pub pci: Pci,
    /// Common subcarrier spacing
    pub common_scs: SubcarrierSpacing,
    /// Carriers per numerology, sorted by increasing SCS
    pub scs_carriers: Vec<ScsSpecificCarrier>,
    /// Duplex configuration
    pub duplex: DuplexMode,
    /// CORESET#0
    pub coreset0: Coreset0Config,
    /// PDCCH aggregation level
    pub aggregation_level: u8,
    /// RACH configuration
    pub rach: RachConfigCommon,
    /// Whether a RA search space is configured
    pub ra_search_space_present: bool,
    /// SSB periodicity in ms
    pub ssb_period_ms: u32,
    /// SIB1 periodicity in ms
    pub sib1_period_ms: u32,
    /// SIB1 payload size in bytes
    pub sib1_payload_size: u32,
    /// Paging occasion slot within the paging frame
    pub paging_slot: u32,
}

impl CellConfiguration {
    /// Derive the cell parameters from a validated request
    pub fn new(msg: &SchedCellConfigurationRequest, expert: &SchedulerExpertConfig) -> Result<Self, SchedError> {
        let coreset0 = Coreset0Config::from_index(msg.coreset0_index)?;
        Ok(Self {
            cell_index: msg.cell_index,
            cell_group_index: msg.cell_group_index,
            pci: msg.pci,
            common_scs: msg.common_scs,
            scs_carriers: msg.scs_carriers.clone(),
            duplex: msg.duplex,
            coreset0,
            aggregation_level: expert.pdcch_aggregation_level,
            rach: msg.rach,
            ra_search_space_present: msg.ra_search_space_present,
            ssb_period_ms: msg.ssb_period_ms,
            sib1_period_ms: msg.sib1_period_ms,
            sib1_payload_size: msg.sib1_payload_size,
            paging_slot: msg.paging_slot,
        })
    }

    /// Number of slots per frame in the common numerology
    pub fn nof_slots_per_frame(&self) -> u32 {
        self.common_scs.slots_per_frame()
    }

    /// Finest configured numerology
    pub fn max_scs(&self) -> SubcarrierSpacing {
        self.scs_carriers.last().map(|c| c.scs).unwrap_or(self.common_scs)
    }

    /// Carrier of the common numerology
    pub fn common_carrier(&self) -> &ScsSpecificCarrier {
        match self.scs_carriers.iter().find(|c| c.scs == self.common_scs) {
            Some(carrier) => carrier,
            None => crate::report_fatal_error!(
                "cell={}: no carrier for common scs={}", self.cell_index, self.common_scs
            ),
        }
    }

    /// Whether `slot` carries DL symbols
    pub fn is_dl_enabled(&self, slot: SlotPoint) -> bool {
        match self.duplex {
            DuplexMode::Fdd => true,
            DuplexMode::Tdd(pattern) => pattern.is_dl_slot(slot.to_uint() % pattern.period_slots),
        }
    }

    /// Whether `slot` carries UL symbols
    pub fn is_ul_enabled(&self, slot: SlotPoint) -> bool {
        match self.duplex {
            DuplexMode::Fdd => true,
            DuplexMode::Tdd(pattern) => pattern.is_ul_slot(slot.to_uint() % pattern.period_slots),
        }
    }

    /// CRBs of CORESET#0
    pub fn coreset0_crbs(&self) -> PrbInterval {
        let start = self.common_carrier().offset_to_carrier + self.coreset0.rb_offset;
        PrbInterval::new(start, start + self.coreset0.num_rbs)
    }

    /// Symbols of CORESET#0
    pub fn coreset0_symbols(&self) -> OfdmSymbolRange {
        OfdmSymbolRange::new(0, self.coreset0.num_symbols)
    }

    /// PDSCH symbols, following CORESET#0
    pub fn pdsch_symbols(&self) -> OfdmSymbolRange {
        OfdmSymbolRange::new(self.coreset0.num_symbols, NOF_OFDM_SYM_PER_SLOT)
    }

    /// PUSCH symbols
    pub fn pusch_symbols(&self) -> OfdmSymbolRange {
        OfdmSymbolRange::new(0, NOF_OFDM_SYM_PER_SLOT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::make_cell_request;
    use common::types::TddPattern;

    #[test]
    fn test_coreset0_config() {
        // Test valid index
        let config = Coreset0Config::from_index(1).unwrap();
        assert_eq!(config.num_rbs, 24);
        assert_eq!(config.num_symbols, 2);
        assert_eq!(config.rb_offset, 2);
        assert_eq!(config.nof_cces(), 8);

        // Test invalid index
        assert!(Coreset0Config::from_index(20).is_err());
    }

    #[test]
    fn test_expert_config_defaults_from_partial_input() {
        let cfg: SchedulerExpertConfig = serde_json::from_str(r#"{"ra": {"msg3_delay": 4}}"#).unwrap();
        assert_eq!(cfg.ra.msg3_delay, 4);
        assert_eq!(cfg.ra.nof_prbs_per_rar, 4);
        assert_eq!(cfg.ue.grant_policy, GrantPolicyKind::RoundRobin);
        assert_eq!(cfg.pdcch_aggregation_level, 2);
    }

    #[test]
    fn test_tdd_dl_ul_enabled() {
        let mut req = make_cell_request(0, 0);
        req.duplex = DuplexMode::Tdd(TddPattern {
            period_slots: 10,
            nof_dl_slots: 7,
            nof_dl_symbols: 0,
            nof_ul_slots: 2,
            nof_ul_symbols: 0,
        });
        let cfg = CellConfiguration::new(&req, &SchedulerExpertConfig::default()).unwrap();
        let sl = SlotPoint::new(SubcarrierSpacing::Scs15, 20);
        assert!(cfg.is_dl_enabled(sl));
        assert!(!cfg.is_ul_enabled(sl));
        assert!(!cfg.is_dl_enabled(sl + 8));
        assert!(cfg.is_ul_enabled(sl + 8));
        assert_eq!(cfg.pdsch_symbols(), OfdmSymbolRange::new(2, 14));
    }
}
