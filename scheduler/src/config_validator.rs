//! Configuration request validation
//!
//! Requests are checked against static bounds before any scheduler state is
//! created. A rejected request leaves the scheduler untouched.

use crate::cell::cell_resource_allocator::RESOURCE_GRID_NOF_SUBFRAMES;
use crate::config::{Coreset0Config, SchedulerExpertConfig, NOF_OFDM_SYM_PER_SLOT};
use crate::SchedError;
use common::types::{CellGroupIndex, DuCellIndex, DuplexMode, TddPattern, UeIndex};
use interfaces::message_types::{SchedCellConfigurationRequest, SchedUeCreationRequestMessage};

/// Allowed RA response window lengths in slots (ra-ResponseWindow)
const VALID_RA_RESP_WINDOWS: [u32; 8] = [1, 2, 4, 8, 10, 20, 40, 80];

/// Highest configurable logical channel id
const MAX_LCID: u8 = 32;

fn config_error(msg: String) -> SchedError {
    SchedError::ConfigurationError(msg)
}

/// Validate a cell configuration request
pub fn validate_sched_cell_configuration_request(
    msg: &SchedCellConfigurationRequest,
    expert: &SchedulerExpertConfig,
) -> Result<(), SchedError> {
    if msg.cell_index.0 >= DuCellIndex::MAX_NOF_DU_CELLS {
        return Err(config_error(format!("cell index {} out of range", msg.cell_index)));
    }
    if msg.cell_group_index.0 >= CellGroupIndex::MAX_NOF_CELL_GROUPS {
        return Err(config_error(format!("cell group index {} out of range", msg.cell_group_index)));
    }

    // Carriers sorted by strictly increasing numerology, common SCS is the finest
    let Some(last) = msg.scs_carriers.last() else {
        return Err(config_error("no SCS-specific carrier configured".to_string()));
    };
    if msg
        .scs_carriers
        .windows(2)
        .any(|w| w[0].scs.numerology() >= w[1].scs.numerology())
    {
        return Err(config_error("SCS-specific carriers must be sorted by increasing SCS".to_string()));
    }
    if last.scs != msg.common_scs {
        return Err(config_error(format!(
            "common SCS {} must be the largest configured SCS ({})",
            msg.common_scs, last.scs
        )));
    }
    for carrier in &msg.scs_carriers {
        let Some(max_prbs) = msg.bandwidth.nof_prbs(carrier.scs) else {
            return Err(config_error(format!("bandwidth {:?} not supported with SCS {}", msg.bandwidth, carrier.scs)));
        };
        if carrier.carrier_bandwidth == 0 || carrier.carrier_bandwidth > max_prbs {
            return Err(config_error(format!(
                "carrier bandwidth {} PRBs invalid for {:?} at {} (max {})",
                carrier.carrier_bandwidth, msg.bandwidth, carrier.scs, max_prbs
            )));
        }
    }

    if !VALID_RA_RESP_WINDOWS.contains(&msg.rach.ra_resp_window) {
        return Err(config_error(format!("invalid RA response window {}", msg.rach.ra_resp_window)));
    }
    if !msg.ra_search_space_present {
        return Err(config_error("cell has no RA search space".to_string()));
    }

    let ring_size = RESOURCE_GRID_NOF_SUBFRAMES * last.scs.slots_per_subframe();
    if expert.ra.msg3_delay == 0 || expert.ra.msg3_delay >= ring_size {
        return Err(config_error(format!(
            "msg3 delay {} must be within the resource grid window (1..{})",
            expert.ra.msg3_delay, ring_size
        )));
    }
    // PUSCH is never scheduled in the slot of its DCI
    if expert.ue.k2 == 0 || expert.ue.k2 >= ring_size {
        return Err(config_error(format!(
            "k2 {} must be within the resource grid window (1..{})",
            expert.ue.k2, ring_size
        )));
    }

    if let DuplexMode::Tdd(pattern) = &msg.duplex {
        validate_tdd_pattern(pattern)?;
    }

    let coreset0 = Coreset0Config::from_index(msg.coreset0_index)?;
    let common_bw = last.carrier_bandwidth;
    if coreset0.rb_offset + coreset0.num_rbs > common_bw {
        return Err(config_error(format!(
            "CORESET#0 index {} does not fit in {} PRBs",
            msg.coreset0_index, common_bw
        )));
    }
    if expert.ra.nof_prbs_per_rar == 0 || expert.ra.nof_prbs_per_rar > common_bw {
        return Err(config_error(format!(
            "{} PRBs per RAR grant invalid for {} PRBs",
            expert.ra.nof_prbs_per_rar, common_bw
        )));
    }
    if expert.ra.nof_prbs_per_msg3 == 0 || expert.ra.nof_prbs_per_msg3 > common_bw {
        return Err(config_error(format!(
            "{} PRBs per Msg3 invalid for {} PRBs",
            expert.ra.nof_prbs_per_msg3, common_bw
        )));
    }
    let al = expert.pdcch_aggregation_level;
    if !matches!(al, 1 | 2 | 4 | 8 | 16) || u16::from(al) > coreset0.nof_cces() {
        return Err(config_error(format!("invalid PDCCH aggregation level {}", al)));
    }

    if msg.ssb_period_ms == 0 || msg.sib1_period_ms == 0 {
        return Err(config_error("SSB and SIB1 periods must be non-zero".to_string()));
    }
    if msg.paging_slot >= msg.common_scs.slots_per_frame() {
        return Err(config_error(format!("paging slot {} outside the frame", msg.paging_slot)));
    }

    Ok(())
}

fn validate_tdd_pattern(pattern: &TddPattern) -> Result<(), SchedError> {
    if pattern.period_slots == 0 {
        return Err(config_error("TDD period must be non-zero".to_string()));
    }
    if pattern.nof_dl_slots + pattern.nof_ul_slots > pattern.period_slots {
        return Err(config_error(format!(
            "TDD pattern with {} DL and {} UL slots exceeds the period of {} slots",
            pattern.nof_dl_slots, pattern.nof_ul_slots, pattern.period_slots
        )));
    }
    let sym = u32::from(NOF_OFDM_SYM_PER_SLOT);
    if pattern.nof_dl_symbols >= sym || pattern.nof_ul_symbols >= sym {
        return Err(config_error("TDD partial slot symbols must be below 14".to_string()));
    }
    if pattern.nof_dl_slots + pattern.nof_ul_slots == pattern.period_slots
        && (pattern.nof_dl_symbols > 0 || pattern.nof_ul_symbols > 0)
    {
        return Err(config_error("TDD pattern has no room for a special slot".to_string()));
    }
    if pattern.nof_dl_slots == 0 {
        return Err(config_error("TDD pattern without DL slots".to_string()));
    }
    Ok(())
}

/// Validate a UE creation request
pub fn validate_sched_ue_creation_request(msg: &SchedUeCreationRequestMessage) -> Result<(), SchedError> {
    if msg.ue_index.0 >= UeIndex::MAX_NOF_DU_UES {
        return Err(config_error(format!("UE index {} out of range", msg.ue_index)));
    }
    if !msg.crnti.is_crnti() {
        return Err(config_error(format!("rnti={} is not a valid C-RNTI", msg.crnti)));
    }
    if msg.cells.is_empty() {
        return Err(config_error(format!("ue={}: no serving cell", msg.ue_index)));
    }
    for (i, cell) in msg.cells.iter().enumerate() {
        if msg.cells[..i].iter().any(|c| c.cell_index == cell.cell_index) {
            return Err(config_error(format!("ue={}: duplicate serving cell={}", msg.ue_index, cell.cell_index)));
        }
    }
    if let Some(lcid) = msg.logical_channels.iter().find(|&&lcid| lcid == 0 || lcid > MAX_LCID) {
        return Err(config_error(format!("ue={}: invalid lcid={}", msg.ue_index, lcid)));
    }
    Ok(())
}
