//! Message Types consumed by the MAC scheduler
//!
//! Indications arrive from the PHY (PRACH, CRC, UCI) and from upper layers
//! (buffer state, MAC CEs, paging). Configuration requests are validated by the
//! scheduler before any state is created.

use common::types::{Bandwidth, CellGroupIndex, DuCellIndex, DuplexMode, Pci, Rnti, SubcarrierSpacing, UeIndex};
use common::SlotPoint;
use serde::{Deserialize, Serialize};

/// PRACH detection reported by the PHY
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RachIndicationMessage {
    /// Cell where the preamble was detected
    pub cell_index: DuCellIndex,
    /// Slot of the PRACH occasion
    pub slot_rx: SlotPoint,
    /// First OFDM symbol of the PRACH occasion (0..14)
    pub symbol_index: u8,
    /// Frequency-domain index of the PRACH occasion (0..8)
    pub frequency_index: u8,
    /// Detected preamble (RAPID)
    pub preamble_id: u8,
    /// TC-RNTI assigned to the procedure
    pub tc_rnti: Rnti,
    /// Timing advance command
    pub timing_advance: u16,
}

/// CRC outcome for one PUSCH transmission
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct UlCrcPduIndication {
    /// UE index, absent while the UE is still in random access (Msg3)
    pub ue_index: Option<UeIndex>,
    /// C-RNTI or TC-RNTI of the transmission
    pub rnti: Rnti,
    /// UL HARQ process
    pub harq_id: u8,
    /// Whether the transport block passed CRC
    pub tb_crc_success: bool,
}

/// Batch of CRC outcomes for one slot and cell
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UlCrcIndication {
    /// Cell of reception
    pub cell_index: DuCellIndex,
    /// Slot of reception
    pub sl_rx: SlotPoint,
    /// Per-transmission outcomes
    pub crcs: Vec<UlCrcPduIndication>,
}

/// HARQ-ACK bit reported in UCI
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HarqAckReport {
    /// DL HARQ process
    pub harq_id: u8,
    /// ACK (true) or NACK (false)
    pub ack: bool,
}

/// UCI reported by one UE
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UciPduIndication {
    /// UE index
    pub ue_index: UeIndex,
    /// C-RNTI
    pub crnti: Rnti,
    /// HARQ-ACK feedback
    pub harq_acks: Vec<HarqAckReport>,
    /// Wideband CQI if reported
    pub cqi: Option<u8>,
    /// Whether a scheduling request was detected
    pub sr_detected: bool,
}

/// Batch of UCI for one slot and cell
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UciIndication {
    /// Cell of reception
    pub cell_index: DuCellIndex,
    /// Slot of reception
    pub slot_rx: SlotPoint,
    /// Per-UE reports
    pub ucis: Vec<UciPduIndication>,
}

/// UL buffer status report
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct UlBsrIndicationMessage {
    /// Cell of reception
    pub cell_index: DuCellIndex,
    /// UE index
    pub ue_index: UeIndex,
    /// C-RNTI
    pub crnti: Rnti,
    /// Total reported bytes across logical channel groups
    pub reported_bytes: u32,
}

/// DL RLC buffer state update
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DlBufferStateIndicationMessage {
    /// UE index
    pub ue_index: UeIndex,
    /// Logical channel
    pub lcid: u8,
    /// Pending bytes in the RLC buffer
    pub bs_bytes: u32,
}

/// Request to send a DL MAC CE
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DlMacCeIndication {
    /// UE index
    pub ue_index: UeIndex,
    /// LCID of the control element
    pub ce_lcid: u8,
}

/// Paging request from upper layers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchedPagingInformation {
    /// Paging UE identity (5G-S-TMSI or I-RNTI)
    pub paging_identity: u64,
    /// UE_ID used to derive the paging frame (5G-S-TMSI mod 1024)
    pub ue_identity_index: u32,
    /// Paging DRX cycle in frames
    pub paging_drx_cycle: u32,
    /// Cells where the UE has to be paged
    pub paging_cells: Vec<DuCellIndex>,
}

/// Carrier configuration for one numerology
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScsSpecificCarrier {
    /// Subcarrier spacing
    pub scs: SubcarrierSpacing,
    /// Offset to point A in CRBs
    pub offset_to_carrier: u16,
    /// Carrier bandwidth in PRBs
    pub carrier_bandwidth: u16,
}

/// Common RACH configuration
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RachConfigCommon {
    /// PRACH configuration index
    pub prach_config_index: u8,
    /// RA response window in slots (1, 2, 4, 8, 10, 20, 40 or 80)
    pub ra_resp_window: u32,
    /// First PRB of the PRACH occasions
    pub prach_frequency_start: u16,
    /// Total number of RA preambles
    pub total_nof_ra_preambles: u8,
}

/// Cell configuration request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchedCellConfigurationRequest {
    /// Cell index within the DU
    pub cell_index: DuCellIndex,
    /// Cell group the cell belongs to
    pub cell_group_index: CellGroupIndex,
    /// Physical cell identity
    pub pci: Pci,
    /// Channel bandwidth
    pub bandwidth: Bandwidth,
    /// Common subcarrier spacing, used for SSB/SIB1/RA/paging
    pub common_scs: SubcarrierSpacing,
    /// Carriers per numerology, sorted by increasing SCS
    pub scs_carriers: Vec<ScsSpecificCarrier>,
    /// Duplex configuration
    pub duplex: DuplexMode,
    /// CORESET#0 table index
    pub coreset0_index: u8,
    /// SearchSpace#0 table index
    pub ss0_index: u8,
    /// Whether a RA search space is configured
    pub ra_search_space_present: bool,
    /// RACH configuration
    pub rach: RachConfigCommon,
    /// SSB periodicity in ms
    pub ssb_period_ms: u32,
    /// SIB1 periodicity in ms
    pub sib1_period_ms: u32,
    /// SIB1 payload size in bytes
    pub sib1_payload_size: u32,
    /// Slot within the paging frame used as paging occasion
    pub paging_slot: u32,
}

/// Serving cell of a UE
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ServingCellConfig {
    /// Cell index
    pub cell_index: DuCellIndex,
}

/// UE creation request; the first serving cell is the PCell
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchedUeCreationRequestMessage {
    /// UE index
    pub ue_index: UeIndex,
    /// C-RNTI
    pub crnti: Rnti,
    /// Serving cells, PCell first
    pub cells: Vec<ServingCellConfig>,
    /// Configured logical channels
    pub logical_channels: Vec<u8>,
}

/// UE reconfiguration request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchedUeReconfigurationMessage {
    /// UE index
    pub ue_index: UeIndex,
    /// C-RNTI
    pub crnti: Rnti,
    /// New set of serving cells, PCell first
    pub cells: Vec<ServingCellConfig>,
    /// New set of logical channels
    pub logical_channels: Vec<u8>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rach_indication_serialization() {
        let msg = RachIndicationMessage {
            cell_index: DuCellIndex(0),
            slot_rx: SlotPoint::from_sfn(SubcarrierSpacing::Scs15, 3, 4),
            symbol_index: 0,
            frequency_index: 0,
            preamble_id: 12,
            tc_rnti: Rnti(0x4601),
            timing_advance: 5,
        };

        let serialized = serde_json::to_string(&msg).unwrap();
        let deserialized: RachIndicationMessage = serde_json::from_str(&serialized).unwrap();

        assert_eq!(msg, deserialized);
        assert_eq!(deserialized.slot_rx.slot_index(), 4);
    }
}
