//! Per-slot scheduling result
//!
//! The result of one scheduling pass for one cell and slot. Every grant list
//! has a fixed capacity; allocators check for room before committing.

use crate::bounded::BoundedList;
use common::types::{Rnti, UeIndex};
use common::{OfdmSymbolRange, PrbInterval};
use serde::{Deserialize, Serialize};

/// Maximum number of SSBs per slot
pub const MAX_SSB_PER_SLOT: usize = 4;
/// Maximum number of DL PDCCHs per slot
pub const MAX_DL_PDCCH_PDUS_PER_SLOT: usize = 16;
/// Maximum number of UL PDCCHs per slot
pub const MAX_UL_PDCCH_PDUS_PER_SLOT: usize = 16;
/// Maximum number of SI PDSCHs per slot
pub const MAX_SI_PDUS_PER_SLOT: usize = 2;
/// Maximum number of RAR PDSCHs per slot
pub const MAX_RAR_PDUS_PER_SLOT: usize = 8;
/// Maximum number of Msg3 grants bundled in one RAR
pub const MAX_GRANTS_PER_RAR: usize = 16;
/// Maximum number of paging PDSCHs per slot
pub const MAX_PAGING_PDUS_PER_SLOT: usize = 4;
/// Maximum number of paging records in one paging message
pub const MAX_PAGING_RECORDS_PER_MESSAGE: usize = 32;
/// Maximum number of UE PDSCHs per slot
pub const MAX_UE_PDUS_PER_SLOT: usize = 16;
/// Maximum number of PUSCHs per slot
pub const MAX_PUSCH_PDUS_PER_SLOT: usize = 16;

/// RNTI type of a PDCCH
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PdcchRntiType {
    /// System information
    Si,
    /// Random access response
    Ra,
    /// Paging
    P,
    /// Temporary C-RNTI (Msg3 retransmission)
    Tc,
    /// C-RNTI
    C,
}

/// DCI format carried by a PDCCH
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DciFormat {
    /// Fallback DL assignment
    F1_0,
    /// Fallback UL grant
    F0_0,
}

/// PDCCH allocation
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PdcchInformation {
    /// RNTI scrambling the DCI
    pub rnti: Rnti,
    /// Type of RNTI
    pub rnti_type: PdcchRntiType,
    /// DCI format
    pub dci_format: DciFormat,
    /// First CCE of the candidate
    pub cce_index: u8,
    /// Aggregation level
    pub aggregation_level: u8,
    /// CRBs occupied in the CORESET
    pub prbs: PrbInterval,
    /// Symbols of the CORESET
    pub symbols: OfdmSymbolRange,
}

/// SSB transmission
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SsbInformation {
    /// SSB index (0-7 for FR1)
    pub ssb_index: u8,
    /// Occupied symbols
    pub symbols: OfdmSymbolRange,
    /// Occupied CRBs
    pub prbs: PrbInterval,
}

/// SIB1 transmission
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sib1Information {
    /// PDSCH CRBs
    pub prbs: PrbInterval,
    /// PDSCH symbols
    pub symbols: OfdmSymbolRange,
    /// Payload size in bytes
    pub payload_size: u32,
}

/// Msg3 grant carried inside a RAR
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RarUlGrant {
    /// Temporary C-RNTI
    pub tc_rnti: Rnti,
    /// Detected preamble
    pub rapid: u8,
    /// Timing advance command
    pub ta: u16,
    /// Msg3 PUSCH CRBs
    pub prbs: PrbInterval,
    /// Msg3 MCS
    pub mcs: u8,
}

/// RAR PDSCH
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RarInformation {
    /// RA-RNTI of the response
    pub ra_rnti: Rnti,
    /// PDSCH CRBs
    pub prbs: PrbInterval,
    /// PDSCH symbols
    pub symbols: OfdmSymbolRange,
    /// Msg3 grants, in arrival order of the preambles
    pub grants: BoundedList<RarUlGrant, MAX_GRANTS_PER_RAR>,
}

/// Paging PDSCH
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PagingInformation {
    /// PDSCH CRBs
    pub prbs: PrbInterval,
    /// PDSCH symbols
    pub symbols: OfdmSymbolRange,
    /// Paged UE identities
    pub paging_identities: BoundedList<u64, MAX_PAGING_RECORDS_PER_MESSAGE>,
}

/// UE PDSCH grant
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DlMsgAlloc {
    /// UE index
    pub ue_index: UeIndex,
    /// C-RNTI
    pub crnti: Rnti,
    /// DL HARQ process
    pub harq_id: u8,
    /// PDSCH CRBs
    pub prbs: PrbInterval,
    /// PDSCH symbols
    pub symbols: OfdmSymbolRange,
    /// Transport block size in bytes
    pub tbs_bytes: u32,
    /// Whether this is a retransmission
    pub is_retx: bool,
}

/// PUSCH grant (Msg3 or UE data)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct UlSchedInfo {
    /// C-RNTI or TC-RNTI
    pub crnti: Rnti,
    /// UE index, absent for Msg3
    pub ue_index: Option<UeIndex>,
    /// UL HARQ process
    pub harq_id: u8,
    /// PUSCH CRBs
    pub prbs: PrbInterval,
    /// PUSCH symbols
    pub symbols: OfdmSymbolRange,
    /// MCS
    pub mcs: u8,
    /// Whether this PUSCH carries Msg3
    pub is_msg3: bool,
    /// Whether this is a retransmission
    pub is_retx: bool,
}

/// DL part of the scheduling result
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DlSchedResult {
    /// DL assignments
    pub dl_pdcchs: BoundedList<PdcchInformation, MAX_DL_PDCCH_PDUS_PER_SLOT>,
    /// UL grants transmitted in this DL slot
    pub ul_pdcchs: BoundedList<PdcchInformation, MAX_UL_PDCCH_PDUS_PER_SLOT>,
    /// SSB transmissions
    pub ssbs: BoundedList<SsbInformation, MAX_SSB_PER_SLOT>,
    /// System information
    pub sibs: BoundedList<Sib1Information, MAX_SI_PDUS_PER_SLOT>,
    /// Random access responses
    pub rars: BoundedList<RarInformation, MAX_RAR_PDUS_PER_SLOT>,
    /// Paging messages
    pub paging: BoundedList<PagingInformation, MAX_PAGING_PDUS_PER_SLOT>,
    /// UE data
    pub ue_grants: BoundedList<DlMsgAlloc, MAX_UE_PDUS_PER_SLOT>,
}

/// UL part of the scheduling result
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UlSchedResult {
    /// PUSCH grants
    pub puschs: BoundedList<UlSchedInfo, MAX_PUSCH_PDUS_PER_SLOT>,
}

/// Scheduling result for one slot and cell
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SchedResult {
    /// DL decisions
    pub dl: DlSchedResult,
    /// UL decisions
    pub ul: UlSchedResult,
}

impl SchedResult {
    /// Create an empty result
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop all decisions, keeping list storage
    pub fn clear(&mut self) {
        self.dl.dl_pdcchs.clear();
        self.dl.ul_pdcchs.clear();
        self.dl.ssbs.clear();
        self.dl.sibs.clear();
        self.dl.rars.clear();
        self.dl.paging.clear();
        self.dl.ue_grants.clear();
        self.ul.puschs.clear();
    }

    /// Whether nothing was scheduled
    pub fn is_empty(&self) -> bool {
        self.dl.dl_pdcchs.is_empty()
            && self.dl.ul_pdcchs.is_empty()
            && self.dl.ssbs.is_empty()
            && self.dl.sibs.is_empty()
            && self.dl.rars.is_empty()
            && self.dl.paging.is_empty()
            && self.dl.ue_grants.is_empty()
            && self.ul.puschs.is_empty()
    }

    /// PRBs used by PDSCHs (SIB1, RAR, paging and UE data)
    pub fn nof_dl_prbs(&self) -> u32 {
        let sib: u32 = self.dl.sibs.iter().map(|s| s.prbs.length() as u32).sum();
        let rar: u32 = self.dl.rars.iter().map(|r| r.prbs.length() as u32).sum();
        let pg: u32 = self.dl.paging.iter().map(|p| p.prbs.length() as u32).sum();
        let ue: u32 = self.dl.ue_grants.iter().map(|g| g.prbs.length() as u32).sum();
        sib + rar + pg + ue
    }

    /// PRBs used by PUSCHs
    pub fn nof_ul_prbs(&self) -> u32 {
        self.ul.puschs.iter().map(|p| p.prbs.length() as u32).sum()
    }
}
