//! UE context
//!
//! Buffer state, feedback state and HARQ entities of one UE

use crate::config::UeExpertConfig;
use crate::harq::HarqProcess;
use common::types::{DuCellIndex, Rnti, UeIndex};
use interfaces::message_types::ServingCellConfig;

/// Bytes reserved in a DL grant per pending MAC CE
pub const MAC_CE_BYTES: u32 = 2;

/// Bytes granted in UL on a scheduling request without BSR
pub const SR_GRANT_BYTES: u32 = 64;

/// HARQ entities of a UE in one serving cell
#[derive(Debug, Clone)]
pub struct UeCell {
    /// Serving cell
    pub cell_index: DuCellIndex,
    dl_harqs: Vec<HarqProcess>,
    ul_harqs: Vec<HarqProcess>,
}

impl UeCell {
    pub fn new(cell_index: DuCellIndex, expert: &UeExpertConfig) -> Self {
        let make_harqs = || {
            (0..expert.nof_harqs)
                .map(|id| HarqProcess::new(id, expert.max_retxs, expert.harq_ack_timeout))
                .collect::<Vec<_>>()
        };
        Self {
            cell_index,
            dl_harqs: make_harqs(),
            ul_harqs: make_harqs(),
        }
    }

    pub fn dl_harqs(&self) -> &[HarqProcess] {
        &self.dl_harqs
    }

    pub fn ul_harqs(&self) -> &[HarqProcess] {
        &self.ul_harqs
    }

    pub fn dl_harq_mut(&mut self, id: u8) -> Option<&mut HarqProcess> {
        self.dl_harqs.get_mut(id as usize)
    }

    pub fn ul_harq_mut(&mut self, id: u8) -> Option<&mut HarqProcess> {
        self.ul_harqs.get_mut(id as usize)
    }

    /// Oldest-id DL HARQ waiting for retransmission
    pub fn find_pending_dl_retx(&mut self) -> Option<&mut HarqProcess> {
        self.dl_harqs.iter_mut().find(|h| h.has_pending_retx())
    }

    pub fn find_empty_dl_harq(&mut self) -> Option<&mut HarqProcess> {
        self.dl_harqs.iter_mut().find(|h| h.is_empty())
    }

    pub fn find_pending_ul_retx(&mut self) -> Option<&mut HarqProcess> {
        self.ul_harqs.iter_mut().find(|h| h.has_pending_retx())
    }

    pub fn find_empty_ul_harq(&mut self) -> Option<&mut HarqProcess> {
        self.ul_harqs.iter_mut().find(|h| h.is_empty())
    }

    pub fn has_pending_dl_retx(&self) -> bool {
        self.dl_harqs.iter().any(|h| h.has_pending_retx())
    }

    pub fn has_pending_ul_retx(&self) -> bool {
        self.ul_harqs.iter().any(|h| h.has_pending_retx())
    }

    pub fn dl_harqs_mut(&mut self) -> impl Iterator<Item = &mut HarqProcess> {
        self.dl_harqs.iter_mut()
    }

    pub fn ul_harqs_mut(&mut self) -> impl Iterator<Item = &mut HarqProcess> {
        self.ul_harqs.iter_mut()
    }
}

/// UE known to the scheduler
#[derive(Debug, Clone)]
pub struct Ue {
    /// UE index
    pub ue_index: UeIndex,
    /// C-RNTI
    pub crnti: Rnti,
    /// Serving cells, PCell first
    cells: Vec<UeCell>,
    /// Pending DL bytes per configured logical channel, sorted by LCID
    dl_buffers: Vec<(u8, u32)>,
    /// Last reported UL buffer
    ul_pending_bytes: u32,
    /// MAC CEs waiting for a DL grant
    pending_ces: u32,
    /// Scheduling request not yet served
    sr_pending: bool,
    /// Last reported wideband CQI
    cqi: Option<u8>,
}

impl Ue {
    pub fn new(
        ue_index: UeIndex,
        crnti: Rnti,
        cells: &[ServingCellConfig],
        logical_channels: &[u8],
        expert: &UeExpertConfig,
    ) -> Self {
        let mut ue = Self {
            ue_index,
            crnti,
            cells: Vec::new(),
            dl_buffers: Vec::new(),
            ul_pending_bytes: 0,
            pending_ces: 0,
            sr_pending: false,
            cqi: None,
        };
        ue.reconfigure(cells, logical_channels, expert);
        ue
    }

    /// Apply a new set of serving cells and logical channels, keeping state of retained ones
    pub fn reconfigure(&mut self, cells: &[ServingCellConfig], logical_channels: &[u8], expert: &UeExpertConfig) {
        let mut old_cells = std::mem::take(&mut self.cells);
        self.cells = cells
            .iter()
            .map(|c| match old_cells.iter().position(|old| old.cell_index == c.cell_index) {
                Some(pos) => old_cells.swap_remove(pos),
                None => UeCell::new(c.cell_index, expert),
            })
            .collect();

        let old_buffers = std::mem::take(&mut self.dl_buffers);
        self.dl_buffers = logical_channels
            .iter()
            .map(|lcid| {
                let bytes = old_buffers.iter().find(|(l, _)| l == lcid).map(|(_, b)| *b).unwrap_or(0);
                (*lcid, bytes)
            })
            .collect();
        self.dl_buffers.sort_unstable_by_key(|(lcid, _)| *lcid);
    }

    pub fn pcell_index(&self) -> Option<DuCellIndex> {
        self.cells.first().map(|c| c.cell_index)
    }

    pub fn cells(&self) -> &[UeCell] {
        &self.cells
    }

    pub fn cell(&self, cell_index: DuCellIndex) -> Option<&UeCell> {
        self.cells.iter().find(|c| c.cell_index == cell_index)
    }

    pub fn cell_mut(&mut self, cell_index: DuCellIndex) -> Option<&mut UeCell> {
        self.cells.iter_mut().find(|c| c.cell_index == cell_index)
    }

    pub fn cqi(&self) -> Option<u8> {
        self.cqi
    }

    pub fn set_cqi(&mut self, cqi: u8) {
        self.cqi = Some(cqi);
    }

    /// Update the RLC buffer of `lcid`. Returns false for unconfigured channels.
    pub fn handle_dl_buffer_state(&mut self, lcid: u8, bytes: u32) -> bool {
        match self.dl_buffers.iter_mut().find(|(l, _)| *l == lcid) {
            Some(entry) => {
                entry.1 = bytes;
                true
            }
            None => false,
        }
    }

    pub fn handle_dl_mac_ce(&mut self) {
        self.pending_ces += 1;
    }

    pub fn handle_bsr(&mut self, reported_bytes: u32) {
        self.ul_pending_bytes = reported_bytes;
    }

    pub fn handle_sr(&mut self) {
        self.sr_pending = true;
    }

    /// DL bytes waiting for a grant, MAC CEs included
    pub fn pending_dl_bytes(&self) -> u32 {
        let lc_bytes: u32 = self.dl_buffers.iter().map(|(_, b)| *b).sum();
        lc_bytes + self.pending_ces * MAC_CE_BYTES
    }

    /// UL bytes to grant; an unserved SR without BSR is worth a small grant
    pub fn pending_ul_bytes(&self) -> u32 {
        if self.ul_pending_bytes == 0 && self.sr_pending {
            SR_GRANT_BYTES
        } else {
            self.ul_pending_bytes
        }
    }

    /// Account a new DL transport block, MAC CEs first, then channels by LCID
    pub fn consume_dl_bytes(&mut self, mut tbs_bytes: u32) {
        while self.pending_ces > 0 && tbs_bytes >= MAC_CE_BYTES {
            self.pending_ces -= 1;
            tbs_bytes -= MAC_CE_BYTES;
        }
        for (_, bytes) in self.dl_buffers.iter_mut() {
            let served = (*bytes).min(tbs_bytes);
            *bytes -= served;
            tbs_bytes -= served;
            if tbs_bytes == 0 {
                break;
            }
        }
    }

    /// Account a new UL grant
    pub fn consume_ul_bytes(&mut self, tbs_bytes: u32) {
        self.ul_pending_bytes = self.ul_pending_bytes.saturating_sub(tbs_bytes);
        self.sr_pending = false;
    }
}
