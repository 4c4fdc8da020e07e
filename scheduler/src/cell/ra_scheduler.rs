//! Random Access Scheduler
//!
//! Turns PRACH detections into RAR PDSCHs carrying Msg3 grants. Detections
//! with the same RA-RNTI in the same PRACH slot share one pending RAR, which
//! must be granted within its RA response window. Each granted TC-RNTI gets a
//! Msg3 PUSCH `msg3_delay` slots after the RAR and an UL HARQ process that
//! lives until the Msg3 CRC is resolved.

use super::cell_resource_allocator::CellResourceAllocator;
use super::resource_grid::{CellSlotResourceAllocator, GrantChannel, GrantInfo};
use crate::config::{CellConfiguration, RaExpertConfig};
use crate::harq::{HarqOutcome, HarqProcess};
use crate::{report_fatal_error, sanity_check, SchedError};
use common::types::Rnti;
use common::{PrbInterval, SlotInterval, SlotPoint};
use interfaces::message_types::{RachIndicationMessage, UlCrcPduIndication};
use interfaces::sched_result::{
    DciFormat, PdcchRntiType, RarInformation, RarUlGrant, UlSchedInfo, MAX_GRANTS_PER_RAR,
};
use interfaces::BoundedList;
use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Maximum number of RARs waiting for their window
pub const MAX_NOF_PENDING_RARS: usize = 32;
/// Maximum number of preambles detected in one PRACH occasion
pub const MAX_PREAMBLES_PER_PRACH_OCCASION: usize = 64;
/// Maximum number of Msg3s in flight per cell
pub const MAX_NOF_PENDING_MSG3S: usize = 256;

/// RA-RNTI = 1 + s_id + 14 × t_id + 14 × 80 × f_id (TS 38.321, 5.1.3, NUL carrier)
pub fn ra_rnti(symbol_index: u8, slot_index: u32, frequency_index: u8) -> u16 {
    (1 + symbol_index as u32 + 14 * slot_index + 14 * 80 * frequency_index as u32) as u16
}

/// RA-RNTI of a PRACH detection
pub fn get_ra_rnti(msg: &RachIndicationMessage) -> u16 {
    ra_rnti(msg.symbol_index, msg.slot_rx.slot_index(), msg.frequency_index)
}

/// RAR waiting to be scheduled
#[derive(Debug, Clone)]
pub struct PendingRar {
    /// RA-RNTI of the response
    pub ra_rnti: u16,
    /// Slot of the PRACH occasion
    pub prach_slot_rx: SlotPoint,
    /// Slots in which the RAR may be sent
    pub rar_window: SlotInterval,
    /// TC-RNTIs still waiting for a Msg3 grant, in arrival order
    pub tc_rntis: BoundedList<Rnti, MAX_PREAMBLES_PER_PRACH_OCCASION>,
}

/// Msg3 of one RA procedure
#[derive(Debug, Clone)]
pub struct PendingMsg3 {
    /// PRACH detection that started the procedure
    pub ind_msg: RachIndicationMessage,
    /// Msg3 UL HARQ process
    pub harq: HarqProcess,
}

/// Per-cell RA scheduler
pub struct RaScheduler {
    cfg: Arc<CellConfiguration>,
    expert: RaExpertConfig,
    ra_win_nof_slots: u32,
    /// Ordered by window start
    pending_rars: VecDeque<PendingRar>,
    /// Ordered by TC-RNTI, which fixes the Msg3 retransmission order
    pending_msg3s: BTreeMap<Rnti, PendingMsg3>,
}

impl RaScheduler {
    pub fn new(cfg: Arc<CellConfiguration>, expert: RaExpertConfig) -> Self {
        sanity_check!(
            cfg.ra_search_space_present,
            "cell={}: RA scheduler created for a cell with no RA search space", cfg.cell_index
        );
        let ra_win_nof_slots = cfg.rach.ra_resp_window;
        Self {
            cfg,
            expert,
            ra_win_nof_slots,
            pending_rars: VecDeque::with_capacity(MAX_NOF_PENDING_RARS),
            pending_msg3s: BTreeMap::new(),
        }
    }

    pub fn pending_rars(&self) -> &VecDeque<PendingRar> {
        &self.pending_rars
    }

    pub fn has_pending_msg3(&self, tc_rnti: Rnti) -> bool {
        self.pending_msg3s.contains_key(&tc_rnti)
    }

    pub fn nof_pending_msg3s(&self) -> usize {
        self.pending_msg3s.len()
    }

    /// Register a PRACH detection
    pub fn handle_rach_indication(&mut self, msg: &RachIndicationMessage) -> Result<(), SchedError> {
        let ra_rnti = get_ra_rnti(msg);
        info!(
            "cell={}: new PRACH slot={}, preamble={}, ra-rnti=0x{:x}, tc-rnti={}, ta={}",
            self.cfg.cell_index, msg.slot_rx, msg.preamble_id, ra_rnti, msg.tc_rnti, msg.timing_advance
        );

        if msg.slot_rx.numerology() != self.cfg.common_scs.numerology() {
            warn!(
                "cell={}: PRACH ignored, slot={} does not use the common SCS {}",
                self.cfg.cell_index, msg.slot_rx, self.cfg.common_scs
            );
            return Err(SchedError::ConfigurationError(format!(
                "PRACH slot numerology {} differs from the cell numerology {}",
                msg.slot_rx.numerology(),
                self.cfg.common_scs.numerology()
            )));
        }
        if self.pending_msg3s.contains_key(&msg.tc_rnti) {
            warn!("cell={}: PRACH ignored, tc-rnti={} is already in use", self.cfg.cell_index, msg.tc_rnti);
            return Err(SchedError::RntiInUse(msg.tc_rnti));
        }
        if self.pending_msg3s.len() >= MAX_NOF_PENDING_MSG3S {
            return Err(self.capacity_exceeded("maximum number of pending Msg3s reached"));
        }

        let existing = self
            .pending_rars
            .iter_mut()
            .find(|r| r.prach_slot_rx == msg.slot_rx && r.ra_rnti == ra_rnti);
        match existing {
            Some(rar) => {
                if rar.tc_rntis.push(msg.tc_rnti).is_err() {
                    return Err(self.capacity_exceeded("maximum number of grants per RAR reached"));
                }
            }
            None => {
                if self.pending_rars.len() >= MAX_NOF_PENDING_RARS {
                    return Err(self.capacity_exceeded("maximum number of pending RARs reached"));
                }
                let rar_window = self.rar_window(msg.slot_rx)?;
                let mut tc_rntis = BoundedList::new();
                sanity_check!(tc_rntis.push(msg.tc_rnti).is_ok(), "new RAR has no room for its first TC-RNTI");
                let rar = PendingRar {
                    ra_rnti,
                    prach_slot_rx: msg.slot_rx,
                    rar_window,
                    tc_rntis,
                };
                // Stable with respect to equal window starts
                let pos = self
                    .pending_rars
                    .partition_point(|r| r.rar_window.start() <= rar_window.start());
                self.pending_rars.insert(pos, rar);
            }
        }

        self.pending_msg3s.insert(
            msg.tc_rnti,
            PendingMsg3 {
                ind_msg: *msg,
                harq: HarqProcess::new(0, self.expert.max_msg3_retxs, self.expert.msg3_ack_timeout),
            },
        );
        Ok(())
    }

    /// Msg3 CRC outcome
    pub fn handle_crc_indication(&mut self, crc: &UlCrcPduIndication) {
        let Some(msg3) = self.pending_msg3s.get_mut(&crc.rnti) else {
            warn!("cell={}: CRC for unknown tc-rnti={} dropped", self.cfg.cell_index, crc.rnti);
            return;
        };
        match msg3.harq.ack_info(crc.tb_crc_success) {
            Some(HarqOutcome::Acked) => {
                info!("cell={}: Msg3 of tc-rnti={} decoded", self.cfg.cell_index, crc.rnti);
                self.pending_msg3s.remove(&crc.rnti);
            }
            Some(HarqOutcome::MaxRetxReached) => {
                warn!("cell={}: Msg3 of tc-rnti={} failed after max retransmissions", self.cfg.cell_index, crc.rnti);
                self.pending_msg3s.remove(&crc.rnti);
            }
            Some(HarqOutcome::RetxPending) => {
                debug!("cell={}: Msg3 of tc-rnti={} NACKed, retransmission pending", self.cfg.cell_index, crc.rnti);
            }
            None => {
                warn!("cell={}: unexpected Msg3 CRC for tc-rnti={}", self.cfg.cell_index, crc.rnti);
            }
        }
    }

    /// Schedule Msg3 retransmissions and pending RARs in the current slot
    pub fn run_slot(&mut self, res_alloc: &mut CellResourceAllocator) {
        let msg3_delay = self.expert.msg3_delay as usize;
        let (rar_alloc, msg3_alloc) = res_alloc.get_pair_mut(0, msg3_delay);
        let sl_tx = rar_alloc.slot;

        self.handle_msg3_timeouts(sl_tx);
        self.discard_expired_rars(sl_tx);

        if !rar_alloc.is_dl_active() || !msg3_alloc.is_ul_active() {
            // RAR needs PDCCH and PDSCH, and the Msg3 slot must be UL
            return;
        }

        self.schedule_msg3_retxs(rar_alloc, msg3_alloc);

        let mut i = 0;
        while i < self.pending_rars.len() {
            let rar_req = &self.pending_rars[i];
            if !rar_req.rar_window.contains(sl_tx) {
                // Later RARs cannot have an earlier window
                return;
            }

            if rar_alloc.result.dl.rars.is_full() || msg3_alloc.result.ul.puschs.is_full() {
                log_postponed_rar(rar_req, "No space in sched result");
                break;
            }

            let nof_allocs = Self::allocate_rar(
                &self.cfg,
                &self.expert,
                &mut self.pending_msg3s,
                rar_req,
                rar_alloc,
                msg3_alloc,
            );

            if nof_allocs == 0 {
                i += 1;
            } else if nof_allocs == self.pending_rars[i].tc_rntis.len() {
                self.pending_rars.remove(i);
            } else {
                self.pending_rars[i].tc_rntis.remove_front(nof_allocs);
                break;
            }
        }
    }

    fn capacity_exceeded(&self, cause: &str) -> SchedError {
        let err = SchedError::CapacityExceeded(cause.to_string());
        warn!("cell={}: PRACH ignored: {}", self.cfg.cell_index, err);
        err
    }

    /// First DL slot after PRACH processing, spanning the RA response window
    fn rar_window(&self, prach_slot_rx: SlotPoint) -> Result<SlotInterval, SchedError> {
        let first = prach_slot_rx + self.expert.prach_duration;
        (0..self.cfg.nof_slots_per_frame())
            .map(|i| first + i)
            .find(|sl| self.cfg.is_dl_enabled(*sl))
            .map(|start| SlotInterval::new(start, start + self.ra_win_nof_slots))
            .ok_or_else(|| {
                SchedError::ConfigurationError(format!(
                    "cell={}: no DL slot within a frame after {}",
                    self.cfg.cell_index, prach_slot_rx
                ))
            })
    }

    /// Drop RARs whose window has passed, releasing their ungranted Msg3s
    fn discard_expired_rars(&mut self, sl_tx: SlotPoint) {
        let pending_msg3s = &mut self.pending_msg3s;
        let cell_index = self.cfg.cell_index;
        self.pending_rars.retain(|rar| {
            if sl_tx < rar.rar_window.stop() {
                return true;
            }
            let err = SchedError::WindowExpired(format!(
                "ra-rnti=0x{:x}, window={}, prach_slot={}, slot_tx={}",
                rar.ra_rnti, rar.rar_window, rar.prach_slot_rx, sl_tx
            ));
            warn!("cell={}: {}", cell_index, err);
            for tc_rnti in rar.tc_rntis.iter() {
                pending_msg3s.remove(tc_rnti);
            }
            false
        });
    }

    /// Msg3s without CRC past their deadline count as NACKed
    fn handle_msg3_timeouts(&mut self, sl_tx: SlotPoint) {
        let cell_index = self.cfg.cell_index;
        self.pending_msg3s.retain(|tc_rnti, msg3| match msg3.harq.slot_indication(sl_tx) {
            Some(HarqOutcome::MaxRetxReached) => {
                warn!("cell={}: Msg3 of tc-rnti={} timed out after max retransmissions", cell_index, tc_rnti);
                false
            }
            _ => true,
        });
    }

    fn schedule_msg3_retxs(
        &mut self,
        rar_alloc: &mut CellSlotResourceAllocator,
        msg3_alloc: &mut CellSlotResourceAllocator,
    ) {
        let scs = self.cfg.common_scs;
        let symbols = self.cfg.pusch_symbols();
        for (tc_rnti, msg3) in self.pending_msg3s.iter_mut() {
            if !msg3.harq.has_pending_retx() {
                continue;
            }
            if msg3_alloc.result.ul.puschs.is_full() {
                break;
            }
            let prev = GrantInfo::new(scs, GrantChannel::Sch, symbols, msg3.harq.prbs());
            let prbs = if !msg3_alloc.ul_res_grid.collides(&prev) {
                prev.crbs
            } else {
                let len = msg3.harq.prbs().length();
                let found = msg3_alloc.find_ul_crbs(len);
                if found.length() < len {
                    debug!("cell={}: no PRBs for Msg3 retx of tc-rnti={}", self.cfg.cell_index, tc_rnti);
                    continue;
                }
                found
            };
            if rar_alloc.alloc_pdcch(*tc_rnti, PdcchRntiType::Tc, DciFormat::F0_0).is_none() {
                break;
            }
            msg3_alloc.ul_res_grid.fill(&GrantInfo { crbs: prbs, ..prev });
            let pusch = UlSchedInfo {
                crnti: *tc_rnti,
                ue_index: None,
                harq_id: msg3.harq.id(),
                prbs,
                symbols,
                mcs: msg3.harq.mcs(),
                is_msg3: true,
                is_retx: true,
            };
            sanity_check!(msg3_alloc.result.ul.puschs.push(pusch).is_ok(), "PUSCH list full after check");
            msg3.harq.new_retx(msg3_alloc.slot, prbs);
            debug!("cell={}: Msg3 retx tc-rnti={} prbs={} slot={}", self.cfg.cell_index, tc_rnti, prbs, msg3_alloc.slot);
        }
    }

    /// Number of Msg3 grants that fit in this slot, committed if non-zero
    fn allocate_rar(
        cfg: &CellConfiguration,
        expert: &RaExpertConfig,
        pending_msg3s: &mut BTreeMap<Rnti, PendingMsg3>,
        rar: &PendingRar,
        rar_alloc: &mut CellSlotResourceAllocator,
        msg3_alloc: &mut CellSlotResourceAllocator,
    ) -> usize {
        if rar_alloc.result.dl.rars.is_full() {
            log_postponed_rar(rar, "No PDSCH space for RAR");
            return 0;
        }

        let mut max_nof_allocs = rar.tc_rntis.len().min(MAX_GRANTS_PER_RAR);

        max_nof_allocs = max_nof_allocs.min(msg3_alloc.result.ul.puschs.remaining());
        if max_nof_allocs == 0 {
            log_postponed_rar(rar, "No space in PUSCH for Msg3");
            return 0;
        }

        let nof_prbs_per_rar = expert.nof_prbs_per_rar as usize;
        let mut avail_dl_prbs = rar_alloc.find_dl_crbs((nof_prbs_per_rar * max_nof_allocs) as u16);
        max_nof_allocs = max_nof_allocs.min(avail_dl_prbs.length() as usize / nof_prbs_per_rar);
        if max_nof_allocs == 0 {
            log_postponed_rar(rar, "Not enough PRBs for RAR");
            return 0;
        }

        let nof_prbs_per_msg3 = expert.nof_prbs_per_msg3 as usize;
        let mut avail_ul_prbs = msg3_alloc.find_ul_crbs((nof_prbs_per_msg3 * max_nof_allocs) as u16);
        max_nof_allocs = max_nof_allocs.min(avail_ul_prbs.length() as usize / nof_prbs_per_msg3);
        if max_nof_allocs == 0 {
            log_postponed_rar(rar, "Not enough PRBs for Msg3");
            return 0;
        }

        if !rar_alloc.has_pdcch_room(DciFormat::F1_0) {
            log_postponed_rar(rar, "No PDCCH space for RAR");
            return 0;
        }

        avail_dl_prbs.resize_by((nof_prbs_per_rar * max_nof_allocs) as u16);
        avail_ul_prbs.resize_by((nof_prbs_per_msg3 * max_nof_allocs) as u16);

        Self::fill_rar_grant(
            cfg,
            expert,
            pending_msg3s,
            rar,
            avail_dl_prbs,
            avail_ul_prbs,
            rar_alloc,
            msg3_alloc,
            max_nof_allocs,
        );
        max_nof_allocs
    }

    #[allow(clippy::too_many_arguments)]
    fn fill_rar_grant(
        cfg: &CellConfiguration,
        expert: &RaExpertConfig,
        pending_msg3s: &mut BTreeMap<Rnti, PendingMsg3>,
        rar_request: &PendingRar,
        rar_prbs: PrbInterval,
        msg3_prbs: PrbInterval,
        rar_alloc: &mut CellSlotResourceAllocator,
        msg3_alloc: &mut CellSlotResourceAllocator,
        nof_msg3_grants: usize,
    ) {
        let scs = cfg.common_scs;
        let ra_rnti = Rnti(rar_request.ra_rnti);

        if rar_alloc.alloc_pdcch(ra_rnti, PdcchRntiType::Ra, DciFormat::F1_0).is_none() {
            report_fatal_error!("cell={}: PDCCH for ra-rnti={} vanished after check", cfg.cell_index, ra_rnti);
        }
        rar_alloc
            .dl_res_grid
            .fill(&GrantInfo::new(scs, GrantChannel::Sch, cfg.pdsch_symbols(), rar_prbs));

        let mut rar = RarInformation {
            ra_rnti,
            prbs: rar_prbs,
            symbols: cfg.pdsch_symbols(),
            grants: BoundedList::new(),
        };

        let mut last_msg3_start = msg3_prbs.start();
        for tc_rnti in rar_request.tc_rntis.iter().take(nof_msg3_grants) {
            let Some(msg3_req) = pending_msg3s.get_mut(tc_rnti) else {
                report_fatal_error!("cell={}: no pending Msg3 for tc-rnti={}", cfg.cell_index, tc_rnti);
            };

            let prbs = PrbInterval::new(last_msg3_start, last_msg3_start + expert.nof_prbs_per_msg3);
            last_msg3_start = prbs.stop();

            let grant = RarUlGrant {
                tc_rnti: *tc_rnti,
                rapid: msg3_req.ind_msg.preamble_id,
                ta: msg3_req.ind_msg.timing_advance,
                prbs,
                mcs: expert.msg3_mcs,
            };
            sanity_check!(rar.grants.push(grant).is_ok(), "RAR grant list overflow");

            msg3_alloc
                .ul_res_grid
                .fill(&GrantInfo::new(scs, GrantChannel::Sch, cfg.pusch_symbols(), prbs));
            let pusch = UlSchedInfo {
                crnti: *tc_rnti,
                ue_index: None,
                harq_id: msg3_req.harq.id(),
                prbs,
                symbols: cfg.pusch_symbols(),
                mcs: expert.msg3_mcs,
                is_msg3: true,
                is_retx: false,
            };
            sanity_check!(msg3_alloc.result.ul.puschs.push(pusch).is_ok(), "PUSCH list overflow");

            let success = msg3_req.harq.new_tx(msg3_alloc.slot, prbs, expert.msg3_mcs, 0);
            sanity_check!(
                success,
                "cell={}: Msg3 HARQ of tc-rnti={} is busy", cfg.cell_index, tc_rnti
            );
        }

        log_rar(&rar, rar_alloc.slot);
        if rar_alloc.result.dl.rars.push(rar).is_err() {
            report_fatal_error!("cell={}: RAR list overflow", cfg.cell_index);
        }
    }
}

fn log_postponed_rar(rar: &PendingRar, cause: &str) {
    debug!("RAR allocation for ra-rnti=0x{:x} was postponed. Cause: {}", rar.ra_rnti, cause);
}

fn log_rar(rar: &RarInformation, slot: SlotPoint) {
    if !tracing::enabled!(tracing::Level::INFO) {
        return;
    }
    let msg3s: Vec<String> = rar
        .grants
        .iter()
        .map(|g| format!("{{{}: prbs={}}}", g.tc_rnti, g.prbs))
        .collect();
    info!("RAR slot={} ra-rnti={} prbs={} msg3s=[{}]", slot, rar.ra_rnti, rar.prbs, msg3s.join(", "));
}
