//! Common Types for the DU Scheduler
//!
//! Defines fundamental identifiers and radio parameters used throughout the scheduler

use serde::{Deserialize, Serialize};
use num_derive::{FromPrimitive, ToPrimitive};
use std::fmt;

/// Radio Network Temporary Identifier (RNTI)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Rnti(pub u16);

impl Rnti {
    /// P-RNTI used for paging
    pub const P_RNTI: Self = Self(0xFFFE);
    /// SI-RNTI used for system information
    pub const SI_RNTI: Self = Self(0xFFFF);
    /// Lowest value that can be handed out as C-RNTI/TC-RNTI
    pub const MIN_CRNTI: u16 = 0x4601;
    /// Highest value that can be handed out as C-RNTI/TC-RNTI
    pub const MAX_CRNTI: u16 = 0xFFEF;

    /// Create a new RNTI
    pub fn new(value: u16) -> Self {
        Self(value)
    }

    /// Get the RNTI value
    pub fn value(&self) -> u16 {
        self.0
    }

    /// Whether this value lies in the C-RNTI range
    pub fn is_crnti(&self) -> bool {
        (Self::MIN_CRNTI..=Self::MAX_CRNTI).contains(&self.0)
    }
}

impl fmt::Display for Rnti {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:x}", self.0)
    }
}

/// Index of a cell within the DU
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DuCellIndex(pub u8);

impl DuCellIndex {
    /// Maximum number of cells handled by one DU
    pub const MAX_NOF_DU_CELLS: u8 = 16;
}

impl fmt::Display for DuCellIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Index of a cell group (set of cells a UE may use simultaneously)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CellGroupIndex(pub u8);

impl CellGroupIndex {
    /// Maximum number of cell groups handled by one DU
    pub const MAX_NOF_CELL_GROUPS: u8 = DuCellIndex::MAX_NOF_DU_CELLS;
}

impl fmt::Display for CellGroupIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Index of a UE within the DU
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UeIndex(pub u16);

impl UeIndex {
    /// Maximum number of UEs handled by one DU
    pub const MAX_NOF_DU_UES: u16 = 1024;
}

impl fmt::Display for UeIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Physical Cell Identity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Pci(pub u16);

impl Pci {
    /// Maximum valid PCI value (0-1007)
    pub const MAX: u16 = 1007;

    /// Create a new PCI with validation
    pub fn new(value: u16) -> Option<Self> {
        if value <= Self::MAX {
            Some(Self(value))
        } else {
            None
        }
    }
}

/// Subcarrier spacing values in kHz
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, FromPrimitive, ToPrimitive, Serialize, Deserialize)]
pub enum SubcarrierSpacing {
    /// 15 kHz
    Scs15 = 15,
    /// 30 kHz
    Scs30 = 30,
    /// 60 kHz
    Scs60 = 60,
    /// 120 kHz
    Scs120 = 120,
    /// 240 kHz
    Scs240 = 240,
}

impl SubcarrierSpacing {
    /// Number of numerologies defined for NR
    pub const NOF_NUMEROLOGIES: usize = 5;

    /// Numerology index (mu)
    pub fn numerology(&self) -> u8 {
        match self {
            SubcarrierSpacing::Scs15 => 0,
            SubcarrierSpacing::Scs30 => 1,
            SubcarrierSpacing::Scs60 => 2,
            SubcarrierSpacing::Scs120 => 3,
            SubcarrierSpacing::Scs240 => 4,
        }
    }

    /// Subcarrier spacing given in kHz
    pub fn from_khz(khz: u32) -> Option<Self> {
        <Self as num_traits::FromPrimitive>::from_u32(khz)
    }

    /// Subcarrier spacing for a numerology index
    pub fn from_numerology(mu: u8) -> Option<Self> {
        match mu {
            0 => Some(SubcarrierSpacing::Scs15),
            1 => Some(SubcarrierSpacing::Scs30),
            2 => Some(SubcarrierSpacing::Scs60),
            3 => Some(SubcarrierSpacing::Scs120),
            4 => Some(SubcarrierSpacing::Scs240),
            _ => None,
        }
    }

    /// Number of slots per 1 ms subframe
    pub fn slots_per_subframe(&self) -> u32 {
        1 << self.numerology()
    }

    /// Number of slots per 10 ms frame
    pub fn slots_per_frame(&self) -> u32 {
        10 * self.slots_per_subframe()
    }

    /// Slot duration in microseconds (240 kHz is rounded down from 62.5 us)
    pub fn slot_duration_us(&self) -> u32 {
        1000 / self.slots_per_subframe()
    }
}

impl fmt::Display for SubcarrierSpacing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}kHz", *self as u32)
    }
}

/// Bandwidth values in MHz
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Bandwidth {
    /// 5 MHz
    Bw5,
    /// 10 MHz
    Bw10,
    /// 15 MHz
    Bw15,
    /// 20 MHz
    Bw20,
    /// 25 MHz
    Bw25,
    /// 30 MHz
    Bw30,
    /// 40 MHz
    Bw40,
    /// 50 MHz
    Bw50,
    /// 60 MHz
    Bw60,
    /// 80 MHz
    Bw80,
    /// 100 MHz
    Bw100,
}

impl Bandwidth {
    /// Parse a channel bandwidth given in MHz
    pub fn from_mhz(mhz: u32) -> Option<Self> {
        let bw = match mhz {
            5 => Bandwidth::Bw5,
            10 => Bandwidth::Bw10,
            15 => Bandwidth::Bw15,
            20 => Bandwidth::Bw20,
            25 => Bandwidth::Bw25,
            30 => Bandwidth::Bw30,
            40 => Bandwidth::Bw40,
            50 => Bandwidth::Bw50,
            60 => Bandwidth::Bw60,
            80 => Bandwidth::Bw80,
            100 => Bandwidth::Bw100,
            _ => return None,
        };
        Some(bw)
    }

    /// Maximum transmission bandwidth in PRBs (3GPP TS 38.104 Table 5.3.2-1)
    ///
    /// Returns `None` for combinations not defined for FR1.
    pub fn nof_prbs(&self, scs: SubcarrierSpacing) -> Option<u16> {
        let num_rbs = match (self, scs) {
            (Bandwidth::Bw5, SubcarrierSpacing::Scs15) => 25,
            (Bandwidth::Bw5, SubcarrierSpacing::Scs30) => 11,
            (Bandwidth::Bw10, SubcarrierSpacing::Scs15) => 52,
            (Bandwidth::Bw10, SubcarrierSpacing::Scs30) => 24,
            (Bandwidth::Bw10, SubcarrierSpacing::Scs60) => 11,
            (Bandwidth::Bw15, SubcarrierSpacing::Scs15) => 79,
            (Bandwidth::Bw15, SubcarrierSpacing::Scs30) => 38,
            (Bandwidth::Bw15, SubcarrierSpacing::Scs60) => 18,
            (Bandwidth::Bw20, SubcarrierSpacing::Scs15) => 106,
            (Bandwidth::Bw20, SubcarrierSpacing::Scs30) => 51,
            (Bandwidth::Bw20, SubcarrierSpacing::Scs60) => 24,
            (Bandwidth::Bw25, SubcarrierSpacing::Scs15) => 133,
            (Bandwidth::Bw25, SubcarrierSpacing::Scs30) => 65,
            (Bandwidth::Bw25, SubcarrierSpacing::Scs60) => 31,
            (Bandwidth::Bw30, SubcarrierSpacing::Scs15) => 160,
            (Bandwidth::Bw30, SubcarrierSpacing::Scs30) => 78,
            (Bandwidth::Bw30, SubcarrierSpacing::Scs60) => 38,
            (Bandwidth::Bw40, SubcarrierSpacing::Scs15) => 216,
            (Bandwidth::Bw40, SubcarrierSpacing::Scs30) => 106,
            (Bandwidth::Bw40, SubcarrierSpacing::Scs60) => 51,
            (Bandwidth::Bw50, SubcarrierSpacing::Scs15) => 270,
            (Bandwidth::Bw50, SubcarrierSpacing::Scs30) => 133,
            (Bandwidth::Bw50, SubcarrierSpacing::Scs60) => 65,
            (Bandwidth::Bw60, SubcarrierSpacing::Scs30) => 162,
            (Bandwidth::Bw60, SubcarrierSpacing::Scs60) => 79,
            (Bandwidth::Bw80, SubcarrierSpacing::Scs30) => 217,
            (Bandwidth::Bw80, SubcarrierSpacing::Scs60) => 107,
            (Bandwidth::Bw100, SubcarrierSpacing::Scs30) => 273,
            (Bandwidth::Bw100, SubcarrierSpacing::Scs60) => 135,
            _ => return None,
        };
        Some(num_rbs)
    }
}

/// TDD UL/DL pattern (single periodic pattern)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TddPattern {
    /// Pattern periodicity in slots
    pub period_slots: u32,
    /// Number of full DL slots at the start of the period
    pub nof_dl_slots: u32,
    /// Number of DL symbols in the slot following the DL slots
    pub nof_dl_symbols: u32,
    /// Number of full UL slots at the end of the period
    pub nof_ul_slots: u32,
    /// Number of UL symbols in the slot preceding the UL slots
    pub nof_ul_symbols: u32,
}

impl TddPattern {
    /// Whether the slot at `idx` within the period carries DL symbols
    pub fn is_dl_slot(&self, idx: u32) -> bool {
        idx < self.nof_dl_slots || (idx == self.nof_dl_slots && self.nof_dl_symbols > 0)
    }

    /// Whether the slot at `idx` within the period carries UL symbols
    pub fn is_ul_slot(&self, idx: u32) -> bool {
        let first_ul = self.period_slots - self.nof_ul_slots;
        idx >= first_ul || (idx + 1 == first_ul && self.nof_ul_symbols > 0)
    }
}

/// Duplex mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DuplexMode {
    /// Frequency Division Duplex
    Fdd,
    /// Time Division Duplex
    Tdd(TddPattern),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pci_validation() {
        assert!(Pci::new(0).is_some());
        assert!(Pci::new(1007).is_some());
        assert!(Pci::new(1008).is_none());
    }

    #[test]
    fn test_bandwidth_prbs() {
        assert_eq!(Bandwidth::Bw20.nof_prbs(SubcarrierSpacing::Scs15), Some(106));
        assert_eq!(Bandwidth::Bw100.nof_prbs(SubcarrierSpacing::Scs30), Some(273));
        assert_eq!(Bandwidth::Bw100.nof_prbs(SubcarrierSpacing::Scs15), None);
        assert_eq!(Bandwidth::from_mhz(40), Some(Bandwidth::Bw40));
        assert_eq!(Bandwidth::from_mhz(45), None);
    }

    #[test]
    fn test_numerology() {
        assert_eq!(SubcarrierSpacing::Scs30.numerology(), 1);
        assert_eq!(SubcarrierSpacing::Scs30.slots_per_frame(), 20);
        assert_eq!(SubcarrierSpacing::Scs120.slot_duration_us(), 125);
        assert_eq!(SubcarrierSpacing::from_numerology(2), Some(SubcarrierSpacing::Scs60));
        assert_eq!(SubcarrierSpacing::from_numerology(5), None);
        assert_eq!(SubcarrierSpacing::from_khz(30), Some(SubcarrierSpacing::Scs30));
        assert_eq!(SubcarrierSpacing::from_khz(45), None);
    }

    #[test]
    fn test_tdd_pattern() {
        // DDDSU with 10 slots: 6 DL, special, 3 UL
        let tdd = TddPattern {
            period_slots: 10,
            nof_dl_slots: 6,
            nof_dl_symbols: 8,
            nof_ul_slots: 3,
            nof_ul_symbols: 0,
        };
        assert!(tdd.is_dl_slot(0));
        assert!(tdd.is_dl_slot(6));
        assert!(!tdd.is_dl_slot(7));
        assert!(!tdd.is_ul_slot(6));
        assert!(tdd.is_ul_slot(7));
        assert!(tdd.is_ul_slot(9));
    }

    #[test]
    fn test_rnti_ranges() {
        assert!(Rnti(0x4601).is_crnti());
        assert!(!Rnti::P_RNTI.is_crnti());
        assert_eq!(format!("{}", Rnti(0x4601)), "0x4601");
    }
}
