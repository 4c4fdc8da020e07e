//! Grant selection policies
//!
//! The policy is chosen once from the expert configuration and decides in
//! which order UEs are offered resources each slot.

use super::ue_context::Ue;
use crate::config::GrantPolicyKind;
use common::types::UeIndex;
use std::collections::BTreeMap;

/// Link direction of a grant
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Dl,
    Ul,
}

/// Order in which UEs are served
#[derive(Debug, Clone)]
pub enum GrantPolicy {
    /// Rotating start position
    RoundRobin {
        /// Rotation applied in the next slot, per direction
        next_offset: [usize; 2],
    },
    /// Largest buffer first
    MaxPendingBytes,
}

impl GrantPolicy {
    pub fn new(kind: GrantPolicyKind) -> Self {
        match kind {
            GrantPolicyKind::RoundRobin => GrantPolicy::RoundRobin { next_offset: [0; 2] },
            GrantPolicyKind::MaxPendingBytes => GrantPolicy::MaxPendingBytes,
        }
    }

    /// Fill `candidates` with all UEs in serving order
    pub fn order_candidates(&mut self, ues: &BTreeMap<UeIndex, Ue>, dir: Direction, candidates: &mut Vec<UeIndex>) {
        candidates.clear();
        candidates.extend(ues.keys().copied());
        if candidates.is_empty() {
            return;
        }
        match self {
            GrantPolicy::RoundRobin { next_offset } => {
                let offset = &mut next_offset[dir as usize];
                let len = candidates.len();
                candidates.rotate_left(*offset % len);
                *offset = (*offset + 1) % len;
            }
            GrantPolicy::MaxPendingBytes => {
                let pending = |ue_index: &UeIndex| {
                    ues.get(ue_index).map_or(0, |ue| match dir {
                        Direction::Dl => ue.pending_dl_bytes(),
                        Direction::Ul => ue.pending_ul_bytes(),
                    })
                };
                candidates.sort_unstable_by(|a, b| pending(b).cmp(&pending(a)).then(a.cmp(b)));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::UeExpertConfig;
    use common::types::{DuCellIndex, Rnti};
    use interfaces::message_types::ServingCellConfig;

    fn make_ues(n: u16) -> BTreeMap<UeIndex, Ue> {
        (0..n)
            .map(|i| {
                let ue = Ue::new(
                    UeIndex(i),
                    Rnti(0x4601 + i),
                    &[ServingCellConfig { cell_index: DuCellIndex(0) }],
                    &[4],
                    &UeExpertConfig::default(),
                );
                (UeIndex(i), ue)
            })
            .collect()
    }

    #[test]
    fn test_round_robin_rotates() {
        let ues = make_ues(3);
        let mut policy = GrantPolicy::new(GrantPolicyKind::RoundRobin);
        let mut candidates = Vec::new();

        policy.order_candidates(&ues, Direction::Dl, &mut candidates);
        assert_eq!(candidates, vec![UeIndex(0), UeIndex(1), UeIndex(2)]);
        policy.order_candidates(&ues, Direction::Dl, &mut candidates);
        assert_eq!(candidates, vec![UeIndex(1), UeIndex(2), UeIndex(0)]);
        // UL keeps its own rotation
        policy.order_candidates(&ues, Direction::Ul, &mut candidates);
        assert_eq!(candidates, vec![UeIndex(0), UeIndex(1), UeIndex(2)]);
    }

    #[test]
    fn test_max_pending_bytes_first() {
        let mut ues = make_ues(3);
        ues.get_mut(&UeIndex(1)).unwrap().handle_dl_buffer_state(4, 500);
        ues.get_mut(&UeIndex(2)).unwrap().handle_dl_buffer_state(4, 100);
        let mut policy = GrantPolicy::new(GrantPolicyKind::MaxPendingBytes);
        let mut candidates = Vec::new();
        policy.order_candidates(&ues, Direction::Dl, &mut candidates);
        assert_eq!(candidates, vec![UeIndex(1), UeIndex(2), UeIndex(0)]);
    }
}
