//! Binary framing of scheduling results for the PHY adapter

use crate::sched_result::SchedResult;
use crate::InterfaceError;
use bytes::Bytes;
use common::types::DuCellIndex;
use common::SlotPoint;
use serde::{Deserialize, Serialize};
use tracing::trace;

#[derive(Serialize)]
struct SchedResultFrameRef<'a> {
    cell_index: DuCellIndex,
    slot: SlotPoint,
    result: &'a SchedResult,
}

/// Decoded scheduling result frame
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SchedResultFrame {
    /// Cell the result belongs to
    pub cell_index: DuCellIndex,
    /// Slot the result describes
    pub slot: SlotPoint,
    /// Scheduling decisions
    pub result: SchedResult,
}

/// Encode the result of one slot and cell
pub fn encode_sched_result(
    cell_index: DuCellIndex,
    slot: SlotPoint,
    result: &SchedResult,
) -> Result<Bytes, InterfaceError> {
    let frame = SchedResultFrameRef { cell_index, slot, result };
    let encoded = bincode::serialize(&frame)?;
    trace!("Encoded result for cell={} slot={}: {} bytes", cell_index, slot, encoded.len());
    Ok(Bytes::from(encoded))
}

/// Decode a frame produced by [`encode_sched_result`]
pub fn decode_sched_result(data: &[u8]) -> Result<SchedResultFrame, InterfaceError> {
    if data.is_empty() {
        return Err(InterfaceError::InvalidMessage);
    }
    Ok(bincode::deserialize(data)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sched_result::{RarInformation, RarUlGrant};
    use common::types::{Rnti, SubcarrierSpacing};
    use common::{OfdmSymbolRange, PrbInterval};

    #[test]
    fn test_result_frame_carries_rar() {
        let mut result = SchedResult::new();
        let mut rar = RarInformation {
            ra_rnti: Rnti(1),
            prbs: PrbInterval::new(0, 4),
            symbols: OfdmSymbolRange::new(2, 14),
            grants: Default::default(),
        };
        rar.grants
            .push(RarUlGrant {
                tc_rnti: Rnti(0x4601),
                rapid: 7,
                ta: 3,
                prbs: PrbInterval::new(0, 3),
                mcs: 0,
            })
            .unwrap();
        result.dl.rars.push(rar).unwrap();

        let slot = SlotPoint::from_sfn(SubcarrierSpacing::Scs15, 12, 3);
        let bytes = encode_sched_result(DuCellIndex(1), slot, &result).unwrap();
        let frame = decode_sched_result(&bytes).unwrap();

        assert_eq!(frame.cell_index, DuCellIndex(1));
        assert_eq!(frame.slot, slot);
        assert_eq!(frame.result.dl.rars[0].grants[0].rapid, 7);
    }

    #[test]
    fn test_empty_buffer_rejected() {
        assert!(matches!(decode_sched_result(&[]), Err(InterfaceError::InvalidMessage)));
    }
}
