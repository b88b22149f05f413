use rewind_core::records::TAG_SPATIAL_INDEX;
use rewind_core::{SpatialIndexSnapshot, WireRecord};

use crate::error::DecodeError;
use crate::registry::PayloadDecoder;
use crate::state::ReconstructionState;

/// Stores spatial index snapshots as custom data on the open frame.
#[derive(Clone, Copy, Debug, Default)]
pub struct SpatialIndexDecoder;

impl PayloadDecoder for SpatialIndexDecoder {
    fn decode(&self, data: &[u8], state: &mut ReconstructionState) -> Result<(), DecodeError> {
        let version = state.wire_version(TAG_SPATIAL_INDEX);
        let snapshot = SpatialIndexSnapshot::from_bytes(data, version)?;
        if let Some(frame) = state.open_frame_for_source(snapshot.solver) {
            frame.custom_data.insert(snapshot);
        }
        Ok(())
    }
}
