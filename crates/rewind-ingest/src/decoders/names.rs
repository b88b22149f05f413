use rewind_core::records::TAG_NAME_ENTRY;
use rewind_core::{NameEntry, WireRecord};

use crate::error::DecodeError;
use crate::registry::PayloadDecoder;
use crate::state::ReconstructionState;

/// Commits string-interning entries to the recording's name table.
#[derive(Clone, Copy, Debug, Default)]
pub struct NameEntryDecoder;

impl PayloadDecoder for NameEntryDecoder {
    fn decode(&self, data: &[u8], state: &mut ReconstructionState) -> Result<(), DecodeError> {
        let version = state.wire_version(TAG_NAME_ENTRY);
        let entry = NameEntry::from_bytes(data, version)?;
        state
            .recording()
            .write()
            .add_name_assumes_locked(entry.id, &entry.name);
        Ok(())
    }
}
