use rewind_core::{SessionHeader, WireRecord, WireVersion};
use tracing::{debug, warn};

use crate::error::DecodeError;
use crate::registry::PayloadDecoder;
use crate::state::ReconstructionState;

/// Decodes the session header and installs it on the state.
#[derive(Clone, Copy, Debug, Default)]
pub struct SessionHeaderDecoder;

impl PayloadDecoder for SessionHeaderDecoder {
    fn decode(&self, data: &[u8], state: &mut ReconstructionState) -> Result<(), DecodeError> {
        let header = SessionHeader::from_bytes(data, WireVersion::CURRENT)?;
        if let Some(previous) = state.header() {
            if previous.version != header.version {
                warn!(
                    previous = previous.version.0,
                    new = header.version.0,
                    "session header changed wire version mid-stream"
                );
            }
        }
        debug!(version = header.version.0, producer = %header.producer, "session header");
        state.set_header(header);
        Ok(())
    }
}
