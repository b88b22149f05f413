//! Decoders for the per-stage batch records.

use rewind_core::records::{TAG_CONTACT_BATCH, TAG_ENTITY_BATCH, TAG_JOINT_BATCH};
use rewind_core::{ContactBatch, EntityBatch, JointBatch, WireRecord};

use crate::error::DecodeError;
use crate::registry::PayloadDecoder;
use crate::state::ReconstructionState;

/// Upserts entity snapshots into the solver's open stage.
#[derive(Clone, Copy, Debug, Default)]
pub struct EntityBatchDecoder;

impl PayloadDecoder for EntityBatchDecoder {
    fn decode(&self, data: &[u8], state: &mut ReconstructionState) -> Result<(), DecodeError> {
        let version = state.wire_version(TAG_ENTITY_BATCH);
        let batch = EntityBatch::from_bytes(data, version)?;
        if let Some(stage) = state.stage_for_source(batch.solver) {
            for entity in batch.entities {
                stage.upsert_entity(entity);
            }
        }
        Ok(())
    }
}

/// Appends contact pairs to the solver's open stage.
#[derive(Clone, Copy, Debug, Default)]
pub struct ContactBatchDecoder;

impl PayloadDecoder for ContactBatchDecoder {
    fn decode(&self, data: &[u8], state: &mut ReconstructionState) -> Result<(), DecodeError> {
        let version = state.wire_version(TAG_CONTACT_BATCH);
        let batch = ContactBatch::from_bytes(data, version)?;
        if let Some(stage) = state.stage_for_source(batch.solver) {
            for pair in batch.pairs {
                stage.add_contact(pair);
            }
        }
        Ok(())
    }
}

/// Appends joint states to the solver's open stage.
#[derive(Clone, Copy, Debug, Default)]
pub struct JointBatchDecoder;

impl PayloadDecoder for JointBatchDecoder {
    fn decode(&self, data: &[u8], state: &mut ReconstructionState) -> Result<(), DecodeError> {
        let version = state.wire_version(TAG_JOINT_BATCH);
        let batch = JointBatch::from_bytes(data, version)?;
        if let Some(stage) = state.stage_for_source(batch.solver) {
            for joint in batch.joints {
                stage.add_joint(joint);
            }
        }
        Ok(())
    }
}
