//! Payload encoders producing the bytes a producer would send.

use rewind_core::records::{
    TAG_CONTACT_BATCH, TAG_ENTITY_BATCH, TAG_JOINT_BATCH, TAG_NAME_ENTRY, TAG_SESSION_HEADER,
    TAG_SPATIAL_INDEX,
};
use rewind_core::{
    ContactBatch, EntityBatch, EntitySnapshot, JointBatch, NameEntry, SessionHeader,
    SourceSolverId, SpatialIndexSnapshot, WireRecord, WireVersion,
};

/// A payload ready to be chunked into events.
#[derive(Clone, Debug)]
pub struct EncodedPayload {
    pub type_tag: &'static str,
    pub bytes: Vec<u8>,
}

fn encode<T: WireRecord>(type_tag: &'static str, record: &T, version: WireVersion) -> EncodedPayload {
    let bytes = match record.to_bytes(version) {
        Ok(b) => b,
        Err(e) => panic!("fixture encoding failed for {type_tag}: {e}"),
    };
    EncodedPayload { type_tag, bytes }
}

pub fn header(version: WireVersion) -> EncodedPayload {
    let record = SessionHeader {
        version,
        producer: "rewind-test-utils".into(),
    };
    encode(TAG_SESSION_HEADER, &record, version)
}

pub fn entity_batch(solver: i32, entities: &[EntitySnapshot], version: WireVersion) -> EncodedPayload {
    let record = EntityBatch {
        solver: SourceSolverId(solver),
        entities: entities.to_vec(),
    };
    encode(TAG_ENTITY_BATCH, &record, version)
}

pub fn contact_batch(record: &ContactBatch) -> EncodedPayload {
    encode(TAG_CONTACT_BATCH, record, WireVersion::CURRENT)
}

pub fn joint_batch(record: &JointBatch) -> EncodedPayload {
    encode(TAG_JOINT_BATCH, record, WireVersion::CURRENT)
}

pub fn spatial_index(record: &SpatialIndexSnapshot) -> EncodedPayload {
    encode(TAG_SPATIAL_INDEX, record, WireVersion::CURRENT)
}

pub fn name_entry(id: u64, name: &str) -> EncodedPayload {
    let record = NameEntry {
        id,
        name: name.to_owned(),
    };
    encode(TAG_NAME_ENTRY, &record, WireVersion::CURRENT)
}

/// LZ4 block-compress `bytes`, as a producer does for large payloads.
pub fn compress(bytes: &[u8]) -> Vec<u8> {
    lz4_flex::block::compress(bytes)
}
