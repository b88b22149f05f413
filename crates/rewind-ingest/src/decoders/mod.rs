//! Built-in payload decoders.

use std::sync::Arc;

use rewind_core::records::{
    TAG_CONTACT_BATCH, TAG_ENTITY_BATCH, TAG_JOINT_BATCH, TAG_NAME_ENTRY, TAG_SESSION_HEADER,
    TAG_SPATIAL_INDEX,
};

use crate::registry::PayloadDecoder;

mod batches;
mod header;
mod names;
mod spatial;

pub use batches::{ContactBatchDecoder, EntityBatchDecoder, JointBatchDecoder};
pub use header::SessionHeaderDecoder;
pub use names::NameEntryDecoder;
pub use spatial::SpatialIndexDecoder;

/// Every built-in decoder with its type tag.
pub fn builtin() -> Vec<(&'static str, Arc<dyn PayloadDecoder>)> {
    fn shared(decoder: impl PayloadDecoder + 'static) -> Arc<dyn PayloadDecoder> {
        Arc::new(decoder)
    }
    vec![
        (TAG_SESSION_HEADER, shared(SessionHeaderDecoder)),
        (TAG_ENTITY_BATCH, shared(EntityBatchDecoder)),
        (TAG_CONTACT_BATCH, shared(ContactBatchDecoder)),
        (TAG_JOINT_BATCH, shared(JointBatchDecoder)),
        (TAG_SPATIAL_INDEX, shared(SpatialIndexDecoder)),
        (TAG_NAME_ENTRY, shared(NameEntryDecoder)),
    ]
}
