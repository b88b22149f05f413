//! Core types for the Rewind physics recording framework.
//!
//! This is the leaf crate with zero internal dependencies. It defines
//! the fundamental abstractions shared by the store and the ingest
//! pipeline: strongly-typed identifiers, the two-level frame model
//! (outer world ticks containing per-solver frames and stages), the
//! payload record types, their versioned binary wire format, and the
//! untyped raw event shape delivered by the trace transport.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod custom;
pub mod error;
pub mod event;
pub mod frame;
pub mod id;
pub mod records;
pub mod wire;

pub use custom::CustomFrameData;
pub use error::WireError;
pub use event::{FieldValue, RawEvent};
pub use frame::{OuterFrame, SolverFrame, Stage, StageFlags, StageTransition, Transform};
pub use id::{Cycle, EntityId, PayloadId, SolverId, SourceSolverId};
pub use records::{
    ContactBatch, ContactPair, ContactPoint, EntityBatch, EntitySnapshot, EntityState,
    JointBatch, JointState, NameEntry, SessionHeader, SpatialIndexSnapshot, SpatialNode,
};
pub use wire::{WireRecord, WireVersion};
