//! Rewind: physics trace ingestion and scrubbable recordings.
//!
//! A traced physics process emits a stream of small events: solver frame
//! boundaries, stage markers, and chunked binary payloads carrying entity,
//! contact and joint state. Rewind turns that stream into a
//! [`Recording`](store::Recording) that readers can scrub at random while
//! it is still being written.
//!
//! This is the facade crate; it re-exports the sub-crates.
//!
//! # Quick start
//!
//! ```rust
//! use rewind::prelude::*;
//! use rewind::model::event::{fields, loggers, names};
//!
//! let mut provider = TraceProvider::new(IngestConfig::default()).unwrap();
//! let reader = provider.create_session("quick-start").unwrap();
//!
//! for cycle in 0..3u64 {
//!     let event = RawEvent::new(loggers::PHYSICS_TRACE, names::SOLVER_FRAME_START, cycle as f64)
//!         .with(fields::SOLVER_ID, 1i32)
//!         .with(fields::CYCLE, cycle);
//!     provider.on_event(event);
//! }
//!
//! // Two frames are committed; the third is still open.
//! assert_eq!(reader.solver_frame_count(SolverId(1)), 2);
//! let frame = reader.collapsed_frame_at(SolverId(1), 1).unwrap();
//! assert_eq!(frame.cycle, Cycle(1));
//!
//! let summary = provider.end_session().unwrap();
//! assert_eq!(summary.solver_frames, 2);
//! ```
//!
//! # Modules
//!
//! | Module | Sub-crate | Contents |
//! |--------|-----------|----------|
//! | [`model`] | `rewind-core` | Ids, frame model, payload records and wire format |
//! | [`store`] | `rewind-store` | `Recording`, readers, keyframes, queries |
//! | [`ingest`] | `rewind-ingest` | Router, reassembly, decoders, engine, sessions |

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

/// Identifiers, frame model and payload records (`rewind-core`).
pub use rewind_core as model;

/// The recording store (`rewind-store`).
///
/// [`store::Recording`] is the shared timeline; [`store::RecordingReader`]
/// is the handle readers keep.
pub use rewind_store as store;

/// Trace ingestion (`rewind-ingest`).
///
/// Start with [`ingest::TraceProvider`], or [`ingest::IngestThread`] to
/// run it off the caller's thread. Custom payload types plug in through
/// [`ingest::PayloadDecoder`].
pub use rewind_ingest as ingest;

/// Common imports.
///
/// ```rust
/// use rewind::prelude::*;
/// ```
pub mod prelude {
    // Core model
    pub use rewind_core::{
        Cycle, EntityId, EntitySnapshot, OuterFrame, RawEvent, SolverFrame, SolverId, Stage,
        Transform,
    };

    // Store
    pub use rewind_store::{Recording, RecordingReader, StoreConfig, StoreError};

    // Ingest
    pub use rewind_ingest::{
        DecodeError, IngestConfig, IngestError, IngestThread, PayloadDecoder,
        ReconstructionState, SessionSummary, TraceProvider,
    };
}
