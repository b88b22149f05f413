//! Trace ingestion and timeline reconstruction for Rewind.
//!
//! Raw trace events enter through a [`TraceProvider`], either directly
//! or via an [`IngestThread`]. The router classifies them into typed
//! [`TraceEvent`]s; the [`ReconstructionEngine`] remaps solver ids,
//! reassembles binary payloads, hands them to [`PayloadDecoder`]s and
//! commits finished frames into a [`Recording`](rewind_store::Recording).
//!
//! Nothing here is fatal to a session. Malformed input is logged and
//! counted in [`DecodeStats`], and surfaces in the [`SessionSummary`]
//! when the session ends.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod config;
pub mod decoders;
pub mod engine;
pub mod error;
pub mod event;
pub mod ingest_thread;
pub mod reassembly;
pub mod registry;
pub mod remap;
pub mod router;
pub mod session;
pub mod state;
pub mod stats;
pub mod window;

pub use config::{ConfigError, IngestConfig};
pub use engine::ReconstructionEngine;
pub use error::{DecodeError, IngestError, PayloadError, ReassemblyError};
pub use event::{FrameStart, PayloadStart, TraceEvent};
pub use ingest_thread::IngestThread;
pub use reassembly::{PayloadReassembler, MAX_PAYLOAD_SIZE};
pub use registry::{DecoderRegistry, PayloadDecoder};
pub use remap::IdRemapper;
pub use router::{EventKind, EventRouter};
pub use session::TraceProvider;
pub use state::{ReconstructionState, StagePolicy};
pub use stats::{DecodeStats, SessionSummary};
pub use window::{OuterFrameWindow, WindowOutcome};
