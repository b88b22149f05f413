//! Recording store for Rewind.
//!
//! Holds the reconstructed timeline: per-solver append-only frame
//! arrays, the outer-frame array, solver id bookkeeping, and a sparse
//! index of keyframes that bounds the cost of random access.
//!
//! A [`Recording`] is written by exactly one ingest session and read by
//! any number of [`RecordingReader`] handles. All mutation goes through
//! [`Recording::write`]; methods that require the guard are suffixed
//! `_assumes_locked`.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod config;
pub mod error;
pub mod keyframe;
pub mod reader;
pub mod recording;

pub use config::StoreConfig;
pub use error::{StoreConfigError, StoreError};
pub use keyframe::{collapse_frames, KEYFRAME_STAGE_NAME};
pub use reader::RecordingReader;
pub use recording::{Recording, RecordingData, RecordingWriteGuard};
