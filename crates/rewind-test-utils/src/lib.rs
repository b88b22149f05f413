//! Test utilities and fixtures for Rewind development.
//!
//! Provides a [`FrameBuilder`] for hand-assembling solver frames, payload
//! encoders that produce the exact bytes a producer would send, and an
//! [`EventScript`] builder for raw trace event streams.

#![forbid(unsafe_code)]
#![allow(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

pub mod fixtures;
pub mod payloads;
pub mod script;

pub use fixtures::{snapshot, FrameBuilder};
pub use script::EventScript;
