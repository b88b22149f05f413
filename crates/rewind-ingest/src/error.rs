//! Ingest error types.
//!
//! None of these are fatal to a session: each one means a single data
//! point is missing from the reconstructed timeline.

use std::io;

use rewind_core::{PayloadId, WireError};
use thiserror::Error;

use crate::config::ConfigError;

/// Errors from the binary payload reassembler.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum ReassemblyError {
    /// No buffer with this id. Expected when the payload started before
    /// this session attached.
    #[error("payload {id} not found")]
    NotFound {
        /// Payload id.
        id: PayloadId,
    },
    /// The declared size exceeds the reassembler's limit.
    #[error("payload {id} declares {size} bytes, above the {limit} byte limit")]
    TooLarge {
        /// Payload id.
        id: PayloadId,
        /// Declared or original size.
        size: usize,
        /// Configured limit.
        limit: usize,
    },
    /// Content arrived after the payload was marked ready.
    #[error("payload {id} is no longer accepting content")]
    NotOpen {
        /// Payload id.
        id: PayloadId,
    },
    /// The payload was taken before its end event.
    #[error("payload {id} is not ready")]
    NotReady {
        /// Payload id.
        id: PayloadId,
    },
    /// Content would grow the buffer past its declared size.
    #[error("payload {id} overflow: declared {declared} bytes, got {attempted}")]
    Overflow {
        /// Payload id.
        id: PayloadId,
        /// Declared size.
        declared: usize,
        /// Size after the rejected append.
        attempted: usize,
    },
    /// The buffer ended at a different size than declared.
    #[error("payload {id} size mismatch: expected {expected} bytes, got {actual}")]
    SizeMismatch {
        /// Payload id.
        id: PayloadId,
        /// Declared (or original, after decompression) size.
        expected: usize,
        /// Actual size.
        actual: usize,
    },
    /// LZ4 decompression failed.
    #[error("payload {id} failed to decompress: {reason}")]
    Decompress {
        /// Payload id.
        id: PayloadId,
        /// Decompressor message.
        reason: String,
    },
}

/// Errors returned by a [`PayloadDecoder`](crate::PayloadDecoder).
#[derive(Debug, Error)]
pub enum DecodeError {
    /// The bytes did not parse.
    #[error(transparent)]
    Wire(#[from] WireError),
    /// The record parsed but its contents were rejected.
    #[error("rejected: {reason}")]
    Rejected {
        /// Why the record was rejected.
        reason: String,
    },
}

/// Outcome of handing a completed payload to its decoder.
#[derive(Debug, Error)]
pub enum PayloadError {
    /// The buffer could not be produced.
    #[error(transparent)]
    Reassembly(#[from] ReassemblyError),
    /// No decoder is registered for the type tag.
    #[error("no decoder registered for {tag:?}")]
    MissingDecoder {
        /// The payload's type tag.
        tag: String,
    },
    /// The decoder failed.
    #[error("failed to decode {tag:?}: {source}")]
    Decode {
        /// The payload's type tag.
        tag: String,
        /// Decoder error.
        #[source]
        source: DecodeError,
    },
}

/// Errors from sessions and the ingest thread.
#[derive(Debug, Error)]
pub enum IngestError {
    /// The configuration failed validation.
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// The ingest thread has stopped.
    #[error("ingest thread disconnected")]
    Disconnected,
    /// The event channel is full.
    #[error("ingest channel full")]
    ChannelFull,
    /// The ingest thread could not be spawned.
    #[error("failed to spawn ingest thread: {0}")]
    Spawn(#[source] io::Error),
    /// The ingest thread panicked.
    #[error("ingest thread panicked")]
    ThreadPanicked,
    /// The ingest thread finished without an active session.
    #[error("no active session")]
    NoSession,
}
