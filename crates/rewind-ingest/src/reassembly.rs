//! Chunked binary payload reassembly.
//!
//! A payload lives between its start and end events (or a rollback).
//! Buffers move `Open` → `Ready` → consumed; consumption always removes
//! the buffer, so each payload gets at most one decode attempt.

use std::collections::HashMap;

use rewind_core::PayloadId;

use crate::error::ReassemblyError;

/// Largest payload accepted, compressed or not.
pub const MAX_PAYLOAD_SIZE: usize = 256 * 1024 * 1024;

/// Largest capacity reserved up front on `begin`.
const MAX_RESERVE: usize = 1024 * 1024;

/// Lifecycle state of a [`PayloadBuffer`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PayloadState {
    /// Accepting content.
    Open,
    /// End seen; waiting to be taken.
    Ready,
}

/// A payload under reassembly.
#[derive(Clone, Debug)]
pub struct PayloadBuffer {
    type_tag: String,
    declared_size: usize,
    original_size: usize,
    compressed: bool,
    bytes: Vec<u8>,
    state: PayloadState,
}

impl PayloadBuffer {
    /// Type tag selecting the decoder.
    pub fn type_tag(&self) -> &str {
        &self.type_tag
    }

    /// Bytes accumulated so far.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Whether no bytes have arrived yet.
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Current state.
    pub fn state(&self) -> PayloadState {
        self.state
    }
}

/// A completed, decompressed payload.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReadyPayload {
    /// Payload id.
    pub id: PayloadId,
    /// Type tag selecting the decoder.
    pub type_tag: String,
    /// Uncompressed bytes.
    pub bytes: Vec<u8>,
}

/// Producer-private set of in-flight payloads.
#[derive(Debug, Default)]
pub struct PayloadReassembler {
    buffers: HashMap<PayloadId, PayloadBuffer>,
}

impl PayloadReassembler {
    /// An empty reassembler.
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a buffer for `id`.
    ///
    /// `declared_size` is the size on the wire; `original_size` the size
    /// after decompression (equal to `declared_size` when uncompressed).
    /// A buffer already open under `id` is replaced; returns `true` when
    /// that happened.
    pub fn begin(
        &mut self,
        id: PayloadId,
        type_tag: &str,
        declared_size: usize,
        original_size: usize,
        compressed: bool,
    ) -> Result<bool, ReassemblyError> {
        let largest = declared_size.max(original_size);
        if largest > MAX_PAYLOAD_SIZE {
            self.buffers.remove(&id);
            return Err(ReassemblyError::TooLarge {
                id,
                size: largest,
                limit: MAX_PAYLOAD_SIZE,
            });
        }
        let buffer = PayloadBuffer {
            type_tag: type_tag.to_owned(),
            declared_size,
            original_size: if compressed { original_size } else { declared_size },
            compressed,
            bytes: Vec::with_capacity(declared_size.min(MAX_RESERVE)),
            state: PayloadState::Open,
        };
        Ok(self.buffers.insert(id, buffer).is_some())
    }

    /// Append a chunk to an open buffer.
    ///
    /// Growing past the declared size drops the buffer.
    pub fn append(&mut self, id: PayloadId, chunk: &[u8]) -> Result<(), ReassemblyError> {
        let buffer = self
            .buffers
            .get_mut(&id)
            .ok_or(ReassemblyError::NotFound { id })?;
        if buffer.state != PayloadState::Open {
            return Err(ReassemblyError::NotOpen { id });
        }
        let attempted = buffer.bytes.len() + chunk.len();
        if attempted > buffer.declared_size {
            let declared = buffer.declared_size;
            self.buffers.remove(&id);
            return Err(ReassemblyError::Overflow {
                id,
                declared,
                attempted,
            });
        }
        buffer.bytes.extend_from_slice(chunk);
        Ok(())
    }

    /// Mark a buffer complete.
    ///
    /// A buffer that ends short of its declared size is dropped.
    pub fn mark_ready(&mut self, id: PayloadId) -> Result<(), ReassemblyError> {
        let buffer = self
            .buffers
            .get_mut(&id)
            .ok_or(ReassemblyError::NotFound { id })?;
        if buffer.bytes.len() != buffer.declared_size {
            let (expected, actual) = (buffer.declared_size, buffer.bytes.len());
            self.buffers.remove(&id);
            return Err(ReassemblyError::SizeMismatch {
                id,
                expected,
                actual,
            });
        }
        buffer.state = PayloadState::Ready;
        Ok(())
    }

    /// Remove a buffer and return its uncompressed bytes.
    ///
    /// The buffer is removed whatever the outcome.
    pub fn take_ready(&mut self, id: PayloadId) -> Result<ReadyPayload, ReassemblyError> {
        let buffer = self
            .buffers
            .remove(&id)
            .ok_or(ReassemblyError::NotFound { id })?;
        if buffer.state != PayloadState::Ready {
            return Err(ReassemblyError::NotReady { id });
        }
        let bytes = if buffer.compressed {
            let out = lz4_flex::block::decompress(&buffer.bytes, buffer.original_size).map_err(
                |e| ReassemblyError::Decompress {
                    id,
                    reason: e.to_string(),
                },
            )?;
            if out.len() != buffer.original_size {
                return Err(ReassemblyError::SizeMismatch {
                    id,
                    expected: buffer.original_size,
                    actual: out.len(),
                });
            }
            out
        } else {
            buffer.bytes
        };
        Ok(ReadyPayload {
            id,
            type_tag: buffer.type_tag,
            bytes,
        })
    }

    /// Discard a buffer in any state. Unknown ids are fine.
    ///
    /// Returns whether a buffer was removed.
    pub fn rollback(&mut self, id: PayloadId) -> bool {
        self.buffers.remove(&id).is_some()
    }

    /// Look at an in-flight buffer.
    pub fn get(&self, id: PayloadId) -> Option<&PayloadBuffer> {
        self.buffers.get(&id)
    }

    /// Number of in-flight buffers.
    pub fn len(&self) -> usize {
        self.buffers.len()
    }

    /// Whether nothing is in flight.
    pub fn is_empty(&self) -> bool {
        self.buffers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const ID: PayloadId = PayloadId(7);

    #[test]
    fn uncompressed_roundtrip() {
        let mut r = PayloadReassembler::new();
        assert!(!r.begin(ID, "Blob", 6, 6, false).unwrap());
        r.append(ID, b"abc").unwrap();
        r.append(ID, b"def").unwrap();
        r.mark_ready(ID).unwrap();
        let ready = r.take_ready(ID).unwrap();
        assert_eq!(ready.bytes, b"abcdef");
        assert_eq!(ready.type_tag, "Blob");
        assert!(r.is_empty());
    }

    #[test]
    fn compressed_roundtrip() {
        let original: Vec<u8> = (0..4096u32).map(|i| (i % 17) as u8).collect();
        let packed = lz4_flex::block::compress(&original);
        let mut r = PayloadReassembler::new();
        r.begin(ID, "Blob", packed.len(), original.len(), true).unwrap();
        r.append(ID, &packed).unwrap();
        r.mark_ready(ID).unwrap();
        assert_eq!(r.take_ready(ID).unwrap().bytes, original);
    }

    #[test]
    fn corrupt_compressed_payload_is_dropped() {
        let mut r = PayloadReassembler::new();
        r.begin(ID, "Blob", 4, 64, true).unwrap();
        r.append(ID, &[0xff, 0xff, 0xff, 0xff]).unwrap();
        r.mark_ready(ID).unwrap();
        assert!(r.take_ready(ID).is_err());
        assert_eq!(r.take_ready(ID), Err(ReassemblyError::NotFound { id: ID }));
    }

    #[test]
    fn overflow_drops_buffer() {
        let mut r = PayloadReassembler::new();
        r.begin(ID, "Blob", 4, 4, false).unwrap();
        r.append(ID, b"abc").unwrap();
        let err = r.append(ID, b"de").unwrap_err();
        assert_eq!(
            err,
            ReassemblyError::Overflow {
                id: ID,
                declared: 4,
                attempted: 5
            }
        );
        assert!(r.get(ID).is_none());
    }

    #[test]
    fn short_payload_is_dropped_on_ready() {
        let mut r = PayloadReassembler::new();
        r.begin(ID, "Blob", 4, 4, false).unwrap();
        r.append(ID, b"ab").unwrap();
        assert!(matches!(
            r.mark_ready(ID),
            Err(ReassemblyError::SizeMismatch {
                expected: 4,
                actual: 2,
                ..
            })
        ));
        assert!(r.is_empty());
    }

    #[test]
    fn take_before_end_consumes() {
        let mut r = PayloadReassembler::new();
        r.begin(ID, "Blob", 1, 1, false).unwrap();
        assert_eq!(r.take_ready(ID), Err(ReassemblyError::NotReady { id: ID }));
        assert!(r.is_empty());
    }

    #[test]
    fn content_after_ready_rejected() {
        let mut r = PayloadReassembler::new();
        r.begin(ID, "Blob", 0, 0, false).unwrap();
        r.mark_ready(ID).unwrap();
        assert_eq!(r.append(ID, b""), Err(ReassemblyError::NotOpen { id: ID }));
        assert_eq!(r.get(ID).map(PayloadBuffer::state), Some(PayloadState::Ready));
    }

    #[test]
    fn rollback_is_idempotent() {
        let mut r = PayloadReassembler::new();
        assert!(!r.rollback(ID));
        r.begin(ID, "Blob", 2, 2, false).unwrap();
        assert!(r.rollback(ID));
        assert!(!r.rollback(ID));
        assert_eq!(r.append(ID, b"x"), Err(ReassemblyError::NotFound { id: ID }));
    }

    #[test]
    fn begin_twice_replaces() {
        let mut r = PayloadReassembler::new();
        r.begin(ID, "Old", 2, 2, false).unwrap();
        r.append(ID, b"x").unwrap();
        assert!(r.begin(ID, "New", 2, 2, false).unwrap());
        assert_eq!(r.get(ID).unwrap().type_tag(), "New");
        assert!(r.get(ID).unwrap().is_empty());
    }

    #[test]
    fn oversized_declaration_rejected() {
        let mut r = PayloadReassembler::new();
        assert!(matches!(
            r.begin(ID, "Blob", MAX_PAYLOAD_SIZE + 1, 0, false),
            Err(ReassemblyError::TooLarge { .. })
        ));
        assert!(r.is_empty());
    }

    proptest! {
        #[test]
        fn any_split_point_roundtrips(
            bytes in prop::collection::vec(any::<u8>(), 0..512),
            split in any::<prop::sample::Index>(),
        ) {
            let k = split.index(bytes.len() + 1);
            let mut r = PayloadReassembler::new();
            r.begin(ID, "Blob", bytes.len(), bytes.len(), false).unwrap();
            r.append(ID, &bytes[..k]).unwrap();
            r.append(ID, &bytes[k..]).unwrap();
            r.mark_ready(ID).unwrap();
            prop_assert_eq!(r.take_ready(ID).unwrap().bytes, bytes);
        }
    }
}
