//! Type-tag to decoder mapping.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::decoders;
use crate::error::DecodeError;
use crate::state::ReconstructionState;

/// Turns a reassembled payload into side effects on the open frames.
///
/// Decoders hold no reference to the session; everything they touch is
/// reached through the `state` argument of each call.
pub trait PayloadDecoder: Send + Sync {
    /// Decode `data` and attach the result through `state`.
    fn decode(&self, data: &[u8], state: &mut ReconstructionState) -> Result<(), DecodeError>;
}

impl<F> PayloadDecoder for F
where
    F: Fn(&[u8], &mut ReconstructionState) -> Result<(), DecodeError> + Send + Sync,
{
    fn decode(&self, data: &[u8], state: &mut ReconstructionState) -> Result<(), DecodeError> {
        self(data, state)
    }
}

/// Decoders keyed by payload type tag.
///
/// Cloning is cheap; sessions take a clone of their provider's registry.
#[derive(Clone, Default)]
pub struct DecoderRegistry {
    decoders: HashMap<String, Arc<dyn PayloadDecoder>>,
}

impl DecoderRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding the built-in decoders.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register_builtins();
        registry
    }

    /// Register `decoder` for `tag`. Returns `false`, leaving the
    /// existing decoder in place, when the tag is taken.
    pub fn register(&mut self, tag: impl Into<String>, decoder: impl PayloadDecoder + 'static) -> bool {
        self.register_shared(tag, Arc::new(decoder))
    }

    /// Register an already shared decoder.
    pub fn register_shared(&mut self, tag: impl Into<String>, decoder: Arc<dyn PayloadDecoder>) -> bool {
        let tag = tag.into();
        if self.decoders.contains_key(&tag) {
            return false;
        }
        self.decoders.insert(tag, decoder);
        true
    }

    /// Register every built-in decoder not yet present. Returns how many
    /// were added; calling it again adds none.
    pub fn register_builtins(&mut self) -> usize {
        decoders::builtin()
            .into_iter()
            .filter(|(tag, decoder)| self.register_shared(*tag, Arc::clone(decoder)))
            .count()
    }

    /// Decoder for `tag`.
    pub fn get(&self, tag: &str) -> Option<Arc<dyn PayloadDecoder>> {
        self.decoders.get(tag).cloned()
    }

    /// Whether `tag` has a decoder.
    pub fn contains(&self, tag: &str) -> bool {
        self.decoders.contains_key(tag)
    }

    /// Number of registered decoders.
    pub fn len(&self) -> usize {
        self.decoders.len()
    }

    /// Whether no decoder is registered.
    pub fn is_empty(&self) -> bool {
        self.decoders.is_empty()
    }
}

impl fmt::Debug for DecoderRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut tags: Vec<&str> = self.decoders.keys().map(String::as_str).collect();
        tags.sort_unstable();
        f.debug_struct("DecoderRegistry").field("tags", &tags).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rewind_core::records::{TAG_ENTITY_BATCH, TAG_SESSION_HEADER};

    fn noop(_: &[u8], _: &mut ReconstructionState) -> Result<(), DecodeError> {
        Ok(())
    }

    #[test]
    fn builtins_register_once() {
        let mut registry = DecoderRegistry::new();
        assert_eq!(registry.register_builtins(), 6);
        assert_eq!(registry.register_builtins(), 0);
        assert_eq!(registry.len(), 6);
        assert!(registry.contains(TAG_SESSION_HEADER));
        assert!(registry.contains(TAG_ENTITY_BATCH));
    }

    #[test]
    fn register_refuses_taken_tag() {
        let mut registry = DecoderRegistry::with_builtins();
        assert!(!registry.register(TAG_ENTITY_BATCH, noop));
        assert!(registry.register("Cloth", noop));
        assert!(!registry.register("Cloth", noop));
        assert!(registry.get("Cloth").is_some());
        assert!(registry.get("Fluid").is_none());
    }

    #[test]
    fn closures_are_decoders() {
        let mut registry = DecoderRegistry::new();
        let tag = String::from("Counted");
        assert!(registry.register(tag, |data: &[u8], _: &mut ReconstructionState| {
            if data.is_empty() {
                Err(DecodeError::Rejected {
                    reason: "empty".into(),
                })
            } else {
                Ok(())
            }
        }));
        assert!(registry.contains("Counted"));
    }
}
