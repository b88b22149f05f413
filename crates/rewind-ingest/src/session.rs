//! Trace provider: owns the decoder registry and at most one session.

use std::sync::Arc;

use rewind_core::RawEvent;
use rewind_store::{Recording, RecordingReader};
use tracing::{debug, info, trace};

use crate::config::{ConfigError, IngestConfig};
use crate::engine::ReconstructionEngine;
use crate::error::IngestError;
use crate::registry::{DecoderRegistry, PayloadDecoder};
use crate::router::EventRouter;
use crate::stats::{DecodeStats, SessionSummary};

/// Entry point for a trace stream.
///
/// Built-in decoders are registered once on construction. Each session
/// gets its own engine and a snapshot of the registry; decoders
/// registered later are added to the running session too.
pub struct TraceProvider {
    config: IngestConfig,
    registry: DecoderRegistry,
    router: EventRouter,
    session: Option<ReconstructionEngine>,
}

// Compile-time assertion: the provider moves onto the ingest thread.
const _: fn() = || {
    fn assert<T: Send>() {}
    assert::<TraceProvider>();
};

impl TraceProvider {
    /// A provider with `config`, which is validated first.
    pub fn new(config: IngestConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let registry = DecoderRegistry::with_builtins();
        debug!(decoders = registry.len(), "trace provider ready");
        Ok(Self {
            config,
            registry,
            router: EventRouter::new(),
            session: None,
        })
    }

    /// The provider's configuration.
    pub fn config(&self) -> &IngestConfig {
        &self.config
    }

    /// Decoders new sessions start with.
    pub fn registry(&self) -> &DecoderRegistry {
        &self.registry
    }

    /// Register a decoder for `tag`. Returns `false` when the tag already
    /// has one.
    pub fn register_decoder(
        &mut self,
        tag: impl Into<String>,
        decoder: impl PayloadDecoder + 'static,
    ) -> bool {
        let tag = tag.into();
        let shared: Arc<dyn PayloadDecoder> = Arc::new(decoder);
        let added = self.registry.register_shared(tag.clone(), Arc::clone(&shared));
        if added {
            if let Some(engine) = self.session.as_mut() {
                engine.register_decoder(&tag, shared);
            }
        }
        added
    }

    /// Start a session writing into a fresh recording named `name`.
    ///
    /// Any running session is ended first.
    pub fn create_session(&mut self, name: &str) -> Result<RecordingReader, IngestError> {
        let recording = Recording::new(name, self.config.store.clone()).map_err(ConfigError::from)?;
        Ok(self.attach_external_recording(Arc::new(recording)))
    }

    /// Start a session writing into an existing recording.
    ///
    /// Used to merge several streams into one recording; solver ids are
    /// remapped so sessions never collide.
    pub fn attach_external_recording(&mut self, recording: Arc<Recording>) -> RecordingReader {
        self.end_session();
        recording.set_live(true);
        info!(recording = recording.name(), "session started");
        self.session = Some(ReconstructionEngine::new(
            Arc::clone(&recording),
            self.registry.clone(),
            &self.config,
        ));
        RecordingReader::new(recording)
    }

    /// Feed one raw event. Returns whether it was routed.
    pub fn on_event(&mut self, raw: RawEvent) -> bool {
        let Some(engine) = self.session.as_mut() else {
            trace!(name = %raw.name, "event without an active session");
            return false;
        };
        engine.stats_mut().events += 1;
        let routed = self.router.route(engine, raw);
        if !routed {
            engine.stats_mut().unrouted_events += 1;
        }
        routed
    }

    /// Commit everything the running session holds back.
    pub fn flush_pending(&mut self) {
        if let Some(engine) = self.session.as_mut() {
            engine.flush_pending();
        }
    }

    /// End the running session.
    ///
    /// Open frames, queued outer frames and in-flight payloads are
    /// discarded; the recording keeps what was committed.
    pub fn end_session(&mut self) -> Option<SessionSummary> {
        let engine = self.session.take()?;
        let recording = Arc::clone(engine.recording());
        let summary = engine.finish();
        recording.set_live(false);
        info!("{summary}");
        Some(summary)
    }

    /// Whether a session is running.
    pub fn has_session(&self) -> bool {
        self.session.is_some()
    }

    /// Reader for the running session's recording.
    pub fn recording(&self) -> Option<RecordingReader> {
        self.session
            .as_ref()
            .map(|e| RecordingReader::new(Arc::clone(e.recording())))
    }

    /// The running session's engine.
    pub fn engine(&self) -> Option<&ReconstructionEngine> {
        self.session.as_ref()
    }

    /// Mutable access to the running session's engine.
    pub fn engine_mut(&mut self) -> Option<&mut ReconstructionEngine> {
        self.session.as_mut()
    }

    /// Counters of the running session.
    pub fn stats(&self) -> Option<&DecodeStats> {
        self.session.as_ref().map(ReconstructionEngine::stats)
    }
}

impl std::fmt::Debug for TraceProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TraceProvider")
            .field("config", &self.config)
            .field("registry", &self.registry)
            .field("session", &self.session)
            .finish()
    }
}

impl Drop for TraceProvider {
    fn drop(&mut self) {
        self.end_session();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DecodeError;
    use crate::state::ReconstructionState;

    fn noop(_: &[u8], _: &mut ReconstructionState) -> Result<(), DecodeError> {
        Ok(())
    }

    #[test]
    fn invalid_config_rejected() {
        let config = IngestConfig {
            outer_frame_queue_depth: 0,
            ..IngestConfig::default()
        };
        assert_eq!(
            TraceProvider::new(config).err(),
            Some(ConfigError::ZeroQueueDepth)
        );
    }

    #[test]
    fn session_lifecycle_toggles_live() {
        let mut provider = TraceProvider::new(IngestConfig::default()).unwrap();
        assert!(provider.end_session().is_none());
        let reader = provider.create_session("live").unwrap();
        assert!(reader.is_live());
        assert!(provider.has_session());
        let summary = provider.end_session().unwrap();
        assert_eq!(summary.name, "live");
        assert!(!reader.is_live());
        assert!(!provider.on_event(RawEvent::new("PhysicsTrace", "StageEnd", 0.0)));
    }

    #[test]
    fn new_session_ends_previous() {
        let mut provider = TraceProvider::new(IngestConfig::default()).unwrap();
        let first = provider.create_session("a").unwrap();
        let second = provider.create_session("b").unwrap();
        assert!(!first.is_live());
        assert!(second.is_live());
    }

    #[test]
    fn decoders_registered_mid_session_apply() {
        let mut provider = TraceProvider::new(IngestConfig::default()).unwrap();
        provider.create_session("s").unwrap();
        assert!(provider.register_decoder("Cloth", noop));
        assert!(!provider.register_decoder("Cloth", noop));
        assert!(provider.registry().contains("Cloth"));
        assert!(provider.engine().unwrap().registry().contains("Cloth"));

        provider.create_session("t").unwrap();
        assert!(provider.engine().unwrap().registry().contains("Cloth"));
    }

    #[test]
    fn unrouted_events_counted() {
        let mut provider = TraceProvider::new(IngestConfig::default()).unwrap();
        provider.create_session("s").unwrap();
        assert!(!provider.on_event(RawEvent::new("Audio", "Play", 0.0)));
        let stats = provider.stats().unwrap();
        assert_eq!(stats.events, 1);
        assert_eq!(stats.unrouted_events, 1);
    }
}
