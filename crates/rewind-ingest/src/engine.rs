//! Reconstruction engine: turns typed events into committed frames.
//!
//! The engine owns everything private to one session. It takes the
//! recording's write lock only to commit: frame appends, solver names,
//! outer frames, feature flags. Stage bookkeeping, payload reassembly
//! and decoding all happen on private state.

use std::sync::Arc;

use rewind_core::{
    Cycle, EntityId, PayloadId, SolverFrame, SolverId, SourceSolverId, Stage, StageTransition,
    Transform,
};
use rewind_store::Recording;
use tracing::{debug, error, trace, warn};

use crate::config::IngestConfig;
use crate::error::{PayloadError, ReassemblyError};
use crate::event::{FrameStart, PayloadStart};
use crate::reassembly::PayloadReassembler;
use crate::registry::{DecoderRegistry, PayloadDecoder};
use crate::state::{ReconstructionState, StagePolicy};
use crate::stats::{DecodeStats, SessionSummary};
use crate::window::OuterFrameWindow;

/// Per-session reconstruction engine.
pub struct ReconstructionEngine {
    state: ReconstructionState,
    window: OuterFrameWindow,
    reassembler: PayloadReassembler,
    registry: DecoderRegistry,
    stats: DecodeStats,
    outer_frame_kind: i64,
}

impl ReconstructionEngine {
    /// An engine writing into `recording` with the given decoders.
    ///
    /// `config` is assumed valid. Outer frames already in `recording`
    /// count as committed, so none of this session's frames is trimmed
    /// as leading.
    pub fn new(recording: Arc<Recording>, registry: DecoderRegistry, config: &IngestConfig) -> Self {
        let prior_outer_frames = recording.outer_frame_count() > 0;
        Self {
            state: ReconstructionState::new(recording),
            window: OuterFrameWindow::new(
                config.outer_frame_queue_depth,
                config.trim_empty_outer_frames,
            )
            .with_prior_frames(prior_outer_frames),
            reassembler: PayloadReassembler::new(),
            registry,
            stats: DecodeStats::default(),
            outer_frame_kind: i64::from(config.outer_frame_kind),
        }
    }

    // ── Accessors ───────────────────────────────────────────────

    /// The recording being written.
    pub fn recording(&self) -> &Arc<Recording> {
        self.state.recording()
    }

    /// Open-state accessors, as decoders see them.
    pub fn state(&self) -> &ReconstructionState {
        &self.state
    }

    /// Mutable open-state accessors.
    pub fn state_mut(&mut self) -> &mut ReconstructionState {
        &mut self.state
    }

    /// Counters so far.
    pub fn stats(&self) -> &DecodeStats {
        &self.stats
    }

    pub(crate) fn stats_mut(&mut self) -> &mut DecodeStats {
        &mut self.stats
    }

    /// Outer frames not yet committed.
    pub fn window(&self) -> &OuterFrameWindow {
        &self.window
    }

    /// Payloads currently being reassembled.
    pub fn reassembler(&self) -> &PayloadReassembler {
        &self.reassembler
    }

    /// Decoders this session uses.
    pub fn registry(&self) -> &DecoderRegistry {
        &self.registry
    }

    /// Add a decoder for this session only. Returns `false` when the tag
    /// already has one.
    pub fn register_decoder(&mut self, tag: &str, decoder: Arc<dyn PayloadDecoder>) -> bool {
        self.registry.register_shared(tag, decoder)
    }

    /// Stable id of `source`, counting and tracing unmapped ids.
    pub fn resolve(&mut self, source: SourceSolverId) -> Option<SolverId> {
        let id = self.state.resolve(source);
        if id.is_none() {
            trace!(source = %source, "event for unmapped solver discarded");
            self.stats.unmapped_events += 1;
        }
        id
    }

    // ── Solver frames ───────────────────────────────────────────

    /// Open a new frame, committing the solver's previous one.
    ///
    /// Returns the stable id, or `None` when the event carries no
    /// solver id.
    pub fn start_frame(&mut self, start: FrameStart) -> Option<SolverId> {
        if start.solver.is_unset() {
            if self.state.tracked_solvers() > 0 {
                error!(
                    cycle = %start.cycle,
                    tracked = self.state.tracked_solvers(),
                    "solver frame start without a solver id"
                );
                self.stats.contract_violations += 1;
            } else {
                trace!(cycle = %start.cycle, "solver frame start without a solver id ignored");
            }
            return None;
        }

        let id = self.state.remap(start.solver);
        self.state.note_solver_cycle(start.cycle);

        let mut frame = SolverFrame::new(id, start.cycle, start.time);
        frame.debug_name = start.debug_name;
        frame.is_key_frame = start.is_key_frame;
        frame.is_resimulated = start.is_resimulated;
        frame.frame_number = start.frame_number;
        let previous = self.state.replace_open_frame(frame);

        let mut data = self.state.recording().write();
        if let Some(name) = self.state.open_frame(id).map(|f| f.debug_name.as_str()) {
            if !name.is_empty() {
                data.set_solver_name_assumes_locked(id, name);
            }
        }
        if let Some(mut prev) = previous {
            prev.close_open_stage();
            let number = data.add_solver_frame_assumes_locked(prev);
            trace!(solver = %id, number, "solver frame committed");
        }
        Some(id)
    }

    /// Record the end time of `id`'s open frame if it is the frame for
    /// `cycle`. End events are best effort.
    pub fn end_frame(&mut self, id: SolverId, cycle: Cycle, time: f64) -> bool {
        match self.state.open_frame_mut(id) {
            Some(frame) if frame.cycle == cycle => {
                frame.end_time = Some(time);
                true
            }
            Some(frame) => {
                trace!(solver = %id, open = %frame.cycle, ended = %cycle, "frame end for another tick");
                false
            }
            None => {
                trace!(solver = %id, "frame end without open frame");
                false
            }
        }
    }

    // ── Stages ──────────────────────────────────────────────────

    /// Open an explicit stage in `id`'s open frame.
    pub fn start_stage(&mut self, id: SolverId, name: &str) -> bool {
        let Some(frame) = self.state.open_frame_mut(id) else {
            trace!(solver = %id, stage = name, "stage start without open frame");
            return false;
        };
        match frame.push_stage(Stage::explicit(name)) {
            StageTransition::Clean | StageTransition::ClosedAutoGenerated => {}
            StageTransition::ForcedExplicitClose { name: previous } => {
                warn!(solver = %id, previous = %previous, next = name, "stage never ended; force-closed");
                self.stats.contract_violations += 1;
            }
        }
        true
    }

    /// Close the open stage of `id`'s open frame.
    pub fn end_stage(&mut self, id: SolverId, step_number: Option<i32>) -> bool {
        let closed = self
            .state
            .open_frame_mut(id)
            .is_some_and(SolverFrame::close_open_stage);
        if !closed {
            debug!(solver = %id, step_number, "stage end without open stage");
        }
        closed
    }

    /// The open stage of `id`. See [`ReconstructionState::get_or_create_open_stage`].
    pub fn get_or_create_open_stage(
        &mut self,
        id: SolverId,
        policy: StagePolicy,
    ) -> Option<&mut Stage> {
        self.state.get_or_create_open_stage(id, policy)
    }

    // ── Per-frame attributes ────────────────────────────────────

    /// Record that `entity` was destroyed, on the frame and on the open
    /// stage.
    pub fn add_destroyed_entity(&mut self, id: SolverId, entity: EntityId) -> bool {
        let Some(frame) = self.state.open_frame_mut(id) else {
            trace!(solver = %id, entity = %entity, "destroyed entity without open frame");
            return false;
        };
        frame.add_destroyed(entity);
        if let Some(stage) = self.state.get_or_create_open_stage(id, StagePolicy::CreateIfMissing) {
            stage.destroyed.insert(entity);
        }
        true
    }

    /// Set the simulation space of `id`'s open frame.
    pub fn set_simulation_space(&mut self, id: SolverId, transform: Transform) -> bool {
        match self.state.open_frame_mut(id) {
            Some(frame) => {
                frame.simulation_space = transform;
                true
            }
            None => {
                trace!(solver = %id, "simulation space without open frame");
                false
            }
        }
    }

    /// Set the network tick offset of `id`'s open frame.
    pub fn set_network_tick_offset(&mut self, id: SolverId, offset: i32) -> bool {
        match self.state.open_frame_mut(id) {
            Some(frame) => {
                frame.network_tick_offset = Some(offset);
                true
            }
            None => {
                trace!(solver = %id, offset, "tick offset without open frame");
                false
            }
        }
    }

    /// Record a producer feature flag on the recording.
    pub fn set_feature_flag(&mut self, name: &str, enabled: bool) {
        self.state
            .recording()
            .write()
            .set_feature_flag_assumes_locked(name, enabled);
    }

    // ── Outer frames ────────────────────────────────────────────

    /// Handle an outer tick start. Ticks of other kinds are ignored.
    pub fn start_outer_frame(&mut self, kind: i64, cycle: Cycle, time: f64) -> bool {
        if kind != self.outer_frame_kind {
            trace!(kind, cycle = %cycle, "outer frame of another kind ignored");
            return false;
        }
        let outcome = self.window.start(
            cycle,
            time,
            self.state.earliest_solver_cycle(),
            self.state.recording(),
        );
        self.stats.discarded_outer_frames += outcome.discarded as u64;
        true
    }

    /// Handle an outer tick end. Ticks of other kinds are ignored.
    pub fn end_outer_frame(&mut self, kind: i64, cycle: Cycle, time: f64) -> bool {
        if kind != self.outer_frame_kind {
            trace!(kind, cycle = %cycle, "outer frame of another kind ignored");
            return false;
        }
        let matched = self.window.end(cycle, time, self.state.recording());
        if !matched {
            trace!(cycle = %cycle, "outer frame end without a frame to close");
        }
        matched
    }

    // ── Payloads ────────────────────────────────────────────────

    /// Open a payload buffer.
    pub fn begin_payload(&mut self, start: PayloadStart) -> bool {
        match self.reassembler.begin(
            start.id,
            &start.type_tag,
            start.declared_size,
            start.original_size,
            start.compressed,
        ) {
            Ok(replaced) => {
                if replaced {
                    debug!(payload = %start.id, "payload restarted; previous buffer discarded");
                }
                true
            }
            Err(err) => {
                self.note_reassembly_error(&err, Some(&start.type_tag));
                false
            }
        }
    }

    /// Append a chunk to a payload buffer.
    pub fn append_payload(&mut self, id: PayloadId, data: &[u8]) -> bool {
        let tag = self.buffer_tag(id);
        match self.reassembler.append(id, data) {
            Ok(()) => true,
            Err(err) => {
                self.note_reassembly_error(&err, tag.as_deref());
                false
            }
        }
    }

    /// Complete a payload and decode it.
    pub fn finish_payload(&mut self, id: PayloadId) -> Result<(), PayloadError> {
        let tag = self.buffer_tag(id);
        if let Err(err) = self.reassembler.mark_ready(id) {
            self.note_reassembly_error(&err, tag.as_deref());
            return Err(err.into());
        }
        self.decode_payload(id)
    }

    /// Take a ready payload and hand it to its decoder.
    ///
    /// The buffer is consumed whatever the outcome; a second call for
    /// the same id fails with [`ReassemblyError::NotFound`].
    pub fn decode_payload(&mut self, id: PayloadId) -> Result<(), PayloadError> {
        let tag = self.buffer_tag(id);
        let ready = match self.reassembler.take_ready(id) {
            Ok(ready) => ready,
            Err(err) => {
                self.note_reassembly_error(&err, tag.as_deref());
                return Err(err.into());
            }
        };

        let Some(decoder) = self.registry.get(&ready.type_tag) else {
            if self.stats.missing_decoders.insert(ready.type_tag.clone()) {
                debug!(type_tag = %ready.type_tag, "no decoder registered; payloads of this type dropped");
            }
            return Err(PayloadError::MissingDecoder {
                tag: ready.type_tag,
            });
        };

        match decoder.decode(&ready.bytes, &mut self.state) {
            Ok(()) => {
                self.stats.record_decoded(&ready.type_tag, ready.bytes.len());
                Ok(())
            }
            Err(source) => {
                warn!(payload = %id, type_tag = %ready.type_tag, error = %source, "payload failed to decode");
                self.stats.failed_types.insert(ready.type_tag.clone());
                Err(PayloadError::Decode {
                    tag: ready.type_tag,
                    source,
                })
            }
        }
    }

    /// Abandon a payload. Unknown ids are fine.
    pub fn rollback_payload(&mut self, id: PayloadId) -> bool {
        let removed = self.reassembler.rollback(id);
        if removed {
            trace!(payload = %id, "payload rolled back");
        }
        removed
    }

    fn buffer_tag(&self, id: PayloadId) -> Option<String> {
        self.reassembler.get(id).map(|b| b.type_tag().to_owned())
    }

    fn note_reassembly_error(&mut self, err: &ReassemblyError, tag: Option<&str>) {
        match err {
            ReassemblyError::NotFound { .. } => {
                trace!(error = %err, "payload buffer not available");
                self.stats.missing_buffers += 1;
            }
            ReassemblyError::Decompress { .. } => {
                warn!(error = %err, "payload dropped");
                if let Some(tag) = tag {
                    self.stats.failed_types.insert(tag.to_owned());
                }
            }
            _ => {
                warn!(error = %err, "malformed payload dropped");
                self.stats.malformed_events += 1;
            }
        }
    }

    // ── Session end ─────────────────────────────────────────────

    /// Commit every open frame and settle every queued outer frame.
    ///
    /// Afterwards each solver needs a new frame start before more of its
    /// data is accepted.
    pub fn flush_pending(&mut self) {
        let frames = self.state.drain_open_frames();
        if !frames.is_empty() {
            let mut data = self.state.recording().write();
            for mut frame in frames {
                frame.close_open_stage();
                data.add_solver_frame_assumes_locked(frame);
            }
        }
        let outcome = self
            .window
            .flush(self.state.earliest_solver_cycle(), self.state.recording());
        self.stats.discarded_outer_frames += outcome.discarded as u64;
    }

    /// Summary of what the recording holds and what was decoded.
    pub fn summary(&self) -> SessionSummary {
        let recording = self.state.recording();
        let data = recording.read();
        let mut solvers = 0;
        let mut solver_frames = 0;
        for id in data.solver_ids() {
            let count = data.solver_frames(id).map_or(0, <[SolverFrame]>::len);
            if count > 0 {
                solvers += 1;
                solver_frames += count;
            }
        }
        SessionSummary {
            name: recording.name().to_owned(),
            solvers,
            solver_frames,
            outer_frames: data.outer_frames().len(),
            stats: self.stats.clone(),
        }
    }

    /// End the engine, discarding private state that was never
    /// committed.
    pub fn finish(self) -> SessionSummary {
        let open: Vec<SolverId> = self.state.open_solvers().collect();
        if !open.is_empty() || !self.window.is_empty() || !self.reassembler.is_empty() {
            debug!(
                open_frames = open.len(),
                queued_outer_frames = self.window.len(),
                payloads_in_flight = self.reassembler.len(),
                "discarding uncommitted session state"
            );
        }
        self.summary()
    }
}

impl std::fmt::Debug for ReconstructionEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReconstructionEngine")
            .field("recording", &self.state.recording().name())
            .field("tracked_solvers", &self.state.tracked_solvers())
            .field("queued_outer_frames", &self.window.len())
            .field("payloads_in_flight", &self.reassembler.len())
            .field("decoders", &self.registry.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine() -> ReconstructionEngine {
        ReconstructionEngine::new(
            Arc::new(Recording::with_defaults("engine")),
            DecoderRegistry::with_builtins(),
            &IngestConfig::default(),
        )
    }

    fn start(solver: i32, cycle: u64) -> FrameStart {
        FrameStart {
            solver: SourceSolverId(solver),
            cycle: Cycle(cycle),
            debug_name: format!("Solver{solver}"),
            is_key_frame: false,
            is_resimulated: false,
            frame_number: None,
            time: cycle as f64,
        }
    }

    #[test]
    fn start_commits_previous_frame() {
        let mut e = engine();
        let id = e.start_frame(start(1, 0)).unwrap();
        assert!(e.start_stage(id, "Integrate"));
        let id2 = e.start_frame(start(1, 1)).unwrap();
        assert_eq!(id, id2);

        let data = e.recording().read();
        let frames = data.solver_frames(id).unwrap();
        assert_eq!(frames.len(), 1);
        assert!(frames[0].open_stage().is_none());
        assert_eq!(data.solver_name(id), Some("Solver1"));
        drop(data);
        assert_eq!(e.state().open_frame(id).unwrap().cycle, Cycle(1));
    }

    #[test]
    fn unset_solver_is_violation_only_when_tracking() {
        let mut e = engine();
        assert!(e.start_frame(start(-1, 0)).is_none());
        assert_eq!(e.stats().contract_violations, 0);
        e.start_frame(start(0, 0));
        assert!(e.start_frame(start(-1, 1)).is_none());
        assert_eq!(e.stats().contract_violations, 1);
    }

    #[test]
    fn unended_explicit_stage_is_counted() {
        let mut e = engine();
        let id = e.start_frame(start(0, 0)).unwrap();
        e.start_stage(id, "A");
        e.start_stage(id, "B");
        assert_eq!(e.stats().contract_violations, 1);
        assert!(e.end_stage(id, Some(2)));
        assert!(!e.end_stage(id, Some(2)));
    }

    #[test]
    fn destroyed_outside_stage_creates_in_between() {
        let mut e = engine();
        let id = e.start_frame(start(0, 0)).unwrap();
        assert!(e.add_destroyed_entity(id, EntityId(9)));
        let frame = e.state().open_frame(id).unwrap();
        assert!(frame.destroyed.contains(&EntityId(9)));
        assert_eq!(frame.stages[0].name, Stage::IN_BETWEEN);
        assert!(frame.stages[0].destroyed.contains(&EntityId(9)));
    }

    #[test]
    fn end_frame_matches_cycle() {
        let mut e = engine();
        let id = e.start_frame(start(0, 4)).unwrap();
        assert!(!e.end_frame(id, Cycle(3), 9.0));
        assert!(e.end_frame(id, Cycle(4), 9.0));
        assert_eq!(e.state().open_frame(id).unwrap().end_time, Some(9.0));
    }

    #[test]
    fn other_outer_kinds_ignored() {
        let mut e = engine();
        assert!(!e.start_outer_frame(5, Cycle(0), 0.0));
        assert!(e.window().is_empty());
        assert!(e.start_outer_frame(0, Cycle(0), 0.0));
        assert_eq!(e.window().len(), 1);
    }

    #[test]
    fn flush_commits_open_frames() {
        let mut e = engine();
        let id = e.start_frame(start(0, 0)).unwrap();
        e.start_outer_frame(0, Cycle(0), 0.0);
        e.flush_pending();
        assert_eq!(e.recording().solver_frame_count(id), 1);
        assert_eq!(e.recording().outer_frame_count(), 1);
        assert!(!e.state().has_open_frames());
        let summary = e.finish();
        assert_eq!(summary.solvers, 1);
        assert_eq!(summary.solver_frames, 1);
        assert_eq!(summary.outer_frames, 1);
    }

    #[test]
    fn feature_flags_reach_recording() {
        let mut e = engine();
        e.set_feature_flag("Contacts", true);
        assert_eq!(e.recording().read().feature_flag("Contacts"), Some(true));
    }
}
