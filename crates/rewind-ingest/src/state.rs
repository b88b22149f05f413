//! Producer-private reconstruction state and the accessors decoders use.

use std::collections::HashMap;
use std::sync::Arc;

use rewind_core::{
    Cycle, SessionHeader, SolverFrame, SolverId, SourceSolverId, Stage, WireVersion,
};
use rewind_store::Recording;
use tracing::{trace, warn};

use crate::remap::IdRemapper;

/// What [`ReconstructionState::get_or_create_open_stage`] may do when
/// the open frame has no open stage.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StagePolicy {
    /// Return `None`.
    ExistingOnly,
    /// Open an auto-generated in-between stage.
    CreateIfMissing,
}

/// Open frames, id mapping and header for one session.
///
/// Decoders receive `&mut ReconstructionState` and attach their results
/// through it. Nothing here takes the recording lock except
/// [`remap`](Self::remap) and the commit helpers the engine uses.
#[derive(Debug)]
pub struct ReconstructionState {
    recording: Arc<Recording>,
    open_frames: HashMap<SolverId, SolverFrame>,
    remapper: IdRemapper,
    header: Option<SessionHeader>,
    warned_missing_header: bool,
    earliest_solver_cycle: Option<Cycle>,
}

impl ReconstructionState {
    /// Fresh state writing into `recording`.
    pub fn new(recording: Arc<Recording>) -> Self {
        Self {
            recording,
            open_frames: HashMap::new(),
            remapper: IdRemapper::new(),
            header: None,
            warned_missing_header: false,
            earliest_solver_cycle: None,
        }
    }

    /// The recording being written.
    pub fn recording(&self) -> &Arc<Recording> {
        &self.recording
    }

    // ── Identifiers ─────────────────────────────────────────────

    /// Stable id for `source`, claiming one on first sight.
    pub fn remap(&mut self, source: SourceSolverId) -> SolverId {
        self.remapper.remap(source, &self.recording)
    }

    /// Stable id for `source`, or `None` when the solver is untracked.
    pub fn resolve(&self, source: SourceSolverId) -> Option<SolverId> {
        self.remapper.resolve(source)
    }

    /// Number of solvers mapped in this session.
    pub fn tracked_solvers(&self) -> usize {
        self.remapper.len()
    }

    // ── Header ──────────────────────────────────────────────────

    /// The session header, once decoded.
    pub fn header(&self) -> Option<&SessionHeader> {
        self.header.as_ref()
    }

    /// Install the session header.
    pub fn set_header(&mut self, header: SessionHeader) {
        self.header = Some(header);
    }

    /// Wire version for decoding a `type_tag` payload.
    ///
    /// Without a header the current version is assumed and a
    /// compatibility warning is logged once per session.
    pub fn wire_version(&mut self, type_tag: &str) -> WireVersion {
        match &self.header {
            Some(h) => h.version,
            None => {
                if !self.warned_missing_header {
                    self.warned_missing_header = true;
                    warn!(
                        type_tag,
                        "payload decoded before the session header; assuming wire version {}",
                        WireVersion::CURRENT.0
                    );
                }
                SessionHeader::default().version
            }
        }
    }

    // ── Open frames ─────────────────────────────────────────────

    /// The open frame of `id`.
    pub fn open_frame(&self, id: SolverId) -> Option<&SolverFrame> {
        self.open_frames.get(&id)
    }

    /// Mutable access to the open frame of `id`.
    pub fn open_frame_mut(&mut self, id: SolverId) -> Option<&mut SolverFrame> {
        self.open_frames.get_mut(&id)
    }

    /// Open frame for a source id referenced inside a payload.
    ///
    /// Returns `None`, tracing why, when the solver is unmapped or has
    /// no open frame yet.
    pub fn open_frame_for_source(&mut self, source: SourceSolverId) -> Option<&mut SolverFrame> {
        let Some(id) = self.resolve(source) else {
            trace!(source = %source, "data for unmapped solver discarded");
            return None;
        };
        let frame = self.open_frames.get_mut(&id);
        if frame.is_none() {
            trace!(solver = %id, "no open frame; data discarded");
        }
        frame
    }

    /// The open stage of `id`'s open frame.
    ///
    /// With [`StagePolicy::CreateIfMissing`] an auto-generated stage is
    /// opened when none is. Returns `None` when `id` has no open frame.
    pub fn get_or_create_open_stage(
        &mut self,
        id: SolverId,
        policy: StagePolicy,
    ) -> Option<&mut Stage> {
        let frame = self.open_frames.get_mut(&id)?;
        if frame.open_stage().is_none() {
            if policy == StagePolicy::ExistingOnly {
                return None;
            }
            frame.push_stage(Stage::auto_generated(Stage::IN_BETWEEN));
        }
        frame.open_stage_mut()
    }

    /// Open stage for a source id referenced inside a payload, creating
    /// an in-between stage when needed.
    pub fn stage_for_source(&mut self, source: SourceSolverId) -> Option<&mut Stage> {
        let Some(id) = self.resolve(source) else {
            trace!(source = %source, "data for unmapped solver discarded");
            return None;
        };
        let stage = self.get_or_create_open_stage(id, StagePolicy::CreateIfMissing);
        if stage.is_none() {
            trace!(solver = %id, "no open frame; data discarded");
        }
        stage
    }

    /// Whether any solver currently has an open frame.
    pub fn has_open_frames(&self) -> bool {
        !self.open_frames.is_empty()
    }

    /// Solvers with an open frame.
    pub fn open_solvers(&self) -> impl Iterator<Item = SolverId> + '_ {
        self.open_frames.keys().copied()
    }

    /// Earliest cycle at which any solver frame started this session.
    pub fn earliest_solver_cycle(&self) -> Option<Cycle> {
        self.earliest_solver_cycle
    }

    pub(crate) fn note_solver_cycle(&mut self, cycle: Cycle) {
        self.earliest_solver_cycle = Some(match self.earliest_solver_cycle {
            Some(c) => c.min(cycle),
            None => cycle,
        });
    }

    pub(crate) fn replace_open_frame(&mut self, frame: SolverFrame) -> Option<SolverFrame> {
        self.open_frames.insert(frame.solver_id, frame)
    }

    pub(crate) fn drain_open_frames(&mut self) -> Vec<SolverFrame> {
        let mut frames: Vec<SolverFrame> = self.open_frames.drain().map(|(_, f)| f).collect();
        frames.sort_by_key(|f| f.solver_id);
        frames
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state_with_open_frame() -> (ReconstructionState, SolverId) {
        let mut state = ReconstructionState::new(Arc::new(Recording::with_defaults("state")));
        let id = state.remap(SourceSolverId(2));
        state.replace_open_frame(SolverFrame::new(id, Cycle(0), 0.0));
        (state, id)
    }

    #[test]
    fn existing_only_does_not_create() {
        let (mut state, id) = state_with_open_frame();
        assert!(state
            .get_or_create_open_stage(id, StagePolicy::ExistingOnly)
            .is_none());
        let stage = state
            .get_or_create_open_stage(id, StagePolicy::CreateIfMissing)
            .unwrap();
        assert!(stage.is_auto_generated());
        assert_eq!(stage.name, Stage::IN_BETWEEN);
        assert!(state
            .get_or_create_open_stage(id, StagePolicy::ExistingOnly)
            .is_some());
        assert_eq!(state.open_frame(id).unwrap().stages.len(), 1);
    }

    #[test]
    fn no_open_frame_means_no_stage() {
        let mut state = ReconstructionState::new(Arc::new(Recording::with_defaults("state")));
        assert!(state
            .get_or_create_open_stage(SolverId(0), StagePolicy::CreateIfMissing)
            .is_none());
        assert!(state.stage_for_source(SourceSolverId(0)).is_none());
    }

    #[test]
    fn fallback_version_without_header() {
        let (mut state, _) = state_with_open_frame();
        assert_eq!(state.wire_version("EntityBatch"), WireVersion::CURRENT);
        state.set_header(SessionHeader {
            version: WireVersion(1),
            producer: String::new(),
        });
        assert_eq!(state.wire_version("EntityBatch"), WireVersion(1));
    }

    #[test]
    fn earliest_cycle_tracks_minimum() {
        let (mut state, _) = state_with_open_frame();
        assert_eq!(state.earliest_solver_cycle(), None);
        state.note_solver_cycle(Cycle(9));
        state.note_solver_cycle(Cycle(4));
        state.note_solver_cycle(Cycle(6));
        assert_eq!(state.earliest_solver_cycle(), Some(Cycle(4)));
    }
}
