//! Read-only recording handles for playback and inspection.

use std::sync::Arc;

use parking_lot::RwLockReadGuard;
use rewind_core::{Cycle, SolverFrame, SolverId};

use crate::error::StoreError;
use crate::recording::{Recording, RecordingData};

/// A clonable, read-only handle to a [`Recording`].
///
/// Handles outlive the session that filled the recording: once the
/// session ends no further writes happen, and everything committed so
/// far stays readable.
#[derive(Clone, Debug)]
pub struct RecordingReader {
    recording: Arc<Recording>,
}

impl RecordingReader {
    /// Wrap a shared recording.
    pub fn new(recording: Arc<Recording>) -> Self {
        Self { recording }
    }

    /// Recording name.
    pub fn name(&self) -> &str {
        self.recording.name()
    }

    /// Take the shared lock for a batch of queries.
    pub fn read(&self) -> RwLockReadGuard<'_, RecordingData> {
        self.recording.read()
    }

    /// See [`Recording::generation`].
    pub fn generation(&self) -> u64 {
        self.recording.generation()
    }

    /// Whether a session is still writing.
    pub fn is_live(&self) -> bool {
        self.recording.is_live()
    }

    /// Full state of `solver` at frame `number`.
    pub fn collapsed_frame_at(
        &self,
        solver: SolverId,
        number: usize,
    ) -> Result<SolverFrame, StoreError> {
        self.recording.collapsed_frame_at(solver, number)
    }

    /// Frame of `solver` current at `cycle`.
    pub fn frame_number_at_cycle(&self, solver: SolverId, cycle: Cycle) -> Option<usize> {
        self.recording.frame_number_at_cycle(solver, cycle)
    }

    /// Frame of `solver` current at `time`.
    pub fn frame_number_at_time(&self, solver: SolverId, time: f64) -> Option<usize> {
        self.recording.frame_number_at_time(solver, time)
    }

    /// Outer frame current at `cycle`.
    pub fn outer_frame_number_at_cycle(&self, cycle: Cycle) -> Option<usize> {
        self.recording.outer_frame_number_at_cycle(cycle)
    }

    /// Outer frame current at `time`.
    pub fn outer_frame_number_at_time(&self, time: f64) -> Option<usize> {
        self.recording.outer_frame_number_at_time(time)
    }

    /// Number of committed frames for `solver`.
    pub fn solver_frame_count(&self, solver: SolverId) -> usize {
        self.recording.solver_frame_count(solver)
    }

    /// Number of committed outer frames.
    pub fn outer_frame_count(&self) -> usize {
        self.recording.outer_frame_count()
    }

    /// Whether this handle and `recording` refer to the same recording.
    pub fn is_same(&self, recording: &Arc<Recording>) -> bool {
        Arc::ptr_eq(&self.recording, recording)
    }
}

impl From<Arc<Recording>> for RecordingReader {
    fn from(recording: Arc<Recording>) -> Self {
        Self::new(recording)
    }
}
