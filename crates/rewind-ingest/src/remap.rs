//! Volatile source solver ids to stable recording-local ids.

use std::collections::HashMap;

use rewind_core::{SolverId, SourceSolverId};
use rewind_store::{Recording, RecordingData};
use tracing::debug;

/// Forward map from source ids to stable ids, kept for one session.
///
/// Stable ids are claimed in the recording's reserved set under its
/// write lock, so several sessions feeding one recording never hand
/// out the same id.
#[derive(Debug, Default)]
pub struct IdRemapper {
    forward: HashMap<SourceSolverId, SolverId>,
    next_candidate: i32,
}

impl IdRemapper {
    /// An empty remapper.
    pub fn new() -> Self {
        Self::default()
    }

    /// Stable id for `source`, claiming a fresh one on first sight.
    pub fn remap(&mut self, source: SourceSolverId, recording: &Recording) -> SolverId {
        if let Some(&id) = self.forward.get(&source) {
            return id;
        }
        let mut data = recording.write();
        self.remap_assumes_locked(source, &mut data)
    }

    /// Same as [`remap`](Self::remap) for a caller already holding the
    /// recording's write guard.
    pub fn remap_assumes_locked(
        &mut self,
        source: SourceSolverId,
        data: &mut RecordingData,
    ) -> SolverId {
        if let Some(&id) = self.forward.get(&source) {
            return id;
        }
        let preferred = SolverId(source.0);
        let stable = if source.0 >= 0 && data.reserve_solver_id_assumes_locked(preferred) {
            preferred
        } else {
            loop {
                let candidate = SolverId(self.next_candidate);
                self.next_candidate += 1;
                if data.reserve_solver_id_assumes_locked(candidate) {
                    break candidate;
                }
            }
        };
        data.commit_solver_id_assumes_locked(stable);
        if stable != preferred {
            debug!(source = %source, stable = %stable, "remapped colliding solver id");
        }
        self.forward.insert(source, stable);
        stable
    }

    /// Stable id for `source`, or `None` if it was never remapped.
    ///
    /// `None` means the data belongs to a solver this session does not
    /// track and must be discarded.
    pub fn resolve(&self, source: SourceSolverId) -> Option<SolverId> {
        self.forward.get(&source).copied()
    }

    /// Number of mapped source ids.
    pub fn len(&self) -> usize {
        self.forward.len()
    }

    /// Whether nothing has been mapped yet.
    pub fn is_empty(&self) -> bool {
        self.forward.is_empty()
    }
}
