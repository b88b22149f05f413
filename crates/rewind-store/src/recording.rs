//! The recording aggregate root and its lock discipline.
//!
//! [`Recording`] wraps [`RecordingData`] in a `parking_lot::RwLock`.
//! Methods on `RecordingData` whose names end in `_assumes_locked` mutate
//! state and are reachable only through a [`RecordingWriteGuard`], so a
//! caller that already holds the guard (the ingest remapper reserving an
//! id, the store generating a keyframe while appending) never re-enters
//! the lock. `Recording` exposes locked one-shot wrappers for everything
//! else.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use rewind_core::{Cycle, OuterFrame, SolverFrame, SolverId};
use tracing::{debug, trace};

use crate::config::StoreConfig;
use crate::error::{StoreConfigError, StoreError};
use crate::keyframe::collapse_frames;

// ── RecordingData ───────────────────────────────────────────────

/// Everything a recording holds. Only reachable through a lock guard.
#[derive(Debug)]
pub struct RecordingData {
    keyframe_interval: usize,
    solver_frames: IndexMap<SolverId, Vec<SolverFrame>>,
    /// Sorted by first cycle; merged sessions interleave here.
    outer_frames: Vec<OuterFrame>,
    /// Indices into `outer_frames`, sorted by start time.
    outer_by_time: Vec<usize>,
    reserved_ids: HashSet<SolverId>,
    committed_ids: HashSet<SolverId>,
    solver_names: HashMap<SolverId, String>,
    /// Frame numbers that are keyframes, real or synthetic.
    keyframe_numbers: HashMap<SolverId, BTreeSet<usize>>,
    generated_keyframes: HashMap<SolverId, BTreeMap<usize, SolverFrame>>,
    name_table: HashMap<u64, Arc<str>>,
    feature_flags: IndexMap<String, bool>,
}

impl RecordingData {
    fn new(keyframe_interval: usize) -> Self {
        Self {
            keyframe_interval,
            solver_frames: IndexMap::new(),
            outer_frames: Vec::new(),
            outer_by_time: Vec::new(),
            reserved_ids: HashSet::new(),
            committed_ids: HashSet::new(),
            solver_names: HashMap::new(),
            keyframe_numbers: HashMap::new(),
            generated_keyframes: HashMap::new(),
            name_table: HashMap::new(),
            feature_flags: IndexMap::new(),
        }
    }

    // ── Mutation (caller holds the write guard) ─────────────────

    /// Append a closed solver frame and maintain the keyframe index.
    ///
    /// Source key frames are indexed as-is. Otherwise a synthetic
    /// keyframe is generated for the first frame of a solver, and
    /// whenever the distance from the last keyframe exceeds the
    /// configured interval. Synthetic keyframes are seeded from the
    /// previous keyframe, so each one holds the full state.
    ///
    /// Returns the new frame's number.
    pub fn add_solver_frame_assumes_locked(&mut self, frame: SolverFrame) -> usize {
        let solver = frame.solver_id;
        let is_source_key = frame.is_key_frame;
        let frames = self.solver_frames.entry(solver).or_default();
        frames.push(frame);
        let number = frames.len() - 1;

        if is_source_key {
            self.keyframe_numbers.entry(solver).or_default().insert(number);
            return number;
        }

        let last_key = self
            .keyframe_numbers
            .get(&solver)
            .and_then(|set| set.range(..number).next_back().copied());
        match last_key {
            None => self.store_keyframe(solver, 0, number),
            Some(last) if number - last > self.keyframe_interval => {
                self.store_keyframe(solver, last, number)
            }
            Some(_) => {}
        }
        number
    }

    /// Fold the keyframe at `seed` (if any) and frames `seed+1..=to`,
    /// storing the result as a synthetic keyframe at `to`.
    fn store_keyframe(&mut self, solver: SolverId, seed: usize, to: usize) {
        let Some(frames) = self.solver_frames.get(&solver) else {
            return;
        };
        let seed_frame = self.keyframe(solver, seed);
        let rest_start = if seed_frame.is_some() { seed + 1 } else { seed };
        let collapsed = collapse_frames(seed_frame.into_iter().chain(&frames[rest_start..=to]));
        if let Some(key) = collapsed {
            debug!(solver = %solver, seed, to, "generated keyframe");
            self.generated_keyframes
                .entry(solver)
                .or_default()
                .insert(to, key);
            self.keyframe_numbers.entry(solver).or_default().insert(to);
        }
    }

    /// Insert an outer frame in cycle order, after any frame with the
    /// same first cycle. Returns its index.
    ///
    /// Frames from one session arrive in order and are appended; frames
    /// from a second session attached to the same recording are slotted
    /// in, shifting later indices.
    pub fn add_outer_frame_assumes_locked(&mut self, frame: OuterFrame) -> usize {
        let index = self
            .outer_frames
            .partition_point(|f| f.first_cycle <= frame.first_cycle);
        if index < self.outer_frames.len() {
            trace!(index, first_cycle = %frame.first_cycle, "outer frame inserted out of order");
            for i in &mut self.outer_by_time {
                if *i >= index {
                    *i += 1;
                }
            }
        }
        let start_time = frame.start_time;
        self.outer_frames.insert(index, frame);
        let frames = &self.outer_frames;
        let by_time = self
            .outer_by_time
            .partition_point(|&i| frames[i].start_time <= start_time);
        self.outer_by_time.insert(by_time, index);
        index
    }

    /// Record the end of an already-committed outer frame and mark it
    /// dirty. Returns `false` for an unknown index.
    pub fn close_outer_frame_assumes_locked(
        &mut self,
        index: usize,
        last_cycle: Cycle,
        end_time: f64,
    ) -> bool {
        match self.outer_frames.get_mut(index) {
            Some(frame) => {
                frame.close(last_cycle, end_time);
                frame.dirty = true;
                true
            }
            None => false,
        }
    }

    /// Clear the dirty flag of an outer frame. Returns whether it was set.
    pub fn clear_outer_frame_dirty_assumes_locked(&mut self, index: usize) -> bool {
        self.outer_frames
            .get_mut(index)
            .map(|f| std::mem::replace(&mut f.dirty, false))
            .unwrap_or(false)
    }

    /// Store a synthetic keyframe at `to` covering at least `from..=to`.
    ///
    /// The fold is seeded from the nearest keyframe at or before `from`
    /// (or starts at frame 0), so the stored keyframe holds the full
    /// state at `to` and later scrubs and automatic keyframes can seed
    /// from it. Use [`collapse_frames_range`](Self::collapse_frames_range)
    /// for a fold of the range alone.
    pub fn generate_keyframe_assumes_locked(
        &mut self,
        solver: SolverId,
        from: usize,
        to: usize,
    ) -> Result<(), StoreError> {
        if from > to {
            return Err(StoreError::InvalidRange { from, to });
        }
        self.frames_checked(solver, to)?;
        let seed = self.keyframe_at_or_before(solver, from).unwrap_or(0);
        self.store_keyframe(solver, seed, to);
        Ok(())
    }

    /// Reserve `id` for a remapped solver. Fails if already reserved or
    /// committed.
    pub fn reserve_solver_id_assumes_locked(&mut self, id: SolverId) -> bool {
        if self.is_solver_id_taken(id) {
            return false;
        }
        self.reserved_ids.insert(id)
    }

    /// Promote a reserved id to committed.
    pub fn commit_solver_id_assumes_locked(&mut self, id: SolverId) {
        self.reserved_ids.remove(&id);
        self.committed_ids.insert(id);
    }

    /// Record the debug name of a solver. Later names replace earlier ones.
    pub fn set_solver_name_assumes_locked(&mut self, id: SolverId, name: &str) {
        if self.solver_names.get(&id).map(String::as_str) != Some(name) {
            self.solver_names.insert(id, name.to_owned());
        }
    }

    /// Add an interned name. Existing ids are kept.
    pub fn add_name_assumes_locked(&mut self, id: u64, name: &str) {
        self.name_table.entry(id).or_insert_with(|| Arc::from(name));
    }

    /// Record a producer feature flag.
    pub fn set_feature_flag_assumes_locked(&mut self, name: &str, enabled: bool) {
        self.feature_flags.insert(name.to_owned(), enabled);
    }

    // ── Queries ─────────────────────────────────────────────────

    /// Configured keyframe interval.
    pub fn keyframe_interval(&self) -> usize {
        self.keyframe_interval
    }

    /// Solvers with at least one committed frame, in first-commit order.
    pub fn solver_ids(&self) -> impl Iterator<Item = SolverId> + '_ {
        self.solver_frames.keys().copied()
    }

    /// All frames of a solver.
    pub fn solver_frames(&self, solver: SolverId) -> Option<&[SolverFrame]> {
        self.solver_frames.get(&solver).map(Vec::as_slice)
    }

    /// One raw frame of a solver.
    pub fn solver_frame(&self, solver: SolverId, number: usize) -> Option<&SolverFrame> {
        self.solver_frames.get(&solver)?.get(number)
    }

    /// All outer frames.
    pub fn outer_frames(&self) -> &[OuterFrame] {
        &self.outer_frames
    }

    /// One outer frame.
    pub fn outer_frame(&self, index: usize) -> Option<&OuterFrame> {
        self.outer_frames.get(index)
    }

    /// Whether `id` is reserved or committed.
    pub fn is_solver_id_taken(&self, id: SolverId) -> bool {
        self.reserved_ids.contains(&id) || self.committed_ids.contains(&id)
    }

    /// Whether `id` has been committed.
    pub fn is_solver_id_committed(&self, id: SolverId) -> bool {
        self.committed_ids.contains(&id)
    }

    /// Debug name of a solver.
    pub fn solver_name(&self, id: SolverId) -> Option<&str> {
        self.solver_names.get(&id).map(String::as_str)
    }

    /// Look up an interned name.
    pub fn name(&self, id: u64) -> Option<Arc<str>> {
        self.name_table.get(&id).cloned()
    }

    /// Number of interned names.
    pub fn name_count(&self) -> usize {
        self.name_table.len()
    }

    /// A producer feature flag.
    pub fn feature_flag(&self, name: &str) -> Option<bool> {
        self.feature_flags.get(name).copied()
    }

    /// All feature flags, in first-set order.
    pub fn feature_flags(&self) -> impl Iterator<Item = (&str, bool)> {
        self.feature_flags.iter().map(|(k, v)| (k.as_str(), *v))
    }

    /// Number of the last frame of `solver` that started at or before
    /// `cycle`.
    pub fn frame_number_at_cycle(&self, solver: SolverId, cycle: Cycle) -> Option<usize> {
        let frames = self.solver_frames.get(&solver)?;
        frames.partition_point(|f| f.cycle <= cycle).checked_sub(1)
    }

    /// Number of the last frame of `solver` that started at or before
    /// `time`.
    pub fn frame_number_at_time(&self, solver: SolverId, time: f64) -> Option<usize> {
        let frames = self.solver_frames.get(&solver)?;
        frames.partition_point(|f| f.start_time <= time).checked_sub(1)
    }

    /// Index of the last outer frame that began at or before `cycle`.
    pub fn outer_frame_number_at_cycle(&self, cycle: Cycle) -> Option<usize> {
        self.outer_frames
            .partition_point(|f| f.first_cycle <= cycle)
            .checked_sub(1)
    }

    /// Index of the outer frame with the latest start at or before
    /// `time`.
    pub fn outer_frame_number_at_time(&self, time: f64) -> Option<usize> {
        let n = self
            .outer_by_time
            .partition_point(|&i| self.outer_frames[i].start_time <= time);
        n.checked_sub(1).map(|k| self.outer_by_time[k])
    }

    /// Current index of the outer frame that began at `first_cycle` and
    /// `start_time`.
    ///
    /// Indices shift when merged sessions insert frames, so a writer
    /// finds its own frames again by these two values.
    pub fn outer_frame_index(&self, first_cycle: Cycle, start_time: f64) -> Option<usize> {
        let lo = self
            .outer_frames
            .partition_point(|f| f.first_cycle < first_cycle);
        let hi = self
            .outer_frames
            .partition_point(|f| f.first_cycle <= first_cycle);
        (lo..hi).find(|&i| self.outer_frames[i].start_time.to_bits() == start_time.to_bits())
    }

    /// Keyframe numbers of a solver, ascending.
    pub fn keyframe_numbers(&self, solver: SolverId) -> impl Iterator<Item = usize> + '_ {
        self.keyframe_numbers
            .get(&solver)
            .into_iter()
            .flatten()
            .copied()
    }

    /// Nearest keyframe number at or before `frame`.
    pub fn keyframe_at_or_before(&self, solver: SolverId, frame: usize) -> Option<usize> {
        self.keyframe_numbers
            .get(&solver)?
            .range(..=frame)
            .next_back()
            .copied()
    }

    /// The keyframe at `number`: synthetic if one was generated, otherwise
    /// the source frame when it is a key frame.
    pub fn keyframe(&self, solver: SolverId, number: usize) -> Option<&SolverFrame> {
        if let Some(key) = self
            .generated_keyframes
            .get(&solver)
            .and_then(|m| m.get(&number))
        {
            return Some(key);
        }
        self.solver_frame(solver, number).filter(|f| f.is_key_frame)
    }

    /// Fold the raw frames `from..=to` into one key frame.
    pub fn collapse_frames_range(
        &self,
        solver: SolverId,
        from: usize,
        to: usize,
    ) -> Result<SolverFrame, StoreError> {
        if from > to {
            return Err(StoreError::InvalidRange { from, to });
        }
        let frames = self.frames_checked(solver, to)?;
        collapse_frames(&frames[from..=to]).ok_or(StoreError::InvalidRange { from, to })
    }

    /// Full state of `solver` at frame `number`.
    ///
    /// Folds the nearest keyframe and the frames after it, so the cost is
    /// bounded by the keyframe interval rather than the frame number.
    pub fn collapsed_frame_at(
        &self,
        solver: SolverId,
        number: usize,
    ) -> Result<SolverFrame, StoreError> {
        let frames = self.frames_checked(solver, number)?;
        let seed = self
            .keyframe_at_or_before(solver, number)
            .and_then(|k| self.keyframe(solver, k).map(|f| (k, f)));
        let collapsed = match seed {
            Some((k, key)) => {
                trace!(solver = %solver, keyframe = k, number, "collapsing from keyframe");
                collapse_frames(std::iter::once(key).chain(&frames[k + 1..=number]))
            }
            None => collapse_frames(&frames[..=number]),
        };
        collapsed.ok_or(StoreError::FrameOutOfRange {
            solver,
            frame: number,
            len: frames.len(),
        })
    }

    /// The first frame of `solver` inside the span of outer frame `index`.
    ///
    /// When the solver has no frame inside the span, the last frame
    /// before it is current and is returned instead.
    pub fn lowest_solver_frame_number_at_outer_frame(
        &self,
        solver: SolverId,
        index: usize,
    ) -> Option<usize> {
        let outer = self.outer_frames.get(index)?;
        let frames = self.solver_frames.get(&solver)?;
        let first_inside = frames.partition_point(|f| f.cycle < outer.first_cycle);
        let end = outer.last_cycle.unwrap_or(outer.first_cycle);
        match frames.get(first_inside) {
            Some(f) if f.cycle <= end => Some(first_inside),
            _ => first_inside.checked_sub(1),
        }
    }

    /// Solvers with data at or before the end of outer frame `index`.
    pub fn available_solvers_at_outer_frame(&self, index: usize) -> Vec<SolverId> {
        let Some(outer) = self.outer_frames.get(index) else {
            return Vec::new();
        };
        let end = outer.last_cycle.unwrap_or(outer.first_cycle);
        self.solver_frames
            .iter()
            .filter(|(_, frames)| frames.first().is_some_and(|f| f.cycle <= end))
            .map(|(id, _)| *id)
            .collect()
    }

    fn frames_checked(&self, solver: SolverId, frame: usize) -> Result<&[SolverFrame], StoreError> {
        let frames = self
            .solver_frames
            .get(&solver)
            .ok_or(StoreError::UnknownSolver { solver })?;
        if frame >= frames.len() {
            return Err(StoreError::FrameOutOfRange {
                solver,
                frame,
                len: frames.len(),
            });
        }
        Ok(frames)
    }
}

// ── Recording ───────────────────────────────────────────────────

/// A reconstructed timeline shared between one writer and many readers.
pub struct Recording {
    name: String,
    data: RwLock<RecordingData>,
    generation: AtomicU64,
    live: AtomicBool,
}

// Compile-time assertion: Recording must be Send + Sync.
const _: fn() = || {
    fn assert<T: Send + Sync>() {}
    assert::<Recording>();
};

impl Recording {
    /// Create an empty, live recording.
    pub fn new(name: impl Into<String>, config: StoreConfig) -> Result<Self, StoreConfigError> {
        config.validate()?;
        Ok(Self {
            name: name.into(),
            data: RwLock::new(RecordingData::new(config.keyframe_interval)),
            generation: AtomicU64::new(0),
            live: AtomicBool::new(true),
        })
    }

    /// Create an empty, live recording with the default configuration.
    pub fn with_defaults(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data: RwLock::new(RecordingData::new(StoreConfig::default().keyframe_interval)),
            generation: AtomicU64::new(0),
            live: AtomicBool::new(true),
        }
    }

    /// Recording name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Take the shared lock.
    pub fn read(&self) -> RwLockReadGuard<'_, RecordingData> {
        self.data.read()
    }

    /// Take the exclusive lock. The generation counter advances when the
    /// guard is dropped.
    pub fn write(&self) -> RecordingWriteGuard<'_> {
        RecordingWriteGuard {
            guard: self.data.write(),
            generation: &self.generation,
        }
    }

    /// Number of write guards released so far.
    ///
    /// Readers poll this to detect change without taking the lock.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    /// Whether a session is still writing to this recording.
    pub fn is_live(&self) -> bool {
        self.live.load(Ordering::Acquire)
    }

    /// Mark whether a session is writing to this recording.
    pub fn set_live(&self, live: bool) {
        self.live.store(live, Ordering::Release);
    }

    // ── Locked wrappers ─────────────────────────────────────────

    /// See [`RecordingData::add_solver_frame_assumes_locked`].
    pub fn add_solver_frame(&self, frame: SolverFrame) -> usize {
        self.write().add_solver_frame_assumes_locked(frame)
    }

    /// See [`RecordingData::add_outer_frame_assumes_locked`].
    pub fn add_outer_frame(&self, frame: OuterFrame) -> usize {
        self.write().add_outer_frame_assumes_locked(frame)
    }

    /// See [`RecordingData::generate_keyframe_assumes_locked`].
    pub fn generate_keyframe(
        &self,
        solver: SolverId,
        from: usize,
        to: usize,
    ) -> Result<(), StoreError> {
        self.write().generate_keyframe_assumes_locked(solver, from, to)
    }

    /// See [`RecordingData::clear_outer_frame_dirty_assumes_locked`].
    pub fn clear_outer_frame_dirty(&self, index: usize) -> bool {
        self.write().clear_outer_frame_dirty_assumes_locked(index)
    }

    /// See [`RecordingData::collapsed_frame_at`].
    pub fn collapsed_frame_at(
        &self,
        solver: SolverId,
        number: usize,
    ) -> Result<SolverFrame, StoreError> {
        self.read().collapsed_frame_at(solver, number)
    }

    /// See [`RecordingData::frame_number_at_cycle`].
    pub fn frame_number_at_cycle(&self, solver: SolverId, cycle: Cycle) -> Option<usize> {
        self.read().frame_number_at_cycle(solver, cycle)
    }

    /// See [`RecordingData::frame_number_at_time`].
    pub fn frame_number_at_time(&self, solver: SolverId, time: f64) -> Option<usize> {
        self.read().frame_number_at_time(solver, time)
    }

    /// See [`RecordingData::outer_frame_number_at_cycle`].
    pub fn outer_frame_number_at_cycle(&self, cycle: Cycle) -> Option<usize> {
        self.read().outer_frame_number_at_cycle(cycle)
    }

    /// See [`RecordingData::outer_frame_number_at_time`].
    pub fn outer_frame_number_at_time(&self, time: f64) -> Option<usize> {
        self.read().outer_frame_number_at_time(time)
    }

    /// Number of committed frames for `solver`.
    pub fn solver_frame_count(&self, solver: SolverId) -> usize {
        self.read().solver_frames(solver).map_or(0, <[_]>::len)
    }

    /// Number of committed outer frames.
    pub fn outer_frame_count(&self) -> usize {
        self.read().outer_frames().len()
    }
}

impl std::fmt::Debug for Recording {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Recording")
            .field("name", &self.name)
            .field("generation", &self.generation())
            .field("live", &self.is_live())
            .finish_non_exhaustive()
    }
}

/// Exclusive access to a recording's data.
///
/// Dropping the guard advances the recording's generation counter.
pub struct RecordingWriteGuard<'a> {
    guard: RwLockWriteGuard<'a, RecordingData>,
    generation: &'a AtomicU64,
}

impl Deref for RecordingWriteGuard<'_> {
    type Target = RecordingData;

    fn deref(&self) -> &RecordingData {
        &self.guard
    }
}

impl DerefMut for RecordingWriteGuard<'_> {
    fn deref_mut(&mut self) -> &mut RecordingData {
        &mut self.guard
    }
}

impl Drop for RecordingWriteGuard<'_> {
    fn drop(&mut self) {
        self.generation.fetch_add(1, Ordering::AcqRel);
    }
}
