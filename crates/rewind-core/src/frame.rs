//! The two-level frame model: outer world ticks, per-solver frames, and
//! the ordered stages within each solver frame.

use std::collections::BTreeSet;

use bitflags::bitflags;
use indexmap::IndexMap;
use smallvec::SmallVec;

use crate::custom::CustomFrameData;
use crate::id::{Cycle, EntityId, SolverId};
use crate::records::{ContactPair, EntitySnapshot, JointState};

bitflags! {
    /// Lifecycle and provenance flags of a [`Stage`].
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct StageFlags: u8 {
        /// The stage still accepts data.
        const OPEN = 1 << 0;
        /// Synthesized to hold data that arrived outside an explicit stage.
        const AUTO_GENERATED = 1 << 1;
    }
}

/// Spatial transform of a solver's simulation space.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Transform {
    /// Translation.
    pub position: [f64; 3],
    /// Rotation quaternion `(x, y, z, w)`.
    pub rotation: [f64; 4],
}

impl Transform {
    /// The identity transform.
    pub const IDENTITY: Self = Self {
        position: [0.0; 3],
        rotation: [0.0, 0.0, 0.0, 1.0],
    };
}

impl Default for Transform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

// ── Stage ───────────────────────────────────────────────────────

type IndexList = SmallVec<[usize; 4]>;

/// One ordered phase within a [`SolverFrame`].
///
/// Decoded data is bucketed per entity: the latest snapshot of each
/// entity, plus contact pairs and joint states indexed by every entity
/// they reference.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Stage {
    /// Stage name as reported by the producer (or a synthesized name).
    pub name: String,
    /// Open/auto-generated flags.
    pub flags: StageFlags,
    /// Entities destroyed during this stage.
    pub destroyed: BTreeSet<EntityId>,
    entities: IndexMap<EntityId, EntitySnapshot>,
    contacts: Vec<ContactPair>,
    contacts_by_entity: IndexMap<EntityId, IndexList>,
    joints: Vec<JointState>,
    joints_by_entity: IndexMap<EntityId, IndexList>,
}

impl Stage {
    /// Name given to stages synthesized for data arriving between stages.
    pub const IN_BETWEEN: &'static str = "In Between";

    /// An open stage opened by an explicit stage-start event.
    pub fn explicit(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            flags: StageFlags::OPEN,
            ..Self::default()
        }
    }

    /// An open, auto-generated stage.
    pub fn auto_generated(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            flags: StageFlags::OPEN | StageFlags::AUTO_GENERATED,
            ..Self::default()
        }
    }

    /// Whether the stage still accepts data.
    pub fn is_open(&self) -> bool {
        self.flags.contains(StageFlags::OPEN)
    }

    /// Whether the stage was synthesized rather than explicitly started.
    pub fn is_auto_generated(&self) -> bool {
        self.flags.contains(StageFlags::AUTO_GENERATED)
    }

    /// Mark the stage closed.
    pub fn close(&mut self) {
        self.flags.remove(StageFlags::OPEN);
    }

    /// Insert or replace the snapshot for its entity.
    pub fn upsert_entity(&mut self, snapshot: EntitySnapshot) {
        self.entities.insert(snapshot.id, snapshot);
    }

    /// Remove an entity's snapshot, returning it if present.
    pub fn remove_entity(&mut self, id: EntityId) -> Option<EntitySnapshot> {
        self.entities.shift_remove(&id)
    }

    /// Latest snapshot of `id` within this stage.
    pub fn entity(&self, id: EntityId) -> Option<&EntitySnapshot> {
        self.entities.get(&id)
    }

    /// All entity snapshots, in first-insertion order.
    pub fn entities(&self) -> impl Iterator<Item = &EntitySnapshot> {
        self.entities.values()
    }

    /// Number of distinct entities with a snapshot in this stage.
    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    /// Append a contact pair and index it under both entities.
    pub fn add_contact(&mut self, pair: ContactPair) {
        let idx = self.contacts.len();
        self.contacts_by_entity
            .entry(pair.entity_a)
            .or_default()
            .push(idx);
        if pair.entity_b != pair.entity_a {
            self.contacts_by_entity
                .entry(pair.entity_b)
                .or_default()
                .push(idx);
        }
        self.contacts.push(pair);
    }

    /// All contact pairs, in arrival order.
    pub fn contacts(&self) -> &[ContactPair] {
        &self.contacts
    }

    /// Contact pairs referencing `id`.
    pub fn contacts_for(&self, id: EntityId) -> impl Iterator<Item = &ContactPair> {
        self.contacts_by_entity
            .get(&id)
            .into_iter()
            .flatten()
            .map(|&i| &self.contacts[i])
    }

    /// Append a joint state and index it under both entities.
    pub fn add_joint(&mut self, joint: JointState) {
        let idx = self.joints.len();
        self.joints_by_entity
            .entry(joint.entity_a)
            .or_default()
            .push(idx);
        if joint.entity_b != joint.entity_a {
            self.joints_by_entity
                .entry(joint.entity_b)
                .or_default()
                .push(idx);
        }
        self.joints.push(joint);
    }

    /// All joint states, in arrival order.
    pub fn joints(&self) -> &[JointState] {
        &self.joints
    }

    /// Joint states referencing `id`.
    pub fn joints_for(&self, id: EntityId) -> impl Iterator<Item = &JointState> {
        self.joints_by_entity
            .get(&id)
            .into_iter()
            .flatten()
            .map(|&i| &self.joints[i])
    }
}

/// What [`SolverFrame::push_stage`] had to do to the previously open stage.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StageTransition {
    /// No stage was open.
    Clean,
    /// An auto-generated stage was closed silently.
    ClosedAutoGenerated,
    /// An explicit stage was still open and had to be force-closed.
    ///
    /// The producer never ended it, which breaks the stage protocol.
    ForcedExplicitClose {
        /// Name of the stage that was force-closed.
        name: String,
    },
}

// ── SolverFrame ─────────────────────────────────────────────────

/// One simulation-step boundary for one solver.
#[derive(Clone, Debug, PartialEq)]
pub struct SolverFrame {
    /// Stable, recording-local solver id.
    pub solver_id: SolverId,
    /// Solver debug name.
    pub debug_name: String,
    /// Source tick at frame start.
    pub cycle: Cycle,
    /// Producer-side frame number, when reported.
    pub frame_number: Option<u64>,
    /// Wall-clock start time in seconds.
    pub start_time: f64,
    /// Wall-clock end time. End events are best effort.
    pub end_time: Option<f64>,
    /// Whether the frame carries a complete state snapshot.
    pub is_key_frame: bool,
    /// Whether the frame re-simulates an earlier tick.
    pub is_resimulated: bool,
    /// Stages in the order they were opened.
    pub stages: Vec<Stage>,
    /// Entities destroyed in any stage of this frame.
    pub destroyed: BTreeSet<EntityId>,
    /// Solver simulation space.
    pub simulation_space: Transform,
    /// Offset between the solver tick and the network tick.
    pub network_tick_offset: Option<i32>,
    /// Extension data from optional payload types.
    pub custom_data: CustomFrameData,
}

impl SolverFrame {
    /// A new frame with no stages.
    pub fn new(solver_id: SolverId, cycle: Cycle, start_time: f64) -> Self {
        Self {
            solver_id,
            debug_name: String::new(),
            cycle,
            frame_number: None,
            start_time,
            end_time: None,
            is_key_frame: false,
            is_resimulated: false,
            stages: Vec::new(),
            destroyed: BTreeSet::new(),
            simulation_space: Transform::IDENTITY,
            network_tick_offset: None,
            custom_data: CustomFrameData::new(),
        }
    }

    /// Append `stage`, closing whatever stage was open first.
    ///
    /// At most one stage is open after this call.
    pub fn push_stage(&mut self, stage: Stage) -> StageTransition {
        let transition = match self.open_stage_mut() {
            None => StageTransition::Clean,
            Some(prev) => {
                prev.close();
                if prev.is_auto_generated() {
                    StageTransition::ClosedAutoGenerated
                } else {
                    StageTransition::ForcedExplicitClose {
                        name: prev.name.clone(),
                    }
                }
            }
        };
        self.stages.push(stage);
        transition
    }

    /// The currently open stage, if any.
    ///
    /// Only the last stage can be open.
    pub fn open_stage(&self) -> Option<&Stage> {
        self.stages.last().filter(|s| s.is_open())
    }

    /// Mutable access to the currently open stage.
    pub fn open_stage_mut(&mut self) -> Option<&mut Stage> {
        self.stages.last_mut().filter(|s| s.is_open())
    }

    /// Close the open stage. Returns `false` if none was open.
    pub fn close_open_stage(&mut self) -> bool {
        match self.open_stage_mut() {
            Some(stage) => {
                stage.close();
                true
            }
            None => false,
        }
    }

    /// Record `id` as destroyed during this frame.
    pub fn add_destroyed(&mut self, id: EntityId) {
        self.destroyed.insert(id);
    }
}

// ── OuterFrame ──────────────────────────────────────────────────

/// One coarse world tick.
///
/// Produced by the world's own tick markers, independent of any solver,
/// so it may span no solver data at all.
#[derive(Clone, Debug, PartialEq)]
pub struct OuterFrame {
    /// Source tick at which the world tick began.
    pub first_cycle: Cycle,
    /// Source tick at which it ended, once known.
    pub last_cycle: Option<Cycle>,
    /// Wall-clock start time.
    pub start_time: f64,
    /// Wall-clock end time, once known.
    pub end_time: Option<f64>,
    /// Set when a committed frame is modified afterwards.
    pub dirty: bool,
}

impl OuterFrame {
    /// A new, still-open outer frame.
    pub fn new(first_cycle: Cycle, start_time: f64) -> Self {
        Self {
            first_cycle,
            last_cycle: None,
            start_time,
            end_time: None,
            dirty: false,
        }
    }

    /// Whether an end has been recorded.
    pub fn is_closed(&self) -> bool {
        self.last_cycle.is_some()
    }

    /// Record the end of the tick.
    pub fn close(&mut self, last_cycle: Cycle, end_time: f64) {
        self.last_cycle = Some(last_cycle);
        self.end_time = Some(end_time);
    }
}
