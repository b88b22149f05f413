//! Typed trace events.
//!
//! [`RawEvent`] is what arrives on the wire; [`TraceEvent`] is what the
//! engine consumes. The router converts one into the other.

pub use rewind_core::event::{FieldValue, RawEvent};
use rewind_core::{Cycle, EntityId, PayloadId, SourceSolverId, Transform};

/// Fields of a solver frame start.
#[derive(Clone, Debug, PartialEq)]
pub struct FrameStart {
    /// Source solver id; [`SourceSolverId::UNSET`] when absent.
    pub solver: SourceSolverId,
    /// Source tick.
    pub cycle: Cycle,
    /// Human-readable solver name.
    pub debug_name: String,
    /// The producer marked this frame complete.
    pub is_key_frame: bool,
    /// The frame replays an earlier tick.
    pub is_resimulated: bool,
    /// Producer frame counter, when sent.
    pub frame_number: Option<u64>,
    /// Event timestamp.
    pub time: f64,
}

/// Fields of a binary payload start.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PayloadStart {
    /// Payload id.
    pub id: PayloadId,
    /// Type tag selecting the decoder.
    pub type_tag: String,
    /// Bytes that will arrive on the wire.
    pub declared_size: usize,
    /// Size after decompression.
    pub original_size: usize,
    /// Whether the content is LZ4 block compressed.
    pub compressed: bool,
}

/// One trace event with typed fields.
#[derive(Clone, Debug, PartialEq)]
pub enum TraceEvent {
    /// A solver began a step.
    SolverFrameStart(FrameStart),
    /// A solver finished a step. Frequently absent from streams.
    SolverFrameEnd {
        /// Source solver id.
        solver: SourceSolverId,
        /// Tick of the frame that ended.
        cycle: Cycle,
        /// Event timestamp.
        time: f64,
    },
    /// A named stage began inside the open frame.
    StageStart {
        /// Source solver id.
        solver: SourceSolverId,
        /// Stage name.
        name: String,
    },
    /// The open stage ended.
    StageEnd {
        /// Source solver id.
        solver: SourceSolverId,
        /// Producer step counter, when sent.
        step_number: Option<i32>,
    },
    /// An entity was removed from the simulation.
    EntityDestroyed {
        /// Source solver id.
        solver: SourceSolverId,
        /// Removed entity.
        entity: EntityId,
    },
    /// The solver's world transform for the open frame.
    SimulationSpace {
        /// Source solver id.
        solver: SourceSolverId,
        /// Solver-space to world-space transform.
        transform: Transform,
    },
    /// Network tick offset for the open frame.
    IdentifierOffset {
        /// Source solver id.
        solver: SourceSolverId,
        /// Offset in ticks.
        offset: i32,
    },
    /// An in-flight payload was abandoned.
    IdentifierRollback {
        /// Abandoned payload.
        payload: PayloadId,
    },
    /// A producer feature flag.
    FeatureFlag {
        /// Flag name.
        name: String,
        /// Flag value.
        enabled: bool,
    },
    /// A payload began.
    PayloadStart(PayloadStart),
    /// A payload chunk.
    PayloadContent {
        /// Payload id.
        payload: PayloadId,
        /// Chunk bytes.
        data: Vec<u8>,
    },
    /// A payload is complete.
    PayloadEnd {
        /// Payload id.
        payload: PayloadId,
    },
    /// An outer tick began.
    OuterFrameStart {
        /// Producer frame-type value.
        kind: i64,
        /// Source tick.
        cycle: Cycle,
        /// Event timestamp.
        time: f64,
    },
    /// An outer tick ended.
    OuterFrameEnd {
        /// Producer frame-type value.
        kind: i64,
        /// Source tick.
        cycle: Cycle,
        /// Event timestamp.
        time: f64,
    },
}

impl TraceEvent {
    /// The solver this event is scoped to, if any.
    pub fn solver(&self) -> Option<SourceSolverId> {
        match self {
            TraceEvent::SolverFrameStart(start) => Some(start.solver),
            TraceEvent::SolverFrameEnd { solver, .. }
            | TraceEvent::StageStart { solver, .. }
            | TraceEvent::StageEnd { solver, .. }
            | TraceEvent::EntityDestroyed { solver, .. }
            | TraceEvent::SimulationSpace { solver, .. }
            | TraceEvent::IdentifierOffset { solver, .. } => Some(*solver),
            TraceEvent::IdentifierRollback { .. }
            | TraceEvent::FeatureFlag { .. }
            | TraceEvent::PayloadStart(_)
            | TraceEvent::PayloadContent { .. }
            | TraceEvent::PayloadEnd { .. }
            | TraceEvent::OuterFrameStart { .. }
            | TraceEvent::OuterFrameEnd { .. } => None,
        }
    }
}
