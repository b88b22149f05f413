//! Raw event classification, field extraction and dispatch.

use std::collections::HashMap;

use rewind_core::event::{loggers, names};
use rewind_core::{Cycle, EntityId, PayloadId, SourceSolverId, Transform};
use tracing::trace;

use crate::engine::ReconstructionEngine;
use crate::event::{FieldValue, FrameStart, PayloadStart, RawEvent, TraceEvent};

pub use rewind_core::event::fields;

/// Which wire event a [`RawEvent`] is.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// `SolverFrameStart`.
    SolverFrameStart,
    /// `SolverFrameEnd`.
    SolverFrameEnd,
    /// `StageStart`.
    StageStart,
    /// `StageEnd`.
    StageEnd,
    /// `EntityDestroyed`.
    EntityDestroyed,
    /// `SimulationSpace`.
    SimulationSpace,
    /// `IdentifierOffset`.
    IdentifierOffset,
    /// `IdentifierRollback`.
    IdentifierRollback,
    /// `FeatureFlag`.
    FeatureFlag,
    /// `BinaryPayloadStart`.
    BinaryPayloadStart,
    /// `BinaryPayloadContent`.
    BinaryPayloadContent,
    /// `BinaryPayloadEnd`.
    BinaryPayloadEnd,
    /// `BeginFrame` on the frame logger.
    OuterFrameStart,
    /// `EndFrame` on the frame logger.
    OuterFrameEnd,
}

const ROUTES: [(&str, &str, EventKind); 14] = [
    (loggers::PHYSICS_TRACE, names::SOLVER_FRAME_START, EventKind::SolverFrameStart),
    (loggers::PHYSICS_TRACE, names::SOLVER_FRAME_END, EventKind::SolverFrameEnd),
    (loggers::PHYSICS_TRACE, names::STAGE_START, EventKind::StageStart),
    (loggers::PHYSICS_TRACE, names::STAGE_END, EventKind::StageEnd),
    (loggers::PHYSICS_TRACE, names::ENTITY_DESTROYED, EventKind::EntityDestroyed),
    (loggers::PHYSICS_TRACE, names::SIMULATION_SPACE, EventKind::SimulationSpace),
    (loggers::PHYSICS_TRACE, names::IDENTIFIER_OFFSET, EventKind::IdentifierOffset),
    (loggers::PHYSICS_TRACE, names::IDENTIFIER_ROLLBACK, EventKind::IdentifierRollback),
    (loggers::PHYSICS_TRACE, names::FEATURE_FLAG, EventKind::FeatureFlag),
    (loggers::PHYSICS_TRACE, names::BINARY_PAYLOAD_START, EventKind::BinaryPayloadStart),
    (loggers::PHYSICS_TRACE, names::BINARY_PAYLOAD_CONTENT, EventKind::BinaryPayloadContent),
    (loggers::PHYSICS_TRACE, names::BINARY_PAYLOAD_END, EventKind::BinaryPayloadEnd),
    (loggers::FRAME, names::BEGIN_FRAME, EventKind::OuterFrameStart),
    (loggers::FRAME, names::END_FRAME, EventKind::OuterFrameEnd),
];

/// Route table from `(logger, name)` to [`EventKind`], built once.
#[derive(Clone, Debug)]
pub struct EventRouter {
    routes: HashMap<&'static str, HashMap<&'static str, EventKind>>,
}

impl Default for EventRouter {
    fn default() -> Self {
        Self::new()
    }
}

impl EventRouter {
    /// A router knowing every wire event.
    pub fn new() -> Self {
        let mut routes: HashMap<&'static str, HashMap<&'static str, EventKind>> = HashMap::new();
        for (logger, name, kind) in ROUTES {
            routes.entry(logger).or_default().insert(name, kind);
        }
        Self { routes }
    }

    /// Kind of `raw`, or `None` for events nothing consumes.
    pub fn classify(&self, raw: &RawEvent) -> Option<EventKind> {
        self.routes.get(raw.logger.as_str())?.get(raw.name.as_str()).copied()
    }

    /// Classify, extract and dispatch `raw`. Returns `false` when the
    /// event has no route.
    pub fn route(&self, engine: &mut ReconstructionEngine, raw: RawEvent) -> bool {
        let Some(kind) = self.classify(&raw) else {
            trace!(logger = %raw.logger, name = %raw.name, "unrouted event");
            return false;
        };
        dispatch(engine, extract(kind, raw));
        true
    }
}

// ── Extraction ──────────────────────────────────────────────────

/// Build the typed event for `kind` from `raw`.
///
/// Never fails: missing or mistyped fields take defaults. Ids default
/// to their unset sentinel, flags to `false`, strings and byte arrays
/// to empty, cycles to 0 and optional numbers to `None`.
pub fn extract(kind: EventKind, mut raw: RawEvent) -> TraceEvent {
    let time = raw.time;
    match kind {
        EventKind::SolverFrameStart => TraceEvent::SolverFrameStart(FrameStart {
            solver: solver(&raw),
            cycle: cycle(&raw),
            debug_name: string(&raw, fields::DEBUG_NAME),
            is_key_frame: flag(&raw, fields::IS_KEY_FRAME),
            is_resimulated: flag(&raw, fields::IS_RESIMULATED),
            frame_number: raw.field(fields::FRAME_NUMBER).and_then(FieldValue::as_u64),
            time,
        }),
        EventKind::SolverFrameEnd => TraceEvent::SolverFrameEnd {
            solver: solver(&raw),
            cycle: cycle(&raw),
            time,
        },
        EventKind::StageStart => TraceEvent::StageStart {
            solver: solver(&raw),
            name: string(&raw, fields::STEP_NAME),
        },
        EventKind::StageEnd => TraceEvent::StageEnd {
            solver: solver(&raw),
            step_number: int32(&raw, fields::STEP_NUMBER),
        },
        EventKind::EntityDestroyed => TraceEvent::EntityDestroyed {
            solver: solver(&raw),
            entity: int32(&raw, fields::ENTITY_ID).map_or_else(EntityId::default, EntityId),
        },
        EventKind::SimulationSpace => TraceEvent::SimulationSpace {
            solver: solver(&raw),
            transform: Transform {
                position: floats(&raw, fields::POSITION).unwrap_or(Transform::IDENTITY.position),
                rotation: floats(&raw, fields::ROTATION).unwrap_or(Transform::IDENTITY.rotation),
            },
        },
        EventKind::IdentifierOffset => TraceEvent::IdentifierOffset {
            solver: solver(&raw),
            offset: int32(&raw, fields::OFFSET).unwrap_or(0),
        },
        EventKind::IdentifierRollback => TraceEvent::IdentifierRollback {
            payload: payload(&raw),
        },
        EventKind::FeatureFlag => TraceEvent::FeatureFlag {
            name: string(&raw, fields::NAME),
            enabled: flag(&raw, fields::ENABLED),
        },
        EventKind::BinaryPayloadStart => {
            let declared_size = size(&raw, fields::DECLARED_SIZE);
            TraceEvent::PayloadStart(PayloadStart {
                id: payload(&raw),
                type_tag: string(&raw, fields::TYPE_TAG),
                declared_size,
                original_size: raw
                    .field(fields::ORIGINAL_SIZE)
                    .map_or(declared_size, |_| size(&raw, fields::ORIGINAL_SIZE)),
                compressed: flag(&raw, fields::IS_COMPRESSED),
            })
        }
        EventKind::BinaryPayloadContent => TraceEvent::PayloadContent {
            payload: payload(&raw),
            data: raw.take_bytes(fields::DATA).unwrap_or_default(),
        },
        EventKind::BinaryPayloadEnd => TraceEvent::PayloadEnd {
            payload: payload(&raw),
        },
        EventKind::OuterFrameStart => TraceEvent::OuterFrameStart {
            kind: frame_type(&raw),
            cycle: cycle(&raw),
            time,
        },
        EventKind::OuterFrameEnd => TraceEvent::OuterFrameEnd {
            kind: frame_type(&raw),
            cycle: cycle(&raw),
            time,
        },
    }
}

fn int32(raw: &RawEvent, field: &str) -> Option<i32> {
    raw.field(field)
        .and_then(FieldValue::as_i64)
        .and_then(|v| i32::try_from(v).ok())
}

fn solver(raw: &RawEvent) -> SourceSolverId {
    int32(raw, fields::SOLVER_ID).map_or(SourceSolverId::UNSET, SourceSolverId)
}

fn payload(raw: &RawEvent) -> PayloadId {
    int32(raw, fields::PAYLOAD_ID).map_or(PayloadId::UNSET, PayloadId)
}

fn cycle(raw: &RawEvent) -> Cycle {
    raw.field(fields::CYCLE)
        .and_then(FieldValue::as_u64)
        .map_or_else(Cycle::default, Cycle)
}

fn frame_type(raw: &RawEvent) -> i64 {
    raw.field(fields::FRAME_TYPE)
        .and_then(FieldValue::as_i64)
        .unwrap_or(-1)
}

fn flag(raw: &RawEvent, field: &str) -> bool {
    raw.field(field)
        .and_then(FieldValue::as_bool)
        .unwrap_or(false)
}

fn string(raw: &RawEvent, field: &str) -> String {
    raw.field(field)
        .and_then(FieldValue::as_str)
        .unwrap_or_default()
        .to_owned()
}

/// Sizes that do not fit `usize` saturate; the reassembler rejects them.
fn size(raw: &RawEvent, field: &str) -> usize {
    raw.field(field)
        .and_then(FieldValue::as_u64)
        .map_or(0, |v| usize::try_from(v).unwrap_or(usize::MAX))
}

fn floats<const N: usize>(raw: &RawEvent, field: &str) -> Option<[f64; N]> {
    raw.field(field)
        .and_then(FieldValue::as_floats)
        .and_then(|v| <[f64; N]>::try_from(v).ok())
}

// ── Dispatch ────────────────────────────────────────────────────

/// Apply one typed event to `engine`.
///
/// Solver-scoped events are resolved to stable ids first; only a frame
/// start creates a mapping, so data for solvers whose start this
/// session never saw is discarded.
pub fn dispatch(engine: &mut ReconstructionEngine, event: TraceEvent) {
    match event {
        TraceEvent::SolverFrameStart(start) => {
            engine.start_frame(start);
        }
        TraceEvent::SolverFrameEnd {
            solver,
            cycle,
            time,
        } => {
            if let Some(id) = engine.resolve(solver) {
                engine.end_frame(id, cycle, time);
            }
        }
        TraceEvent::StageStart { solver, name } => {
            if let Some(id) = engine.resolve(solver) {
                engine.start_stage(id, &name);
            }
        }
        TraceEvent::StageEnd {
            solver,
            step_number,
        } => {
            if let Some(id) = engine.resolve(solver) {
                engine.end_stage(id, step_number);
            }
        }
        TraceEvent::EntityDestroyed { solver, entity } => {
            if let Some(id) = engine.resolve(solver) {
                engine.add_destroyed_entity(id, entity);
            }
        }
        TraceEvent::SimulationSpace { solver, transform } => {
            if let Some(id) = engine.resolve(solver) {
                engine.set_simulation_space(id, transform);
            }
        }
        TraceEvent::IdentifierOffset { solver, offset } => {
            if let Some(id) = engine.resolve(solver) {
                engine.set_network_tick_offset(id, offset);
            }
        }
        TraceEvent::IdentifierRollback { payload } => {
            engine.rollback_payload(payload);
        }
        TraceEvent::FeatureFlag { name, enabled } => {
            engine.set_feature_flag(&name, enabled);
        }
        TraceEvent::PayloadStart(start) => {
            engine.begin_payload(start);
        }
        TraceEvent::PayloadContent { payload, data } => {
            engine.append_payload(payload, &data);
        }
        TraceEvent::PayloadEnd { payload } => {
            // Failures are already logged and counted by the engine.
            let _ = engine.finish_payload(payload);
        }
        TraceEvent::OuterFrameStart { kind, cycle, time } => {
            engine.start_outer_frame(kind, cycle, time);
        }
        TraceEvent::OuterFrameEnd { kind, cycle, time } => {
            engine.end_outer_frame(kind, cycle, time);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_route_classifies() {
        let router = EventRouter::new();
        for (logger, name, kind) in ROUTES {
            let raw = RawEvent::new(logger, name, 0.0);
            assert_eq!(router.classify(&raw), Some(kind));
        }
        let stray = RawEvent::new(loggers::FRAME, names::STAGE_START, 0.0);
        assert_eq!(router.classify(&stray), None);
        let unknown = RawEvent::new("Audio", "Play", 0.0);
        assert_eq!(router.classify(&unknown), None);
    }

    #[test]
    fn missing_fields_take_defaults() {
        let raw = RawEvent::new(loggers::PHYSICS_TRACE, names::SOLVER_FRAME_START, 1.5);
        let TraceEvent::SolverFrameStart(start) = extract(EventKind::SolverFrameStart, raw) else {
            panic!("wrong variant");
        };
        assert_eq!(start.solver, SourceSolverId::UNSET);
        assert_eq!(start.cycle, Cycle(0));
        assert!(start.debug_name.is_empty());
        assert!(!start.is_key_frame);
        assert_eq!(start.frame_number, None);
        assert_eq!(start.time, 1.5);

        let raw = RawEvent::new(loggers::PHYSICS_TRACE, names::SIMULATION_SPACE, 0.0);
        let TraceEvent::SimulationSpace { transform, .. } =
            extract(EventKind::SimulationSpace, raw)
        else {
            panic!("wrong variant");
        };
        assert_eq!(transform, Transform::IDENTITY);

        let raw = RawEvent::new(loggers::FRAME, names::BEGIN_FRAME, 0.0);
        assert!(matches!(
            extract(EventKind::OuterFrameStart, raw),
            TraceEvent::OuterFrameStart { kind: -1, .. }
        ));
    }

    #[test]
    fn mistyped_fields_fall_back() {
        let raw = RawEvent::new(loggers::PHYSICS_TRACE, names::ENTITY_DESTROYED, 0.0)
            .with(fields::SOLVER_ID, "seven")
            .with(fields::ENTITY_ID, u64::MAX);
        assert_eq!(
            extract(EventKind::EntityDestroyed, raw),
            TraceEvent::EntityDestroyed {
                solver: SourceSolverId::UNSET,
                entity: EntityId::default(),
            }
        );
    }

    #[test]
    fn payload_fields_extracted() {
        let raw = RawEvent::new(loggers::PHYSICS_TRACE, names::BINARY_PAYLOAD_START, 0.0)
            .with(fields::PAYLOAD_ID, 3i32)
            .with(fields::TYPE_TAG, "EntityBatch")
            .with(fields::DECLARED_SIZE, 10u64);
        let TraceEvent::PayloadStart(start) = extract(EventKind::BinaryPayloadStart, raw) else {
            panic!("wrong variant");
        };
        assert_eq!(start.id, PayloadId(3));
        assert_eq!(start.original_size, 10);
        assert!(!start.compressed);

        let raw = RawEvent::new(loggers::PHYSICS_TRACE, names::BINARY_PAYLOAD_CONTENT, 0.0)
            .with(fields::PAYLOAD_ID, 3i32)
            .with(fields::DATA, vec![1u8, 2, 3]);
        assert_eq!(
            extract(EventKind::BinaryPayloadContent, raw),
            TraceEvent::PayloadContent {
                payload: PayloadId(3),
                data: vec![1, 2, 3],
            }
        );
    }
}
