//! Builder for raw trace event streams.

use rewind_core::event::{fields, loggers, names};
use rewind_core::RawEvent;

use crate::fixtures::DT;
use crate::payloads::{self, EncodedPayload};

/// Outer-frame kind value used by default in scripts.
pub const DEFAULT_OUTER_KIND: u8 = 0;

/// Accumulates [`RawEvent`]s with a monotonically advancing clock.
///
/// Each event is stamped `DT / 8` after the previous one so time-based
/// queries see a strictly ordered stream.
pub struct EventScript {
    events: Vec<RawEvent>,
    time: f64,
    outer_kind: u8,
}

impl EventScript {
    pub fn new() -> Self {
        Self {
            events: Vec::new(),
            time: 0.0,
            outer_kind: DEFAULT_OUTER_KIND,
        }
    }

    /// Use `kind` for subsequent outer-frame events.
    pub fn outer_kind(mut self, kind: u8) -> Self {
        self.outer_kind = kind;
        self
    }

    fn physics(&mut self, name: &str) -> RawEvent {
        self.time += DT / 8.0;
        RawEvent::new(loggers::PHYSICS_TRACE, name, self.time)
    }

    pub fn push(mut self, event: RawEvent) -> Self {
        self.time = self.time.max(event.time);
        self.events.push(event);
        self
    }

    pub fn outer_start(mut self, cycle: u64) -> Self {
        self.time += DT / 8.0;
        let ev = RawEvent::new(loggers::FRAME, names::BEGIN_FRAME, self.time)
            .with(fields::FRAME_TYPE, self.outer_kind)
            .with(fields::CYCLE, cycle);
        self.push(ev)
    }

    pub fn outer_end(mut self, cycle: u64) -> Self {
        self.time += DT / 8.0;
        let ev = RawEvent::new(loggers::FRAME, names::END_FRAME, self.time)
            .with(fields::FRAME_TYPE, self.outer_kind)
            .with(fields::CYCLE, cycle);
        self.push(ev)
    }

    pub fn frame_start(mut self, solver: i32, cycle: u64) -> Self {
        let ev = self
            .physics(names::SOLVER_FRAME_START)
            .with(fields::SOLVER_ID, solver)
            .with(fields::CYCLE, cycle)
            .with(fields::DEBUG_NAME, format!("Solver{solver}"));
        self.push(ev)
    }

    pub fn key_frame_start(mut self, solver: i32, cycle: u64) -> Self {
        let ev = self
            .physics(names::SOLVER_FRAME_START)
            .with(fields::SOLVER_ID, solver)
            .with(fields::CYCLE, cycle)
            .with(fields::DEBUG_NAME, format!("Solver{solver}"))
            .with(fields::IS_KEY_FRAME, true);
        self.push(ev)
    }

    pub fn frame_end(mut self, solver: i32, cycle: u64) -> Self {
        let ev = self
            .physics(names::SOLVER_FRAME_END)
            .with(fields::SOLVER_ID, solver)
            .with(fields::CYCLE, cycle);
        self.push(ev)
    }

    pub fn stage_start(mut self, solver: i32, name: &str) -> Self {
        let ev = self
            .physics(names::STAGE_START)
            .with(fields::SOLVER_ID, solver)
            .with(fields::STEP_NAME, name);
        self.push(ev)
    }

    pub fn stage_end(mut self, solver: i32, step_number: i32) -> Self {
        let ev = self
            .physics(names::STAGE_END)
            .with(fields::SOLVER_ID, solver)
            .with(fields::STEP_NUMBER, step_number);
        self.push(ev)
    }

    pub fn destroyed(mut self, solver: i32, entity: i32) -> Self {
        let ev = self
            .physics(names::ENTITY_DESTROYED)
            .with(fields::SOLVER_ID, solver)
            .with(fields::ENTITY_ID, entity);
        self.push(ev)
    }

    pub fn simulation_space(mut self, solver: i32, position: [f64; 3], rotation: [f64; 4]) -> Self {
        let ev = self
            .physics(names::SIMULATION_SPACE)
            .with(fields::SOLVER_ID, solver)
            .with(fields::POSITION, position)
            .with(fields::ROTATION, rotation);
        self.push(ev)
    }

    pub fn identifier_offset(mut self, solver: i32, offset: i32) -> Self {
        let ev = self
            .physics(names::IDENTIFIER_OFFSET)
            .with(fields::SOLVER_ID, solver)
            .with(fields::OFFSET, offset);
        self.push(ev)
    }

    pub fn rollback(mut self, payload: i32) -> Self {
        let ev = self
            .physics(names::IDENTIFIER_ROLLBACK)
            .with(fields::PAYLOAD_ID, payload);
        self.push(ev)
    }

    pub fn feature_flag(mut self, name: &str, enabled: bool) -> Self {
        let ev = self
            .physics(names::FEATURE_FLAG)
            .with(fields::NAME, name)
            .with(fields::ENABLED, enabled);
        self.push(ev)
    }

    pub fn payload_start(
        mut self,
        id: i32,
        tag: &str,
        declared: usize,
        original: usize,
        compressed: bool,
    ) -> Self {
        let ev = self
            .physics(names::BINARY_PAYLOAD_START)
            .with(fields::PAYLOAD_ID, id)
            .with(fields::TYPE_TAG, tag)
            .with(fields::DECLARED_SIZE, declared as u64)
            .with(fields::ORIGINAL_SIZE, original as u64)
            .with(fields::IS_COMPRESSED, compressed);
        self.push(ev)
    }

    pub fn payload_content(mut self, id: i32, bytes: &[u8]) -> Self {
        let ev = self
            .physics(names::BINARY_PAYLOAD_CONTENT)
            .with(fields::PAYLOAD_ID, id)
            .with(fields::DATA, bytes);
        self.push(ev)
    }

    pub fn payload_end(mut self, id: i32) -> Self {
        let ev = self
            .physics(names::BINARY_PAYLOAD_END)
            .with(fields::PAYLOAD_ID, id);
        self.push(ev)
    }

    /// Emit a complete uncompressed payload, split into `chunk`-byte pieces.
    pub fn payload(self, id: i32, payload: &EncodedPayload, chunk: usize) -> Self {
        let len = payload.bytes.len();
        let mut script = self.payload_start(id, payload.type_tag, len, len, false);
        for piece in payload.bytes.chunks(chunk.max(1)) {
            script = script.payload_content(id, piece);
        }
        script.payload_end(id)
    }

    /// Emit a complete LZ4-compressed payload in one chunk.
    pub fn compressed_payload(self, id: i32, payload: &EncodedPayload) -> Self {
        let packed = payloads::compress(&payload.bytes);
        self.payload_start(id, payload.type_tag, packed.len(), payload.bytes.len(), true)
            .payload_content(id, &packed)
            .payload_end(id)
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn into_events(self) -> Vec<RawEvent> {
        self.events
    }
}

impl Default for EventScript {
    fn default() -> Self {
        Self::new()
    }
}
