//! Hand-built frames and entity snapshots.

use rewind_core::{Cycle, EntityId, EntitySnapshot, EntityState, SolverFrame, SolverId, Stage};

/// Seconds per simulated tick in fixtures.
pub const DT: f64 = 1.0 / 60.0;

/// A dynamic entity at `(x, 0, 0)`.
pub fn snapshot(id: i32, x: f64) -> EntitySnapshot {
    EntitySnapshot {
        id: EntityId(id),
        name_id: 0,
        state: EntityState::Dynamic,
        position: [x, 0.0, 0.0],
        rotation: [0.0, 0.0, 0.0, 1.0],
        linear_velocity: [0.0; 3],
        angular_velocity: [0.0; 3],
    }
}

/// Builder for closed solver frames.
///
/// Entity and destroy calls apply to the most recent stage, opening an
/// explicit stage named `"Step"` if none exists yet.
pub struct FrameBuilder {
    frame: SolverFrame,
}

impl FrameBuilder {
    pub fn new(solver: i32, cycle: u64) -> Self {
        Self {
            frame: SolverFrame::new(SolverId(solver), Cycle(cycle), cycle as f64 * DT),
        }
    }

    pub fn key(mut self) -> Self {
        self.frame.is_key_frame = true;
        self
    }

    pub fn name(mut self, name: &str) -> Self {
        self.frame.debug_name = name.to_owned();
        self
    }

    pub fn stage(mut self, name: &str) -> Self {
        self.frame.close_open_stage();
        self.frame.push_stage(Stage::explicit(name));
        self
    }

    pub fn entity(mut self, id: i32, x: f64) -> Self {
        self.current_stage().upsert_entity(snapshot(id, x));
        self
    }

    pub fn destroy(mut self, id: i32) -> Self {
        self.current_stage().destroyed.insert(EntityId(id));
        self.frame.add_destroyed(EntityId(id));
        self
    }

    pub fn build(mut self) -> SolverFrame {
        self.frame.close_open_stage();
        self.frame
    }

    fn current_stage(&mut self) -> &mut Stage {
        if self.frame.stages.is_empty() {
            self.frame.push_stage(Stage::explicit("Step"));
        }
        let last = self.frame.stages.len() - 1;
        &mut self.frame.stages[last]
    }
}
