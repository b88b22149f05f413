//! Collapsing a run of solver frames into a single keyframe.
//!
//! A keyframe holds the full entity state at its frame number, so
//! scrubbing to frame `n` only needs to fold the frames between the
//! nearest keyframe and `n`.

use indexmap::IndexMap;
use rewind_core::{CustomFrameData, EntityId, EntitySnapshot, JointState, SolverFrame, Stage};

/// Name of the single stage carried by collapsed frames.
pub const KEYFRAME_STAGE_NAME: &str = "Keyframe";

/// Running state of a fold over solver frames.
#[derive(Default)]
struct Fold {
    entities: IndexMap<EntityId, EntitySnapshot>,
    joints: IndexMap<i32, JointState>,
    custom: CustomFrameData,
}

impl Fold {
    fn apply(&mut self, frame: &SolverFrame) {
        for stage in &frame.stages {
            for snapshot in stage.entities() {
                self.entities.insert(snapshot.id, snapshot.clone());
            }
            for id in &stage.destroyed {
                self.entities.shift_remove(id);
            }
            for joint in stage.joints() {
                self.joints.insert(joint.joint_id, joint.clone());
            }
        }
        self.custom.merge_from(&frame.custom_data);
    }

    fn finish(self, last: &SolverFrame) -> SolverFrame {
        let mut stage = Stage::auto_generated(KEYFRAME_STAGE_NAME);
        for (_, snapshot) in self.entities {
            stage.upsert_entity(snapshot);
        }
        for (_, joint) in self.joints {
            stage.add_joint(joint);
        }
        stage.close();

        let mut frame = SolverFrame::new(last.solver_id, last.cycle, last.start_time);
        frame.debug_name = last.debug_name.clone();
        frame.frame_number = last.frame_number;
        frame.end_time = last.end_time;
        frame.is_key_frame = true;
        frame.is_resimulated = last.is_resimulated;
        frame.simulation_space = last.simulation_space;
        frame.network_tick_offset = last.network_tick_offset;
        frame.custom_data = self.custom;
        frame.stages.push(stage);
        frame
    }
}

/// Fold `frames` in order into one closed key frame.
///
/// Within each stage, entity snapshots upsert first and the stage's
/// destroyed ids remove afterwards, so an entity destroyed and later
/// re-created survives. The latest state per joint id is kept. Contacts
/// are transient and not carried. Metadata comes from the last frame.
///
/// Returns `None` for an empty input.
pub fn collapse_frames<'a, I>(frames: I) -> Option<SolverFrame>
where
    I: IntoIterator<Item = &'a SolverFrame>,
{
    let mut fold = Fold::default();
    let mut last = None;
    for frame in frames {
        fold.apply(frame);
        last = Some(frame);
    }
    last.map(|last| fold.finish(last))
}
