//! Synthetic trace streams for benchmarking and examples.
//!
//! - [`StreamProfile::reference`]: 4 solvers × 256 entities, 600 frames
//! - [`StreamProfile::stress`]: 16 solvers × 2048 entities, compressed payloads
//! - [`generate`]: turn a profile into raw events
//!
//! Entity motion is a closed-form function of id and cycle, so streams
//! are deterministic without a random source.

#![forbid(unsafe_code)]
#![deny(rustdoc::broken_intra_doc_links)]

use rewind_core::{
    ContactBatch, ContactPair, ContactPoint, EntityId, EntitySnapshot, EntityState, RawEvent,
    SourceSolverId, WireVersion,
};
use rewind_test_utils::payloads;
use rewind_test_utils::EventScript;

/// Shape of a synthetic stream.
#[derive(Clone, Debug, PartialEq)]
pub struct StreamProfile {
    /// Solvers emitting frames.
    pub solvers: i32,
    /// Entities each solver simulates.
    pub entities_per_solver: i32,
    /// Frames per solver.
    pub frames: u64,
    /// Named stages per frame; entity state lands in the last one.
    pub stages: &'static [&'static str],
    /// Contact pairs reported per frame.
    pub contacts_per_frame: i32,
    /// Emit an outer frame every this many solver ticks.
    pub outer_every: u64,
    /// Compress payloads with LZ4.
    pub compress: bool,
    /// Content chunk size for uncompressed payloads.
    pub chunk: usize,
    /// Destroy one entity every this many frames; 0 disables.
    pub destroy_every: u64,
}

const STAGES: &[&str] = &["Broadphase", "Narrowphase", "Integrate"];

impl StreamProfile {
    /// Moderate stream used by the benches and the example.
    pub fn reference() -> Self {
        Self {
            solvers: 4,
            entities_per_solver: 256,
            frames: 600,
            stages: STAGES,
            contacts_per_frame: 32,
            outer_every: 1,
            compress: false,
            chunk: 4096,
            destroy_every: 50,
        }
    }

    /// Larger stream with compressed payloads.
    pub fn stress() -> Self {
        Self {
            solvers: 16,
            entities_per_solver: 2048,
            frames: 300,
            compress: true,
            contacts_per_frame: 256,
            ..Self::reference()
        }
    }

    /// Same shape with a different frame count.
    pub fn with_frames(mut self, frames: u64) -> Self {
        self.frames = frames;
        self
    }
}

/// Position of entity `id` at `cycle`.
pub fn position(id: i32, cycle: u64) -> [f64; 3] {
    let t = cycle as f64 / 60.0;
    let phase = f64::from(id) * 0.37;
    [
        (t + phase).sin() * 10.0,
        f64::from(id % 16),
        (t * 0.5 + phase).cos() * 10.0,
    ]
}

fn entity(id: i32, cycle: u64) -> EntitySnapshot {
    let p0 = position(id, cycle);
    let p1 = position(id, cycle + 1);
    EntitySnapshot {
        id: EntityId(id),
        name_id: id as u64,
        state: if id % 7 == 0 {
            EntityState::Static
        } else {
            EntityState::Dynamic
        },
        position: p0,
        rotation: [0.0, 0.0, 0.0, 1.0],
        linear_velocity: [(p1[0] - p0[0]) * 60.0, 0.0, (p1[2] - p0[2]) * 60.0],
        angular_velocity: [0.0, 0.1, 0.0],
    }
}

/// Raw events for `profile`, solvers interleaved tick by tick.
pub fn generate(profile: &StreamProfile) -> Vec<RawEvent> {
    let mut script = EventScript::new().payload(0, &payloads::header(WireVersion::CURRENT), 64);
    for id in 0..profile.entities_per_solver {
        script = script.payload(0, &payloads::name_entry(id as u64, &format!("Body{id}")), 256);
    }

    let mut payload_id = 1;
    let mut next_payload = || {
        payload_id += 1;
        payload_id
    };

    for cycle in 0..profile.frames {
        if profile.outer_every > 0 && cycle % profile.outer_every == 0 {
            script = script.outer_start(cycle);
        }
        for solver in 0..profile.solvers {
            script = script.frame_start(solver, cycle);
            let last = profile.stages.len().saturating_sub(1);
            for (i, stage) in profile.stages.iter().enumerate() {
                script = script.stage_start(solver, stage);
                if i == last {
                    let entities: Vec<_> = (0..profile.entities_per_solver)
                        .map(|id| entity(id, cycle))
                        .collect();
                    let batch = payloads::entity_batch(solver, &entities, WireVersion::CURRENT);
                    script = emit(script, next_payload(), &batch, profile);

                    if profile.contacts_per_frame > 0 {
                        let contacts = payloads::contact_batch(&contacts(solver, cycle, profile));
                        script = emit(script, next_payload(), &contacts, profile);
                    }
                    if profile.destroy_every > 0 && cycle > 0 && cycle % profile.destroy_every == 0 {
                        let victim = (cycle / profile.destroy_every) as i32
                            % profile.entities_per_solver.max(1);
                        script = script.destroyed(solver, victim);
                    }
                }
                script = script.stage_end(solver, i as i32);
            }
        }
    }
    script.into_events()
}

fn emit(
    script: EventScript,
    id: i32,
    payload: &payloads::EncodedPayload,
    profile: &StreamProfile,
) -> EventScript {
    if profile.compress {
        script.compressed_payload(id, payload)
    } else {
        script.payload(id, payload, profile.chunk)
    }
}

fn contacts(solver: i32, cycle: u64, profile: &StreamProfile) -> ContactBatch {
    let n = profile.entities_per_solver.max(1);
    let pairs = (0..profile.contacts_per_frame)
        .map(|i| {
            let a = (i + cycle as i32) % n;
            let b = (a + 1) % n;
            ContactPair {
                entity_a: EntityId(a),
                entity_b: EntityId(b),
                points: std::iter::once(ContactPoint {
                    position: position(a, cycle),
                    normal: [0.0, 1.0, 0.0],
                    penetration: 0.001,
                })
                .collect(),
            }
        })
        .collect();
    ContactBatch {
        solver: SourceSolverId(solver),
        pairs,
    }
}

/// Number of solver frames a fully flushed session of `profile` commits.
pub fn expected_solver_frames(profile: &StreamProfile) -> usize {
    profile.solvers as usize * profile.frames as usize
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn small_stream_is_deterministic() {
        let profile = StreamProfile {
            solvers: 2,
            entities_per_solver: 4,
            frames: 3,
            ..StreamProfile::reference()
        };
        let a = generate(&profile);
        let b = generate(&profile);
        assert_eq!(a, b);
        assert!(!a.is_empty());
        assert_eq!(expected_solver_frames(&profile), 6);
    }
}
