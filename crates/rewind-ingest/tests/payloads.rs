//! Binary payloads through the full event path: reassembly, decoding,
//! and how failures surface in the session summary.

use std::sync::Arc;

use rewind_core::{
    ContactBatch, ContactPair, ContactPoint, EntityId, JointBatch, JointState, PayloadId,
    SolverId, SourceSolverId, SpatialIndexSnapshot, SpatialNode, Stage, WireVersion,
};
use rewind_ingest::{
    DecodeError, IngestConfig, PayloadError, PayloadStart, ReassemblyError, ReconstructionState,
    TraceProvider,
};
use rewind_store::RecordingReader;
use rewind_test_utils::payloads::{self, EncodedPayload};
use rewind_test_utils::{snapshot, EventScript};
use smallvec::smallvec;

fn session() -> (TraceProvider, RecordingReader) {
    let mut provider = TraceProvider::new(IngestConfig::default()).unwrap();
    let reader = provider.create_session("payloads").unwrap();
    (provider, reader)
}

fn feed(provider: &mut TraceProvider, script: EventScript) {
    for event in script.into_events() {
        provider.on_event(event);
    }
}

/// Header, one frame of solver 0 with a stage, then the next frame start
/// so the first one is committed.
fn one_frame(body: impl FnOnce(EventScript) -> EventScript) -> EventScript {
    let script = EventScript::new()
        .payload(100, &payloads::header(WireVersion::CURRENT), 64)
        .frame_start(0, 0)
        .stage_start(0, "Integrate");
    body(script).stage_end(0, 1).frame_start(0, 1)
}

#[test]
fn chunked_entity_batch_lands_in_open_stage() {
    let (mut provider, reader) = session();
    let batch = payloads::entity_batch(
        0,
        &[snapshot(1, 1.0), snapshot(2, 2.0)],
        WireVersion::CURRENT,
    );
    let len = batch.bytes.len() as u64;
    feed(&mut provider, one_frame(|s| s.payload(1, &batch, 7)));

    let data = reader.read();
    let stage = &data.solver_frame(SolverId(0), 0).unwrap().stages[0];
    assert_eq!(stage.name, "Integrate");
    assert_eq!(stage.entity_count(), 2);
    assert_eq!(stage.entity(EntityId(2)).unwrap().position[0], 2.0);

    let stats = provider.stats().unwrap();
    assert_eq!(stats.payloads_by_type["EntityBatch"], 1);
    assert_eq!(stats.bytes_by_type["EntityBatch"], len);
    assert_eq!(stats.payloads_by_type["SessionHeader"], 1);
}

#[test]
fn compressed_payload_decodes() {
    let (mut provider, reader) = session();
    let entities: Vec<_> = (0..64).map(|i| snapshot(i, 0.5)).collect();
    let batch = payloads::entity_batch(0, &entities, WireVersion::CURRENT);
    feed(&mut provider, one_frame(|s| s.compressed_payload(1, &batch)));

    let data = reader.read();
    assert_eq!(data.solver_frame(SolverId(0), 0).unwrap().stages[0].entity_count(), 64);
    assert!(provider.stats().unwrap().failed_types.is_empty());
}

#[test]
fn batch_outside_stage_creates_in_between_stage() {
    let (mut provider, reader) = session();
    let batch = payloads::entity_batch(0, &[snapshot(5, 0.0)], WireVersion::CURRENT);
    feed(
        &mut provider,
        EventScript::new()
            .frame_start(0, 0)
            .payload(1, &batch, 1024)
            .frame_start(0, 1),
    );
    let data = reader.read();
    let frame = data.solver_frame(SolverId(0), 0).unwrap();
    assert_eq!(frame.stages.len(), 1);
    assert_eq!(frame.stages[0].name, Stage::IN_BETWEEN);
    assert!(frame.stages[0].is_auto_generated());
}

#[test]
fn missing_header_falls_back_to_current_version() {
    let (mut provider, reader) = session();
    let batch = payloads::entity_batch(0, &[snapshot(1, 3.0)], WireVersion::CURRENT);
    feed(
        &mut provider,
        EventScript::new()
            .frame_start(0, 0)
            .payload(1, &batch, 1024)
            .payload(2, &batch, 1024)
            .frame_start(0, 1),
    );
    assert!(provider.engine().unwrap().state().header().is_none());
    assert_eq!(provider.stats().unwrap().payloads_by_type["EntityBatch"], 2);
    assert_eq!(reader.solver_frame_count(SolverId(0)), 1);
}

#[test]
fn old_header_selects_old_layout() {
    let (mut provider, reader) = session();
    let v1 = WireVersion(1);
    let mut entity = snapshot(1, 1.0);
    entity.angular_velocity = [0.0; 3];
    let batch = payloads::entity_batch(0, &[entity.clone()], v1);
    feed(
        &mut provider,
        EventScript::new()
            .payload(1, &payloads::header(v1), 64)
            .frame_start(0, 0)
            .payload(2, &batch, 64)
            .frame_start(0, 1),
    );
    let data = reader.read();
    let stage = &data.solver_frame(SolverId(0), 0).unwrap().stages[0];
    assert_eq!(stage.entity(EntityId(1)), Some(&entity));
}

#[test]
fn contacts_joints_and_spatial_index_decode() {
    let (mut provider, reader) = session();
    let contacts = payloads::contact_batch(&ContactBatch {
        solver: SourceSolverId(0),
        pairs: vec![ContactPair {
            entity_a: EntityId(1),
            entity_b: EntityId(2),
            points: smallvec![ContactPoint {
                position: [0.0, 0.5, 0.0],
                normal: [0.0, 1.0, 0.0],
                penetration: 0.01,
            }],
        }],
    });
    let joints = payloads::joint_batch(&JointBatch {
        solver: SourceSolverId(0),
        joints: vec![JointState {
            joint_id: 9,
            entity_a: EntityId(1),
            entity_b: EntityId(3),
            broken: true,
            ..JointState::default()
        }],
    });
    let spatial = SpatialIndexSnapshot {
        solver: SourceSolverId(0),
        nodes: vec![SpatialNode {
            min: [-1.0; 3],
            max: [1.0; 3],
            entities: vec![EntityId(1), EntityId(2)],
        }],
    };
    let spatial_payload = payloads::spatial_index(&spatial);
    feed(
        &mut provider,
        one_frame(|s| {
            s.payload(1, &contacts, 16)
                .payload(2, &joints, 16)
                .payload(3, &spatial_payload, 16)
        }),
    );

    let data = reader.read();
    let frame = data.solver_frame(SolverId(0), 0).unwrap();
    let stage = &frame.stages[0];
    assert_eq!(stage.contacts_for(EntityId(2)).count(), 1);
    assert_eq!(stage.contacts_for(EntityId(3)).count(), 0);
    assert!(stage.joints_for(EntityId(3)).all(|j| j.broken && j.joint_id == 9));
    assert_eq!(stage.joints_for(EntityId(1)).count(), 1);
    assert_eq!(frame.custom_data.get::<SpatialIndexSnapshot>(), Some(&spatial));
}

#[test]
fn name_entries_fill_the_name_table() {
    let (mut provider, reader) = session();
    feed(
        &mut provider,
        EventScript::new()
            .payload(1, &payloads::name_entry(5, "Crate"), 64)
            .payload(2, &payloads::name_entry(5, "Barrel"), 64)
            .payload(3, &payloads::name_entry(6, "Barrel"), 64),
    );
    let data = reader.read();
    assert_eq!(data.name(5).as_deref(), Some("Crate"));
    assert_eq!(data.name(6).as_deref(), Some("Barrel"));
    assert_eq!(data.name_count(), 2);
}

#[test]
fn data_for_unmapped_solver_is_dropped_quietly() {
    let (mut provider, reader) = session();
    let batch = payloads::entity_batch(3, &[snapshot(1, 0.0)], WireVersion::CURRENT);
    feed(&mut provider, one_frame(|s| s.payload(1, &batch, 64)));

    let data = reader.read();
    assert_eq!(data.solver_frame(SolverId(0), 0).unwrap().stages[0].entity_count(), 0);
    let stats = provider.stats().unwrap();
    assert!(stats.failed_types.is_empty());
    assert_eq!(stats.payloads_by_type["EntityBatch"], 1);
}

#[test]
fn unknown_and_undecodable_types_reach_the_summary() {
    let (mut provider, _reader) = session();
    let cloth = EncodedPayload {
        type_tag: "Cloth",
        bytes: vec![1, 2, 3, 4],
    };
    let garbage = EncodedPayload {
        type_tag: "EntityBatch",
        bytes: vec![0, 0, 0, 0, 9],
    };
    feed(
        &mut provider,
        one_frame(|s| s.payload(1, &cloth, 2).payload(2, &cloth, 2).payload(3, &garbage, 2)),
    );

    let summary = provider.end_session().unwrap();
    assert_eq!(summary.stats.missing_decoders.len(), 1);
    assert!(summary.stats.missing_decoders.contains("Cloth"));
    assert!(summary.stats.failed_types.contains("EntityBatch"));
    assert!(!summary.stats.payloads_by_type.contains_key("EntityBatch"));
    let text = summary.to_string();
    assert!(text.contains("missing decoders: Cloth"));
    assert!(text.contains("failed to deserialize: EntityBatch"));
}

#[test]
fn rolled_back_payload_is_never_decoded() {
    let (mut provider, _reader) = session();
    let batch = payloads::entity_batch(0, &[snapshot(1, 0.0)], WireVersion::CURRENT);
    feed(
        &mut provider,
        one_frame(|s| {
            s.payload_start(1, batch.type_tag, batch.bytes.len(), batch.bytes.len(), false)
                .payload_content(1, &batch.bytes[..4])
                .rollback(1)
                .payload_content(1, &batch.bytes[4..])
                .payload_end(1)
        }),
    );
    let stats = provider.stats().unwrap();
    assert!(!stats.payloads_by_type.contains_key("EntityBatch"));
    assert_eq!(stats.missing_buffers, 2);
}

#[test]
fn overflowing_payload_is_malformed() {
    let (mut provider, _reader) = session();
    feed(
        &mut provider,
        EventScript::new()
            .payload_start(1, "EntityBatch", 2, 2, false)
            .payload_content(1, &[1, 2, 3])
            .payload_end(1),
    );
    let stats = provider.stats().unwrap();
    assert_eq!(stats.malformed_events, 1);
    assert_eq!(stats.missing_buffers, 1);
}

#[test]
fn second_decode_of_same_payload_is_not_found() {
    let (mut provider, _reader) = session();
    let engine = provider.engine_mut().unwrap();
    let id = PayloadId(11);
    let bytes = payloads::name_entry(1, "Once").bytes;
    engine.begin_payload(PayloadStart {
        id,
        type_tag: "NameEntry".into(),
        declared_size: bytes.len(),
        original_size: bytes.len(),
        compressed: false,
    });
    engine.append_payload(id, &bytes);
    assert!(engine.finish_payload(id).is_ok());
    assert!(matches!(
        engine.decode_payload(id),
        Err(PayloadError::Reassembly(ReassemblyError::NotFound { id: missing })) if missing == id
    ));
    assert_eq!(engine.stats().payloads_by_type["NameEntry"], 1);
}

#[test]
fn custom_decoders_receive_state() {
    let (mut provider, reader) = session();
    provider.register_decoder(
        "Marker",
        |data: &[u8], state: &mut ReconstructionState| -> Result<(), DecodeError> {
            let source = SourceSolverId(i32::from(data[0]));
            let frame = state.open_frame_for_source(source).ok_or(DecodeError::Rejected {
                reason: "no open frame".into(),
            })?;
            frame.custom_data.insert(Arc::<str>::from("marked"));
            Ok(())
        },
    );
    let marker = EncodedPayload {
        type_tag: "Marker",
        bytes: vec![0],
    };
    feed(&mut provider, one_frame(|s| s.payload(1, &marker, 1)));
    let data = reader.read();
    let frame = data.solver_frame(SolverId(0), 0).unwrap();
    assert_eq!(frame.custom_data.get::<Arc<str>>().map(|s| &**s), Some("marked"));
}
