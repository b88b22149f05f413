//! Payload record types and their wire encodings.
//!
//! Each record arrives as one reassembled binary payload, selected by a
//! type tag string. Records that reference a solver carry the
//! *source-side* solver id; the ingest decoders translate it before
//! attaching anything to a frame.

use std::io::{Read, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use smallvec::SmallVec;

use crate::error::WireError;
use crate::id::{EntityId, SourceSolverId};
use crate::wire::{
    read_bool, read_count, read_f64s, read_str, write_bool, write_count, write_f64s, write_str,
    WireRecord, WireVersion,
};

// ── Type tags ───────────────────────────────────────────────────

/// Type tag for [`SessionHeader`] payloads.
pub const TAG_SESSION_HEADER: &str = "SessionHeader";
/// Type tag for [`EntityBatch`] payloads.
pub const TAG_ENTITY_BATCH: &str = "EntityBatch";
/// Type tag for [`ContactBatch`] payloads.
pub const TAG_CONTACT_BATCH: &str = "ContactBatch";
/// Type tag for [`JointBatch`] payloads.
pub const TAG_JOINT_BATCH: &str = "JointBatch";
/// Type tag for [`SpatialIndexSnapshot`] payloads.
pub const TAG_SPATIAL_INDEX: &str = "SpatialIndex";
/// Type tag for [`NameEntry`] payloads.
pub const TAG_NAME_ENTRY: &str = "NameEntry";

/// Magic bytes at the start of every session header.
pub const HEADER_MAGIC: [u8; 4] = *b"RWND";

// ── SessionHeader ───────────────────────────────────────────────

/// Establishes the wire version for every other payload in the stream.
///
/// Must be decoded before other payloads are interpretable. Streams
/// attached mid-way may never deliver one, in which case the ingest side
/// falls back to [`SessionHeader::default`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionHeader {
    /// Wire version of subsequent payloads.
    pub version: WireVersion,
    /// Free-form description of the producing build.
    pub producer: String,
}

impl Default for SessionHeader {
    fn default() -> Self {
        Self {
            version: WireVersion::CURRENT,
            producer: String::new(),
        }
    }
}

impl WireRecord for SessionHeader {
    fn write_to<W: Write>(&self, w: &mut W, _version: WireVersion) -> Result<(), WireError> {
        w.write_all(&HEADER_MAGIC)?;
        w.write_u16::<LittleEndian>(self.version.0)?;
        write_str(w, &self.producer)
    }

    /// The header is self-versioning: the `version` argument is ignored.
    fn read_from<R: Read>(r: &mut R, _version: WireVersion) -> Result<Self, WireError> {
        let mut magic = [0u8; 4];
        r.read_exact(&mut magic)?;
        if magic != HEADER_MAGIC {
            return Err(WireError::InvalidMagic);
        }
        let version = WireVersion(r.read_u16::<LittleEndian>()?);
        if !version.is_supported() {
            return Err(WireError::UnsupportedVersion {
                found: version.0,
                min: WireVersion::MIN_SUPPORTED.0,
                max: WireVersion::CURRENT.0,
            });
        }
        let producer = read_str(r)?;
        Ok(Self { version, producer })
    }
}

// ── Entities ────────────────────────────────────────────────────

/// Simulation state of an entity at the time of the snapshot.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum EntityState {
    /// Not simulated; moved only by user code.
    #[default]
    Static,
    /// Moved by user code, affects dynamic entities.
    Kinematic,
    /// Fully simulated.
    Dynamic,
    /// Simulated but asleep.
    Sleeping,
}

impl EntityState {
    fn to_wire(self) -> u8 {
        match self {
            Self::Static => 0,
            Self::Kinematic => 1,
            Self::Dynamic => 2,
            Self::Sleeping => 3,
        }
    }

    fn from_wire(v: u8) -> Result<Self, WireError> {
        match v {
            0 => Ok(Self::Static),
            1 => Ok(Self::Kinematic),
            2 => Ok(Self::Dynamic),
            3 => Ok(Self::Sleeping),
            value => Err(WireError::InvalidEnum {
                what: "EntityState",
                value,
            }),
        }
    }
}

/// Latest known state of one entity.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct EntitySnapshot {
    /// Entity id within its solver.
    pub id: EntityId,
    /// Interned debug name (see [`NameEntry`]); `0` when absent.
    pub name_id: u64,
    /// Simulation state.
    pub state: EntityState,
    /// World position.
    pub position: [f64; 3],
    /// Rotation quaternion `(x, y, z, w)`.
    pub rotation: [f64; 4],
    /// Linear velocity.
    pub linear_velocity: [f64; 3],
    /// Angular velocity. Always zero when read from a v1 stream.
    pub angular_velocity: [f64; 3],
}

impl WireRecord for EntitySnapshot {
    fn write_to<W: Write>(&self, w: &mut W, version: WireVersion) -> Result<(), WireError> {
        w.write_i32::<LittleEndian>(self.id.0)?;
        w.write_u64::<LittleEndian>(self.name_id)?;
        w.write_u8(self.state.to_wire())?;
        write_f64s(w, &self.position)?;
        write_f64s(w, &self.rotation)?;
        write_f64s(w, &self.linear_velocity)?;
        if version.has_angular_velocity() {
            write_f64s(w, &self.angular_velocity)?;
        }
        Ok(())
    }

    fn read_from<R: Read>(r: &mut R, version: WireVersion) -> Result<Self, WireError> {
        let id = EntityId(r.read_i32::<LittleEndian>()?);
        let name_id = r.read_u64::<LittleEndian>()?;
        let state = EntityState::from_wire(r.read_u8()?)?;
        let position = read_f64s(r)?;
        let rotation = read_f64s(r)?;
        let linear_velocity = read_f64s(r)?;
        let angular_velocity = if version.has_angular_velocity() {
            read_f64s(r)?
        } else {
            [0.0; 3]
        };
        Ok(Self {
            id,
            name_id,
            state,
            position,
            rotation,
            linear_velocity,
            angular_velocity,
        })
    }
}

/// A batch of entity snapshots produced by one solver during one stage.
#[derive(Clone, Debug, PartialEq)]
pub struct EntityBatch {
    /// Source-side solver id.
    pub solver: SourceSolverId,
    /// Snapshots, in producer order.
    pub entities: Vec<EntitySnapshot>,
}

impl WireRecord for EntityBatch {
    fn write_to<W: Write>(&self, w: &mut W, version: WireVersion) -> Result<(), WireError> {
        w.write_i32::<LittleEndian>(self.solver.0)?;
        write_count(w, self.entities.len())?;
        for entity in &self.entities {
            entity.write_to(w, version)?;
        }
        Ok(())
    }

    fn read_from<R: Read>(r: &mut R, version: WireVersion) -> Result<Self, WireError> {
        let solver = SourceSolverId(r.read_i32::<LittleEndian>()?);
        let (count, prealloc) = read_count(r)?;
        let mut entities = Vec::with_capacity(prealloc);
        for _ in 0..count {
            entities.push(EntitySnapshot::read_from(r, version)?);
        }
        Ok(Self { solver, entities })
    }
}

// ── Contacts ────────────────────────────────────────────────────

/// One manifold point of a contact pair.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ContactPoint {
    /// World-space contact location.
    pub position: [f64; 3],
    /// Contact normal, pointing from the second entity to the first.
    pub normal: [f64; 3],
    /// Penetration depth (positive when overlapping).
    pub penetration: f64,
}

/// A pairwise contact between two entities.
#[derive(Clone, Debug, PartialEq)]
pub struct ContactPair {
    /// First entity.
    pub entity_a: EntityId,
    /// Second entity.
    pub entity_b: EntityId,
    /// Manifold points; most pairs carry four or fewer.
    pub points: SmallVec<[ContactPoint; 4]>,
}

impl WireRecord for ContactPair {
    fn write_to<W: Write>(&self, w: &mut W, _version: WireVersion) -> Result<(), WireError> {
        w.write_i32::<LittleEndian>(self.entity_a.0)?;
        w.write_i32::<LittleEndian>(self.entity_b.0)?;
        write_count(w, self.points.len())?;
        for p in &self.points {
            write_f64s(w, &p.position)?;
            write_f64s(w, &p.normal)?;
            w.write_f64::<LittleEndian>(p.penetration)?;
        }
        Ok(())
    }

    fn read_from<R: Read>(r: &mut R, _version: WireVersion) -> Result<Self, WireError> {
        let entity_a = EntityId(r.read_i32::<LittleEndian>()?);
        let entity_b = EntityId(r.read_i32::<LittleEndian>()?);
        let (count, _) = read_count(r)?;
        let mut points = SmallVec::new();
        for _ in 0..count {
            points.push(ContactPoint {
                position: read_f64s(r)?,
                normal: read_f64s(r)?,
                penetration: r.read_f64::<LittleEndian>()?,
            });
        }
        Ok(Self {
            entity_a,
            entity_b,
            points,
        })
    }
}

/// All contact pairs produced by one solver during one stage.
#[derive(Clone, Debug, PartialEq)]
pub struct ContactBatch {
    /// Source-side solver id.
    pub solver: SourceSolverId,
    /// Contact pairs.
    pub pairs: Vec<ContactPair>,
}

impl WireRecord for ContactBatch {
    fn write_to<W: Write>(&self, w: &mut W, version: WireVersion) -> Result<(), WireError> {
        w.write_i32::<LittleEndian>(self.solver.0)?;
        write_count(w, self.pairs.len())?;
        for pair in &self.pairs {
            pair.write_to(w, version)?;
        }
        Ok(())
    }

    fn read_from<R: Read>(r: &mut R, version: WireVersion) -> Result<Self, WireError> {
        let solver = SourceSolverId(r.read_i32::<LittleEndian>()?);
        let (count, prealloc) = read_count(r)?;
        let mut pairs = Vec::with_capacity(prealloc);
        for _ in 0..count {
            pairs.push(ContactPair::read_from(r, version)?);
        }
        Ok(Self { solver, pairs })
    }
}

// ── Joints ──────────────────────────────────────────────────────

/// Solver state of one joint constraint.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct JointState {
    /// Joint id within its solver.
    pub joint_id: i32,
    /// First constrained entity.
    pub entity_a: EntityId,
    /// Second constrained entity.
    pub entity_b: EntityId,
    /// Accumulated linear impulse.
    pub linear_impulse: [f64; 3],
    /// Accumulated angular impulse.
    pub angular_impulse: [f64; 3],
    /// Whether the joint broke this step.
    pub broken: bool,
}

impl WireRecord for JointState {
    fn write_to<W: Write>(&self, w: &mut W, _version: WireVersion) -> Result<(), WireError> {
        w.write_i32::<LittleEndian>(self.joint_id)?;
        w.write_i32::<LittleEndian>(self.entity_a.0)?;
        w.write_i32::<LittleEndian>(self.entity_b.0)?;
        write_f64s(w, &self.linear_impulse)?;
        write_f64s(w, &self.angular_impulse)?;
        write_bool(w, self.broken)
    }

    fn read_from<R: Read>(r: &mut R, _version: WireVersion) -> Result<Self, WireError> {
        Ok(Self {
            joint_id: r.read_i32::<LittleEndian>()?,
            entity_a: EntityId(r.read_i32::<LittleEndian>()?),
            entity_b: EntityId(r.read_i32::<LittleEndian>()?),
            linear_impulse: read_f64s(r)?,
            angular_impulse: read_f64s(r)?,
            broken: read_bool(r)?,
        })
    }
}

/// All joint states produced by one solver during one stage.
#[derive(Clone, Debug, PartialEq)]
pub struct JointBatch {
    /// Source-side solver id.
    pub solver: SourceSolverId,
    /// Joint states.
    pub joints: Vec<JointState>,
}

impl WireRecord for JointBatch {
    fn write_to<W: Write>(&self, w: &mut W, version: WireVersion) -> Result<(), WireError> {
        w.write_i32::<LittleEndian>(self.solver.0)?;
        write_count(w, self.joints.len())?;
        for joint in &self.joints {
            joint.write_to(w, version)?;
        }
        Ok(())
    }

    fn read_from<R: Read>(r: &mut R, version: WireVersion) -> Result<Self, WireError> {
        let solver = SourceSolverId(r.read_i32::<LittleEndian>()?);
        let (count, prealloc) = read_count(r)?;
        let mut joints = Vec::with_capacity(prealloc);
        for _ in 0..count {
            joints.push(JointState::read_from(r, version)?);
        }
        Ok(Self { solver, joints })
    }
}

// ── Spatial index ───────────────────────────────────────────────

/// One leaf of a solver's broadphase structure.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SpatialNode {
    /// Minimum corner of the node bounds.
    pub min: [f64; 3],
    /// Maximum corner of the node bounds.
    pub max: [f64; 3],
    /// Entities stored in this node.
    pub entities: Vec<EntityId>,
}

/// Snapshot of a solver's spatial acceleration structure.
///
/// Stored as custom frame data on the solver frame rather than in a
/// stage, since it describes the whole step.
#[derive(Clone, Debug, PartialEq)]
pub struct SpatialIndexSnapshot {
    /// Source-side solver id.
    pub solver: SourceSolverId,
    /// Leaf nodes.
    pub nodes: Vec<SpatialNode>,
}

impl WireRecord for SpatialIndexSnapshot {
    fn write_to<W: Write>(&self, w: &mut W, _version: WireVersion) -> Result<(), WireError> {
        w.write_i32::<LittleEndian>(self.solver.0)?;
        write_count(w, self.nodes.len())?;
        for node in &self.nodes {
            write_f64s(w, &node.min)?;
            write_f64s(w, &node.max)?;
            write_count(w, node.entities.len())?;
            for e in &node.entities {
                w.write_i32::<LittleEndian>(e.0)?;
            }
        }
        Ok(())
    }

    fn read_from<R: Read>(r: &mut R, _version: WireVersion) -> Result<Self, WireError> {
        let solver = SourceSolverId(r.read_i32::<LittleEndian>()?);
        let (count, prealloc) = read_count(r)?;
        let mut nodes = Vec::with_capacity(prealloc);
        for _ in 0..count {
            let min = read_f64s(r)?;
            let max = read_f64s(r)?;
            let (entity_count, entity_prealloc) = read_count(r)?;
            let mut entities = Vec::with_capacity(entity_prealloc);
            for _ in 0..entity_count {
                entities.push(EntityId(r.read_i32::<LittleEndian>()?));
            }
            nodes.push(SpatialNode { min, max, entities });
        }
        Ok(Self { solver, nodes })
    }
}

// ── Name table ──────────────────────────────────────────────────

/// One entry of the stream's string-interning table.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NameEntry {
    /// Interned id referenced by other records.
    pub id: u64,
    /// The interned string.
    pub name: String,
}

impl WireRecord for NameEntry {
    fn write_to<W: Write>(&self, w: &mut W, _version: WireVersion) -> Result<(), WireError> {
        w.write_u64::<LittleEndian>(self.id)?;
        write_str(w, &self.name)
    }

    fn read_from<R: Read>(r: &mut R, _version: WireVersion) -> Result<Self, WireError> {
        Ok(Self {
            id: r.read_u64::<LittleEndian>()?,
            name: read_str(r)?,
        })
    }
}
