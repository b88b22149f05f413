//! Raw trace events as delivered by the transport.
//!
//! A [`RawEvent`] is untyped: a logger name, an event name, a timestamp
//! and a bag of named fields. Classification into typed events happens
//! in the ingest router; the vocabulary constants live here so producers
//! and test fixtures spell names the same way.

use indexmap::IndexMap;
use smallvec::SmallVec;

/// Logger (channel) names.
pub mod loggers {
    /// Solver-side physics tracing.
    pub const PHYSICS_TRACE: &str = "PhysicsTrace";
    /// The world's own frame markers.
    pub const FRAME: &str = "Frame";
}

/// Event names.
pub mod names {
    /// A solver began a step.
    pub const SOLVER_FRAME_START: &str = "SolverFrameStart";
    /// A solver finished a step.
    pub const SOLVER_FRAME_END: &str = "SolverFrameEnd";
    /// A stage began within the open solver frame.
    pub const STAGE_START: &str = "StageStart";
    /// The open stage ended.
    pub const STAGE_END: &str = "StageEnd";
    /// An entity was destroyed.
    pub const ENTITY_DESTROYED: &str = "EntityDestroyed";
    /// The solver's simulation space changed.
    pub const SIMULATION_SPACE: &str = "SimulationSpace";
    /// Solver tick to network tick offset.
    pub const IDENTIFIER_OFFSET: &str = "IdentifierOffset";
    /// The producer discarded a speculative payload.
    pub const IDENTIFIER_ROLLBACK: &str = "IdentifierRollback";
    /// A producer feature was toggled.
    pub const FEATURE_FLAG: &str = "FeatureFlag";
    /// A chunked payload begins.
    pub const BINARY_PAYLOAD_START: &str = "BinaryPayloadStart";
    /// One chunk of a payload.
    pub const BINARY_PAYLOAD_CONTENT: &str = "BinaryPayloadContent";
    /// A chunked payload is complete.
    pub const BINARY_PAYLOAD_END: &str = "BinaryPayloadEnd";
    /// World tick start (logger [`FRAME`](super::loggers::FRAME)).
    pub const BEGIN_FRAME: &str = "BeginFrame";
    /// World tick end (logger [`FRAME`](super::loggers::FRAME)).
    pub const END_FRAME: &str = "EndFrame";
}

/// Field names.
pub mod fields {
    #![allow(missing_docs)]

    pub const SOLVER_ID: &str = "SolverId";
    pub const CYCLE: &str = "Cycle";
    pub const DEBUG_NAME: &str = "DebugName";
    pub const IS_KEY_FRAME: &str = "IsKeyFrame";
    pub const IS_RESIMULATED: &str = "IsReSimulated";
    pub const FRAME_NUMBER: &str = "FrameNumber";
    pub const STEP_NAME: &str = "StepName";
    pub const STEP_NUMBER: &str = "StepNumber";
    pub const ENTITY_ID: &str = "EntityId";
    pub const POSITION: &str = "Position";
    pub const ROTATION: &str = "Rotation";
    pub const OFFSET: &str = "Offset";
    pub const PAYLOAD_ID: &str = "PayloadId";
    pub const NAME: &str = "Name";
    pub const ENABLED: &str = "Enabled";
    pub const TYPE_TAG: &str = "TypeTag";
    pub const DECLARED_SIZE: &str = "DeclaredSize";
    pub const ORIGINAL_SIZE: &str = "OriginalSize";
    pub const IS_COMPRESSED: &str = "IsCompressed";
    pub const DATA: &str = "Data";
    pub const FRAME_TYPE: &str = "FrameType";
}

/// One field value of a raw event.
#[derive(Clone, Debug, PartialEq)]
pub enum FieldValue {
    /// Signed integer.
    Int(i64),
    /// Unsigned integer.
    UInt(u64),
    /// Floating point.
    Float(f64),
    /// Boolean.
    Bool(bool),
    /// UTF-8 string.
    Str(String),
    /// Raw bytes.
    Bytes(Vec<u8>),
    /// Short float vector (positions, quaternions).
    FloatArray(SmallVec<[f64; 4]>),
}

impl FieldValue {
    /// Integer view. Unsigned values that do not fit are rejected.
    pub fn as_i64(&self) -> Option<i64> {
        match *self {
            Self::Int(v) => Some(v),
            Self::UInt(v) => i64::try_from(v).ok(),
            _ => None,
        }
    }

    /// Unsigned view. Negative values are rejected.
    pub fn as_u64(&self) -> Option<u64> {
        match *self {
            Self::UInt(v) => Some(v),
            Self::Int(v) => u64::try_from(v).ok(),
            _ => None,
        }
    }

    /// Float view; integers widen.
    pub fn as_f64(&self) -> Option<f64> {
        match *self {
            Self::Float(v) => Some(v),
            Self::Int(v) => Some(v as f64),
            Self::UInt(v) => Some(v as f64),
            _ => None,
        }
    }

    /// Boolean view; integers are true when non-zero.
    pub fn as_bool(&self) -> Option<bool> {
        match *self {
            Self::Bool(v) => Some(v),
            Self::Int(v) => Some(v != 0),
            Self::UInt(v) => Some(v != 0),
            _ => None,
        }
    }

    /// String view.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Float-array view.
    pub fn as_floats(&self) -> Option<&[f64]> {
        match self {
            Self::FloatArray(v) => Some(v),
            _ => None,
        }
    }
}

macro_rules! field_from {
    ($($t:ty => $variant:ident as $conv:ty),* $(,)?) => {
        $(impl From<$t> for FieldValue {
            fn from(v: $t) -> Self {
                Self::$variant(<$conv>::from(v))
            }
        })*
    };
}

field_from! {
    i32 => Int as i64,
    i64 => Int as i64,
    u8 => UInt as u64,
    u32 => UInt as u64,
    u64 => UInt as u64,
    f64 => Float as f64,
    bool => Bool as bool,
    String => Str as String,
    Vec<u8> => Bytes as Vec<u8>,
}

impl From<&str> for FieldValue {
    fn from(v: &str) -> Self {
        Self::Str(v.to_owned())
    }
}

impl From<&[u8]> for FieldValue {
    fn from(v: &[u8]) -> Self {
        Self::Bytes(v.to_vec())
    }
}

impl<const N: usize> From<[f64; N]> for FieldValue {
    fn from(v: [f64; N]) -> Self {
        Self::FloatArray(SmallVec::from_slice(&v))
    }
}

/// An untyped trace event.
#[derive(Clone, Debug, PartialEq)]
pub struct RawEvent {
    /// Logger (channel) the event was emitted on.
    pub logger: String,
    /// Event name within the logger.
    pub name: String,
    /// Producer timestamp in seconds.
    pub time: f64,
    /// Named fields in emission order.
    pub fields: IndexMap<String, FieldValue>,
}

impl RawEvent {
    /// An event with no fields.
    pub fn new(logger: impl Into<String>, name: impl Into<String>, time: f64) -> Self {
        Self {
            logger: logger.into(),
            name: name.into(),
            time,
            fields: IndexMap::new(),
        }
    }

    /// Builder-style field setter.
    pub fn with(mut self, field: &str, value: impl Into<FieldValue>) -> Self {
        self.fields.insert(field.to_owned(), value.into());
        self
    }

    /// Look up a field.
    pub fn field(&self, name: &str) -> Option<&FieldValue> {
        self.fields.get(name)
    }

    /// Remove and return a byte field without copying it.
    pub fn take_bytes(&mut self, name: &str) -> Option<Vec<u8>> {
        match self.fields.swap_remove(name) {
            Some(FieldValue::Bytes(b)) => Some(b),
            Some(other) => {
                self.fields.insert(name.to_owned(), other);
                None
            }
            None => None,
        }
    }
}
