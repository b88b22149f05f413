//! Strongly-typed identifiers used across a recording.
//!
//! Source-side ids are volatile: two solver instances in the traced
//! process may reuse the same small integer. Recording-local ids are
//! stable and collision-free for the lifetime of a recording.

use std::fmt;

/// Solver identifier as assigned by the traced process.
///
/// Only meaningful within one trace stream. Translated to a [`SolverId`]
/// by the ingest remapper before anything is stored.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SourceSolverId(pub i32);

impl SourceSolverId {
    /// Sentinel for "no solver id present on the event".
    pub const UNSET: Self = Self(-1);

    /// Whether this id is the [`UNSET`](Self::UNSET) sentinel.
    pub fn is_unset(self) -> bool {
        self == Self::UNSET
    }
}

impl fmt::Display for SourceSolverId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i32> for SourceSolverId {
    fn from(v: i32) -> Self {
        Self(v)
    }
}

/// Stable, recording-local solver identifier.
///
/// Unique for the lifetime of a recording, even when several trace
/// streams are merged into it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SolverId(pub i32);

impl SolverId {
    /// Sentinel for "no stable id".
    pub const UNSET: Self = Self(-1);

    /// Whether this id is the [`UNSET`](Self::UNSET) sentinel.
    pub fn is_unset(self) -> bool {
        self == Self::UNSET
    }
}

impl fmt::Display for SolverId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i32> for SolverId {
    fn from(v: i32) -> Self {
        Self(v)
    }
}

/// Identifies a simulated entity (particle, body) within one solver.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityId(pub i32);

impl Default for EntityId {
    fn default() -> Self {
        Self(-1)
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i32> for EntityId {
    fn from(v: i32) -> Self {
        Self(v)
    }
}

/// Transient id of a chunked binary payload.
///
/// Only valid between the payload's start and end events.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PayloadId(pub i32);

impl PayloadId {
    /// Sentinel for "no payload id present on the event".
    pub const UNSET: Self = Self(-1);
}

impl fmt::Display for PayloadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i32> for PayloadId {
    fn from(v: i32) -> Self {
        Self(v)
    }
}

/// Monotonic source tick counter attached to frame boundaries.
///
/// Solver frames and outer frames share this clock, which is what
/// allows cycle-based lookups across the two timelines.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Cycle(pub u64);

impl fmt::Display for Cycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for Cycle {
    fn from(v: u64) -> Self {
        Self(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unset_sentinels() {
        assert!(SourceSolverId::UNSET.is_unset());
        assert!(SolverId::UNSET.is_unset());
        assert!(!SourceSolverId(0).is_unset());
        assert!(!SolverId(7).is_unset());
    }

    #[test]
    fn cycles_order_numerically() {
        assert!(Cycle(3) < Cycle(10));
        assert_eq!(Cycle::from(5), Cycle(5));
        assert_eq!(Cycle::default(), Cycle(0));
    }
}
