//! Store configuration.

use crate::error::StoreConfigError;

/// Tuning for a [`Recording`](crate::Recording).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StoreConfig {
    /// Maximum distance, in frames, between two keyframes of one solver
    /// before a synthetic keyframe is generated. Default: 5.
    pub keyframe_interval: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            keyframe_interval: 5,
        }
    }
}

impl StoreConfig {
    /// Check structural invariants.
    pub fn validate(&self) -> Result<(), StoreConfigError> {
        if self.keyframe_interval == 0 {
            return Err(StoreConfigError::ZeroKeyframeInterval);
        }
        Ok(())
    }
}
