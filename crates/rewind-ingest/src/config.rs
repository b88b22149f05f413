//! Ingest configuration, validation, and error types.

use rewind_store::{StoreConfig, StoreConfigError};
use thiserror::Error;

/// Configuration for a [`TraceProvider`](crate::TraceProvider) and the
/// sessions it creates.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IngestConfig {
    /// Outer frames held back before committing, so solver data that
    /// arrives after an outer-tick boundary still lands inside it.
    /// Default: 3.
    pub outer_frame_queue_depth: usize,
    /// Discard leading outer frames that precede any solver data.
    /// Default: true.
    pub trim_empty_outer_frames: bool,
    /// The producer's frame-type value that marks world ticks. Other
    /// values are ignored. The numbering belongs to the producer and
    /// must be revalidated when it changes. Default: 0.
    pub outer_frame_kind: u8,
    /// Capacity of the [`IngestThread`](crate::IngestThread) event
    /// channel. Default: 4096.
    pub channel_capacity: usize,
    /// Configuration for recordings created by sessions.
    pub store: StoreConfig,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            outer_frame_queue_depth: 3,
            trim_empty_outer_frames: true,
            outer_frame_kind: 0,
            channel_capacity: 4096,
            store: StoreConfig::default(),
        }
    }
}

impl IngestConfig {
    /// Check structural invariants.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.outer_frame_queue_depth == 0 {
            return Err(ConfigError::ZeroQueueDepth);
        }
        if self.channel_capacity == 0 {
            return Err(ConfigError::ZeroChannelCapacity);
        }
        self.store.validate()?;
        Ok(())
    }
}

/// Rejected [`IngestConfig`] values.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// `outer_frame_queue_depth` must be at least 1.
    #[error("outer_frame_queue_depth must be at least 1")]
    ZeroQueueDepth,
    /// `channel_capacity` must be at least 1.
    #[error("channel_capacity must be at least 1")]
    ZeroChannelCapacity,
    /// The nested store configuration is invalid.
    #[error("store config: {0}")]
    Store(#[from] StoreConfigError),
}
