//! Store error types.

use rewind_core::SolverId;
use thiserror::Error;

/// Errors from recording queries and keyframe generation.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum StoreError {
    /// No frames have been recorded for this solver.
    #[error("unknown solver {solver}")]
    UnknownSolver {
        /// The solver that was looked up.
        solver: SolverId,
    },
    /// A frame number past the end of the solver's frame array.
    #[error("frame {frame} out of range for solver {solver} ({len} frames)")]
    FrameOutOfRange {
        /// The solver that was looked up.
        solver: SolverId,
        /// The requested frame number.
        frame: usize,
        /// Number of frames recorded for the solver.
        len: usize,
    },
    /// A frame range whose start lies after its end.
    #[error("invalid frame range {from}..={to}")]
    InvalidRange {
        /// First frame of the range.
        from: usize,
        /// Last frame of the range.
        to: usize,
    },
}

/// Rejected [`StoreConfig`](crate::StoreConfig) values.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum StoreConfigError {
    /// `keyframe_interval` must be at least 1.
    #[error("keyframe_interval must be at least 1")]
    ZeroKeyframeInterval,
}
