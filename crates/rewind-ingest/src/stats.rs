//! Per-session decode statistics and the end-of-session summary.

use std::fmt;

use indexmap::{IndexMap, IndexSet};

/// Counters accumulated while a session runs.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DecodeStats {
    /// Uncompressed bytes successfully decoded, per type tag.
    pub bytes_by_type: IndexMap<String, u64>,
    /// Payloads successfully decoded, per type tag.
    pub payloads_by_type: IndexMap<String, u64>,
    /// Type tags seen with no registered decoder.
    pub missing_decoders: IndexSet<String>,
    /// Type tags whose decoder failed at least once.
    pub failed_types: IndexSet<String>,
    /// Raw events received.
    pub events: u64,
    /// Raw events with no route.
    pub unrouted_events: u64,
    /// Solver-scoped events for a solver this session never saw start.
    pub unmapped_events: u64,
    /// Events that broke a stream invariant.
    pub malformed_events: u64,
    /// Stage protocol violations that were repaired.
    pub contract_violations: u64,
    /// Payload events that referenced no live buffer.
    pub missing_buffers: u64,
    /// Leading outer frames discarded for lack of solver data.
    pub discarded_outer_frames: u64,
}

impl DecodeStats {
    /// Record a successful decode.
    pub fn record_decoded(&mut self, tag: &str, bytes: usize) {
        *self.bytes_by_type.entry(tag.to_owned()).or_default() += bytes as u64;
        *self.payloads_by_type.entry(tag.to_owned()).or_default() += 1;
    }

    /// Total uncompressed bytes decoded.
    pub fn total_bytes(&self) -> u64 {
        self.bytes_by_type.values().sum()
    }
}

/// What a session produced, logged and returned when it ends.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionSummary {
    /// Recording name.
    pub name: String,
    /// Solvers with at least one committed frame.
    pub solvers: usize,
    /// Committed solver frames across all solvers.
    pub solver_frames: usize,
    /// Committed outer frames.
    pub outer_frames: usize,
    /// Decode counters.
    pub stats: DecodeStats,
}

impl fmt::Display for SessionSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "session {:?}: {} solvers, {} solver frames, {} outer frames, {} events",
            self.name, self.solvers, self.solver_frames, self.outer_frames, self.stats.events
        )?;
        for (tag, bytes) in &self.stats.bytes_by_type {
            let count = self.stats.payloads_by_type.get(tag).copied().unwrap_or(0);
            writeln!(f, "  {tag}: {count} payloads, {bytes} bytes")?;
        }
        if !self.stats.missing_decoders.is_empty() {
            let tags: Vec<&str> = self.stats.missing_decoders.iter().map(String::as_str).collect();
            writeln!(f, "  missing decoders: {}", tags.join(", "))?;
        }
        if !self.stats.failed_types.is_empty() {
            let tags: Vec<&str> = self.stats.failed_types.iter().map(String::as_str).collect();
            writeln!(f, "  failed to deserialize: {}", tags.join(", "))?;
        }
        write!(
            f,
            "  malformed {}, contract violations {}, missing buffers {}, unmapped {}, unrouted {}",
            self.stats.malformed_events,
            self.stats.contract_violations,
            self.stats.missing_buffers,
            self.stats.unmapped_events,
            self.stats.unrouted_events
        )
    }
}
