//! Configuration types.

use serde::Serialize;

/// Realized operational configuration for one execution.
///
/// Produced by [`plan`](crate::config::plan) from the problem size and the
/// caller's requested sizing. Immutable once computed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Configuration {
    /// Whether work is distributed to child processes.
    pub should_spawn_children: bool,
    /// Number of child processes to run concurrently (1 in-process).
    pub number_of_processes: usize,
    /// Number of items streamed to one child before its stdin is closed.
    pub segment_size: u64,
    /// Number of segments the item set divides into.
    pub number_of_segments: u64,
    /// Total number of items to process.
    pub total_items: u64,
}
