//! Per-invocation input resolved by the frontend.

/// What one invocation of the program asked the engine to do.
///
/// Built by the frontend from its command line; the engine only reads it.
/// The `child` flag is what the child command factory adds to the
/// coordinator's own invocation so that re-entry lands in the worker role.
#[derive(Debug, Clone, Default)]
pub struct ParallelizationInput {
    /// Whether this invocation is a worker feeding off its stdin.
    pub child: bool,
    /// A single item to process, bypassing the item source.
    pub item: Option<String>,
    /// Per-invocation batch size override.
    pub batch_size: Option<usize>,
    /// Per-invocation segment size override.
    pub segment_size: Option<u64>,
    /// Requested number of worker processes.
    pub number_of_processes: Option<usize>,
    /// Whether the caller asked to process everything in the main process.
    pub main_process: bool,
}

impl ParallelizationInput {
    /// Input for a coordinator invocation with defaults everywhere.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Input for a worker invocation.
    #[must_use]
    pub fn for_child() -> Self {
        Self {
            child: true,
            ..Self::default()
        }
    }

    /// Input that processes exactly one item.
    #[must_use]
    pub fn for_item(item: impl Into<String>) -> Self {
        Self {
            item: Some(item.into()),
            ..Self::default()
        }
    }

    /// Whether this invocation is a worker.
    #[must_use]
    pub fn is_child(&self) -> bool {
        self.child
    }

    /// Whether all items should be processed without spawning children.
    ///
    /// True when the caller asked for it or when a single item was passed
    /// on the invocation itself; one item never justifies a worker process.
    #[must_use]
    pub fn should_be_processed_in_main_process(&self) -> bool {
        self.main_process || self.item.is_some()
    }
}
