//! Progress logging seam between the engine and its host.
//!
//! The engine never formats output itself; everything observable about a run
//! flows through [`ProgressLogger`]. Hosts plug in progress bars, plain-line
//! reporters or recorders. [`TracingLogger`] is the stock implementation and
//! emits structured `tracing` events; [`NullLogger`] discards everything.

use crate::config::Configuration;

/// Which child stream a chunk of output arrived on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputStreamKind {
    /// Standard output.
    Out,
    /// Standard error.
    Err,
}

impl OutputStreamKind {
    /// Short label for log output.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Out => "stdout",
            Self::Err => "stderr",
        }
    }
}

/// Sink for everything a run reports while executing.
///
/// Implementations are shared across the coordinator and the per-child
/// output reader tasks, so they must synchronize internally.
pub trait ProgressLogger: Send + Sync {
    /// Report the realized configuration before work starts.
    fn log_configuration(&self, configuration: &Configuration);

    /// Report the start of processing with the total item count.
    fn log_start(&self, total_items: u64);

    /// Advance the progress counter by `delta` processed items.
    fn log_advance(&self, delta: u64);

    /// Report the end of processing.
    fn log_finish(&self, item_name: &str);

    /// Report that a child process was started with the given command line.
    fn log_command_started(&self, command: &str);

    /// Report that a child process terminated.
    ///
    /// `exit_code` is the process's code when the platform reports one;
    /// signal deaths carry `None`. Per-worker codes reach the host only
    /// through this event, they are never folded into the coordinator's
    /// own exit code.
    fn log_command_finished(&self, exit_code: Option<i32>);

    /// Report child output that is not made of progress symbols.
    fn log_unexpected_child_process_output(
        &self,
        index: usize,
        pid: Option<u32>,
        kind: OutputStreamKind,
        chunk: &str,
        progress_symbol: char,
    );
}

/// Logger that emits structured `tracing` events.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingLogger;

impl ProgressLogger for TracingLogger {
    fn log_configuration(&self, configuration: &Configuration) {
        tracing::info!(
            should_spawn_children = configuration.should_spawn_children,
            number_of_processes = configuration.number_of_processes,
            segment_size = configuration.segment_size,
            number_of_segments = configuration.number_of_segments,
            total_items = configuration.total_items,
            "Planned execution"
        );
    }

    fn log_start(&self, total_items: u64) {
        tracing::info!(total_items, "Processing started");
    }

    fn log_advance(&self, delta: u64) {
        tracing::trace!(delta, "Progress");
    }

    fn log_finish(&self, item_name: &str) {
        tracing::info!(item_name, "Processing finished");
    }

    fn log_command_started(&self, command: &str) {
        tracing::debug!(%command, "Worker started");
    }

    fn log_command_finished(&self, exit_code: Option<i32>) {
        tracing::debug!(exit_code, "Worker finished");
    }

    fn log_unexpected_child_process_output(
        &self,
        index: usize,
        pid: Option<u32>,
        kind: OutputStreamKind,
        chunk: &str,
        progress_symbol: char,
    ) {
        tracing::warn!(
            child = index,
            pid,
            stream = kind.label(),
            %chunk,
            %progress_symbol,
            "Unexpected child process output"
        );
    }
}

/// Logger that discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullLogger;

impl ProgressLogger for NullLogger {
    fn log_configuration(&self, _configuration: &Configuration) {}
    fn log_start(&self, _total_items: u64) {}
    fn log_advance(&self, _delta: u64) {}
    fn log_finish(&self, _item_name: &str) {}
    fn log_command_started(&self, _command: &str) {}
    fn log_command_finished(&self, _exit_code: Option<i32>) {}
    fn log_unexpected_child_process_output(
        &self,
        _index: usize,
        _pid: Option<u32>,
        _kind: OutputStreamKind,
        _chunk: &str,
        _progress_symbol: char,
    ) {
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stream_kind_labels() {
        assert_eq!(OutputStreamKind::Out.label(), "stdout");
        assert_eq!(OutputStreamKind::Err.label(), "stderr");
    }

    #[test]
    fn test_null_logger_accepts_everything() {
        let logger = NullLogger;
        logger.log_start(3);
        logger.log_advance(1);
        logger.log_finish("item");
        logger.log_command_started("worker --child");
        logger.log_command_finished(Some(0));
        logger.log_unexpected_child_process_output(0, None, OutputStreamKind::Err, "oops", '.');
    }
}
