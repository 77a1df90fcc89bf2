//! Single-process item consumer.
//!
//! The worker loop processes batches sequentially: batch hooks around the
//! items, the per-item action for each item, one progress tick per attempted
//! item. Action failures are routed through the error handler and contribute
//! to the exit code instead of aborting the loop.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::io::{AsyncWrite, AsyncWriteExt};

use crate::batch::ChunkedItemIterator;
use crate::executor::{CommandRunner, ErrorHandler};
use crate::hooks::LifecycleHooks;
use crate::logger::ProgressLogger;
use crate::BoxError;

/// Highest exit code a worker reports; contributions beyond it saturate.
pub const MAX_EXIT_CODE: u64 = 255;

/// Error type for the worker loop.
#[derive(thiserror::Error, Debug)]
pub enum WorkerError {
    /// A batch hook failed.
    #[error("Batch hook failed: {0}")]
    Hook(#[source] BoxError),
    /// Emitting a progress tick failed.
    #[error("Failed to emit progress: {0}")]
    Progress(#[from] std::io::Error),
}

/// Destination for one progress tick per processed item.
#[async_trait]
pub trait ProgressSink: Send {
    /// Record that one item was attempted.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the tick cannot be delivered.
    async fn advance(&mut self) -> std::io::Result<()>;
}

/// Sink writing the progress symbol to a byte stream, the worker-role wire
/// signal read by the coordinator.
pub struct SymbolWriter<W> {
    writer: W,
    symbol: char,
}

impl<W> SymbolWriter<W>
where
    W: AsyncWrite + Unpin + Send,
{
    /// Create a sink writing `symbol` per item to `writer`.
    pub fn new(writer: W, symbol: char) -> Self {
        Self { writer, symbol }
    }
}

#[async_trait]
impl<W> ProgressSink for SymbolWriter<W>
where
    W: AsyncWrite + Unpin + Send,
{
    async fn advance(&mut self) -> std::io::Result<()> {
        let mut encoded = [0u8; 4];
        let bytes = self.symbol.encode_utf8(&mut encoded).as_bytes();
        self.writer.write_all(bytes).await?;
        self.writer.flush().await
    }
}

/// Sink advancing the logger directly, used for in-process runs.
pub struct LoggerSink {
    logger: Arc<dyn ProgressLogger>,
}

impl LoggerSink {
    /// Create a sink reporting to `logger`.
    #[must_use]
    pub fn new(logger: Arc<dyn ProgressLogger>) -> Self {
        Self { logger }
    }
}

#[async_trait]
impl ProgressSink for LoggerSink {
    async fn advance(&mut self) -> std::io::Result<()> {
        self.logger.log_advance(1);
        Ok(())
    }
}

/// Sequential batch processor for one worker's share of items.
pub struct WorkerLoop<'a> {
    runner: &'a dyn CommandRunner,
    error_handler: &'a dyn ErrorHandler,
    hooks: &'a mut dyn LifecycleHooks,
    logger: Arc<dyn ProgressLogger>,
}

impl<'a> WorkerLoop<'a> {
    /// Create a worker loop over the given collaborators.
    pub fn new(
        runner: &'a dyn CommandRunner,
        error_handler: &'a dyn ErrorHandler,
        hooks: &'a mut dyn LifecycleHooks,
        logger: Arc<dyn ProgressLogger>,
    ) -> Self {
        Self {
            runner,
            error_handler,
            hooks,
            logger,
        }
    }

    /// Process every batch of `items`, reporting one tick per item to
    /// `sink`.
    ///
    /// Returns the worker exit code: the error handler's contributions
    /// summed and capped at [`MAX_EXIT_CODE`].
    ///
    /// # Errors
    ///
    /// Returns an error when a batch hook fails or a progress tick cannot
    /// be delivered. Per-item action failures are handled and never
    /// propagate.
    pub async fn process(
        &mut self,
        items: &ChunkedItemIterator,
        sink: &mut dyn ProgressSink,
    ) -> Result<u8, WorkerError> {
        let mut exit_code: u64 = 0;

        for batch in items.batches() {
            self.hooks
                .before_batch(batch, self.logger.as_ref())
                .map_err(WorkerError::Hook)?;

            for item in batch {
                exit_code = exit_code.saturating_add(self.run_tolerant(item));
                sink.advance().await?;
            }

            self.hooks
                .after_batch(batch, self.logger.as_ref())
                .map_err(WorkerError::Hook)?;
        }

        Ok(exit_code.min(MAX_EXIT_CODE) as u8)
    }

    /// Attempt one item; failures go to the error handler, whose return
    /// value is the item's exit-code contribution.
    fn run_tolerant(&self, item: &str) -> u64 {
        match self.runner.run_single_command(item) {
            Ok(()) => 0,
            Err(error) => {
                u64::from(self.error_handler.handle_error(item, error, self.logger.as_ref()))
            }
        }
    }
}
