//! Executor specification and its builder.
//!
//! The spec bundles every capability the engine consumes: the per-item
//! action, the item source, lifecycle hooks, the error-handling policy,
//! sizing, and the process-spawning collaborators. It is built once and
//! lives for one `execute` invocation.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::AsyncRead;

use crate::batch::ItemSource;
use crate::hooks::{LifecycleHooks, NoopHooks};
use crate::logger::ProgressLogger;
use crate::supervisor::{
    ProcessLauncherFactory, ProcessTick, TokioProcessLauncherFactory, WorkerCommand,
    DEFAULT_TERMINATE_TIMEOUT,
};
use crate::executor::ParallelizationInput;
use crate::BoxError;

/// Default number of items per batch.
pub const DEFAULT_BATCH_SIZE: usize = 50;

/// Default number of items per segment.
pub const DEFAULT_SEGMENT_SIZE: u64 = 50;

/// Default progress symbol emitted per processed item.
pub const DEFAULT_PROGRESS_SYMBOL: char = '.';

/// Byte stream a worker invocation reads its items from.
pub type ChildSourceStream = Box<dyn AsyncRead + Send + Unpin>;

/// The per-item action.
pub trait CommandRunner: Send + Sync {
    /// Process one item.
    ///
    /// # Errors
    ///
    /// Implementation-defined; routed through the [`ErrorHandler`].
    fn run_single_command(&self, item: &str) -> Result<(), BoxError>;
}

impl<F> CommandRunner for F
where
    F: Fn(&str) -> Result<(), BoxError> + Send + Sync,
{
    fn run_single_command(&self, item: &str) -> Result<(), BoxError> {
        self(item)
    }
}

/// Policy deciding what a failed item contributes to the exit code.
pub trait ErrorHandler: Send + Sync {
    /// Handle a per-item failure; the return value is added to the worker
    /// exit code.
    fn handle_error(&self, item: &str, error: BoxError, logger: &dyn ProgressLogger) -> u32;
}

/// Error handler that logs the failure and contributes a fixed amount.
#[derive(Debug, Clone, Copy)]
pub struct LoggingErrorHandler {
    contribution: u32,
}

impl LoggingErrorHandler {
    /// Handler contributing `contribution` per failed item.
    #[must_use]
    pub fn new(contribution: u32) -> Self {
        Self { contribution }
    }
}

impl Default for LoggingErrorHandler {
    fn default() -> Self {
        Self { contribution: 1 }
    }
}

impl ErrorHandler for LoggingErrorHandler {
    fn handle_error(&self, item: &str, error: BoxError, _logger: &dyn ProgressLogger) -> u32 {
        tracing::error!(%item, %error, "Item failed");
        self.contribution
    }
}

/// Produces the command line that re-enters the program in the worker role.
pub trait ChildCommandFactory: Send + Sync {
    /// Build the worker command for this invocation.
    fn create_child_command(&self, input: &ParallelizationInput) -> WorkerCommand;
}

impl<F> ChildCommandFactory for F
where
    F: Fn(&ParallelizationInput) -> WorkerCommand + Send + Sync,
{
    fn create_child_command(&self, input: &ParallelizationInput) -> WorkerCommand {
        self(input)
    }
}

/// Error type for violated construction and input invariants.
#[derive(thiserror::Error, Debug)]
pub enum InvariantError {
    /// Batch size below 1.
    #[error("Batch size must be at least 1, got {0}")]
    InvalidBatchSize(usize),
    /// Segment size below 1.
    #[error("Segment size must be at least 1, got {0}")]
    InvalidSegmentSize(u64),
    /// Progress symbol is not exactly one code point.
    #[error("Progress symbol must be exactly one character, got {0:?}")]
    InvalidProgressSymbol(String),
    /// An item carries the wire frame separator.
    #[error("Item must not contain a newline: {0:?}")]
    ItemContainsNewline(String),
    /// An item is empty.
    #[error("Item must not be empty")]
    EmptyItem,
    /// Neither an item source nor a single item was provided.
    #[error("No item source configured and no single item provided")]
    MissingItemSource,
    /// Spawn mode reached without a child command factory.
    #[error("Spawning children requires a child command factory")]
    MissingChildCommandFactory,
}

/// Check that an item is valid for the worker wire format.
///
/// # Errors
///
/// Returns an [`InvariantError`] for an empty item or one containing the
/// newline frame separator.
pub fn validate_item(item: &str) -> Result<(), InvariantError> {
    if item.is_empty() {
        return Err(InvariantError::EmptyItem);
    }
    if item.contains('\n') {
        return Err(InvariantError::ItemContainsNewline(item.to_string()));
    }
    Ok(())
}

/// Immutable bundle of capabilities and sizing for one execution.
///
/// Built with [`ExecutorSpecBuilder`].
pub struct ExecutorSpec {
    pub(crate) items: Option<Box<dyn ItemSource>>,
    pub(crate) runner: Box<dyn CommandRunner>,
    pub(crate) item_name: String,
    pub(crate) error_handler: Box<dyn ErrorHandler>,
    pub(crate) child_source: Option<ChildSourceStream>,
    pub(crate) batch_size: usize,
    pub(crate) segment_size: u64,
    pub(crate) progress_symbol: char,
    pub(crate) hooks: Box<dyn LifecycleHooks>,
    pub(crate) child_command_factory: Option<Box<dyn ChildCommandFactory>>,
    pub(crate) working_directory: Option<PathBuf>,
    pub(crate) extra_environment: Option<HashMap<String, String>>,
    pub(crate) terminate_timeout: Duration,
    pub(crate) launcher_factory: Box<dyn ProcessLauncherFactory>,
    pub(crate) tick: Arc<dyn ProcessTick>,
}

impl ExecutorSpec {
    /// Start building a spec around the per-item action.
    #[must_use]
    pub fn builder(runner: impl CommandRunner + 'static) -> ExecutorSpecBuilder {
        ExecutorSpecBuilder::new(runner)
    }

    /// The configured batch size.
    #[must_use]
    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// The configured segment size.
    #[must_use]
    pub fn segment_size(&self) -> u64 {
        self.segment_size
    }

    /// The configured progress symbol.
    #[must_use]
    pub fn progress_symbol(&self) -> char {
        self.progress_symbol
    }
}

/// Builder for [`ExecutorSpec`].
pub struct ExecutorSpecBuilder {
    items: Option<Box<dyn ItemSource>>,
    runner: Box<dyn CommandRunner>,
    item_name: String,
    error_handler: Box<dyn ErrorHandler>,
    child_source: Option<ChildSourceStream>,
    batch_size: usize,
    segment_size: u64,
    progress_symbol: String,
    hooks: Box<dyn LifecycleHooks>,
    child_command_factory: Option<Box<dyn ChildCommandFactory>>,
    working_directory: Option<PathBuf>,
    extra_environment: Option<HashMap<String, String>>,
    terminate_timeout: Duration,
    launcher_factory: Box<dyn ProcessLauncherFactory>,
    tick: Arc<dyn ProcessTick>,
}

impl ExecutorSpecBuilder {
    /// Create a builder with the given per-item action and defaults for
    /// everything else.
    #[must_use]
    pub fn new(runner: impl CommandRunner + 'static) -> Self {
        Self {
            items: None,
            runner: Box::new(runner),
            item_name: "item".to_string(),
            error_handler: Box::new(LoggingErrorHandler::default()),
            child_source: None,
            batch_size: DEFAULT_BATCH_SIZE,
            segment_size: DEFAULT_SEGMENT_SIZE,
            progress_symbol: DEFAULT_PROGRESS_SYMBOL.to_string(),
            hooks: Box::new(NoopHooks),
            child_command_factory: None,
            working_directory: None,
            extra_environment: None,
            terminate_timeout: DEFAULT_TERMINATE_TIMEOUT,
            launcher_factory: Box::new(TokioProcessLauncherFactory),
            tick: Arc::new(|| {}),
        }
    }

    /// Set the item source invoked once per coordinator run.
    #[must_use]
    pub fn items(mut self, source: impl ItemSource + 'static) -> Self {
        self.items = Some(Box::new(source));
        self
    }

    /// Set the noun used when reporting completion.
    #[must_use]
    pub fn item_name(mut self, name: impl Into<String>) -> Self {
        self.item_name = name.into();
        self
    }

    /// Set the per-item error-handling policy.
    #[must_use]
    pub fn error_handler(mut self, handler: impl ErrorHandler + 'static) -> Self {
        self.error_handler = Box::new(handler);
        self
    }

    /// Set the stream a worker invocation reads items from.
    ///
    /// Defaults to the process's standard input.
    #[must_use]
    pub fn child_source(mut self, source: impl AsyncRead + Send + Unpin + 'static) -> Self {
        self.child_source = Some(Box::new(source));
        self
    }

    /// Set the number of items per batch.
    #[must_use]
    pub fn batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Set the number of items streamed to one worker.
    #[must_use]
    pub fn segment_size(mut self, segment_size: u64) -> Self {
        self.segment_size = segment_size;
        self
    }

    /// Set the progress symbol; must be exactly one character.
    #[must_use]
    pub fn progress_symbol(mut self, symbol: impl Into<String>) -> Self {
        self.progress_symbol = symbol.into();
        self
    }

    /// Set the lifecycle hooks.
    #[must_use]
    pub fn hooks(mut self, hooks: impl LifecycleHooks + 'static) -> Self {
        self.hooks = Box::new(hooks);
        self
    }

    /// Set the factory producing the worker command line.
    #[must_use]
    pub fn child_command_factory(mut self, factory: impl ChildCommandFactory + 'static) -> Self {
        self.child_command_factory = Some(Box::new(factory));
        self
    }

    /// Set the working directory for workers.
    #[must_use]
    pub fn working_directory(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_directory = Some(dir.into());
        self
    }

    /// Set environment variables overlaid on the inherited environment of
    /// each worker.
    #[must_use]
    pub fn extra_environment(mut self, env: HashMap<String, String>) -> Self {
        self.extra_environment = Some(env);
        self
    }

    /// Set the grace period a stopped worker gets before it is killed.
    #[must_use]
    pub fn terminate_timeout(mut self, timeout: Duration) -> Self {
        self.terminate_timeout = timeout;
        self
    }

    /// Set the factory producing the process launcher.
    #[must_use]
    pub fn process_launcher_factory(
        mut self,
        factory: impl ProcessLauncherFactory + 'static,
    ) -> Self {
        self.launcher_factory = Box::new(factory);
        self
    }

    /// Set the periodic bookkeeping hook run by the pool.
    #[must_use]
    pub fn process_tick(mut self, tick: impl ProcessTick + 'static) -> Self {
        self.tick = Arc::new(tick);
        self
    }

    /// Validate and build the spec.
    ///
    /// # Errors
    ///
    /// Returns an [`InvariantError`] when the batch size or segment size is
    /// below 1, or the progress symbol is not exactly one character.
    pub fn build(self) -> Result<ExecutorSpec, InvariantError> {
        if self.batch_size < 1 {
            return Err(InvariantError::InvalidBatchSize(self.batch_size));
        }
        if self.segment_size < 1 {
            return Err(InvariantError::InvalidSegmentSize(self.segment_size));
        }

        let mut symbols = self.progress_symbol.chars();
        let progress_symbol = match (symbols.next(), symbols.next()) {
            (Some(symbol), None) => symbol,
            _ => {
                return Err(InvariantError::InvalidProgressSymbol(self.progress_symbol));
            }
        };

        Ok(ExecutorSpec {
            items: self.items,
            runner: self.runner,
            item_name: self.item_name,
            error_handler: self.error_handler,
            child_source: self.child_source,
            batch_size: self.batch_size,
            segment_size: self.segment_size,
            progress_symbol,
            hooks: self.hooks,
            child_command_factory: self.child_command_factory,
            working_directory: self.working_directory,
            extra_environment: self.extra_environment,
            terminate_timeout: self.terminate_timeout,
            launcher_factory: self.launcher_factory,
            tick: self.tick,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop_runner() -> impl CommandRunner {
        |_item: &str| -> Result<(), BoxError> { Ok(()) }
    }

    #[test]
    fn test_builder_defaults() {
        let spec = ExecutorSpec::builder(noop_runner()).build().unwrap();
        assert_eq!(spec.batch_size(), DEFAULT_BATCH_SIZE);
        assert_eq!(spec.segment_size(), DEFAULT_SEGMENT_SIZE);
        assert_eq!(spec.progress_symbol(), '.');
    }

    #[test]
    fn test_zero_batch_size_rejected() {
        let result = ExecutorSpec::builder(noop_runner()).batch_size(0).build();
        assert!(matches!(result, Err(InvariantError::InvalidBatchSize(0))));
    }

    #[test]
    fn test_zero_segment_size_rejected() {
        let result = ExecutorSpec::builder(noop_runner()).segment_size(0).build();
        assert!(matches!(result, Err(InvariantError::InvalidSegmentSize(0))));
    }

    #[test]
    fn test_multi_character_progress_symbol_rejected() {
        let result = ExecutorSpec::builder(noop_runner())
            .progress_symbol("ab")
            .build();
        assert!(matches!(
            result,
            Err(InvariantError::InvalidProgressSymbol(_))
        ));
    }

    #[test]
    fn test_empty_progress_symbol_rejected() {
        let result = ExecutorSpec::builder(noop_runner())
            .progress_symbol("")
            .build();
        assert!(matches!(
            result,
            Err(InvariantError::InvalidProgressSymbol(_))
        ));
    }

    #[test]
    fn test_multi_byte_progress_symbol_accepted() {
        let spec = ExecutorSpec::builder(noop_runner())
            .progress_symbol("▪")
            .build()
            .unwrap();
        assert_eq!(spec.progress_symbol(), '▪');
    }

    #[test]
    fn test_validate_item_rejects_newline() {
        assert!(matches!(
            validate_item("a\nb"),
            Err(InvariantError::ItemContainsNewline(_))
        ));
    }

    #[test]
    fn test_validate_item_rejects_empty() {
        assert!(matches!(validate_item(""), Err(InvariantError::EmptyItem)));
    }

    #[test]
    fn test_validate_item_accepts_plain() {
        assert!(validate_item("src/main.rs").is_ok());
    }
}
