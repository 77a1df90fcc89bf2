//! Executor façade: role dispatch, planning and wiring.
//!
//! [`Executor::execute`] is the single entry point. A worker invocation
//! consumes its stdin; a coordinator invocation fetches items, plans the
//! run, and either processes in-process or hands the item stream to the
//! process pool.

mod input;
mod spec;

pub use input::*;
pub use spec::*;

use std::sync::Arc;

use crate::batch::ChunkedItemIterator;
use crate::config::{plan, Configuration};
use crate::logger::ProgressLogger;
use crate::supervisor::{Launch, OutputDemultiplexer, SupervisorError};
use crate::worker::{LoggerSink, SymbolWriter, WorkerError, WorkerLoop};
use crate::BoxError;

/// Error type for one execution.
#[derive(thiserror::Error, Debug)]
pub enum ExecuteError {
    /// A construction or input invariant was violated.
    #[error(transparent)]
    Invariant(#[from] InvariantError),
    /// The item source failed.
    #[error("Failed to fetch items: {0}")]
    Fetch(#[source] BoxError),
    /// A run-level lifecycle hook failed.
    #[error("Lifecycle hook failed: {0}")]
    Hook(#[source] BoxError),
    /// The worker loop failed.
    #[error(transparent)]
    Worker(#[from] WorkerError),
    /// The process pool failed.
    #[error(transparent)]
    Supervisor(#[from] SupervisorError),
    /// Reading the worker input stream failed.
    #[error("Failed to read worker input: {0}")]
    ChildInput(#[from] std::io::Error),
}

/// Two-role batch executor.
///
/// Owns an [`ExecutorSpec`] for the duration of one
/// [`execute`](Executor::execute) call.
pub struct Executor {
    spec: ExecutorSpec,
}

impl Executor {
    /// Create an executor over a validated spec.
    #[must_use]
    pub fn new(spec: ExecutorSpec) -> Self {
        Self { spec }
    }

    /// Run one invocation and return its exit code.
    ///
    /// Dispatches on the input's role: workers consume their item stream,
    /// the coordinator plans and distributes.
    ///
    /// # Errors
    ///
    /// Returns an error on invariant violations, item-source failures,
    /// hook failures, or when the pool cannot spawn workers. Per-item
    /// action failures are not errors; they surface in the exit code.
    pub async fn execute(
        &mut self,
        input: &ParallelizationInput,
        logger: Arc<dyn ProgressLogger>,
    ) -> Result<u8, ExecuteError> {
        if input.is_child() {
            self.execute_worker(input, logger).await
        } else {
            self.execute_coordinator(input, logger).await
        }
    }

    /// Worker role: read items from the child source stream and process
    /// them, signalling progress on stdout.
    async fn execute_worker(
        &mut self,
        input: &ParallelizationInput,
        logger: Arc<dyn ProgressLogger>,
    ) -> Result<u8, ExecuteError> {
        let batch_size = input.batch_size.unwrap_or(self.spec.batch_size);
        let source: ChildSourceStream = match self.spec.child_source.take() {
            Some(source) => source,
            None => Box::new(tokio::io::stdin()),
        };

        let items = ChunkedItemIterator::from_stream(source, batch_size).await?;
        let mut sink = SymbolWriter::new(tokio::io::stdout(), self.spec.progress_symbol);
        let mut worker = WorkerLoop::new(
            self.spec.runner.as_ref(),
            self.spec.error_handler.as_ref(),
            self.spec.hooks.as_mut(),
            logger,
        );
        Ok(worker.process(&items, &mut sink).await?)
    }

    /// Coordinator role: fetch, validate, plan, distribute, report.
    async fn execute_coordinator(
        &mut self,
        input: &ParallelizationInput,
        logger: Arc<dyn ProgressLogger>,
    ) -> Result<u8, ExecuteError> {
        self.spec
            .hooks
            .before_first_command(logger.as_ref())
            .map_err(ExecuteError::Hook)?;

        let batch_size = input.batch_size.unwrap_or(self.spec.batch_size);
        let segment_size = input.segment_size.unwrap_or(self.spec.segment_size);
        if batch_size < 1 {
            return Err(InvariantError::InvalidBatchSize(batch_size).into());
        }
        if segment_size < 1 {
            return Err(InvariantError::InvalidSegmentSize(segment_size).into());
        }

        let items = self.build_iterator(input, batch_size)?;
        for item in items.items() {
            validate_item(item)?;
        }

        let configuration = plan(
            !input.should_be_processed_in_main_process(),
            items.total_items(),
            input.number_of_processes,
            segment_size,
        );
        logger.log_configuration(&configuration);
        logger.log_start(configuration.total_items);

        let exit_code = if configuration.should_spawn_children {
            self.run_pool(input, &configuration, items, Arc::clone(&logger))
                .await?;
            // Per-worker exit codes surface through logger events, not here.
            0
        } else {
            let mut sink = LoggerSink::new(Arc::clone(&logger));
            let mut worker = WorkerLoop::new(
                self.spec.runner.as_ref(),
                self.spec.error_handler.as_ref(),
                self.spec.hooks.as_mut(),
                Arc::clone(&logger),
            );
            worker.process(&items, &mut sink).await?
        };

        logger.log_finish(&self.spec.item_name);
        self.spec
            .hooks
            .after_last_command(logger.as_ref())
            .map_err(ExecuteError::Hook)?;

        Ok(exit_code)
    }

    fn build_iterator(
        &self,
        input: &ParallelizationInput,
        batch_size: usize,
    ) -> Result<ChunkedItemIterator, ExecuteError> {
        if let Some(item) = &input.item {
            return Ok(ChunkedItemIterator::from_item(item.clone()));
        }
        match &self.spec.items {
            Some(source) => ChunkedItemIterator::from_callable(source.as_ref(), batch_size)
                .map_err(ExecuteError::Fetch),
            None => Err(InvariantError::MissingItemSource.into()),
        }
    }

    /// Distribute the items across worker processes.
    async fn run_pool(
        &mut self,
        input: &ParallelizationInput,
        configuration: &Configuration,
        items: ChunkedItemIterator,
        logger: Arc<dyn ProgressLogger>,
    ) -> Result<(), ExecuteError> {
        let factory = self
            .spec
            .child_command_factory
            .as_ref()
            .ok_or(InvariantError::MissingChildCommandFactory)?;
        let command = factory.create_child_command(input);

        let output = Arc::new(OutputDemultiplexer::new(
            self.spec.progress_symbol,
            Arc::clone(&logger),
        ));
        let launch = Launch {
            command,
            working_directory: self.spec.working_directory.clone(),
            extra_environment: self.spec.extra_environment.clone(),
            process_limit: configuration.number_of_processes,
            segment_size: configuration.segment_size,
            terminate_timeout: self.spec.terminate_timeout,
            logger,
            output,
            tick: Arc::clone(&self.spec.tick),
        };

        let mut launcher = self.spec.launcher_factory.create(launch);
        launcher.run(Box::new(items.into_items())).await?;
        Ok(())
    }
}
