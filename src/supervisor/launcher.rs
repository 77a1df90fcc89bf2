//! Launcher abstraction between the executor and the process pool.
//!
//! The executor never spawns processes itself; it asks the injected factory
//! for a launcher and hands it the item stream. The stock factory builds the
//! tokio-backed [`ProcessSupervisor`](crate::supervisor::ProcessSupervisor);
//! tests substitute their own.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::logger::ProgressLogger;
use crate::supervisor::{ChildOutputHandler, ProcessSupervisor, SupervisorError, WorkerCommand};

/// Periodic bookkeeping hook invoked by the pool on every reap pass.
///
/// Lets hosts integrate timers, signal checks or UI refreshes without
/// running their own thread.
pub trait ProcessTick: Send + Sync {
    /// Called once per reap pass.
    fn tick(&self);
}

impl<F> ProcessTick for F
where
    F: Fn() + Send + Sync,
{
    fn tick(&self) {
        self();
    }
}

/// Everything a launcher needs to run one batch of segments.
pub struct Launch {
    /// Command used to start each worker.
    pub command: WorkerCommand,
    /// Working directory for workers, if overridden.
    pub working_directory: Option<PathBuf>,
    /// Environment overlay for workers; `None` means inherit only.
    pub extra_environment: Option<HashMap<String, String>>,
    /// Maximum number of concurrently running workers.
    pub process_limit: usize,
    /// Number of items streamed to one worker before its stdin is closed.
    pub segment_size: u64,
    /// Grace period a stopped worker gets before it is killed outright.
    pub terminate_timeout: Duration,
    /// Logger receiving lifecycle events.
    pub logger: Arc<dyn ProgressLogger>,
    /// Receiver of raw worker output chunks.
    pub output: Arc<dyn ChildOutputHandler>,
    /// Invoked on every reap pass for host bookkeeping.
    pub tick: Arc<dyn ProcessTick>,
}

/// Runs a stream of items to completion across worker processes.
#[async_trait]
pub trait ProcessLauncher: Send {
    /// Distribute `items` across workers and return once every spawned
    /// worker has terminated.
    ///
    /// # Errors
    ///
    /// Returns an error if a worker cannot be spawned or wired up.
    async fn run(
        &mut self,
        items: Box<dyn Iterator<Item = String> + Send>,
    ) -> Result<(), SupervisorError>;
}

/// Factory producing a [`ProcessLauncher`] for one execution.
pub trait ProcessLauncherFactory: Send + Sync {
    /// Build a launcher for the given launch parameters.
    fn create(&self, launch: Launch) -> Box<dyn ProcessLauncher>;
}

/// Stock factory producing the tokio-backed process pool.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioProcessLauncherFactory;

impl ProcessLauncherFactory for TokioProcessLauncherFactory {
    fn create(&self, launch: Launch) -> Box<dyn ProcessLauncher> {
        Box::new(ProcessSupervisor::new(launch))
    }
}
