//! Bounded pool of worker processes fed one segment each over stdin.
//!
//! The pool owns the full lifecycle of its children: spawn below the
//! process limit, stream one segment of items into a child's stdin, close
//! the pipe as the end-of-input signal, and reap terminated children
//! eagerly so fresh ones can take their slot. Child output never blocks the
//! feed loop; per-stream reader tasks forward chunks to the injected output
//! handler as they arrive.

use std::time::Duration;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::process::ChildStdin;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::logger::OutputStreamKind;
use crate::supervisor::{
    spawn_output_reader, ChildHandle, Launch, ProcessLauncher, SpawnError,
};

/// Pause between reap passes while waiting for a pool slot or for the last
/// children to exit.
pub const POLL_INTERVAL: Duration = Duration::from_millis(1);

/// Default grace period stopped workers get before they are killed
/// outright; see [`Launch::terminate_timeout`](crate::supervisor::Launch).
pub const DEFAULT_TERMINATE_TIMEOUT: Duration = Duration::from_secs(5);

/// Error type for pool operations.
#[derive(thiserror::Error, Debug)]
pub enum SupervisorError {
    /// A worker failed to spawn.
    #[error("Failed to spawn worker: {0}")]
    Spawn(#[from] SpawnError),
    /// A spawned worker exposed no stdin pipe.
    #[error("Worker stdin not available")]
    NoStdin,
    /// The run was cancelled via its cancellation token.
    #[error("Run cancelled")]
    Cancelled,
}

/// Counters accumulated across one run of the pool.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolStats {
    /// Workers spawned.
    pub children_spawned: usize,
    /// Workers observed terminated and released.
    pub children_reaped: usize,
    /// Items written to worker stdins.
    pub items_dispatched: u64,
    /// Segments completed by closing a worker's stdin.
    pub segments_closed: u64,
}

/// One running worker owned by the pool.
struct RunningChild {
    index: usize,
    pid: Option<u32>,
    handle: ChildHandle,
    readers: Vec<JoinHandle<()>>,
}

/// Tokio-backed bounded pool of worker processes.
///
/// Built from a [`Launch`] by the stock
/// [`TokioProcessLauncherFactory`](crate::supervisor::TokioProcessLauncherFactory).
pub struct ProcessSupervisor {
    launch: Launch,
    cancel: Option<CancellationToken>,
    next_index: usize,
    running: Vec<RunningChild>,
    stats: PoolStats,
}

impl ProcessSupervisor {
    /// Create a pool for the given launch parameters.
    #[must_use]
    pub fn new(launch: Launch) -> Self {
        Self {
            launch,
            cancel: None,
            next_index: 0,
            running: Vec::new(),
            stats: PoolStats::default(),
        }
    }

    /// Set a cancellation token for graceful shutdown.
    ///
    /// When the token fires, the open stdin sink is closed and every running
    /// worker is terminated and reaped before `run` returns; workers are
    /// never orphaned.
    #[must_use]
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = Some(cancel);
        self
    }

    /// Counters accumulated so far.
    #[must_use]
    pub fn stats(&self) -> PoolStats {
        self.stats
    }

    fn is_cancelled(&self) -> bool {
        self.cancel
            .as_ref()
            .is_some_and(CancellationToken::is_cancelled)
    }

    /// Feed every item to a worker, rotating workers at segment boundaries.
    async fn dispatch(
        &mut self,
        items: Box<dyn Iterator<Item = String> + Send>,
    ) -> Result<(), SupervisorError> {
        let mut sink: Option<ChildStdin> = None;
        let mut written: u64 = 0;

        for item in items {
            debug_assert!(!item.contains('\n'));

            if self.is_cancelled() {
                return Err(SupervisorError::Cancelled);
            }

            if written == self.launch.segment_size && sink.is_some() {
                // Closing the pipe is the end-of-segment signal; the worker
                // drains its remaining items and exits.
                sink = None;
                self.stats.segments_closed += 1;
            }

            loop {
                let mut stdin = match sink.take() {
                    Some(stdin) => stdin,
                    None => {
                        written = 0;
                        self.acquire_sink().await?
                    }
                };

                match Self::write_item(&mut stdin, &item).await {
                    Ok(()) => {
                        written += 1;
                        self.stats.items_dispatched += 1;
                        sink = Some(stdin);
                        break;
                    }
                    Err(error) => {
                        // The worker died mid-segment; its undelivered items
                        // are lost with it. The current item goes to a fresh
                        // worker instead.
                        tracing::warn!(%error, "Write to worker stdin failed, redispatching item");
                    }
                }
            }
        }

        if sink.is_some() {
            self.stats.segments_closed += 1;
        }
        Ok(())
    }

    /// Wait for a free pool slot and spawn a worker into it.
    async fn acquire_sink(&mut self) -> Result<ChildStdin, SupervisorError> {
        loop {
            if self.is_cancelled() {
                return Err(SupervisorError::Cancelled);
            }
            self.reap().await;
            if self.running.len() < self.launch.process_limit {
                return self.spawn_child();
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    /// Spawn one worker and wire its output streams to the handler.
    fn spawn_child(&mut self) -> Result<ChildStdin, SupervisorError> {
        let index = self.next_index;
        self.next_index += 1;

        let mut handle = ChildHandle::spawn(
            &self.launch.command,
            self.launch.working_directory.as_deref(),
            self.launch.extra_environment.as_ref(),
        )?;
        let pid = handle.id();
        let stdin = handle.take_stdin().ok_or(SupervisorError::NoStdin)?;

        let mut readers = Vec::with_capacity(2);
        if let Some(stdout) = handle.take_stdout() {
            readers.push(spawn_output_reader(
                self.launch.output.clone(),
                index,
                pid,
                OutputStreamKind::Out,
                stdout,
            ));
        }
        if let Some(stderr) = handle.take_stderr() {
            readers.push(spawn_output_reader(
                self.launch.output.clone(),
                index,
                pid,
                OutputStreamKind::Err,
                stderr,
            ));
        }

        self.launch.logger.log_command_started(&self.launch.command.display());
        tracing::debug!(child = index, pid, "Worker spawned");

        self.running.push(RunningChild {
            index,
            pid,
            handle,
            readers,
        });
        self.stats.children_spawned += 1;
        Ok(stdin)
    }

    /// Release every terminated worker and run the host tick.
    async fn reap(&mut self) {
        self.launch.tick.tick();

        let mut index = 0;
        while index < self.running.len() {
            let exited = match self.running[index].handle.poll_exit() {
                Ok(status) => status,
                Err(error) => {
                    tracing::warn!(child = self.running[index].index, %error, "Failed to poll worker");
                    None
                }
            };

            if let Some(status) = exited {
                let mut child = self.running.swap_remove(index);
                // Let the reader tasks drain remaining output before the
                // termination is reported.
                for reader in child.readers.drain(..) {
                    let _ = reader.await;
                }
                // Signal deaths carry no code; the logger sees None.
                self.launch.logger.log_command_finished(status.code());
                self.stats.children_reaped += 1;
            } else {
                index += 1;
            }
        }
    }

    /// Reap until the pool is empty.
    async fn drain(&mut self) -> Result<(), SupervisorError> {
        loop {
            if self.is_cancelled() {
                self.shutdown().await;
                return Ok(());
            }
            self.reap().await;
            if self.running.is_empty() {
                return Ok(());
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    /// Stop and reap every running worker.
    ///
    /// Workers get the launch's `terminate_timeout` to exit on their own;
    /// whatever is still alive after the deadline is killed outright.
    async fn shutdown(&mut self) {
        for child in &mut self.running {
            child.handle.request_stop();
        }

        let deadline = tokio::time::Instant::now() + self.launch.terminate_timeout;
        let mut killed = false;
        loop {
            self.reap().await;
            if self.running.is_empty() {
                return;
            }
            if !killed && tokio::time::Instant::now() >= deadline {
                killed = true;
                for child in &mut self.running {
                    if let Err(error) = child.handle.force_kill() {
                        tracing::warn!(child = child.index, %error, "Failed to kill worker");
                    }
                }
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    async fn write_item(stdin: &mut ChildStdin, item: &str) -> std::io::Result<()> {
        stdin.write_all(item.as_bytes()).await?;
        stdin.write_all(b"\n").await
    }
}

#[async_trait]
impl ProcessLauncher for ProcessSupervisor {
    async fn run(
        &mut self,
        items: Box<dyn Iterator<Item = String> + Send>,
    ) -> Result<(), SupervisorError> {
        match self.dispatch(items).await {
            Ok(()) => self.drain().await,
            Err(SupervisorError::Cancelled) => {
                tracing::info!("Run cancelled, terminating workers");
                self.shutdown().await;
                Ok(())
            }
            Err(error) => {
                self.shutdown().await;
                Err(error)
            }
        }
    }
}
