//! Worker process spawning and control.
//!
//! This module provides the command value handed to the pool by the child
//! command factory, along with spawn and control methods for one running
//! worker process.

use std::collections::HashMap;
use std::path::Path;
use std::process::{ExitStatus, Stdio};

use tokio::process::{Child, ChildStderr, ChildStdin, ChildStdout, Command};

/// Error type for process spawning operations.
#[derive(thiserror::Error, Debug)]
pub enum SpawnError {
    /// The worker binary was not found.
    #[error("Worker binary not found")]
    NotFound,
    /// Permission denied when spawning.
    #[error("Permission denied")]
    PermissionDenied,
    /// Other I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl SpawnError {
    /// Create a `SpawnError` from an I/O error, classifying common cases.
    fn from_io(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => Self::NotFound,
            std::io::ErrorKind::PermissionDenied => Self::PermissionDenied,
            _ => Self::Io(err),
        }
    }
}

/// Command line used to start one worker process.
///
/// Produced by the child command factory; it is the coordinator's own
/// invocation plus the argument that switches the program into the worker
/// role.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerCommand {
    program: String,
    args: Vec<String>,
}

impl WorkerCommand {
    /// Create a new command for the given program.
    #[must_use]
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    /// Append one argument.
    #[must_use]
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Append several arguments.
    #[must_use]
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// The program to execute.
    #[must_use]
    pub fn program(&self) -> &str {
        &self.program
    }

    /// The arguments passed to the program.
    #[must_use]
    pub fn argv(&self) -> &[String] {
        &self.args
    }

    /// Render the command line for display and logging.
    #[must_use]
    pub fn display(&self) -> String {
        let mut line = self.program.clone();
        for arg in &self.args {
            line.push(' ');
            if arg.contains(char::is_whitespace) {
                line.push('\'');
                line.push_str(arg);
                line.push('\'');
            } else {
                line.push_str(arg);
            }
        }
        line
    }
}

/// A running worker process with piped standard streams.
#[derive(Debug)]
pub struct ChildHandle {
    child: Child,
}

impl ChildHandle {
    /// Spawn a worker with piped stdin/stdout/stderr.
    ///
    /// The child inherits the parent environment, overlaid with
    /// `extra_environment` when supplied. `None` means inherit only.
    ///
    /// # Errors
    ///
    /// Returns `SpawnError` if the process fails to spawn.
    pub fn spawn(
        command: &WorkerCommand,
        working_directory: Option<&Path>,
        extra_environment: Option<&HashMap<String, String>>,
    ) -> Result<Self, SpawnError> {
        let mut cmd = Command::new(command.program());
        cmd.args(command.argv())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        if let Some(dir) = working_directory {
            cmd.current_dir(dir);
        }

        if let Some(env) = extra_environment {
            cmd.envs(env);
        }

        let child = cmd.spawn().map_err(SpawnError::from_io)?;

        Ok(Self { child })
    }

    /// Take ownership of the stdin handle.
    ///
    /// This can only be called once; subsequent calls return `None`.
    pub fn take_stdin(&mut self) -> Option<ChildStdin> {
        self.child.stdin.take()
    }

    /// Take ownership of the stdout handle.
    ///
    /// This can only be called once; subsequent calls return `None`.
    pub fn take_stdout(&mut self) -> Option<ChildStdout> {
        self.child.stdout.take()
    }

    /// Take ownership of the stderr handle.
    ///
    /// This can only be called once; subsequent calls return `None`.
    pub fn take_stderr(&mut self) -> Option<ChildStderr> {
        self.child.stderr.take()
    }

    /// OS process id, while the worker is still alive.
    #[must_use]
    pub fn id(&self) -> Option<u32> {
        self.child.id()
    }

    /// Check for termination without blocking.
    ///
    /// The pool calls this on every reap pass; a `Some` status means the
    /// worker's slot can be released and carries the exit code to report.
    ///
    /// # Errors
    ///
    /// Returns an error if the worker's state cannot be queried.
    pub fn poll_exit(&mut self) -> std::io::Result<Option<ExitStatus>> {
        self.child.try_wait()
    }

    /// Wait until the worker exits.
    ///
    /// # Errors
    ///
    /// Returns an error if waiting on the process fails.
    pub async fn wait(&mut self) -> std::io::Result<ExitStatus> {
        self.child.wait().await
    }

    /// Ask the worker to stop, without waiting for it.
    ///
    /// Unix workers receive SIGTERM so an item in flight can finish;
    /// elsewhere this kills outright. Granting a grace period and
    /// escalating afterwards is the pool's bookkeeping, not the handle's.
    pub fn request_stop(&mut self) {
        if self.id().is_none() || self.signal_stop() {
            return;
        }
        if let Err(error) = self.child.start_kill() {
            tracing::warn!(%error, "Failed to stop worker");
        }
    }

    /// Kill the worker outright.
    ///
    /// # Errors
    ///
    /// Returns an error if the kill cannot be delivered.
    pub fn force_kill(&mut self) -> std::io::Result<()> {
        self.child.start_kill()
    }

    #[cfg(unix)]
    fn signal_stop(&self) -> bool {
        use nix::sys::signal::{self, Signal};
        use nix::unistd::Pid;

        match self.id().map(i32::try_from) {
            Some(Ok(pid)) => signal::kill(Pid::from_raw(pid), Signal::SIGTERM).is_ok(),
            _ => false,
        }
    }

    #[cfg(not(unix))]
    fn signal_stop(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_worker_command_collects_args() {
        let command = WorkerCommand::new("worker")
            .arg("--child")
            .args(["--segment-size", "50"]);
        assert_eq!(command.program(), "worker");
        assert_eq!(command.argv(), &["--child", "--segment-size", "50"]);
    }

    #[test]
    fn test_worker_command_display_quotes_whitespace() {
        let command = WorkerCommand::new("worker").arg("--name").arg("two words");
        assert_eq!(command.display(), "worker --name 'two words'");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_spawn_missing_binary_is_classified() {
        let command = WorkerCommand::new("definitely-not-a-real-binary-4712");
        let result = ChildHandle::spawn(&command, None, None);
        assert!(matches!(result, Err(SpawnError::NotFound)));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_spawned_child_exposes_streams_once() {
        let command = WorkerCommand::new("sh").args(["-c", "exit 0"]);
        let mut child = ChildHandle::spawn(&command, None, None).unwrap();
        assert!(child.take_stdin().is_some());
        assert!(child.take_stdin().is_none());
        assert!(child.take_stdout().is_some());
        assert!(child.take_stderr().is_some());
        child.wait().await.unwrap();
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_request_stop_ends_idle_worker() {
        let command = WorkerCommand::new("sleep").arg("30");
        let mut child = ChildHandle::spawn(&command, None, None).unwrap();
        child.request_stop();
        let status = child.wait().await.unwrap();
        assert!(!status.success());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_poll_exit_reports_exit_code() {
        let command = WorkerCommand::new("sh").args(["-c", "exit 3"]);
        let mut child = ChildHandle::spawn(&command, None, None).unwrap();
        let status = child.wait().await.unwrap();
        assert_eq!(status.code(), Some(3));
        // After termination the poll keeps returning the recorded status.
        let polled = child.poll_exit().unwrap();
        assert_eq!(polled.and_then(|s| s.code()), Some(3));
    }
}
