//! Demultiplexing of worker output into progress ticks and noise.
//!
//! Workers share a single byte stream for progress signalling and whatever
//! the per-item action happens to print. The demultiplexer counts progress
//! symbols, advances the logger by that count, and surfaces everything else
//! verbatim as unexpected output. No framing protocol is involved; the
//! progress symbol is a single distinctive code point.

use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::task::JoinHandle;

use crate::logger::{OutputStreamKind, ProgressLogger};

/// Receiver of raw output chunks from one worker stream.
pub trait ChildOutputHandler: Send + Sync {
    /// Handle a chunk of bytes read from a worker's stdout or stderr.
    fn handle_chunk(&self, index: usize, pid: Option<u32>, kind: OutputStreamKind, chunk: &[u8]);
}

/// Classifies worker output into progress ticks and unexpected output.
pub struct OutputDemultiplexer {
    progress_symbol: char,
    logger: Arc<dyn ProgressLogger>,
}

impl OutputDemultiplexer {
    /// Create a demultiplexer reporting to `logger`.
    #[must_use]
    pub fn new(progress_symbol: char, logger: Arc<dyn ProgressLogger>) -> Self {
        Self {
            progress_symbol,
            logger,
        }
    }
}

impl ChildOutputHandler for OutputDemultiplexer {
    fn handle_chunk(&self, index: usize, pid: Option<u32>, kind: OutputStreamKind, chunk: &[u8]) {
        let text = String::from_utf8_lossy(chunk);

        // Stderr carries no progress signal.
        if kind == OutputStreamKind::Err {
            self.logger.log_unexpected_child_process_output(
                index,
                pid,
                kind,
                &text,
                self.progress_symbol,
            );
            return;
        }

        let ticks = text.chars().filter(|&c| c == self.progress_symbol).count();
        let length = text.chars().count();

        if ticks != length {
            self.logger.log_unexpected_child_process_output(
                index,
                pid,
                kind,
                &text,
                self.progress_symbol,
            );
        }

        if ticks > 0 {
            self.logger.log_advance(ticks as u64);
        }
    }
}

/// Read a worker stream to EOF, forwarding every chunk to `handler`.
///
/// This spawns a background task per stream, the same shape the pool uses
/// for both stdout and stderr of every child.
pub fn spawn_output_reader<R>(
    handler: Arc<dyn ChildOutputHandler>,
    index: usize,
    pid: Option<u32>,
    kind: OutputStreamKind,
    stream: R,
) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut stream = stream;
        let mut buffer = [0u8; 4096];
        loop {
            match stream.read(&mut buffer).await {
                Ok(0) => break,
                Ok(n) => handler.handle_chunk(index, pid, kind, &buffer[..n]),
                Err(error) => {
                    tracing::warn!(child = index, pid, stream = kind.label(), %error, "Failed to read worker output");
                    break;
                }
            }
        }
    })
}
