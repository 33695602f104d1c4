//! Line-oriented output sinks.
//!
//! Every backend call may write progress and diagnostic lines to two sinks,
//! one for standard output and one for standard error. This is the only text
//! output contract of the crate: the command-line backend forwards each line
//! the `git` process prints, the library backend writes its own diagnostics.

use std::fmt;
use std::sync::{Arc, Mutex};

/// Consumer of output lines (without trailing newline)
pub trait LineConsumer: Send + Sync {
    fn consume_line(&self, line: &str);
}

/// Captures every line in memory
#[derive(Debug, Default)]
pub struct InMemoryConsumer {
    lines: Mutex<Vec<String>>,
}

impl InMemoryConsumer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the captured lines
    pub fn lines(&self) -> Vec<String> {
        self.lines
            .lock()
            .map(|lines| lines.clone())
            .unwrap_or_default()
    }

    /// All captured lines joined with `\n`
    pub fn contents(&self) -> String {
        self.lines().join("\n")
    }
}

impl LineConsumer for InMemoryConsumer {
    fn consume_line(&self, line: &str) {
        if let Ok(mut lines) = self.lines.lock() {
            lines.push(line.to_string());
        }
    }
}

/// Which stream a [`TracingConsumer`] stands for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stream {
    Stdout,
    Stderr,
}

/// Forwards lines to `tracing`: stdout at info, stderr at warn
#[derive(Debug, Clone, Copy)]
pub struct TracingConsumer {
    stream: Stream,
}

impl TracingConsumer {
    pub fn new(stream: Stream) -> Self {
        Self { stream }
    }
}

impl LineConsumer for TracingConsumer {
    fn consume_line(&self, line: &str) {
        match self.stream {
            Stream::Stdout => tracing::info!(target: "gitpoller::output", "{}", line),
            Stream::Stderr => tracing::warn!(target: "gitpoller::output", "{}", line),
        }
    }
}

/// The stdout/stderr pair handed to a backend
#[derive(Clone)]
pub struct OutputSinks {
    pub stdout: Arc<dyn LineConsumer>,
    pub stderr: Arc<dyn LineConsumer>,
}

impl OutputSinks {
    pub fn new(stdout: Arc<dyn LineConsumer>, stderr: Arc<dyn LineConsumer>) -> Self {
        Self { stdout, stderr }
    }

    /// Sinks that forward to `tracing`
    pub fn tracing() -> Self {
        Self::new(
            Arc::new(TracingConsumer::new(Stream::Stdout)),
            Arc::new(TracingConsumer::new(Stream::Stderr)),
        )
    }

    /// Sinks that capture in memory, returned together with the two consumers
    pub fn in_memory() -> (Self, Arc<InMemoryConsumer>, Arc<InMemoryConsumer>) {
        let stdout = Arc::new(InMemoryConsumer::new());
        let stderr = Arc::new(InMemoryConsumer::new());
        (Self::new(stdout.clone(), stderr.clone()), stdout, stderr)
    }

    pub fn out(&self, line: &str) {
        self.stdout.consume_line(line);
    }

    pub fn err(&self, line: &str) {
        self.stderr.consume_line(line);
    }
}

impl Default for OutputSinks {
    fn default() -> Self {
        Self::tracing()
    }
}

impl fmt::Debug for OutputSinks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OutputSinks").finish_non_exhaustive()
    }
}
