use crate::common::output::{LineConsumer, OutputSinks};
use std::collections::HashMap;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command as TokioCommand;

/// Command executor errors
#[derive(Debug, Error)]
pub enum CommandExecutorError {
    #[error("'{command}' failed with exit code {exit_code}: {stderr}")]
    CommandFailed {
        command: String,
        exit_code: i32,
        stderr: String,
    },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Invalid command: {0}")]
    InvalidCommand(String),

    #[error("Failed to spawn '{command}': {source}")]
    SpawnFailed {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Process termination failed: {0}")]
    TerminationFailed(String),
}

/// Configuration for command execution
#[derive(Debug, Clone)]
pub struct ExecutionConfig {
    /// Working directory for command execution
    pub working_directory: Option<PathBuf>,

    /// Environment variables to set for the process
    pub environment_variables: HashMap<String, String>,

    /// Whether each output line is forwarded to the sinks
    pub stream_output: bool,

    /// Values masked in the displayed command, in stderr and in sink lines
    pub secrets: Vec<String>,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            working_directory: None,
            environment_variables: HashMap::new(),
            stream_output: true,
            secrets: Vec::new(),
        }
    }
}

impl ExecutionConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_working_directory<P: AsRef<Path>>(mut self, dir: P) -> Self {
        self.working_directory = Some(dir.as_ref().to_path_buf());
        self
    }

    pub fn with_environment_variable(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.environment_variables.insert(key.into(), value.into());
        self
    }

    /// Capture output without forwarding it (used for machine-read output)
    pub fn quiet(mut self) -> Self {
        self.stream_output = false;
        self
    }

    pub fn with_secret(mut self, secret: impl Into<String>) -> Self {
        let secret = secret.into();
        if !secret.is_empty() {
            self.secrets.push(secret);
        }
        self
    }

    fn mask(&self, text: &str) -> String {
        self.secrets
            .iter()
            .fold(text.to_string(), |masked, secret| masked.replace(secret.as_str(), "******"))
    }
}

/// Result of command execution
#[derive(Debug, Clone)]
pub struct ExecutionResult {
    /// Printable form of the command that ran
    pub command: String,

    /// Exit code of the process (-1 when killed by a signal)
    pub exit_code: i32,

    pub stdout: String,

    pub stderr: String,

    pub execution_time_ms: u64,

    /// Whether the command was successful (exit code 0)
    pub success: bool,
}

impl ExecutionResult {
    pub fn new(command: String, exit_code: i32, stdout: String, stderr: String, execution_time_ms: u64) -> Self {
        Self {
            command,
            exit_code,
            stdout,
            stderr,
            execution_time_ms,
            success: exit_code == 0,
        }
    }

    /// Turn a non-zero exit into [`CommandExecutorError::CommandFailed`]
    pub fn into_checked(self) -> Result<Self, CommandExecutorError> {
        if self.success {
            Ok(self)
        } else {
            Err(CommandExecutorError::CommandFailed {
                command: self.command,
                exit_code: self.exit_code,
                stderr: self.stderr.trim().to_string(),
            })
        }
    }
}

/// Runs external processes synchronously.
///
/// Arguments are passed as a vector and never through a shell. Both pipes are
/// drained concurrently on a private current-thread runtime, so a chatty
/// child can never block on a full pipe buffer.
pub struct CommandExecutor;

impl CommandExecutor {
    /// Run `program` with `args` and wait for it to exit
    pub fn execute<S: AsRef<OsStr>>(
        program: &Path,
        args: &[S],
        config: &ExecutionConfig,
        sinks: &OutputSinks,
    ) -> Result<ExecutionResult, CommandExecutorError> {
        if program.as_os_str().is_empty() {
            return Err(CommandExecutorError::InvalidCommand("Program is empty".to_string()));
        }

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;

        runtime.block_on(Self::execute_async(program, args, config, sinks))
    }

    /// Same as [`CommandExecutor::execute`], failing on a non-zero exit
    pub fn execute_checked<S: AsRef<OsStr>>(
        program: &Path,
        args: &[S],
        config: &ExecutionConfig,
        sinks: &OutputSinks,
    ) -> Result<ExecutionResult, CommandExecutorError> {
        Self::execute(program, args, config, sinks)?.into_checked()
    }

    async fn execute_async<S: AsRef<OsStr>>(
        program: &Path,
        args: &[S],
        config: &ExecutionConfig,
        sinks: &OutputSinks,
    ) -> Result<ExecutionResult, CommandExecutorError> {
        let start_time = Instant::now();
        let command_line = config.mask(&Self::display_command(program, args));
        tracing::debug!("Executing: {}", command_line);

        let mut cmd = TokioCommand::new(program);
        cmd.args(args);

        if let Some(working_dir) = &config.working_directory {
            cmd.current_dir(working_dir);
        }
        for (key, value) in &config.environment_variables {
            cmd.env(key, value);
        }

        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());
        cmd.stdin(Stdio::null());
        cmd.kill_on_drop(true);

        let mut child = cmd.spawn().map_err(|source| CommandExecutorError::SpawnFailed {
            command: command_line.clone(),
            source,
        })?;

        let (stdout_sink, stderr_sink) = if config.stream_output {
            (Some(sinks.stdout.clone()), Some(sinks.stderr.clone()))
        } else {
            (None, None)
        };

        let (stdout, stderr) = tokio::join!(
            Self::drain(child.stdout.take(), stdout_sink, config),
            Self::drain(child.stderr.take(), stderr_sink, config),
        );
        let (stdout, stderr) = (stdout?, stderr?);

        let exit_status = child
            .wait()
            .await
            .map_err(|e| CommandExecutorError::TerminationFailed(format!("Failed to wait for process: {}", e)))?;

        let execution_time = start_time.elapsed().as_millis() as u64;
        let exit_code = exit_status.code().unwrap_or(-1);
        tracing::debug!("'{}' exited with {} after {}ms", command_line, exit_code, execution_time);

        Ok(ExecutionResult::new(
            command_line,
            exit_code,
            String::from_utf8_lossy(&stdout).into_owned(),
            config.mask(&String::from_utf8_lossy(&stderr)),
            execution_time,
        ))
    }

    /// Read a pipe to the end, forwarding each line to `sink`
    async fn drain<R>(
        reader: Option<R>,
        sink: Option<Arc<dyn LineConsumer>>,
        config: &ExecutionConfig,
    ) -> Result<Vec<u8>, CommandExecutorError>
    where
        R: AsyncRead + Unpin,
    {
        let mut captured = Vec::new();
        let reader = match reader {
            Some(reader) => reader,
            None => return Ok(captured),
        };

        let mut reader = BufReader::new(reader);
        let mut line = Vec::new();
        loop {
            line.clear();
            if reader.read_until(b'\n', &mut line).await? == 0 {
                break;
            }
            captured.extend_from_slice(&line);
            if let Some(sink) = &sink {
                let text = config.mask(&String::from_utf8_lossy(&line));
                sink.consume_line(text.trim_end_matches(|c| c == '\n' || c == '\r'));
            }
        }
        Ok(captured)
    }

    fn display_command<S: AsRef<OsStr>>(program: &Path, args: &[S]) -> String {
        std::iter::once(program.as_os_str())
            .chain(args.iter().map(|arg| arg.as_ref()))
            .map(|part| part.to_string_lossy().into_owned())
            .collect::<Vec<_>>()
            .join(" ")
    }
}
