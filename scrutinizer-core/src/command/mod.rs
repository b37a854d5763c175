//! Bounded shell command execution
//!
//! Commands run through `sh -c` in the project directory, in a process group
//! of their own so a timeout can take down everything the command spawned.
//! Output is streamed to the logger line by line while it is produced and
//! collected for the caller.

use crate::{Error, Result};
use scrutinizer_utils::{LogLevel, Logger};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Time budget for before/after commands
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(300);

/// How long output is still read after the shell has exited
pub const OUTPUT_DRAIN_GRACE: Duration = Duration::from_millis(500);

/// Output of a command that exited successfully
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    pub command: String,
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
    pub duration: Duration,
}

/// Runs shell commands in one directory with a hard timeout
#[derive(Debug, Clone)]
pub struct CommandRunner {
    working_directory: PathBuf,
    timeout: Duration,
    logger: Logger,
    output_level: LogLevel,
}

impl CommandRunner {
    pub fn new(working_directory: impl Into<PathBuf>, logger: Logger) -> Self {
        Self {
            working_directory: working_directory.into(),
            timeout: DEFAULT_COMMAND_TIMEOUT,
            logger,
            output_level: LogLevel::Info,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Level the command's output lines are logged at
    pub fn with_output_level(mut self, level: LogLevel) -> Self {
        self.output_level = level;
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn working_directory(&self) -> &Path {
        &self.working_directory
    }

    /// Run `command` to completion or until the timeout expires.
    ///
    /// The timeout bounds the shell itself. Once it exits, output still in
    /// flight is read for at most [`OUTPUT_DRAIN_GRACE`]; a background job
    /// holding the pipes open is left running.
    pub async fn run(&self, command: &str) -> Result<CommandOutput> {
        let started = Instant::now();
        let mut child = self.spawn(command)?;
        let pid = child.id();
        debug!("Spawned \"{}\" as pid {:?} in {}", command, pid, self.working_directory.display());

        let stdout = OutputPump::start(child.stdout.take(), self.logger.clone(), self.output_level);
        let stderr = OutputPump::start(child.stderr.take(), self.logger.clone(), self.output_level);

        let status = match tokio::time::timeout(self.timeout, child.wait()).await {
            Ok(Ok(status)) => status,
            Ok(Err(e)) => {
                stdout.abort();
                stderr.abort();
                return Err(e.into());
            }
            Err(_) => {
                kill_process_group(pid);
                if let Err(e) = child.kill().await {
                    debug!("Child of \"{}\" already gone: {}", command, e);
                }
                stdout.abort();
                stderr.abort();
                warn!("Command \"{}\" exceeded {:?}, killed", command, self.timeout);
                return Err(Error::CommandTimeout {
                    command: command.to_string(),
                    timeout: self.timeout,
                });
            }
        };

        let (stdout, stderr) = tokio::join!(
            stdout.finish(OUTPUT_DRAIN_GRACE),
            stderr.finish(OUTPUT_DRAIN_GRACE),
        );

        if !status.success() {
            return Err(Error::CommandFailed {
                command: command.to_string(),
                exit_code: status.code(),
                output: format!("{stdout}{stderr}"),
            });
        }

        Ok(CommandOutput {
            command: command.to_string(),
            exit_code: status.code().unwrap_or(0),
            stdout,
            stderr,
            duration: started.elapsed(),
        })
    }

    fn spawn(&self, command: &str) -> Result<tokio::process::Child> {
        let mut cmd = std::process::Command::new("sh");
        cmd.arg("-c")
            .arg(command)
            .current_dir(&self.working_directory)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        // Own process group so a timeout reaches grandchildren too
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            cmd.process_group(0);
        }

        let mut cmd = tokio::process::Command::from(cmd);
        cmd.kill_on_drop(true);

        Ok(cmd.spawn()?)
    }
}

/// Run a single command with an ad-hoc runner
pub async fn run(
    command: &str,
    working_directory: &Path,
    timeout: Duration,
    logger: &Logger,
) -> Result<CommandOutput> {
    CommandRunner::new(working_directory, logger.clone())
        .with_timeout(timeout)
        .run(command)
        .await
}

/// Background reader logging one output stream line by line and collecting it
struct OutputPump {
    task: JoinHandle<()>,
    collected: Arc<Mutex<String>>,
}

impl OutputPump {
    fn start<R>(reader: Option<R>, logger: Logger, level: LogLevel) -> Self
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        let collected = Arc::new(Mutex::new(String::new()));
        let buffer = Arc::clone(&collected);

        let task = tokio::spawn(async move {
            let Some(reader) = reader else {
                return;
            };

            let mut reader = BufReader::new(reader);
            let mut line = Vec::new();
            loop {
                line.clear();
                match reader.read_until(b'\n', &mut line).await {
                    Ok(0) => break,
                    Ok(_) => {}
                    Err(e) => {
                        debug!("Stopped reading command output: {}", e);
                        break;
                    }
                }
                let text = String::from_utf8_lossy(&line);
                logger.log(level, text.trim_end_matches(['\n', '\r']));
                buffer.lock().unwrap_or_else(PoisonError::into_inner).push_str(&text);
            }
        });

        Self { task, collected }
    }

    /// Wait up to `grace` for end of stream, then stop and hand back what was read
    async fn finish(mut self, grace: Duration) -> String {
        if tokio::time::timeout(grace, &mut self.task).await.is_err() {
            debug!("Output still open {:?} after exit, detaching", grace);
            self.task.abort();
        }
        let mut collected = self.collected.lock().unwrap_or_else(PoisonError::into_inner);
        std::mem::take(&mut *collected)
    }

    fn abort(self) {
        self.task.abort();
    }
}

#[cfg(unix)]
fn kill_process_group(pid: Option<u32>) {
    use nix::sys::signal::{killpg, Signal};
    use nix::unistd::Pid;

    let Some(pid) = pid.and_then(|p| i32::try_from(p).ok()) else {
        return;
    };
    if let Err(e) = killpg(Pid::from_raw(pid), Signal::SIGKILL) {
        debug!("Failed to kill process group {}: {}", pid, e);
    }
}

#[cfg(not(unix))]
fn kill_process_group(_pid: Option<u32>) {}

/// Phase a pipeline command belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandPhase {
    Before,
    After,
}

impl std::fmt::Display for CommandPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CommandPhase::Before => write!(f, "before"),
            CommandPhase::After => write!(f, "after"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandStatus {
    Succeeded,
    Failed,
    TimedOut,
}

/// Outcome of one before/after command, kept on the project
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommandRecord {
    pub phase: CommandPhase,
    pub command: String,
    pub status: CommandStatus,
    pub exit_code: Option<i32>,
    pub duration_ms: u64,
}

impl CommandRecord {
    /// Summarize a runner result
    pub fn from_result(
        phase: CommandPhase,
        command: &str,
        result: &Result<CommandOutput>,
        duration: Duration,
    ) -> Self {
        let (status, exit_code) = match result {
            Ok(output) => (CommandStatus::Succeeded, Some(output.exit_code)),
            Err(Error::CommandTimeout { .. }) => (CommandStatus::TimedOut, None),
            Err(Error::CommandFailed { exit_code, .. }) => (CommandStatus::Failed, *exit_code),
            Err(_) => (CommandStatus::Failed, None),
        };

        Self {
            phase,
            command: command.to_string(),
            status,
            exit_code,
            duration_ms: u64::try_from(duration.as_millis()).unwrap_or(u64::MAX),
        }
    }

    pub fn succeeded(&self) -> bool {
        self.status == CommandStatus::Succeeded
    }
}
