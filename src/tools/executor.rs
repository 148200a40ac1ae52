//! Command Executor
//!
//! This module runs an already-validated argument vector as a direct child
//! process (never through a shell). It implements stdin feeding, full output
//! capture, timeout-triggered termination and normalization of every outcome
//! into a single [`ExecutionResult`].

use std::io;
use std::path::Path;
use std::process::{ExitStatus, Stdio};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::process::{Child, ChildStdin, Command};
use tracing::{debug, warn};

use super::timeout::ExecutionTimeout;
use super::validator::Rejection;

/// Exit status reported for every failure that has no real exit code
pub const FAILURE_STATUS: i32 = 1;

/// Why a request failed without a normal completion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Refused by command or directory validation; nothing was spawned
    Rejected,
    /// Killed after exceeding its timeout
    TimedOut,
    /// Spawn or pipe I/O failed
    Faulted,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Rejected => "rejected",
            Self::TimedOut => "timed_out",
            Self::Faulted => "faulted",
        }
    }
}

/// Outcome of a single request
///
/// Exactly one variant is produced per request. A non-zero `status` in
/// `Completed` is still a completion: the process ran and exited.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(into = "ExecutionRecord")]
pub enum ExecutionResult {
    Completed {
        stdout: String,
        stderr: String,
        status: i32,
        duration: Duration,
    },
    Failed {
        kind: FailureKind,
        reason: String,
        stderr: String,
        duration: Duration,
    },
}

impl ExecutionResult {
    /// Refused before execution: reason doubles as stderr, zero duration
    pub fn rejected(rejection: &Rejection) -> Self {
        let reason = rejection.to_string();
        Self::Failed {
            kind: FailureKind::Rejected,
            stderr: reason.clone(),
            reason,
            duration: Duration::ZERO,
        }
    }

    /// Killed on timeout; duration is the configured bound, not the kill latency
    pub fn timed_out(timeout: ExecutionTimeout) -> Self {
        Self::Failed {
            kind: FailureKind::TimedOut,
            reason: format!("Command timed out after {} seconds", timeout),
            stderr: format!("Timeout after {}s", timeout),
            duration: timeout.duration(),
        }
    }

    /// Spawn or I/O failure; description doubles as stderr
    pub fn faulted(description: impl Into<String>, duration: Duration) -> Self {
        let reason = description.into();
        Self::Failed {
            kind: FailureKind::Faulted,
            stderr: reason.clone(),
            reason,
            duration,
        }
    }

    /// The error message, absent for completed runs
    pub fn error(&self) -> Option<&str> {
        match self {
            Self::Completed { .. } => None,
            Self::Failed { reason, .. } => Some(reason),
        }
    }

    pub fn stdout(&self) -> &str {
        match self {
            Self::Completed { stdout, .. } => stdout,
            Self::Failed { .. } => "",
        }
    }

    pub fn stderr(&self) -> &str {
        match self {
            Self::Completed { stderr, .. } | Self::Failed { stderr, .. } => stderr,
        }
    }

    pub fn status(&self) -> i32 {
        match self {
            Self::Completed { status, .. } => *status,
            Self::Failed { .. } => FAILURE_STATUS,
        }
    }

    pub fn duration(&self) -> Duration {
        match self {
            Self::Completed { duration, .. } | Self::Failed { duration, .. } => *duration,
        }
    }

    pub fn failure_kind(&self) -> Option<FailureKind> {
        match self {
            Self::Completed { .. } => None,
            Self::Failed { kind, .. } => Some(*kind),
        }
    }

    /// Label used for logs and metrics
    pub fn outcome(&self) -> &'static str {
        self.failure_kind()
            .map(|kind| kind.as_str())
            .unwrap_or("completed")
    }

    /// Get a human-readable summary
    pub fn summary(&self) -> String {
        match self {
            Self::Completed {
                status,
                duration,
                stdout,
                stderr,
            } => format!(
                "Completed (status: {}, {:.0}ms, {} bytes output)",
                status,
                duration.as_secs_f64() * 1000.0,
                stdout.len() + stderr.len()
            ),
            Self::Failed {
                kind,
                reason,
                duration,
                ..
            } => format!(
                "Failed [{}] after {:.0}ms: {}",
                kind.as_str(),
                duration.as_secs_f64() * 1000.0,
                reason
            ),
        }
    }
}

/// Flat wire shape of an [`ExecutionResult`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionRecord {
    pub stdout: String,
    pub stderr: String,
    pub status: i32,
    /// Elapsed wall time in seconds
    pub execution_time: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<ExecutionResult> for ExecutionRecord {
    fn from(result: ExecutionResult) -> Self {
        Self {
            stdout: result.stdout().to_string(),
            stderr: result.stderr().to_string(),
            status: result.status(),
            execution_time: result.duration().as_secs_f64(),
            error: result.error().map(str::to_string),
        }
    }
}

/// Runs validated commands
///
/// The gateway depends on this seam rather than on [`CommandExecutor`] directly
/// so orchestration can be exercised without spawning processes.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn execute(
        &self,
        argv: &[String],
        directory: &Path,
        stdin: Option<&str>,
        timeout: Option<ExecutionTimeout>,
    ) -> ExecutionResult;
}

/// Subprocess executor
///
/// # Security
///
/// 1. Uses `tokio::process::Command` with an argument vector, never a shell
/// 2. Places each child in its own process group so a timeout can kill
///    everything it started
/// 3. Marks children `kill_on_drop`, so an abandoned wait never leaks a process
///
/// # Example
///
/// ```no_run
/// use std::path::Path;
/// use shell_gateway::tools::{CommandExecutor, CommandRunner, ExecutionTimeout};
///
/// #[tokio::main]
/// async fn main() {
///     let executor = CommandExecutor::new();
///     let argv = vec!["echo".to_string(), "hello".to_string()];
///     let result = executor
///         .execute(&argv, Path::new("/tmp"), None, Some(ExecutionTimeout::from_secs(5)))
///         .await;
///     assert_eq!(result.stdout(), "hello\n");
/// }
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct CommandExecutor;

impl CommandExecutor {
    pub fn new() -> Self {
        Self
    }

    async fn run(
        &self,
        argv: &[String],
        directory: &Path,
        stdin: Option<&str>,
        timeout: Option<ExecutionTimeout>,
    ) -> ExecutionResult {
        let Some((program, args)) = argv.split_first() else {
            return ExecutionResult::faulted("Empty command", Duration::ZERO);
        };

        let mut command = Command::new(program);
        command
            .args(args)
            .current_dir(directory)
            .stdin(if stdin.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        #[cfg(unix)]
        command.process_group(0);

        let start = Instant::now();
        let mut child = match command.spawn() {
            Ok(child) => child,
            Err(e) => {
                warn!("Failed to spawn {}: {}", program, e);
                return ExecutionResult::faulted(
                    format!("Failed to execute '{}': {}", program, e),
                    start.elapsed(),
                );
            }
        };
        debug!("Spawned {} (pid: {:?})", program, child.id());

        // Captured now: once the leader is reaped `child.id()` is gone, but
        // descendants may still be running in its group
        let mut group = ProcessGroup::of(&child);

        let collected = match timeout {
            Some(limit) => {
                let bounded = limit.run(collect_output(&mut child, stdin)).await;
                match bounded {
                    Ok(collected) => collected,
                    Err(_) => {
                        warn!("{} exceeded timeout of {}s, terminating", program, limit);
                        group.kill();
                        terminate(&mut child).await;
                        return ExecutionResult::timed_out(limit);
                    }
                }
            }
            None => collect_output(&mut child, stdin).await,
        };

        let duration = start.elapsed();
        match collected {
            Ok((status, stdout, stderr)) => {
                group.release();
                ExecutionResult::Completed {
                    stdout: String::from_utf8_lossy(&stdout).into_owned(),
                    stderr: String::from_utf8_lossy(&stderr).into_owned(),
                    status: exit_code(status),
                    duration,
                }
            }
            Err(e) => {
                warn!("I/O error while running {}: {}", program, e);
                group.kill();
                terminate(&mut child).await;
                ExecutionResult::faulted(
                    format!("I/O error while running '{}': {}", program, e),
                    duration,
                )
            }
        }
    }
}

#[async_trait]
impl CommandRunner for CommandExecutor {
    async fn execute(
        &self,
        argv: &[String],
        directory: &Path,
        stdin: Option<&str>,
        timeout: Option<ExecutionTimeout>,
    ) -> ExecutionResult {
        self.run(argv, directory, stdin, timeout).await
    }
}

/// Feed stdin, drain both output pipes and reap the child, all concurrently
///
/// Draining while waiting keeps a chatty child from blocking on a full pipe.
async fn collect_output(
    child: &mut Child,
    stdin: Option<&str>,
) -> io::Result<(ExitStatus, Vec<u8>, Vec<u8>)> {
    let stdin_pipe = child.stdin.take();
    let stdout_pipe = child.stdout.take();
    let stderr_pipe = child.stderr.take();

    let (_, stdout, stderr, status) = tokio::try_join!(
        feed_stdin(stdin_pipe, stdin),
        read_pipe(stdout_pipe),
        read_pipe(stderr_pipe),
        child.wait(),
    )?;

    Ok((status, stdout, stderr))
}

async fn feed_stdin(pipe: Option<ChildStdin>, payload: Option<&str>) -> io::Result<()> {
    let (Some(mut pipe), Some(payload)) = (pipe, payload) else {
        return Ok(());
    };

    match pipe.write_all(payload.as_bytes()).await {
        Ok(()) => {}
        // The child is free to exit without reading its input
        Err(e) if e.kind() == io::ErrorKind::BrokenPipe => return Ok(()),
        Err(e) => return Err(e),
    }
    // Dropping the handle closes stdin so the child sees EOF
    drop(pipe);
    Ok(())
}

async fn read_pipe<R: AsyncRead + Unpin>(pipe: Option<R>) -> io::Result<Vec<u8>> {
    let mut buffer = Vec::new();
    if let Some(mut pipe) = pipe {
        pipe.read_to_end(&mut buffer).await?;
    }
    Ok(buffer)
}

/// SIGKILLs a child's whole process group, at the latest when dropped
///
/// Dropping covers callers that abandon the execution future mid-run: without
/// it only the direct child would die (through `kill_on_drop`).
struct ProcessGroup {
    pgid: Option<u32>,
}

impl ProcessGroup {
    /// The child leads its own group, so its pid is the pgid
    fn of(child: &Child) -> Self {
        Self { pgid: child.id() }
    }

    fn kill(&mut self) {
        if let Some(pgid) = self.pgid.take() {
            kill_group(pgid);
        }
    }

    /// Leave the group alone: the run finished normally
    fn release(&mut self) {
        self.pgid = None;
    }
}

impl Drop for ProcessGroup {
    fn drop(&mut self) {
        self.kill();
    }
}

#[cfg(unix)]
fn kill_group(pgid: u32) {
    // ESRCH just means every member has already exited
    if unsafe { libc::killpg(pgid as libc::pid_t, libc::SIGKILL) } == -1 {
        debug!("killpg({}) failed: {}", pgid, io::Error::last_os_error());
    }
}

#[cfg(not(unix))]
fn kill_group(_pgid: u32) {}

/// Kill the direct child if it is still running and reap it
async fn terminate(child: &mut Child) {
    if let Err(e) = child.kill().await {
        debug!("Child already gone during kill: {}", e);
    }
}

#[cfg(unix)]
fn exit_code(status: ExitStatus) -> i32 {
    use std::os::unix::process::ExitStatusExt;

    status
        .code()
        .or_else(|| status.signal().map(|signal| 128 + signal))
        .unwrap_or(FAILURE_STATUS)
}

#[cfg(not(unix))]
fn exit_code(status: ExitStatus) -> i32 {
    status.code().unwrap_or(FAILURE_STATUS)
}
