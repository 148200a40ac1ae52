//! Execution Gateway
//!
//! The façade the tool adapter calls. It sequences command validation,
//! directory validation and execution, and turns every outcome into one
//! [`ExecutionResult`].

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, info_span, warn, Instrument};
use uuid::Uuid;

use super::directory::DirectoryManager;
use super::executor::{CommandExecutor, CommandRunner, ExecutionResult, FailureKind};
use super::timeout::ExecutionTimeout;
use super::validator::{AllowList, CommandValidator};
use crate::metrics;

/// A single command request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandRequest {
    /// Argument vector; element 0 is the base command
    pub command: Vec<String>,

    /// Working directory for the process
    pub directory: String,

    /// Text piped to the process's stdin
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stdin: Option<String>,

    /// Upper bound on execution time, in seconds; absent means unbounded
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,
}

impl CommandRequest {
    pub fn new<I, S>(command: I, directory: impl Into<String>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            command: command.into_iter().map(Into::into).collect(),
            directory: directory.into(),
            stdin: None,
            timeout: None,
        }
    }

    pub fn with_stdin(mut self, stdin: impl Into<String>) -> Self {
        self.stdin = Some(stdin.into());
        self
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout = Some(secs);
        self
    }

    pub fn execution_timeout(&self) -> Option<ExecutionTimeout> {
        self.timeout.map(ExecutionTimeout::from_secs)
    }
}

/// Orchestrates validation and execution
///
/// The allowlist is fixed at construction. Nothing else is shared between
/// requests, so one gateway can serve concurrent callers through `&self`.
///
/// # Example
///
/// ```no_run
/// use shell_gateway::tools::{AllowList, CommandRequest, ExecutionGateway};
///
/// #[tokio::main]
/// async fn main() {
///     let gateway = ExecutionGateway::new(AllowList::parse("ls,echo"));
///     let request = CommandRequest::new(["echo", "hello"], "/tmp");
///     let result = gateway.handle(&request).await;
///     assert_eq!(result.stdout(), "hello\n");
/// }
/// ```
#[derive(Debug, Clone)]
pub struct ExecutionGateway<R = CommandExecutor> {
    validator: CommandValidator,
    directories: DirectoryManager,
    runner: R,
}

impl ExecutionGateway<CommandExecutor> {
    pub fn new(allowlist: AllowList) -> Self {
        Self::with_runner(allowlist, CommandExecutor::new())
    }
}

impl<R: CommandRunner> ExecutionGateway<R> {
    /// Create a gateway that delegates execution to a custom runner
    pub fn with_runner(allowlist: AllowList, runner: R) -> Self {
        Self {
            validator: CommandValidator::new(allowlist),
            directories: DirectoryManager::new(),
            runner,
        }
    }

    pub fn validator(&self) -> &CommandValidator {
        &self.validator
    }

    /// Allowed base commands, in configured order
    pub fn allowed_commands(&self) -> &[String] {
        self.validator.allowed_commands()
    }

    /// Process one request start to finish
    ///
    /// Never fails: rejections, timeouts and faults all come back as
    /// [`ExecutionResult::Failed`].
    pub async fn handle(&self, request: &CommandRequest) -> ExecutionResult {
        let span = info_span!(
            "gateway_request",
            request_id = %Uuid::new_v4(),
            command = request.command.first().map(String::as_str).unwrap_or(""),
        );

        let result = self.process(request).instrument(span.clone()).await;

        span.in_scope(|| match result.failure_kind() {
            None => info!("{}", result.summary()),
            Some(FailureKind::Rejected | FailureKind::TimedOut) => warn!("{}", result.summary()),
            Some(FailureKind::Faulted) => error!("{}", result.summary()),
        });
        metrics::record_result(&result);

        result
    }

    async fn process(&self, request: &CommandRequest) -> ExecutionResult {
        debug!("Validating command");
        if let Err(rejection) = self.validator.validate(request.command.as_slice()) {
            return ExecutionResult::rejected(&rejection);
        }

        debug!("Validating directory {}", request.directory);
        if let Err(rejection) = self.directories.validate(&request.directory) {
            return ExecutionResult::rejected(&rejection);
        }

        let _active = metrics::ActiveExecution::start();
        self.runner
            .execute(
                &request.command,
                Path::new(&request.directory),
                request.stdin.as_deref(),
                request.execution_timeout(),
            )
            .await
    }
}
