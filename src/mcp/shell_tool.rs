//! `shell_execute` tool
//!
//! Adapts the [`ExecutionGateway`] to MCP: parses tool arguments into a
//! [`CommandRequest`], applies an outer timeout guard, and turns the result into
//! text content.

use std::time::Duration;

use serde_json::{json, Map, Value};
use tracing::debug;

use crate::mcp::protocol::{Content, Tool};
use crate::tools::{CommandExecutor, CommandRequest, CommandRunner, ExecutionGateway, ExecutionTimeout};

pub const TOOL_NAME: &str = "shell_execute";

const TOOL_DESCRIPTION: &str = "Execute a shell command";

/// stderr noise from programs that try job control without a TTY
const BENIGN_STDERR: &str = "cannot set terminal process group";

/// Slack added to the outer guard so the executor's own timeout fires first
const OUTER_GUARD_GRACE: Duration = Duration::from_secs(2);

/// Failures reported to the MCP client instead of a normal tool result
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ToolCallError {
    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    #[error("Arguments must be an object")]
    ArgumentsNotObject,

    #[error("No command provided")]
    NoCommand,

    #[error("'command' must be an array of strings")]
    CommandNotArray,

    #[error("Directory is required")]
    MissingDirectory,

    #[error("'{field}' must be {expected}")]
    InvalidField {
        field: &'static str,
        expected: &'static str,
    },

    #[error("execution timed out after {0} seconds")]
    TimedOut(u64),

    /// The gateway produced a result carrying an error
    #[error("{0}")]
    Execution(String),
}

impl ToolCallError {
    /// Whether the request itself was malformed, as opposed to failing while running
    pub fn is_malformed_request(&self) -> bool {
        !matches!(self, Self::TimedOut(_) | Self::Execution(_))
    }
}

/// The `shell_execute` tool handler
#[derive(Debug, Clone)]
pub struct ShellTool<R = CommandExecutor> {
    gateway: ExecutionGateway<R>,
}

impl<R: CommandRunner> ShellTool<R> {
    pub fn new(gateway: ExecutionGateway<R>) -> Self {
        Self { gateway }
    }

    pub fn gateway(&self) -> &ExecutionGateway<R> {
        &self.gateway
    }

    /// Tool description advertised through `tools/list`, including the allowlist
    pub fn description(&self) -> Tool {
        Tool {
            name: TOOL_NAME.to_string(),
            description: format!(
                "{}\nAllowed commands: {}",
                TOOL_DESCRIPTION,
                self.gateway.allowed_commands().join(", ")
            ),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "command": {
                        "type": "array",
                        "items": {"type": "string"},
                        "description": "Command and its arguments as an array"
                    },
                    "stdin": {
                        "type": "string",
                        "description": "Input passed to the command via stdin"
                    },
                    "directory": {
                        "type": "string",
                        "description": "Working directory where the command runs"
                    },
                    "timeout": {
                        "type": "integer",
                        "description": "Maximum execution time in seconds",
                        "minimum": 0
                    }
                },
                "required": ["command", "directory"]
            }),
        }
    }

    /// Run the tool and collect its text output
    ///
    /// stdout comes first (when non-empty), then stderr unless it is empty or
    /// the benign job-control warning.
    pub async fn call(&self, arguments: &Value) -> Result<Vec<Content>, ToolCallError> {
        let request = parse_arguments(arguments)?;
        debug!("shell_execute request: {:?}", request.command);

        let result = match request.timeout {
            Some(secs) => ExecutionTimeout::from_secs(secs)
                .with_grace(OUTER_GUARD_GRACE)
                .run(self.gateway.handle(&request))
                .await
                .map_err(|_| ToolCallError::TimedOut(secs))?,
            None => self.gateway.handle(&request).await,
        };

        if let Some(error) = result.error() {
            return Err(ToolCallError::Execution(error.to_string()));
        }

        let mut content = Vec::new();
        if !result.stdout().is_empty() {
            content.push(Content::text(result.stdout()));
        }
        let stderr = result.stderr();
        if !stderr.is_empty() && !stderr.contains(BENIGN_STDERR) {
            content.push(Content::text(stderr));
        }
        Ok(content)
    }
}

/// Turn raw tool arguments into a request, rejecting malformed shapes
pub fn parse_arguments(arguments: &Value) -> Result<CommandRequest, ToolCallError> {
    let args = arguments.as_object().ok_or(ToolCallError::ArgumentsNotObject)?;

    let command = parse_command(args)?;

    let directory = match args.get("directory") {
        None | Some(Value::Null) => return Err(ToolCallError::MissingDirectory),
        Some(Value::String(dir)) if dir.is_empty() => return Err(ToolCallError::MissingDirectory),
        Some(Value::String(dir)) => dir.clone(),
        Some(_) => {
            return Err(ToolCallError::InvalidField {
                field: "directory",
                expected: "a string",
            })
        }
    };

    let stdin = match args.get("stdin") {
        None | Some(Value::Null) => None,
        Some(Value::String(text)) => Some(text.clone()),
        Some(_) => {
            return Err(ToolCallError::InvalidField {
                field: "stdin",
                expected: "a string",
            })
        }
    };

    let timeout = match args.get("timeout") {
        None | Some(Value::Null) => None,
        Some(value) => Some(value.as_u64().ok_or(ToolCallError::InvalidField {
            field: "timeout",
            expected: "a non-negative integer",
        })?),
    };

    Ok(CommandRequest {
        command,
        directory,
        stdin,
        timeout,
    })
}

fn parse_command(args: &Map<String, Value>) -> Result<Vec<String>, ToolCallError> {
    let items = match args.get("command") {
        None | Some(Value::Null) => return Err(ToolCallError::NoCommand),
        Some(Value::Array(items)) => items,
        Some(Value::String(s)) if s.is_empty() => return Err(ToolCallError::NoCommand),
        Some(_) => return Err(ToolCallError::CommandNotArray),
    };

    if items.is_empty() {
        return Err(ToolCallError::NoCommand);
    }

    items
        .iter()
        .map(|item| {
            item.as_str()
                .map(str::to_string)
                .ok_or(ToolCallError::CommandNotArray)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::{AllowList, ExecutionResult};
    use async_trait::async_trait;
    use std::path::Path;
    use tempfile::TempDir;

    /// Runner that ignores the command and returns fixed output
    struct CannedRunner {
        stderr: &'static str,
        stall: bool,
    }

    #[async_trait]
    impl CommandRunner for CannedRunner {
        async fn execute(
            &self,
            _argv: &[String],
            _directory: &Path,
            _stdin: Option<&str>,
            _timeout: Option<ExecutionTimeout>,
        ) -> ExecutionResult {
            if self.stall {
                std::future::pending::<()>().await;
            }
            ExecutionResult::Completed {
                stdout: "out\n".to_string(),
                stderr: self.stderr.to_string(),
                status: 0,
                duration: Duration::from_millis(1),
            }
        }
    }

    fn tool(list: &str) -> ShellTool {
        ShellTool::new(ExecutionGateway::new(AllowList::parse(list)))
    }

    fn dir_str(dir: &TempDir) -> String {
        dir.path().to_str().unwrap().to_string()
    }

    #[test]
    fn test_description_lists_allowed_commands() {
        let description = tool("ls,cat,pwd").description();
        assert_eq!(description.name, "shell_execute");
        assert!(description
            .description
            .ends_with("Allowed commands: ls, cat, pwd"));
        assert_eq!(
            description.input_schema["required"],
            json!(["command", "directory"])
        );
    }

    #[test]
    fn test_parse_full_arguments() {
        let request = parse_arguments(&json!({
            "command": ["grep", "-n", "x"],
            "directory": "/tmp",
            "stdin": "x\ny\n",
            "timeout": 10
        }))
        .unwrap();

        assert_eq!(request.command, ["grep", "-n", "x"]);
        assert_eq!(request.directory, "/tmp");
        assert_eq!(request.stdin.as_deref(), Some("x\ny\n"));
        assert_eq!(request.timeout, Some(10));
    }

    #[test]
    fn test_parse_malformed_requests() {
        let cases = vec![
            (json!("ls"), ToolCallError::ArgumentsNotObject),
            (json!({"directory": "/tmp"}), ToolCallError::NoCommand),
            (json!({"command": [], "directory": "/tmp"}), ToolCallError::NoCommand),
            (json!({"command": "ls -la", "directory": "/tmp"}), ToolCallError::CommandNotArray),
            (json!({"command": ["ls", 3], "directory": "/tmp"}), ToolCallError::CommandNotArray),
            (json!({"command": ["ls"]}), ToolCallError::MissingDirectory),
            (json!({"command": ["ls"], "directory": ""}), ToolCallError::MissingDirectory),
            (
                json!({"command": ["ls"], "directory": 5}),
                ToolCallError::InvalidField { field: "directory", expected: "a string" },
            ),
            (
                json!({"command": ["ls"], "directory": "/tmp", "stdin": 1}),
                ToolCallError::InvalidField { field: "stdin", expected: "a string" },
            ),
            (
                json!({"command": ["ls"], "directory": "/tmp", "timeout": -1}),
                ToolCallError::InvalidField { field: "timeout", expected: "a non-negative integer" },
            ),
            (
                json!({"command": ["ls"], "directory": "/tmp", "timeout": 1.5}),
                ToolCallError::InvalidField { field: "timeout", expected: "a non-negative integer" },
            ),
        ];

        for (arguments, expected) in cases {
            let err = parse_arguments(&arguments).unwrap_err();
            assert_eq!(err, expected, "arguments: {}", arguments);
            assert!(err.is_malformed_request());
        }
    }

    #[tokio::test]
    async fn test_call_returns_stdout() {
        let dir = TempDir::new().unwrap();
        let content = tool("echo")
            .call(&json!({"command": ["echo", "hello"], "directory": dir_str(&dir)}))
            .await
            .unwrap();

        assert_eq!(content, vec![Content::text("hello\n")]);
    }

    #[tokio::test]
    async fn test_call_includes_stderr_segment() {
        let dir = TempDir::new().unwrap();
        let content = tool("ls")
            .call(&json!({
                "command": ["ls", "definitely-not-here"],
                "directory": dir_str(&dir)
            }))
            .await
            .unwrap();

        // ls exits non-zero but that is still a completed run
        assert_eq!(content.len(), 1);
        let Content::Text { text } = &content[0];
        assert!(text.contains("definitely-not-here"));
    }

    #[tokio::test]
    async fn test_call_filters_benign_stderr() {
        let dir = TempDir::new().unwrap();
        let runner = CannedRunner {
            stderr: "bash: cannot set terminal process group (-1): Inappropriate ioctl\n",
            stall: false,
        };
        let tool = ShellTool::new(ExecutionGateway::with_runner(AllowList::parse("bash"), runner));
        let content = tool
            .call(&json!({"command": ["bash", "-i"], "directory": dir_str(&dir)}))
            .await
            .unwrap();

        assert_eq!(content, vec![Content::text("out\n")]);
    }

    #[tokio::test]
    async fn test_outer_guard_fires_when_runner_stalls() {
        let dir = TempDir::new().unwrap();
        let runner = CannedRunner {
            stderr: "",
            stall: true,
        };
        let tool = ShellTool::new(ExecutionGateway::with_runner(AllowList::parse("cat"), runner));
        let err = tool
            .call(&json!({"command": ["cat"], "directory": dir_str(&dir), "timeout": 1}))
            .await
            .unwrap_err();

        assert_eq!(err, ToolCallError::TimedOut(1));
    }

    #[tokio::test]
    async fn test_call_with_stdin() {
        let dir = TempDir::new().unwrap();
        let content = tool("wc")
            .call(&json!({
                "command": ["wc", "-l"],
                "directory": dir_str(&dir),
                "stdin": "a\nb\nc\n"
            }))
            .await
            .unwrap();

        let Content::Text { text } = &content[0];
        assert_eq!(text.trim(), "3");
    }

    #[tokio::test]
    async fn test_call_rejection_becomes_error() {
        let dir = TempDir::new().unwrap();
        let err = tool("ls")
            .call(&json!({"command": ["rm", "-rf", "/"], "directory": dir_str(&dir)}))
            .await
            .unwrap_err();

        assert_eq!(err, ToolCallError::Execution("Command not allowed: rm".to_string()));
        assert!(!err.is_malformed_request());
    }

    #[tokio::test]
    async fn test_call_timeout_becomes_error() {
        let dir = TempDir::new().unwrap();
        let err = tool("sleep")
            .call(&json!({"command": ["sleep", "5"], "directory": dir_str(&dir), "timeout": 1}))
            .await
            .unwrap_err();

        assert_eq!(
            err,
            ToolCallError::Execution("Command timed out after 1 seconds".to_string())
        );
    }

    #[test]
    fn test_outer_timeout_message() {
        assert_eq!(
            ToolCallError::TimedOut(3).to_string(),
            "execution timed out after 3 seconds"
        );
    }
}
