//! MCP Server
//!
//! Dispatches JSON-RPC requests read from a [`LineReader`] to the
//! `shell_execute` tool and writes responses through a [`ResponseWriter`].
//!
//! Each request is handled on its own task so a long-running command does not
//! hold up `ping` or `tools/list`. Responses may therefore arrive out of order;
//! clients match them by `id`. A single writer task owns the output stream so
//! lines never interleave.

use std::sync::Arc;

use anyhow::{Context, Result};
use serde_json::{json, Value};
use tokio::io::{AsyncBufRead, AsyncWrite};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::mcp::protocol::{
    InitializeResult, McpError, McpMethod, McpRequest, McpResponse, ServerCapabilities,
    ServerInfo, ToolCallParams, ToolCallResult, ToolsCapability, JSONRPC_VERSION,
    PROTOCOL_VERSION,
};
use crate::mcp::shell_tool::{ShellTool, ToolCallError, TOOL_NAME};
use crate::mcp::transport::{LineReader, ResponseWriter};
use crate::tools::{CommandExecutor, CommandRunner};

pub const SERVER_NAME: &str = "shell-gateway";

/// Responses buffered between request tasks and the writer
const RESPONSE_QUEUE_DEPTH: usize = 64;

/// MCP server exposing the `shell_execute` tool
pub struct McpServer<R = CommandExecutor> {
    tool: ShellTool<R>,
    server_info: ServerInfo,
}

impl<R: CommandRunner + 'static> McpServer<R> {
    pub fn new(tool: ShellTool<R>) -> Self {
        Self {
            tool,
            server_info: ServerInfo {
                name: SERVER_NAME.to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
            },
        }
    }

    pub fn tool(&self) -> &ShellTool<R> {
        &self.tool
    }

    /// Handle one raw line from the client
    ///
    /// Returns `None` for notifications, which never get a response. Lines that
    /// are not JSON (including invalid UTF-8) are answered with a parse error.
    pub async fn handle_line(&self, line: impl AsRef<[u8]>) -> Option<McpResponse> {
        let value: Value = match serde_json::from_slice(line.as_ref()) {
            Ok(value) => value,
            Err(e) => {
                warn!("Unparseable message from client: {}", e);
                return Some(McpResponse::err(
                    Value::Null,
                    McpError::parse_error(e.to_string()),
                ));
            }
        };

        if !value.is_object() {
            warn!("Message is not a JSON object: {}", value);
            return Some(McpResponse::err(
                Value::Null,
                McpError::invalid_request("Request must be a JSON object"),
            ));
        }

        let id = value.get("id").cloned().unwrap_or(Value::Null);
        let request: McpRequest = match serde_json::from_value(value) {
            Ok(request) => request,
            Err(e) => {
                warn!("Malformed request: {}", e);
                return Some(McpResponse::err(id, McpError::invalid_request(e.to_string())));
            }
        };

        self.handle_request(request).await
    }

    /// Handle one decoded request
    pub async fn handle_request(&self, request: McpRequest) -> Option<McpResponse> {
        let method = McpMethod::from(request.method.as_str());
        debug!("Received {} (id: {:?})", method.as_str(), request.id);

        let Some(id) = request.id else {
            if method != McpMethod::Initialized {
                debug!("Ignoring notification {}", method.as_str());
            }
            return None;
        };

        if request.jsonrpc != JSONRPC_VERSION {
            return Some(McpResponse::err(
                id,
                McpError::invalid_request(format!(
                    "Unsupported JSON-RPC version: {}",
                    request.jsonrpc
                )),
            ));
        }

        let outcome = match method {
            McpMethod::Initialize => self.initialize(),
            McpMethod::Ping => Ok(json!({})),
            McpMethod::ToolsList => Ok(json!({ "tools": [self.tool.description()] })),
            McpMethod::ToolsCall => self.call_tool(request.params).await,
            McpMethod::Initialized | McpMethod::Other(_) => {
                Err(McpError::method_not_found(method.as_str()))
            }
        };

        Some(match outcome {
            Ok(result) => McpResponse::ok(id, result),
            Err(error) => McpResponse::err(id, error),
        })
    }

    fn initialize(&self) -> Result<Value, McpError> {
        let result = InitializeResult {
            protocol_version: PROTOCOL_VERSION.to_string(),
            capabilities: ServerCapabilities {
                tools: Some(ToolsCapability::default()),
            },
            server_info: self.server_info.clone(),
        };
        info!(
            "Client initialized (protocol {}), {} commands allowed",
            PROTOCOL_VERSION,
            self.tool.gateway().allowed_commands().len()
        );
        serde_json::to_value(result).map_err(|e| McpError::internal_error(e.to_string()))
    }

    async fn call_tool(&self, params: Option<Value>) -> Result<Value, McpError> {
        let params: ToolCallParams = params
            .ok_or_else(|| McpError::invalid_params("Missing tool call parameters"))
            .and_then(|p| {
                serde_json::from_value(p).map_err(|e| McpError::invalid_params(e.to_string()))
            })?;

        if params.name != TOOL_NAME {
            return Err(McpError::invalid_params(
                ToolCallError::UnknownTool(params.name).to_string(),
            ));
        }

        let result = match self.tool.call(&params.arguments).await {
            Ok(content) => ToolCallResult::success(content),
            Err(e) if e.is_malformed_request() => {
                return Err(McpError::invalid_params(e.to_string()));
            }
            Err(e) => ToolCallResult::error(e.to_string()),
        };

        serde_json::to_value(result).map_err(|e| McpError::internal_error(e.to_string()))
    }

    /// Serve requests until the reader reaches end of stream
    ///
    /// Requests still running at EOF are allowed to finish and their responses
    /// are written before this returns.
    pub async fn serve<In, Out>(
        self,
        mut reader: LineReader<In>,
        mut writer: ResponseWriter<Out>,
    ) -> Result<()>
    where
        In: AsyncBufRead + Unpin,
        Out: AsyncWrite + Unpin + Send + 'static,
    {
        let server = Arc::new(self);
        let (tx, mut rx) = mpsc::channel::<McpResponse>(RESPONSE_QUEUE_DEPTH);

        let writer_task = tokio::spawn(async move {
            while let Some(response) = rx.recv().await {
                writer.send(&response).await?;
            }
            Ok::<(), anyhow::Error>(())
        });

        info!("MCP server listening on stdio");

        while let Some(line) = reader.next_line().await? {
            let server = Arc::clone(&server);
            let tx = tx.clone();
            tokio::spawn(async move {
                if let Some(response) = server.handle_line(&line).await {
                    if tx.send(response).await.is_err() {
                        error!("Response dropped: writer has stopped");
                    }
                }
            });
        }

        info!("Client closed the connection, draining in-flight requests");
        drop(tx);

        writer_task
            .await
            .context("MCP writer task panicked")?
            .context("Failed to write to MCP client")
    }
}
