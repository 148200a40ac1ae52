//! MCP (Model Context Protocol) Server
//!
//! Exposes the execution gateway to MCP clients as a single tool,
//! `shell_execute`.
//!
//! # Architecture
//!
//! 1. **Protocol Layer** (`protocol`): JSON-RPC 2.0 message types
//! 2. **Transport Layer** (`transport`): line-delimited stdio
//! 3. **Tool Layer** (`shell_tool`): argument parsing and result shaping
//! 4. **Server Layer** (`server`): method dispatch and the serve loop

// Protocol layer: JSON-RPC 2.0 message types
pub mod protocol;

// Transport layer: line-delimited JSON over stdio
pub mod transport;

// The shell_execute tool
pub mod shell_tool;

// Server layer: dispatch and serve loop
pub mod server;

pub use protocol::{
    Content, InitializeResult, McpError, McpMethod, McpRequest, McpResponse, ServerCapabilities,
    ServerInfo, Tool, ToolCallParams, ToolCallResult,
};
pub use server::{McpServer, SERVER_NAME};
pub use shell_tool::{ShellTool, ToolCallError, TOOL_NAME};
pub use transport::{stdio, LineReader, ResponseWriter};
