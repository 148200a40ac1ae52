//! MCP Transport Layer
//!
//! Line-delimited JSON over a byte stream: each message is one JSON object on
//! one line. The server reads requests from its stdin and writes responses to
//! its stdout; logs must therefore never go to stdout.
//!
//! The transport only moves lines. Parsing and dispatch live in the server.

use anyhow::{Context, Result};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::io::{Stdin, Stdout};

use crate::mcp::protocol::McpResponse;

/// Reading half of a stdio transport
///
/// Lines are handed out as raw bytes: a line that is not valid UTF-8 is the
/// client's mistake to be answered, not a transport failure.
pub struct LineReader<R> {
    reader: R,
    line_buffer: Vec<u8>,
}

impl<R: AsyncBufRead + Unpin> LineReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            line_buffer: Vec::with_capacity(4096),
        }
    }

    /// Next non-blank line, or `None` at end of stream
    pub async fn next_line(&mut self) -> Result<Option<Vec<u8>>> {
        loop {
            self.line_buffer.clear();
            let read = self
                .reader
                .read_until(b'\n', &mut self.line_buffer)
                .await
                .context("Failed to read from MCP client")?;

            if read == 0 {
                return Ok(None);
            }

            let line = self.line_buffer.trim_ascii();
            if !line.is_empty() {
                return Ok(Some(line.to_vec()));
            }
        }
    }
}

/// Writing half of a stdio transport
pub struct ResponseWriter<W> {
    writer: W,
}

impl<W: AsyncWrite + Unpin> ResponseWriter<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    /// Serialize a response as one line and flush it
    pub async fn send(&mut self, response: &McpResponse) -> Result<()> {
        let json =
            serde_json::to_string(response).context("Failed to serialize MCP response to JSON")?;

        tracing::debug!("Sending to MCP client: {}", json);

        self.writer
            .write_all(json.as_bytes())
            .await
            .context("Failed to write MCP response")?;
        self.writer
            .write_all(b"\n")
            .await
            .context("Failed to write newline after MCP response")?;
        self.writer
            .flush()
            .await
            .context("Failed to flush MCP response")?;
        Ok(())
    }
}

/// The process's own stdin/stdout as an MCP transport
pub fn stdio() -> (LineReader<BufReader<Stdin>>, ResponseWriter<Stdout>) {
    (
        LineReader::new(BufReader::new(tokio::io::stdin())),
        ResponseWriter::new(tokio::io::stdout()),
    )
}
