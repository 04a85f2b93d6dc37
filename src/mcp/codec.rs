//! MCP stdio wire codec
//!
//! The stdio transport carries one JSON-RPC message per line:
//! ```text
//! {"jsonrpc":"2.0","id":1,"method":"tools/list"}\n
//! ```
//! Messages must not contain embedded newlines.

use std::io;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::common::Error;

/// Upper bound on a single message; screenshots can be large
const MAX_MESSAGE_BYTES: usize = 16 * 1024 * 1024;

/// Read the next MCP message from the stream
///
/// Blank lines are skipped. `server` names the provider in EOF errors.
/// A line is never buffered beyond `MAX_MESSAGE_BYTES`.
pub async fn read_message<R: AsyncBufRead + Unpin>(
    reader: &mut R,
    server: &str,
) -> Result<String, Error> {
    read_message_limited(reader, server, MAX_MESSAGE_BYTES).await
}

async fn read_message_limited<R: AsyncBufRead + Unpin>(
    reader: &mut R,
    server: &str,
    limit: usize,
) -> Result<String, Error> {
    loop {
        let mut line = Vec::new();
        let bytes_read = (&mut *reader)
            .take(limit as u64 + 1)
            .read_until(b'\n', &mut line)
            .await
            .map_err(|e| {
                if e.kind() == io::ErrorKind::UnexpectedEof {
                    Error::McpServerCrashed(server.to_string())
                } else {
                    Error::Io(e)
                }
            })?;

        if bytes_read == 0 {
            return Err(Error::McpServerCrashed(server.to_string()));
        }

        if !line.ends_with(b"\n") && line.len() > limit {
            return Err(Error::McpProtocol(format!(
                "Message from '{}' exceeds {} bytes",
                server, limit
            )));
        }

        let line = String::from_utf8(line).map_err(|e| {
            Error::McpProtocol(format!("Message from '{}' is not UTF-8: {}", server, e))
        })?;

        let trimmed = line.trim();
        if !trimmed.is_empty() {
            return Ok(trimmed.to_string());
        }
    }
}

/// Write an MCP message to the stream
pub async fn write_message<W: AsyncWrite + Unpin>(writer: &mut W, json: &str) -> Result<(), Error> {
    if json.contains('\n') {
        return Err(Error::McpProtocol(
            "Message contains an embedded newline".to_string(),
        ));
    }

    writer.write_all(json.as_bytes()).await?;
    writer.write_all(b"\n").await?;
    writer.flush().await?;

    Ok(())
}
