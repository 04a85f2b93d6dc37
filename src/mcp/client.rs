//! MCP client for communicating with tool providers
//!
//! Each provider runs as a child process speaking JSON-RPC over its
//! stdin/stdout. This module handles the initialize handshake, tool
//! discovery and tool calls.

use std::collections::BTreeMap;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use serde_json::{json, Value};
use tokio::io::{BufReader, BufWriter};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};

use crate::common::{Error, Result};

use super::codec;
use super::types::*;

/// Default bound on a single provider request
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// MCP client for one tool provider process
pub struct McpClient {
    /// Provider name from the configuration
    name: String,
    /// Provider subprocess
    process: Child,
    /// Buffered reader for provider stdout
    reader: BufReader<ChildStdout>,
    /// Buffered writer for provider stdin
    writer: BufWriter<ChildStdin>,
    /// Id for the next request
    next_id: i64,
    /// Bound on each request/response exchange
    request_timeout: Duration,
    /// Server identity (populated after initialize)
    pub server_info: ServerInfo,
}

impl McpClient {
    /// Spawn a tool provider and create a client
    pub async fn spawn(
        name: &str,
        program: &Path,
        args: &[String],
        env: &BTreeMap<String, String>,
    ) -> Result<Self> {
        let mut cmd = Command::new(program);
        cmd.args(args)
            .envs(env)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit()) // Let provider errors go to stderr
            .kill_on_drop(true);

        let mut process = cmd.spawn().map_err(|e| {
            Error::server_start_failed(name, format!("Failed to start {}: {}", program.display(), e))
        })?;

        let stdin = process
            .stdin
            .take()
            .ok_or_else(|| Error::server_start_failed(name, "Failed to get provider stdin"))?;
        let stdout = process
            .stdout
            .take()
            .ok_or_else(|| Error::server_start_failed(name, "Failed to get provider stdout"))?;

        tracing::debug!(provider = name, program = %program.display(), "Spawned tool provider");

        Ok(Self {
            name: name.to_string(),
            process,
            reader: BufReader::new(stdout),
            writer: BufWriter::new(stdin),
            next_id: 1,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            server_info: ServerInfo::default(),
        })
    }

    /// Set the time limit for each request
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Provider name from the configuration
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Perform the initialize handshake
    pub async fn initialize(&mut self) -> Result<InitializeResult> {
        let params = json!({
            "protocolVersion": PROTOCOL_VERSION,
            "capabilities": {},
            "clientInfo": {
                "name": env!("CARGO_PKG_NAME"),
                "version": env!("CARGO_PKG_VERSION")
            }
        });

        let result: InitializeResult = self.request("initialize", Some(params)).await?;

        if result.protocol_version != PROTOCOL_VERSION {
            tracing::info!(
                provider = %self.name,
                "Server negotiated protocol {} (requested {})",
                result.protocol_version,
                PROTOCOL_VERSION
            );
        }

        self.notify("notifications/initialized", None).await?;
        self.server_info = result.server_info.clone();

        Ok(result)
    }

    /// List every tool the provider offers, following pagination
    pub async fn list_tools(&mut self) -> Result<Vec<ToolInfo>> {
        let mut tools = Vec::new();
        let mut cursor: Option<String> = None;

        loop {
            let params = cursor.as_ref().map(|c| json!({ "cursor": c }));
            let page: ListToolsResult = self.request("tools/list", params).await?;
            tools.extend(page.tools);

            match page.next_cursor {
                Some(next) if !next.is_empty() => cursor = Some(next),
                _ => break,
            }
        }

        Ok(tools)
    }

    /// Invoke a tool
    ///
    /// A result with `is_error` set is still `Ok`; only protocol-level
    /// failures are errors.
    pub async fn call_tool(&mut self, tool: &str, arguments: Value) -> Result<CallToolResult> {
        self.request(
            "tools/call",
            Some(json!({ "name": tool, "arguments": arguments })),
        )
        .await
    }

    /// Stop the provider process
    pub async fn shutdown(mut self) -> Result<()> {
        tracing::debug!(provider = %self.name, "Stopping tool provider");
        // Closing stdin is the polite stdio shutdown signal; kill covers the rest
        drop(self.writer);
        self.process.kill().await.or_else(|e| {
            if e.kind() == std::io::ErrorKind::InvalidInput {
                // Already exited
                Ok(())
            } else {
                Err(Error::Io(e))
            }
        })
    }

    /// Get the next request id
    fn next_id(&mut self) -> i64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    /// Send a notification
    async fn notify(&mut self, method: &str, params: Option<Value>) -> Result<()> {
        let json = serde_json::to_string(&JsonRpcNotification::new(method, params))?;
        tracing::trace!(provider = %self.name, "MCP >>> {}", json);
        codec::write_message(&mut self.writer, &json).await
    }

    /// Read the next message from the provider
    async fn read_message(&mut self) -> Result<Option<Incoming>> {
        let json = codec::read_message(&mut self.reader, &self.name).await?;
        tracing::trace!(provider = %self.name, "MCP <<< {}", json);
        let message: IncomingMessage = serde_json::from_str(&json)
            .map_err(|e| Error::McpProtocol(format!("Invalid JSON from '{}': {}", self.name, e)))?;
        Ok(message.classify())
    }

    /// Send a request and wait for the response
    ///
    /// Notifications and server-initiated requests that arrive while
    /// waiting are handled in place. A provider that stays silent past the
    /// request timeout yields `McpTimeout`; a late reply to that request is
    /// skipped by a later exchange as an unknown id.
    pub async fn request<T: serde::de::DeserializeOwned>(
        &mut self,
        method: &str,
        params: Option<Value>,
    ) -> Result<T> {
        let timeout = self.request_timeout;
        let outcome = tokio::time::timeout(timeout, self.exchange(method, params)).await;

        match outcome {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!(
                    provider = %self.name,
                    method,
                    timeout_secs = timeout.as_secs(),
                    "Tool provider request timed out"
                );
                Err(Error::McpTimeout {
                    name: self.name.clone(),
                    method: method.to_string(),
                    secs: timeout.as_secs(),
                })
            }
        }
    }

    async fn exchange<T: serde::de::DeserializeOwned>(
        &mut self,
        method: &str,
        params: Option<Value>,
    ) -> Result<T> {
        let id = self.next_id();
        let json = serde_json::to_string(&JsonRpcRequest::new(id, method, params))?;
        tracing::trace!(provider = %self.name, "MCP >>> {}", json);
        codec::write_message(&mut self.writer, &json).await?;

        loop {
            match self.read_message().await? {
                Some(Incoming::Response { id: resp_id, result }) => {
                    if resp_id.as_i64() != Some(id) {
                        tracing::warn!(provider = %self.name, "Ignoring response to unknown request {}", resp_id);
                        continue;
                    }
                    return match result {
                        Ok(value) => serde_json::from_value(value).map_err(|e| {
                            Error::McpProtocol(format!("Failed to parse {} response: {}", method, e))
                        }),
                        Err(error) => Err(Error::mcp_request_failed(method, &error.message)),
                    };
                }
                Some(Incoming::Request { id: req_id, method: req_method, .. }) => {
                    self.answer_server_request(req_id, &req_method).await?;
                }
                Some(Incoming::Notification { method: note, params }) => {
                    tracing::debug!(provider = %self.name, method = %note, ?params, "Provider notification");
                }
                None => {
                    tracing::warn!(provider = %self.name, "Ignoring malformed message");
                }
            }
        }
    }

    /// Reply to a request the provider sent us
    ///
    /// Only `ping` is supported; this client offers no sampling or roots.
    async fn answer_server_request(&mut self, id: Value, method: &str) -> Result<()> {
        let reply = if method == "ping" {
            json!({ "jsonrpc": "2.0", "id": id, "result": {} })
        } else {
            tracing::debug!(provider = %self.name, method, "Rejecting unsupported server request");
            json!({
                "jsonrpc": "2.0",
                "id": id,
                "error": { "code": METHOD_NOT_FOUND, "message": format!("Method not supported: {}", method) }
            })
        };
        let json = serde_json::to_string(&reply)?;
        tracing::trace!(provider = %self.name, "MCP >>> {}", json);
        codec::write_message(&mut self.writer, &json).await
    }
}
