//! MCP message and payload types
//!
//! Only the subset of the Model Context Protocol a tool-calling client
//! needs: the initialize handshake, tool listing and tool calls.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Protocol revision announced during initialize
pub const PROTOCOL_VERSION: &str = "2024-11-05";

/// JSON-RPC "method not found"
pub const METHOD_NOT_FOUND: i64 = -32601;

// ============================================================================
// JSON-RPC envelopes
// ============================================================================

/// Outgoing request
#[derive(Debug, Clone, Serialize)]
pub struct JsonRpcRequest<'a> {
    pub jsonrpc: &'static str,
    pub id: i64,
    pub method: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl<'a> JsonRpcRequest<'a> {
    pub fn new(id: i64, method: &'a str, params: Option<Value>) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            method,
            params,
        }
    }
}

/// Outgoing notification (no id, no response)
#[derive(Debug, Clone, Serialize)]
pub struct JsonRpcNotification<'a> {
    pub jsonrpc: &'static str,
    pub method: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl<'a> JsonRpcNotification<'a> {
    pub fn new(method: &'a str, params: Option<Value>) -> Self {
        Self {
            jsonrpc: "2.0",
            method,
            params,
        }
    }
}

/// Error object carried by a failed response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcError {
    pub code: i64,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

/// Any message a server may send
///
/// Classified by which of `id`, `method`, `result` and `error` are present.
#[derive(Debug, Clone, Deserialize)]
pub struct IncomingMessage {
    #[serde(default)]
    pub id: Option<Value>,
    #[serde(default)]
    pub method: Option<String>,
    #[serde(default)]
    pub params: Option<Value>,
    #[serde(default)]
    pub result: Option<Value>,
    #[serde(default)]
    pub error: Option<RpcError>,
}

/// What an incoming message turned out to be
#[derive(Debug, Clone)]
pub enum Incoming {
    Response {
        id: Value,
        result: std::result::Result<Value, RpcError>,
    },
    Request {
        id: Value,
        method: String,
        params: Option<Value>,
    },
    Notification {
        method: String,
        params: Option<Value>,
    },
}

impl IncomingMessage {
    pub fn classify(self) -> Option<Incoming> {
        match (self.id, self.method) {
            (Some(id), Some(method)) => Some(Incoming::Request {
                id,
                method,
                params: self.params,
            }),
            (None, Some(method)) => Some(Incoming::Notification {
                method,
                params: self.params,
            }),
            (Some(id), None) => {
                let result = match self.error {
                    Some(error) => Err(error),
                    None => Ok(self.result.unwrap_or(Value::Null)),
                };
                Some(Incoming::Response { id, result })
            }
            (None, None) => None,
        }
    }
}

// ============================================================================
// Payloads
// ============================================================================

/// Identity of the server, from the initialize result
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ServerInfo {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub version: String,
}

/// Result of the initialize request
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializeResult {
    pub protocol_version: String,
    #[serde(default)]
    pub capabilities: Value,
    #[serde(default)]
    pub server_info: ServerInfo,
    #[serde(default)]
    pub instructions: Option<String>,
}

/// A tool offered by a server
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolInfo {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default = "empty_object_schema")]
    pub input_schema: Value,
}

fn empty_object_schema() -> Value {
    serde_json::json!({ "type": "object", "properties": {} })
}

/// One page of `tools/list`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListToolsResult {
    pub tools: Vec<ToolInfo>,
    #[serde(default)]
    pub next_cursor: Option<String>,
}

/// Result of `tools/call`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallToolResult {
    #[serde(default)]
    pub content: Vec<ToolContent>,
    #[serde(default)]
    pub is_error: bool,
}

/// A content block in a tool result
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ToolContent {
    Known(KnownContent),
    /// Content kinds this client does not model
    Other(Value),
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum KnownContent {
    Text {
        text: String,
    },
    Image {
        #[serde(rename = "mimeType")]
        mime_type: String,
    },
    Resource {
        resource: Value,
    },
}

impl CallToolResult {
    /// Flatten content blocks into text the model can read
    pub fn to_text(&self) -> String {
        let parts: Vec<String> = self
            .content
            .iter()
            .map(|block| match block {
                ToolContent::Known(KnownContent::Text { text }) => text.clone(),
                ToolContent::Known(KnownContent::Image { mime_type }) => {
                    format!("[image: {}]", mime_type)
                }
                ToolContent::Known(KnownContent::Resource { resource }) => resource
                    .get("text")
                    .and_then(Value::as_str)
                    .map(str::to_string)
                    .unwrap_or_else(|| resource.to_string()),
                ToolContent::Other(value) => value.to_string(),
            })
            .collect();

        if parts.is_empty() {
            "(no output)".to_string()
        } else {
            parts.join("\n")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn incoming(value: Value) -> Incoming {
        serde_json::from_value::<IncomingMessage>(value)
            .unwrap()
            .classify()
            .unwrap()
    }

    #[test]
    fn test_classify_messages() {
        assert!(matches!(
            incoming(json!({"jsonrpc": "2.0", "id": 3, "result": {}})),
            Incoming::Response { result: Ok(_), .. }
        ));
        assert!(matches!(
            incoming(json!({"jsonrpc": "2.0", "id": 3, "error": {"code": -1, "message": "boom"}})),
            Incoming::Response { result: Err(e), .. } if e.message == "boom"
        ));
        assert!(matches!(
            incoming(json!({"jsonrpc": "2.0", "id": "a", "method": "ping"})),
            Incoming::Request { method, .. } if method == "ping"
        ));
        assert!(matches!(
            incoming(json!({"jsonrpc": "2.0", "method": "notifications/message", "params": {}})),
            Incoming::Notification { .. }
        ));
    }

    #[test]
    fn test_request_serialization_omits_missing_params() {
        let json = serde_json::to_value(JsonRpcRequest::new(1, "tools/list", None)).unwrap();
        assert_eq!(json, json!({"jsonrpc": "2.0", "id": 1, "method": "tools/list"}));
    }

    #[test]
    fn test_tool_info_defaults_schema() {
        let tool: ToolInfo = serde_json::from_value(json!({"name": "browser_snapshot"})).unwrap();
        assert_eq!(tool.input_schema["type"], "object");
        assert!(tool.description.is_none());
    }

    #[test]
    fn test_call_result_to_text() {
        let result: CallToolResult = serde_json::from_value(json!({
            "content": [
                {"type": "text", "text": "Navigated to https://example.com"},
                {"type": "image", "data": "iVBOR...", "mimeType": "image/png"},
                {"type": "audio", "data": "..."}
            ],
            "isError": false
        }))
        .unwrap();

        let text = result.to_text();
        assert!(text.starts_with("Navigated to https://example.com\n[image: image/png]\n"));
        assert!(text.contains("audio"));
        assert!(!result.is_error);
    }

    #[test]
    fn test_empty_call_result() {
        assert_eq!(CallToolResult::default().to_text(), "(no output)");
    }
}
