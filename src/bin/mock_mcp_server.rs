//! Mock MCP tool provider for integration testing
//!
//! This binary implements a minimal MCP stdio server so the agent can be
//! exercised without a real browser. It offers four tools:
//! - `navigate`: reports a page title for the given URL
//! - `echo`: returns its `text` argument
//! - `fail`: always returns a tool error
//! - `hang`: never answers (the server keeps serving later requests)
//!
//! Set `MOCK_MCP_PAGE_SIZE` to split `tools/list` into pages, and
//! `MOCK_MCP_SILENT_INITIALIZE=1` to leave `initialize` unanswered.

use serde_json::{json, Value};
use std::io::{BufRead, BufReader, Write};

fn main() {
    let stdin = std::io::stdin();
    let stdout = std::io::stdout();
    let reader = BufReader::new(stdin.lock());
    let mut writer = stdout.lock();

    let page_size = std::env::var("MOCK_MCP_PAGE_SIZE")
        .ok()
        .and_then(|v| v.parse().ok())
        .filter(|n: &usize| *n > 0)
        .unwrap_or(usize::MAX);
    let silent_initialize = std::env::var("MOCK_MCP_SILENT_INITIALIZE").is_ok_and(|v| v == "1");
    let mut state = MockState {
        page_size,
        silent_initialize,
        ..MockState::default()
    };

    for line in reader.lines() {
        let Ok(line) = line else {
            break; // EOF or broken pipe
        };
        if line.trim().is_empty() {
            continue;
        }

        let message: Value = match serde_json::from_str(&line) {
            Ok(v) => v,
            Err(_) => continue,
        };

        for response in state.process_message(&message) {
            send_message(&mut writer, &response);
        }
    }
}

fn send_message<W: Write>(writer: &mut W, message: &Value) {
    let body = serde_json::to_string(message).unwrap();
    writer.write_all(body.as_bytes()).ok();
    writer.write_all(b"\n").ok();
    writer.flush().ok();
}

#[derive(Default)]
struct MockState {
    initialized: bool,
    page_size: usize,
    silent_initialize: bool,
}

impl MockState {
    fn process_message(&mut self, message: &Value) -> Vec<Value> {
        let Some(method) = message.get("method").and_then(Value::as_str) else {
            return Vec::new(); // Responses to our own requests
        };
        let Some(id) = message.get("id").cloned() else {
            if method == "notifications/initialized" {
                self.initialized = true;
            }
            return Vec::new();
        };
        let params = message.get("params").cloned().unwrap_or(Value::Null);

        if method == "initialize" && self.silent_initialize {
            return Vec::new();
        }
        if method == "tools/call" && params["name"] == "hang" {
            return Vec::new();
        }

        let result = match method {
            "initialize" => Ok(json!({
                "protocolVersion": params["protocolVersion"].as_str().unwrap_or("2024-11-05"),
                "capabilities": { "tools": {} },
                "serverInfo": { "name": "mock-mcp-server", "version": "0.1.0" }
            })),
            "ping" => Ok(json!({})),
            "tools/list" if !self.initialized => Err((-32002, "Server not initialized".to_string())),
            "tools/list" => Ok(self.list_tools(params.get("cursor").and_then(Value::as_str))),
            "tools/call" => Ok(self.call_tool(&params)),
            other => Err((-32601, format!("Method not found: {}", other))),
        };

        let mut responses = Vec::new();

        // Exercise the client's handling of interleaved traffic
        if method == "tools/call" {
            responses.push(json!({
                "jsonrpc": "2.0",
                "method": "notifications/message",
                "params": { "level": "info", "data": "tool call received" }
            }));
        }

        responses.push(match result {
            Ok(result) => json!({ "jsonrpc": "2.0", "id": id, "result": result }),
            Err((code, message)) => json!({
                "jsonrpc": "2.0",
                "id": id,
                "error": { "code": code, "message": message }
            }),
        });
        responses
    }

    fn list_tools(&self, cursor: Option<&str>) -> Value {
        let tools = vec![
            json!({
                "name": "navigate",
                "description": "Open a URL in the mock browser",
                "inputSchema": {
                    "type": "object",
                    "properties": { "url": { "type": "string" } },
                    "required": ["url"]
                }
            }),
            json!({
                "name": "echo",
                "description": "Return the given text",
                "inputSchema": {
                    "type": "object",
                    "properties": { "text": { "type": "string" } }
                }
            }),
            json!({
                "name": "fail",
                "description": "Always fails",
                "inputSchema": { "type": "object", "properties": {} }
            }),
            json!({
                "name": "hang",
                "description": "Never answers",
                "inputSchema": { "type": "object", "properties": {} }
            }),
        ];

        let start: usize = cursor.and_then(|c| c.parse().ok()).unwrap_or(0);
        let end = start.saturating_add(self.page_size).min(tools.len());
        let page: Vec<Value> = tools[start.min(end)..end].to_vec();

        if end < tools.len() {
            json!({ "tools": page, "nextCursor": end.to_string() })
        } else {
            json!({ "tools": page })
        }
    }

    fn call_tool(&self, params: &Value) -> Value {
        let name = params["name"].as_str().unwrap_or("");
        let args = &params["arguments"];

        match name {
            "navigate" => {
                let url = args["url"].as_str().unwrap_or("about:blank");
                let title = if url.contains("example.com") {
                    "Example Domain"
                } else {
                    "Untitled"
                };
                text_result(&format!("Navigated to {}. Page title: {}", url, title), false)
            }
            "echo" => text_result(args["text"].as_str().unwrap_or(""), false),
            "fail" => text_result("mock failure", true),
            other => text_result(&format!("Unknown tool: {}", other), true),
        }
    }
}

fn text_result(text: &str, is_error: bool) -> Value {
    json!({
        "content": [{ "type": "text", "text": text }],
        "isError": is_error
    })
}
