//! Chat-completions request and response types
//!
//! The OpenAI-compatible wire format, limited to what a tool-calling loop
//! uses.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::mcp::ToolInfo;

/// Author of a chat message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

/// One message in the conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self::plain(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::plain(Role::User, content)
    }

    /// A tool's answer to one of the assistant's calls
    pub fn tool_result(call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: Role::Tool,
            content: Some(content.into()),
            tool_calls: Vec::new(),
            tool_call_id: Some(call_id.into()),
        }
    }

    fn plain(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: Some(content.into()),
            tool_calls: Vec::new(),
            tool_call_id: None,
        }
    }
}

/// A function call requested by the assistant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    #[serde(rename = "type", default = "function_type")]
    pub kind: String,
    pub function: FunctionCall,
}

/// Function name plus JSON-encoded arguments
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionCall {
    pub name: String,
    #[serde(default)]
    pub arguments: String,
}

impl FunctionCall {
    /// Decode the argument string
    ///
    /// Models sometimes send an empty string for argument-less tools.
    pub fn parsed_arguments(&self) -> serde_json::Result<Value> {
        if self.arguments.trim().is_empty() {
            Ok(Value::Object(Default::default()))
        } else {
            serde_json::from_str(&self.arguments)
        }
    }
}

/// A tool advertised to the model
#[derive(Debug, Clone, Serialize)]
pub struct ToolDefinition {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub function: FunctionDefinition,
}

#[derive(Debug, Clone, Serialize)]
pub struct FunctionDefinition {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub parameters: Value,
}

impl From<&ToolInfo> for ToolDefinition {
    fn from(tool: &ToolInfo) -> Self {
        Self {
            kind: "function",
            function: FunctionDefinition {
                name: tool.name.clone(),
                description: tool.description.clone(),
                parameters: tool.input_schema.clone(),
            },
        }
    }
}

fn function_type() -> String {
    "function".to_string()
}

fn no_tools(tools: &&[ToolDefinition]) -> bool {
    tools.is_empty()
}

/// Body of a chat-completions request
#[derive(Debug, Clone, Serialize)]
pub struct ChatRequest<'a> {
    pub model: &'a str,
    pub messages: &'a [ChatMessage],
    #[serde(skip_serializing_if = "no_tools")]
    pub tools: &'a [ToolDefinition],
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
}

/// Body of a chat-completions response
#[derive(Debug, Clone, Deserialize)]
pub struct ChatResponse {
    #[serde(default)]
    pub choices: Vec<Choice>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Choice {
    pub message: ChatMessage,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_tool_call_response() {
        let response: ChatResponse = serde_json::from_value(json!({
            "id": "chatcmpl-1",
            "choices": [{
                "index": 0,
                "message": {
                    "role": "assistant",
                    "content": null,
                    "tool_calls": [{
                        "id": "call_1",
                        "type": "function",
                        "function": {"name": "browser_navigate", "arguments": "{\"url\":\"https://example.com\"}"}
                    }]
                },
                "finish_reason": "tool_calls"
            }]
        }))
        .unwrap();

        let message = &response.choices[0].message;
        assert_eq!(message.role, Role::Assistant);
        assert!(message.content.is_none());
        let call = &message.tool_calls[0];
        assert_eq!(call.function.name, "browser_navigate");
        assert_eq!(
            call.function.parsed_arguments().unwrap(),
            json!({"url": "https://example.com"})
        );
    }

    #[test]
    fn test_empty_arguments_parse_as_object() {
        let call = FunctionCall {
            name: "browser_snapshot".into(),
            arguments: String::new(),
        };
        assert_eq!(call.parsed_arguments().unwrap(), json!({}));
    }

    #[test]
    fn test_request_serialization() {
        let messages = vec![ChatMessage::user("open example.com")];
        let request = ChatRequest {
            model: "gpt-4o",
            messages: &messages,
            tools: &[],
            temperature: None,
        };

        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            json!({
                "model": "gpt-4o",
                "messages": [{"role": "user", "content": "open example.com"}]
            })
        );
    }

    #[test]
    fn test_tool_result_message() {
        let value = serde_json::to_value(ChatMessage::tool_result("call_1", "ok")).unwrap();
        assert_eq!(
            value,
            json!({"role": "tool", "content": "ok", "tool_call_id": "call_1"})
        );
    }

    #[test]
    fn test_tool_definition_from_mcp_tool() {
        let tool = ToolInfo {
            name: "navigate".into(),
            description: Some("Open a URL".into()),
            input_schema: json!({"type": "object", "properties": {"url": {"type": "string"}}}),
        };
        let value = serde_json::to_value(ToolDefinition::from(&tool)).unwrap();
        assert_eq!(value["type"], "function");
        assert_eq!(value["function"]["name"], "navigate");
        assert_eq!(value["function"]["parameters"]["properties"]["url"]["type"], "string");
    }
}
