//! The agent execution boundary
//!
//! The runner only knows that a gateway turns a prompt into some output or
//! fails. What the agent does in between is its own business.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::common::Result;

/// Something that can carry out a prompt against the target system
#[async_trait]
pub trait AgentGateway: Send {
    /// Run the prompt to completion and return the agent's final answer
    async fn execute(&mut self, prompt: &str) -> Result<AgentOutput>;
}

#[async_trait]
impl<G: AgentGateway + ?Sized> AgentGateway for Box<G> {
    async fn execute(&mut self, prompt: &str) -> Result<AgentOutput> {
        (**self).execute(prompt).await
    }
}

/// Whatever the agent answered with
///
/// The reply shape is requested in the prompt but never guaranteed, so it
/// is kept as-is rather than forced into a schema.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum AgentOutput {
    /// A JSON value (usually an object)
    Structured(Value),
    /// Free text that did not parse as JSON
    Text(String),
    /// No content at all
    Empty,
}

impl AgentOutput {
    /// Interpret a model reply
    ///
    /// JSON objects and arrays, bare or inside a markdown code fence, become
    /// `Structured`. Any other non-blank text is kept as `Text`.
    pub fn from_reply(reply: &str) -> Self {
        let trimmed = reply.trim();
        if trimmed.is_empty() {
            return AgentOutput::Empty;
        }

        let candidate = strip_code_fence(trimmed).unwrap_or(trimmed);
        if candidate.starts_with('{') || candidate.starts_with('[') {
            if let Ok(value) = serde_json::from_str::<Value>(candidate) {
                return AgentOutput::Structured(value);
            }
        }

        AgentOutput::Text(trimmed.to_string())
    }

    /// The structured value, if any
    pub fn as_structured(&self) -> Option<&Value> {
        match self {
            AgentOutput::Structured(value) => Some(value),
            _ => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, AgentOutput::Empty)
    }
}

/// Body of a single ```-fenced block spanning the whole reply
fn strip_code_fence(text: &str) -> Option<&str> {
    let rest = text.strip_prefix("```")?;
    let rest = rest.strip_suffix("```")?;
    // Drop an info string such as `json` on the opening line
    let body = match rest.find('\n') {
        Some(newline) => &rest[newline + 1..],
        None => rest,
    };
    Some(body.trim())
}

/// The reply shape the prompt asks for
///
/// Only consulted when strict validation is enabled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentResponse {
    pub success: bool,
    pub steps_completed: Vec<String>,
    pub observations: String,
    pub final_status: String,
}
