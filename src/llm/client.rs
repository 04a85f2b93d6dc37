//! HTTP client for an OpenAI-compatible chat-completions endpoint

use std::time::Duration;

use crate::common::config::AgentConfig;
use crate::common::{Error, Result};

use super::types::{ChatMessage, ChatRequest, ChatResponse, ToolDefinition};

/// Endpoint used when no base URL is configured
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Client for one model on one endpoint
pub struct ChatClient {
    http: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
    temperature: Option<f32>,
}

impl ChatClient {
    /// Build a client from the agent settings
    pub fn new(config: &AgentConfig) -> Result<Self> {
        let api_key = config
            .api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| Error::Config("No API credential configured".to_string()))?;

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .user_agent(concat!("nl-e2e/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::Config(format!("Failed to build HTTP client: {}", e)))?;

        let base = config.base_url.as_deref().unwrap_or(DEFAULT_BASE_URL);

        Ok(Self {
            http,
            endpoint: format!("{}/chat/completions", base.trim_end_matches('/')),
            api_key,
            model: config.model.clone(),
            temperature: config.temperature,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Send the conversation and return the assistant's next message
    pub async fn complete(
        &self,
        messages: &[ChatMessage],
        tools: &[ToolDefinition],
    ) -> Result<ChatMessage> {
        let request = ChatRequest {
            model: &self.model,
            messages,
            tools,
            temperature: self.temperature,
        };

        tracing::trace!(endpoint = %self.endpoint, messages = messages.len(), "Model request");

        let response = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::LlmRequest(format!(
                "{} returned {}: {}",
                self.endpoint,
                status,
                body.trim()
            )));
        }

        let body: ChatResponse = response
            .json()
            .await
            .map_err(|e| Error::LlmResponse(format!("Failed to decode response: {}", e)))?;

        let choice = body
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| Error::LlmResponse("Response contained no choices".to_string()))?;

        tracing::trace!(finish_reason = ?choice.finish_reason, "Model response");

        Ok(choice.message)
    }
}
