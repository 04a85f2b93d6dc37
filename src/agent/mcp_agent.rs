//! Tool-calling agent backed by MCP tool providers
//!
//! The agent owns one client per configured provider for the whole run.
//! Every `execute` call starts a fresh conversation and loops: ask the
//! model, run the tools it asked for, feed the results back, until the
//! model answers without calling a tool or the step budget runs out.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;

use crate::common::{Config, Error, Result};
use crate::llm::{ChatClient, ChatMessage, FunctionCall, ToolDefinition};
use crate::mcp::{McpClient, ToolInfo};

use super::gateway::{AgentGateway, AgentOutput};

const SYSTEM_PROMPT: &str = "You are a meticulous QA engineer. Use the available tools to \
carry out the user's test steps against the real system. Do not invent results: only \
report what you actually observed through tool output. When you are finished, reply \
without calling any tool.";

/// A tool as advertised to the model, plus the provider that serves it
#[derive(Debug, Clone)]
pub struct RoutedTool {
    pub provider: usize,
    pub info: ToolInfo,
}

/// Agent gateway that drives MCP tool providers through a chat model
pub struct McpAgent {
    chat: ChatClient,
    providers: Vec<McpClient>,
    tools: Vec<RoutedTool>,
    /// Tool name -> index into `tools`
    routes: HashMap<String, usize>,
    definitions: Vec<ToolDefinition>,
    max_steps: u32,
}

impl McpAgent {
    /// Launch every configured tool provider and build the agent
    ///
    /// Providers are started in name order. If one fails to start, those
    /// already running are stopped before the error is returned.
    pub async fn connect(config: &Config) -> Result<Self> {
        config.validate()?;
        let chat = ChatClient::new(&config.agent)?;

        let mut providers = Vec::new();
        for name in config.tool_providers.keys() {
            match start_provider(config, name).await {
                Ok(client) => providers.push(client),
                Err(e) => {
                    for client in providers {
                        let _ = client.shutdown().await;
                    }
                    return Err(e);
                }
            }
        }

        let mut agent = Self {
            chat,
            providers,
            tools: Vec::new(),
            routes: HashMap::new(),
            definitions: Vec::new(),
            max_steps: config.agent.max_steps,
        };

        if let Err(e) = agent.discover_tools().await {
            agent.shutdown().await;
            return Err(e);
        }

        tracing::info!(
            model = agent.chat.model(),
            providers = agent.providers.len(),
            tools = agent.tools.len(),
            "Agent ready"
        );

        Ok(agent)
    }

    /// Query every provider for its tools and build the routing table
    async fn discover_tools(&mut self) -> Result<()> {
        for (index, provider) in self.providers.iter_mut().enumerate() {
            let listed = provider.list_tools().await?;
            tracing::debug!(provider = provider.name(), count = listed.len(), "Discovered tools");

            for info in listed {
                if self.routes.contains_key(&info.name) {
                    tracing::warn!(
                        provider = provider.name(),
                        tool = %info.name,
                        "Duplicate tool name; keeping the first provider's tool"
                    );
                    continue;
                }
                self.routes.insert(info.name.clone(), self.tools.len());
                self.definitions.push(ToolDefinition::from(&info));
                self.tools.push(RoutedTool {
                    provider: index,
                    info,
                });
            }
        }
        Ok(())
    }

    /// Tools available to the model, in discovery order
    pub fn tools(&self) -> &[RoutedTool] {
        &self.tools
    }

    /// Name of the provider serving a routed tool
    pub fn provider_name(&self, tool: &RoutedTool) -> &str {
        self.providers[tool.provider].name()
    }

    /// Stop every provider process
    pub async fn shutdown(self) {
        for provider in self.providers {
            let name = provider.name().to_string();
            if let Err(e) = provider.shutdown().await {
                tracing::warn!(provider = %name, "Failed to stop tool provider: {}", e);
            }
        }
    }

    /// Run one tool call and render its outcome as text for the model
    ///
    /// Tool failures are reported back to the model instead of aborting the
    /// test; the model decides whether the step failed.
    async fn run_tool(&mut self, call: &FunctionCall) -> String {
        let name = call.name.as_str();
        let arguments = match call.parsed_arguments() {
            Ok(args) => args,
            Err(e) => {
                return format!(
                    "Error: arguments for '{}' are not valid JSON ({}): {}",
                    name, e, call.arguments
                )
            }
        };

        let Some(&index) = self.routes.get(name) else {
            return format!("Error: {}", Error::ToolNotFound(name.to_string()));
        };
        let provider = self.tools[index].provider;

        tracing::debug!(tool = name, %arguments, "Calling tool");
        match self.providers[provider].call_tool(name, arguments).await {
            Ok(result) if result.is_error => format!("Tool error: {}", result.to_text()),
            Ok(result) => result.to_text(),
            Err(e) => format!("Error: {}", e),
        }
    }
}

async fn start_provider(config: &Config, name: &str) -> Result<McpClient> {
    let (program, provider) = config
        .resolve_provider(name)
        .ok_or_else(|| Error::Config(format!("Unknown tool provider '{}'", name)))?;

    let timeout = Duration::from_secs(config.agent.tool_timeout_secs);
    let mut client = McpClient::spawn(name, &program, &provider.args, &provider.env)
        .await?
        .with_request_timeout(timeout);
    let init = client.initialize().await?;
    tracing::info!(
        provider = name,
        server = %init.server_info.name,
        version = %init.server_info.version,
        "Tool provider initialized"
    );
    Ok(client)
}

#[async_trait]
impl AgentGateway for McpAgent {
    async fn execute(&mut self, prompt: &str) -> Result<AgentOutput> {
        let mut messages = vec![ChatMessage::system(SYSTEM_PROMPT), ChatMessage::user(prompt)];

        for step in 1..=self.max_steps {
            let reply = self.chat.complete(&messages, &self.definitions).await?;

            if reply.tool_calls.is_empty() {
                tracing::debug!(step, "Agent finished");
                return Ok(AgentOutput::from_reply(reply.content.as_deref().unwrap_or("")));
            }

            tracing::debug!(step, calls = reply.tool_calls.len(), "Agent requested tools");
            let calls = reply.tool_calls.clone();
            messages.push(reply);

            for call in calls {
                let output = self.run_tool(&call.function).await;
                messages.push(ChatMessage::tool_result(call.id, output));
            }
        }

        Err(Error::StepLimitExceeded(self.max_steps))
    }
}
