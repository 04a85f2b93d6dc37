//! Agent execution
//!
//! `AgentGateway` is the seam between the test runner and whatever carries
//! the prompts out. `McpAgent` is the production gateway: a chat model
//! driving MCP tool providers.

mod gateway;
mod mcp_agent;

pub use gateway::{AgentGateway, AgentOutput, AgentResponse};
pub use mcp_agent::{McpAgent, RoutedTool};
