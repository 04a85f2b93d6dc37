//! Natural-language end-to-end test runner
//!
//! This library loads plain-text test scripts, wraps each in a prompt
//! envelope and hands it to an agent that carries the steps out through
//! MCP tool providers, then reports pass/fail per test.

pub mod agent;
pub mod cli;
pub mod commands;
pub mod common;
pub mod llm;
pub mod mcp;
pub mod testing;

// Re-export commonly used types for tests
pub use agent::{AgentGateway, AgentOutput, McpAgent};
pub use common::{Config, Error, Result};
pub use testing::{Orchestrator, RunSettings, TestResult};
