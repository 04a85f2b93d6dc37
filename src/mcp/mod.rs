//! Model Context Protocol (MCP) implementation
//!
//! This module implements the client side of MCP's stdio transport for
//! talking to tool providers such as a Playwright browser server.

pub mod client;
pub mod codec;
pub mod types;

pub use client::McpClient;
pub use types::*;
