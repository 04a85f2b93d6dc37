//! Chat model access
//!
//! A thin client for OpenAI-compatible chat-completions endpoints with
//! function calling.

pub mod client;
pub mod types;

pub use client::ChatClient;
pub use types::*;
