//! Error types for the test runner
//!
//! Messages end up verbatim in test reports, so they name the file, tool
//! provider or endpoint involved wherever one exists.

use std::io;
use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the test runner
#[derive(Error, Debug)]
pub enum Error {
    // === Test Corpus Errors ===
    #[error("Cannot access test directory '{path}': {error}")]
    DirectoryAccess { path: String, error: String },

    #[error("Failed to read test file '{path}': {error}")]
    FileRead { path: String, error: String },

    // === Gateway Errors ===
    #[error("Agent execution failed: {0}")]
    Gateway(String),

    #[error("Agent did not finish within {0} steps")]
    StepLimitExceeded(u32),

    #[error("Agent response does not satisfy the result schema: {0}")]
    SchemaViolation(String),

    // === Tool Provider (MCP) Errors ===
    #[error("Tool provider '{name}' failed to start: {reason}")]
    McpServerStartFailed { name: String, reason: String },

    #[error("Tool provider '{0}' exited unexpectedly")]
    McpServerCrashed(String),

    #[error("MCP protocol error: {0}")]
    McpProtocol(String),

    #[error("Tool provider '{name}' did not answer '{method}' within {secs}s")]
    McpTimeout { name: String, method: String, secs: u64 },

    #[error("MCP request '{method}' failed: {message}")]
    McpRequestFailed { method: String, message: String },

    #[error("No tool provider offers a tool named '{0}'")]
    ToolNotFound(String),

    // === Model API Errors ===
    #[error("Model API request failed: {0}")]
    LlmRequest(String),

    #[error("Unexpected model API response: {0}")]
    LlmResponse(String),

    // === Configuration Errors ===
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid configuration file: {0}")]
    ConfigParse(String),

    // === IO Errors ===
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    // === Serialization Errors ===
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // === Internal Errors ===
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a directory access error
    pub fn directory_access(path: &std::path::Path, error: impl std::fmt::Display) -> Self {
        Self::DirectoryAccess {
            path: path.display().to_string(),
            error: error.to_string(),
        }
    }

    /// Create a file read error
    pub fn file_read(path: &std::path::Path, error: impl std::fmt::Display) -> Self {
        Self::FileRead {
            path: path.display().to_string(),
            error: error.to_string(),
        }
    }

    /// Create an MCP request failed error
    pub fn mcp_request_failed(method: &str, message: &str) -> Self {
        Self::McpRequestFailed {
            method: method.to_string(),
            message: message.to_string(),
        }
    }

    /// Create a tool provider start error
    pub fn server_start_failed(name: &str, reason: impl std::fmt::Display) -> Self {
        Self::McpServerStartFailed {
            name: name.to_string(),
            reason: reason.to_string(),
        }
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Error::LlmRequest(format!("timed out: {}", e))
        } else {
            Error::LlmRequest(e.to_string())
        }
    }
}
