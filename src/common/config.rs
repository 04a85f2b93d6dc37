//! Configuration file handling
//!
//! Settings come from `config.toml` (or an explicit path), then environment
//! overrides, then CLI flags applied by the caller.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use super::paths::config_path;
use super::{Error, Result};

/// Main configuration structure
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    /// Directory scanned for `*.test` files
    #[serde(default = "default_tests_dir")]
    pub tests_dir: PathBuf,

    /// Reject agent replies that do not match the requested result schema
    #[serde(default)]
    pub strict_schema: bool,

    /// Model and agent loop settings
    #[serde(default)]
    pub agent: AgentConfig,

    /// Named tool providers (MCP servers) launched for the agent
    #[serde(default = "default_tool_providers")]
    pub tool_providers: BTreeMap<String, ToolProviderConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            tests_dir: default_tests_dir(),
            strict_schema: false,
            agent: AgentConfig::default(),
            tool_providers: default_tool_providers(),
        }
    }
}

fn default_tests_dir() -> PathBuf {
    PathBuf::from("./tests")
}

fn default_tool_providers() -> BTreeMap<String, ToolProviderConfig> {
    let mut providers = BTreeMap::new();
    providers.insert(
        "playwright".to_string(),
        ToolProviderConfig {
            command: "npx".to_string(),
            args: vec!["@playwright/mcp@latest".to_string()],
            env: BTreeMap::new(),
        },
    );
    providers
}

/// Model and agent loop settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AgentConfig {
    /// Chat model identifier
    #[serde(default = "default_model")]
    pub model: String,

    /// API credential; required before the agent is built
    #[serde(default)]
    pub api_key: Option<String>,

    /// Alternate OpenAI-compatible endpoint
    #[serde(default)]
    pub base_url: Option<String>,

    /// Upper bound on model turns per test
    #[serde(default = "default_max_steps")]
    pub max_steps: u32,

    /// Timeout for a single model API request
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Timeout for a single tool provider request (initialize, tools/call)
    #[serde(default = "default_tool_timeout")]
    pub tool_timeout_secs: u64,

    /// Sampling temperature passed through to the model
    #[serde(default)]
    pub temperature: Option<f32>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            model: default_model(),
            api_key: None,
            base_url: None,
            max_steps: default_max_steps(),
            request_timeout_secs: default_request_timeout(),
            tool_timeout_secs: default_tool_timeout(),
            temperature: None,
        }
    }
}

fn default_model() -> String {
    "gpt-4o".to_string()
}
fn default_max_steps() -> u32 {
    20
}
fn default_request_timeout() -> u64 {
    120
}
fn default_tool_timeout() -> u64 {
    120
}

/// Launch command for a tool provider
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct ToolProviderConfig {
    /// Executable name or path
    pub command: String,

    /// Arguments passed to the executable
    #[serde(default)]
    pub args: Vec<String>,

    /// Extra environment variables for the provider process
    #[serde(default)]
    pub env: BTreeMap<String, String>,
}

/// Environment variables recognized as overrides
pub const ENV_API_KEY: &str = "OPENAI_API_KEY";
pub const ENV_BASE_URL: &str = "OPENAI_BASE_URL";
pub const ENV_MODEL: &str = "NLE2E_MODEL";
pub const ENV_TESTS_DIR: &str = "NLE2E_TESTS_DIR";
pub const ENV_MAX_STEPS: &str = "NLE2E_MAX_STEPS";

impl Config {
    /// Load configuration from the default config file
    ///
    /// Returns default configuration if file doesn't exist
    pub fn load() -> Result<Self> {
        if let Some(path) = config_path() {
            if path.exists() {
                return Self::load_from(&path);
            }
        }
        Ok(Self::default())
    }

    /// Load configuration from an explicit file
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Failed to read config file '{}': {}", path.display(), e))
        })?;
        Self::parse(&content)
    }

    /// Parse configuration from TOML text
    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::ConfigParse(e.to_string()))
    }

    /// Apply overrides from the process environment
    pub fn apply_env(&mut self) -> Result<()> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary variable lookup
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let lookup = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(key) = lookup(ENV_API_KEY) {
            self.agent.api_key = Some(key);
        }
        if let Some(url) = lookup(ENV_BASE_URL) {
            self.agent.base_url = Some(url);
        }
        if let Some(model) = lookup(ENV_MODEL) {
            self.agent.model = model;
        }
        if let Some(dir) = lookup(ENV_TESTS_DIR) {
            self.tests_dir = PathBuf::from(dir);
        }
        if let Some(steps) = lookup(ENV_MAX_STEPS) {
            self.agent.max_steps = steps.trim().parse().map_err(|_| {
                Error::Config(format!("{} must be a positive integer, got '{}'", ENV_MAX_STEPS, steps))
            })?;
        }
        Ok(())
    }

    /// Check the settings the agent needs before any provider is launched
    pub fn validate(&self) -> Result<()> {
        match self.agent.api_key.as_deref() {
            Some(key) if !key.trim().is_empty() => {}
            _ => {
                return Err(Error::Config(format!(
                    "No API credential configured. Set {} or agent.api_key in the config file",
                    ENV_API_KEY
                )))
            }
        }
        if self.agent.max_steps == 0 {
            return Err(Error::Config("agent.max_steps must be at least 1".to_string()));
        }
        if self.agent.tool_timeout_secs == 0 {
            return Err(Error::Config("agent.tool_timeout_secs must be at least 1".to_string()));
        }
        if self.tool_providers.is_empty() {
            tracing::warn!("No tool providers configured; the agent can only reason, not act");
        }
        Ok(())
    }

    /// Get a tool provider's launch command by name
    ///
    /// The executable is resolved through PATH when possible
    pub fn resolve_provider(&self, name: &str) -> Option<(PathBuf, ToolProviderConfig)> {
        let provider = self.tool_providers.get(name)?;
        let program = which::which(&provider.command)
            .unwrap_or_else(|_| PathBuf::from(&provider.command));
        Some((program, provider.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.tests_dir, PathBuf::from("./tests"));
        assert_eq!(config.agent.max_steps, 20);
        assert!(config.agent.api_key.is_none());
        assert!(!config.strict_schema);

        let playwright = &config.tool_providers["playwright"];
        assert_eq!(playwright.command, "npx");
        assert_eq!(playwright.args, vec!["@playwright/mcp@latest"]);
    }

    #[test]
    fn test_parse_partial_file_keeps_defaults() {
        let config = Config::parse(
            r#"
            tests_dir = "e2e"

            [agent]
            model = "local-model"
            base_url = "http://localhost:8080/v1"
            "#,
        )
        .unwrap();

        assert_eq!(config.tests_dir, PathBuf::from("e2e"));
        assert_eq!(config.agent.model, "local-model");
        assert_eq!(config.agent.base_url.as_deref(), Some("http://localhost:8080/v1"));
        assert_eq!(config.agent.max_steps, 20);
        assert!(config.tool_providers.contains_key("playwright"));
    }

    #[test]
    fn test_parse_custom_providers_replace_default() {
        let config = Config::parse(
            r#"
            [tool_providers.shell]
            command = "mcp-shell"
            args = ["--read-only"]
            env = { SHELL_ROOT = "/tmp" }
            "#,
        )
        .unwrap();

        assert_eq!(config.tool_providers.len(), 1);
        let shell = &config.tool_providers["shell"];
        assert_eq!(shell.args, vec!["--read-only"]);
        assert_eq!(shell.env["SHELL_ROOT"], "/tmp");
    }

    #[test]
    fn test_parse_invalid_toml() {
        let err = Config::parse("tests_dir = [").unwrap_err();
        assert!(matches!(err, Error::ConfigParse(_)));
    }

    #[test]
    fn test_overrides() {
        let vars: HashMap<&str, &str> = [
            (ENV_API_KEY, "sk-test"),
            (ENV_MODEL, "gpt-4o-mini"),
            (ENV_TESTS_DIR, "/srv/tests"),
            (ENV_MAX_STEPS, "7"),
            (ENV_BASE_URL, ""),
        ]
        .into_iter()
        .collect();

        let mut config = Config::default();
        config
            .apply_overrides(|k| vars.get(k).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.agent.api_key.as_deref(), Some("sk-test"));
        assert_eq!(config.agent.model, "gpt-4o-mini");
        assert_eq!(config.tests_dir, PathBuf::from("/srv/tests"));
        assert_eq!(config.agent.max_steps, 7);
        // Blank values are ignored
        assert!(config.agent.base_url.is_none());
    }

    #[test]
    fn test_invalid_max_steps_override() {
        let mut config = Config::default();
        let err = config
            .apply_overrides(|k| (k == ENV_MAX_STEPS).then(|| "many".to_string()))
            .unwrap_err();
        assert!(err.to_string().contains(ENV_MAX_STEPS));
    }

    #[test]
    fn test_validate_requires_credential() {
        let mut config = Config::default();
        assert!(matches!(config.validate(), Err(Error::Config(_))));

        config.agent.api_key = Some("sk-test".to_string());
        assert!(config.validate().is_ok());

        config.agent.max_steps = 0;
        assert!(config.validate().is_err());

        config.agent.max_steps = 3;
        config.agent.tool_timeout_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_tool_timeout_from_file() {
        assert_eq!(Config::default().agent.tool_timeout_secs, 120);

        let config = Config::parse("[agent]\ntool_timeout_secs = 15\n").unwrap();
        assert_eq!(config.agent.tool_timeout_secs, 15);
        assert_eq!(config.agent.request_timeout_secs, 120);
    }

    #[test]
    fn test_load_from_missing_file_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.toml");

        let err = Config::load_from(&path).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
        let message = err.to_string();
        assert!(message.contains("Failed to read config file"), "{}", message);
        assert!(message.contains("absent.toml"), "{}", message);
        assert!(!message.contains("test file"), "{}", message);
    }

    #[test]
    fn test_resolve_unknown_provider() {
        assert!(Config::default().resolve_provider("nope").is_none());
    }
}
