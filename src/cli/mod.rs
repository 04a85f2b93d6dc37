//! CLI command handling
//!
//! Loads configuration, builds the agent and drives the orchestrator.

use std::path::{Path, PathBuf};

use colored::Colorize;
use serde_json::json;

use crate::agent::McpAgent;
use crate::commands::Commands;
use crate::common::{Config, Result};
use crate::testing::{
    self, report::JsonReport, Orchestrator, RunSettings, RunSummary, TestResult,
};

/// Load the config file (explicit or default location) plus environment overrides
pub fn load_config(path: Option<&Path>) -> Result<Config> {
    let mut config = match path {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    config.apply_env()?;
    Ok(config)
}

/// Dispatch a CLI command
///
/// Returns `Ok(false)` when the command ran but at least one test failed.
pub async fn dispatch(command: Commands, mut config: Config) -> Result<bool> {
    match command {
        Commands::Run {
            dir,
            strict,
            json,
            report,
        } => {
            if let Some(dir) = dir {
                config.tests_dir = dir;
            }
            config.strict_schema |= strict;

            // Fail fast on a bad directory before launching any provider
            testing::list_test_files(&config.tests_dir)?;

            let agent = McpAgent::connect(&config).await?;
            let mut orchestrator = Orchestrator::new(RunSettings::from(&config), agent);
            let outcome = orchestrator.run_all_tests().await;
            orchestrator.into_gateway().shutdown().await;
            let results = outcome?;

            emit_results(&results, json, report.as_deref())?;
            Ok(RunSummary::from_results(&results).all_passed())
        }

        Commands::Test {
            path,
            number,
            strict,
            json,
        } => {
            config.strict_schema |= strict;

            let agent = McpAgent::connect(&config).await?;
            let mut orchestrator = Orchestrator::new(RunSettings::from(&config), agent);
            let result = orchestrator.run_single_test(&path, number).await;
            orchestrator.into_gateway().shutdown().await;

            let results = vec![result];
            emit_results(&results, json, None)?;
            Ok(results[0].success)
        }

        Commands::Prompt { path } => {
            let content = testing::read_test_file(&path)?;
            println!("{}", testing::build_prompt(&content));
            Ok(true)
        }

        Commands::Tools { json } => {
            let agent = McpAgent::connect(&config).await?;

            if json {
                let tools: Vec<_> = agent
                    .tools()
                    .iter()
                    .map(|tool| {
                        json!({
                            "provider": agent.provider_name(tool),
                            "name": tool.info.name,
                            "description": tool.info.description,
                        })
                    })
                    .collect();
                println!("{}", serde_json::to_string_pretty(&tools)?);
            } else if agent.tools().is_empty() {
                println!("No tools offered by the configured providers");
            } else {
                let mut current: Option<&str> = None;
                for tool in agent.tools() {
                    let provider = agent.provider_name(tool);
                    if current != Some(provider) {
                        println!("{}", provider.cyan().bold());
                        current = Some(provider);
                    }
                    match &tool.info.description {
                        Some(desc) => println!("  {}  {}", tool.info.name, first_line(desc).dimmed()),
                        None => println!("  {}", tool.info.name),
                    }
                }
            }

            agent.shutdown().await;
            Ok(true)
        }
    }
}

/// Print results and optionally persist them
fn emit_results(results: &[TestResult], json: bool, report: Option<&Path>) -> Result<()> {
    if json {
        println!("{}", JsonReport::new(results).to_json()?);
    } else {
        testing::print_summary(results);
    }

    if let Some(path) = report {
        testing::write_json_report(path, results)?;
        tracing::info!(path = %path.display(), "Wrote JSON report");
    }
    Ok(())
}

fn first_line(text: &str) -> &str {
    text.lines().next().unwrap_or("")
}

/// Default log file location when `--log-file` is given without a path
pub fn default_log_file() -> Option<PathBuf> {
    crate::common::paths::log_dir().map(|dir| dir.join("nle2e.log"))
}
