//! nle2e - natural-language end-to-end test runner
//!
//! Reads plain-English test files and has an LLM agent carry them out with
//! MCP tool providers (a Playwright browser by default).

use clap::Parser;
use nle2e::commands::Commands;
use nle2e::{cli, common::logging};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "nle2e", about = "Natural-language end-to-end test runner")]
#[command(version, long_about = None)]
struct Cli {
    /// Config file (default: the platform config directory's config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Also write detailed logs to a file (default location if no path given)
    #[arg(long, global = true, num_args = 0..=1)]
    log_file: Option<Option<PathBuf>>,

    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let log_file = match cli.log_file {
        Some(Some(path)) => Some(path),
        Some(None) => cli::default_log_file(),
        None => None,
    };
    // Keep the guard alive so buffered file logs are flushed on exit
    let log_guard = logging::init_cli(log_file.as_deref());

    let result = match cli::load_config(cli.config.as_deref()) {
        Ok(config) => cli::dispatch(cli.command, config).await,
        Err(e) => Err(e),
    };

    let code = match result {
        Ok(true) => 0,
        Ok(false) => 1,
        Err(e) => {
            eprintln!("Error: {e}");
            1
        }
    };

    drop(log_guard);
    std::process::exit(code);
}
