//! CLI command definitions
//!
//! Defines the clap commands for the test runner CLI.

use clap::Subcommand;
use std::path::PathBuf;

#[derive(Subcommand)]
pub enum Commands {
    /// Run every .test file in the tests directory
    Run {
        /// Tests directory (overrides config and NLE2E_TESTS_DIR)
        #[arg(long, short)]
        dir: Option<PathBuf>,

        /// Fail tests whose reply is not the requested JSON verdict
        #[arg(long)]
        strict: bool,

        /// Print results as JSON instead of the text summary
        #[arg(long)]
        json: bool,

        /// Also write the JSON results to this file
        #[arg(long)]
        report: Option<PathBuf>,
    },

    /// Run a single test file
    Test {
        /// Path to the .test file
        path: PathBuf,

        /// Ordinal to report the test under
        #[arg(long, short, default_value_t = 1)]
        number: usize,

        /// Fail the test if the reply is not the requested JSON verdict
        #[arg(long)]
        strict: bool,

        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the prompt that would be sent for a test file
    Prompt {
        /// Path to the .test file
        path: PathBuf,
    },

    /// Start the configured tool providers and list their tools
    Tools {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}
