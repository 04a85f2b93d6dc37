//! Natural-language test runner
//!
//! Loads `.test` files, wraps each in a prompt envelope, hands it to an
//! agent gateway and reports what came back. The gateway is the only part
//! that touches the system under test.

pub mod loader;
pub mod prompt;
pub mod report;
pub mod runner;

pub use loader::{list_test_files, load_test_case, read_test_file, TestCase};
pub use prompt::{build_prompt, build_prompt_at, PromptEnvelope};
pub use report::{print_summary, render_summary, write_json_report, ReportStyle, RunSummary};
pub use runner::{check_response, Orchestrator, RunSettings, TestPhase, TestResult};
