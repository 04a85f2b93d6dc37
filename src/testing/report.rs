//! Run summaries
//!
//! Turns an ordered result list into a text report, or a JSON document for
//! CI. Rendering never touches the results themselves.

use std::fmt::Write as _;
use std::path::Path;

use chrono::{DateTime, Utc};
use colored::Colorize;
use serde::Serialize;

use crate::common::{Error, Result};

use super::runner::TestResult;

/// Pass/fail counts for a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
}

impl RunSummary {
    pub fn from_results(results: &[TestResult]) -> Self {
        let passed = results.iter().filter(|r| r.success).count();
        Self {
            total: results.len(),
            passed,
            failed: results.len() - passed,
        }
    }

    pub fn all_passed(&self) -> bool {
        self.failed == 0
    }
}

impl std::fmt::Display for RunSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Total: {} | Passed: {} | Failed: {}",
            self.total, self.passed, self.failed
        )
    }
}

/// Whether to emit ANSI colors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportStyle {
    Plain,
    Color,
}

/// Render the text report
///
/// One line per test in run order, the error under each failure, then the
/// tally.
pub fn render_summary(results: &[TestResult], style: ReportStyle) -> String {
    let color = style == ReportStyle::Color;
    let mut out = String::new();

    let title = "Test Results";
    if color {
        let _ = writeln!(out, "{}", title.blue().bold());
    } else {
        let _ = writeln!(out, "{}", title);
    }
    let _ = writeln!(out, "{}", "=".repeat(title.len()));

    for result in results {
        let (mark, label) = if result.success {
            ("✓", "PASS")
        } else {
            ("✗", "FAIL")
        };
        let status = format!("{} {}", mark, label);
        let status = match (color, result.success) {
            (false, _) => status,
            (true, true) => status.green().to_string(),
            (true, false) => status.red().bold().to_string(),
        };
        let _ = writeln!(out, "{}  #{} {}", status, result.test_number, result.file);

        if let Some(error) = &result.error {
            let line = format!("error: {}", error);
            if color {
                let _ = writeln!(out, "        {}", line.dimmed());
            } else {
                let _ = writeln!(out, "        {}", line);
            }
        }
    }

    let summary = RunSummary::from_results(results);
    let tally = summary.to_string();
    out.push('\n');
    match (color, summary.all_passed()) {
        (false, _) => out.push_str(&tally),
        (true, true) => out.push_str(&tally.green().bold().to_string()),
        (true, false) => out.push_str(&tally.red().bold().to_string()),
    }
    out.push('\n');

    out
}

/// Print the colored report to stdout
pub fn print_summary(results: &[TestResult]) {
    print!("{}", render_summary(results, ReportStyle::Color));
}

/// Machine-readable run report
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JsonReport<'a> {
    pub generated_at: DateTime<Utc>,
    pub summary: RunSummary,
    pub results: &'a [TestResult],
}

impl<'a> JsonReport<'a> {
    pub fn new(results: &'a [TestResult]) -> Self {
        Self {
            generated_at: Utc::now(),
            summary: RunSummary::from_results(results),
            results,
        }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Write the JSON report to a file
pub fn write_json_report(path: &Path, results: &[TestResult]) -> Result<()> {
    let content = JsonReport::new(results).to_json()?;
    std::fs::write(path, content).map_err(|e| {
        Error::Internal(format!("Failed to write report '{}': {}", path.display(), e))
    })
}
