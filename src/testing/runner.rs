//! Test run orchestration
//!
//! Runs tests one at a time through an agent gateway and records exactly
//! one result per test. Failures inside a test never escape it; only a
//! directory that cannot be listed aborts a run.

use std::panic::AssertUnwindSafe;
use std::path::{Path, PathBuf};

use futures_util::FutureExt;
use serde::Serialize;

use crate::agent::{AgentGateway, AgentOutput, AgentResponse};
use crate::common::{Config, Error, Result};

use super::loader::{self, TestCase};
use super::prompt;

/// Outcome of a single test
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TestResult {
    /// Test file name
    pub file: String,
    /// 1-based position in the run
    pub test_number: usize,
    /// Test text as read from the file; empty if the read failed
    pub prompt: String,
    /// The agent's answer, absent on failure
    pub result: Option<AgentOutput>,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl TestResult {
    fn passed(file: String, test_number: usize, prompt: String, output: AgentOutput) -> Self {
        Self {
            file,
            test_number,
            prompt,
            result: Some(output),
            success: true,
            error: None,
        }
    }

    fn failed(file: String, test_number: usize, prompt: String, error: String) -> Self {
        Self {
            file,
            test_number,
            prompt,
            result: None,
            success: false,
            error: Some(error),
        }
    }
}

/// Where a test is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TestPhase {
    Pending,
    Reading,
    Prompting,
    Executing,
    Succeeded,
    Failed,
}

impl std::fmt::Display for TestPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            TestPhase::Pending => "pending",
            TestPhase::Reading => "reading",
            TestPhase::Prompting => "prompting",
            TestPhase::Executing => "executing",
            TestPhase::Succeeded => "succeeded",
            TestPhase::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Run-level settings the orchestrator needs
#[derive(Debug, Clone)]
pub struct RunSettings {
    /// Directory scanned for test files
    pub tests_dir: PathBuf,
    /// Require replies to match the requested result schema
    pub strict_schema: bool,
}

impl Default for RunSettings {
    fn default() -> Self {
        Self {
            tests_dir: PathBuf::from("./tests"),
            strict_schema: false,
        }
    }
}

impl From<&Config> for RunSettings {
    fn from(config: &Config) -> Self {
        Self {
            tests_dir: config.tests_dir.clone(),
            strict_schema: config.strict_schema,
        }
    }
}

/// Sequential test runner owning its agent gateway
pub struct Orchestrator<G> {
    settings: RunSettings,
    gateway: G,
}

impl<G: AgentGateway> Orchestrator<G> {
    pub fn new(settings: RunSettings, gateway: G) -> Self {
        Self { settings, gateway }
    }

    pub fn settings(&self) -> &RunSettings {
        &self.settings
    }

    /// Give the gateway back, e.g. to shut it down
    pub fn into_gateway(self) -> G {
        self.gateway
    }

    /// Run every test in the configured directory, in file-name order
    ///
    /// Only a listing failure is returned as an error; each test's own
    /// failure is recorded in its result.
    pub async fn run_all_tests(&mut self) -> Result<Vec<TestResult>> {
        let files = loader::list_test_files(&self.settings.tests_dir)?;
        tracing::info!(
            dir = %self.settings.tests_dir.display(),
            count = files.len(),
            "Discovered tests"
        );

        let mut results = Vec::with_capacity(files.len());
        for (index, path) in files.iter().enumerate() {
            let result = self.run_single_test(path, index + 1).await;
            results.push(result);
        }

        Ok(results)
    }

    /// Run one test file as the given ordinal
    ///
    /// Never fails: read errors, gateway errors and gateway panics all
    /// become a failed result.
    pub async fn run_single_test(&mut self, path: &Path, ordinal: usize) -> TestResult {
        let file = loader::file_name(path);
        tracing::info!(test = ordinal, file = %file, "Running test");

        let mut phase = TestPhase::Pending;
        let mut case: Option<TestCase> = None;

        let outcome = AssertUnwindSafe(self.execute_phases(path, ordinal, &mut phase, &mut case))
            .catch_unwind()
            .await;

        // Unreadable files keep the listed name and an empty prompt
        let (file, content) = match case {
            Some(case) => (case.file_name, case.content),
            None => (file, String::new()),
        };

        let result = match outcome {
            Ok(Ok(output)) => {
                phase = TestPhase::Succeeded;
                TestResult::passed(file, ordinal, content, output)
            }
            Ok(Err(e)) => {
                let failed_in = phase;
                phase = TestPhase::Failed;
                tracing::debug!(test = ordinal, %failed_in, "Test failed");
                TestResult::failed(file, ordinal, content, e.to_string())
            }
            Err(panic) => {
                phase = TestPhase::Failed;
                TestResult::failed(
                    file,
                    ordinal,
                    content,
                    format!("Agent panicked: {}", panic_message(panic.as_ref())),
                )
            }
        };

        match &result.error {
            None => tracing::info!(test = ordinal, file = %result.file, %phase, "Test passed"),
            Some(error) => {
                tracing::warn!(test = ordinal, file = %result.file, %phase, "Test failed: {}", error)
            }
        }

        result
    }

    /// Read, prompt and execute, tracking the phase reached
    async fn execute_phases(
        &mut self,
        path: &Path,
        ordinal: usize,
        phase: &mut TestPhase,
        case: &mut Option<TestCase>,
    ) -> Result<AgentOutput> {
        *phase = TestPhase::Reading;
        tracing::debug!(path = %path.display(), %phase);
        let loaded = case.insert(loader::load_test_case(path, ordinal)?);

        *phase = TestPhase::Prompting;
        tracing::debug!(%phase);
        let prompt = prompt::build_prompt(loaded.content.as_str());

        *phase = TestPhase::Executing;
        tracing::debug!(%phase, prompt_len = prompt.len());
        let output = self.gateway.execute(&prompt).await?;

        if self.settings.strict_schema {
            check_response(&output)?;
        }

        Ok(output)
    }
}

/// Require the reply to be the requested JSON verdict and to report success
pub fn check_response(output: &AgentOutput) -> Result<AgentResponse> {
    let value = output.as_structured().ok_or_else(|| {
        Error::SchemaViolation(match output {
            AgentOutput::Text(text) => format!("expected a JSON object, got text: {}", preview(text)),
            _ => "expected a JSON object, got an empty reply".to_string(),
        })
    })?;

    let response: AgentResponse = serde_json::from_value(value.clone())
        .map_err(|e| Error::SchemaViolation(e.to_string()))?;

    if !response.success {
        return Err(Error::SchemaViolation(format!(
            "agent reported failure: {}",
            response.final_status
        )));
    }

    Ok(response)
}

fn preview(text: &str) -> String {
    const LIMIT: usize = 80;
    match text.char_indices().nth(LIMIT) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::json;
    use std::collections::HashSet;
    use std::fs;
    use tempfile::{tempdir, TempDir};

    /// Gateway that answers `{ok: true}` unless the prompt mentions a
    /// failing marker
    #[derive(Default)]
    struct ScriptedGateway {
        fail_on: HashSet<String>,
        panic_on: HashSet<String>,
        reply: Option<AgentOutput>,
        prompts: Vec<String>,
    }

    #[async_trait]
    impl AgentGateway for ScriptedGateway {
        async fn execute(&mut self, prompt: &str) -> Result<AgentOutput> {
            self.prompts.push(prompt.to_string());
            if self.panic_on.iter().any(|m| prompt.contains(m.as_str())) {
                panic!("browser went away");
            }
            if self.fail_on.iter().any(|m| prompt.contains(m.as_str())) {
                return Err(Error::Gateway("tool execution failed".to_string()));
            }
            Ok(self
                .reply
                .clone()
                .unwrap_or_else(|| AgentOutput::Structured(json!({"ok": true}))))
        }
    }

    fn corpus(files: &[(&str, &str)]) -> TempDir {
        let dir = tempdir().unwrap();
        for (name, content) in files {
            fs::write(dir.path().join(name), content).unwrap();
        }
        dir
    }

    fn orchestrator(dir: &Path, gateway: ScriptedGateway) -> Orchestrator<ScriptedGateway> {
        Orchestrator::new(
            RunSettings {
                tests_dir: dir.to_path_buf(),
                strict_schema: false,
            },
            gateway,
        )
    }

    #[tokio::test]
    async fn test_all_succeed_in_file_order() {
        let dir = corpus(&[("2.test", "open other.com"), ("1.test", "open example.com")]);
        let mut runner = orchestrator(dir.path(), ScriptedGateway::default());

        let results = runner.run_all_tests().await.unwrap();

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].file, "1.test");
        assert_eq!(results[0].test_number, 1);
        assert_eq!(results[0].prompt, "open example.com");
        assert_eq!(results[1].file, "2.test");
        assert_eq!(results[1].test_number, 2);
        for result in &results {
            assert!(result.success);
            assert!(result.error.is_none());
            assert_eq!(result.result, Some(AgentOutput::Structured(json!({"ok": true}))));
        }

        // The gateway saw full envelopes, in order
        let gateway = runner.into_gateway();
        assert!(gateway.prompts[0].contains("Test Steps:\nopen example.com"));
        assert!(gateway.prompts[1].contains("Test Steps:\nopen other.com"));
    }

    #[tokio::test]
    async fn test_failures_are_isolated() {
        let dir = corpus(&[
            ("a.test", "open example.com"),
            ("b.test", "open broken.example"),
            ("c.test", "open example.org"),
            ("d.test", "open broken.example/again"),
        ]);
        let gateway = ScriptedGateway {
            fail_on: ["broken.example".to_string()].into(),
            ..Default::default()
        };
        let mut runner = orchestrator(dir.path(), gateway);

        let results = runner.run_all_tests().await.unwrap();

        let outcomes: Vec<bool> = results.iter().map(|r| r.success).collect();
        assert_eq!(outcomes, vec![true, false, true, false]);
        for failed in results.iter().filter(|r| !r.success) {
            assert!(failed.result.is_none());
            let error = failed.error.as_deref().unwrap();
            assert!(error.contains("tool execution failed"), "{}", error);
        }
        let ordinals: Vec<usize> = results.iter().map(|r| r.test_number).collect();
        assert_eq!(ordinals, vec![1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn test_gateway_panic_becomes_failure() {
        let dir = corpus(&[("1.test", "crash please"), ("2.test", "open example.com")]);
        let gateway = ScriptedGateway {
            panic_on: ["crash".to_string()].into(),
            ..Default::default()
        };
        let mut runner = orchestrator(dir.path(), gateway);

        let results = runner.run_all_tests().await.unwrap();

        assert!(!results[0].success);
        assert_eq!(
            results[0].error.as_deref(),
            Some("Agent panicked: browser went away")
        );
        assert!(results[1].success);
    }

    #[tokio::test]
    async fn test_missing_directory_aborts_run() {
        let dir = tempdir().unwrap();
        let mut runner = orchestrator(&dir.path().join("missing"), ScriptedGateway::default());

        let err = runner.run_all_tests().await.unwrap_err();
        assert!(matches!(err, Error::DirectoryAccess { .. }));
        assert!(runner.into_gateway().prompts.is_empty());
    }

    #[tokio::test]
    async fn test_unreadable_file_is_a_test_failure() {
        let dir = corpus(&[("1.test", "open example.com")]);
        let mut runner = orchestrator(dir.path(), ScriptedGateway::default());

        let result = runner
            .run_single_test(&dir.path().join("vanished.test"), 2)
            .await;

        assert!(!result.success);
        assert_eq!(result.test_number, 2);
        assert_eq!(result.file, "vanished.test");
        assert!(result.prompt.is_empty());
        assert!(result.error.unwrap().contains("Failed to read test file"));
        assert!(runner.into_gateway().prompts.is_empty());
    }

    /// Gateway that deletes another test file the first time it runs
    struct DeletingGateway {
        doomed: PathBuf,
        calls: usize,
    }

    #[async_trait]
    impl AgentGateway for DeletingGateway {
        async fn execute(&mut self, _prompt: &str) -> Result<AgentOutput> {
            if self.calls == 0 {
                fs::remove_file(&self.doomed)?;
            }
            self.calls += 1;
            Ok(AgentOutput::Structured(json!({"ok": true})))
        }
    }

    #[tokio::test]
    async fn test_file_deleted_after_listing_fails_alone() {
        let dir = corpus(&[
            ("1.test", "open example.com"),
            ("2.test", "open example.org"),
            ("3.test", "open example.net"),
        ]);
        let gateway = DeletingGateway {
            doomed: dir.path().join("2.test"),
            calls: 0,
        };
        let mut runner = Orchestrator::new(
            RunSettings {
                tests_dir: dir.path().to_path_buf(),
                strict_schema: false,
            },
            gateway,
        );

        let results = runner.run_all_tests().await.unwrap();

        let outcomes: Vec<(usize, bool)> =
            results.iter().map(|r| (r.test_number, r.success)).collect();
        assert_eq!(outcomes, vec![(1, true), (2, false), (3, true)]);

        assert_eq!(results[1].file, "2.test");
        assert!(results[1].prompt.is_empty());
        assert!(results[1].result.is_none());
        assert!(results[1]
            .error
            .as_deref()
            .unwrap()
            .starts_with("Failed to read test file"));
        assert_eq!(results[2].prompt, "open example.net");

        // The deleted file never reached the gateway
        assert_eq!(runner.into_gateway().calls, 2);
    }

    #[tokio::test]
    async fn test_single_test_reports_loaded_case() {
        let dir = corpus(&[("checkout.test", "add item to cart\npay")]);
        let mut runner = orchestrator(dir.path(), ScriptedGateway::default());

        let result = runner
            .run_single_test(&dir.path().join("checkout.test"), 7)
            .await;

        assert!(result.success);
        assert_eq!(result.test_number, 7);
        assert_eq!(result.file, "checkout.test");
        assert_eq!(result.prompt, "add item to cart\npay");
    }

    #[tokio::test]
    async fn test_empty_directory() {
        let dir = tempdir().unwrap();
        let mut runner = orchestrator(dir.path(), ScriptedGateway::default());
        assert!(runner.run_all_tests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_any_reply_shape_passes_by_default() {
        let dir = corpus(&[("1.test", "open example.com")]);
        let gateway = ScriptedGateway {
            reply: Some(AgentOutput::Text("looked fine to me".to_string())),
            ..Default::default()
        };
        let mut runner = orchestrator(dir.path(), gateway);

        let results = runner.run_all_tests().await.unwrap();
        assert!(results[0].success);
    }

    #[tokio::test]
    async fn test_strict_schema_rejects_bad_replies() {
        let dir = corpus(&[("1.test", "open example.com")]);
        let replies = [
            AgentOutput::Text("looked fine to me".to_string()),
            AgentOutput::Empty,
            AgentOutput::Structured(json!({"ok": true})),
            AgentOutput::Structured(json!({
                "success": false,
                "steps_completed": [],
                "observations": "404",
                "final_status": "page not found"
            })),
        ];

        for reply in replies {
            let gateway = ScriptedGateway {
                reply: Some(reply.clone()),
                ..Default::default()
            };
            let mut runner = Orchestrator::new(
                RunSettings {
                    tests_dir: dir.path().to_path_buf(),
                    strict_schema: true,
                },
                gateway,
            );
            let results = runner.run_all_tests().await.unwrap();
            assert!(!results[0].success, "{:?} should fail", reply);
            assert!(results[0]
                .error
                .as_deref()
                .unwrap()
                .starts_with("Agent response does not satisfy the result schema"));
        }
    }

    #[tokio::test]
    async fn test_strict_schema_accepts_conforming_reply() {
        let dir = corpus(&[("1.test", "open example.com")]);
        let gateway = ScriptedGateway {
            reply: Some(AgentOutput::Structured(json!({
                "success": true,
                "steps_completed": ["opened example.com"],
                "observations": "title is Example Domain",
                "final_status": "done"
            }))),
            ..Default::default()
        };
        let mut runner = Orchestrator::new(
            RunSettings {
                tests_dir: dir.path().to_path_buf(),
                strict_schema: true,
            },
            gateway,
        );

        let results = runner.run_all_tests().await.unwrap();
        assert!(results[0].success);
    }

    #[test]
    fn test_result_serialization() {
        let result = TestResult::passed(
            "1.test".into(),
            1,
            "open example.com".into(),
            AgentOutput::Structured(json!({"ok": true})),
        );
        assert_eq!(
            serde_json::to_value(&result).unwrap(),
            json!({
                "file": "1.test",
                "testNumber": 1,
                "prompt": "open example.com",
                "result": {"ok": true},
                "success": true
            })
        );

        let failed = TestResult::failed("2.test".into(), 2, String::new(), "boom".into());
        let value = serde_json::to_value(&failed).unwrap();
        assert_eq!(value["result"], serde_json::Value::Null);
        assert_eq!(value["error"], "boom");
    }

    #[test]
    fn test_preview_truncates_on_char_boundary() {
        let long = "é".repeat(100);
        let short = preview(&long);
        assert!(short.ends_with("..."));
        assert_eq!(short.chars().count(), 83);
    }
}
