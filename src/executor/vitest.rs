use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use tokio::io::AsyncReadExt;
use tokio::process::Command;
use tracing::{debug, warn};

use crate::models::TestOutcome;
use crate::process::{ChildGuard, isolate_process_group};

use super::TestExecutor;

/// Executes a sample's test file with `npx vitest run` and parses the JSON
/// reporter output into a `TestOutcome`.
pub struct VitestExecutor {
    timeout: Duration,
}

impl VitestExecutor {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    async fn spawn_and_collect(&self, test_name: &str, workspace: &Path) -> Result<TestOutcome> {
        let test_file = format!("{test_name}.test.ts");

        let mut cmd = Command::new("npx");
        cmd.arg("vitest")
            .arg("run")
            .arg(&test_file)
            .arg("--reporter=json")
            .current_dir(workspace)
            .stdin(std::process::Stdio::null())
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::piped());
        isolate_process_group(&mut cmd);

        let mut child = cmd.spawn().context("failed to spawn vitest")?;
        let mut stdout = child.stdout.take().context("missing stdout")?;
        let mut stderr = child.stderr.take().context("missing stderr")?;
        let mut guard = ChildGuard::new(child);

        let collect = async {
            let mut out = Vec::new();
            let mut err = Vec::new();
            tokio::try_join!(stdout.read_to_end(&mut out), stderr.read_to_end(&mut err))?;
            let status = guard.wait().await?;
            Ok::<_, std::io::Error>((status, out, err))
        };

        // Generated components can hang the runner (infinite effects,
        // unresolved promises); the race against the timeout is the only
        // way out, and the dropped guard kills the vitest process group.
        let Ok(collected) = tokio::time::timeout(self.timeout, collect).await else {
            return Ok(TestOutcome::failed(
                test_name,
                format!(
                    "test execution timed out after {}s",
                    self.timeout.as_secs()
                ),
            ));
        };
        let (status, out, err) = collected.context("failed to run vitest")?;

        let stdout_text = String::from_utf8_lossy(&out);
        match parse_report(test_name, &stdout_text) {
            Some(outcome) => Ok(outcome),
            None => {
                // Vitest exits non-zero for failing tests too, so the exit
                // status only matters when no report came back at all.
                let stderr_text = String::from_utf8_lossy(&err);
                let detail = stderr_text.trim();
                warn!("vitest produced no JSON report for {}", test_name);
                Ok(TestOutcome::failed(
                    test_name,
                    format!(
                        "vitest exited with {} and no report: {}",
                        status.code().unwrap_or(-1),
                        if detail.is_empty() { "(no output)" } else { detail },
                    ),
                ))
            }
        }
    }
}

#[async_trait]
impl TestExecutor for VitestExecutor {
    async fn run_test(
        &self,
        test_name: &str,
        provider_name: &str,
        workspace: &Path,
    ) -> TestOutcome {
        debug!(
            "running tests for {} ({}) in {}",
            test_name,
            provider_name,
            workspace.display()
        );
        match self.spawn_and_collect(test_name, workspace).await {
            Ok(outcome) => outcome,
            Err(err) => TestOutcome::failed(test_name, format!("{err:#}")),
        }
    }
}

// --- JSON reporter deserialization types ---

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VitestReport {
    num_total_test_suites: usize,
    num_total_tests: usize,
    num_failed_tests: usize,
    #[serde(default)]
    test_results: Vec<VitestFileResult>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VitestFileResult {
    #[serde(default)]
    message: String,
    #[serde(default)]
    assertion_results: Vec<VitestAssertion>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VitestAssertion {
    status: String,
    #[serde(default)]
    full_name: String,
    #[serde(default)]
    failure_messages: Vec<String>,
}

/// Extract the reporter's JSON object from stdout. npx and vitest print
/// banner lines around it, so everything before the first `{` is dropped;
/// if trailing noise breaks that parse, each line is tried on its own.
fn extract_report(stdout: &str) -> Option<VitestReport> {
    if let Some(start) = stdout.find('{')
        && let Ok(report) = serde_json::from_str(stdout[start..].trim())
    {
        return Some(report);
    }
    stdout
        .lines()
        .filter(|line| line.trim_start().starts_with('{'))
        .find_map(|line| serde_json::from_str(line.trim()).ok())
}

fn parse_report(test_name: &str, stdout: &str) -> Option<TestOutcome> {
    let report = extract_report(stdout)?;

    let mut errors = Vec::new();
    for file in &report.test_results {
        for assertion in &file.assertion_results {
            if assertion.status == "failed" {
                let detail = assertion
                    .failure_messages
                    .first()
                    .map(String::as_str)
                    .unwrap_or("test failed");
                errors.push(format!("{}: {}", assertion.full_name, detail));
            }
        }
        // File-level failures (compile errors) have no assertions at all.
        if file.assertion_results.is_empty() && !file.message.trim().is_empty() {
            errors.push(file.message.trim().to_string());
        }
    }

    // Zero executed tests is never a pass: the artifact failed to load.
    let success = report.num_failed_tests == 0 && report.num_total_tests > 0;
    if report.num_total_tests == 0 && errors.is_empty() {
        errors.push("no tests were executed".to_string());
    }

    Some(TestOutcome {
        test_name: test_name.to_string(),
        success,
        test_files: report.num_total_test_suites,
        total_tests: report.num_total_tests,
        failed_tests: report.num_failed_tests,
        errors,
    })
}
