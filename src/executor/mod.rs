pub mod vitest;

use std::path::Path;

use async_trait::async_trait;

use crate::models::TestOutcome;

/// Runs the validation suite against one sample workspace.
///
/// Implementations convert every failure mode — missing test file,
/// crashed runner, timeout — into a failed `TestOutcome`. Nothing an
/// executor does may abort the sample that invoked it.
#[async_trait]
pub trait TestExecutor: Send + Sync {
    async fn run_test(&self, test_name: &str, provider_name: &str, workspace: &Path)
    -> TestOutcome;
}
