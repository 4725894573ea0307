use serde::{Deserialize, Serialize};

/// Result of executing the validation suite against one generated artifact.
///
/// A run that executed zero tests is never a success, regardless of what
/// the executor reported: an empty test module means the artifact did not
/// even load.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TestOutcome {
    pub test_name: String,
    pub success: bool,
    pub test_files: usize,
    pub total_tests: usize,
    pub failed_tests: usize,
    #[serde(default)]
    pub errors: Vec<String>,
}

impl TestOutcome {
    /// An outcome for an attempt that never produced test results.
    pub fn failed(test_name: &str, error: impl Into<String>) -> Self {
        Self {
            test_name: test_name.to_string(),
            success: false,
            test_files: 0,
            total_tests: 0,
            failed_tests: 0,
            errors: vec![error.into()],
        }
    }
}
