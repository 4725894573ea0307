use serde::{Deserialize, Serialize};

/// Whether extra context content was supplied to the provider for a run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContextInfo {
    pub used: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

/// One sample as it appears in persisted benchmark results.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SampleSummary {
    pub index: usize,
    pub code: String,
    pub success: bool,
    pub errors: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
}

/// A test case's full benchmark outcome for one provider/model pair.
///
/// `num_samples` counts only valid samples (those with generated code);
/// when it is zero the result is a sentinel for "the provider never
/// responded for this test" and is excluded from final reporting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestCaseResult {
    pub test_name: String,
    pub provider: String,
    pub model_id: String,
    pub num_samples: usize,
    pub num_correct: usize,
    pub pass1: f64,
    pub pass10: f64,
    pub context: ContextInfo,
    pub samples: Vec<SampleSummary>,
}

impl TestCaseResult {
    /// Sentinel for a test where no provider call ever produced code.
    pub fn empty(test_name: &str, provider: &str, model_id: &str, context: ContextInfo) -> Self {
        Self {
            test_name: test_name.to_string(),
            provider: provider.to_string(),
            model_id: model_id.to_string(),
            num_samples: 0,
            num_correct: 0,
            pass1: 0.0,
            pass10: 0.0,
            context,
            samples: Vec::new(),
        }
    }
}
