use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::TestOutcome;

/// One generation+validation attempt for a test case.
///
/// Empty `generated_code` marks an attempt where the provider never
/// produced usable output; such records are excluded from pass@k entirely
/// rather than counted as failures.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SampleRecord {
    pub test_name: String,
    pub provider: String,
    pub model_id: String,
    pub generated_code: String,
    pub outcome: TestOutcome,
    pub sample_index: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    pub timestamp: DateTime<Utc>,
}

impl SampleRecord {
    /// Whether the provider produced any code for this attempt.
    pub fn is_valid(&self) -> bool {
        !self.generated_code.trim().is_empty()
    }
}
