use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{SampleRecord, TestCaseResult};

/// Durable resumption state for one (provider, model) run.
///
/// Written after every sample completion and after every test-case
/// completion; removed when the run finishes cleanly. A record whose
/// `current_sample_index` has reached `num_samples` marks its test as
/// done, and resumption continues with the next test.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckpointRecord {
    pub model_id: String,
    pub provider: String,
    pub completed_results: Vec<TestCaseResult>,
    pub current_test_index: usize,
    pub current_sample_index: usize,
    pub current_test_samples: Vec<SampleRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_content: Option<String>,
    pub num_samples: usize,
    pub timestamp: DateTime<Utc>,
}
