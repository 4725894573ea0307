mod aggregate;
mod batch;
mod orchestrator;
mod sample;
#[cfg(test)]
pub(crate) mod testing;

pub use orchestrator::run_suite;

use std::path::PathBuf;
use std::sync::Arc;

use crate::checkpoint::CheckpointStore;
use crate::executor::TestExecutor;
use crate::provider::GenerationProvider;
use crate::retry::RetryPolicy;

/// Everything one provider/model run needs, shared across the concurrent
/// sample tasks of a batch.
pub struct RunContext {
    pub provider: Arc<dyn GenerationProvider>,
    pub executor: Arc<dyn TestExecutor>,
    pub checkpoints: Arc<dyn CheckpointStore>,
    pub retry: RetryPolicy,
    /// Root directory for per-sample scratch workspaces.
    pub samples_root: PathBuf,
    /// Filename the generated artifact is written under.
    pub artifact_filename: String,
    /// Header line prepended to generated code when missing.
    pub artifact_header: Option<String>,
    /// Samples requested per test case.
    pub num_samples: usize,
    /// Extra context handed to the provider with every request.
    pub context_content: Option<String>,
}
