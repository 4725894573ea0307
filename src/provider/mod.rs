pub mod command;

use async_trait::async_trait;
use thiserror::Error;

/// A single code-generation request.
///
/// Fixed shape on purpose: provider implementations accept exactly these
/// fields, so they cannot silently drift on what they support.
#[derive(Debug, Clone, Default)]
pub struct GenerationRequest {
    pub prompt: String,
    pub temperature: Option<f64>,
    pub context: Option<String>,
}

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("failed to launch provider command: {0}")]
    Spawn(std::io::Error),
    #[error("provider command exited with status {code}: {stderr}")]
    Failed { code: i32, stderr: String },
    #[error("provider call timed out after {0}s")]
    Timeout(u64),
    #[error("{0}")]
    Other(String),
}

/// Narrow seam to anything that can turn a prompt into component code.
///
/// Real SDK clients live behind this trait; the benchmark engine only ever
/// sees text or an error.
#[async_trait]
pub trait GenerationProvider: Send + Sync {
    /// Provider name used in logs, workspace paths and checkpoint keys.
    fn name(&self) -> &str;

    /// Model identifier recorded alongside every result.
    fn model_id(&self) -> &str;

    async fn generate_code(&self, request: &GenerationRequest) -> Result<String, ProviderError>;
}
