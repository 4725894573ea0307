use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use tracing::warn;

use crate::retry::RetryPolicy;

#[derive(Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub run: RunConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub executor: ExecutorConfig,
    #[serde(default)]
    pub providers: Vec<ProviderConfig>,
}

/// Directories and per-run knobs.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Directory scanned for test definitions (one subdirectory per test).
    pub suite_dir: PathBuf,
    /// Where benchmark result files are written.
    pub output_dir: PathBuf,
    /// Root for per-sample scratch workspaces.
    pub samples_root: PathBuf,
    /// Where checkpoint files live.
    pub checkpoint_dir: PathBuf,
    /// Samples generated per test case.
    pub num_samples: usize,
    /// Filename the generated artifact is written under in each workspace.
    pub artifact_filename: String,
    /// Header line prepended to generated code when it is missing.
    /// Example: `<svelte:options runes={true} />`
    pub artifact_header: Option<String>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            suite_dir: "suite".into(),
            output_dir: "benchmarks".into(),
            samples_root: "tmp/samples".into(),
            checkpoint_dir: "checkpoints".into(),
            num_samples: 10,
            artifact_filename: "Component.svelte".into(),
            artifact_header: None,
        }
    }
}

/// Provider-call retry knobs, mirroring `RetryPolicy`.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_attempts: usize,
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
    pub backoff_factor: f64,
    pub jitter: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 100,
            initial_delay_ms: 1_000,
            max_delay_ms: 30_000,
            backoff_factor: 2.0,
            jitter: 0.2,
        }
    }
}

impl RetryConfig {
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            initial_delay: Duration::from_millis(self.initial_delay_ms),
            max_delay: Duration::from_millis(self.max_delay_ms),
            backoff_factor: self.backoff_factor,
            jitter: self.jitter,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ExecutorConfig {
    /// Upper bound for one vitest invocation.
    pub timeout_secs: u64,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self { timeout_secs: 60 }
    }
}

/// One provider/model pair to benchmark.
#[derive(Debug, Clone, Deserialize)]
pub struct ProviderConfig {
    pub name: String,
    pub model: String,
    /// Command invoked per generation request; the prompt arrives on stdin
    /// and the generated code is read from stdout.
    pub command: String,
    #[serde(default = "default_provider_timeout")]
    pub timeout_secs: u64,
}

fn default_provider_timeout() -> u64 {
    300
}

impl Config {
    /// Load `bench.toml` from the workspace root, falling back to defaults
    /// if absent. A present-but-unparseable file is reported and ignored
    /// rather than silently producing a half-configured run.
    pub fn load(workspace: &Path) -> Self {
        let path = workspace.join("bench.toml");
        let Ok(content) = std::fs::read_to_string(&path) else {
            return Self::default();
        };
        match toml::from_str(&content) {
            Ok(config) => config,
            Err(err) => {
                warn!("ignoring invalid {}: {}", path.display(), err);
                Self::default()
            }
        }
    }
}
