//! Scripted fakes and a small harness for exercising the engine without a
//! real provider or test runner.

use std::collections::VecDeque;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tempfile::TempDir;

use crate::checkpoint::{CheckpointKey, CheckpointStore, MemoryCheckpointStore};
use crate::executor::TestExecutor;
use crate::models::{CheckpointRecord, SampleRecord, TestCaseResult, TestOutcome};
use crate::provider::{GenerationProvider, GenerationRequest, ProviderError};
use crate::retry::RetryPolicy;
use crate::suite::TestCase;

use super::RunContext;

pub(crate) const PROVIDER_NAME: &str = "scripted";
pub(crate) const MODEL_ID: &str = "scripted-model";
const ARTIFACT_FILENAME: &str = "Component.svelte";

/// Provider whose failures are scripted by call-arrival order.
pub(crate) struct ScriptedProvider {
    always_fail: bool,
    fail_arrivals: Mutex<VecDeque<bool>>,
    calls: AtomicUsize,
}

/// A provider that answers every call with fenced component code.
pub(crate) fn always_succeeding_provider() -> ScriptedProvider {
    ScriptedProvider {
        always_fail: false,
        fail_arrivals: Mutex::new(VecDeque::new()),
        calls: AtomicUsize::new(0),
    }
}

/// A provider that fails every call, like a persistent 500.
pub(crate) fn failing_provider() -> ScriptedProvider {
    ScriptedProvider {
        always_fail: true,
        fail_arrivals: Mutex::new(VecDeque::new()),
        calls: AtomicUsize::new(0),
    }
}

/// A provider that fails the calls whose arrival position maps to `true`.
pub(crate) fn arrival_scripted_provider(
    failures: impl IntoIterator<Item = bool>,
) -> ScriptedProvider {
    ScriptedProvider {
        always_fail: false,
        fail_arrivals: Mutex::new(failures.into_iter().collect()),
        calls: AtomicUsize::new(0),
    }
}

#[async_trait]
impl GenerationProvider for ScriptedProvider {
    fn name(&self) -> &str {
        PROVIDER_NAME
    }

    fn model_id(&self) -> &str {
        MODEL_ID
    }

    async fn generate_code(&self, _request: &GenerationRequest) -> Result<String, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let fail = self.always_fail
            || self
                .fail_arrivals
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(false);
        if fail {
            Err(ProviderError::Other("simulated 500 from provider".into()))
        } else {
            Ok("```svelte\n<p>generated</p>\n```".into())
        }
    }
}

/// Executor that verifies the staged files and scripts pass/fail by
/// call-arrival order (pass when the script runs out).
pub(crate) struct ScriptedExecutor {
    fail_arrivals: Mutex<VecDeque<bool>>,
    saw_artifact: AtomicBool,
    last_artifact: Mutex<Option<String>>,
}

pub(crate) fn arrival_scripted_executor(
    failures: impl IntoIterator<Item = bool>,
) -> ScriptedExecutor {
    ScriptedExecutor {
        fail_arrivals: Mutex::new(failures.into_iter().collect()),
        saw_artifact: AtomicBool::new(false),
        last_artifact: Mutex::new(None),
    }
}

#[async_trait]
impl TestExecutor for ScriptedExecutor {
    async fn run_test(
        &self,
        test_name: &str,
        _provider_name: &str,
        workspace: &Path,
    ) -> TestOutcome {
        let artifact = workspace.join(ARTIFACT_FILENAME);
        let test_file = workspace.join(format!("{test_name}.test.ts"));
        if artifact.is_file() && test_file.is_file() {
            self.saw_artifact.store(true, Ordering::SeqCst);
            *self.last_artifact.lock().unwrap() = std::fs::read_to_string(&artifact).ok();
        }

        let fail = self
            .fail_arrivals
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(false);
        if fail {
            TestOutcome {
                test_name: test_name.to_string(),
                success: false,
                test_files: 1,
                total_tests: 3,
                failed_tests: 1,
                errors: vec!["expected 1 to be 2".into()],
            }
        } else {
            TestOutcome {
                test_name: test_name.to_string(),
                success: true,
                test_files: 1,
                total_tests: 3,
                failed_tests: 0,
                errors: Vec::new(),
            }
        }
    }
}

/// Temp-dir world for one engine test: suite directory, samples root,
/// in-memory checkpoints, scripted collaborators.
pub(crate) struct TestHarness {
    root: TempDir,
    provider: Arc<ScriptedProvider>,
    executor: Arc<ScriptedExecutor>,
    pub checkpoints: Arc<MemoryCheckpointStore>,
    retry_attempts: usize,
    artifact_header: Option<String>,
}

impl TestHarness {
    pub fn new(provider: ScriptedProvider, retry_attempts: usize) -> Self {
        Self {
            root: tempfile::tempdir().unwrap(),
            provider: Arc::new(provider),
            executor: Arc::new(arrival_scripted_executor([])),
            checkpoints: Arc::new(MemoryCheckpointStore::new()),
            retry_attempts,
            artifact_header: None,
        }
    }

    pub fn with_executor(mut self, executor: ScriptedExecutor) -> Self {
        self.executor = Arc::new(executor);
        self
    }

    pub fn with_artifact_header(mut self, header: &str) -> Self {
        self.artifact_header = Some(header.to_string());
        self
    }

    pub fn context(&self, num_samples: usize) -> Arc<RunContext> {
        Arc::new(RunContext {
            provider: Arc::clone(&self.provider) as Arc<dyn GenerationProvider>,
            executor: Arc::clone(&self.executor) as Arc<dyn TestExecutor>,
            checkpoints: Arc::clone(&self.checkpoints) as Arc<dyn CheckpointStore>,
            retry: RetryPolicy {
                max_attempts: self.retry_attempts,
                initial_delay: Duration::from_millis(1),
                max_delay: Duration::from_millis(2),
                backoff_factor: 2.0,
                jitter: 0.0,
            },
            samples_root: self.root.path().join("samples"),
            artifact_filename: ARTIFACT_FILENAME.to_string(),
            artifact_header: self.artifact_header.clone(),
            num_samples,
            context_content: None,
        })
    }

    /// Create a suite directory for `name` and return its test case.
    pub fn add_test(&self, name: &str) -> TestCase {
        let dir = self.root.path().join("suite").join(name);
        std::fs::create_dir_all(&dir).unwrap();
        let prompt_path = dir.join("prompt.md");
        let test_path = dir.join("test.ts");
        std::fs::write(&prompt_path, format!("Build a {name} component.")).unwrap();
        std::fs::write(&test_path, format!("test('{name} works', () => {{}})")).unwrap();
        TestCase {
            name: name.to_string(),
            prompt_path,
            test_path,
        }
    }

    pub fn root(&self) -> &Path {
        self.root.path()
    }

    pub fn provider_calls(&self) -> usize {
        self.provider.calls.load(Ordering::SeqCst)
    }

    pub fn executor_saw_artifact(&self) -> bool {
        self.executor.saw_artifact.load(Ordering::SeqCst)
    }

    pub fn last_staged_artifact(&self) -> Option<String> {
        self.executor.last_artifact.lock().unwrap().clone()
    }

    /// Count scratch directories left under the samples root.
    pub fn leftover_workspaces(&self) -> usize {
        let mut count = 0;
        if let Ok(providers) = std::fs::read_dir(self.root.path().join("samples")) {
            for provider_dir in providers.flatten() {
                if let Ok(entries) = std::fs::read_dir(provider_dir.path()) {
                    count += entries.count();
                }
            }
        }
        count
    }

    pub fn checkpoint_key(&self) -> CheckpointKey {
        CheckpointKey::new(PROVIDER_NAME, MODEL_ID)
    }

    pub async fn seed_checkpoint(
        &self,
        test_index: usize,
        sample_index: usize,
        completed: Vec<TestCaseResult>,
        in_progress: Vec<SampleRecord>,
        context_content: Option<String>,
        num_samples: usize,
    ) {
        let record = CheckpointRecord {
            model_id: MODEL_ID.to_string(),
            provider: PROVIDER_NAME.to_string(),
            completed_results: completed,
            current_test_index: test_index,
            current_sample_index: sample_index,
            current_test_samples: in_progress,
            context_content,
            num_samples,
            timestamp: Utc::now(),
        };
        self.checkpoints
            .save(&self.checkpoint_key(), &record)
            .await
            .unwrap();
    }
}

/// A checkpoint-shaped sample record with the given validity.
pub(crate) fn sample_record(
    ctx: &Arc<RunContext>,
    test_name: &str,
    index: usize,
    success: bool,
) -> SampleRecord {
    SampleRecord {
        test_name: test_name.to_string(),
        provider: ctx.provider.name().to_string(),
        model_id: ctx.provider.model_id().to_string(),
        generated_code: "<p>from checkpoint</p>".to_string(),
        outcome: TestOutcome {
            test_name: test_name.to_string(),
            success,
            test_files: 1,
            total_tests: 3,
            failed_tests: if success { 0 } else { 1 },
            errors: if success {
                Vec::new()
            } else {
                vec!["expected 1 to be 2".into()]
            },
        },
        sample_index: index,
        temperature: (index == 0).then_some(0.0),
        timestamp: Utc::now(),
    }
}

/// A fully-passing completed result, as a resumed run would restore it.
pub(crate) fn completed_result(
    ctx: &Arc<RunContext>,
    test_name: &str,
    num_samples: usize,
) -> TestCaseResult {
    TestCaseResult {
        test_name: test_name.to_string(),
        provider: ctx.provider.name().to_string(),
        model_id: ctx.provider.model_id().to_string(),
        num_samples,
        num_correct: num_samples,
        pass1: 1.0,
        pass10: 1.0,
        context: Default::default(),
        samples: Vec::new(),
    }
}
