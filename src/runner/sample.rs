use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;
use tracing::{debug, error};

use crate::clean::clean_markdown_fences;
use crate::models::{SampleRecord, TestOutcome};
use crate::provider::GenerationRequest;
use crate::retry::{RetryExhausted, with_retry};
use crate::suite::TestCase;
use crate::workspace::SampleWorkspace;

use super::RunContext;

/// Sample index 0 always runs at this temperature; it is the canonical
/// pass@1 sample. Every other index uses the provider's default.
pub(crate) const BASE_SAMPLE_TEMPERATURE: f64 = 0.0;

/// Outcome of one isolated sample attempt.
///
/// `run_sample` never fails; `exhausted` is set when generation burned the
/// entire retry budget, which is the one failure the orchestrator may
/// escalate into aborting the run.
pub(crate) struct SampleRun {
    pub record: SampleRecord,
    pub exhausted: Option<RetryExhausted>,
}

/// Run one generation+validation attempt in its own scratch workspace.
///
/// Unrecoverable errors come back as a record with empty generated code
/// and the error captured in the outcome, so one dead sample never takes
/// its siblings down with it.
pub(crate) async fn run_sample(
    ctx: Arc<RunContext>,
    test: TestCase,
    sample_index: usize,
    temperature: Option<f64>,
) -> SampleRun {
    match attempt_sample(&ctx, &test, sample_index, temperature).await {
        Ok(record) => SampleRun {
            record,
            exhausted: None,
        },
        Err(err) => {
            error!(
                "sample {}/{} for {} with {} failed: {err:#}",
                sample_index + 1,
                ctx.num_samples,
                test.name,
                ctx.provider.name()
            );
            let message = format!("{err:#}");
            let exhausted = err.downcast::<RetryExhausted>().ok();
            SampleRun {
                record: SampleRecord {
                    test_name: test.name.clone(),
                    provider: ctx.provider.name().to_string(),
                    model_id: ctx.provider.model_id().to_string(),
                    generated_code: String::new(),
                    outcome: TestOutcome::failed(&test.name, message),
                    sample_index,
                    temperature,
                    timestamp: Utc::now(),
                },
                exhausted,
            }
        }
    }
}

async fn attempt_sample(
    ctx: &Arc<RunContext>,
    test: &TestCase,
    sample_index: usize,
    temperature: Option<f64>,
) -> Result<SampleRecord> {
    let prompt = tokio::fs::read_to_string(&test.prompt_path)
        .await
        .with_context(|| format!("failed to read prompt {}", test.prompt_path.display()))?;

    debug!(
        "generating {} with {} (sample {}, temp: {})",
        test.name,
        ctx.provider.name(),
        sample_index + 1,
        temperature.map_or("default".to_string(), |t| t.to_string()),
    );

    let request = GenerationRequest {
        prompt,
        temperature,
        context: ctx.context_content.clone(),
    };
    let label = format!("{} with {}", test.name, ctx.provider.name());
    let provider = ctx.provider.as_ref();
    let request = &request;
    let mut generated = with_retry(&ctx.retry, &label, || async move {
        let raw = provider.generate_code(request).await?;
        let cleaned = clean_markdown_fences(&raw);
        // An empty response after cleaning is the provider failing
        // quietly; retry it like any other provider error.
        if cleaned.is_empty() {
            anyhow::bail!("generated code is empty after cleaning");
        }
        Ok(cleaned)
    })
    .await?;

    if let Some(header) = &ctx.artifact_header
        && !generated.contains(header.trim())
    {
        generated = format!("{header}\n\n{generated}");
    }

    let workspace = SampleWorkspace::create(
        &ctx.samples_root,
        ctx.provider.name(),
        &test.name,
        sample_index,
    )
    .await?;

    // Stage files and execute, then clean up no matter which way it went;
    // the Drop impl covers the panic path.
    let staged = stage_and_execute(ctx, test, &workspace, &generated).await;
    workspace.remove().await;
    let outcome = staged?;

    Ok(SampleRecord {
        test_name: test.name.clone(),
        provider: ctx.provider.name().to_string(),
        model_id: ctx.provider.model_id().to_string(),
        generated_code: generated,
        outcome,
        sample_index,
        temperature,
        timestamp: Utc::now(),
    })
}

async fn stage_and_execute(
    ctx: &Arc<RunContext>,
    test: &TestCase,
    workspace: &SampleWorkspace,
    generated: &str,
) -> Result<TestOutcome> {
    workspace
        .write_file(&ctx.artifact_filename, generated)
        .await?;

    let test_spec = tokio::fs::read_to_string(&test.test_path)
        .await
        .with_context(|| format!("failed to read test spec {}", test.test_path.display()))?;
    workspace
        .write_file(&format!("{}.test.ts", test.name), &test_spec)
        .await?;

    Ok(ctx
        .executor
        .run_test(&test.name, ctx.provider.name(), workspace.path())
        .await)
}
