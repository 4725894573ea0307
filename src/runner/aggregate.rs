use std::sync::Arc;

use anyhow::Result;
use tracing::error;

use crate::models::{ContextInfo, SampleRecord, SampleSummary, TestCaseResult};
use crate::retry::RetryExhausted;
use crate::stats::pass_at_k;
use crate::suite::TestCase;

use super::RunContext;
use super::batch::{CheckpointScope, run_sample_batch};

/// Drive the sample batch for one test case and fold it into a result.
///
/// Only retry exhaustion escapes as an error — it feeds the orchestrator's
/// abort policy. Every other failure collapses into the zero-sample
/// sentinel so one broken test cannot sink the rest of the run.
pub(crate) async fn run_test_case(
    ctx: &Arc<RunContext>,
    test: &TestCase,
    start_index: usize,
    existing: Vec<SampleRecord>,
    scope: Option<CheckpointScope<'_>>,
) -> Result<TestCaseResult> {
    let context = ContextInfo {
        used: ctx.context_content.is_some(),
        filename: None,
        content: ctx.context_content.clone(),
    };

    let samples = match run_sample_batch(ctx, test, start_index, existing, scope).await {
        Ok(samples) => samples,
        Err(err) if err.is::<RetryExhausted>() => return Err(err),
        Err(err) => {
            error!("failed to run samples for {}: {err:#}", test.name);
            return Ok(TestCaseResult::empty(
                &test.name,
                ctx.provider.name(),
                ctx.provider.model_id(),
                context,
            ));
        }
    };

    // Defensive re-filter; the coordinator already drops empty-code
    // records, but resumed checkpoint samples arrive unverified.
    let valid: Vec<SampleRecord> = samples.into_iter().filter(|s| s.is_valid()).collect();
    if valid.is_empty() {
        return Ok(TestCaseResult::empty(
            &test.name,
            ctx.provider.name(),
            ctx.provider.model_id(),
            context,
        ));
    }

    let num_samples = valid.len();
    let num_correct = valid.iter().filter(|s| s.outcome.success).count();
    let pass1 = pass_at_k(num_samples, num_correct, 1);
    let pass10 = pass_at_k(num_samples, num_correct, 10.min(num_samples));

    Ok(TestCaseResult {
        test_name: test.name.clone(),
        provider: ctx.provider.name().to_string(),
        model_id: ctx.provider.model_id().to_string(),
        num_samples,
        num_correct,
        pass1,
        pass10,
        context,
        samples: valid
            .into_iter()
            .map(|s| SampleSummary {
                index: s.sample_index,
                code: s.generated_code,
                success: s.outcome.success,
                errors: s.outcome.errors,
                temperature: s.temperature,
            })
            .collect(),
    })
}
