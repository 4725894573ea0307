use std::sync::Arc;

use anyhow::Result;
use chrono::Utc;
use tracing::{error, info, warn};

use crate::checkpoint::CheckpointKey;
use crate::models::{CheckpointRecord, SampleRecord, TestCaseResult};
use crate::retry::RetryExhausted;
use crate::suite::TestCase;

use super::RunContext;
use super::aggregate::run_test_case;
use super::batch::CheckpointScope;

/// Run every test case for one provider/model pair, resuming from a prior
/// checkpoint when one is present and was written by an identically
/// configured run.
///
/// Exactly one error class aborts the run: exhausted provider retries.
/// The checkpoint left behind lets the same invocation pick up where it
/// stopped. Everything else is absorbed — a test that errors is marked
/// completed so it is not retried forever, and the run moves on.
pub async fn run_suite(ctx: &Arc<RunContext>, tests: &[TestCase]) -> Result<Vec<TestCaseResult>> {
    let provider_name = ctx.provider.name().to_string();
    let model_id = ctx.provider.model_id().to_string();
    let key = CheckpointKey::new(&provider_name, &model_id);

    let mut results: Vec<TestCaseResult> = Vec::new();
    let mut start_test_index = 0;
    let mut start_sample_index = 0;
    let mut resumed_samples: Vec<SampleRecord> = Vec::new();

    let checkpoint = match ctx.checkpoints.load(&key).await {
        Ok(checkpoint) => checkpoint,
        Err(err) => {
            warn!("failed to load checkpoint for {provider_name}/{model_id}: {err:#}");
            None
        }
    };

    match checkpoint {
        // A checkpoint from a differently configured run is never silently
        // reused; the metric would be computed over mismatched inputs.
        Some(cp)
            if cp.context_content != ctx.context_content || cp.num_samples != ctx.num_samples =>
        {
            warn!(
                "checkpoint for {provider_name}/{model_id} does not match this run's configuration - starting fresh"
            );
            clear_stale(ctx, &provider_name).await;
        }
        Some(cp) => {
            info!(
                "resuming {provider_name}/{model_id} at test {}/{}, sample {}",
                cp.current_test_index + 1,
                tests.len(),
                cp.current_sample_index + 1,
            );
            results = cp.completed_results;
            start_test_index = cp.current_test_index;
            start_sample_index = cp.current_sample_index + 1;
            resumed_samples = cp.current_test_samples;

            // The checkpointed test already ran its full sample budget:
            // its result is in completed_results, move to the next test.
            if start_sample_index >= ctx.num_samples {
                start_test_index += 1;
                start_sample_index = 0;
                resumed_samples.clear();
            }
        }
        None => clear_stale(ctx, &provider_name).await,
    }

    for (test_index, test) in tests.iter().enumerate().skip(start_test_index) {
        info!(
            "running test {} with {provider_name} ({}/{})",
            test.name,
            test_index + 1,
            tests.len()
        );

        let (sample_start, existing) = if test_index == start_test_index {
            (start_sample_index, std::mem::take(&mut resumed_samples))
        } else {
            (0, Vec::new())
        };

        let scope = CheckpointScope {
            test_index,
            completed: &results,
        };

        match run_test_case(ctx, test, sample_start, existing, Some(scope)).await {
            Ok(result) => {
                if result.num_samples > 0 {
                    info!(
                        "{} ({provider_name}) - pass@1: {:.4}, pass@10: {:.4} ({}/{} correct)",
                        test.name,
                        result.pass1,
                        result.pass10,
                        result.num_correct,
                        result.num_samples
                    );
                    results.push(result);
                } else {
                    warn!(
                        "skipping {}: no successful provider calls, excluded from final results",
                        test.name
                    );
                }
                save_checkpoint(ctx, &key, &results, test_index, ctx.num_samples).await;
            }
            Err(err) if err.is::<RetryExhausted>() => {
                error!(
                    "aborting run for {provider_name}/{model_id}: retries exhausted on {}",
                    test.name
                );
                save_checkpoint(ctx, &key, &results, test_index, 0).await;
                return Err(err);
            }
            Err(err) => {
                // Mark the test completed so a resume does not retry it
                // forever, then keep collecting results for the rest.
                error!("error running test {}: {err:#}", test.name);
                save_checkpoint(ctx, &key, &results, test_index, ctx.num_samples).await;
            }
        }
    }

    // A finished run clears resumability on purpose: rerunning the same
    // configuration means a fresh benchmark, not a no-op.
    if let Err(err) = ctx.checkpoints.remove(&key).await {
        warn!("failed to remove checkpoint for {provider_name}/{model_id}: {err:#}");
    }

    Ok(results)
}

async fn clear_stale(ctx: &Arc<RunContext>, provider: &str) {
    if let Err(err) = ctx.checkpoints.clear_provider(provider).await {
        warn!("failed to clear stale checkpoints for {provider}: {err:#}");
    }
}

async fn save_checkpoint(
    ctx: &Arc<RunContext>,
    key: &CheckpointKey,
    results: &[TestCaseResult],
    test_index: usize,
    sample_index: usize,
) {
    let record = CheckpointRecord {
        model_id: ctx.provider.model_id().to_string(),
        provider: ctx.provider.name().to_string(),
        completed_results: results.to_vec(),
        current_test_index: test_index,
        current_sample_index: sample_index,
        current_test_samples: Vec::new(),
        context_content: ctx.context_content.clone(),
        num_samples: ctx.num_samples,
        timestamp: Utc::now(),
    };
    if let Err(err) = ctx.checkpoints.save(key, &record).await {
        warn!("failed to save checkpoint: {err:#}");
    }
}
