use std::sync::Arc;

use anyhow::Result;
use chrono::Utc;
use tokio::task::JoinSet;
use tracing::{info, warn};

use crate::checkpoint::CheckpointKey;
use crate::models::{CheckpointRecord, SampleRecord, TestCaseResult};
use crate::suite::TestCase;

use super::RunContext;
use super::sample::{BASE_SAMPLE_TEMPERATURE, run_sample};

/// Where the orchestrator currently stands, so per-sample checkpoints can
/// be written while a batch is in flight.
pub(crate) struct CheckpointScope<'a> {
    pub test_index: usize,
    pub completed: &'a [TestCaseResult],
}

/// Run every remaining sample for `test` concurrently.
///
/// Tasks are collected as they finish, in completion order; valid records
/// are accumulated, provider failures (empty code) are logged and dropped.
/// When `scope` is given, a checkpoint is written after every single
/// completion — never batched — so a crash loses at most the later
/// completions of the in-flight batch.
///
/// Retry exhaustion only fails the batch when it produced no usable
/// sample at all: a provider that is intermittently dying still yields a
/// result, one that is entirely dead aborts the run upstream.
pub(crate) async fn run_sample_batch(
    ctx: &Arc<RunContext>,
    test: &TestCase,
    start_index: usize,
    existing: Vec<SampleRecord>,
    scope: Option<CheckpointScope<'_>>,
) -> Result<Vec<SampleRecord>> {
    let mut samples = existing;

    let mut tasks = JoinSet::new();
    for index in start_index..ctx.num_samples {
        let temperature = (index == 0).then_some(BASE_SAMPLE_TEMPERATURE);
        tasks.spawn(run_sample(
            Arc::clone(ctx),
            test.clone(),
            index,
            temperature,
        ));
    }

    let key = CheckpointKey::new(ctx.provider.name(), ctx.provider.model_id());
    let mut exhausted: Option<anyhow::Error> = None;

    while let Some(joined) = tasks.join_next().await {
        let run = match joined {
            Ok(run) => run,
            // A panicked sample task is logged like any other lost sample;
            // its siblings keep running.
            Err(err) => {
                warn!("sample task for {} died: {}", test.name, err);
                continue;
            }
        };

        let index = run.record.sample_index;
        if run.record.is_valid() {
            info!(
                "completed sample {}/{} for {}",
                index + 1,
                ctx.num_samples,
                test.name
            );
            samples.push(run.record);
        } else {
            warn!(
                "provider failure for sample {}/{} of {} - excluded from results",
                index + 1,
                ctx.num_samples,
                test.name
            );
        }

        if let Some(scope) = &scope {
            let checkpoint = CheckpointRecord {
                model_id: ctx.provider.model_id().to_string(),
                provider: ctx.provider.name().to_string(),
                completed_results: scope.completed.to_vec(),
                current_test_index: scope.test_index,
                current_sample_index: index,
                current_test_samples: samples.clone(),
                context_content: ctx.context_content.clone(),
                num_samples: ctx.num_samples,
                timestamp: Utc::now(),
            };
            // Checkpointing is best-effort: a run must be able to proceed
            // even when it cannot persist resumability.
            if let Err(err) = ctx.checkpoints.save(&key, &checkpoint).await {
                warn!(
                    "failed to save checkpoint after sample {}/{}: {err:#}",
                    index + 1,
                    ctx.num_samples
                );
            }
        }

        if exhausted.is_none()
            && let Some(err) = run.exhausted
        {
            exhausted = Some(err.into());
        }
    }

    if samples.is_empty()
        && let Some(err) = exhausted
    {
        return Err(err);
    }

    // Completion order is arbitrary; downstream consumers depend on
    // index-ordered sample lists for deterministic reporting.
    samples.sort_by_key(|s| s.sample_index);
    Ok(samples)
}
