mod checkpoint;
mod clean;
mod config;
mod executor;
mod models;
mod process;
mod provider;
mod report;
mod retry;
mod runner;
mod stats;
mod suite;
mod workspace;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info, warn};

use checkpoint::{CheckpointStore, FsCheckpointStore};
use config::{Config, ProviderConfig};
use executor::TestExecutor;
use executor::vitest::VitestExecutor;
use models::TestCaseResult;
use provider::GenerationProvider;
use provider::command::CommandProvider;
use runner::RunContext;

/// Benchmark LLM providers on component-generation tasks with pass@k scoring.
#[derive(Debug, Parser)]
#[command(name = "passbench", version, about)]
struct Args {
    /// Workspace directory holding bench.toml and the test suite.
    #[arg(long, default_value = ".")]
    workspace: PathBuf,

    /// Only run providers whose name matches (case-insensitive).
    #[arg(long)]
    provider: Option<String>,

    /// Only run the given model id (case-insensitive).
    #[arg(long)]
    model: Option<String>,

    /// Only run the named test case.
    #[arg(long)]
    test: Option<String>,

    /// Override the configured number of samples per test.
    #[arg(long)]
    samples: Option<usize>,

    /// File whose content is passed to providers as extra context.
    #[arg(long)]
    context: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let args = Args::parse();
    match run(args).await {
        Ok(code) => code,
        Err(err) => {
            error!("benchmark run failed: {err:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> Result<ExitCode> {
    let config = Config::load(&args.workspace);

    let context_content = match &args.context {
        Some(path) => Some(
            tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("failed to read context file {}", path.display()))?,
        ),
        None => None,
    };
    let context_file = args
        .context
        .as_ref()
        .map(|p| p.to_string_lossy().to_string());

    let suite_dir = args.workspace.join(&config.run.suite_dir);
    let mut tests = suite::load_test_definitions(&suite_dir)?;
    if let Some(name) = &args.test {
        tests.retain(|t| t.name == *name);
        if tests.is_empty() {
            anyhow::bail!("test '{name}' not found in {}", suite_dir.display());
        }
    }
    if tests.is_empty() {
        anyhow::bail!("no test definitions found in {}", suite_dir.display());
    }
    info!("found {} tests to run", tests.len());

    let selected = select_providers(&config, &args)?;
    info!("found {} provider/model combinations", selected.len());

    let num_samples = args.samples.unwrap_or(config.run.num_samples);
    let samples_root = args.workspace.join(&config.run.samples_root);
    let checkpoints = Arc::new(FsCheckpointStore::new(
        args.workspace.join(&config.run.checkpoint_dir),
    ));
    let executor = Arc::new(VitestExecutor::new(Duration::from_secs(
        config.executor.timeout_secs,
    )));

    let mut all_results: Vec<TestCaseResult> = Vec::new();
    for provider_config in &selected {
        let provider = Arc::new(CommandProvider::from_config(provider_config)?);
        info!(
            "running tests with {} ({})",
            provider.name(),
            provider.model_id()
        );

        // Leftover scratch directories from a crashed run would only
        // accumulate; each provider starts with a clean slate.
        clean_samples_root(&samples_root).await;

        let ctx = Arc::new(RunContext {
            provider: provider as Arc<dyn GenerationProvider>,
            executor: Arc::clone(&executor) as Arc<dyn TestExecutor>,
            checkpoints: Arc::clone(&checkpoints) as Arc<dyn CheckpointStore>,
            retry: config.retry.policy(),
            samples_root: samples_root.clone(),
            artifact_filename: config.run.artifact_filename.clone(),
            artifact_header: config.run.artifact_header.clone(),
            num_samples,
            context_content: context_content.clone(),
        });

        match runner::run_suite(&ctx, &tests).await {
            Ok(results) => all_results.extend(results),
            // The checkpoint left behind makes the identical invocation
            // resume where this provider stopped; move on to the next one.
            Err(err) => error!(
                "run aborted for {}/{}: {err:#}",
                provider_config.name, provider_config.model
            ),
        }
    }

    clean_samples_root(&samples_root).await;

    let output_dir = args.workspace.join(&config.run.output_dir);
    report::save_results(&output_dir, &all_results, context_file.as_deref()).await?;

    let (total_samples, total_correct) = report::print_summary(&all_results);
    if total_samples == 0 || total_correct == 0 {
        return Ok(ExitCode::FAILURE);
    }
    Ok(ExitCode::SUCCESS)
}

fn select_providers(config: &Config, args: &Args) -> Result<Vec<ProviderConfig>> {
    let mut selected = config.providers.clone();
    if let Some(name) = &args.provider {
        selected.retain(|p| p.name.eq_ignore_ascii_case(name));
        if selected.is_empty() {
            anyhow::bail!("provider '{name}' is not configured");
        }
    }
    if let Some(model) = &args.model {
        selected.retain(|p| p.model.eq_ignore_ascii_case(model));
        if selected.is_empty() {
            anyhow::bail!("model '{model}' is not configured");
        }
    }
    if selected.is_empty() {
        anyhow::bail!("no providers configured; add [[providers]] entries to bench.toml");
    }
    Ok(selected)
}

async fn clean_samples_root(samples_root: &std::path::Path) {
    match tokio::fs::remove_dir_all(samples_root).await {
        Ok(()) => info!("cleaned samples directory"),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
        Err(err) => warn!(
            "failed to clean samples directory {}: {}",
            samples_root.display(),
            err
        ),
    }
}
