use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Utc;
use tracing::info;

use crate::models::TestCaseResult;

/// Write the run's results as pretty JSON under `output_dir`.
///
/// The filename carries a timestamp (colons replaced for filesystem
/// safety) and a `-with-context-` infix when a context file was used, so
/// successive runs never overwrite each other.
pub async fn save_results(
    output_dir: &Path,
    results: &[TestCaseResult],
    context_file: Option<&str>,
) -> Result<PathBuf> {
    tokio::fs::create_dir_all(output_dir)
        .await
        .with_context(|| format!("failed to create {}", output_dir.display()))?;

    let timestamp = Utc::now().to_rfc3339().replace(':', "-");
    let prefix = if context_file.is_some() {
        "benchmark-results-with-context-"
    } else {
        "benchmark-results-"
    };
    let path = output_dir.join(format!("{prefix}{timestamp}.json"));

    let mut results = results.to_vec();
    if let Some(filename) = context_file {
        for result in &mut results {
            if result.context.filename.is_none() {
                result.context.filename = Some(filename.to_string());
            }
        }
    }

    let json = serde_json::to_vec_pretty(&results).context("failed to serialize results")?;
    tokio::fs::write(&path, json)
        .await
        .with_context(|| format!("failed to write {}", path.display()))?;

    info!("saved benchmark results to {}", path.display());
    Ok(path)
}

/// Print the per-test summary and return `(total samples, total passed)`.
pub fn print_summary(results: &[TestCaseResult]) -> (usize, usize) {
    println!("\nBenchmark Summary:");
    println!("===========================================");

    // Group by test name, keeping first-seen order.
    let mut by_test: Vec<(&str, Vec<&TestCaseResult>)> = Vec::new();
    for result in results {
        match by_test.iter_mut().find(|(name, _)| *name == result.test_name) {
            Some((_, group)) => group.push(result),
            None => by_test.push((result.test_name.as_str(), vec![result])),
        }
    }

    let mut total_samples = 0;
    let mut total_correct = 0;

    for (test_name, group) in &by_test {
        println!("\nTest: {test_name}");
        for result in group {
            println!("  {} ({}):", result.provider, result.model_id);
            println!(
                "    pass@1: {:.4}, pass@10: {:.4}",
                result.pass1, result.pass10
            );
            println!(
                "    Samples: {}, Correct: {}",
                result.num_samples, result.num_correct
            );
            total_samples += result.num_samples;
            total_correct += result.num_correct;
        }
    }

    println!("\n===========================================");
    println!(
        "Total Samples: {}, Passed: {}, Failed: {}",
        total_samples,
        total_correct,
        total_samples - total_correct
    );

    (total_samples, total_correct)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ContextInfo;

    fn result(test_name: &str, provider: &str, samples: usize, correct: usize) -> TestCaseResult {
        TestCaseResult {
            test_name: test_name.to_string(),
            provider: provider.to_string(),
            model_id: "m1".to_string(),
            num_samples: samples,
            num_correct: correct,
            pass1: correct as f64 / samples as f64,
            pass10: 1.0,
            context: ContextInfo::default(),
            samples: Vec::new(),
        }
    }

    #[test]
    fn summary_totals_span_providers_and_tests() {
        let results = vec![
            result("counter", "openai", 10, 7),
            result("counter", "anthropic", 10, 9),
            result("toggle", "openai", 10, 10),
        ];
        assert_eq!(print_summary(&results), (30, 26));
        assert_eq!(print_summary(&[]), (0, 0));
    }

    #[tokio::test]
    async fn saves_results_with_context_filename() {
        let dir = tempfile::tempdir().unwrap();
        let results = vec![result("counter", "openai", 10, 7)];

        let path = save_results(dir.path(), &results, Some("docs/llms.txt"))
            .await
            .unwrap();

        let name = path.file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("benchmark-results-with-context-"));
        assert!(!name.contains(':'));

        let saved: Vec<TestCaseResult> =
            serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
        assert_eq!(saved.len(), 1);
        assert_eq!(saved[0].context.filename.as_deref(), Some("docs/llms.txt"));
    }

    #[tokio::test]
    async fn saves_results_without_context() {
        let dir = tempfile::tempdir().unwrap();
        let path = save_results(dir.path(), &[result("counter", "openai", 5, 5)], None)
            .await
            .unwrap();
        let name = path.file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("benchmark-results-"));
        assert!(!name.contains("with-context"));
    }
}
