use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::warn;

/// One benchmark scenario: the prompt handed to the provider and the test
/// spec that validates whatever comes back. Immutable once discovered.
#[derive(Debug, Clone)]
pub struct TestCase {
    pub name: String,
    pub prompt_path: PathBuf,
    pub test_path: PathBuf,
}

/// Scan `suite_dir` for test definitions.
///
/// Each subdirectory holding both a `prompt.md` and a `test.ts` becomes a
/// test case named after the directory; incomplete directories are skipped
/// with a warning. The glob yields paths alphabetically, which keeps test
/// indices stable across runs — checkpoint resumption depends on that.
pub fn load_test_definitions(suite_dir: &Path) -> Result<Vec<TestCase>> {
    if !suite_dir.is_dir() {
        anyhow::bail!("suite directory {} does not exist", suite_dir.display());
    }

    let pattern = suite_dir
        .join("*")
        .join("prompt.md")
        .to_string_lossy()
        .to_string();

    let mut tests = Vec::new();
    for prompt_path in glob::glob(&pattern)
        .context("invalid suite glob pattern")?
        .flatten()
    {
        let Some(dir) = prompt_path.parent() else {
            continue;
        };
        let Some(name) = dir.file_name().and_then(|n| n.to_str()) else {
            continue;
        };

        let test_path = dir.join("test.ts");
        if !test_path.is_file() {
            warn!("skipping {}: missing test.ts", name);
            continue;
        }

        tests.push(TestCase {
            name: name.to_string(),
            prompt_path,
            test_path,
        });
    }

    Ok(tests)
}
