use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::warn;

/// Scratch directory exclusively owned by one sample attempt.
///
/// The directory name embeds the test name and sample index plus a random
/// suffix, so concurrent attempts — including a retried run of the same
/// index — can never share a path.
pub struct SampleWorkspace {
    dir: PathBuf,
    removed: bool,
}

impl SampleWorkspace {
    pub async fn create(
        root: &Path,
        provider: &str,
        test_name: &str,
        sample_index: usize,
    ) -> Result<Self> {
        let suffix = format!("{:08x}", rand::random::<u32>());
        let dir = root
            .join(provider.to_lowercase())
            .join(format!("{test_name}_sample{sample_index}_{suffix}"));
        tokio::fs::create_dir_all(&dir)
            .await
            .with_context(|| format!("failed to create workspace {}", dir.display()))?;
        Ok(Self {
            dir,
            removed: false,
        })
    }

    pub fn path(&self) -> &Path {
        &self.dir
    }

    pub async fn write_file(&self, filename: &str, content: &str) -> Result<PathBuf> {
        let path = self.dir.join(filename);
        tokio::fs::write(&path, content)
            .await
            .with_context(|| format!("failed to write {}", path.display()))?;
        Ok(path)
    }

    /// Best-effort removal. Cleanup failures must not block reporting an
    /// otherwise-valid sample result, so they are logged and swallowed.
    pub async fn remove(mut self) {
        self.removed = true;
        if let Err(err) = tokio::fs::remove_dir_all(&self.dir).await
            && err.kind() != std::io::ErrorKind::NotFound
        {
            warn!("failed to clean workspace {}: {}", self.dir.display(), err);
        }
    }
}

/// Covers exit paths that skip the explicit `remove` (early `?` returns,
/// panics in the executor).
impl Drop for SampleWorkspace {
    fn drop(&mut self) {
        if !self.removed {
            let _ = std::fs::remove_dir_all(&self.dir);
        }
    }
}
