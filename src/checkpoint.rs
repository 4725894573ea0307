use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use anyhow::{Context, Result};
use async_trait::async_trait;
use tracing::warn;

use crate::models::CheckpointRecord;

/// Identifies the checkpoint for one (provider, model) run.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CheckpointKey {
    pub provider: String,
    pub model_id: String,
}

impl CheckpointKey {
    pub fn new(provider: &str, model_id: &str) -> Self {
        Self {
            provider: provider.to_string(),
            model_id: model_id.to_string(),
        }
    }

    fn file_name(&self) -> String {
        format!(
            "{}_{}.json",
            sanitize(&self.provider),
            sanitize(&self.model_id)
        )
    }
}

/// Model ids contain `/` and `:` (e.g. `anthropic/claude-sonnet-4`); map
/// anything unsafe for a file name to `-`.
fn sanitize(part: &str) -> String {
    part.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '.') {
                c
            } else {
                '-'
            }
        })
        .collect()
}

/// Durable storage for in-progress run state.
///
/// Injected into the orchestrator rather than accessed as ambient state,
/// so tests can swap in the in-memory implementation.
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    async fn save(&self, key: &CheckpointKey, record: &CheckpointRecord) -> Result<()>;
    async fn load(&self, key: &CheckpointKey) -> Result<Option<CheckpointRecord>>;
    async fn remove(&self, key: &CheckpointKey) -> Result<()>;
    /// Drop every checkpoint belonging to `provider`, regardless of model.
    async fn clear_provider(&self, provider: &str) -> Result<()>;
}

/// One JSON file per key under a checkpoint directory.
pub struct FsCheckpointStore {
    dir: PathBuf,
}

impl FsCheckpointStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

#[async_trait]
impl CheckpointStore for FsCheckpointStore {
    async fn save(&self, key: &CheckpointKey, record: &CheckpointRecord) -> Result<()> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .with_context(|| format!("failed to create {}", self.dir.display()))?;

        let bytes = serde_json::to_vec_pretty(record).context("failed to serialize checkpoint")?;
        let path = self.dir.join(key.file_name());

        // Write-then-rename so an interrupted save never leaves a truncated
        // checkpoint where a valid one used to be.
        let tmp = self
            .dir
            .join(format!(".{}.tmp.{}", key.file_name(), std::process::id()));
        tokio::fs::write(&tmp, &bytes)
            .await
            .with_context(|| format!("failed to write {}", tmp.display()))?;
        tokio::fs::rename(&tmp, &path)
            .await
            .with_context(|| format!("failed to rename {} into place", tmp.display()))?;
        Ok(())
    }

    async fn load(&self, key: &CheckpointKey) -> Result<Option<CheckpointRecord>> {
        let path = self.dir.join(key.file_name());
        let content = match tokio::fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => {
                return Err(err).with_context(|| format!("failed to read {}", path.display()));
            }
        };

        // A corrupt record (interrupted write from an old version, manual
        // edit) is treated as "no checkpoint", not a fatal error.
        match serde_json::from_str(&content) {
            Ok(record) => Ok(Some(record)),
            Err(err) => {
                warn!("ignoring corrupt checkpoint {}: {}", path.display(), err);
                Ok(None)
            }
        }
    }

    async fn remove(&self, key: &CheckpointKey) -> Result<()> {
        let path = self.dir.join(key.file_name());
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err).with_context(|| format!("failed to remove {}", path.display())),
        }
    }

    async fn clear_provider(&self, provider: &str) -> Result<()> {
        let prefix = format!("{}_", sanitize(provider));
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(err) => {
                return Err(err).with_context(|| format!("failed to list {}", self.dir.display()));
            }
        };

        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            if name.starts_with(&prefix) && name.ends_with(".json") {
                if let Err(err) = tokio::fs::remove_file(entry.path()).await {
                    warn!("failed to remove stale checkpoint {}: {}", name, err);
                }
            }
        }
        Ok(())
    }
}

/// Mutex-guarded map, for tests and embedding callers that don't want
/// filesystem persistence.
#[derive(Default)]
pub struct MemoryCheckpointStore {
    records: Mutex<HashMap<CheckpointKey, CheckpointRecord>>,
    saves: AtomicUsize,
}

impl MemoryCheckpointStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of `save` calls observed, for asserting checkpoint cadence.
    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CheckpointStore for MemoryCheckpointStore {
    async fn save(&self, key: &CheckpointKey, record: &CheckpointRecord) -> Result<()> {
        self.saves.fetch_add(1, Ordering::SeqCst);
        self.records
            .lock()
            .unwrap()
            .insert(key.clone(), record.clone());
        Ok(())
    }

    async fn load(&self, key: &CheckpointKey) -> Result<Option<CheckpointRecord>> {
        Ok(self.records.lock().unwrap().get(key).cloned())
    }

    async fn remove(&self, key: &CheckpointKey) -> Result<()> {
        self.records.lock().unwrap().remove(key);
        Ok(())
    }

    async fn clear_provider(&self, provider: &str) -> Result<()> {
        self.records
            .lock()
            .unwrap()
            .retain(|key, _| key.provider != provider);
        Ok(())
    }
}
