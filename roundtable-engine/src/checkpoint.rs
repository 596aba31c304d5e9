//! Checkpoint stores
//!
//! An in-memory store for tests and embedded use, and a file-backed store
//! that keeps one JSON snapshot per run. File writes go through a temp file
//! and rename so a reader never observes a torn snapshot.

use async_trait::async_trait;
use roundtable_core::{
    Checkpoint, CheckpointStore, ErrorContext, RoundtableError, RoundtableResult,
};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;
use tracing::{debug, info};

/// In-memory checkpoint store
#[derive(Default)]
pub struct MemoryCheckpointStore<S> {
    checkpoints: RwLock<HashMap<String, Checkpoint<S>>>,
}

impl<S> MemoryCheckpointStore<S> {
    pub fn new() -> Self {
        Self {
            checkpoints: RwLock::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl<S> CheckpointStore<S> for MemoryCheckpointStore<S>
where
    S: Clone + Send + Sync + 'static,
{
    async fn save(&self, run_id: &str, checkpoint: &Checkpoint<S>) -> RoundtableResult<()> {
        let mut checkpoints = self.checkpoints.write().await;
        checkpoints.insert(run_id.to_string(), checkpoint.clone());
        Ok(())
    }

    async fn load(&self, run_id: &str) -> RoundtableResult<Checkpoint<S>> {
        let checkpoints = self.checkpoints.read().await;
        checkpoints
            .get(run_id)
            .cloned()
            .ok_or_else(|| roundtable_core::not_found_error!(run_id, "memory_checkpoint_store"))
    }

    async fn delete(&self, run_id: &str) -> RoundtableResult<()> {
        let mut checkpoints = self.checkpoints.write().await;
        checkpoints.remove(run_id);
        Ok(())
    }

    async fn list_runs(&self) -> RoundtableResult<Vec<String>> {
        let checkpoints = self.checkpoints.read().await;
        Ok(checkpoints.keys().cloned().collect())
    }
}

/// File-backed checkpoint store, one `<run_id>.json` per run
pub struct FileCheckpointStore {
    storage_dir: PathBuf,
}

impl FileCheckpointStore {
    /// Create a store rooted at `storage_dir`, creating it if needed
    pub fn new<P: AsRef<Path>>(storage_dir: P) -> RoundtableResult<Self> {
        let storage_dir = storage_dir.as_ref().to_path_buf();

        std::fs::create_dir_all(&storage_dir).map_err(|e| RoundtableError::Storage {
            message: format!("Failed to create checkpoint directory: {}", e),
            source: Some(Box::new(e)),
            context: ErrorContext::new("file_checkpoint_store")
                .with_operation("create_dir")
                .with_suggestion("Check directory permissions"),
        })?;

        info!(
            "Checkpoint store initialized at: {}",
            storage_dir.display()
        );

        Ok(Self { storage_dir })
    }

    fn checkpoint_path(&self, run_id: &str) -> PathBuf {
        self.storage_dir.join(format!("{}.json", run_id))
    }
}

#[async_trait]
impl<S> CheckpointStore<S> for FileCheckpointStore
where
    S: Serialize + DeserializeOwned + Send + Sync + 'static,
{
    async fn save(&self, run_id: &str, checkpoint: &Checkpoint<S>) -> RoundtableResult<()> {
        let path = self.checkpoint_path(run_id);
        let tmp_path = self.storage_dir.join(format!("{}.json.tmp", run_id));

        let json_data = serde_json::to_string_pretty(checkpoint)?;

        tokio::fs::write(&tmp_path, json_data)
            .await
            .map_err(|e| roundtable_core::storage_error!("Failed to write checkpoint", "file_checkpoint_store", e))?;

        // Rename is atomic on the same filesystem; readers see the old or
        // the new snapshot, never a partial write.
        tokio::fs::rename(&tmp_path, &path)
            .await
            .map_err(|e| roundtable_core::storage_error!("Failed to commit checkpoint", "file_checkpoint_store", e))?;

        debug!(
            run_id,
            version = checkpoint.version,
            path = %path.display(),
            "Checkpoint saved"
        );
        Ok(())
    }

    async fn load(&self, run_id: &str) -> RoundtableResult<Checkpoint<S>> {
        let path = self.checkpoint_path(run_id);

        if !path.exists() {
            return Err(roundtable_core::not_found_error!(
                run_id,
                "file_checkpoint_store"
            ));
        }

        let json_data = tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| roundtable_core::storage_error!("Failed to read checkpoint", "file_checkpoint_store", e))?;

        let checkpoint: Checkpoint<S> = serde_json::from_str(&json_data)?;
        debug!(run_id, version = checkpoint.version, "Checkpoint loaded");
        Ok(checkpoint)
    }

    async fn delete(&self, run_id: &str) -> RoundtableResult<()> {
        let path = self.checkpoint_path(run_id);
        if path.exists() {
            tokio::fs::remove_file(&path)
                .await
                .map_err(|e| roundtable_core::storage_error!("Failed to delete checkpoint", "file_checkpoint_store", e))?;
            debug!(run_id, "Checkpoint deleted");
        }
        Ok(())
    }

    async fn list_runs(&self) -> RoundtableResult<Vec<String>> {
        let mut runs = Vec::new();

        let mut entries = tokio::fs::read_dir(&self.storage_dir)
            .await
            .map_err(|e| roundtable_core::storage_error!("Failed to list checkpoints", "file_checkpoint_store", e))?;

        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| roundtable_core::storage_error!("Failed to list checkpoints", "file_checkpoint_store", e))?
        {
            let path = entry.path();
            if path.extension().and_then(|s| s.to_str()) == Some("json") {
                if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                    runs.push(stem.to_string());
                }
            }
        }

        Ok(runs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{RunPhase, RunState};

    #[tokio::test]
    async fn memory_store_round_trip() {
        let store = MemoryCheckpointStore::new();
        let state = RunState::new("run-1".to_string(), "topic", 2);
        let checkpoint = Checkpoint::new(1, RunPhase::AwaitingAnalysts.step_name(), state);

        store.save("run-1", &checkpoint).await.unwrap();
        let loaded = store.load("run-1").await.unwrap();
        assert_eq!(loaded.version, 1);
        assert_eq!(loaded.state.topic, "topic");

        let runs: Vec<String> = store.list_runs().await.unwrap();
        assert_eq!(runs, vec!["run-1".to_string()]);

        store.delete("run-1").await.unwrap();
        assert!(store.load("run-1").await.is_err());
    }

    #[tokio::test]
    async fn file_store_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileCheckpointStore::new(dir.path()).unwrap();

        let state = RunState::new("run-2".to_string(), "durable topic", 3);
        let checkpoint = Checkpoint::new(7, RunPhase::Interviewing.step_name(), state);
        CheckpointStore::<RunState>::save(&store, "run-2", &checkpoint)
            .await
            .unwrap();

        let loaded: Checkpoint<RunState> = store.load("run-2").await.unwrap();
        assert_eq!(loaded.version, 7);
        assert_eq!(loaded.step, "conduct_interviews");
        assert_eq!(loaded.state.analyst_count, 3);

        // No temp file left behind after the rename commit.
        let leftovers: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.path().extension().and_then(|s| s.to_str()) == Some("tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[tokio::test]
    async fn unknown_run_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileCheckpointStore::new(dir.path()).unwrap();

        let result: RoundtableResult<Checkpoint<RunState>> = store.load("missing").await;
        assert!(matches!(
            result,
            Err(RoundtableError::NotFound { .. })
        ));
    }
}
