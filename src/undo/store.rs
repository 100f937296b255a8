//! Durable, append-only log of undoable actions.
//!
//! One JSON file per snapshot under the application data directory, named by
//! the snapshot id. The in-memory index is updated only after the disk write
//! succeeds; all mutation is serialized through one async owner.

use chrono::Utc;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;

use super::snapshot::{DEFAULT_TTL_DAYS, OperationSnapshot};
use crate::error::{Result, UndoError};

/// Outcome of one restore attempt.
#[derive(Debug)]
pub enum UndoOutcome {
    Restored { message: String },
    Failed { error: UndoError },
    Expired,
    NotFound,
}

impl UndoOutcome {
    /// Collapse into a `Result` for callers that want the typed error
    /// taxonomy instead of the four-way outcome.
    pub fn into_result(self, id: &str) -> std::result::Result<String, UndoError> {
        match self {
            Self::Restored { message } => Ok(message),
            Self::Failed { error } => Err(error),
            Self::Expired => Err(UndoError::SnapshotExpired { id: id.to_string() }),
            Self::NotFound => Err(UndoError::SnapshotNotFound { id: id.to_string() }),
        }
    }
}

pub struct ReversibleOperationStore {
    dir: PathBuf,
    ttl: chrono::Duration,
    index: Mutex<HashMap<String, OperationSnapshot>>,
}

impl ReversibleOperationStore {
    /// Open the store, creating the directory if needed, and load every
    /// persisted snapshot. Unreadable entries are skipped with a warning.
    pub async fn open(dir: &Path, ttl_days: i64) -> Result<Self> {
        tokio::fs::create_dir_all(dir)
            .await
            .map_err(|e| UndoError::WriteFailed {
                path: dir.to_string_lossy().to_string(),
                message: e.to_string(),
            })?;

        let mut index = HashMap::new();
        let mut entries = tokio::fs::read_dir(dir)
            .await
            .map_err(|e| UndoError::ReadFailed {
                path: dir.to_string_lossy().to_string(),
                message: e.to_string(),
            })?;

        loop {
            let entry = match entries.next_entry().await {
                Ok(Some(entry)) => entry,
                Ok(None) => break,
                Err(error) => {
                    tracing::warn!(%error, "failed to iterate snapshot directory");
                    break;
                }
            };
            let path = entry.path();
            let is_file = entry.file_type().await.map(|t| t.is_file()).unwrap_or(false);
            if !is_file {
                continue;
            }
            match tokio::fs::read_to_string(&path).await {
                Ok(content) => match serde_json::from_str::<OperationSnapshot>(&content) {
                    Ok(snapshot) => {
                        index.insert(snapshot.id.clone(), snapshot);
                    }
                    Err(error) => {
                        tracing::warn!(
                            path = %path.display(),
                            %error,
                            "skipping undecodable snapshot"
                        );
                    }
                },
                Err(error) => {
                    tracing::warn!(path = %path.display(), %error, "skipping unreadable snapshot");
                }
            }
        }

        tracing::info!(dir = %dir.display(), loaded = index.len(), "snapshot store open");
        Ok(Self {
            dir: dir.to_path_buf(),
            ttl: chrono::Duration::days(if ttl_days > 0 { ttl_days } else { DEFAULT_TTL_DAYS }),
            index: Mutex::new(index),
        })
    }

    /// Persist a new snapshot and return its id. The index is only touched
    /// after the file is safely on disk.
    pub async fn create(
        &self,
        task_id: &str,
        pattern_id: &str,
        file_path: Option<PathBuf>,
        original_content: String,
        modified_content: String,
        description: &str,
    ) -> Result<String> {
        let snapshot = OperationSnapshot::new(
            task_id,
            pattern_id,
            file_path,
            original_content,
            modified_content,
            description,
        );

        let disk_path = self.disk_path(&snapshot.id);
        let serialized = serde_json::to_string_pretty(&snapshot)
            .map_err(|e| UndoError::WriteFailed {
                path: disk_path.to_string_lossy().to_string(),
                message: e.to_string(),
            })?;
        tokio::fs::write(&disk_path, serialized)
            .await
            .map_err(|e| UndoError::WriteFailed {
                path: disk_path.to_string_lossy().to_string(),
                message: e.to_string(),
            })?;

        let id = snapshot.id.clone();
        self.index.lock().await.insert(id.clone(), snapshot);
        tracing::info!(%id, "snapshot recorded");
        Ok(id)
    }

    /// Restore a snapshot. Expired snapshots are left untouched on disk; a
    /// restore write failure keeps the snapshot so the operator can retry.
    pub async fn undo(&self, id: &str) -> UndoOutcome {
        let mut index = self.index.lock().await;

        let Some(snapshot) = index.get(id) else {
            return UndoOutcome::NotFound;
        };

        if snapshot.is_expired(Utc::now(), self.ttl) {
            return UndoOutcome::Expired;
        }

        if let Some(target) = &snapshot.file_path {
            if let Some(parent) = target.parent()
                && !parent.as_os_str().is_empty()
                && !parent.exists()
            {
                return UndoOutcome::Failed {
                    error: UndoError::FileNotFound {
                        path: parent.to_string_lossy().to_string(),
                    },
                };
            }
            if let Err(error) = tokio::fs::write(target, &snapshot.original_content).await {
                // Snapshot stays intact for a retry.
                return UndoOutcome::Failed {
                    error: UndoError::WriteFailed {
                        path: target.to_string_lossy().to_string(),
                        message: error.to_string(),
                    },
                };
            }
        }

        let message = match &snapshot.file_path {
            Some(path) => format!(
                "restored {} ({} bytes)",
                path.display(),
                snapshot.original_content.len()
            ),
            None => format!("snapshot {id} discarded"),
        };

        index.remove(id);
        let disk_path = self.disk_path(id);
        if let Err(error) = tokio::fs::remove_file(&disk_path).await {
            tracing::warn!(path = %disk_path.display(), %error, "failed to delete restored snapshot file");
        }
        tracing::info!(%id, "snapshot restored");
        UndoOutcome::Restored { message }
    }

    /// Sweep expired snapshots from memory and disk. Individual delete
    /// failures are logged and do not abort the sweep.
    pub async fn cleanup_expired(&self) -> usize {
        let mut index = self.index.lock().await;
        let now = Utc::now();
        let expired: Vec<String> = index
            .values()
            .filter(|s| s.is_expired(now, self.ttl))
            .map(|s| s.id.clone())
            .collect();

        let mut swept = 0;
        for id in expired {
            let disk_path = self.disk_path(&id);
            if let Err(error) = tokio::fs::remove_file(&disk_path).await {
                tracing::warn!(path = %disk_path.display(), %error, "failed to delete expired snapshot");
            }
            index.remove(&id);
            swept += 1;
        }

        if swept > 0 {
            tracing::info!(swept, "expired snapshots cleaned up");
        }
        swept
    }

    /// All snapshots, newest first. Never mutates state.
    pub async fn list(&self) -> Vec<OperationSnapshot> {
        let index = self.index.lock().await;
        let mut snapshots: Vec<OperationSnapshot> = index.values().cloned().collect();
        snapshots.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        snapshots
    }

    pub async fn get(&self, id: &str) -> Option<OperationSnapshot> {
        self.index.lock().await.get(id).cloned()
    }

    fn disk_path(&self, id: &str) -> PathBuf {
        self.dir.join(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn store(tmp: &TempDir) -> ReversibleOperationStore {
        ReversibleOperationStore::open(&tmp.path().join("undo"), DEFAULT_TTL_DAYS)
            .await
            .expect("open store")
    }

    #[tokio::test]
    async fn create_persists_one_file_named_by_id() {
        let tmp = TempDir::new().expect("tempdir");
        let store = store(&tmp).await;
        let id = store
            .create("task-1", "translate", None, "a".into(), "b".into(), "test")
            .await
            .expect("create");
        assert!(tmp.path().join("undo").join(&id).is_file());
    }

    #[tokio::test]
    async fn undo_unknown_id_is_not_found() {
        let tmp = TempDir::new().expect("tempdir");
        let store = store(&tmp).await;
        assert!(matches!(store.undo("ghost").await, UndoOutcome::NotFound));
        assert!(matches!(
            store.undo("ghost").await.into_result("ghost"),
            Err(UndoError::SnapshotNotFound { .. })
        ));
    }

    #[tokio::test]
    async fn list_is_newest_first() {
        let tmp = TempDir::new().expect("tempdir");
        let store = store(&tmp).await;
        let first = store
            .create("t", "p", None, String::new(), String::new(), "first")
            .await
            .unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        let second = store
            .create("t", "p", None, String::new(), String::new(), "second")
            .await
            .unwrap();

        let listed = store.list().await;
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].id, second);
        assert_eq!(listed[1].id, first);
    }

    #[tokio::test]
    async fn restore_failure_keeps_snapshot_for_retry() {
        let tmp = TempDir::new().expect("tempdir");
        let store = store(&tmp).await;
        let missing_dir_target = tmp.path().join("no-such-dir").join("doc.txt");
        let id = store
            .create(
                "task-1",
                "translate",
                Some(missing_dir_target),
                "original".into(),
                "modified".into(),
                "doomed restore",
            )
            .await
            .unwrap();

        let outcome = store.undo(&id).await;
        assert!(matches!(outcome, UndoOutcome::Failed { .. }));
        // Still present in memory and on disk.
        assert!(store.get(&id).await.is_some());
        assert!(tmp.path().join("undo").join(&id).is_file());
    }

    #[tokio::test]
    async fn survives_reopen() {
        let tmp = TempDir::new().expect("tempdir");
        let dir = tmp.path().join("undo");
        let id = {
            let store = ReversibleOperationStore::open(&dir, DEFAULT_TTL_DAYS)
                .await
                .unwrap();
            store
                .create("t", "p", None, "x".into(), "y".into(), "persisted")
                .await
                .unwrap()
        };

        let reopened = ReversibleOperationStore::open(&dir, DEFAULT_TTL_DAYS)
            .await
            .unwrap();
        let snapshot = reopened.get(&id).await.expect("loaded at startup");
        assert_eq!(snapshot.description, "persisted");
    }

    #[tokio::test]
    async fn undecodable_files_are_skipped_on_load() {
        let tmp = TempDir::new().expect("tempdir");
        let dir = tmp.path().join("undo");
        tokio::fs::create_dir_all(&dir).await.unwrap();
        tokio::fs::write(dir.join("garbage"), "not a snapshot")
            .await
            .unwrap();

        let store = ReversibleOperationStore::open(&dir, DEFAULT_TTL_DAYS)
            .await
            .unwrap();
        assert!(store.list().await.is_empty());
    }
}
