use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tempfile::NamedTempFile;
use uuid::Uuid;

use super::{OutcomeRecord, OutcomeStore, StorageError, StorageResult};

/// Filesystem-backed outcome store.
///
/// Layout: `<root>/outcomes/<session_id>.json`, written atomically through a
/// temp file in the same directory.
#[derive(Debug, Clone)]
pub struct FsOutcomeStore {
    outcomes_dir: PathBuf,
}

impl FsOutcomeStore {
    /// Create a store rooted at `root`. Creates `root/outcomes/` if needed.
    pub fn new(root: impl AsRef<Path>) -> StorageResult<Self> {
        let outcomes_dir = root.as_ref().join("outcomes");
        fs::create_dir_all(&outcomes_dir)?;
        Ok(Self { outcomes_dir })
    }

    pub fn record_path(&self, session_id: Uuid) -> PathBuf {
        self.outcomes_dir.join(format!("{session_id}.json"))
    }
}

#[async_trait]
impl OutcomeStore for FsOutcomeStore {
    async fn write(&self, record: &OutcomeRecord) -> StorageResult<()> {
        let json = serde_json::to_vec_pretty(record)?;
        let path = self.record_path(record.session_id);
        let dir = self.outcomes_dir.clone();
        tokio::task::spawn_blocking(move || -> StorageResult<()> {
            let mut tmp = NamedTempFile::new_in(&dir)?;
            tmp.write_all(&json)?;
            tmp.persist(&path).map_err(|e| e.error)?;
            Ok(())
        })
        .await
        .map_err(|e| StorageError::Rejected(format!("write task failed: {e}")))?
    }

    async fn read(&self, session_id: Uuid) -> StorageResult<OutcomeRecord> {
        let path = self.record_path(session_id);
        let bytes = tokio::fs::read(&path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                StorageError::NotFound(session_id)
            } else {
                StorageError::Io(e)
            }
        })?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}
