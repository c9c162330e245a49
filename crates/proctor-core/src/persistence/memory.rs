//! In-memory outcome store.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use uuid::Uuid;

use super::{OutcomeRecord, OutcomeStore, StorageError, StorageResult};

/// Outcome store backed by a `HashMap<session_id, record>`.
///
/// `failing_writes(n)` makes the first `n` writes fail, which is how tests
/// exercise the retry path.
#[derive(Debug, Default)]
pub struct MemoryOutcomeStore {
    records: Mutex<HashMap<Uuid, OutcomeRecord>>,
    fail_next: AtomicU32,
    attempts: AtomicU32,
}

impl MemoryOutcomeStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_writes(count: u32) -> Self {
        let store = Self::default();
        store.fail_next.store(count, Ordering::SeqCst);
        store
    }

    /// Number of write attempts, successful or not.
    pub fn attempts(&self) -> u32 {
        self.attempts.load(Ordering::SeqCst)
    }

    pub fn len(&self) -> usize {
        self.records.lock().map(|r| r.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl OutcomeStore for MemoryOutcomeStore {
    async fn write(&self, record: &OutcomeRecord) -> StorageResult<()> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        let should_fail = self
            .fail_next
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if should_fail {
            return Err(StorageError::Rejected("simulated outage".into()));
        }
        let mut records = self
            .records
            .lock()
            .map_err(|_| StorageError::Rejected("store lock poisoned".into()))?;
        records.insert(record.session_id, record.clone());
        Ok(())
    }

    async fn read(&self, session_id: Uuid) -> StorageResult<OutcomeRecord> {
        let records = self
            .records
            .lock()
            .map_err(|_| StorageError::Rejected("store lock poisoned".into()))?;
        records
            .get(&session_id)
            .cloned()
            .ok_or(StorageError::NotFound(session_id))
    }
}
