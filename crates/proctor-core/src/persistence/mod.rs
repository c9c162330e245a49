//! Outcome persistence: a one-shot write of each finished session.
//!
//! - [`OutcomeRecord`]: final state, reason, violations, score, digest
//! - [`OutcomeStore`] : async, backend-agnostic trait
//! - [`memory`]       : `MemoryOutcomeStore` (tests, embedding)
//! - [`fs`]           : `FsOutcomeStore` (one JSON file per session)
//! - [`persist_outcome`]: retry with exponential backoff
//!
//! A failed write never reaches back into the session: terminal state is
//! decided before anything is persisted.

pub mod error;
pub mod fs;
pub mod memory;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::domain::ViolationRecord;
use crate::metrics::METRICS;
use crate::obs;
use crate::scoring::ScoreCard;

pub use error::{StorageError, StorageResult};
pub use fs::FsOutcomeStore;
pub use memory::MemoryOutcomeStore;

/// Which flow produced the outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionFlow {
    Interview,
    Enrollment,
}

impl std::fmt::Display for SessionFlow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionFlow::Interview => write!(f, "interview"),
            SessionFlow::Enrollment => write!(f, "enrollment"),
        }
    }
}

/// Summary of a finished session, written once at finalization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutcomeRecord {
    pub session_id: Uuid,
    pub flow: SessionFlow,
    /// `"terminated"`, `"completed"` or `"failed"`/`"complete"` for enrollment.
    pub final_state: String,
    pub reason: Option<String>,
    pub violations: Vec<ViolationRecord>,
    pub score: Option<ScoreCard>,
    pub biometric_id: Option<String>,
    pub finalized_at: DateTime<Utc>,
    /// SHA-256 over the serialized violation list, for tamper evidence.
    pub violations_digest: String,
}

impl OutcomeRecord {
    pub fn new(
        session_id: Uuid,
        flow: SessionFlow,
        final_state: impl Into<String>,
        reason: Option<String>,
        violations: Vec<ViolationRecord>,
        finalized_at: DateTime<Utc>,
    ) -> Self {
        let violations_digest = digest_violations(&violations);
        Self {
            session_id,
            flow,
            final_state: final_state.into(),
            reason,
            violations,
            score: None,
            biometric_id: None,
            finalized_at,
            violations_digest,
        }
    }

    pub fn with_score(mut self, score: ScoreCard) -> Self {
        self.score = Some(score);
        self
    }

    pub fn with_biometric_id(mut self, biometric_id: impl Into<String>) -> Self {
        self.biometric_id = Some(biometric_id.into());
        self
    }

    /// True when the violation list still matches its digest.
    pub fn verify_integrity(&self) -> bool {
        self.violations_digest == digest_violations(&self.violations)
    }
}

fn digest_violations(violations: &[ViolationRecord]) -> String {
    let bytes = serde_json::to_vec(violations).unwrap_or_default();
    hex::encode(Sha256::digest(&bytes))
}

/// Destination for finished-session outcomes.
#[async_trait]
pub trait OutcomeStore: Send + Sync {
    /// Persist a record. Writing the same session twice replaces it.
    async fn write(&self, record: &OutcomeRecord) -> StorageResult<()>;

    /// Load a record by session id.
    async fn read(&self, session_id: Uuid) -> StorageResult<OutcomeRecord>;
}

/// Retry schedule for [`persist_outcome`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Retries after the first attempt (0 = try once).
    pub max_retries: u32,
    /// Base delay, doubled after each failed attempt (milliseconds).
    pub backoff_base_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            backoff_base_ms: 250,
        }
    }
}

impl RetryPolicy {
    /// Delay before the retry that follows failed attempt `attempt` (1-based):
    /// `backoff_base_ms * 2^(attempt-1)`, saturating.
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let factor = 2u64.saturating_pow(attempt.saturating_sub(1));
        Duration::from_millis(self.backoff_base_ms.saturating_mul(factor))
    }
}

/// Write `record` to `store`, retrying with exponential backoff.
///
/// Returns the last error once all attempts are exhausted. Callers log it
/// and move on; the session it describes is already terminal.
pub async fn persist_outcome(
    store: &Arc<dyn OutcomeStore>,
    record: &OutcomeRecord,
    retry: &RetryPolicy,
) -> StorageResult<()> {
    let max_attempts = retry.max_retries + 1;
    let mut attempt = 1;
    loop {
        match store.write(record).await {
            Ok(()) => {
                obs::emit_outcome_persisted(record.session_id, &record.final_state);
                return Ok(());
            }
            Err(err) => {
                obs::emit_persist_failed(record.session_id, attempt, &err);
                if attempt >= max_attempts {
                    return Err(err);
                }
                let delay = retry.delay_after(attempt);
                METRICS.inc_persist_retries();
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}
