//! Biometric enrollment: a progress-driven capture under the enrollment policy.
//!
//! Every sampled frame is evaluated by the policy engine and, if the engine
//! lets the capture continue, advances progress by `progress_step` percent.
//! Reaching 100 completes enrollment with a biometric identifier; a
//! terminate verdict fails it as a security breach.

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::Instrument;
use uuid::Uuid;

use crate::config::ProctorConfig;
use crate::domain::{PolicyError, ProctorError, Result, Signal, ViolationLog};
use crate::metrics::METRICS;
use crate::obs;
use crate::persistence::{persist_outcome, OutcomeRecord, OutcomeStore, SessionFlow};
use crate::policy::{
    EngineVerdict, PolicyEngine, PolicySet, RuleId, FEED_LOST_REASON, FEED_LOST_RULE,
};
use crate::source::{SignalFeed, SignalSource};

/// Where an enrollment stands after a sample.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum EnrollmentStatus {
    Capturing { progress: u8 },
    Complete { biometric_id: String },
    Failed { reason: String },
}

impl EnrollmentStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, EnrollmentStatus::Capturing { .. })
    }

    fn label(&self) -> &'static str {
        match self {
            EnrollmentStatus::Capturing { .. } => "capturing",
            EnrollmentStatus::Complete { .. } => "complete",
            EnrollmentStatus::Failed { .. } => "failed",
        }
    }
}

#[derive(Debug)]
pub struct EnrollmentSession {
    id: Uuid,
    subject: String,
    engine: PolicyEngine,
    progress_step: u8,
    progress: u8,
    status: EnrollmentStatus,
    epoch: Option<Instant>,
}

impl EnrollmentSession {
    /// Enrollment for `subject` using the configured policy and step.
    pub fn new(subject: impl Into<String>, config: &ProctorConfig) -> Result<Self> {
        Ok(Self::with_policy(
            subject,
            config.enrollment_policy()?,
            config.enrollment.progress_step,
        )?)
    }

    pub fn with_policy(
        subject: impl Into<String>,
        policy: PolicySet,
        progress_step: u8,
    ) -> std::result::Result<Self, PolicyError> {
        Ok(Self {
            id: Uuid::new_v4(),
            subject: subject.into(),
            engine: PolicyEngine::new(policy)?,
            progress_step: progress_step.clamp(1, 100),
            progress: 0,
            status: EnrollmentStatus::Capturing { progress: 0 },
            epoch: None,
        })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }

    pub fn progress(&self) -> u8 {
        self.progress
    }

    pub fn status(&self) -> &EnrollmentStatus {
        &self.status
    }

    pub fn log(&self) -> &ViolationLog {
        self.engine.log()
    }

    /// Feed one captured frame. Once terminal, the status no longer changes.
    pub fn on_sample(&mut self, signal: &Signal, now: Instant) -> EnrollmentStatus {
        if self.status.is_terminal() {
            return self.status.clone();
        }
        self.epoch.get_or_insert(now);

        let verdict = self.engine.evaluate(signal, now);
        if verdict.is_terminate() {
            return self.fail(verdict);
        }

        self.progress = self.progress.saturating_add(self.progress_step).min(100);
        self.status = if self.progress == 100 {
            let biometric_id = format!("bio_{}_{}", self.subject, Utc::now().timestamp_millis());
            tracing::info!(
                event = "enrollment.complete",
                enrollment_id = %self.id,
                biometric_id = %biometric_id,
                violations = self.engine.log().len(),
            );
            METRICS.inc_sessions_completed();
            EnrollmentStatus::Complete { biometric_id }
        } else {
            EnrollmentStatus::Capturing {
                progress: self.progress,
            }
        };
        self.status.clone()
    }

    /// The capture device went away. Enrollment fails unless already terminal.
    pub fn feed_lost(&mut self) -> EnrollmentStatus {
        if self.status.is_terminal() {
            return self.status.clone();
        }
        let verdict = self
            .engine
            .halt(RuleId::new(FEED_LOST_RULE), FEED_LOST_REASON);
        self.fail(verdict)
    }

    fn fail(&mut self, verdict: EngineVerdict) -> EnrollmentStatus {
        let reason = verdict
            .reason
            .unwrap_or_else(|| "security breach".to_string());
        tracing::warn!(
            event = "enrollment.failed",
            enrollment_id = %self.id,
            reason = %reason,
            violations = self.engine.log().len(),
        );
        METRICS.inc_sessions_terminated();
        self.status = EnrollmentStatus::Failed { reason };
        self.status.clone()
    }

    /// Outcome record for the current status.
    pub fn outcome(&self) -> OutcomeRecord {
        let violations = match self.epoch {
            Some(epoch) => self.engine.log().to_records(epoch),
            None => Vec::new(),
        };
        let reason = match &self.status {
            EnrollmentStatus::Failed { reason } => Some(reason.clone()),
            _ => None,
        };
        let record = OutcomeRecord::new(
            self.id,
            SessionFlow::Enrollment,
            self.status.label(),
            reason,
            violations,
            Utc::now(),
        );
        match &self.status {
            EnrollmentStatus::Complete { biometric_id } => record.with_biometric_id(biometric_id),
            _ => record,
        }
    }
}

/// Acquire `source` and capture until enrollment completes or fails, then
/// persist the outcome.
///
/// Samples are taken at `timing.sample_interval_ms`. Between new frames the
/// latest one is reused; before the first frame nothing is captured, so a
/// source that never produces runs until the caller's timeout.
pub async fn run_enrollment<S: SignalSource>(
    source: &mut S,
    subject: &str,
    config: &ProctorConfig,
    store: Arc<dyn OutcomeStore>,
) -> Result<EnrollmentStatus> {
    let mut enrollment = EnrollmentSession::new(subject, config)?;
    let span = obs::session_span(enrollment.id(), "enrollment");

    async move {
        let mut feed = match source.acquire().await {
            Ok(feed) => feed,
            Err(err) => {
                obs::emit_acquisition_failed(enrollment.id(), &err);
                return Err(ProctorError::from(err));
            }
        };
        tracing::info!(event = "enrollment.started", subject = %enrollment.subject());

        let mut ticker = tokio::time::interval(config.timing.sample_interval());
        let mut latest: Option<Signal> = None;
        let status = loop {
            ticker.tick().await;
            match feed.next_signal() {
                Ok(Some(signal)) => latest = Some(signal),
                Ok(None) => {}
                Err(_) => break enrollment.feed_lost(),
            }
            let Some(signal) = latest else {
                continue;
            };
            let status = enrollment.on_sample(&signal, tokio::time::Instant::now().into_std());
            if status.is_terminal() {
                break status;
            }
        };

        let record = enrollment.outcome();
        if let Err(err) = persist_outcome(&store, &record, &config.persistence.retry).await {
            tracing::error!(
                event = "outcome.persist_abandoned",
                session_id = %record.session_id,
                error = %err,
            );
        }
        Ok(status)
    }
    .instrument(span)
    .await
}
