//! Structured observability hooks for the proctoring lifecycle.
//!
//! This module provides:
//! - session-scoped tracing spans via [`session_span`] / [`SessionSpan`]
//! - emission functions for the lifecycle: start, violation, verdict,
//!   completion, acquisition failure, persistence failure, evaluation fault
//!
//! Events carry an `event = "..."` field so log pipelines can filter on it.
//! For JSON output, start the binary with `--json`.

use tracing::{error, info, warn};
use uuid::Uuid;

use crate::domain::{Severity, Signal, ViolationKind};

/// Build (but do not enter) the span used for everything a session does.
///
/// Attach it to async work with `tracing::Instrument::instrument`.
pub fn session_span(session_id: Uuid, flow: &str) -> tracing::Span {
    tracing::info_span!("proctor.session", session_id = %session_id, flow = %flow)
}

/// RAII guard that enters a session-scoped span for synchronous work.
///
/// ```ignore
/// let _span = SessionSpan::enter(session_id, "interview");
/// // tracing calls here carry session_id
/// ```
pub struct SessionSpan {
    _span: tracing::span::EnteredSpan,
}

impl SessionSpan {
    pub fn enter(session_id: Uuid, flow: &str) -> Self {
        Self {
            _span: session_span(session_id, flow).entered(),
        }
    }
}

/// Emit event: monitoring started.
pub fn emit_session_started(session_id: Uuid, policy: &str, duration_secs: u64) {
    info!(
        event = "session.started",
        session_id = %session_id,
        policy = %policy,
        duration_secs = duration_secs,
    );
}

/// Emit event: a violation was appended to the log.
pub fn emit_violation_recorded(kind: ViolationKind, severity: Severity, seq: usize) {
    match severity {
        Severity::Info => {
            tracing::debug!(
                event = "violation.recorded",
                kind = %kind,
                severity = %severity,
                seq = seq,
            )
        }
        _ => info!(event = "violation.recorded", kind = %kind, severity = %severity, seq = seq),
    }
}

/// Emit event: the engine returned terminate.
pub fn emit_session_terminated(session_id: Uuid, rule: &str, reason: &str, violations: usize) {
    warn!(
        event = "session.terminated",
        session_id = %session_id,
        rule = %rule,
        reason = %reason,
        violations = violations,
    );
}

/// Emit event: session completed and scored.
pub fn emit_session_completed(session_id: Uuid, raw_score: u32, max_score: u32, violations: usize) {
    info!(
        event = "session.completed",
        session_id = %session_id,
        raw_score = raw_score,
        max_score = max_score,
        violations = violations,
    );
}

/// Emit event: the signal source could not be acquired (warning level).
pub fn emit_acquisition_failed(session_id: Uuid, error: &dyn std::fmt::Display) {
    warn!(event = "session.acquisition_failed", session_id = %session_id, error = %error);
}

/// Emit event: writing the outcome record failed (warning level).
pub fn emit_persist_failed(session_id: Uuid, attempt: u32, error: &dyn std::fmt::Display) {
    warn!(
        event = "outcome.persist_failed",
        session_id = %session_id,
        attempt = attempt,
        error = %error,
    );
}

/// Emit event: outcome record written.
pub fn emit_outcome_persisted(session_id: Uuid, final_state: &str) {
    info!(event = "outcome.persisted", session_id = %session_id, final_state = %final_state);
}

/// Emit event: classification or evaluation panicked and the session is
/// being terminated fail-safe. Operators should treat these as engine bugs.
pub fn emit_evaluation_fault(policy: &str, tick: u64, signal: &Signal, detail: &str) {
    error!(
        event = "policy.evaluation_fault",
        policy = %policy,
        tick = tick,
        face_count = signal.face_count,
        face_visibility = %signal.face_visibility,
        gaze = %signal.gaze,
        detail = %detail,
    );
}
