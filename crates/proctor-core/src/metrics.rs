//! Process-wide proctoring counters.
//!
//! Call sites bump counters without logging anything above `trace`.
//! [`Metrics::flush`] reports a [`MetricsSnapshot`] as one `info!` event;
//! the session monitor calls it when an outcome is finalised.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

use crate::domain::Severity;

pub static METRICS: Metrics = Metrics::new();

pub struct Metrics {
    ticks_evaluated: AtomicU64,
    info_violations: AtomicU64,
    warning_violations: AtomicU64,
    critical_violations: AtomicU64,
    sessions_terminated: AtomicU64,
    sessions_completed: AtomicU64,
    persist_retries: AtomicU64,
}

/// Point-in-time copy of every counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct MetricsSnapshot {
    pub ticks_evaluated: u64,
    pub info_violations: u64,
    pub warning_violations: u64,
    pub critical_violations: u64,
    pub sessions_terminated: u64,
    pub sessions_completed: u64,
    pub persist_retries: u64,
}

impl MetricsSnapshot {
    pub fn violations(&self) -> u64 {
        self.info_violations + self.warning_violations + self.critical_violations
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

fn bump(counter: &AtomicU64, name: &'static str) {
    counter.fetch_add(1, Ordering::Relaxed);
    tracing::trace!(metric = name, "counter incremented");
}

impl Metrics {
    pub const fn new() -> Self {
        Self {
            ticks_evaluated: AtomicU64::new(0),
            info_violations: AtomicU64::new(0),
            warning_violations: AtomicU64::new(0),
            critical_violations: AtomicU64::new(0),
            sessions_terminated: AtomicU64::new(0),
            sessions_completed: AtomicU64::new(0),
            persist_retries: AtomicU64::new(0),
        }
    }

    pub fn inc_ticks_evaluated(&self) {
        bump(&self.ticks_evaluated, "ticks_evaluated");
    }

    /// Count one classified event in its severity bucket.
    pub fn record_violation(&self, severity: Severity) {
        match severity {
            Severity::Info => bump(&self.info_violations, "info_violations"),
            Severity::Warning => bump(&self.warning_violations, "warning_violations"),
            Severity::Critical => bump(&self.critical_violations, "critical_violations"),
        }
    }

    pub fn inc_sessions_terminated(&self) {
        bump(&self.sessions_terminated, "sessions_terminated");
    }

    pub fn inc_sessions_completed(&self) {
        bump(&self.sessions_completed, "sessions_completed");
    }

    pub fn inc_persist_retries(&self) {
        bump(&self.persist_retries, "persist_retries");
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            ticks_evaluated: self.ticks_evaluated.load(Ordering::Relaxed),
            info_violations: self.info_violations.load(Ordering::Relaxed),
            warning_violations: self.warning_violations.load(Ordering::Relaxed),
            critical_violations: self.critical_violations.load(Ordering::Relaxed),
            sessions_terminated: self.sessions_terminated.load(Ordering::Relaxed),
            sessions_completed: self.sessions_completed.load(Ordering::Relaxed),
            persist_retries: self.persist_retries.load(Ordering::Relaxed),
        }
    }

    pub fn flush(&self) {
        let s = self.snapshot();
        tracing::info!(
            metric = "flush",
            ticks_evaluated = s.ticks_evaluated,
            violations = s.violations(),
            critical_violations = s.critical_violations,
            sessions_terminated = s.sessions_terminated,
            sessions_completed = s.sessions_completed,
            persist_retries = s.persist_retries,
        );
    }

    pub fn ticks_evaluated(&self) -> u64 {
        self.ticks_evaluated.load(Ordering::Relaxed)
    }

    pub fn violations_recorded(&self) -> u64 {
        self.snapshot().violations()
    }

    pub fn sessions_terminated(&self) -> u64 {
        self.sessions_terminated.load(Ordering::Relaxed)
    }

    pub fn sessions_completed(&self) -> u64 {
        self.sessions_completed.load(Ordering::Relaxed)
    }

    pub fn persist_retries(&self) -> u64 {
        self.persist_retries.load(Ordering::Relaxed)
    }
}
