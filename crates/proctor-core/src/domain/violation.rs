//! Violation events and the append-only log that records them.

use std::time::Instant;

use serde::{Deserialize, Serialize};

/// What was observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViolationKind {
    MultipleFaces,
    FaceAbsent,
    FaceNotVisible,
    PartialFace,
    GazeWarning,
    GazeAlert,
}

impl std::fmt::Display for ViolationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ViolationKind::MultipleFaces => write!(f, "multiple_faces"),
            ViolationKind::FaceAbsent => write!(f, "face_absent"),
            ViolationKind::FaceNotVisible => write!(f, "face_not_visible"),
            ViolationKind::PartialFace => write!(f, "partial_face"),
            ViolationKind::GazeWarning => write!(f, "gaze_warning"),
            ViolationKind::GazeAlert => write!(f, "gaze_alert"),
        }
    }
}

/// How serious an event is. Ordered: `Info < Warning < Critical`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Info,
    Warning,
    Critical,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Info => write!(f, "info"),
            Severity::Warning => write!(f, "warning"),
            Severity::Critical => write!(f, "critical"),
        }
    }
}

/// A classified, severity-tagged occurrence derived from one signal.
///
/// `at` is a monotonic instant; wall-clock adjustments never move it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ViolationEvent {
    pub kind: ViolationKind,
    pub severity: Severity,
    pub at: Instant,
}

impl ViolationEvent {
    pub fn new(kind: ViolationKind, severity: Severity, at: Instant) -> Self {
        Self { kind, severity, at }
    }
}

/// Serializable form of a [`ViolationEvent`], with the instant expressed as
/// milliseconds since the session epoch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViolationRecord {
    pub kind: ViolationKind,
    pub severity: Severity,
    pub offset_ms: u64,
}

impl ViolationRecord {
    pub fn from_event(event: &ViolationEvent, epoch: Instant) -> Self {
        Self {
            kind: event.kind,
            severity: event.severity,
            offset_ms: event.at.saturating_duration_since(epoch).as_millis() as u64,
        }
    }
}

/// Ordered, append-only record of every violation in a session.
///
/// Only the policy engine holds a mutable reference; everyone else reads.
#[derive(Debug, Clone, Default)]
pub struct ViolationLog {
    events: Vec<ViolationEvent>,
}

impl ViolationLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn append(&mut self, event: ViolationEvent) {
        self.events.push(event);
    }

    pub fn events(&self) -> &[ViolationEvent] {
        &self.events
    }

    pub fn iter(&self) -> impl Iterator<Item = &ViolationEvent> {
        self.events.iter()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Number of events at or above `severity`.
    pub fn count_at_least(&self, severity: Severity) -> usize {
        self.events.iter().filter(|e| e.severity >= severity).count()
    }

    /// Export the log relative to `epoch`.
    pub fn to_records(&self, epoch: Instant) -> Vec<ViolationRecord> {
        self.events
            .iter()
            .map(|e| ViolationRecord::from_event(e, epoch))
            .collect()
    }
}
