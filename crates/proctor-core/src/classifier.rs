//! Violation classifier.
//!
//! Maps one [`Signal`] to the ordered list of [`ViolationEvent`]s it implies.
//! Stateless and deterministic: it never decides disqualification, it only
//! tags what it sees. Severities here are what the policy presets rely on.

use std::time::Instant;

use crate::domain::{FaceVisibility, GazeClass, Severity, Signal, ViolationEvent, ViolationKind};

/// Classify a signal, stamping every event with `at`.
///
/// | Condition                     | Kind               | Severity |
/// |-------------------------------|--------------------|----------|
/// | `face_count > 1`              | `multiple_faces`   | critical |
/// | `face_count == 0`             | `face_absent`      | warning  |
/// | visibility `not_visible`      | `face_not_visible` | warning  |
/// | visibility `partial`          | `partial_face`     | info     |
/// | gaze `alert`                  | `gaze_alert`       | warning  |
/// | gaze `warning`                | `gaze_warning`     | info     |
///
/// Visibility is only classified when a face is in frame.
pub fn classify(signal: &Signal, at: Instant) -> Vec<ViolationEvent> {
    let mut events = Vec::new();
    let mut push = |kind, severity| events.push(ViolationEvent::new(kind, severity, at));

    match signal.face_count {
        0 => push(ViolationKind::FaceAbsent, Severity::Warning),
        1 => {}
        _ => push(ViolationKind::MultipleFaces, Severity::Critical),
    }

    if signal.face_count > 0 {
        match signal.face_visibility {
            FaceVisibility::NotVisible => push(ViolationKind::FaceNotVisible, Severity::Warning),
            FaceVisibility::Partial => push(ViolationKind::PartialFace, Severity::Info),
            FaceVisibility::Complete => {}
        }
    }

    match signal.gaze {
        GazeClass::Alert => push(ViolationKind::GazeAlert, Severity::Warning),
        GazeClass::Warning => push(ViolationKind::GazeWarning, Severity::Info),
        GazeClass::Good => {}
    }

    events
}
