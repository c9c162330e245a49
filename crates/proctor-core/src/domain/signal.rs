//! Signals: one sampled observation of the subject in front of the camera.

use serde::{Deserialize, Serialize};

/// How much of the subject's face the detector can see.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FaceVisibility {
    Complete,
    Partial,
    NotVisible,
}

impl std::fmt::Display for FaceVisibility {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FaceVisibility::Complete => write!(f, "complete"),
            FaceVisibility::Partial => write!(f, "partial"),
            FaceVisibility::NotVisible => write!(f, "not_visible"),
        }
    }
}

/// Gaze classification produced by the eye tracker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GazeClass {
    Good,
    Warning,
    Alert,
}

impl std::fmt::Display for GazeClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GazeClass::Good => write!(f, "good"),
            GazeClass::Warning => write!(f, "warning"),
            GazeClass::Alert => write!(f, "alert"),
        }
    }
}

/// A single, already-classified observation.
///
/// Produced once per sampling tick by a [`crate::SignalSource`] feed and
/// consumed by the classifier. Never persisted. Missing fields deserialize
/// to the values of [`Signal::clear`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Signal {
    pub face_count: u32,
    pub face_visibility: FaceVisibility,
    pub gaze: GazeClass,
}

impl Signal {
    pub fn new(face_count: u32, face_visibility: FaceVisibility, gaze: GazeClass) -> Self {
        Self {
            face_count,
            face_visibility,
            gaze,
        }
    }

    /// One fully visible face looking at the screen.
    pub fn clear() -> Self {
        Self::new(1, FaceVisibility::Complete, GazeClass::Good)
    }

    /// Nobody in frame.
    pub fn absent() -> Self {
        Self::new(0, FaceVisibility::NotVisible, GazeClass::Good)
    }

    /// `count` faces in frame, all fully visible.
    pub fn faces(count: u32) -> Self {
        Self::new(count, FaceVisibility::Complete, GazeClass::Good)
    }

    pub fn with_visibility(mut self, face_visibility: FaceVisibility) -> Self {
        self.face_visibility = face_visibility;
        self
    }

    pub fn with_gaze(mut self, gaze: GazeClass) -> Self {
        self.gaze = gaze;
        self
    }
}

impl Default for Signal {
    fn default() -> Self {
        Self::clear()
    }
}
