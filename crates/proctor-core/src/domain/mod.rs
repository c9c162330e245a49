//! Domain models for proctoring.
//!
//! - `Signal`: one classified observation from the capture pipeline
//! - `ViolationEvent` / `ViolationLog`: severity-tagged events, append-only
//! - error taxonomy shared across the crate

pub mod error;
pub mod signal;
pub mod violation;

pub use error::{AcquisitionError, PolicyError, ProctorError, Result};
pub use signal::{FaceVisibility, GazeClass, Signal};
pub use violation::{Severity, ViolationEvent, ViolationKind, ViolationLog, ViolationRecord};
