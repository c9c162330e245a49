use crate::domain::AcquisitionError;

use super::state::SessionState;

/// Errors returned by session operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    /// The signal source could not be acquired. The session stays in
    /// `AwaitingConsent`; calling `start` again retries.
    #[error("signal source unavailable: {0}")]
    Acquisition(#[from] AcquisitionError),

    #[error("cannot {action} while session is {from}")]
    InvalidTransition {
        from: SessionState,
        action: &'static str,
    },

    #[error("question {index} is not in the rubric ({count} questions)")]
    UnknownQuestion { index: usize, count: usize },
}
