//! Session record and its state machine.
//!
//! ```text
//! Idle ──acknowledge──► AwaitingConsent ──begin_monitoring──► Monitoring
//!                                                              │
//!                                      terminate ◄─────────────┤
//!                                          │                   │ complete
//!                                          ▼                   ▼
//!                                     Terminated           Completed
//! ```
//!
//! `Terminated` and `Completed` are terminal. Every transition checks the
//! current state and fails with [`SessionError::InvalidTransition`].

use std::collections::BTreeMap;

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::scoring::{Rubric, ScoreCard};

use super::error::SessionError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Idle,
    AwaitingConsent,
    Monitoring,
    Terminated,
    Completed,
}

impl SessionState {
    pub fn is_terminal(self) -> bool {
        matches!(self, SessionState::Terminated | SessionState::Completed)
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionState::Idle => write!(f, "idle"),
            SessionState::AwaitingConsent => write!(f, "awaiting_consent"),
            SessionState::Monitoring => write!(f, "monitoring"),
            SessionState::Terminated => write!(f, "terminated"),
            SessionState::Completed => write!(f, "completed"),
        }
    }
}

/// One timed assessment session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub id: Uuid,
    state: SessionState,
    pub duration_secs: u64,
    pub remaining_secs: u64,
    pub started_at: Option<DateTime<Utc>>,
    pub deadline: Option<DateTime<Utc>>,
    answers: BTreeMap<usize, String>,
    score: Option<ScoreCard>,
    termination_reason: Option<String>,
}

impl Session {
    pub fn new(duration_secs: u64) -> Self {
        Self {
            id: Uuid::new_v4(),
            state: SessionState::Idle,
            duration_secs,
            remaining_secs: duration_secs,
            started_at: None,
            deadline: None,
            answers: BTreeMap::new(),
            score: None,
            termination_reason: None,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn answers(&self) -> &BTreeMap<usize, String> {
        &self.answers
    }

    pub fn score(&self) -> Option<&ScoreCard> {
        self.score.as_ref()
    }

    pub fn termination_reason(&self) -> Option<&str> {
        self.termination_reason.as_deref()
    }

    fn require(&self, state: SessionState, action: &'static str) -> Result<(), SessionError> {
        if self.state == state {
            Ok(())
        } else {
            Err(SessionError::InvalidTransition {
                from: self.state,
                action,
            })
        }
    }

    /// The subject acknowledged the capture requirements.
    pub fn acknowledge(&mut self) -> Result<(), SessionError> {
        self.require(SessionState::Idle, "acknowledge")?;
        self.state = SessionState::AwaitingConsent;
        Ok(())
    }

    /// Capture was acquired; the countdown starts at `now`.
    pub fn begin_monitoring(&mut self, now: DateTime<Utc>) -> Result<(), SessionError> {
        self.require(SessionState::AwaitingConsent, "start monitoring")?;
        self.state = SessionState::Monitoring;
        self.started_at = Some(now);
        // None when the deadline is not representable.
        self.deadline = i64::try_from(self.duration_secs)
            .ok()
            .and_then(ChronoDuration::try_seconds)
            .and_then(|d| now.checked_add_signed(d));
        Ok(())
    }

    pub fn record_answer(
        &mut self,
        index: usize,
        text: impl Into<String>,
        rubric: &Rubric,
    ) -> Result<(), SessionError> {
        self.require(SessionState::Monitoring, "record an answer")?;
        if index >= rubric.len() {
            return Err(SessionError::UnknownQuestion {
                index,
                count: rubric.len(),
            });
        }
        self.answers.insert(index, text.into());
        Ok(())
    }

    /// Remove one second. Returns the seconds left.
    pub fn tick_countdown(&mut self) -> u64 {
        if self.state == SessionState::Monitoring {
            self.remaining_secs = self.remaining_secs.saturating_sub(1);
        }
        self.remaining_secs
    }

    /// Disqualify. The score is fixed at zero whatever was answered.
    pub fn terminate(
        &mut self,
        reason: impl Into<String>,
        rubric: &Rubric,
    ) -> Result<(), SessionError> {
        self.require(SessionState::Monitoring, "terminate")?;
        self.state = SessionState::Terminated;
        self.termination_reason = Some(reason.into());
        self.score = Some(ScoreCard::disqualified(rubric));
        Ok(())
    }

    /// Finish normally with `score` as the final score.
    pub fn complete(&mut self, score: ScoreCard) -> Result<(), SessionError> {
        self.require(SessionState::Monitoring, "complete")?;
        self.state = SessionState::Completed;
        self.score = Some(score);
        Ok(())
    }
}
