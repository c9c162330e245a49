//! Session controller: state machine, countdown and sampling cadence.
//!
//! All mutable session data (the [`Session`], the [`PolicyEngine`] with its
//! violation log and counters, the latest sampled signal) lives in one
//! `SessionCore` behind a `tokio::sync::Mutex`. A single monitor task drives
//! three intervals (sampling, evaluation, countdown) and takes the lock once
//! per tick; every tick re-checks `state == Monitoring` inside the lock, so a
//! tick that loses the race against termination or submission is discarded.
//!
//! When the loop stops the monitor writes the outcome record, then flags the
//! session as finished for [`SessionController::wait`].

use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::sync::{watch, Mutex, Notify};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::Instrument;
use uuid::Uuid;

use crate::config::{ProctorConfig, TimingConfig};
use crate::domain::{Result, Signal, ViolationEvent, ViolationRecord};
use crate::metrics::METRICS;
use crate::obs;
use crate::persistence::{persist_outcome, OutcomeRecord, OutcomeStore, RetryPolicy, SessionFlow};
use crate::policy::{EngineVerdict, PolicyEngine, RuleId, FEED_LOST_REASON, FEED_LOST_RULE};
use crate::scoring::{self, Rubric, ScoreCard};
use crate::source::{SignalFeed, SignalSource};

use super::error::SessionError;
use super::state::{Session, SessionState};

/// Read-only view of a session for display and audit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub session_id: Uuid,
    pub state: SessionState,
    pub remaining_secs: u64,
    pub reason: Option<String>,
    pub triggering_rule: Option<String>,
    pub ticks_evaluated: u64,
    pub violations: Vec<ViolationRecord>,
    pub score: Option<ScoreCard>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    Stop,
}

struct SessionCore {
    session: Session,
    engine: PolicyEngine,
    rubric: Rubric,
    latest_signal: Option<Signal>,
    last_verdict: Option<EngineVerdict>,
    epoch: Option<std::time::Instant>,
}

impl SessionCore {
    fn is_monitoring(&self) -> bool {
        self.session.state() == SessionState::Monitoring
    }

    fn sample(&mut self, feed: &mut dyn SignalFeed) -> Flow {
        if !self.is_monitoring() {
            return Flow::Stop;
        }
        match feed.next_signal() {
            Ok(Some(signal)) => self.latest_signal = Some(signal),
            Ok(None) => {}
            Err(closed) => {
                tracing::error!(
                    event = "session.feed_lost",
                    session_id = %self.session.id,
                    error = %closed,
                );
                let verdict = self
                    .engine
                    .halt(RuleId::new(FEED_LOST_RULE), FEED_LOST_REASON);
                return self.apply(verdict);
            }
        }
        Flow::Continue
    }

    fn evaluate(&mut self, now: std::time::Instant) -> Flow {
        if !self.is_monitoring() {
            return Flow::Stop;
        }
        let Some(signal) = self.latest_signal else {
            tracing::debug!(event = "session.tick_skipped", "no signal sampled yet");
            return Flow::Continue;
        };

        let verdict = self.engine.evaluate(&signal, now);
        self.apply(verdict)
    }

    /// Record `verdict` and terminate the session if it says so.
    fn apply(&mut self, verdict: EngineVerdict) -> Flow {
        self.last_verdict = Some(verdict.clone());
        if !verdict.is_terminate() {
            return Flow::Continue;
        }

        let reason = verdict.reason.clone().unwrap_or_default();
        if self.session.terminate(reason.as_str(), &self.rubric).is_ok() {
            let rule = verdict
                .triggering_rule
                .as_ref()
                .map(|r| r.as_str())
                .unwrap_or_default();
            obs::emit_session_terminated(self.session.id, rule, &reason, self.engine.log().len());
            METRICS.inc_sessions_terminated();
        }
        Flow::Stop
    }

    fn count_down(&mut self) -> Flow {
        if !self.is_monitoring() {
            return Flow::Stop;
        }
        if self.session.tick_countdown() > 0 {
            return Flow::Continue;
        }
        tracing::info!(event = "session.time_expired", session_id = %self.session.id);
        self.complete();
        Flow::Stop
    }

    /// Score the collected answers and move to `Completed`.
    fn complete(&mut self) -> Option<ScoreCard> {
        let card = scoring::score(self.session.answers(), &self.rubric);
        self.session.complete(card.clone()).ok()?;
        obs::emit_session_completed(
            self.session.id,
            card.raw_score,
            card.max_score,
            self.engine.log().len(),
        );
        METRICS.inc_sessions_completed();
        Some(card)
    }

    fn records(&self) -> Vec<ViolationRecord> {
        match self.epoch {
            Some(epoch) => self.engine.log().to_records(epoch),
            None => Vec::new(),
        }
    }

    fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            session_id: self.session.id,
            state: self.session.state(),
            remaining_secs: self.session.remaining_secs,
            reason: self.reason(),
            triggering_rule: self
                .engine
                .halt_verdict()
                .and_then(|v| v.triggering_rule.as_ref())
                .map(|r| r.to_string()),
            ticks_evaluated: self.engine.ticks(),
            violations: self.records(),
            score: self.session.score().cloned(),
        }
    }

    fn reason(&self) -> Option<String> {
        self.session
            .termination_reason()
            .map(str::to_string)
            .or_else(|| self.last_verdict.as_ref().and_then(|v| v.reason.clone()))
    }

    fn outcome(&self) -> OutcomeRecord {
        let mut record = OutcomeRecord::new(
            self.session.id,
            SessionFlow::Interview,
            self.session.state().to_string(),
            self.reason(),
            self.records(),
            Utc::now(),
        );
        if let Some(card) = self.session.score() {
            record = record.with_score(card.clone());
        }
        record
    }
}

/// Drives one interview session from consent to a terminal state.
pub struct SessionController {
    id: Uuid,
    core: Arc<Mutex<SessionCore>>,
    timing: TimingConfig,
    retry: RetryPolicy,
    store: Arc<dyn OutcomeStore>,
    shutdown: Arc<Notify>,
    finished: watch::Receiver<bool>,
    finished_tx: std::sync::Mutex<Option<watch::Sender<bool>>>,
    monitor: std::sync::Mutex<Option<JoinHandle<()>>>,
}

impl std::fmt::Debug for SessionController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionController")
            .field("id", &self.id)
            .field("timing", &self.timing)
            .finish_non_exhaustive()
    }
}

impl SessionController {
    /// Build a controller in `Idle` from validated configuration.
    pub fn new(config: &ProctorConfig, store: Arc<dyn OutcomeStore>) -> Result<Self> {
        config.validate()?;
        let engine = PolicyEngine::new(config.interview_policy()?)?;
        Self::with_engine(config, engine, store)
    }

    /// Like [`SessionController::new`], but judged by a prepared `engine`
    /// instead of the configured interview policy.
    pub fn with_engine(
        config: &ProctorConfig,
        engine: PolicyEngine,
        store: Arc<dyn OutcomeStore>,
    ) -> Result<Self> {
        config.validate()?;
        let session = Session::new(config.interview.duration_secs);
        let id = session.id;
        let (finished_tx, finished) = watch::channel(false);

        Ok(Self {
            id,
            core: Arc::new(Mutex::new(SessionCore {
                session,
                engine,
                rubric: config.rubric.clone(),
                latest_signal: None,
                last_verdict: None,
                epoch: None,
            })),
            timing: config.timing.clone(),
            retry: config.persistence.retry.clone(),
            store,
            shutdown: Arc::new(Notify::new()),
            finished,
            finished_tx: std::sync::Mutex::new(Some(finished_tx)),
            monitor: std::sync::Mutex::new(None),
        })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Idle → AwaitingConsent.
    pub async fn acknowledge(&self) -> std::result::Result<(), SessionError> {
        self.core.lock().await.session.acknowledge()
    }

    /// Acquire `source` and start monitoring.
    ///
    /// On acquisition failure the session stays in `AwaitingConsent` and the
    /// call may be repeated.
    pub async fn start<S: SignalSource>(
        &self,
        source: &mut S,
    ) -> std::result::Result<(), SessionError> {
        {
            let core = self.core.lock().await;
            if core.session.state() != SessionState::AwaitingConsent {
                return Err(SessionError::InvalidTransition {
                    from: core.session.state(),
                    action: "start monitoring",
                });
            }
        }

        let feed = match source.acquire().await {
            Ok(feed) => feed,
            Err(err) => {
                obs::emit_acquisition_failed(self.id, &err);
                return Err(err.into());
            }
        };

        let start = Instant::now();
        {
            let mut core = self.core.lock().await;
            core.session.begin_monitoring(Utc::now())?;
            core.epoch = Some(start.into_std());
            obs::emit_session_started(
                self.id,
                &core.engine.policy().name,
                core.session.duration_secs,
            );
        }

        let finished_tx = self
            .finished_tx
            .lock()
            .ok()
            .and_then(|mut tx| tx.take());
        let Some(finished_tx) = finished_tx else {
            return Err(SessionError::InvalidTransition {
                from: SessionState::Monitoring,
                action: "start monitoring",
            });
        };

        let task = monitor(
            Arc::clone(&self.core),
            feed,
            start,
            self.timing.clone(),
            Arc::clone(&self.shutdown),
            Arc::clone(&self.store),
            self.retry.clone(),
            finished_tx,
        )
        .instrument(obs::session_span(self.id, "interview"));
        let handle = tokio::spawn(task);
        if let Ok(mut slot) = self.monitor.lock() {
            *slot = Some(handle);
        }
        Ok(())
    }

    /// Store the answer to question `index` (0-based).
    pub async fn record_answer(
        &self,
        index: usize,
        text: impl Into<String>,
    ) -> std::result::Result<(), SessionError> {
        let mut core = self.core.lock().await;
        let SessionCore {
            session, rubric, ..
        } = &mut *core;
        session.record_answer(index, text, rubric)
    }

    /// Monitoring → Completed. Stops every periodic activity and waits for
    /// the outcome to be persisted before returning the score.
    pub async fn submit(&self) -> std::result::Result<ScoreCard, SessionError> {
        let card = {
            let mut core = self.core.lock().await;
            if !core.is_monitoring() {
                return Err(SessionError::InvalidTransition {
                    from: core.session.state(),
                    action: "submit",
                });
            }
            core.complete().ok_or(SessionError::InvalidTransition {
                from: core.session.state(),
                action: "submit",
            })?
        };
        self.shutdown.notify_one();
        self.wait().await;
        Ok(card)
    }

    /// Resolve once the session is terminal and its outcome was written.
    ///
    /// Returns immediately when monitoring never started.
    pub async fn wait(&self) -> SessionState {
        let state = self.state().await;
        if matches!(state, SessionState::Idle | SessionState::AwaitingConsent) {
            return state;
        }
        let mut finished = self.finished.clone();
        // An Err means the monitor went away without flagging; nothing left to wait for.
        let _ = finished.wait_for(|done| *done).await;
        self.state().await
    }

    pub async fn state(&self) -> SessionState {
        self.core.lock().await.session.state()
    }

    /// The full violation log, oldest first.
    pub async fn violations(&self) -> Vec<ViolationEvent> {
        self.core.lock().await.engine.log().events().to_vec()
    }

    /// Termination reason, or the reason of the latest verdict.
    pub async fn last_reason(&self) -> Option<String> {
        self.core.lock().await.reason()
    }

    pub async fn last_verdict(&self) -> Option<EngineVerdict> {
        self.core.lock().await.last_verdict.clone()
    }

    pub async fn snapshot(&self) -> SessionSnapshot {
        self.core.lock().await.snapshot()
    }
}

impl Drop for SessionController {
    fn drop(&mut self) {
        if let Ok(mut slot) = self.monitor.lock() {
            if let Some(handle) = slot.take() {
                handle.abort();
            }
        }
    }
}

#[allow(clippy::too_many_arguments)]
async fn monitor<F: SignalFeed>(
    core: Arc<Mutex<SessionCore>>,
    mut feed: F,
    start: Instant,
    timing: TimingConfig,
    shutdown: Arc<Notify>,
    store: Arc<dyn OutcomeStore>,
    retry: RetryPolicy,
    finished: watch::Sender<bool>,
) {
    let mut sampling = interval_at(start, timing.sample_interval());
    sampling.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut evaluation = interval_at(
        start + timing.evaluation_interval(),
        timing.evaluation_interval(),
    );
    let mut countdown = interval_at(
        start + timing.countdown_interval(),
        timing.countdown_interval(),
    );

    // biased: when ticks coincide, sample before evaluating and evaluate
    // before the countdown can complete the session.
    loop {
        let flow = tokio::select! {
            biased;
            _ = shutdown.notified() => Flow::Stop,
            _ = sampling.tick() => core.lock().await.sample(&mut feed),
            _ = evaluation.tick() => core.lock().await.evaluate(Instant::now().into_std()),
            _ = countdown.tick() => core.lock().await.count_down(),
        };
        if flow == Flow::Stop {
            break;
        }
    }

    let record = core.lock().await.outcome();
    if let Err(err) = persist_outcome(&store, &record, &retry).await {
        tracing::error!(
            event = "outcome.persist_abandoned",
            session_id = %record.session_id,
            final_state = %record.final_state,
            error = %err,
        );
    }
    METRICS.flush();
    let _ = finished.send(true);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::AcquisitionError;
    use crate::persistence::MemoryOutcomeStore;
    use crate::source::{FixedSource, ScriptedSource};
    use std::time::Duration;

    fn controller(duration_secs: u64) -> (Arc<MemoryOutcomeStore>, SessionController) {
        let mut config = ProctorConfig::default();
        config.interview.duration_secs = duration_secs;
        let store = Arc::new(MemoryOutcomeStore::new());
        let ctl = SessionController::new(&config, store.clone()).unwrap();
        (store, ctl)
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_requires_consent() {
        let (_store, ctl) = controller(60);
        let err = ctl
            .start(&mut FixedSource::new(Signal::clear()))
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::InvalidTransition { .. }));
        assert_eq!(ctl.wait().await, SessionState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_denied_acquisition_stays_awaiting_consent() {
        let (_store, ctl) = controller(60);
        ctl.acknowledge().await.unwrap();
        let mut source = ScriptedSource::new([Signal::clear()])
            .denied(AcquisitionError::PermissionDenied("camera".into()));

        let err = ctl.start(&mut source).await.unwrap_err();
        assert!(matches!(err, SessionError::Acquisition(_)));
        assert_eq!(ctl.state().await, SessionState::AwaitingConsent);

        source.grant();
        ctl.start(&mut source).await.unwrap();
        assert_eq!(ctl.state().await, SessionState::Monitoring);
    }

    #[tokio::test(start_paused = true)]
    async fn test_countdown_tracks_elapsed_seconds() {
        let (_store, ctl) = controller(60);
        ctl.acknowledge().await.unwrap();
        ctl.start(&mut FixedSource::new(Signal::clear())).await.unwrap();

        tokio::time::sleep(Duration::from_millis(10_500)).await;
        let snap = ctl.snapshot().await;
        assert_eq!(snap.state, SessionState::Monitoring);
        assert_eq!(snap.remaining_secs, 50);
        assert_eq!(snap.ticks_evaluated, 5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_submit_twice_rejected() {
        let (store, ctl) = controller(60);
        ctl.acknowledge().await.unwrap();
        ctl.start(&mut FixedSource::new(Signal::clear())).await.unwrap();
        ctl.submit().await.unwrap();

        let err = ctl.submit().await.unwrap_err();
        assert_eq!(
            err,
            SessionError::InvalidTransition {
                from: SessionState::Completed,
                action: "submit"
            }
        );
        assert_eq!(store.len(), 1);
    }
}
