//! End-to-end interview sessions on a paused tokio clock.

use std::sync::Arc;
use std::time::Duration;

use proctor_core::{
    AcquisitionError, ChannelSource, EngineVerdict, FixedSource, FsOutcomeStore,
    MemoryOutcomeStore, OutcomeStore, PolicyEngine, PolicySet, ProctorConfig, ScriptedSource,
    SessionController, SessionError, SessionState, Signal, ViolationEvent, FAIL_SAFE_REASON,
    FAIL_SAFE_RULE, FEED_LOST_REASON, FEED_LOST_RULE,
};
use tokio::time::{sleep, Instant};

fn config(duration_secs: u64) -> ProctorConfig {
    let mut config = ProctorConfig::default();
    config.interview.duration_secs = duration_secs;
    config
}

async fn started(
    duration_secs: u64,
    signal: Signal,
) -> (Arc<MemoryOutcomeStore>, SessionController) {
    let store = Arc::new(MemoryOutcomeStore::new());
    let ctl = SessionController::new(&config(duration_secs), store.clone()).unwrap();
    ctl.acknowledge().await.unwrap();
    ctl.start(&mut FixedSource::new(signal)).await.unwrap();
    (store, ctl)
}

#[tokio::test(start_paused = true)]
async fn test_clean_session_completes_at_countdown_zero() {
    let (store, ctl) = started(200, Signal::clear()).await;

    assert_eq!(ctl.wait().await, SessionState::Completed);
    let snap = ctl.snapshot().await;
    assert_eq!(snap.ticks_evaluated, 100);
    assert_eq!(snap.remaining_secs, 0);
    assert!(snap.violations.is_empty());
    assert_eq!(snap.reason, None);
    assert_eq!(ctl.last_verdict().await, Some(EngineVerdict::proceed()));

    let record = store.read(ctl.id()).await.unwrap();
    assert_eq!(record.final_state, "completed");
    assert_eq!(record.score.unwrap().max_score, 92);
}

#[tokio::test(start_paused = true)]
async fn test_multiple_faces_terminate_with_zero_score() {
    let store = Arc::new(MemoryOutcomeStore::new());
    let ctl = SessionController::new(&config(600), store.clone()).unwrap();
    ctl.acknowledge().await.unwrap();
    ctl.start(&mut FixedSource::new(Signal::faces(2))).await.unwrap();
    ctl.record_answer(0, "a".repeat(200)).await.unwrap();

    assert_eq!(ctl.wait().await, SessionState::Terminated);
    assert_eq!(
        ctl.last_reason().await.as_deref(),
        Some("multiple faces detected")
    );

    let snap = ctl.snapshot().await;
    assert_eq!(snap.ticks_evaluated, 1);
    assert_eq!(snap.triggering_rule.as_deref(), Some("multiple_faces"));
    assert_eq!(snap.score.as_ref().unwrap().raw_score, 0);
    assert!(snap.remaining_secs > 0);

    let record = store.read(ctl.id()).await.unwrap();
    assert_eq!(record.final_state, "terminated");
    assert_eq!(record.score.as_ref().unwrap().raw_score, 0);
    assert!(record.verify_integrity());
}

#[tokio::test(start_paused = true)]
async fn test_absence_terminates_after_ten_seconds() {
    let begin = Instant::now();
    let (_store, ctl) = started(600, Signal::absent()).await;

    assert_eq!(ctl.wait().await, SessionState::Terminated);
    let elapsed = begin.elapsed();
    assert!(elapsed >= Duration::from_secs(10), "{elapsed:?}");
    assert!(elapsed < Duration::from_secs(11), "{elapsed:?}");

    let snap = ctl.snapshot().await;
    assert_eq!(snap.ticks_evaluated, 5);
    assert_eq!(
        snap.reason.as_deref(),
        Some("no face detected for 10 seconds or more")
    );
    assert_eq!(snap.violations.len(), 5);
}

#[tokio::test(start_paused = true)]
async fn test_returning_face_resets_absence() {
    let store = Arc::new(MemoryOutcomeStore::new());
    let ctl = SessionController::new(&config(600), store).unwrap();
    let (tx, mut source) = ChannelSource::new(4);
    tx.send(Signal::absent()).await.unwrap();
    ctl.acknowledge().await.unwrap();
    ctl.start(&mut source).await.unwrap();

    // ticks at 2, 4, 6, 8 see nobody
    sleep(Duration::from_millis(8500)).await;
    tx.send(Signal::clear()).await.unwrap();
    // tick at 10 sees the face again
    sleep(Duration::from_millis(2000)).await;
    tx.send(Signal::absent()).await.unwrap();
    // ticks at 12, 14, 16, 18
    sleep(Duration::from_millis(8000)).await;
    assert_eq!(ctl.state().await, SessionState::Monitoring);

    sleep(Duration::from_millis(2000)).await;
    assert_eq!(ctl.state().await, SessionState::Terminated);
    assert_eq!(ctl.snapshot().await.ticks_evaluated, 10);
}

#[tokio::test(start_paused = true)]
async fn test_submit_scores_and_stops_monitoring() {
    let (store, ctl) = started(600, Signal::clear()).await;
    ctl.record_answer(0, "x".repeat(150)).await.unwrap();
    ctl.record_answer(2, "y".repeat(50)).await.unwrap();

    sleep(Duration::from_millis(30_500)).await;
    let card = ctl.submit().await.unwrap();
    assert_eq!(card.raw_score, 8 + 4);
    assert_eq!(ctl.state().await, SessionState::Completed);

    let ticks = ctl.snapshot().await.ticks_evaluated;
    sleep(Duration::from_secs(30)).await;
    let snap = ctl.snapshot().await;
    assert_eq!(snap.ticks_evaluated, ticks);
    assert_eq!(snap.remaining_secs, 570);

    let record = store.read(ctl.id()).await.unwrap();
    assert_eq!(record.score.unwrap().raw_score, 12);
}

#[tokio::test(start_paused = true)]
async fn test_terminal_session_ignores_later_signals() {
    let store = Arc::new(MemoryOutcomeStore::new());
    let ctl = SessionController::new(&config(600), store).unwrap();
    let (tx, mut source) = ChannelSource::new(8);
    tx.send(Signal::faces(3)).await.unwrap();
    ctl.acknowledge().await.unwrap();
    ctl.start(&mut source).await.unwrap();
    assert_eq!(ctl.wait().await, SessionState::Terminated);

    let violations = ctl.violations().await.len();
    // The monitor may already have released the feed.
    let _ = tx.send(Signal::absent()).await;
    sleep(Duration::from_secs(20)).await;

    assert_eq!(ctl.violations().await.len(), violations);
    assert_eq!(ctl.state().await, SessionState::Terminated);
    assert!(matches!(
        ctl.record_answer(0, "too late").await,
        Err(SessionError::InvalidTransition { .. })
    ));
    assert!(ctl.submit().await.is_err());
}

#[tokio::test(start_paused = true)]
async fn test_acquisition_retry() {
    let store = Arc::new(MemoryOutcomeStore::new());
    let ctl = SessionController::new(&config(60), store.clone()).unwrap();
    ctl.acknowledge().await.unwrap();

    let mut source = ScriptedSource::new([Signal::clear()])
        .denied(AcquisitionError::DeviceUnavailable("no camera".into()));
    for _ in 0..3 {
        let err = ctl.start(&mut source).await.unwrap_err();
        assert!(matches!(err, SessionError::Acquisition(_)));
        assert_eq!(ctl.state().await, SessionState::AwaitingConsent);
    }
    assert!(store.is_empty());

    source.grant();
    ctl.start(&mut source).await.unwrap();
    assert_eq!(ctl.wait().await, SessionState::Completed);
}

#[tokio::test(start_paused = true)]
async fn test_unknown_question_rejected() {
    let (_store, ctl) = started(60, Signal::clear()).await;
    let err = ctl.record_answer(42, "answer").await.unwrap_err();
    assert_eq!(err, SessionError::UnknownQuestion { index: 42, count: 10 });
}

#[tokio::test(start_paused = true)]
async fn test_persist_failure_keeps_terminal_state() {
    let store = Arc::new(MemoryOutcomeStore::failing_writes(u32::MAX));
    let ctl = SessionController::new(&config(60), store.clone()).unwrap();
    ctl.acknowledge().await.unwrap();
    ctl.start(&mut FixedSource::new(Signal::faces(2))).await.unwrap();

    assert_eq!(ctl.wait().await, SessionState::Terminated);
    assert_eq!(store.attempts(), 4);
    assert!(store.is_empty());
    assert_eq!(ctl.state().await, SessionState::Terminated);
}

#[tokio::test(start_paused = true)]
async fn test_outcome_written_to_disk() {
    let dir = tempfile::tempdir().unwrap();
    let fs_store = FsOutcomeStore::new(dir.path()).unwrap();
    let path_store = fs_store.clone();
    let ctl = SessionController::new(&config(600), Arc::new(fs_store)).unwrap();
    ctl.acknowledge().await.unwrap();
    ctl.start(&mut FixedSource::new(Signal::absent())).await.unwrap();
    ctl.wait().await;

    assert!(path_store.record_path(ctl.id()).exists());
    let record = path_store.read(ctl.id()).await.unwrap();
    assert_eq!(record.violations, ctl.snapshot().await.violations);
    assert!(record.verify_integrity());
}

fn garbled_detector(_: &Signal, _: std::time::Instant) -> Vec<ViolationEvent> {
    panic!("detector returned a malformed frame");
}

#[tokio::test(start_paused = true)]
async fn test_evaluation_fault_terminates_session() {
    let store = Arc::new(MemoryOutcomeStore::new());
    let engine =
        PolicyEngine::with_classifier(PolicySet::live_interview(), garbled_detector).unwrap();
    let ctl = SessionController::with_engine(&config(600), engine, store.clone()).unwrap();
    ctl.acknowledge().await.unwrap();
    ctl.start(&mut FixedSource::new(Signal::clear())).await.unwrap();
    ctl.record_answer(0, "x".repeat(150)).await.unwrap();

    assert_eq!(ctl.wait().await, SessionState::Terminated);
    let snap = ctl.snapshot().await;
    assert_eq!(snap.reason.as_deref(), Some(FAIL_SAFE_REASON));
    assert_eq!(snap.triggering_rule.as_deref(), Some(FAIL_SAFE_RULE));
    assert_eq!(snap.ticks_evaluated, 1);
    assert_eq!(snap.score.unwrap().raw_score, 0);

    let record = store.read(ctl.id()).await.unwrap();
    assert_eq!(record.final_state, "terminated");
    assert_eq!(record.reason.as_deref(), Some(FAIL_SAFE_REASON));
}

#[tokio::test(start_paused = true)]
async fn test_detector_going_away_terminates_session() {
    let store = Arc::new(MemoryOutcomeStore::new());
    let ctl = SessionController::new(&config(600), store.clone()).unwrap();
    let (tx, mut source) = ChannelSource::new(4);
    tx.send(Signal::clear()).await.unwrap();
    ctl.acknowledge().await.unwrap();
    ctl.start(&mut source).await.unwrap();

    sleep(Duration::from_millis(500)).await;
    drop(tx);

    assert_eq!(ctl.wait().await, SessionState::Terminated);
    let snap = ctl.snapshot().await;
    assert_eq!(snap.reason.as_deref(), Some(FEED_LOST_REASON));
    assert_eq!(snap.triggering_rule.as_deref(), Some(FEED_LOST_RULE));
    assert_eq!(snap.ticks_evaluated, 0);
    assert_eq!(snap.remaining_secs, 600);
    assert_eq!(snap.score.unwrap().raw_score, 0);
    assert_eq!(store.read(ctl.id()).await.unwrap().final_state, "terminated");
}
