//! Observability tests for the proctoring lifecycle.
//!
//! These verify that the structured tracing emitters and spans run cleanly
//! under a capturing subscriber, and that the global counters move when a
//! session runs.

use std::sync::Arc;
use std::time::Instant;

use proctor_core::obs::{
    emit_acquisition_failed, emit_evaluation_fault, emit_outcome_persisted, emit_persist_failed,
    emit_violation_recorded,
};
use proctor_core::{
    emit_session_completed, emit_session_started, emit_session_terminated, FixedSource,
    MemoryOutcomeStore, PolicyEngine, PolicySet, ProctorConfig, SessionController, SessionSpan,
    SessionState, Severity, Signal, ViolationKind, METRICS,
};
use tracing_test::traced_test;
use uuid::Uuid;

#[traced_test]
#[test]
fn test_emit_lifecycle_events() {
    let id = Uuid::new_v4();
    emit_session_started(id, "live_interview", 2700);
    emit_violation_recorded(ViolationKind::GazeWarning, Severity::Info, 0);
    emit_violation_recorded(ViolationKind::FaceAbsent, Severity::Warning, 1);
    emit_session_terminated(id, "face_missing", "no face detected", 5);
    emit_session_completed(id, 72, 92, 0);
}

#[traced_test]
#[test]
fn test_emit_failure_events() {
    let id = Uuid::new_v4();
    emit_acquisition_failed(id, &"camera permission denied");
    emit_persist_failed(id, 2, &"disk full");
    emit_outcome_persisted(id, "terminated");
    emit_evaluation_fault("live_interview", 3, &Signal::absent(), "index out of bounds");
}

#[traced_test]
#[test]
fn test_session_span_enter() {
    let span = SessionSpan::enter(Uuid::new_v4(), "enrollment");
    drop(span);
}

#[traced_test]
#[test]
fn test_engine_counts_ticks_and_violations() {
    let ticks_before = METRICS.ticks_evaluated();
    let violations_before = METRICS.violations_recorded();

    let mut engine = PolicyEngine::new(PolicySet::live_interview()).unwrap();
    engine.evaluate(&Signal::absent(), Instant::now());

    assert!(METRICS.ticks_evaluated() > ticks_before);
    assert!(METRICS.violations_recorded() > violations_before);
}

#[traced_test]
#[tokio::test(start_paused = true)]
async fn test_terminated_session_counts() {
    let before = METRICS.sessions_terminated();
    let store = Arc::new(MemoryOutcomeStore::new());
    let ctl = SessionController::new(&ProctorConfig::default(), store).unwrap();
    ctl.acknowledge().await.unwrap();
    ctl.start(&mut FixedSource::new(Signal::faces(2))).await.unwrap();

    assert_eq!(ctl.wait().await, SessionState::Terminated);
    assert!(METRICS.sessions_terminated() > before);
}
