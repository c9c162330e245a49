//! Proctor Core Library
//!
//! Violation classification, the rule-driven policy engine, interview and
//! enrollment session control, answer scoring and outcome persistence.

pub mod classifier;
pub mod config;
pub mod domain;
pub mod enrollment;
pub mod metrics;
pub mod obs;
pub mod persistence;
pub mod policy;
pub mod scoring;
pub mod session;
pub mod source;
pub mod telemetry;

pub use classifier::classify;

pub use config::{EnrollmentConfig, InterviewConfig, PersistenceConfig, ProctorConfig, TimingConfig};

pub use domain::{
    AcquisitionError, FaceVisibility, GazeClass, PolicyError, ProctorError, Result, Severity,
    Signal, ViolationEvent, ViolationKind, ViolationLog, ViolationRecord,
};

pub use enrollment::{run_enrollment, EnrollmentSession, EnrollmentStatus};

pub use persistence::{
    persist_outcome, FsOutcomeStore, MemoryOutcomeStore, OutcomeRecord, OutcomeStore,
    RetryPolicy, SessionFlow, StorageError, StorageResult,
};

pub use policy::{
    EngineVerdict, EventMatcher, PolicyEngine, PolicySet, Rule, RuleId, SignalCondition,
    SustainedArm, SustainedCondition, VerdictOutcome, Window, FAIL_SAFE_REASON, FAIL_SAFE_RULE,
    FEED_LOST_REASON, FEED_LOST_RULE,
};

pub use scoring::{score, QuestionScore, Rubric, RubricEntry, ScoreCard, ScoringTiers};

pub use session::{Session, SessionController, SessionError, SessionSnapshot, SessionState};

pub use source::{ChannelSource, FeedClosed, FixedSource, ScriptedSource, SignalFeed, SignalSource};

pub use metrics::{MetricsSnapshot, METRICS};
pub use obs::{
    emit_session_completed, emit_session_started, emit_session_terminated, SessionSpan,
};
pub use telemetry::{init_tracing, LogFormat};

/// Proctor version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
