//! Policy: rule model and the stateful engine that evaluates it.
//!
//! - [`rule`]  : `Rule` (Immediate / Sustained / Windowed), `PolicySet`,
//!   the `enrollment()` and `live_interview()` presets
//! - [`engine`]: `PolicyEngine::evaluate()`, `EngineVerdict`, sustained counters

pub mod engine;
pub mod rule;

pub use engine::{
    Classifier, EngineVerdict, PolicyEngine, SustainedCondition, VerdictOutcome, FAIL_SAFE_REASON,
    FAIL_SAFE_RULE, FEED_LOST_REASON, FEED_LOST_RULE,
};
pub use rule::{EventMatcher, PolicySet, Rule, RuleId, SignalCondition, SustainedArm, Window};
