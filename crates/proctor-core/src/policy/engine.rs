//! Policy engine: the sole authority on termination.
//!
//! Each call to [`PolicyEngine::evaluate`] runs one tick:
//!
//! 1. classify the signal and append the events to the violation log
//! 2. Immediate rules (first match short-circuits)
//! 3. Sustained rules (every counter is updated, first to reach its
//!    threshold terminates)
//! 4. Windowed rules (count matching events in the log)
//! 5. otherwise continue
//!
//! A terminate verdict latches. Later calls return the same verdict without
//! classifying or logging anything.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::time::Instant;

use serde::{Deserialize, Serialize};

use crate::classifier;
use crate::domain::{PolicyError, Signal, ViolationEvent, ViolationLog};
use crate::metrics::METRICS;
use crate::obs;

use super::rule::{EventMatcher, PolicySet, Rule, RuleId, Window};

/// Reason reported when evaluation itself faults.
pub const FAIL_SAFE_REASON: &str = "fail-safe termination: policy evaluation fault";

/// Rule id reported with [`FAIL_SAFE_REASON`].
pub const FAIL_SAFE_RULE: &str = "fail_safe";

/// Reason reported when the signal feed stops before the session ends.
pub const FEED_LOST_REASON: &str = "fail-safe termination: signal feed lost";

/// Rule id reported with [`FEED_LOST_REASON`].
pub const FEED_LOST_RULE: &str = "feed_lost";

/// Signature of a violation classifier.
pub type Classifier = fn(&Signal, Instant) -> Vec<ViolationEvent>;

/// Whether the session may go on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerdictOutcome {
    Continue,
    Terminate,
}

/// The engine's decision for one tick.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineVerdict {
    pub outcome: VerdictOutcome,
    pub reason: Option<String>,
    pub triggering_rule: Option<RuleId>,
}

impl EngineVerdict {
    pub fn proceed() -> Self {
        Self {
            outcome: VerdictOutcome::Continue,
            reason: None,
            triggering_rule: None,
        }
    }

    pub fn terminate(rule: RuleId, reason: impl Into<String>) -> Self {
        Self {
            outcome: VerdictOutcome::Terminate,
            reason: Some(reason.into()),
            triggering_rule: Some(rule),
        }
    }

    pub fn is_terminate(&self) -> bool {
        self.outcome == VerdictOutcome::Terminate
    }
}

/// Streak counter for one Sustained rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SustainedCondition {
    pub rule_id: RuleId,
    pub consecutive_ticks: u32,
    pub armed_since: Option<Instant>,
}

impl SustainedCondition {
    fn new(rule_id: RuleId) -> Self {
        Self {
            rule_id,
            consecutive_ticks: 0,
            armed_since: None,
        }
    }

    fn advance(&mut self, now: Instant) -> u32 {
        self.consecutive_ticks += 1;
        self.armed_since.get_or_insert(now);
        self.consecutive_ticks
    }

    fn reset(&mut self) {
        self.consecutive_ticks = 0;
        self.armed_since = None;
    }
}

/// Stateful evaluator owning the violation log and all rule counters.
pub struct PolicyEngine {
    policy: PolicySet,
    classifier: Classifier,
    log: ViolationLog,
    counters: Vec<SustainedCondition>,
    halted: Option<EngineVerdict>,
    ticks: u64,
}

impl std::fmt::Debug for PolicyEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PolicyEngine")
            .field("policy", &self.policy.name)
            .field("log_len", &self.log.len())
            .field("counters", &self.counters)
            .field("halted", &self.halted)
            .field("ticks", &self.ticks)
            .finish()
    }
}

impl PolicyEngine {
    /// Build an engine for a validated policy using the standard classifier.
    pub fn new(policy: PolicySet) -> Result<Self, PolicyError> {
        Self::with_classifier(policy, classifier::classify)
    }

    /// Build an engine with a substitute classifier.
    pub fn with_classifier(policy: PolicySet, classifier: Classifier) -> Result<Self, PolicyError> {
        policy.validate()?;
        let counters = policy
            .rules
            .iter()
            .filter(|r| matches!(r, Rule::Sustained { .. }))
            .map(|r| SustainedCondition::new(r.id().clone()))
            .collect();
        Ok(Self {
            policy,
            classifier,
            log: ViolationLog::new(),
            counters,
            halted: None,
            ticks: 0,
        })
    }

    /// Evaluate one signal at monotonic instant `now`.
    ///
    /// A panic during classification or rule evaluation is converted into a
    /// terminate verdict carrying [`FAIL_SAFE_REASON`].
    pub fn evaluate(&mut self, signal: &Signal, now: Instant) -> EngineVerdict {
        if let Some(verdict) = &self.halted {
            tracing::warn!(
                event = "policy.evaluate_after_halt",
                policy = %self.policy.name,
                "evaluation requested after termination; ignoring signal"
            );
            return verdict.clone();
        }

        self.ticks += 1;
        METRICS.inc_ticks_evaluated();

        let verdict = match catch_unwind(AssertUnwindSafe(|| self.run_rules(signal, now))) {
            Ok(verdict) => verdict,
            Err(panic) => {
                let detail = panic
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                obs::emit_evaluation_fault(&self.policy.name, self.ticks, signal, &detail);
                EngineVerdict::terminate(RuleId::new(FAIL_SAFE_RULE), FAIL_SAFE_REASON)
            }
        };

        if verdict.is_terminate() {
            self.halted = Some(verdict.clone());
        }
        verdict
    }

    fn run_rules(&mut self, signal: &Signal, now: Instant) -> EngineVerdict {
        for event in (self.classifier)(signal, now) {
            obs::emit_violation_recorded(event.kind, event.severity, self.log.len());
            METRICS.record_violation(event.severity);
            self.log.append(event);
        }

        for rule in &self.policy.rules {
            if let Rule::Immediate { id, when, reason } = rule {
                if when.matches(signal) {
                    return EngineVerdict::terminate(id.clone(), reason.clone());
                }
            }
        }

        let mut fired = None;
        let sustained = self
            .policy
            .rules
            .iter()
            .filter(|r| matches!(r, Rule::Sustained { .. }));
        for (rule, counter) in sustained.zip(self.counters.iter_mut()) {
            let Rule::Sustained { id, arms, ticks } = rule else {
                continue;
            };
            match arms.iter().find(|arm| arm.when.matches(signal)) {
                Some(arm) => {
                    let streak = counter.advance(now);
                    tracing::debug!(
                        rule = %id,
                        streak,
                        threshold = *ticks,
                        "sustained condition holding"
                    );
                    if streak >= *ticks && fired.is_none() {
                        fired = Some(EngineVerdict::terminate(id.clone(), arm.reason.clone()));
                    }
                }
                None => counter.reset(),
            }
        }
        if let Some(verdict) = fired {
            return verdict;
        }

        for rule in &self.policy.rules {
            if let Rule::Windowed {
                id,
                matcher,
                window,
                threshold,
                reason,
            } = rule
            {
                let count = count_in_window(&self.log, matcher, window, now);
                if count >= *threshold {
                    return EngineVerdict::terminate(id.clone(), reason.clone());
                }
            }
        }

        EngineVerdict::proceed()
    }

    pub fn policy(&self) -> &PolicySet {
        &self.policy
    }

    pub fn log(&self) -> &ViolationLog {
        &self.log
    }

    pub fn counters(&self) -> &[SustainedCondition] {
        &self.counters
    }

    /// Number of ticks evaluated before the engine halted.
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Latch a terminate verdict that did not come from a rule, such as a
    /// lost signal feed. An earlier latched verdict wins.
    pub fn halt(&mut self, rule: RuleId, reason: impl Into<String>) -> EngineVerdict {
        self.halted
            .get_or_insert_with(|| EngineVerdict::terminate(rule, reason))
            .clone()
    }

    pub fn is_halted(&self) -> bool {
        self.halted.is_some()
    }

    /// The latched terminate verdict, if any.
    pub fn halt_verdict(&self) -> Option<&EngineVerdict> {
        self.halted.as_ref()
    }
}

fn count_in_window(
    log: &ViolationLog,
    matcher: &EventMatcher,
    window: &Window,
    now: Instant,
) -> usize {
    let span = window.span();
    log.iter()
        .filter(|e| matcher.matches(e))
        .filter(|e| span.map_or(true, |w| now.saturating_duration_since(e.at) <= w))
        .count()
}
