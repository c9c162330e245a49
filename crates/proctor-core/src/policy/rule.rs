//! Rules and policy sets for the disqualification engine.
//!
//! A [`Rule`] is one of three kinds, always evaluated in this order:
//! Immediate, then Sustained, then Windowed. Declaration order only matters
//! among rules of the same kind.

use std::collections::HashSet;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::domain::{
    FaceVisibility, GazeClass, PolicyError, Severity, Signal, ViolationEvent, ViolationKind,
};

/// Stable identifier of a rule, reported with every terminate verdict.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RuleId(pub String);

impl RuleId {
    pub fn new(id: impl Into<String>) -> Self {
        RuleId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for RuleId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Predicate over a raw [`Signal`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SignalCondition {
    FaceCountAbove { count: u32 },
    FaceCountEquals { count: u32 },
    VisibilityIs { visibility: FaceVisibility },
    GazeIs { gaze: GazeClass },
    AnyOf { conditions: Vec<SignalCondition> },
    AllOf { conditions: Vec<SignalCondition> },
}

impl SignalCondition {
    pub fn matches(&self, signal: &Signal) -> bool {
        match self {
            SignalCondition::FaceCountAbove { count } => signal.face_count > *count,
            SignalCondition::FaceCountEquals { count } => signal.face_count == *count,
            SignalCondition::VisibilityIs { visibility } => signal.face_visibility == *visibility,
            SignalCondition::GazeIs { gaze } => signal.gaze == *gaze,
            SignalCondition::AnyOf { conditions } => conditions.iter().any(|c| c.matches(signal)),
            SignalCondition::AllOf { conditions } => conditions.iter().all(|c| c.matches(signal)),
        }
    }
}

/// One arm of a sustained rule: the predicate and the reason reported if
/// this arm was the one holding when the threshold was reached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SustainedArm {
    pub when: SignalCondition,
    pub reason: String,
}

/// Predicate over classified events. An empty `kinds` list matches any kind.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct EventMatcher {
    #[serde(default)]
    pub severity: Option<Severity>,
    #[serde(default)]
    pub kinds: Vec<ViolationKind>,
}

impl EventMatcher {
    pub fn severity(severity: Severity) -> Self {
        Self {
            severity: Some(severity),
            kinds: Vec::new(),
        }
    }

    pub fn kinds(kinds: impl IntoIterator<Item = ViolationKind>) -> Self {
        Self {
            severity: None,
            kinds: kinds.into_iter().collect(),
        }
    }

    pub fn matches(&self, event: &ViolationEvent) -> bool {
        self.severity.map_or(true, |s| event.severity == s)
            && (self.kinds.is_empty() || self.kinds.contains(&event.kind))
    }
}

/// Time span a windowed rule counts over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Window {
    /// Events with `now - at <= millis`.
    Trailing { millis: u64 },
    /// Every event since the session began.
    SessionLifetime,
}

impl Window {
    pub fn trailing(duration: Duration) -> Self {
        Window::Trailing {
            millis: duration.as_millis() as u64,
        }
    }

    /// `None` for session-lifetime windows.
    pub fn span(&self) -> Option<Duration> {
        match self {
            Window::Trailing { millis } => Some(Duration::from_millis(*millis)),
            Window::SessionLifetime => None,
        }
    }
}

/// A single disqualification rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Rule {
    /// Terminate on the first signal matching `when`.
    Immediate {
        id: RuleId,
        when: SignalCondition,
        reason: String,
    },
    /// Terminate when any of `arms` holds for `ticks` consecutive
    /// evaluations. One non-matching tick resets the streak.
    Sustained {
        id: RuleId,
        arms: Vec<SustainedArm>,
        ticks: u32,
    },
    /// Terminate when `threshold` matching events fall inside `window`.
    Windowed {
        id: RuleId,
        matcher: EventMatcher,
        window: Window,
        threshold: usize,
        reason: String,
    },
}

impl Rule {
    pub fn id(&self) -> &RuleId {
        match self {
            Rule::Immediate { id, .. } | Rule::Sustained { id, .. } | Rule::Windowed { id, .. } => {
                id
            }
        }
    }

    fn validate(&self) -> Result<(), PolicyError> {
        let invalid = |reason: &str| PolicyError::InvalidRule {
            rule_id: self.id().to_string(),
            reason: reason.to_string(),
        };
        match self {
            Rule::Immediate { .. } => Ok(()),
            Rule::Sustained { arms, ticks, .. } => {
                if arms.is_empty() {
                    return Err(invalid("sustained rule needs at least one arm"));
                }
                if *ticks == 0 {
                    return Err(invalid("tick threshold must be at least 1"));
                }
                Ok(())
            }
            Rule::Windowed {
                window, threshold, ..
            } => {
                if *threshold == 0 {
                    return Err(invalid("threshold must be at least 1"));
                }
                if let Window::Trailing { millis: 0 } = window {
                    return Err(invalid("trailing window must be non-empty"));
                }
                Ok(())
            }
        }
    }
}

/// A named, ordered collection of rules.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicySet {
    pub name: String,
    pub rules: Vec<Rule>,
}

impl PolicySet {
    /// An empty policy: never terminates.
    pub fn empty(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            rules: Vec::new(),
        }
    }

    /// Append a rule (builder pattern).
    pub fn with_rule(mut self, rule: Rule) -> Self {
        self.rules.push(rule);
        self
    }

    /// Look up a preset by name (`"enrollment"` or `"live_interview"`).
    pub fn named(name: &str) -> Result<Self, PolicyError> {
        match name {
            "enrollment" => Ok(Self::enrollment()),
            "live_interview" | "live" | "interview" => Ok(Self::live_interview()),
            other => Err(PolicyError::UnknownPolicy(other.to_string())),
        }
    }

    /// Policy applied while capturing biometric enrollment samples.
    ///
    /// - three critical events over the whole capture
    /// - five warning events inside any 10 second span
    pub fn enrollment() -> Self {
        Self::empty("enrollment")
            .with_rule(Rule::Windowed {
                id: RuleId::new("enrollment_critical_strikes"),
                matcher: EventMatcher::severity(Severity::Critical),
                window: Window::SessionLifetime,
                threshold: 3,
                reason: "security breach: repeated critical violations".into(),
            })
            .with_rule(Rule::Windowed {
                id: RuleId::new("enrollment_warning_burst"),
                matcher: EventMatcher::severity(Severity::Warning),
                window: Window::trailing(Duration::from_secs(10)),
                threshold: 5,
                reason: "security breach: too many warnings within 10 seconds".into(),
            })
    }

    /// Policy applied during the live interview.
    ///
    /// Multiple faces terminate at once. No face, or a face that cannot be
    /// seen, terminates after five consecutive 2 second ticks. Partial faces
    /// and gaze events are recorded for audit only.
    pub fn live_interview() -> Self {
        Self::empty("live_interview")
            .with_rule(Rule::Immediate {
                id: RuleId::new("multiple_faces"),
                when: SignalCondition::FaceCountAbove { count: 1 },
                reason: "multiple faces detected".into(),
            })
            .with_rule(Rule::Sustained {
                id: RuleId::new("face_missing"),
                arms: vec![
                    SustainedArm {
                        when: SignalCondition::FaceCountEquals { count: 0 },
                        reason: "no face detected for 10 seconds or more".into(),
                    },
                    SustainedArm {
                        when: SignalCondition::VisibilityIs {
                            visibility: FaceVisibility::NotVisible,
                        },
                        reason: "face not visible for 10 seconds or more".into(),
                    },
                ],
                ticks: 5,
            })
    }

    /// Check thresholds, windows and id uniqueness.
    pub fn validate(&self) -> Result<(), PolicyError> {
        let mut seen = HashSet::new();
        for rule in &self.rules {
            if !seen.insert(rule.id().clone()) {
                return Err(PolicyError::DuplicateRuleId(rule.id().to_string()));
            }
            rule.validate()?;
        }
        Ok(())
    }
}
