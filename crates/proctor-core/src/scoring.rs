//! Length-tiered answer scoring.
//!
//! A placeholder heuristic: an answer longer than its question's minimum
//! earns the lower fraction of the points, one longer than the upper
//! threshold earns the higher fraction. Awards are floored to whole points.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// One question's entry in the rubric.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RubricEntry {
    pub points: u32,
    pub min_length: usize,
    /// Optional prompt shown alongside the question.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

impl RubricEntry {
    pub fn new(points: u32, min_length: usize) -> Self {
        Self {
            points,
            min_length,
            label: None,
        }
    }

    pub fn labeled(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }
}

/// Fractions awarded per tier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoringTiers {
    pub lower_fraction: f64,
    pub upper_fraction: f64,
    pub upper_length: usize,
}

impl Default for ScoringTiers {
    fn default() -> Self {
        Self {
            lower_fraction: 0.6,
            upper_fraction: 0.8,
            upper_length: 100,
        }
    }
}

/// Ordered per-question rubric plus the tier parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rubric {
    pub entries: Vec<RubricEntry>,
    #[serde(default)]
    pub tiers: ScoringTiers,
}

impl Rubric {
    pub fn new(entries: Vec<RubricEntry>) -> Self {
        Self {
            entries,
            tiers: ScoringTiers::default(),
        }
    }

    pub fn with_tiers(mut self, tiers: ScoringTiers) -> Self {
        self.tiers = tiers;
        self
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn max_score(&self) -> u32 {
        self.entries.iter().map(|e| e.points).sum()
    }

    /// The ten-question coding round: 92 points, 20 character minimum.
    pub fn coding_round() -> Self {
        let questions: [(&str, u32); 10] = [
            ("Reverse a linked list.", 10),
            ("Find the longest palindromic substring.", 10),
            ("Binary search in a sorted array.", 8),
            ("Detect a cycle in a linked list.", 10),
            ("Maximum depth of a binary tree.", 8),
            ("Merge two sorted arrays in place.", 10),
            ("First non-repeating character in a string.", 8),
            ("Implement a stack using queues.", 10),
            ("Kth largest element in an array.", 10),
            ("Check whether two strings are anagrams.", 8),
        ];
        Self::new(
            questions
                .iter()
                .map(|(label, points)| RubricEntry::new(*points, 20).labeled(*label))
                .collect(),
        )
    }
}

impl Default for Rubric {
    fn default() -> Self {
        Self::coding_round()
    }
}

/// Score for one question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionScore {
    pub index: usize,
    pub awarded: u32,
    pub points: u32,
    pub answer_length: usize,
}

/// Result of scoring a full answer sheet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreCard {
    pub raw_score: u32,
    pub max_score: u32,
    pub questions: Vec<QuestionScore>,
}

impl ScoreCard {
    /// Zero score for a disqualified session; `max_score` still reflects the rubric.
    pub fn disqualified(rubric: &Rubric) -> Self {
        Self {
            raw_score: 0,
            max_score: rubric.max_score(),
            questions: Vec::new(),
        }
    }

    /// Rounded percentage, 0 when the rubric is empty.
    pub fn percentage(&self) -> u32 {
        if self.max_score == 0 {
            return 0;
        }
        ((self.raw_score as f64 / self.max_score as f64) * 100.0).round() as u32
    }
}

/// Score `answers` (question index → text) against `rubric`.
///
/// Length is the trimmed character count. Answers for indexes outside the
/// rubric are ignored.
pub fn score(answers: &BTreeMap<usize, String>, rubric: &Rubric) -> ScoreCard {
    let tiers = &rubric.tiers;
    let questions: Vec<QuestionScore> = rubric
        .entries
        .iter()
        .enumerate()
        .map(|(index, entry)| {
            let answer_length = answers
                .get(&index)
                .map(|a| a.trim().chars().count())
                .unwrap_or(0);
            let fraction = if answer_length > entry.min_length.max(tiers.upper_length) {
                tiers.upper_fraction
            } else if answer_length > entry.min_length {
                tiers.lower_fraction
            } else {
                0.0
            };
            QuestionScore {
                index,
                awarded: (entry.points as f64 * fraction).floor() as u32,
                points: entry.points,
                answer_length,
            }
        })
        .collect();

    ScoreCard {
        raw_score: questions.iter().map(|q| q.awarded).sum(),
        max_score: rubric.max_score(),
        questions,
    }
}
