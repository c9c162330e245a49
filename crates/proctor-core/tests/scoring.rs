use std::collections::BTreeMap;

use proctor_core::{score, Rubric, RubricEntry, ScoreCard, ScoringTiers};

fn sheet(pairs: &[(usize, String)]) -> BTreeMap<usize, String> {
    pairs.iter().cloned().collect()
}

#[test]
fn test_long_answer_earns_upper_tier() {
    let rubric = Rubric::new(vec![RubricEntry::new(10, 20)]);
    let card = score(&sheet(&[(0, "z".repeat(150))]), &rubric);
    assert_eq!(card.raw_score, 8);
    assert_eq!(card.max_score, 10);
    assert_eq!(card.questions[0].answer_length, 150);
}

#[test]
fn test_tier_boundaries_are_exclusive() {
    let rubric = Rubric::new(vec![
        RubricEntry::new(10, 20),
        RubricEntry::new(10, 20),
        RubricEntry::new(10, 20),
        RubricEntry::new(10, 20),
    ]);
    let card = score(
        &sheet(&[
            (0, "a".repeat(20)),
            (1, "a".repeat(21)),
            (2, "a".repeat(100)),
            (3, "a".repeat(101)),
        ]),
        &rubric,
    );
    let awarded: Vec<u32> = card.questions.iter().map(|q| q.awarded).collect();
    assert_eq!(awarded, vec![0, 6, 6, 8]);
}

#[test]
fn test_whitespace_does_not_count() {
    let rubric = Rubric::new(vec![RubricEntry::new(10, 20)]);
    let padded = format!("   {}   \n\n", "b".repeat(20));
    let card = score(&sheet(&[(0, padded)]), &rubric);
    assert_eq!(card.raw_score, 0);
}

#[test]
fn test_padding_does_not_reach_upper_tier() {
    let rubric = Rubric::new(vec![RubricEntry::new(10, 20)]);
    let padded = format!("{}{}", "c".repeat(95), " ".repeat(10));
    let card = score(&sheet(&[(0, padded)]), &rubric);
    assert_eq!(card.questions[0].answer_length, 95);
    assert_eq!(card.raw_score, 6);
}

#[test]
fn test_full_coding_round() {
    let rubric = Rubric::coding_round();
    let answers: BTreeMap<usize, String> =
        (0..rubric.len()).map(|i| (i, "w".repeat(120))).collect();
    let card = score(&answers, &rubric);
    // six 10-point questions at 8, four 8-point questions at 6
    assert_eq!(card.raw_score, 6 * 8 + 4 * 6);
    assert_eq!(card.max_score, 92);
    assert_eq!(card.percentage(), 78);
}

#[test]
fn test_custom_tiers() {
    let rubric = Rubric::new(vec![RubricEntry::new(20, 10)]).with_tiers(ScoringTiers {
        lower_fraction: 0.5,
        upper_fraction: 1.0,
        upper_length: 40,
    });
    assert_eq!(score(&sheet(&[(0, "c".repeat(30))]), &rubric).raw_score, 10);
    assert_eq!(score(&sheet(&[(0, "c".repeat(41))]), &rubric).raw_score, 20);
}

#[test]
fn test_disqualified_card() {
    let rubric = Rubric::coding_round();
    let card = ScoreCard::disqualified(&rubric);
    assert_eq!(card.raw_score, 0);
    assert_eq!(card.percentage(), 0);
    assert_eq!(card.max_score, 92);
}
