mod common;

use common::option;
use form_autofill::matcher::matcher::{best_match, match_option, similarity};

// ============================================================================
// similarity
// ============================================================================

#[test]
fn test_exact_match_scores_100() {
    assert_eq!(similarity("Canada", "Canada"), 100, "identical strings");
}

#[test]
fn test_normalization_ignores_case_and_whitespace() {
    assert_eq!(
        similarity("  united STATES  ", "United States"),
        100,
        "trim and lowercase before comparing"
    );
}

#[test]
fn test_substring_window_scores_100() {
    // "united states" is an exact character window of the longer option.
    assert_eq!(similarity("United States", "United States of America"), 100);
}

#[test]
fn test_token_order_is_tolerated() {
    let score = similarity("States United", "United States");
    assert_eq!(score, 100, "token-sorted comparison, got {}", score);
}

#[test]
fn test_unrelated_strings_score_low() {
    let score = similarity("Bhutan", "United States of America");
    assert!(score < 50, "unrelated strings should score low, got {}", score);
}

#[test]
fn test_empty_strings() {
    assert_eq!(similarity("", ""), 100);
    assert_eq!(similarity("", "Canada"), 0);
    assert_eq!(similarity("Canada", "   "), 0);
}

#[test]
fn test_similarity_is_deterministic() {
    let first = similarity("Sofware Engneer", "Software Engineer");
    for _ in 0..5 {
        assert_eq!(similarity("Sofware Engneer", "Software Engineer"), first);
    }
    assert!(first >= 85, "small typos should still score high, got {}", first);
}

// ============================================================================
// best_match
// ============================================================================

#[test]
fn test_best_match_picks_substring_country() {
    let candidates = ["United States of America", "Canada", "Mexico"];
    let m = best_match("United States", &candidates, 70).expect("should match");
    assert_eq!(m.index, 0);
    assert_eq!(m.text, "United States of America");
    assert_eq!(m.score, 100);
}

#[test]
fn test_best_match_below_threshold_is_none() {
    let candidates = ["United States of America", "Canada", "Mexico"];
    assert!(
        best_match("Bhutan", &candidates, 70).is_none(),
        "no candidate reaches the cutoff"
    );
}

#[test]
fn test_best_match_ties_keep_first_candidate() {
    let candidates = ["Remote", "Remote"];
    let m = best_match("remote", &candidates, 70).expect("should match");
    assert_eq!(m.index, 0, "equal scores keep the earlier candidate");
}

#[test]
fn test_appending_weaker_candidate_never_changes_winner() {
    let before = best_match("Engineer", &["Engineer", "Designer"], 50).expect("match");
    let after =
        best_match("Engineer", &["Engineer", "Designer", "Engineering Manager"], 50)
            .expect("match");
    assert_eq!(before.index, after.index);
    assert_eq!(before.score, after.score);
}

#[test]
fn test_best_match_empty_candidates() {
    assert!(best_match("anything", &[], 0).is_none());
}

#[test]
fn test_threshold_is_inclusive() {
    let candidates = ["Canada"];
    let m = best_match("Canada", &candidates, 100).expect("exact match at cutoff 100");
    assert_eq!(m.score, 100);
}

// ============================================================================
// match_option
// ============================================================================

#[test]
fn test_match_option_by_display_text() {
    let options = vec![option("us", "United States of America"), option("ca", "Canada")];
    let (matched, score) =
        match_option("United States", &options, 70).expect("should match by text");
    assert_eq!(matched.value, "us");
    assert_eq!(score, 100);
}

#[test]
fn test_match_option_by_value_attribute() {
    // Profiles sometimes hold the submitted value rather than the label.
    let options = vec![option("US", "United States of America"), option("CA", "Canada")];
    let (matched, score) = match_option("US", &options, 70).expect("should match by value");
    assert_eq!(matched.value, "US");
    assert_eq!(score, 100);
}

#[test]
fn test_match_option_below_threshold() {
    let options = vec![option("ca", "Canada"), option("mx", "Mexico")];
    assert!(match_option("Liechtenstein", &options, 70).is_none());
}

#[test]
fn test_match_option_prefers_higher_score() {
    let options = vec![
        option("mgr", "Engineering Manager"),
        option("eng", "Software Engineer"),
    ];
    let (matched, _) = match_option("Software Engineer", &options, 70).expect("match");
    assert_eq!(matched.value, "eng");
}
