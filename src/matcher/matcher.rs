use crate::form::form_model::SelectOption;

// ============================================================================
// Fuzzy option matcher
// ============================================================================
//
// Pure and deterministic: the same target and candidate list always produce
// the same result. Scores are 0-100; ties keep the first candidate in input
// order, so appending a weaker candidate can never change the winner.

/// Best candidate for a target string, with its similarity score.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Match {
    pub index: usize,
    pub text: String,
    pub score: u8,
}

/// Normalized similarity between two strings on a 0-100 scale.
///
/// Takes the maximum of three ratios so that word order, trailing text and
/// partial overlap are all tolerated: "united states" scores 100 against
/// "United States of America" because it is an exact substring window.
pub fn similarity(a: &str, b: &str) -> u8 {
    let a = normalize(a);
    let b = normalize(b);
    if a.is_empty() || b.is_empty() {
        return if a == b { 100 } else { 0 };
    }
    if a == b {
        return 100;
    }

    let whole = strsim::normalized_levenshtein(&a, &b);
    let token_sorted = strsim::normalized_levenshtein(&token_sort(&a), &token_sort(&b));
    let partial = partial_ratio(&a, &b);

    to_score(whole.max(token_sorted).max(partial))
}

/// Pick the best-scoring candidate at or above `threshold`.
pub fn best_match(target: &str, candidates: &[&str], threshold: u8) -> Option<Match> {
    let mut best: Option<Match> = None;
    for (index, candidate) in candidates.iter().enumerate() {
        let score = similarity(target, candidate);
        // Strict comparison keeps the first candidate on equal scores.
        if best.as_ref().map_or(true, |m| score > m.score) {
            best = Some(Match {
                index,
                text: (*candidate).to_string(),
                score,
            });
        }
    }
    best.filter(|m| m.score >= threshold)
}

/// Match a proposed value against a closed option set, scoring each option by
/// the better of its display text and its value attribute (values are what
/// actually get submitted, and sometimes what the profile holds).
pub fn match_option<'a>(
    target: &str,
    options: &'a [SelectOption],
    threshold: u8,
) -> Option<(&'a SelectOption, u8)> {
    let mut best: Option<(&SelectOption, u8)> = None;
    for option in options {
        let score = similarity(target, &option.text).max(similarity(target, &option.value));
        if best.map_or(true, |(_, s)| score > s) {
            best = Some((option, score));
        }
    }
    best.filter(|(_, score)| *score >= threshold)
}

// ============================================================================
// Score components
// ============================================================================

fn normalize(s: &str) -> String {
    s.trim().to_lowercase()
}

fn token_sort(s: &str) -> String {
    let mut tokens: Vec<&str> = s.split_whitespace().collect();
    tokens.sort_unstable();
    tokens.join(" ")
}

/// Best similarity of the shorter string against any equal-length character
/// window of the longer one. An exact substring yields 1.0.
fn partial_ratio(a: &str, b: &str) -> f64 {
    let (short, long) = if a.chars().count() <= b.chars().count() {
        (a, b)
    } else {
        (b, a)
    };
    let long_chars: Vec<char> = long.chars().collect();
    let window = short.chars().count();
    if window == 0 || window > long_chars.len() {
        return 0.0;
    }

    let mut best = 0.0f64;
    for start in 0..=(long_chars.len() - window) {
        let slice: String = long_chars[start..start + window].iter().collect();
        let ratio = strsim::normalized_levenshtein(short, &slice);
        if ratio > best {
            best = ratio;
        }
        if best >= 1.0 {
            break;
        }
    }
    best
}

fn to_score(ratio: f64) -> u8 {
    (ratio * 100.0).round().clamp(0.0, 100.0) as u8
}
