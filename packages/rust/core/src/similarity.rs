//! Character-level similarity used by the fuzzy and link-boosted stages.

use similar::{DiffTag, TextDiff};

/// Diff ratio `2·M / (|a| + |b|)` where `M` is the number of characters the
/// two strings share in order. Degenerate (empty) input scores 0.
pub fn similarity(a: &str, b: &str) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let total = a.chars().count() + b.chars().count();
    2.0 * shared_chars(a, b) as f64 / total as f64
}

/// Share of the shorter string found, in order, inside the longer one:
/// `M / min(|a|, |b|)`. A short entry quoted inside a long rewrite scores
/// high here even though its diff ratio is diluted by the extra prose.
pub fn containment(a: &str, b: &str) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let shorter = a.chars().count().min(b.chars().count());
    shared_chars(a, b) as f64 / shorter as f64
}

/// Characters in the longest common subsequence found by the diff.
fn shared_chars(a: &str, b: &str) -> usize {
    TextDiff::from_chars(a, b)
        .ops()
        .iter()
        .filter(|op| op.tag() == DiffTag::Equal)
        .map(|op| op.old_range().len())
        .sum()
}

/// Highest similarity two strings of these lengths could reach.
///
/// Never below the real score, so anything at or under the threshold here
/// can be skipped without changing which candidate wins.
pub fn upper_bound(a_len: usize, b_len: usize) -> f64 {
    let total = a_len + b_len;
    if a_len == 0 || b_len == 0 {
        return 0.0;
    }
    2.0 * a_len.min(b_len) as f64 / total as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_strings_score_one() {
        assert_eq!(similarity("batch export to csv", "batch export to csv"), 1.0);
    }

    #[test]
    fn empty_input_scores_zero() {
        assert_eq!(similarity("", "anything"), 0.0);
        assert_eq!(similarity("anything", ""), 0.0);
        assert_eq!(similarity("", ""), 0.0);
        assert_eq!(upper_bound(0, 5), 0.0);
    }

    #[test]
    fn disjoint_strings_score_zero() {
        assert_eq!(similarity("abc", "xyz"), 0.0);
    }

    #[test]
    fn partial_overlap() {
        // "abcd" vs "abxd": three shared characters out of eight.
        assert!((similarity("abcd", "abxd") - 0.75).abs() < 1e-12);
    }

    #[test]
    fn counts_characters_not_bytes() {
        assert!((similarity("café", "cafe") - 0.75).abs() < 1e-12);
    }

    #[test]
    fn containment_measures_the_shorter_side() {
        assert_eq!(containment("fast tool", "a fast and popular tool"), 1.0);
        assert_eq!(containment("a fast and popular tool", "fast tool"), 1.0);
        assert!((containment("abcd", "abxd") - 0.75).abs() < 1e-12);
        assert_eq!(containment("", "abc"), 0.0);
        assert!(containment("fast tool", "a fast and popular tool") > similarity("fast tool", "a fast and popular tool"));
    }

    #[test]
    fn bound_is_never_below_score() {
        let pairs = [
            ("a curated list of models", "a curated list of models & tools"),
            ("feature 1 added recently", "feature 2 added long ago"),
            ("x", "xxxxxxxx"),
        ];
        for (a, b) in pairs {
            let bound = upper_bound(a.chars().count(), b.chars().count());
            assert!(similarity(a, b) <= bound, "{a} / {b}");
        }
    }
}
