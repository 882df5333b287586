//! Text normalization passes used by the normalized and fuzzy match stages.
//!
//! Each pass is a function `&str -> String` applied in sequence.

/// Characters trimmed from either end of a normalized line.
const EDGE_PUNCTUATION: &[char] = &['.', ',', ';', ':', '!', '?', '…'];

/// Run the full normalization pipeline on one line of text.
pub fn normalize(text: &str) -> String {
    let mut result = collapse_whitespace(text);
    result = case_fold(&result);
    result = trim_edge_punctuation(&result);
    result
}

// ---------------------------------------------------------------------------
// Pass 1: Collapse whitespace runs
// ---------------------------------------------------------------------------

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

// ---------------------------------------------------------------------------
// Pass 2: Case folding
// ---------------------------------------------------------------------------

fn case_fold(text: &str) -> String {
    text.to_lowercase()
}

// ---------------------------------------------------------------------------
// Pass 3: Trim punctuation at line ends
// ---------------------------------------------------------------------------

fn trim_edge_punctuation(text: &str) -> String {
    text.trim_matches(|c: char| c.is_whitespace() || EDGE_PUNCTUATION.contains(&c))
        .to_string()
}
