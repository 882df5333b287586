//! Line-level markdown syntax recognition.
//!
//! Shared by the fragment parser and by marker stripping of history lines,
//! so both sides of a comparison see the same structure.

use std::sync::LazyLock;

use regex::Regex;

/// Matches an ATX heading and captures its hashes and title.
static HEADING_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^ {0,3}(#{1,6})[ \t]+(.+?)(?:[ \t]+#+)?[ \t]*$").expect("heading regex")
});

/// Matches a bullet or ordered list item with non-empty text.
static LIST_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([ \t]*)([-*+]|\d{1,9}[.)])[ \t]+(.*\S)[ \t]*$").expect("list regex")
});

/// Matches a thematic break (`---`, `* * *`, `___`).
static THEMATIC_BREAK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^ {0,3}(?:(?:-[ \t]*){3,}|(?:\*[ \t]*){3,}|(?:_[ \t]*){3,})$")
        .expect("thematic break regex")
});

/// Matches an opening code fence and captures the fence run.
static FENCE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^ {0,3}(`{3,}|~{3,})").expect("fence regex")
});

/// Structural reading of a single line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum LineSyntax<'a> {
    Blank,
    Heading {
        level: u8,
        title: &'a str,
    },
    ListItem {
        indent: usize,
        marker: &'a str,
        text: &'a str,
    },
    FenceOpen(Fence),
    Text(&'a str),
}

/// An open code fence: its character and run length.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Fence {
    pub ch: char,
    pub len: usize,
}

impl Fence {
    /// A closing fence uses the same character, at least as many of them,
    /// and nothing else on the line.
    pub fn is_closed_by(&self, line: &str) -> bool {
        let trimmed = line.trim();
        let run = trimmed.chars().take_while(|c| *c == self.ch).count();
        run >= self.len && run == trimmed.chars().count()
    }
}

/// Classify one line (without its newline).
pub(crate) fn classify(line: &str) -> LineSyntax<'_> {
    if line.trim().is_empty() {
        return LineSyntax::Blank;
    }

    if let Some(caps) = FENCE_RE.captures(line) {
        let run = &caps[1];
        let ch = if run.starts_with('`') { '`' } else { '~' };
        return LineSyntax::FenceOpen(Fence {
            ch,
            len: run.len(),
        });
    }

    if let Some(caps) = HEADING_RE.captures(line) {
        if let (Some(hashes), Some(title)) = (caps.get(1), caps.get(2)) {
            return LineSyntax::Heading {
                level: hashes.as_str().len() as u8,
                title: title.as_str().trim(),
            };
        }
    }

    if THEMATIC_BREAK_RE.is_match(line) {
        return LineSyntax::Text(line.trim());
    }

    if let Some(caps) = LIST_RE.captures(line) {
        if let (Some(indent), Some(marker), Some(text)) = (caps.get(1), caps.get(2), caps.get(3)) {
            return LineSyntax::ListItem {
                indent: indent_width(indent.as_str()),
                marker: marker.as_str(),
                text: text.as_str().trim(),
            };
        }
    }

    LineSyntax::Text(line.trim())
}

/// Indentation width in columns; a tab counts as four.
fn indent_width(ws: &str) -> usize {
    ws.chars().map(|c| if c == '\t' { 4 } else { 1 }).sum()
}

/// Whether `line` is a thematic break (`---`, `* * *`, `___`).
pub fn is_thematic_break(line: &str) -> bool {
    THEMATIC_BREAK_RE.is_match(line)
}

/// Content of a line with heading or list marker syntax removed.
pub fn strip_marker(line: &str) -> &str {
    match classify(line) {
        LineSyntax::Heading { title, .. } => title,
        LineSyntax::ListItem { text, .. } => text,
        LineSyntax::Text(text) => text,
        LineSyntax::Blank | LineSyntax::FenceOpen(_) => line.trim(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_headings() {
        assert_eq!(
            classify("## Features"),
            LineSyntax::Heading {
                level: 2,
                title: "Features"
            }
        );
        assert_eq!(
            classify("### Closed heading ###"),
            LineSyntax::Heading {
                level: 3,
                title: "Closed heading"
            }
        );
        assert_eq!(classify("#hashtag"), LineSyntax::Text("#hashtag"));
        assert_eq!(classify("####### seven"), LineSyntax::Text("####### seven"));
    }

    #[test]
    fn classifies_list_items() {
        assert_eq!(
            classify("    * [Tool](https://x.dev) - desc"),
            LineSyntax::ListItem {
                indent: 4,
                marker: "*",
                text: "[Tool](https://x.dev) - desc"
            }
        );
        assert_eq!(
            classify("\t12) twelfth"),
            LineSyntax::ListItem {
                indent: 4,
                marker: "12)",
                text: "twelfth"
            }
        );
        assert_eq!(classify("*emphasis* first"), LineSyntax::Text("*emphasis* first"));
        assert_eq!(classify("-"), LineSyntax::Text("-"));
    }

    #[test]
    fn thematic_breaks_are_text() {
        assert_eq!(classify("---"), LineSyntax::Text("---"));
        assert_eq!(classify("* * *"), LineSyntax::Text("* * *"));
        assert!(is_thematic_break("---"));
        assert!(is_thematic_break("_ _ _"));
        assert!(!is_thematic_break("--"));
        assert!(!is_thematic_break("- item"));
    }

    #[test]
    fn fences_open_and_close() {
        let LineSyntax::FenceOpen(fence) = classify("````rust") else {
            panic!("expected fence");
        };
        assert_eq!(fence, Fence { ch: '`', len: 4 });
        assert!(!fence.is_closed_by("```"));
        assert!(fence.is_closed_by("`````"));
        assert!(!fence.is_closed_by("~~~~"));
        assert!(!fence.is_closed_by("```` trailing"));
    }

    #[test]
    fn strip_marker_removes_syntax() {
        assert_eq!(strip_marker("## Features"), "Features");
        assert_eq!(strip_marker("  - Feature 2 added long ago"), "Feature 2 added long ago");
        assert_eq!(strip_marker("1. First"), "First");
        assert_eq!(strip_marker("  plain text  "), "plain text");
    }
}
