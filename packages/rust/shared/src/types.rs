//! Core domain types shared by every pipeline stage.

use chrono::{DateTime, FixedOffset, NaiveDate};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// HistoryEvent
// ---------------------------------------------------------------------------

/// A single "line added" occurrence recovered from version-control history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEvent {
    /// Calendar date of the commit, in the commit's own UTC offset.
    pub date: NaiveDate,
    /// Full commit timestamp.
    pub timestamp: DateTime<FixedOffset>,
    /// Line content as added, without the `+` prefix.
    pub text: String,
    /// Object id of the commit that added the line.
    pub commit: String,
    /// 1-based line number in the post-image, when the hunk header allowed tracking it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_line_number: Option<usize>,
}

impl HistoryEvent {
    pub fn new(
        timestamp: DateTime<FixedOffset>,
        text: impl Into<String>,
        commit: impl Into<String>,
        source_line_number: Option<usize>,
    ) -> Self {
        Self {
            date: timestamp.date_naive(),
            timestamp,
            text: text.into(),
            commit: commit.into(),
            source_line_number,
        }
    }
}

// ---------------------------------------------------------------------------
// Section path
// ---------------------------------------------------------------------------

/// One heading on a fragment's section path.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SectionHeading {
    /// ATX level (1-6).
    pub level: u8,
    /// Heading title, without markers.
    pub title: String,
}

/// The chain of enclosing headings above a fragment, outermost first.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SectionPath(pub Vec<SectionHeading>);

impl SectionPath {
    /// Label used when a fragment precedes every heading.
    pub const ROOT_LABEL: &'static str = "General";

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn headings(&self) -> &[SectionHeading] {
        &self.0
    }

    /// Innermost heading title, if any.
    pub fn leaf(&self) -> Option<&str> {
        self.0.last().map(|h| h.title.as_str())
    }

    /// Enter a heading at `level`: drop every entry at the same or a deeper
    /// level, then push the new heading.
    pub fn enter(&mut self, level: u8, title: impl Into<String>) {
        self.0.retain(|h| h.level < level);
        self.0.push(SectionHeading {
            level,
            title: title.into(),
        });
    }

    /// Human-readable label for output sub-blocks.
    ///
    /// Level-1 headings are usually the document title, so they are left out
    /// unless nothing else is on the path.
    pub fn label(&self) -> String {
        let inner: Vec<&str> = self
            .0
            .iter()
            .filter(|h| h.level > 1)
            .map(|h| h.title.as_str())
            .collect();

        if !inner.is_empty() {
            return inner.join(" > ");
        }

        self.leaf().unwrap_or(Self::ROOT_LABEL).to_string()
    }
}

// ---------------------------------------------------------------------------
// Fragment
// ---------------------------------------------------------------------------

/// Structural kind of a fragment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum FragmentKind {
    /// ATX heading.
    Heading { level: u8 },
    /// List item with its normalized nesting depth and original marker.
    ListItem { depth: usize, marker: String },
    /// Any other text line, or a whole fenced code block.
    ParagraphText { fenced: bool },
}

impl FragmentKind {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Heading { .. } => "heading",
            Self::ListItem { .. } => "list-item",
            Self::ParagraphText { .. } => "paragraph-text",
        }
    }
}

/// How a fragment got its date.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MatchMethod {
    Exact,
    Normalized,
    Fuzzy,
    LinkBoosted,
    Inferred,
    #[default]
    Unmatched,
}

impl MatchMethod {
    /// Whether the date comes from direct history evidence.
    pub fn is_direct(self) -> bool {
        matches!(
            self,
            Self::Exact | Self::Normalized | Self::Fuzzy | Self::LinkBoosted
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Exact => "exact",
            Self::Normalized => "normalized",
            Self::Fuzzy => "fuzzy",
            Self::LinkBoosted => "link-boosted",
            Self::Inferred => "inferred",
            Self::Unmatched => "unmatched",
        }
    }
}

impl std::fmt::Display for MatchMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One structurally meaningful unit of the current document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fragment {
    /// Structural kind.
    #[serde(flatten)]
    pub kind: FragmentKind,
    /// Content with marker syntax and indentation removed. For a fenced
    /// block, the lines between the fences.
    pub text: String,
    /// Source lines exactly as they appear in the document.
    pub raw: String,
    /// Enclosing headings at the fragment's original location.
    pub section_path: SectionPath,
    /// Position in the parsed fragment sequence.
    pub original_index: usize,
    /// 1-based line number of the fragment's first line.
    pub line: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub matched_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub match_confidence: Option<f64>,
    #[serde(default)]
    pub match_method: MatchMethod,
    /// Commit of the matched history event (direct matches only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub matched_commit: Option<String>,
}

impl Fragment {
    pub fn new(
        kind: FragmentKind,
        text: impl Into<String>,
        raw: impl Into<String>,
        section_path: SectionPath,
        original_index: usize,
        line: usize,
    ) -> Self {
        Self {
            kind,
            text: text.into(),
            raw: raw.into(),
            section_path,
            original_index,
            line,
            matched_date: None,
            match_confidence: None,
            match_method: MatchMethod::Unmatched,
            matched_commit: None,
        }
    }

    /// Text used when comparing against history.
    ///
    /// History is line oriented, so a fenced block is probed by its first
    /// non-blank content line.
    pub fn probe_text(&self) -> &str {
        match self.kind {
            FragmentKind::ParagraphText { fenced: true } => self
                .text
                .lines()
                .map(str::trim)
                .find(|l| !l.is_empty())
                .unwrap_or(""),
            _ => self.text.trim(),
        }
    }

    pub fn is_dated(&self) -> bool {
        self.matched_date.is_some()
    }
}

// ---------------------------------------------------------------------------
// Diagnostics
// ---------------------------------------------------------------------------

/// A fragment that could not be dated and was left out of the output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnresolvedFragment {
    pub original_index: usize,
    pub line: usize,
    pub text: String,
    pub reason: String,
}

/// Match-rate diagnostics for one run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Diagnostics {
    pub total: usize,
    pub exact: usize,
    pub normalized: usize,
    pub fuzzy: usize,
    pub link_boosted: usize,
    pub inferred: usize,
    pub unmatched: usize,
    /// (matched + inferred) / total, 0 when there are no fragments.
    pub match_rate: f64,
    /// History events extracted.
    pub history_events: usize,
    /// Commit blocks skipped for a malformed header.
    pub skipped_commits: usize,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub unresolved: Vec<UnresolvedFragment>,
}

impl Diagnostics {
    /// Fragments dated by direct history evidence.
    pub fn matched(&self) -> usize {
        self.exact + self.normalized + self.fuzzy + self.link_boosted
    }

    pub fn count(&self, method: MatchMethod) -> usize {
        match method {
            MatchMethod::Exact => self.exact,
            MatchMethod::Normalized => self.normalized,
            MatchMethod::Fuzzy => self.fuzzy,
            MatchMethod::LinkBoosted => self.link_boosted,
            MatchMethod::Inferred => self.inferred,
            MatchMethod::Unmatched => self.unmatched,
        }
    }
}
