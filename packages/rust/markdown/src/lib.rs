//! Markdown fragment parsing.
//!
//! Splits the current document into an ordered sequence of [`Fragment`]s
//! (headings, list items, paragraph lines, fenced blocks), each tagged with
//! the chain of headings it sits under. Also provides the text helpers the
//! matcher compares with: marker stripping, normalization, URL extraction.

mod links;
mod normalize;
mod syntax;

use tracing::{debug, instrument};

use chronomark_shared::{ChronoError, Fragment, FragmentKind, Result, SectionPath};

pub use links::{canonicalize as canonicalize_url, extract_urls};
pub use normalize::normalize;
pub use syntax::{is_thematic_break, strip_marker};

use syntax::{Fence, LineSyntax, classify};

// ---------------------------------------------------------------------------
// Parser
// ---------------------------------------------------------------------------

/// A fenced block being collected.
struct OpenFence {
    fence: Fence,
    start_line: usize,
    raw: Vec<String>,
    content: Vec<String>,
}

/// Mutable state while walking the document.
#[derive(Default)]
struct ParseState {
    fragments: Vec<Fragment>,
    path: SectionPath,
    /// Indentation widths of the current list run, outermost first.
    list_indents: Vec<usize>,
}

impl ParseState {
    fn push(&mut self, kind: FragmentKind, text: &str, raw: &str, line: usize) {
        let index = self.fragments.len();
        self.fragments.push(Fragment::new(
            kind,
            text,
            raw,
            self.path.clone(),
            index,
            line,
        ));
    }

    /// Normalize an indentation width to a nesting depth within the current list run.
    fn list_depth(&mut self, indent: usize) -> usize {
        while self.list_indents.last().is_some_and(|&top| top > indent) {
            self.list_indents.pop();
        }
        if self.list_indents.last() != Some(&indent) {
            self.list_indents.push(indent);
        }
        self.list_indents.len() - 1
    }

    fn close_fence(&mut self, open: OpenFence) {
        let content = open.content.join("\n");
        let raw = open.raw.join("\n");
        self.list_indents.clear();
        self.push(
            FragmentKind::ParagraphText { fenced: true },
            &content,
            &raw,
            open.start_line,
        );
    }
}

/// Parse the current document into fragments.
///
/// Rules:
/// - ATX headings become `heading` fragments and update the section path
/// - List items become `list-item` fragments with a normalized depth
/// - Every other non-blank line is its own `paragraph-text` fragment
/// - A fenced code block is one opaque `paragraph-text` fragment
/// - Blank lines separate, they are never fragments
///
/// Fails with an input error when the document is empty or blank.
#[instrument(skip_all, fields(input_len = document.len()))]
pub fn parse_fragments(document: &str) -> Result<Vec<Fragment>> {
    let document = document.strip_prefix('\u{feff}').unwrap_or(document);
    if document.trim().is_empty() {
        return Err(ChronoError::input("document is empty, nothing to process"));
    }

    let mut state = ParseState::default();
    let mut fence: Option<OpenFence> = None;

    for (idx, line) in document.lines().enumerate() {
        let line_no = idx + 1;

        if let Some(open) = fence.as_mut() {
            open.raw.push(line.trim_end().to_string());
            if open.fence.is_closed_by(line) {
                if let Some(done) = fence.take() {
                    state.close_fence(done);
                }
            } else {
                open.content.push(line.trim_end().to_string());
            }
            continue;
        }

        match classify(line) {
            LineSyntax::Blank => {}
            LineSyntax::FenceOpen(f) => {
                fence = Some(OpenFence {
                    fence: f,
                    start_line: line_no,
                    raw: vec![line.trim_end().to_string()],
                    content: Vec::new(),
                });
            }
            LineSyntax::Heading { level, title } => {
                state.list_indents.clear();
                state.push(FragmentKind::Heading { level }, title, line.trim_end(), line_no);
                state.path.enter(level, title);
            }
            LineSyntax::ListItem {
                indent,
                marker,
                text,
            } => {
                let depth = state.list_depth(indent);
                state.push(
                    FragmentKind::ListItem {
                        depth,
                        marker: marker.to_string(),
                    },
                    text,
                    line.trim_end(),
                    line_no,
                );
            }
            LineSyntax::Text(text) => {
                // Indented text continues a list item; only flush-left text ends the run.
                if !line.starts_with([' ', '\t']) {
                    state.list_indents.clear();
                }
                state.push(
                    FragmentKind::ParagraphText { fenced: false },
                    text,
                    line.trim_end(),
                    line_no,
                );
            }
        }
    }

    // An unclosed fence runs to the end of the document.
    if let Some(open) = fence.take() {
        debug!(line = open.start_line, "unclosed code fence");
        state.close_fence(open);
    }

    debug!(fragments = state.fragments.len(), "document parsed");
    Ok(state.fragments)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
