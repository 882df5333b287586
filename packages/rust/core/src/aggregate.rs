//! Month grouping and rendering of the chronological view.

use std::collections::{BTreeMap, HashMap};

use chrono::{Datelike, NaiveDate};
use serde::Serialize;
use tracing::{debug, instrument, warn};

use chronomark_markdown::is_thematic_break;
use chronomark_shared::{
    Diagnostics, Fragment, FragmentKind, MatchMethod, RenderConfig, SectionPath,
    UnresolvedFragment,
};

/// Reason recorded for fragments left out of the output.
pub const UNRESOLVED_REASON: &str = "no matched neighbor";

/// Heading levels added to a fragment heading so it nests under the
/// `## Month` / `### From` scaffolding.
const HEADING_SHIFT: u8 = 3;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Fragments of one month sharing a section path.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SectionBlock {
    pub path: SectionPath,
    pub label: String,
    /// In original document order.
    pub fragments: Vec<Fragment>,
}

/// All dated fragments of one calendar month.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthGroup {
    pub year: i32,
    pub month: u32,
    /// In order of each path's first appearance in the document.
    pub sections: Vec<SectionBlock>,
}

impl MonthGroup {
    /// Display title, e.g. `March 2024`.
    pub fn title(&self) -> String {
        NaiveDate::from_ymd_opt(self.year, self.month, 1)
            .map(|d| d.format("%B %Y").to_string())
            .unwrap_or_else(|| format!("{}-{:02}", self.year, self.month))
    }

    pub fn fragment_count(&self) -> usize {
        self.sections.iter().map(|s| s.fragments.len()).sum()
    }
}

/// Dated fragments grouped by month, newest month first.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ChronologicalView {
    pub groups: Vec<MonthGroup>,
}

impl ChronologicalView {
    pub fn fragment_count(&self) -> usize {
        self.groups.iter().map(MonthGroup::fragment_count).sum()
    }
}

// ---------------------------------------------------------------------------
// Aggregation
// ---------------------------------------------------------------------------

/// Group dated fragments by (year, month), newest first. Within a month,
/// fragments are split into section blocks by path; undated fragments are
/// left out.
#[instrument(skip_all, fields(fragments = fragments.len()))]
pub fn aggregate(fragments: &[Fragment]) -> ChronologicalView {
    let mut section_order: HashMap<&SectionPath, usize> = HashMap::new();
    for fragment in fragments {
        let next = section_order.len();
        section_order.entry(&fragment.section_path).or_insert(next);
    }

    let mut months: BTreeMap<(i32, u32), Vec<&Fragment>> = BTreeMap::new();
    for fragment in fragments {
        if let Some(date) = fragment.matched_date {
            months
                .entry((date.year(), date.month()))
                .or_default()
                .push(fragment);
        }
    }

    let groups: Vec<MonthGroup> = months
        .into_iter()
        .rev()
        .map(|((year, month), mut members)| {
            members.sort_by_key(|f| (section_order[&f.section_path], f.original_index));

            let mut sections: Vec<SectionBlock> = Vec::new();
            for fragment in members {
                match sections.last_mut() {
                    Some(block) if block.path == fragment.section_path => {
                        block.fragments.push(fragment.clone());
                    }
                    _ => sections.push(SectionBlock {
                        path: fragment.section_path.clone(),
                        label: fragment.section_path.label(),
                        fragments: vec![fragment.clone()],
                    }),
                }
            }

            MonthGroup {
                year,
                month,
                sections,
            }
        })
        .collect();

    debug!(months = groups.len(), "fragments grouped");
    ChronologicalView { groups }
}

/// Per-method counts and the list of fragments that could not be dated.
pub fn diagnose(fragments: &[Fragment]) -> Diagnostics {
    let mut diagnostics = Diagnostics {
        total: fragments.len(),
        ..Diagnostics::default()
    };

    for fragment in fragments {
        match fragment.match_method {
            MatchMethod::Exact => diagnostics.exact += 1,
            MatchMethod::Normalized => diagnostics.normalized += 1,
            MatchMethod::Fuzzy => diagnostics.fuzzy += 1,
            MatchMethod::LinkBoosted => diagnostics.link_boosted += 1,
            MatchMethod::Inferred => diagnostics.inferred += 1,
            MatchMethod::Unmatched => {
                diagnostics.unmatched += 1;
                diagnostics.unresolved.push(UnresolvedFragment {
                    original_index: fragment.original_index,
                    line: fragment.line,
                    text: fragment.probe_text().to_string(),
                    reason: UNRESOLVED_REASON.to_string(),
                });
            }
        }
    }

    if diagnostics.total > 0 {
        diagnostics.match_rate =
            (diagnostics.total - diagnostics.unmatched) as f64 / diagnostics.total as f64;
    }
    if diagnostics.unmatched > 0 {
        warn!(
            unmatched = diagnostics.unmatched,
            total = diagnostics.total,
            "fragments left out of the chronological view"
        );
    }
    diagnostics
}

// ---------------------------------------------------------------------------
// Rendering
// ---------------------------------------------------------------------------

/// Render the view as markdown.
///
/// ```text
/// # <title>
///
/// <preamble>
///
/// ## March 2024
///
/// ### From '<section label>'
///
/// - fragment
/// ```
pub fn render(view: &ChronologicalView, config: &RenderConfig) -> String {
    let mut out = Lines::default();

    out.block(format!("# {}", config.title));
    if !config.preamble.trim().is_empty() {
        out.block(config.preamble.trim_end().to_string());
    }

    for group in &view.groups {
        out.block(format!("## {}", group.title()));
        for section in &group.sections {
            out.block(format!("### From '{}'", section.label));
            render_section(&mut out, &section.fragments);
        }
    }

    if !config.footer.trim().is_empty() {
        out.block("---".to_string());
        out.block(config.footer.trim_end().to_string());
    }

    out.finish()
}

fn render_section(out: &mut Lines, fragments: &[Fragment]) {
    let mut previous_depth: Option<usize> = None;
    // Source line of the previous fragment when it was a plain paragraph line.
    let mut previous_paragraph: Option<usize> = None;
    for fragment in fragments {
        match &fragment.kind {
            FragmentKind::Heading { level } => {
                let level = level.saturating_add(HEADING_SHIFT).min(6) as usize;
                out.block(format!("{} {}", "#".repeat(level), fragment.text));
                previous_depth = None;
            }
            FragmentKind::ListItem { depth, marker } => {
                // A lone child whose parent landed in another month is lifted.
                let depth = (*depth).min(previous_depth.map_or(0, |d| d + 1));
                out.line(format!("{}{} {}", "    ".repeat(depth), marker, fragment.text));
                previous_depth = Some(depth);
            }
            FragmentKind::ParagraphText { fenced: true } => {
                out.block(fragment.raw.clone());
                previous_depth = None;
            }
            FragmentKind::ParagraphText { fenced: false } => {
                // Only lines of one source paragraph stay together; a break
                // glued to text would read as a setext underline.
                let continues = previous_paragraph.is_some_and(|line| line + 1 == fragment.line);
                if !continues || is_thematic_break(&fragment.text) {
                    out.blank();
                }
                out.line(fragment.text.clone());
                previous_depth = None;
                previous_paragraph = Some(fragment.line);
                continue;
            }
        }
        previous_paragraph = None;
    }
    out.blank();
}

/// Output buffer that keeps at most one blank line between blocks.
#[derive(Default)]
struct Lines(Vec<String>);

impl Lines {
    fn line(&mut self, line: String) {
        self.0.push(line);
    }

    fn blank(&mut self) {
        if self.0.last().is_some_and(|l| !l.is_empty()) {
            self.0.push(String::new());
        }
    }

    /// A standalone block, separated by blank lines on both sides.
    fn block(&mut self, block: String) {
        self.blank();
        self.0.push(block);
        self.0.push(String::new());
    }

    fn finish(mut self) -> String {
        while self.0.last().is_some_and(|l| l.is_empty()) {
            self.0.pop();
        }
        let mut text = self.0.join("\n");
        text.push('\n');
        text
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
