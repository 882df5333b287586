//! End-to-end chronology pipeline: history + document → dated fragments → view → markdown.

use std::time::{Duration, Instant};

use tracing::{info, instrument, warn};

use chronomark_history::{HistoryLog, extract_history};
use chronomark_markdown::parse_fragments;
use chronomark_shared::{AppConfig, Diagnostics, Fragment, MatchConfig, RenderConfig, Result};

use crate::aggregate::{ChronologicalView, aggregate, diagnose, render};
use crate::infer::infer_dates;
use crate::matcher::Matcher;
use crate::policy::MatchPolicy;

/// Configuration for [`build_chronology`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChronologyConfig {
    pub matching: MatchConfig,
    pub render: RenderConfig,
}

impl From<&AppConfig> for ChronologyConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            matching: MatchConfig::from(config),
            render: RenderConfig::from(config),
        }
    }
}

/// Result of one pipeline run.
#[derive(Debug)]
pub struct ChronologyResult {
    /// Rendered chronological document.
    pub markdown: String,
    /// Every parsed fragment with its final dating, in document order.
    pub fragments: Vec<Fragment>,
    pub view: ChronologicalView,
    pub diagnostics: Diagnostics,
    /// Total elapsed time.
    pub elapsed: Duration,
}

/// Progress callback for reporting pipeline status.
pub trait ProgressReporter: Send + Sync {
    /// Called when entering a new phase.
    fn phase(&self, name: &str);
    /// Called when the pipeline completes.
    fn done(&self, result: &ChronologyResult);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn phase(&self, _name: &str) {}
    fn done(&self, _result: &ChronologyResult) {}
}

/// Run the full pipeline over raw history and document text.
///
/// 1. Parse the document into fragments
/// 2. Extract added lines from the history
/// 3. Match fragments against history
/// 4. Infer dates for unmatched fragments
/// 5. Group by month and render
///
/// The only fatal condition is an empty document (or invalid tuning);
/// empty history produces an empty view with every fragment unresolved.
#[instrument(skip_all, fields(history_len = history.len(), document_len = document.len()))]
pub fn build_chronology(
    history: &str,
    document: &str,
    config: &ChronologyConfig,
    progress: &dyn ProgressReporter,
) -> Result<ChronologyResult> {
    let start = Instant::now();
    let policy = MatchPolicy::new(config.matching.clone())?;

    progress.phase("Parsing document");
    let mut fragments = parse_fragments(document)?;

    progress.phase("Extracting history");
    let log = extract_history(history);
    if log.is_empty() {
        warn!("history contains no added lines, nothing can be dated");
    }

    let (view, diagnostics) = date_fragments(&log, &mut fragments, policy, progress);

    progress.phase("Rendering");
    let markdown = render(&view, &config.render);

    let result = ChronologyResult {
        markdown,
        fragments,
        view,
        diagnostics,
        elapsed: start.elapsed(),
    };

    info!(
        fragments = result.diagnostics.total,
        months = result.view.groups.len(),
        match_rate = result.diagnostics.match_rate,
        elapsed_ms = result.elapsed.as_millis() as u64,
        "chronology built"
    );

    progress.done(&result);
    Ok(result)
}

/// Match, infer and group already parsed fragments against an extracted log.
pub fn date_fragments(
    log: &HistoryLog,
    fragments: &mut [Fragment],
    policy: MatchPolicy,
    progress: &dyn ProgressReporter,
) -> (ChronologicalView, Diagnostics) {
    progress.phase("Matching fragments");
    let matcher = Matcher::new(log, policy);
    matcher.apply(fragments);

    progress.phase("Inferring dates");
    infer_dates(fragments);

    progress.phase("Grouping by month");
    let view = aggregate(fragments);
    let mut diagnostics = diagnose(fragments);
    diagnostics.history_events = log.len();
    diagnostics.skipped_commits = log.skipped_commits();

    (view, diagnostics)
}
