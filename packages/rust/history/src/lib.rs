//! History extraction from `git log -p` output.
//!
//! Turns the patch-style history of one file into an ordered list of
//! [`HistoryEvent`]s, one per added line:
//! - A block starts at `commit <hex id>`
//! - The block date comes from its `Date:` (or `AuthorDate:`) header
//! - Lines prefixed with `+` inside an `@@` hunk are additions
//!
//! Blocks with a malformed header are skipped and counted, never fatal.

mod date;
pub mod git;

use std::collections::HashMap;
use std::sync::LazyLock;

use chrono::{DateTime, FixedOffset};
use regex::Regex;
use tracing::{debug, instrument, warn};

use chronomark_shared::HistoryEvent;

pub use date::parse_git_date as parse_date;

// ---------------------------------------------------------------------------
// Regex patterns (compiled once)
// ---------------------------------------------------------------------------

/// Matches `commit <sha>` with optional decorations after the id.
static COMMIT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^commit ([0-9a-fA-F]{4,64})(?:\s|$)").expect("commit regex")
});

/// Matches `Date:` / `AuthorDate:` headers.
static DATE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:Author)?Date:\s+(.+)$").expect("date regex")
});

/// Matches a unified-diff hunk header and captures the post-image start line.
static HUNK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^@@+ (?:-\d+(?:,\d+)? )+\+(\d+)(?:,\d+)? @@+").expect("hunk regex")
});

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Earliest and latest occurrence of one distinct added text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Introduction {
    /// Index into [`HistoryLog::events`] of the first introduction.
    pub earliest: usize,
    /// Index of the most recent re-introduction.
    pub latest: usize,
    /// How many times the text was added.
    pub occurrences: usize,
}

/// All additions extracted from one file's history.
#[derive(Debug, Clone, Default)]
pub struct HistoryLog {
    events: Vec<HistoryEvent>,
    introductions: HashMap<String, Introduction>,
    commits: usize,
    skipped_commits: usize,
}

impl HistoryLog {
    /// Events in order of encounter (`git log` lists newest commits first).
    pub fn events(&self) -> &[HistoryEvent] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Commit blocks that contributed (including ones with no additions).
    pub fn commit_count(&self) -> usize {
        self.commits
    }

    /// Commit blocks dropped for a malformed or dateless header.
    pub fn skipped_commits(&self) -> usize {
        self.skipped_commits
    }

    /// Events sorted oldest first; ties keep encounter order.
    pub fn chronological(&self) -> Vec<&HistoryEvent> {
        let mut sorted: Vec<&HistoryEvent> = self.events.iter().collect();
        sorted.sort_by_key(|e| e.timestamp);
        sorted
    }

    /// Earliest/latest occurrence of an exact added text.
    pub fn introduction(&self, text: &str) -> Option<Introduction> {
        self.introductions.get(text).copied()
    }

    /// Canonical first-introduction event of an exact added text.
    pub fn first_introduction(&self, text: &str) -> Option<&HistoryEvent> {
        self.introduction(text).map(|i| &self.events[i.earliest])
    }

    /// Most recent re-addition of an exact added text.
    pub fn latest_introduction(&self, text: &str) -> Option<&HistoryEvent> {
        self.introduction(text).map(|i| &self.events[i.latest])
    }

    /// Build a log directly from events (encounter order is preserved).
    pub fn from_events(events: Vec<HistoryEvent>) -> Self {
        let mut log = Self {
            events,
            ..Self::default()
        };
        log.index();
        log
    }

    fn index(&mut self) {
        let mut introductions: HashMap<String, Introduction> = HashMap::new();
        for (idx, event) in self.events.iter().enumerate() {
            match introductions.get_mut(&event.text) {
                Some(intro) => {
                    intro.occurrences += 1;
                    if event.timestamp < self.events[intro.earliest].timestamp {
                        intro.earliest = idx;
                    }
                    if event.timestamp > self.events[intro.latest].timestamp {
                        intro.latest = idx;
                    }
                }
                None => {
                    introductions.insert(
                        event.text.clone(),
                        Introduction {
                            earliest: idx,
                            latest: idx,
                            occurrences: 1,
                        },
                    );
                }
            }
        }
        self.introductions = introductions;
    }
}

// ---------------------------------------------------------------------------
// Extractor
// ---------------------------------------------------------------------------

/// An added line waiting for its block's date.
struct PendingAddition {
    text: String,
    line: Option<usize>,
}

/// State for the commit block currently being read.
struct CommitBlock {
    commit: Option<String>,
    header_line: usize,
    timestamp: Option<DateTime<FixedOffset>>,
    in_diff: bool,
    in_hunk: bool,
    next_line: Option<usize>,
    additions: Vec<PendingAddition>,
}

impl CommitBlock {
    fn open(header: &str, header_line: usize) -> Self {
        Self {
            commit: COMMIT_RE.captures(header).map(|c| c[1].to_string()),
            header_line,
            timestamp: None,
            in_diff: false,
            in_hunk: false,
            next_line: None,
            additions: Vec::new(),
        }
    }

    fn read_line(&mut self, line: &str) {
        if line.starts_with("diff ") {
            self.in_diff = true;
            self.in_hunk = false;
            return;
        }

        if let Some(caps) = HUNK_RE.captures(line) {
            self.in_hunk = true;
            self.next_line = caps[1].parse().ok();
            return;
        }

        if !self.in_hunk {
            // Header section: only the first date header counts.
            if !self.in_diff && self.timestamp.is_none() {
                if let Some(caps) = DATE_RE.captures(line) {
                    self.timestamp = date::parse_git_date(&caps[1]);
                    if self.timestamp.is_none() {
                        debug!(line = self.header_line, date = &caps[1], "unparseable date header");
                    }
                }
            }
            return;
        }

        match line.as_bytes().first() {
            Some(b'+') => {
                let text = line[1..].trim_end();
                if !text.trim().is_empty() {
                    self.additions.push(PendingAddition {
                        text: text.to_string(),
                        line: self.next_line,
                    });
                }
                self.advance();
            }
            Some(b' ') => self.advance(),
            Some(b'-') | Some(b'\\') => {}
            // A blank line or anything else ends the hunk.
            _ => self.in_hunk = false,
        }
    }

    fn advance(&mut self) {
        if let Some(n) = self.next_line.as_mut() {
            *n += 1;
        }
    }

    /// Emit this block's events, or `false` when the block must be skipped.
    fn close(self, events: &mut Vec<HistoryEvent>) -> bool {
        let (Some(commit), Some(timestamp)) = (self.commit, self.timestamp) else {
            warn!(
                line = self.header_line,
                dropped_additions = self.additions.len(),
                "skipping commit block with malformed header"
            );
            return false;
        };

        events.extend(
            self.additions
                .into_iter()
                .map(|a| HistoryEvent::new(timestamp, a.text, commit.as_str(), a.line)),
        );
        true
    }
}

/// Extract every added line from `git log -p` output.
///
/// Text before the first `commit` line is ignored.
#[instrument(skip_all, fields(input_len = history.len()))]
pub fn extract_history(history: &str) -> HistoryLog {
    let mut log = HistoryLog::default();
    let mut events: Vec<HistoryEvent> = Vec::new();
    let mut block: Option<CommitBlock> = None;

    for (idx, line) in history.lines().enumerate() {
        if line.starts_with("commit ") || line == "commit" {
            if let Some(done) = block.take() {
                log.tally(done.close(&mut events));
            }
            block = Some(CommitBlock::open(line, idx + 1));
            continue;
        }

        if let Some(current) = block.as_mut() {
            current.read_line(line);
        }
    }

    if let Some(done) = block.take() {
        log.tally(done.close(&mut events));
    }

    log.events = events;
    log.index();

    debug!(
        commits = log.commits,
        skipped = log.skipped_commits,
        events = log.events.len(),
        distinct = log.introductions.len(),
        "history extracted"
    );

    log
}

impl HistoryLog {
    fn tally(&mut self, emitted: bool) {
        if emitted {
            self.commits += 1;
        } else {
            self.skipped_commits += 1;
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn fixture(name: &str) -> String {
        let path = std::path::Path::new(env!("CARGO_MANIFEST_DIR"))
            .join("../../../fixtures/history")
            .join(name);
        std::fs::read_to_string(&path)
            .unwrap_or_else(|e| panic!("failed to read fixture {}: {e}", path.display()))
    }

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
    }

    const SIMPLE: &str = "\
commit 1111111111111111111111111111111111111111
Author: Ada <ada@example.com>
Date:   Tue Mar 5 09:00:00 2024 +0000

    Add streaming

diff --git a/README.md b/README.md
index 2222222..3333333 100644
--- a/README.md
+++ b/README.md
@@ -3,2 +3,3 @@
 ## Features
+- Streaming support
 - Old item
-- Removed item

commit 4444444444444444444444444444444444444444
Author: Ada <ada@example.com>
Date:   Sun Oct 1 12:00:00 2023 +0000

    Initial

diff --git a/README.md b/README.md
new file mode 100644
--- /dev/null
+++ b/README.md
@@ -0,0 +1,4 @@
+# Title
+
+## Features
+- Old item
";

    #[test]
    fn extracts_added_lines_with_block_dates() {
        let log = extract_history(SIMPLE);
        let texts: Vec<&str> = log.events().iter().map(|e| e.text.as_str()).collect();

        assert_eq!(
            texts,
            vec!["- Streaming support", "# Title", "## Features", "- Old item"]
        );
        assert_eq!(log.events()[0].date, ymd(2024, 3, 5));
        assert_eq!(log.events()[1].date, ymd(2023, 10, 1));
        assert_eq!(log.commit_count(), 2);
        assert_eq!(log.skipped_commits(), 0);
    }

    #[test]
    fn never_emits_file_headers_or_removals() {
        let log = extract_history(SIMPLE);
        assert!(log.events().iter().all(|e| !e.text.starts_with("++")));
        assert!(log.events().iter().all(|e| e.text != "- Removed item"));
    }

    #[test]
    fn tracks_post_image_line_numbers() {
        let log = extract_history(SIMPLE);
        // `+3` hunk: context at 3, addition at 4.
        assert_eq!(log.events()[0].source_line_number, Some(4));
        // New file: lines 1..=4, the blank line 2 is not an event.
        assert_eq!(log.events()[1].source_line_number, Some(1));
        assert_eq!(log.events()[2].source_line_number, Some(3));
        assert_eq!(log.events()[3].source_line_number, Some(4));
    }

    #[test]
    fn records_commit_ids() {
        let log = extract_history(SIMPLE);
        assert_eq!(
            log.events()[0].commit,
            "1111111111111111111111111111111111111111"
        );
    }

    #[test]
    fn malformed_headers_are_skipped_and_counted() {
        let input = "\
commit not-a-sha
Date:   Tue Mar 5 09:00:00 2024 +0000

@@ -0,0 +1 @@
+- Lost line

commit abcdef1234
Date:   whenever

@@ -0,0 +1 @@
+- Also lost

commit 123456789a
Date:   2024-01-10

@@ -0,0 +1 @@
+- Kept line
";
        let log = extract_history(input);
        assert_eq!(log.skipped_commits(), 2);
        assert_eq!(log.len(), 1);
        assert_eq!(log.events()[0].text, "- Kept line");
        assert_eq!(log.events()[0].date, ymd(2024, 1, 10));
    }

    #[test]
    fn plus_lines_outside_hunks_are_ignored() {
        let input = "\
commit abcdef1234
Date:   2024-01-10

    +1 to the reviewer

+stray line before any hunk
";
        let log = extract_history(input);
        assert!(log.is_empty());
        assert_eq!(log.commit_count(), 1);
    }

    #[test]
    fn preamble_before_first_commit_is_ignored() {
        let log = extract_history("warning: something\n+not an event\n");
        assert!(log.is_empty());
        assert_eq!(log.commit_count(), 0);
        assert_eq!(log.skipped_commits(), 0);
    }

    #[test]
    fn handles_crlf_and_trailing_whitespace() {
        let input = "commit abcdef1234\r\nDate:   2024-01-10\r\n\r\n@@ -0,0 +1 @@\r\n+- Item   \r\n";
        let log = extract_history(input);
        assert_eq!(log.len(), 1);
        assert_eq!(log.events()[0].text, "- Item");
    }

    #[test]
    fn content_that_looks_like_a_file_header_inside_a_hunk_is_kept() {
        let input = "commit abcdef1234\nDate:   2024-01-10\n\n@@ -0,0 +1 @@\n+++ bold claim\n";
        let log = extract_history(input);
        assert_eq!(log.len(), 1);
        assert_eq!(log.events()[0].text, "++ bold claim");
    }

    #[test]
    fn duplicate_text_index_tracks_earliest_and_latest() {
        let input = "\
commit cccccccccc
Date:   2024-05-01

@@ -1,0 +2 @@
+- Comeback item

commit bbbbbbbbbb
Date:   2024-02-01

@@ -2 +1,0 @@
-- Comeback item

commit aaaaaaaaaa
Date:   2023-06-01

@@ -0,0 +1 @@
+- Comeback item
";
        let log = extract_history(input);
        let intro = log.introduction("- Comeback item").expect("indexed");
        assert_eq!(intro.occurrences, 2);
        assert_eq!(
            log.first_introduction("- Comeback item").map(|e| e.date),
            Some(ymd(2023, 6, 1))
        );
        assert_eq!(
            log.latest_introduction("- Comeback item").map(|e| e.date),
            Some(ymd(2024, 5, 1))
        );
        assert!(log.introduction("- Never added").is_none());
    }

    #[test]
    fn chronological_sorts_oldest_first() {
        let log = extract_history(SIMPLE);
        let dates: Vec<NaiveDate> = log.chronological().iter().map(|e| e.date).collect();
        assert_eq!(dates.first(), Some(&ymd(2023, 10, 1)));
        assert_eq!(dates.last(), Some(&ymd(2024, 3, 5)));
    }

    #[test]
    fn fixture_log_extracts_every_commit() {
        let log = extract_history(&fixture("awesome-models.log"));
        assert_eq!(log.skipped_commits(), 1);
        assert_eq!(log.commit_count(), 6);
        assert!(
            log.events()
                .iter()
                .any(|e| e.text == "- Feature 2 added long ago" && e.date == ymd(2023, 10, 1))
        );
    }
}
