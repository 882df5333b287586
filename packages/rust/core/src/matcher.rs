//! Fragment-to-history matching.
//!
//! Each fragment is compared against the distinct added texts of the
//! history, one stage at a time in policy order. The first stage that
//! produces a candidate decides the fragment's date.

use std::collections::HashMap;

use tracing::{debug, instrument};

use chronomark_history::HistoryLog;
use chronomark_markdown::{extract_urls, normalize, strip_marker};
use chronomark_shared::{DuplicatePolicy, Fragment, FragmentKind, HistoryEvent, MatchMethod};

use crate::policy::{Contender, MatchPolicy, MatchStage};
use crate::similarity::{containment, similarity, upper_bound};

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Winning candidate for one fragment.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MatchResult<'a> {
    /// Representative history event of the winning candidate.
    pub event: &'a HistoryEvent,
    /// Similarity in [0, 1] (1 for exact and normalized equality; boosted and
    /// capped for link matches).
    pub score: f64,
    /// Confidence recorded on the fragment.
    pub confidence: f64,
    pub method: MatchMethod,
}

/// Per-method counts from one [`Matcher::apply`] run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MatchSummary {
    pub exact: usize,
    pub normalized: usize,
    pub fuzzy: usize,
    pub link_boosted: usize,
    pub unmatched: usize,
}

impl MatchSummary {
    fn record(&mut self, method: MatchMethod) {
        match method {
            MatchMethod::Exact => self.exact += 1,
            MatchMethod::Normalized => self.normalized += 1,
            MatchMethod::Fuzzy => self.fuzzy += 1,
            MatchMethod::LinkBoosted => self.link_boosted += 1,
            MatchMethod::Inferred | MatchMethod::Unmatched => self.unmatched += 1,
        }
    }

    pub fn matched(&self) -> usize {
        self.exact + self.normalized + self.fuzzy + self.link_boosted
    }
}

/// One distinct added text (events with identical marker-stripped text
/// collapse into a single candidate).
#[derive(Debug)]
struct Candidate {
    /// Index into the log's events of the representative occurrence.
    event: usize,
    normalized: String,
    urls: Vec<String>,
    len: usize,
    normalized_len: usize,
}

/// Fragment text prepared once per lookup.
struct Probe<'f> {
    text: &'f str,
    normalized: String,
    len: usize,
    normalized_len: usize,
}

impl<'f> Probe<'f> {
    fn new(fragment: &'f Fragment) -> Self {
        let probe = fragment.probe_text();
        // Fenced blocks are probed by a raw code line, which history sees
        // through the same marker stripping as any other added line.
        let text = match fragment.kind {
            FragmentKind::ParagraphText { fenced: true } => strip_marker(probe),
            _ => probe,
        };
        let normalized = normalize(text);
        Self {
            len: text.chars().count(),
            normalized_len: normalized.chars().count(),
            text,
            normalized,
        }
    }
}

// ---------------------------------------------------------------------------
// Matcher
// ---------------------------------------------------------------------------

/// Candidate index over one history log.
#[derive(Debug)]
pub struct Matcher<'a> {
    log: &'a HistoryLog,
    policy: MatchPolicy,
    candidates: Vec<Candidate>,
    by_text: HashMap<String, usize>,
    by_normalized: HashMap<String, Vec<usize>>,
    by_url: HashMap<String, Vec<usize>>,
}

impl<'a> Matcher<'a> {
    /// Index the log's additions. Empty lines are never candidates.
    #[instrument(skip_all, fields(events = log.len()))]
    pub fn new(log: &'a HistoryLog, policy: MatchPolicy) -> Self {
        let duplicate_policy = policy.config().duplicate_policy;
        let mut candidates: Vec<Candidate> = Vec::new();
        let mut by_text: HashMap<String, usize> = HashMap::new();

        for (idx, event) in log.events().iter().enumerate() {
            let text = strip_marker(&event.text);
            if text.is_empty() {
                continue;
            }
            if let Some(&existing) = by_text.get(text) {
                let current = &log.events()[candidates[existing].event];
                let replace = match duplicate_policy {
                    DuplicatePolicy::MostRecent => event.timestamp > current.timestamp,
                    DuplicatePolicy::Earliest => event.timestamp < current.timestamp,
                };
                if replace {
                    candidates[existing].event = idx;
                }
                continue;
            }

            let normalized = normalize(text);
            by_text.insert(text.to_string(), candidates.len());
            candidates.push(Candidate {
                event: idx,
                len: text.chars().count(),
                normalized_len: normalized.chars().count(),
                urls: extract_urls(text),
                normalized,
            });
        }

        let mut by_normalized: HashMap<String, Vec<usize>> = HashMap::new();
        let mut by_url: HashMap<String, Vec<usize>> = HashMap::new();
        for (idx, candidate) in candidates.iter().enumerate() {
            if !candidate.normalized.is_empty() {
                by_normalized
                    .entry(candidate.normalized.clone())
                    .or_default()
                    .push(idx);
            }
            for url in &candidate.urls {
                by_url.entry(url.clone()).or_default().push(idx);
            }
        }

        debug!(
            candidates = candidates.len(),
            urls = by_url.len(),
            "history indexed"
        );

        Self {
            log,
            policy,
            candidates,
            by_text,
            by_normalized,
            by_url,
        }
    }

    pub fn policy(&self) -> &MatchPolicy {
        &self.policy
    }

    /// Number of distinct candidate texts.
    pub fn candidate_count(&self) -> usize {
        self.candidates.len()
    }

    /// Best history event for `fragment`, or `None` when no stage accepts one.
    pub fn match_fragment(&self, fragment: &Fragment) -> Option<MatchResult<'a>> {
        let probe = Probe::new(fragment);
        if probe.text.is_empty() {
            return None;
        }

        self.policy
            .stages()
            .iter()
            .find_map(|&stage| self.run_stage(stage, &probe))
    }

    /// Match every fragment in place. Fragments with no match are reset to
    /// unmatched.
    #[instrument(skip_all, fields(fragments = fragments.len()))]
    pub fn apply(&self, fragments: &mut [Fragment]) -> MatchSummary {
        let mut summary = MatchSummary::default();
        for fragment in fragments.iter_mut() {
            match self.match_fragment(fragment) {
                Some(result) => {
                    fragment.matched_date = Some(result.event.date);
                    fragment.match_confidence = Some(result.confidence);
                    fragment.match_method = result.method;
                    fragment.matched_commit = Some(result.event.commit.clone());
                }
                None => {
                    fragment.matched_date = None;
                    fragment.match_confidence = None;
                    fragment.match_method = MatchMethod::Unmatched;
                    fragment.matched_commit = None;
                }
            }
            summary.record(fragment.match_method);
        }
        debug!(
            exact = summary.exact,
            normalized = summary.normalized,
            fuzzy = summary.fuzzy,
            link_boosted = summary.link_boosted,
            unmatched = summary.unmatched,
            "fragments matched"
        );
        summary
    }

    // -----------------------------------------------------------------------
    // Stages
    // -----------------------------------------------------------------------

    fn run_stage(&self, stage: MatchStage, probe: &Probe<'_>) -> Option<MatchResult<'a>> {
        match stage {
            MatchStage::Exact => self.exact(probe),
            MatchStage::Normalized => self.normalized(probe),
            MatchStage::Fuzzy => self.fuzzy(probe),
            MatchStage::LinkBoosted => self.link_boosted(probe),
        }
    }

    fn exact(&self, probe: &Probe<'_>) -> Option<MatchResult<'a>> {
        let idx = *self.by_text.get(probe.text)?;
        Some(self.result(idx, 1.0, 1.0, MatchMethod::Exact))
    }

    fn normalized(&self, probe: &Probe<'_>) -> Option<MatchResult<'a>> {
        if probe.normalized.is_empty() {
            return None;
        }
        let ids = self.by_normalized.get(&probe.normalized)?;
        let best = self
            .policy
            .best(ids.iter().map(|&idx| self.contender(idx, 1.0, probe)))?;
        let confidence = self.policy.config().normalized_confidence;
        Some(self.result(best.order, 1.0, confidence, MatchMethod::Normalized))
    }

    fn fuzzy(&self, probe: &Probe<'_>) -> Option<MatchResult<'a>> {
        let threshold = self.policy.config().fuzzy_threshold;
        let scored = self.candidates.iter().enumerate().filter_map(|(idx, c)| {
            if upper_bound(probe.normalized_len, c.normalized_len) <= threshold {
                return None;
            }
            let score = similarity(&probe.normalized, &c.normalized);
            (score > threshold).then(|| self.contender(idx, score, probe))
        });
        let best = self.policy.best(scored)?;
        Some(self.result(best.order, best.score, best.score, MatchMethod::Fuzzy))
    }

    fn link_boosted(&self, probe: &Probe<'_>) -> Option<MatchResult<'a>> {
        let urls = extract_urls(probe.text);
        if urls.is_empty() {
            return None;
        }

        let mut ids: Vec<usize> = urls
            .iter()
            .filter_map(|url| self.by_url.get(url))
            .flatten()
            .copied()
            .collect();
        ids.sort_unstable();
        ids.dedup();

        let config = self.policy.config();
        let threshold = config.fuzzy_threshold;
        let bonus = config.link_bonus;
        // Containment rather than the diff ratio: a short entry around the
        // same link stays recognizable inside a much longer rewrite.
        // Rank on the uncapped boost so capped ties still prefer the closer text.
        let scored = ids.into_iter().filter_map(|idx| {
            let c = &self.candidates[idx];
            let base = containment(&probe.normalized, &c.normalized)
                .max(similarity(&probe.normalized, &c.normalized));
            let boosted = base + bonus;
            (boosted > threshold).then(|| self.contender(idx, boosted, probe))
        });
        let best = self.policy.best(scored)?;
        let capped = best.score.min(1.0);
        Some(self.result(best.order, capped, capped, MatchMethod::LinkBoosted))
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    fn contender(&self, idx: usize, score: f64, probe: &Probe<'_>) -> Contender {
        let candidate = &self.candidates[idx];
        Contender {
            score,
            length_delta: candidate.len.abs_diff(probe.len),
            timestamp: self.log.events()[candidate.event].timestamp,
            order: idx,
        }
    }

    fn result(&self, idx: usize, score: f64, confidence: f64, method: MatchMethod) -> MatchResult<'a> {
        let log: &'a HistoryLog = self.log;
        MatchResult {
            event: &log.events()[self.candidates[idx].event],
            score,
            confidence,
            method,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, NaiveDate};
    use chronomark_shared::{MatchConfig, SectionPath};

    fn event(ts: &str, text: &str, commit: &str) -> HistoryEvent {
        HistoryEvent::new(
            DateTime::parse_from_rfc3339(ts).expect("timestamp"),
            text,
            commit,
            None,
        )
    }

    fn item(text: &str) -> Fragment {
        Fragment::new(
            FragmentKind::ListItem {
                depth: 0,
                marker: "-".into(),
            },
            text,
            format!("- {text}"),
            SectionPath::default(),
            0,
            1,
        )
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn exact_match_strips_markers() {
        let log = HistoryLog::from_events(vec![event(
            "2024-03-05T10:00:00Z",
            "- Streaming support",
            "c4",
        )]);
        let matcher = Matcher::new(&log, MatchPolicy::default());

        let result = matcher.match_fragment(&item("Streaming support")).unwrap();
        assert_eq!(result.method, MatchMethod::Exact);
        assert_eq!(result.confidence, 1.0);
        assert_eq!(result.event.commit, "c4");
    }

    #[test]
    fn normalized_match_uses_configured_confidence() {
        let log = HistoryLog::from_events(vec![event(
            "2024-03-20T10:00:00Z",
            "- Flame  graphs for EVERY model",
            "c5",
        )]);
        let matcher = Matcher::new(&log, MatchPolicy::default());

        let result = matcher
            .match_fragment(&item("flame graphs for every model."))
            .unwrap();
        assert_eq!(result.method, MatchMethod::Normalized);
        assert_eq!(result.confidence, 0.9);
        assert_eq!(result.event.date, date(2024, 3, 20));
    }

    #[test]
    fn fuzzy_match_above_threshold() {
        let log = HistoryLog::from_events(vec![
            event("2024-04-02T10:00:00Z", "Batch export to CSV files", "c6"),
            event("2024-01-10T10:00:00Z", "Something else entirely", "c2"),
        ]);
        let matcher = Matcher::new(&log, MatchPolicy::default());

        let result = matcher.match_fragment(&item("Batch export to CSV")).unwrap();
        assert_eq!(result.method, MatchMethod::Fuzzy);
        assert!(result.score > 0.8 && result.score < 1.0);
        assert_eq!(result.confidence, result.score);
        assert_eq!(result.event.commit, "c6");
    }

    #[test]
    fn below_threshold_is_unmatched() {
        let log = HistoryLog::from_events(vec![event(
            "2024-01-10T10:00:00Z",
            "- Completely different wording",
            "c2",
        )]);
        let matcher = Matcher::new(&log, MatchPolicy::default());
        assert!(matcher.match_fragment(&item("Feature 1 added recently")).is_none());
    }

    #[test]
    fn shared_url_boosts_a_weak_match() {
        let log = HistoryLog::from_events(vec![event(
            "2024-02-01T10:00:00Z",
            "- [Inspector](https://tools.example.com/inspector) - Looks inside model weights",
            "c3",
        )]);
        let matcher = Matcher::new(&log, MatchPolicy::default());

        let result = matcher
            .match_fragment(&item(
                "[Inspector](https://tools.example.com/inspector) - rewritten blurb that shares nothing else",
            ))
            .unwrap();
        assert_eq!(result.method, MatchMethod::LinkBoosted);
        assert!(result.confidence <= 1.0);
        assert_eq!(result.event.date, date(2024, 2, 1));
    }

    #[test]
    fn shared_url_survives_a_long_rewrite() {
        let log = HistoryLog::from_events(vec![
            event("2024-02-01T10:00:00Z", "- [Foo](https://foo.dev/tool) - Fast tool", "c3"),
            event("2024-05-10T10:00:00Z", "- Anchor item", "c7"),
        ]);
        let matcher = Matcher::new(&log, MatchPolicy::default());
        let fragment = item(
            "[Foo](https://foo.dev/tool) - An extremely popular open source library used by \
             thousands of teams worldwide for running inference across many commodity \
             hardware configurations",
        );

        let result = matcher.match_fragment(&fragment).unwrap();
        assert_eq!(result.method, MatchMethod::LinkBoosted);
        assert_eq!(result.event.commit, "c3");
        assert_eq!(result.event.date, date(2024, 2, 1));
        assert_eq!(result.confidence, 1.0);
    }

    #[test]
    fn link_stage_needs_a_shared_url() {
        let log = HistoryLog::from_events(vec![event(
            "2024-02-01T10:00:00Z",
            "- [Inspector](https://tools.example.com/inspector) - Looks inside model weights",
            "c3",
        )]);
        let matcher = Matcher::new(&log, MatchPolicy::default());
        let fragment = item("[Inspector](https://mirror.example.org/inspector) - a new blurb");
        assert!(matcher.match_fragment(&fragment).is_none());
    }

    #[test]
    fn duplicate_text_uses_most_recent_by_default() {
        let log = HistoryLog::from_events(vec![
            event("2024-05-01T10:00:00Z", "- Restored item", "readded"),
            event("2023-01-01T10:00:00Z", "- Restored item", "first"),
        ]);
        let matcher = Matcher::new(&log, MatchPolicy::default());
        assert_eq!(matcher.candidate_count(), 1);

        let result = matcher.match_fragment(&item("Restored item")).unwrap();
        assert_eq!(result.event.commit, "readded");
    }

    #[test]
    fn duplicate_text_can_prefer_earliest() {
        let log = HistoryLog::from_events(vec![
            event("2024-05-01T10:00:00Z", "- Restored item", "readded"),
            event("2023-01-01T10:00:00Z", "- Restored item", "first"),
        ]);
        let mut config = MatchConfig::default();
        config.duplicate_policy = DuplicatePolicy::Earliest;
        let matcher = Matcher::new(&log, MatchPolicy::new(config).unwrap());

        let result = matcher.match_fragment(&item("Restored item")).unwrap();
        assert_eq!(result.event.commit, "first");
    }

    #[test]
    fn normalized_ties_prefer_closest_length_then_earliest() {
        let log = HistoryLog::from_events(vec![
            event("2024-06-01T10:00:00Z", "- Same text!", "later"),
            event("2024-02-01T10:00:00Z", "- same   TEXT", "earlier"),
        ]);
        let matcher = Matcher::new(&log, MatchPolicy::default());

        // "SAME TEXT" is 9 chars: "Same text!" differs by 1, "same   TEXT" by 2.
        let result = matcher.match_fragment(&item("SAME TEXT")).unwrap();
        assert_eq!(result.method, MatchMethod::Normalized);
        assert_eq!(result.event.commit, "later");
    }

    #[test]
    fn stages_follow_policy_order() {
        let log = HistoryLog::from_events(vec![event(
            "2024-03-05T10:00:00Z",
            "- Streaming support",
            "c4",
        )]);
        let policy = MatchPolicy::default().with_stages([MatchStage::Fuzzy, MatchStage::Exact]);
        let matcher = Matcher::new(&log, policy);

        let result = matcher.match_fragment(&item("Streaming support")).unwrap();
        assert_eq!(result.method, MatchMethod::Fuzzy);
        assert_eq!(result.score, 1.0);
    }

    #[test]
    fn fenced_block_probes_its_first_line() {
        let log = HistoryLog::from_events(vec![event(
            "2024-04-02T10:00:00Z",
            "pip install awesome-models",
            "c6",
        )]);
        let matcher = Matcher::new(&log, MatchPolicy::default());
        let block = Fragment::new(
            FragmentKind::ParagraphText { fenced: true },
            "\npip install awesome-models\npip list",
            "```sh\n\npip install awesome-models\npip list\n```",
            SectionPath::default(),
            0,
            1,
        );

        let result = matcher.match_fragment(&block).unwrap();
        assert_eq!(result.method, MatchMethod::Exact);
    }

    #[test]
    fn apply_records_results_and_counts() {
        let log = HistoryLog::from_events(vec![event(
            "2024-03-05T10:00:00Z",
            "- Streaming support",
            "c4",
        )]);
        let matcher = Matcher::new(&log, MatchPolicy::default());
        let mut fragments = vec![item("Streaming support"), item("Nowhere in history")];

        let summary = matcher.apply(&mut fragments);
        assert_eq!(summary.exact, 1);
        assert_eq!(summary.unmatched, 1);
        assert_eq!(summary.matched(), 1);
        assert_eq!(fragments[0].matched_date, Some(date(2024, 3, 5)));
        assert_eq!(fragments[0].matched_commit.as_deref(), Some("c4"));
        assert_eq!(fragments[1].match_method, MatchMethod::Unmatched);
        assert!(!fragments[1].is_dated());
    }

    #[test]
    fn empty_history_matches_nothing() {
        let log = HistoryLog::default();
        let matcher = Matcher::new(&log, MatchPolicy::default());
        assert!(matcher.match_fragment(&item("Anything")).is_none());
    }
}
