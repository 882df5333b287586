//! Match policy: the ordered stage list and the tie-break rule.
//!
//! Kept separate from the matcher so the order of attempts and the
//! resolution rule can be inspected and tested on their own.

use std::cmp::Ordering;

use chrono::{DateTime, FixedOffset};

use chronomark_shared::{MatchConfig, MatchMethod, Result};

/// Scores closer than this are ties.
pub const SCORE_EPSILON: f64 = 1e-9;

/// One matching stage, tried in policy order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MatchStage {
    /// Equality after marker stripping.
    Exact,
    /// Equality after whitespace collapsing, edge punctuation trimming and case folding.
    Normalized,
    /// Best similarity above the threshold.
    Fuzzy,
    /// Similarity plus a bonus for candidates sharing a URL with the fragment.
    LinkBoosted,
}

impl MatchStage {
    /// Stages in their default order.
    pub const ALL: [MatchStage; 4] = [
        MatchStage::Exact,
        MatchStage::Normalized,
        MatchStage::Fuzzy,
        MatchStage::LinkBoosted,
    ];

    pub fn method(self) -> MatchMethod {
        match self {
            Self::Exact => MatchMethod::Exact,
            Self::Normalized => MatchMethod::Normalized,
            Self::Fuzzy => MatchMethod::Fuzzy,
            Self::LinkBoosted => MatchMethod::LinkBoosted,
        }
    }
}

/// A scored candidate as seen by the tie-break rule.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Contender {
    /// Ranking score (higher wins).
    pub score: f64,
    /// |candidate length - fragment length| in characters.
    pub length_delta: usize,
    /// Timestamp of the candidate's representative event.
    pub timestamp: DateTime<FixedOffset>,
    /// Candidate position in encounter order; the final, total tie-break.
    pub order: usize,
}

/// Resolution rule when several candidates score the same.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TieBreak {
    /// Closest text length, then earliest date, then first encountered.
    #[default]
    ClosestLengthThenEarliest,
}

impl TieBreak {
    /// `Ordering::Less` means `a` is preferred over `b`.
    pub fn compare(self, a: &Contender, b: &Contender) -> Ordering {
        match self {
            Self::ClosestLengthThenEarliest => {
                if (a.score - b.score).abs() > SCORE_EPSILON {
                    return b.score.total_cmp(&a.score);
                }
                a.length_delta
                    .cmp(&b.length_delta)
                    .then_with(|| a.timestamp.cmp(&b.timestamp))
                    .then_with(|| a.order.cmp(&b.order))
            }
        }
    }
}

/// Ordered stages, tie-break rule and tuning constants.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchPolicy {
    stages: Vec<MatchStage>,
    tie_break: TieBreak,
    config: MatchConfig,
}

impl Default for MatchPolicy {
    fn default() -> Self {
        Self {
            stages: MatchStage::ALL.to_vec(),
            tie_break: TieBreak::default(),
            config: MatchConfig::default(),
        }
    }
}

impl MatchPolicy {
    /// Default stage order with validated tuning.
    pub fn new(config: MatchConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            ..Self::default()
        })
    }

    /// Replace the stage order (duplicates are dropped, first position wins).
    pub fn with_stages(mut self, stages: impl IntoIterator<Item = MatchStage>) -> Self {
        let mut ordered: Vec<MatchStage> = Vec::new();
        for stage in stages {
            if !ordered.contains(&stage) {
                ordered.push(stage);
            }
        }
        self.stages = ordered;
        self
    }

    pub fn stages(&self) -> &[MatchStage] {
        &self.stages
    }

    pub fn tie_break(&self) -> TieBreak {
        self.tie_break
    }

    pub fn config(&self) -> &MatchConfig {
        &self.config
    }

    /// Pick the preferred contender.
    pub fn best(&self, contenders: impl IntoIterator<Item = Contender>) -> Option<Contender> {
        contenders
            .into_iter()
            .min_by(|a, b| self.tie_break.compare(a, b))
    }
}
