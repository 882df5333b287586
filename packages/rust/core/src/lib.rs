//! Chronology engine: matches document fragments against the history of
//! added lines, infers dates for the rest, and groups the result by month.

pub mod aggregate;
pub mod infer;
pub mod matcher;
pub mod pipeline;
pub mod policy;
pub mod similarity;

pub use aggregate::{ChronologicalView, MonthGroup, SectionBlock, aggregate, diagnose, render};
pub use infer::infer_dates;
pub use matcher::{MatchResult, MatchSummary, Matcher};
pub use pipeline::{
    ChronologyConfig, ChronologyResult, ProgressReporter, SilentProgress, build_chronology,
    date_fragments,
};
pub use policy::{Contender, MatchPolicy, MatchStage, TieBreak};
