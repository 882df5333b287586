//! Neighbour-based date inference for fragments the matcher could not date.

use chrono::NaiveDate;
use tracing::{debug, instrument};

use chronomark_shared::{Fragment, MatchMethod};

/// Date every unmatched fragment from its nearest directly matched
/// neighbours in document order.
///
/// - Both neighbours dated: the later of the two dates
/// - One neighbour dated: that date
/// - Neither: the fragment stays unmatched
///
/// Only direct matches count as neighbours, so inferred dates never feed
/// further inference and the result does not depend on iteration order.
/// Returns the number of fragments inferred.
#[instrument(skip_all, fields(fragments = fragments.len()))]
pub fn infer_dates(fragments: &mut [Fragment]) -> usize {
    let direct: Vec<Option<NaiveDate>> = fragments
        .iter()
        .map(|f| {
            if f.match_method.is_direct() {
                f.matched_date
            } else {
                None
            }
        })
        .collect();

    let mut previous: Vec<Option<NaiveDate>> = Vec::with_capacity(direct.len());
    let mut last = None;
    for date in &direct {
        previous.push(last);
        if date.is_some() {
            last = *date;
        }
    }

    let mut next: Vec<Option<NaiveDate>> = vec![None; direct.len()];
    let mut upcoming = None;
    for (idx, date) in direct.iter().enumerate().rev() {
        next[idx] = upcoming;
        if date.is_some() {
            upcoming = *date;
        }
    }

    let mut inferred = 0;
    for (idx, fragment) in fragments.iter_mut().enumerate() {
        if fragment.match_method != MatchMethod::Unmatched {
            continue;
        }
        let date = match (previous[idx], next[idx]) {
            (Some(before), Some(after)) => Some(before.max(after)),
            (Some(only), None) | (None, Some(only)) => Some(only),
            (None, None) => None,
        };
        if let Some(date) = date {
            fragment.matched_date = Some(date);
            fragment.match_confidence = None;
            fragment.match_method = MatchMethod::Inferred;
            fragment.matched_commit = None;
            inferred += 1;
        }
    }

    debug!(inferred, "neighbour dates inferred");
    inferred
}

#[cfg(test)]
mod tests {
    use super::*;
    use chronomark_shared::{FragmentKind, SectionPath};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn fragment(index: usize, matched: Option<NaiveDate>) -> Fragment {
        let mut f = Fragment::new(
            FragmentKind::ParagraphText { fenced: false },
            format!("line {index}"),
            format!("line {index}"),
            SectionPath::default(),
            index,
            index + 1,
        );
        if let Some(d) = matched {
            f.matched_date = Some(d);
            f.match_method = MatchMethod::Exact;
            f.match_confidence = Some(1.0);
        }
        f
    }

    fn dates(fragments: &[Fragment]) -> Vec<Option<NaiveDate>> {
        fragments.iter().map(|f| f.matched_date).collect()
    }

    #[test]
    fn takes_the_later_neighbour() {
        let mut fragments = vec![
            fragment(0, Some(date(2024, 1, 10))),
            fragment(1, None),
            fragment(2, Some(date(2023, 10, 1))),
        ];
        assert_eq!(infer_dates(&mut fragments), 1);
        assert_eq!(fragments[1].matched_date, Some(date(2024, 1, 10)));
        assert_eq!(fragments[1].match_method, MatchMethod::Inferred);
        assert_eq!(fragments[1].match_confidence, None);
    }

    #[test]
    fn single_neighbour_at_either_end() {
        let mut fragments = vec![
            fragment(0, None),
            fragment(1, Some(date(2024, 2, 1))),
            fragment(2, None),
        ];
        assert_eq!(infer_dates(&mut fragments), 2);
        assert_eq!(
            dates(&fragments),
            vec![
                Some(date(2024, 2, 1)),
                Some(date(2024, 2, 1)),
                Some(date(2024, 2, 1))
            ]
        );
    }

    #[test]
    fn runs_of_unmatched_see_the_same_neighbours() {
        let mut fragments = vec![
            fragment(0, Some(date(2023, 5, 1))),
            fragment(1, None),
            fragment(2, None),
            fragment(3, None),
            fragment(4, Some(date(2023, 3, 1))),
        ];
        infer_dates(&mut fragments);
        for f in &fragments[1..4] {
            assert_eq!(f.matched_date, Some(date(2023, 5, 1)));
        }
    }

    #[test]
    fn nothing_matched_stays_unmatched() {
        let mut fragments = vec![fragment(0, None), fragment(1, None)];
        assert_eq!(infer_dates(&mut fragments), 0);
        assert!(fragments.iter().all(|f| f.match_method == MatchMethod::Unmatched));
        assert!(fragments.iter().all(|f| !f.is_dated()));
    }

    #[test]
    fn direct_matches_are_untouched() {
        let mut fragments = vec![
            fragment(0, Some(date(2024, 1, 1))),
            fragment(1, Some(date(2022, 1, 1))),
        ];
        assert_eq!(infer_dates(&mut fragments), 0);
        assert_eq!(fragments[1].matched_date, Some(date(2022, 1, 1)));
        assert_eq!(fragments[1].match_method, MatchMethod::Exact);
    }

    #[test]
    fn empty_input() {
        assert_eq!(infer_dates(&mut []), 0);
    }
}
