//! The gappiness index summarises how much of an entity's observed year range is missing and how
//! clustered the missing years are. Bursty gaps are penalised more than many isolated single-year
//! gaps through the logarithm of the average gap size.

use itertools::Itertools;
use log::trace;
use serde::{Deserialize, Serialize};

use crate::error::{DfppError, DfppResult};
use crate::series::EntitySeries;

/// Gap statistics of one entity series.
///
/// Entities without any observed value get the sentinel returned by [`GapSummary::empty`], in
/// which every optional field is `None`. Callers must skip interpolation for those.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct GapSummary {
    pub observed_years: usize,
    pub missing_years: Option<usize>,
    pub year_min: Option<i64>,
    pub year_max: Option<i64>,
    pub gappiness_index: Option<f64>,
}

/// A summary that has passed [`GapSummary::checked`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct CheckedSummary {
    pub missing_years: usize,
    pub year_min: i64,
    pub year_max: i64,
    pub gappiness_index: f64,
}

impl GapSummary {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::empty()
    }

    pub fn total_years(&self) -> Option<usize> {
        match (self.year_min, self.year_max) {
            (Some(min), Some(max)) if max >= min => usize::try_from(max - min + 1).ok(),
            _ => None,
        }
    }

    /// Validates the summary. Returns `None` for the sentinel and an error when fields are only
    /// partially set or contradict each other.
    pub(crate) fn checked(&self) -> DfppResult<Option<CheckedSummary>> {
        if self.is_empty() {
            return Ok(None);
        }
        let (Some(missing_years), Some(year_min), Some(year_max), Some(gappiness_index)) = (
            self.missing_years,
            self.year_min,
            self.year_max,
            self.gappiness_index,
        ) else {
            return Err(DfppError::MalformedSummary(format!(
                "partially defined summary {self:?}"
            )));
        };
        let total_years = self.total_years().ok_or_else(|| {
            DfppError::MalformedSummary(format!("year_min {year_min} exceeds year_max {year_max}"))
        })?;
        if self.observed_years == 0 || self.observed_years + missing_years != total_years {
            return Err(DfppError::MalformedSummary(format!(
                "{} observed and {missing_years} missing years do not cover {total_years} years",
                self.observed_years
            )));
        }
        if !gappiness_index.is_finite() || gappiness_index < 0.0 {
            return Err(DfppError::MalformedSummary(format!(
                "invalid gappiness index {gappiness_index}"
            )));
        }
        Ok(Some(CheckedSummary {
            missing_years,
            year_min,
            year_max,
            gappiness_index,
        }))
    }
}

/// `(missing / total) * (1 + ln(1 + average_gap_size))`, or 0 for an empty range.
pub fn gappiness_index(missing_years: usize, total_years: usize, average_gap_size: f64) -> f64 {
    if total_years == 0 {
        return 0.0;
    }
    (missing_years as f64 / total_years as f64) * (1.0 + average_gap_size.ln_1p())
}

/// Mean length of the runs of missing years between consecutive observed years. Adjacent
/// observed years produce a zero-length gap, which does not count towards the mean.
pub fn average_gap_size(observed_years: &[i64]) -> f64 {
    let gaps = observed_years
        .iter()
        .tuple_windows()
        .map(|(earlier, later)| later - earlier - 1)
        .filter(|gap| *gap > 0)
        .collect_vec();
    if gaps.is_empty() {
        return 0.0;
    }
    gaps.iter().sum::<i64>() as f64 / gaps.len() as f64
}

/// Compute the gap statistics of a series. Never fails.
pub fn analyze(series: &EntitySeries) -> GapSummary {
    let years = series.observed().map(|(year, _)| year).dedup().collect_vec();
    let (Some(&year_min), Some(&year_max)) = (years.first(), years.last()) else {
        trace!("{}: no observations", series.entity_id);
        return GapSummary::empty();
    };

    let total_years = (year_max - year_min + 1) as usize;
    let observed_years = years.len();
    let missing_years = total_years - observed_years;
    let index = gappiness_index(missing_years, total_years, average_gap_size(&years));
    trace!(
        "{}: {observed_years} observed, {missing_years} missing in {year_min}..={year_max}, index {index:.4}",
        series.entity_id
    );

    GapSummary {
        observed_years,
        missing_years: Some(missing_years),
        year_min: Some(year_min),
        year_max: Some(year_max),
        gappiness_index: Some(index),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn series(pairs: &[(i64, Option<f64>)]) -> EntitySeries {
        EntitySeries::from_pairs("BRA", pairs.iter().copied())
    }

    /// Observed in every year of `start..=end` except `missing`.
    fn series_missing(start: i64, end: i64, missing: &[i64]) -> EntitySeries {
        EntitySeries::from_pairs(
            "BRA",
            (start..=end).map(|year| (year, (!missing.contains(&year)).then_some(year as f64))),
        )
    }

    #[test]
    fn mixed_gaps_scenario() {
        let summary = analyze(&series(&[
            (2000, Some(1.0)),
            (2001, None),
            (2002, Some(3.0)),
            (2003, None),
            (2004, None),
            (2005, Some(6.0)),
        ]));
        assert_eq!(summary.observed_years, 3);
        assert_eq!(summary.missing_years, Some(3));
        assert_eq!(summary.year_min, Some(2000));
        assert_eq!(summary.year_max, Some(2005));
        assert_eq!(summary.total_years(), Some(6));
        // Gaps are [1, 2] so the average gap is 1.5
        let expected = 0.5 * (1.0 + 2.5_f64.ln());
        assert!((summary.gappiness_index.unwrap() - expected).abs() < 1e-12);
    }

    #[test]
    fn isolated_single_year_gaps() {
        // Gaps [1, 1, 0]; the zero gap between 2004 and 2005 is ignored
        let summary = analyze(&series(&[
            (2000, Some(1.0)),
            (2002, Some(3.0)),
            (2004, Some(5.0)),
            (2005, Some(6.0)),
        ]));
        assert_eq!(summary.missing_years, Some(2));
        let expected = (2.0 / 6.0) * (1.0 + 2.0_f64.ln());
        assert!((summary.gappiness_index.unwrap() - expected).abs() < 1e-12);
    }

    #[test]
    fn no_observations_gives_sentinel() {
        let summary = analyze(&series(&[(2000, None), (2001, Some(f64::NAN))]));
        assert!(summary.is_empty());
        assert_eq!(summary.observed_years, 0);
        assert_eq!(summary.gappiness_index, None);
        assert_eq!(analyze(&EntitySeries::default()), GapSummary::empty());
    }

    #[test]
    fn single_observation_has_no_missing_years() {
        let summary = analyze(&series(&[(1999, None), (2000, Some(1.0)), (2001, None)]));
        assert_eq!(summary.observed_years, 1);
        assert_eq!(summary.missing_years, Some(0));
        assert_eq!(summary.year_min, Some(2000));
        assert_eq!(summary.year_max, Some(2000));
        assert_eq!(summary.gappiness_index, Some(0.0));
    }

    #[test]
    fn adjacent_years_do_not_count_as_gaps() {
        assert_eq!(average_gap_size(&[2000, 2001, 2002]), 0.0);
        assert_eq!(average_gap_size(&[2000, 2001, 2004]), 2.0);
        assert_eq!(average_gap_size(&[2000]), 0.0);
        assert_eq!(average_gap_size(&[]), 0.0);
    }

    #[test]
    fn clustered_gaps_are_penalised_more_than_isolated_ones() {
        let base = analyze(&series_missing(2000, 2010, &[2005]));
        let isolated = analyze(&series_missing(2000, 2010, &[2002, 2005]));
        let clustered = analyze(&series_missing(2000, 2010, &[2005, 2006]));
        let base = base.gappiness_index.unwrap();
        let isolated = isolated.gappiness_index.unwrap();
        let clustered = clustered.gappiness_index.unwrap();
        assert!(isolated > base);
        assert!(isolated - base < clustered - base);
    }

    #[test]
    fn summary_invariant_holds() {
        let summary = analyze(&series_missing(1990, 2020, &[1991, 1995, 1996, 2010]));
        assert_eq!(
            summary.observed_years + summary.missing_years.unwrap(),
            summary.total_years().unwrap()
        );
        assert!(summary.checked().unwrap().is_some());
    }

    #[test]
    fn partially_defined_summary_is_malformed() {
        let summary = GapSummary {
            observed_years: 3,
            missing_years: Some(3),
            year_min: Some(2000),
            year_max: None,
            gappiness_index: Some(0.8),
        };
        assert!(matches!(
            summary.checked(),
            Err(DfppError::MalformedSummary(_))
        ));

        let inconsistent = GapSummary {
            observed_years: 3,
            missing_years: Some(1),
            year_min: Some(2000),
            year_max: Some(2005),
            gappiness_index: Some(0.2),
        };
        assert!(matches!(
            inconsistent.checked(),
            Err(DfppError::MalformedSummary(_))
        ));
    }

    #[test]
    fn index_of_empty_range_is_zero() {
        assert_eq!(gappiness_index(0, 0, 0.0), 0.0);
    }
}
