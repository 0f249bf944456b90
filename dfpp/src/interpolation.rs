//! Gap filling. The gappiness index of a series decides between a natural cubic spline, which
//! suits series with few and short gaps, and carrying the last observation forward, which is the
//! safer choice when long stretches of years are missing.

use log::{debug, warn};
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};

use crate::error::DfppResult;
use crate::gappiness::{CheckedSummary, GapSummary};
use crate::series::EntitySeries;
use crate::spline::NaturalCubicSpline;

/// Series whose gappiness index is below this value are filled with a spline.
pub const SPLINE_THRESHOLD: f64 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize)]
#[strum(serialize_all = "snake_case")]
pub enum Strategy {
    Spline,
    CarryForward,
}

impl Strategy {
    pub fn select(gappiness_index: f64) -> Self {
        if gappiness_index < SPLINE_THRESHOLD {
            Strategy::Spline
        } else {
            Strategy::CarryForward
        }
    }
}

/// Fills the missing years of `series` inside its observed range.
///
/// The summary must come from [`crate::gappiness::analyze`] on the same series. Years outside
/// `[year_min, year_max]` are never filled. Filling an already filled series returns it unchanged.
pub fn fill(series: &EntitySeries, summary: &GapSummary) -> DfppResult<EntitySeries> {
    let Some(summary) = summary.checked()? else {
        return Ok(series.clone());
    };
    if summary.missing_years == 0 {
        return Ok(series.clone());
    }

    let mut dense = series.densify(summary.year_min, summary.year_max);
    let strategy = Strategy::select(summary.gappiness_index);
    debug!(
        "{}: filling {} missing years with {strategy} (index {:.4})",
        series.entity_id, summary.missing_years, summary.gappiness_index
    );
    match strategy {
        Strategy::Spline => {
            if !fill_spline(&mut dense, &summary) {
                warn!(
                    "{}: could not fit a spline, leaving the series unfilled",
                    series.entity_id
                );
                return Ok(series.clone());
            }
        }
        Strategy::CarryForward => carry_forward(&mut dense, &summary),
    }
    Ok(dense)
}

fn fill_spline(dense: &mut EntitySeries, summary: &CheckedSummary) -> bool {
    let (xs, ys): (Vec<f64>, Vec<f64>) = dense
        .observed()
        .map(|(year, value)| (year as f64, value))
        .unzip();
    let Some(spline) = NaturalCubicSpline::fit(&xs, &ys) else {
        return false;
    };
    for observation in dense.observations_mut() {
        let inside = summary.year_min < observation.year && observation.year < summary.year_max;
        if inside && !observation.is_observed() {
            observation.value = spline.evaluate(observation.year as f64);
        }
    }
    true
}

fn carry_forward(dense: &mut EntitySeries, summary: &CheckedSummary) {
    let mut last = None;
    for observation in dense.observations_mut() {
        if observation.year < summary.year_min || observation.year > summary.year_max {
            continue;
        }
        if observation.is_observed() {
            last = observation.value;
        } else {
            observation.value = last;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DfppError;
    use crate::gappiness::analyze;

    fn fill_analyzed(series: &EntitySeries) -> EntitySeries {
        fill(series, &analyze(series)).unwrap()
    }

    #[test]
    fn strategy_thresholds() {
        assert_eq!(Strategy::select(0.0), Strategy::Spline);
        assert_eq!(Strategy::select(0.19), Strategy::Spline);
        assert_eq!(Strategy::select(0.49), Strategy::Spline);
        assert_eq!(Strategy::select(0.5), Strategy::CarryForward);
        assert_eq!(Strategy::select(0.85), Strategy::CarryForward);
        assert_eq!(Strategy::CarryForward.to_string(), "carry_forward");
    }

    #[test]
    fn gappy_series_is_carried_forward() {
        let series = EntitySeries::from_pairs(
            "MEX",
            [
                (2000, Some(1.0)),
                (2001, None),
                (2002, Some(3.0)),
                (2003, None),
                (2004, None),
                (2005, Some(6.0)),
            ],
        );
        let filled = fill_analyzed(&series);
        assert_eq!(
            filled.values(),
            vec![Some(1.0), Some(1.0), Some(3.0), Some(3.0), Some(3.0), Some(6.0)]
        );
    }

    #[test]
    fn sparse_gaps_use_a_spline() {
        // One missing year in eleven gives an index well below the threshold
        let series = EntitySeries::from_pairs(
            "MEX",
            (2000..=2010).map(|year| (year, (year != 2004).then_some(2.0 * year as f64))),
        );
        let filled = fill_analyzed(&series);
        assert_eq!(filled.len(), 11);
        assert!((filled.value(2004).unwrap() - 4008.0).abs() < 1e-6);
    }

    #[test]
    fn absent_years_are_inserted() {
        let series = EntitySeries::from_pairs(
            "MEX",
            [(2000, Some(1.0)), (2001, Some(2.0)), (2002, Some(3.0)), (2004, Some(5.0))],
        );
        let filled = fill_analyzed(&series);
        assert_eq!(filled.years().collect::<Vec<_>>(), (2000..=2004).collect::<Vec<_>>());
        assert!(filled.value(2003).is_some());
    }

    #[test]
    fn leading_and_trailing_missing_years_stay_missing() {
        let series = EntitySeries::from_pairs(
            "MEX",
            [
                (1998, None),
                (1999, None),
                (2000, Some(1.0)),
                (2001, None),
                (2002, None),
                (2003, None),
                (2004, Some(5.0)),
                (2005, None),
            ],
        );
        let filled = fill_analyzed(&series);
        assert_eq!(
            filled.values(),
            vec![
                None,
                None,
                Some(1.0),
                Some(1.0),
                Some(1.0),
                Some(1.0),
                Some(5.0),
                None
            ]
        );
    }

    #[test]
    fn fill_is_idempotent() {
        for series in [
            EntitySeries::from_pairs(
                "MEX",
                [(2000, Some(1.0)), (2002, Some(3.0)), (2005, Some(6.0))],
            ),
            EntitySeries::from_pairs(
                "MEX",
                (2000..=2010).map(|year| (year, (year % 4 != 1).then_some(year as f64))),
            ),
        ] {
            let once = fill_analyzed(&series);
            let twice = fill_analyzed(&once);
            assert_eq!(once, twice);
        }
    }

    #[test]
    fn complete_and_empty_series_are_unchanged() {
        let single = EntitySeries::from_pairs("MEX", [(1999, None), (2000, Some(1.0))]);
        assert_eq!(fill_analyzed(&single), single);

        let empty = EntitySeries::from_pairs("MEX", [(2000, None), (2001, None)]);
        assert_eq!(fill_analyzed(&empty), empty);
    }

    #[test]
    fn malformed_summary_is_rejected() {
        let series = EntitySeries::from_pairs("MEX", [(2000, Some(1.0)), (2002, Some(3.0))]);
        let summary = GapSummary {
            gappiness_index: None,
            ..analyze(&series)
        };
        assert!(matches!(
            fill(&series, &summary),
            Err(DfppError::MalformedSummary(_))
        ));
    }
}
