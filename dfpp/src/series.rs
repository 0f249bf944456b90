//! Per-entity yearly observations.

use serde::{Deserialize, Serialize};

/// A single yearly data point. `NaN` values are treated the same as absent ones.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub year: i64,
    pub value: Option<f64>,
}

impl Observation {
    pub fn new(year: i64, value: Option<f64>) -> Self {
        Self { year, value }
    }

    pub fn is_observed(&self) -> bool {
        self.value.is_some_and(|value| !value.is_nan())
    }
}

/// All observations of one entity (e.g. a country), ordered by year.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct EntitySeries {
    pub entity_id: String,
    observations: Vec<Observation>,
}

impl EntitySeries {
    pub fn new<I>(entity_id: impl Into<String>, observations: I) -> Self
    where
        I: IntoIterator<Item = Observation>,
    {
        let mut observations: Vec<Observation> = observations.into_iter().collect();
        observations.sort_by_key(|observation| observation.year);
        Self {
            entity_id: entity_id.into(),
            observations,
        }
    }

    pub fn from_pairs<I>(entity_id: impl Into<String>, pairs: I) -> Self
    where
        I: IntoIterator<Item = (i64, Option<f64>)>,
    {
        Self::new(
            entity_id,
            pairs
                .into_iter()
                .map(|(year, value)| Observation::new(year, value)),
        )
    }

    pub fn observations(&self) -> &[Observation] {
        &self.observations
    }

    pub fn len(&self) -> usize {
        self.observations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }

    pub fn years(&self) -> impl Iterator<Item = i64> + '_ {
        self.observations.iter().map(|observation| observation.year)
    }

    pub fn values(&self) -> Vec<Option<f64>> {
        self.observations
            .iter()
            .map(|observation| observation.value)
            .collect()
    }

    /// Years and values of the observations that carry a value.
    pub fn observed(&self) -> impl Iterator<Item = (i64, f64)> + '_ {
        self.observations
            .iter()
            .filter(|observation| observation.is_observed())
            .filter_map(|observation| observation.value.map(|value| (observation.year, value)))
    }

    /// Value recorded for `year`, if the year is present and observed.
    pub fn value(&self, year: i64) -> Option<f64> {
        self.observations
            .binary_search_by_key(&year, |observation| observation.year)
            .ok()
            .and_then(|idx| {
                let observation = self.observations[idx];
                observation.is_observed().then_some(observation.value).flatten()
            })
    }

    /// Returns a copy in which every year of `year_min..=year_max` is present, inserting absent
    /// years without a value. Observations outside the range are kept untouched.
    pub fn densify(&self, year_min: i64, year_max: i64) -> Self {
        let mut observations = Vec::with_capacity(self.observations.len());
        let mut existing = self.observations.iter().peekable();
        while let Some(observation) = existing.next_if(|o| o.year < year_min) {
            observations.push(*observation);
        }
        for year in year_min..=year_max {
            let mut found = false;
            while let Some(observation) = existing.next_if(|o| o.year == year) {
                observations.push(*observation);
                found = true;
            }
            if !found {
                observations.push(Observation::new(year, None));
            }
        }
        observations.extend(existing.copied());
        Self {
            entity_id: self.entity_id.clone(),
            observations,
        }
    }

    pub(crate) fn observations_mut(&mut self) -> &mut [Observation] {
        &mut self.observations
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn observations_are_sorted_by_year() {
        let series =
            EntitySeries::from_pairs("KEN", [(2002, Some(3.0)), (2000, Some(1.0)), (2001, None)]);
        assert_eq!(series.years().collect::<Vec<_>>(), vec![2000, 2001, 2002]);
        assert_eq!(series.values(), vec![Some(1.0), None, Some(3.0)]);
    }

    #[test]
    fn nan_is_not_observed() {
        let series = EntitySeries::from_pairs("KEN", [(2000, Some(f64::NAN)), (2001, Some(2.0))]);
        assert_eq!(series.observed().collect::<Vec<_>>(), vec![(2001, 2.0)]);
        assert_eq!(series.value(2000), None);
        assert_eq!(series.value(2001), Some(2.0));
        assert_eq!(series.value(1999), None);
    }

    #[test]
    fn densify_inserts_absent_years_only_inside_range() {
        let series = EntitySeries::from_pairs(
            "KEN",
            [(1998, None), (2000, Some(1.0)), (2003, Some(4.0)), (2005, None)],
        );
        let dense = series.densify(2000, 2003);
        assert_eq!(
            dense.years().collect::<Vec<_>>(),
            vec![1998, 2000, 2001, 2002, 2003, 2005]
        );
        assert_eq!(
            dense.values(),
            vec![None, Some(1.0), None, None, Some(4.0), None]
        );
        assert_eq!(dense.entity_id, "KEN");
    }
}
