//! Gap filling over whole observation tables. Rows are grouped by entity, every group is analysed
//! and filled independently and the filled values are written back into the table.

use std::collections::{BTreeMap, BTreeSet};
use std::ops::Range;

use itertools::Itertools;
use log::{debug, info};
use polars::lazy::dsl::{col, lit};
use polars::prelude::{
    DataFrame, DataType, IntoLazy, JoinArgs, JoinType, NamedFrom, Series, SortMultipleOptions,
};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::DfppResult;
use crate::gappiness::{analyze, GapSummary};
use crate::interpolation::fill;
use crate::series::{EntitySeries, Observation};
use crate::validation::check_duplicates;
use crate::COL;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct PanelOptions {
    /// Column identifying the entity, usually the ISO 3166-1 alpha-3 country code.
    pub entity_column: String,
    pub year_column: String,
    /// Observations before this year are dropped before any analysis.
    pub min_year: Option<i64>,
    /// Insert rows for years absent from the table inside each entity's observed range.
    pub complete_years: bool,
    /// Append the gappiness summary of every indicator as `{indicator}_{field}` columns.
    pub keep_work_columns: bool,
}

impl Default for PanelOptions {
    fn default() -> Self {
        PanelOptions {
            entity_column: COL::ALPHA_3_CODE.into(),
            year_column: COL::YEAR.into(),
            min_year: None,
            complete_years: true,
            keep_work_columns: false,
        }
    }
}

/// Rows of one entity in a table sorted by entity and year.
#[derive(Debug, Clone)]
struct Group {
    entity: String,
    rows: Range<usize>,
}

/// A cleaned and sorted table together with its entity groups.
struct Panel {
    df: DataFrame,
    years: Vec<i64>,
    groups: Vec<Group>,
}

impl Panel {
    fn new(df: &DataFrame, indicators: &[&str], options: &PanelOptions) -> DfppResult<Self> {
        let entity = options.entity_column.as_str();
        let year = options.year_column.as_str();

        let mut lf = df
            .clone()
            .lazy()
            .with_columns(
                [
                    col(entity).cast(DataType::String),
                    col(year).cast(DataType::Int64),
                ]
                .into_iter()
                .chain(
                    indicators
                        .iter()
                        .map(|indicator| col(indicator).cast(DataType::Float64)),
                )
                .collect_vec(),
            )
            .filter(col(entity).is_not_null().and(col(year).is_not_null()));
        if let Some(min_year) = options.min_year {
            lf = lf.filter(col(year).gt_eq(lit(min_year)));
        }
        let mut df = lf.collect()?;
        check_duplicates(&df, &[entity.to_string(), year.to_string()])?;

        if options.complete_years {
            df = complete_years(df, indicators, entity, year)?;
        }
        let df = df.sort(
            [entity, year],
            SortMultipleOptions::default().with_maintain_order(true),
        )?;

        let years = df.column(year)?.i64()?.into_no_null_iter().collect_vec();
        let mut groups: Vec<Group> = vec![];
        for (row, id) in df.column(entity)?.str()?.into_no_null_iter().enumerate() {
            match groups.last_mut() {
                Some(group) if group.entity == id => group.rows.end = row + 1,
                _ => groups.push(Group {
                    entity: id.to_string(),
                    rows: row..row + 1,
                }),
            }
        }
        debug!("Panel with {} rows and {} entities", df.height(), groups.len());
        Ok(Self { df, years, groups })
    }

    fn values(&self, indicator: &str) -> DfppResult<Vec<Option<f64>>> {
        Ok(self.df.column(indicator)?.f64()?.into_iter().collect())
    }

    fn series(&self, group: &Group, values: &[Option<f64>]) -> EntitySeries {
        EntitySeries::new(
            group.entity.as_str(),
            group
                .rows
                .clone()
                .map(|row| Observation::new(self.years[row], values[row])),
        )
    }
}

/// Adds null rows for the years missing between the first and last observation of any indicator.
fn complete_years(
    df: DataFrame,
    indicators: &[&str],
    entity: &str,
    year: &str,
) -> DfppResult<DataFrame> {
    let ids = df.column(entity)?.str()?.into_no_null_iter().collect_vec();
    let years = df.column(year)?.i64()?.into_no_null_iter().collect_vec();
    let mut observed = vec![false; df.height()];
    for indicator in indicators {
        for (row, value) in df.column(indicator)?.f64()?.into_iter().enumerate() {
            observed[row] |= value.is_some_and(|value| !value.is_nan());
        }
    }

    let mut present: BTreeMap<&str, BTreeSet<i64>> = BTreeMap::new();
    let mut ranges: BTreeMap<&str, (i64, i64)> = BTreeMap::new();
    for (row, (id, year)) in ids.iter().copied().zip(&years).enumerate() {
        present.entry(id).or_default().insert(*year);
        if observed[row] {
            ranges
                .entry(id)
                .and_modify(|(min, max)| {
                    *min = (*min).min(*year);
                    *max = (*max).max(*year);
                })
                .or_insert((*year, *year));
        }
    }

    let mut added = 0;
    for (id, (min, max)) in &ranges {
        let entity_years = present.entry(*id).or_default();
        let before = entity_years.len();
        entity_years.extend(*min..=*max);
        added += entity_years.len() - before;
    }
    if added == 0 {
        return Ok(df);
    }
    debug!("Inserting {added} rows for absent years");

    let (skeleton_ids, skeleton_years): (Vec<&str>, Vec<i64>) = present
        .iter()
        .flat_map(|(id, years)| years.iter().map(move |year| (*id, *year)))
        .unzip();
    let skeleton = DataFrame::new(vec![
        Series::new(entity, skeleton_ids),
        Series::new(year, skeleton_years),
    ])?;
    let order = df
        .get_column_names()
        .into_iter()
        .map(String::from)
        .collect_vec();
    let completed = skeleton
        .lazy()
        .join(
            df.lazy(),
            [col(entity), col(year)],
            [col(entity), col(year)],
            JoinArgs::new(JoinType::Left),
        )
        .collect()?;
    Ok(completed.select(order)?)
}

/// Fills the gaps of every indicator column, entity by entity.
///
/// The result keeps the input columns in their order, sorted by entity and year. The year column
/// is cast to `Int64` and the indicator columns to `Float64`. Years before the first and after
/// the last observation of an entity are left as they are.
pub fn interpolate_panel(
    df: &DataFrame,
    indicators: &[&str],
    options: &PanelOptions,
) -> DfppResult<DataFrame> {
    let panel = Panel::new(df, indicators, options)?;
    let mut out = panel.df.clone();
    let mut work_columns = vec![];

    for indicator in indicators {
        let values = panel.values(indicator)?;
        let filled: Vec<(GapSummary, Vec<Option<f64>>)> = panel
            .groups
            .par_iter()
            .map(|group| {
                let series = panel.series(group, &values);
                let summary = analyze(&series);
                let filled = fill(&series, &summary)?;
                let values = group
                    .rows
                    .clone()
                    .map(|row| filled.value(panel.years[row]))
                    .collect_vec();
                Ok((summary, values))
            })
            .collect::<DfppResult<_>>()?;

        let filled_count = values
            .iter()
            .filter(|value| value.is_none())
            .count()
            .saturating_sub(
                filled
                    .iter()
                    .flat_map(|(_, values)| values)
                    .filter(|value| value.is_none())
                    .count(),
            );
        info!("{indicator}: filled {filled_count} values");

        out.with_column(Series::new(
            indicator,
            filled
                .iter()
                .flat_map(|(_, values)| values.iter().copied())
                .collect_vec(),
        ))?;
        if options.keep_work_columns {
            let summaries = panel
                .groups
                .iter()
                .zip(&filled)
                .flat_map(|(group, (summary, _))| group.rows.clone().map(move |_| *summary))
                .collect_vec();
            work_columns.extend(summary_columns(indicator, &summaries));
        }
    }

    for column in work_columns {
        out.with_column(column)?;
    }
    Ok(out)
}

/// One row per entity with the gappiness summary of `indicator`.
pub fn gappiness_table(
    df: &DataFrame,
    indicator: &str,
    options: &PanelOptions,
) -> DfppResult<DataFrame> {
    let options = PanelOptions {
        complete_years: false,
        ..options.clone()
    };
    let panel = Panel::new(df, &[indicator], &options)?;
    let values = panel.values(indicator)?;
    let summaries = panel
        .groups
        .par_iter()
        .map(|group| analyze(&panel.series(group, &values)))
        .collect::<Vec<_>>();

    let entities = panel
        .groups
        .iter()
        .map(|group| group.entity.as_str())
        .collect_vec();
    let mut columns = vec![Series::new(&options.entity_column, entities)];
    columns.extend(summary_columns("", &summaries));
    Ok(DataFrame::new(columns)?)
}

fn summary_columns(prefix: &str, summaries: &[GapSummary]) -> Vec<Series> {
    let name = |field: &str| {
        if prefix.is_empty() {
            field.to_string()
        } else {
            format!("{prefix}_{field}")
        }
    };
    vec![
        Series::new(
            &name(COL::GAPPINESS_INDEX),
            summaries.iter().map(|s| s.gappiness_index).collect_vec(),
        ),
        Series::new(
            &name(COL::OBSERVED_YEARS),
            summaries
                .iter()
                .map(|s| s.observed_years as i64)
                .collect_vec(),
        ),
        Series::new(
            &name(COL::MISSING_YEARS),
            summaries
                .iter()
                .map(|s| s.missing_years.map(|n| n as i64))
                .collect_vec(),
        ),
        Series::new(
            &name(COL::YEAR_MIN),
            summaries.iter().map(|s| s.year_min).collect_vec(),
        ),
        Series::new(
            &name(COL::YEAR_MAX),
            summaries.iter().map(|s| s.year_max).collect_vec(),
        ),
    ]
}
