//! Integrity checks for observation tables.

use itertools::Itertools;
use log::debug;
use polars::lazy::dsl::{col, len, lit};
use polars::prelude::{DataFrame, DataType, IntoLazy};

use crate::error::{DfppError, DfppResult};
use crate::COL;

const COUNT: &str = "__count";

/// Key columns of the canonical table: the panel columns plus every disaggregation column.
pub fn panel_key_columns(df: &DataFrame) -> Vec<String> {
    [COL::ALPHA_3_CODE, COL::SERIES_ID, COL::YEAR]
        .into_iter()
        .map(String::from)
        .chain(
            df.get_column_names()
                .into_iter()
                .filter(|name| name.starts_with(COL::DIMENSION_PREFIX))
                .map(|name| name.to_string()),
        )
        .collect()
}

/// Fails with [`DfppError::DuplicateObservations`] if any combination of `columns` occurs more
/// than once. The reported count excludes the first occurrence of each combination.
pub fn check_duplicates(df: &DataFrame, columns: &[String]) -> DfppResult<()> {
    let counts = df
        .clone()
        .lazy()
        .group_by(columns.iter().map(|name| col(name)).collect_vec())
        .agg([len().alias(COUNT)])
        .filter(col(COUNT).gt(lit(1)))
        .collect()?;
    let count: i64 = counts
        .column(COUNT)?
        .cast(&DataType::Int64)?
        .i64()?
        .into_iter()
        .flatten()
        .map(|n| n - 1)
        .sum();
    if count > 0 {
        return Err(DfppError::DuplicateObservations {
            count: count as usize,
            columns: columns.to_vec(),
        });
    }
    debug!("No duplicates over {columns:?}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use polars::df;

    use super::*;

    #[test]
    fn unique_rows_pass() -> anyhow::Result<()> {
        let df = df!(
            COL::ALPHA_3_CODE => ["AFG", "AFG", "ALB"],
            COL::SERIES_ID => ["SP.POP", "SP.POP", "SP.POP"],
            COL::YEAR => [2000i64, 2001, 2000],
            "disagr_sex" => ["female", "female", "female"],
        )?;
        check_duplicates(&df, &panel_key_columns(&df))?;
        Ok(())
    }

    #[test]
    fn duplicates_are_counted() -> anyhow::Result<()> {
        let df = df!(
            COL::ALPHA_3_CODE => ["AFG", "AFG", "AFG", "ALB"],
            COL::SERIES_ID => ["SP.POP", "SP.POP", "SP.POP", "SP.POP"],
            COL::YEAR => [2000i64, 2000, 2000, 2000],
        )?;
        match check_duplicates(&df, &panel_key_columns(&df)) {
            Err(DfppError::DuplicateObservations { count, columns }) => {
                assert_eq!(count, 2);
                assert_eq!(columns, vec!["alpha_3_code", "series_id", "year"]);
            }
            other => panic!("expected duplicates, got {other:?}"),
        }
        Ok(())
    }

    #[test]
    fn disaggregations_are_part_of_the_key() -> anyhow::Result<()> {
        let df = df!(
            COL::ALPHA_3_CODE => ["AFG", "AFG"],
            COL::SERIES_ID => ["SL.UEM", "SL.UEM"],
            COL::YEAR => [2010i64, 2010],
            "disagr_sex" => ["male", "female"],
        )?;
        let columns = panel_key_columns(&df);
        assert_eq!(columns.last().map(String::as_str), Some("disagr_sex"));
        check_duplicates(&df, &columns)?;
        Ok(())
    }
}
