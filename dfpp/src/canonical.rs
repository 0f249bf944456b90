//! Canonical long-format observation table shared by all sources.

use log::warn;
use polars::prelude::{DataFrame, DataType, Series};

use crate::error::DfppResult;
use crate::validation::{check_duplicates, panel_key_columns};
use crate::COL;

pub const CANONICAL_COLUMNS: [&str; 9] = [
    COL::SOURCE,
    COL::SERIES_ID,
    COL::SERIES_NAME,
    COL::ALPHA_3_CODE,
    COL::PROP_UNIT,
    COL::PROP_OBSERVATION_TYPE,
    COL::YEAR,
    COL::VALUE,
    COL::PROP_VALUE_LABEL,
];

fn canonical_dtype(name: &str) -> DataType {
    match name {
        COL::YEAR => DataType::Int64,
        COL::VALUE => DataType::Float64,
        _ => DataType::String,
    }
}

/// Adds every missing canonical column, filled with nulls.
pub fn ensure_canonical_columns(mut df: DataFrame) -> DfppResult<DataFrame> {
    let height = df.height();
    for name in CANONICAL_COLUMNS {
        if df.get_column_index(name).is_none() {
            warn!("Filling missing canonical column {name} with nulls");
            df.with_column(Series::full_null(name, height, &canonical_dtype(name)))?;
        }
    }
    Ok(df)
}

/// Orders the columns as source, series id and name, then disaggregations, then additional
/// properties, then the remaining canonical columns. Columns outside these groups go last.
pub fn sort_columns_canonically(df: &DataFrame) -> DfppResult<DataFrame> {
    let names: Vec<&str> = df.get_column_names();
    let extra = |prefix: &'static str| {
        names
            .iter()
            .copied()
            .filter(move |name| name.starts_with(prefix) && !CANONICAL_COLUMNS.contains(name))
    };
    let others = names.iter().copied().filter(|name| {
        !CANONICAL_COLUMNS.contains(name)
            && !name.starts_with(COL::DIMENSION_PREFIX)
            && !name.starts_with(COL::PROPERTY_PREFIX)
    });

    let order: Vec<&str> = CANONICAL_COLUMNS[..3]
        .iter()
        .copied()
        .chain(extra(COL::DIMENSION_PREFIX))
        .chain(extra(COL::PROPERTY_PREFIX))
        .chain(CANONICAL_COLUMNS[3..].iter().copied())
        .chain(others)
        .collect();
    Ok(df.select(order)?)
}

/// Brings a source table into canonical shape and rejects duplicate observations.
pub fn finalize(df: DataFrame) -> DfppResult<DataFrame> {
    let df = ensure_canonical_columns(df)?;
    let df = sort_columns_canonically(&df)?;
    check_duplicates(&df, &panel_key_columns(&df))?;
    Ok(df)
}
