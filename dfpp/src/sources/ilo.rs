//! ILOSTAT SDMX REST API.

use std::io::Cursor;

use anyhow::Context;
use itertools::Itertools;
use log::{debug, info};
use polars::lazy::dsl::{col, lit, Expr};
use polars::prelude::{CsvReadOptions, DataFrame, DataType, IntoLazy, SerReader};
use reqwest::Client;

use crate::canonical::finalize;
use crate::config::HttpConfig;
use crate::COL;

pub const SOURCE: &str = "https://ilostat.ilo.org";

/// SDMX dimensions that are published as disaggregations.
pub const DISAGGREGATIONS: [&str; 5] = ["SEX", "AGE", "GEO", "EDU", "NOC"];

/// SDMX column and the canonical column it maps onto.
const COLUMNS: [(&str, &str); 11] = [
    ("REF_AREA", COL::ALPHA_3_CODE),
    ("INDICATOR", COL::SERIES_ID),
    ("SEX", "disagr_sex"),
    ("AGE", "disagr_age"),
    ("GEO", "disagr_geo"),
    ("EDU", "disagr_edu"),
    ("NOC", "disagr_noc"),
    ("TIME_PERIOD", COL::YEAR),
    ("OBS_VALUE", COL::VALUE),
    ("OBS_STATUS", COL::PROP_OBSERVATION_TYPE),
    ("UNIT_MEASURE_TYPE", COL::PROP_UNIT),
];

/// Fetches an ILOSTAT dataflow such as `DF_UNE_DEAP_SEX_AGE_RT` as CSV.
pub async fn get_series_data(
    client: &Client,
    config: &HttpConfig,
    series_code: &str,
) -> anyhow::Result<Option<DataFrame>> {
    let url = format!(
        "{}/data/ILO,{series_code}/",
        config.ilo_base_url.trim_end_matches('/')
    );
    debug!("GET {url}");
    let body = client
        .get(&url)
        .query(&[
            ("format", "csvfile".to_string()),
            ("startPeriod", format!("{}-01-01", config.period_start)),
            ("endPeriod", format!("{}-12-31", config.period_end)),
        ])
        .send()
        .await?
        .error_for_status()
        .with_context(|| format!("Failed to fetch ILO series {series_code}"))?
        .bytes()
        .await?;
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(None);
    }

    // Every column is read as a string and cast after renaming
    let raw = CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(Some(0))
        .into_reader_with_file_handle(Cursor::new(body.to_vec()))
        .finish()
        .with_context(|| format!("Failed to parse ILO series {series_code}"))?;
    let df = transform(raw)?;
    info!("{series_code}: {} observations from the ILO", df.height());
    Ok((df.height() > 0).then_some(df))
}

fn transform(raw: DataFrame) -> anyhow::Result<DataFrame> {
    let present = raw.get_column_names();
    let has = |name: &str| present.contains(&name);

    let mut lf = raw.clone().lazy();
    // Annual observations only
    if has("FREQ") {
        lf = lf.filter(col("FREQ").eq(lit("A")));
    }
    // Aggregate bands only, to avoid overlapping age and education breakdowns
    for column in ["AGE", "EDU"].into_iter().filter(|column| has(column)) {
        lf = lf.filter(
            col(column)
                .is_null()
                .or(col(column).str().contains_literal(lit("AGGREGATE"))),
        );
    }

    let selection: Vec<Expr> = COLUMNS
        .iter()
        .filter(|(source, _)| has(source))
        .map(|(source, target)| col(source).alias(target))
        .collect_vec();
    let mut casts = vec![lit(SOURCE).alias(COL::SOURCE)];
    if has("TIME_PERIOD") {
        casts.push(col(COL::YEAR).cast(DataType::Int64));
    }
    if has("OBS_VALUE") {
        casts.push(col(COL::VALUE).cast(DataType::Float64));
    }
    let df = lf.select(selection).with_columns(casts).collect()?;
    Ok(finalize(df)?)
}
