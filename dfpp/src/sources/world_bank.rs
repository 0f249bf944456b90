//! World Bank Indicators API (v2).

use anyhow::Context;
use itertools::Itertools;
use log::{debug, info, warn};
use polars::prelude::{DataFrame, NamedFrom, Series};
use reqwest::Client;
use serde::Deserialize;

use crate::canonical::finalize;
use crate::config::HttpConfig;
use crate::COL;

pub const SOURCE: &str = "https://data.worldbank.org";
const PER_PAGE: u32 = 100;

#[derive(Deserialize, Debug)]
struct PageMeta {
    pages: u32,
}

/// Either a page of records or an API message, e.g. for an unknown indicator.
#[derive(Deserialize, Debug)]
#[serde(untagged)]
enum Page {
    Records(PageMeta, Option<Vec<Record>>),
    Message(Vec<serde_json::Value>),
}

#[derive(Deserialize, Debug)]
struct IdValue {
    id: String,
    value: String,
}

#[derive(Deserialize, Debug)]
struct Record {
    indicator: IdValue,
    country: IdValue,
    countryiso3code: String,
    date: String,
    value: Option<f64>,
}

async fn get_page(
    client: &Client,
    config: &HttpConfig,
    series_id: &str,
    page: u32,
) -> anyhow::Result<Page> {
    let url = format!(
        "{}/country/all/indicator/{series_id}",
        config.world_bank_base_url.trim_end_matches('/')
    );
    debug!("GET {url} page {page}");
    Ok(client
        .get(&url)
        .query(&[
            ("format", "json".to_string()),
            (
                "date",
                format!("{}:{}", config.period_start, config.period_end),
            ),
            ("page", page.to_string()),
            ("per_page", PER_PAGE.to_string()),
        ])
        .send()
        .await?
        .error_for_status()
        .with_context(|| format!("Failed to fetch World Bank series {series_id}"))?
        .json()
        .await?)
}

/// Fetches every page of a World Bank indicator, e.g. `SP.POP.TOTL`.
pub async fn get_series_data(
    client: &Client,
    config: &HttpConfig,
    series_id: &str,
) -> anyhow::Result<Option<DataFrame>> {
    let (meta, mut records) = match get_page(client, config, series_id, 1).await? {
        Page::Records(meta, records) => (meta, records.unwrap_or_default()),
        Page::Message(message) => {
            warn!("{series_id}: World Bank API returned {message:?}");
            return Ok(None);
        }
    };
    for page in 2..=meta.pages {
        match get_page(client, config, series_id, page).await? {
            Page::Records(_, Some(page_records)) => records.extend(page_records),
            Page::Records(_, None) => {}
            Page::Message(message) => warn!("{series_id}: page {page} returned {message:?}"),
        }
    }
    info!(
        "{series_id}: {} records in {} pages from the World Bank",
        records.len(),
        meta.pages
    );
    if records.is_empty() {
        return Ok(None);
    }
    transform(records).map(Some)
}

fn alpha_3_code(record: &Record) -> Option<&str> {
    [record.countryiso3code.as_str(), record.country.id.as_str()]
        .into_iter()
        .find(|code| code.len() == 3)
}

fn transform(records: Vec<Record>) -> anyhow::Result<DataFrame> {
    // Only yearly observations of countries
    let records = records
        .iter()
        .filter_map(|record| {
            let code = alpha_3_code(record)?;
            let year = record
                .date
                .chars()
                .all(|c| c.is_ascii_digit())
                .then(|| record.date.parse::<i64>().ok())
                .flatten()?;
            Some((record, code, year))
        })
        .collect_vec();

    let df = DataFrame::new(vec![
        Series::new(COL::SOURCE, vec![SOURCE; records.len()]),
        Series::new(
            COL::SERIES_ID,
            records
                .iter()
                .map(|(record, _, _)| record.indicator.id.as_str())
                .collect_vec(),
        ),
        Series::new(
            COL::SERIES_NAME,
            records
                .iter()
                .map(|(record, _, _)| record.indicator.value.trim())
                .collect_vec(),
        ),
        Series::new(
            COL::ALPHA_3_CODE,
            records.iter().map(|(_, code, _)| *code).collect_vec(),
        ),
        Series::new(
            COL::YEAR,
            records.iter().map(|(_, _, year)| *year).collect_vec(),
        ),
        Series::new(
            COL::VALUE,
            records
                .iter()
                .map(|(record, _, _)| record.value)
                .collect_vec(),
        ),
    ])?;
    Ok(finalize(df)?)
}
