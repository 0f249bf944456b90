//! UN Statistics Division SDG API (v1).

use std::collections::{BTreeMap, BTreeSet, HashMap};

use anyhow::Context;
use itertools::Itertools;
use log::{debug, info};
use polars::prelude::{DataFrame, NamedFrom, Series};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;

use super::to_snake_case;
use crate::canonical::finalize;
use crate::config::HttpConfig;
use crate::COL;

pub const SOURCE: &str = "https://unstats.un.org/sdgapi/v1/sdg/";
const PAGE_SIZE: u32 = 1000;

/// Column holding the SDG indicators an observation is linked to.
pub const SDG_INDICATOR: &str = "disagr_sdg_indicator";

/// Attributes that map onto canonical series properties.
const PROPERTIES: [(&str, &str); 2] = [
    ("Nature", COL::PROP_OBSERVATION_TYPE),
    ("Units", COL::PROP_UNIT),
];

/// Sex codes mapped onto the labels shared with the other sources.
const SEX_CODES: [(&str, &str); 3] = [
    ("BOTHSEX", "both"),
    ("MALE", "male"),
    ("FEMALE", "female"),
];

/// Codes of a dimension or attribute and their descriptions.
#[derive(Deserialize, Debug, Clone)]
pub struct Codebook {
    pub id: String,
    #[serde(default)]
    pub codes: Vec<Code>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct Code {
    pub code: String,
    pub description: String,
}

impl Codebook {
    fn lookup(&self) -> HashMap<&str, &str> {
        if self.id.eq_ignore_ascii_case("sex") {
            return SEX_CODES.into_iter().collect();
        }
        self.codes
            .iter()
            .map(|code| (code.code.as_str(), code.description.as_str()))
            .collect()
    }
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct DataPage {
    total_pages: u32,
    #[serde(default)]
    data: Vec<Record>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct Record {
    series_description: Option<String>,
    geo_area_code: String,
    time_period_start: f64,
    value: Option<String>,
    #[serde(default)]
    indicator: Vec<String>,
    #[serde(default)]
    dimensions: BTreeMap<String, Option<String>>,
    #[serde(default)]
    attributes: BTreeMap<String, Option<String>>,
}

/// An observation without its SDG indicators.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct Observation {
    alpha_3_code: String,
    year: i64,
    series_name: Option<String>,
    value: Option<String>,
    dimensions: BTreeMap<String, Option<String>>,
    attributes: BTreeMap<String, Option<String>>,
}

async fn get_json<T: DeserializeOwned>(
    client: &Client,
    url: &str,
    query: &[(&str, String)],
) -> anyhow::Result<T> {
    debug!("GET {url} {query:?}");
    Ok(client
        .get(url)
        .query(query)
        .send()
        .await?
        .error_for_status()
        .with_context(|| format!("Failed to fetch {url}"))?
        .json()
        .await?)
}

fn base_url(config: &HttpConfig) -> &str {
    config.unstats_base_url.trim_end_matches('/')
}

/// Codebook of the dimensions of `series_id`.
pub async fn get_dimensions(
    client: &Client,
    config: &HttpConfig,
    series_id: &str,
) -> anyhow::Result<Vec<Codebook>> {
    let url = format!("{}/Series/{series_id}/Dimensions", base_url(config));
    get_json(client, &url, &[]).await
}

/// Codebook of the attributes of `series_id`.
pub async fn get_attributes(
    client: &Client,
    config: &HttpConfig,
    series_id: &str,
) -> anyhow::Result<Vec<Codebook>> {
    let url = format!("{}/Series/{series_id}/Attributes", base_url(config));
    get_json(client, &url, &[]).await
}

async fn get_page(
    client: &Client,
    config: &HttpConfig,
    series_id: &str,
    page: u32,
) -> anyhow::Result<DataPage> {
    let url = format!("{}/Series/Data", base_url(config));
    get_json(
        client,
        &url,
        &[
            ("seriesCode", series_id.to_string()),
            ("pageSize", PAGE_SIZE.to_string()),
            ("page", page.to_string()),
        ],
    )
    .await
}

/// Fetches every page of an SDG series, e.g. `SI_POV_DAY1`. Geographic areas are published
/// with M49 numeric codes and `iso_numeric_to_alpha` maps them onto alpha-3 codes; areas it
/// does not cover, such as regions, are dropped.
pub async fn get_series_data(
    client: &Client,
    config: &HttpConfig,
    series_id: &str,
    iso_numeric_to_alpha: &HashMap<u32, String>,
) -> anyhow::Result<Option<DataFrame>> {
    let first = get_page(client, config, series_id, 1).await?;
    let pages = first.total_pages;
    let mut records = first.data;
    for page in 2..=pages {
        records.extend(get_page(client, config, series_id, page).await?.data);
    }
    info!(
        "{series_id}: {} records in {pages} pages from UN Stats",
        records.len()
    );
    if records.is_empty() {
        return Ok(None);
    }

    let dimensions = get_dimensions(client, config, series_id).await?;
    let attributes = get_attributes(client, config, series_id).await?;
    let df = transform(
        series_id,
        records,
        &dimensions,
        &attributes,
        iso_numeric_to_alpha,
    )?;
    Ok((df.height() > 0).then_some(df))
}

/// Splits a published value into a number and, for values such as `>95`, a label.
fn parse_value(raw: Option<&str>) -> (Option<f64>, Option<String>) {
    match raw.map(str::trim) {
        None | Some("") | Some("NaN") => (None, None),
        Some(text) => match text.parse::<f64>() {
            Ok(value) => (Some(value), None),
            Err(_) => (None, Some(text.to_string())),
        },
    }
}

/// Merges observations repeated for every SDG indicator they are linked to, keeping the first
/// occurrence's position.
fn merge_indicators(
    records: Vec<Record>,
    alpha: &HashMap<u32, String>,
) -> Vec<(Observation, BTreeSet<String>)> {
    let mut merged: Vec<(Observation, BTreeSet<String>)> = vec![];
    let mut positions: HashMap<Observation, usize> = HashMap::new();
    for record in records {
        let Some(code) = record
            .geo_area_code
            .trim()
            .parse::<u32>()
            .ok()
            .and_then(|code| alpha.get(&code))
        else {
            continue;
        };
        let observation = Observation {
            alpha_3_code: code.clone(),
            year: record.time_period_start as i64,
            series_name: record.series_description,
            value: record.value,
            dimensions: record.dimensions,
            attributes: record.attributes,
        };
        match positions.get(&observation) {
            Some(&position) => merged[position].1.extend(record.indicator),
            None => {
                positions.insert(observation.clone(), merged.len());
                merged.push((observation, record.indicator.into_iter().collect()));
            }
        }
    }
    merged
}

/// Remapped codebook columns, named with `prefix` unless listed in `renames`.
fn codebook_columns(
    rows: &[(Observation, BTreeSet<String>)],
    codebooks: &[Codebook],
    prefix: &str,
    renames: &[(&str, &str)],
    values: impl Fn(&Observation) -> &BTreeMap<String, Option<String>>,
) -> Vec<Series> {
    codebooks
        .iter()
        .unique_by(|codebook| codebook.id.as_str())
        .filter(|codebook| {
            rows.iter()
                .any(|(row, _)| values(row).contains_key(&codebook.id))
        })
        .map(|codebook| {
            let name = renames
                .iter()
                .find(|(id, _)| *id == codebook.id)
                .map(|(_, column)| column.to_string())
                .unwrap_or_else(|| format!("{prefix}{}", to_snake_case(&codebook.id)));
            let lookup = codebook.lookup();
            let column = rows
                .iter()
                .map(|(row, _)| {
                    values(row)
                        .get(&codebook.id)
                        .and_then(Option::as_deref)
                        .map(|code| lookup.get(code).copied().unwrap_or(code))
                })
                .collect_vec();
            Series::new(&name, column)
        })
        .collect()
}

fn transform(
    series_id: &str,
    records: Vec<Record>,
    dimensions: &[Codebook],
    attributes: &[Codebook],
    iso_numeric_to_alpha: &HashMap<u32, String>,
) -> anyhow::Result<DataFrame> {
    let rows = merge_indicators(records, iso_numeric_to_alpha);
    let (values, labels): (Vec<Option<f64>>, Vec<Option<String>>) = rows
        .iter()
        .map(|(row, _)| parse_value(row.value.as_deref()))
        .unzip();

    let mut columns = vec![
        Series::new(COL::SOURCE, vec![SOURCE; rows.len()]),
        Series::new(COL::SERIES_ID, vec![series_id; rows.len()]),
        Series::new(
            COL::SERIES_NAME,
            rows.iter()
                .map(|(row, _)| row.series_name.as_deref())
                .collect_vec(),
        ),
        Series::new(
            COL::ALPHA_3_CODE,
            rows.iter()
                .map(|(row, _)| row.alpha_3_code.as_str())
                .collect_vec(),
        ),
        Series::new(COL::YEAR, rows.iter().map(|(row, _)| row.year).collect_vec()),
        Series::new(COL::VALUE, values),
        Series::new(COL::PROP_VALUE_LABEL, labels),
        Series::new(
            SDG_INDICATOR,
            rows.iter()
                .map(|(_, indicators)| indicators.iter().join(", "))
                .collect_vec(),
        ),
    ];
    columns.extend(codebook_columns(
        &rows,
        dimensions,
        COL::DIMENSION_PREFIX,
        &[],
        |row| &row.dimensions,
    ));
    columns.extend(codebook_columns(
        &rows,
        attributes,
        COL::PROPERTY_PREFIX,
        &PROPERTIES,
        |row| &row.attributes,
    ));
    Ok(finalize(DataFrame::new(columns)?)?)
}
