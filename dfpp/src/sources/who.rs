//! WHO Global Health Observatory OData API.

use std::collections::BTreeMap;

use anyhow::Context;
use itertools::Itertools;
use log::{debug, info};
use polars::prelude::{DataFrame, NamedFrom, Series};
use reqwest::Client;
use serde::Deserialize;

use super::to_snake_case;
use crate::canonical::finalize;
use crate::config::HttpConfig;
use crate::COL;

pub const SOURCE: &str = "https://who.int";

/// Value of an OData filter on a dimension.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterValue {
    Text(String),
    Integer(i64),
    List(Vec<String>),
}

impl From<&str> for FilterValue {
    fn from(value: &str) -> Self {
        FilterValue::Text(value.to_string())
    }
}

impl From<i64> for FilterValue {
    fn from(value: i64) -> Self {
        FilterValue::Integer(value)
    }
}

impl From<Vec<&str>> for FilterValue {
    fn from(values: Vec<&str>) -> Self {
        FilterValue::List(values.into_iter().map(String::from).collect())
    }
}

/// The `$filter` expression. Rows without a numeric value are always excluded.
pub fn filter_expression(filters: &[(&str, FilterValue)]) -> String {
    std::iter::once("NumericValue ne null".to_string())
        .chain(filters.iter().map(|(key, value)| match value {
            FilterValue::Text(text) => format!("{key} eq '{text}'"),
            FilterValue::Integer(n) => format!("{key} eq '{n}'"),
            FilterValue::List(values) => format!(
                "{key} in ({})",
                values.iter().map(|value| format!("'{value}'")).join(", ")
            ),
        }))
        .join(" and ")
}

#[derive(Deserialize, Debug)]
struct Response {
    value: Vec<Record>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "PascalCase")]
struct Record {
    indicator_code: String,
    spatial_dim: Option<String>,
    time_dim: Option<i64>,
    numeric_value: Option<f64>,
    data_source_dim: Option<String>,
    dim1_type: Option<String>,
    dim1: Option<String>,
    dim2_type: Option<String>,
    dim2: Option<String>,
    dim3_type: Option<String>,
    dim3: Option<String>,
}

impl Record {
    /// Dimension name and value pairs of the record.
    fn dimensions(&self) -> impl Iterator<Item = (String, &str)> {
        [
            (&self.dim1_type, &self.dim1),
            (&self.dim2_type, &self.dim2),
            (&self.dim3_type, &self.dim3),
        ]
        .into_iter()
        .filter_map(|(kind, value)| match (kind, value) {
            (Some(kind), Some(value)) => Some((
                format!("{}{}", COL::DIMENSION_PREFIX, to_snake_case(kind)),
                value.as_str(),
            )),
            _ => None,
        })
    }
}

/// Fetches a GHO indicator, e.g. `WHOSIS_000001` (life expectancy at birth).
pub async fn get_series_data(
    client: &Client,
    config: &HttpConfig,
    series_id: &str,
    filters: &[(&str, FilterValue)],
) -> anyhow::Result<Option<DataFrame>> {
    let url = format!("{}/{series_id}", config.who_base_url.trim_end_matches('/'));
    debug!("GET {url}");
    let response: Response = client
        .get(&url)
        .query(&[("$filter", filter_expression(filters))])
        .send()
        .await?
        .error_for_status()
        .with_context(|| format!("Failed to fetch WHO series {series_id}"))?
        .json()
        .await?;
    if response.value.is_empty() {
        return Ok(None);
    }
    info!("{series_id}: {} records from WHO", response.value.len());
    Ok(Some(transform(&response.value)?))
}

fn transform(records: &[Record]) -> anyhow::Result<DataFrame> {
    // Dimension columns are the union of the dimensions over all records
    let mut dimensions: BTreeMap<String, Vec<Option<&str>>> = BTreeMap::new();
    for (row, record) in records.iter().enumerate() {
        for (column, value) in record.dimensions() {
            let values = dimensions
                .entry(column)
                .or_insert_with(|| vec![None; records.len()]);
            values[row] = Some(value);
        }
    }

    let mut columns = vec![
        Series::new(
            COL::SOURCE,
            records
                .iter()
                .map(|record| match &record.data_source_dim {
                    Some(source) => format!("{SOURCE} | {source}"),
                    None => SOURCE.to_string(),
                })
                .collect_vec(),
        ),
        Series::new(
            COL::SERIES_ID,
            records
                .iter()
                .map(|record| record.indicator_code.as_str())
                .collect_vec(),
        ),
        Series::new(
            COL::ALPHA_3_CODE,
            records
                .iter()
                .map(|record| record.spatial_dim.as_deref())
                .collect_vec(),
        ),
        Series::new(
            COL::YEAR,
            records.iter().map(|record| record.time_dim).collect_vec(),
        ),
        Series::new(
            COL::VALUE,
            records
                .iter()
                .map(|record| record.numeric_value)
                .collect_vec(),
        ),
    ];
    columns.extend(
        dimensions
            .into_iter()
            .map(|(name, values)| Series::new(&name, values)),
    );
    Ok(finalize(DataFrame::new(columns)?)?)
}

#[cfg(test)]
mod tests {
    use httpmock::prelude::*;
    use serde_json::json;

    use super::*;
    use crate::sources::http_client;

    fn config(server: &MockServer) -> HttpConfig {
        HttpConfig {
            who_base_url: server.url("/api"),
            ..Default::default()
        }
    }

    #[test]
    fn filter_values() {
        assert_eq!(filter_expression(&[]), "NumericValue ne null");
        assert_eq!(
            filter_expression(&[
                ("SpatialDimType", "COUNTRY".into()),
                ("TimeDim", 2020i64.into()),
                ("Dim1", vec!["SEX_MLE", "SEX_FMLE"].into()),
            ]),
            "NumericValue ne null and SpatialDimType eq 'COUNTRY' and TimeDim eq '2020' \
             and Dim1 in ('SEX_MLE', 'SEX_FMLE')"
        );
    }

    #[tokio::test]
    async fn records_are_unstacked_into_dimensions() -> anyhow::Result<()> {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/api/WHOSIS_000001")
                    .query_param("$filter", "NumericValue ne null and SpatialDimType eq 'COUNTRY'");
                then.status(200).json_body(json!({
                    "value": [
                        {
                            "IndicatorCode": "WHOSIS_000001",
                            "SpatialDim": "AFG",
                            "TimeDim": 2019,
                            "NumericValue": 63.2,
                            "Dim1Type": "SEX",
                            "Dim1": "SEX_MLE",
                            "Dim2Type": null,
                            "Dim2": null,
                            "DataSourceDim": null
                        },
                        {
                            "IndicatorCode": "WHOSIS_000001",
                            "SpatialDim": "AFG",
                            "TimeDim": 2019,
                            "NumericValue": 63.8,
                            "Dim1Type": "SEX",
                            "Dim1": "SEX_FMLE"
                        }
                    ]
                }));
            })
            .await;
        let client = http_client(&config(&server))?;
        let df = get_series_data(
            &client,
            &config(&server),
            "WHOSIS_000001",
            &[("SpatialDimType", "COUNTRY".into())],
        )
        .await?
        .unwrap();
        mock.assert_async().await;

        assert_eq!(df.height(), 2);
        let sex = df.column("disagr_sex")?.str()?;
        assert_eq!(sex.get(0), Some("SEX_MLE"));
        assert_eq!(sex.get(1), Some("SEX_FMLE"));
        assert_eq!(df.column(COL::SOURCE)?.str()?.get(0), Some(SOURCE));
        assert_eq!(df.column(COL::YEAR)?.i64()?.get(0), Some(2019));
        Ok(())
    }

    #[tokio::test]
    async fn empty_response_is_none() -> anyhow::Result<()> {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/api/NCD_BMI_30A");
                then.status(200).json_body(json!({ "value": [] }));
            })
            .await;
        let client = http_client(&config(&server))?;
        let df = get_series_data(&client, &config(&server), "NCD_BMI_30A", &[]).await?;
        assert!(df.is_none());
        Ok(())
    }

    #[tokio::test]
    async fn server_errors_propagate() -> anyhow::Result<()> {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET);
                then.status(500);
            })
            .await;
        let client = http_client(&config(&server))?;
        assert!(get_series_data(&client, &config(&server), "X", &[])
            .await
            .is_err());
        Ok(())
    }
}
