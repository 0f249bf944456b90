//! IMF DataMapper API.

use std::collections::BTreeMap;

use anyhow::Context;
use itertools::Itertools;
use log::{debug, info};
use polars::lazy::dsl::{col, lit};
use polars::prelude::{DataFrame, IntoLazy, JoinArgs, JoinType, NamedFrom, Series};
use reqwest::Client;
use serde::Deserialize;

use crate::canonical::finalize;
use crate::config::HttpConfig;
use crate::COL;

pub const SOURCE: &str = "https://www.imf.org/external/datamapper";

/// `values → series → country → year → value`
type Values = BTreeMap<String, BTreeMap<String, BTreeMap<String, Option<f64>>>>;

#[derive(Deserialize, Debug)]
struct DataResponse {
    values: Option<Values>,
}

#[derive(Deserialize, Debug)]
struct IndicatorsResponse {
    indicators: BTreeMap<String, Indicator>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(default)]
struct Indicator {
    label: Option<String>,
    unit: Option<String>,
}

fn base_url(config: &HttpConfig) -> &str {
    config.imf_base_url.trim_end_matches('/')
}

/// Series metadata with the columns `series_id`, `series_name` and `prop_unit`.
pub async fn get_series_metadata(client: &Client, config: &HttpConfig) -> anyhow::Result<DataFrame> {
    let url = format!("{}/indicators", base_url(config));
    debug!("GET {url}");
    let response: IndicatorsResponse = client
        .get(&url)
        .send()
        .await?
        .error_for_status()
        .context("Failed to fetch IMF indicators")?
        .json()
        .await?;
    let indicators = response
        .indicators
        .iter()
        .filter(|(series_id, _)| !series_id.is_empty())
        .collect_vec();
    Ok(DataFrame::new(vec![
        Series::new(
            COL::SERIES_ID,
            indicators
                .iter()
                .map(|(series_id, _)| series_id.as_str())
                .collect_vec(),
        ),
        Series::new(
            COL::SERIES_NAME,
            indicators
                .iter()
                .map(|(_, indicator)| indicator.label.as_deref().map(str::trim))
                .collect_vec(),
        ),
        Series::new(
            COL::PROP_UNIT,
            indicators
                .iter()
                .map(|(_, indicator)| indicator.unit.as_deref())
                .collect_vec(),
        ),
    ])?)
}

/// Fetches a DataMapper indicator such as `NGDP_RPCH`, labelled with its metadata.
pub async fn get_series_data(
    client: &Client,
    config: &HttpConfig,
    series_id: &str,
) -> anyhow::Result<Option<DataFrame>> {
    let url = format!("{}/{series_id}", base_url(config));
    debug!("GET {url}");
    let response: DataResponse = client
        .get(&url)
        .send()
        .await?
        .error_for_status()
        .with_context(|| format!("Failed to fetch IMF series {series_id}"))?
        .json()
        .await?;
    let Some(countries) = response.values.and_then(|mut values| values.remove(series_id)) else {
        return Ok(None);
    };

    let rows = countries
        .iter()
        .flat_map(|(country, years)| {
            years.iter().filter_map(move |(year, value)| {
                Some((country.as_str(), year.parse::<i64>().ok()?, *value))
            })
        })
        .collect_vec();
    info!("{series_id}: {} observations from the IMF", rows.len());

    let df = DataFrame::new(vec![
        Series::new(COL::SERIES_ID, vec![series_id; rows.len()]),
        Series::new(
            COL::ALPHA_3_CODE,
            rows.iter().map(|(country, _, _)| *country).collect_vec(),
        ),
        Series::new(COL::YEAR, rows.iter().map(|(_, year, _)| *year).collect_vec()),
        Series::new(
            COL::VALUE,
            rows.iter().map(|(_, _, value)| *value).collect_vec(),
        ),
    ])?;
    let metadata = get_series_metadata(client, config).await?;
    Ok(Some(transform(df, metadata)?))
}

fn transform(df: DataFrame, metadata: DataFrame) -> anyhow::Result<DataFrame> {
    let df = df
        .lazy()
        .join(
            metadata.lazy(),
            [col(COL::SERIES_ID)],
            [col(COL::SERIES_ID)],
            JoinArgs::new(JoinType::Left),
        )
        .with_column(lit(SOURCE).alias(COL::SOURCE))
        .collect()?;
    Ok(finalize(df)?)
}

#[cfg(test)]
mod tests {
    use httpmock::prelude::*;
    use serde_json::json;

    use super::*;
    use crate::sources::http_client;

    fn config(server: &MockServer) -> HttpConfig {
        HttpConfig {
            imf_base_url: server.url("/api/v1"),
            ..Default::default()
        }
    }

    fn mock_indicators(server: &MockServer) {
        server.mock(|when, then| {
            when.method(GET).path("/api/v1/indicators");
            then.status(200).json_body(json!({
                "indicators": {
                    "": { "label": null },
                    "NGDP_RPCH": {
                        "label": " Real GDP growth ",
                        "description": "Annual percentages of constant price GDP",
                        "source": "World Economic Outlook (April 2024)",
                        "unit": "Annual percent change",
                        "dataset": "WEO"
                    }
                },
                "api": { "version": "1", "output-method": "json" }
            }));
        });
    }

    #[tokio::test]
    async fn values_are_flattened_and_labelled() -> anyhow::Result<()> {
        let server = MockServer::start_async().await;
        mock_indicators(&server);
        server.mock(|when, then| {
            when.method(GET).path("/api/v1/NGDP_RPCH");
            then.status(200).json_body(json!({
                "values": {
                    "NGDP_RPCH": {
                        "ARG": { "2022": 5.0, "2023": -1.6 },
                        "BOL": { "2023": 3.1 }
                    }
                },
                "api": { "version": "1", "output-method": "json" }
            }));
        });

        let client = http_client(&config(&server))?;
        let df = get_series_data(&client, &config(&server), "NGDP_RPCH")
            .await?
            .unwrap();
        assert_eq!(df.height(), 3);
        assert_eq!(df.column(COL::SOURCE)?.str()?.get(2), Some(SOURCE));
        assert_eq!(
            df.column(COL::SERIES_NAME)?.str()?.get(0),
            Some("Real GDP growth")
        );
        assert_eq!(
            df.column(COL::PROP_UNIT)?.str()?.get(1),
            Some("Annual percent change")
        );
        assert_eq!(df.column(COL::YEAR)?.i64()?.get(1), Some(2023));
        assert_eq!(df.column(COL::VALUE)?.f64()?.get(1), Some(-1.6));
        Ok(())
    }

    #[tokio::test]
    async fn missing_values_is_none() -> anyhow::Result<()> {
        let server = MockServer::start_async().await;
        server.mock(|when, then| {
            when.method(GET).path("/api/v1/LUR");
            then.status(200)
                .json_body(json!({ "api": { "version": "1", "output-method": "json" } }));
        });
        let client = http_client(&config(&server))?;
        assert!(get_series_data(&client, &config(&server), "LUR")
            .await?
            .is_none());
        Ok(())
    }

    #[tokio::test]
    async fn metadata_skips_empty_ids() -> anyhow::Result<()> {
        let server = MockServer::start_async().await;
        mock_indicators(&server);
        let client = http_client(&config(&server))?;
        let metadata = get_series_metadata(&client, &config(&server)).await?;
        assert_eq!(metadata.height(), 1);
        assert_eq!(
            metadata.get_column_names(),
            vec![COL::SERIES_ID, COL::SERIES_NAME, COL::PROP_UNIT]
        );
        Ok(())
    }
}
