//! Retrieval of raw indicator series from public APIs. Every retriever returns the series in the
//! canonical long format, or `None` when the API has no data for it.

use std::time::Duration;

use anyhow::Context;
use reqwest::Client;

use crate::config::HttpConfig;

pub mod ilo;
pub mod imf;
pub mod unstats;
pub mod who;
pub mod world_bank;

/// Client shared by the retrievers, configured with the timeout and user agent from `config`.
pub fn http_client(config: &HttpConfig) -> anyhow::Result<Client> {
    Client::builder()
        .timeout(Duration::from_secs(config.timeout_secs))
        .user_agent(config.user_agent.as_str())
        .build()
        .context("Failed to build HTTP client")
}

/// `Dim1Type`-style dimension names such as `AGEGROUP` or `Residence Area` as snake case.
pub(crate) fn to_snake_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut previous: Option<char> = None;
    for c in name.trim().chars() {
        if !c.is_alphanumeric() {
            if !out.is_empty() && !out.ends_with('_') {
                out.push('_');
            }
        } else {
            if c.is_uppercase() && previous.is_some_and(|p| p.is_lowercase()) {
                out.push('_');
            }
            out.extend(c.to_lowercase());
        }
        previous = Some(c);
    }
    out.trim_end_matches('_').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snake_case_names() {
        assert_eq!(to_snake_case("SEX"), "sex");
        assert_eq!(to_snake_case("AGEGROUP"), "agegroup");
        assert_eq!(to_snake_case("ResidenceAreaType"), "residence_area_type");
        assert_eq!(to_snake_case("Residence Area"), "residence_area");
        assert_eq!(to_snake_case(" WEALTH-QUINTILE "), "wealth_quintile");
    }

    #[test]
    fn client_from_default_config() {
        assert!(http_client(&HttpConfig::default()).is_ok());
    }
}
