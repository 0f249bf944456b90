use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::DfppResult;
use crate::panel::PanelOptions;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    pub storage: StorageConfig,
    pub http: HttpConfig,
    pub panel: PanelOptions,
}

impl Config {
    /// Parse a configuration from TOML text. Missing sections fall back to their defaults.
    pub fn from_toml_str(contents: &str) -> DfppResult<Self> {
        Ok(toml::from_str(contents)?)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> DfppResult<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }
}

/// Selects and parameterises the storage backend. Azure takes precedence over the local
/// directory when both are present.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(default)]
pub struct StorageConfig {
    pub azure: Option<AzureConfig>,
    pub local_path: Option<PathBuf>,
    /// Overrides the date-stamped version folder, e.g. to re-publish into an earlier run.
    pub version: Option<String>,
}

#[derive(Serialize, Deserialize, Clone, PartialEq, Default)]
#[serde(default)]
pub struct AzureConfig {
    pub account_name: String,
    pub container_name: String,
    pub sas_token: String,
    /// Blob service endpoint. Defaults to `https://{account_name}.blob.core.windows.net`.
    pub endpoint: Option<String>,
}

impl AzureConfig {
    pub fn endpoint(&self) -> String {
        match &self.endpoint {
            Some(endpoint) => endpoint.trim_end_matches('/').to_string(),
            None => format!("https://{}.blob.core.windows.net", self.account_name),
        }
    }
}

// The SAS token is a secret and must not end up in logs
impl fmt::Debug for AzureConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AzureConfig")
            .field("account_name", &self.account_name)
            .field("container_name", &self.container_name)
            .field("sas_token", &"<redacted>")
            .field("endpoint", &self.endpoint)
            .finish()
    }
}

/// Settings shared by the source retrievers.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct HttpConfig {
    /// Client timeout in seconds for HTTP requests.
    pub timeout_secs: u64,
    pub user_agent: String,
    pub who_base_url: String,
    pub world_bank_base_url: String,
    pub imf_base_url: String,
    pub ilo_base_url: String,
    pub unstats_base_url: String,
    /// First year requested from APIs that take a period.
    pub period_start: i32,
    /// Last year requested from APIs that take a period.
    pub period_end: i32,
}

impl Default for HttpConfig {
    fn default() -> Self {
        HttpConfig {
            timeout_secs: 30,
            user_agent: concat!("dfpp/", env!("CARGO_PKG_VERSION")).into(),
            who_base_url: "https://ghoapi.azureedge.net/api".into(),
            world_bank_base_url: "https://api.worldbank.org/v2".into(),
            imf_base_url: "https://www.imf.org/external/datamapper/api/v1".into(),
            ilo_base_url: "https://sdmx.ilo.org/rest".into(),
            unstats_base_url: "https://unstats.un.org/sdgapi/v1/sdg".into(),
            period_start: 2015,
            period_end: 2025,
        }
    }
}
