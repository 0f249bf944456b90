use log::debug;
use polars::frame::DataFrame;

use crate::config::Config;
use crate::error::DfppResult;
use crate::storage::{Dataset, ReadOptions, StorageBackend};

// Re-exports
pub use column_names as COL;

// Modules
pub mod canonical;
pub mod column_names;
pub mod config;
pub mod error;
pub mod gappiness;
pub mod interpolation;
pub mod panel;
pub mod series;
pub mod sources;
pub mod spline;
pub mod storage;
pub mod validation;

/// Type for the dfpp pipeline: gap filling plus publishing to the configured store
pub struct Dfpp {
    pub config: Config,
    pub storage: StorageBackend,
}

impl Dfpp {
    /// Setup the Dfpp object with custom configuration
    pub fn new_with_config(config: Config) -> DfppResult<Self> {
        debug!("config: {config:?}");
        let storage = storage::get_storage(&config.storage)?;
        Ok(Self { config, storage })
    }

    /// Setup the Dfpp object from a TOML configuration file
    pub fn from_config_file<P: AsRef<std::path::Path>>(path: P) -> DfppResult<Self> {
        Self::new_with_config(Config::from_file(path)?)
    }

    /// Fills the gaps of `indicators` with the configured panel options
    pub fn interpolate(&self, df: &DataFrame, indicators: &[&str]) -> DfppResult<DataFrame> {
        panel::interpolate_panel(df, indicators, &self.config.panel)
    }

    /// Publishes a dataset under the store's version and returns its physical path
    pub async fn publish(&self, dataset: &Dataset, folder_path: &str) -> DfppResult<String> {
        storage::publish_dataset(&self.storage, dataset, folder_path).await
    }

    /// Reads a dataset from the store
    pub async fn read(&self, physical_path: &str, options: &ReadOptions) -> DfppResult<DataFrame> {
        storage::read_dataset(&self.storage, physical_path, options).await
    }

    /// Fills the gaps of `indicators` and publishes the result as `name`
    pub async fn interpolate_and_publish(
        &self,
        df: &DataFrame,
        indicators: &[&str],
        name: &str,
        folder_path: &str,
    ) -> DfppResult<String> {
        let data = self.interpolate(df, indicators)?;
        self.publish(&Dataset::new(name, data), folder_path).await
    }
}
