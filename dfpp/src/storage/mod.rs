//! Versioned dataset store. Every store instance fixes a version tag when it is created and
//! publishes datasets as parquet under `{version}/{folder}/{name}.parquet`.

use chrono::{DateTime, Utc};
use enum_dispatch::enum_dispatch;
use log::{debug, info};
use polars::frame::DataFrame;
use strum_macros::Display;

use crate::config::StorageConfig;
use crate::error::{DfppError, DfppResult};

pub mod azure;
pub mod formats;
pub mod local;

pub use azure::AzureStorage;
pub use formats::{DatasetFormat, DatasetReader, ReadOptions};
pub use local::LocalStorage;

/// Formats a version tag such as `v24-05-01`.
pub fn version_tag(at: DateTime<Utc>) -> String {
    at.format("v%y-%m-%d").to_string()
}

/// Version tag of the current UTC date.
pub fn current_version() -> String {
    version_tag(Utc::now())
}

/// Backend primitives of the dataset store. Physical paths are the ones returned by
/// [`Storage::join_path`].
#[enum_dispatch]
pub trait Storage {
    fn version(&self) -> &str;
    fn container(&self) -> &str;
    /// Maps a path relative to the container onto a physical location.
    fn join_path(&self, file_path: &str) -> DfppResult<String>;
    async fn write_bytes(&self, physical_path: &str, bytes: Vec<u8>) -> DfppResult<()>;
    async fn read_bytes(&self, physical_path: &str) -> DfppResult<Vec<u8>>;
}

#[enum_dispatch(Storage)]
#[derive(Debug, Display)]
pub enum StorageBackend {
    #[strum(to_string = "AzureStorage")]
    Azure(AzureStorage),
    #[strum(to_string = "LocalStorage")]
    Local(LocalStorage),
}

/// A data frame and the name it is published under.
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    pub name: Option<String>,
    pub data: DataFrame,
}

impl Dataset {
    pub fn new(name: impl Into<String>, data: DataFrame) -> Self {
        Self {
            name: Some(name.into()),
            data,
        }
    }

    pub fn unnamed(data: DataFrame) -> Self {
        Self { name: None, data }
    }
}

/// Relative path of a published dataset. Empty segments are skipped.
pub fn dataset_path(version: &str, folder_path: &str, name: &str) -> String {
    let file_name = format!("{name}.parquet");
    [version, folder_path.trim_matches('/'), file_name.as_str()]
        .into_iter()
        .filter(|segment| !segment.is_empty())
        .collect::<Vec<_>>()
        .join("/")
}

/// Publishes `dataset` as parquet under the store's version and returns its physical path.
pub async fn publish_dataset<S: Storage>(
    storage: &S,
    dataset: &Dataset,
    folder_path: &str,
) -> DfppResult<String> {
    // Blank names are rejected, other names are used as given
    let name = dataset
        .name
        .as_deref()
        .filter(|name| !name.trim().is_empty())
        .ok_or(DfppError::MissingName)?;
    let bytes = formats::encode_parquet(&dataset.data)?;
    let file_path = dataset_path(storage.version(), folder_path, name);
    let physical_path = storage.join_path(&file_path)?;
    storage.write_bytes(&physical_path, bytes).await?;
    info!(
        "Published {} rows of '{name}' to {physical_path}",
        dataset.data.height()
    );
    Ok(physical_path)
}

/// Reads the dataset at `physical_path`, decoded according to its extension.
pub async fn read_dataset<S: Storage>(
    storage: &S,
    physical_path: &str,
    options: &ReadOptions,
) -> DfppResult<DataFrame> {
    let format = DatasetFormat::from_path(physical_path)?;
    let bytes = storage.read_bytes(physical_path).await?;
    debug!("Read {} bytes from {physical_path}", bytes.len());
    format.read(bytes, options)
}

/// Builds the configured backend. Azure takes precedence over a local directory.
pub fn get_storage(config: &StorageConfig) -> DfppResult<StorageBackend> {
    let version = config.version.clone().unwrap_or_else(current_version);
    let storage: StorageBackend = if let Some(azure) = &config.azure {
        AzureStorage::new(azure.clone(), version)?.into()
    } else if let Some(root) = &config.local_path {
        LocalStorage::new(root, version).into()
    } else {
        return Err(DfppError::StorageNotConfigured);
    };
    info!(
        "Using {storage} for container {} with version {}",
        storage.container(),
        storage.version()
    );
    Ok(storage)
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;
    use crate::config::AzureConfig;

    #[test]
    fn version_tag_format() {
        let at = Utc.with_ymd_and_hms(2024, 5, 1, 23, 59, 0).unwrap();
        assert_eq!(version_tag(at), "v24-05-01");
        let at = Utc.with_ymd_and_hms(2031, 12, 9, 0, 0, 0).unwrap();
        assert_eq!(version_tag(at), "v31-12-09");
    }

    #[test]
    fn dataset_paths() {
        assert_eq!(
            dataset_path("v24-05-01", "imf/weo", "gdp"),
            "v24-05-01/imf/weo/gdp.parquet"
        );
        assert_eq!(
            dataset_path("v24-05-01", "/ilo/", "unemployment"),
            "v24-05-01/ilo/unemployment.parquet"
        );
        assert_eq!(dataset_path("v24-05-01", "", "gdp"), "v24-05-01/gdp.parquet");
    }

    #[test]
    fn storage_selection() -> anyhow::Result<()> {
        assert!(matches!(
            get_storage(&StorageConfig::default()),
            Err(DfppError::StorageNotConfigured)
        ));

        let dir = tempfile::tempdir()?;
        let local = get_storage(&StorageConfig {
            local_path: Some(dir.path().to_path_buf()),
            version: Some("v24-05-01".into()),
            ..Default::default()
        })?;
        assert!(matches!(local, StorageBackend::Local(_)));
        assert_eq!(local.version(), "v24-05-01");
        assert_eq!(local.to_string(), "LocalStorage");

        let azure = get_storage(&StorageConfig {
            azure: Some(AzureConfig {
                account_name: "undpdata".into(),
                container_name: "dfpp".into(),
                sas_token: "sig=abc".into(),
                endpoint: None,
            }),
            local_path: Some(dir.path().to_path_buf()),
            version: None,
        })?;
        assert!(matches!(azure, StorageBackend::Azure(_)));
        assert_eq!(azure.container(), "dfpp");
        assert_eq!(azure.version(), current_version());
        Ok(())
    }
}
