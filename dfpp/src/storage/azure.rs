use log::debug;
use reqwest::{Client, StatusCode};

use super::Storage;
use crate::config::AzureConfig;
use crate::error::{DfppError, DfppResult};

const SCHEME: &str = "az://";

/// Stores datasets as block blobs in an Azure Storage container, authorised with a SAS token.
#[derive(Debug, Clone)]
pub struct AzureStorage {
    config: AzureConfig,
    version: String,
    client: Client,
}

impl AzureStorage {
    pub fn new(config: AzureConfig, version: impl Into<String>) -> DfppResult<Self> {
        let client = Client::builder()
            .user_agent(concat!("dfpp/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            config,
            version: version.into(),
            client,
        })
    }

    /// Blob name of a physical path. Paths without the `az://{container}/` prefix are taken to
    /// be blob names already.
    fn blob_name<'a>(&self, physical_path: &'a str) -> &'a str {
        physical_path
            .strip_prefix(SCHEME)
            .and_then(|path| path.strip_prefix(self.config.container_name.as_str()))
            .and_then(|path| path.strip_prefix('/'))
            .unwrap_or(physical_path)
    }

    fn blob_url(&self, physical_path: &str) -> String {
        let url = format!(
            "{}/{}/{}",
            self.config.endpoint(),
            self.config.container_name,
            self.blob_name(physical_path)
        );
        match self.config.sas_token.trim_start_matches('?') {
            "" => url,
            token => format!("{url}?{token}"),
        }
    }
}

fn check_status(physical_path: &str, status: StatusCode) -> DfppResult<()> {
    if status.is_success() {
        return Ok(());
    }
    Err(DfppError::BlobRequest {
        path: physical_path.to_string(),
        status: status.as_u16(),
    })
}

impl Storage for AzureStorage {
    fn version(&self) -> &str {
        &self.version
    }

    fn container(&self) -> &str {
        &self.config.container_name
    }

    fn join_path(&self, file_path: &str) -> DfppResult<String> {
        Ok(format!(
            "{SCHEME}{}/{}",
            self.config.container_name,
            file_path.trim_start_matches('/')
        ))
    }

    /// Uploads with Put Blob, replacing any existing blob.
    async fn write_bytes(&self, physical_path: &str, bytes: Vec<u8>) -> DfppResult<()> {
        let size = bytes.len();
        let response = self
            .client
            .put(self.blob_url(physical_path))
            .header("x-ms-blob-type", "BlockBlob")
            .body(bytes)
            .send()
            .await?;
        check_status(physical_path, response.status())?;
        debug!("Uploaded {size} bytes to {physical_path}");
        Ok(())
    }

    async fn read_bytes(&self, physical_path: &str) -> DfppResult<Vec<u8>> {
        let response = self.client.get(self.blob_url(physical_path)).send().await?;
        check_status(physical_path, response.status())?;
        Ok(response.bytes().await?.to_vec())
    }
}
