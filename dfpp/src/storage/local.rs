use std::path::{Path, PathBuf};

use log::debug;

use super::Storage;
use crate::error::DfppResult;

/// Stores datasets below a root directory on the local file system.
#[derive(Debug, Clone)]
pub struct LocalStorage {
    root: PathBuf,
    container: String,
    version: String,
}

impl LocalStorage {
    pub fn new<P: AsRef<Path>>(root: P, version: impl Into<String>) -> Self {
        let root = root.as_ref().to_path_buf();
        Self {
            container: root.to_string_lossy().into_owned(),
            root,
            version: version.into(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

fn partial_path(path: &Path) -> PathBuf {
    let mut partial = path.as_os_str().to_owned();
    partial.push(".partial");
    PathBuf::from(partial)
}

impl Storage for LocalStorage {
    fn version(&self) -> &str {
        &self.version
    }

    fn container(&self) -> &str {
        &self.container
    }

    /// Creates the parent directories of the joined path.
    fn join_path(&self, file_path: &str) -> DfppResult<String> {
        let path = self.root.join(file_path.trim_start_matches('/'));
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Ok(path.to_string_lossy().into_owned())
    }

    /// Writes to a sibling file first and renames it into place.
    async fn write_bytes(&self, physical_path: &str, bytes: Vec<u8>) -> DfppResult<()> {
        let path = Path::new(physical_path);
        let partial = partial_path(path);
        let written = match tokio::fs::write(&partial, &bytes).await {
            Ok(()) => tokio::fs::rename(&partial, path).await,
            Err(err) => Err(err),
        };
        if let Err(err) = written {
            let _ = tokio::fs::remove_file(&partial).await;
            return Err(err.into());
        }
        debug!("Wrote {} bytes to {physical_path}", bytes.len());
        Ok(())
    }

    async fn read_bytes(&self, physical_path: &str) -> DfppResult<Vec<u8>> {
        Ok(tokio::fs::read(physical_path).await?)
    }
}
