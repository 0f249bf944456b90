//! Error types.

#[derive(thiserror::Error, Debug)]
pub enum DfppError {
    #[error("Wrapped anyhow error: {0}")]
    AnyhowError(#[from] anyhow::Error),
    #[error("Data frame name must be provided.")]
    MissingName,
    #[error("`{0}` extension is not supported.")]
    UnsupportedFormat(String),
    #[error("Neither Azure Storage nor local storage is configured.")]
    StorageNotConfigured,
    #[error("Malformed gappiness summary: {0}")]
    MalformedSummary(String),
    #[error("{count} duplicates found over columns {columns:?}.")]
    DuplicateObservations { count: usize, columns: Vec<String> },
    #[error("Request for blob '{path}' failed with status {status}.")]
    BlobRequest { path: String, status: u16 },
    #[error("Workbook does not contain any sheets.")]
    EmptyWorkbook,
    #[error("Wrapped polars error: {0}")]
    PolarsError(#[from] polars::error::PolarsError),
    #[error("std IO error: {0}")]
    IOError(#[from] std::io::Error),
    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),
    #[error("Spreadsheet error: {0}")]
    SpreadsheetError(#[from] calamine::XlsxError),
    #[error("Invalid TOML config: {0}")]
    ConfigError(#[from] toml::de::Error),
}

pub type DfppResult<T> = Result<T, DfppError>;
