//! Error types for the data pipeline
//!
//! Recoverable data-quality issues (bad cells, unknown populations) never show
//! up here. They are logged and skipped where they occur.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DataError {
    #[error("Missing column: {0}")]
    MissingColumn(String),
    #[error("Table has no date columns")]
    NoDateColumns,
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Server returned status {status} for {url}")]
    Status { status: u16, url: String },
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Rename table has a cycle through '{0}'")]
    RenameCycle(String),
    #[error("Unknown region: {0}")]
    UnknownRegion(String),
    #[error("No dataset configured for {metric} in region {region}")]
    NoDataset { metric: String, region: String },
}
