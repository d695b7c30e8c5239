//! Error types for the freshness checker

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FreshnessError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("JSON parsing failed: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("Configuration error: {0}")]
    ConfigError(#[from] config::ConfigError),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("API error: {code} - {message}")]
    ApiError {
        code: String,
        message: String,
    },

    #[error("Malformed adapter catalog file {path}: {message}")]
    CatalogError {
        path: PathBuf,
        message: String,
    },

    #[error("Required file not found: {0}")]
    MissingFile(PathBuf),

    #[error("Invalid ledger row: {0}")]
    InvalidRow(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

pub type Result<T> = std::result::Result<T, FreshnessError>;
