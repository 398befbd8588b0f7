//! Error types for the factor research toolkit.
//!
//! Only the I/O side (exchange client, parquet cache, configuration) can
//! fail. The numerical core degrades to empty or zero-valued outputs.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),

    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Gave up after {attempts} attempts: {last_error}")]
    RetriesExhausted { attempts: u32, last_error: String },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Invalid frequency: {0}")]
    InvalidFrequency(String),

    #[error("Cache schema mismatch: {0}")]
    CacheSchema(String),
}

pub type Result<T> = std::result::Result<T, Error>;
