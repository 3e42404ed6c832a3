use crate::dataset::error::WriteError;
use crate::gsp_data::error::FetchError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CombineError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Write(#[from] WriteError),

    #[error("No data retrieved for any of the {attempted} GSP ids")]
    NoData { attempted: usize },

    #[error("Collection was cancelled before every site was fetched")]
    Cancelled,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Maximum GSP id must be between 0 and {max}, got {0}", max = u32::MAX)]
    InvalidMaxSiteId(i64),

    #[error("Year {0} cannot be expanded to a UTC instant")]
    InvalidYear(i32),

    #[error("Time window end ({end}) must be after its start ({start})")]
    EmptyWindow { start: String, end: String },

    #[error("Granularity must be a positive whole number of seconds, got {0}s")]
    InvalidGranularity(i64),

    #[error("Worker pool size must be at least 1")]
    InvalidWorkers,

    #[error("Time chunk length must be at least 1")]
    InvalidTimeChunk,

    #[error("Maximum request span must be at least one day, got {0} days")]
    InvalidRequestSpan(i64),

    #[error("Snap tolerance must not be negative")]
    NegativeTolerance,

    #[error("Failed to determine cache directory")]
    CacheDirResolution(#[source] std::io::Error),

    #[error("Failed to create cache directory '{0}'")]
    CacheDirCreation(PathBuf, #[source] std::io::Error),
}
