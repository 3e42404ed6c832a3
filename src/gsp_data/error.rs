use crate::types::site::SiteId;
use polars::error::PolarsError;
use std::path::PathBuf;
use thiserror::Error;

/// Failure of a single upstream request for one site and sub-range.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("GSP {site} does not exist upstream")]
    NotFound { site: SiteId },

    #[error("Transient failure fetching GSP {site}: {detail}")]
    Transient { site: SiteId, detail: String },

    #[error("Malformed PVLive response for GSP {site}: {detail}")]
    Schema { site: SiteId, detail: String },

    #[error("Unexpected HTTP status {status} for {url}")]
    UnexpectedStatus {
        url: String,
        status: reqwest::StatusCode,
    },

    #[error("Could not build request for {0}")]
    Request(String, #[source] reqwest::Error),

    #[error("Failed to build HTTP client")]
    ClientBuild(#[source] reqwest::Error),
}

impl FetchError {
    pub fn is_transient(&self) -> bool {
        matches!(self, FetchError::Transient { .. })
    }

    #[cfg(test)]
    pub(crate) fn is_schema(&self) -> bool {
        matches!(self, FetchError::Schema { .. })
    }
}

/// Tagged failure of a whole-window fetch for one site.
#[derive(Debug)]
pub enum FetchOutcome {
    /// The site does not exist upstream. Expected, recorded as a skip.
    NotFound,
    /// Retries were exhausted. Recorded as a skip.
    TransientError { attempts: u32, detail: String },
    /// The upstream broke its contract. Aborts the run.
    FatalError(FetchError),
}

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Failed to create cache directory '{0}'")]
    CacheDirCreation(PathBuf, #[source] std::io::Error),

    #[error("I/O error writing parquet cache file '{0}'")]
    ParquetWriteIo(PathBuf, #[source] std::io::Error),

    #[error("Encoding error writing parquet cache file '{0}'")]
    ParquetWritePolars(PathBuf, #[source] PolarsError),

    #[error("Failed to scan parquet cache file '{0}'")]
    ParquetScan(PathBuf, #[source] PolarsError),

    #[error("Cache file '{path}' holds an invalid row: {message}")]
    InvalidRow { path: PathBuf, message: String },

    #[error("Background task failed to complete")]
    TaskJoin(#[from] tokio::task::JoinError),
}
