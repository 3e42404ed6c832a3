use std::path::PathBuf;
use thiserror::Error;

type BoxedError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Debug, Error)]
pub enum WriteError {
    #[error("Failed to create output directory '{0}'")]
    OutputDirCreation(PathBuf, #[source] std::io::Error),

    #[error("Failed to create staging directory in '{0}'")]
    StagingCreation(PathBuf, #[source] std::io::Error),

    #[error("Zarr operation failed for '{path}'")]
    Zarr {
        path: PathBuf,
        #[source]
        source: BoxedError,
    },

    #[error("Failed to replace existing dataset '{0}'")]
    Replace(PathBuf, #[source] std::io::Error),

    #[error("Failed to move staged dataset into '{to}'")]
    Rename {
        to: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Refusing to write a dataset without any site columns")]
    EmptyDataset,

    #[error("Background task failed to complete")]
    TaskJoin(#[from] tokio::task::JoinError),
}

impl WriteError {
    pub(crate) fn zarr<E>(path: impl Into<PathBuf>, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        WriteError::Zarr {
            path: path.into(),
            source: Box::new(source),
        }
    }
}
