use crate::error::ConfigError;
use std::io;
use std::path::{Path, PathBuf};

const CACHE_DIR_NAME: &str = "combined_gsp_cache";

/// Per-user cache location for upstream responses.
pub fn default_cache_dir() -> Result<PathBuf, ConfigError> {
    dirs::cache_dir()
        .ok_or_else(|| {
            ConfigError::CacheDirResolution(io::Error::new(
                io::ErrorKind::NotFound,
                "Could not determine system cache directory",
            ))
        })
        .map(|p| p.join(CACHE_DIR_NAME))
}

pub fn ensure_cache_dir_exists(path: &Path) -> Result<(), ConfigError> {
    match std::fs::metadata(path) {
        Ok(metadata) if metadata.is_dir() => Ok(()),
        Ok(_) => Err(ConfigError::CacheDirCreation(
            path.to_path_buf(),
            io::Error::new(io::ErrorKind::AlreadyExists, "path exists but is not a directory"),
        )),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            log::info!("Creating cache directory: {}", path.display());
            std::fs::create_dir_all(path)
                .map_err(|e| ConfigError::CacheDirCreation(path.to_path_buf(), e))
        }
        Err(e) => Err(ConfigError::CacheDirCreation(path.to_path_buf(), e)),
    }
}
