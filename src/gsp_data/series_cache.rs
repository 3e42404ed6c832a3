use crate::gsp_data::error::CacheError;
use crate::types::raw_series::{Reading, Sample};
use crate::types::site::SiteId;
use crate::types::time_window::TimeWindow;
use chrono::DateTime;
use log::{debug, info};
use polars::prelude::*;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tokio::{fs, task};

const COL_TIMESTAMP: &str = "timestamp";
const COL_GENERATION: &str = "generation_mw";
const COL_CAPACITY: &str = "capacity_mwp";
const COL_INSTALLED: &str = "installedcapacity_mwp";

/// Parquet cache of upstream responses, one file per (site, request sub-range).
pub struct SeriesCache {
    cache_dir: PathBuf,
}

impl SeriesCache {
    pub fn new(cache_dir: &Path) -> SeriesCache {
        SeriesCache {
            cache_dir: cache_dir.to_path_buf(),
        }
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    pub fn path_for(&self, site: SiteId, range: &TimeWindow) -> PathBuf {
        let filename = format!(
            "gsp-{}-{}-{}.parquet",
            site,
            range.start().format("%Y%m%dT%H%M%S"),
            range.end().format("%Y%m%dT%H%M%S")
        );
        self.cache_dir.join(filename)
    }

    /// Returns the cached samples, or `None` on a cache miss.
    pub async fn load(
        &self,
        site: SiteId,
        range: &TimeWindow,
    ) -> Result<Option<Vec<Sample>>, CacheError> {
        let parquet_path = self.path_for(site, range);
        if fs::metadata(&parquet_path).await.is_err() {
            return Ok(None);
        }
        debug!("Cache hit for GSP {} {} at {:?}", site, range, parquet_path);

        let samples = task::spawn_blocking(move || {
            let df = LazyFrame::scan_parquet(&parquet_path, Default::default())
                .and_then(|lf| lf.collect())
                .map_err(|e| CacheError::ParquetScan(parquet_path.clone(), e))?;
            dataframe_to_samples(&df, &parquet_path)
        })
        .await??;
        Ok(Some(samples))
    }

    /// Writes the samples through a temp file so a crash never leaves a truncated entry.
    pub async fn store(
        &self,
        site: SiteId,
        range: &TimeWindow,
        samples: &[Sample],
    ) -> Result<(), CacheError> {
        fs::create_dir_all(&self.cache_dir)
            .await
            .map_err(|e| CacheError::CacheDirCreation(self.cache_dir.clone(), e))?;

        let parquet_path = self.path_for(site, range);
        let cache_dir = self.cache_dir.clone();
        let df = samples_to_dataframe(samples)
            .map_err(|e| CacheError::ParquetWritePolars(parquet_path.clone(), e))?;

        let written = parquet_path.clone();
        task::spawn_blocking(move || write_parquet(df, &cache_dir, &parquet_path)).await??;
        info!("Cached GSP {} {} to {:?}", site, range, written);
        Ok(())
    }
}

fn samples_to_dataframe(samples: &[Sample]) -> PolarsResult<DataFrame> {
    let timestamps: Vec<i64> = samples.iter().map(|(ts, _)| ts.timestamp()).collect();
    let generation: Vec<Option<f64>> = samples.iter().map(|(_, r)| r.generation_mw).collect();
    let capacity: Vec<Option<f64>> = samples.iter().map(|(_, r)| r.capacity_mwp).collect();
    let installed: Vec<Option<f64>> = samples
        .iter()
        .map(|(_, r)| r.installed_capacity_mwp)
        .collect();
    df!(
        COL_TIMESTAMP => timestamps,
        COL_GENERATION => generation,
        COL_CAPACITY => capacity,
        COL_INSTALLED => installed
    )
}

fn write_parquet(mut df: DataFrame, cache_dir: &Path, path: &Path) -> Result<(), CacheError> {
    let mut temp_file = NamedTempFile::new_in(cache_dir)
        .map_err(|e| CacheError::ParquetWriteIo(path.to_path_buf(), e))?;
    ParquetWriter::new(temp_file.as_file_mut())
        .with_compression(ParquetCompression::Snappy)
        .finish(&mut df)
        .map_err(|e| CacheError::ParquetWritePolars(path.to_path_buf(), e))?;
    temp_file
        .persist(path)
        .map_err(|e| CacheError::ParquetWriteIo(path.to_path_buf(), e.error))?;
    Ok(())
}

fn dataframe_to_samples(df: &DataFrame, path: &Path) -> Result<Vec<Sample>, CacheError> {
    let scan_error = |e: PolarsError| CacheError::ParquetScan(path.to_path_buf(), e);
    let timestamps = df.column(COL_TIMESTAMP).and_then(|c| c.i64()).map_err(scan_error)?;
    let generation = df.column(COL_GENERATION).and_then(|c| c.f64()).map_err(scan_error)?;
    let capacity = df.column(COL_CAPACITY).and_then(|c| c.f64()).map_err(scan_error)?;
    let installed = df.column(COL_INSTALLED).and_then(|c| c.f64()).map_err(scan_error)?;

    let mut samples = Vec::with_capacity(df.height());
    for idx in 0..df.height() {
        let timestamp = timestamps
            .get(idx)
            .and_then(|secs| DateTime::from_timestamp(secs, 0))
            .ok_or_else(|| CacheError::InvalidRow {
                path: path.to_path_buf(),
                message: format!("row {idx} has no valid timestamp"),
            })?;
        samples.push((
            timestamp,
            Reading {
                generation_mw: generation.get(idx),
                capacity_mwp: capacity.get(idx),
                installed_capacity_mwp: installed.get(idx),
            },
        ));
    }
    Ok(samples)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn window() -> TimeWindow {
        TimeWindow::new(
            Utc.with_ymd_and_hms(2023, 1, 1, 0, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2023, 1, 2, 0, 0, 0).unwrap(),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_miss_then_hit_preserves_nulls() -> Result<(), CacheError> {
        let dir = tempfile::tempdir().unwrap();
        let cache = SeriesCache::new(&dir.path().join("nested"));
        let range = window();
        assert!(cache.load(SiteId(3), &range).await?.is_none());

        let samples = vec![
            (
                range.start(),
                Reading {
                    generation_mw: Some(0.0),
                    capacity_mwp: Some(120.0),
                    installed_capacity_mwp: None,
                },
            ),
            (range.start() + chrono::Duration::minutes(30), Reading::default()),
        ];
        cache.store(SiteId(3), &range, &samples).await?;

        let loaded = cache.load(SiteId(3), &range).await?.expect("cache entry");
        assert_eq!(loaded, samples);
        assert!(cache.load(SiteId(4), &range).await?.is_none());
        Ok(())
    }

    #[test]
    fn test_path_encodes_site_and_range() {
        let cache = SeriesCache::new(Path::new("/tmp/gsp"));
        let path = cache.path_for(SiteId(17), &window());
        assert!(path.ends_with("gsp-17-20230101T000000-20230102T000000.parquet"));
    }
}
