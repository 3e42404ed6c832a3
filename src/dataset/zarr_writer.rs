//! Serializes a [`CombinedArray`] into a Zarr v3 store.
//!
//! Layout of `combined_gsp_<start>_<end>.zarr`:
//!
//! * `/` group carrying the run attributes (window, units, skip report, ...)
//! * `/time` int64 seconds since the Unix epoch, dimension `time`
//! * `/site` int64 GSP ids, dimension `site`
//! * `/generation`, `/capacity_mwp`, `/installedcapacity_mwp` float64 `(time, site)`,
//!   chunked along time with the whole site dimension in one chunk, gzip compressed,
//!   `NaN` for missing readings.
//!
//! The store is assembled in a hidden staging directory next to the destination and
//! only renamed into place once every array is stored, so a failed write leaves nothing
//! behind.

use crate::alignment::combined::{CombinedArray, Variable};
use crate::dataset::error::WriteError;
use crate::dataset::metadata::{dataset_name, DatasetMetadata};
use log::{debug, info};
use serde_json::{json, Map, Value};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::task;
use zarrs::array::codec::{BytesToBytesCodecTraits, GzipCodec};
use zarrs::array::{Array, ArrayBuilder, ChunkGrid, DataType, FillValue};
use zarrs::array_subset::ArraySubset;
use zarrs::filesystem::FilesystemStore;
use zarrs::group::GroupBuilder;

pub const DEFAULT_TIME_CHUNK: u64 = 1000;
const GZIP_LEVEL: u32 = 5;
const STAGING_PREFIX: &str = ".combined_gsp-staging-";

#[derive(Debug, Clone)]
pub struct DatasetWriter {
    output_dir: PathBuf,
    time_chunk: u64,
}

impl DatasetWriter {
    pub fn new(output_dir: &Path, time_chunk: u64) -> Self {
        Self {
            output_dir: output_dir.to_path_buf(),
            time_chunk: time_chunk.max(1),
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn time_chunk(&self) -> u64 {
        self.time_chunk
    }

    /// Writes the dataset and returns the path of the finished store.
    pub async fn write(
        &self,
        array: CombinedArray,
        metadata: DatasetMetadata,
    ) -> Result<PathBuf, WriteError> {
        let writer = self.clone();
        task::spawn_blocking(move || writer.write_blocking(&array, &metadata)).await?
    }

    fn write_blocking(
        &self,
        array: &CombinedArray,
        metadata: &DatasetMetadata,
    ) -> Result<PathBuf, WriteError> {
        if array.n_sites() == 0 {
            return Err(WriteError::EmptyDataset);
        }
        std::fs::create_dir_all(&self.output_dir)
            .map_err(|e| WriteError::OutputDirCreation(self.output_dir.clone(), e))?;

        // Dropping `staging` removes it, which covers every early return below.
        let staging = tempfile::Builder::new()
            .prefix(STAGING_PREFIX)
            .tempdir_in(&self.output_dir)
            .map_err(|e| WriteError::StagingCreation(self.output_dir.clone(), e))?;
        debug!("Staging dataset in {:?}", staging.path());

        self.write_store(staging.path(), array, metadata)?;

        let destination = self.output_dir.join(dataset_name(&metadata.window));
        if destination.exists() {
            std::fs::remove_dir_all(&destination)
                .map_err(|e| WriteError::Replace(destination.clone(), e))?;
        }
        std::fs::rename(staging.path(), &destination).map_err(|e| WriteError::Rename {
            to: destination.clone(),
            source: e,
        })?;

        info!(
            "Wrote {} x {} dataset to {:?}",
            array.n_times(),
            array.n_sites(),
            destination
        );
        Ok(destination)
    }

    fn write_store(
        &self,
        root: &Path,
        array: &CombinedArray,
        metadata: &DatasetMetadata,
    ) -> Result<(), WriteError> {
        let store = Arc::new(FilesystemStore::new(root).map_err(|e| WriteError::zarr(root, e))?);
        let n_times = array.n_times() as u64;
        let n_sites = array.n_sites() as u64;
        let time_chunk = self.time_chunk.min(n_times).max(1);

        let group = GroupBuilder::new()
            .attributes(metadata.to_attributes())
            .build(store.clone(), "/")
            .map_err(|e| WriteError::zarr(root, e))?;
        group
            .store_metadata()
            .map_err(|e| WriteError::zarr(root, e))?;

        let time = ArrayBuilder::new(
            vec![n_times],
            DataType::Int64,
            chunk_grid(root, vec![time_chunk])?,
            FillValue::from(i64::MIN),
        )
        .bytes_to_bytes_codecs(vec![gzip(root)?])
        .dimension_names(["time"].into())
        .attributes(attributes(json!({
            "standard_name": "time",
            "units": "seconds since 1970-01-01 00:00:00",
            "calendar": "proleptic_gregorian",
        })))
        .build(store.clone(), "/time")
        .map_err(|e| WriteError::zarr(root, e))?;
        time.store_metadata()
            .map_err(|e| WriteError::zarr(root, e))?;
        time.store_array_subset_elements::<i64>(
            &ArraySubset::new_with_shape(vec![n_times]),
            &array.axis().unix_seconds(),
        )
        .map_err(|e| WriteError::zarr(root, e))?;

        let site_ids: Vec<i64> = array.sites().iter().map(|s| i64::from(s.get())).collect();
        let site = ArrayBuilder::new(
            vec![n_sites],
            DataType::Int64,
            chunk_grid(root, vec![n_sites])?,
            FillValue::from(-1i64),
        )
        .dimension_names(["site"].into())
        .attributes(attributes(json!({"long_name": "GSP id"})))
        .build(store.clone(), "/site")
        .map_err(|e| WriteError::zarr(root, e))?;
        site.store_metadata()
            .map_err(|e| WriteError::zarr(root, e))?;
        site.store_array_subset_elements::<i64>(
            &ArraySubset::new_with_shape(vec![n_sites]),
            &site_ids,
        )
        .map_err(|e| WriteError::zarr(root, e))?;

        for variable in Variable::ALL {
            let data = ArrayBuilder::new(
                vec![n_times, n_sites],
                DataType::Float64,
                chunk_grid(root, vec![time_chunk, n_sites])?,
                FillValue::from(f64::NAN),
            )
            .bytes_to_bytes_codecs(vec![gzip(root)?])
            .dimension_names(["time", "site"].into())
            .attributes(attributes(json!({
                "units": variable.units(),
                "long_name": variable.long_name(),
            })))
            .build(store.clone(), &format!("/{}", variable.name()))
            .map_err(|e| WriteError::zarr(root, e))?;
            data.store_metadata()
                .map_err(|e| WriteError::zarr(root, e))?;
            store_time_blocks(&data, array.values(variable), n_times, n_sites, time_chunk)
                .map_err(|e| WriteError::zarr(root, e))?;
            debug!("Stored variable {}", variable);
        }
        Ok(())
    }
}

/// Writes row-major `(time, site)` values one time chunk at a time.
fn store_time_blocks(
    data: &Array<FilesystemStore>,
    values: &[f64],
    n_times: u64,
    n_sites: u64,
    time_chunk: u64,
) -> Result<(), zarrs::array::ArrayError> {
    let mut t0 = 0u64;
    while t0 < n_times {
        let t1 = (t0 + time_chunk).min(n_times);
        let block = &values[(t0 * n_sites) as usize..(t1 * n_sites) as usize];
        data.store_array_subset_elements::<f64>(
            &ArraySubset::new_with_ranges(&[t0..t1, 0..n_sites]),
            block,
        )?;
        t0 = t1;
    }
    Ok(())
}

fn chunk_grid(root: &Path, shape: Vec<u64>) -> Result<ChunkGrid, WriteError> {
    shape.try_into().map_err(|e| WriteError::zarr(root, e))
}

fn gzip(root: &Path) -> Result<Arc<dyn BytesToBytesCodecTraits>, WriteError> {
    let codec = GzipCodec::new(GZIP_LEVEL).map_err(|e| WriteError::zarr(root, e))?;
    Ok(Arc::new(codec))
}

fn attributes(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}
