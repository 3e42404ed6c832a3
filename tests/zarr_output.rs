mod common;

use chrono::{TimeZone, Utc};
use combined_gsp::{
    DatasetMetadata, DatasetWriter, Granularity, GspCollector, SkipReport, Variable, WriteError,
};
use common::{config, full_series, ts, week, MockSource, Script};
use serde_json::json;
use std::path::Path;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use zarrs::array::Array;
use zarrs::filesystem::FilesystemStore;
use zarrs::group::Group;

fn read_f64(store: &Arc<FilesystemStore>, path: &str) -> (Vec<u64>, Vec<f64>) {
    let array = Array::open(store.clone(), path).unwrap();
    let values = array
        .retrieve_array_subset_elements::<f64>(&array.subset_all())
        .unwrap();
    (array.shape().to_vec(), values)
}

fn read_i64(store: &Arc<FilesystemStore>, path: &str) -> Vec<i64> {
    let array = Array::open(store.clone(), path).unwrap();
    array
        .retrieve_array_subset_elements::<i64>(&array.subset_all())
        .unwrap()
}

async fn write_week(out: &Path, time_chunk: u64) -> std::path::PathBuf {
    let window = week();
    let mut partial = full_series(&window, 0.0);
    partial.truncate(100);
    let source = MockSource::new()
        .with(0, Script::Samples(full_series(&window, 0.0)))
        .with(1, Script::NotFound)
        .with(3, Script::Samples(partial));
    let mut config = config(out, 3);
    config.time_chunk = time_chunk;
    GspCollector::new(source, config)
        .unwrap()
        .run(&CancellationToken::new())
        .await
        .unwrap()
        .output_path
}

#[tokio::test]
async fn test_written_arrays_read_back() {
    let out = tempfile::tempdir().unwrap();
    let path = write_week(out.path(), 48).await;
    let store = Arc::new(FilesystemStore::new(&path).unwrap());

    let time = read_i64(&store, "/time");
    assert_eq!(time.len(), 336);
    assert_eq!(time[0], ts(1, 0, 0).timestamp());
    assert!(time.windows(2).all(|w| w[1] - w[0] == 1800));

    assert_eq!(read_i64(&store, "/site"), vec![0, 3]);

    let (shape, generation) = read_f64(&store, "/generation");
    assert_eq!(shape, vec![336, 2]);
    assert_eq!(generation[0], 0.0);
    assert_eq!(generation[2 * 99], 99.0);
    assert_eq!(generation[2 * 99 + 1], 99.0);
    assert!(generation[2 * 100 + 1].is_nan());
    assert_eq!(generation[2 * 335], 335.0);

    let (_, installed) = read_f64(&store, "/installedcapacity_mwp");
    assert_eq!(installed[0], 120.0);
    let (_, capacity) = read_f64(&store, &format!("/{}", Variable::Capacity.name()));
    assert_eq!(capacity[1], 100.0);
}

#[tokio::test]
async fn test_store_attributes_describe_the_run() {
    let out = tempfile::tempdir().unwrap();
    let path = write_week(out.path(), 1000).await;
    let store = Arc::new(FilesystemStore::new(&path).unwrap());

    let group = Group::open(store.clone(), "/").unwrap();
    let attributes = group.attributes();
    assert_eq!(attributes["source"], json!("mock"));
    assert_eq!(attributes["units"], json!("MW"));
    assert_eq!(attributes["window_start"], json!("2024-01-01T00:00:00Z"));
    assert_eq!(attributes["window_end"], json!("2024-01-08T00:00:00Z"));
    assert_eq!(attributes["granularity_seconds"], json!(1800));
    assert_eq!(attributes["generated_at"], json!("2024-06-01T00:00:00Z"));
    assert_eq!(
        attributes["skipped_sites"],
        json!({"1": "not found", "2": "not found"})
    );

    let generation = Array::open(store.clone(), "/generation").unwrap();
    assert_eq!(generation.attributes()["units"], json!("MW"));
    let time = Array::open(store, "/time").unwrap();
    assert_eq!(
        time.attributes()["units"],
        json!("seconds since 1970-01-01 00:00:00")
    );
}

#[tokio::test]
async fn test_rewrite_replaces_existing_store() {
    let out = tempfile::tempdir().unwrap();
    let first = write_week(out.path(), 1000).await;
    std::fs::write(first.join("stale"), b"left over").unwrap();

    let second = write_week(out.path(), 1000).await;
    assert_eq!(first, second);
    assert!(!second.join("stale").exists());
    assert_eq!(common::entries(out.path()).len(), 1);
}

#[tokio::test]
async fn test_empty_array_is_refused() {
    let out = tempfile::tempdir().unwrap();
    let axis = combined_gsp::CanonicalTimeAxis::new(&week(), Granularity::half_hourly());
    let array = combined_gsp::CombinedArrayBuilder::new(axis).finish();
    let metadata = DatasetMetadata {
        window: week(),
        granularity: Granularity::half_hourly(),
        generated_at: Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap(),
        source: "mock".to_string(),
        skip_report: SkipReport::new(),
        warning_count: 0,
    };
    let writer = DatasetWriter::new(out.path(), 1000);
    assert!(matches!(
        writer.write(array, metadata).await,
        Err(WriteError::EmptyDataset)
    ));
    assert!(common::entries(out.path()).is_empty());
}
