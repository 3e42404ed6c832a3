//! This module provides the main entry point of the crate: the [`GspCollector`], which
//! fetches every GSP in the configured range, aligns the series onto one time axis and
//! writes the combined Zarr dataset.

use crate::alignment::assembler::{project, AlignmentWarning, DEFAULT_SNAP_TOLERANCE_SECS};
use crate::alignment::combined::{CombinedArray, CombinedArrayBuilder};
use crate::alignment::time_axis::CanonicalTimeAxis;
use crate::dataset::metadata::DatasetMetadata;
use crate::dataset::zarr_writer::{DatasetWriter, DEFAULT_TIME_CHUNK};
use crate::error::{CombineError, ConfigError};
use crate::gsp_data::error::FetchOutcome;
use crate::gsp_data::fetcher::{SiteFetcher, DEFAULT_MAX_REQUEST_DAYS};
use crate::gsp_data::series_cache::SeriesCache;
use crate::gsp_data::source::GenerationSource;
use crate::types::retry::RetryPolicy;
use crate::types::site::{SiteId, SiteRange};
use crate::types::skip_report::{SkipReason, SkipReport};
use crate::types::time_window::{Granularity, TimeWindow};
use crate::utils::ensure_cache_dir_exists;
use bon::Builder;
use chrono::{DateTime, Duration, Utc};
use futures_util::{stream, StreamExt};
use log::{error, info, warn};
use std::collections::BTreeMap;
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;

/// Highest GSP id published by PVLive.
pub const DEFAULT_MAX_SITE_ID: i64 = 318;
pub const DEFAULT_WORKERS: usize = 4;

/// Everything a collection run needs besides the upstream source.
///
/// Built with a builder; only `window` and `output_dir` are required.
///
/// # Examples
///
/// ```
/// use combined_gsp::{CollectorConfig, TimeWindow, RetryPolicy};
///
/// let config = CollectorConfig::builder()
///     .window(TimeWindow::from_years(2023, 2024)?)
///     .output_dir("data")
///     .max_site_id(10)
///     .workers(2)
///     .retry(RetryPolicy::immediate(1))
///     .build();
/// assert_eq!(config.max_site_id, 10);
/// assert_eq!(config.time_chunk, 1000);
/// # Ok::<(), combined_gsp::ConfigError>(())
/// ```
#[derive(Debug, Clone, Builder)]
pub struct CollectorConfig {
    pub window: TimeWindow,
    #[builder(into)]
    pub output_dir: PathBuf,
    #[builder(default = DEFAULT_MAX_SITE_ID)]
    pub max_site_id: i64,
    #[builder(default = DEFAULT_WORKERS)]
    pub workers: usize,
    #[builder(default)]
    pub granularity: Granularity,
    #[builder(default = Duration::seconds(DEFAULT_SNAP_TOLERANCE_SECS))]
    pub snap_tolerance: Duration,
    #[builder(default = DEFAULT_TIME_CHUNK)]
    pub time_chunk: u64,
    #[builder(default = DEFAULT_MAX_REQUEST_DAYS)]
    pub max_request_days: i64,
    #[builder(default)]
    pub retry: RetryPolicy,
    /// Parquet cache for upstream responses; `None` disables caching.
    #[builder(into)]
    pub cache_dir: Option<PathBuf>,
    /// Timestamp recorded in the dataset; defaults to the time of writing.
    pub generated_at: Option<DateTime<Utc>>,
}

impl CollectorConfig {
    fn validate(&self) -> Result<SiteRange, ConfigError> {
        let sites = SiteRange::new(self.max_site_id)?;
        if self.workers == 0 {
            return Err(ConfigError::InvalidWorkers);
        }
        if self.time_chunk == 0 {
            return Err(ConfigError::InvalidTimeChunk);
        }
        if self.max_request_days < 1 {
            return Err(ConfigError::InvalidRequestSpan(self.max_request_days));
        }
        if self.snap_tolerance < Duration::zero() {
            return Err(ConfigError::NegativeTolerance);
        }
        Ok(sites)
    }
}

/// Fetched and aligned data, before it is written.
#[derive(Debug, Clone)]
pub struct Collection {
    pub array: CombinedArray,
    pub skip_report: SkipReport,
    /// Alignment warnings ordered by site.
    pub warnings: Vec<AlignmentWarning>,
}

/// What a finished run produced.
#[derive(Debug, Clone)]
pub struct CollectionSummary {
    pub output_path: PathBuf,
    pub sites_fetched: usize,
    pub sites_skipped: usize,
    pub warnings: usize,
    pub skip_report: SkipReport,
}

/// Runs the collect → align → write pipeline over a [`GenerationSource`].
///
/// # Examples
///
/// ```no_run
/// use combined_gsp::{CollectorConfig, GspCollector, PvLiveClient, TimeWindow, DEFAULT_BASE_URL};
/// use std::time::Duration;
/// use tokio_util::sync::CancellationToken;
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let source = PvLiveClient::new(DEFAULT_BASE_URL, Duration::from_secs(60))?;
/// let config = CollectorConfig::builder()
///     .window(TimeWindow::from_years(2023, 2024)?)
///     .output_dir("data")
///     .build();
/// let summary = GspCollector::new(source, config)?
///     .run(&CancellationToken::new())
///     .await?;
/// println!("{} GSPs written to {:?}", summary.sites_fetched, summary.output_path);
/// # Ok(())
/// # }
/// ```
pub struct GspCollector<S> {
    fetcher: SiteFetcher<S>,
    sites: SiteRange,
    config: CollectorConfig,
    writer: DatasetWriter,
}

impl<S: GenerationSource> GspCollector<S> {
    /// Validates `config` and wires the fetcher, cache and writer together.
    ///
    /// # Errors
    ///
    /// Returns [`CombineError::Config`] for an invalid site bound, worker count, chunk
    /// length, request span or tolerance, or when the cache directory cannot be created.
    pub fn new(source: S, config: CollectorConfig) -> Result<Self, CombineError> {
        let sites = config.validate()?;
        let mut fetcher = SiteFetcher::new(source, config.retry)
            .with_max_request_span(Duration::days(config.max_request_days));
        if let Some(cache_dir) = &config.cache_dir {
            ensure_cache_dir_exists(cache_dir)?;
            fetcher = fetcher.with_cache(SeriesCache::new(cache_dir));
        }
        let writer = DatasetWriter::new(&config.output_dir, config.time_chunk);
        Ok(Self {
            fetcher,
            sites,
            config,
            writer,
        })
    }

    pub fn config(&self) -> &CollectorConfig {
        &self.config
    }

    pub fn source(&self) -> &S {
        self.fetcher.source()
    }

    /// Fetches every site and aligns the results, without writing anything.
    ///
    /// Sites are fetched `workers` at a time. Completion order is irrelevant: columns
    /// are keyed by site id. Tripping `cancel`, or any fatal fetch error, drops the
    /// in-flight fetches and returns early.
    ///
    /// # Errors
    ///
    /// * [`CombineError::Fetch`] when the upstream breaks its contract for any site.
    /// * [`CombineError::Cancelled`] when `cancel` fires.
    /// * [`CombineError::NoData`] when no site produced a single reading.
    pub async fn collect(&self, cancel: &CancellationToken) -> Result<Collection, CombineError> {
        let window = &self.config.window;
        let axis = CanonicalTimeAxis::new(window, self.config.granularity);
        let tolerance = self.config.snap_tolerance;
        info!(
            "Collecting GSPs 0-{} for {} ({} slots of {}s)",
            self.sites.max(),
            window,
            axis.len(),
            self.config.granularity.as_secs()
        );

        let fetcher = &self.fetcher;
        let mut results = stream::iter(self.sites.iter())
            .map(|site| async move { (site, fetcher.fetch(site, window).await) })
            .buffer_unordered(self.config.workers);

        let mut builder = CombinedArrayBuilder::new(axis);
        let mut skip_report = SkipReport::new();
        let mut warnings: BTreeMap<SiteId, Vec<AlignmentWarning>> = BTreeMap::new();

        loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    warn!("Collection cancelled with {} sites done", builder.len() + skip_report.len());
                    return Err(CombineError::Cancelled);
                }
                next = results.next() => next,
            };
            let Some((site, outcome)) = next else {
                break;
            };

            match outcome {
                Ok(series) if series.is_empty() => {
                    warn!("No data available for GSP {}", site);
                    skip_report.record(site, SkipReason::NoData);
                }
                Ok(series) => {
                    let mut column = project(series, builder.axis(), tolerance);
                    let site_warnings = std::mem::take(&mut column.warnings);
                    for warning in &site_warnings {
                        warn!("{}", warning);
                    }
                    info!("GSP {}: {} of {} slots filled", site, column.filled(), builder.axis().len());
                    if !site_warnings.is_empty() {
                        warnings.insert(site, site_warnings);
                    }
                    builder.insert(column);
                }
                Err(FetchOutcome::NotFound) => {
                    warn!("GSP {} does not exist upstream, skipping", site);
                    skip_report.record(site, SkipReason::NotFound);
                }
                Err(FetchOutcome::TransientError { attempts, detail }) => {
                    warn!("Skipping GSP {} after {} failed attempts", site, attempts);
                    skip_report.record(site, SkipReason::TransientError { attempts, detail });
                }
                Err(FetchOutcome::FatalError(err)) => {
                    // Returning drops `results`, which cancels every in-flight fetch.
                    error!("Aborting collection, GSP {} failed fatally: {}", site, err);
                    return Err(err.into());
                }
            }
        }

        if builder.is_empty() {
            error!("No data retrieved for any GSP ids - terminating");
            return Err(CombineError::NoData {
                attempted: self.sites.len(),
            });
        }

        Ok(Collection {
            array: builder.finish(),
            skip_report,
            warnings: warnings.into_values().flatten().collect(),
        })
    }

    /// Collects, aligns and writes the dataset, returning a summary of the run.
    ///
    /// Nothing is written unless every site was attempted and the write itself
    /// completes; see [`DatasetWriter`].
    pub async fn run(&self, cancel: &CancellationToken) -> Result<CollectionSummary, CombineError> {
        let collection = self.collect(cancel).await?;
        if cancel.is_cancelled() {
            return Err(CombineError::Cancelled);
        }

        let Collection {
            array,
            skip_report,
            warnings,
        } = collection;
        let sites_fetched = array.n_sites();
        let metadata = DatasetMetadata {
            window: self.config.window,
            granularity: self.config.granularity,
            generated_at: self.config.generated_at.unwrap_or_else(Utc::now),
            source: self.fetcher.source().name().to_string(),
            skip_report: skip_report.clone(),
            warning_count: warnings.len(),
        };
        let output_path = self.writer.write(array, metadata).await?;

        info!(
            "Successfully saved combined GSP dataset to {:?}: {} sites fetched, {} skipped, {} warnings",
            output_path,
            sites_fetched,
            skip_report.len(),
            warnings.len()
        );
        Ok(CollectionSummary {
            output_path,
            sites_fetched,
            sites_skipped: skip_report.len(),
            warnings: warnings.len(),
            skip_report,
        })
    }
}
