//! Collects PVLive solar generation for every grid supply point (GSP) and combines it
//! into a single `(time, site)` Zarr dataset.
//!
//! The pipeline is: enumerate sites, fetch each one with bounded concurrency and
//! retries, project every series onto one canonical time axis, and write the result
//! atomically. See [`GspCollector`] for the entry point.

mod alignment;
mod collector;
mod dataset;
mod error;
mod gsp_data;
mod types;
mod utils;

pub use collector::*;
pub use error::{CombineError, ConfigError};
pub use utils::default_cache_dir;

pub use types::raw_series::{RawSeries, Reading, Sample};
pub use types::retry::RetryPolicy;
pub use types::site::{SiteId, SiteIter, SiteRange};
pub use types::skip_report::{SkipReason, SkipReport};
pub use types::time_window::{Granularity, TimeWindow};

pub use gsp_data::error::{CacheError, FetchError, FetchOutcome};
pub use gsp_data::fetcher::{SiteFetcher, DEFAULT_MAX_REQUEST_DAYS};
pub use gsp_data::series_cache::SeriesCache;
pub use gsp_data::source::{decode_payload, GenerationSource, PvLiveClient, DEFAULT_BASE_URL};

pub use alignment::assembler::{project, AlignmentWarning, SiteColumn, DEFAULT_SNAP_TOLERANCE_SECS};
pub use alignment::combined::{CombinedArray, CombinedArrayBuilder, Variable};
pub use alignment::time_axis::CanonicalTimeAxis;

pub use dataset::error::WriteError;
pub use dataset::metadata::{dataset_name, DatasetMetadata};
pub use dataset::zarr_writer::{DatasetWriter, DEFAULT_TIME_CHUNK};
