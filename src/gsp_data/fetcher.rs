use crate::gsp_data::error::{FetchError, FetchOutcome};
use crate::gsp_data::series_cache::SeriesCache;
use crate::gsp_data::source::GenerationSource;
use crate::types::raw_series::{RawSeries, Sample};
use crate::types::retry::RetryPolicy;
use crate::types::site::SiteId;
use crate::types::time_window::TimeWindow;
use chrono::{Duration, Utc};
use log::{debug, info, warn};

/// Longest range PVLive answers in a single request without truncating.
pub const DEFAULT_MAX_REQUEST_DAYS: i64 = 365;

/// Fetches the complete window for one site: splits it into request-sized ranges,
/// retries transient failures and merges the fragments into a single [`RawSeries`].
pub struct SiteFetcher<S> {
    source: S,
    retry: RetryPolicy,
    max_request_span: Duration,
    cache: Option<SeriesCache>,
}

impl<S: GenerationSource> SiteFetcher<S> {
    pub fn new(source: S, retry: RetryPolicy) -> Self {
        Self {
            source,
            retry,
            max_request_span: Duration::days(DEFAULT_MAX_REQUEST_DAYS),
            cache: None,
        }
    }

    pub fn with_max_request_span(mut self, span: Duration) -> Self {
        self.max_request_span = span;
        self
    }

    /// Serves completed ranges from `cache` and stores fresh responses in it.
    pub fn with_cache(mut self, cache: SeriesCache) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Retrieves every available sample for `site` inside `window`.
    ///
    /// An `Ok` series may be empty. PVLive treats a range end as inclusive, so each
    /// fragment is clipped to its own half-open range before merging; otherwise every
    /// split boundary would be returned twice.
    pub async fn fetch(&self, site: SiteId, window: &TimeWindow) -> Result<RawSeries, FetchOutcome> {
        let mut series = RawSeries::new(site);
        for range in window.split(self.max_request_span) {
            let samples = self.fetch_range_cached(site, &range).await?;
            series.extend(samples.into_iter().filter(|(ts, _)| range.contains(*ts)));
        }
        let dropped = series.retain_within(window);
        if dropped > 0 {
            debug!("Discarded {} samples outside {} for GSP {}", dropped, window, site);
        }
        info!("Fetched {} samples for GSP {}", series.len(), site);
        Ok(series)
    }

    async fn fetch_range_cached(
        &self,
        site: SiteId,
        range: &TimeWindow,
    ) -> Result<Vec<Sample>, FetchOutcome> {
        if let Some(cache) = &self.cache {
            match cache.load(site, range).await {
                Ok(Some(samples)) => return Ok(samples),
                Ok(None) => {}
                Err(e) => warn!("Ignoring unreadable cache entry for GSP {}: {}", site, e),
            }
        }

        let samples = self.fetch_range_with_retry(site, range).await?;

        // Ranges reaching into the future can still change upstream.
        if let Some(cache) = &self.cache {
            if range.end() <= Utc::now() {
                if let Err(e) = cache.store(site, range, &samples).await {
                    warn!("Failed to cache GSP {} {}: {}", site, range, e);
                }
            }
        }
        Ok(samples)
    }

    async fn fetch_range_with_retry(
        &self,
        site: SiteId,
        range: &TimeWindow,
    ) -> Result<Vec<Sample>, FetchOutcome> {
        let max_attempts = self.retry.attempts();
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            match self.source.fetch_range(site, range).await {
                Ok(samples) => return Ok(samples),
                Err(FetchError::NotFound { .. }) => return Err(FetchOutcome::NotFound),
                Err(err) if err.is_transient() => {
                    if attempt >= max_attempts {
                        warn!(
                            "Giving up on GSP {} {} after {} attempts: {}",
                            site, range, attempt, err
                        );
                        return Err(FetchOutcome::TransientError {
                            attempts: attempt,
                            detail: err.to_string(),
                        });
                    }
                    let delay = self.retry.delay_for(attempt - 1);
                    warn!(
                        "Attempt {}/{} for GSP {} failed ({}), retrying in {:?}",
                        attempt, max_attempts, site, err, delay
                    );
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                }
                Err(err) => return Err(FetchOutcome::FatalError(err)),
            }
        }
    }
}
