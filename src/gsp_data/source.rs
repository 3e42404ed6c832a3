//! The upstream seam: a [`GenerationSource`] trait and its PVLive HTTP implementation.

use crate::gsp_data::error::FetchError;
use crate::types::raw_series::{Reading, Sample};
use crate::types::site::SiteId;
use crate::types::time_window::TimeWindow;
use chrono::{DateTime, Utc};
use log::{debug, warn};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "https://api.solar.sheffield.ac.uk/pvlive/api/v4";
const EXTRA_FIELDS: &str = "capacity_mwp,installedcapacity_mwp";

const COL_DATETIME: &str = "datetime_gmt";
const COL_GENERATION: &str = "generation_mw";
const COL_CAPACITY: &str = "capacity_mwp";
const COL_INSTALLED: &str = "installedcapacity_mwp";

/// Anything that can answer "give me the readings for this site in this range".
///
/// Implementations return the raw upstream samples for one request; ordering,
/// duplicates and coverage are not guaranteed. Retrying and range splitting are
/// the caller's business.
#[allow(async_fn_in_trait)]
pub trait GenerationSource {
    async fn fetch_range(&self, site: SiteId, range: &TimeWindow)
        -> Result<Vec<Sample>, FetchError>;

    /// Short name recorded in the dataset attributes.
    fn name(&self) -> &str {
        "pvlive"
    }
}

/// PVLive v4 GSP endpoint client.
#[derive(Debug, Clone)]
pub struct PvLiveClient {
    client: Client,
    base_url: String,
}

impl PvLiveClient {
    /// Creates a client whose every request is bounded by `timeout`.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, FetchError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("combined-gsp/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(FetchError::ClientBuild)?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    fn url_for(&self, site: SiteId) -> String {
        format!("{}/gsp/{}", self.base_url, site)
    }
}

impl GenerationSource for PvLiveClient {
    async fn fetch_range(
        &self,
        site: SiteId,
        range: &TimeWindow,
    ) -> Result<Vec<Sample>, FetchError> {
        let url = self.url_for(site);
        let start = range.start().format("%Y-%m-%dT%H:%M:%SZ").to_string();
        let end = range.end().format("%Y-%m-%dT%H:%M:%SZ").to_string();
        debug!("Requesting {} for {}", url, range);

        let response = self
            .client
            .get(&url)
            .query(&[
                ("start", start.as_str()),
                ("end", end.as_str()),
                ("extra_fields", EXTRA_FIELDS),
                ("data_format", "json"),
            ])
            .send()
            .await
            .map_err(|e| {
                if e.is_builder() {
                    FetchError::Request(url.clone(), e)
                } else {
                    FetchError::Transient {
                        site,
                        detail: e.to_string(),
                    }
                }
            })?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(FetchError::NotFound { site });
        }
        if is_retryable_status(status) {
            warn!("HTTP {} from {}", status, url);
            return Err(FetchError::Transient {
                site,
                detail: format!("HTTP {status}"),
            });
        }
        if !status.is_success() {
            return Err(FetchError::UnexpectedStatus { url, status });
        }

        let body = response.text().await.map_err(|e| FetchError::Transient {
            site,
            detail: e.to_string(),
        })?;
        decode_payload(site, &body)
    }
}

fn is_retryable_status(status: StatusCode) -> bool {
    status == StatusCode::REQUEST_TIMEOUT
        || status == StatusCode::TOO_MANY_REQUESTS
        || status.is_server_error()
}

#[derive(Debug, Deserialize)]
struct PvLivePayload {
    data: Vec<Vec<Value>>,
    meta: Vec<String>,
}

/// Validates a PVLive JSON body into typed samples.
///
/// Rows are positional and described by `meta`. Any deviation (missing columns,
/// ragged rows, unparsable timestamps, non-numeric values) is a schema error, since
/// it means the upstream contract changed.
pub fn decode_payload(site: SiteId, body: &str) -> Result<Vec<Sample>, FetchError> {
    let schema_error = |detail: String| FetchError::Schema { site, detail };

    let payload: PvLivePayload =
        serde_json::from_str(body).map_err(|e| schema_error(e.to_string()))?;

    let position = |name: &str| payload.meta.iter().position(|column| column == name);
    let datetime_idx = position(COL_DATETIME)
        .ok_or_else(|| schema_error(format!("missing '{COL_DATETIME}' column")))?;
    let generation_idx = position(COL_GENERATION)
        .ok_or_else(|| schema_error(format!("missing '{COL_GENERATION}' column")))?;
    let capacity_idx = position(COL_CAPACITY);
    let installed_idx = position(COL_INSTALLED);

    let mut samples = Vec::with_capacity(payload.data.len());
    for (row_idx, row) in payload.data.iter().enumerate() {
        if row.len() != payload.meta.len() {
            return Err(schema_error(format!(
                "row {row_idx} has {} values, meta declares {}",
                row.len(),
                payload.meta.len()
            )));
        }
        let timestamp = row[datetime_idx]
            .as_str()
            .and_then(|raw| DateTime::parse_from_rfc3339(raw).ok())
            .map(|ts| ts.with_timezone(&Utc))
            .ok_or_else(|| {
                schema_error(format!(
                    "row {row_idx} has invalid timestamp {}",
                    row[datetime_idx]
                ))
            })?;
        let number = |idx: Option<usize>| -> Result<Option<f64>, FetchError> {
            match idx.map(|i| &row[i]) {
                None | Some(Value::Null) => Ok(None),
                Some(Value::Number(n)) => Ok(n.as_f64()),
                Some(other) => Err(schema_error(format!(
                    "row {row_idx} has non-numeric value {other}"
                ))),
            }
        };
        samples.push((
            timestamp,
            Reading {
                generation_mw: number(Some(generation_idx))?,
                capacity_mwp: number(capacity_idx)?,
                installed_capacity_mwp: number(installed_idx)?,
            },
        ));
    }
    Ok(samples)
}
