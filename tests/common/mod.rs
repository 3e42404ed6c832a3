#![allow(dead_code)]

use chrono::{DateTime, Duration, TimeZone, Utc};
use combined_gsp::{
    CollectorConfig, FetchError, GenerationSource, Reading, RetryPolicy, Sample, SiteId, TimeWindow,
};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// How the mock upstream answers for one site.
#[derive(Debug, Clone)]
pub enum Script {
    /// Serves these samples, filtered to each requested range (end inclusive, like PVLive).
    Samples(Vec<Sample>),
    NotFound,
    /// Fails transiently on every attempt.
    AlwaysTransient,
    Schema,
}

/// In-memory stand-in for PVLive with per-site scripts, artificial latency and call counters.
#[derive(Default)]
pub struct MockSource {
    scripts: HashMap<SiteId, Script>,
    delays: HashMap<SiteId, std::time::Duration>,
    calls: Mutex<HashMap<SiteId, u32>>,
}

impl MockSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, site: u32, script: Script) -> Self {
        self.scripts.insert(SiteId(site), script);
        self
    }

    pub fn with_delay(mut self, site: u32, delay_ms: u64) -> Self {
        self.delays
            .insert(SiteId(site), std::time::Duration::from_millis(delay_ms));
        self
    }

    pub fn calls(&self, site: u32) -> u32 {
        self.calls
            .lock()
            .unwrap()
            .get(&SiteId(site))
            .copied()
            .unwrap_or(0)
    }

    pub fn total_calls(&self) -> u32 {
        self.calls.lock().unwrap().values().sum()
    }
}

impl GenerationSource for MockSource {
    async fn fetch_range(
        &self,
        site: SiteId,
        range: &TimeWindow,
    ) -> Result<Vec<Sample>, FetchError> {
        *self.calls.lock().unwrap().entry(site).or_insert(0) += 1;
        if let Some(delay) = self.delays.get(&site) {
            tokio::time::sleep(*delay).await;
        }
        match self.scripts.get(&site) {
            None | Some(Script::NotFound) => Err(FetchError::NotFound { site }),
            Some(Script::AlwaysTransient) => Err(FetchError::Transient {
                site,
                detail: "HTTP 503".to_string(),
            }),
            Some(Script::Schema) => Err(FetchError::Schema {
                site,
                detail: "missing column 'generation_mw'".to_string(),
            }),
            Some(Script::Samples(samples)) => Ok(samples
                .iter()
                .filter(|(ts, _)| *ts >= range.start() && *ts <= range.end())
                .copied()
                .collect()),
        }
    }

    fn name(&self) -> &str {
        "mock"
    }
}

pub fn ts(day: u32, hour: u32, minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, day, hour, minute, 0).unwrap()
}

/// 2024-01-01 up to 2024-01-08: 336 half-hour slots.
pub fn week() -> TimeWindow {
    TimeWindow::new(ts(1, 0, 0), ts(8, 0, 0)).unwrap()
}

/// A reading on every half hour of `window`, valued `base + slot index`.
pub fn full_series(window: &TimeWindow, base: f64) -> Vec<Sample> {
    let mut samples = Vec::new();
    let mut t = window.start();
    let mut i = 0.0;
    while t < window.end() {
        samples.push((
            t,
            Reading {
                generation_mw: Some(base + i),
                capacity_mwp: Some(100.0),
                installed_capacity_mwp: Some(120.0),
            },
        ));
        t += Duration::minutes(30);
        i += 1.0;
    }
    samples
}

pub fn config(output_dir: &Path, max_site_id: i64) -> CollectorConfig {
    CollectorConfig::builder()
        .window(week())
        .output_dir(output_dir)
        .max_site_id(max_site_id)
        .workers(4)
        .retry(RetryPolicy::immediate(3))
        .generated_at(Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap())
        .build()
}

/// Relative path → contents of every file below `root`.
pub fn snapshot(root: &Path) -> BTreeMap<PathBuf, Vec<u8>> {
    let mut files = BTreeMap::new();
    let mut pending = vec![root.to_path_buf()];
    while let Some(dir) = pending.pop() {
        for entry in std::fs::read_dir(&dir).unwrap() {
            let path = entry.unwrap().path();
            if path.is_dir() {
                pending.push(path);
            } else {
                let rel = path.strip_prefix(root).unwrap().to_path_buf();
                files.insert(rel, std::fs::read(&path).unwrap());
            }
        }
    }
    files
}

/// Names of the entries directly inside `dir`, or nothing when it does not exist.
pub fn entries(dir: &Path) -> Vec<String> {
    match std::fs::read_dir(dir) {
        Ok(read) => read
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect(),
        Err(_) => Vec::new(),
    }
}
