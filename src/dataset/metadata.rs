use crate::types::skip_report::SkipReport;
use crate::types::time_window::{Granularity, TimeWindow};
use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{json, Map, Value};

/// Attributes stored on the root group of the output dataset.
#[derive(Debug, Clone, PartialEq)]
pub struct DatasetMetadata {
    pub window: TimeWindow,
    pub granularity: Granularity,
    pub generated_at: DateTime<Utc>,
    pub source: String,
    pub skip_report: SkipReport,
    pub warning_count: usize,
}

impl DatasetMetadata {
    pub fn to_attributes(&self) -> Map<String, Value> {
        let mut attributes = Map::new();
        attributes.insert("title".into(), json!("Combined PVLive GSP solar generation"));
        attributes.insert("source".into(), json!(self.source));
        attributes.insert("units".into(), json!("MW"));
        attributes.insert(
            "window_start".into(),
            json!(self.window.start().to_rfc3339_opts(SecondsFormat::Secs, true)),
        );
        attributes.insert(
            "window_end".into(),
            json!(self.window.end().to_rfc3339_opts(SecondsFormat::Secs, true)),
        );
        attributes.insert("granularity_seconds".into(), json!(self.granularity.as_secs()));
        attributes.insert(
            "generated_at".into(),
            json!(self.generated_at.to_rfc3339_opts(SecondsFormat::Secs, true)),
        );
        attributes.insert("skipped_sites".into(), self.skip_report.to_json());
        attributes.insert("alignment_warnings".into(), json!(self.warning_count));
        attributes
    }
}

/// `combined_gsp_<start-date>_<end-date>.zarr`
pub fn dataset_name(window: &TimeWindow) -> String {
    format!(
        "combined_gsp_{}_{}.zarr",
        window.start_date(),
        window.end_date()
    )
}
