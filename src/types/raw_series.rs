use crate::types::site::SiteId;
use crate::types::time_window::TimeWindow;
use chrono::{DateTime, Utc};

/// One PVLive record for a settlement period.
///
/// All fields are optional because the upstream publishes `null` for periods it has
/// not yet estimated. A `None` is never turned into a zero.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Reading {
    pub generation_mw: Option<f64>,
    pub capacity_mwp: Option<f64>,
    pub installed_capacity_mwp: Option<f64>,
}

impl Reading {
    pub fn generation(generation_mw: f64) -> Self {
        Self {
            generation_mw: Some(generation_mw),
            ..Self::default()
        }
    }
}

pub type Sample = (DateTime<Utc>, Reading);

/// The merged, typed series for one site, in the order the upstream returned it.
///
/// Samples may be unordered, duplicated or gappy; alignment sorts that out.
#[derive(Debug, Clone, PartialEq)]
pub struct RawSeries {
    site: SiteId,
    samples: Vec<Sample>,
}

impl RawSeries {
    pub fn new(site: SiteId) -> Self {
        Self {
            site,
            samples: Vec::new(),
        }
    }

    pub fn with_samples(site: SiteId, samples: Vec<Sample>) -> Self {
        Self { site, samples }
    }

    pub fn site(&self) -> SiteId {
        self.site
    }

    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    pub fn into_samples(self) -> Vec<Sample> {
        self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn extend(&mut self, samples: impl IntoIterator<Item = Sample>) {
        self.samples.extend(samples);
    }

    /// Drops samples outside `window`, returning how many were removed.
    pub fn retain_within(&mut self, window: &TimeWindow) -> usize {
        let before = self.samples.len();
        self.samples.retain(|(ts, _)| window.contains(*ts));
        before - self.samples.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_retain_within_drops_inclusive_upstream_end() {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2024, 1, 1, 2, 0, 0).unwrap();
        let window = TimeWindow::new(start, end).unwrap();
        let mut series = RawSeries::with_samples(
            SiteId(4),
            vec![
                (start, Reading::generation(1.0)),
                (end, Reading::generation(2.0)),
                (start - chrono::Duration::minutes(30), Reading::generation(3.0)),
            ],
        );
        assert_eq!(series.retain_within(&window), 2);
        assert_eq!(series.samples(), &[(start, Reading::generation(1.0))]);
    }
}
