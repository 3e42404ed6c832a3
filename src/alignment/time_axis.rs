//! The canonical, data-independent time axis shared by every site column.

use crate::types::time_window::{Granularity, TimeWindow};
use chrono::{DateTime, Duration, Utc};

/// Every `start + k * step` strictly before the window end.
///
/// The axis depends only on the window and granularity, never on which sites
/// returned data, so reruns always produce the same shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanonicalTimeAxis {
    start: DateTime<Utc>,
    step_secs: i64,
    len: usize,
}

impl CanonicalTimeAxis {
    pub fn new(window: &TimeWindow, granularity: Granularity) -> Self {
        let step_secs = granularity.as_secs();
        let span_ms = window.duration().num_milliseconds();
        let step_ms = step_secs * 1000;
        // Ceiling division: a trailing partial step still starts inside the window.
        let len = (span_ms + step_ms - 1) / step_ms;
        Self {
            start: window.start(),
            step_secs,
            len: len as usize,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn start(&self) -> DateTime<Utc> {
        self.start
    }

    pub fn step(&self) -> Duration {
        Duration::seconds(self.step_secs)
    }

    pub fn timestamp_at(&self, slot: usize) -> Option<DateTime<Utc>> {
        (slot < self.len).then(|| self.start + Duration::seconds(self.step_secs * slot as i64))
    }

    pub fn iter(&self) -> impl Iterator<Item = DateTime<Utc>> + '_ {
        (0..self.len).filter_map(|slot| self.timestamp_at(slot))
    }

    /// Axis values as whole seconds since the Unix epoch.
    pub fn unix_seconds(&self) -> Vec<i64> {
        let origin = self.start.timestamp();
        (0..self.len as i64)
            .map(|slot| origin + slot * self.step_secs)
            .collect()
    }

    /// The slot `timestamp` falls on exactly, if any.
    pub fn slot_of(&self, timestamp: DateTime<Utc>) -> Option<usize> {
        let offset_ms = (timestamp - self.start).num_milliseconds();
        let step_ms = self.step_secs * 1000;
        let exact = (timestamp - self.start).subsec_nanos() == 0;
        if offset_ms < 0 || !exact || offset_ms % step_ms != 0 {
            return None;
        }
        let slot = (offset_ms / step_ms) as usize;
        (slot < self.len).then_some(slot)
    }

    /// The nearest slot to `timestamp`, provided it lies within `tolerance`.
    pub fn nearest_slot(&self, timestamp: DateTime<Utc>, tolerance: Duration) -> Option<usize> {
        let offset_ms = (timestamp - self.start).num_milliseconds();
        let step_ms = self.step_secs * 1000;
        let slot = (offset_ms + step_ms / 2).div_euclid(step_ms);
        if slot < 0 || slot as usize >= self.len {
            return None;
        }
        let distance_ms = (offset_ms - slot * step_ms).abs();
        (distance_ms <= tolerance.num_milliseconds()).then_some(slot as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn week() -> TimeWindow {
        TimeWindow::new(
            Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2024, 1, 8, 0, 0, 0).unwrap(),
        )
        .unwrap()
    }

    #[test]
    fn test_axis_length_matches_step_count() {
        let axis = CanonicalTimeAxis::new(&week(), Granularity::half_hourly());
        assert_eq!(axis.len(), 7 * 48);

        let hourly = Granularity::from_minutes(60).unwrap();
        let year = TimeWindow::from_years(2024, 2025).unwrap();
        assert_eq!(CanonicalTimeAxis::new(&year, hourly).len(), 366 * 24);
    }

    #[test]
    fn test_partial_trailing_step_gets_a_slot() {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let window = TimeWindow::new(start, start + Duration::minutes(45)).unwrap();
        let axis = CanonicalTimeAxis::new(&window, Granularity::half_hourly());
        assert_eq!(axis.len(), 2);
        assert!(axis.iter().all(|ts| window.contains(ts)));
    }

    #[test]
    fn test_axis_is_strictly_increasing_and_evenly_spaced() {
        let axis = CanonicalTimeAxis::new(&week(), Granularity::half_hourly());
        let stamps: Vec<DateTime<Utc>> = axis.iter().collect();
        assert_eq!(stamps.len(), axis.len());
        assert!(stamps
            .windows(2)
            .all(|pair| pair[1] - pair[0] == Duration::minutes(30)));
        assert_eq!(axis.unix_seconds()[1] - axis.unix_seconds()[0], 1800);
    }

    #[test]
    fn test_slot_lookup() {
        let axis = CanonicalTimeAxis::new(&week(), Granularity::half_hourly());
        let start = axis.start();
        assert_eq!(axis.slot_of(start), Some(0));
        assert_eq!(axis.slot_of(start + Duration::minutes(90)), Some(3));
        assert_eq!(axis.slot_of(start + Duration::minutes(91)), None);
        assert_eq!(axis.slot_of(start - Duration::minutes(30)), None);
        assert_eq!(axis.slot_of(start + Duration::days(7)), None);
    }

    #[test]
    fn test_nearest_slot_respects_tolerance() {
        let axis = CanonicalTimeAxis::new(&week(), Granularity::half_hourly());
        let start = axis.start();
        let tolerance = Duration::seconds(60);
        assert_eq!(
            axis.nearest_slot(start + Duration::seconds(1830), tolerance),
            Some(1)
        );
        assert_eq!(
            axis.nearest_slot(start + Duration::seconds(1770), tolerance),
            Some(1)
        );
        assert_eq!(axis.nearest_slot(start + Duration::seconds(1700), tolerance), None);
        assert_eq!(axis.nearest_slot(start - Duration::seconds(30), tolerance), Some(0));
        assert_eq!(axis.nearest_slot(start - Duration::seconds(1000), tolerance), None);
    }
}
