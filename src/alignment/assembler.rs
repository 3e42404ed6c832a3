//! Projection of one site's raw series onto the canonical axis.

use crate::alignment::time_axis::CanonicalTimeAxis;
use crate::types::raw_series::{RawSeries, Reading};
use crate::types::site::SiteId;
use chrono::{DateTime, Duration, Utc};
use std::collections::BTreeMap;
use std::fmt;

/// Default distance within which an off-grid sample is snapped onto the axis.
pub const DEFAULT_SNAP_TOLERANCE_SECS: i64 = 60;

/// A data-quality issue found while aligning a site. Never fatal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AlignmentWarning {
    /// The same timestamp appeared more than once; the last value was kept.
    DuplicateTimestamp {
        site: SiteId,
        timestamp: DateTime<Utc>,
        occurrences: usize,
    },
    /// An off-grid sample was moved onto the nearest slot.
    Snapped {
        site: SiteId,
        timestamp: DateTime<Utc>,
        slot: DateTime<Utc>,
    },
    /// An off-grid sample was too far from any slot (or outside the axis).
    DroppedOffGrid {
        site: SiteId,
        timestamp: DateTime<Utc>,
    },
    /// An off-grid sample snapped onto a slot that already held a reading.
    SlotCollision {
        site: SiteId,
        timestamp: DateTime<Utc>,
        slot: DateTime<Utc>,
    },
}

impl AlignmentWarning {
    pub fn site(&self) -> SiteId {
        match self {
            AlignmentWarning::DuplicateTimestamp { site, .. }
            | AlignmentWarning::Snapped { site, .. }
            | AlignmentWarning::DroppedOffGrid { site, .. }
            | AlignmentWarning::SlotCollision { site, .. } => *site,
        }
    }
}

impl fmt::Display for AlignmentWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AlignmentWarning::DuplicateTimestamp {
                site,
                timestamp,
                occurrences,
            } => write!(
                f,
                "GSP {site}: {occurrences} readings at {timestamp}, kept the last one"
            ),
            AlignmentWarning::Snapped {
                site,
                timestamp,
                slot,
            } => write!(f, "GSP {site}: off-grid reading at {timestamp} snapped to {slot}"),
            AlignmentWarning::DroppedOffGrid { site, timestamp } => {
                write!(f, "GSP {site}: off-grid reading at {timestamp} dropped")
            }
            AlignmentWarning::SlotCollision {
                site,
                timestamp,
                slot,
            } => write!(
                f,
                "GSP {site}: off-grid reading at {timestamp} dropped, slot {slot} already filled"
            ),
        }
    }
}

/// One site's values laid out on the canonical axis. `NaN` marks a missing reading.
#[derive(Debug, Clone, PartialEq)]
pub struct SiteColumn {
    pub site: SiteId,
    pub generation: Vec<f64>,
    pub capacity: Vec<f64>,
    pub installed_capacity: Vec<f64>,
    pub warnings: Vec<AlignmentWarning>,
}

impl SiteColumn {
    fn empty(site: SiteId, len: usize) -> Self {
        Self {
            site,
            generation: vec![f64::NAN; len],
            capacity: vec![f64::NAN; len],
            installed_capacity: vec![f64::NAN; len],
            warnings: Vec::new(),
        }
    }

    fn place(&mut self, slot: usize, reading: &Reading) {
        self.generation[slot] = reading.generation_mw.unwrap_or(f64::NAN);
        self.capacity[slot] = reading.capacity_mwp.unwrap_or(f64::NAN);
        self.installed_capacity[slot] = reading.installed_capacity_mwp.unwrap_or(f64::NAN);
    }

    /// Number of slots holding a generation value.
    pub fn filled(&self) -> usize {
        self.generation.iter().filter(|v| !v.is_nan()).count()
    }
}

/// Projects `series` onto `axis`.
///
/// Exact duplicates keep the last-seen value. Samples on a slot are placed first;
/// off-grid samples are then snapped into empty slots within `tolerance`. Every
/// other slot stays `NaN`; nothing is interpolated or carried forward.
pub fn project(series: RawSeries, axis: &CanonicalTimeAxis, tolerance: Duration) -> SiteColumn {
    let site = series.site();
    let mut column = SiteColumn::empty(site, axis.len());

    let mut latest: BTreeMap<DateTime<Utc>, Reading> = BTreeMap::new();
    let mut occurrences: BTreeMap<DateTime<Utc>, usize> = BTreeMap::new();
    for (timestamp, reading) in series.into_samples() {
        *occurrences.entry(timestamp).or_insert(0) += 1;
        latest.insert(timestamp, reading);
    }
    column.warnings.extend(
        occurrences
            .into_iter()
            .filter(|(_, count)| *count > 1)
            .map(|(timestamp, count)| AlignmentWarning::DuplicateTimestamp {
                site,
                timestamp,
                occurrences: count,
            }),
    );

    let mut occupied = vec![false; axis.len()];
    let mut off_grid = Vec::new();
    for (timestamp, reading) in &latest {
        match axis.slot_of(*timestamp) {
            Some(slot) => {
                column.place(slot, reading);
                occupied[slot] = true;
            }
            None => off_grid.push((*timestamp, reading)),
        }
    }

    for (timestamp, reading) in off_grid {
        let Some(slot) = axis.nearest_slot(timestamp, tolerance) else {
            column
                .warnings
                .push(AlignmentWarning::DroppedOffGrid { site, timestamp });
            continue;
        };
        let slot_time = axis.timestamp_at(slot).unwrap_or(timestamp);
        if occupied[slot] {
            column.warnings.push(AlignmentWarning::SlotCollision {
                site,
                timestamp,
                slot: slot_time,
            });
            continue;
        }
        column.place(slot, reading);
        occupied[slot] = true;
        column.warnings.push(AlignmentWarning::Snapped {
            site,
            timestamp,
            slot: slot_time,
        });
    }

    column
}
