use crate::alignment::assembler::SiteColumn;
use crate::alignment::time_axis::CanonicalTimeAxis;
use crate::types::site::SiteId;
use std::collections::BTreeMap;
use std::fmt;

/// The data variables materialized per (time, site) cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Variable {
    Generation,
    Capacity,
    InstalledCapacity,
}

impl Variable {
    pub const ALL: [Variable; 3] = [
        Variable::Generation,
        Variable::Capacity,
        Variable::InstalledCapacity,
    ];

    /// Array name in the output store.
    pub fn name(&self) -> &'static str {
        match self {
            Variable::Generation => "generation",
            Variable::Capacity => "capacity_mwp",
            Variable::InstalledCapacity => "installedcapacity_mwp",
        }
    }

    pub fn units(&self) -> &'static str {
        match self {
            Variable::Generation => "MW",
            Variable::Capacity | Variable::InstalledCapacity => "MWp",
        }
    }

    pub fn long_name(&self) -> &'static str {
        match self {
            Variable::Generation => "PVLive estimated solar generation",
            Variable::Capacity => "PV capacity used for the estimate",
            Variable::InstalledCapacity => "Installed PV capacity",
        }
    }
}

impl fmt::Display for Variable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Collects site columns as fetches complete, keyed by site so arrival order
/// never leaks into the output.
#[derive(Debug)]
pub struct CombinedArrayBuilder {
    axis: CanonicalTimeAxis,
    columns: BTreeMap<SiteId, SiteColumn>,
}

impl CombinedArrayBuilder {
    pub fn new(axis: CanonicalTimeAxis) -> Self {
        Self {
            axis,
            columns: BTreeMap::new(),
        }
    }

    pub fn axis(&self) -> &CanonicalTimeAxis {
        &self.axis
    }

    /// Adds a column; a later column for the same site replaces the earlier one.
    pub fn insert(&mut self, column: SiteColumn) {
        debug_assert_eq!(column.generation.len(), self.axis.len());
        self.columns.insert(column.site, column);
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Lays the columns out row-major `(time, site)` in ascending site order.
    pub fn finish(self) -> CombinedArray {
        let n_times = self.axis.len();
        let n_sites = self.columns.len();
        let mut generation = vec![f64::NAN; n_times * n_sites];
        let mut capacity = vec![f64::NAN; n_times * n_sites];
        let mut installed_capacity = vec![f64::NAN; n_times * n_sites];
        let mut sites = Vec::with_capacity(n_sites);

        for (col_idx, (site, column)) in self.columns.into_iter().enumerate() {
            sites.push(site);
            for t in 0..n_times {
                let cell = t * n_sites + col_idx;
                generation[cell] = column.generation[t];
                capacity[cell] = column.capacity[t];
                installed_capacity[cell] = column.installed_capacity[t];
            }
        }

        CombinedArray {
            axis: self.axis,
            sites,
            generation,
            capacity,
            installed_capacity,
        }
    }
}

/// The finalized (time × site) dataset, ready to be written.
#[derive(Debug, Clone)]
pub struct CombinedArray {
    axis: CanonicalTimeAxis,
    sites: Vec<SiteId>,
    generation: Vec<f64>,
    capacity: Vec<f64>,
    installed_capacity: Vec<f64>,
}

impl CombinedArray {
    pub fn axis(&self) -> &CanonicalTimeAxis {
        &self.axis
    }

    pub fn sites(&self) -> &[SiteId] {
        &self.sites
    }

    pub fn n_times(&self) -> usize {
        self.axis.len()
    }

    pub fn n_sites(&self) -> usize {
        self.sites.len()
    }

    pub fn shape(&self) -> (usize, usize) {
        (self.n_times(), self.n_sites())
    }

    /// Row-major `(time, site)` values of `variable`.
    pub fn values(&self, variable: Variable) -> &[f64] {
        match variable {
            Variable::Generation => &self.generation,
            Variable::Capacity => &self.capacity,
            Variable::InstalledCapacity => &self.installed_capacity,
        }
    }

    pub fn get(&self, variable: Variable, time: usize, site: SiteId) -> Option<f64> {
        let col = self.sites.binary_search(&site).ok()?;
        (time < self.n_times()).then(|| self.values(variable)[time * self.n_sites() + col])
    }

    /// One site's generation values down the time axis.
    #[cfg(test)]
    pub(crate) fn generation_column(&self, site: SiteId) -> Option<Vec<f64>> {
        let col = self.sites.binary_search(&site).ok()?;
        Some(
            (0..self.n_times())
                .map(|t| self.generation[t * self.n_sites() + col])
                .collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alignment::assembler::project;
    use crate::types::raw_series::{RawSeries, Reading};
    use crate::types::time_window::{Granularity, TimeWindow};
    use chrono::{Duration, TimeZone, Utc};

    fn axis() -> CanonicalTimeAxis {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let window = TimeWindow::new(start, start + Duration::hours(1)).unwrap();
        CanonicalTimeAxis::new(&window, Granularity::half_hourly())
    }

    fn column(site: u32, value: f64) -> SiteColumn {
        let axis = axis();
        let series =
            RawSeries::with_samples(SiteId(site), vec![(axis.start(), Reading::generation(value))]);
        project(series, &axis, Duration::seconds(60))
    }

    #[test]
    fn test_columns_ordered_by_site_not_arrival() {
        let mut builder = CombinedArrayBuilder::new(axis());
        builder.insert(column(9, 9.0));
        builder.insert(column(2, 2.0));
        builder.insert(column(5, 5.0));
        let array = builder.finish();

        assert_eq!(array.sites(), &[SiteId(2), SiteId(5), SiteId(9)]);
        assert_eq!(array.shape(), (2, 3));
        assert_eq!(&array.values(Variable::Generation)[..3], &[2.0, 5.0, 9.0]);
        assert!(array.values(Variable::Generation)[3..].iter().all(|v| v.is_nan()));
        assert_eq!(array.get(Variable::Generation, 0, SiteId(5)), Some(5.0));
        assert_eq!(array.get(Variable::Generation, 0, SiteId(6)), None);
        assert_eq!(array.get(Variable::Generation, 2, SiteId(5)), None);
    }

    #[test]
    fn test_generation_column_round_trips() {
        let mut builder = CombinedArrayBuilder::new(axis());
        builder.insert(column(1, 3.5));
        let array = builder.finish();
        let values = array.generation_column(SiteId(1)).unwrap();
        assert_eq!(values[0], 3.5);
        assert!(values[1].is_nan());
    }
}
