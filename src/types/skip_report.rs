//! Record of the sites that were enumerated but left out of the dataset.

use crate::types::site::SiteId;
use serde_json::{Map, Value};
use std::collections::btree_map;
use std::collections::BTreeMap;
use std::fmt;

/// Why a site has no column in the output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// The upstream reported the site id does not exist.
    NotFound,
    /// The site exists but returned no readings for the window.
    NoData,
    /// Every retry attempt hit a transient failure.
    TransientError { attempts: u32, detail: String },
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::NotFound => write!(f, "not found"),
            SkipReason::NoData => write!(f, "no data"),
            SkipReason::TransientError { attempts, detail } => {
                write!(f, "transient error ({detail}) after {attempts} attempts")
            }
        }
    }
}

/// Skipped sites keyed (and therefore ordered) by id.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SkipReport {
    entries: BTreeMap<SiteId, SkipReason>,
}

impl SkipReport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a skip; a second record for the same site replaces the first.
    pub fn record(&mut self, site: SiteId, reason: SkipReason) {
        self.entries.insert(site, reason);
    }

    pub fn get(&self, site: SiteId) -> Option<&SkipReason> {
        self.entries.get(&site)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> btree_map::Iter<'_, SiteId, SkipReason> {
        self.entries.iter()
    }

    /// Renders the report as a JSON object of `"<site id>": "<reason>"`.
    pub fn to_json(&self) -> Value {
        let map: Map<String, Value> = self
            .entries
            .iter()
            .map(|(site, reason)| (site.to_string(), Value::String(reason.to_string())))
            .collect();
        Value::Object(map)
    }
}

impl<'a> IntoIterator for &'a SkipReport {
    type Item = (&'a SiteId, &'a SkipReason);
    type IntoIter = btree_map::Iter<'a, SiteId, SkipReason>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
