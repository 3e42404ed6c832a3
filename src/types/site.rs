//! Grid supply point identifiers and the enumerator over the configured id range.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::RangeInclusive;

/// Identifier of a grid supply point (GSP) as used by the PVLive API.
///
/// Ids are only lookup keys and coordinate values; an id being in range does not
/// guarantee the site exists upstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SiteId(pub u32);

impl SiteId {
    pub fn get(self) -> u32 {
        self.0
    }
}

impl fmt::Display for SiteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for SiteId {
    fn from(value: u32) -> Self {
        SiteId(value)
    }
}

/// The inclusive range `0..=max` of site ids to attempt.
///
/// The range is `Copy`; every call to [`SiteRange::iter`] starts again from id 0, so
/// enumeration is restartable and never touches the network.
///
/// # Examples
///
/// ```
/// use combined_gsp::{SiteId, SiteRange};
///
/// let sites = SiteRange::new(2)?;
/// let ids: Vec<SiteId> = sites.iter().collect();
/// assert_eq!(ids, vec![SiteId(0), SiteId(1), SiteId(2)]);
/// assert!(SiteRange::new(-1).is_err());
/// # Ok::<(), combined_gsp::ConfigError>(())
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SiteRange {
    max: u32,
}

impl SiteRange {
    /// Creates the range `0..=max_site_id`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidMaxSiteId`] when `max_site_id` is negative or does
    /// not fit a `u32`.
    pub fn new(max_site_id: i64) -> Result<Self, ConfigError> {
        let max =
            u32::try_from(max_site_id).map_err(|_| ConfigError::InvalidMaxSiteId(max_site_id))?;
        Ok(Self { max })
    }

    pub fn max(&self) -> SiteId {
        SiteId(self.max)
    }

    pub fn len(&self) -> usize {
        self.max as usize + 1
    }

    /// Always false, the range holds at least site 0.
    pub fn is_empty(&self) -> bool {
        false
    }

    pub fn iter(&self) -> SiteIter {
        SiteIter {
            inner: 0..=self.max,
        }
    }
}

impl IntoIterator for SiteRange {
    type Item = SiteId;
    type IntoIter = SiteIter;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Ascending iterator over a [`SiteRange`].
#[derive(Debug, Clone)]
pub struct SiteIter {
    inner: RangeInclusive<u32>,
}

impl Iterator for SiteIter {
    type Item = SiteId;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(SiteId)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl ExactSizeIterator for SiteIter {}
