//! The requested collection window and the sampling granularity of the source.

use crate::error::ConfigError;
use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use std::fmt;

/// A half-open interval `[start, end)` of UTC time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimeWindow {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
}

impl TimeWindow {
    /// Creates a window from explicit instants.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::EmptyWindow`] if `end` is not strictly after `start`.
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self, ConfigError> {
        if end <= start {
            return Err(ConfigError::EmptyWindow {
                start: start.to_rfc3339(),
                end: end.to_rfc3339(),
            });
        }
        Ok(Self { start, end })
    }

    /// Expands whole years into `[start_year-01-01T00:00Z, end_year-01-01T00:00Z)`.
    ///
    /// # Examples
    ///
    /// ```
    /// use combined_gsp::TimeWindow;
    ///
    /// let window = TimeWindow::from_years(2023, 2024)?;
    /// assert_eq!(window.start().to_rfc3339(), "2023-01-01T00:00:00+00:00");
    /// assert_eq!(window.end().to_rfc3339(), "2024-01-01T00:00:00+00:00");
    /// assert!(TimeWindow::from_years(2024, 2024).is_err());
    /// # Ok::<(), combined_gsp::ConfigError>(())
    /// ```
    pub fn from_years(start_year: i32, end_year: i32) -> Result<Self, ConfigError> {
        Self::new(start_of_year(start_year)?, start_of_year(end_year)?)
    }

    pub fn start(&self) -> DateTime<Utc> {
        self.start
    }

    pub fn end(&self) -> DateTime<Utc> {
        self.end
    }

    pub fn start_date(&self) -> NaiveDate {
        self.start.date_naive()
    }

    pub fn end_date(&self) -> NaiveDate {
        self.end.date_naive()
    }

    pub fn duration(&self) -> Duration {
        self.end - self.start
    }

    pub fn contains(&self, timestamp: DateTime<Utc>) -> bool {
        self.start <= timestamp && timestamp < self.end
    }

    /// Splits the window into consecutive sub-windows no longer than `max_span`.
    ///
    /// The pieces tile the window exactly; the last one may be shorter.
    pub fn split(&self, max_span: Duration) -> Vec<TimeWindow> {
        if max_span <= Duration::zero() {
            return vec![*self];
        }
        let mut pieces = Vec::new();
        let mut cursor = self.start;
        while cursor < self.end {
            let next = (cursor + max_span).min(self.end);
            pieces.push(TimeWindow {
                start: cursor,
                end: next,
            });
            cursor = next;
        }
        pieces
    }
}

impl fmt::Display for TimeWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}, {})",
            self.start.format("%Y-%m-%dT%H:%M:%SZ"),
            self.end.format("%Y-%m-%dT%H:%M:%SZ")
        )
    }
}

fn start_of_year(year: i32) -> Result<DateTime<Utc>, ConfigError> {
    Utc.with_ymd_and_hms(year, 1, 1, 0, 0, 0)
        .single()
        .ok_or(ConfigError::InvalidYear(year))
}

/// Native sampling step of the upstream source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Granularity(Duration);

impl Granularity {
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidGranularity`] unless `step` is a positive whole
    /// number of seconds.
    pub fn new(step: Duration) -> Result<Self, ConfigError> {
        let whole_seconds = step.subsec_nanos() == 0;
        if step <= Duration::zero() || !whole_seconds {
            return Err(ConfigError::InvalidGranularity(step.num_seconds()));
        }
        Ok(Self(step))
    }

    pub fn from_minutes(minutes: i64) -> Result<Self, ConfigError> {
        let step =
            Duration::try_minutes(minutes).ok_or(ConfigError::InvalidGranularity(i64::MAX))?;
        Self::new(step)
    }

    /// PVLive publishes settlement-period (30 minute) values.
    pub fn half_hourly() -> Self {
        Self(Duration::minutes(30))
    }

    pub fn step(&self) -> Duration {
        self.0
    }

    pub fn as_secs(&self) -> i64 {
        self.0.num_seconds()
    }
}

impl Default for Granularity {
    fn default() -> Self {
        Self::half_hourly()
    }
}
