//! Reporting time windows.
//!
//! Aggregation endpoints operate over a `[start, end]` window. Clients pass
//! dates either as RFC 3339 timestamps or as bare `YYYY-MM-DD` dates; a
//! date-only or defaulted window end is normalized to 23:59:59.999 of that
//! day so same-day records are not excluded.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use thiserror::Error;

/// Errors from parsing client-supplied dates.
#[derive(Debug, Error)]
pub enum WindowError {
    #[error("invalid date: {0}")]
    InvalidDate(String),
}

/// An inclusive reporting window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeWindow {
    /// Resolve a window from optional client input, falling back to the
    /// trailing `default_days` days ending today (inclusive end of day).
    pub fn resolve(
        start: Option<&str>,
        end: Option<&str>,
        default_days: i64,
    ) -> Result<Self, WindowError> {
        let now = Utc::now();
        let start = match start {
            Some(s) => parse_start(s)?,
            None => now - Duration::days(default_days),
        };
        let end = match end {
            Some(s) => parse_end(s)?,
            None => end_of_day(now),
        };
        Ok(Self { start, end })
    }

    /// Whether `t` falls inside the window (inclusive on both ends).
    #[must_use]
    pub fn contains(&self, t: DateTime<Utc>) -> bool {
        t >= self.start && t <= self.end
    }
}

/// Parse a window start. A bare date means midnight UTC.
pub fn parse_start(s: &str) -> Result<DateTime<Utc>, WindowError> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }
    parse_date(s).map(|d| {
        d.and_hms_opt(0, 0, 0)
            .unwrap_or_default()
            .and_utc()
    })
}

/// Parse a window end. A bare date is widened to 23:59:59.999 of that day;
/// a full timestamp is taken verbatim.
pub fn parse_end(s: &str) -> Result<DateTime<Utc>, WindowError> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }
    parse_date(s).map(|d| {
        d.and_hms_milli_opt(23, 59, 59, 999)
            .unwrap_or_default()
            .and_utc()
    })
}

/// 23:59:59.999 on the UTC day of `t`.
#[must_use]
pub fn end_of_day(t: DateTime<Utc>) -> DateTime<Utc> {
    t.date_naive()
        .and_hms_milli_opt(23, 59, 59, 999)
        .unwrap_or_default()
        .and_utc()
}

fn parse_date(s: &str) -> Result<NaiveDate, WindowError> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|_| WindowError::InvalidDate(s.to_string()))
}
