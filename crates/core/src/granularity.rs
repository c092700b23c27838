//! Bucket granularities and label formatting.
//!
//! Label formats are part of the public API contract and must not drift:
//!
//! - `hour`  -> `YYYY-MM-DD HH:00`
//! - `day`   -> `YYYY-MM-DD`
//! - `week`  -> ISO week, either `GGGG-WW` or `GGGG-WWW` (see [`WeekStyle`])
//! - `month` -> `YYYY-MM`
//! - `total` -> the literal label `total`
//!
//! The two week conventions are both kept deliberately: the purchase summary
//! has always emitted `2025-19` while download statistics emit `2025-W19`,
//! and existing consumers parse each form.

use chrono::{DateTime, Datelike, Utc};
use std::str::FromStr;
use thiserror::Error;

/// Time-bucket granularity for aggregation endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Granularity {
    Hour,
    Day,
    Week,
    Month,
    /// A single bucket containing every matching record.
    Total,
}

/// ISO week label convention.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WeekStyle {
    /// `2025-19` (purchase summary).
    Plain,
    /// `2025-W19` (download statistics).
    Prefixed,
}

/// Error for an unrecognized `groupBy` value.
#[derive(Debug, Error)]
#[error("unknown groupBy value: {0}")]
pub struct GranularityError(String);

impl FromStr for Granularity {
    type Err = GranularityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "hour" => Ok(Self::Hour),
            "day" => Ok(Self::Day),
            "week" => Ok(Self::Week),
            "month" => Ok(Self::Month),
            "total" => Ok(Self::Total),
            other => Err(GranularityError(other.to_string())),
        }
    }
}

impl Granularity {
    /// Bucket label for a record occurring at `at`.
    #[must_use]
    pub fn label(self, at: DateTime<Utc>, week_style: WeekStyle) -> String {
        match self {
            Self::Hour => at.format("%Y-%m-%d %H:00").to_string(),
            Self::Day => at.format("%Y-%m-%d").to_string(),
            Self::Week => {
                let iso = at.iso_week();
                match week_style {
                    WeekStyle::Plain => format!("{:04}-{:02}", iso.year(), iso.week()),
                    WeekStyle::Prefixed => format!("{:04}-W{:02}", iso.year(), iso.week()),
                }
            }
            Self::Month => at.format("%Y-%m").to_string(),
            Self::Total => "total".to_string(),
        }
    }

    /// Wire name of the granularity, as accepted in `groupBy`.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Hour => "hour",
            Self::Day => "day",
            Self::Week => "week",
            Self::Month => "month",
            Self::Total => "total",
        }
    }
}
