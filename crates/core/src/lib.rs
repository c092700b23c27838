//! Core domain logic for SalesPulse.
//!
//! This crate holds everything that does not touch the network or the
//! database: the domain records, the time-bucketed aggregation engine,
//! the EUR-based revenue normalizer, and trial-conversion statistics.
//! The server crate wires these into HTTP handlers and sqlx repositories.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod aggregate;
pub mod granularity;
pub mod record;
pub mod revenue;
pub mod trials;
pub mod window;

pub use aggregate::{DownloadBucket, PurchaseBucket, bucket_downloads, bucket_purchases};
pub use granularity::{Granularity, GranularityError, WeekStyle};
pub use record::{Download, Purchase, User};
pub use revenue::{RateTable, round2};
pub use trials::{AppConversionStats, ConversionReport, OverallConversionStats};
pub use window::{TimeWindow, WindowError};
