//! The aggregation engine: group records into time buckets.
//!
//! Buckets are keyed by formatted label and returned in ascending label
//! order. Only labels with at least one matching record are emitted; an
//! empty input produces an empty output, never an error.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};

use crate::granularity::{Granularity, WeekStyle};
use crate::record::{Download, Purchase};

/// One purchase bucket, carrying its full member list so downstream
/// revenue conversion can run per record.
#[derive(Debug, Clone)]
pub struct PurchaseBucket {
    pub label: String,
    pub purchases: Vec<Purchase>,
    /// Raw sum of member prices in their original currencies. Informational
    /// only; currencies are mixed, so this is not a revenue figure.
    pub total_price: f64,
    pub trial_count: u64,
    pub paid_count: u64,
}

/// One download bucket.
#[derive(Debug, Clone)]
pub struct DownloadBucket {
    pub label: String,
    /// Number of distinct `userId` values in the bucket.
    pub unique_users: u64,
    pub total_downloads: u64,
    /// Member records, populated only when details were requested.
    pub details: Option<Vec<Download>>,
}

/// Group purchases by their creation time.
///
/// Week labels use the plain `GGGG-WW` convention.
#[must_use]
pub fn bucket_purchases(purchases: &[Purchase], granularity: Granularity) -> Vec<PurchaseBucket> {
    let mut grouped: BTreeMap<String, Vec<Purchase>> = BTreeMap::new();
    for p in purchases {
        grouped
            .entry(label_for(granularity, p.created_at, WeekStyle::Plain))
            .or_default()
            .push(p.clone());
    }

    grouped
        .into_iter()
        .map(|(label, members)| {
            let total_price = members.iter().map(|p| p.price).sum();
            let trial_count = members.iter().filter(|p| p.is_trial).count() as u64;
            let paid_count = members.len() as u64 - trial_count;
            PurchaseBucket {
                label,
                purchases: members,
                total_price,
                trial_count,
                paid_count,
            }
        })
        .collect()
}

/// Group downloads by their client-supplied event time.
///
/// Week labels use the prefixed `GGGG-WWW` convention.
#[must_use]
pub fn bucket_downloads(
    downloads: &[Download],
    granularity: Granularity,
    include_details: bool,
) -> Vec<DownloadBucket> {
    let mut grouped: BTreeMap<String, Vec<&Download>> = BTreeMap::new();
    for d in downloads {
        grouped
            .entry(label_for(granularity, d.timestamp, WeekStyle::Prefixed))
            .or_default()
            .push(d);
    }

    grouped
        .into_iter()
        .map(|(label, members)| {
            let unique_users: BTreeSet<&str> =
                members.iter().map(|d| d.user_id.as_str()).collect();
            DownloadBucket {
                label,
                unique_users: unique_users.len() as u64,
                total_downloads: members.len() as u64,
                details: include_details
                    .then(|| members.into_iter().cloned().collect()),
            }
        })
        .collect()
}

fn label_for(granularity: Granularity, at: DateTime<Utc>, style: WeekStyle) -> String {
    granularity.label(at, style)
}
