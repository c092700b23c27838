//! Trial-to-paid conversion statistics.
//!
//! Unlike the USD-converted purchase reports, revenue here is the raw sum of
//! non-trial prices in their original currency units. That asymmetry is
//! long-standing and consumers depend on it, so it stays.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::record::Purchase;
use crate::revenue::round2;

/// Conversion statistics for a single app.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AppConversionStats {
    pub total_purchases: u64,
    pub trials: u64,
    pub conversions: u64,
    /// `conversions / trials * 100`, rounded to 2 decimals; 0 when there are
    /// no trials.
    pub conversion_rate: f64,
    /// Raw sum of non-trial prices in original currency units (unconverted).
    pub revenue: f64,
}

/// Conversion statistics aggregated across every app.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OverallConversionStats {
    pub total_purchases: u64,
    pub trials: u64,
    pub conversions: u64,
    pub conversion_rate: f64,
}

/// Per-app and overall conversion statistics for a purchase set.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversionReport {
    pub by_app: BTreeMap<String, AppConversionStats>,
    pub overall: OverallConversionStats,
}

/// Compute the conversion report over a filtered purchase set.
#[must_use]
pub fn conversion_report(purchases: &[Purchase]) -> ConversionReport {
    let mut by_app: BTreeMap<String, AppConversionStats> = BTreeMap::new();

    for p in purchases {
        let stats = by_app.entry(p.app_name.clone()).or_default();
        stats.total_purchases += 1;
        if p.is_trial {
            stats.trials += 1;
        } else {
            stats.conversions += 1;
            if p.price.is_finite() {
                stats.revenue += p.price;
            }
        }
    }

    for stats in by_app.values_mut() {
        stats.conversion_rate = conversion_rate(stats.conversions, stats.trials);
    }

    let trials = purchases.iter().filter(|p| p.is_trial).count() as u64;
    let conversions = purchases.len() as u64 - trials;
    let overall = OverallConversionStats {
        total_purchases: purchases.len() as u64,
        trials,
        conversions,
        conversion_rate: conversion_rate(conversions, trials),
    };

    ConversionReport { by_app, overall }
}

/// Never divides by zero: 0 trials means a rate of 0, not infinity.
fn conversion_rate(conversions: u64, trials: u64) -> f64 {
    if trials == 0 {
        return 0.0;
    }
    round2(conversions as f64 / trials as f64 * 100.0)
}
