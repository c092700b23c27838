//! The revenue normalizer: convert purchase prices to USD.
//!
//! Rates come from a same-day EUR-denominated table (units of a currency per
//! 1 EUR, always including a `usd` entry):
//!
//! ```text
//! amountInEUR = price / rate[currencyCode]
//! amountInUSD = amountInEUR * rate["usd"]
//! ```
//!
//! Trials contribute zero by policy. So does any record whose currency code
//! is missing from the table, whose price is not a finite number, or whose
//! rate is zero: one bad record must never abort an aggregate report.

use std::collections::HashMap;

use crate::record::Purchase;

/// A same-day exchange-rate table relative to EUR.
///
/// Keys are lowercase currency codes; lookups lowercase their input.
#[derive(Debug, Clone, Default)]
pub struct RateTable {
    rates: HashMap<String, f64>,
}

impl RateTable {
    #[must_use]
    pub fn new(rates: HashMap<String, f64>) -> Self {
        Self { rates }
    }

    /// Look up a rate, case-insensitively.
    #[must_use]
    pub fn get(&self, code: &str) -> Option<f64> {
        self.rates.get(&code.trim().to_lowercase()).copied()
    }

    /// USD value of a single purchase, or 0.0 when it cannot or must not
    /// contribute (trial, unknown currency, bad price, degenerate rate).
    #[must_use]
    pub fn usd_value(&self, purchase: &Purchase) -> f64 {
        if purchase.is_trial {
            return 0.0;
        }
        if !purchase.price.is_finite() {
            return 0.0;
        }
        let code = purchase.currency_code.trim();
        if code.is_empty() {
            return 0.0;
        }
        let (Some(rate), Some(usd_per_eur)) = (self.get(code), self.get("usd")) else {
            return 0.0;
        };
        if rate <= 0.0 || usd_per_eur <= 0.0 {
            return 0.0;
        }
        let amount_in_eur = purchase.price / rate;
        amount_in_eur * usd_per_eur
    }

    /// USD total over a set of purchases. Accumulates at full float
    /// precision; callers round at the response edge with [`round2`].
    pub fn usd_total<'a, I>(&self, purchases: I) -> f64
    where
        I: IntoIterator<Item = &'a Purchase>,
    {
        purchases.into_iter().map(|p| self.usd_value(p)).sum()
    }
}

/// Round to 2 decimal places for final response values.
#[must_use]
pub fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}
