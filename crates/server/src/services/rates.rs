//! Currency-rate gateway client.
//!
//! The gateway serves a same-day EUR-denominated rate table keyed by the
//! current UTC date. Rates are fetched fresh once per relevant request; there
//! is no cache, no fallback provider, and no retry. A fetch failure fails the
//! whole aggregate computation upstream.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;
use thiserror::Error;

use salespulse_core::RateTable;

/// Errors that can occur when fetching exchange rates.
#[derive(Debug, Error)]
pub enum RateError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Gateway returned an error response.
    #[error("gateway error: status {0}")]
    Api(u16),

    /// Gateway response was not the expected shape.
    #[error("malformed rate table: {0}")]
    Malformed(String),
}

/// A source of same-day EUR exchange-rate tables.
///
/// Injected as a handle so reports can be tested against a fixed table
/// without any network.
#[async_trait]
pub trait RateSource: Send + Sync {
    /// Fetch today's EUR-relative rate table.
    async fn eur_rates(&self) -> Result<RateTable, RateError>;
}

/// Wire shape of the CDN response: `{ "date": ..., "eur": { code: rate } }`.
#[derive(Debug, Deserialize)]
struct EurRatesResponse {
    eur: HashMap<String, f64>,
}

/// Rate client backed by the jsDelivr currency-api CDN.
#[derive(Clone)]
pub struct CdnRateClient {
    client: reqwest::Client,
    base_url: String,
}

impl CdnRateClient {
    /// Create a client against `base_url` (the package URL without the
    /// `@<date>` version suffix).
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl RateSource for CdnRateClient {
    async fn eur_rates(&self) -> Result<RateTable, RateError> {
        let today = Utc::now().format("%Y-%m-%d");
        let url = format!("{}@{today}/v1/currencies/eur.json", self.base_url);

        let response = self.client.get(&url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(RateError::Api(status.as_u16()));
        }

        let body: EurRatesResponse = response
            .json()
            .await
            .map_err(|e| RateError::Malformed(e.to_string()))?;

        if !body.eur.contains_key("usd") {
            return Err(RateError::Malformed("missing usd entry".to_string()));
        }

        Ok(RateTable::new(body.eur))
    }
}
