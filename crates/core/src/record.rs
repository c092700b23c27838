//! Domain records: users, purchases, and downloads.
//!
//! Wire casing is camelCase to match the public JSON API. Purchases are an
//! append-only log; users mutate only via push-token replacement; downloads
//! are deduplicated per `(userId, appName)` by the persistence layer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A registered user and their current push token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub user_id: String,
    pub email: String,
    /// Push-notification token. Nullable in practice: a user may have
    /// revoked notification permission since registering.
    pub user_token: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A single purchase event, immutable once recorded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Purchase {
    /// ISO 4217-like currency code, matched case-insensitively.
    pub currency_code: String,
    /// Amount in `currency_code` units.
    pub price: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price_formatted: Option<String>,
    /// SKU / product identifier.
    pub kind: String,
    pub is_sandbox: bool,
    pub app_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub store_front: Option<String>,
    #[serde(default)]
    pub is_trial: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trial_period: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A download event for an app by a user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Download {
    pub user_id: String,
    pub app_name: String,
    /// Client-supplied event time (semantic time of the download).
    pub timestamp: DateTime<Utc>,
    /// Ingestion time.
    pub created_at: DateTime<Utc>,
}
