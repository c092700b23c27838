//! Purchase handlers: logging, listing, app discovery, and the
//! time-bucketed earnings summary.

use axum::{Json, extract::Query, extract::State};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use salespulse_core::{Granularity, Purchase, bucket_purchases, round2, window};

use crate::db::{Page, PurchaseFilter, PurchaseRepository};
use crate::error::{AppError, require};
use crate::routes::{default_limit, default_page, default_true};
use crate::services::notifier;
use crate::state::AppState;

// =============================================================================
// Log purchase
// =============================================================================

/// Request body for `POST /api/v1/log-purchase`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogPurchaseRequest {
    pub currency_code: Option<String>,
    pub price: Option<f64>,
    pub price_formatted: Option<String>,
    pub kind: Option<String>,
    pub is_sandbox: Option<bool>,
    pub app_name: Option<String>,
    pub store_front: Option<String>,
    pub is_trial: Option<bool>,
    pub trial_period: Option<String>,
}

/// Response for purchase logging.
#[derive(Debug, Serialize)]
pub struct LogPurchaseResponse {
    pub success: bool,
    pub message: String,
    pub data: Purchase,
}

/// Persist a purchase, then fan out push notifications best-effort.
#[instrument(skip(state, body))]
pub async fn log_purchase(
    State(state): State<AppState>,
    Json(body): Json<LogPurchaseRequest>,
) -> Result<Json<LogPurchaseResponse>, AppError> {
    const MISSING: &str = "Missing currencyCode, price, kind, isSandbox, or appName";
    let currency_code = require(body.currency_code, MISSING)?;
    let price = require(body.price, MISSING)?;
    let kind = require(body.kind, MISSING)?;
    let is_sandbox = require(body.is_sandbox, MISSING)?;
    let app_name = require(body.app_name, MISSING)?;

    if !price.is_finite() || price < 0.0 {
        return Err(AppError::Validation(
            "price must be a non-negative number".to_string(),
        ));
    }

    let purchase = Purchase {
        currency_code,
        price,
        price_formatted: body.price_formatted,
        kind,
        is_sandbox,
        app_name,
        store_front: body.store_front,
        is_trial: body.is_trial.unwrap_or(false),
        trial_period: body.trial_period,
        created_at: Utc::now(),
    };

    // Durability first; notification delivery is decoupled and best-effort.
    PurchaseRepository::new(state.pool())
        .create(&purchase)
        .await?;

    let message = if let Some(sender) = state.push() {
        notifier::announce_purchase(state.pool(), sender, &purchase).await;
        "Purchase logged and notifications sent"
    } else {
        "Purchase logged"
    };

    Ok(Json(LogPurchaseResponse {
        success: true,
        message: message.to_string(),
        data: purchase,
    }))
}

// =============================================================================
// List purchases
// =============================================================================

/// Query parameters for `GET /api/v1/purchases`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListPurchasesQuery {
    pub app_name: Option<String>,
    #[serde(default = "default_page")]
    pub page: u32,
    #[serde(default = "default_limit")]
    pub limit: u32,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    #[serde(default = "default_true")]
    pub include_sandbox: bool,
    #[serde(default = "default_true")]
    pub include_trials: bool,
    /// `trials-only` or `paid-only`; anything else means both.
    pub trial_status: Option<String>,
}

impl ListPurchasesQuery {
    fn trial_filter(&self) -> Option<bool> {
        if !self.include_trials {
            return Some(false);
        }
        match self.trial_status.as_deref() {
            Some("trials-only") => Some(true),
            Some("paid-only") => Some(false),
            _ => None,
        }
    }
}

/// Trial/paid breakdown of the full match set.
#[derive(Debug, Serialize)]
pub struct PurchaseStats {
    pub total: u64,
    pub trials: u64,
    pub paid: u64,
}

/// Response for the paginated purchase list.
#[derive(Debug, Serialize)]
pub struct ListPurchasesResponse {
    pub success: bool,
    pub purchases: Vec<Purchase>,
    /// USD total over the full match set, 2 decimal places.
    #[serde(rename = "totalInUSD")]
    pub total_in_usd: String,
    pub stats: PurchaseStats,
}

/// Paginated purchase list plus USD total and trial/paid counts.
#[instrument(skip(state))]
pub async fn list_purchases(
    State(state): State<AppState>,
    Query(query): Query<ListPurchasesQuery>,
) -> Result<Json<ListPurchasesResponse>, AppError> {
    let since = query
        .start_date
        .as_deref()
        .map(window::parse_start)
        .transpose()
        .map_err(|e| AppError::Validation(e.to_string()))?;
    let until = query
        .end_date
        .as_deref()
        .map(window::parse_end)
        .transpose()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    let filter = PurchaseFilter {
        app_name: query.app_name.clone(),
        include_sandbox: query.include_sandbox,
        trial: query.trial_filter(),
        since,
        until,
    };

    let page = query.page.max(1);
    let limit = i64::from(query.limit);
    let offset = i64::from(page - 1) * limit;

    let repo = PurchaseRepository::new(state.pool());
    let paginated = repo.list(&filter, Some(Page { limit, offset })).await?;
    let all = repo.list(&filter, None).await?;

    // Fresh same-day table; a gateway failure fails the whole report.
    let rates = state.rates().eur_rates().await?;
    let total_usd = rates.usd_total(&all);

    let trials = all.iter().filter(|p| p.is_trial).count() as u64;
    let stats = PurchaseStats {
        total: all.len() as u64,
        trials,
        paid: all.len() as u64 - trials,
    };

    Ok(Json(ListPurchasesResponse {
        success: true,
        purchases: paginated,
        total_in_usd: format!("{:.2}", round2(total_usd)),
        stats,
    }))
}

// =============================================================================
// Distinct apps
// =============================================================================

/// Response for the distinct app-name list.
#[derive(Debug, Serialize)]
pub struct AppsResponse {
    pub success: bool,
    pub apps: Vec<String>,
}

/// Distinct app names seen in the purchase log.
#[instrument(skip(state))]
pub async fn list_apps(State(state): State<AppState>) -> Result<Json<AppsResponse>, AppError> {
    let apps = PurchaseRepository::new(state.pool()).distinct_apps().await?;
    Ok(Json(AppsResponse {
        success: true,
        apps,
    }))
}

// =============================================================================
// Earnings summary
// =============================================================================

/// Query parameters for `GET /api/v1/purchases/summary`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryQuery {
    pub app_name: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    #[serde(default = "default_true")]
    pub include_sandbox: bool,
    /// Bucket granularity; defaults to `day`.
    pub group_by: Option<String>,
}

/// One bucket of the earnings summary.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryBucket {
    /// Bucket label (e.g. `2025-05-04`, `2025-19`, `total`).
    pub group: String,
    #[serde(rename = "totalInUSD")]
    pub total_in_usd: f64,
    pub count: u64,
    pub trial_count: u64,
    pub paid_count: u64,
}

/// Response for the earnings summary.
#[derive(Debug, Serialize)]
pub struct SummaryResponse {
    pub success: bool,
    pub grouped: Vec<SummaryBucket>,
}

/// Time-bucketed earnings, USD-converted per bucket. Defaults to the
/// trailing 7 days grouped by day.
#[instrument(skip(state))]
pub async fn summary(
    State(state): State<AppState>,
    Query(query): Query<SummaryQuery>,
) -> Result<Json<SummaryResponse>, AppError> {
    let granularity: Granularity = query
        .group_by
        .as_deref()
        .unwrap_or("day")
        .parse()
        .map_err(|e: salespulse_core::GranularityError| AppError::Validation(e.to_string()))?;

    let window = salespulse_core::TimeWindow::resolve(
        query.start_date.as_deref(),
        query.end_date.as_deref(),
        7,
    )
    .map_err(|e| AppError::Validation(e.to_string()))?;

    let filter = PurchaseFilter {
        app_name: query.app_name.clone(),
        include_sandbox: query.include_sandbox,
        trial: None,
        since: Some(window.start),
        until: Some(window.end),
    };
    let matching = PurchaseRepository::new(state.pool())
        .list(&filter, None)
        .await?;

    let buckets = bucket_purchases(&matching, granularity);
    let rates = state.rates().eur_rates().await?;

    let grouped = buckets
        .into_iter()
        .map(|b| SummaryBucket {
            group: b.label,
            total_in_usd: round2(rates.usd_total(&b.purchases)),
            count: b.purchases.len() as u64,
            trial_count: b.trial_count,
            paid_count: b.paid_count,
        })
        .collect();

    Ok(Json(SummaryResponse {
        success: true,
        grouped,
    }))
}
