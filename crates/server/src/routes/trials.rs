//! Trial-conversion statistics handler.

use axum::{Json, extract::Query, extract::State};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use salespulse_core::{ConversionReport, trials::conversion_report, window};

use crate::db::{PurchaseFilter, PurchaseRepository};
use crate::error::AppError;
use crate::state::AppState;

/// Query parameters for `GET /api/v1/trials/stats`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrialStatsQuery {
    pub app_name: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

/// Response for trial-conversion statistics.
///
/// Revenue here is in original currency units, deliberately unconverted
/// (see `salespulse_core::trials`).
#[derive(Debug, Serialize)]
pub struct TrialStatsResponse {
    pub success: bool,
    pub data: ConversionReport,
}

/// Per-app and overall trial-conversion statistics, optionally windowed on
/// ingestion time.
#[instrument(skip(state))]
pub async fn stats(
    State(state): State<AppState>,
    Query(query): Query<TrialStatsQuery>,
) -> Result<Json<TrialStatsResponse>, AppError> {
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
        include_sandbox: true,
        trial: None,
        since,
        until,
    };
    let purchases = PurchaseRepository::new(state.pool())
        .list(&filter, None)
        .await?;

    Ok(Json(TrialStatsResponse {
        success: true,
        data: conversion_report(&purchases),
    }))
}
