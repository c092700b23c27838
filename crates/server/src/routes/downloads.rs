//! Download handlers: idempotent logging and bucketed statistics.

use axum::{Json, extract::Query, extract::State};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use salespulse_core::{Download, Granularity, TimeWindow, bucket_downloads};

use crate::db::{DownloadFilter, DownloadRepository, LogOutcome};
use crate::error::{AppError, require};
use crate::state::AppState;

// =============================================================================
// Log download
// =============================================================================

/// Request body for `POST /api/v1/log-download`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogDownloadRequest {
    pub user_id: Option<String>,
    pub app_name: Option<String>,
    /// Semantic event time; defaults to ingestion time when omitted.
    pub timestamp: Option<DateTime<Utc>>,
}

/// Data echoed back for a fresh download record.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoggedDownload {
    pub user_id: String,
    pub app_name: String,
    pub timestamp: DateTime<Utc>,
}

/// Response for download logging. A duplicate is a success without `data`.
#[derive(Debug, Serialize)]
pub struct LogDownloadResponse {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<LoggedDownload>,
}

/// Log a download, treating a duplicate `(userId, appName)` pair as a
/// successful no-op.
#[instrument(skip(state, body))]
pub async fn log_download(
    State(state): State<AppState>,
    Json(body): Json<LogDownloadRequest>,
) -> Result<Json<LogDownloadResponse>, AppError> {
    const MISSING: &str = "Missing userId or appName";
    let user_id = require(body.user_id, MISSING)?;
    let app_name = require(body.app_name, MISSING)?;

    let now = Utc::now();
    let download = Download {
        user_id,
        app_name,
        timestamp: body.timestamp.unwrap_or(now),
        created_at: now,
    };

    let outcome = DownloadRepository::new(state.pool())
        .insert_or_confirm(&download)
        .await?;

    let response = match outcome {
        LogOutcome::Inserted(d) => LogDownloadResponse {
            success: true,
            message: "Download logged successfully".to_string(),
            data: Some(LoggedDownload {
                user_id: d.user_id,
                app_name: d.app_name,
                timestamp: d.timestamp,
            }),
        },
        LogOutcome::AlreadyExists => LogDownloadResponse {
            success: true,
            message: "Download already logged for this user and app".to_string(),
            data: None,
        },
    };

    Ok(Json(response))
}

// =============================================================================
// Download statistics
// =============================================================================

/// Query parameters for `GET /api/v1/downloads`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadStatsQuery {
    pub app_name: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    /// Bucket granularity; defaults to `day`.
    pub group_by: Option<String>,
    #[serde(default)]
    pub include_details: bool,
}

/// One download bucket on the wire.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadPeriod {
    /// Bucket label (e.g. `2025-05-04`, `2025-W18`, `total`).
    pub period: String,
    pub unique_users: u64,
    pub total_downloads: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Vec<DownloadDetail>>,
}

/// Per-record detail, included only on request.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadDetail {
    pub user_id: String,
    pub timestamp: DateTime<Utc>,
    pub app_name: String,
}

/// Payload of the download-statistics response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadStatsData {
    pub downloads: Vec<DownloadPeriod>,
    /// Distinct users across the whole window, not per bucket.
    pub total_unique_users: u64,
    pub period_type: String,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
}

/// Response for download statistics.
#[derive(Debug, Serialize)]
pub struct DownloadStatsResponse {
    pub success: bool,
    pub data: DownloadStatsData,
}

/// Time-bucketed download counts and distinct-user counts. Defaults to the
/// trailing 30 days grouped by day.
#[instrument(skip(state))]
pub async fn statistics(
    State(state): State<AppState>,
    Query(query): Query<DownloadStatsQuery>,
) -> Result<Json<DownloadStatsResponse>, AppError> {
    let granularity: Granularity = query
        .group_by
        .as_deref()
        .unwrap_or("day")
        .parse()
        .map_err(|e: salespulse_core::GranularityError| AppError::Validation(e.to_string()))?;

    let window = TimeWindow::resolve(query.start_date.as_deref(), query.end_date.as_deref(), 30)
        .map_err(|e| AppError::Validation(e.to_string()))?;

    let filter = DownloadFilter {
        app_name: query.app_name.clone(),
        window,
    };
    let repo = DownloadRepository::new(state.pool());
    let matching = repo.list(&filter).await?;
    let total_unique_users = repo.distinct_user_count(&filter).await?;

    let downloads = bucket_downloads(&matching, granularity, query.include_details)
        .into_iter()
        .map(|b| DownloadPeriod {
            period: b.label,
            unique_users: b.unique_users,
            total_downloads: b.total_downloads,
            details: b.details.map(|members| {
                members
                    .into_iter()
                    .map(|d| DownloadDetail {
                        user_id: d.user_id,
                        timestamp: d.timestamp,
                        app_name: d.app_name,
                    })
                    .collect()
            }),
        })
        .collect();

    Ok(Json(DownloadStatsResponse {
        success: true,
        data: DownloadStatsData {
            downloads,
            total_unique_users,
            period_type: granularity.as_str().to_string(),
            start_date: window.start,
            end_date: window.end,
        },
    }))
}
