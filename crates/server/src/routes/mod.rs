//! HTTP route definitions.
//!
//! All endpoints live under the versioned `/api/v1` prefix. Health probes
//! are mounted separately in `main`.

pub mod downloads;
pub mod purchases;
pub mod trials;
pub mod users;

use axum::{
    Router,
    routing::{get, post, put},
};

use crate::state::AppState;

/// Build the versioned API router.
pub fn routes() -> Router<AppState> {
    let v1 = Router::new()
        .route("/create-user", post(users::create_user))
        .route("/update-token", put(users::update_token))
        .route("/log-purchase", post(purchases::log_purchase))
        .route("/purchases", get(purchases::list_purchases))
        .route("/apps", get(purchases::list_apps))
        .route("/purchases/summary", get(purchases::summary))
        .route("/log-download", post(downloads::log_download))
        .route("/downloads", get(downloads::statistics))
        .route("/trials/stats", get(trials::stats));

    Router::new().nest("/api/v1", v1)
}

/// Serde default helpers shared by query-parameter structs.
pub(crate) const fn default_true() -> bool {
    true
}

pub(crate) const fn default_page() -> u32 {
    1
}

pub(crate) const fn default_limit() -> u32 {
    10
}
