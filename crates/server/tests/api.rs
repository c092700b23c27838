//! API-level tests: the full router against an in-memory store and fake
//! gateways.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use chrono::{DateTime, Duration, TimeZone, Utc};
use serde_json::{Value, json};
use sqlx::SqlitePool;
use sqlx::sqlite::SqlitePoolOptions;
use tower::ServiceExt;

use salespulse_core::{Purchase, RateTable};
use salespulse_server::db::{self, PurchaseRepository};
use salespulse_server::services::push::{PushError, PushMessage, PushSender};
use salespulse_server::services::rates::{RateError, RateSource};
use salespulse_server::routes;
use salespulse_server::state::AppState;

// =============================================================================
// Fakes and fixtures
// =============================================================================

/// Rate source serving a fixed table: 1 EUR = 1.1 USD = 0.85 GBP.
struct FixedRates(RateTable);

impl FixedRates {
    fn standard() -> Self {
        Self(RateTable::new(HashMap::from([
            ("usd".to_string(), 1.1),
            ("eur".to_string(), 1.0),
            ("gbp".to_string(), 0.85),
        ])))
    }
}

#[async_trait]
impl RateSource for FixedRates {
    async fn eur_rates(&self) -> Result<RateTable, RateError> {
        Ok(self.0.clone())
    }
}

/// Rate source that always fails, as an unreachable gateway would.
struct FailingRates;

#[async_trait]
impl RateSource for FailingRates {
    async fn eur_rates(&self) -> Result<RateTable, RateError> {
        Err(RateError::Api(503))
    }
}

/// Push sink that records deliveries and rejects designated tokens.
#[derive(Default)]
struct RecordingPush {
    sent: Mutex<Vec<PushMessage>>,
    fail_token: Option<String>,
}

#[async_trait]
impl PushSender for RecordingPush {
    async fn send(&self, message: &PushMessage) -> Result<(), PushError> {
        if self.fail_token.as_deref() == Some(message.token.as_str()) {
            return Err(PushError::Api {
                status: 410,
                message: "token gone".to_string(),
            });
        }
        self.sent.lock().expect("lock").push(message.clone());
        Ok(())
    }
}

async fn test_pool() -> SqlitePool {
    // Single connection so the in-memory database is shared
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("connect in-memory sqlite");
    db::run_migrations(&pool).await.expect("run migrations");
    pool
}

async fn test_app_with(
    rates: Arc<dyn RateSource>,
    push: Option<Arc<dyn PushSender>>,
) -> (Router, SqlitePool) {
    let pool = test_pool().await;
    let state = AppState::new(pool.clone(), rates, push);
    (routes::routes().with_state(state), pool)
}

async fn test_app() -> (Router, SqlitePool) {
    test_app_with(Arc::new(FixedRates::standard()), None).await
}

async fn send_json(
    app: &Router,
    method: &str,
    uri: &str,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let request = match body {
        Some(body) => Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string())),
        None => Request::builder().method(method).uri(uri).body(Body::empty()),
    }
    .expect("build request");

    let response = app.clone().oneshot(request).await.expect("send request");
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("read body");
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).expect("parse body")
    };
    (status, value)
}

fn purchase(app_name: &str, code: &str, price: f64, is_trial: bool) -> Purchase {
    Purchase {
        currency_code: code.to_string(),
        price,
        price_formatted: None,
        kind: "pro.monthly".to_string(),
        is_sandbox: false,
        app_name: app_name.to_string(),
        store_front: None,
        is_trial,
        trial_period: None,
        created_at: Utc::now(),
    }
}

// =============================================================================
// Users
// =============================================================================

#[tokio::test]
async fn create_user_requires_fields() {
    let (app, _pool) = test_app().await;

    let (status, body) = send_json(
        &app,
        "POST",
        "/api/v1/create-user",
        Some(json!({"userId": "u1"})),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
    assert!(body["message"].as_str().expect("message").contains("Missing"));
}

#[tokio::test]
async fn create_user_then_duplicate_conflicts() {
    let (app, _pool) = test_app().await;
    let user = json!({"userId": "u1", "email": "u1@example.com", "userToken": "tok-1"});

    let (status, body) = send_json(&app, "POST", "/api/v1/create-user", Some(user.clone())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["userId"], "u1");

    let (status, body) = send_json(&app, "POST", "/api/v1/create-user", Some(user)).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn update_token_replaces_push_target() {
    let push = Arc::new(RecordingPush::default());
    let (app, _pool) = test_app_with(
        Arc::new(FixedRates::standard()),
        Some(push.clone() as Arc<dyn PushSender>),
    )
    .await;

    let user = json!({"userId": "u1", "email": "u1@example.com", "userToken": "tok-old"});
    send_json(&app, "POST", "/api/v1/create-user", Some(user)).await;

    let (status, body) = send_json(
        &app,
        "PUT",
        "/api/v1/update-token",
        Some(json!({"userId": "u1", "userToken": "tok-new"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);

    let buy = json!({
        "currencyCode": "USD", "price": 4.99, "kind": "pro.monthly",
        "isSandbox": false, "appName": "Widgets"
    });
    let (status, _) = send_json(&app, "POST", "/api/v1/log-purchase", Some(buy)).await;
    assert_eq!(status, StatusCode::OK);

    let sent = push.sent.lock().expect("lock");
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].token, "tok-new");
}

// =============================================================================
// Purchases
// =============================================================================

#[tokio::test]
async fn log_purchase_validates_required_fields() {
    let (app, _pool) = test_app().await;
    let (status, body) = send_json(
        &app,
        "POST",
        "/api/v1/log-purchase",
        Some(json!({"appName": "Widgets"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn gbp_purchase_converts_through_eur() {
    let (app, _pool) = test_app().await;
    let buy = json!({
        "currencyCode": "GBP", "price": 100.0, "kind": "pro.yearly",
        "isSandbox": false, "appName": "Widgets"
    });
    let (status, body) = send_json(&app, "POST", "/api/v1/log-purchase", Some(buy)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["currencyCode"], "GBP");

    // 100 / 0.85 * 1.1 = 129.41
    let (status, body) = send_json(&app, "GET", "/api/v1/purchases", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["totalInUSD"], "129.41");
    assert_eq!(body["stats"]["total"], 1);
    assert_eq!(body["stats"]["paid"], 1);
}

#[tokio::test]
async fn trials_are_excluded_from_usd_total() {
    let (app, pool) = test_app().await;
    let repo = PurchaseRepository::new(&pool);
    repo.create(&purchase("Widgets", "GBP", 100.0, false))
        .await
        .expect("seed paid");
    let mut trial = purchase("Widgets", "GBP", 100.0, true);
    trial.trial_period = Some("P1W".to_string());
    repo.create(&trial).await.expect("seed trial");

    let (_, body) = send_json(&app, "GET", "/api/v1/purchases", None).await;
    assert_eq!(body["totalInUSD"], "129.41");
    assert_eq!(body["stats"]["total"], 2);
    assert_eq!(body["stats"]["trials"], 1);
    assert_eq!(body["stats"]["paid"], 1);
}

#[tokio::test]
async fn unknown_currency_contributes_zero_not_an_error() {
    let (app, pool) = test_app().await;
    let repo = PurchaseRepository::new(&pool);
    repo.create(&purchase("Widgets", "ZZZ", 100.0, false))
        .await
        .expect("seed unknown currency");
    repo.create(&purchase("Widgets", "EUR", 10.0, false))
        .await
        .expect("seed eur");

    let (status, body) = send_json(&app, "GET", "/api/v1/purchases", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["totalInUSD"], "11.00");
}

#[tokio::test]
async fn pagination_returns_remainder_on_last_page() {
    let (app, pool) = test_app().await;
    let repo = PurchaseRepository::new(&pool);
    let base = Utc::now();
    for i in 0..15 {
        let mut p = purchase("Widgets", "EUR", 1.0, false);
        p.kind = format!("sku-{i:02}");
        p.created_at = base - Duration::minutes(i64::from(i));
        repo.create(&p).await.expect("seed purchase");
    }

    let (status, body) =
        send_json(&app, "GET", "/api/v1/purchases?page=2&limit=10", None).await;
    assert_eq!(status, StatusCode::OK);

    let purchases = body["purchases"].as_array().expect("purchases array");
    assert_eq!(purchases.len(), 5);
    // Descending by creation time: page 2 starts at the 11th newest
    assert_eq!(purchases[0]["kind"], "sku-10");
    assert_eq!(purchases[4]["kind"], "sku-14");
    assert_eq!(body["stats"]["total"], 15);
}

#[tokio::test]
async fn trial_status_filters_the_list() {
    let (app, pool) = test_app().await;
    let repo = PurchaseRepository::new(&pool);
    repo.create(&purchase("Widgets", "EUR", 10.0, false))
        .await
        .expect("seed paid");
    repo.create(&purchase("Widgets", "EUR", 0.0, true))
        .await
        .expect("seed trial");

    let (_, body) = send_json(
        &app,
        "GET",
        "/api/v1/purchases?trialStatus=trials-only",
        None,
    )
    .await;
    let purchases = body["purchases"].as_array().expect("purchases array");
    assert_eq!(purchases.len(), 1);
    assert_eq!(purchases[0]["isTrial"], true);
}

#[tokio::test]
async fn sandbox_purchases_can_be_excluded() {
    let (app, pool) = test_app().await;
    let repo = PurchaseRepository::new(&pool);
    repo.create(&purchase("Widgets", "EUR", 10.0, false))
        .await
        .expect("seed real");
    let mut sandbox = purchase("Widgets", "EUR", 50.0, false);
    sandbox.is_sandbox = true;
    repo.create(&sandbox).await.expect("seed sandbox");

    // Default keeps sandbox records in
    let (_, body) = send_json(&app, "GET", "/api/v1/purchases", None).await;
    assert_eq!(body["stats"]["total"], 2);
    assert_eq!(body["totalInUSD"], "66.00");

    let (status, body) =
        send_json(&app, "GET", "/api/v1/purchases?includeSandbox=false", None).await;
    assert_eq!(status, StatusCode::OK);
    let purchases = body["purchases"].as_array().expect("purchases array");
    assert_eq!(purchases.len(), 1);
    assert_eq!(purchases[0]["isSandbox"], false);
    assert_eq!(body["totalInUSD"], "11.00");
    assert_eq!(body["stats"]["total"], 1);

    // The summary honors the same flag
    let (_, body) = send_json(
        &app,
        "GET",
        "/api/v1/purchases/summary?includeSandbox=false&groupBy=total",
        None,
    )
    .await;
    assert_eq!(body["grouped"][0]["count"], 1);
    assert_eq!(body["grouped"][0]["totalInUSD"], 11.0);
}

#[tokio::test]
async fn paid_only_views_exclude_trials() {
    let (app, pool) = test_app().await;
    let repo = PurchaseRepository::new(&pool);
    repo.create(&purchase("Widgets", "EUR", 10.0, false))
        .await
        .expect("seed paid");
    repo.create(&purchase("Widgets", "EUR", 0.0, true))
        .await
        .expect("seed trial");

    // Both spellings of "no trials" behave identically
    for uri in [
        "/api/v1/purchases?includeTrials=false",
        "/api/v1/purchases?trialStatus=paid-only",
    ] {
        let (status, body) = send_json(&app, "GET", uri, None).await;
        assert_eq!(status, StatusCode::OK);
        let purchases = body["purchases"].as_array().expect("purchases array");
        assert_eq!(purchases.len(), 1, "{uri}");
        assert_eq!(purchases[0]["isTrial"], false);
        assert_eq!(body["stats"]["total"], 1);
        assert_eq!(body["stats"]["trials"], 0);
        assert_eq!(body["stats"]["paid"], 1);
    }
}

#[tokio::test]
async fn rate_gateway_failure_fails_the_report() {
    let (app, pool) = test_app_with(Arc::new(FailingRates), None).await;
    PurchaseRepository::new(&pool)
        .create(&purchase("Widgets", "EUR", 10.0, false))
        .await
        .expect("seed purchase");

    let (status, body) = send_json(&app, "GET", "/api/v1/purchases", None).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["success"], false);

    let (status, _) = send_json(&app, "GET", "/api/v1/purchases/summary", None).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
}

#[tokio::test]
async fn apps_lists_distinct_names() {
    let (app, pool) = test_app().await;
    let repo = PurchaseRepository::new(&pool);
    for name in ["Widgets", "Gadgets", "Widgets"] {
        repo.create(&purchase(name, "EUR", 1.0, false))
            .await
            .expect("seed purchase");
    }

    let (status, body) = send_json(&app, "GET", "/api/v1/apps", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["apps"], json!(["Gadgets", "Widgets"]));
}

// =============================================================================
// Purchase summary
// =============================================================================

#[tokio::test]
async fn summary_emits_only_nonempty_day_buckets() {
    let (app, pool) = test_app().await;
    let repo = PurchaseRepository::new(&pool);
    for hour in [9, 12, 23] {
        let mut p = purchase("Widgets", "EUR", 10.0, false);
        p.created_at = Utc.with_ymd_and_hms(2025, 3, 1, hour, 0, 0).unwrap();
        repo.create(&p).await.expect("seed purchase");
    }

    let (status, body) = send_json(
        &app,
        "GET",
        "/api/v1/purchases/summary?startDate=2025-03-01&endDate=2025-03-02&groupBy=day",
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let grouped = body["grouped"].as_array().expect("grouped array");
    assert_eq!(grouped.len(), 1, "no empty bucket for the quiet day");
    assert_eq!(grouped[0]["group"], "2025-03-01");
    assert_eq!(grouped[0]["count"], 3);
    assert_eq!(grouped[0]["paidCount"], 3);
    assert_eq!(grouped[0]["trialCount"], 0);
    // 3 * 10 EUR * 1.1
    assert_eq!(grouped[0]["totalInUSD"], 33.0);
}

#[tokio::test]
async fn summary_week_labels_use_plain_convention() {
    let (app, pool) = test_app().await;
    let mut p = purchase("Widgets", "EUR", 10.0, false);
    p.created_at = Utc.with_ymd_and_hms(2025, 5, 4, 12, 0, 0).unwrap();
    PurchaseRepository::new(&pool)
        .create(&p)
        .await
        .expect("seed purchase");

    let (_, body) = send_json(
        &app,
        "GET",
        "/api/v1/purchases/summary?startDate=2025-05-01&endDate=2025-05-07&groupBy=week",
        None,
    )
    .await;
    assert_eq!(body["grouped"][0]["group"], "2025-18");
}

#[tokio::test]
async fn summary_rejects_unknown_group_by() {
    let (app, _pool) = test_app().await;
    let (status, body) = send_json(
        &app,
        "GET",
        "/api/v1/purchases/summary?groupBy=fortnight",
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
}

// =============================================================================
// Downloads
// =============================================================================

#[tokio::test]
async fn download_logging_is_idempotent() {
    let (app, _pool) = test_app().await;
    let body = json!({"userId": "alice", "appName": "Widgets", "timestamp": "2025-05-04T08:00:00Z"});

    let (status, first) = send_json(&app, "POST", "/api/v1/log-download", Some(body.clone())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(first["success"], true);
    assert_eq!(first["message"], "Download logged successfully");
    assert_eq!(first["data"]["userId"], "alice");

    let (status, second) = send_json(&app, "POST", "/api/v1/log-download", Some(body)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(second["success"], true);
    assert_eq!(
        second["message"],
        "Download already logged for this user and app"
    );
    assert!(second.get("data").is_none());

    // Exactly one stored record
    let (_, stats) = send_json(
        &app,
        "GET",
        "/api/v1/downloads?startDate=2025-05-01&endDate=2025-05-07",
        None,
    )
    .await;
    assert_eq!(stats["data"]["downloads"][0]["totalDownloads"], 1);
}

#[tokio::test]
async fn download_stats_count_unique_users() {
    let (app, _pool) = test_app().await;
    for (user, app_name) in [("alice", "Widgets"), ("bob", "Widgets"), ("alice", "Gadgets")] {
        let body = json!({
            "userId": user,
            "appName": app_name,
            "timestamp": "2025-05-04T08:00:00Z",
        });
        send_json(&app, "POST", "/api/v1/log-download", Some(body)).await;
    }

    let (status, body) = send_json(
        &app,
        "GET",
        "/api/v1/downloads?startDate=2025-05-01&endDate=2025-05-07&groupBy=day",
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let data = &body["data"];
    assert_eq!(data["periodType"], "day");
    assert_eq!(data["totalUniqueUsers"], 2);
    let buckets = data["downloads"].as_array().expect("downloads array");
    assert_eq!(buckets.len(), 1);
    assert_eq!(buckets[0]["period"], "2025-05-04");
    assert_eq!(buckets[0]["totalDownloads"], 3);
    assert_eq!(buckets[0]["uniqueUsers"], 2);
    assert!(buckets[0].get("details").is_none());
}

#[tokio::test]
async fn download_stats_week_labels_are_prefixed() {
    let (app, _pool) = test_app().await;
    let body = json!({"userId": "alice", "appName": "Widgets", "timestamp": "2025-05-04T08:00:00Z"});
    send_json(&app, "POST", "/api/v1/log-download", Some(body)).await;

    let (_, stats) = send_json(
        &app,
        "GET",
        "/api/v1/downloads?startDate=2025-05-01&endDate=2025-05-07&groupBy=week",
        None,
    )
    .await;
    assert_eq!(stats["data"]["downloads"][0]["period"], "2025-W18");
}

#[tokio::test]
async fn download_details_are_opt_in() {
    let (app, _pool) = test_app().await;
    let body = json!({"userId": "alice", "appName": "Widgets", "timestamp": "2025-05-04T08:00:00Z"});
    send_json(&app, "POST", "/api/v1/log-download", Some(body)).await;

    let (_, stats) = send_json(
        &app,
        "GET",
        "/api/v1/downloads?startDate=2025-05-01&endDate=2025-05-07&includeDetails=true",
        None,
    )
    .await;
    let details = stats["data"]["downloads"][0]["details"]
        .as_array()
        .expect("details array");
    assert_eq!(details.len(), 1);
    assert_eq!(details[0]["userId"], "alice");
    assert_eq!(details[0]["appName"], "Widgets");
}

#[tokio::test]
async fn download_timestamp_defaults_to_ingestion_time() {
    let (app, _pool) = test_app().await;
    let before = Utc::now();

    let (status, body) = send_json(
        &app,
        "POST",
        "/api/v1/log-download",
        Some(json!({"userId": "alice", "appName": "Widgets"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let stamped: DateTime<Utc> = body["data"]["timestamp"]
        .as_str()
        .expect("timestamp")
        .parse()
        .expect("parse timestamp");
    assert!(stamped >= before);
    assert!(stamped <= Utc::now());
}

// =============================================================================
// Trial statistics
// =============================================================================

#[tokio::test]
async fn trial_stats_report_per_app_and_overall() {
    let (app, pool) = test_app().await;
    let repo = PurchaseRepository::new(&pool);
    repo.create(&purchase("Widgets", "USD", 9.99, false))
        .await
        .expect("seed");
    repo.create(&purchase("Widgets", "USD", 0.0, true))
        .await
        .expect("seed");
    repo.create(&purchase("Widgets", "USD", 0.0, true))
        .await
        .expect("seed");
    for _ in 0..5 {
        repo.create(&purchase("Gadgets", "USD", 4.99, false))
            .await
            .expect("seed");
    }

    let (status, body) = send_json(&app, "GET", "/api/v1/trials/stats", None).await;
    assert_eq!(status, StatusCode::OK);

    let widgets = &body["data"]["byApp"]["Widgets"];
    assert_eq!(widgets["totalPurchases"], 3);
    assert_eq!(widgets["trials"], 2);
    assert_eq!(widgets["conversions"], 1);
    assert_eq!(widgets["conversionRate"], 50.0);
    assert_eq!(widgets["revenue"], 9.99);

    // 0 trials must report a 0 rate, not infinity
    let gadgets = &body["data"]["byApp"]["Gadgets"];
    assert_eq!(gadgets["conversions"], 5);
    assert_eq!(gadgets["conversionRate"], 0.0);

    let overall = &body["data"]["overall"];
    assert_eq!(overall["totalPurchases"], 8);
    assert_eq!(overall["trials"], 2);
    assert_eq!(overall["conversions"], 6);
    assert_eq!(overall["conversionRate"], 300.0);
}

// =============================================================================
// Notification fan-out
// =============================================================================

#[tokio::test]
async fn purchase_fanout_is_best_effort() {
    let push = Arc::new(RecordingPush {
        sent: Mutex::new(Vec::new()),
        fail_token: Some("tok-bad".to_string()),
    });
    let (app, _pool) = test_app_with(
        Arc::new(FixedRates::standard()),
        Some(push.clone() as Arc<dyn PushSender>),
    )
    .await;

    for (user, token) in [("u1", "tok-1"), ("u2", "tok-bad"), ("u3", "tok-3")] {
        let body = json!({
            "userId": user,
            "email": format!("{user}@example.com"),
            "userToken": token,
        });
        send_json(&app, "POST", "/api/v1/create-user", Some(body)).await;
    }

    let buy = json!({
        "currencyCode": "USD", "price": 4.99, "priceFormatted": "$4.99",
        "kind": "pro.monthly", "isSandbox": false, "appName": "Widgets"
    });
    let (status, body) = send_json(&app, "POST", "/api/v1/log-purchase", Some(buy)).await;

    // One recipient failing never fails the request
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);

    let sent = push.sent.lock().expect("lock");
    let tokens: Vec<&str> = sent.iter().map(|m| m.token.as_str()).collect();
    assert_eq!(tokens, vec!["tok-1", "tok-3"]);
    assert_eq!(sent[0].title, "New Purchase - Widgets");
    assert_eq!(sent[0].body, "Purchased pro.monthly for $4.99");
    assert_eq!(sent[0].sound, "purchase.wav");
}
