/**
 * API Tests
 *
 * Drives the axum router in-process against fixture candles and
 * in-memory stores.
 */

mod common;

use std::sync::Arc;
use std::time::Duration;

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tower::ServiceExt;

use common::{breakdown_closes, candles, Harness};
use trendwatch::services::SelectionSessions;
use trendwatch::types::Interval;
use trendwatch::{app, AppState};

fn router(h: &Harness) -> Router {
    let state = AppState {
        config: Arc::new(h.config.clone()),
        monitor: h.monitor.clone(),
        history: h.history.clone(),
        users: h.users.clone(),
        sessions: Arc::new(SelectionSessions::new(
            Duration::from_secs(60),
            vec!["SOLUSDT".to_string(), "BTCUSDT".to_string()],
            vec![Interval::FifteenMinutes, Interval::OneHour],
        )),
        started_at: chrono::Utc::now().timestamp_millis(),
    };
    app(state)
}

async fn call(router: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let mut request = Request::builder().method(method).uri(uri);
    let body = match body {
        Some(json) => {
            request = request.header("content-type", "application/json");
            Body::from(json.to_string())
        }
        None => Body::empty(),
    };

    let response = router
        .clone()
        .oneshot(request.body(body).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, value)
}

#[tokio::test]
async fn test_health() {
    let h = Harness::new(&["SOLUSDT"], candles(&breakdown_closes()));
    let (status, body) = call(&router(&h), "GET", "/api/health", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["monitorRunning"], false);
}

#[tokio::test]
async fn test_live_verdict() {
    let h = Harness::new(&["SOLUSDT"], candles(&breakdown_closes()));
    let (status, body) = call(&router(&h), "GET", "/api/signals/solusdt/15m", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["trend"], "Bearish");
    assert_eq!(body["data"]["lastMA"].as_array().unwrap().len(), 3);
    assert_eq!(body["data"]["lastSideway"]["close"], 100.0);
}

#[tokio::test]
async fn test_bad_requests() {
    let h = Harness::new(&["SOLUSDT"], candles(&breakdown_closes()));
    let router = router(&h);

    let (status, body) = call(&router, "GET", "/api/signals/SOLUSDT/7x", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["status"], 400);

    let (status, _) = call(&router, "GET", "/api/signals/SHORTUSDT/15m", None).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let (status, _) = call(&router, "GET", "/api/signals/FAILUSDT/15m", None).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);

    let (status, _) = call(&router, "GET", "/api/users/nobody", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_latest_and_history() {
    let h = Harness::new(&["SOLUSDT"], candles(&breakdown_closes()));
    let router = router(&h);

    let (status, _) = call(&router, "GET", "/api/signals/SOLUSDT/15m/latest", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    h.monitor.seed_baselines().await;
    h.monitor.process("SOLUSDT", Interval::FifteenMinutes).await.unwrap();

    let (status, body) = call(&router, "GET", "/api/signals/SOLUSDT/15m/latest", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["trend"], "Bearish");
    assert_eq!(body["data"]["triggerSource"], "schedule_job");

    let (status, body) = call(&router, "GET", "/api/signals/SOLUSDT/15m/history?limit=1", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"].as_array().unwrap().len(), 1);

    let (_, body) = call(&router, "GET", "/api/signals/SOLUSDT/15m/history", None).await;
    let history = body["data"].as_array().unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[1]["triggerSource"], "app_start");
}

#[tokio::test]
async fn test_user_lifecycle() {
    let h = Harness::new(&["SOLUSDT"], candles(&breakdown_closes()));
    let router = router(&h);

    let (status, body) = call(
        &router,
        "POST",
        "/api/users",
        Some(json!({ "id": "alice", "chatId": 42, "username": "alice" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["symbols"], json!(["BTCUSDT"]));
    assert_eq!(body["data"]["intervals"], json!(["15m"]));
    assert_eq!(body["data"]["notificationEnabled"], true);

    let (status, body) = call(
        &router,
        "PUT",
        "/api/users/alice/notifications",
        Some(json!({ "enabled": false })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["notificationEnabled"], false);

    // Registering again switches notifications back on.
    let (_, body) = call(
        &router,
        "POST",
        "/api/users",
        Some(json!({ "id": "alice", "chatId": 42 })),
    )
    .await;
    assert_eq!(body["data"]["notificationEnabled"], true);

    let (status, body) = call(&router, "GET", "/api/users/alice", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["chatId"], 42);
}

#[tokio::test]
async fn test_selection_toggle_and_commit() {
    let h = Harness::new(&["SOLUSDT"], candles(&breakdown_closes()));
    let router = router(&h);
    call(&router, "POST", "/api/users", Some(json!({ "id": "alice", "chatId": 1 }))).await;

    let (status, body) = call(
        &router,
        "POST",
        "/api/users/alice/selections/symbols/toggle",
        Some(json!({ "value": "solusdt" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["values"], json!(["BTCUSDT", "SOLUSDT"]));

    call(
        &router,
        "POST",
        "/api/users/alice/selections/symbols/toggle",
        Some(json!({ "value": "BTCUSDT" })),
    )
    .await;

    let (status, _) = call(
        &router,
        "POST",
        "/api/users/alice/selections/symbols/toggle",
        Some(json!({ "value": "DOGEUSDT" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = call(&router, "POST", "/api/users/alice/selections/symbols/commit", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["symbols"], json!(["SOLUSDT"]));

    let (status, _) = call(&router, "POST", "/api/users/alice/selections/symbols/commit", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = call(&router, "POST", "/api/users/alice/selections/colors/commit", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_status_endpoint() {
    let h = Harness::new(&["SOLUSDT"], candles(&breakdown_closes()));
    let router = router(&h);
    call(&router, "POST", "/api/users", Some(json!({ "id": "alice", "chatId": 1 }))).await;

    let (status, body) = call(&router, "POST", "/api/users/alice/status", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["sent"], 1);
    assert_eq!(h.notifier.messages_for("alice").len(), 1);
}

#[tokio::test]
async fn test_reset_restores_defaults() {
    let h = Harness::new(&["SOLUSDT"], candles(&breakdown_closes()));
    let router = router(&h);
    call(&router, "POST", "/api/users", Some(json!({ "id": "alice", "chatId": 1 }))).await;
    call(&router, "PUT", "/api/users/alice/notifications", Some(json!({ "enabled": false }))).await;

    for (action, value) in [("symbols", "SOLUSDT"), ("symbols", "BTCUSDT"), ("intervals", "1h")] {
        call(
            &router,
            "POST",
            &format!("/api/users/alice/selections/{}/toggle", action),
            Some(json!({ "value": value })),
        )
        .await;
    }
    let (_, body) = call(&router, "POST", "/api/users/alice/selections/symbols/commit", None).await;
    assert_eq!(body["data"]["symbols"], json!(["SOLUSDT"]));

    // Interval selection still pending when the reset lands.
    call(
        &router,
        "POST",
        "/api/users/alice/selections/intervals/toggle",
        Some(json!({ "value": "15m" })),
    )
    .await;

    let (status, body) = call(&router, "POST", "/api/users/alice/reset", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["symbols"], json!(["BTCUSDT"]));
    assert_eq!(body["data"]["intervals"], json!(["15m"]));
    assert_eq!(body["data"]["notificationEnabled"], false);

    let (status, _) = call(&router, "POST", "/api/users/alice/selections/intervals/commit", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, body) = call(&router, "GET", "/api/users/alice", None).await;
    assert_eq!(body["data"]["symbols"], json!(["BTCUSDT"]));

    let (status, _) = call(&router, "POST", "/api/users/nobody/reset", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
