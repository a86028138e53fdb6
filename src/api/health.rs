use crate::AppState;
use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
    monitor_running: bool,
    uptime_secs: i64,
}

async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        monitor_running: state.monitor.is_running(),
        uptime_secs: (chrono::Utc::now().timestamp_millis() - state.started_at) / 1000,
    })
}

pub fn router() -> Router<AppState> {
    Router::new().route("/api/health", get(health))
}
