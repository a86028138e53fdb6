//! Signal API endpoints.

use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::types::{Interval, SignalLogEntry, TrendVerdict};
use crate::AppState;

const DEFAULT_HISTORY_LIMIT: usize = 20;
const MAX_HISTORY_LIMIT: usize = 500;

/// API response wrapper.
#[derive(Serialize)]
pub struct ApiResponse<T> {
    pub data: T,
}

impl<T> ApiResponse<T> {
    pub(crate) fn new(data: T) -> Self {
        Self { data }
    }
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub limit: Option<usize>,
}

/// Create the signals router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/:symbol/:interval", get(get_verdict))
        .route("/:symbol/:interval/latest", get(get_latest))
        .route("/:symbol/:interval/history", get(get_history))
}

pub(crate) fn parse_interval(raw: &str) -> Result<Interval> {
    Interval::from_str(raw).ok_or_else(|| AppError::BadRequest(format!("Unknown interval: {}", raw)))
}

/// Live verdict computed from fresh candles.
async fn get_verdict(
    State(state): State<AppState>,
    Path((symbol, interval)): Path<(String, String)>,
) -> Result<Json<ApiResponse<TrendVerdict>>> {
    let interval = parse_interval(&interval)?;
    let verdict = state.monitor.evaluate(&symbol.to_uppercase(), interval).await?;
    Ok(Json(ApiResponse::new(verdict)))
}

/// Latest system-wide entry.
async fn get_latest(
    State(state): State<AppState>,
    Path((symbol, interval)): Path<(String, String)>,
) -> Result<Json<ApiResponse<SignalLogEntry>>> {
    let interval = parse_interval(&interval)?;
    let entry = state
        .history
        .find_latest_system_entry(&symbol, interval)?
        .ok_or_else(|| AppError::NotFound(format!("No signal recorded for {} {}", symbol, interval)))?;
    Ok(Json(ApiResponse::new(entry)))
}

async fn get_history(
    State(state): State<AppState>,
    Path((symbol, interval)): Path<(String, String)>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<ApiResponse<Vec<SignalLogEntry>>>> {
    let interval = parse_interval(&interval)?;
    let limit = query
        .limit
        .unwrap_or(DEFAULT_HISTORY_LIMIT)
        .clamp(1, MAX_HISTORY_LIMIT);
    let entries = state.history.recent_entries(&symbol, interval, limit)?;
    Ok(Json(ApiResponse::new(entries)))
}
