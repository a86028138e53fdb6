//! trendwatch - moving-average and RSI trend monitor with change notifications

pub mod api;
pub mod config;
pub mod error;
pub mod services;
pub mod sources;
pub mod types;

use std::sync::Arc;

use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use config::Config;
use services::{SelectionSessions, SignalHistoryStore, TrendMonitor, UserDirectory};

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub monitor: Arc<TrendMonitor>,
    pub history: Arc<dyn SignalHistoryStore>,
    pub users: Arc<dyn UserDirectory>,
    pub sessions: Arc<SelectionSessions>,
    /// Unix millis at start-up.
    pub started_at: i64,
}

/// Full HTTP application: API routes plus CORS and request tracing.
pub fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    api::router()
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
