//! User subscription endpoints.

use axum::{
    extract::{Path, State},
    routing::{get, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::signals::ApiResponse;
use crate::error::{AppError, Result};
use crate::services::{PendingAction, Selection};
use crate::types::{NotificationToggleRequest, RegisterUserRequest, UserProfile, UserRef};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct ToggleRequest {
    pub value: String,
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub sent: usize,
}

/// Create the users router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(register))
        .route("/:id", get(get_user))
        .route("/:id/notifications", put(set_notifications))
        .route("/:id/selections/:action/toggle", post(toggle_selection))
        .route("/:id/selections/:action/commit", post(commit_selection))
        .route("/:id/status", post(send_status))
        .route("/:id/reset", post(reset_config))
}

fn load_user(state: &AppState, id: &str) -> Result<UserProfile> {
    state
        .users
        .get_user(&UserRef::new(id))?
        .ok_or_else(|| AppError::NotFound(format!("User not found: {}", id)))
}

fn parse_action(raw: &str) -> Result<PendingAction> {
    PendingAction::from_str(raw).ok_or_else(|| AppError::BadRequest(format!("Unknown selection: {}", raw)))
}

/// Register a user, or switch notifications back on for a known one.
async fn register(
    State(state): State<AppState>,
    Json(request): Json<RegisterUserRequest>,
) -> Result<Json<ApiResponse<UserProfile>>> {
    if request.id.trim().is_empty() {
        return Err(AppError::BadRequest("User id is required".to_string()));
    }

    let id = UserRef::new(request.id.trim());
    let user = match state.users.get_user(&id)? {
        Some(mut existing) => {
            existing.chat_id = request.chat_id;
            existing.username = request.username;
            existing.notification_enabled = true;
            existing.touch();
            existing
        }
        None => {
            info!("Registering user {}", id);
            UserProfile::new(id, request.chat_id, request.username)
        }
    };

    state.users.save_user(&user)?;
    Ok(Json(ApiResponse::new(user)))
}

async fn get_user(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<UserProfile>>> {
    Ok(Json(ApiResponse::new(load_user(&state, &id)?)))
}

async fn set_notifications(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<NotificationToggleRequest>,
) -> Result<Json<ApiResponse<UserProfile>>> {
    let mut user = load_user(&state, &id)?;
    user.notification_enabled = request.enabled;
    user.touch();
    state.users.save_user(&user)?;
    Ok(Json(ApiResponse::new(user)))
}

async fn toggle_selection(
    State(state): State<AppState>,
    Path((id, action)): Path<(String, String)>,
    Json(request): Json<ToggleRequest>,
) -> Result<Json<ApiResponse<Selection>>> {
    let action = parse_action(&action)?;
    let user = load_user(&state, &id)?;
    let selection = state.sessions.toggle(&user, action, &request.value)?;
    Ok(Json(ApiResponse::new(selection)))
}

async fn commit_selection(
    State(state): State<AppState>,
    Path((id, action)): Path<(String, String)>,
) -> Result<Json<ApiResponse<UserProfile>>> {
    let action = parse_action(&action)?;
    let mut user = load_user(&state, &id)?;
    let selection = state
        .sessions
        .take(&user.id, action)
        .ok_or_else(|| AppError::BadRequest(format!("No pending {} selection", action.as_str())))?;

    selection.apply_to(&mut user);
    state.users.save_user(&user)?;
    Ok(Json(ApiResponse::new(user)))
}

/// Send the current verdict of every followed market, ignoring history.
async fn send_status(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<StatusResponse>>> {
    let user = load_user(&state, &id)?;
    let sent = state.monitor.status_for_user(&user).await;
    Ok(Json(ApiResponse::new(StatusResponse { sent })))
}

/// Back to the default symbols and intervals. Pending selections are dropped.
async fn reset_config(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<UserProfile>>> {
    let mut user = load_user(&state, &id)?;
    let dropped = state.sessions.clear_user(&user.id);
    user.reset_subscriptions();
    state.users.save_user(&user)?;

    info!("Reset subscriptions of {} ({} pending selections dropped)", user.id, dropped);
    Ok(Json(ApiResponse::new(user)))
}
