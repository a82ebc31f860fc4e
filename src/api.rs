//! HTTP API: health, the cron sweep trigger, and the client-facing
//! application routes.
//!
//! Spawned as a background task from `followup start`, alongside the
//! scheduler.

use crate::sweep::SweepCoordinator;
use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::Json,
    routing::{get, put},
    Router,
};
use chrono::{DateTime, Utc};
use followup_core::{
    config::ApiConfig, error::FollowupError, reminder::set_reminder, traits::RecordStore,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};

type ApiError = (StatusCode, Json<Value>);

/// Shared state for API handlers.
#[derive(Clone)]
pub struct ApiState {
    store: Arc<dyn RecordStore>,
    sweeper: SweepCoordinator,
    api_key: Option<String>,
    cron_secret: Option<String>,
    uptime: Instant,
}

impl ApiState {
    pub fn new(config: &ApiConfig, store: Arc<dyn RecordStore>, sweeper: SweepCoordinator) -> Self {
        Self {
            store,
            sweeper,
            api_key: non_empty(&config.api_key),
            cron_secret: non_empty(&config.cron_secret),
            uptime: Instant::now(),
        }
    }
}

fn non_empty(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

#[derive(Debug, Deserialize)]
struct CronQuery {
    token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ReminderRequest {
    reminder: Option<DateTime<Utc>>,
}

/// Constant-time string comparison for token checks.
fn constant_time_eq(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.bytes()
        .zip(b.bytes())
        .fold(0u8, |acc, (x, y)| acc | (x ^ y))
        == 0
}

/// Check bearer token auth. Returns `None` if authorized.
fn check_auth(headers: &HeaderMap, api_key: &Option<String>) -> Option<ApiError> {
    let key = api_key.as_ref()?;

    let Some(header) = headers.get("authorization") else {
        return Some((
            StatusCode::UNAUTHORIZED,
            Json(json!({"error": "missing Authorization header"})),
        ));
    };

    let Ok(value) = header.to_str() else {
        return Some((
            StatusCode::UNAUTHORIZED,
            Json(json!({"error": "invalid Authorization header"})),
        ));
    };

    match value.strip_prefix("Bearer ") {
        Some(token) if constant_time_eq(token, key) => None,
        _ => Some((
            StatusCode::UNAUTHORIZED,
            Json(json!({"error": "invalid token"})),
        )),
    }
}

/// The caller's opaque user id.
fn owner_id(headers: &HeaderMap) -> Result<String, ApiError> {
    headers
        .get("x-owner-id")
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .ok_or((
            StatusCode::BAD_REQUEST,
            Json(json!({"error": "missing X-Owner-Id header"})),
        ))
}

fn store_error(context: &str, e: FollowupError) -> ApiError {
    error!("{context}: {e}");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({"error": "store unavailable"})),
    )
}

/// `GET /api/health`
async fn health(headers: HeaderMap, State(state): State<ApiState>) -> Result<Json<Value>, ApiError> {
    if let Some(err) = check_auth(&headers, &state.api_key) {
        return Err(err);
    }
    Ok(Json(json!({
        "status": "ok",
        "uptime_secs": state.uptime.elapsed().as_secs(),
    })))
}

/// `GET /api/cron/check-reminders?token=…`: run one sweep for an external
/// scheduler.
async fn check_reminders(
    Query(query): Query<CronQuery>,
    State(state): State<ApiState>,
) -> Result<Json<Value>, ApiError> {
    let authorized = match (&state.cron_secret, &query.token) {
        (Some(secret), Some(token)) => constant_time_eq(token, secret),
        _ => false,
    };
    if !authorized {
        warn!("cron trigger rejected");
        return Err((
            StatusCode::UNAUTHORIZED,
            Json(json!({"error": "Unauthorized"})),
        ));
    }

    match state.sweeper.run_sweep(Utc::now()).await {
        Ok(report) => Ok(Json(json!(report))),
        Err(e) => {
            error!("cron sweep failed: {e}");
            Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"error": "Failed to check reminders"})),
            ))
        }
    }
}

/// `GET /api/applications`: the caller's records. Loading records also
/// kicks off a sweep in the background.
async fn list_applications(
    headers: HeaderMap,
    State(state): State<ApiState>,
) -> Result<Json<Value>, ApiError> {
    if let Some(err) = check_auth(&headers, &state.api_key) {
        return Err(err);
    }
    let owner = owner_id(&headers)?;

    let records = state
        .store
        .list_for_owner(&owner)
        .await
        .map_err(|e| store_error("list applications failed", e))?;

    let sweeper = state.sweeper.clone();
    tokio::spawn(async move {
        if let Err(e) = sweeper.run_sweep(Utc::now()).await {
            warn!("opportunistic sweep failed: {e}");
        }
    });

    Ok(Json(json!(records)))
}

/// `PUT /api/applications/{id}/reminder`: set, move, or clear a reminder.
async fn update_reminder(
    headers: HeaderMap,
    Path(id): Path<String>,
    State(state): State<ApiState>,
    body: Result<Json<ReminderRequest>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    if let Some(err) = check_auth(&headers, &state.api_key) {
        return Err(err);
    }
    let owner = owner_id(&headers)?;

    let Json(request) = body.map_err(|e| {
        (
            StatusCode::BAD_REQUEST,
            Json(json!({"error": format!("invalid request: {e}")})),
        )
    })?;

    let not_found = || {
        (
            StatusCode::NOT_FOUND,
            Json(json!({"error": "application not found"})),
        )
    };

    let record = state
        .store
        .get(&id)
        .await
        .map_err(|e| store_error("load application failed", e))?
        .ok_or_else(not_found)?;

    if record.owner_id != owner {
        return Err((
            StatusCode::FORBIDDEN,
            Json(json!({"error": "application belongs to another user"})),
        ));
    }

    let updated = state
        .store
        .update(&set_reminder(record, request.reminder))
        .await
        .map_err(|e| store_error("update reminder failed", e))?
        .ok_or_else(not_found)?;

    info!(
        "reminder for {id} {}",
        match updated.reminder {
            Some(at) => format!("set to {at}"),
            None => "cleared".to_string(),
        }
    );
    Ok(Json(json!(updated)))
}

/// Build the axum router with shared state.
pub fn build_router(state: ApiState) -> Router {
    Router::new()
        .route("/api/health", get(health))
        .route("/api/cron/check-reminders", get(check_reminders))
        .route("/api/applications", get(list_applications))
        .route("/api/applications/{id}/reminder", put(update_reminder))
        .layer(axum::extract::DefaultBodyLimit::max(64 * 1024))
        .with_state(state)
}

/// Serve the API until the task is aborted.
pub async fn serve(config: ApiConfig, state: ApiState) {
    let app = build_router(state);
    let addr = format!("{}:{}", config.host, config.port);

    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(l) => l,
        Err(e) => {
            error!("API server failed to bind to {addr}: {e}");
            return;
        }
    };

    info!("API server listening on {addr}");

    if let Err(e) = axum::serve(listener, app).await {
        error!("API server error: {e}");
    }
}

#[cfg(test)]
mod tests;
