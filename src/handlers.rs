// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! HTTP handlers for the blog guard service.
//!
//! The admin front-end calls these endpoints before talking to the hosted
//! backend: record an attempt, validate a post, keep the draft in sync.
//! Limiter decisions are always returned with status 200 and an `allowed`
//! flag; the caller is responsible for not proceeding when it is false.
//!
//! Limiter and draft operations touch the store synchronously, so they run
//! on the blocking pool via `spawn_blocking` rather than on a runtime worker.

use crate::config::Config;
use crate::draft::Draft;
use crate::guard::AdminGuard;
use crate::limiter::{GuardedAction, LockStatus};
use crate::metrics::GuardMetrics;
use crate::store::StoreError;
use crate::validator::CharacterCount;
use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info};

/// Shared application state.
pub struct AppState {
    pub guard: AdminGuard,
    pub metrics: GuardMetrics,
    pub config: Config,
}

/// Failures surfaced as 500 responses.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Storage error: {0}")]
    Storage(#[from] StoreError),

    #[error("Metrics error: {0}")]
    Metrics(#[from] prometheus::Error),

    #[error("Blocking task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Error response body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: &'static str,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        error!(error = %self, "Request failed");
        let code = match self {
            ApiError::Storage(_) => "STORAGE_ERROR",
            ApiError::Metrics(_) => "METRICS_ERROR",
            ApiError::Task(_) => "TASK_ERROR",
        };
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse {
                error: self.to_string(),
                code,
            }),
        )
            .into_response()
    }
}

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: &'static str,
    pub version: &'static str,
}

/// Current limiter status for one action.
#[derive(Debug, Serialize)]
pub struct LimitStatusResponse {
    pub action: GuardedAction,
    pub locked: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remaining_minutes: Option<u64>,
    pub remaining_attempts: u32,
}

/// Outcome of recording an attempt.
#[derive(Debug, Serialize)]
pub struct AttemptResponse {
    pub allowed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remaining_attempts: Option<u32>,
}

/// Post submitted for validation.
#[derive(Debug, Deserialize)]
pub struct PostRequest {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub content: String,
}

/// Validation verdict with escaped values and counters.
#[derive(Debug, Serialize)]
pub struct ValidationResponse {
    pub valid: bool,
    pub errors: Vec<String>,
    pub sanitized_title: String,
    pub sanitized_content: String,
    pub title_count: CharacterCount,
    pub content_count: CharacterCount,
}

/// Partial draft update; absent fields are left untouched.
#[derive(Debug, Deserialize)]
pub struct DraftUpdate {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
}

/// Build the service router.
pub fn router(state: Arc<AppState>) -> Router {
    let mut app = Router::new()
        .route("/health", get(health))
        .route("/healthz", get(health))
        .route("/limits/:action", get(limit_status).delete(reset_limit))
        .route("/limits/:action/attempt", post(record_attempt))
        .route("/posts/validate", post(validate_post))
        .route("/draft", get(get_draft).put(save_draft).delete(clear_draft));

    if state.config.metrics.enabled {
        app = app.route(&state.config.metrics.path, get(metrics));
    }

    app.layer(TraceLayer::new_for_http()).with_state(state)
}

/// Health check endpoint.
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        service: "blog-guard",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Report lockout and remaining attempts without recording anything.
pub async fn limit_status(
    State(state): State<Arc<AppState>>,
    Path(action): Path<GuardedAction>,
) -> Result<Json<LimitStatusResponse>, ApiError> {
    let response = tokio::task::spawn_blocking(move || {
        let limiter = state.guard.limiters().get(action);
        let status = limiter.is_locked_out();
        let remaining_minutes = match status {
            LockStatus::Locked { remaining_minutes } => Some(remaining_minutes),
            LockStatus::Unlocked => None,
        };

        LimitStatusResponse {
            action,
            locked: status.is_locked(),
            remaining_minutes,
            remaining_attempts: limiter.remaining_attempts(),
        }
    })
    .await?;

    Ok(Json(response))
}

/// Record an attempt at a guarded action.
pub async fn record_attempt(
    State(state): State<Arc<AppState>>,
    Path(action): Path<GuardedAction>,
) -> Result<Json<AttemptResponse>, ApiError> {
    let decision = {
        let state = state.clone();
        tokio::task::spawn_blocking(move || state.guard.limiters().get(action).record_attempt())
            .await?
    };
    state.metrics.observe_decision(action, &decision);

    match decision.reason() {
        None => debug!(%action, "Attempt allowed"),
        Some(reason) => info!(%action, reason = %reason, "Attempt denied"),
    }

    Ok(Json(AttemptResponse {
        allowed: decision.is_allowed(),
        reason: decision.reason(),
        remaining_attempts: decision.remaining_attempts(),
    }))
}

/// Clear a limiter after the guarded action succeeded.
pub async fn reset_limit(
    State(state): State<Arc<AppState>>,
    Path(action): Path<GuardedAction>,
) -> Result<StatusCode, ApiError> {
    tokio::task::spawn_blocking(move || state.guard.limiters().get(action).reset()).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Validate a post and return the escaped values to submit.
pub async fn validate_post(
    State(state): State<Arc<AppState>>,
    Json(req): Json<PostRequest>,
) -> Json<ValidationResponse> {
    let validator = state.guard.validator();
    let result = validator.validate_post(&req.title, &req.content);
    if !result.is_valid() {
        state.metrics.observe_validation_failure();
    }

    Json(ValidationResponse {
        valid: result.is_valid(),
        errors: result.messages(),
        title_count: validator.title_counter(&req.title),
        content_count: validator.content_counter(&req.content),
        sanitized_title: result.sanitized_title,
        sanitized_content: result.sanitized_content,
    })
}

pub async fn get_draft(State(state): State<Arc<AppState>>) -> Result<Json<Draft>, ApiError> {
    let draft = tokio::task::spawn_blocking(move || state.guard.drafts().load()).await?;
    Ok(Json(draft))
}

pub async fn save_draft(
    State(state): State<Arc<AppState>>,
    Json(update): Json<DraftUpdate>,
) -> Result<Json<Draft>, ApiError> {
    let draft = tokio::task::spawn_blocking(move || -> Result<Draft, StoreError> {
        let drafts = state.guard.drafts();
        if let Some(title) = &update.title {
            drafts.save_title(title)?;
        }
        if let Some(content) = &update.content {
            drafts.save_content(content)?;
        }
        Ok(drafts.load())
    })
    .await??;
    Ok(Json(draft))
}

pub async fn clear_draft(State(state): State<Arc<AppState>>) -> Result<StatusCode, ApiError> {
    tokio::task::spawn_blocking(move || state.guard.drafts().clear()).await??;
    Ok(StatusCode::NO_CONTENT)
}

/// Prometheus scrape endpoint.
pub async fn metrics(State(state): State<Arc<AppState>>) -> Result<Response, ApiError> {
    let body = state.metrics.render()?;
    Ok((
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        body,
    )
        .into_response())
}
