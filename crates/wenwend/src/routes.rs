//! API routes for wenwend

use crate::admin::require_admin;
use crate::jobs::run_daily_reset;
use crate::pipeline::{run_blocking, storage_error};
use crate::server::AppState;
use axum::{
    body::Bytes,
    extract::State,
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use tracing::{error, info, warn};
use wenwen_shared::api::{
    ChatResponse, DailyResetSummary, ErrorBody, HealthResponse, RegisterRequest, RegisterResponse,
};
use wenwen_shared::content::QuickQuestion;
use wenwen_shared::{CoverageStats, WenwenError, VERSION};

pub type AppStateArc = Arc<AppState>;

/// Error returned by handlers, rendered as `{error: {code, message}}`
#[derive(Debug)]
pub struct ApiError(pub WenwenError);

impl From<WenwenError> for ApiError {
    fn from(err: WenwenError) -> Self {
        ApiError(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let err = self.0;
        if err.is_server_error() {
            error!("  Request failed: {}", err);
        } else {
            warn!("  Request rejected: {}", err);
        }
        let status =
            StatusCode::from_u16(err.status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(ErrorBody::from_error(&err))).into_response()
    }
}

pub(crate) type ApiResult<T> = Result<Json<T>, ApiError>;

/// Parse a JSON body; malformed JSON becomes `INVALID_JSON`
pub(crate) fn parse_body<T: DeserializeOwned>(body: &Bytes) -> Result<T, ApiError> {
    serde_json::from_slice(body).map_err(|e| ApiError(WenwenError::Json(e)))
}

// ============================================================================
// Chat Routes
// ============================================================================

pub fn chat_routes() -> Router<AppStateArc> {
    Router::new()
        .route("/chat", post(chat))
        .route("/stats", get(stats))
        .route("/quick-questions", get(quick_questions))
}

async fn chat(State(state): State<AppStateArc>, body: Bytes) -> ApiResult<ChatResponse> {
    let request = parse_body(&body)?;
    let outcome = state.pipeline.handle(request).await?;
    Ok(Json(outcome.response))
}

async fn stats(State(state): State<AppStateArc>) -> ApiResult<CoverageStats> {
    let catalog = state.catalog.clone();
    let stats = run_blocking(move || {
        catalog
            .coverage()
            .map_err(|e| storage_error("Failed to load coverage stats", e))
    })
    .await?;
    Ok(Json(stats))
}

async fn quick_questions(State(state): State<AppStateArc>) -> ApiResult<Vec<QuickQuestion>> {
    let catalog = state.catalog.clone();
    let questions = run_blocking(move || {
        catalog
            .quick_questions()
            .map_err(|e| storage_error("Failed to load quick questions", e))
    })
    .await?;
    Ok(Json(questions.as_ref().clone()))
}

// ============================================================================
// User Routes
// ============================================================================

pub fn user_routes() -> Router<AppStateArc> {
    Router::new().route("/register", post(register))
}

async fn register(State(state): State<AppStateArc>, body: Bytes) -> ApiResult<RegisterResponse> {
    let req: RegisterRequest = parse_body(&body)?;
    let line_uid = req
        .line_uid
        .as_deref()
        .map(str::trim)
        .filter(|uid| !uid.is_empty())
        .ok_or_else(|| WenwenError::MissingField("line_uid".to_string()))?
        .to_string();

    let db = state.db.clone();
    let uid = line_uid.clone();
    let user = run_blocking(move || {
        db.upsert_line_profile(
            &uid,
            req.line_display_name.as_deref(),
            req.line_avatar_url.as_deref(),
        )
        .map_err(|e| storage_error("Failed to register user", e))
    })
    .await?;
    info!("  Registered LINE user {} as profile {}", line_uid, user.id);

    Ok(Json(RegisterResponse {
        user,
        message: "註冊成功".to_string(),
    }))
}

// ============================================================================
// Job Routes
// ============================================================================

pub fn job_routes() -> Router<AppStateArc> {
    Router::new().route("/jobs/daily-reset", post(daily_reset))
}

async fn daily_reset(
    State(state): State<AppStateArc>,
    headers: HeaderMap,
) -> ApiResult<DailyResetSummary> {
    let admin_id = require_admin(&state, &headers).await?;
    info!("  Daily reset requested by admin {}", admin_id);
    let db = state.db.clone();
    let jobs = state.config.jobs.clone();
    let summary = run_blocking(move || {
        run_daily_reset(&db, &jobs, Utc::now()).map_err(|e| storage_error("Daily reset failed", e))
    })
    .await?;
    Ok(Json(summary))
}

// ============================================================================
// Health Routes
// ============================================================================

pub fn health_routes() -> Router<AppStateArc> {
    Router::new()
        .route("/health", get(health))
        .route("/metrics", get(metrics))
}

async fn health(State(state): State<AppStateArc>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: VERSION.to_string(),
        uptime_seconds: state.start_time.elapsed().as_secs(),
        rules_version: state.pipeline.classifier().table().version,
    })
}

async fn metrics(State(state): State<AppStateArc>) -> Result<Response, ApiError> {
    let text = state.metrics.export().map_err(|e| {
        WenwenError::Internal(format!("metrics export failed: {}", e))
    })?;
    Ok((
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        text,
    )
        .into_response())
}
