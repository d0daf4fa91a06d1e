//! Admin back-office: login, store review, FAQs, quick questions and
//! training data.
//!
//! Everything except `/admin/login` needs `Authorization: Bearer <token>`.
//! Writes drop the catalogue entries they affect so the next chat turn
//! sees them.

use crate::db::Database;
use crate::pipeline::{run_blocking, storage_error};
use crate::routes::{parse_body, ApiError, ApiResult, AppStateArc};
use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{header, HeaderMap},
    routing::{delete, get, post},
    Json, Router,
};
use chrono::{DateTime, Duration, Utc};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{info, warn};
use wenwen_shared::content::{Faq, QuickQuestion, TrainingExample};
use wenwen_shared::training::{evaluate, TrainingReport};
use wenwen_shared::{Approval, Store, StoreFeatures, WenwenError};

// ============================================================================
// Credentials
// ============================================================================

/// Random per-account salt, hex encoded
pub fn new_salt() -> String {
    let mut bytes = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Hex SHA-256 of salt followed by password
pub fn hash_password(salt: &str, password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(password.as_bytes());
    hex::encode(hasher.finalize())
}

/// 32 random bytes, hex encoded
pub fn new_token() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Compare two hashes without stopping at the first difference
pub fn passwords_match(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.bytes().zip(b.bytes()).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

/// Run database work for a handler on the blocking pool
async fn with_db<T, F>(state: &AppStateArc, work: F) -> Result<T, ApiError>
where
    F: FnOnce(&Database) -> Result<T, WenwenError> + Send + 'static,
    T: Send + 'static,
{
    let db = state.db.clone();
    Ok(run_blocking(move || work(&db)).await?)
}

/// Admin id behind the request's bearer token
pub(crate) async fn require_admin(state: &AppStateArc, headers: &HeaderMap) -> Result<i64, ApiError> {
    let token = bearer_token(headers)
        .ok_or_else(|| WenwenError::Unauthorized("missing bearer token".to_string()))?
        .to_string();
    with_db(state, move |db| {
        db.admin_for_token(&token, Utc::now())
            .map_err(|e| storage_error("Failed to check admin session", e))?
            .ok_or_else(|| WenwenError::Unauthorized("invalid or expired token".to_string()))
    })
    .await
}

// ============================================================================
// Request and response bodies
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginResponse {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// Store as submitted by the admin UI. Without `id` it is a new store.
#[derive(Debug, Clone, Deserialize)]
pub struct StoreInput {
    #[serde(default)]
    pub id: Option<i64>,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub subcategory: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub business_hours: Option<String>,
    #[serde(default)]
    pub features: StoreFeatures,
    #[serde(default)]
    pub is_trusted: bool,
    #[serde(default)]
    pub has_discount: bool,
    #[serde(default)]
    pub is_partner: bool,
    #[serde(default)]
    pub rating: f64,
    #[serde(default)]
    pub approval: Approval,
}

impl StoreInput {
    pub fn into_store(self) -> Result<Store, WenwenError> {
        let name = self.name.trim().to_string();
        let category = self.category.trim().to_string();
        if name.is_empty() {
            return Err(WenwenError::MissingField("name".to_string()));
        }
        if category.is_empty() {
            return Err(WenwenError::MissingField("category".to_string()));
        }
        if !(0.0..=5.0).contains(&self.rating) {
            return Err(WenwenError::Validation(format!(
                "rating {} is outside 0..=5",
                self.rating
            )));
        }
        Ok(Store {
            id: self.id.unwrap_or(0),
            name,
            category,
            subcategory: self.subcategory,
            address: self.address,
            phone: self.phone,
            business_hours: self.business_hours,
            features: self.features,
            is_trusted: self.is_trusted,
            has_discount: self.has_discount,
            is_partner: self.is_partner,
            rating: self.rating,
            approval: self.approval,
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApprovalRequest {
    pub approval: Approval,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SavedResponse {
    pub id: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeletedResponse {
    pub id: i64,
    pub deleted: bool,
}

fn not_found(what: &str, id: i64) -> ApiError {
    WenwenError::NotFound(format!("{} {}", what, id)).into()
}

// ============================================================================
// Routes
// ============================================================================

pub fn admin_routes() -> Router<AppStateArc> {
    Router::new()
        .route("/admin/login", post(login))
        .route("/admin/stores", get(list_stores).post(save_store))
        .route("/admin/stores/:id", delete(delete_store))
        .route("/admin/stores/:id/approval", post(set_approval))
        .route("/admin/faqs", get(list_faqs).post(save_faq))
        .route("/admin/faqs/:id", delete(delete_faq))
        .route(
            "/admin/quick-questions",
            get(list_quick_questions).post(save_quick_question),
        )
        .route("/admin/quick-questions/:id", delete(delete_quick_question))
        .route("/admin/training", get(list_training).post(add_training))
        .route("/admin/training/evaluate", post(evaluate_training))
}

async fn login(State(state): State<AppStateArc>, body: Bytes) -> ApiResult<LoginResponse> {
    let req: LoginRequest = parse_body(&body)?;
    if req.username.trim().is_empty() {
        return Err(WenwenError::MissingField("username".to_string()).into());
    }
    if req.password.is_empty() {
        return Err(WenwenError::MissingField("password".to_string()).into());
    }

    let session_length = Duration::hours(state.config.admin.session_hours);
    let (admin_id, token, expires_at) = with_db(&state, move |db| {
        let admin_id = db
            .verify_admin(&req.username, &req.password)
            .map_err(|e| storage_error("Failed to verify admin", e))?
            .ok_or_else(|| {
                warn!("  Failed admin login for {}", req.username.trim());
                WenwenError::Unauthorized("invalid credentials".to_string())
            })?;
        let (token, expires_at) = db
            .create_admin_session(admin_id, session_length)
            .map_err(|e| storage_error("Failed to create admin session", e))?;
        Ok((admin_id, token, expires_at))
    })
    .await?;
    info!("  Admin {} logged in", admin_id);

    Ok(Json(LoginResponse { token, expires_at }))
}

// --- stores ---

async fn list_stores(State(state): State<AppStateArc>, headers: HeaderMap) -> ApiResult<Vec<Store>> {
    require_admin(&state, &headers).await?;
    let stores = with_db(&state, |db| {
        db.list_stores()
            .map_err(|e| storage_error("Failed to list stores", e))
    })
    .await?;
    Ok(Json(stores))
}

async fn save_store(
    State(state): State<AppStateArc>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<SavedResponse> {
    let admin_id = require_admin(&state, &headers).await?;
    let input: StoreInput = parse_body(&body)?;
    let store = input.into_store()?;
    let name = store.name.clone();

    let id = with_db(&state, move |db| {
        if store.id > 0 {
            let updated = db
                .update_store(&store)
                .map_err(|e| storage_error("Failed to update store", e))?;
            if !updated {
                return Err(WenwenError::NotFound(format!("store {}", store.id)));
            }
            Ok(store.id)
        } else {
            db.insert_store(&store)
                .map_err(|e| storage_error("Failed to insert store", e))
        }
    })
    .await?;

    state.catalog.invalidate_stores();
    info!("  Admin {} saved store {} ({})", admin_id, id, name);
    Ok(Json(SavedResponse { id }))
}

async fn delete_store(
    State(state): State<AppStateArc>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> ApiResult<DeletedResponse> {
    require_admin(&state, &headers).await?;
    let deleted = with_db(&state, move |db| {
        db.delete_store(id)
            .map_err(|e| storage_error("Failed to delete store", e))
    })
    .await?;
    if !deleted {
        return Err(not_found("store", id));
    }
    state.catalog.invalidate_stores();
    Ok(Json(DeletedResponse { id, deleted }))
}

async fn set_approval(
    State(state): State<AppStateArc>,
    headers: HeaderMap,
    Path(id): Path<i64>,
    body: Bytes,
) -> ApiResult<Store> {
    let admin_id = require_admin(&state, &headers).await?;
    let req: ApprovalRequest = parse_body(&body)?;
    let approval = req.approval;

    let store = with_db(&state, move |db| {
        let changed = db
            .set_store_approval(id, approval)
            .map_err(|e| storage_error("Failed to update approval", e))?;
        if !changed {
            return Ok(None);
        }
        db.get_store(id)
            .map_err(|e| storage_error("Failed to load store", e))
    })
    .await?
    .ok_or_else(|| not_found("store", id))?;

    state.catalog.invalidate_stores();
    info!("  Admin {} marked store {} as {}", admin_id, id, approval);
    Ok(Json(store))
}

// --- faqs ---

async fn list_faqs(State(state): State<AppStateArc>, headers: HeaderMap) -> ApiResult<Vec<Faq>> {
    require_admin(&state, &headers).await?;
    let faqs = with_db(&state, |db| {
        db.list_faqs(false)
            .map_err(|e| storage_error("Failed to list FAQs", e))
    })
    .await?;
    Ok(Json(faqs))
}

async fn save_faq(
    State(state): State<AppStateArc>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<SavedResponse> {
    require_admin(&state, &headers).await?;
    let faq: Faq = parse_body(&body)?;
    if faq.question.trim().is_empty() {
        return Err(WenwenError::MissingField("question".to_string()).into());
    }
    if faq.answer.trim().is_empty() {
        return Err(WenwenError::MissingField("answer".to_string()).into());
    }

    let faq_id = faq.id;
    let id = with_db(&state, move |db| {
        db.save_faq(&faq)
            .map_err(|e| storage_error("Failed to save FAQ", e))
    })
    .await?
    .ok_or_else(|| not_found("faq", faq_id))?;
    state.catalog.invalidate_faqs();
    Ok(Json(SavedResponse { id }))
}

async fn delete_faq(
    State(state): State<AppStateArc>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> ApiResult<DeletedResponse> {
    require_admin(&state, &headers).await?;
    let deleted = with_db(&state, move |db| {
        db.delete_faq(id)
            .map_err(|e| storage_error("Failed to delete FAQ", e))
    })
    .await?;
    if !deleted {
        return Err(not_found("faq", id));
    }
    state.catalog.invalidate_faqs();
    Ok(Json(DeletedResponse { id, deleted }))
}

// --- quick questions ---

async fn list_quick_questions(
    State(state): State<AppStateArc>,
    headers: HeaderMap,
) -> ApiResult<Vec<QuickQuestion>> {
    require_admin(&state, &headers).await?;
    let questions = with_db(&state, |db| {
        db.list_quick_questions(false)
            .map_err(|e| storage_error("Failed to list quick questions", e))
    })
    .await?;
    Ok(Json(questions))
}

async fn save_quick_question(
    State(state): State<AppStateArc>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<SavedResponse> {
    require_admin(&state, &headers).await?;
    let question: QuickQuestion = parse_body(&body)?;
    if question.text.trim().is_empty() {
        return Err(WenwenError::MissingField("text".to_string()).into());
    }

    let question_id = question.id;
    let id = with_db(&state, move |db| {
        db.save_quick_question(&question)
            .map_err(|e| storage_error("Failed to save quick question", e))
    })
    .await?
    .ok_or_else(|| not_found("quick question", question_id))?;
    state.catalog.invalidate_quick_questions();
    Ok(Json(SavedResponse { id }))
}

async fn delete_quick_question(
    State(state): State<AppStateArc>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> ApiResult<DeletedResponse> {
    require_admin(&state, &headers).await?;
    let deleted = with_db(&state, move |db| {
        db.delete_quick_question(id)
            .map_err(|e| storage_error("Failed to delete quick question", e))
    })
    .await?;
    if !deleted {
        return Err(not_found("quick question", id));
    }
    state.catalog.invalidate_quick_questions();
    Ok(Json(DeletedResponse { id, deleted }))
}

// --- training ---

async fn list_training(
    State(state): State<AppStateArc>,
    headers: HeaderMap,
) -> ApiResult<Vec<TrainingExample>> {
    require_admin(&state, &headers).await?;
    let examples = with_db(&state, |db| {
        db.list_training()
            .map_err(|e| storage_error("Failed to list training data", e))
    })
    .await?;
    Ok(Json(examples))
}

async fn add_training(
    State(state): State<AppStateArc>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<SavedResponse> {
    require_admin(&state, &headers).await?;
    let example: TrainingExample = parse_body(&body)?;
    if example.query.trim().is_empty() {
        return Err(WenwenError::MissingField("query".to_string()).into());
    }
    let id = with_db(&state, move |db| {
        db.insert_training(&example)
            .map_err(|e| storage_error("Failed to save training example", e))
    })
    .await?;
    Ok(Json(SavedResponse { id }))
}

async fn evaluate_training(
    State(state): State<AppStateArc>,
    headers: HeaderMap,
) -> ApiResult<TrainingReport> {
    require_admin(&state, &headers).await?;
    let pipeline = state.pipeline.clone();
    let report = with_db(&state, move |db| {
        let examples = db
            .list_training()
            .map_err(|e| storage_error("Failed to list training data", e))?;
        Ok(evaluate(pipeline.classifier(), &examples))
    })
    .await?;
    info!(
        "  Training evaluation: {}/{} correct ({:.2})",
        report.correct, report.total, report.accuracy
    );
    Ok(Json(report))
}
