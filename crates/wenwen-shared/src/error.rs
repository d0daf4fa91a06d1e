//! Error types for 高文文.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum WenwenError {
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl WenwenError {
    /// Stable machine-readable code for API payloads
    pub fn code(&self) -> &'static str {
        match self {
            WenwenError::Validation(_) => "VALIDATION_ERROR",
            WenwenError::MissingField(_) => "MINIMAL_FUNCTION_ERROR",
            WenwenError::Config(_) => "CONFIG_ERROR",
            WenwenError::Unauthorized(_) => "UNAUTHORIZED",
            WenwenError::NotFound(_) => "NOT_FOUND",
            WenwenError::Database(_) => "DATABASE_ERROR",
            WenwenError::Json(_) => "INVALID_JSON",
            WenwenError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// HTTP status code for this error
    pub fn status(&self) -> u16 {
        match self {
            WenwenError::Validation(_) | WenwenError::MissingField(_) | WenwenError::Json(_) => 400,
            WenwenError::Unauthorized(_) => 401,
            WenwenError::NotFound(_) => 404,
            WenwenError::Config(_) | WenwenError::Database(_) | WenwenError::Internal(_) => 500,
        }
    }

    /// Friendly message safe to show end users. Never includes internals.
    pub fn user_message(&self) -> String {
        match self {
            WenwenError::Validation(detail) => format!("訊息格式有誤：{}", detail),
            WenwenError::MissingField(field) => format!("缺少必要欄位：{}", field),
            WenwenError::Json(_) => "訊息格式有誤，請重新傳送。".to_string(),
            WenwenError::Unauthorized(_) => "請先登入管理後台。".to_string(),
            WenwenError::NotFound(what) => format!("找不到指定的資料：{}", what),
            WenwenError::Config(_) | WenwenError::Database(_) | WenwenError::Internal(_) => {
                "高文文暫時無法處理您的請求，請稍後再試一次。".to_string()
            }
        }
    }

    /// Server-side failures that should be logged at error level
    pub fn is_server_error(&self) -> bool {
        self.status() >= 500
    }
}

pub type Result<T> = std::result::Result<T, WenwenError>;
