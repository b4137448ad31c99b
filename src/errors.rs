use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

/// Failures surfaced by a [`TokenStore`](crate::store::TokenStore).
#[derive(Debug, Error)]
pub enum StoreError {
    /// The secret is already present; the insert was rejected.
    #[error("duplicate token")]
    DuplicateToken,

    /// The backing store is unreachable or the transaction failed.
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        if is_unique_violation(&e) {
            StoreError::DuplicateToken
        } else {
            StoreError::Unavailable(e.to_string())
        }
    }
}

impl From<sqlx::migrate::MigrateError> for StoreError {
    fn from(e: sqlx::migrate::MigrateError) -> Self {
        StoreError::Unavailable(e.to_string())
    }
}

fn is_unique_violation(error: &sqlx::Error) -> bool {
    matches!(
        error,
        sqlx::Error::Database(db_error) if db_error.code().as_deref() == Some("23505")
    )
}

/// Failures of the lifecycle operations.
#[derive(Debug, Error)]
pub enum TokenError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error(transparent)]
    Store(#[from] StoreError),

    /// Every generated secret collided. Only a broken randomness source does this.
    #[error("secret collided on {attempts} consecutive attempts; randomness source is suspect")]
    CollisionLimit { attempts: u32 },

    #[error("secure randomness unavailable: {0}")]
    Randomness(String),
}

/// Failures talking to the Telegram Bot API.
#[derive(Debug, Error)]
pub enum BotError {
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    #[error("receive failed: {0}")]
    ReceiveFailed(String),

    #[error("send failed: {0}")]
    SendFailed(String),

    #[error("authentication failed: {0}")]
    AuthFailed(String),
}

/// Errors returned by the validation endpoint.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("token is required")]
    MissingToken,

    #[error("malformed query string")]
    MalformedQuery,

    #[error("token not found")]
    TokenNotFound,

    #[error("token expired")]
    TokenExpired,

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl From<TokenError> for AppError {
    fn from(e: TokenError) -> Self {
        match e {
            TokenError::Store(e) => AppError::Store(e),
            other => AppError::Internal(other.into()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, msg) = match &self {
            AppError::MissingToken => (StatusCode::BAD_REQUEST, "Token is required"),
            AppError::MalformedQuery => (StatusCode::BAD_REQUEST, "Malformed query string"),
            AppError::TokenNotFound => (StatusCode::BAD_REQUEST, "Token not found or invalid"),
            AppError::TokenExpired => (StatusCode::BAD_REQUEST, "Token has expired"),
            AppError::Store(e) => {
                tracing::error!("Store error: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "internal server error")
            }
            AppError::Internal(e) => {
                tracing::error!("Internal error: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "internal server error")
            }
        };

        (status, Json(json!({ "error": msg }))).into_response()
    }
}
