use std::sync::Arc;

use axum::{
    extract::{rejection::QueryRejection, Query, State},
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::api::AppState;
use crate::errors::AppError;
use crate::models::token::{InvalidReason, Validation};

// ── Request / Response DTOs ──────────────────────────────────

#[derive(Deserialize)]
pub struct TokenQuery {
    pub token: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TokenInfo {
    pub token: String,
    pub expiration: DateTime<Utc>,
    pub bound_address: Option<String>,
    pub remaining_time: f64,
}

// ── Handlers ─────────────────────────────────────────────────

/// GET /Tlogin?token=... — report whether a token is currently valid
pub async fn token_info(
    State(state): State<Arc<AppState>>,
    query: Result<Query<TokenQuery>, QueryRejection>,
) -> Result<Json<TokenInfo>, AppError> {
    // The rejection text can echo query input; keep it out of the response.
    let Query(params) = query.map_err(|_| AppError::MalformedQuery)?;
    let token = params
        .token
        .filter(|t| !t.is_empty())
        .ok_or(AppError::MissingToken)?;

    match state.tokens.validate(&token).await? {
        Validation::Valid {
            secret,
            expiration,
            remaining_seconds,
            bound_address,
        } => Ok(Json(TokenInfo {
            token: secret,
            expiration,
            bound_address,
            remaining_time: remaining_seconds,
        })),
        Validation::Invalid(InvalidReason::NotFound) => Err(AppError::TokenNotFound),
        Validation::Invalid(InvalidReason::Expired) => Err(AppError::TokenExpired),
    }
}
