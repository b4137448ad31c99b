use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::TokenError;

/// TTL presets offered by the admin menu: (label, seconds).
pub const TTL_PRESETS: [(&str, i64); 3] = [
    ("1 час", 3_600),
    ("24 часа", 86_400),
    ("48 часов", 172_800),
];

/// A persisted token. Immutable once inserted.
#[derive(Clone, PartialEq, sqlx::FromRow, Serialize, Deserialize)]
pub struct TokenRecord {
    pub id: i64,
    pub secret: String,
    pub expiration: DateTime<Utc>,
    pub bound_address: Option<String>,
}

impl TokenRecord {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expiration <= now
    }
}

// Secrets never reach logs in full.
impl fmt::Debug for TokenRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenRecord")
            .field("id", &self.id)
            .field("secret", &mask_secret(&self.secret))
            .field("expiration", &self.expiration)
            .field("bound_address", &self.bound_address)
            .finish()
    }
}

/// Insert payload for the store.
#[derive(Clone)]
pub struct NewToken {
    pub secret: String,
    pub expiration: DateTime<Utc>,
    pub bound_address: Option<String>,
}

/// Result of a successful `create`. The only place the full secret is handed out.
#[derive(Clone, Serialize)]
pub struct IssuedToken {
    pub id: i64,
    pub secret: String,
    pub expiration: DateTime<Utc>,
}

impl fmt::Debug for IssuedToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IssuedToken")
            .field("id", &self.id)
            .field("secret", &mask_secret(&self.secret))
            .field("expiration", &self.expiration)
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InvalidReason {
    NotFound,
    Expired,
}

/// Outcome of `validate`. Rejections are values, not errors.
#[derive(Debug, Clone, PartialEq)]
pub enum Validation {
    Valid {
        secret: String,
        expiration: DateTime<Utc>,
        remaining_seconds: f64,
        bound_address: Option<String>,
    },
    Invalid(InvalidReason),
}

impl Validation {
    pub fn is_valid(&self) -> bool {
        matches!(self, Validation::Valid { .. })
    }
}

/// Parse a freeform time-to-live in seconds. Only a positive integer passes.
pub fn parse_ttl(input: &str) -> Result<i64, TokenError> {
    let trimmed = input.trim();
    if trimmed.is_empty() || !trimmed.bytes().all(|b| b.is_ascii_digit()) {
        return Err(TokenError::InvalidInput(format!(
            "time-to-live must be a positive integer, got {:?}",
            trimmed
        )));
    }
    let ttl: i64 = trimmed
        .parse()
        .map_err(|_| TokenError::InvalidInput(format!("time-to-live out of range: {}", trimmed)))?;
    if ttl <= 0 {
        return Err(TokenError::InvalidInput(
            "time-to-live must be greater than zero".into(),
        ));
    }
    Ok(ttl)
}

/// `abcd…wxyz` form used in logs and listings.
pub fn mask_secret(secret: &str) -> String {
    let chars: Vec<char> = secret.chars().collect();
    if chars.len() > 8 {
        let head: String = chars[..4].iter().collect();
        let tail: String = chars[chars.len() - 4..].iter().collect();
        format!("{}…{}", head, tail)
    } else {
        "****".to_string()
    }
}
