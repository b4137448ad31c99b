//! Durable token persistence.
//!
//! Every method is a self-contained transaction. Callers in different
//! processes share nothing but the store itself.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::errors::StoreError;
use crate::models::token::{NewToken, TokenRecord};

pub mod memory;
pub mod postgres;

#[async_trait]
pub trait TokenStore: Send + Sync {
    /// Create the schema if missing. Safe on every start; never drops data.
    async fn initialize(&self) -> Result<(), StoreError>;

    /// Persist a new record. Fails with `DuplicateToken` if the secret exists.
    async fn insert(&self, token: &NewToken) -> Result<i64, StoreError>;

    /// Exact, case-sensitive lookup.
    async fn find_by_secret(&self, secret: &str) -> Result<Option<TokenRecord>, StoreError>;

    /// Delete every record with `expiration <= reference`. Returns the count removed.
    async fn delete_expired(&self, reference: DateTime<Utc>) -> Result<u64, StoreError>;

    /// All records ordered by id. Administrative use only.
    async fn list_all(&self) -> Result<Vec<TokenRecord>, StoreError>;
}
