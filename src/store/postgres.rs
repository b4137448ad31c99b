use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

use crate::errors::StoreError;
use crate::models::token::{NewToken, TokenRecord};
use crate::store::TokenStore;

/// Postgres-backed store. Shared by the bot and the validation server.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub async fn connect(database_url: &str, max_connections: u32) -> anyhow::Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(Duration::from_secs(5))
            .connect(database_url)
            .await?;
        Ok(Self { pool })
    }
}

#[async_trait]
impl TokenStore for PgStore {
    /// Run pending migrations from the migrations/ directory.
    /// sqlx serializes concurrent runners with an advisory lock.
    async fn initialize(&self) -> Result<(), StoreError> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    async fn insert(&self, token: &NewToken) -> Result<i64, StoreError> {
        let id = sqlx::query_scalar::<_, i64>(
            r#"INSERT INTO tokens (secret, expiration, bound_address)
               VALUES ($1, $2, $3)
               RETURNING id"#,
        )
        .bind(&token.secret)
        .bind(token.expiration)
        .bind(&token.bound_address)
        .fetch_one(&self.pool)
        .await?;

        Ok(id)
    }

    async fn find_by_secret(&self, secret: &str) -> Result<Option<TokenRecord>, StoreError> {
        let row = sqlx::query_as::<_, TokenRecord>(
            "SELECT id, secret, expiration, bound_address FROM tokens WHERE secret = $1",
        )
        .bind(secret)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    async fn delete_expired(&self, reference: DateTime<Utc>) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM tokens WHERE expiration <= $1")
            .bind(reference)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    async fn list_all(&self) -> Result<Vec<TokenRecord>, StoreError> {
        let rows = sqlx::query_as::<_, TokenRecord>(
            "SELECT id, secret, expiration, bound_address FROM tokens ORDER BY id ASC",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }
}
