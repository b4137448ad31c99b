use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use crate::errors::StoreError;
use crate::models::token::{NewToken, TokenRecord};
use crate::store::TokenStore;

/// In-process store keyed by secret. Not shared across processes; used by
/// tests and single-process runs.
#[derive(Clone, Default)]
pub struct MemoryStore {
    records: Arc<DashMap<String, TokenRecord>>,
    next_id: Arc<AtomicI64>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Overwrite a record's expiration. Test hook only; records are otherwise immutable.
    #[cfg(any(test, feature = "test-hooks"))]
    pub fn set_expiration(&self, secret: &str, expiration: DateTime<Utc>) -> bool {
        match self.records.get_mut(secret) {
            Some(mut rec) => {
                rec.expiration = expiration;
                true
            }
            None => false,
        }
    }
}

#[async_trait]
impl TokenStore for MemoryStore {
    async fn initialize(&self) -> Result<(), StoreError> {
        Ok(())
    }

    async fn insert(&self, token: &NewToken) -> Result<i64, StoreError> {
        // The entry guard holds the shard lock, so check-and-insert is atomic.
        match self.records.entry(token.secret.clone()) {
            Entry::Occupied(_) => Err(StoreError::DuplicateToken),
            Entry::Vacant(slot) => {
                let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
                slot.insert(TokenRecord {
                    id,
                    secret: token.secret.clone(),
                    expiration: token.expiration,
                    bound_address: token.bound_address.clone(),
                });
                Ok(id)
            }
        }
    }

    async fn find_by_secret(&self, secret: &str) -> Result<Option<TokenRecord>, StoreError> {
        Ok(self.records.get(secret).map(|r| r.value().clone()))
    }

    async fn delete_expired(&self, reference: DateTime<Utc>) -> Result<u64, StoreError> {
        let mut removed = 0u64;
        self.records.retain(|_, rec| {
            if rec.is_expired_at(reference) {
                removed += 1;
                false
            } else {
                true
            }
        });
        Ok(removed)
    }

    async fn list_all(&self) -> Result<Vec<TokenRecord>, StoreError> {
        let mut rows: Vec<TokenRecord> = self.records.iter().map(|r| r.value().clone()).collect();
        rows.sort_by_key(|r| r.id);
        Ok(rows)
    }
}
