//! Token lifecycle: create, validate, sweep.
//!
//! The manager holds no state of its own beyond handles to the store and the
//! secret generator. All consistency comes from the store's transactions, so
//! any number of managers (in any number of processes) may run side by side.

use std::sync::Arc;

use chrono::{DateTime, Duration, SubsecRound, Utc};
use tracing::{debug, error, info, warn};

use crate::errors::{StoreError, TokenError};
use crate::generator::{OsRngGenerator, SecretGenerator};
use crate::models::token::{mask_secret, InvalidReason, IssuedToken, NewToken, TokenRecord, Validation};
use crate::store::TokenStore;

/// Attempts before a run of secret collisions is treated as fatal.
pub const MAX_INSERT_ATTEMPTS: u32 = 5;

#[derive(Clone)]
pub struct LifecycleManager {
    store: Arc<dyn TokenStore>,
    generator: Arc<dyn SecretGenerator>,
}

impl LifecycleManager {
    pub fn new(store: Arc<dyn TokenStore>) -> Self {
        Self::with_generator(store, Arc::new(OsRngGenerator))
    }

    pub fn with_generator(store: Arc<dyn TokenStore>, generator: Arc<dyn SecretGenerator>) -> Self {
        Self { store, generator }
    }

    /// Issue a token that expires `ttl_seconds` from now.
    pub async fn create(
        &self,
        ttl_seconds: i64,
        bound_address: Option<String>,
    ) -> Result<IssuedToken, TokenError> {
        self.create_at(ttl_seconds, bound_address, Utc::now()).await
    }

    /// Issue a token that expires `ttl_seconds` after `now`.
    pub async fn create_at(
        &self,
        ttl_seconds: i64,
        bound_address: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<IssuedToken, TokenError> {
        if ttl_seconds <= 0 {
            return Err(TokenError::InvalidInput(format!(
                "time-to-live must be positive, got {}",
                ttl_seconds
            )));
        }
        let expiration = Duration::try_seconds(ttl_seconds)
            .and_then(|ttl| now.checked_add_signed(ttl))
            .ok_or_else(|| {
                TokenError::InvalidInput(format!("time-to-live too large: {}", ttl_seconds))
            })?
            // Postgres keeps microseconds; report what the store will hand back.
            .trunc_subsecs(6);

        for attempt in 1..=MAX_INSERT_ATTEMPTS {
            let token = NewToken {
                secret: self.generator.generate()?,
                expiration,
                bound_address: bound_address.clone(),
            };
            match self.store.insert(&token).await {
                Ok(id) => {
                    info!(
                        id,
                        secret = %mask_secret(&token.secret),
                        expiration = %expiration,
                        "token issued"
                    );
                    return Ok(IssuedToken {
                        id,
                        secret: token.secret,
                        expiration,
                    });
                }
                Err(StoreError::DuplicateToken) => {
                    warn!(attempt, "generated secret collided, regenerating");
                }
                Err(e) => return Err(e.into()),
            }
        }

        error!(
            attempts = MAX_INSERT_ATTEMPTS,
            "secret collisions exhausted retries; refusing to issue"
        );
        Err(TokenError::CollisionLimit {
            attempts: MAX_INSERT_ATTEMPTS,
        })
    }

    /// Check a presented secret against the current time. Never mutates the store.
    pub async fn validate(&self, secret: &str) -> Result<Validation, TokenError> {
        self.validate_at(secret, Utc::now()).await
    }

    pub async fn validate_at(
        &self,
        secret: &str,
        now: DateTime<Utc>,
    ) -> Result<Validation, TokenError> {
        let Some(record) = self.store.find_by_secret(secret).await? else {
            debug!(secret = %mask_secret(secret), "validation: not found");
            return Ok(Validation::Invalid(InvalidReason::NotFound));
        };

        let remaining = record.expiration - now;
        if remaining <= Duration::zero() {
            // Left in place: purging is the sweep's job.
            debug!(id = record.id, "validation: expired");
            return Ok(Validation::Invalid(InvalidReason::Expired));
        }

        Ok(Validation::Valid {
            secret: record.secret,
            expiration: record.expiration,
            remaining_seconds: remaining_seconds(remaining),
            bound_address: record.bound_address,
        })
    }

    /// Purge every record expired as of now.
    pub async fn sweep(&self) -> Result<u64, TokenError> {
        self.sweep_at(Utc::now()).await
    }

    pub async fn sweep_at(&self, now: DateTime<Utc>) -> Result<u64, TokenError> {
        let removed = self.store.delete_expired(now).await?;
        if removed > 0 {
            info!(removed, "swept expired tokens");
        }
        Ok(removed)
    }

    pub async fn list(&self) -> Result<Vec<TokenRecord>, TokenError> {
        Ok(self.store.list_all().await?)
    }
}

fn remaining_seconds(remaining: Duration) -> f64 {
    match remaining.num_microseconds() {
        Some(us) => us as f64 / 1_000_000.0,
        None => remaining.num_seconds() as f64,
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::store::memory::MemoryStore;

    fn manager() -> (LifecycleManager, MemoryStore) {
        let store = MemoryStore::new();
        (LifecycleManager::new(Arc::new(store.clone())), store)
    }

    /// Always returns the same secret.
    struct FixedGenerator {
        calls: AtomicUsize,
    }

    impl SecretGenerator for FixedGenerator {
        fn generate(&self) -> Result<String, TokenError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok("fixed-secret-value-0000000000000000000000000".into())
        }
    }

    /// Repeats the first secret once, then yields fresh ones.
    struct CollideOnce {
        calls: AtomicUsize,
    }

    impl SecretGenerator for CollideOnce {
        fn generate(&self) -> Result<String, TokenError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(format!("secret-{}", n.saturating_sub(1)))
        }
    }

    #[tokio::test]
    async fn test_create_then_validate() {
        let (mgr, _) = manager();
        let now = Utc::now();
        let issued = mgr.create_at(60, None, now).await.unwrap();
        assert_eq!(issued.expiration, (now + Duration::seconds(60)).trunc_subsecs(6));

        match mgr.validate_at(&issued.secret, now).await.unwrap() {
            Validation::Valid { remaining_seconds, .. } => {
                assert!(remaining_seconds > 0.0 && remaining_seconds <= 60.0);
            }
            other => panic!("expected valid, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_expiration_has_microsecond_precision() {
        let (mgr, store) = manager();
        let now = DateTime::parse_from_rfc3339("2024-06-01T12:00:00.123456789Z")
            .unwrap()
            .with_timezone(&Utc);
        let issued = mgr.create_at(30, None, now).await.unwrap();

        assert_eq!(issued.expiration.timestamp_subsec_nanos(), 123_456_000);
        assert_eq!(store.list_all().await.unwrap()[0].expiration, issued.expiration);
    }

    #[tokio::test]
    async fn test_bound_address_echoed() {
        let (mgr, _) = manager();
        let issued = mgr.create(600, Some("203.0.113.7".into())).await.unwrap();
        match mgr.validate(&issued.secret).await.unwrap() {
            Validation::Valid { bound_address, .. } => {
                assert_eq!(bound_address.as_deref(), Some("203.0.113.7"))
            }
            other => panic!("expected valid, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_non_positive_ttl_rejected_before_store() {
        let (mgr, store) = manager();
        for ttl in [0, -1, i64::MIN] {
            let err = mgr.create(ttl, None).await.unwrap_err();
            assert!(matches!(err, TokenError::InvalidInput(_)));
        }
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_overflowing_ttl_rejected() {
        let (mgr, store) = manager();
        let err = mgr.create(i64::MAX, None).await.unwrap_err();
        assert!(matches!(err, TokenError::InvalidInput(_)));
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_unknown_secret_not_found() {
        let (mgr, _) = manager();
        assert_eq!(
            mgr.validate("never-issued").await.unwrap(),
            Validation::Invalid(InvalidReason::NotFound)
        );
    }

    #[tokio::test]
    async fn test_expired_reported_but_not_deleted() {
        let (mgr, store) = manager();
        let now = Utc::now();
        let issued = mgr.create_at(1, None, now).await.unwrap();

        let later = now + Duration::milliseconds(1100);
        assert_eq!(
            mgr.validate_at(&issued.secret, later).await.unwrap(),
            Validation::Invalid(InvalidReason::Expired)
        );
        assert_eq!(store.len(), 1);
        assert_eq!(mgr.list().await.unwrap().len(), 1);

        assert_eq!(mgr.sweep_at(later).await.unwrap(), 1);
        assert_eq!(
            mgr.validate_at(&issued.secret, later).await.unwrap(),
            Validation::Invalid(InvalidReason::NotFound)
        );
    }

    #[tokio::test]
    async fn test_expiration_instant_is_invalid() {
        let (mgr, _) = manager();
        let now = Utc::now();
        let issued = mgr.create_at(5, None, now).await.unwrap();
        assert_eq!(
            mgr.validate_at(&issued.secret, issued.expiration).await.unwrap(),
            Validation::Invalid(InvalidReason::Expired)
        );
    }

    #[tokio::test]
    async fn test_sweep_idempotent() {
        let (mgr, _) = manager();
        let now = Utc::now();
        mgr.create_at(1, None, now - Duration::seconds(10)).await.unwrap();
        assert_eq!(mgr.sweep().await.unwrap(), 1);
        assert_eq!(mgr.sweep().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_single_collision_recovered() {
        let store = MemoryStore::new();
        let gen = Arc::new(CollideOnce {
            calls: AtomicUsize::new(0),
        });
        let mgr = LifecycleManager::with_generator(Arc::new(store.clone()), gen.clone());

        let first = mgr.create(60, None).await.unwrap();
        let second = mgr.create(60, None).await.unwrap();
        assert_ne!(first.secret, second.secret);
        assert_eq!(gen.calls.load(Ordering::SeqCst), 3);
        assert_eq!(store.len(), 2);
    }

    #[tokio::test]
    async fn test_collision_exhaustion_is_fatal() {
        let store = MemoryStore::new();
        let gen = Arc::new(FixedGenerator {
            calls: AtomicUsize::new(0),
        });
        let mgr = LifecycleManager::with_generator(Arc::new(store.clone()), gen.clone());

        mgr.create(60, None).await.unwrap();
        let err = mgr.create(60, None).await.unwrap_err();
        assert!(matches!(
            err,
            TokenError::CollisionLimit {
                attempts: MAX_INSERT_ATTEMPTS
            }
        ));
        assert_eq!(gen.calls.load(Ordering::SeqCst), 1 + MAX_INSERT_ATTEMPTS as usize);
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_end_to_end_with_expiration_hook() {
        let (mgr, store) = manager();
        let issued = mgr.create(3600, None).await.unwrap();
        assert!(issued.secret.len() >= 43);
        let ahead = issued.expiration - Utc::now();
        assert!(ahead <= Duration::seconds(3600) && ahead > Duration::seconds(3590));

        match mgr.validate(&issued.secret).await.unwrap() {
            Validation::Valid { remaining_seconds, .. } => {
                assert!((3599.0..=3600.0).contains(&remaining_seconds));
            }
            other => panic!("expected valid, got {:?}", other),
        }
        assert_eq!(mgr.sweep().await.unwrap(), 0);

        assert!(store.set_expiration(&issued.secret, Utc::now() - Duration::seconds(1)));
        assert_eq!(mgr.sweep().await.unwrap(), 1);
        assert_eq!(
            mgr.validate(&issued.secret).await.unwrap(),
            Validation::Invalid(InvalidReason::NotFound)
        );
    }
}
