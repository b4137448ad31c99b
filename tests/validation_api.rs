//! Validation endpoint driven through the router without a socket.

use std::io::Write;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use chrono::{DateTime, Duration, Utc};
use serde_json::Value;
use tower::ServiceExt;
use tracing_subscriber::fmt::MakeWriter;

use tokengate::api::{router, AppState};
use tokengate::errors::StoreError;
use tokengate::lifecycle::LifecycleManager;
use tokengate::models::token::{NewToken, TokenRecord};
use tokengate::store::memory::MemoryStore;
use tokengate::store::TokenStore;

fn app_with(store: Arc<dyn TokenStore>) -> (axum::Router, LifecycleManager) {
    let tokens = LifecycleManager::new(store);
    (router(Arc::new(AppState { tokens: tokens.clone() })), tokens)
}

async fn get(app: axum::Router, uri: &str) -> (StatusCode, axum::http::HeaderMap, Value) {
    let resp = app
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = resp.status();
    let headers = resp.headers().clone();
    let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, headers, json)
}

/// Collects formatted log output in memory.
#[derive(Clone, Default)]
struct LogBuffer(Arc<Mutex<Vec<u8>>>);

impl LogBuffer {
    fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl Write for LogBuffer {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for LogBuffer {
    type Writer = LogBuffer;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

struct DownStore;

#[async_trait]
impl TokenStore for DownStore {
    async fn initialize(&self) -> Result<(), StoreError> {
        Err(StoreError::Unavailable("down".into()))
    }
    async fn insert(&self, _: &NewToken) -> Result<i64, StoreError> {
        Err(StoreError::Unavailable("down".into()))
    }
    async fn find_by_secret(&self, _: &str) -> Result<Option<TokenRecord>, StoreError> {
        Err(StoreError::Unavailable("down".into()))
    }
    async fn delete_expired(&self, _: DateTime<Utc>) -> Result<u64, StoreError> {
        Err(StoreError::Unavailable("down".into()))
    }
    async fn list_all(&self) -> Result<Vec<TokenRecord>, StoreError> {
        Err(StoreError::Unavailable("down".into()))
    }
}

#[tokio::test]
async fn test_valid_token_payload() {
    let (app, tokens) = app_with(Arc::new(MemoryStore::new()));
    let issued = tokens.create(3600, Some("198.51.100.4".into())).await.unwrap();

    let (status, headers, body) = get(app, &format!("/Tlogin?token={}", issued.secret)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["token"], issued.secret.as_str());
    assert_eq!(body["bound_address"], "198.51.100.4");
    let remaining = body["remaining_time"].as_f64().unwrap();
    assert!(remaining > 3590.0 && remaining <= 3600.0);
    let expiration: DateTime<Utc> = body["expiration"].as_str().unwrap().parse().unwrap();
    assert_eq!(expiration, issued.expiration);

    assert_eq!(headers["cache-control"], "no-store");
    assert!(headers.contains_key("x-request-id"));
}

#[tokio::test]
async fn test_null_bound_address() {
    let (app, tokens) = app_with(Arc::new(MemoryStore::new()));
    let issued = tokens.create(60, None).await.unwrap();
    let (status, _, body) = get(app, &format!("/Tlogin?token={}", issued.secret)).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["bound_address"].is_null());
}

#[tokio::test]
async fn test_missing_token() {
    for uri in ["/Tlogin", "/Tlogin?token="] {
        let (app, _) = app_with(Arc::new(MemoryStore::new()));
        let (status, _, body) = get(app, uri).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{}", uri);
        assert_eq!(body["error"], "Token is required");
    }
}

#[tokio::test]
async fn test_malformed_query_is_json_error() {
    let (app, _) = app_with(Arc::new(MemoryStore::new()));
    let (status, _, body) = get(app, "/Tlogin?token=a&token=b").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Malformed query string");
}

#[tokio::test]
async fn test_request_logs_omit_secret() {
    let logs = LogBuffer::default();
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::TRACE)
        .with_ansi(false)
        .with_writer(logs.clone())
        .finish();
    let _guard = tracing::subscriber::set_default(subscriber);

    let (app, tokens) = app_with(Arc::new(MemoryStore::new()));
    let issued = tokens.create(300, None).await.unwrap();
    let (status, _, _) = get(app.clone(), &format!("/Tlogin?token={}", issued.secret)).await;
    assert_eq!(status, StatusCode::OK);
    get(app, "/Tlogin?token=not-a-real-token-value").await;

    let output = logs.contents();
    assert!(output.contains("path=/Tlogin"), "request span missing:\n{}", output);
    assert!(!output.contains(&issued.secret), "secret leaked:\n{}", output);
    assert!(!output.contains("not-a-real-token-value"), "presented token leaked:\n{}", output);
}

#[tokio::test]
async fn test_unknown_token() {
    let (app, _) = app_with(Arc::new(MemoryStore::new()));
    let (status, _, body) = get(app, "/Tlogin?token=nope").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Token not found or invalid");
}

#[tokio::test]
async fn test_expired_token_not_deleted_by_lookup() {
    let store = MemoryStore::new();
    let (app, tokens) = app_with(Arc::new(store.clone()));
    let issued = tokens
        .create_at(5, None, Utc::now() - Duration::seconds(30))
        .await
        .unwrap();

    let (status, _, body) = get(app, &format!("/Tlogin?token={}", issued.secret)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Token has expired");
    assert_eq!(store.len(), 1);
}

#[tokio::test]
async fn test_store_outage_is_server_error() {
    let (app, _) = app_with(Arc::new(DownStore));
    let (status, _, body) = get(app, "/Tlogin?token=anything").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "internal server error");
}

#[tokio::test]
async fn test_healthz_and_unknown_route() {
    let (app, _) = app_with(Arc::new(MemoryStore::new()));
    let resp = app
        .clone()
        .oneshot(Request::builder().uri("/healthz").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let (status, _, _) = get(app, "/nowhere").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
