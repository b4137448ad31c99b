//! Client for a running validation endpoint.

use anyhow::Context;
use reqwest::{Client, StatusCode};

use crate::api::handlers::TokenInfo;

pub struct ValidationClient {
    http: Client,
    base_url: String,
}

impl ValidationClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// `Some(info)` when the endpoint accepts the token, `None` when it rejects it.
    pub async fn check(&self, token: &str) -> anyhow::Result<Option<TokenInfo>> {
        let resp = self
            .http
            .get(format!("{}/Tlogin", self.base_url))
            .query(&[("token", token)])
            .send()
            .await
            .context("failed to reach validation endpoint")?;

        let status = resp.status();
        if status == StatusCode::OK {
            let info = resp
                .json::<TokenInfo>()
                .await
                .context("malformed validation response")?;
            return Ok(Some(info));
        }
        if status.is_client_error() {
            tracing::debug!(%status, "token rejected");
            return Ok(None);
        }

        let body = resp.text().await.unwrap_or_default();
        anyhow::bail!("validation endpoint error: status={}, body={}", status, body);
    }
}
