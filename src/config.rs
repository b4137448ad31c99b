use std::net::IpAddr;

use anyhow::Context;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub database_url: String,
    /// Max pooled connections to the store.
    /// Set via TOKENGATE_DB_MAX_CONNECTIONS env var. Default: 5.
    pub db_max_connections: u32,
    pub host: IpAddr,
    pub port: u16,
    /// Telegram bot token. Only the `bot` subcommand needs it.
    pub bot_token: Option<String>,
    /// Telegram user id of the single administrator.
    pub admin_id: Option<i64>,
    /// Seconds between expiry sweeps.
    /// Set via TOKENGATE_SWEEP_INTERVAL_SECS env var. Default: 300.
    pub sweep_interval_secs: u64,
}

impl Config {
    /// Bot credentials, or an error naming what is missing.
    pub fn bot_credentials(&self) -> anyhow::Result<(&str, i64)> {
        let token = self
            .bot_token
            .as_deref()
            .context("TOKENGATE_BOT_TOKEN is not set")?;
        let admin = self.admin_id.context("TOKENGATE_ADMIN_ID is not set")?;
        Ok((token, admin))
    }
}

pub fn load() -> anyhow::Result<Config> {
    dotenvy::dotenv().ok();
    from_lookup(|key| std::env::var(key).ok())
}

/// Build a config from an arbitrary key lookup.
pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Config> {
    let sweep_interval_secs = parse_or(&lookup, "TOKENGATE_SWEEP_INTERVAL_SECS", 300)?;
    if sweep_interval_secs == 0 {
        anyhow::bail!("TOKENGATE_SWEEP_INTERVAL_SECS must be greater than zero");
    }

    Ok(Config {
        database_url: lookup("DATABASE_URL")
            .unwrap_or_else(|| "postgres://localhost/tokengate".into()),
        db_max_connections: parse_or(&lookup, "TOKENGATE_DB_MAX_CONNECTIONS", 5)?,
        host: parse_or(&lookup, "TOKENGATE_HOST", IpAddr::from([127, 0, 0, 1]))?,
        port: parse_or(&lookup, "TOKENGATE_PORT", 1830)?,
        bot_token: lookup("TOKENGATE_BOT_TOKEN").filter(|s| !s.trim().is_empty()),
        admin_id: lookup("TOKENGATE_ADMIN_ID")
            .map(|v| {
                v.trim()
                    .parse::<i64>()
                    .with_context(|| format!("TOKENGATE_ADMIN_ID is not a valid user id: {}", v))
            })
            .transpose()?,
        sweep_interval_secs,
    })
}

fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> anyhow::Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| anyhow::anyhow!("invalid {}={:?}: {}", key, raw, e)),
        None => Ok(default),
    }
}
