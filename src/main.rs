use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tokengate::admin::bot::AdminBot;
use tokengate::admin::messages::format_timestamp;
use tokengate::admin::telegram::TelegramClient;
use tokengate::admin::{AdminGuard, AdminService};
use tokengate::api::{self, AppState};
use tokengate::client::ValidationClient;
use tokengate::lifecycle::LifecycleManager;
use tokengate::models::token::mask_secret;
use tokengate::store::postgres::PgStore;
use tokengate::store::TokenStore;
use tokengate::{cli, config, jobs};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // OTLP export only when an endpoint is configured; stdout logging always.
    use opentelemetry::KeyValue;
    use opentelemetry_sdk::{trace as sdktrace, Resource};

    let telemetry_layer = if std::env::var("OTEL_EXPORTER_OTLP_ENDPOINT").is_ok() {
        let tracer = opentelemetry_otlp::new_pipeline()
            .tracing()
            .with_exporter(opentelemetry_otlp::new_exporter().tonic())
            .with_trace_config(sdktrace::config().with_resource(Resource::new(vec![
                KeyValue::new("service.name", "tokengate"),
            ])))
            .install_batch(opentelemetry_sdk::runtime::Tokio)
            .context("failed to install OpenTelemetry tracer")?;
        Some(tracing_opentelemetry::layer().with_tracer(tracer))
    } else {
        None
    };

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "tokengate=debug,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .with(telemetry_layer)
        .init();

    let cfg = config::load()?;
    let args = cli::Cli::parse();

    let result = match args.command {
        Some(cli::Commands::Serve { port }) => {
            let port = port.unwrap_or(cfg.port);
            run_server(cfg, port).await
        }
        Some(cli::Commands::Bot) => run_bot(cfg).await,
        Some(cli::Commands::Token { command }) => {
            let tokens = connect_tokens(&cfg).await?;
            handle_token_command(command, &tokens).await
        }
        Some(cli::Commands::Check { token, url }) => check_token(&url, &token).await,
        None => {
            let port = cfg.port;
            run_server(cfg, port).await
        }
    };

    if let Err(ref e) = result {
        eprintln!("Error: {:?}", e);
    }
    result
}

async fn connect_tokens(cfg: &config::Config) -> anyhow::Result<LifecycleManager> {
    tracing::info!("Connecting to database...");
    let store = PgStore::connect(&cfg.database_url, cfg.db_max_connections)
        .await
        .context("failed to connect to token store")?;

    tracing::info!("Ensuring schema...");
    store.initialize().await?;

    Ok(LifecycleManager::new(Arc::new(store)))
}

async fn run_server(cfg: config::Config, port: u16) -> anyhow::Result<()> {
    let tokens = connect_tokens(&cfg).await?;
    let cancel = CancellationToken::new();

    let sweeper = jobs::sweep::spawn(
        tokens.clone(),
        Duration::from_secs(cfg.sweep_interval_secs),
        cancel.clone(),
    );
    tracing::info!(
        "Background sweep job started (every {}s)",
        cfg.sweep_interval_secs
    );

    let app = api::router(Arc::new(AppState { tokens }));

    let addr = SocketAddr::new(cfg.host, port);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Tokengate validation endpoint listening on {}", addr);

    tokio::spawn(cancel_on_ctrl_c(cancel.clone()));
    let shutdown = cancel.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;

    cancel.cancel();
    sweeper.await?;
    Ok(())
}

async fn run_bot(cfg: config::Config) -> anyhow::Result<()> {
    let (bot_token, admin_id) = cfg.bot_credentials()?;
    let client = TelegramClient::new(bot_token);
    let tokens = connect_tokens(&cfg).await?;
    let cancel = CancellationToken::new();

    let sweeper = jobs::sweep::spawn(
        tokens.clone(),
        Duration::from_secs(cfg.sweep_interval_secs),
        cancel.clone(),
    );
    tracing::info!(
        "Background sweep job started (every {}s)",
        cfg.sweep_interval_secs
    );

    let bot = AdminBot::new(client, AdminService::new(tokens, AdminGuard::new(admin_id)));

    tokio::spawn(cancel_on_ctrl_c(cancel.clone()));
    let outcome = bot.run(cancel.clone()).await;

    cancel.cancel();
    sweeper.await?;
    outcome?;
    Ok(())
}

async fn cancel_on_ctrl_c(cancel: CancellationToken) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to listen for shutdown signal: {}", e);
        return;
    }
    tracing::info!("Shutdown requested");
    cancel.cancel();
}

async fn handle_token_command(
    cmd: cli::TokenCommands,
    tokens: &LifecycleManager,
) -> anyhow::Result<()> {
    match cmd {
        cli::TokenCommands::Create { ttl, bound_address } => {
            let issued = tokens.create(ttl, bound_address).await?;
            println!(
                "Token created:\n  Token:   {}\n  Expires: {}",
                issued.secret,
                format_timestamp(&issued.expiration)
            );
        }
        cli::TokenCommands::List => {
            let records = tokens.list().await?;
            if records.is_empty() {
                println!("No tokens found.");
            } else {
                println!(
                    "{:<8} {:<14} {:<24} {:<16}",
                    "ID", "TOKEN", "EXPIRES", "BOUND ADDRESS"
                );
                for r in records {
                    println!(
                        "{:<8} {:<14} {:<24} {:<16}",
                        r.id,
                        mask_secret(&r.secret),
                        format_timestamp(&r.expiration),
                        r.bound_address.as_deref().unwrap_or("-")
                    );
                }
            }
        }
        cli::TokenCommands::Sweep => {
            let removed = tokens.sweep().await?;
            println!("Removed {} expired token(s).", removed);
        }
    }
    Ok(())
}

async fn check_token(url: &str, token: &str) -> anyhow::Result<()> {
    let client = ValidationClient::new(url);
    match client.check(token).await? {
        Some(info) => println!(
            "Token valid:\n  Expires:   {}\n  Remaining: {:.0}s",
            format_timestamp(&info.expiration),
            info.remaining_time
        ),
        None => println!("Token rejected."),
    }
    Ok(())
}
