//! Catalog Backend - Item catalog service
//! Mission: Registered accounts, expiring bearer tokens, role-gated items

use anyhow::{Context, Result};
use catalog_backend::{
    build_router, middleware::RateLimitLayer, AppState, Config,
};
use clap::Parser;
use dotenv::dotenv;
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;
use tokio::{net::TcpListener, time::interval};
use tracing::{debug, error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize environment and logging
    load_env();
    init_tracing();

    let config = Config::parse();
    config.validate().context("Invalid configuration")?;

    info!("🚀 Catalog backend starting");

    let provider = config.open_storage()?;
    let settings = config.service_settings()?;
    info!(
        "🔐 Tokens live for {}h, bcrypt cost {}",
        settings.token_ttl.num_hours(),
        settings.bcrypt_cost
    );

    // Opening the stores hashes the decoy password, which is blocking work
    let state = tokio::task::spawn_blocking(move || AppState::open(&provider, &settings))
        .await
        .context("Startup task failed")?
        .context("Failed to open stores")?;

    bootstrap_admin(&config, &state).await?;

    if let Some(every) = config.token_sweep_interval() {
        tokio::spawn(token_sweep(state.clone(), every));
    }

    let limiter = RateLimitLayer::new(config.rate_limit());
    tokio::spawn(rate_limit_cleanup(limiter.clone()));

    let app = build_router(state, limiter);

    let listener = TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.bind_addr))?;
    info!("🎯 API server listening on {}", config.bind_addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("Server error")?;

    info!("👋 Catalog backend stopped");
    Ok(())
}

/// Create the configured admin account unless an admin already exists
async fn bootstrap_admin(config: &Config, state: &AppState) -> Result<()> {
    let (Some(username), Some(password)) =
        (config.admin_username.clone(), config.admin_password.clone())
    else {
        if !state.gate.accounts().has_admin() {
            warn!("⚠️  No admin account exists; set CATALOG_ADMIN_USERNAME/CATALOG_ADMIN_PASSWORD or register one");
        }
        return Ok(());
    };

    let accounts = state.gate.accounts().clone();
    let created = tokio::task::spawn_blocking(move || accounts.ensure_admin(&username, &password))
        .await
        .context("Admin bootstrap task failed")?
        .context("Failed to bootstrap admin account")?;

    if created.is_none() {
        debug!("Admin bootstrap skipped, an admin account already exists");
    }
    Ok(())
}

/// Periodically drop expired tokens from the token collection
async fn token_sweep(state: AppState, every: Duration) {
    let mut ticker = interval(every);
    ticker.tick().await; // first tick fires immediately

    loop {
        ticker.tick().await;

        let tokens = state.gate.tokens().clone();
        match tokio::task::spawn_blocking(move || tokens.purge_expired()).await {
            Ok(Ok(0)) => debug!("Token sweep: nothing expired"),
            Ok(Ok(purged)) => info!("🧹 Token sweep removed {} expired tokens", purged),
            Ok(Err(e)) => error!("Token sweep failed: {}", e),
            Err(e) => error!("Token sweep task failed: {}", e),
        }
    }
}

async fn rate_limit_cleanup(limiter: RateLimitLayer) {
    let mut ticker = interval(Duration::from_secs(60));
    loop {
        ticker.tick().await;
        limiter.cleanup();
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("🛑 Shutdown signal received");
}

/// Initialize tracing
fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "catalog_backend=debug,catalog=debug,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn load_env() {
    // 1) Standard dotenv search (cwd + parents)
    let _ = dotenv();

    // 2) Also try the crate directory when launched from elsewhere
    let manifest_env = Path::new(env!("CARGO_MANIFEST_DIR")).join(".env");
    if manifest_env.exists() {
        let _ = dotenv::from_path(&manifest_env);
    }
}
