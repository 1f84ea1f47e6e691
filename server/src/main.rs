//! Foodlink Server - Main Entry Point

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{info, warn};

use foodlink_server::db::{self, MemoryUserStore, PgUserStore, UserStore};
use foodlink_server::{api, config};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env before reading LOG_LEVEL
    dotenvy::dotenv().ok();
    let config = config::Config::from_env().context("Invalid configuration")?;

    // Initialize tracing
    let default_filter = format!(
        "foodlink_server={level},tower_http={level}",
        level = config.log_level
    );
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .json()
        .init();

    info!(
        version = env!("CARGO_PKG_VERSION"),
        environment = config.environment.as_str(),
        "Starting Foodlink Server"
    );

    if config.insecure_jwt_secret {
        warn!("JWT_SECRET is not set; using an insecure default signing secret");
    }

    // Initialize credential store
    let users: Arc<dyn UserStore> = match &config.database_url {
        Some(url) => {
            let pool = db::create_pool(url, &config)
                .await
                .context("Failed to connect to PostgreSQL")?;
            db::run_migrations(&pool).await?;
            Arc::new(PgUserStore::new(pool))
        }
        None => {
            warn!("DATABASE_URL is not set; running without database connection (in-memory store)");
            Arc::new(MemoryUserStore::new())
        }
    };

    // Build router
    let bind_address = config.bind_address.clone();
    let app = api::create_router(api::AppState::new(config, users));

    // Start server
    let listener = tokio::net::TcpListener::bind(&bind_address)
        .await
        .with_context(|| format!("Failed to bind {bind_address}"))?;
    info!(address = %bind_address, "Server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutdown complete");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Received shutdown signal, cleaning up...");
}
