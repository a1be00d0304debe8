//! Prodsync REST API Server
//!
//! This binary starts the prodsync REST API server, exposing endpoints for
//! loading the remote product catalogue and monitoring ingestion.

use std::net::SocketAddr;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use dotenvy::dotenv;
use sqlx::postgres::PgPoolOptions;
use tokio::net::TcpListener;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use prodsync_client::ProductApiClient;
use prodsync_core::{IngestConfig, SourceConfig};
use prodsync_db::ProductRepository;

use prodsync_server::{AppState, ServerConfig, create_router, spawn_startup_load};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenv().ok();

    // Initialize logging
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    // Parse command line arguments
    let config = ServerConfig::parse();

    // Connect to database
    info!("Connecting to database...");
    let pool = PgPoolOptions::new()
        .max_connections(config.db_max_connections)
        .connect(&config.database_url)
        .await
        .context("Failed to connect to database")?;
    info!("Database connection established");

    ProductRepository::new(pool.clone())
        .migrate()
        .await
        .context("Failed to apply database migrations")?;

    // Initialize catalogue client
    let mut source_config = SourceConfig::from_env();
    if let Some(base_url) = &config.source_base_url {
        source_config = source_config.with_base_url(base_url);
    }
    let api_client = ProductApiClient::from_config(source_config)
        .context("Failed to initialize catalogue client")?;
    info!("Remote catalogue at {}", api_client.base_url());

    // Create shutdown token for graceful shutdown
    let shutdown_token = CancellationToken::new();

    // Create application state
    let app_state = AppState::new(
        pool,
        api_client,
        IngestConfig::from_env(),
        shutdown_token.clone(),
    );

    // Detached: the task only logs the outcome and stops waiting on shutdown
    let _startup = spawn_startup_load(&app_state, config.load_on_startup).await;

    // Build router
    let app = create_router(app_state, &config);

    // Bind to address
    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .context("Invalid address")?;

    let listener = TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;

    info!("Starting prodsync API server on http://{}", addr);
    info!("Swagger UI available at http://{}/swagger-ui", addr);

    // Start server with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown_token))
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal(shutdown_token: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received, starting graceful shutdown...");

    shutdown_token.cancel();

    // Give in-flight requests a moment to finish
    tokio::time::sleep(Duration::from_secs(2)).await;
}
