//! # Kho API
//!
//! REST server for the Kho back-office.
//!
//! ## Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          Kho API Server                                 │
//! │                                                                         │
//! │  Storefront / back-office ───► HTTP (8080) ───► Routes ───► SQLite     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use anyhow::Context;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

use kho_api::{app, AppState, KhoConfig};
use kho_db::Database;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing (RUST_LOG overrides the default filter)
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,kho=debug,sqlx=warn")),
        )
        .with_target(true)
        .init();

    info!("Starting Kho API server...");

    // Load configuration
    let config = KhoConfig::load().context("loading configuration")?;
    info!(
        address = %config.bind_address(),
        database = %config.database.path,
        shortfall_policy = ?config.settlement.shortfall_policy,
        "Configuration loaded"
    );

    // Connect to database (migrations run on connect)
    let db = Database::new(config.db_config())
        .await
        .context("opening database")?;
    info!("Database ready");

    let address = config.bind_address();
    let router = app(AppState::new(db.clone(), config));

    let listener = TcpListener::bind(&address)
        .await
        .with_context(|| format!("binding {}", address))?;
    info!(%address, "Listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    db.close().await;
    info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install signal handler");
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
}
