//! docrelay API Server
//!
//! Main entry point for the docrelay service.

use anyhow::Context;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use docrelay_api::{AppState, create_router};
use docrelay_core::relay::RelayService;
use docrelay_shared::AppConfig;
use docrelay_shared::config::{is_production, run_mode};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables: `.env` in production, `.env.local` then `.env` otherwise
    let run_mode = run_mode();
    if is_production(&run_mode) {
        dotenvy::dotenv().ok();
    } else {
        dotenvy::from_filename(".env.local").ok();
        dotenvy::dotenv().ok();
    }

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "docrelay=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = AppConfig::load().context("Failed to load configuration")?;

    // Build the relay pipeline
    let relay = RelayService::from_config(&config).context("Failed to build relay service")?;
    info!(
        run_mode = %run_mode,
        mode = relay.mode().as_str(),
        scratch_dir = %config.relay.scratch_dir().display(),
        max_download_bytes = config.relay.max_download_bytes,
        download_timeout_secs = config.relay.download_timeout_secs,
        extraction_timeout_secs = config.relay.extraction_timeout_secs,
        "Relay configured"
    );

    // Create router
    let app = create_router(AppState::new(relay));

    // Start server
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = TcpListener::bind(&addr).await?;
    info!("Server running on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
