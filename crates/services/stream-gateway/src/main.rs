//! Stream Gateway Binary
//!
//! Entry point for the Twitch stream gateway service.

use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::signal;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use twitchcast_gateway::{
    api::{build_router, AppState},
    config::Config,
    twitch::TwitchClient,
};
use twitchcast_session::{FfmpegLauncher, SessionManager, StatusBroadcaster};

/// Bound on the startup `ffmpeg -version` check
const PREFLIGHT_TIMEOUT: Duration = Duration::from_secs(10);

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Twitch Stream Gateway...");

    // Load configuration
    let config_path = std::env::var("STREAMER_CONFIG").ok();
    let config = Arc::new(
        Config::load(config_path.as_deref()).context("Failed to load configuration")?,
    );

    tracing::info!(
        "Configuration: port={}, encoder={}, grace_period={}s, broadcast_interval={}s",
        config.server.port,
        config.encoder.binary,
        config.encoder.grace_period_seconds,
        config.status.broadcast_interval_seconds
    );

    // Encoder preflight
    let launcher = FfmpegLauncher::new(&config.encoder.binary)
        .with_capture_output(config.encoder.capture_output);
    match launcher.check_version(PREFLIGHT_TIMEOUT).await {
        Ok(version) => tracing::info!(%version, "FFmpeg is available"),
        Err(e) => tracing::warn!(error = %e, "FFmpeg not found - streaming will not work"),
    }

    // Session core
    let twitch = Arc::new(
        TwitchClient::new(config.twitch.clone()).context("Failed to build HTTP client")?,
    );
    let session_manager = Arc::new(
        SessionManager::new(twitch.clone(), Arc::new(launcher), config.manager_settings())
            .with_resolver(twitch),
    );
    let broadcaster = Arc::new(StatusBroadcaster::new(
        session_manager.clone(),
        config.broadcast_interval(),
    ));

    // Create app state
    let state = AppState::new(session_manager.clone(), broadcaster.clone(), config.clone());

    // Build HTTP router
    let router = build_router(state);

    // Start HTTP server
    let bind_addr = config.bind_addr();
    let listener = TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", bind_addr))?;
    tracing::info!("HTTP server listening on {}", bind_addr);

    // Run the HTTP server with graceful shutdown on SIGTERM/SIGINT
    let feed_broadcaster = broadcaster.clone();
    axum::serve(listener, router)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            tracing::info!("Shutdown signal received, initiating graceful shutdown...");
            feed_broadcaster.shutdown();
        })
        .await?;

    // Terminate every encoder we started
    broadcaster.shutdown();
    let stopped = session_manager.shutdown().await;

    tracing::info!(stopped, "Stream gateway shutdown complete");
    Ok(())
}

/// Wait for shutdown signal (SIGTERM or SIGINT)
async fn shutdown_signal() {
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
}
