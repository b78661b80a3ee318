//! np-server - audio to MIDI transcription service
//!
//! Accepts audio uploads on `POST /predict`, resolves a MIDI tempo (explicit
//! or detected), runs basic-pitch and returns the generated MIDI file.

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use np_server::config::{ServerArgs, ServiceConfig};
use np_server::services::BasicPitchCli;
use np_server::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    let args = ServerArgs::parse();
    let config = ServiceConfig::load(&args).context("Failed to load configuration")?;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.log_level.as_str().into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!(
        "Starting np-server v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("NP_GIT_HASH"),
        env!("NP_BUILD_TIMESTAMP"),
        env!("NP_BUILD_PROFILE")
    );
    info!("Upload directory: {}", config.upload_dir.display());
    info!("Output directory: {}", config.output_dir.display());

    let state = AppState::from_config(&config);
    state
        .pipeline
        .dirs()
        .initialize(config.purge_on_startup)
        .context("Failed to prepare working directories")?;

    if BasicPitchCli::new(config.basic_pitch_bin.clone(), config.model_path.clone()).is_available() {
        info!("basic-pitch: {}", config.basic_pitch_bin);
    } else {
        warn!(
            "basic-pitch not found at '{}'; predictions will fail until it is installed",
            config.basic_pitch_bin
        );
    }

    let app = np_server::build_router(state);

    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("Failed to bind to {}", config.bind_addr))?;
    info!("Listening on http://{}", config.bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
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
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
