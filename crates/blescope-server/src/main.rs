//! # blescope-server
//!
//! HTTP daemon for the blescope BLE beacon monitor.
//!
//! This binary:
//! - Polls the scanner's live feed every tick and runs the inference pipeline
//! - Refreshes the wardriving capture log when one is configured
//! - Serves device records over a REST API with an OpenAPI document
//!
//! ## Running
//!
//! ```bash
//! # Development
//! cargo run --package blescope-server
//!
//! # Custom configuration file
//! BLESCOPE_CONFIG=./blescope.toml ./blescope-server
//! ```

#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]

use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::Context;
use blescope_core::config::default_config_path;
use blescope_core::{Config, Poller};
use blescope_server::{create_router, logging, AppState, HttpSource, WardrivingPoller};
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{info, warn};

/// Environment variable overriding the configuration file path.
const CONFIG_PATH_ENV: &str = "BLESCOPE_CONFIG";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config_path = std::env::var_os(CONFIG_PATH_ENV).map_or_else(default_config_path, PathBuf::from);
    let config = Config::load_or_default(&config_path)
        .with_context(|| format!("Failed to load configuration from {}", config_path.display()))?;

    logging::init(config.logging.production)?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        config = %config_path.display(),
        feed = %config.feed.url,
        "Starting blescope-server"
    );

    let (stop_tx, stop_rx) = watch::channel(false);
    let stopped = |mut rx: watch::Receiver<bool>| async move {
        let _ = rx.wait_for(|stop| *stop).await;
    };

    let source = HttpSource::from_config(&config.feed).context("Invalid feed URL")?;
    let (poller, devices) = Poller::from_config(&config, source);
    let poller_task = tokio::spawn(poller.run(stopped(stop_rx.clone())));

    let (wardriving_poller, wardriving) =
        WardrivingPoller::from_config(&config.feed).context("Invalid wardriving URL")?;
    let wardriving_task = wardriving_poller.map(|p| tokio::spawn(p.run(stopped(stop_rx.clone()))));

    let app = create_router(AppState::new(&config, devices, wardriving));

    let addr = SocketAddr::new(config.server.bind_address, config.server.port);
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;

    info!("Listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    let _ = stop_tx.send(true);
    match poller_task.await {
        Ok(registry) => info!(
            ticks = registry.tick_count(),
            ever_seen = registry.ever_seen_count(),
            "Registry poller finished"
        ),
        Err(e) => warn!(error = %e, "Registry poller task failed"),
    }
    if let Some(task) = wardriving_task {
        if let Err(e) = task.await {
            warn!(error = %e, "Wardriving poller task failed");
        }
    }

    info!("Shutdown complete");
    Ok(())
}

/// Resolves on SIGINT or SIGTERM.
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        match (signal(SignalKind::interrupt()), signal(SignalKind::terminate())) {
            (Ok(mut sigint), Ok(mut sigterm)) => {
                tokio::select! {
                    _ = sigint.recv() => info!("Received SIGINT, initiating shutdown..."),
                    _ = sigterm.recv() => info!("Received SIGTERM, initiating shutdown..."),
                }
            }
            _ => {
                warn!("Failed to install signal handlers, falling back to Ctrl+C");
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
        info!("Received Ctrl+C, initiating shutdown...");
    }
}
