//! Bearwatch - network traffic monitor.
//!
//! The capture tier decodes live frames into packet records, keeps the
//! most recent ones in a bounded window and periodically relays the window
//! to the ingestion tier, which assigns ids and appends every record to a
//! packet store that the visualization front-end queries.

pub mod capture;
pub mod config;
pub mod decoder;
pub mod domain;
pub mod error;
pub mod ingest;
pub mod query;
pub mod relay;
pub mod routes;
pub mod store;
pub mod window;

use tracing_subscriber::EnvFilter;

/// Initialize logging to stderr.
///
/// `RUST_LOG` takes precedence over the configured filter.
pub fn init_tracing(default_filter: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

/// Wait for SIGINT or SIGTERM.
pub async fn shutdown_signal() -> std::io::Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut sigterm = signal(SignalKind::terminate())?;
        let mut sigint = signal(SignalKind::interrupt())?;

        tokio::select! {
            _ = sigterm.recv() => {
                tracing::info!("Received SIGTERM, shutting down");
            }
            _ = sigint.recv() => {
                tracing::info!("Received SIGINT, shutting down");
            }
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await?;
        tracing::info!("Received Ctrl-C, shutting down");
    }

    Ok(())
}
