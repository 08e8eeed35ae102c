//! Bearwatch packet store server.
//!
//! Accepts relayed packet batches and serves the accumulated history to
//! the visualization front-end.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use bearwatch::config::StoreConfig;
use bearwatch::ingest::IngestionService;
use bearwatch::query::QueryService;
use bearwatch::routes::{self, StoreState};
use bearwatch::store::{FileStore, MemoryStore, PacketStore};
use clap::Parser;
use tokio::net::TcpListener;

#[derive(Parser)]
#[command(name = "bearwatch-db")]
#[command(about = "Bearwatch packet store - ingests relayed packets and serves queries")]
struct Args {
    /// Packet store file (JSON lines). Packets are kept in memory when omitted
    #[arg(short, long)]
    store: Option<PathBuf>,

    /// Host or address to listen on
    #[arg(short, long)]
    bind: Option<String>,

    /// Port to listen on
    #[arg(short, long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = StoreConfig::load().context("Invalid configuration")?;
    if args.store.is_some() {
        config.store_path = args.store;
    }
    if let Some(bind) = args.bind {
        config.bind_address = bind;
    }
    if let Some(port) = args.port {
        config.port = port;
    }

    bearwatch::init_tracing(&config.tracing_filter());
    tracing::info!("Starting bearwatch packet store");

    let store: Arc<dyn PacketStore> = match &config.store_path {
        Some(path) => Arc::new(
            FileStore::open(path)
                .with_context(|| format!("Failed to open packet store {:?}", path))?,
        ),
        None => {
            tracing::warn!("No store path configured, packets are kept in memory only");
            Arc::new(MemoryStore::new())
        }
    };

    let state = StoreState::new(
        IngestionService::new(Arc::clone(&store)),
        QueryService::new(store),
    );

    let listener = TcpListener::bind((config.bind_address.as_str(), config.port))
        .await
        .with_context(|| format!("Failed to bind {}:{}", config.bind_address, config.port))?;
    tracing::info!("HTTP server listening on {}", listener.local_addr()?);

    let app = routes::store_router(state);
    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(async {
            if let Err(e) = bearwatch::shutdown_signal().await {
                tracing::error!("Failed to install signal handlers: {}", e);
                std::future::pending::<()>().await;
            }
        })
        .await
        .context("HTTP server failed")?;

    tracing::info!("Server stopped");
    Ok(())
}
