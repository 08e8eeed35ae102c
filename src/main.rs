//! Bearwatch capture daemon.
//!
//! Captures packet metadata on one interface, serves the recent window on
//! GET /packets and periodically relays it to the packet store.

use std::net::{IpAddr, SocketAddr};
use std::sync::atomic::Ordering;
use std::sync::Arc;

use anyhow::{Context, Result};
use bearwatch::capture::{CaptureEngine, PnetCapture};
use bearwatch::config::CaptureConfig;
use bearwatch::relay::RelayScheduler;
use bearwatch::routes;
use bearwatch::window::PacketWindow;
use clap::Parser;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

#[derive(Parser)]
#[command(name = "bearwatch")]
#[command(about = "Capture packet metadata and relay it to the packet store")]
struct Args {
    /// Network interface to capture on (e.g., wlan0)
    #[arg(short, long)]
    interface: Option<String>,

    /// Capture on the interface that holds this address
    #[arg(short, long)]
    address: Option<IpAddr>,

    /// HTTP port serving GET /packets
    #[arg(short, long)]
    port: Option<u16>,

    /// List network interfaces and exit
    #[arg(long)]
    list_interfaces: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    if args.list_interfaces {
        for line in PnetCapture::list_interfaces() {
            println!("{}", line);
        }
        return Ok(());
    }

    let mut config = CaptureConfig::load().context("Invalid configuration")?;
    if args.interface.is_some() {
        config.interface = args.interface;
    }
    if args.address.is_some() {
        config.capture_address = args.address;
    }
    if let Some(port) = args.port {
        config.port = port;
    }

    bearwatch::init_tracing(&config.tracing_filter());
    tracing::info!("Starting bearwatch capture daemon");

    let window = Arc::new(PacketWindow::with_capacity(config.window_capacity));

    // No capturable interface means nothing to do: fail startup
    let selector = config.interface_selector();
    let mut engine = CaptureEngine::new(PnetCapture::new(selector), Arc::clone(&window));
    engine.open().context("Failed to start capture")?;
    let capture_running = engine.running_flag();
    let capture = tokio::task::spawn_blocking(move || engine.run());

    let shutdown = CancellationToken::new();

    let relay = RelayScheduler::new(
        Arc::clone(&window),
        config.ingest_url(),
        config.relay_period,
        config.relay_timeout,
    )
    .context("Failed to create relay client")?;
    let relay_task = tokio::spawn(relay.run(shutdown.clone()));

    let signal_token = shutdown.clone();
    tokio::spawn(async move {
        match bearwatch::shutdown_signal().await {
            Ok(()) => signal_token.cancel(),
            Err(e) => tracing::error!("Failed to install signal handlers: {}", e),
        }
    });

    let listener = TcpListener::bind((config.bind_address.as_str(), config.port))
        .await
        .with_context(|| format!("Failed to bind {}:{}", config.bind_address, config.port))?;
    tracing::info!("HTTP server listening on {}", listener.local_addr()?);

    let app = routes::capture_router(Arc::clone(&window));
    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown.clone().cancelled_owned())
        .await
        .context("HTTP server failed")?;

    shutdown.cancel();
    capture_running.store(false, Ordering::SeqCst);

    if let Err(e) = relay_task.await {
        tracing::error!("Relay task failed: {}", e);
    }
    match capture.await {
        Ok(Ok(stats)) => tracing::debug!("Capture totals: {:?}", stats),
        Ok(Err(e)) => tracing::error!("Capture failed: {}", e),
        Err(e) => tracing::error!("Capture task failed: {}", e),
    }

    tracing::info!("Stopped");
    Ok(())
}
