//! HTTP route handlers.

pub mod capture;
pub mod store;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::body::Body;
use axum::extract::ConnectInfo;
use axum::http::Request;
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;

use crate::window::PacketWindow;

pub use store::StoreState;

/// HTTP request logging middleware.
///
/// Logs each request in format: "IP METHOD PATH - STATUS"
async fn request_logging(request: Request<Body>, next: Next) -> Response {
    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| "-".to_string());
    let method = request.method().clone();
    let uri = request.uri().clone();

    let response = next.run(request).await;

    let status = response.status();
    tracing::info!("{} {} {} - {}", peer, method, uri, status.as_u16());

    response
}

/// Router for the capture tier.
pub fn capture_router(window: Arc<PacketWindow>) -> Router {
    Router::new()
        .route("/packets", get(capture::handle_packets))
        .layer(middleware::from_fn(request_logging))
        .with_state(window)
}

/// Router for the ingestion/query tier.
///
/// Any origin is allowed; the visualization front-end is served elsewhere.
pub fn store_router(state: StoreState) -> Router {
    Router::new()
        .route("/info", get(store::handle_info))
        .route("/save-packets", post(store::handle_save_packets))
        .route("/get-all-packets", get(store::handle_get_all_packets))
        .layer(CorsLayer::permissive())
        .layer(middleware::from_fn(request_logging))
        .with_state(state)
}
