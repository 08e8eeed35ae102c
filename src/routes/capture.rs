//! Capture tier endpoint.
//!
//! GET /packets
//! Returns the current window contents, oldest first, without ids.

use std::sync::Arc;

use axum::extract::State;
use axum::Json;

use crate::domain::PacketRecord;
use crate::window::PacketWindow;

/// Handle GET /packets
pub async fn handle_packets(State(window): State<Arc<PacketWindow>>) -> Json<Vec<PacketRecord>> {
    Json(window.snapshot())
}
