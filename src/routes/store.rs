//! Ingestion and query tier endpoints.
//!
//! GET  /info
//! POST /save-packets
//! GET  /get-all-packets

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde::Serialize;
use serde_json::Value;

use crate::domain::StoredPacket;
use crate::error::{AppError, AppResult};
use crate::ingest::IngestionService;
use crate::query::QueryService;

/// Identifying string returned by GET /info.
pub const INFO_MESSAGE: &str = "database server";

/// Shared state for the ingestion/query router.
#[derive(Clone)]
pub struct StoreState {
    pub ingestion: Arc<IngestionService>,
    pub query: Arc<QueryService>,
}

impl StoreState {
    pub fn new(ingestion: IngestionService, query: QueryService) -> Self {
        Self {
            ingestion: Arc::new(ingestion),
            query: Arc::new(query),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: &'static str,
}

/// Store query wrapper; the front-end reads `packets.results`.
#[derive(Debug, Serialize)]
pub struct PacketResults {
    pub results: Vec<StoredPacket>,
}

#[derive(Debug, Serialize)]
pub struct AllPacketsResponse {
    pub packets: PacketResults,
}

/// Handle GET /info
pub async fn handle_info() -> Json<MessageResponse> {
    Json(MessageResponse {
        message: INFO_MESSAGE,
    })
}

/// Handle POST /save-packets
///
/// Records that fail coercion or id assignment are logged and skipped and
/// the batch is acknowledged. A store failure answers 5xx so the sender
/// knows the batch was not taken.
pub async fn handle_save_packets(
    State(state): State<StoreState>,
    Json(payloads): Json<Vec<Value>>,
) -> AppResult<Json<MessageResponse>> {
    let ingestion = Arc::clone(&state.ingestion);
    let count = payloads.len();

    // Store appends may sync to disk
    let report = tokio::task::spawn_blocking(move || ingestion.ingest_batch(&payloads))
        .await
        .map_err(|e| AppError::Internal(format!("ingestion task failed: {}", e)))??;

    tracing::info!(
        "Ingested batch of {}: {} saved, {} rejected",
        count,
        report.saved,
        report.rejected
    );

    Ok(Json(MessageResponse { message: "saved" }))
}

/// Handle GET /get-all-packets
pub async fn handle_get_all_packets(
    State(state): State<StoreState>,
) -> AppResult<Json<AllPacketsResponse>> {
    let results = state.query.all_packets()?;
    Ok(Json(AllPacketsResponse {
        packets: PacketResults { results },
    }))
}
