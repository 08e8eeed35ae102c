//! Ingestion service.
//!
//! Accepts relayed batches, assigns each record a store-unique id and
//! appends it to the packet store. Failures are isolated per record: a
//! rejected record never aborts the rest of its batch.

mod ids;
mod payload;

pub use ids::{IdSource, RandomIds, SequentialIds};
pub use payload::coerce_payload;

use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, error, warn};

use crate::domain::{PacketRecord, StoredPacket};
use crate::error::StoreError;
use crate::store::PacketStore;

/// Id draws attempted before a record is rejected as a collision.
const MAX_ID_ATTEMPTS: usize = 8;

/// Outcome of ingesting one batch.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct IngestReport {
    pub saved: usize,
    pub rejected: usize,
}

/// Assigns identity to incoming records and appends them to the store.
pub struct IngestionService {
    store: Arc<dyn PacketStore>,
    ids: Box<dyn IdSource>,
}

impl IngestionService {
    /// Create a service using random ids.
    pub fn new(store: Arc<dyn PacketStore>) -> Self {
        Self::with_ids(store, Box::new(RandomIds))
    }

    pub fn with_ids(store: Arc<dyn PacketStore>, ids: Box<dyn IdSource>) -> Self {
        Self { store, ids }
    }

    /// Ingest a batch of raw JSON payloads, record by record.
    ///
    /// No deduplication: the same payload ingested twice is stored twice
    /// under different ids. A record that fails coercion or runs out of id
    /// draws is rejected and the batch continues. A store failure aborts
    /// the batch; records already committed stay stored.
    pub fn ingest_batch(&self, payloads: &[Value]) -> Result<IngestReport, StoreError> {
        let mut report = IngestReport::default();

        for (idx, value) in payloads.iter().enumerate() {
            let record = match coerce_payload(value) {
                Ok(record) => record,
                Err(e) => {
                    warn!("Rejected packet at batch index {}: {}", idx, e);
                    report.rejected += 1;
                    continue;
                }
            };

            match self.commit(record) {
                Ok(id) => {
                    debug!("Stored packet {} (batch index {})", id, idx);
                    report.saved += 1;
                }
                Err(e) if e.is_record_level() => {
                    warn!("Rejected packet at batch index {}: {}", idx, e);
                    report.rejected += 1;
                }
                Err(e) => {
                    error!(
                        "Store failed at batch index {} after {} saved: {}",
                        idx, report.saved, e
                    );
                    return Err(e);
                }
            }
        }

        Ok(report)
    }

    /// Store one record under a fresh id, returning the id.
    pub fn commit(&self, record: PacketRecord) -> Result<u32, StoreError> {
        let mut last_err = None;

        for _ in 0..MAX_ID_ATTEMPTS {
            let id = self.ids.next_id();
            match self.store.append(StoredPacket::new(id, record.clone())) {
                Ok(()) => return Ok(id),
                Err(StoreError::DuplicateId(taken)) => {
                    debug!("Packet id {} already taken, redrawing", taken);
                    last_err = Some(StoreError::DuplicateId(taken));
                }
                Err(e) => return Err(e),
            }
        }

        Err(last_err.unwrap_or_else(|| {
            StoreError::Unavailable("no packet id could be assigned".to_string())
        }))
    }
}
