//! Query service: read-only access to the packet store.

use std::sync::Arc;

use crate::domain::StoredPacket;
use crate::error::StoreError;
use crate::store::PacketStore;

/// Serves the accumulated packet history.
pub struct QueryService {
    store: Arc<dyn PacketStore>,
}

impl QueryService {
    pub fn new(store: Arc<dyn PacketStore>) -> Self {
        Self { store }
    }

    /// Every stored packet, in ingestion order.
    pub fn all_packets(&self) -> Result<Vec<StoredPacket>, StoreError> {
        self.store.all()
    }
}
