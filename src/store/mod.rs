//! Packet store.
//!
//! The store is the durable, append-only accumulation of every ingested
//! packet. Records are never mutated or removed, and iteration order is
//! ingestion order.

mod file;
mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

use crate::domain::StoredPacket;
use crate::error::StoreError;

/// Append-only storage for ingested packets.
pub trait PacketStore: Send + Sync {
    /// Append a packet.
    ///
    /// Fails with `StoreError::DuplicateId` if the id is already taken;
    /// nothing is written in that case.
    fn append(&self, packet: StoredPacket) -> Result<(), StoreError>;

    /// All stored packets in ingestion order.
    fn all(&self) -> Result<Vec<StoredPacket>, StoreError>;

    /// Number of stored packets.
    fn len(&self) -> Result<usize, StoreError>;

    fn is_empty(&self) -> Result<bool, StoreError> {
        Ok(self.len()? == 0)
    }
}
