//! In-memory packet store.

use std::collections::HashSet;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use super::PacketStore;
use crate::domain::StoredPacket;
use crate::error::StoreError;

#[derive(Debug, Default)]
struct Inner {
    packets: Vec<StoredPacket>,
    ids: HashSet<u32>,
}

/// Packet store kept in process memory. Contents are lost on exit.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Inner>, StoreError> {
        self.inner
            .read()
            .map_err(|_| StoreError::Unavailable("memory store lock poisoned".to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Inner>, StoreError> {
        self.inner
            .write()
            .map_err(|_| StoreError::Unavailable("memory store lock poisoned".to_string()))
    }
}

impl PacketStore for MemoryStore {
    fn append(&self, packet: StoredPacket) -> Result<(), StoreError> {
        let mut inner = self.write()?;
        if !inner.ids.insert(packet.id) {
            return Err(StoreError::DuplicateId(packet.id));
        }
        inner.packets.push(packet);
        Ok(())
    }

    fn all(&self) -> Result<Vec<StoredPacket>, StoreError> {
        Ok(self.read()?.packets.clone())
    }

    fn len(&self) -> Result<usize, StoreError> {
        Ok(self.read()?.packets.len())
    }
}
