//! Packet identity generation.

use std::sync::atomic::{AtomicU32, Ordering};

use rand::Rng;

/// Source of candidate packet ids.
///
/// Ids only need to be unlikely to collide; the store rejects duplicates
/// and the ingestion service redraws.
pub trait IdSource: Send + Sync {
    fn next_id(&self) -> u32;
}

/// Uniformly random positive 31-bit ids.
#[derive(Debug, Default, Clone, Copy)]
pub struct RandomIds;

impl IdSource for RandomIds {
    fn next_id(&self) -> u32 {
        rand::thread_rng().gen_range(1..=i32::MAX as u32)
    }
}

/// Monotonic ids starting at a given value.
#[derive(Debug)]
pub struct SequentialIds {
    next: AtomicU32,
}

impl SequentialIds {
    pub fn starting_at(first: u32) -> Self {
        Self {
            next: AtomicU32::new(first),
        }
    }
}

impl Default for SequentialIds {
    fn default() -> Self {
        Self::starting_at(1)
    }
}

impl IdSource for SequentialIds {
    fn next_id(&self) -> u32 {
        self.next.fetch_add(1, Ordering::Relaxed)
    }
}
