//! Bounded packet window.
//!
//! Fixed-capacity, insertion-ordered store of recent packet records with
//! FIFO eviction. The capture worker appends from an OS thread while the
//! relay scheduler and HTTP handlers take snapshots, so both operations
//! are serialized by a mutex.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};

use crate::domain::PacketRecord;

/// Default number of records retained.
pub const DEFAULT_CAPACITY: usize = 100;

/// Bounded FIFO window of recent packet records.
#[derive(Debug)]
pub struct PacketWindow {
    capacity: usize,
    records: Mutex<VecDeque<PacketRecord>>,
    evicted: AtomicU64,
}

impl PacketWindow {
    /// Create a window with the default capacity.
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Create a window holding at most `capacity` records (minimum 1).
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            records: Mutex::new(VecDeque::with_capacity(capacity.min(DEFAULT_CAPACITY))),
            evicted: AtomicU64::new(0),
        }
    }

    /// Append a record, evicting the oldest ones beyond capacity.
    ///
    /// Evicted records are discarded without notification, whether or not
    /// they were ever relayed.
    pub fn append(&self, record: PacketRecord) {
        let mut records = self.lock();
        records.push_back(record);

        let mut dropped = 0;
        while records.len() > self.capacity {
            records.pop_front();
            dropped += 1;
        }
        drop(records);

        if dropped > 0 {
            self.evicted.fetch_add(dropped, Ordering::Relaxed);
        }
    }

    /// Ordered copy of the current contents.
    ///
    /// The copy is independent of the window: later appends and evictions
    /// do not affect it.
    pub fn snapshot(&self) -> Vec<PacketRecord> {
        self.lock().iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Total records evicted since the window was created.
    pub fn evicted(&self) -> u64 {
        self.evicted.load(Ordering::Relaxed)
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<PacketRecord>> {
        // Poisoning is ignored: no operation leaves the deque mid-update.
        self.records
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for PacketWindow {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Protocol;
    use std::net::Ipv4Addr;
    use std::sync::Arc;
    use std::thread;

    fn record(length: u32) -> PacketRecord {
        PacketRecord::new(
            length,
            Ipv4Addr::new(192, 168, 0, 102),
            Ipv4Addr::new(20, 198, 210, 174),
            Protocol::Tcp,
            1693,
            443,
        )
    }

    fn lengths(records: &[PacketRecord]) -> Vec<u32> {
        records.iter().map(|r| r.length()).collect()
    }

    #[test]
    fn test_new_is_empty() {
        let window = PacketWindow::new();
        assert!(window.is_empty());
        assert_eq!(window.capacity(), DEFAULT_CAPACITY);
        assert!(window.snapshot().is_empty());
    }

    #[test]
    fn test_append_keeps_order() {
        let window = PacketWindow::new();
        for len in 1..=3 {
            window.append(record(len));
        }
        assert_eq!(lengths(&window.snapshot()), vec![1, 2, 3]);
        assert_eq!(window.evicted(), 0);
    }

    #[test]
    fn test_fifo_eviction_keeps_last_capacity() {
        let window = PacketWindow::new();
        for len in 1..=150 {
            window.append(record(len));
        }

        let snapshot = window.snapshot();
        assert_eq!(snapshot.len(), 100);
        assert_eq!(lengths(&snapshot), (51..=150).collect::<Vec<_>>());
        assert_eq!(window.evicted(), 50);
    }

    #[test]
    fn test_len_never_exceeds_capacity() {
        let window = PacketWindow::with_capacity(5);
        for len in 1..=20 {
            window.append(record(len));
            assert!(window.len() <= 5);
        }
        assert_eq!(lengths(&window.snapshot()), vec![16, 17, 18, 19, 20]);
    }

    #[test]
    fn test_snapshot_unaffected_by_later_appends() {
        let window = PacketWindow::with_capacity(3);
        window.append(record(1));
        window.append(record(2));

        let snapshot = window.snapshot();
        window.append(record(3));
        window.append(record(4));

        assert_eq!(lengths(&snapshot), vec![1, 2]);
        assert_eq!(lengths(&window.snapshot()), vec![2, 3, 4]);
    }

    #[test]
    fn test_huge_capacity_does_not_preallocate() {
        let window = PacketWindow::with_capacity(usize::MAX);
        window.append(record(1));
        assert_eq!(window.capacity(), usize::MAX);
        assert_eq!(window.len(), 1);
    }

    #[test]
    fn test_zero_capacity_clamped() {
        let window = PacketWindow::with_capacity(0);
        window.append(record(1));
        window.append(record(2));
        assert_eq!(lengths(&window.snapshot()), vec![2]);
    }

    #[test]
    fn test_concurrent_append_and_snapshot() {
        let window = Arc::new(PacketWindow::with_capacity(10));

        let writer = {
            let window = Arc::clone(&window);
            thread::spawn(move || {
                for len in 1..=1000 {
                    window.append(record(len));
                }
            })
        };

        for _ in 0..200 {
            let snapshot = window.snapshot();
            assert!(snapshot.len() <= 10);
            // Every snapshot is a contiguous ascending run
            for pair in snapshot.windows(2) {
                assert_eq!(pair[1].length(), pair[0].length() + 1);
            }
        }

        writer.join().unwrap();
        assert_eq!(lengths(&window.snapshot()), (991..=1000).collect::<Vec<_>>());
        assert_eq!(window.evicted(), 990);
    }
}
