//! Bounded per-address sample history.
//!
//! Each address keeps a FIFO ring of its most recent raw and smoothed samples.
//! When the ring is full the oldest entry is dropped before the new one is
//! appended. Removal of whole buffers is driven by the registry.

use std::collections::{HashMap, VecDeque};

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// One recorded sample.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct HistoryEntry {
    /// Signal strength as reported, in dBm.
    #[schema(example = -63.0)]
    pub raw_value: f64,
    /// Kalman estimate after this sample, in dBm.
    #[schema(example = -61.4)]
    pub smoothed_value: f64,
    /// Tick time in epoch milliseconds.
    pub timestamp_ms: i64,
}

/// Fixed-capacity FIFO of [`HistoryEntry`] values.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryBuffer {
    capacity: usize,
    entries: VecDeque<HistoryEntry>,
}

impl HistoryBuffer {
    /// Create an empty buffer. A zero capacity is treated as one.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            entries: VecDeque::with_capacity(capacity),
        }
    }

    /// Append an entry, evicting the oldest when full.
    pub fn push(&mut self, entry: HistoryEntry) {
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(entry);
    }

    /// Entries from oldest to newest.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &HistoryEntry> + ExactSizeIterator {
        self.entries.iter()
    }

    /// The newest `n` entries, oldest first.
    pub fn last_n(&self, n: usize) -> impl Iterator<Item = &HistoryEntry> {
        self.entries.iter().skip(self.entries.len().saturating_sub(n))
    }

    /// Smoothed values of the newest `n` entries, oldest first.
    #[must_use]
    pub fn smoothed_window(&self, n: usize) -> Vec<f64> {
        self.last_n(n).map(|e| e.smoothed_value).collect()
    }

    /// Most recent entry.
    #[must_use]
    pub fn latest(&self) -> Option<&HistoryEntry> {
        self.entries.back()
    }

    /// Copy of all entries, oldest first.
    #[must_use]
    pub fn to_vec(&self) -> Vec<HistoryEntry> {
        self.entries.iter().copied().collect()
    }

    /// Number of stored entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// `true` if nothing has been recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Configured capacity.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }
}

/// Per-address collection of [`HistoryBuffer`]s sharing one capacity.
#[derive(Debug, Clone)]
pub struct HistoryStore {
    capacity: usize,
    buffers: HashMap<String, HistoryBuffer>,
}

impl HistoryStore {
    /// Create an empty store whose buffers hold `capacity` entries each.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            buffers: HashMap::new(),
        }
    }

    /// Record a sample for `address`, creating its buffer on first use.
    pub fn append(&mut self, address: &str, raw_value: f64, smoothed_value: f64, timestamp_ms: i64) {
        let entry = HistoryEntry {
            raw_value,
            smoothed_value,
            timestamp_ms,
        };
        if let Some(buffer) = self.buffers.get_mut(address) {
            buffer.push(entry);
            return;
        }
        let mut buffer = HistoryBuffer::new(self.capacity);
        buffer.push(entry);
        self.buffers.insert(address.to_string(), buffer);
    }

    /// Buffer for `address`.
    #[must_use]
    pub fn get(&self, address: &str) -> Option<&HistoryBuffer> {
        self.buffers.get(address)
    }

    /// Drop the buffer for `address`. Returns `true` if one existed.
    pub fn remove(&mut self, address: &str) -> bool {
        self.buffers.remove(address).is_some()
    }

    /// Addresses with a buffer.
    pub fn addresses(&self) -> impl Iterator<Item = &str> {
        self.buffers.keys().map(String::as_str)
    }

    /// Number of addresses with a buffer.
    #[must_use]
    pub fn len(&self) -> usize {
        self.buffers.len()
    }

    /// `true` if no buffers exist.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buffers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(ts: i64) -> HistoryEntry {
        #[allow(clippy::cast_precision_loss)]
        let v = -(ts as f64);
        HistoryEntry {
            raw_value: v,
            smoothed_value: v,
            timestamp_ms: ts,
        }
    }

    #[test]
    fn test_never_exceeds_capacity() {
        let mut buffer = HistoryBuffer::new(15);
        for ts in 0..100 {
            buffer.push(entry(ts));
            assert!(buffer.len() <= 15);
        }
        assert_eq!(buffer.len(), 15);
    }

    #[test]
    fn test_overflow_evicts_oldest() {
        let mut buffer = HistoryBuffer::new(15);
        for ts in 0..=15 {
            buffer.push(entry(ts));
        }

        let timestamps: Vec<i64> = buffer.iter().map(|e| e.timestamp_ms).collect();
        assert!(!timestamps.contains(&0));
        assert_eq!(timestamps.first(), Some(&1));
        assert_eq!(buffer.latest().map(|e| e.timestamp_ms), Some(15));
    }

    #[test]
    fn test_last_n_is_oldest_first() {
        let mut buffer = HistoryBuffer::new(10);
        for ts in 0..6 {
            buffer.push(entry(ts));
        }
        let recent: Vec<i64> = buffer.last_n(3).map(|e| e.timestamp_ms).collect();
        assert_eq!(recent, vec![3, 4, 5]);

        // Asking for more than stored returns everything.
        assert_eq!(buffer.last_n(50).count(), 6);
        assert_eq!(buffer.smoothed_window(2), vec![-4.0, -5.0]);
    }

    #[test]
    fn test_zero_capacity_is_clamped() {
        let mut buffer = HistoryBuffer::new(0);
        buffer.push(entry(1));
        buffer.push(entry(2));
        assert_eq!(buffer.capacity(), 1);
        assert_eq!(buffer.to_vec(), vec![entry(2)]);
    }

    #[test]
    fn test_store_creates_and_removes_buffers() {
        let mut store = HistoryStore::new(3);
        store.append("A", -50.0, -50.0, 1);
        store.append("A", -52.0, -50.4, 2);
        store.append("B", -80.0, -80.0, 1);

        assert_eq!(store.len(), 2);
        assert_eq!(store.get("A").map(HistoryBuffer::len), Some(2));

        assert!(store.remove("A"));
        assert!(store.get("A").is_none());
        assert!(!store.remove("A"));
    }
}
