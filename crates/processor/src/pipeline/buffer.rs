//! Coalescing buffer for partial results
//!
//! Aggregators emit one result per event, most of which are superseded
//! almost immediately. A [`LatestBuffer`] sits in front of an expensive sink
//! and keeps only the latest result per group until it is flushed.

use crate::result::PartialResult;

use std::collections::HashMap;
use streamstats_types::GroupFingerprint;

/// Keeps the latest result per group, bounded by the number of groups
///
/// A result for a group already buffered replaces the buffered one in place,
/// keeping its position. When the buffer holds `capacity` groups it is
/// flushed, in first-insertion order.
#[derive(Debug)]
pub struct LatestBuffer {
    capacity: usize,
    order: Vec<GroupFingerprint>,
    latest: HashMap<GroupFingerprint, PartialResult>,
}

impl LatestBuffer {
    /// Create a buffer; a zero capacity is treated as one
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            order: Vec::with_capacity(capacity),
            latest: HashMap::with_capacity(capacity),
        }
    }

    /// Buffer a result; returns the flushed results when the buffer filled up
    pub fn push(&mut self, result: PartialResult) -> Option<Vec<PartialResult>> {
        if !self.latest.contains_key(&result.fingerprint) {
            self.order.push(result.fingerprint.clone());
        }
        self.latest.insert(result.fingerprint.clone(), result);

        (self.latest.len() >= self.capacity).then(|| self.flush())
    }

    /// Drain every buffered result in first-insertion order
    pub fn flush(&mut self) -> Vec<PartialResult> {
        let latest = &mut self.latest;
        self.order
            .drain(..)
            .filter_map(|fingerprint| latest.remove(&fingerprint))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.latest.len()
    }

    pub fn is_empty(&self) -> bool {
        self.latest.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
