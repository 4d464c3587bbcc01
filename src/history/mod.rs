//! Bounded request and exception history.
//!
//! # Responsibilities
//! - Keep the most recent records keyed by opaque id
//! - Evict the oldest record once capacity is reached
//! - Hand out shared, immutable records to the UI handlers
//!
//! # Design Decisions
//! - One mutex per store; insert/evict is O(1) so contention stays low
//! - Values are published as `Arc<V>` and never mutated afterwards
//! - Request and exception stores are independent instances with their own capacity

pub mod records;

pub use records::{RequestRecord, RequestSummary};

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::observability::metrics;

/// A bounded, insertion-ordered map from record id to record.
pub struct HistoryStore<V> {
    name: &'static str,
    capacity: usize,
    inner: Mutex<Entries<V>>,
}

struct Entries<V> {
    order: VecDeque<String>,
    items: HashMap<String, Arc<V>>,
}

impl<V> HistoryStore<V> {
    /// Create an empty store. A capacity of zero is raised to one.
    pub fn new(name: &'static str, capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            name,
            capacity,
            inner: Mutex::new(Entries {
                order: VecDeque::with_capacity(capacity),
                items: HashMap::with_capacity(capacity),
            }),
        }
    }

    /// Insert a record, evicting the oldest one when the store is full.
    ///
    /// Re-inserting an existing id replaces the value and moves the id to the
    /// newest position.
    pub fn put(&self, id: impl Into<String>, value: V) -> Arc<V> {
        let id = id.into();
        let value = Arc::new(value);
        let mut entries = self.inner.lock();

        if entries.items.remove(&id).is_some() {
            entries.order.retain(|existing| existing != &id);
        }

        while entries.order.len() >= self.capacity {
            match entries.order.pop_front() {
                Some(oldest) => {
                    entries.items.remove(&oldest);
                    metrics::record_eviction(self.name);
                    tracing::debug!(store = self.name, id = %oldest, "Evicted oldest history entry");
                }
                None => break,
            }
        }

        entries.order.push_back(id.clone());
        entries.items.insert(id, value.clone());
        value
    }

    pub fn get(&self, id: &str) -> Option<Arc<V>> {
        self.inner.lock().items.get(id).cloned()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.inner.lock().items.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.inner.lock().order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Ids in insertion order, oldest first.
    pub fn ids(&self) -> Vec<String> {
        self.inner.lock().order.iter().cloned().collect()
    }

    /// The most recently inserted record.
    pub fn latest(&self) -> Option<(String, Arc<V>)> {
        let entries = self.inner.lock();
        let id = entries.order.back()?;
        entries.items.get(id).map(|v| (id.clone(), v.clone()))
    }

    /// Up to `limit` records, newest first.
    pub fn recent(&self, limit: usize) -> Vec<(String, Arc<V>)> {
        let entries = self.inner.lock();
        entries
            .order
            .iter()
            .rev()
            .take(limit)
            .filter_map(|id| entries.items.get(id).map(|v| (id.clone(), v.clone())))
            .collect()
    }
}
