use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use crate::models::Transaction;

pub const DEFAULT_CAPACITY: usize = 100;

/// Fixed-capacity LRU of parsed transactions keyed by ordinal.
///
/// Entries are always reproducible from the index, so eviction only costs a
/// re-parse.
#[derive(Debug)]
pub struct TransactionCache {
    entries: HashMap<usize, Arc<Transaction>>,
    // Front is least recently used.
    recency: VecDeque<usize>,
    capacity: usize,
}

impl TransactionCache {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: HashMap::with_capacity(capacity),
            recency: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn get(&mut self, ordinal: usize) -> Option<Arc<Transaction>> {
        let tx = self.entries.get(&ordinal).cloned()?;
        self.touch(ordinal);
        Some(tx)
    }

    /// Insert a freshly parsed transaction, returning the evicted ordinal if
    /// the cache was full.
    pub fn insert(&mut self, ordinal: usize, tx: Arc<Transaction>) -> Option<usize> {
        if self.entries.insert(ordinal, tx).is_some() {
            self.touch(ordinal);
            return None;
        }
        self.recency.push_back(ordinal);
        if self.entries.len() > self.capacity {
            let victim = self.recency.pop_front()?;
            self.entries.remove(&victim);
            return Some(victim);
        }
        None
    }

    pub fn contains(&self, ordinal: usize) -> bool {
        self.entries.contains_key(&ordinal)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.recency.clear();
    }

    fn touch(&mut self, ordinal: usize) {
        if let Some(pos) = self.recency.iter().position(|&o| o == ordinal) {
            self.recency.remove(pos);
        }
        self.recency.push_back(ordinal);
    }
}

impl Default for TransactionCache {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}
