//! In-memory persistence adapter.

use crate::persistence::PersistenceAdapter;
use crate::storage::WrappedValue;
use std::sync::{Arc, Mutex, PoisonError};

type Persisted<V> = Vec<(String, WrappedValue<V>)>;

/// Keeps the most recently persisted collection in memory.
///
/// Cloning the adapter produces another handle to the same storage, which is
/// how one "adapter instance" can be given to several stores.
#[derive(Debug)]
pub struct MemoryAdapter<V> {
    slot: Arc<Mutex<Persisted<V>>>,
}

impl<V> Clone for MemoryAdapter<V> {
    fn clone(&self) -> Self {
        Self {
            slot: Arc::clone(&self.slot),
        }
    }
}

impl<V> Default for MemoryAdapter<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> MemoryAdapter<V> {
    /// Creates an adapter with nothing persisted.
    pub fn new() -> Self {
        Self {
            slot: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Returns the number of entries currently persisted.
    pub fn len(&self) -> usize {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Returns true if nothing is persisted.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<V: Clone> MemoryAdapter<V> {
    /// Returns a copy of the persisted collection.
    pub fn snapshot(&self) -> Vec<(String, WrappedValue<V>)> {
        self.slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl<V: Clone + Send> PersistenceAdapter<V> for MemoryAdapter<V> {
    fn persist(&mut self, entries: &[(&str, &WrappedValue<V>)]) -> anyhow::Result<()> {
        let copied = entries
            .iter()
            .map(|&(key, entry)| (key.to_string(), entry.clone()))
            .collect();
        *self.slot.lock().unwrap_or_else(PoisonError::into_inner) = copied;
        Ok(())
    }

    fn restore(&mut self) -> anyhow::Result<Vec<(String, WrappedValue<V>)>> {
        Ok(self.snapshot())
    }
}
