//! Persistence Adapters
//!
//! The store never knows how or where its data is kept. It hands the whole
//! collection of entries to a [`PersistenceAdapter`] on `persist`, and installs
//! whatever the adapter returns on `restore`. There is no partial persistence and
//! no streaming: each call moves the full set of entries.
//!
//! ## Bundled Adapters
//!
//! - [`MemoryAdapter`]: keeps the last persisted collection in memory. Clones
//!   share storage, so two stores can exchange data through it.
//! - [`JsonFileAdapter`]: writes the collection to a JSON file.
//!
//! ## Example
//!
//! ```
//! use kvbus::{MemoryAdapter, SetOptions, Store};
//!
//! let adapter = MemoryAdapter::new();
//!
//! let mut store = Store::new().with_adapter(adapter.clone());
//! store.set("name", "Ariz".to_string(), SetOptions::new()).unwrap();
//! store.persist().unwrap();
//!
//! let mut fresh: Store<String> = Store::new().with_adapter(adapter);
//! fresh.restore().unwrap();
//! assert_eq!(fresh.get("name").unwrap(), "Ariz");
//! ```

pub mod json_file;
pub mod memory;

pub use json_file::JsonFileAdapter;
pub use memory::MemoryAdapter;

use crate::storage::WrappedValue;

/// Bulk export and import of a store's entries.
///
/// Errors are opaque to the store: whatever an adapter returns is handed back
/// to the caller of `Store::persist` or `Store::restore` as
/// [`StoreError::Adapter`](crate::StoreError::Adapter).
pub trait PersistenceAdapter<V>: Send {
    /// Durably stores the full collection of entries, replacing anything
    /// persisted before.
    fn persist(&mut self, entries: &[(&str, &WrappedValue<V>)]) -> anyhow::Result<()>;

    /// Returns the full collection of entries to install as the store's map.
    fn restore(&mut self) -> anyhow::Result<Vec<(String, WrappedValue<V>)>>;
}
