//! Storage Module
//!
//! This module provides the core of KVBus: the [`Store`], its entries, the
//! expiry validator, and the optional background sweep.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                          Store                              │
//! │   HashMap<String, Arc<WrappedValue<V>>>                     │
//! │                                                             │
//! │   get / has ──> validator ──> evict on failure (lazy)       │
//! │   clean     ──> validator ──> evict all failures (sweep)    │
//! └─────────────────────────────────────────────────────────────┘
//!                            ▲
//!                            │ Arc<Mutex<Store>>
//!              ┌─────────────┴─────────────┐
//!              │      CleanScheduler       │
//!              │  (Background Tokio Task)  │
//!              └───────────────────────────┘
//! ```
//!
//! ## Features
//!
//! - **Lazy Expiry**: expired keys are evicted when read
//! - **Sweep**: `clean` evicts every expired key in one pass
//! - **Transactions**: snapshot before, roll back on error
//! - **Persistence**: whole-map export and import through an adapter
//!
//! ## Example
//!
//! ```
//! use kvbus::storage::{SetOptions, Store};
//! use std::time::Duration;
//!
//! let mut store = Store::new();
//!
//! store.set("name", "Ariz", SetOptions::new()).unwrap();
//! assert_eq!(store.get("name").unwrap(), &"Ariz");
//!
//! store
//!     .set("session", "token123", SetOptions::new().lifetime(Duration::from_secs(3600)))
//!     .unwrap();
//! assert_eq!(store.clean(), 0);
//! ```

pub mod entry;
pub mod managed;
pub mod store;
pub mod sweeper;
pub mod validator;

// Re-export commonly used types
pub use entry::WrappedValue;
pub use managed::ManagedStore;
pub use store::{SetOptions, Store, StoreStats};
pub use sweeper::{CleanScheduler, SweepConfig, DEFAULT_CLEAN_INTERVAL};

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// A store shared between tasks. The lock is held for the whole of each
/// operation, transactions included.
pub type SharedStore<V> = Arc<Mutex<Store<V>>>;

/// Wraps a store for sharing.
pub fn shared<V>(store: Store<V>) -> SharedStore<V> {
    Arc::new(Mutex::new(store))
}

/// Locks a shared store.
///
/// A panic inside another holder cannot leave the map half-written: single
/// operations are one insert, remove or swap, and a transaction puts its
/// snapshot back while unwinding. A poisoned lock is therefore taken over
/// as is.
pub fn lock<V>(store: &SharedStore<V>) -> MutexGuard<'_, Store<V>> {
    store.lock().unwrap_or_else(PoisonError::into_inner)
}
