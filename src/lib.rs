//! # KVBus - An In-Process Key-Value Store with Expiry
//!
//! KVBus keeps values in memory under string keys. Each key may carry a
//! lifetime, after which it is treated as gone. Batches of changes can run as
//! transactions that roll back on error, and the whole store can be exported to
//! and imported from a pluggable persistence backend.
//!
//! ## Features
//!
//! - **TTL Support**: keys can expire after a lifetime given in milliseconds
//! - **Lazy + Swept Expiry**: expired keys are evicted when read, and by a
//!   periodic `clean` sweep
//! - **Transactions**: all-or-nothing batches over the whole map
//! - **Pluggable Persistence**: any [`PersistenceAdapter`], with in-memory and
//!   JSON file adapters included
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                               KVBus                                     │
//! │                                                                         │
//! │  ┌─────────────┐    ┌──────────────────────────┐    ┌───────────────┐   │
//! │  │   Caller    │───>│          Store           │───>│ Persistence   │   │
//! │  │ set/get/has │    │  key -> WrappedValue     │    │   Adapter     │   │
//! │  └─────────────┘    │                          │    │ (memory/json) │   │
//! │                     │  ┌────────────────────┐  │    └───────────────┘   │
//! │                     │  │  Expiry validator  │  │                        │
//! │                     │  └────────────────────┘  │                        │
//! │                     └────────────▲─────────────┘                        │
//! │                                  │ clean()                              │
//! │                     ┌────────────┴─────────────┐                        │
//! │                     │  Host timer (optional    │                        │
//! │                     │  CleanScheduler)         │                        │
//! │                     └──────────────────────────┘                        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```
//! use kvbus::{MemoryAdapter, SetOptions, Store, StoreError};
//! use std::time::Duration;
//!
//! let adapter = MemoryAdapter::new();
//! let mut store = Store::new().with_adapter(adapter.clone());
//!
//! store.set("user:1", "Ariz".to_string(), SetOptions::new()).unwrap();
//! store
//!     .set(
//!         "session:1",
//!         "abc123".to_string(),
//!         SetOptions::new().lifetime(Duration::from_secs(60)),
//!     )
//!     .unwrap();
//!
//! // Changes inside a failed transaction are undone
//! let result: Result<(), StoreError> = store.transaction(|s| {
//!     s.delete("user:1");
//!     s.set("session:1", "other".to_string(), SetOptions::new())
//! });
//! assert!(result.is_err());
//! assert!(store.has("user:1"));
//!
//! store.persist().unwrap();
//! ```
//!
//! ## Module Overview
//!
//! - [`storage`]: the store, its entries, validation and the sweep scheduler
//! - [`persistence`]: the adapter trait and bundled adapters
//! - [`clock`]: time sources for expiry checks
//! - [`error`]: error types
//!
//! ## Design Highlights
//!
//! ### Lazy + Swept Expiry
//!
//! Keys with a lifetime are expired in two ways:
//! 1. **Lazy**: when a key is read, its expiry is checked and it is evicted if
//!    it has passed
//! 2. **Sweep**: `clean` evicts every expired key, driven by a timer the host
//!    owns
//!
//! Both paths use the same predicate. Memory is reclaimed even for keys that
//! are never read again.
//!
//! ### Immutable Entries
//!
//! An entry is never changed after it is stored; writes replace it. This lets a
//! transaction snapshot share entries with the live map.

pub mod clock;
pub mod error;
pub mod persistence;
pub mod storage;

// Re-export commonly used types for convenience
pub use clock::{Clock, ManualClock, SystemClock, Timestamp};
pub use error::{Result, StoreError};
pub use persistence::{JsonFileAdapter, MemoryAdapter, PersistenceAdapter};
pub use storage::{
    lock, shared, CleanScheduler, ManagedStore, SetOptions, SharedStore, Store, StoreStats,
    SweepConfig, WrappedValue, DEFAULT_CLEAN_INTERVAL,
};

/// Version of KVBus
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
