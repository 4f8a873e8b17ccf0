//! Error types for KVBus.
//!
//! Every failure is synchronous and surfaces to the immediate caller. Nothing is
//! retried internally, and the only place an error is swallowed is
//! [`Store::has`](crate::Store::has), which reports `false` instead.

use thiserror::Error;

/// Errors returned by [`Store`](crate::Store) operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// `set` without overwrite on a key that is present and still valid
    #[error("key {0} already exists")]
    KeyExists(String),

    /// `get` on a key that is not in the store
    #[error("key {0} does not exist")]
    KeyNotFound(String),

    /// `get` on a key whose entry has expired. The key is gone once this is returned.
    #[error("key {0} has expired")]
    KeyExpired(String),

    /// `persist` or `restore` without a configured adapter
    #[error("no persistence adapter provided")]
    NoPersistenceAdapter,

    /// Failure raised by the persistence adapter, passed through untouched
    #[error(transparent)]
    Adapter(#[from] anyhow::Error),
}

impl StoreError {
    /// Returns the key this error is about, if any.
    pub fn key(&self) -> Option<&str> {
        match self {
            StoreError::KeyExists(key)
            | StoreError::KeyNotFound(key)
            | StoreError::KeyExpired(key) => Some(key),
            StoreError::NoPersistenceAdapter | StoreError::Adapter(_) => None,
        }
    }
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, StoreError>;
