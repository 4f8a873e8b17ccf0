//! Expiry validation.
//!
//! One predicate decides validity for every path that needs it: `get`, `has`
//! and the `clean` sweep. Keeping it in one place is what stops lazy and active
//! expiry from drifting apart.

use crate::clock::Timestamp;
use crate::error::{Result, StoreError};
use crate::storage::WrappedValue;

/// Checks an entry against the current time.
///
/// Returns [`StoreError::KeyExpired`] if the entry has an expiry earlier than
/// `now`. Entries without an expiry always pass.
pub fn validate<V>(key: &str, entry: &WrappedValue<V>, now: Timestamp) -> Result<()> {
    if entry.is_expired_at(now) {
        return Err(StoreError::KeyExpired(key.to_string()));
    }
    Ok(())
}
