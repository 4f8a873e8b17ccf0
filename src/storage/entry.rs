//! The storage cell: a value and its optional absolute expiry.

use crate::clock::Timestamp;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// A stored value with an optional expiry time.
///
/// Entries are immutable once built. Overwriting a key replaces the whole entry,
/// which is what lets transaction snapshots share entries instead of deep
/// copying them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WrappedValue<V> {
    value: V,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    expiry_time: Option<Timestamp>,
}

impl<V> WrappedValue<V> {
    /// Creates an entry. `None` means it never expires.
    pub fn new(value: V, expiry_time: Option<Timestamp>) -> Self {
        Self { value, expiry_time }
    }

    /// Creates an entry that expires `lifetime` after `now`.
    ///
    /// A zero lifetime means no expiry at all.
    pub fn with_lifetime(value: V, now: Timestamp, lifetime: Option<Duration>) -> Self {
        let expiry_time = lifetime
            .filter(|l| !l.is_zero())
            .map(|l| u64::try_from(l.as_millis()).unwrap_or(u64::MAX))
            .map(|ms| now.saturating_add(ms));
        Self::new(value, expiry_time)
    }

    /// Returns the stored value.
    pub fn value(&self) -> &V {
        &self.value
    }

    /// Consumes the entry and returns the value.
    pub fn into_value(self) -> V {
        self.value
    }

    /// Returns the absolute expiry time, if any.
    pub fn expiry_time(&self) -> Option<Timestamp> {
        self.expiry_time
    }

    /// Checks whether this entry is past its expiry at `now`.
    ///
    /// An entry expiring exactly at `now` is still live.
    #[inline]
    pub fn is_expired_at(&self, now: Timestamp) -> bool {
        self.expiry_time.is_some_and(|exp| exp < now)
    }
}
