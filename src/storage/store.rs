//! The KVBus Store
//!
//! This module implements the core key-value store. It owns the map from key to
//! [`WrappedValue`] and enforces expiry on every read.
//!
//! ## Design Decisions
//!
//! 1. **Lazy Expiry**: `get` and `has` validate the entry they touch and evict it
//!    when it has expired. Nothing is scanned on a read.
//! 2. **Sweep**: `clean` is a separate pass over a snapshot of all keys, sharing
//!    the same validation predicate. Something outside the store calls it on a
//!    timer.
//! 3. **Shared Entries**: entries sit behind `Arc` and are never mutated after
//!    insertion, so a transaction snapshot is a shallow copy of the map.
//! 4. **Exclusive Access**: every operation takes `&mut self`, so the borrow
//!    checker enforces one operation at a time. Wrap the store in a
//!    [`SharedStore`](crate::SharedStore) to share it.
//!
//! ## Lifecycle of an Entry
//!
//! ```text
//!   set ──> [live] ──(time passes)──> [expired, still in map]
//!             │                              │
//!           delete                 get / has / clean
//!             │                              │
//!             ▼                              ▼
//!          removed                        evicted
//! ```

use crate::clock::{Clock, SystemClock, Timestamp};
use crate::error::{Result, StoreError};
use crate::persistence::PersistenceAdapter;
use crate::storage::{validator, WrappedValue};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, trace};

/// Options for [`Store::set`].
///
/// ```
/// use kvbus::SetOptions;
/// use std::time::Duration;
///
/// let options = SetOptions::new()
///     .overwrite()
///     .lifetime(Duration::from_secs(30));
/// assert!(options.overwrite);
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SetOptions {
    /// Replace a live entry instead of failing with `KeyExists`
    pub overwrite: bool,
    /// Time to live from now. `None` or zero means the entry never expires.
    pub lifetime: Option<Duration>,
}

impl SetOptions {
    /// Default options: no overwrite, no expiry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Allows replacing an existing live entry.
    pub fn overwrite(mut self) -> Self {
        self.overwrite = true;
        self
    }

    /// Sets the time to live.
    pub fn lifetime(mut self, lifetime: Duration) -> Self {
        self.lifetime = Some(lifetime);
        self
    }
}

/// Store statistics.
///
/// A rolled-back transaction also rolls back the `sets` and `evictions` it
/// made, so the counters only describe work that is still in effect.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreStats {
    /// Entries currently in the map, including expired ones not yet evicted
    pub keys: usize,
    /// Successful `set` calls
    pub sets: u64,
    /// Entries evicted because they had expired
    pub evictions: u64,
    /// Transactions that failed and were rolled back
    pub rollbacks: u64,
}

#[derive(Debug, Default, Clone, Copy)]
struct Counters {
    sets: u64,
    evictions: u64,
    rollbacks: u64,
}

/// An in-process key-value store with per-key expiry.
///
/// # Example
///
/// ```
/// use kvbus::{SetOptions, Store, StoreError};
/// use std::time::Duration;
///
/// let mut store = Store::new();
///
/// store.set("name", "Ariz", SetOptions::new()).unwrap();
/// assert_eq!(store.get("name").unwrap(), &"Ariz");
///
/// // A second set without overwrite is refused
/// let err = store.set("name", "Bob", SetOptions::new()).unwrap_err();
/// assert!(matches!(err, StoreError::KeyExists(_)));
///
/// // Set with a lifetime
/// store
///     .set("session", "abc123", SetOptions::new().lifetime(Duration::from_secs(60)))
///     .unwrap();
/// assert!(store.has("session"));
/// ```
pub struct Store<V> {
    /// Key to entry. May hold expired entries until they are touched or swept.
    data: HashMap<String, Arc<WrappedValue<V>>>,

    /// Where `persist` and `restore` go
    adapter: Option<Box<dyn PersistenceAdapter<V>>>,

    /// Source of "now" for expiry checks
    clock: Arc<dyn Clock>,

    counters: Counters,
}

impl<V> std::fmt::Debug for Store<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store")
            .field("keys", &self.data.len())
            .field("adapter", &self.adapter.is_some())
            .field("counters", &self.counters)
            .finish()
    }
}

impl<V> Default for Store<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> Store<V> {
    /// Creates an empty store using the system clock and no persistence.
    pub fn new() -> Self {
        Self {
            data: HashMap::new(),
            adapter: None,
            clock: Arc::new(SystemClock),
            counters: Counters::default(),
        }
    }

    /// Attaches a persistence adapter.
    pub fn with_adapter<A>(mut self, adapter: A) -> Self
    where
        A: PersistenceAdapter<V> + 'static,
    {
        self.set_adapter(adapter);
        self
    }

    /// Replaces the clock used for expiry checks.
    pub fn with_clock<C>(mut self, clock: C) -> Self
    where
        C: Clock + 'static,
    {
        self.clock = Arc::new(clock);
        self
    }

    /// Attaches or replaces the persistence adapter.
    pub fn set_adapter<A>(&mut self, adapter: A)
    where
        A: PersistenceAdapter<V> + 'static,
    {
        self.adapter = Some(Box::new(adapter));
    }

    /// Returns true if a persistence adapter is attached.
    pub fn has_adapter(&self) -> bool {
        self.adapter.is_some()
    }

    fn now(&self) -> Timestamp {
        self.clock.now_ms()
    }

    /// Stores a value under `key`.
    ///
    /// Fails with [`StoreError::KeyExists`] if the key holds a live entry and
    /// `options.overwrite` is false. An expired entry does not block the write:
    /// the existence check goes through [`has`](Self::has), which evicts it.
    pub fn set(&mut self, key: impl Into<String>, value: V, options: SetOptions) -> Result<()> {
        let key = key.into();

        if self.has(&key) && !options.overwrite {
            return Err(StoreError::KeyExists(key));
        }

        let entry = WrappedValue::with_lifetime(value, self.now(), options.lifetime);
        trace!(key = %key, expiry_time = ?entry.expiry_time(), "Set key");
        self.data.insert(key, Arc::new(entry));
        self.counters.sets += 1;

        Ok(())
    }

    /// Returns the value stored under `key`.
    ///
    /// Fails with [`StoreError::KeyNotFound`] if the key is absent, or
    /// [`StoreError::KeyExpired`] if its entry has expired. In the second case
    /// the key has already been evicted when the error is returned.
    pub fn get(&mut self, key: &str) -> Result<&V> {
        self.check(key)?;

        self.data
            .get(key)
            .map(|entry| entry.value())
            .ok_or_else(|| StoreError::KeyNotFound(key.to_string()))
    }

    /// Returns true if `key` holds a live entry.
    ///
    /// Same checks and eviction as [`get`](Self::get), but the failure is
    /// reported as `false`.
    pub fn has(&mut self, key: &str) -> bool {
        self.check(key).is_ok()
    }

    /// Returns the remaining lifetime of `key`.
    ///
    /// `Ok(None)` means the key never expires. Absent and expired keys fail the
    /// same way as in [`get`](Self::get).
    pub fn ttl(&mut self, key: &str) -> Result<Option<Duration>> {
        self.check(key)?;

        let now = self.now();
        self.data
            .get(key)
            .map(|entry| {
                entry
                    .expiry_time()
                    .map(|exp| Duration::from_millis(exp.saturating_sub(now)))
            })
            .ok_or_else(|| StoreError::KeyNotFound(key.to_string()))
    }

    /// Removes `key`.
    ///
    /// Returns `true` if it was present. Never fails.
    pub fn delete(&mut self, key: &str) -> bool {
        self.data.remove(key).is_some()
    }

    /// Evicts every expired entry.
    ///
    /// This is the periodic sweep. It walks a snapshot of the keys taken up
    /// front, so evicting while scanning never skips or revisits a key.
    ///
    /// # Returns
    ///
    /// Returns the number of entries evicted.
    pub fn clean(&mut self) -> usize {
        let now = self.now();
        let keys: Vec<String> = self.data.keys().cloned().collect();
        let mut evicted = 0;

        for key in keys {
            let expired = self
                .data
                .get(&key)
                .is_some_and(|entry| validator::validate(&key, entry, now).is_err());

            if expired {
                self.data.remove(&key);
                evicted += 1;
            }
        }

        if evicted > 0 {
            self.counters.evictions += evicted as u64;
            debug!(
                evicted = evicted,
                keys_remaining = self.data.len(),
                "Expired keys cleaned up"
            );
        }

        evicted
    }

    /// Runs `mutate` against the store with all-or-nothing semantics.
    ///
    /// The map is copied before `mutate` runs. If it returns `Err`, the copy is
    /// put back, undoing every set, delete and eviction made inside, and the
    /// error is returned unchanged. On `Ok` the changes stay.
    ///
    /// The same rollback happens if `mutate` panics, so a store behind a
    /// poisoned lock never shows half of a batch.
    ///
    /// The copy is shallow. That is sound only because entries are never
    /// modified after insertion.
    ///
    /// ```
    /// use kvbus::{SetOptions, Store, StoreError};
    ///
    /// let mut store = Store::new();
    ///
    /// let result: Result<(), StoreError> = store.transaction(|s| {
    ///     s.set("x", 1, SetOptions::new())?;
    ///     s.get("missing")?;
    ///     Ok(())
    /// });
    ///
    /// assert!(result.is_err());
    /// assert!(!store.has("x"));
    /// ```
    pub fn transaction<R, E, F>(&mut self, mutate: F) -> std::result::Result<R, E>
    where
        F: FnOnce(&mut Self) -> std::result::Result<R, E>,
    {
        let mut guard = Rollback {
            backup: Some((self.data.clone(), self.counters)),
            store: self,
        };

        let result = mutate(&mut *guard.store);
        if result.is_ok() {
            guard.backup = None;
        }
        // Dropping the guard restores the snapshot on Err and on unwind
        result
    }

    /// Hands every entry to the persistence adapter.
    ///
    /// Expired entries that have not been evicted yet are included as they are.
    pub fn persist(&mut self) -> Result<()> {
        let adapter = self
            .adapter
            .as_mut()
            .ok_or(StoreError::NoPersistenceAdapter)?;

        let entries: Vec<(&str, &WrappedValue<V>)> = self
            .data
            .iter()
            .map(|(key, entry)| (key.as_str(), entry.as_ref()))
            .collect();

        adapter.persist(&entries)?;
        debug!(entries = entries.len(), "Store persisted");

        Ok(())
    }

    /// Replaces the whole map with what the persistence adapter returns.
    ///
    /// Nothing is merged: keys not in the restored collection are gone
    /// afterwards. If the adapter fails, the map is left untouched.
    pub fn restore(&mut self) -> Result<()> {
        let adapter = self
            .adapter
            .as_mut()
            .ok_or(StoreError::NoPersistenceAdapter)?;

        let entries = adapter.restore()?;
        self.data = entries
            .into_iter()
            .map(|(key, entry)| (key, Arc::new(entry)))
            .collect();
        debug!(entries = self.data.len(), "Store restored");

        Ok(())
    }

    /// Clears the map and detaches the persistence adapter.
    pub fn dispose(&mut self) {
        self.data.clear();
        self.adapter = None;
        info!("Store disposed");
    }

    /// Returns the number of entries in the map, including expired entries
    /// that have not been evicted yet.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns true if the map is empty.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Iterates over the keys in the map without validating them.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.data.keys().map(String::as_str)
    }

    /// Returns store statistics.
    pub fn stats(&self) -> StoreStats {
        StoreStats {
            keys: self.data.len(),
            sets: self.counters.sets,
            evictions: self.counters.evictions,
            rollbacks: self.counters.rollbacks,
        }
    }

    /// Looks up and validates `key`, evicting it if it has expired.
    ///
    /// `get`, `has` and `ttl` all go through here so they agree on eviction.
    fn check(&mut self, key: &str) -> Result<()> {
        let now = self.now();
        let entry = self
            .data
            .get(key)
            .ok_or_else(|| StoreError::KeyNotFound(key.to_string()))?;

        if let Err(err) = validator::validate(key, entry, now) {
            self.data.remove(key);
            self.counters.evictions += 1;
            trace!(key = %key, "Evicted expired key");
            return Err(err);
        }

        Ok(())
    }
}

/// Puts a transaction snapshot back when dropped, unless disarmed.
struct Rollback<'a, V> {
    store: &'a mut Store<V>,
    backup: Option<(HashMap<String, Arc<WrappedValue<V>>>, Counters)>,
}

impl<V> Drop for Rollback<'_, V> {
    fn drop(&mut self) {
        if let Some((data, counters)) = self.backup.take() {
            let rollbacks = self.store.counters.rollbacks + 1;
            self.store.data = data;
            self.store.counters = Counters {
                rollbacks,
                ..counters
            };
            debug!(keys = self.store.data.len(), "Transaction failed, rolled back");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::persistence::MemoryAdapter;
    use crate::storage::{lock, shared};
    use std::panic::{self, AssertUnwindSafe};
    use std::thread;
    use tokio_test::{assert_err, assert_ok};

    const T0: Timestamp = 1_000_000;

    fn manual_store<V>() -> (Store<V>, ManualClock) {
        let clock = ManualClock::new(T0);
        (Store::new().with_clock(clock.clone()), clock)
    }

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    /// Fails with a plain message, for transactions that need to abort.
    #[derive(Debug, PartialEq)]
    struct Abort(&'static str);

    #[test]
    fn test_set_and_get() {
        let mut store = Store::new();

        assert_ok!(store.set("key", "value", SetOptions::new()));
        assert_eq!(store.get("key").unwrap(), &"value");
    }

    #[test]
    fn test_get_nonexistent() {
        let mut store: Store<i32> = Store::new();

        let err = assert_err!(store.get("nonexistent"));
        assert!(matches!(err, StoreError::KeyNotFound(ref k) if k == "nonexistent"));
        assert!(!store.has("nonexistent"));
    }

    #[test]
    fn test_no_lifetime_never_expires() {
        let (mut store, clock) = manual_store();

        store.set("k", 1, SetOptions::new()).unwrap();
        clock.advance(Duration::from_secs(365 * 24 * 3600));

        assert_eq!(store.get("k").unwrap(), &1);
        assert_eq!(store.ttl("k").unwrap(), None);
    }

    #[test]
    fn test_expiry() {
        let (mut store, clock) = manual_store();

        store
            .set("a", 1, SetOptions::new().lifetime(ms(10)))
            .unwrap();
        assert_eq!(store.get("a").unwrap(), &1);

        // Expiry equal to now is still live
        clock.advance(ms(10));
        assert_eq!(store.get("a").unwrap(), &1);

        clock.advance(ms(1));
        let err = assert_err!(store.get("a"));
        assert!(matches!(err, StoreError::KeyExpired(ref k) if k == "a"));

        // Evicted before the error came back
        assert_eq!(store.len(), 0);
        assert!(!store.has("a"));
        assert!(matches!(store.get("a"), Err(StoreError::KeyNotFound(_))));
    }

    #[test]
    fn test_expiry_real_time() {
        let mut store = Store::new();

        store
            .set("a", 1, SetOptions::new().lifetime(ms(10)))
            .unwrap();
        assert_eq!(store.get("a").unwrap(), &1);

        thread::sleep(ms(15));

        assert!(matches!(store.get("a"), Err(StoreError::KeyExpired(_))));
        assert!(!store.has("a"));
    }

    #[test]
    fn test_has_evicts_expired() {
        let (mut store, clock) = manual_store();

        store.set("a", 1, SetOptions::new().lifetime(ms(5))).unwrap();
        assert!(store.has("a"));

        clock.advance(ms(6));
        assert_eq!(store.len(), 1);
        assert!(!store.has("a"));
        assert_eq!(store.len(), 0);
        assert_eq!(store.stats().evictions, 1);
    }

    #[test]
    fn test_set_without_overwrite_fails() {
        let mut store = Store::new();

        store.set("k", "v1", SetOptions::new()).unwrap();

        let err = assert_err!(store.set("k", "v2", SetOptions::new()));
        assert!(matches!(err, StoreError::KeyExists(ref k) if k == "k"));
        assert_eq!(store.get("k").unwrap(), &"v1");

        assert_ok!(store.set("k", "v2", SetOptions::new().overwrite()));
        assert_eq!(store.get("k").unwrap(), &"v2");
    }

    #[test]
    fn test_set_over_expired_key_without_overwrite() {
        let (mut store, clock) = manual_store();

        store.set("k", 1, SetOptions::new().lifetime(ms(5))).unwrap();
        clock.advance(ms(10));

        // The stale entry is still in the map, but it does not block the write
        assert_eq!(store.len(), 1);
        assert_ok!(store.set("k", 2, SetOptions::new()));
        assert_eq!(store.get("k").unwrap(), &2);
        assert_eq!(store.stats().evictions, 1);
    }

    #[test]
    fn test_overwrite_replaces_expiry() {
        let (mut store, clock) = manual_store();

        store.set("k", 1, SetOptions::new().lifetime(ms(5))).unwrap();
        store.set("k", 2, SetOptions::new().overwrite()).unwrap();

        clock.advance(ms(100));
        assert_eq!(store.get("k").unwrap(), &2);

        store
            .set("k", 3, SetOptions::new().overwrite().lifetime(ms(5)))
            .unwrap();
        assert_eq!(store.ttl("k").unwrap(), Some(ms(5)));
    }

    #[test]
    fn test_zero_lifetime_never_expires() {
        let (mut store, clock) = manual_store();

        store.set("k", 1, SetOptions::new().lifetime(Duration::ZERO)).unwrap();
        clock.advance(ms(1_000));
        assert!(store.has("k"));
    }

    #[test]
    fn test_ttl() {
        let (mut store, clock) = manual_store();

        assert!(matches!(store.ttl("missing"), Err(StoreError::KeyNotFound(_))));

        store
            .set("k", 1, SetOptions::new().lifetime(ms(100)))
            .unwrap();
        clock.advance(ms(40));
        assert_eq!(store.ttl("k").unwrap(), Some(ms(60)));

        clock.advance(ms(61));
        assert!(matches!(store.ttl("k"), Err(StoreError::KeyExpired(_))));
        assert!(store.is_empty());
    }

    #[test]
    fn test_delete() {
        let mut store = Store::new();

        store.set("key", "value", SetOptions::new()).unwrap();
        assert!(store.delete("key"));
        assert!(!store.has("key"));
        assert!(!store.delete("key")); // Already deleted
    }

    #[test]
    fn test_clean_removes_only_expired() {
        let (mut store, clock) = manual_store();

        store.set("short1", 1, SetOptions::new().lifetime(ms(10))).unwrap();
        store.set("short2", 2, SetOptions::new().lifetime(ms(10))).unwrap();
        store.set("long", 3, SetOptions::new().lifetime(ms(1_000))).unwrap();
        store.set("forever", 4, SetOptions::new()).unwrap();

        assert_eq!(store.clean(), 0);
        assert_eq!(store.len(), 4);

        clock.advance(ms(50));
        assert_eq!(store.clean(), 2);

        let mut keys: Vec<&str> = store.keys().collect();
        keys.sort_unstable();
        assert_eq!(keys, vec!["forever", "long"]);
        assert_eq!(store.stats().evictions, 2);
    }

    #[test]
    fn test_clean_everything_expired() {
        let (mut store, clock) = manual_store();

        for i in 0..100 {
            store
                .set(format!("key{}", i), i, SetOptions::new().lifetime(ms(1)))
                .unwrap();
        }

        clock.advance(ms(2));
        assert_eq!(store.clean(), 100);
        assert!(store.is_empty());
    }

    #[test]
    fn test_transaction_commits() {
        let mut store = Store::new();

        let result: Result<()> = store.transaction(|s| s.set("x", 1, SetOptions::new()));

        assert_ok!(result);
        assert_eq!(store.get("x").unwrap(), &1);
        assert_eq!(store.stats().rollbacks, 0);
    }

    #[test]
    fn test_transaction_rolls_back() {
        let mut store = Store::new();
        store.set("keep", 0, SetOptions::new()).unwrap();

        let result = store.transaction(|s| {
            s.set("x", 1, SetOptions::new()).map_err(|_| Abort("set"))?;
            s.delete("keep");
            Err::<(), _>(Abort("boom"))
        });

        assert_eq!(result, Err(Abort("boom")));
        assert!(!store.has("x"));
        assert_eq!(store.get("keep").unwrap(), &0);
        assert_eq!(store.stats().rollbacks, 1);
    }

    #[test]
    fn test_transaction_rolls_back_store_error() {
        let mut store = Store::new();
        store.set("a", 1, SetOptions::new()).unwrap();

        let result = store.transaction(|s| {
            s.set("b", 2, SetOptions::new())?;
            s.set("a", 3, SetOptions::new())
        });

        assert!(matches!(result, Err(StoreError::KeyExists(ref k)) if k == "a"));
        assert!(!store.has("b"));
        assert_eq!(store.get("a").unwrap(), &1);
    }

    #[test]
    fn test_transaction_restores_evicted_entries() {
        let (mut store, clock) = manual_store();
        store.set("stale", 1, SetOptions::new().lifetime(ms(5))).unwrap();
        clock.advance(ms(10));

        let result = store.transaction(|s| {
            assert!(!s.has("stale"));
            Err::<(), _>(Abort("rollback"))
        });

        assert!(result.is_err());
        // The expired entry is back in the map exactly as before
        assert_eq!(store.len(), 1);
        assert!(store.keys().any(|k| k == "stale"));
    }

    #[test]
    fn test_transaction_returns_output() {
        let mut store = Store::new();
        store.set("n", 41, SetOptions::new()).unwrap();

        let out: Result<i32> = store.transaction(|s| {
            let next = *s.get("n")? + 1;
            s.set("n", next, SetOptions::new().overwrite())?;
            Ok(next)
        });

        assert_eq!(out.unwrap(), 42);
        assert_eq!(store.get("n").unwrap(), &42);
    }

    #[test]
    fn test_nested_transaction_inner_rollback() {
        let mut store = Store::new();

        let outer: Result<()> = store.transaction(|s| {
            s.set("outer", 1, SetOptions::new())?;
            let inner = s.transaction(|s| {
                s.set("inner", 2, SetOptions::new()).map_err(|_| Abort("set"))?;
                Err::<(), _>(Abort("inner"))
            });
            assert!(inner.is_err());
            Ok(())
        });

        assert_ok!(outer);
        assert!(store.has("outer"));
        assert!(!store.has("inner"));
    }

    #[test]
    fn test_transaction_rolls_back_on_panic() {
        let mut store = Store::new();
        store.set("keep", 0, SetOptions::new()).unwrap();

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            let _: Result<()> = store.transaction(|s| {
                s.set("x", 1, SetOptions::new())?;
                s.delete("keep");
                panic!("mutation blew up");
            });
        }));

        assert!(outcome.is_err());
        assert!(!store.has("x"));
        assert_eq!(store.get("keep").unwrap(), &0);
        assert_eq!(store.stats().rollbacks, 1);
    }

    #[test]
    fn test_poisoned_shared_store_has_no_partial_transaction() {
        let store = shared(Store::new());
        lock(&store).set("keep", 0, SetOptions::new()).unwrap();

        let worker = {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                let mut guard = lock(&store);
                let _: Result<()> = guard.transaction(|s| {
                    s.set("x", 1, SetOptions::new())?;
                    s.delete("keep");
                    panic!("mutation blew up");
                });
            })
        };

        assert!(worker.join().is_err());
        assert!(store.is_poisoned());

        let mut guard = lock(&store);
        assert!(!guard.has("x"));
        assert!(guard.has("keep"));
    }

    #[test]
    fn test_rollback_restores_counters() {
        let (mut store, clock) = manual_store();
        store.set("a", 1, SetOptions::new()).unwrap();
        store.set("stale", 2, SetOptions::new().lifetime(ms(5))).unwrap();
        clock.advance(ms(10));

        let result = store.transaction(|s| {
            s.set("b", 3, SetOptions::new()).map_err(|_| Abort("set"))?;
            assert!(!s.has("stale"));
            Err::<(), _>(Abort("undo"))
        });
        assert!(result.is_err());

        assert_eq!(
            store.stats(),
            StoreStats {
                keys: 2,
                sets: 2,
                evictions: 0,
                rollbacks: 1,
            }
        );
    }

    #[test]
    fn test_restore_duplicate_keys_keeps_last() {
        let mut adapter = MemoryAdapter::new();
        adapter
            .persist(&[
                ("k", &WrappedValue::new("first", None)),
                ("k", &WrappedValue::new("second", Some(T0 + 100))),
            ])
            .unwrap();

        let (store, _clock) = manual_store();
        let mut store = store.with_adapter(adapter);
        store.restore().unwrap();

        assert_eq!(store.len(), 1);
        assert_eq!(store.get("k").unwrap(), &"second");
        assert_eq!(store.ttl("k").unwrap(), Some(ms(100)));
    }

    #[test]
    fn test_persist_without_adapter() {
        let mut store: Store<i32> = Store::new();

        assert!(matches!(store.persist(), Err(StoreError::NoPersistenceAdapter)));
        assert!(matches!(store.restore(), Err(StoreError::NoPersistenceAdapter)));
    }

    #[test]
    fn test_persist_restore_round_trip() {
        let adapter = MemoryAdapter::new();
        let (store, _clock) = manual_store();
        let mut store = store.with_adapter(adapter.clone());

        store.set("forever", "a".to_string(), SetOptions::new()).unwrap();
        store
            .set("expiring", "b".to_string(), SetOptions::new().lifetime(ms(500)))
            .unwrap();
        store.persist().unwrap();

        let (fresh, _clock) = manual_store();
        let mut fresh = fresh.with_adapter(adapter);
        fresh.restore().unwrap();

        assert_eq!(fresh.len(), 2);
        assert_eq!(fresh.get("forever").unwrap(), "a");
        assert_eq!(fresh.ttl("forever").unwrap(), None);
        assert_eq!(fresh.get("expiring").unwrap(), "b");
        assert_eq!(fresh.ttl("expiring").unwrap(), Some(ms(500)));
    }

    #[test]
    fn test_persist_includes_expired_entries() {
        let adapter = MemoryAdapter::new();
        let (store, clock) = manual_store();
        let mut store = store.with_adapter(adapter.clone());

        store.set("stale", 1, SetOptions::new().lifetime(ms(5))).unwrap();
        clock.advance(ms(10));
        store.persist().unwrap();

        let persisted = adapter.snapshot();
        assert_eq!(persisted.len(), 1);
        assert_eq!(persisted[0].1.expiry_time(), Some(T0 + 5));
    }

    #[test]
    fn test_restore_replaces_not_merges() {
        let adapter = MemoryAdapter::new();
        let mut store = Store::new().with_adapter(adapter.clone());

        store.set("old", 1, SetOptions::new()).unwrap();
        store.persist().unwrap();

        store.set("new", 2, SetOptions::new()).unwrap();
        store.restore().unwrap();

        assert!(store.has("old"));
        assert!(!store.has("new"));
    }

    #[test]
    fn test_adapter_error_propagates() {
        struct Failing;

        impl PersistenceAdapter<i32> for Failing {
            fn persist(&mut self, _: &[(&str, &WrappedValue<i32>)]) -> anyhow::Result<()> {
                anyhow::bail!("disk full")
            }

            fn restore(&mut self) -> anyhow::Result<Vec<(String, WrappedValue<i32>)>> {
                anyhow::bail!("disk gone")
            }
        }

        let mut store = Store::new().with_adapter(Failing);
        store.set("k", 1, SetOptions::new()).unwrap();

        let err = assert_err!(store.persist());
        assert_eq!(err.to_string(), "disk full");

        let err = assert_err!(store.restore());
        assert_eq!(err.to_string(), "disk gone");
        // Failed restore leaves the map alone
        assert_eq!(store.get("k").unwrap(), &1);
    }

    #[test]
    fn test_dispose() {
        let mut store = Store::new().with_adapter(MemoryAdapter::new());
        store.set("k", 1, SetOptions::new()).unwrap();

        store.dispose();
        assert!(store.is_empty());
        assert!(!store.has_adapter());
        assert!(matches!(store.persist(), Err(StoreError::NoPersistenceAdapter)));

        // Second call is harmless
        store.dispose();
        assert!(store.is_empty());
    }

    #[test]
    fn test_stats() {
        let mut store = Store::new();

        store.set("a", 1, SetOptions::new()).unwrap();
        store.set("b", 2, SetOptions::new()).unwrap();
        let _ = store.set("a", 3, SetOptions::new());

        let stats = store.stats();
        assert_eq!(stats.keys, 2);
        assert_eq!(stats.sets, 2);
        assert_eq!(stats.evictions, 0);
    }
}
