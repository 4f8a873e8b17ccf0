//! A store that owns its own sweep timer.

use crate::storage::{lock, shared, CleanScheduler, SharedStore, Store, SweepConfig};
use std::sync::Arc;
use tracing::info;

/// A [`Store`] bundled with the [`CleanScheduler`] that sweeps it.
///
/// Creating one starts the timer; [`dispose`](Self::dispose) clears the
/// store, detaches its adapter and stops the timer.
///
/// ```no_run
/// use kvbus::{ManagedStore, SetOptions, Store, SweepConfig};
///
/// # #[tokio::main]
/// # async fn main() {
/// let mut managed = ManagedStore::start(Store::new(), SweepConfig::default());
///
/// managed.with(|store| store.set("k", 1, SetOptions::new())).unwrap();
/// assert!(managed.with(|store| store.has("k")));
///
/// managed.dispose();
/// # }
/// ```
#[derive(Debug)]
pub struct ManagedStore<V> {
    store: SharedStore<V>,
    scheduler: Option<CleanScheduler>,
}

impl<V> ManagedStore<V>
where
    V: Send + Sync + 'static,
{
    /// Wraps `store` and starts sweeping it. Must be called from within a
    /// Tokio runtime.
    pub fn start(store: Store<V>, config: SweepConfig) -> Self {
        let store = shared(store);
        let scheduler = CleanScheduler::start(Arc::clone(&store), config);

        Self {
            store,
            scheduler: Some(scheduler),
        }
    }
}

impl<V> ManagedStore<V> {
    /// Runs `op` with exclusive access to the store.
    pub fn with<R>(&self, op: impl FnOnce(&mut Store<V>) -> R) -> R {
        op(&mut lock(&self.store))
    }

    /// Returns another handle to the underlying store.
    pub fn handle(&self) -> SharedStore<V> {
        Arc::clone(&self.store)
    }

    /// Returns true while the sweep timer is running.
    pub fn is_running(&self) -> bool {
        self.scheduler.as_ref().is_some_and(CleanScheduler::is_running)
    }

    /// Clears the store, detaches its adapter and stops the sweep timer.
    pub fn dispose(&mut self) {
        lock(&self.store).dispose();
        if let Some(scheduler) = self.scheduler.take() {
            scheduler.stop();
            info!("Managed store disposed");
        }
    }
}
