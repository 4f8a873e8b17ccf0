//! Background Sweep Scheduler
//!
//! The store only exposes [`Store::clean`](crate::Store::clean). Something has to
//! call it on a timer, or expired keys that are never read again stay in memory
//! forever. Any host timer will do; this module provides one built on Tokio.
//!
//! ## Design
//!
//! The scheduler runs as a Tokio task and:
//! 1. Sleeps for the configured interval (default: 60s)
//! 2. Takes the store lock and runs one sweep
//! 3. Logs how many keys were evicted
//!
//! It stops when [`CleanScheduler::stop`] is called or the handle is dropped.

use crate::storage::{lock, SharedStore};
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info};

/// Default interval between sweeps.
pub const DEFAULT_CLEAN_INTERVAL: Duration = Duration::from_secs(60);

/// Configuration for the sweep scheduler.
///
/// # Example
///
/// ```
/// use kvbus::SweepConfig;
/// use std::time::Duration;
///
/// let config = SweepConfig::default()
///     .with_clean_interval(Duration::from_secs(30));
/// assert_eq!(config.clean_interval, Duration::from_secs(30));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SweepConfig {
    /// Interval between sweeps (default: 60s)
    pub clean_interval: Duration,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            clean_interval: DEFAULT_CLEAN_INTERVAL,
        }
    }
}

impl SweepConfig {
    /// Creates a configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the interval between sweeps.
    pub fn with_clean_interval(mut self, interval: Duration) -> Self {
        self.clean_interval = interval;
        self
    }
}

/// A handle to a running sweep task.
///
/// When this handle is dropped, the task is stopped.
#[derive(Debug)]
pub struct CleanScheduler {
    /// Sender to signal shutdown
    shutdown_tx: watch::Sender<bool>,
}

impl CleanScheduler {
    /// Starts sweeping `store` in the background.
    ///
    /// Must be called from within a Tokio runtime.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use kvbus::{shared, CleanScheduler, Store, SweepConfig};
    /// use std::sync::Arc;
    ///
    /// # #[tokio::main]
    /// # async fn main() {
    /// let store = shared(Store::<String>::new());
    /// let scheduler = CleanScheduler::start(Arc::clone(&store), SweepConfig::default());
    ///
    /// // Sweeps run in the background...
    ///
    /// // Dropping the handle stops them
    /// drop(scheduler);
    /// # }
    /// ```
    pub fn start<V>(store: SharedStore<V>, config: SweepConfig) -> Self
    where
        V: Send + Sync + 'static,
    {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        tokio::spawn(sweep_loop(store, config.clean_interval, shutdown_rx));

        info!(
            interval_ms = u64::try_from(config.clean_interval.as_millis()).unwrap_or(u64::MAX),
            "Background sweep started"
        );

        Self { shutdown_tx }
    }

    /// Stops the sweep task. Called automatically on drop.
    pub fn stop(&self) {
        // send_replace so the flag is set even when the task already exited
        if !self.shutdown_tx.send_replace(true) {
            info!("Background sweep stopped");
        }
    }

    /// Returns true until [`stop`](Self::stop) has been called.
    pub fn is_running(&self) -> bool {
        !*self.shutdown_tx.borrow()
    }
}

impl Drop for CleanScheduler {
    fn drop(&mut self) {
        self.stop();
    }
}

/// The main sweep loop.
async fn sweep_loop<V>(
    store: SharedStore<V>,
    interval: Duration,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    loop {
        // Wait for the interval or shutdown signal
        tokio::select! {
            _ = tokio::time::sleep(interval) => {}
            result = shutdown_rx.changed() => {
                if result.is_err() || *shutdown_rx.borrow() {
                    debug!("Sweep task received shutdown signal");
                    return;
                }
            }
        }

        let evicted = lock(&store).clean();
        if evicted > 0 {
            debug!(evicted = evicted, "Scheduled sweep evicted keys");
        }
    }
}
