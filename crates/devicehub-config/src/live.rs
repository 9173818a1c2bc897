//! Live device configuration handle.
//!
//! # Design
//! - Holds an immutable `Arc<DeviceConfig>` behind a `watch` channel; a refresh
//!   swaps the whole pointer, so readers see either the old or the new value.
//! - Readers clone the `Arc` and never hold the channel borrow across awaits.
//! - One writer (the config watcher); any number of readers.

use std::sync::Arc;

use tokio::sync::watch;

use crate::model::DeviceConfig;

/// Shared, atomically swappable device configuration.
#[derive(Clone, Debug)]
pub struct LiveConfig {
    sender: Arc<watch::Sender<Arc<DeviceConfig>>>,
}

impl LiveConfig {
    /// Create a handle seeded with `initial`.
    #[must_use]
    pub fn new(initial: DeviceConfig) -> Self {
        let (sender, _receiver) = watch::channel(Arc::new(initial));
        Self {
            sender: Arc::new(sender),
        }
    }

    /// Current configuration snapshot.
    #[must_use]
    pub fn snapshot(&self) -> Arc<DeviceConfig> {
        Arc::clone(&self.sender.borrow())
    }

    /// Replace the whole configuration, returning the previous snapshot.
    pub fn replace(&self, next: DeviceConfig) -> Arc<DeviceConfig> {
        self.sender.send_replace(Arc::new(next))
    }

    /// Receiver notified on every replacement.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Arc<DeviceConfig>> {
        self.sender.subscribe()
    }
}

impl Default for LiveConfig {
    fn default() -> Self {
        Self::new(DeviceConfig::default())
    }
}
