//! Periodic refresh of the live device configuration.
//!
//! # Design
//! - Fetch immediately at start, then on every interval tick.
//! - A successful fetch replaces the whole snapshot; anything else keeps the
//!   previous snapshot and is counted as a failed refresh.

use std::sync::Arc;
use std::time::Duration;

use devicehub_config::{DeviceConfig, LiveConfig};
use devicehub_telemetry::Metrics;
use devicehub_transport::IngestClient;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Keeps [`LiveConfig`] in sync with the ingestion endpoint.
pub struct ConfigWatcher {
    client: Arc<dyn IngestClient>,
    live: LiveConfig,
    device_id: String,
    interval: Duration,
    metrics: Metrics,
}

impl std::fmt::Debug for ConfigWatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfigWatcher")
            .field("device_id", &self.device_id)
            .field("interval", &self.interval)
            .finish_non_exhaustive()
    }
}

impl ConfigWatcher {
    /// Watcher refreshing `live` for `device_id` every `interval`.
    #[must_use]
    pub fn new(
        client: Arc<dyn IngestClient>,
        live: LiveConfig,
        device_id: impl Into<String>,
        interval: Duration,
        metrics: Metrics,
    ) -> Self {
        Self {
            client,
            live,
            device_id: device_id.into(),
            interval,
            metrics,
        }
    }

    /// Refresh until `cancel` fires.
    pub async fn run(self, cancel: CancellationToken) {
        info!(
            device_id = %self.device_id,
            interval_secs = self.interval.as_secs(),
            "config watcher started"
        );
        let mut ticker = tokio::time::interval(self.interval.max(Duration::from_millis(1)));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                () = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }
            self.refresh(&cancel).await;
        }
        info!("config watcher stopped");
    }

    /// Fetch once and apply the result. Returns the config now in effect when
    /// the fetch succeeded.
    pub async fn refresh(&self, cancel: &CancellationToken) -> Option<DeviceConfig> {
        match self.client.get_config(&self.device_id, cancel).await {
            Some(next) => {
                let previous = self.live.replace(next);
                self.metrics.inc_config_refresh("applied");
                if *previous == next {
                    info!("device config unchanged");
                } else {
                    info!(
                        debounce_ms = next.debounce_ms,
                        batching_enabled = next.batching_enabled,
                        dispatch_interval_ms = next.dispatch_interval_ms,
                        "device config updated"
                    );
                }
                Some(next)
            }
            None if cancel.is_cancelled() => None,
            None => {
                self.metrics.inc_config_refresh("failed");
                let current = self.live.snapshot();
                warn!(
                    debounce_ms = current.debounce_ms,
                    dispatch_interval_ms = current.dispatch_interval_ms,
                    "config refresh failed; keeping previous config"
                );
                None
            }
        }
    }
}
