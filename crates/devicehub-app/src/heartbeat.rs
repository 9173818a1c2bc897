//! Periodic health line and outbox gauges.
//!
//! Retries never give up, so stuck events only surface here: pending depth,
//! age of the oldest pending event and the highest attempt count.

use std::time::Duration;

use chrono::Utc;
use devicehub_outbox::{OutboxResult, OutboxStats, OutboxStore};
use devicehub_telemetry::Metrics;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Default spacing between heartbeats.
pub const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(60);

/// Reports outbox health on a fixed cadence.
#[derive(Debug, Clone)]
pub struct Heartbeat {
    store: OutboxStore,
    metrics: Metrics,
    interval: Duration,
}

impl Heartbeat {
    /// Heartbeat on the default cadence.
    #[must_use]
    pub const fn new(store: OutboxStore, metrics: Metrics) -> Self {
        Self {
            store,
            metrics,
            interval: HEARTBEAT_INTERVAL,
        }
    }

    /// Replace the cadence.
    #[must_use]
    pub const fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Beat until `cancel` fires.
    pub async fn run(self, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(self.interval.max(Duration::from_millis(1)));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                () = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }
            if let Err(err) = self.beat().await {
                warn!(error = %err, "heartbeat could not read outbox stats");
            }
        }
    }

    /// Read outbox stats, publish gauges and log one health line.
    ///
    /// # Errors
    ///
    /// Returns an error if the outbox statistics cannot be read.
    pub async fn beat(&self) -> OutboxResult<OutboxStats> {
        let stats = self.store.stats().await?;
        let oldest_age = stats.oldest_pending_age(Utc::now());
        self.metrics
            .set_outbox_gauges(stats.pending, oldest_age, stats.max_attempts);
        let snapshot = self.metrics.snapshot();
        info!(
            pending = stats.pending,
            sent = stats.sent,
            oldest_pending_age_secs = oldest_age.as_secs(),
            max_attempts = stats.max_attempts,
            events_sent_total = snapshot.events_sent_total,
            send_failures_total = snapshot.event_send_failures_total,
            "relay heartbeat"
        );
        Ok(stats)
    }
}
