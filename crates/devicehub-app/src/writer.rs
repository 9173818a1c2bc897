//! Single consumer moving captured scans into the outbox.
//!
//! # Design
//! - Each scan gets a fresh UUID v4 `event_id` when it is persisted.
//! - A store failure is retried for the same scan until it succeeds or the
//!   relay shuts down; scans are never dropped on transient store errors.
//! - The task ends when every capture sender has been dropped, so scans
//!   already in the channel are persisted before shutdown completes.

use std::time::Duration;

use devicehub_capture::CapturedScan;
use devicehub_outbox::{NewScanEvent, OutboxStore};
use devicehub_telemetry::{CaptureOutcome, Metrics};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Delay between attempts to persist a scan after a store error.
pub const STORE_RETRY_DELAY: Duration = Duration::from_secs(1);

/// Outcome of persisting one captured scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteOutcome {
    /// Stored as a new pending event.
    Queued(String),
    /// An event with the same id already existed.
    AlreadyQueued(String),
    /// Shutdown arrived while the store was failing.
    Abandoned,
}

/// Drains the capture channel into the outbox.
#[derive(Debug, Clone)]
pub struct OutboxWriter {
    store: OutboxStore,
    metrics: Metrics,
    retry_delay: Duration,
}

impl OutboxWriter {
    /// Writer persisting into `store`.
    #[must_use]
    pub const fn new(store: OutboxStore, metrics: Metrics) -> Self {
        Self {
            store,
            metrics,
            retry_delay: STORE_RETRY_DELAY,
        }
    }

    /// Replace the pause between store retries.
    #[must_use]
    pub const fn with_retry_delay(mut self, retry_delay: Duration) -> Self {
        self.retry_delay = retry_delay;
        self
    }

    /// Persist scans until the channel closes.
    ///
    /// `cancel` only interrupts store retries; queued scans are still drained.
    pub async fn run(self, mut receiver: mpsc::Receiver<CapturedScan>, cancel: CancellationToken) {
        let mut queued = 0_u64;
        while let Some(scan) = receiver.recv().await {
            if matches!(self.persist(scan, &cancel).await, WriteOutcome::Queued(_)) {
                queued += 1;
            }
        }
        info!(queued, "outbox writer stopped");
    }

    /// Persist one scan, retrying store errors.
    pub async fn persist(&self, scan: CapturedScan, cancel: &CancellationToken) -> WriteOutcome {
        let event = NewScanEvent::capture(scan.raw_data, scan.device_id, scan.captured_at);
        loop {
            match self.store.enqueue(&event).await {
                Ok(()) => {
                    debug!(event_id = %event.event_id, "scan queued");
                    return WriteOutcome::Queued(event.event_id);
                }
                Err(err) if err.is_duplicate() => {
                    debug!(event_id = %event.event_id, "scan already queued");
                    self.metrics.inc_capture(CaptureOutcome::Duplicate);
                    return WriteOutcome::AlreadyQueued(event.event_id);
                }
                Err(err) => {
                    warn!(
                        error = %err,
                        event_id = %event.event_id,
                        "failed to queue scan; retrying"
                    );
                    tokio::select! {
                        () = cancel.cancelled() => {
                            warn!(event_id = %event.event_id, "shutdown while queueing scan; scan abandoned");
                            return WriteOutcome::Abandoned;
                        }
                        () = tokio::time::sleep(self.retry_delay) => {}
                    }
                }
            }
        }
    }
}
