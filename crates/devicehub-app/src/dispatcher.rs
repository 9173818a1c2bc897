//! Dispatcher loop delivering pending outbox events.
//!
//! # Design
//! - One cycle fetches the oldest pending events (bounded batch) and sends them in order.
//! - Events are isolated: a store error on one event is logged and the batch continues.
//! - Delivery is retried forever; attempts and last error are recorded on the row.
//! - The pause between cycles is read from the live config on every cycle and
//!   cut short when the config is replaced.

use std::sync::Arc;

use chrono::Utc;
use devicehub_config::LiveConfig;
use devicehub_outbox::{DEFAULT_BATCH_SIZE, OutboxStore, ScanEvent};
use devicehub_telemetry::{CycleLabel, Metrics};
use devicehub_transport::{Delivery, IngestClient, ScanSubmission};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

/// Summary of one dispatcher cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CycleReport {
    /// Events fetched for this cycle.
    pub total: usize,
    /// Events accepted by the endpoint and marked sent.
    pub sent: usize,
    /// Events recorded as failed attempts.
    pub failed: usize,
    /// The pending batch could not be read.
    pub errored: bool,
    /// Shutdown interrupted the batch.
    pub cancelled: bool,
}

impl CycleReport {
    /// Observability label for the cycle.
    #[must_use]
    pub const fn outcome(&self) -> CycleLabel {
        if self.errored {
            CycleLabel::Errored
        } else if self.total == 0 {
            CycleLabel::Idle
        } else if self.sent > 0 {
            CycleLabel::Delivered
        } else {
            CycleLabel::Stalled
        }
    }
}

/// Moves pending events from the outbox to the ingestion endpoint.
pub struct Dispatcher {
    store: OutboxStore,
    client: Arc<dyn IngestClient>,
    live: LiveConfig,
    metrics: Metrics,
    batch_size: u32,
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("batch_size", &self.batch_size)
            .finish_non_exhaustive()
    }
}

impl Dispatcher {
    /// Dispatcher using the default batch size.
    #[must_use]
    pub const fn new(
        store: OutboxStore,
        client: Arc<dyn IngestClient>,
        live: LiveConfig,
        metrics: Metrics,
    ) -> Self {
        Self {
            store,
            client,
            live,
            metrics,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }

    /// Replace the number of events fetched per cycle.
    #[must_use]
    pub const fn with_batch_size(mut self, batch_size: u32) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Run cycles until `cancel` fires.
    pub async fn run(self, cancel: CancellationToken) {
        info!(batch_size = self.batch_size, "dispatcher started");
        let mut changes = self.live.subscribe();
        while !cancel.is_cancelled() {
            self.run_cycle(&cancel).await;
            let pause = self.live.snapshot().dispatch_interval();
            tokio::select! {
                () = cancel.cancelled() => break,
                () = tokio::time::sleep(pause) => {}
                // A new config ends the pause so its interval applies at once.
                Ok(()) = changes.changed() => {}
            }
        }
        info!("dispatcher stopped");
    }

    /// Run a single cycle over the current pending batch.
    #[instrument(name = "dispatcher.cycle", skip(self, cancel))]
    pub async fn run_cycle(&self, cancel: &CancellationToken) -> CycleReport {
        let mut report = CycleReport::default();
        let batch = match self.store.get_pending(self.batch_size).await {
            Ok(batch) => batch,
            Err(err) => {
                warn!(error = %err, "failed to read pending events");
                report.errored = true;
                self.metrics.inc_dispatch_cycle(report.outcome());
                return report;
            }
        };
        report.total = batch.len();

        for event in batch {
            if cancel.is_cancelled() {
                report.cancelled = true;
                break;
            }
            let delivery = self.client.send_scan(&submission(&event), cancel).await;
            match delivery.failure_reason() {
                None => match self.store.mark_sent(&event.event_id, Utc::now()).await {
                    Ok(_) => {
                        self.metrics.inc_event_sent();
                        report.sent += 1;
                    }
                    Err(err) => {
                        warn!(error = %err, event_id = %event.event_id, "failed to mark event sent");
                    }
                },
                Some(reason) => {
                    self.metrics.inc_send_failure();
                    report.failed += 1;
                    debug!(event_id = %event.event_id, attempts = event.attempts.saturating_add(1), reason, "delivery failed");
                    if let Err(err) = self.store.mark_failed(&event.event_id, reason).await {
                        warn!(error = %err, event_id = %event.event_id, "failed to record delivery failure");
                    }
                }
            }
            if delivery == Delivery::Cancelled {
                report.cancelled = true;
                break;
            }
        }

        if report.total > 0 {
            info!(sent = report.sent, total = report.total, "dispatch batch complete");
        }
        self.metrics.inc_dispatch_cycle(report.outcome());
        report
    }
}

fn submission(event: &ScanEvent) -> ScanSubmission {
    ScanSubmission {
        event_id: event.event_id.clone(),
        raw_data: event.raw_data.clone(),
        device_id: event.device_id.clone(),
        captured_at: event.captured_at,
    }
}
