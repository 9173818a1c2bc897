//! Debounced emission onto the bounded capture channel.

use chrono::Utc;
use devicehub_config::LiveConfig;
use devicehub_telemetry::{CaptureOutcome, Metrics};
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::debug;

use crate::debounce::Debouncer;
use crate::error::{CaptureError, CaptureResult};
use crate::model::{CapturedScan, EmitOutcome};

/// Turns raw stimuli into [`CapturedScan`]s, applying the live debounce window.
///
/// Owned by exactly one capture task; the debounce cache is not shared.
#[derive(Debug)]
pub struct ScanEmitter {
    device_id: String,
    live: LiveConfig,
    sender: mpsc::Sender<CapturedScan>,
    metrics: Metrics,
    debouncer: Debouncer,
}

impl ScanEmitter {
    /// Emitter for `device_id` sending into `sender`.
    #[must_use]
    pub fn new(
        device_id: impl Into<String>,
        live: LiveConfig,
        sender: mpsc::Sender<CapturedScan>,
        metrics: Metrics,
    ) -> Self {
        Self {
            device_id: device_id.into(),
            live,
            sender,
            metrics,
            debouncer: Debouncer::new(),
        }
    }

    /// Offer one stimulus. Waits for channel capacity when the writer lags.
    ///
    /// # Errors
    ///
    /// Returns [`CaptureError::ChannelClosed`] once the consumer is gone.
    pub async fn offer(&mut self, raw: &str) -> CaptureResult<EmitOutcome> {
        self.offer_at(raw, Instant::now()).await
    }

    pub(crate) async fn offer_at(&mut self, raw: &str, now: Instant) -> CaptureResult<EmitOutcome> {
        if raw.trim().is_empty() {
            return Ok(EmitOutcome::Ignored);
        }
        let window = self.live.snapshot().debounce_window();
        if !self.debouncer.admit(raw, window, now) {
            debug!(raw_data = raw, "scan debounced");
            self.metrics.inc_capture(CaptureOutcome::Debounced);
            return Ok(EmitOutcome::Debounced);
        }

        let scan = CapturedScan {
            raw_data: raw.to_string(),
            captured_at: Utc::now(),
            device_id: self.device_id.clone(),
        };
        self.sender
            .send(scan)
            .await
            .map_err(|_| CaptureError::ChannelClosed)?;
        self.metrics.inc_capture(CaptureOutcome::Emitted);
        Ok(EmitOutcome::Emitted)
    }

    /// Whether the consumer side of the channel has gone away.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }
}
