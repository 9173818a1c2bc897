//! Shared state handed to every request handler.

use std::sync::Arc;
use std::time::Duration;

use devicehub_telemetry::Metrics;

use crate::config::{DeviceDirectory, IngestSettings};
use crate::guard::DuplicateGuard;

/// State shared by the ingestion handlers.
#[derive(Debug)]
pub struct IngestState {
    /// Idempotency guard for `sendScan`.
    pub guard: DuplicateGuard,
    /// Configuration served by `getConfig`.
    pub devices: DeviceDirectory,
    /// Key required in `x-api-key`; `None` disables the check.
    pub api_key: Option<String>,
    /// Delay applied before acknowledging a first delivery.
    pub processing_delay: Duration,
    /// Metrics registry exposed on `/metrics`.
    pub telemetry: Metrics,
}

impl IngestState {
    /// State for `settings` with an empty guard.
    #[must_use]
    pub fn new(settings: &IngestSettings, telemetry: Metrics) -> Arc<Self> {
        Arc::new(Self {
            guard: DuplicateGuard::new(),
            devices: settings.devices.clone(),
            api_key: settings.api_key.clone(),
            processing_delay: settings.processing_delay,
            telemetry,
        })
    }
}
