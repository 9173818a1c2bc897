//! Transport seam between the relay loops and the remote endpoint.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use devicehub_config::DeviceConfig;
use tokio_util::sync::CancellationToken;

use crate::wire::ScanInput;

/// A queued event as submitted to the remote endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanSubmission {
    /// Idempotency key.
    pub event_id: String,
    /// Scanned payload.
    pub raw_data: String,
    /// Source device.
    pub device_id: String,
    /// Capture time.
    pub captured_at: DateTime<Utc>,
}

impl From<&ScanSubmission> for ScanInput {
    fn from(submission: &ScanSubmission) -> Self {
        Self {
            event_id: submission.event_id.clone(),
            code: submission.raw_data.clone(),
            device_id: submission.device_id.clone(),
            captured_at: submission.captured_at,
        }
    }
}

/// Final outcome of one `send_scan` call, after any transient retries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery {
    /// The endpoint took responsibility for the event (first time or duplicate).
    Accepted,
    /// The endpoint refused the event or answered with something unusable.
    Rejected(String),
    /// The caller cancelled while the send was in flight.
    Cancelled,
}

impl Delivery {
    /// Whether the event may be marked sent.
    #[must_use]
    pub const fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted)
    }

    /// Reason to record against the event when not accepted.
    #[must_use]
    pub fn failure_reason(&self) -> Option<&str> {
        match self {
            Self::Accepted => None,
            Self::Rejected(reason) => Some(reason),
            Self::Cancelled => Some("dispatch cancelled"),
        }
    }
}

/// Operations the relay needs from the remote ingestion endpoint.
///
/// Implementations never return errors: transient faults are retried
/// internally until `cancel` fires, everything else is folded into the result.
#[async_trait]
pub trait IngestClient: Send + Sync {
    /// Submit one event.
    async fn send_scan(&self, submission: &ScanSubmission, cancel: &CancellationToken) -> Delivery;

    /// Fetch the configuration for `device_id`; `None` when unavailable.
    async fn get_config(
        &self,
        device_id: &str,
        cancel: &CancellationToken,
    ) -> Option<DeviceConfig>;
}
