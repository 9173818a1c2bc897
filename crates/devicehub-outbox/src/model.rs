//! Outbox rows and their status lifecycle.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;

use crate::error::{OutboxError, Result};

/// Delivery status of a queued event. `Pending` → `Sent` is one-way.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanStatus {
    /// Waiting for (re)delivery; failed attempts stay here with `attempts > 0`.
    Pending,
    /// Acknowledged by the remote endpoint.
    Sent,
}

impl ScanStatus {
    /// Label persisted in the `status` column.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Sent => "sent",
        }
    }

    pub(crate) fn parse(label: &str) -> Result<Self> {
        match label {
            "pending" => Ok(Self::Pending),
            "sent" => Ok(Self::Sent),
            other => Err(OutboxError::InvalidRow {
                field: "status",
                value: other.to_string(),
            }),
        }
    }
}

/// A captured event about to enter the outbox.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewScanEvent {
    /// Idempotency key shared with the remote endpoint.
    pub event_id: String,
    /// Scanned payload exactly as captured.
    pub raw_data: String,
    /// Source device identifier.
    pub device_id: String,
    /// Capture timestamp from the device clock.
    pub captured_at: DateTime<Utc>,
}

impl NewScanEvent {
    /// Wrap a capture with a freshly generated event identifier.
    #[must_use]
    pub fn capture(
        raw_data: impl Into<String>,
        device_id: impl Into<String>,
        captured_at: DateTime<Utc>,
    ) -> Self {
        Self {
            event_id: Uuid::new_v4().to_string(),
            raw_data: raw_data.into(),
            device_id: device_id.into(),
            captured_at,
        }
    }
}

/// A persisted outbox row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScanEvent {
    /// Idempotency key shared with the remote endpoint.
    pub event_id: String,
    /// Scanned payload exactly as captured.
    pub raw_data: String,
    /// Source device identifier.
    pub device_id: String,
    /// Capture timestamp from the device clock.
    pub captured_at: DateTime<Utc>,
    /// Delivery status.
    pub status: ScanStatus,
    /// Failed delivery attempts so far.
    pub attempts: u32,
    /// Most recent failure reason; cleared on success.
    pub last_error: Option<String>,
    /// When the row was queued.
    pub created_at: DateTime<Utc>,
    /// When delivery was last attempted.
    pub last_tried_at: Option<DateTime<Utc>>,
    /// When the remote endpoint acknowledged the event.
    pub sent_at: Option<DateTime<Utc>>,
}

#[derive(Debug, FromRow)]
pub(crate) struct ScanEventRow {
    event_id: String,
    raw_data: String,
    device_id: String,
    captured_at: DateTime<Utc>,
    status: String,
    attempts: i64,
    last_error: Option<String>,
    created_at: DateTime<Utc>,
    last_tried_at: Option<DateTime<Utc>>,
    sent_at: Option<DateTime<Utc>>,
}

impl TryFrom<ScanEventRow> for ScanEvent {
    type Error = OutboxError;

    fn try_from(row: ScanEventRow) -> Result<Self> {
        Ok(Self {
            status: ScanStatus::parse(&row.status)?,
            attempts: u32::try_from(row.attempts).unwrap_or(u32::MAX),
            event_id: row.event_id,
            raw_data: row.raw_data,
            device_id: row.device_id,
            captured_at: row.captured_at,
            last_error: row.last_error,
            created_at: row.created_at,
            last_tried_at: row.last_tried_at,
            sent_at: row.sent_at,
        })
    }
}

/// Aggregate view of the outbox for observability.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct OutboxStats {
    /// Events waiting for delivery.
    pub pending: i64,
    /// Events acknowledged by the remote endpoint.
    pub sent: i64,
    /// Creation time of the oldest pending event.
    pub oldest_pending_at: Option<DateTime<Utc>>,
    /// Highest attempt count among pending events.
    pub max_attempts: i64,
}

impl OutboxStats {
    /// Age of the oldest pending event relative to `now`; zero when none are pending.
    #[must_use]
    pub fn oldest_pending_age(&self, now: DateTime<Utc>) -> Duration {
        self.oldest_pending_at
            .and_then(|oldest| (now - oldest).to_std().ok())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeDelta;

    #[test]
    fn status_labels_are_stable() -> Result<()> {
        for status in [ScanStatus::Pending, ScanStatus::Sent] {
            assert_eq!(ScanStatus::parse(status.as_str())?, status);
        }
        assert!(matches!(
            ScanStatus::parse("failed"),
            Err(OutboxError::InvalidRow {
                field: "status",
                ..
            })
        ));
        Ok(())
    }

    #[test]
    fn capture_generates_distinct_ids() {
        let now = Utc::now();
        let first = NewScanEvent::capture("ABC", "Device-001", now);
        let second = NewScanEvent::capture("ABC", "Device-001", now);
        assert_ne!(first.event_id, second.event_id);
        assert!(Uuid::parse_str(&first.event_id).is_ok());
    }

    #[test]
    fn oldest_pending_age_handles_empty_and_future() {
        let now = Utc::now();
        assert_eq!(OutboxStats::default().oldest_pending_age(now), Duration::ZERO);

        let stats = OutboxStats {
            pending: 1,
            oldest_pending_at: Some(now - TimeDelta::seconds(30)),
            ..OutboxStats::default()
        };
        assert_eq!(stats.oldest_pending_age(now).as_secs(), 30);

        let skewed = OutboxStats {
            pending: 1,
            oldest_pending_at: Some(now + TimeDelta::seconds(5)),
            ..OutboxStats::default()
        };
        assert_eq!(skewed.oldest_pending_age(now), Duration::ZERO);
    }
}
