//! Domain models for scan capture.
//!
//! # Design
//! - Keep the emitted payload small and owned so it can cross the channel.
//! - The raw value is preserved exactly; normalisation only affects debounce keys.

use chrono::{DateTime, Utc};

/// A debounced scan handed to the outbox writer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedScan {
    /// Scanned payload exactly as read.
    pub raw_data: String,
    /// Capture timestamp from the device clock.
    pub captured_at: DateTime<Utc>,
    /// Device that produced the scan.
    pub device_id: String,
}

/// What happened to a single capture stimulus.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmitOutcome {
    /// Sent to the outbox writer.
    Emitted,
    /// Suppressed by the debounce window.
    Debounced,
    /// Blank payload; nothing to capture.
    Ignored,
}
