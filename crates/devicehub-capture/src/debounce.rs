//! Debounce cache for repeated scans.
//!
//! # Design
//! - Keys are the trimmed, lowercased payload; the raw value is never altered.
//! - Each entry expires at `stimulus + window`, where the window is whatever was
//!   configured at the moment of the stimulus.
//! - Expired entries are pruned on every admission so the map stays bounded by
//!   the number of distinct scans inside one window.

use std::collections::HashMap;
use std::time::Duration;

use tokio::time::Instant;

/// Tracks recently seen scans to suppress rapid repeats.
#[derive(Debug, Default)]
pub struct Debouncer {
    entries: HashMap<String, Instant>,
}

impl Debouncer {
    /// Empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` when `raw` should be emitted, recording it for `window`.
    /// A repeat inside an unexpired window returns `false` and leaves the
    /// original expiry untouched.
    pub fn admit(&mut self, raw: &str, window: Duration, now: Instant) -> bool {
        self.entries.retain(|_, expires_at| *expires_at > now);
        let key = normalise(raw);
        if self.entries.contains_key(&key) {
            return false;
        }
        if !window.is_zero() {
            self.entries.insert(key, now + window);
        }
        true
    }

    /// Number of live entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no entries are live.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Debounce key for a payload.
#[must_use]
pub fn normalise(raw: &str) -> String {
    raw.trim().to_lowercase()
}
