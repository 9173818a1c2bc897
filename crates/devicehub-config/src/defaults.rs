//! Default values for relay settings and device tunables.
//!
//! # Design
//! - Centralise defaults so the loader, model, and tests agree on them.

/// Device identifier used when none is configured.
pub(crate) const DEVICE_ID: &str = "Device-001";
/// Service name recorded in logs.
pub(crate) const SERVICE_NAME: &str = "devicehub";
/// Folder polled for capture files.
pub(crate) const WATCH_FOLDER: &str = "./scans";
/// SQLite database holding the outbox.
pub(crate) const DATABASE_PATH: &str = "./devicehub.db";
/// Debounce window applied to identical payloads.
pub(crate) const DEBOUNCE_MS: u64 = 500;
/// Pause between dispatcher cycles.
pub(crate) const DISPATCH_INTERVAL_MS: u64 = 5_000;
/// Minutes between remote configuration fetches.
pub(crate) const CONFIG_FETCH_MINUTES: u64 = 1;
/// Per-request timeout for the ingestion endpoint.
pub(crate) const REQUEST_TIMEOUT_SECS: u64 = 10;
/// Capacity of the capture-to-outbox channel.
pub(crate) const CAPTURE_CHANNEL_CAPACITY: usize = 256;
/// Events fetched per dispatcher cycle.
pub(crate) const DISPATCH_BATCH_SIZE: u32 = 25;
/// Upper bound accepted for the dispatcher batch size.
pub(crate) const MAX_DISPATCH_BATCH_SIZE: u32 = 1_000;

/// Base settings document read from the configuration directory.
pub const SETTINGS_FILE: &str = "appsettings.json";
/// File holding the bootstrapped API key.
pub const API_KEY_FILE: &str = "api.key";
