//! Typed settings models.
//!
//! # Design
//! - Pure data carriers; loading lives in `loader.rs`, checks in `validate.rs`.
//! - `DeviceConfig` is `Copy` so a snapshot can be read by value anywhere.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::defaults;
use crate::error::ConfigError;

/// Device tunables synchronised from the remote endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    /// Minimum spacing between accepted captures of the same payload.
    pub debounce_ms: u64,
    /// Whether dispatch may group events. Reserved policy knob.
    pub batching_enabled: bool,
    /// Sleep between dispatcher cycles.
    pub dispatch_interval_ms: u64,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            debounce_ms: defaults::DEBOUNCE_MS,
            batching_enabled: false,
            dispatch_interval_ms: defaults::DISPATCH_INTERVAL_MS,
        }
    }
}

impl DeviceConfig {
    /// Debounce window as a [`Duration`].
    #[must_use]
    pub const fn debounce_window(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    /// Dispatcher pause as a [`Duration`].
    #[must_use]
    pub const fn dispatch_interval(&self) -> Duration {
        Duration::from_millis(self.dispatch_interval_ms)
    }
}

/// Capture source variant selected at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScannerKind {
    /// Newline-delimited payload files dropped into the watch folder.
    #[default]
    FileWatcher,
    /// Simulated wireless scanner emitting random codes.
    Simulated,
}

impl ScannerKind {
    /// Stable label for logs and settings.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::FileWatcher => "file_watcher",
            Self::Simulated => "simulated",
        }
    }
}

impl FromStr for ScannerKind {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "file_watcher" | "filewatcher" => Ok(Self::FileWatcher),
            "simulated" | "bluetooth" => Ok(Self::Simulated),
            other => Err(ConfigError::InvalidScanner {
                value: other.to_string(),
            }),
        }
    }
}

/// Process-wide relay settings resolved at startup.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppSettings {
    /// Name recorded in logs.
    pub service_name: String,
    /// Identifier of this device at the remote endpoint.
    pub device_id: String,
    /// Ingestion endpoint URL.
    pub graphql_url: String,
    /// Shared secret sent as `x-api-key`.
    pub graphql_api_key: Option<String>,
    /// Folder polled for capture files.
    pub watch_folder: PathBuf,
    /// SQLite database holding the outbox.
    pub database_path: PathBuf,
    /// Capture source variant.
    pub scanner: ScannerKind,
    /// Minutes between remote configuration fetches; values below 1 are clamped.
    pub config_fetch_minutes: u64,
    /// Per-request timeout for the ingestion endpoint.
    pub request_timeout_secs: u64,
    /// Capacity of the capture-to-outbox channel.
    pub capture_channel_capacity: usize,
    /// Events fetched per dispatcher cycle.
    pub dispatch_batch_size: u32,
    /// Log level used when `RUST_LOG` is unset.
    pub log_level: String,
    /// Log output format (`json` or `pretty`).
    pub log_format: Option<String>,
    /// Device tunables in effect until the first successful refresh.
    pub device_config: DeviceConfig,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            service_name: defaults::SERVICE_NAME.to_string(),
            device_id: defaults::DEVICE_ID.to_string(),
            graphql_url: String::new(),
            graphql_api_key: None,
            watch_folder: PathBuf::from(defaults::WATCH_FOLDER),
            database_path: PathBuf::from(defaults::DATABASE_PATH),
            scanner: ScannerKind::default(),
            config_fetch_minutes: defaults::CONFIG_FETCH_MINUTES,
            request_timeout_secs: defaults::REQUEST_TIMEOUT_SECS,
            capture_channel_capacity: defaults::CAPTURE_CHANNEL_CAPACITY,
            dispatch_batch_size: defaults::DISPATCH_BATCH_SIZE,
            log_level: "info".to_string(),
            log_format: None,
            device_config: DeviceConfig::default(),
        }
    }
}

impl AppSettings {
    /// Interval between configuration fetches, never shorter than one minute.
    #[must_use]
    pub fn config_fetch_interval(&self) -> Duration {
        Duration::from_secs(self.config_fetch_minutes.max(1).saturating_mul(60))
    }

    /// Per-request timeout for the ingestion endpoint.
    #[must_use]
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Side-channel for successfully ingested capture files.
    #[must_use]
    pub fn processed_folder(&self) -> PathBuf {
        self.watch_folder.join("processed")
    }

    /// Side-channel for capture files that could not be read.
    #[must_use]
    pub fn error_folder(&self) -> PathBuf {
        self.watch_folder.join("error")
    }

    /// Settings rendered as JSON with secret-bearing values masked.
    #[must_use]
    pub fn redacted(&self) -> Value {
        let mut value = serde_json::to_value(self).unwrap_or(Value::Null);
        redact_secrets(&mut value);
        value
    }
}

const REDACTED: &str = "***";
const SECRET_MARKERS: &[&str] = &["key", "password", "secret", "token"];

/// Mask every non-null value whose key names a secret.
pub fn redact_secrets(value: &mut Value) {
    match value {
        Value::Object(map) => {
            for (key, entry) in map.iter_mut() {
                let lowered = key.to_ascii_lowercase();
                if SECRET_MARKERS.iter().any(|marker| lowered.contains(marker)) {
                    if !entry.is_null() {
                        *entry = Value::String(REDACTED.to_string());
                    }
                } else {
                    redact_secrets(entry);
                }
            }
        }
        Value::Array(items) => items.iter_mut().for_each(redact_secrets),
        _ => {}
    }
}
