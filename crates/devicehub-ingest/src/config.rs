//! Ingestion endpoint settings.
//!
//! # Design
//! - Environment-only configuration; the reference endpoint has no settings file.
//! - Device configuration falls back to shared defaults unless a device has an override.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::Duration;

use devicehub_config::DeviceConfig;

use crate::error::{IngestResult, IngestServerError};

/// Environment variable holding the listen address.
pub const ENV_BIND: &str = "DEVICEHUB_INGEST_BIND";
/// Environment variable holding the required api key.
pub const ENV_API_KEY: &str = "DEVICEHUB_INGEST_API_KEY";
/// Environment variable holding an artificial delay applied to first deliveries.
pub const ENV_PROCESSING_DELAY_MS: &str = "DEVICEHUB_INGEST_PROCESSING_DELAY_MS";
/// Listen address used when none is configured.
pub const DEFAULT_BIND: &str = "127.0.0.1:5181";

/// Per-device configuration served by `getConfig`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceDirectory {
    defaults: DeviceConfig,
    overrides: HashMap<String, DeviceConfig>,
}

impl DeviceDirectory {
    /// Directory answering every device with `defaults`.
    #[must_use]
    pub fn new(defaults: DeviceConfig) -> Self {
        Self {
            defaults,
            overrides: HashMap::new(),
        }
    }

    /// Serve `config` to `device_id` instead of the defaults.
    #[must_use]
    pub fn with_override(mut self, device_id: impl Into<String>, config: DeviceConfig) -> Self {
        self.overrides.insert(device_id.into(), config);
        self
    }

    /// Configuration for `device_id`.
    #[must_use]
    pub fn config_for(&self, device_id: &str) -> DeviceConfig {
        self.overrides
            .get(device_id)
            .copied()
            .unwrap_or(self.defaults)
    }
}

/// Settings for the ingestion endpoint.
#[derive(Debug, Clone)]
pub struct IngestSettings {
    /// Listen address.
    pub bind: SocketAddr,
    /// Key required in `x-api-key`; `None` disables the check.
    pub api_key: Option<String>,
    /// Delay applied before acknowledging a first delivery.
    pub processing_delay: Duration,
    /// Device configuration served by `getConfig`.
    pub devices: DeviceDirectory,
}

impl Default for IngestSettings {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([127, 0, 0, 1], 5181)),
            api_key: None,
            processing_delay: Duration::ZERO,
            devices: DeviceDirectory::default(),
        }
    }
}

impl IngestSettings {
    /// Settings read from the process environment.
    ///
    /// # Errors
    ///
    /// Returns an error if a variable holds an unparseable value.
    pub fn from_env() -> IngestResult<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Settings read through the supplied environment lookup.
    ///
    /// # Errors
    ///
    /// See [`IngestSettings::from_env`].
    pub fn from_lookup<F>(lookup: F) -> IngestResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let raw_bind = non_empty(lookup(ENV_BIND)).unwrap_or_else(|| DEFAULT_BIND.to_string());
        let bind = raw_bind
            .parse()
            .map_err(|_| IngestServerError::InvalidBindAddr {
                value: raw_bind.clone(),
            })?;
        let processing_delay = match non_empty(lookup(ENV_PROCESSING_DELAY_MS)) {
            Some(raw) => raw.parse().map(Duration::from_millis).map_err(|_| {
                IngestServerError::InvalidSetting {
                    name: ENV_PROCESSING_DELAY_MS,
                    value: raw,
                }
            })?,
            None => Duration::ZERO,
        };
        Ok(Self {
            bind,
            api_key: non_empty(lookup(ENV_API_KEY)),
            processing_delay,
            devices: DeviceDirectory::default(),
        })
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|raw| raw.trim().to_string())
        .filter(|raw| !raw.is_empty())
}
