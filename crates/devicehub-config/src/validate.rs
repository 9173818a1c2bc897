//! Validation helpers for relay settings and fetched device tunables.

use url::Url;

use crate::defaults::MAX_DISPATCH_BATCH_SIZE;
use crate::error::{ConfigError, ConfigResult};
use crate::model::{AppSettings, DeviceConfig};

/// Validate a fully merged settings document.
///
/// # Errors
///
/// Returns the first field that fails validation.
pub fn validate_settings(settings: &AppSettings) -> ConfigResult<()> {
    require_non_empty("device_id", &settings.device_id)?;
    parse_endpoint_url(&settings.graphql_url)?;
    if settings.request_timeout_secs == 0 {
        return Err(ConfigError::invalid(
            "request_timeout_secs",
            "zero",
            Some("0".to_string()),
        ));
    }
    if settings.capture_channel_capacity == 0 {
        return Err(ConfigError::invalid(
            "capture_channel_capacity",
            "zero",
            Some("0".to_string()),
        ));
    }
    if !(1..=MAX_DISPATCH_BATCH_SIZE).contains(&settings.dispatch_batch_size) {
        return Err(ConfigError::invalid(
            "dispatch_batch_size",
            "out_of_range",
            Some(settings.dispatch_batch_size.to_string()),
        ));
    }
    if settings.watch_folder.as_os_str().is_empty() {
        return Err(ConfigError::MissingField {
            field: "watch_folder",
        });
    }
    if settings.database_path.as_os_str().is_empty() {
        return Err(ConfigError::MissingField {
            field: "database_path",
        });
    }
    validate_device_config(&settings.device_config)
}

/// Validate device tunables before they become the live snapshot.
///
/// # Errors
///
/// Returns an error when the dispatch interval is zero.
pub fn validate_device_config(config: &DeviceConfig) -> ConfigResult<()> {
    if config.dispatch_interval_ms == 0 {
        return Err(ConfigError::invalid(
            "dispatch_interval_ms",
            "zero",
            Some("0".to_string()),
        ));
    }
    Ok(())
}

/// Parse the ingestion endpoint URL, accepting only HTTP(S).
///
/// # Errors
///
/// Returns an error when the value is empty, unparsable, or not HTTP(S).
pub fn parse_endpoint_url(raw: &str) -> ConfigResult<Url> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ConfigError::MissingField {
            field: "graphql_url",
        });
    }
    let url = Url::parse(trimmed)
        .map_err(|_| ConfigError::invalid("graphql_url", "unparsable", Some(trimmed.into())))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        _ => Err(ConfigError::invalid(
            "graphql_url",
            "unsupported_scheme",
            Some(trimmed.into()),
        )),
    }
}

fn require_non_empty(field: &'static str, value: &str) -> ConfigResult<()> {
    if value.trim().is_empty() {
        return Err(ConfigError::MissingField { field });
    }
    Ok(())
}
