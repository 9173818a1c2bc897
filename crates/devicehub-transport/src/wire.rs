//! GraphQL wire documents shared by the relay client and the ingestion endpoint.
//!
//! # Design
//! - Field names follow the GraphQL schema (camelCase); Rust types stay snake_case.
//! - Response bodies tolerate missing `data` and `errors` so a malformed but
//!   valid-JSON reply is classified rather than failing to decode.

use chrono::{DateTime, Utc};
use devicehub_config::DeviceConfig;
use serde::{Deserialize, Serialize};

/// Mutation submitting one scan event.
pub const SEND_SCAN_MUTATION: &str = "mutation ($input: ScanInput!) { sendScan(input: $input) { accepted message processedAt } }";

/// Query fetching a device's configuration.
pub const GET_CONFIG_QUERY: &str = "query ($deviceId: String!) { getConfig(deviceId: $deviceId) { debounceMs batchingEnabled dispatchIntervalMs } }";

/// POST body for a GraphQL operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphqlRequest<V> {
    /// Operation document.
    pub query: String,
    /// Operation variables.
    pub variables: V,
}

impl<V> GraphqlRequest<V> {
    /// Request for `query` with `variables`.
    pub fn new(query: &str, variables: V) -> Self {
        Self {
            query: query.to_string(),
            variables,
        }
    }
}

/// Standard GraphQL response envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphqlResponse<T> {
    /// Operation result, absent on failure.
    pub data: Option<T>,
    /// Errors reported by the server.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<GraphqlError>,
}

impl<T> GraphqlResponse<T> {
    /// Successful response carrying `data`.
    pub const fn data(data: T) -> Self {
        Self {
            data: Some(data),
            errors: Vec::new(),
        }
    }

    /// Failed response with a single error message.
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            data: None,
            errors: vec![GraphqlError {
                message: message.into(),
            }],
        }
    }
}

/// One entry of a response's `errors` list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphqlError {
    /// Human-readable description.
    pub message: String,
}

/// `ScanInput` of the `sendScan` mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanInput {
    /// Idempotency key.
    pub event_id: String,
    /// Scanned payload.
    pub code: String,
    /// Source device.
    pub device_id: String,
    /// Capture time.
    pub captured_at: DateTime<Utc>,
}

/// Variables of the `sendScan` mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendScanVariables {
    /// Submitted scan.
    pub input: ScanInput,
}

/// `data` of a `sendScan` response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendScanData {
    /// Mutation result.
    #[serde(default)]
    pub send_scan: Option<SendScanResult>,
}

/// Result of the `sendScan` mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendScanResult {
    /// Whether the server took responsibility for the event.
    pub accepted: bool,
    /// Free-form status (`ok`, `duplicate`, or a rejection reason).
    #[serde(default)]
    pub message: Option<String>,
    /// Server-side processing time.
    #[serde(default)]
    pub processed_at: Option<DateTime<Utc>>,
}

/// Variables of the `getConfig` query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetConfigVariables {
    /// Device whose configuration is requested.
    pub device_id: String,
}

/// `data` of a `getConfig` response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetConfigData {
    /// Configuration, or `null` when the device is unknown.
    #[serde(default)]
    pub get_config: Option<DeviceConfigPayload>,
}

/// Device configuration as carried on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceConfigPayload {
    /// Debounce window in milliseconds.
    pub debounce_ms: u64,
    /// Reserved batching policy flag.
    pub batching_enabled: bool,
    /// Dispatcher sleep between cycles in milliseconds.
    pub dispatch_interval_ms: u64,
}

impl From<DeviceConfigPayload> for DeviceConfig {
    fn from(payload: DeviceConfigPayload) -> Self {
        Self {
            debounce_ms: payload.debounce_ms,
            batching_enabled: payload.batching_enabled,
            dispatch_interval_ms: payload.dispatch_interval_ms,
        }
    }
}

impl From<DeviceConfig> for DeviceConfigPayload {
    fn from(config: DeviceConfig) -> Self {
        Self {
            debounce_ms: config.debounce_ms,
            batching_enabled: config.batching_enabled,
            dispatch_interval_ms: config.dispatch_interval_ms,
        }
    }
}
