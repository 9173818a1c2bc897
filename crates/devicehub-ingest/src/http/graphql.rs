//! GraphQL handler for `sendScan` and `getConfig`.
//!
//! # Design
//! - The operation is identified from the query document; variables carry the input.
//! - Input problems are reported in the `errors` list with HTTP 200, as GraphQL servers do.
//! - Duplicate deliveries are acknowledged as accepted so relay retries stay safe.

use std::sync::Arc;

use axum::{
    Json,
    extract::State,
    response::{IntoResponse, Response},
};
use chrono::Utc;
use devicehub_transport::wire::{
    DeviceConfigPayload, GetConfigData, GetConfigVariables, GraphqlResponse, ScanInput,
    SendScanData, SendScanResult,
};
use serde::Deserialize;
use serde_json::Value;
use tracing::{info, warn};

use crate::guard::Admission;
use crate::http::telemetry::IngestOperation;
use crate::state::IngestState;

/// Incoming request; `variables` may be omitted by callers.
#[derive(Debug, Deserialize)]
pub(crate) struct OperationRequest {
    pub(crate) query: String,
    #[serde(default)]
    pub(crate) variables: Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Operation {
    SendScan,
    GetConfig,
}

impl Operation {
    fn detect(query: &str) -> Option<Self> {
        if query.contains("sendScan") {
            Some(Self::SendScan)
        } else if query.contains("getConfig") {
            Some(Self::GetConfig)
        } else {
            None
        }
    }

    const fn label(self) -> &'static str {
        match self {
            Self::SendScan => "sendScan",
            Self::GetConfig => "getConfig",
        }
    }
}

pub(crate) async fn graphql(
    State(state): State<Arc<IngestState>>,
    Json(request): Json<OperationRequest>,
) -> Response {
    let operation = Operation::detect(&request.query);
    let mut response = match operation {
        Some(Operation::SendScan) => Json(send_scan(&state, request.variables).await).into_response(),
        Some(Operation::GetConfig) => Json(get_config(&state, request.variables)).into_response(),
        None => {
            warn!("unsupported graphql operation");
            Json(GraphqlResponse::<Value>::error("unsupported operation")).into_response()
        }
    };
    response
        .extensions_mut()
        .insert(IngestOperation(operation.map_or("unsupported", Operation::label)));
    response
}

async fn send_scan(state: &IngestState, mut variables: Value) -> GraphqlResponse<SendScanData> {
    let processed_at = Utc::now();
    let raw_input = variables
        .get_mut("input")
        .map(Value::take)
        .unwrap_or_default();
    let input = match serde_json::from_value::<ScanInput>(raw_input) {
        Ok(input) => input,
        Err(err) => {
            warn!(error = %err, "sendScan input rejected");
            return GraphqlResponse::error("invalid sendScan input");
        }
    };
    if input.event_id.trim().is_empty() {
        return GraphqlResponse::error("eventId must not be empty");
    }

    let admission = state.guard.check(&input.event_id);
    match admission {
        Admission::First => {
            info!(
                event_id = %input.event_id,
                device_id = %input.device_id,
                captured_at = %input.captured_at,
                "scan processed"
            );
            if !state.processing_delay.is_zero() {
                tokio::time::sleep(state.processing_delay).await;
            }
        }
        Admission::Duplicate => {
            warn!(event_id = %input.event_id, "duplicate scan acknowledged");
        }
    }

    GraphqlResponse::data(SendScanData {
        send_scan: Some(SendScanResult {
            accepted: true,
            message: Some(admission.message().to_string()),
            processed_at: Some(processed_at),
        }),
    })
}

fn get_config(state: &IngestState, variables: Value) -> GraphqlResponse<GetConfigData> {
    let Ok(GetConfigVariables { device_id }) = serde_json::from_value(variables) else {
        return GraphqlResponse::error("invalid getConfig variables");
    };
    let config = state.devices.config_for(&device_id);
    info!(device_id = %device_id, debounce_ms = config.debounce_ms, "serving device config");
    GraphqlResponse::data(GetConfigData {
        get_config: Some(DeviceConfigPayload::from(config)),
    })
}
