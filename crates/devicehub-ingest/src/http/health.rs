//! Liveness and metrics endpoints.

use std::sync::Arc;

use axum::{
    extract::State,
    http::{StatusCode, header::CONTENT_TYPE},
    response::{IntoResponse, Response},
};
use tracing::error;

use crate::state::IngestState;

pub(crate) async fn health() -> &'static str {
    "ok"
}

pub(crate) async fn metrics(State(state): State<Arc<IngestState>>) -> Response {
    match state.telemetry.render() {
        Ok(body) => (
            [(CONTENT_TYPE, "text/plain; version=0.0.4")],
            body,
        )
            .into_response(),
        Err(err) => {
            error!(error = %err, "failed to render metrics");
            (StatusCode::INTERNAL_SERVER_ERROR, "failed to render metrics").into_response()
        }
    }
}
