//! Api-key middleware for the GraphQL route.

use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::warn;

use crate::http::constants::HEADER_API_KEY;
use crate::state::IngestState;

pub(crate) async fn require_api_key(
    State(state): State<Arc<IngestState>>,
    req: Request<Body>,
    next: Next,
) -> Response {
    let Some(expected) = state.api_key.as_deref() else {
        return next.run(req).await;
    };
    let supplied = req
        .headers()
        .get(HEADER_API_KEY)
        .and_then(|value| value.to_str().ok());
    if supplied == Some(expected) {
        return next.run(req).await;
    }
    warn!(
        route = %req.uri().path(),
        key_present = supplied.is_some(),
        "rejected request with missing or invalid api key"
    );
    unauthorized()
}

pub(crate) fn unauthorized() -> Response {
    (StatusCode::UNAUTHORIZED, "Unauthorized").into_response()
}
