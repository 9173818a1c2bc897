//! Router construction and server host for the ingestion endpoint.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    Router,
    http::Request,
    middleware,
    routing::{get, post},
};
use devicehub_telemetry::{Metrics, build_sha};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower::ServiceBuilder;
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use tracing::{Span, info};

use crate::config::IngestSettings;
use crate::error::{IngestResult, IngestServerError};
use crate::http::auth::require_api_key;
use crate::http::constants::{HEADER_REQUEST_ID, ROUTE_GRAPHQL, ROUTE_HEALTH, ROUTE_METRICS};
use crate::http::graphql::graphql;
use crate::http::health::{health, metrics};
use crate::http::telemetry::OperationMetricsLayer;
use crate::state::IngestState;

/// Axum router wrapper that hosts the ingestion endpoint.
#[derive(Debug)]
pub struct IngestServer {
    router: Router,
    state: Arc<IngestState>,
}

impl IngestServer {
    /// Construct the server for `settings`, recording metrics into `telemetry`.
    #[must_use]
    pub fn new(settings: &IngestSettings, telemetry: Metrics) -> Self {
        let state = IngestState::new(settings, telemetry.clone());
        let trace_layer = TraceLayer::new_for_http()
            .make_span_with(|request: &Request<_>| {
                let request_id = request
                    .headers()
                    .get(HEADER_REQUEST_ID)
                    .and_then(|value| value.to_str().ok())
                    .unwrap_or("")
                    .to_string();

                tracing::info_span!(
                    "http.request",
                    method = %request.method(),
                    route = %request.uri().path(),
                    request_id = %request_id,
                    build_sha = %build_sha(),
                    status_code = tracing::field::Empty,
                    latency_ms = tracing::field::Empty
                )
            })
            .on_request(|_request: &Request<_>, _span: &Span| {})
            .on_response(
                |response: &axum::response::Response, latency: Duration, span: &Span| {
                    span.record("status_code", response.status().as_u16());
                    let latency_ms = u64::try_from(latency.as_millis()).unwrap_or(u64::MAX);
                    span.record("latency_ms", latency_ms);
                },
            );
        let layered = ServiceBuilder::new()
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(trace_layer)
            .layer(OperationMetricsLayer::new(telemetry));

        let require_api = middleware::from_fn_with_state(Arc::clone(&state), require_api_key);
        let router = Router::new()
            .route(ROUTE_GRAPHQL, post(graphql).route_layer(require_api))
            .route(ROUTE_HEALTH, get(health))
            .route(ROUTE_METRICS, get(metrics))
            .route_layer(layered)
            .with_state(Arc::clone(&state));

        Self { router, state }
    }

    /// Router serving the endpoint, for in-process use.
    #[must_use]
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Shared handler state.
    #[must_use]
    pub fn state(&self) -> Arc<IngestState> {
        Arc::clone(&self.state)
    }

    /// Bind a listener on `addr`.
    ///
    /// # Errors
    ///
    /// Returns an error if the address cannot be bound.
    pub async fn bind(addr: SocketAddr) -> IngestResult<TcpListener> {
        TcpListener::bind(addr)
            .await
            .map_err(|source| IngestServerError::Bind { addr, source })
    }

    /// Serve requests on `listener` until `shutdown` is cancelled.
    ///
    /// # Errors
    ///
    /// Returns an error if the server terminates unexpectedly.
    pub async fn serve(self, listener: TcpListener, shutdown: CancellationToken) -> IngestResult<()> {
        if let Ok(addr) = listener.local_addr() {
            info!(addr = %addr, "ingest endpoint listening");
        }
        axum::serve(listener, self.router.into_make_service())
            .with_graceful_shutdown(async move { shutdown.cancelled_owned().await })
            .await
            .map_err(|source| IngestServerError::Serve { source })?;
        info!("ingest endpoint stopped");
        Ok(())
    }
}
