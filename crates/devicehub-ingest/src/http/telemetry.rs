//! Per-operation request accounting for the ingestion endpoint.
//!
//! # Design
//! - Every `/graphql` call is the same route, so requests are labelled by the
//!   GraphQL operation the handler resolved (`sendScan`, `getConfig`,
//!   `unsupported`), carried back on the response as an [`IngestOperation`].
//! - Responses produced before the handler runs (auth rejections, malformed
//!   JSON) and the plain endpoints fall back to a fixed endpoint label.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use axum::extract::MatchedPath;
use axum::http::Request;
use axum::response::Response;
use devicehub_telemetry::Metrics;
use tower::{Layer, Service};

use crate::http::constants::{ROUTE_GRAPHQL, ROUTE_HEALTH, ROUTE_METRICS};

/// Response extension naming the operation a GraphQL request resolved to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct IngestOperation(pub(crate) &'static str);

fn endpoint_label(route: Option<&str>) -> &'static str {
    match route {
        Some(ROUTE_GRAPHQL) => "graphql",
        Some(ROUTE_HEALTH) => "health",
        Some(ROUTE_METRICS) => "metrics",
        _ => "other",
    }
}

/// Counts answered requests into `ingest_requests_total`.
#[derive(Clone)]
pub(crate) struct OperationMetricsLayer {
    metrics: Metrics,
}

impl OperationMetricsLayer {
    pub(crate) const fn new(metrics: Metrics) -> Self {
        Self { metrics }
    }
}

impl<S> Layer<S> for OperationMetricsLayer {
    type Service = OperationMetrics<S>;

    fn layer(&self, inner: S) -> Self::Service {
        OperationMetrics {
            inner,
            metrics: self.metrics.clone(),
        }
    }
}

#[derive(Clone)]
pub(crate) struct OperationMetrics<S> {
    inner: S,
    metrics: Metrics,
}

impl<S, B> Service<Request<B>> for OperationMetrics<S>
where
    S: Service<Request<B>, Response = Response> + Clone + Send + 'static,
    S::Future: Send + 'static,
    S::Error: Send,
    B: Send + 'static,
{
    type Response = Response;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Response, S::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, request: Request<B>) -> Self::Future {
        let fallback = endpoint_label(
            request
                .extensions()
                .get::<MatchedPath>()
                .map(MatchedPath::as_str),
        );
        let metrics = self.metrics.clone();
        let pending = self.inner.call(request);

        Box::pin(async move {
            let response = pending.await?;
            let operation = response
                .extensions()
                .get::<IngestOperation>()
                .map_or(fallback, |resolved| resolved.0);
            metrics.inc_ingest_request(operation, response.status().as_u16());
            Ok(response)
        })
    }
}
