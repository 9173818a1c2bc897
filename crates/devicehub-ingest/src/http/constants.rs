//! Header names and routes shared by the HTTP layer.

pub(crate) use devicehub_transport::HEADER_API_KEY;

/// Header used to correlate requests across logs.
pub(crate) const HEADER_REQUEST_ID: &str = "x-request-id";

/// GraphQL endpoint.
pub(crate) const ROUTE_GRAPHQL: &str = "/graphql";
/// Liveness probe, exempt from authentication.
pub(crate) const ROUTE_HEALTH: &str = "/healthz";
/// Prometheus exposition.
pub(crate) const ROUTE_METRICS: &str = "/metrics";
