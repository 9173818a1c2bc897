//! HTTP surface of the ingestion endpoint.

pub(crate) mod auth;
pub(crate) mod constants;
pub(crate) mod graphql;
pub(crate) mod health;
pub mod router;
pub(crate) mod telemetry;
