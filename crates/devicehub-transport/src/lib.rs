#![forbid(unsafe_code)]
#![deny(
    warnings,
    dead_code,
    unused,
    unused_imports,
    unused_must_use,
    unreachable_pub,
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls,
    missing_docs
)]
#![allow(clippy::module_name_repetitions)]

//! Ingestion transport for the DeviceHub relay.
//!
//! Layout:
//! - `client.rs`: the `IngestClient` seam, `ScanSubmission` and `Delivery`
//! - `graphql.rs`: reqwest-based GraphQL client with retry
//! - `backoff.rs`: exponential delay schedule
//! - `wire.rs`: request/response documents shared with the ingestion endpoint
//! - `error.rs`: construction errors

pub mod backoff;
pub mod client;
pub mod error;
pub mod graphql;
pub mod wire;

pub use backoff::{Backoff, BackoffPolicy};
pub use client::{Delivery, IngestClient, ScanSubmission};
pub use error::{TransportError, TransportResult};
pub use graphql::{GraphqlClient, HEADER_API_KEY};
