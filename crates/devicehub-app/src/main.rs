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

//! Binary entrypoint for the DeviceHub relay.
//!
//! The first argument, when given, is stored as the ingestion api key.

use devicehub_app::{AppResult, run_app};

/// Bootstraps the relay and blocks until shutdown.
#[tokio::main]
async fn main() -> AppResult<()> {
    run_app(std::env::args().nth(1)).await
}
