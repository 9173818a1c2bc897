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

//! Standalone ingestion endpoint for local development and integration runs.

use devicehub_ingest::{IngestResult, run_ingest};

/// Serves the ingestion endpoint until Ctrl-C.
#[tokio::main]
async fn main() -> IngestResult<()> {
    run_ingest().await
}
