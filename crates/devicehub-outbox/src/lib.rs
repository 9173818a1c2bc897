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

//! Durable SQLite outbox for captured scan events.
//!
//! Layout: `model.rs` (event rows and status), `store.rs` (`OutboxStore`),
//! `error.rs` (error types). Migrations live in `migrations/`.

pub mod error;
pub mod model;
pub mod store;

pub use error::{OutboxError, Result as OutboxResult};
pub use model::{NewScanEvent, OutboxStats, ScanEvent, ScanStatus};
pub use store::{DEFAULT_BATCH_SIZE, OutboxStore};
