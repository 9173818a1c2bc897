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

//! DeviceHub relay wiring.
//!
//! Layout: `bootstrap.rs` (settings, telemetry and task wiring), `writer.rs`
//! (capture channel to outbox), `dispatcher.rs` (outbox to endpoint),
//! `config_watch.rs` (live config refresh), `heartbeat.rs` (outbox health).

/// Application bootstrap and environment loading.
pub mod bootstrap;
/// Live device configuration refresh.
pub mod config_watch;
/// Outbox delivery loop.
pub mod dispatcher;
/// Application errors.
pub mod error;
/// Periodic outbox health reporting.
pub mod heartbeat;
/// Capture channel consumer.
pub mod writer;

pub use bootstrap::{BootstrapDependencies, run_app, run_app_with};
pub use config_watch::ConfigWatcher;
pub use dispatcher::{CycleReport, Dispatcher};
pub use error::{AppError, AppResult};
pub use heartbeat::{HEARTBEAT_INTERVAL, Heartbeat};
pub use writer::{OutboxWriter, STORE_RETRY_DELAY, WriteOutcome};
