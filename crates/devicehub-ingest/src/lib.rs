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

//! Reference ingestion endpoint for DeviceHub relays.
//!
//! Layout:
//! - `config.rs`: environment settings and per-device configuration
//! - `guard.rs`: `DuplicateGuard` idempotency set
//! - `state.rs`: handler state
//! - `http/`: router, api-key middleware, GraphQL and health handlers
//! - `error.rs`: server errors

pub mod config;
pub mod error;
pub mod guard;
pub mod http;
pub mod state;

pub use config::{DeviceDirectory, IngestSettings};
pub use error::{IngestResult, IngestServerError};
pub use guard::{Admission, DEFAULT_GUARD_CAPACITY, DuplicateGuard};
pub use http::router::IngestServer;
pub use state::IngestState;

use devicehub_telemetry::{GlobalContextGuard, LogFormat, LoggingConfig, Metrics, init_logging};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// Run the ingestion endpoint from environment settings until Ctrl-C.
///
/// # Errors
///
/// Returns an error if settings are invalid, telemetry cannot be initialised,
/// the listener cannot be bound, or the server fails while running.
pub async fn run_ingest() -> IngestResult<()> {
    let logging = LoggingConfig {
        format: LogFormat::from_setting(std::env::var("DEVICEHUB_LOG_FORMAT").ok().as_deref()),
        ..LoggingConfig::default()
    };
    init_logging(&logging).map_err(|source| IngestServerError::Telemetry {
        operation: "telemetry.init_logging",
        source,
    })?;
    let _context = GlobalContextGuard::new("ingest", "-");

    let settings = IngestSettings::from_env()?;
    let telemetry = Metrics::new().map_err(|source| IngestServerError::Telemetry {
        operation: "telemetry.metrics",
        source,
    })?;
    info!(
        bind = %settings.bind,
        api_key_required = settings.api_key.is_some(),
        processing_delay_ms = u64::try_from(settings.processing_delay.as_millis()).unwrap_or(u64::MAX),
        "starting ingest endpoint"
    );

    let shutdown = CancellationToken::new();
    let trigger = shutdown.clone();
    tokio::spawn(async move {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!(error = %err, "failed to listen for shutdown signal");
        }
        trigger.cancel();
    });

    let listener = IngestServer::bind(settings.bind).await?;
    IngestServer::new(&settings, telemetry)
        .serve(listener, shutdown)
        .await
}
