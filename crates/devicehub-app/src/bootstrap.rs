//! Relay bootstrap: settings, telemetry, storage and task wiring.
//!
//! # Design
//! - `run_app` resolves everything from the environment and installs logging;
//!   `run_app_with` only wires injected dependencies so tests can drive it.
//! - Startup failures are fatal and returned; loop failures never are.
//! - Shutdown stops capture first, lets the writer drain the channel, then
//!   waits for every background task before closing the store.

use std::sync::Arc;
use std::time::Duration;

use devicehub_capture::{CaptureDriver, CaptureSource};
use devicehub_config::{ApiKeyStore, AppSettings, LiveConfig, SettingsLoader};
use devicehub_outbox::OutboxStore;
use devicehub_telemetry::{GlobalContextGuard, LogFormat, LoggingConfig, Metrics, init_logging};
use devicehub_transport::{GraphqlClient, IngestClient};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::config_watch::ConfigWatcher;
use crate::dispatcher::Dispatcher;
use crate::error::{AppError, AppResult};
use crate::heartbeat::{HEARTBEAT_INTERVAL, Heartbeat};
use crate::writer::OutboxWriter;

/// Dependencies required to run the relay.
pub struct BootstrapDependencies {
    /// Resolved relay settings.
    pub settings: AppSettings,
    /// Opened outbox.
    pub store: OutboxStore,
    /// Client for the ingestion endpoint.
    pub client: Arc<dyn IngestClient>,
    /// Shared metrics registry.
    pub metrics: Metrics,
    /// Capture source variant.
    pub capture: CaptureDriver,
    /// Spacing between heartbeat lines.
    pub heartbeat_interval: Duration,
}

impl std::fmt::Debug for BootstrapDependencies {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BootstrapDependencies")
            .field("settings", &self.settings.redacted())
            .field("capture", &self.capture)
            .field("heartbeat_interval", &self.heartbeat_interval)
            .finish_non_exhaustive()
    }
}

impl BootstrapDependencies {
    /// Production dependencies for `settings`: opens the outbox and builds the
    /// GraphQL client.
    ///
    /// # Errors
    ///
    /// Returns an error if the outbox cannot be opened or the client cannot be built.
    pub async fn from_settings(
        settings: AppSettings,
        api_key: Option<&str>,
        metrics: Metrics,
    ) -> AppResult<Self> {
        let store = OutboxStore::open(&settings.database_path)
            .await
            .map_err(|err| AppError::outbox("outbox.open", err))?;
        let client = GraphqlClient::from_settings(&settings, api_key, metrics.clone())
            .map_err(|err| AppError::transport("transport.new", err))?;
        let capture = CaptureDriver::from_settings(&settings);
        Ok(Self {
            settings,
            store,
            client: Arc::new(client),
            metrics,
            capture,
            heartbeat_interval: HEARTBEAT_INTERVAL,
        })
    }
}

/// Entry point for the relay boot sequence. Runs until Ctrl-C.
///
/// `bootstrap_key`, when present, is stored as the ingestion api key.
///
/// # Errors
///
/// Returns an error if settings are invalid, telemetry cannot be initialised,
/// the api key cannot be resolved, or the outbox cannot be opened.
pub async fn run_app(bootstrap_key: Option<String>) -> AppResult<()> {
    let loader = SettingsLoader::from_env();
    let settings = loader
        .load()
        .map_err(|err| AppError::config("settings.load", err))?;

    init_logging(&LoggingConfig {
        level: &settings.log_level,
        format: LogFormat::from_setting(settings.log_format.as_deref()),
        ..LoggingConfig::default()
    })
    .map_err(|err| AppError::telemetry("telemetry.init", err))?;
    let _context = GlobalContextGuard::new("relay", &settings.device_id);

    let api_key = ApiKeyStore::in_dir(loader.dir())
        .resolve(settings.graphql_api_key.as_deref(), bootstrap_key.as_deref())
        .await
        .map_err(|err| AppError::config("api_key.resolve", err))?;
    if api_key.is_none() {
        warn!("no ingestion api key configured; requests are sent without x-api-key");
    }

    let metrics = Metrics::new().map_err(|err| AppError::telemetry("telemetry.metrics", err))?;
    let dependencies =
        BootstrapDependencies::from_settings(settings, api_key.as_deref(), metrics).await?;

    let shutdown = CancellationToken::new();
    let trigger = shutdown.clone();
    tokio::spawn(async move {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!(error = %err, "failed to listen for shutdown signal");
        }
        info!("shutdown signal received");
        trigger.cancel();
    });

    run_app_with(dependencies, shutdown).await
}

/// Run the relay on injected dependencies until `shutdown` is cancelled.
///
/// # Errors
///
/// Returns an error if a background task panics.
pub async fn run_app_with(
    dependencies: BootstrapDependencies,
    shutdown: CancellationToken,
) -> AppResult<()> {
    let BootstrapDependencies {
        settings,
        store,
        client,
        metrics,
        capture,
        heartbeat_interval,
    } = dependencies;

    info!(
        settings = %settings.redacted(),
        processed_folder = %settings.processed_folder().display(),
        error_folder = %settings.error_folder().display(),
        "relay starting"
    );

    let live = LiveConfig::new(settings.device_config);
    let (sender, receiver) = mpsc::channel(settings.capture_channel_capacity.max(1));

    let writer = tokio::spawn(
        OutboxWriter::new(store.clone(), metrics.clone()).run(receiver, shutdown.clone()),
    );
    let tasks: [(&'static str, JoinHandle<()>); 3] = [
        (
            "dispatcher",
            tokio::spawn(
                Dispatcher::new(
                    store.clone(),
                    Arc::clone(&client),
                    live.clone(),
                    metrics.clone(),
                )
                .with_batch_size(settings.dispatch_batch_size)
                .run(shutdown.clone()),
            ),
        ),
        (
            "config_watcher",
            tokio::spawn(
                ConfigWatcher::new(
                    client,
                    live.clone(),
                    settings.device_id.clone(),
                    settings.config_fetch_interval(),
                    metrics.clone(),
                )
                .run(shutdown.clone()),
            ),
        ),
        (
            "heartbeat",
            tokio::spawn(
                Heartbeat::new(store.clone(), metrics.clone())
                    .with_interval(heartbeat_interval)
                    .run(shutdown.clone()),
            ),
        ),
    ];

    let mut capture_source = CaptureSource::new(
        capture,
        settings.device_id.clone(),
        live,
        sender,
        metrics,
        shutdown.clone(),
    );
    if !capture_source.start() {
        warn!("capture source was already running");
    }

    shutdown.cancelled().await;
    info!("relay shutting down");

    capture_source.stop().await;
    drop(capture_source);
    let mut outcome = writer
        .await
        .map_err(|source| AppError::TaskJoin {
            task: "outbox_writer",
            source,
        });
    for (task, handle) in tasks {
        if let Err(source) = handle.await {
            error!(task, error = %source, "background task failed");
            if outcome.is_ok() {
                outcome = Err(AppError::TaskJoin { task, source });
            }
        }
    }
    store.close().await;
    info!("relay stopped");
    outcome
}
