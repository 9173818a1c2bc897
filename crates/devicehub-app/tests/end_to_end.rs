use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use devicehub_app::{BootstrapDependencies, Dispatcher, run_app_with};
use devicehub_capture::{CaptureDriver, FolderOptions, FolderWatcher};
use devicehub_config::{AppSettings, DeviceConfig, LiveConfig};
use devicehub_ingest::{DeviceDirectory, IngestServer, IngestSettings, IngestState};
use devicehub_outbox::ScanStatus;
use devicehub_telemetry::Metrics;
use devicehub_test_support::assert::eventually;
use devicehub_test_support::fixtures::{TempOutbox, enqueue_all};
use devicehub_transport::{Delivery, GraphqlClient, IngestClient, ScanSubmission};
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;
use url::Url;

const API_KEY: &str = "relay-e2e-key";
const DEVICE_ID: &str = "Device-001";

async fn start_ingest(devices: DeviceDirectory) -> Result<(String, Arc<IngestState>, CancellationToken)> {
    let listener = IngestServer::bind(SocketAddr::from(([127, 0, 0, 1], 0))).await?;
    let addr = listener.local_addr()?;
    let server = IngestServer::new(
        &IngestSettings {
            api_key: Some(API_KEY.to_string()),
            devices,
            ..IngestSettings::default()
        },
        Metrics::new()?,
    );
    let state = server.state();
    let shutdown = CancellationToken::new();
    tokio::spawn(server.serve(listener, shutdown.clone()));
    Ok((format!("http://{addr}/graphql"), state, shutdown))
}

fn fast_folder() -> FolderOptions {
    FolderOptions {
        poll_interval: Duration::from_millis(20),
        settle_delay: Duration::from_millis(5),
        read_attempts: 3,
        read_spacing: Duration::from_millis(5),
    }
}

#[tokio::test]
async fn dropped_file_reaches_endpoint_once_per_scan() -> Result<()> {
    let fast = DeviceConfig {
        debounce_ms: 500,
        batching_enabled: false,
        dispatch_interval_ms: 20,
    };
    let (url, ingest, ingest_shutdown) =
        start_ingest(DeviceDirectory::default().with_override(DEVICE_ID, fast)).await?;

    let dir = TempDir::new()?;
    let watch_folder = dir.path().join("scans");
    let settings = AppSettings {
        device_id: DEVICE_ID.to_string(),
        graphql_url: url,
        watch_folder: watch_folder.clone(),
        database_path: dir.path().join("relay.db"),
        request_timeout_secs: 2,
        // Slow until the first config fetch swaps in the fast interval.
        device_config: DeviceConfig {
            dispatch_interval_ms: 60_000,
            ..DeviceConfig::default()
        },
        ..AppSettings::default()
    };
    let metrics = Metrics::new()?;
    let mut dependencies =
        BootstrapDependencies::from_settings(settings, Some(API_KEY), metrics.clone()).await?;
    dependencies.capture = CaptureDriver::Folder(FolderWatcher::with_options(&watch_folder, fast_folder()));
    dependencies.heartbeat_interval = Duration::from_millis(50);
    let store = dependencies.store.clone();

    let shutdown = CancellationToken::new();
    let relay = tokio::spawn(run_app_with(dependencies, shutdown.clone()));

    eventually("watch folder prepared", Duration::from_secs(5), || async {
        Ok(watch_folder.join("processed").is_dir())
    })
    .await?;
    std::fs::write(watch_folder.join("batch.txt"), "ABC123\nabc123\nDEF456\n")?;

    eventually("two scans delivered", Duration::from_secs(10), || async {
        let stats = store.stats().await?;
        Ok::<_, anyhow::Error>(stats.sent == 2 && stats.pending == 0)
    })
    .await?;
    assert_eq!(ingest.guard.unique(), 2);
    assert_eq!(ingest.guard.total_duplicates(), 0);
    assert!(watch_folder.join("processed").join("batch.txt").exists());
    assert!(metrics.snapshot().config_refresh_applied_total >= 1);

    shutdown.cancel();
    tokio::time::timeout(Duration::from_secs(10), relay).await???;
    ingest_shutdown.cancel();
    Ok(())
}

#[tokio::test]
async fn redelivery_after_lost_acknowledgement_is_deduplicated() -> Result<()> {
    let (url, ingest, ingest_shutdown) = start_ingest(DeviceDirectory::default()).await?;
    let outbox = TempOutbox::new().await?;
    let ids = enqueue_all(outbox.store(), &["ABC123"]).await?;
    let event = outbox.store().fetch(&ids[0]).await?.context("event missing")?;

    let metrics = Metrics::new()?;
    let client = Arc::new(GraphqlClient::new(
        Url::parse(&url)?,
        Some(API_KEY),
        Duration::from_secs(2),
        metrics.clone(),
    )?);
    let cancel = CancellationToken::new();

    // Delivered, but the relay stopped before recording it as sent.
    let submission = ScanSubmission {
        event_id: event.event_id.clone(),
        raw_data: event.raw_data.clone(),
        device_id: event.device_id.clone(),
        captured_at: event.captured_at,
    };
    assert_eq!(client.send_scan(&submission, &cancel).await, Delivery::Accepted);

    let report = Dispatcher::new(outbox.store().clone(), client, LiveConfig::default(), metrics)
        .run_cycle(&cancel)
        .await;
    assert_eq!(report.sent, 1);

    let stored = outbox.store().fetch(&ids[0]).await?.context("event missing")?;
    assert_eq!(stored.status, ScanStatus::Sent);
    assert_eq!(ingest.guard.total_received(), 2);
    assert_eq!(ingest.guard.total_duplicates(), 1);
    assert_eq!(ingest.guard.unique(), 1);

    ingest_shutdown.cancel();
    Ok(())
}
