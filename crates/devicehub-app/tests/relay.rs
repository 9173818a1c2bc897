use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use devicehub_app::{ConfigWatcher, Dispatcher, Heartbeat, OutboxWriter, WriteOutcome};
use devicehub_capture::{CapturedScan, EmitOutcome, ScanEmitter};
use devicehub_config::{DeviceConfig, LiveConfig};
use devicehub_outbox::{OutboxStore, ScanStatus};
use devicehub_telemetry::{CycleLabel, Metrics};
use devicehub_test_support::fixtures::{TempOutbox, enqueue_all};
use devicehub_test_support::mocks::{ScriptedIngest, SendStep, rejected};
use devicehub_transport::{Delivery, IngestClient, ScanSubmission};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

fn dispatcher(outbox: &TempOutbox, client: &Arc<ScriptedIngest>, metrics: &Metrics) -> Dispatcher {
    Dispatcher::new(
        outbox.store().clone(),
        client.clone(),
        LiveConfig::default(),
        metrics.clone(),
    )
}

#[tokio::test]
async fn cycle_delivers_oldest_first_and_marks_sent() -> Result<()> {
    let outbox = TempOutbox::new().await?;
    let ids = enqueue_all(outbox.store(), &["A", "B", "C"]).await?;
    let client = Arc::new(ScriptedIngest::new());
    let metrics = Metrics::new()?;

    let report = dispatcher(&outbox, &client, &metrics)
        .run_cycle(&CancellationToken::new())
        .await;

    assert_eq!((report.total, report.sent, report.failed), (3, 3, 0));
    assert_eq!(report.outcome(), CycleLabel::Delivered);
    assert_eq!(client.sent_ids(), ids);
    for id in &ids {
        let event = outbox.store().fetch(id).await?.context("event missing")?;
        assert_eq!(event.status, ScanStatus::Sent);
        assert!(event.sent_at.is_some());
    }
    assert_eq!(metrics.snapshot().events_sent_total, 3);
    Ok(())
}

#[tokio::test]
async fn empty_outbox_is_an_idle_cycle() -> Result<()> {
    let outbox = TempOutbox::new().await?;
    let client = Arc::new(ScriptedIngest::new());
    let metrics = Metrics::new()?;

    let report = dispatcher(&outbox, &client, &metrics)
        .run_cycle(&CancellationToken::new())
        .await;

    assert_eq!(report.outcome(), CycleLabel::Idle);
    assert!(client.submissions().is_empty());
    assert_eq!(metrics.dispatch_cycle_count(CycleLabel::Idle), 1);
    Ok(())
}

#[tokio::test]
async fn outage_then_recovery_drains_every_pending_event() -> Result<()> {
    let outbox = TempOutbox::new().await?;
    let ids = enqueue_all(outbox.store(), &["ABC123", "DEF456", "GHI789"]).await?;
    let client = Arc::new(
        ScriptedIngest::new().with_sends(std::iter::repeat_with(|| rejected("http status 401")).take(6)),
    );
    let metrics = Metrics::new()?;
    let dispatcher = dispatcher(&outbox, &client, &metrics);
    let cancel = CancellationToken::new();

    for attempt in 1..=2 {
        let report = dispatcher.run_cycle(&cancel).await;
        assert_eq!((report.total, report.sent, report.failed), (3, 0, 3));
        assert_eq!(report.outcome(), CycleLabel::Stalled);
        for id in &ids {
            let event = outbox.store().fetch(id).await?.context("event missing")?;
            assert_eq!(event.status, ScanStatus::Pending);
            assert_eq!(event.attempts, attempt);
            assert_eq!(event.last_error.as_deref(), Some("http status 401"));
        }
        assert_eq!(outbox.store().stats().await?.pending, 3);
    }

    let report = dispatcher.run_cycle(&cancel).await;
    assert_eq!((report.total, report.sent, report.failed), (3, 3, 0));
    assert_eq!(report.outcome(), CycleLabel::Delivered);
    assert_eq!(outbox.store().stats().await?.pending, 0);
    for id in &ids {
        let event = outbox.store().fetch(id).await?.context("event missing")?;
        assert_eq!(event.status, ScanStatus::Sent);
        assert_eq!(event.last_error, None);
    }
    let expected: Vec<String> = ids.iter().cycle().take(9).cloned().collect();
    assert_eq!(client.sent_ids(), expected);
    assert_eq!(metrics.snapshot().event_send_failures_total, 6);
    assert_eq!(metrics.snapshot().events_sent_total, 3);
    assert_eq!(metrics.dispatch_cycle_count(CycleLabel::Stalled), 2);
    Ok(())
}

/// Accepts every scan but closes the outbox first, so recording the
/// acknowledgement fails.
struct ClosingIngest {
    store: OutboxStore,
}

#[async_trait]
impl IngestClient for ClosingIngest {
    async fn send_scan(&self, _submission: &ScanSubmission, _cancel: &CancellationToken) -> Delivery {
        self.store.close().await;
        Delivery::Accepted
    }

    async fn get_config(&self, _device_id: &str, _cancel: &CancellationToken) -> Option<DeviceConfig> {
        None
    }
}

#[tokio::test]
async fn unrecorded_acknowledgement_is_not_counted_as_sent() -> Result<()> {
    let outbox = TempOutbox::new().await?;
    enqueue_all(outbox.store(), &["ABC123"]).await?;
    let metrics = Metrics::new()?;
    let client = Arc::new(ClosingIngest {
        store: outbox.store().clone(),
    });

    let report = Dispatcher::new(
        outbox.store().clone(),
        client,
        LiveConfig::default(),
        metrics.clone(),
    )
    .run_cycle(&CancellationToken::new())
    .await;

    assert_eq!((report.total, report.sent, report.failed), (1, 0, 0));
    assert_eq!(metrics.snapshot().events_sent_total, 0);
    Ok(())
}

#[tokio::test]
async fn one_failing_event_does_not_block_the_batch() -> Result<()> {
    let outbox = TempOutbox::new().await?;
    let ids = enqueue_all(outbox.store(), &["A", "B", "C"]).await?;
    let client = Arc::new(ScriptedIngest::new().with_sends([
        SendStep::Reply(Delivery::Accepted),
        rejected("invalid code"),
    ]));
    let metrics = Metrics::new()?;

    let report = dispatcher(&outbox, &client, &metrics)
        .run_cycle(&CancellationToken::new())
        .await;

    assert_eq!((report.sent, report.failed), (2, 1));
    let statuses = [
        outbox.store().fetch(&ids[0]).await?.context("A")?.status,
        outbox.store().fetch(&ids[1]).await?.context("B")?.status,
        outbox.store().fetch(&ids[2]).await?.context("C")?.status,
    ];
    assert_eq!(statuses, [ScanStatus::Sent, ScanStatus::Pending, ScanStatus::Sent]);
    Ok(())
}

#[tokio::test]
async fn batch_size_bounds_each_cycle() -> Result<()> {
    let outbox = TempOutbox::new().await?;
    let ids = enqueue_all(outbox.store(), &["A", "B", "C"]).await?;
    let client = Arc::new(ScriptedIngest::new());
    let metrics = Metrics::new()?;
    let dispatcher = dispatcher(&outbox, &client, &metrics).with_batch_size(2);
    let cancel = CancellationToken::new();

    assert_eq!(dispatcher.run_cycle(&cancel).await.sent, 2);
    assert_eq!(client.sent_ids(), ids[..2].to_vec());
    assert_eq!(dispatcher.run_cycle(&cancel).await.sent, 1);
    assert_eq!(dispatcher.run_cycle(&cancel).await.outcome(), CycleLabel::Idle);
    assert_eq!(client.sent_ids(), ids);
    Ok(())
}

#[tokio::test]
async fn cancellation_mid_send_records_failure_and_leaves_rest() -> Result<()> {
    let outbox = TempOutbox::new().await?;
    let ids = enqueue_all(outbox.store(), &["A", "B"]).await?;
    let client = Arc::new(ScriptedIngest::new().with_sends([SendStep::Hang]));
    let metrics = Metrics::new()?;
    let dispatcher = dispatcher(&outbox, &client, &metrics);
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        trigger.cancel();
    });

    let report = tokio::time::timeout(Duration::from_secs(5), dispatcher.run_cycle(&cancel)).await?;
    assert!(report.cancelled);
    assert_eq!((report.sent, report.failed), (0, 1));

    let first = outbox.store().fetch(&ids[0]).await?.context("A")?;
    assert_eq!(first.status, ScanStatus::Pending);
    assert_eq!(first.attempts, 1);
    assert_eq!(first.last_error.as_deref(), Some("dispatch cancelled"));
    let second = outbox.store().fetch(&ids[1]).await?.context("B")?;
    assert_eq!(second.attempts, 0);
    assert_eq!(client.sent_ids(), vec![ids[0].clone()]);
    Ok(())
}

#[tokio::test]
async fn pending_events_survive_restart_and_sent_ones_are_not_resent() -> Result<()> {
    let mut outbox = TempOutbox::new().await?;
    let ids = enqueue_all(outbox.store(), &["A", "B"]).await?;
    let metrics = Metrics::new()?;

    let first_run = Arc::new(ScriptedIngest::new().with_sends([SendStep::Reply(Delivery::Accepted), rejected("unavailable")]));
    dispatcher(&outbox, &first_run, &metrics)
        .run_cycle(&CancellationToken::new())
        .await;

    outbox.reopen().await?;

    let second_run = Arc::new(ScriptedIngest::new());
    let report = dispatcher(&outbox, &second_run, &metrics)
        .run_cycle(&CancellationToken::new())
        .await;
    assert_eq!(report.sent, 1);
    assert_eq!(second_run.sent_ids(), vec![ids[1].clone()]);
    let stats = outbox.store().stats().await?;
    assert_eq!((stats.pending, stats.sent), (0, 2));
    Ok(())
}

#[tokio::test]
async fn dispatcher_loop_follows_live_interval_until_cancelled() -> Result<()> {
    let outbox = TempOutbox::new().await?;
    let live = LiveConfig::new(DeviceConfig {
        dispatch_interval_ms: 60_000,
        ..DeviceConfig::default()
    });
    let client = Arc::new(ScriptedIngest::new());
    let metrics = Metrics::new()?;
    let cancel = CancellationToken::new();
    let task = tokio::spawn(
        Dispatcher::new(outbox.store().clone(), client.clone(), live.clone(), metrics.clone())
            .run(cancel.clone()),
    );

    devicehub_test_support::assert::eventually("first idle cycle", Duration::from_secs(5), || async {
        Ok(metrics.dispatch_cycle_count(CycleLabel::Idle) >= 1)
    })
    .await?;
    let ids = enqueue_all(outbox.store(), &["LATE"]).await?;
    live.replace(DeviceConfig {
        dispatch_interval_ms: 20,
        ..DeviceConfig::default()
    });

    devicehub_test_support::assert::eventually("late event sent", Duration::from_secs(5), || async {
        let event = outbox.store().fetch(&ids[0]).await?;
        Ok::<_, anyhow::Error>(event.is_some_and(|event| event.status == ScanStatus::Sent))
    })
    .await?;

    cancel.cancel();
    tokio::time::timeout(Duration::from_secs(5), task).await??;
    Ok(())
}

#[tokio::test]
async fn config_refresh_swaps_or_keeps_previous() -> Result<()> {
    let tuned = DeviceConfig {
        debounce_ms: 200,
        batching_enabled: true,
        dispatch_interval_ms: 1_000,
    };
    let client = Arc::new(ScriptedIngest::new().with_configs([Some(tuned), None]));
    let live = LiveConfig::default();
    let metrics = Metrics::new()?;
    let watcher = ConfigWatcher::new(
        client.clone(),
        live.clone(),
        "Device-001",
        Duration::from_secs(60),
        metrics.clone(),
    );
    let cancel = CancellationToken::new();

    assert_eq!(watcher.refresh(&cancel).await, Some(tuned));
    assert_eq!(*live.snapshot(), tuned);

    assert_eq!(watcher.refresh(&cancel).await, None);
    assert_eq!(*live.snapshot(), tuned);

    let snapshot = metrics.snapshot();
    assert_eq!(snapshot.config_refresh_applied_total, 1);
    assert_eq!(snapshot.config_refresh_failed_total, 1);
    assert_eq!(client.config_requests(), 2);
    Ok(())
}

#[tokio::test]
async fn polled_debounce_change_applies_to_next_capture() -> Result<()> {
    let polled = |debounce_ms| DeviceConfig {
        debounce_ms,
        ..DeviceConfig::default()
    };
    let client = Arc::new(ScriptedIngest::new().with_configs([Some(polled(200)), Some(polled(100))]));
    let live = LiveConfig::default();
    let metrics = Metrics::new()?;
    let watcher = ConfigWatcher::new(
        client.clone(),
        live.clone(),
        "Device-001",
        Duration::from_secs(60),
        metrics.clone(),
    );
    let (sender, mut receiver) = mpsc::channel(8);
    let mut emitter = ScanEmitter::new("Device-001", live.clone(), sender, metrics.clone());
    let cancel = CancellationToken::new();

    assert_eq!(watcher.refresh(&cancel).await, Some(polled(200)));
    assert_eq!(emitter.offer("ABC123").await?, EmitOutcome::Emitted);
    assert_eq!(emitter.offer("ABC123").await?, EmitOutcome::Debounced);

    assert_eq!(watcher.refresh(&cancel).await, Some(polled(100)));
    assert_eq!(live.snapshot().debounce_ms, 100);
    assert_eq!(emitter.offer("DEF456").await?, EmitOutcome::Emitted);
    tokio::time::sleep(Duration::from_millis(130)).await;
    assert_eq!(emitter.offer("DEF456").await?, EmitOutcome::Emitted);

    let mut emitted = Vec::new();
    while let Ok(scan) = receiver.try_recv() {
        emitted.push(scan.raw_data);
    }
    assert_eq!(emitted, ["ABC123", "DEF456", "DEF456"]);
    assert_eq!(metrics.snapshot().config_refresh_applied_total, 2);
    Ok(())
}

#[tokio::test]
async fn config_watcher_fetches_immediately() -> Result<()> {
    let tuned = DeviceConfig {
        debounce_ms: 100,
        ..DeviceConfig::default()
    };
    let client = Arc::new(ScriptedIngest::new().with_configs([Some(tuned)]));
    let live = LiveConfig::default();
    let mut changes = live.subscribe();
    let cancel = CancellationToken::new();
    let task = tokio::spawn(
        ConfigWatcher::new(
            client.clone(),
            live.clone(),
            "Device-001",
            Duration::from_secs(3_600),
            Metrics::new()?,
        )
        .run(cancel.clone()),
    );

    tokio::time::timeout(Duration::from_secs(5), changes.changed()).await??;
    assert_eq!(live.snapshot().debounce_ms, 100);

    cancel.cancel();
    tokio::time::timeout(Duration::from_secs(5), task).await??;
    assert_eq!(client.config_requests(), 1);
    Ok(())
}

#[tokio::test]
async fn writer_drains_channel_into_outbox() -> Result<()> {
    let outbox = TempOutbox::new().await?;
    let metrics = Metrics::new()?;
    let (sender, receiver) = mpsc::channel(4);
    let writer = tokio::spawn(
        OutboxWriter::new(outbox.store().clone(), metrics).run(receiver, CancellationToken::new()),
    );

    for raw in ["ABC123", "DEF456"] {
        sender
            .send(CapturedScan {
                raw_data: raw.to_string(),
                captured_at: Utc::now(),
                device_id: "Device-001".to_string(),
            })
            .await?;
    }
    drop(sender);
    tokio::time::timeout(Duration::from_secs(5), writer).await??;

    let pending = outbox.store().get_pending(10).await?;
    let payloads: Vec<_> = pending.iter().map(|event| event.raw_data.as_str()).collect();
    assert_eq!(payloads, vec!["ABC123", "DEF456"]);
    assert!(pending.iter().all(|event| event.attempts == 0));
    assert_ne!(pending[0].event_id, pending[1].event_id);
    Ok(())
}

#[tokio::test]
async fn writer_gives_up_only_on_shutdown() -> Result<()> {
    let outbox = TempOutbox::new().await?;
    outbox.store().close().await;
    let writer = OutboxWriter::new(outbox.store().clone(), Metrics::new()?)
        .with_retry_delay(Duration::from_millis(10));
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        trigger.cancel();
    });

    let scan = CapturedScan {
        raw_data: "ABC123".to_string(),
        captured_at: Utc::now(),
        device_id: "Device-001".to_string(),
    };
    let outcome = tokio::time::timeout(Duration::from_secs(5), writer.persist(scan, &cancel)).await?;
    assert_eq!(outcome, WriteOutcome::Abandoned);
    Ok(())
}

#[tokio::test]
async fn heartbeat_publishes_outbox_gauges() -> Result<()> {
    let outbox = TempOutbox::new().await?;
    let ids = enqueue_all(outbox.store(), &["A", "B"]).await?;
    outbox.store().mark_failed(&ids[0], "timeout").await?;
    outbox.store().mark_failed(&ids[0], "timeout").await?;
    let metrics = Metrics::new()?;

    let stats = Heartbeat::new(outbox.store().clone(), metrics.clone()).beat().await?;
    assert_eq!(stats.pending, 2);
    assert_eq!(stats.max_attempts, 2);

    let snapshot = metrics.snapshot();
    assert_eq!(snapshot.outbox_pending, 2);
    assert_eq!(snapshot.outbox_max_attempts, 2);
    Ok(())
}
