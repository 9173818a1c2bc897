use std::future::Future;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{TimeDelta, Utc};
use devicehub_outbox::{NewScanEvent, OutboxError, OutboxStore, ScanStatus};
use tempfile::TempDir;

const DEVICE: &str = "Device-001";

async fn with_store<F, Fut>(test: F) -> Result<()>
where
    F: FnOnce(OutboxStore) -> Fut,
    Fut: Future<Output = Result<()>>,
{
    let dir = TempDir::new()?;
    let store = OutboxStore::open(&dir.path().join("outbox.db"))
        .await
        .context("failed to open outbox")?;
    let result = test(store.clone()).await;
    store.close().await;
    result
}

async fn enqueue(store: &OutboxStore, raw: &str) -> Result<NewScanEvent> {
    let event = NewScanEvent::capture(raw, DEVICE, Utc::now());
    store.enqueue(&event).await?;
    Ok(event)
}

#[tokio::test]
async fn pending_events_come_back_oldest_first() -> Result<()> {
    with_store(|store| async move {
        let mut queued = Vec::new();
        for raw in ["A-1", "A-2", "A-3", "A-4"] {
            queued.push(enqueue(&store, raw).await?.event_id);
        }

        let pending = store.get_pending(25).await?;
        let ids: Vec<_> = pending.iter().map(|event| event.event_id.clone()).collect();
        assert_eq!(ids, queued);
        assert!(pending.iter().all(|event| event.status == ScanStatus::Pending));
        assert!(pending.iter().all(|event| event.attempts == 0));

        let limited = store.get_pending(2).await?;
        assert_eq!(limited.len(), 2);
        assert_eq!(limited[0].event_id, queued[0]);
        Ok(())
    })
    .await
}

#[tokio::test]
async fn duplicate_event_ids_are_rejected() -> Result<()> {
    with_store(|store| async move {
        let event = enqueue(&store, "DUP").await?;
        let err = store
            .enqueue(&event)
            .await
            .err()
            .context("expected duplicate rejection")?;
        assert!(err.is_duplicate());
        assert!(matches!(err, OutboxError::DuplicateKey { ref event_id } if *event_id == event.event_id));
        assert_eq!(store.get_pending(25).await?.len(), 1);
        Ok(())
    })
    .await
}

#[tokio::test]
async fn failures_accumulate_and_success_clears_error() -> Result<()> {
    with_store(|store| async move {
        let event = enqueue(&store, "RETRY").await?;

        assert!(store.mark_failed(&event.event_id, "connection refused").await?);
        assert!(store.mark_failed(&event.event_id, "timeout").await?);
        let stored = store
            .fetch(&event.event_id)
            .await?
            .context("event missing")?;
        assert_eq!(stored.status, ScanStatus::Pending);
        assert_eq!(stored.attempts, 2);
        assert_eq!(stored.last_error.as_deref(), Some("timeout"));
        assert!(stored.last_tried_at.is_some());

        let sent_at = Utc::now();
        assert!(store.mark_sent(&event.event_id, sent_at).await?);
        let stored = store
            .fetch(&event.event_id)
            .await?
            .context("event missing")?;
        assert_eq!(stored.status, ScanStatus::Sent);
        assert_eq!(stored.attempts, 2);
        assert!(stored.last_error.is_none());
        assert!(stored.sent_at.is_some());
        assert!(store.get_pending(25).await?.is_empty());
        Ok(())
    })
    .await
}

#[tokio::test]
async fn sent_events_never_revert() -> Result<()> {
    with_store(|store| async move {
        let event = enqueue(&store, "ONCE").await?;
        assert!(store.mark_sent(&event.event_id, Utc::now()).await?);

        assert!(!store.mark_sent(&event.event_id, Utc::now()).await?);
        assert!(!store.mark_failed(&event.event_id, "late failure").await?);

        let stored = store
            .fetch(&event.event_id)
            .await?
            .context("event missing")?;
        assert_eq!(stored.status, ScanStatus::Sent);
        assert_eq!(stored.attempts, 0);
        assert!(stored.last_error.is_none());

        assert!(!store.mark_sent("unknown", Utc::now()).await?);
        assert!(store.fetch("unknown").await?.is_none());
        Ok(())
    })
    .await
}

#[tokio::test]
async fn stats_track_backlog() -> Result<()> {
    with_store(|store| async move {
        let empty = store.stats().await?;
        assert_eq!(empty.pending, 0);
        assert_eq!(empty.sent, 0);
        assert!(empty.oldest_pending_at.is_none());
        assert_eq!(empty.max_attempts, 0);

        let first = enqueue(&store, "S-1").await?;
        let second = enqueue(&store, "S-2").await?;
        let third = enqueue(&store, "S-3").await?;
        store.mark_sent(&first.event_id, Utc::now()).await?;
        store.mark_failed(&second.event_id, "boom").await?;
        store.mark_failed(&second.event_id, "boom").await?;
        store.mark_failed(&third.event_id, "boom").await?;

        let stats = store.stats().await?;
        assert_eq!(stats.pending, 2);
        assert_eq!(stats.sent, 1);
        assert_eq!(stats.max_attempts, 2);
        let oldest = stats.oldest_pending_at.context("oldest missing")?;
        let second_row = store
            .fetch(&second.event_id)
            .await?
            .context("event missing")?;
        assert_eq!(oldest, second_row.created_at);
        assert!(stats.oldest_pending_age(oldest + TimeDelta::seconds(3)).as_secs() >= 3);
        Ok(())
    })
    .await
}

async fn reopen(path: &Path) -> Result<OutboxStore> {
    OutboxStore::open(path).await.context("failed to reopen outbox")
}

#[tokio::test]
async fn pending_events_survive_restart() -> Result<()> {
    let dir = TempDir::new()?;
    let path = dir.path().join("outbox.db");

    let store = OutboxStore::open(&path).await?;
    let kept = enqueue(&store, "KEEP").await?;
    let delivered = enqueue(&store, "DONE").await?;
    store.mark_failed(&kept.event_id, "offline").await?;
    store.mark_sent(&delivered.event_id, Utc::now()).await?;
    store.close().await;
    drop(store);

    let store = reopen(&path).await?;
    let pending = store.get_pending(25).await?;
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].event_id, kept.event_id);
    assert_eq!(pending[0].raw_data, "KEEP");
    assert_eq!(pending[0].device_id, DEVICE);
    assert_eq!(pending[0].attempts, 1);
    assert_eq!(
        pending[0].captured_at.timestamp_micros(),
        kept.captured_at.timestamp_micros()
    );
    store.close().await;
    Ok(())
}
