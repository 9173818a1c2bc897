//! Temporary outbox databases and sample events.

use std::path::{Path, PathBuf};

use anyhow::Result;
use chrono::{DateTime, Utc};
use devicehub_outbox::{NewScanEvent, OutboxStore};
use tempfile::TempDir;

/// Outbox backed by a database file inside a private temporary directory.
///
/// The directory lives as long as the fixture, so the store can be closed and
/// reopened to simulate a restart.
#[derive(Debug)]
pub struct TempOutbox {
    dir: TempDir,
    store: OutboxStore,
}

impl TempOutbox {
    /// Create an empty outbox.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory or database cannot be created.
    pub async fn new() -> Result<Self> {
        let dir = TempDir::new()?;
        let store = OutboxStore::open(&dir.path().join("outbox.db")).await?;
        Ok(Self { dir, store })
    }

    /// Open store handle.
    #[must_use]
    pub const fn store(&self) -> &OutboxStore {
        &self.store
    }

    /// Directory holding the database; also usable as a scratch area.
    #[must_use]
    pub fn dir(&self) -> &Path {
        self.dir.path()
    }

    /// Database file path.
    #[must_use]
    pub fn database_path(&self) -> PathBuf {
        self.dir.path().join("outbox.db")
    }

    /// Close the current pool and open the same file again.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be reopened.
    pub async fn reopen(&mut self) -> Result<()> {
        self.store.close().await;
        self.store = OutboxStore::open(&self.database_path()).await?;
        Ok(())
    }
}

/// Event for `raw_data` captured now by `Device-001`.
#[must_use]
pub fn scan(raw_data: &str) -> NewScanEvent {
    scan_at(raw_data, Utc::now())
}

/// Event for `raw_data` captured at `captured_at` by `Device-001`.
#[must_use]
pub fn scan_at(raw_data: &str, captured_at: DateTime<Utc>) -> NewScanEvent {
    NewScanEvent::capture(raw_data, "Device-001", captured_at)
}

/// Queue one event per payload, in order, and return their ids.
///
/// # Errors
///
/// Returns an error if any enqueue fails.
pub async fn enqueue_all(store: &OutboxStore, payloads: &[&str]) -> Result<Vec<String>> {
    let mut ids = Vec::with_capacity(payloads.len());
    for payload in payloads {
        let event = scan(payload);
        store.enqueue(&event).await?;
        ids.push(event.event_id);
    }
    Ok(ids)
}
