//! SQLite-backed outbox store.
//!
//! # Design
//! - Every mutation is a single autocommitted statement, so each row change is
//!   atomic and durable (WAL journal, `synchronous = FULL`).
//! - Status changes are guarded by `status = 'pending'`; a sent row can never
//!   be reverted or re-counted as a failure.
//! - Timestamps are stored as fixed-width RFC 3339 UTC text so `created_at`
//!   sorts chronologically; `seq` breaks ties in insertion order.

use std::path::Path;
use std::time::Duration;

use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Row, SqlitePool};
use tracing::{debug, instrument};

use crate::error::{OutboxError, Result};
use crate::model::{NewScanEvent, OutboxStats, ScanEvent, ScanEventRow};

/// Events fetched per dispatcher cycle unless configured otherwise.
pub const DEFAULT_BATCH_SIZE: u32 = 25;

const MAX_CONNECTIONS: u32 = 4;
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

const INSERT_EVENT_SQL: &str = r"
    INSERT INTO scan_events (event_id, raw_data, device_id, captured_at, status, attempts, created_at)
    VALUES (?1, ?2, ?3, ?4, 'pending', 0, ?5)
";

const SELECT_COLUMNS: &str = r"
    SELECT event_id, raw_data, device_id, captured_at, status, attempts,
           last_error, created_at, last_tried_at, sent_at
    FROM scan_events
";

const MARK_SENT_SQL: &str = r"
    UPDATE scan_events
    SET status = 'sent', sent_at = ?2, last_tried_at = ?2, last_error = NULL
    WHERE event_id = ?1 AND status = 'pending'
";

const MARK_FAILED_SQL: &str = r"
    UPDATE scan_events
    SET attempts = attempts + 1, last_error = ?2, last_tried_at = ?3
    WHERE event_id = ?1 AND status = 'pending'
";

const STATS_SQL: &str = r"
    SELECT
        COALESCE(SUM(CASE WHEN status = 'pending' THEN 1 ELSE 0 END), 0) AS pending,
        COALESCE(SUM(CASE WHEN status = 'sent' THEN 1 ELSE 0 END), 0) AS sent,
        MIN(CASE WHEN status = 'pending' THEN created_at END) AS oldest_pending_at,
        COALESCE(MAX(CASE WHEN status = 'pending' THEN attempts END), 0) AS max_attempts
    FROM scan_events
";

/// Durable queue of captured events awaiting delivery.
#[derive(Clone, Debug)]
pub struct OutboxStore {
    pool: SqlitePool,
}

impl OutboxStore {
    /// Open (creating if needed) the database at `path` and apply migrations.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or migrated.
    pub async fn open(path: &Path) -> Result<Self> {
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Full)
            .busy_timeout(BUSY_TIMEOUT);
        let pool = SqlitePoolOptions::new()
            .max_connections(MAX_CONNECTIONS)
            .connect_with(options)
            .await
            .map_err(|source| OutboxError::OpenFailed {
                path: path.to_path_buf(),
                source,
            })?;
        Self::new(pool).await
    }

    /// Wrap an existing pool, applying pending migrations.
    ///
    /// # Errors
    ///
    /// Returns an error if migrations fail.
    pub async fn new(pool: SqlitePool) -> Result<Self> {
        let mut migrator = sqlx::migrate!("./migrations");
        migrator.set_ignore_missing(true);
        migrator
            .run(&pool)
            .await
            .map_err(|source| OutboxError::MigrationFailed { source })?;
        Ok(Self { pool })
    }

    /// Access the underlying connection pool.
    #[must_use]
    pub const fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Queue a new event as `pending` with zero attempts.
    ///
    /// # Errors
    ///
    /// Returns [`OutboxError::DuplicateKey`] when the identifier already exists,
    /// or a query error if the insert fails.
    #[instrument(name = "outbox.enqueue", skip(self, event), fields(event_id = %event.event_id))]
    pub async fn enqueue(&self, event: &NewScanEvent) -> Result<()> {
        let result = sqlx::query(INSERT_EVENT_SQL)
            .bind(&event.event_id)
            .bind(&event.raw_data)
            .bind(&event.device_id)
            .bind(timestamp(event.captured_at))
            .bind(timestamp(Utc::now()))
            .execute(&self.pool)
            .await;

        match result {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(db)) if db.is_unique_violation() => {
                Err(OutboxError::DuplicateKey {
                    event_id: event.event_id.clone(),
                })
            }
            Err(source) => Err(OutboxError::query("outbox.enqueue", source)),
        }
    }

    /// Up to `limit` pending events, oldest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails or a row cannot be decoded.
    pub async fn get_pending(&self, limit: u32) -> Result<Vec<ScanEvent>> {
        let sql = format!(
            "{SELECT_COLUMNS} WHERE status = 'pending' ORDER BY created_at ASC, seq ASC LIMIT ?1"
        );
        let rows = sqlx::query_as::<_, ScanEventRow>(&sql)
            .bind(i64::from(limit))
            .fetch_all(&self.pool)
            .await
            .map_err(|source| OutboxError::query("outbox.get_pending", source))?;
        rows.into_iter().map(ScanEvent::try_from).collect()
    }

    /// Mark an event as delivered. Returns `false` when it was already sent or unknown.
    ///
    /// # Errors
    ///
    /// Returns an error if the update fails.
    #[instrument(name = "outbox.mark_sent", skip(self, sent_at))]
    pub async fn mark_sent(&self, event_id: &str, sent_at: DateTime<Utc>) -> Result<bool> {
        let result = sqlx::query(MARK_SENT_SQL)
            .bind(event_id)
            .bind(timestamp(sent_at))
            .execute(&self.pool)
            .await
            .map_err(|source| OutboxError::query("outbox.mark_sent", source))?;
        let transitioned = result.rows_affected() > 0;
        if !transitioned {
            debug!("event already sent or unknown; mark_sent ignored");
        }
        Ok(transitioned)
    }

    /// Record a failed delivery attempt; the event stays pending.
    /// Returns `false` when the event is already sent or unknown.
    ///
    /// # Errors
    ///
    /// Returns an error if the update fails.
    #[instrument(name = "outbox.mark_failed", skip(self, error))]
    pub async fn mark_failed(&self, event_id: &str, error: &str) -> Result<bool> {
        let result = sqlx::query(MARK_FAILED_SQL)
            .bind(event_id)
            .bind(error)
            .bind(timestamp(Utc::now()))
            .execute(&self.pool)
            .await
            .map_err(|source| OutboxError::query("outbox.mark_failed", source))?;
        Ok(result.rows_affected() > 0)
    }

    /// Load a single event by identifier.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails or the row cannot be decoded.
    pub async fn fetch(&self, event_id: &str) -> Result<Option<ScanEvent>> {
        let sql = format!("{SELECT_COLUMNS} WHERE event_id = ?1");
        let row = sqlx::query_as::<_, ScanEventRow>(&sql)
            .bind(event_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|source| OutboxError::query("outbox.fetch", source))?;
        row.map(ScanEvent::try_from).transpose()
    }

    /// Aggregate counts used for gauges and health logs.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails or the oldest timestamp is malformed.
    pub async fn stats(&self) -> Result<OutboxStats> {
        let row = sqlx::query(STATS_SQL)
            .fetch_one(&self.pool)
            .await
            .map_err(|source| OutboxError::query("outbox.stats", source))?;
        let oldest: Option<String> = row.try_get("oldest_pending_at")?;
        let oldest_pending_at = oldest
            .map(|raw| {
                DateTime::parse_from_rfc3339(&raw)
                    .map(|parsed| parsed.with_timezone(&Utc))
                    .map_err(|_| OutboxError::InvalidRow {
                        field: "created_at",
                        value: raw,
                    })
            })
            .transpose()?;
        Ok(OutboxStats {
            pending: row.try_get("pending")?,
            sent: row.try_get("sent")?,
            oldest_pending_at,
            max_attempts: row.try_get("max_attempts")?,
        })
    }

    /// Close the pool, flushing outstanding connections.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

fn timestamp(value: DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Micros, true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn timestamps_are_fixed_width_and_sortable() {
        let earlier = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).single();
        let later = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 6).single();
        let (Some(earlier), Some(later)) = (earlier, later) else {
            return;
        };
        let earlier = timestamp(earlier);
        let later = timestamp(later);
        assert_eq!(earlier, "2024-01-02T03:04:05.000000Z");
        assert_eq!(earlier.len(), later.len());
        assert!(earlier < later);
    }
}
