//! SQLite-backed event store
//!
//! Opens the ingestion database read-only and answers time-range scans from
//! the `sentiment_metrics` and `documents` tables. rusqlite is blocking, so
//! every scan runs on the blocking pool.

use super::normalizer::{Document, Event, Sentiment};
use super::store::{EventStore, ScanOrder, StoreError};
use crate::sqlite_pragma::apply_optimized_pragmas;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OpenFlags};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

/// Tables and time indexes; idempotent
pub const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS sentiment_metrics (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    positive INTEGER NOT NULL DEFAULT 0,
    negative INTEGER NOT NULL DEFAULT 0,
    category TEXT NOT NULL,
    timestamp INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_metrics_timestamp ON sentiment_metrics(timestamp DESC, id);

CREATE TABLE IF NOT EXISTS documents (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    created_at_ms INTEGER NOT NULL,
    text TEXT NOT NULL,
    sentiment TEXT NOT NULL,
    categories TEXT NOT NULL DEFAULT '[]'
);
CREATE INDEX IF NOT EXISTS idx_documents_created ON documents(created_at_ms, id);
";

/// Create both tables on a writable connection
pub fn create_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(SCHEMA)
}

/// Read-only SQLite event store
///
/// Each scan opens its own connection, so a scan abandoned by a caller's
/// timeout never holds up the scans that follow it.
pub struct SqliteEventStore {
    path: PathBuf,
}

/// Open one read-only connection with the shared PRAGMAs applied
fn open_reader(path: &Path) -> Result<Connection, StoreError> {
    let conn = Connection::open_with_flags(
        path,
        OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )?;

    apply_optimized_pragmas(&conn)?;

    // Must be after PRAGMAs
    conn.execute("PRAGMA query_only = ON", [])?;

    Ok(conn)
}

impl SqliteEventStore {
    /// Open an existing database for reading
    ///
    /// The schema must already exist; the ingestion side owns it.
    pub fn open(db_path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = db_path.as_ref().to_path_buf();
        drop(open_reader(&path)?);

        log::info!("📥 SQLite event store opened: {}", path.display());

        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn with_conn<T, F>(&self, f: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T, StoreError> + Send + 'static,
    {
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || {
            let conn = open_reader(&path)?;
            f(&conn)
        })
        .await
        .map_err(|e| StoreError::Task(e.to_string()))?
    }
}

fn order_sql(order: ScanOrder) -> &'static str {
    match order {
        ScanOrder::Ascending => "ASC",
        ScanOrder::Descending => "DESC",
    }
}

fn read_events(
    conn: &Connection,
    lower_millis: i64,
    upper_millis: i64,
    order: ScanOrder,
) -> Result<Vec<Event>, StoreError> {
    // Stored in seconds; widen the bounds outward, then filter exactly
    let lower_secs = lower_millis.div_euclid(1000);
    let upper_secs = upper_millis.div_euclid(1000);

    let sql = format!(
        "SELECT timestamp, positive, negative, category
         FROM sentiment_metrics
         WHERE timestamp >= ?1 AND timestamp <= ?2
         ORDER BY timestamp {}, id ASC",
        order_sql(order)
    );
    let mut stmt = conn.prepare(&sql)?;

    let rows = stmt.query_map(params![lower_secs, upper_secs], |row| {
        Ok((
            row.get::<_, i64>(0)?,
            row.get::<_, i64>(1)?,
            row.get::<_, i64>(2)?,
            row.get::<_, String>(3)?,
        ))
    })?;

    let mut events = Vec::new();
    for row in rows {
        let (timestamp, positive, negative, category) = row?;
        if positive < 0 || negative < 0 {
            return Err(StoreError::Malformed(format!(
                "negative counter at timestamp {}",
                timestamp
            )));
        }

        let event = Event {
            timestamp,
            positive: positive as u64,
            negative: negative as u64,
            category,
        };
        let t = event.timestamp_millis();
        if t >= lower_millis && t <= upper_millis {
            events.push(event);
        }
    }

    Ok(events)
}

fn read_documents(
    conn: &Connection,
    lower_millis: i64,
    upper_millis: i64,
    order: ScanOrder,
) -> Result<Vec<Document>, StoreError> {
    let sql = format!(
        "SELECT created_at_ms, text, sentiment, categories
         FROM documents
         WHERE created_at_ms >= ?1 AND created_at_ms <= ?2
         ORDER BY created_at_ms {}, id ASC",
        order_sql(order)
    );
    let mut stmt = conn.prepare(&sql)?;

    let rows = stmt.query_map(params![lower_millis, upper_millis], |row| {
        Ok((
            row.get::<_, i64>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, String>(2)?,
            row.get::<_, String>(3)?,
        ))
    })?;

    let mut documents = Vec::new();
    for row in rows {
        let (created_at_ms, text, sentiment, categories) = row?;

        let created_at = DateTime::<Utc>::from_timestamp_millis(created_at_ms).ok_or_else(|| {
            StoreError::Malformed(format!("created_at_ms out of range: {}", created_at_ms))
        })?;
        let categories: BTreeSet<String> = serde_json::from_str(&categories).map_err(|e| {
            StoreError::Malformed(format!("categories at {}: {}", created_at_ms, e))
        })?;

        documents.push(Document {
            created_at,
            text,
            sentiment: Sentiment::parse(&sentiment),
            categories,
        });
    }

    Ok(documents)
}

#[async_trait]
impl EventStore for SqliteEventStore {
    async fn scan_events(
        &self,
        lower_millis: i64,
        upper_millis: i64,
        order: ScanOrder,
    ) -> Result<Vec<Event>, StoreError> {
        let events = self
            .with_conn(move |conn| read_events(conn, lower_millis, upper_millis, order))
            .await?;
        log::debug!("📥 Scanned {} events ({:?})", events.len(), order);
        Ok(events)
    }

    async fn scan_documents(
        &self,
        lower_millis: i64,
        upper_millis: i64,
        order: ScanOrder,
    ) -> Result<Vec<Document>, StoreError> {
        let documents = self
            .with_conn(move |conn| read_documents(conn, lower_millis, upper_millis, order))
            .await?;
        log::debug!("📥 Scanned {} documents ({:?})", documents.len(), order);
        Ok(documents)
    }

    async fn latest_timestamp_millis(&self) -> Result<Option<i64>, StoreError> {
        self.with_conn(|conn| {
            let newest: Option<i64> = conn.query_row(
                "SELECT MAX(t) FROM (
                     SELECT MAX(timestamp) * 1000 AS t FROM sentiment_metrics
                     UNION ALL
                     SELECT MAX(created_at_ms) AS t FROM documents
                 )",
                [],
                |row| row.get(0),
            )?;
            Ok(newest)
        })
        .await
    }
}
