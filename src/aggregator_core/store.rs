//! Event store read contract
//!
//! The engine only ever reads. Appends come from an ingestion process that
//! owns the store; `MemoryEventStore` exposes append methods so it can play
//! that role in-process.

use super::normalizer::{Document, Event};
use async_trait::async_trait;
use std::sync::RwLock;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanOrder {
    Ascending,
    Descending,
}

#[derive(Debug)]
pub enum StoreError {
    Database(rusqlite::Error),
    Malformed(String),
    Task(String),
    Timeout(Duration),
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        StoreError::Database(err)
    }
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::Database(e) => write!(f, "Database error: {}", e),
            StoreError::Malformed(msg) => write!(f, "Malformed record: {}", msg),
            StoreError::Task(msg) => write!(f, "Read task failed: {}", msg),
            StoreError::Timeout(d) => write!(f, "Store read timed out after {}ms", d.as_millis()),
        }
    }
}

impl std::error::Error for StoreError {}

/// Time-range reads over the two append-only logs
///
/// Bounds are inclusive epoch milliseconds. Records with equal timestamps
/// come back in arrival order in either scan direction. Each call is
/// independent and may run concurrently with other calls and with appends.
#[async_trait]
pub trait EventStore: Send + Sync {
    /// Sentiment counter events with `lower <= timestamp * 1000 <= upper`
    async fn scan_events(
        &self,
        lower_millis: i64,
        upper_millis: i64,
        order: ScanOrder,
    ) -> Result<Vec<Event>, StoreError>;

    /// Documents with `lower <= created_at <= upper`
    async fn scan_documents(
        &self,
        lower_millis: i64,
        upper_millis: i64,
        order: ScanOrder,
    ) -> Result<Vec<Document>, StoreError>;

    /// Whether scans honour `order`; when false the sum facet falls back to
    /// one range scan per window
    fn supports_sorted_scan(&self) -> bool {
        true
    }

    /// Newest event or document timestamp, if the store can report it cheaply
    async fn latest_timestamp_millis(&self) -> Result<Option<i64>, StoreError> {
        Ok(None)
    }
}

/// In-process append-only store
///
/// Records are kept in arrival order; scans filter and then order by time
/// with a stable sort so equal timestamps keep arrival order.
#[derive(Debug, Default)]
pub struct MemoryEventStore {
    events: RwLock<Vec<Event>>,
    documents: RwLock<Vec<Document>>,
}

impl MemoryEventStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append_event(&self, event: Event) {
        match self.events.write() {
            Ok(mut events) => events.push(event),
            Err(poisoned) => poisoned.into_inner().push(event),
        }
    }

    pub fn append_document(&self, document: Document) {
        match self.documents.write() {
            Ok(mut documents) => documents.push(document),
            Err(poisoned) => poisoned.into_inner().push(document),
        }
    }

    pub fn event_count(&self) -> usize {
        self.events.read().map(|e| e.len()).unwrap_or(0)
    }

    pub fn document_count(&self) -> usize {
        self.documents.read().map(|d| d.len()).unwrap_or(0)
    }
}

fn order_by_key<T, F>(mut records: Vec<T>, order: ScanOrder, key: F) -> Vec<T>
where
    F: Fn(&T) -> i64,
{
    records.sort_by_key(|r| key(r));
    if order == ScanOrder::Descending {
        // Reverse whole runs of equal keys back into arrival order
        let mut out = Vec::with_capacity(records.len());
        let mut end = records.len();
        while end > 0 {
            let k = key(&records[end - 1]);
            let mut start = end - 1;
            while start > 0 && key(&records[start - 1]) == k {
                start -= 1;
            }
            out.extend(records.drain(start..end));
            end = start;
        }
        return out;
    }
    records
}

#[async_trait]
impl EventStore for MemoryEventStore {
    async fn scan_events(
        &self,
        lower_millis: i64,
        upper_millis: i64,
        order: ScanOrder,
    ) -> Result<Vec<Event>, StoreError> {
        let events = self
            .events
            .read()
            .map_err(|_| StoreError::Task("event log lock poisoned".to_string()))?;

        let matched: Vec<Event> = events
            .iter()
            .filter(|e| {
                let t = e.timestamp_millis();
                t >= lower_millis && t <= upper_millis
            })
            .cloned()
            .collect();

        Ok(order_by_key(matched, order, Event::timestamp_millis))
    }

    async fn scan_documents(
        &self,
        lower_millis: i64,
        upper_millis: i64,
        order: ScanOrder,
    ) -> Result<Vec<Document>, StoreError> {
        let documents = self
            .documents
            .read()
            .map_err(|_| StoreError::Task("document log lock poisoned".to_string()))?;

        let matched: Vec<Document> = documents
            .iter()
            .filter(|d| {
                let t = d.created_at_millis();
                t >= lower_millis && t <= upper_millis
            })
            .cloned()
            .collect();

        Ok(order_by_key(matched, order, Document::created_at_millis))
    }

    async fn latest_timestamp_millis(&self) -> Result<Option<i64>, StoreError> {
        let newest_event = self
            .events
            .read()
            .map_err(|_| StoreError::Task("event log lock poisoned".to_string()))?
            .iter()
            .map(Event::timestamp_millis)
            .max();
        let newest_document = self
            .documents
            .read()
            .map_err(|_| StoreError::Task("document log lock poisoned".to_string()))?
            .iter()
            .map(Document::created_at_millis)
            .max();

        Ok(newest_event.max(newest_document))
    }
}
