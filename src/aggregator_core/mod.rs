//! Aggregator Core - Multi-Window Aggregation Engine
//!
//! Answers many overlapping trailing-window queries against append-only,
//! timestamp-ordered logs. Windows are evaluated relative to query time.
//!
//! # Architecture
//!
//! ```text
//! EventStore (SqliteEventStore | MemoryEventStore)
//!     ↓ range scans, epoch-millisecond bounds
//! WindowedSumAggregator    → per-window positive/negative totals
//! WindowedCorpusBuilder    → per-window chronological text join
//!     ↓
//! AggregationService (single captured `now`, WindowCatalog order)
//! ```

pub mod corpus;
pub mod error;
pub mod normalizer;
pub mod service;
pub mod sqlite_reader;
pub mod store;
pub mod sums;
pub mod window;

pub use corpus::{CorpusFilter, CorpusResult, WindowedCorpusBuilder, DEFAULT_CORPUS_CATEGORIES};
pub use error::AggregateError;
pub use normalizer::{Document, Event, Sentiment};
pub use service::{AggregationRequest, AggregationResult, AggregationService, Facets, WindowMap};
pub use sqlite_reader::{create_schema, SqliteEventStore};
pub use store::{EventStore, MemoryEventStore, ScanOrder, StoreError};
pub use sums::{SumResult, WindowedSumAggregator};
pub use window::{WindowCatalog, WindowSize, WindowSpec};
