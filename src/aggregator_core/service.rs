//! Aggregation service: one `now`, both facets, every window
//!
//! ```text
//! AggregationRequest
//!     ↓ validate (no store access)
//! now = request.now or Utc::now()   (read once)
//!     ↓
//! WindowedSumAggregator ─┐  concurrent, each bounded by store_timeout
//! WindowedCorpusBuilder ─┘
//!     ↓
//! AggregationResult (catalog order)
//! ```

use super::corpus::{CorpusFilter, CorpusResult, WindowedCorpusBuilder};
use super::error::AggregateError;
use super::store::{EventStore, StoreError};
use super::sums::{SumResult, WindowedSumAggregator};
use super::window::WindowCatalog;
use chrono::{DateTime, Utc};
use serde::ser::{Serialize, SerializeMap, Serializer};
use std::collections::BTreeSet;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// Which aggregate families to compute
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Facets {
    pub sums: bool,
    pub corpora: bool,
}

impl Facets {
    pub const BOTH: Facets = Facets {
        sums: true,
        corpora: true,
    };
    pub const SUMS: Facets = Facets {
        sums: true,
        corpora: false,
    };
    pub const CORPORA: Facets = Facets {
        sums: false,
        corpora: true,
    };

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "both" => Some(Facets::BOTH),
            "sums" => Some(Facets::SUMS),
            "corpora" => Some(Facets::CORPORA),
            _ => None,
        }
    }
}

impl Default for Facets {
    fn default() -> Self {
        Facets::BOTH
    }
}

#[derive(Debug, Clone, Default)]
pub struct AggregationRequest {
    /// Frozen clock; defaults to wall-clock time at the start of the call
    pub now: Option<DateTime<Utc>>,
    pub facets: Facets,
    /// Subset of catalog window names; `None` means the whole catalog
    pub windows: Option<Vec<String>>,
    pub corpus_filter: CorpusFilter,
    /// Only sum events in these categories; `None` sums every category
    pub sum_categories: Option<BTreeSet<String>>,
}

/// Window name → value, kept in catalog order
///
/// Serializes as a JSON object whose keys follow catalog order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowMap<T> {
    entries: Vec<(String, T)>,
}

impl<T> WindowMap<T> {
    pub fn get(&self, name: &str) -> Option<&T> {
        self.entries.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(n, _)| n.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &T)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v))
    }
}

impl<T> Default for WindowMap<T> {
    fn default() -> Self {
        Self { entries: Vec::new() }
    }
}

impl From<Vec<SumResult>> for WindowMap<SumResult> {
    fn from(results: Vec<SumResult>) -> Self {
        Self {
            entries: results.into_iter().map(|r| (r.window_name.clone(), r)).collect(),
        }
    }
}

impl From<Vec<CorpusResult>> for WindowMap<CorpusResult> {
    fn from(results: Vec<CorpusResult>) -> Self {
        Self {
            entries: results.into_iter().map(|r| (r.window_name.clone(), r)).collect(),
        }
    }
}

impl<T: Serialize> Serialize for WindowMap<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (name, value) in &self.entries {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct AggregationResult {
    pub now: DateTime<Utc>,
    /// Empty when the sums facet was not requested
    pub sums: WindowMap<SumResult>,
    /// Empty when the corpora facet was not requested
    pub corpora: WindowMap<CorpusResult>,
}

/// Stateless request → response over a shared store
pub struct AggregationService<S: EventStore + ?Sized> {
    store: Arc<S>,
    catalog: WindowCatalog,
    store_timeout: Duration,
    clock_skew_tolerance: Duration,
}

impl<S: EventStore + ?Sized> Clone for AggregationService<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            catalog: self.catalog.clone(),
            store_timeout: self.store_timeout,
            clock_skew_tolerance: self.clock_skew_tolerance,
        }
    }
}

impl<S: EventStore + ?Sized> AggregationService<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self {
            store,
            catalog: WindowCatalog::standard(),
            store_timeout: Duration::from_secs(5),
            clock_skew_tolerance: Duration::from_secs(300),
        }
    }

    pub fn with_catalog(mut self, catalog: WindowCatalog) -> Self {
        self.catalog = catalog;
        self
    }

    pub fn with_store_timeout(mut self, timeout: Duration) -> Self {
        self.store_timeout = timeout;
        self
    }

    pub fn with_clock_skew_tolerance(mut self, tolerance: Duration) -> Self {
        self.clock_skew_tolerance = tolerance;
        self
    }

    pub fn catalog(&self) -> &WindowCatalog {
        &self.catalog
    }

    /// Compute the requested facets for every selected window against one `now`
    ///
    /// Any store failure fails the whole call.
    pub async fn aggregate(&self, request: &AggregationRequest) -> Result<AggregationResult, AggregateError> {
        // Validation happens before any store access
        let windows = match &request.windows {
            Some(names) => self.catalog.select(names)?,
            None => self.catalog.clone(),
        };

        let now = request.now.unwrap_or_else(Utc::now);
        let now_millis = now.timestamp_millis();

        if request.now.is_some() {
            let _ = self.check_clock_skew(now_millis).await;
        }

        let sum_aggregator = match &request.sum_categories {
            Some(categories) => WindowedSumAggregator::with_categories(categories.clone()),
            None => WindowedSumAggregator::new(),
        };
        let corpus_builder = WindowedCorpusBuilder::new();

        let sums_fut = async {
            if !request.facets.sums {
                return Ok(Vec::new());
            }
            self.bounded(sum_aggregator.summarize(self.store.as_ref(), now_millis, &windows))
                .await
        };
        let corpora_fut = async {
            if !request.facets.corpora {
                return Ok(Vec::new());
            }
            self.bounded(corpus_builder.build_corpora(
                self.store.as_ref(),
                now_millis,
                &windows,
                &request.corpus_filter,
            ))
            .await
        };

        let (sums, corpora) = tokio::try_join!(sums_fut, corpora_fut)?;

        log::debug!(
            "✅ Aggregated {} sum windows, {} corpus windows at {}",
            sums.len(),
            corpora.len(),
            now
        );

        Ok(AggregationResult {
            now,
            sums: sums.into(),
            corpora: corpora.into(),
        })
    }

    async fn bounded<T, F>(&self, fut: F) -> Result<T, AggregateError>
    where
        F: Future<Output = Result<T, AggregateError>>,
    {
        match tokio::time::timeout(self.store_timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(AggregateError::StoreUnavailable(StoreError::Timeout(
                self.store_timeout,
            ))),
        }
    }

    /// Advisory only: warn when a frozen `now` is well behind the newest record
    ///
    /// Returns the skew in milliseconds when it exceeded the tolerance.
    async fn check_clock_skew(&self, now_millis: i64) -> Option<i64> {
        let newest = match tokio::time::timeout(self.store_timeout, self.store.latest_timestamp_millis()).await {
            Ok(Ok(Some(newest))) => newest,
            Ok(Ok(None)) => return None,
            Ok(Err(e)) => {
                log::debug!("Clock skew check skipped: {}", e);
                return None;
            }
            Err(_) => {
                log::debug!("Clock skew check skipped: timed out");
                return None;
            }
        };

        let tolerance = i64::try_from(self.clock_skew_tolerance.as_millis()).unwrap_or(i64::MAX);
        let skew = newest.saturating_sub(now_millis);
        if skew > tolerance {
            log::warn!(
                "⚠️  Clock skew: now={}ms is {}ms behind newest record (tolerance {}ms)",
                now_millis,
                skew,
                tolerance
            );
            return Some(skew);
        }
        None
    }
}
