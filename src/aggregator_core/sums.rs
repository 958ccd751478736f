//! Per-window positive/negative totals
//!
//! ## Single pass
//!
//! Events are read once, newest first, from `now` down to the earliest
//! cutoff in the catalog. Windows are ordered by cutoff, latest first (the
//! shortest window retires first). Walking the stream, a window retires as
//! soon as an event falls below its cutoff and never comes back.
//!
//! Instead of adding each event to every live window, the event is added to
//! one bucket: the index of the first window still live. A window's total is
//! then the prefix sum of buckets up to its own position, which keeps the
//! pass at O(events + windows).
//!
//! ## Per-window fallback
//!
//! Stores that cannot return sorted scans get one range scan per window.

use super::error::AggregateError;
use super::normalizer::Event;
use super::store::{EventStore, ScanOrder};
use super::window::WindowCatalog;
use serde::Serialize;
use std::collections::BTreeSet;

/// Totals for one window; zero when nothing fell inside it
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SumResult {
    pub window_name: String,
    pub total_positive: u64,
    pub total_negative: u64,
}

impl SumResult {
    pub fn empty(window_name: impl Into<String>) -> Self {
        Self {
            window_name: window_name.into(),
            ..Default::default()
        }
    }

    fn add(&mut self, positive: u64, negative: u64) {
        self.total_positive = self.total_positive.saturating_add(positive);
        self.total_negative = self.total_negative.saturating_add(negative);
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct Bucket {
    positive: u64,
    negative: u64,
}

/// Computes `SumResult` for every window in a catalog
#[derive(Debug, Clone, Default)]
pub struct WindowedSumAggregator {
    /// Only events in these categories are summed; `None` sums everything
    categories: Option<BTreeSet<String>>,
}

impl WindowedSumAggregator {
    pub fn new() -> Self {
        Self { categories: None }
    }

    pub fn with_categories(categories: BTreeSet<String>) -> Self {
        Self {
            categories: Some(categories),
        }
    }

    fn accepts(&self, event: &Event) -> bool {
        self.categories
            .as_ref()
            .map_or(true, |allowed| allowed.contains(&event.category))
    }

    /// Totals per window, in catalog order
    pub async fn summarize<S: EventStore + ?Sized>(
        &self,
        store: &S,
        now_millis: i64,
        windows: &WindowCatalog,
    ) -> Result<Vec<SumResult>, AggregateError> {
        let Some(earliest) = windows.earliest_cutoff_millis(now_millis) else {
            return Ok(Vec::new());
        };

        if !store.supports_sorted_scan() {
            return self.summarize_per_window(store, now_millis, windows).await;
        }

        let events = store
            .scan_events(earliest, now_millis, ScanOrder::Descending)
            .await?;

        log::debug!(
            "Σ single pass over {} events for {} windows",
            events.len(),
            windows.len()
        );

        Ok(self.fold_descending(&events, now_millis, windows))
    }

    /// Single pass over events already sorted newest first
    pub fn fold_descending(
        &self,
        events: &[Event],
        now_millis: i64,
        windows: &WindowCatalog,
    ) -> Vec<SumResult> {
        let specs = windows.windows();
        let cutoffs: Vec<i64> = specs.iter().map(|w| w.cutoff_millis(now_millis)).collect();

        // Latest cutoff first: retirement order
        let mut order: Vec<usize> = (0..specs.len()).collect();
        order.sort_by(|&a, &b| cutoffs[b].cmp(&cutoffs[a]));

        let mut buckets = vec![Bucket::default(); specs.len()];
        let mut retired = 0;

        for event in events.iter().filter(|e| self.accepts(e)) {
            let t = event.timestamp_millis();
            if t > now_millis {
                continue;
            }

            while retired < order.len() && t < cutoffs[order[retired]] {
                retired += 1;
            }
            if retired == order.len() {
                break;
            }

            let bucket = &mut buckets[retired];
            bucket.positive = bucket.positive.saturating_add(event.positive);
            bucket.negative = bucket.negative.saturating_add(event.negative);
        }

        let mut results: Vec<SumResult> = specs.iter().map(|w| SumResult::empty(w.name())).collect();
        let mut running = Bucket::default();
        for (position, &index) in order.iter().enumerate() {
            running.positive = running.positive.saturating_add(buckets[position].positive);
            running.negative = running.negative.saturating_add(buckets[position].negative);
            results[index].add(running.positive, running.negative);
        }

        results
    }

    async fn summarize_per_window<S: EventStore + ?Sized>(
        &self,
        store: &S,
        now_millis: i64,
        windows: &WindowCatalog,
    ) -> Result<Vec<SumResult>, AggregateError> {
        let mut results = Vec::with_capacity(windows.len());

        for window in windows.windows() {
            let events = store
                .scan_events(window.cutoff_millis(now_millis), now_millis, ScanOrder::Ascending)
                .await?;

            let mut result = SumResult::empty(window.name());
            for event in events.iter().filter(|e| self.accepts(e)) {
                result.add(event.positive, event.negative);
            }
            results.push(result);
        }

        log::debug!("Σ per-window scan for {} windows", windows.len());

        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregator_core::store::MemoryEventStore;
    use crate::aggregator_core::window::WindowSpec;
    use async_trait::async_trait;
    use chrono::Duration;

    const NOW_SECS: i64 = 1_700_000_000;
    const NOW_MS: i64 = NOW_SECS * 1000;

    fn event(secs_ago: i64, positive: u64, negative: u64) -> Event {
        Event {
            timestamp: NOW_SECS - secs_ago,
            positive,
            negative,
            category: "politics".to_string(),
        }
    }

    fn scenario_store() -> MemoryEventStore {
        let store = MemoryEventStore::new();
        store.append_event(event(2 * 60 * 60, 0, 5));
        store.append_event(event(20 * 60, 2, 0));
        store.append_event(event(5 * 60, 3, 1));
        store
    }

    fn totals(results: &[SumResult], name: &str) -> (u64, u64) {
        let r = results.iter().find(|r| r.window_name == name).unwrap();
        (r.total_positive, r.total_negative)
    }

    /// Wraps the memory store but refuses to promise sorted scans
    struct UnsortedStore(MemoryEventStore);

    #[async_trait]
    impl EventStore for UnsortedStore {
        async fn scan_events(
            &self,
            lower_millis: i64,
            upper_millis: i64,
            order: ScanOrder,
        ) -> Result<Vec<Event>, crate::aggregator_core::store::StoreError> {
            self.0.scan_events(lower_millis, upper_millis, order).await
        }

        async fn scan_documents(
            &self,
            lower_millis: i64,
            upper_millis: i64,
            order: ScanOrder,
        ) -> Result<Vec<crate::aggregator_core::normalizer::Document>, crate::aggregator_core::store::StoreError>
        {
            self.0.scan_documents(lower_millis, upper_millis, order).await
        }

        fn supports_sorted_scan(&self) -> bool {
            false
        }
    }

    #[tokio::test]
    async fn test_scenario_totals() {
        let store = scenario_store();
        let results = WindowedSumAggregator::new()
            .summarize(&store, NOW_MS, &WindowCatalog::standard())
            .await
            .unwrap();

        assert_eq!(results.len(), 7);
        assert_eq!(totals(&results, "last15Minutes"), (3, 1));
        assert_eq!(totals(&results, "last30Minutes"), (5, 1));
        assert_eq!(totals(&results, "last1Hour"), (5, 1));
        assert_eq!(totals(&results, "last6Hours"), (5, 6));
        assert_eq!(totals(&results, "last1Month"), (5, 6));
    }

    #[tokio::test]
    async fn test_fallback_matches_single_pass() {
        let sorted = scenario_store();
        let unsorted = UnsortedStore(scenario_store());
        let catalog = WindowCatalog::standard();
        let aggregator = WindowedSumAggregator::new();

        let a = aggregator.summarize(&sorted, NOW_MS, &catalog).await.unwrap();
        let b = aggregator.summarize(&unsorted, NOW_MS, &catalog).await.unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_boundary_inclusive() {
        let catalog = WindowCatalog::new(vec![WindowSpec::new("w", Duration::minutes(15))]).unwrap();
        let aggregator = WindowedSumAggregator::new();

        let at_cutoff = vec![event(15 * 60, 1, 0)];
        assert_eq!(totals(&aggregator.fold_descending(&at_cutoff, NOW_MS, &catalog), "w"), (1, 0));

        let one_second_older = vec![event(15 * 60 + 1, 1, 0)];
        assert_eq!(
            totals(&aggregator.fold_descending(&one_second_older, NOW_MS, &catalog), "w"),
            (0, 0)
        );
    }

    #[test]
    fn test_unsorted_catalog_durations() {
        // Longest first; each window still evaluated on its own
        let catalog = WindowCatalog::new(vec![
            WindowSpec::new("day", Duration::days(1)),
            WindowSpec::new("quarter", Duration::minutes(15)),
            WindowSpec::new("hour", Duration::hours(1)),
        ])
        .unwrap();
        let events = vec![event(60, 1, 0), event(30 * 60, 10, 0), event(3 * 60 * 60, 100, 0)];

        let results = WindowedSumAggregator::new().fold_descending(&events, NOW_MS, &catalog);

        assert_eq!(results[0].window_name, "day");
        assert_eq!(totals(&results, "day"), (111, 0));
        assert_eq!(totals(&results, "quarter"), (1, 0));
        assert_eq!(totals(&results, "hour"), (11, 0));
    }

    #[test]
    fn test_events_after_now_ignored() {
        let catalog = WindowCatalog::standard();
        let events = vec![event(-60, 7, 7), event(60, 1, 1)];

        let results = WindowedSumAggregator::new().fold_descending(&events, NOW_MS, &catalog);
        assert_eq!(totals(&results, "last15Minutes"), (1, 1));
    }

    #[tokio::test]
    async fn test_empty_store_zero_filled() {
        let store = MemoryEventStore::new();
        let results = WindowedSumAggregator::new()
            .summarize(&store, NOW_MS, &WindowCatalog::standard())
            .await
            .unwrap();

        assert_eq!(results.len(), 7);
        assert!(results.iter().all(|r| r.total_positive == 0 && r.total_negative == 0));
    }

    #[tokio::test]
    async fn test_category_filter() {
        let store = scenario_store();
        store.append_event(Event {
            timestamp: NOW_SECS - 60,
            positive: 50,
            negative: 50,
            category: "sports".to_string(),
        });

        let only_politics = WindowedSumAggregator::with_categories(
            ["politics".to_string()].into_iter().collect(),
        );
        let results = only_politics
            .summarize(&store, NOW_MS, &WindowCatalog::standard())
            .await
            .unwrap();
        assert_eq!(totals(&results, "last15Minutes"), (3, 1));

        let everything = WindowedSumAggregator::new()
            .summarize(&store, NOW_MS, &WindowCatalog::standard())
            .await
            .unwrap();
        assert_eq!(totals(&everything, "last15Minutes"), (53, 51));
    }

    #[tokio::test]
    async fn test_nested_windows_monotonic() {
        let store = MemoryEventStore::new();
        for i in 0..500 {
            store.append_event(event(i * 7919 % (40 * 24 * 60 * 60), (i % 5) as u64, (i % 3) as u64));
        }

        let results = WindowedSumAggregator::new()
            .summarize(&store, NOW_MS, &WindowCatalog::standard())
            .await
            .unwrap();

        for pair in results.windows(2) {
            assert!(pair[0].total_positive <= pair[1].total_positive);
            assert!(pair[0].total_negative <= pair[1].total_negative);
        }
    }
}
