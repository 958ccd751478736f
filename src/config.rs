//! Report configuration from environment variables

use crate::aggregator_core::{
    AggregateError, AggregationRequest, CorpusFilter, Facets, Sentiment, WindowCatalog,
    DEFAULT_CORPUS_CATEGORIES,
};
use std::collections::BTreeSet;
use std::env;
use std::time::Duration;

/// Configuration for the window report runtime
///
/// Loaded from environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct AggregationConfig {
    /// Path to SQLite database file
    pub db_path: String,

    /// Upper bound on each store read
    pub store_timeout_ms: u64,

    /// How far a frozen `now` may trail the newest record before warning
    pub clock_skew_tolerance_secs: u64,

    /// Sentiments eligible for the corpus facet
    pub corpus_sentiments: BTreeSet<Sentiment>,

    /// Categories eligible for the corpus facet
    pub corpus_categories: BTreeSet<String>,

    /// Window names to report; `None` reports the full catalog
    pub report_windows: Option<Vec<String>>,

    /// Seconds between reports in continuous mode
    pub report_interval_secs: u64,
}

fn parse_or<T: std::str::FromStr>(var: &str, default: T) -> T {
    match env::var(var) {
        Ok(raw) => match raw.trim().parse() {
            Ok(value) => value,
            Err(_) => {
                log::warn!("Invalid {} '{}', using default", var, raw);
                default
            }
        },
        Err(_) => default,
    }
}

fn parse_list(var: &str) -> Option<Vec<String>> {
    env::var(var).ok().map(|s| {
        s.split(',')
            .map(|item| item.trim().to_string())
            .filter(|item| !item.is_empty())
            .collect()
    })
}

impl AggregationConfig {
    /// Load configuration from environment variables
    ///
    /// Environment variables:
    /// - `SENTIFLOW_DB_PATH` (default: data/sentiflow.db)
    /// - `STORE_TIMEOUT_MS` (default: 5000)
    /// - `CLOCK_SKEW_TOLERANCE_SECS` (default: 300)
    /// - `CORPUS_SENTIMENTS` (default: positive,negative)
    /// - `CORPUS_CATEGORIES` (default: politics,war,education,government)
    /// - `REPORT_WINDOWS` (default: every catalog window)
    /// - `REPORT_INTERVAL_SECS` (default: 60)
    pub fn from_env() -> Self {
        let corpus_sentiments = parse_list("CORPUS_SENTIMENTS")
            .map(|items| items.iter().map(|s| Sentiment::parse(s)).collect())
            .unwrap_or_else(|| [Sentiment::Positive, Sentiment::Negative].into_iter().collect());

        let corpus_categories = parse_list("CORPUS_CATEGORIES")
            .map(|items| items.into_iter().collect())
            .unwrap_or_else(|| DEFAULT_CORPUS_CATEGORIES.iter().map(|c| c.to_string()).collect());

        Self {
            db_path: env::var("SENTIFLOW_DB_PATH").unwrap_or_else(|_| "data/sentiflow.db".to_string()),
            store_timeout_ms: parse_or("STORE_TIMEOUT_MS", 5_000),
            clock_skew_tolerance_secs: parse_or("CLOCK_SKEW_TOLERANCE_SECS", 300),
            corpus_sentiments,
            corpus_categories,
            report_windows: parse_list("REPORT_WINDOWS").filter(|w| !w.is_empty()),
            report_interval_secs: parse_or("REPORT_INTERVAL_SECS", 60),
        }
    }

    pub fn store_timeout(&self) -> Duration {
        Duration::from_millis(self.store_timeout_ms)
    }

    pub fn clock_skew_tolerance(&self) -> Duration {
        Duration::from_secs(self.clock_skew_tolerance_secs)
    }

    /// Request for the configured facets and filters
    ///
    /// Fails on an empty or unrecognised sentiment list, or a window name
    /// outside the catalog.
    pub fn default_request(&self, facets: Facets) -> Result<AggregationRequest, AggregateError> {
        if let Some(names) = &self.report_windows {
            WindowCatalog::standard().select(names)?;
        }

        Ok(AggregationRequest {
            now: None,
            facets,
            windows: self.report_windows.clone(),
            corpus_filter: CorpusFilter::new(
                self.corpus_sentiments.clone(),
                self.corpus_categories.iter().cloned(),
            )?,
            sum_categories: None,
        })
    }
}
