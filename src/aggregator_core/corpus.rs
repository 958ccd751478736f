//! Per-window text corpora over filtered documents
//!
//! Documents are filtered once (sentiment and category allow-lists), sorted
//! by `created_at` ascending once, and then every window takes the suffix
//! starting at its cutoff. The same filter and join apply to every window.

use super::error::AggregateError;
use super::normalizer::{Document, Sentiment};
use super::store::{EventStore, ScanOrder};
use super::window::WindowCatalog;
use serde::Serialize;
use std::collections::BTreeSet;

/// Categories tracked by the default corpus filter
pub const DEFAULT_CORPUS_CATEGORIES: [&str; 4] = ["politics", "war", "education", "government"];

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CorpusResult {
    pub window_name: String,
    pub corpus: String,
}

/// Which documents are eligible for any corpus at all
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorpusFilter {
    sentiments: BTreeSet<Sentiment>,
    categories: BTreeSet<String>,
}

impl CorpusFilter {
    /// Sentiments must be a non-empty subset of positive/negative; an empty
    /// category set is allowed and simply matches nothing
    pub fn new<I, S>(sentiments: BTreeSet<Sentiment>, categories: I) -> Result<Self, AggregateError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        if sentiments.is_empty() {
            return Err(AggregateError::InvalidRequest(
                "sentiment filter must not be empty".to_string(),
            ));
        }
        if let Some(other) = sentiments
            .iter()
            .find(|s| !matches!(s, Sentiment::Positive | Sentiment::Negative))
        {
            return Err(AggregateError::InvalidRequest(format!(
                "sentiment filter only accepts positive or negative, got '{}'",
                other
            )));
        }

        Ok(Self {
            sentiments,
            categories: categories.into_iter().map(Into::into).collect(),
        })
    }

    pub fn sentiments(&self) -> &BTreeSet<Sentiment> {
        &self.sentiments
    }

    pub fn categories(&self) -> &BTreeSet<String> {
        &self.categories
    }

    pub fn matches(&self, document: &Document) -> bool {
        self.sentiments.contains(&document.sentiment)
            && !document.categories.is_disjoint(&self.categories)
    }
}

impl Default for CorpusFilter {
    /// positive/negative over the tracked categories
    fn default() -> Self {
        Self {
            sentiments: [Sentiment::Positive, Sentiment::Negative].into_iter().collect(),
            categories: DEFAULT_CORPUS_CATEGORIES.iter().map(|c| c.to_string()).collect(),
        }
    }
}

/// Builds one corpus per window
#[derive(Debug, Clone, Default)]
pub struct WindowedCorpusBuilder;

impl WindowedCorpusBuilder {
    pub fn new() -> Self {
        Self
    }

    /// Corpora per window, in catalog order
    pub async fn build_corpora<S: EventStore + ?Sized>(
        &self,
        store: &S,
        now_millis: i64,
        windows: &WindowCatalog,
        filter: &CorpusFilter,
    ) -> Result<Vec<CorpusResult>, AggregateError> {
        let Some(earliest) = windows.earliest_cutoff_millis(now_millis) else {
            return Ok(Vec::new());
        };

        let documents = store
            .scan_documents(earliest, now_millis, ScanOrder::Ascending)
            .await?;

        log::debug!(
            "📝 Building corpora from {} documents for {} windows",
            documents.len(),
            windows.len()
        );

        Ok(self.assemble(documents, now_millis, windows, filter))
    }

    /// Filter, order and slice already-fetched documents
    pub fn assemble(
        &self,
        documents: Vec<Document>,
        now_millis: i64,
        windows: &WindowCatalog,
        filter: &CorpusFilter,
    ) -> Vec<CorpusResult> {
        let mut eligible: Vec<Document> = documents
            .into_iter()
            .filter(|d| filter.matches(d) && d.created_at_millis() <= now_millis)
            .collect();

        // Stable: equal timestamps keep arrival order
        eligible.sort_by_key(Document::created_at_millis);

        windows
            .windows()
            .iter()
            .map(|window| {
                let cutoff = window.cutoff_millis(now_millis);
                let start = eligible.partition_point(|d| d.created_at_millis() < cutoff);

                let texts: Vec<&str> = eligible[start..].iter().map(|d| d.text.as_str()).collect();

                CorpusResult {
                    window_name: window.name().to_string(),
                    corpus: texts.join(" "),
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregator_core::store::MemoryEventStore;
    use crate::aggregator_core::window::WindowSpec;
    use chrono::{DateTime, Duration, Utc};

    const NOW_MS: i64 = 1_700_000_000_000;

    fn at(millis_ago: i64) -> DateTime<Utc> {
        DateTime::<Utc>::from_timestamp_millis(NOW_MS - millis_ago).unwrap()
    }

    fn doc(minutes_ago: i64, text: &str, sentiment: Sentiment, category: &str) -> Document {
        Document::new(at(minutes_ago * 60_000), text, sentiment, [category])
    }

    fn corpus<'a>(results: &'a [CorpusResult], name: &str) -> &'a str {
        &results.iter().find(|r| r.window_name == name).unwrap().corpus
    }

    #[tokio::test]
    async fn test_scenario_filters_neutral() {
        let store = MemoryEventStore::new();
        store.append_document(doc(10, "a", Sentiment::Positive, "politics"));
        store.append_document(doc(5, "b", Sentiment::Negative, "war"));
        store.append_document(doc(1, "c", Sentiment::Neutral, "politics"));

        let results = WindowedCorpusBuilder::new()
            .build_corpora(&store, NOW_MS, &WindowCatalog::standard(), &CorpusFilter::default())
            .await
            .unwrap();

        assert_eq!(results.len(), 7);
        assert_eq!(corpus(&results, "last15Minutes"), "a b");
        // Every window gets the real join, not just the first
        assert_eq!(corpus(&results, "last30Minutes"), "a b");
        assert_eq!(corpus(&results, "last1Month"), "a b");
    }

    #[test]
    fn test_join_order_and_separator() {
        let catalog = WindowCatalog::standard();
        // Arrival order reversed relative to time
        let docs = vec![
            doc(2, "beta", Sentiment::Positive, "war"),
            doc(3, "alpha", Sentiment::Positive, "war"),
        ];

        let results = WindowedCorpusBuilder::new().assemble(docs, NOW_MS, &catalog, &CorpusFilter::default());
        assert_eq!(corpus(&results, "last15Minutes"), "alpha beta");
    }

    #[test]
    fn test_single_document_has_no_separator() {
        let catalog = WindowCatalog::standard();
        let docs = vec![doc(2, "only", Sentiment::Negative, "education")];

        let results = WindowedCorpusBuilder::new().assemble(docs, NOW_MS, &catalog, &CorpusFilter::default());
        assert_eq!(corpus(&results, "last15Minutes"), "only");
    }

    #[test]
    fn test_ties_keep_arrival_order() {
        let catalog = WindowCatalog::standard();
        let docs = vec![
            doc(4, "first", Sentiment::Positive, "war"),
            doc(4, "second", Sentiment::Positive, "war"),
            doc(8, "earliest", Sentiment::Positive, "war"),
        ];

        let results = WindowedCorpusBuilder::new().assemble(docs, NOW_MS, &catalog, &CorpusFilter::default());
        assert_eq!(corpus(&results, "last15Minutes"), "earliest first second");
    }

    #[test]
    fn test_boundary_inclusive() {
        let catalog = WindowCatalog::new(vec![WindowSpec::new("w", Duration::minutes(15))]).unwrap();
        let builder = WindowedCorpusBuilder::new();

        let at_cutoff = vec![Document::new(at(15 * 60_000), "in", Sentiment::Positive, ["war"])];
        let results = builder.assemble(at_cutoff, NOW_MS, &catalog, &CorpusFilter::default());
        assert_eq!(corpus(&results, "w"), "in");

        let one_ms_older = vec![Document::new(at(15 * 60_000 + 1), "out", Sentiment::Positive, ["war"])];
        let results = builder.assemble(one_ms_older, NOW_MS, &catalog, &CorpusFilter::default());
        assert_eq!(corpus(&results, "w"), "");
    }

    #[test]
    fn test_category_outside_allow_list_excluded() {
        let catalog = WindowCatalog::standard();
        let docs = vec![
            doc(1, "sports", Sentiment::Positive, "sports"),
            Document::new(at(60_000), "mixed", Sentiment::Positive, ["sports", "government"]),
        ];

        let results = WindowedCorpusBuilder::new().assemble(docs, NOW_MS, &catalog, &CorpusFilter::default());
        for result in &results {
            assert_eq!(result.corpus, "mixed");
        }
    }

    #[test]
    fn test_windows_take_growing_suffixes() {
        let catalog = WindowCatalog::standard();
        let docs = vec![
            doc(3 * 24 * 60, "three_days", Sentiment::Negative, "war"),
            doc(45, "forty_five_minutes", Sentiment::Negative, "war"),
            doc(5, "five_minutes", Sentiment::Negative, "war"),
        ];

        let results = WindowedCorpusBuilder::new().assemble(docs, NOW_MS, &catalog, &CorpusFilter::default());
        assert_eq!(corpus(&results, "last15Minutes"), "five_minutes");
        assert_eq!(corpus(&results, "last30Minutes"), "five_minutes");
        assert_eq!(corpus(&results, "last1Hour"), "forty_five_minutes five_minutes");
        assert_eq!(corpus(&results, "last1Day"), "forty_five_minutes five_minutes");
        assert_eq!(corpus(&results, "last1Week"), "three_days forty_five_minutes five_minutes");
    }

    #[tokio::test]
    async fn test_empty_store_yields_empty_strings() {
        let store = MemoryEventStore::new();
        let results = WindowedCorpusBuilder::new()
            .build_corpora(&store, NOW_MS, &WindowCatalog::standard(), &CorpusFilter::default())
            .await
            .unwrap();

        assert_eq!(results.len(), 7);
        assert!(results.iter().all(|r| r.corpus.is_empty()));
    }

    #[test]
    fn test_unclassified_or_neutral_sentiment_filter_rejected() {
        // A misspelled name parses to Unknown and must not widen the filter
        let misspelled: BTreeSet<Sentiment> = [Sentiment::parse("postive")].into_iter().collect();
        let err = CorpusFilter::new(misspelled, ["war"]).unwrap_err();
        assert!(err.is_invalid_request());

        let neutral: BTreeSet<Sentiment> = [Sentiment::Positive, Sentiment::Neutral].into_iter().collect();
        assert!(CorpusFilter::new(neutral, ["war"]).is_err());

        let both: BTreeSet<Sentiment> = [Sentiment::Positive, Sentiment::Negative].into_iter().collect();
        assert!(CorpusFilter::new(both, ["war"]).is_ok());
    }

    #[test]
    fn test_document_without_sentiment_never_eligible() {
        let line = r#"{"commit":{"record":{"text":"unclassified","createdAt":"2023-11-14T22:12:00Z"}},"categories":["war"]}"#;
        let unclassified = Document::from_firehose_json(line).unwrap();

        assert!(!CorpusFilter::default().matches(&unclassified));

        let results = WindowedCorpusBuilder::new().assemble(
            vec![unclassified],
            NOW_MS,
            &WindowCatalog::standard(),
            &CorpusFilter::default(),
        );
        assert!(results.iter().all(|r| r.corpus.is_empty()));
    }

    #[test]
    fn test_empty_sentiment_filter_rejected() {
        let err = CorpusFilter::new(BTreeSet::new(), ["war"]).unwrap_err();
        assert!(err.is_invalid_request());
    }
}
