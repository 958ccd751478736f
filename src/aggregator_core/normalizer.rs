//! Store records and their normalization to epoch milliseconds
//!
//! Sentiment counter events carry a unix timestamp in seconds; documents carry
//! a native `createdAt` date. Both are compared as epoch milliseconds.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::error::Error;

/// Per-category sentiment counters, appended once per reporting interval
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    /// Unix epoch seconds
    pub timestamp: i64,
    pub positive: u64,
    pub negative: u64,
    pub category: String,
}

impl Event {
    /// Parse a counter record (`{positive, negative, category, timestamp}`)
    pub fn from_json(line: &str) -> Result<Self, Box<dyn Error>> {
        let event: Event = serde_json::from_str(line)?;
        Ok(event)
    }

    pub fn timestamp_millis(&self) -> i64 {
        self.timestamp.saturating_mul(1000)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sentiment {
    Positive,
    Negative,
    Neutral,
    #[serde(other)]
    Unknown,
}

impl Sentiment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Sentiment::Positive => "positive",
            Sentiment::Negative => "negative",
            Sentiment::Neutral => "neutral",
            Sentiment::Unknown => "unknown",
        }
    }

    /// Lenient parse; anything unrecognised maps to `Unknown`
    pub fn parse(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "positive" => Sentiment::Positive,
            "negative" => Sentiment::Negative,
            "neutral" => Sentiment::Neutral,
            _ => Sentiment::Unknown,
        }
    }
}

impl std::fmt::Display for Sentiment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classified text document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub created_at: DateTime<Utc>,
    pub text: String,
    pub sentiment: Sentiment,
    pub categories: BTreeSet<String>,
}

/// Ingestion record shape: text and date nested under `commit.record`
#[derive(Debug, Deserialize)]
struct FirehoseRecord {
    commit: FirehoseCommit,
    #[serde(default)]
    finsentiment: Option<String>,
    #[serde(default)]
    categories: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct FirehoseCommit {
    record: FirehoseText,
}

#[derive(Debug, Deserialize)]
struct FirehoseText {
    #[serde(default)]
    text: String,
    #[serde(rename = "createdAt", alias = "createdat")]
    created_at: DateTime<Utc>,
}

impl Document {
    pub fn new<I, S>(created_at: DateTime<Utc>, text: impl Into<String>, sentiment: Sentiment, categories: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            created_at,
            text: text.into(),
            sentiment,
            categories: categories.into_iter().map(Into::into).collect(),
        }
    }

    /// Parse a classified firehose post
    ///
    /// Missing `finsentiment` is treated as `Unknown`; `CorpusFilter` only
    /// admits positive or negative, so such posts never reach a corpus.
    pub fn from_firehose_json(line: &str) -> Result<Self, Box<dyn Error>> {
        let record: FirehoseRecord = serde_json::from_str(line)?;
        let sentiment = record
            .finsentiment
            .as_deref()
            .map(Sentiment::parse)
            .unwrap_or(Sentiment::Unknown);

        Ok(Self {
            created_at: record.commit.record.created_at,
            text: record.commit.record.text,
            sentiment,
            categories: record.categories.into_iter().collect(),
        })
    }

    pub fn created_at_millis(&self) -> i64 {
        self.created_at.timestamp_millis()
    }
}
