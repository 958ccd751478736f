//! Window Report Binary - Rolling sentiment and corpus reports
//!
//! Reads the ingestion database and prints one JSON report per line to
//! stdout. Logs go to stderr.
//!
//! ## Usage
//!
//! ```bash
//! cargo run --release --bin window_report -- --once --facet sums
//! cargo run --release --bin window_report -- --now 2025-06-01T12:00:00Z
//! ```
//!
//! ## Environment Variables
//!
//! - SENTIFLOW_DB_PATH - SQLite database path (default: data/sentiflow.db)
//! - STORE_TIMEOUT_MS - Bound on each store read (default: 5000)
//! - CLOCK_SKEW_TOLERANCE_SECS - Frozen-clock warning threshold (default: 300)
//! - CORPUS_SENTIMENTS - Comma-separated sentiments (default: positive,negative)
//! - CORPUS_CATEGORIES - Comma-separated categories (default: politics,war,education,government)
//! - REPORT_WINDOWS - Comma-separated window names (default: all)
//! - REPORT_INTERVAL_SECS - Seconds between reports (default: 60)
//! - RUST_LOG - Logging level (optional, default: info)

use chrono::{DateTime, Utc};
use sentiflow::aggregator_core::SqliteEventStore;
use sentiflow::{AggregationConfig, AggregationService, Facets};
use std::env;
use std::sync::Arc;
use tokio::time::{interval, Duration};

#[derive(Debug)]
struct CliArgs {
    once: bool,
    now: Option<DateTime<Utc>>,
    facets: Facets,
}

fn parse_args() -> Result<CliArgs, Box<dyn std::error::Error>> {
    let args: Vec<String> = env::args().collect();

    let value_of = |flag: &str| -> Option<String> {
        args.iter()
            .position(|x| x == flag)
            .and_then(|idx| args.get(idx + 1))
            .cloned()
    };

    let now = match value_of("--now") {
        Some(raw) => Some(DateTime::parse_from_rfc3339(&raw)?.with_timezone(&Utc)),
        None => None,
    };

    let facets = match value_of("--facet") {
        Some(raw) => Facets::parse(&raw)
            .ok_or_else(|| format!("--facet must be sums, corpora or both, got '{}'", raw))?,
        None => Facets::BOTH,
    };

    Ok(CliArgs {
        once: args.iter().any(|x| x == "--once"),
        now,
        facets,
    })
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .target(env_logger::Target::Stderr)
        .init();

    dotenv::dotenv().ok();

    let args = parse_args()?;
    let config = AggregationConfig::from_env();

    log::info!("🚀 Starting window report");
    log::info!("   Database: {}", config.db_path);
    log::info!("   Store timeout: {}ms", config.store_timeout_ms);
    log::info!("   Corpus sentiments: {:?}", config.corpus_sentiments);
    log::info!("   Corpus categories: {:?}", config.corpus_categories);
    log::info!("   Facets: {:?}", args.facets);
    if let Some(now) = args.now {
        log::info!("   Frozen now: {}", now.to_rfc3339());
    }

    let store = Arc::new(SqliteEventStore::open(&config.db_path)?);
    let service = AggregationService::new(store)
        .with_store_timeout(config.store_timeout())
        .with_clock_skew_tolerance(config.clock_skew_tolerance());

    let mut request = config.default_request(args.facets)?;
    request.now = args.now;

    if args.once {
        let result = service.aggregate(&request).await?;
        println!("{}", serde_json::to_string(&result)?);
        return Ok(());
    }

    log::info!("⏱️  Reporting every {}s", config.report_interval_secs);
    let mut ticker = interval(Duration::from_secs(config.report_interval_secs.max(1)));

    loop {
        ticker.tick().await;

        match service.aggregate(&request).await {
            Ok(result) => match serde_json::to_string(&result) {
                Ok(line) => println!("{}", line),
                Err(e) => log::error!("Failed to serialize report: {}", e),
            },
            Err(e) => log::error!("Report failed: {}", e),
        }
    }
}
