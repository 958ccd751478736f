//! sentiflow - rolling window analytics over sentiment counters and text corpora

pub mod aggregator_core;
pub mod config;
pub mod sqlite_pragma;

pub use aggregator_core::{
    AggregateError, AggregationRequest, AggregationResult, AggregationService, EventStore, Facets,
    WindowCatalog,
};
pub use config::AggregationConfig;
