//! Core types for the relevance workbench
//!
//! This crate turns loosely typed search-backend documents into validated
//! experiment data:
//!
//! - **Records**: raw hits and the search request/response wire shapes
//! - **Parsing**: per-shape validators returning [`ParseOutcome`]
//! - **Outcomes**: the all-or-nothing [`combine`] combinator
//! - **Metrics**: metric extraction and summary statistics
//! - **Zero results**: query-set vs. retrieved count comparison
//! - **Configuration** and **error handling**
//!

#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]

pub mod config;
pub mod entities;
pub mod error;
pub mod metrics;
pub mod outcome;
pub mod parse;
pub mod record;
pub mod zero_results;

// Re-export main types for convenience
pub use config::{BackendConfig, Config, IndicesConfig, RetrievalConfig};
pub use entities::{
    CronSchedule, Experiment, ExperimentStatus, ExperimentType, MetricMap, PairwiseResult,
    QueryEvaluation, QuerySet, QuerySnapshot, ScheduledJob,
};
pub use error::{Error, Result, ResultExt};
pub use metrics::{
    best_variant, extract_metrics, summarize, summarize_all, summarize_by_variant, MetricEntry,
    MetricValue, VariantSummary,
};
pub use outcome::{combine, FieldError, ParseOutcome};
pub use parse::{parse, parse_hit, parse_hits, parse_pairwise_results, FromRawRecord};
pub use record::{RawRecord, SearchHit, SearchRequest, SearchResponse};
pub use zero_results::{detect_zero_results, ZeroResultReport};

/// Version of the core library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::config::Config;
    pub use crate::error::{Result, ResultExt};
    pub use crate::outcome::{combine, ParseOutcome};
    pub use crate::parse::{parse, parse_hit, FromRawRecord};
    pub use crate::record::{RawRecord, SearchHit};
}
