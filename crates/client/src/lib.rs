//! Search backend access for the relevance workbench
//!
//! This crate talks to the OpenSearch-compatible endpoint holding experiments
//! and their evaluation records. It provides:
//!
//! - the [`SearchBackend`] trait and an HTTP implementation
//! - the batched retrieval engine for result sets larger than one page
//! - the experiment results pipeline built on top of both

#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]

use async_trait::async_trait;
use relevance_core::config::BackendConfig;
use relevance_core::error::Result;
use relevance_core::record::{SearchRequest, SearchResponse};
use std::sync::Arc;
use tracing::info;

pub mod batch;
pub mod error;
pub mod mock;
mod opensearch;
pub mod pipeline;

pub use batch::{fetch_batched, BatchPlan, BatchedHits, PageFetcher, PartialRetrieval};
pub use error::ClientError;
pub use opensearch::OpenSearchBackend;
pub use pipeline::{
    Delivery, EvaluationResults, ExperimentReport, ExperimentResults, ExperimentResultsLoader,
    PairwiseResults, RetrievalStatus,
};

/// Trait for search backends
///
/// A backend executes one search request and returns the decoded response.
/// Transport failures and non-2xx responses are returned as
/// [`relevance_core::Error::Transport`]; timeouts are the backend's concern.
#[async_trait]
pub trait SearchBackend: Send + Sync {
    async fn search(&self, request: &SearchRequest) -> Result<SearchResponse>;
}

/// Create the HTTP search backend described by the configuration
pub fn create_search_backend(config: &BackendConfig) -> Result<Arc<dyn SearchBackend>> {
    info!("Creating OpenSearch backend for {}", config.base_url);
    let backend = OpenSearchBackend::new(config)?;
    Ok(Arc::new(backend))
}
