//! Batched retrieval of result sets larger than one page
//!
//! The backend caps the `size` of a single request, and optionally the
//! `from + size` window a request may reach. [`fetch_batched`] walks a cursor
//! through the result set one page at a time. Pages are strictly sequential:
//! each page's offset is the number of hits actually returned so far.

use crate::SearchBackend;
use async_trait::async_trait;
use relevance_core::error::{Error, Result};
use relevance_core::record::{SearchHit, SearchRequest};
use serde::Serialize;
use tracing::{debug, info, warn};

/// Sizing of one batched retrieval
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchPlan {
    /// Number of records the caller expects to exist
    pub expected_size: usize,
    /// Largest `size` one request may ask for
    pub page_size_ceiling: usize,
    /// Largest `from + size` the backend serves, if bounded
    pub max_result_window: Option<usize>,
}

impl BatchPlan {
    pub fn new(expected_size: usize, page_size_ceiling: usize) -> Self {
        Self {
            expected_size,
            page_size_ceiling,
            max_result_window: None,
        }
    }

    pub fn with_max_result_window(mut self, window: Option<usize>) -> Self {
        self.max_result_window = window;
        self
    }
}

/// Retrieval stopped at the result window before the expected count
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PartialRetrieval {
    pub retrieved: usize,
    pub expected: usize,
}

/// Hits of a batched retrieval
#[derive(Debug, Clone, PartialEq)]
pub struct BatchedHits {
    pub hits: Vec<SearchHit>,
    /// Whether the expected number of hits was retrieved
    pub complete: bool,
    /// Set when the result window cut retrieval short
    pub partial: Option<PartialRetrieval>,
}

impl BatchedHits {
    fn new(hits: Vec<SearchHit>, expected: usize, partial: Option<PartialRetrieval>) -> Self {
        let complete = hits.len() == expected;
        Self {
            hits,
            complete,
            partial,
        }
    }
}

/// Source of pages for the batched retrieval engine
#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// Fetch up to `size` hits starting at offset `from`
    async fn fetch_page(&self, from: usize, size: usize) -> Result<Vec<SearchHit>>;
}

/// Pages one search request through a [`SearchBackend`]
pub struct SearchPageFetcher<'a> {
    backend: &'a dyn SearchBackend,
    request: SearchRequest,
}

impl<'a> SearchPageFetcher<'a> {
    pub fn new(backend: &'a dyn SearchBackend, request: SearchRequest) -> Self {
        Self { backend, request }
    }
}

#[async_trait]
impl PageFetcher for SearchPageFetcher<'_> {
    async fn fetch_page(&self, from: usize, size: usize) -> Result<Vec<SearchHit>> {
        let mut request = self.request.clone().with_from(from);
        request.size = size;
        let response = self.backend.search(&request).await?;
        Ok(response.into_hits())
    }
}

/// Retrieve `plan.expected_size` hits, one page at a time
///
/// Stops when the expected count is reached, when a page comes back shorter
/// than requested, or when the result window is exhausted. Only the last case
/// sets [`BatchedHits::partial`]. A failing page aborts the whole retrieval and
/// drops the hits gathered so far.
pub async fn fetch_batched(plan: &BatchPlan, fetcher: &dyn PageFetcher) -> Result<BatchedHits> {
    let expected = plan.expected_size;
    let ceiling = plan.page_size_ceiling;
    if ceiling == 0 {
        return Err(Error::invalid_input(
            "page size ceiling must be greater than 0".to_string(),
        ));
    }
    if expected == 0 {
        return Ok(BatchedHits::new(Vec::new(), 0, None));
    }

    let window = plan.max_result_window.unwrap_or(usize::MAX);

    if expected <= ceiling && expected <= window {
        debug!("Fetching {expected} hits in a single request");
        let mut hits = fetcher.fetch_page(0, expected).await?;
        hits.truncate(expected);
        return Ok(BatchedHits::new(hits, expected, None));
    }

    info!(
        "Fetching {expected} hits in pages of at most {ceiling} (window: {})",
        plan.max_result_window
            .map(|w| w.to_string())
            .unwrap_or_else(|| "unbounded".to_string())
    );

    let mut hits: Vec<SearchHit> = Vec::new();
    let mut from = 0;
    let mut partial = None;

    while from < expected {
        if from >= window {
            warn!(
                "Result window of {window} reached after {from} of {expected} hits, returning partial results"
            );
            partial = Some(PartialRetrieval {
                retrieved: from,
                expected,
            });
            break;
        }

        let size = ceiling.min(expected - from).min(window - from);
        debug!("Fetching page from={from} size={size}");
        let mut page = fetcher.fetch_page(from, size).await?;
        page.truncate(size);

        let returned = page.len();
        hits.extend(page);
        from += returned;

        if returned < size {
            debug!("Short page ({returned} of {size}), no more data");
            break;
        }
    }

    Ok(BatchedHits::new(hits, expected, partial))
}
