//! In-memory search backend for tests and offline runs

use crate::SearchBackend;
use async_trait::async_trait;
use relevance_core::error::{Error, Result};
use relevance_core::record::{
    HitsEnvelope, SearchHit, SearchRequest, SearchResponse, TotalHits,
};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Mutex;

/// Backend serving hits from memory
///
/// Understands `match_all`, single-field `term` and `ids` queries, honours
/// `from`/`size`, and records every request it receives.
#[derive(Default)]
pub struct InMemoryBackend {
    indices: HashMap<String, Vec<SearchHit>>,
    requests: Mutex<Vec<SearchRequest>>,
    fail_on_request: Option<usize>,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a document to `index`
    pub fn with_hit(mut self, index: &str, hit: SearchHit) -> Self {
        self.indices.entry(index.to_string()).or_default().push(hit);
        self
    }

    /// Add many documents to `index`
    pub fn with_hits(mut self, index: &str, hits: impl IntoIterator<Item = SearchHit>) -> Self {
        self.indices.entry(index.to_string()).or_default().extend(hits);
        self
    }

    /// Fail the n-th request (0-based) with a transport error
    pub fn failing_on_request(mut self, n: usize) -> Self {
        self.fail_on_request = Some(n);
        self
    }

    /// Every request received so far, in order
    pub fn requests(&self) -> Vec<SearchRequest> {
        self.requests
            .lock()
            .map(|requests| requests.clone())
            .unwrap_or_default()
    }

    fn matches(query: &Value, hit: &SearchHit) -> bool {
        if let Some(term) = query.get("term").and_then(Value::as_object) {
            return term
                .iter()
                .all(|(field, expected)| hit.source.get(field) == Some(expected));
        }
        if let Some(values) = query.pointer("/ids/values").and_then(Value::as_array) {
            return values.iter().any(|id| id.as_str() == Some(hit.id.as_str()));
        }
        true
    }
}

#[async_trait]
impl SearchBackend for InMemoryBackend {
    async fn search(&self, request: &SearchRequest) -> Result<SearchResponse> {
        let position = {
            let mut requests = self
                .requests
                .lock()
                .map_err(|e| Error::transport(format!("request log poisoned: {e}")))?;
            requests.push(request.clone());
            requests.len() - 1
        };
        if self.fail_on_request == Some(position) {
            return Err(Error::transport(format!(
                "simulated failure on request {position}"
            )));
        }

        let Some(documents) = self.indices.get(&request.index) else {
            return Err(Error::transport(format!(
                "Search backend returned 404: no such index [{}]",
                request.index
            )));
        };

        let matching: Vec<&SearchHit> = documents
            .iter()
            .filter(|hit| Self::matches(&request.query, hit))
            .collect();
        let total = matching.len() as u64;
        let hits = matching
            .into_iter()
            .skip(request.from.unwrap_or(0))
            .take(request.size)
            .cloned()
            .collect();

        Ok(SearchResponse {
            hits: HitsEnvelope {
                hits,
                total: Some(TotalHits::Object { value: total }),
            },
        })
    }
}
