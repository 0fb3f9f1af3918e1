//! Wire shapes of the search endpoint
//!
//! Everything here is loosely typed on purpose. A [`RawRecord`] has no
//! guarantees and must go through [`crate::parse`] before use.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Untyped key/value document as stored by the backend
pub type RawRecord = serde_json::Map<String, Value>;

/// One hit of a search response
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SearchHit {
    #[serde(rename = "_id", alias = "id", default)]
    pub id: String,

    #[serde(rename = "_source", alias = "source", default)]
    pub source: RawRecord,
}

impl SearchHit {
    pub fn new(id: impl Into<String>, source: RawRecord) -> Self {
        Self {
            id: id.into(),
            source,
        }
    }
}

/// Total hit count; older backends report a bare number
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TotalHits {
    Count(u64),
    Object { value: u64 },
}

impl TotalHits {
    pub fn value(&self) -> u64 {
        match self {
            Self::Count(value) | Self::Object { value } => *value,
        }
    }
}

/// The `hits` envelope of a search response
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct HitsEnvelope {
    #[serde(default)]
    pub hits: Vec<SearchHit>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total: Option<TotalHits>,
}

/// Search response as returned by `POST /{index}/_search`
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SearchResponse {
    #[serde(default)]
    pub hits: HitsEnvelope,
}

impl SearchResponse {
    /// Consume the response, keeping only the hits
    pub fn into_hits(self) -> Vec<SearchHit> {
        self.hits.hits
    }

    pub fn total(&self) -> Option<u64> {
        self.hits.total.map(|t| t.value())
    }
}

/// A search request against one index
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchRequest {
    /// Target index; sent in the URL path, not the body
    #[serde(skip)]
    pub index: String,

    pub query: Value,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub from: Option<usize>,

    pub size: usize,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub sort: Option<Value>,
}

impl SearchRequest {
    /// Request matching every document of `index`
    pub fn match_all(index: impl Into<String>, size: usize) -> Self {
        Self::new(index, serde_json::json!({ "match_all": {} }), size)
    }

    /// Request matching documents whose `field` equals `value`
    pub fn term(
        index: impl Into<String>,
        field: &str,
        value: impl Into<Value>,
        size: usize,
    ) -> Self {
        let mut term = serde_json::Map::new();
        term.insert(field.to_string(), value.into());
        Self::new(index, serde_json::json!({ "term": term }), size)
    }

    /// Request for a single document by id
    pub fn by_id(index: impl Into<String>, id: &str) -> Self {
        Self::new(index, serde_json::json!({ "ids": { "values": [id] } }), 1)
    }

    pub fn new(index: impl Into<String>, query: Value, size: usize) -> Self {
        Self {
            index: index.into(),
            query,
            from: None,
            size,
            sort: None,
        }
    }

    pub fn with_from(mut self, from: usize) -> Self {
        self.from = Some(from);
        self
    }

    pub fn with_sort(mut self, sort: Value) -> Self {
        self.sort = Some(sort);
        self
    }
}
