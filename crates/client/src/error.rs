//! Error types for talking to the search backend

use thiserror::Error;

/// Errors that can occur while issuing a search request
#[derive(Error, Debug)]
pub enum ClientError {
    /// The HTTP client could not be built
    #[error("Failed to create HTTP client: {0}")]
    Setup(String),

    /// The request never produced a response
    #[error("Search request failed ({kind}): {message}")]
    Request { kind: &'static str, message: String },

    /// The backend answered with a non-2xx status
    #[error("Search backend returned {status}: {body}")]
    Status { status: u16, body: String },

    /// The response body was not a search response
    #[error("Failed to decode search response: {0}")]
    Decode(String),
}

impl ClientError {
    /// Classify a reqwest failure by what went wrong
    pub(crate) fn from_reqwest(err: &reqwest::Error) -> Self {
        let kind = if err.is_timeout() {
            "timeout"
        } else if err.is_connect() {
            "connection"
        } else if err.is_request() {
            "request build"
        } else if err.is_body() {
            "body"
        } else {
            "unknown"
        };
        Self::Request {
            kind,
            message: err.to_string(),
        }
    }
}

impl From<ClientError> for relevance_core::Error {
    fn from(err: ClientError) -> Self {
        match err {
            ClientError::Setup(msg) => relevance_core::Error::config(msg),
            other => relevance_core::Error::transport(other.to_string()),
        }
    }
}
