//! OpenSearch-compatible HTTP backend

use crate::error::ClientError;
use crate::SearchBackend;
use async_trait::async_trait;
use relevance_core::config::BackendConfig;
use relevance_core::error::Result;
use relevance_core::record::{SearchRequest, SearchResponse};
use reqwest::Client;
use tracing::{debug, info, warn};

/// Basic auth credentials
#[derive(Clone)]
struct Credentials {
    username: String,
    password: Option<String>,
}

/// HTTP backend issuing `POST {base_url}/{index}/_search`
pub struct OpenSearchBackend {
    client: Client,
    base_url: String,
    credentials: Option<Credentials>,
}

impl OpenSearchBackend {
    /// Create a new backend
    ///
    /// The request timeout is enforced by the HTTP client; a timed out request
    /// surfaces as an ordinary transport error.
    pub fn new(config: &BackendConfig) -> Result<Self> {
        info!("Initializing OpenSearch backend");
        info!("  Base URL: {}", config.base_url);
        info!("  Timeout: {}s", config.timeout_secs);

        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ClientError::Setup(e.to_string()))?;

        let credentials = config.username.clone().map(|username| Credentials {
            username,
            password: config.password.clone(),
        });

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            credentials,
        })
    }

    fn search_url(&self, index: &str) -> String {
        format!("{}/{}/_search", self.base_url, index)
    }
}

#[async_trait]
impl SearchBackend for OpenSearchBackend {
    async fn search(&self, request: &SearchRequest) -> Result<SearchResponse> {
        let url = self.search_url(&request.index);
        debug!(
            "POST {url} from={} size={}",
            request.from.unwrap_or(0),
            request.size
        );

        let mut builder = self.client.post(&url).json(request);
        if let Some(credentials) = &self.credentials {
            builder = builder.basic_auth(&credentials.username, credentials.password.as_ref());
        }

        let response = builder.send().await.map_err(|e| {
            let err = ClientError::from_reqwest(&e);
            warn!("Search on {} failed: {err}", request.index);
            err
        })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unable to read error response".to_string());
            warn!("Search on {} returned {status}: {body}", request.index);
            return Err(ClientError::Status {
                status: status.as_u16(),
                body,
            }
            .into());
        }

        let decoded: SearchResponse = response
            .json()
            .await
            .map_err(|e| ClientError::Decode(e.to_string()))?;

        Ok(decoded)
    }
}
