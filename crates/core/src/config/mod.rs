//! Configuration module for the relevance workbench
//!
//! This module provides configuration structures and loading mechanisms.
//! Configuration can be loaded from TOML files and/or environment variables.

mod defaults;
mod loading;


use crate::error::{Error, Result, ResultExt};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub use defaults::{DEFAULT_MAX_RESULT_WINDOW, DEFAULT_PAGE_SIZE_CEILING};

use defaults::*;

/// Returns the path to the global configuration file
///
/// The global config is stored at `~/.relevance/config.toml`.
pub fn global_config_path() -> Result<PathBuf> {
    let home_dir = dirs::home_dir()
        .ok_or_else(|| Error::config("Unable to determine home directory".to_string()))?;
    Ok(home_dir.join(".relevance").join("config.toml"))
}

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Search backend connection
    #[serde(default)]
    pub backend: BackendConfig,

    /// Index names read by the results pipeline
    #[serde(default)]
    pub indices: IndicesConfig,

    /// Batched retrieval tuning
    #[serde(default)]
    pub retrieval: RetrievalConfig,
}

/// Connection settings for the search backend
#[derive(Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Base URL of the OpenSearch-compatible endpoint
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Basic auth username
    #[serde(default)]
    pub username: Option<String>,

    /// Basic auth password (or use OPENSEARCH_PASSWORD env var)
    #[serde(default)]
    pub password: Option<String>,

    /// Request timeout in seconds, applied by the HTTP client
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl std::fmt::Debug for BackendConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendConfig")
            .field("base_url", &self.base_url)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "***REDACTED***"))
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

/// Index names holding the backend's records
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndicesConfig {
    #[serde(default = "default_experiment_index")]
    pub experiments: String,

    #[serde(default = "default_evaluation_result_index")]
    pub evaluation_results: String,

    #[serde(default = "default_query_set_index")]
    pub query_sets: String,

    #[serde(default = "default_scheduled_job_index")]
    pub scheduled_jobs: String,
}

/// Settings for the batched retrieval engine
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// Largest page the backend serves in one request
    #[serde(default = "default_page_size_ceiling")]
    pub page_size_ceiling: usize,

    /// Maximum `from + size` the backend accepts; `None` means unbounded
    #[serde(default = "default_max_result_window")]
    pub max_result_window: Option<usize>,

    /// Evaluation records produced per query by a hybrid optimizer experiment
    #[serde(default = "default_hybrid_variants_per_query")]
    pub hybrid_variants_per_query: usize,

    /// Number of experiments fetched when listing
    #[serde(default = "default_experiment_list_limit")]
    pub experiment_list_limit: usize,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            username: None,
            password: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl Default for IndicesConfig {
    fn default() -> Self {
        Self {
            experiments: default_experiment_index(),
            evaluation_results: default_evaluation_result_index(),
            query_sets: default_query_set_index(),
            scheduled_jobs: default_scheduled_job_index(),
        }
    }
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            page_size_ceiling: default_page_size_ceiling(),
            max_result_window: default_max_result_window(),
            hybrid_variants_per_query: default_hybrid_variants_per_query(),
            experiment_list_limit: default_experiment_list_limit(),
        }
    }
}

impl Config {
    /// Validates the configuration
    pub fn validate(&self) -> Result<()> {
        let base_url = self.backend.base_url.as_str();
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(Error::config(format!(
                "Invalid backend.base_url '{base_url}'. Must start with http:// or https://"
            )));
        }

        if self.backend.timeout_secs == 0 {
            return Err(Error::config(
                "backend.timeout_secs must be greater than 0".to_string(),
            ));
        }
        if self.backend.timeout_secs > 600 {
            return Err(Error::config(format!(
                "backend.timeout_secs too large (max 600, got {})",
                self.backend.timeout_secs
            )));
        }

        if self.backend.password.is_some() && self.backend.username.is_none() {
            return Err(Error::config(
                "backend.password is set but backend.username is missing".to_string(),
            ));
        }

        let indices = [
            ("indices.experiments", &self.indices.experiments),
            ("indices.evaluation_results", &self.indices.evaluation_results),
            ("indices.query_sets", &self.indices.query_sets),
            ("indices.scheduled_jobs", &self.indices.scheduled_jobs),
        ];
        for (key, name) in indices {
            if name.trim().is_empty() {
                return Err(Error::config(format!("{key} must not be empty")));
            }
        }

        if self.retrieval.page_size_ceiling == 0 {
            return Err(Error::config(
                "retrieval.page_size_ceiling must be greater than 0".to_string(),
            ));
        }
        if self.retrieval.page_size_ceiling > 100_000 {
            return Err(Error::config(format!(
                "retrieval.page_size_ceiling too large (max 100000, got {})",
                self.retrieval.page_size_ceiling
            )));
        }
        if self.retrieval.max_result_window == Some(0) {
            return Err(Error::config(
                "retrieval.max_result_window must be greater than 0 when set".to_string(),
            ));
        }
        if self.retrieval.hybrid_variants_per_query == 0 {
            return Err(Error::config(
                "retrieval.hybrid_variants_per_query must be greater than 0".to_string(),
            ));
        }
        if self.retrieval.experiment_list_limit == 0 {
            return Err(Error::config(
                "retrieval.experiment_list_limit must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    /// Saves the configuration to a TOML file
    pub fn save(&self, path: &std::path::Path) -> Result<()> {
        let toml_string = toml::to_string_pretty(self)
            .map_err(|e| Error::config(format!("Failed to serialize config: {e}")))?;

        std::fs::write(path, toml_string)
            .context(format!("Failed to write config file {}", path.display()))?;

        Ok(())
    }
}
