//! Configuration loading from files and environment variables

use crate::error::{Error, Result};
use config::{Config as ConfigLib, ConfigBuilder as LibConfigBuilder, Environment, File};
use std::path::Path;

use super::defaults::*;
use super::{global_config_path, Config};

/// Helper to set a config default with consistent error mapping
fn set_config_default<T: Into<config::Value>>(
    builder: LibConfigBuilder<config::builder::DefaultState>,
    key: &str,
    value: T,
) -> Result<LibConfigBuilder<config::builder::DefaultState>> {
    builder
        .set_default(key, value)
        .map_err(|e| Error::config(format!("Failed to set {key} default: {e}")))
}

impl Config {
    /// Loads configuration from a TOML file with environment variable overrides
    ///
    /// Environment variables are prefixed with `RELEVANCE_` and use double underscores
    /// for nested values. For example:
    /// - `RELEVANCE_BACKEND__BASE_URL=https://search.internal:9200`
    /// - `RELEVANCE_RETRIEVAL__MAX_RESULT_WINDOW=10000`
    pub fn from_file(path: &Path) -> Result<Self> {
        let builder = ConfigLib::builder();

        let builder = set_config_default(builder, "backend.base_url", default_base_url())?;
        let builder = set_config_default(
            builder,
            "backend.timeout_secs",
            default_timeout_secs() as i64,
        )?;
        let builder = set_config_default(
            builder,
            "retrieval.page_size_ceiling",
            default_page_size_ceiling() as i64,
        )?;
        let builder = set_config_default(
            builder,
            "retrieval.hybrid_variants_per_query",
            default_hybrid_variants_per_query() as i64,
        )?;
        let builder = set_config_default(
            builder,
            "retrieval.experiment_list_limit",
            default_experiment_list_limit() as i64,
        )?;
        let mut builder = set_config_default(
            builder,
            "retrieval.max_result_window",
            DEFAULT_MAX_RESULT_WINDOW as i64,
        )?;

        // Add the config file if it exists
        if path.exists() {
            builder = builder.add_source(File::from(path));
        }

        builder = builder.add_source(
            Environment::with_prefix("RELEVANCE")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        // Conventional OpenSearch client variables
        if let Ok(url) = std::env::var("OPENSEARCH_URL") {
            builder = builder
                .set_override("backend.base_url", url)
                .map_err(|e| Error::config(format!("Failed to set OPENSEARCH_URL: {e}")))?;
        }
        if let Ok(user) = std::env::var("OPENSEARCH_USERNAME") {
            builder = builder
                .set_override("backend.username", user)
                .map_err(|e| Error::config(format!("Failed to set OPENSEARCH_USERNAME: {e}")))?;
        }
        if let Ok(password) = std::env::var("OPENSEARCH_PASSWORD") {
            builder = builder
                .set_override("backend.password", password)
                .map_err(|e| Error::config(format!("Failed to set OPENSEARCH_PASSWORD: {e}")))?;
        }

        let config = builder
            .build()
            .map_err(|e| Error::config(format!("Failed to build config: {e}")))?;

        config
            .try_deserialize()
            .map_err(|e| Error::config(format!("Failed to deserialize config: {e}")))
    }

    /// Creates a config from a TOML string (useful for testing)
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::config(format!("Failed to parse TOML: {e}")))
    }

    /// Load configuration
    ///
    /// Precedence (lowest to highest):
    /// 1. Hardcoded defaults
    /// 2. Config file (~/.relevance/config.toml or custom --config path)
    /// 3. Environment variables (RELEVANCE_*, OPENSEARCH_*)
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        let path = match config_path {
            Some(p) => p.to_path_buf(),
            None => global_config_path()?,
        };
        Self::from_file(&path)
    }
}
