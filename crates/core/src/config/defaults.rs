//! Default values and functions for configuration

// Default constants
pub(crate) const DEFAULT_BASE_URL: &str = "http://localhost:9200";
pub(crate) const DEFAULT_EXPERIMENT_INDEX: &str = "search-relevance-experiment";
pub(crate) const DEFAULT_EVALUATION_RESULT_INDEX: &str = "search-relevance-evaluation-result";
pub(crate) const DEFAULT_QUERY_SET_INDEX: &str = "search-relevance-queryset";
pub(crate) const DEFAULT_SCHEDULED_JOB_INDEX: &str = ".search-relevance-scheduled-experiment-jobs";

/// Largest `size` a single search request may ask for
pub const DEFAULT_PAGE_SIZE_CEILING: usize = 10_000;

/// Largest `from + size` the backend serves (`index.max_result_window`)
pub const DEFAULT_MAX_RESULT_WINDOW: usize = 10_000;

pub(crate) fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

pub(crate) fn default_timeout_secs() -> u64 {
    30
}

pub(crate) fn default_experiment_index() -> String {
    DEFAULT_EXPERIMENT_INDEX.to_string()
}

pub(crate) fn default_evaluation_result_index() -> String {
    DEFAULT_EVALUATION_RESULT_INDEX.to_string()
}

pub(crate) fn default_query_set_index() -> String {
    DEFAULT_QUERY_SET_INDEX.to_string()
}

pub(crate) fn default_scheduled_job_index() -> String {
    DEFAULT_SCHEDULED_JOB_INDEX.to_string()
}

pub(crate) fn default_page_size_ceiling() -> usize {
    DEFAULT_PAGE_SIZE_CEILING
}

pub(crate) fn default_max_result_window() -> Option<usize> {
    Some(DEFAULT_MAX_RESULT_WINDOW)
}

pub(crate) fn default_hybrid_variants_per_query() -> usize {
    // normalization x combination x weight grid generated by the backend
    66
}

pub(crate) fn default_experiment_list_limit() -> usize {
    100
}
