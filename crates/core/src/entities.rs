use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use strum::{Display, EnumString};

/// Metric name to value, for one query
pub type MetricMap = BTreeMap<String, f64>;

/// Kind of experiment run by the backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE", ascii_case_insensitive)]
pub enum ExperimentType {
    PairwiseComparison,
    PointwiseEvaluation,
    HybridOptimizer,
}

impl ExperimentType {
    /// Whether evaluation records are stored in the evaluation result index
    pub fn produces_evaluations(&self) -> bool {
        matches!(self, Self::PointwiseEvaluation | Self::HybridOptimizer)
    }
}

/// Execution state of an experiment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE", ascii_case_insensitive)]
pub enum ExperimentStatus {
    Processing,
    Completed,
    Error,
}

/// A stored experiment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Experiment {
    pub id: String,
    pub experiment_type: ExperimentType,
    pub status: ExperimentStatus,
    pub query_set_id: String,
    pub search_configuration_ids: Vec<String>,
    pub judgment_id: Option<String>,
    /// Number of queries evaluated per search configuration
    pub size: u64,
    pub is_scheduled: bool,
    pub scheduled_job_id: Option<String>,
    pub timestamp: Option<String>,
}

/// Computed metrics for one query (and, for hybrid runs, one variant)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryEvaluation {
    pub query_text: String,
    pub document_ids: Vec<String>,
    pub metrics: MetricMap,
    pub search_configuration_id: Option<String>,
    pub variant_id: Option<String>,
}

/// Ranked result list captured for one side of a pairwise comparison
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuerySnapshot {
    pub query_text: String,
    pub document_ids: Vec<String>,
    pub search_configuration_id: Option<String>,
}

/// One query of a pairwise comparison experiment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PairwiseResult {
    pub query_text: String,
    pub snapshots: Vec<QuerySnapshot>,
    pub metrics: MetricMap,
}

/// A named collection of queries
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuerySet {
    pub id: String,
    pub name: Option<String>,
    pub queries: Vec<String>,
}

impl QuerySet {
    pub fn size(&self) -> usize {
        self.queries.len()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CronSchedule {
    pub expression: String,
    pub timezone: String,
}

/// Job that re-runs an experiment on a cron schedule
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduledJob {
    pub id: String,
    pub enabled: bool,
    pub cron: CronSchedule,
    /// Epoch milliseconds
    pub enabled_time: Option<u64>,
    /// Epoch milliseconds
    pub last_update_time: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_experiment_type_tokens() {
        assert_eq!(
            ExperimentType::from_str("HYBRID_OPTIMIZER").unwrap(),
            ExperimentType::HybridOptimizer
        );
        assert_eq!(
            ExperimentType::from_str("pointwise_evaluation").unwrap(),
            ExperimentType::PointwiseEvaluation
        );
        assert!(ExperimentType::from_str("LISTWISE").is_err());
        assert_eq!(
            ExperimentType::PairwiseComparison.to_string(),
            "PAIRWISE_COMPARISON"
        );
    }

    #[test]
    fn test_produces_evaluations() {
        assert!(!ExperimentType::PairwiseComparison.produces_evaluations());
        assert!(ExperimentType::PointwiseEvaluation.produces_evaluations());
        assert!(ExperimentType::HybridOptimizer.produces_evaluations());
    }

    #[test]
    fn test_status_serde_matches_display() {
        let json = serde_json::to_value(ExperimentStatus::Completed).unwrap();
        assert_eq!(json, serde_json::json!("COMPLETED"));
        assert_eq!(ExperimentStatus::Completed.to_string(), "COMPLETED");
    }
}
