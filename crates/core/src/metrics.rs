//! Metric extraction and summary statistics
//!
//! Metrics arrive as a list of `{metric, value}` pairs per record. They are
//! flattened into one map per query, and a collection of such maps can be
//! averaged per metric name.

use crate::entities::{MetricMap, QueryEvaluation};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Metric value as found on the wire
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetricValue {
    Number(f64),
    Text(String),
}

impl MetricValue {
    /// Numeric value, parsing numeric-looking text. Non-finite values are rejected.
    pub fn as_f64(&self) -> Option<f64> {
        let value = match self {
            Self::Number(n) => *n,
            Self::Text(s) => s.trim().parse::<f64>().ok()?,
        };
        value.is_finite().then_some(value)
    }
}

/// One `{metric, value}` pair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricEntry {
    pub metric: String,
    pub value: MetricValue,
}

impl MetricEntry {
    pub fn new(metric: impl Into<String>, value: MetricValue) -> Self {
        Self {
            metric: metric.into(),
            value,
        }
    }
}

/// Flatten a record's metric list into a map keyed by metric name
///
/// A name that appears twice keeps its later value.
pub fn extract_metrics<'a, I>(entries: I) -> BTreeMap<String, MetricValue>
where
    I: IntoIterator<Item = &'a MetricEntry>,
{
    entries
        .into_iter()
        .map(|entry| (entry.metric.clone(), entry.value.clone()))
        .collect()
}

/// Arithmetic mean of `key` over the maps that contain it
///
/// Returns `None` when no map has the key, including for an empty collection.
pub fn summarize(collection: &[MetricMap], key: &str) -> Option<f64> {
    let (sum, count) = collection
        .iter()
        .filter_map(|metrics| metrics.get(key))
        .fold((0.0_f64, 0_usize), |(sum, count), value| {
            (sum + value, count + 1)
        });

    (count > 0).then(|| sum / count as f64)
}

/// Mean of every metric name present anywhere in the collection
pub fn summarize_all(collection: &[MetricMap]) -> MetricMap {
    let names: std::collections::BTreeSet<&str> = collection
        .iter()
        .flat_map(|metrics| metrics.keys().map(String::as_str))
        .collect();

    names
        .into_iter()
        .filter_map(|name| summarize(collection, name).map(|mean| (name.to_string(), mean)))
        .collect()
}

/// Per-variant metric means of a hybrid optimizer run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VariantSummary {
    /// `None` groups records that carry no variant id
    pub variant_id: Option<String>,
    pub query_count: usize,
    pub metrics: MetricMap,
}

/// Group evaluations by variant and average each group's metrics
///
/// Groups are returned in order of first appearance.
pub fn summarize_by_variant(evaluations: &[QueryEvaluation]) -> Vec<VariantSummary> {
    let mut order: Vec<Option<&str>> = Vec::new();
    let mut groups: BTreeMap<Option<&str>, Vec<MetricMap>> = BTreeMap::new();

    for evaluation in evaluations {
        let key = evaluation.variant_id.as_deref();
        let group = groups.entry(key).or_insert_with(|| {
            order.push(key);
            Vec::new()
        });
        group.push(evaluation.metrics.clone());
    }

    order
        .into_iter()
        .filter_map(|key| {
            let collection = groups.remove(&key)?;
            Some(VariantSummary {
                variant_id: key.map(str::to_string),
                query_count: collection.len(),
                metrics: summarize_all(&collection),
            })
        })
        .collect()
}

/// Variant with the highest mean for `metric`; variants lacking it are skipped
pub fn best_variant<'a>(summaries: &'a [VariantSummary], metric: &str) -> Option<&'a VariantSummary> {
    summaries
        .iter()
        .filter_map(|summary| summary.metrics.get(metric).map(|value| (summary, *value)))
        .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal))
        .map(|(summary, _)| summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn metrics(pairs: &[(&str, f64)]) -> MetricMap {
        pairs
            .iter()
            .map(|(name, value)| (name.to_string(), *value))
            .collect()
    }

    fn evaluation(variant: Option<&str>, pairs: &[(&str, f64)]) -> QueryEvaluation {
        QueryEvaluation {
            query_text: "q".to_string(),
            document_ids: Vec::new(),
            metrics: metrics(pairs),
            search_configuration_id: None,
            variant_id: variant.map(str::to_string),
        }
    }

    #[test]
    fn test_extract_metrics_last_write_wins() {
        let entries = vec![
            MetricEntry::new("ndcg@10", MetricValue::Number(0.4)),
            MetricEntry::new("precision@10", MetricValue::Text("0.7".to_string())),
            MetricEntry::new("ndcg@10", MetricValue::Number(0.6)),
        ];

        let extracted = extract_metrics(&entries);
        assert_eq!(extracted.len(), 2);
        assert_eq!(extracted["ndcg@10"], MetricValue::Number(0.6));
        assert_eq!(extracted["precision@10"].as_f64(), Some(0.7));
    }

    #[test]
    fn test_metric_value_coercion() {
        assert_eq!(MetricValue::Text(" 1.5 ".to_string()).as_f64(), Some(1.5));
        assert_eq!(MetricValue::Text("n/a".to_string()).as_f64(), None);
        assert_eq!(MetricValue::Text("NaN".to_string()).as_f64(), None);
        assert_eq!(MetricValue::Number(2.0).as_f64(), Some(2.0));
    }

    #[test]
    fn test_summarize_mean() {
        let collection = vec![metrics(&[("ndcg", 0.8)]), metrics(&[("ndcg", 0.9)])];
        let mean = summarize(&collection, "ndcg").unwrap();
        assert!((mean - 0.85).abs() < 1e-12);
    }

    #[test]
    fn test_summarize_skips_records_without_key() {
        let collection = vec![
            MetricMap::new(),
            metrics(&[("map", 0.2)]),
            metrics(&[("map", 0.4), ("ndcg", 1.0)]),
        ];
        let mean = summarize(&collection, "map").unwrap();
        assert!((mean - 0.3).abs() < 1e-12);
    }

    #[test]
    fn test_summarize_no_data() {
        assert_eq!(summarize(&[MetricMap::new()], "ndcg"), None);
        assert_eq!(summarize(&[], "ndcg"), None);
    }

    #[test]
    fn test_summarize_all() {
        let collection = vec![
            metrics(&[("ndcg", 0.5), ("map", 1.0)]),
            metrics(&[("ndcg", 0.7)]),
        ];
        let summary = summarize_all(&collection);
        assert_eq!(summary.len(), 2);
        assert!((summary["ndcg"] - 0.6).abs() < 1e-12);
        assert_eq!(summary["map"], 1.0);
    }

    #[test]
    fn test_summarize_by_variant_keeps_first_appearance_order() {
        let evaluations = vec![
            evaluation(Some("v2"), &[("ndcg", 0.2)]),
            evaluation(Some("v1"), &[("ndcg", 0.9)]),
            evaluation(Some("v2"), &[("ndcg", 0.4)]),
            evaluation(None, &[("ndcg", 0.5)]),
        ];

        let summaries = summarize_by_variant(&evaluations);
        let ids: Vec<Option<&str>> = summaries.iter().map(|s| s.variant_id.as_deref()).collect();
        assert_eq!(ids, vec![Some("v2"), Some("v1"), None]);
        assert_eq!(summaries[0].query_count, 2);
        assert!((summaries[0].metrics["ndcg"] - 0.3).abs() < 1e-12);

        let best = best_variant(&summaries, "ndcg").unwrap();
        assert_eq!(best.variant_id.as_deref(), Some("v1"));
        assert!(best_variant(&summaries, "map").is_none());
    }
}
