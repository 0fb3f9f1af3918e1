//! Plain-text rendering of reports for the terminal

use relevance_client::{EvaluationResults, ExperimentReport, ExperimentResults, PairwiseResults};
use relevance_core::{best_variant, Experiment, FieldError, MetricMap};
use std::fmt::Write;

/// Metric used to rank hybrid optimizer variants
const RANKING_METRIC: &str = "NDCG@10";

pub fn report(report: &ExperimentReport) -> String {
    let mut out = String::new();
    let experiment = &report.experiment;

    let _ = writeln!(out, "Experiment {}", experiment.id);
    let _ = writeln!(out, "  Type:      {}", experiment.experiment_type);
    let _ = writeln!(out, "  Status:    {}", experiment.status);
    let _ = writeln!(
        out,
        "  Query set: {} ({} queries)",
        report.query_set.name.as_deref().unwrap_or(&report.query_set.id),
        report.query_set.size()
    );
    let _ = writeln!(
        out,
        "  Configs:   {}",
        experiment.search_configuration_ids.join(", ")
    );
    if let Some(judgment) = &experiment.judgment_id {
        let _ = writeln!(out, "  Judgments: {judgment}");
    }
    if let Some(job) = &report.scheduled_job {
        let _ = writeln!(
            out,
            "  Schedule:  {} ({}){}",
            job.cron.expression,
            job.cron.timezone,
            if job.enabled { "" } else { " [disabled]" }
        );
    }

    match &report.results {
        ExperimentResults::Evaluations(results) => evaluations(&mut out, results),
        ExperimentResults::Pairwise(results) => pairwise(&mut out, results),
    }
    out
}

fn evaluations(out: &mut String, results: &EvaluationResults) {
    let retrieval = &results.retrieval;
    let _ = writeln!(
        out,
        "\nEvaluation records: {} of {} expected",
        retrieval.retrieved, retrieval.expected
    );
    if let Some(partial) = &retrieval.partial {
        let _ = writeln!(
            out,
            "  Partial results: stopped at the result window after {} records",
            partial.retrieved
        );
    }
    if results.zero_results.should_warn {
        let _ = writeln!(
            out,
            "  Warning: {} queries have no evaluation record (zero search results?)",
            results.zero_results.missing
        );
    }

    metric_block(out, "Mean metrics", &results.summary);

    let named_variants = results.variants.iter().any(|v| v.variant_id.is_some());
    if named_variants {
        let _ = writeln!(out, "\nVariants: {}", results.variants.len());
        if let Some(best) = best_variant(&results.variants, RANKING_METRIC) {
            let _ = writeln!(
                out,
                "  Best by {RANKING_METRIC}: {} ({:.4}, {} queries)",
                best.variant_id.as_deref().unwrap_or("-"),
                best.metrics.get(RANKING_METRIC).copied().unwrap_or_default(),
                best.query_count
            );
        }
    }
}

fn pairwise(out: &mut String, results: &PairwiseResults) {
    let _ = writeln!(out, "\nCompared queries: {}", results.results.len());
    if results.zero_results.should_warn {
        let _ = writeln!(
            out,
            "  Warning: {} queries have no comparison",
            results.zero_results.missing
        );
    }
    metric_block(out, "Mean metrics", &results.summary);
}

fn metric_block(out: &mut String, title: &str, metrics: &MetricMap) {
    if metrics.is_empty() {
        let _ = writeln!(out, "\n{title}: none");
        return;
    }
    let _ = writeln!(out, "\n{title}:");
    let width = metrics.keys().map(String::len).max().unwrap_or(0);
    for (name, value) in metrics {
        let _ = writeln!(out, "  {name:<width$}  {value:.4}");
    }
}

pub fn experiment_table(experiments: &[Experiment]) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{:<24} {:<22} {:<11} {}",
        "ID", "TYPE", "STATUS", "TIMESTAMP"
    );
    for experiment in experiments {
        let _ = writeln!(
            out,
            "{:<24} {:<22} {:<11} {}",
            experiment.id,
            experiment.experiment_type.to_string(),
            experiment.status.to_string(),
            experiment.timestamp.as_deref().unwrap_or("-")
        );
    }
    out
}

pub fn field_errors(errors: &[FieldError]) -> String {
    let mut out = String::from("Invalid records:\n");
    for error in errors {
        let _ = writeln!(out, "  {error}");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use relevance_core::{ExperimentStatus, ExperimentType};

    fn experiment(id: &str) -> Experiment {
        Experiment {
            id: id.to_string(),
            experiment_type: ExperimentType::HybridOptimizer,
            status: ExperimentStatus::Completed,
            query_set_id: "qs-1".to_string(),
            search_configuration_ids: vec!["sc-1".to_string()],
            judgment_id: Some("j-1".to_string()),
            size: 10,
            is_scheduled: false,
            scheduled_job_id: None,
            timestamp: None,
        }
    }

    #[test]
    fn test_experiment_table() {
        let table = experiment_table(&[experiment("exp-1")]);
        let lines: Vec<&str> = table.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("ID"));
        assert!(lines[1].starts_with("exp-1"));
        assert!(lines[1].contains("HYBRID_OPTIMIZER"));
        assert!(lines[1].contains("COMPLETED"));
    }

    #[test]
    fn test_field_errors() {
        let errors = vec![FieldError::new("queryText", "required field is missing").in_record("r1")];
        assert_eq!(
            field_errors(&errors),
            "Invalid records:\n  [r1] queryText: required field is missing\n"
        );
    }

    #[test]
    fn test_metric_block_aligns_names() {
        let mut out = String::new();
        let metrics: MetricMap = [("MAP".to_string(), 0.5), ("NDCG@10".to_string(), 0.25)]
            .into_iter()
            .collect();
        metric_block(&mut out, "Mean metrics", &metrics);
        assert_eq!(
            out,
            "\nMean metrics:\n  MAP      0.5000\n  NDCG@10  0.2500\n"
        );
    }
}
