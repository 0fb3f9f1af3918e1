//! Experiment results pipeline
//!
//! Chains retrieval, parsing, combining, metric summaries and zero-result
//! detection for one experiment. Lookups are sequential awaits so the first
//! failure always aborts the whole load.

use crate::batch::{fetch_batched, BatchPlan, PartialRetrieval, SearchPageFetcher};
use crate::SearchBackend;
use relevance_core::config::Config;
use relevance_core::entities::{
    Experiment, ExperimentType, MetricMap, PairwiseResult, QueryEvaluation, QuerySet, ScheduledJob,
};
use relevance_core::error::{Error, Result};
use relevance_core::metrics::{summarize_all, summarize_by_variant, VariantSummary};
use relevance_core::outcome::ParseOutcome;
use relevance_core::parse::{parse_hit, parse_hits, parse_pairwise_results, FromRawRecord};
use relevance_core::record::{SearchHit, SearchRequest};
use relevance_core::zero_results::{detect_zero_results, ZeroResultReport};
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Result of a load whose caller may have gone away
#[derive(Debug, Clone, PartialEq)]
pub enum Delivery<T> {
    Ready(T),
    /// The caller was disposed before the load finished; nothing was delivered
    Disposed,
}

impl<T> Delivery<T> {
    pub fn ready(self) -> Option<T> {
        match self {
            Self::Ready(value) => Some(value),
            Self::Disposed => None,
        }
    }

    pub fn is_disposed(&self) -> bool {
        matches!(self, Self::Disposed)
    }
}

/// How complete the evaluation retrieval was
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RetrievalStatus {
    pub expected: usize,
    pub retrieved: usize,
    pub complete: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub partial: Option<PartialRetrieval>,
}

/// Evaluation records of a pointwise or hybrid experiment
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EvaluationResults {
    pub evaluations: Vec<QueryEvaluation>,
    /// Mean of every metric across all records
    pub summary: MetricMap,
    /// Per-variant means; a single `None` group for pointwise runs
    pub variants: Vec<VariantSummary>,
    pub retrieval: RetrievalStatus,
    /// Counted against the records reachable within the result window
    pub zero_results: ZeroResultReport,
}

/// Side-by-side results of a pairwise comparison
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PairwiseResults {
    pub results: Vec<PairwiseResult>,
    pub summary: MetricMap,
    pub zero_results: ZeroResultReport,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ExperimentResults {
    Evaluations(EvaluationResults),
    Pairwise(PairwiseResults),
}

/// Everything needed to render one experiment
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExperimentReport {
    pub experiment: Experiment,
    pub query_set: QuerySet,
    pub results: ExperimentResults,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scheduled_job: Option<ScheduledJob>,
}

/// Loads experiments and their results from a [`SearchBackend`]
pub struct ExperimentResultsLoader {
    backend: Arc<dyn SearchBackend>,
    config: Config,
}

impl ExperimentResultsLoader {
    pub fn new(backend: Arc<dyn SearchBackend>, config: Config) -> Self {
        Self { backend, config }
    }

    /// Load the full report of one experiment
    ///
    /// Transport failures are errors. Malformed records come back as a
    /// [`ParseOutcome::Failure`] listing every violation found up to the first
    /// record shape that failed. If `liveness` is cancelled before the load
    /// completes, in-flight work is dropped and [`Delivery::Disposed`] returned.
    pub async fn load_report(
        &self,
        experiment_id: &str,
        liveness: &CancellationToken,
    ) -> Result<Delivery<ParseOutcome<ExperimentReport>>> {
        self.deliver(liveness, self.build_report(experiment_id)).await
    }

    /// List the most recent experiments, newest first
    pub async fn list_experiments(
        &self,
        limit: Option<usize>,
        liveness: &CancellationToken,
    ) -> Result<Delivery<ParseOutcome<Vec<Experiment>>>> {
        let limit = limit.unwrap_or(self.config.retrieval.experiment_list_limit);
        self.deliver(liveness, self.fetch_experiments(limit)).await
    }

    async fn deliver<T>(
        &self,
        liveness: &CancellationToken,
        work: impl std::future::Future<Output = Result<T>>,
    ) -> Result<Delivery<T>> {
        if liveness.is_cancelled() {
            debug!("Caller already disposed, skipping load");
            return Ok(Delivery::Disposed);
        }

        tokio::select! {
            biased;
            _ = liveness.cancelled() => {
                debug!("Caller disposed during load, dropping result");
                Ok(Delivery::Disposed)
            }
            result = work => {
                let value = result?;
                if liveness.is_cancelled() {
                    debug!("Caller disposed before delivery, dropping result");
                    return Ok(Delivery::Disposed);
                }
                Ok(Delivery::Ready(value))
            }
        }
    }

    async fn fetch_experiments(&self, limit: usize) -> Result<ParseOutcome<Vec<Experiment>>> {
        let request = SearchRequest::match_all(&self.config.indices.experiments, limit)
            .with_sort(json!([{ "timestamp": { "order": "desc", "unmapped_type": "date" } }]));
        let hits = self.backend.search(&request).await?.into_hits();
        info!("Fetched {} experiments", hits.len());
        Ok(parse_hits(&hits))
    }

    async fn build_report(&self, experiment_id: &str) -> Result<ParseOutcome<ExperimentReport>> {
        let experiment_hit = self
            .fetch_one(&self.config.indices.experiments, experiment_id)
            .await?;
        let experiment = match parse_hit::<Experiment>(&experiment_hit) {
            ParseOutcome::Success { data } => data,
            ParseOutcome::Failure { errors } => return Ok(ParseOutcome::failure(errors)),
        };

        let query_set = match self
            .load_by_id::<QuerySet>(&self.config.indices.query_sets, &experiment.query_set_id)
            .await?
        {
            ParseOutcome::Success { data } => data,
            ParseOutcome::Failure { errors } => return Ok(ParseOutcome::failure(errors)),
        };

        let results = if experiment.experiment_type.produces_evaluations() {
            self.load_evaluations(&experiment, &query_set)
                .await?
                .map(ExperimentResults::Evaluations)
        } else {
            Self::pairwise_results(&experiment_hit, &query_set).map(ExperimentResults::Pairwise)
        };
        let results = match results {
            ParseOutcome::Success { data } => data,
            ParseOutcome::Failure { errors } => return Ok(ParseOutcome::failure(errors)),
        };

        let scheduled_job = match (experiment.is_scheduled, experiment.scheduled_job_id.as_deref()) {
            (true, Some(job_id)) => {
                match self
                    .load_by_id::<ScheduledJob>(&self.config.indices.scheduled_jobs, job_id)
                    .await?
                {
                    ParseOutcome::Success { data } => Some(data),
                    ParseOutcome::Failure { errors } => return Ok(ParseOutcome::failure(errors)),
                }
            }
            _ => None,
        };

        Ok(ParseOutcome::success(ExperimentReport {
            experiment,
            query_set,
            results,
            scheduled_job,
        }))
    }

    /// Number of evaluation records an experiment should have produced
    fn expected_evaluations(&self, experiment: &Experiment, query_set: &QuerySet) -> usize {
        let per_query = match experiment.experiment_type {
            ExperimentType::HybridOptimizer => self.config.retrieval.hybrid_variants_per_query,
            _ => experiment.search_configuration_ids.len().max(1),
        };
        query_set.size().saturating_mul(per_query)
    }

    async fn load_evaluations(
        &self,
        experiment: &Experiment,
        query_set: &QuerySet,
    ) -> Result<ParseOutcome<EvaluationResults>> {
        let expected = self.expected_evaluations(experiment, query_set);
        let retrieval = &self.config.retrieval;
        let plan = BatchPlan::new(expected, retrieval.page_size_ceiling)
            .with_max_result_window(retrieval.max_result_window);

        let request = SearchRequest::term(
            &self.config.indices.evaluation_results,
            "experimentId",
            experiment.id.as_str(),
            expected,
        )
        .with_sort(json!(["_doc"]));
        let fetcher = SearchPageFetcher::new(self.backend.as_ref(), request);
        let batch = fetch_batched(&plan, &fetcher).await?;

        if let Some(partial) = &batch.partial {
            warn!(
                "Experiment {}: retrieved {} of {} evaluation records before the result window",
                experiment.id, partial.retrieved, partial.expected
            );
        }

        let status = RetrievalStatus {
            expected,
            retrieved: batch.hits.len(),
            complete: batch.complete,
            partial: batch.partial,
        };

        // Records past the result window are unreachable, not zero-result queries
        let reachable = batch.partial.map_or(expected, |partial| partial.retrieved);

        Ok(parse_hits::<QueryEvaluation>(&batch.hits).map(|evaluations| {
            let zero_results = detect_zero_results(reachable, evaluations.len());
            if zero_results.should_warn {
                warn!(
                    "Experiment {}: {} of {} expected evaluation records missing (zero-result queries)",
                    experiment.id, zero_results.missing, reachable
                );
            }

            let collection: Vec<MetricMap> =
                evaluations.iter().map(|e| e.metrics.clone()).collect();
            EvaluationResults {
                summary: summarize_all(&collection),
                variants: summarize_by_variant(&evaluations),
                evaluations,
                retrieval: status,
                zero_results,
            }
        }))
    }

    fn pairwise_results(
        experiment_hit: &SearchHit,
        query_set: &QuerySet,
    ) -> ParseOutcome<PairwiseResults> {
        let outcome = parse_pairwise_results(&experiment_hit.source);
        let outcome = if experiment_hit.id.is_empty() {
            outcome
        } else {
            outcome.in_record(&experiment_hit.id)
        };

        outcome.map(|results| {
            let zero_results = detect_zero_results(query_set.size(), results.len());
            if zero_results.should_warn {
                warn!(
                    "Pairwise experiment {}: {} of {} queries have no comparison",
                    experiment_hit.id,
                    zero_results.missing,
                    query_set.size()
                );
            }
            let collection: Vec<MetricMap> = results.iter().map(|r| r.metrics.clone()).collect();
            PairwiseResults {
                summary: summarize_all(&collection),
                results,
                zero_results,
            }
        })
    }

    async fn fetch_one(&self, index: &str, id: &str) -> Result<SearchHit> {
        let response = self.backend.search(&SearchRequest::by_id(index, id)).await?;
        response
            .into_hits()
            .into_iter()
            .next()
            .ok_or_else(|| Error::not_found(format!("{id} not found in {index}")))
    }

    async fn load_by_id<T: FromRawRecord>(&self, index: &str, id: &str) -> Result<ParseOutcome<T>> {
        let hit = self.fetch_one(index, id).await?;
        debug!("Parsing {} {id}", T::SHAPE);
        Ok(parse_hit(&hit))
    }
}
