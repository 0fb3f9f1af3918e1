use async_trait::async_trait;
use pretty_assertions::assert_eq;
use relevance_client::mock::InMemoryBackend;
use relevance_client::{
    Delivery, ExperimentReport, ExperimentResults, ExperimentResultsLoader, PartialRetrieval,
    SearchBackend,
};
use relevance_core::config::Config;
use relevance_core::outcome::ParseOutcome;
use relevance_core::record::{RawRecord, SearchHit, SearchRequest, SearchResponse};
use relevance_core::ExperimentType;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

const EXPERIMENTS: &str = "search-relevance-experiment";
const RESULTS: &str = "search-relevance-evaluation-result";
const QUERY_SETS: &str = "search-relevance-queryset";
const JOBS: &str = ".search-relevance-scheduled-experiment-jobs";

fn hit(id: &str, source: Value) -> SearchHit {
    let source: RawRecord = match source {
        Value::Object(map) => map,
        _ => panic!("hit source must be an object"),
    };
    SearchHit::new(id, source)
}

fn query_set(id: &str, size: usize) -> SearchHit {
    let queries: Vec<Value> = (0..size)
        .map(|i| json!({ "queryText": format!("query {i}") }))
        .collect();
    hit(id, json!({ "id": id, "name": "sample", "querySetQueries": queries }))
}

fn pointwise_experiment(id: &str) -> SearchHit {
    hit(
        id,
        json!({
            "id": id,
            "type": "POINTWISE_EVALUATION",
            "status": "COMPLETED",
            "querySetId": "qs-1",
            "searchConfigurationList": ["sc-1"],
            "judgmentList": ["j-1"],
            "size": "10",
            "timestamp": "2025-01-10T12:00:00Z"
        }),
    )
}

fn evaluation(id: &str, experiment: &str, query: &str, ndcg: f64, variant: Option<&str>) -> SearchHit {
    let mut source = json!({
        "experimentId": experiment,
        "searchText": query,
        "documentIds": ["d1", "d2"],
        "metrics": [
            { "metric": "NDCG@10", "value": ndcg },
            { "metric": "Precision@10", "value": "0.5" }
        ]
    });
    if let Some(variant) = variant {
        source["experimentVariantId"] = json!(variant);
    }
    hit(id, source)
}

fn loader(backend: InMemoryBackend) -> (Arc<InMemoryBackend>, ExperimentResultsLoader) {
    let backend = Arc::new(backend);
    let loader = ExperimentResultsLoader::new(backend.clone(), Config::default());
    (backend, loader)
}

async fn report(loader: &ExperimentResultsLoader, id: &str) -> ParseOutcome<ExperimentReport> {
    loader
        .load_report(id, &CancellationToken::new())
        .await
        .unwrap()
        .ready()
        .unwrap()
}

#[tokio::test]
async fn test_pointwise_report_with_missing_queries() {
    let evaluations = (0..3).map(|i| {
        evaluation(
            &format!("r{i}"),
            "exp-1",
            &format!("query {i}"),
            0.8 + 0.05 * i as f64,
            None,
        )
    });
    let backend = InMemoryBackend::new()
        .with_hit(EXPERIMENTS, pointwise_experiment("exp-1"))
        .with_hit(QUERY_SETS, query_set("qs-1", 5))
        .with_hits(RESULTS, evaluations)
        .with_hit(RESULTS, evaluation("other", "exp-2", "query 0", 0.1, None));
    let (backend, loader) = loader(backend);

    let report = report(&loader, "exp-1").await.into_result().unwrap();
    assert_eq!(report.experiment.experiment_type, ExperimentType::PointwiseEvaluation);
    assert_eq!(report.query_set.size(), 5);

    let ExperimentResults::Evaluations(results) = &report.results else {
        panic!("expected evaluation results");
    };
    assert_eq!(results.evaluations.len(), 3);
    assert!((results.summary["NDCG@10"] - 0.85).abs() < 1e-9);
    assert!((results.summary["Precision@10"] - 0.5).abs() < 1e-9);
    assert_eq!(results.variants.len(), 1);
    assert_eq!(results.variants[0].variant_id, None);

    assert_eq!(results.retrieval.expected, 5);
    assert_eq!(results.retrieval.retrieved, 3);
    assert!(!results.retrieval.complete);
    assert_eq!(results.zero_results.missing, 2);
    assert!(results.zero_results.should_warn);

    // experiment, query set, one evaluation page
    let requests = backend.requests();
    assert_eq!(requests.len(), 3);
    assert_eq!(requests[2].index, RESULTS);
    assert_eq!(requests[2].from, Some(0));
    assert_eq!(requests[2].size, 5);
}

#[tokio::test]
async fn test_hybrid_report_pages_and_picks_best_variant() {
    let experiment = hit(
        "exp-h",
        json!({
            "type": "HYBRID_OPTIMIZER",
            "status": "COMPLETED",
            "querySetId": "qs-1",
            "searchConfigurationId": "sc-1",
            "judgmentId": "j-1",
            "size": 2
        }),
    );
    let evaluations = (0..4).map(|i| {
        let variant = if i % 2 == 0 { "v-a" } else { "v-b" };
        let ndcg = if i % 2 == 0 { 0.4 } else { 0.9 };
        evaluation(&format!("r{i}"), "exp-h", &format!("query {}", i / 2), ndcg, Some(variant))
    });
    let backend = InMemoryBackend::new()
        .with_hit(EXPERIMENTS, experiment)
        .with_hit(QUERY_SETS, query_set("qs-1", 2))
        .with_hits(RESULTS, evaluations);

    let mut config = Config::default();
    config.retrieval.hybrid_variants_per_query = 2;
    config.retrieval.page_size_ceiling = 3;
    let backend = Arc::new(backend);
    let loader = ExperimentResultsLoader::new(backend.clone(), config);

    let report = report(&loader, "exp-h").await.into_result().unwrap();
    assert_eq!(report.experiment.id, "exp-h");

    let ExperimentResults::Evaluations(results) = &report.results else {
        panic!("expected evaluation results");
    };
    assert_eq!(results.evaluations.len(), 4);
    assert!(results.retrieval.complete);
    assert!(!results.zero_results.should_warn);

    let variants: Vec<Option<&str>> = results
        .variants
        .iter()
        .map(|v| v.variant_id.as_deref())
        .collect();
    assert_eq!(variants, vec![Some("v-a"), Some("v-b")]);
    let best = relevance_core::best_variant(&results.variants, "NDCG@10").unwrap();
    assert_eq!(best.variant_id.as_deref(), Some("v-b"));

    let pages: Vec<(Option<usize>, usize)> = backend
        .requests()
        .iter()
        .filter(|r| r.index == RESULTS)
        .map(|r| (r.from, r.size))
        .collect();
    assert_eq!(pages, vec![(Some(0), 3), (Some(3), 1)]);
}

#[tokio::test]
async fn test_pairwise_report_uses_embedded_results() {
    let experiment = hit(
        "exp-p",
        json!({
            "type": "PAIRWISE_COMPARISON",
            "status": "COMPLETED",
            "querySetId": "qs-1",
            "searchConfigurationList": ["sc-1", "sc-2"],
            "size": 5,
            "results": [
                {
                    "queryText": "query 0",
                    "snapshots": [
                        { "searchConfigurationId": "sc-1", "docIds": ["a", "b"] },
                        { "searchConfigurationId": "sc-2", "docIds": ["b", "c"] }
                    ],
                    "metrics": [ { "metric": "jaccard", "value": 0.33 } ]
                }
            ]
        }),
    );
    let backend = InMemoryBackend::new()
        .with_hit(EXPERIMENTS, experiment)
        .with_hit(QUERY_SETS, query_set("qs-1", 1));
    let (backend, loader) = loader(backend);

    let report = report(&loader, "exp-p").await.into_result().unwrap();
    let ExperimentResults::Pairwise(results) = &report.results else {
        panic!("expected pairwise results");
    };
    assert_eq!(results.results.len(), 1);
    assert_eq!(results.results[0].snapshots.len(), 2);
    assert!((results.summary["jaccard"] - 0.33).abs() < 1e-9);
    assert!(!results.zero_results.should_warn);

    // no evaluation index lookups for pairwise experiments
    assert!(backend.requests().iter().all(|r| r.index != RESULTS));
}

#[tokio::test]
async fn test_one_malformed_evaluation_fails_the_report() {
    let backend = InMemoryBackend::new()
        .with_hit(EXPERIMENTS, pointwise_experiment("exp-1"))
        .with_hit(QUERY_SETS, query_set("qs-1", 3))
        .with_hits(
            RESULTS,
            vec![
                evaluation("r0", "exp-1", "query 0", 0.7, None),
                hit("r1", json!({ "experimentId": "exp-1", "documentIds": ["x"] })),
                evaluation("r2", "exp-1", "query 2", 0.9, None),
            ],
        );
    let (_, loader) = loader(backend);

    let errors = report(&loader, "exp-1").await.into_result().unwrap_err();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].record.as_deref(), Some("r1"));
    assert_eq!(errors[0].field, "queryText");
}

#[tokio::test]
async fn test_malformed_experiment_stops_before_other_lookups() {
    let backend = InMemoryBackend::new().with_hit(
        EXPERIMENTS,
        hit("exp-x", json!({ "type": "SIDE_BY_SIDE", "status": "COMPLETED" })),
    );
    let (backend, loader) = loader(backend);

    let outcome = report(&loader, "exp-x").await;
    assert!(!outcome.is_success());
    assert!(outcome.errors().iter().any(|e| e.field == "type"));
    assert_eq!(backend.requests().len(), 1);
}

#[tokio::test]
async fn test_scheduled_job_is_attached() {
    let experiment = hit(
        "exp-s",
        json!({
            "type": "POINTWISE_EVALUATION",
            "status": "PROCESSING",
            "querySetId": "qs-1",
            "searchConfigurationList": ["sc-1"],
            "judgmentList": ["j-1"],
            "size": 10,
            "isScheduled": "true",
            "scheduledExperimentJobId": "job-1"
        }),
    );
    let job = hit(
        "job-1",
        json!({
            "enabled": true,
            "schedule": { "cron": { "expression": "0 * * * *", "timezone": "UTC" } },
            "enabledTime": 1736510400000u64
        }),
    );
    let backend = InMemoryBackend::new()
        .with_hit(EXPERIMENTS, experiment)
        .with_hit(QUERY_SETS, query_set("qs-1", 0))
        .with_hits(RESULTS, Vec::new())
        .with_hit(JOBS, job);
    let (_, loader) = loader(backend);

    let report = report(&loader, "exp-s").await.into_result().unwrap();
    let job = report.scheduled_job.unwrap();
    assert_eq!(job.id, "job-1");
    assert_eq!(job.cron.expression, "0 * * * *");
    assert_eq!(job.enabled_time, Some(1736510400000));
}

#[tokio::test]
async fn test_missing_experiment_is_not_found() {
    let backend = InMemoryBackend::new().with_hits(EXPERIMENTS, Vec::new());
    let (_, loader) = loader(backend);

    let err = loader
        .load_report("nope", &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, relevance_core::Error::NotFound(_)));
}

#[tokio::test]
async fn test_transport_failure_aborts_the_load() {
    let backend = InMemoryBackend::new()
        .with_hit(EXPERIMENTS, pointwise_experiment("exp-1"))
        .with_hit(QUERY_SETS, query_set("qs-1", 3))
        .failing_on_request(2);
    let (_, loader) = loader(backend);

    let err = loader
        .load_report("exp-1", &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(err.is_transport());
}

#[tokio::test]
async fn test_disposed_caller_gets_nothing() {
    let backend = InMemoryBackend::new()
        .with_hit(EXPERIMENTS, pointwise_experiment("exp-1"))
        .with_hit(QUERY_SETS, query_set("qs-1", 1));
    let (backend, loader) = loader(backend);

    let token = CancellationToken::new();
    token.cancel();
    let delivery = loader.load_report("exp-1", &token).await.unwrap();

    assert!(delivery.is_disposed());
    assert!(backend.requests().is_empty());
}

#[tokio::test]
async fn test_list_experiments_newest_first_request() {
    let backend = InMemoryBackend::new().with_hits(
        EXPERIMENTS,
        vec![pointwise_experiment("exp-1"), pointwise_experiment("exp-2")],
    );
    let (backend, loader) = loader(backend);

    let delivery = loader
        .list_experiments(Some(25), &CancellationToken::new())
        .await
        .unwrap();
    let Delivery::Ready(outcome) = delivery else {
        panic!("expected a delivery");
    };
    let ids: Vec<String> = outcome.into_result().unwrap().into_iter().map(|e| e.id).collect();
    assert_eq!(ids, vec!["exp-1", "exp-2"]);

    let request = &backend.requests()[0];
    assert_eq!(request.size, 25);
    assert!(request.sort.is_some());
}

#[tokio::test]
async fn test_default_result_window_yields_partial_results() {
    let evaluations = (0..25_000).map(|i| {
        evaluation(&format!("r{i}"), "exp-1", &format!("query {i}"), 0.8, None)
    });
    let backend = InMemoryBackend::new()
        .with_hit(EXPERIMENTS, pointwise_experiment("exp-1"))
        .with_hit(QUERY_SETS, query_set("qs-1", 25_000))
        .with_hits(RESULTS, evaluations);
    let (backend, loader) = loader(backend);

    let report = report(&loader, "exp-1").await.into_result().unwrap();
    let ExperimentResults::Evaluations(results) = &report.results else {
        panic!("expected evaluation results");
    };

    assert_eq!(results.retrieval.expected, 25_000);
    assert_eq!(results.retrieval.retrieved, 10_000);
    assert!(!results.retrieval.complete);
    assert_eq!(
        results.retrieval.partial,
        Some(PartialRetrieval {
            retrieved: 10_000,
            expected: 25_000
        })
    );
    assert_eq!(results.evaluations.len(), 10_000);

    // the window shortfall is not reported again as zero-result queries
    assert_eq!(results.zero_results.missing, 0);
    assert!(!results.zero_results.should_warn);

    let pages: Vec<(Option<usize>, usize)> = backend
        .requests()
        .iter()
        .filter(|r| r.index == RESULTS)
        .map(|r| (r.from, r.size))
        .collect();
    assert_eq!(pages, vec![(Some(0), 10_000)]);
}

/// Delays every search before handing it to the wrapped backend
struct SlowBackend {
    inner: InMemoryBackend,
    delay: Duration,
}

#[async_trait]
impl SearchBackend for SlowBackend {
    async fn search(&self, request: &SearchRequest) -> relevance_core::Result<SearchResponse> {
        tokio::time::sleep(self.delay).await;
        self.inner.search(request).await
    }
}

#[tokio::test]
async fn test_caller_disposed_while_request_in_flight() {
    let backend = Arc::new(SlowBackend {
        inner: InMemoryBackend::new()
            .with_hit(EXPERIMENTS, pointwise_experiment("exp-1"))
            .with_hit(QUERY_SETS, query_set("qs-1", 1)),
        delay: Duration::from_millis(200),
    });
    let loader = ExperimentResultsLoader::new(backend.clone(), Config::default());

    let token = CancellationToken::new();
    let canceller = token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        canceller.cancel();
    });

    let delivery = loader.load_report("exp-1", &token).await.unwrap();

    assert!(delivery.is_disposed());
    // the pending request was dropped before it reached the backend
    assert!(backend.inner.requests().is_empty());
}
