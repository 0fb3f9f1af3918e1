//! Typed parsing and validation of raw backend records
//!
//! Every shape is parsed with a [`FieldReader`], which coerces fields to their
//! canonical types and records one [`FieldError`] per violation instead of
//! stopping at the first one. Unknown fields are ignored.

use crate::entities::{
    CronSchedule, Experiment, ExperimentStatus, ExperimentType, MetricMap, PairwiseResult,
    QueryEvaluation, QuerySet, QuerySnapshot, ScheduledJob,
};
use crate::metrics::{extract_metrics, MetricEntry, MetricValue};
use crate::outcome::{combine, FieldError, ParseOutcome};
use crate::record::{RawRecord, SearchHit};
use serde_json::Value;
use std::str::FromStr;
use tracing::debug;

const MISSING: &str = "required field is missing";

/// A domain shape that can be validated out of a [`RawRecord`]
pub trait FromRawRecord: Sized {
    /// Human readable shape name, used in logs
    const SHAPE: &'static str;

    /// Parse `raw`. `fallback_id` stands in for a missing `id` field, typically
    /// the `_id` of the hit envelope.
    fn from_raw(raw: &RawRecord, fallback_id: Option<&str>) -> ParseOutcome<Self>;
}

/// Parse a bare record
pub fn parse<T: FromRawRecord>(raw: &RawRecord) -> ParseOutcome<T> {
    T::from_raw(raw, None)
}

/// Parse the source of a search hit, tagging errors with the hit id
pub fn parse_hit<T: FromRawRecord>(hit: &SearchHit) -> ParseOutcome<T> {
    if hit.id.is_empty() {
        return T::from_raw(&hit.source, None);
    }
    let outcome = T::from_raw(&hit.source, Some(&hit.id)).in_record(&hit.id);
    if !outcome.is_success() {
        debug!(
            "Hit {} is not a valid {}: {} error(s)",
            hit.id,
            T::SHAPE,
            outcome.errors().len()
        );
    }
    outcome
}

/// Parse every hit and combine the outcomes (all or nothing)
pub fn parse_hits<T: FromRawRecord>(hits: &[SearchHit]) -> ParseOutcome<Vec<T>> {
    combine(hits.iter().map(parse_hit::<T>))
}

/// Parse the pairwise results embedded in an experiment record
///
/// An absent `results` field yields an empty list.
pub fn parse_pairwise_results(raw: &RawRecord) -> ParseOutcome<Vec<PairwiseResult>> {
    let items = match raw.get("results") {
        None | Some(Value::Null) => return ParseOutcome::success(Vec::new()),
        Some(Value::Array(items)) => items,
        Some(other) => {
            return ParseOutcome::failure(vec![FieldError::new(
                "results",
                format!("expected a list, got {}", type_name(other)),
            )])
        }
    };

    combine(items.iter().enumerate().map(|(i, item)| {
        let parent = format!("results[{i}]");
        match item {
            Value::Object(obj) => match PairwiseResult::from_raw(obj, None) {
                ParseOutcome::Failure { errors } => ParseOutcome::failure(
                    errors.into_iter().map(|e| e.nested_under(&parent)).collect(),
                ),
                success => success,
            },
            other => ParseOutcome::failure(vec![FieldError::new(
                parent,
                format!("expected an object, got {}", type_name(other)),
            )]),
        }
    }))
}

/// Accumulating field accessor over one record
pub(crate) struct FieldReader<'a> {
    raw: &'a RawRecord,
    fallback_id: Option<&'a str>,
    errors: Vec<FieldError>,
}

impl<'a> FieldReader<'a> {
    pub(crate) fn new(raw: &'a RawRecord, fallback_id: Option<&'a str>) -> Self {
        Self {
            raw,
            fallback_id: fallback_id.filter(|id| !id.trim().is_empty()),
            errors: Vec::new(),
        }
    }

    /// Resolve a dotted path; `null` counts as absent
    fn lookup(&self, path: &str) -> Option<&'a Value> {
        let mut segments = path.split('.');
        let first = segments.next()?;
        let mut current = self.raw.get(first)?;
        for segment in segments {
            current = current.as_object()?.get(segment)?;
        }
        (!current.is_null()).then_some(current)
    }

    /// First present field among aliases, with the name it was found under
    fn first_present(&self, paths: &[&'static str]) -> Option<(&'static str, &'a Value)> {
        paths
            .iter()
            .find_map(|path| self.lookup(path).map(|value| (*path, value)))
    }

    fn report(&mut self, field: impl Into<String>, reason: impl Into<String>) {
        self.errors.push(FieldError::new(field, reason));
    }

    fn has_error_for(&self, field: &str) -> bool {
        self.errors.iter().any(|e| e.field == field)
    }

    /// Run a coercion on the first present alias, recording its error
    fn read<T>(
        &mut self,
        paths: &[&'static str],
        required: bool,
        coerce: impl FnOnce(&Value) -> Result<T, String>,
    ) -> Option<T> {
        let primary = paths.first().copied().unwrap_or("");
        match self.first_present(paths) {
            Some((path, value)) => match coerce(value) {
                Ok(v) => Some(v),
                Err(reason) => {
                    self.report(path, reason);
                    None
                }
            },
            None => {
                if required {
                    self.report(primary, MISSING);
                }
                None
            }
        }
    }

    pub(crate) fn id(&mut self) -> Option<String> {
        match self.lookup("id") {
            Some(value) => match coerce_string(value) {
                Ok(id) => Some(id),
                Err(reason) => {
                    self.report("id", reason);
                    None
                }
            },
            None => match self.fallback_id {
                Some(id) => Some(id.to_string()),
                None => {
                    self.report("id", MISSING);
                    None
                }
            },
        }
    }

    pub(crate) fn required_string(&mut self, paths: &[&'static str]) -> Option<String> {
        self.read(paths, true, coerce_string)
    }

    pub(crate) fn optional_string(&mut self, paths: &[&'static str]) -> Option<String> {
        self.read(paths, false, coerce_string)
    }

    pub(crate) fn required_count(&mut self, paths: &[&'static str]) -> Option<u64> {
        self.read(paths, true, coerce_count)
    }

    pub(crate) fn optional_count(&mut self, paths: &[&'static str]) -> Option<u64> {
        self.read(paths, false, coerce_count)
    }

    pub(crate) fn required_bool(&mut self, paths: &[&'static str]) -> Option<bool> {
        self.read(paths, true, coerce_bool)
    }

    pub(crate) fn optional_bool(&mut self, paths: &[&'static str]) -> Option<bool> {
        self.read(paths, false, coerce_bool)
    }

    /// Enum token, matched case-insensitively after trimming
    pub(crate) fn required_enum<T: FromStr>(
        &mut self,
        paths: &[&'static str],
        allowed: &str,
    ) -> Option<T> {
        self.read(paths, true, |value| {
            let token = coerce_string(value)?;
            T::from_str(token.trim())
                .map_err(|_| format!("unknown value \"{token}\", expected one of {allowed}"))
        })
    }

    pub(crate) fn string_list(
        &mut self,
        paths: &[&'static str],
        required: bool,
    ) -> Option<Vec<String>> {
        self.read(paths, required, coerce_string_list)
    }

    /// A list field that may also be given as a single value under another name
    pub(crate) fn list_or_single(
        &mut self,
        list_field: &'static str,
        single_field: &'static str,
    ) -> Option<Vec<String>> {
        if self.lookup(list_field).is_some() {
            let list = self.string_list(&[list_field], true)?;
            if list.is_empty() {
                self.report(list_field, "must contain at least one entry");
                return None;
            }
            return Some(list);
        }
        if self.lookup(single_field).is_some() {
            return self.required_string(&[single_field]).map(|id| vec![id]);
        }
        self.report(list_field, MISSING);
        None
    }

    /// Metric pairs flattened into a numeric map; absent means empty
    pub(crate) fn metrics(&mut self, field: &'static str) -> MetricMap {
        let entries = match self.lookup(field) {
            None => return MetricMap::new(),
            Some(Value::Array(items)) => self.metric_entries(field, items),
            Some(Value::Object(map)) => map
                .iter()
                .filter_map(|(name, value)| {
                    let value = self.metric_value(&format!("{field}.{name}"), value)?;
                    Some(MetricEntry::new(name.clone(), value))
                })
                .collect(),
            Some(other) => {
                self.report(
                    field,
                    format!(
                        "expected a list of {{metric, value}} pairs, got {}",
                        type_name(other)
                    ),
                );
                return MetricMap::new();
            }
        };

        let mut metrics = MetricMap::new();
        for (name, value) in extract_metrics(&entries) {
            match value.as_f64() {
                Some(number) => {
                    metrics.insert(name, number);
                }
                None => self.report(
                    format!("{field}.{name}"),
                    format!("expected a numeric value, got {value:?}"),
                ),
            }
        }
        metrics
    }

    fn metric_entries(&mut self, field: &str, items: &[Value]) -> Vec<MetricEntry> {
        let mut entries = Vec::with_capacity(items.len());
        for (i, item) in items.iter().enumerate() {
            let Some(obj) = item.as_object() else {
                self.report(
                    format!("{field}[{i}]"),
                    format!("expected an object, got {}", type_name(item)),
                );
                continue;
            };

            let name = match obj.get("metric").filter(|v| !v.is_null()) {
                Some(value) => match coerce_string(value) {
                    Ok(name) => Some(name),
                    Err(reason) => {
                        self.report(format!("{field}[{i}].metric"), reason);
                        None
                    }
                },
                None => {
                    self.report(format!("{field}[{i}].metric"), MISSING);
                    None
                }
            };

            let value = match obj.get("value").filter(|v| !v.is_null()) {
                Some(value) => self.metric_value(&format!("{field}[{i}].value"), value),
                None => {
                    self.report(format!("{field}[{i}].value"), MISSING);
                    None
                }
            };

            if let (Some(name), Some(value)) = (name, value) {
                entries.push(MetricEntry::new(name, value));
            }
        }
        entries
    }

    fn metric_value(&mut self, field: &str, value: &Value) -> Option<MetricValue> {
        match value {
            Value::Number(n) => match n.as_f64() {
                Some(number) => Some(MetricValue::Number(number)),
                None => {
                    self.report(field, "number out of range");
                    None
                }
            },
            Value::String(s) => Some(MetricValue::Text(s.clone())),
            other => {
                self.report(field, format!("expected a number, got {}", type_name(other)));
                None
            }
        }
    }

    /// A list of objects, each parsed by a nested reader
    ///
    /// Errors of an item are reported under `field[i]`.
    pub(crate) fn object_list<T>(
        &mut self,
        field: &'static str,
        required: bool,
        mut parse_item: impl FnMut(&mut FieldReader<'a>) -> Option<T>,
    ) -> Option<Vec<T>> {
        let items = match self.lookup(field) {
            Some(Value::Array(items)) => items,
            Some(other) => {
                self.report(field, format!("expected a list, got {}", type_name(other)));
                return None;
            }
            None => {
                if required {
                    self.report(field, MISSING);
                    return None;
                }
                return Some(Vec::new());
            }
        };

        let mut values = Vec::with_capacity(items.len());
        let mut failed = false;
        for (i, item) in items.iter().enumerate() {
            let parent = format!("{field}[{i}]");
            let Some(obj) = item.as_object() else {
                self.report(parent, format!("expected an object, got {}", type_name(item)));
                failed = true;
                continue;
            };

            let mut child = FieldReader::new(obj, None);
            let value = parse_item(&mut child);
            if child.errors.is_empty() {
                if let Some(value) = value {
                    values.push(value);
                }
            } else {
                failed = true;
                self.errors
                    .extend(child.errors.into_iter().map(|e| e.nested_under(&parent)));
            }
        }

        (!failed).then_some(values)
    }

    /// Turn the collected fields into an outcome
    ///
    /// `build` only runs when no violation was recorded.
    pub(crate) fn finish<T>(self, build: impl FnOnce() -> Option<T>) -> ParseOutcome<T> {
        if !self.errors.is_empty() {
            return ParseOutcome::failure(self.errors);
        }
        match build() {
            Some(value) => ParseOutcome::success(value),
            None => ParseOutcome::failure(vec![FieldError::new("record", "incomplete record")]),
        }
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "list",
        Value::Object(_) => "object",
    }
}

fn coerce_string(value: &Value) -> Result<String, String> {
    match value {
        Value::String(s) if s.trim().is_empty() => Err("must not be empty".to_string()),
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(format!("expected a string, got {}", type_name(other))),
    }
}

fn float_to_count(value: f64) -> Result<u64, String> {
    if !value.is_finite() || value < 0.0 {
        return Err(format!("must be a non-negative integer, got {value}"));
    }
    if value.fract() != 0.0 {
        return Err(format!("must be a whole number, got {value}"));
    }
    if value > u64::MAX as f64 {
        return Err(format!("out of range: {value}"));
    }
    Ok(value as u64)
}

fn coerce_count(value: &Value) -> Result<u64, String> {
    match value {
        Value::Number(n) => match n.as_u64() {
            Some(count) => Ok(count),
            None => float_to_count(n.as_f64().unwrap_or(f64::NAN)),
        },
        Value::String(s) => {
            let trimmed = s.trim();
            if let Ok(count) = trimmed.parse::<u64>() {
                return Ok(count);
            }
            match trimmed.parse::<f64>() {
                Ok(number) => float_to_count(number),
                Err(_) => Err(format!("expected a non-negative integer, got \"{s}\"")),
            }
        }
        other => Err(format!(
            "expected a non-negative integer, got {}",
            type_name(other)
        )),
    }
}

fn coerce_bool(value: &Value) -> Result<bool, String> {
    match value {
        Value::Bool(b) => Ok(*b),
        Value::String(s) if s.trim().eq_ignore_ascii_case("true") => Ok(true),
        Value::String(s) if s.trim().eq_ignore_ascii_case("false") => Ok(false),
        Value::String(s) => Err(format!("expected a boolean, got \"{s}\"")),
        other => Err(format!("expected a boolean, got {}", type_name(other))),
    }
}

fn coerce_string_list(value: &Value) -> Result<Vec<String>, String> {
    let Value::Array(items) = value else {
        return Err(format!("expected a list, got {}", type_name(value)));
    };
    items
        .iter()
        .enumerate()
        .map(|(i, item)| coerce_string(item).map_err(|reason| format!("entry {i}: {reason}")))
        .collect()
}

const EXPERIMENT_TYPES: &str = "PAIRWISE_COMPARISON, POINTWISE_EVALUATION, HYBRID_OPTIMIZER";
const EXPERIMENT_STATUSES: &str = "PROCESSING, COMPLETED, ERROR";

impl FromRawRecord for Experiment {
    const SHAPE: &'static str = "experiment";

    fn from_raw(raw: &RawRecord, fallback_id: Option<&str>) -> ParseOutcome<Self> {
        let mut f = FieldReader::new(raw, fallback_id);

        let id = f.id();
        let experiment_type = f.required_enum::<ExperimentType>(&["type"], EXPERIMENT_TYPES);
        let status = f.required_enum::<ExperimentStatus>(&["status"], EXPERIMENT_STATUSES);
        let query_set_id = f.required_string(&["querySetId"]);
        let search_configuration_ids =
            f.list_or_single("searchConfigurationList", "searchConfigurationId");
        let judgment_id = judgment_id(&mut f);
        let size = f.required_count(&["size"]);
        let is_scheduled = f.optional_bool(&["isScheduled"]).unwrap_or(false);
        let scheduled_job_id = f.optional_string(&["scheduledExperimentJobId", "scheduledJobId"]);
        let timestamp = f.optional_string(&["timestamp"]);

        if let Some(kind) = experiment_type {
            if kind.produces_evaluations()
                && judgment_id.is_none()
                && !f.has_error_for("judgmentList")
            {
                f.report("judgmentList", format!("required for {kind} experiments"));
            }
            if kind == ExperimentType::PairwiseComparison {
                if let Some(ids) = &search_configuration_ids {
                    if ids.len() != 2 {
                        f.report(
                            "searchConfigurationList",
                            format!(
                                "pairwise comparison needs exactly 2 search configurations, got {}",
                                ids.len()
                            ),
                        );
                    }
                }
            }
        }

        f.finish(|| {
            Some(Experiment {
                id: id?,
                experiment_type: experiment_type?,
                status: status?,
                query_set_id: query_set_id?,
                search_configuration_ids: search_configuration_ids?,
                judgment_id,
                size: size?,
                is_scheduled,
                scheduled_job_id,
                timestamp,
            })
        })
    }
}

/// `judgmentList[0]` or `judgmentId`; an empty list means none
fn judgment_id(f: &mut FieldReader<'_>) -> Option<String> {
    if f.lookup("judgmentList").is_some() {
        return f
            .string_list(&["judgmentList"], false)
            .and_then(|list| list.into_iter().next());
    }
    f.optional_string(&["judgmentId"])
}

impl FromRawRecord for QueryEvaluation {
    const SHAPE: &'static str = "query evaluation";

    fn from_raw(raw: &RawRecord, fallback_id: Option<&str>) -> ParseOutcome<Self> {
        let mut f = FieldReader::new(raw, fallback_id);

        let query_text = f.required_string(&["queryText", "searchText"]);
        let document_ids = f
            .string_list(&["documentIds", "docIds"], false)
            .unwrap_or_default();
        let metrics = f.metrics("metrics");
        let search_configuration_id = f.optional_string(&["searchConfigurationId"]);
        let variant_id = f.optional_string(&["experimentVariantId", "variantId"]);

        f.finish(|| {
            Some(QueryEvaluation {
                query_text: query_text?,
                document_ids,
                metrics,
                search_configuration_id,
                variant_id,
            })
        })
    }
}

impl FromRawRecord for QuerySnapshot {
    const SHAPE: &'static str = "query snapshot";

    fn from_raw(raw: &RawRecord, fallback_id: Option<&str>) -> ParseOutcome<Self> {
        let mut f = FieldReader::new(raw, fallback_id);

        let query_text = f.required_string(&["queryText", "searchText"]);
        let document_ids = f.string_list(&["documentIds", "docIds"], true);
        let search_configuration_id = f.optional_string(&["searchConfigurationId"]);

        f.finish(|| {
            Some(QuerySnapshot {
                query_text: query_text?,
                document_ids: document_ids?,
                search_configuration_id,
            })
        })
    }
}

impl FromRawRecord for PairwiseResult {
    const SHAPE: &'static str = "pairwise result";

    fn from_raw(raw: &RawRecord, fallback_id: Option<&str>) -> ParseOutcome<Self> {
        let mut f = FieldReader::new(raw, fallback_id);

        let query_text = f.required_string(&["queryText", "searchText"]);
        let snapshot_query = query_text.clone().unwrap_or_default();
        let snapshots = f.object_list("snapshots", true, |s| {
            let search_configuration_id = s.required_string(&["searchConfigurationId"]);
            let document_ids = s.string_list(&["docIds", "documentIds"], true)?;
            Some(QuerySnapshot {
                query_text: snapshot_query.clone(),
                document_ids,
                search_configuration_id,
            })
        });
        let metrics = f.metrics("metrics");

        f.finish(|| {
            Some(PairwiseResult {
                query_text: query_text?,
                snapshots: snapshots?,
                metrics,
            })
        })
    }
}

impl FromRawRecord for QuerySet {
    const SHAPE: &'static str = "query set";

    fn from_raw(raw: &RawRecord, fallback_id: Option<&str>) -> ParseOutcome<Self> {
        let mut f = FieldReader::new(raw, fallback_id);

        let id = f.id();
        let name = f.optional_string(&["name"]);
        let queries = query_texts(&mut f);

        f.finish(|| {
            Some(QuerySet {
                id: id?,
                name,
                queries: queries?,
            })
        })
    }
}

/// Entries of `querySetQueries`: plain strings or `{queryText}` objects
fn query_texts(f: &mut FieldReader<'_>) -> Option<Vec<String>> {
    const FIELD: &str = "querySetQueries";
    let Some(value) = f.lookup(FIELD) else {
        f.report(FIELD, MISSING);
        return None;
    };
    let Value::Array(items) = value else {
        f.report(FIELD, format!("expected a list, got {}", type_name(value)));
        return None;
    };

    let mut queries = Vec::with_capacity(items.len());
    let mut failed = false;
    for (i, item) in items.iter().enumerate() {
        let text = match item {
            Value::Object(obj) => obj
                .get("queryText")
                .map(coerce_string)
                .unwrap_or_else(|| Err(MISSING.to_string())),
            other => coerce_string(other),
        };
        match text {
            Ok(text) => queries.push(text),
            Err(reason) => {
                f.report(format!("{FIELD}[{i}]"), reason);
                failed = true;
            }
        }
    }
    (!failed).then_some(queries)
}

impl FromRawRecord for ScheduledJob {
    const SHAPE: &'static str = "scheduled job";

    fn from_raw(raw: &RawRecord, fallback_id: Option<&str>) -> ParseOutcome<Self> {
        let mut f = FieldReader::new(raw, fallback_id);

        let id = f.id();
        let enabled = f.required_bool(&["enabled"]);
        let expression = f.required_string(&["schedule.cron.expression"]);
        let timezone = f.required_string(&["schedule.cron.timezone"]);
        let enabled_time = f.optional_count(&["enabledTime", "enabled_time"]);
        let last_update_time = f.optional_count(&["lastUpdateTime", "last_update_time"]);

        f.finish(|| {
            Some(ScheduledJob {
                id: id?,
                enabled: enabled?,
                cron: CronSchedule {
                    expression: expression?,
                    timezone: timezone?,
                },
                enabled_time,
                last_update_time,
            })
        })
    }
}
