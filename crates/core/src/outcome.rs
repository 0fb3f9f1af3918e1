//! Tagged parse outcomes and the combinator that merges them
//!
//! A [`ParseOutcome`] is either a value or the full list of field violations
//! that prevented one. Outcomes are merged with [`combine`], which is a fold:
//! the empty list is the identity and the merge is associative.

use serde::Serialize;
use std::fmt;

/// One violated field in one record
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    /// Id of the record the field belongs to, when known
    #[serde(skip_serializing_if = "Option::is_none")]
    pub record: Option<String>,

    /// Dotted path of the offending field, e.g. `schedule.cron.expression`
    pub field: String,

    pub reason: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            record: None,
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Tag the error with the id of the record it came from
    pub fn in_record(mut self, record: impl Into<String>) -> Self {
        self.record = Some(record.into());
        self
    }

    /// Nest the field under a parent path (`snapshots[0]` + `docIds`)
    pub fn nested_under(mut self, parent: &str) -> Self {
        self.field = format!("{parent}.{}", self.field);
        self
    }
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.record {
            Some(record) => write!(f, "[{record}] {}: {}", self.field, self.reason),
            None => write!(f, "{}: {}", self.field, self.reason),
        }
    }
}

/// Result of validating untyped input
///
/// Never carries a value and errors at the same time.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ParseOutcome<T> {
    Success { data: T },
    Failure { errors: Vec<FieldError> },
}

impl<T> ParseOutcome<T> {
    pub fn success(data: T) -> Self {
        Self::Success { data }
    }

    pub fn failure(errors: Vec<FieldError>) -> Self {
        Self::Failure { errors }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    pub fn data(&self) -> Option<&T> {
        match self {
            Self::Success { data } => Some(data),
            Self::Failure { .. } => None,
        }
    }

    /// Errors of a failure; empty for a success
    pub fn errors(&self) -> &[FieldError] {
        match self {
            Self::Success { .. } => &[],
            Self::Failure { errors } => errors,
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> ParseOutcome<U> {
        match self {
            Self::Success { data } => ParseOutcome::Success { data: f(data) },
            Self::Failure { errors } => ParseOutcome::Failure { errors },
        }
    }

    pub fn and_then<U>(self, f: impl FnOnce(T) -> ParseOutcome<U>) -> ParseOutcome<U> {
        match self {
            Self::Success { data } => f(data),
            Self::Failure { errors } => ParseOutcome::Failure { errors },
        }
    }

    /// Tag every error with the id of the record it came from
    pub fn in_record(self, record: &str) -> Self {
        match self {
            Self::Success { data } => Self::Success { data },
            Self::Failure { errors } => Self::Failure {
                errors: errors.into_iter().map(|e| e.in_record(record)).collect(),
            },
        }
    }

    pub fn into_result(self) -> Result<T, Vec<FieldError>> {
        match self {
            Self::Success { data } => Ok(data),
            Self::Failure { errors } => Err(errors),
        }
    }
}

impl<T> ParseOutcome<Vec<T>> {
    /// Merge two already-combined outcomes, keeping input order
    pub fn concat(self, other: Self) -> Self {
        match (self, other) {
            (Self::Success { mut data }, Self::Success { data: more }) => {
                data.extend(more);
                Self::Success { data }
            }
            (Self::Success { .. }, failure @ Self::Failure { .. }) => failure,
            (failure @ Self::Failure { .. }, Self::Success { .. }) => failure,
            (Self::Failure { mut errors }, Self::Failure { errors: more }) => {
                errors.extend(more);
                Self::Failure { errors }
            }
        }
    }
}

/// Merge outcomes into one
///
/// Succeeds with every value in input order only if every input succeeded.
/// Otherwise fails with the errors of every failing input, in input order;
/// successful values are dropped so a partial set is never handed out.
pub fn combine<T, I>(outcomes: I) -> ParseOutcome<Vec<T>>
where
    I: IntoIterator<Item = ParseOutcome<T>>,
{
    outcomes
        .into_iter()
        .fold(ParseOutcome::success(Vec::new()), |acc, next| {
            acc.concat(next.map(|value| vec![value]))
        })
}

impl<T> FromIterator<ParseOutcome<T>> for ParseOutcome<Vec<T>> {
    fn from_iter<I: IntoIterator<Item = ParseOutcome<T>>>(iter: I) -> Self {
        combine(iter)
    }
}
